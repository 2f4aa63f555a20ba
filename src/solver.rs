//! Assembly and the nonlinear solution driver.
//!
//! Each outer (Picard) iteration rebuilds the linear system from the
//! previous iterate: per-element 3x3 conductance matrices, the lumped
//! transient term, volumetric sources, and the derivative boundary
//! conditions, with prescribed temperatures folded out element by
//! element. Radiation edges and temperature-dependent conductivities
//! re-linearize at the previous iterate; the loop ends when the relative
//! solution change drops below 100x the problem precision.

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use num_complex::Complex64;

use crate::error::{HearthError, Result};
use crate::mesh::{load_mesh, Element, Mesh, Node, PbcKind};
use crate::problem::{HeatProblem, ProblemType};
use crate::props::{BoundaryKind, Conductor};
use crate::renumber;
use crate::sparse::{SymmetricSystem, Q_FIXED, Q_FREE};
use crate::units::KSB;

/// A loaded problem ready to analyze: property tables, mesh, and the
/// optional previous-step temperatures.
pub struct HeatSolver {
    pub problem: HeatProblem,
    pub mesh: Mesh,
    pub tprev: Option<Vec<f64>>,
    base: PathBuf,
}

/// Result of a converged analysis.
pub struct Solution {
    /// Nodal temperatures followed by one temperature per conductor.
    pub v: Vec<f64>,
    /// Per-node tag as written to the solution file: -2 free, -1
    /// prescribed, otherwise the conductor index.
    pub q: Vec<i32>,
    /// Heat flow per conductor: computed for fixed-temperature
    /// conductors, the prescribed value otherwise.
    pub flows: Vec<f64>,
    /// Outer iterations taken.
    pub iterations: usize,
    /// CG iterations per outer step.
    pub cg_iterations: Vec<usize>,
}

/// Triangle shape parameters: `p`/`q` are the linear shape-function
/// derivative numerators, `l` the side lengths, `a` the signed area,
/// `(r, z)` the centroid.
struct Shape {
    p: [f64; 3],
    q: [f64; 3],
    l: [f64; 3],
    a: f64,
    r: f64,
    z: f64,
}

fn triangle_shape(nodes: &[Node], n: [usize; 3]) -> Shape {
    let x = n.map(|i| nodes[i].x);
    let y = n.map(|i| nodes[i].y);
    let p = [y[1] - y[2], y[2] - y[0], y[0] - y[1]];
    let q = [x[2] - x[1], x[0] - x[2], x[1] - x[0]];
    let mut l = [0.0; 3];
    for j in 0..3 {
        let k = (j + 1) % 3;
        l[j] = ((x[k] - x[j]).powi(2) + (y[k] - y[j]).powi(2)).sqrt();
    }
    Shape {
        p,
        q,
        l,
        a: (p[0] * q[1] - p[1] * q[0]) / 2.0,
        r: (x[0] + x[1] + x[2]) / 3.0,
        z: (y[0] + y[1] + y[2]) / 3.0,
    }
}

/// Per-analysis assembly context: the problem tables plus geometry
/// scalars already converted to meters.
struct Assembly<'a> {
    problem: &'a HeatProblem,
    nodes: &'a [Node],
    dt: f64,
    depth: f64,
    ext_zo: f64,
    ext_ri: f64,
    ext_ro: f64,
    axisymmetric: bool,
}

impl<'a> Assembly<'a> {
    fn new(problem: &'a HeatProblem, nodes: &'a [Node]) -> Self {
        let units = problem.length_units.meters_per_unit();
        Assembly {
            problem,
            nodes,
            dt: problem.dt,
            depth: problem.depth * units,
            ext_zo: problem.ext_zo * units,
            ext_ri: problem.ext_ri * units,
            ext_ro: problem.ext_ro * units,
            axisymmetric: problem.problem_type == ProblemType::Axisymmetric,
        }
    }

    /// Build the local 3x3 matrix and source vector for one element,
    /// linearized at the previous iterate `vo`. The flag reports whether
    /// a radiation edge was touched.
    fn element(&self, el: &Element, vo: &[f64], tprev: Option<&[f64]>) -> ([[f64; 3]; 3], [f64; 3], bool) {
        let mut me = [[0.0f64; 3]; 3];
        let mut be = [0.0f64; 3];
        let mut radiating = false;
        let n = el.p;
        let sh = triangle_shape(self.nodes, n);

        // conductivity at the previous iterate, corner-averaged
        let material = &self.problem.materials[el.blk];
        let kn = (material.conductivity(vo[n[0]])
            + material.conductivity(vo[n[1]])
            + material.conductivity(vo[n[2]]))
            / 3.0;

        let (vol_depth, kludge) = if self.axisymmetric {
            // elements of the external region carry the conformally
            // mapped (Kelvin) conductivity
            let kludge = if self.problem.labels[el.lbl].is_external {
                let z = sh.z - self.ext_zo;
                (sh.r * sh.r + z * z) / (self.ext_ri * self.ext_ro)
            } else {
                1.0
            };
            (2.0 * PI * sh.r, kludge)
        } else {
            (self.depth, 1.0)
        };

        let kx = -vol_depth * kn.re / (4.0 * sh.a) / kludge;
        let ky = -vol_depth * kn.im / (4.0 * sh.a) / kludge;
        for j in 0..3 {
            for k in j..3 {
                let v = kx * sh.p[j] * sh.p[k] + ky * sh.q[j] * sh.q[k];
                me[j][k] += v;
                if j != k {
                    me[k][j] += v;
                }
            }
        }

        // lumped transient term
        if self.dt != 0.0 {
            let tp = tprev.expect("transient step without previous solution");
            let kt = -vol_depth * material.kt * sh.a / (3.0 * self.dt);
            for j in 0..3 {
                me[j][j] += kt;
                be[j] += kt * tp[n[j]];
            }
        }

        // volumetric source
        let qv = -vol_depth * material.qv * sh.a / 3.0;
        for j in 0..3 {
            be[j] += qv;
        }

        // derivative boundary conditions on element edges
        for j in 0..3 {
            if el.e[j] < 0 {
                continue;
            }
            let k = (j + 1) % 3;
            let (c0, c1) = match self.problem.boundary_props[el.e[j] as usize].kind {
                BoundaryKind::FixedTemperature { .. } => continue,
                BoundaryKind::HeatFlux { qs } => (0.0, qs),
                BoundaryKind::Convection { h, tinf } => (h, -h * tinf),
                BoundaryKind::Radiation { beta, tinf } => {
                    radiating = true;
                    let tlast = (vo[n[j]] + vo[n[k]]) / 2.0;
                    (
                        4.0 * beta * KSB * tlast.powi(3),
                        -(beta * KSB * (tinf.powi(4) + 3.0 * tlast.powi(4))),
                    )
                }
            };
            if self.axisymmetric {
                let (xj, xk) = (self.nodes[n[j]].x, self.nodes[n[k]].x);
                let kk = -2.0 * PI * c0 * sh.l[j] / 6.0;
                me[j][j] += kk * 2.0 * (3.0 * xj + xk) / 4.0;
                me[k][k] += kk * 2.0 * (xj + 3.0 * xk) / 4.0;
                me[j][k] += kk * (xj + xk) / 2.0;
                me[k][j] += kk * (xj + xk) / 2.0;
                let kk = 2.0 * PI * c1 * sh.l[j] / 2.0;
                be[j] += kk * (2.0 * xj + xk) / 3.0;
                be[k] += kk * (xj + 2.0 * xk) / 3.0;
            } else {
                let kk = -self.depth * c0 * sh.l[j] / 6.0;
                me[j][j] += 2.0 * kk;
                me[k][k] += 2.0 * kk;
                me[j][k] += kk;
                me[k][j] += kk;
                let kk = self.depth * c1 * sh.l[j] / 2.0;
                be[j] += kk;
                be[k] += kk;
            }
        }

        (me, be, radiating)
    }
}

/// Read nodal temperatures out of a prior solution file: scan for the
/// `[Solution]` line, check the node count, then take the third column.
fn load_previous(path: &Path, num_nodes: usize) -> Result<Vec<f64>> {
    let text = fs::read_to_string(path)
        .map_err(|e| HearthError::BadElementFile(format!("{}: {e}", path.display())))?;
    let mut lines = text.lines();
    loop {
        let line = lines.next().ok_or_else(|| {
            HearthError::BadElementFile("previous solution has no [Solution] section".into())
        })?;
        if line.trim().to_ascii_lowercase().starts_with("[solution]") {
            break;
        }
    }
    let count: usize = lines
        .next()
        .and_then(|line| line.split_ascii_whitespace().next())
        .and_then(|tok| tok.parse().ok())
        .ok_or_else(|| HearthError::BadElementFile("bad previous solution node count".into()))?;
    if count != num_nodes {
        return Err(HearthError::BadElementFile(format!(
            "previous solution has {count} nodes, mesh has {num_nodes}"
        )));
    }
    let mut tprev = Vec::with_capacity(num_nodes);
    for _ in 0..num_nodes {
        let line = lines
            .next()
            .ok_or_else(|| HearthError::BadElementFile("previous solution ends early".into()))?;
        let t = line
            .split_ascii_whitespace()
            .nth(2)
            .and_then(|tok| tok.parse().ok())
            .ok_or_else(|| {
                HearthError::BadElementFile(format!("bad previous solution line: {line}"))
            })?;
        tprev.push(t);
    }
    Ok(tprev)
}

impl HeatSolver {
    /// Load `<base>.feh`, the mesh files, and optionally a previous
    /// solution, then renumber the nodes for bandwidth.
    pub fn load(base: &Path, previous: Option<&Path>, delete_files: bool) -> Result<Self> {
        let problem = HeatProblem::load(base)?;
        let mut mesh = load_mesh(&problem, base, delete_files)?;
        let mut tprev = match previous {
            Some(path) => Some(load_previous(path, mesh.nodes.len())?),
            None => None,
        };
        renumber::renumber(&mut mesh, tprev.as_deref_mut());
        Ok(Self {
            problem,
            mesh,
            tprev,
            base: base.to_path_buf(),
        })
    }

    /// Assemble a solver from already-loaded parts, without renumbering.
    pub fn from_parts(
        problem: HeatProblem,
        mesh: Mesh,
        tprev: Option<Vec<f64>>,
        base: PathBuf,
    ) -> Self {
        Self {
            problem,
            mesh,
            tprev,
            base,
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Drop all loaded state, keeping only the problem path.
    pub fn clear(&mut self) {
        self.problem.clear();
        self.mesh = Mesh::default();
        self.tprev = None;
    }

    /// Assemble and solve, iterating while the problem is nonlinear.
    pub fn analyze(&mut self) -> Result<Solution> {
        let problem = &self.problem;
        let mesh = &self.mesh;
        let nn = mesh.nodes.len();
        let nc = problem.conductors.len();

        let tprev = match (&self.tprev, problem.dt != 0.0) {
            (Some(t), _) => Some(t.as_slice()),
            (None, true) => {
                return Err(HearthError::Solve(
                    "transient step requires a previous solution".into(),
                ))
            }
            (None, false) => None,
        };

        let asm = Assembly::new(problem, &mesh.nodes);
        let mut sys = SymmetricSystem::new(nn + nc, problem.precision);

        let mut nonlinear = mesh
            .elements
            .iter()
            .any(|el| !problem.materials[el.blk].table.is_empty());

        let mut iteration = 0usize;
        let mut cg_iterations = Vec::new();
        loop {
            // previous iterate; zero on the first pass
            let vo: Vec<f64> = sys.v[..nn].to_vec();
            sys.wipe();

            // prescribed nodal values: point properties with a set
            // temperature, and fixed-temperature conductor membership
            for i in 0..nn {
                sys.q[i] = Q_FREE;
            }
            for (i, node) in mesh.nodes.iter().enumerate() {
                if node.boundary_marker >= 0 {
                    let prop = &problem.point_props[node.boundary_marker as usize];
                    if prop.qp == 0.0 {
                        sys.v[i] = prop.tp;
                        sys.q[i] = Q_FIXED;
                    }
                }
                if node.in_conductor >= 0 {
                    if let Conductor::FixedTemperature { v, .. } =
                        &problem.conductors[node.in_conductor as usize]
                    {
                        sys.v[i] = *v;
                        sys.q[i] = node.in_conductor;
                    }
                }
            }

            // fixed temperatures along boundary segments
            for el in &mesh.elements {
                for j in 0..3 {
                    let k = (j + 1) % 3;
                    if el.e[j] >= 0 {
                        if let BoundaryKind::FixedTemperature { tset } =
                            problem.boundary_props[el.e[j] as usize].kind
                        {
                            sys.v[el.p[j]] = tset;
                            sys.v[el.p[k]] = tset;
                            sys.q[el.p[j]] = Q_FIXED;
                            sys.q[el.p[k]] = Q_FIXED;
                        }
                    }
                }
            }

            // element matrices
            for el in &mesh.elements {
                let (mut me, mut be, radiating) = asm.element(el, &vo, tprev);
                if radiating {
                    nonlinear = true;
                }
                let n = el.p;

                // fold prescribed nodal values out of the local system
                for j in 0..3 {
                    if sys.q[n[j]] != Q_FREE {
                        for k in 0..3 {
                            if j != k {
                                be[k] -= me[k][j] * sys.v[n[j]];
                                me[k][j] = 0.0;
                                me[j][k] = 0.0;
                            }
                        }
                        be[j] = sys.v[n[j]] * me[j][j];
                    }
                }

                // scatter; nodes of a floating conductor share its
                // global unknown past the node range
                let mut ne = n;
                for j in 0..3 {
                    let cond = mesh.nodes[n[j]].in_conductor;
                    if cond >= 0
                        && matches!(
                            problem.conductors[cond as usize],
                            Conductor::FixedFlow { .. }
                        )
                    {
                        ne[j] = nn + cond as usize;
                    }
                }
                for j in 0..3 {
                    for k in j..3 {
                        sys.put(sys.get(ne[j], ne[k]) - me[j][k], ne[j], ne[k]);
                    }
                    sys.b[ne[j]] -= be[j];
                    if ne[j] != n[j] {
                        // keep the node's own equation pinned to the
                        // conductor temperature
                        sys.put(sys.get(n[j], n[j]) - me[j][j], n[j], n[j]);
                        sys.put(sys.get(n[j], ne[j]) + me[j][j], n[j], ne[j]);
                    }
                }
            }

            // point heat flows on nodes not otherwise prescribed
            for (i, node) in mesh.nodes.iter().enumerate() {
                if node.boundary_marker >= 0 && sys.q[i] == Q_FREE {
                    let d = if asm.axisymmetric {
                        2.0 * PI * node.x
                    } else {
                        asm.depth
                    };
                    sys.b[i] += d * problem.point_props[node.boundary_marker as usize].qp;
                    sys.q[i] = Q_FIXED;
                }
                if node.in_conductor >= 0 {
                    sys.q[i] = node.in_conductor;
                }
            }

            // periodicity
            for pbc in &mesh.pbcs {
                match pbc.kind {
                    PbcKind::Periodic => sys.periodicity(pbc.a, pbc.b),
                    PbcKind::Antiperiodic => sys.anti_periodicity(pbc.a, pbc.b),
                }
            }

            // conductor equations
            for (i, cond) in problem.conductors.iter().enumerate() {
                let k = nn + i;
                match cond {
                    Conductor::FixedTemperature { v, .. } => {
                        let scale = sys.get(0, 0);
                        sys.put(scale, k, k);
                        sys.b[k] = scale * v;
                    }
                    Conductor::FixedFlow { q, .. } => {
                        let sum = sys.row_offdiagonal_sum(k);
                        if sum != 0.0 {
                            sys.put(-sum, k, k);
                            sys.b[k] = *q;
                        } else {
                            sys.put(sys.get(0, 0), k, k);
                        }
                    }
                }
            }

            let cg = sys.pcg_solve(iteration)?;
            cg_iterations.push(cg);
            iteration += 1;

            if !nonlinear {
                break;
            }
            let mut e1 = 0.0;
            let mut e2 = 0.0;
            for i in 0..nn {
                let dv = sys.v[i] - vo[i];
                e1 += dv * dv;
                e2 += vo[i] * vo[i];
            }
            if e2 != 0.0 {
                let change = (e1 / e2).sqrt();
                tracing::debug!(iteration, relative_change = change, "outer iteration");
                if change < problem.precision * 100.0 {
                    break;
                }
            }
        }

        // recover heat flow on temperature-prescribed conductors
        let mut flows = vec![0.0; nc];
        for (i, cond) in problem.conductors.iter().enumerate() {
            flows[i] = match cond {
                Conductor::FixedTemperature { .. } => self.conductor_flow(i, &mut sys),
                Conductor::FixedFlow { q, .. } => *q,
            };
        }

        Ok(Solution {
            q: sys.q[..nn].to_vec(),
            v: sys.v,
            flows,
            iterations: iteration,
            cg_iterations,
        })
    }

    /// Total heat flow out of conductor `u`: the flux integrated against
    /// the gradient of the conductor's indicator function over adjacent
    /// elements.
    pub fn conductor_flow(&self, u: usize, sys: &mut SymmetricSystem) -> f64 {
        let mesh = &self.mesh;
        let problem = &self.problem;
        let depth = problem.depth * problem.length_units.meters_per_unit();
        let axisymmetric = problem.problem_type == ProblemType::Axisymmetric;

        for (i, node) in mesh.nodes.iter().enumerate() {
            sys.p[i] = if node.in_conductor == u as i32 { 1.0 } else { 0.0 };
        }

        let mut flow = 0.0;
        for el in &mesh.elements {
            let n = el.p;
            if sys.p[n[0]] == 0.0 && sys.p[n[1]] == 0.0 && sys.p[n[2]] == 0.0 {
                continue;
            }
            let sh = triangle_shape(&mesh.nodes, n);
            let da = 2.0 * sh.a;
            let volume = if axisymmetric {
                sh.a * 2.0 * PI * sh.r
            } else {
                sh.a * depth
            };

            let material = &problem.materials[el.blk];
            let (mut vx, mut vy, mut dx, mut dy) = (0.0, 0.0, 0.0, 0.0);
            let mut kn = Complex64::new(0.0, 0.0);
            for k in 0..3 {
                vx -= sys.p[n[k]] * sh.p[k] / da;
                vy -= sys.p[n[k]] * sh.q[k] / da;
                dx -= sys.v[n[k]] * sh.p[k] / da;
                dy -= sys.v[n[k]] * sh.q[k] / da;
                kn += material.conductivity(sys.v[n[k]]) / 3.0;
            }
            flow += volume * (dx * kn.re * vx + dy * kn.im * vy);
        }
        flow
    }
}
