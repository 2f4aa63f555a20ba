#![allow(dead_code)]
//! Shared fixtures: structured rectangle meshes and problem files
//! written into a scratch directory.

use std::fmt::Write as _;
use std::fs;
use std::ops::Range;
use std::path::Path;

use hearth::mesh::{encode_marker, Mesh};

/// Edge-file marker for a boundary-property index and/or conductor
/// index. Meaningful edge markers are stored negated.
pub fn edge_marker(bc: i32, cond: i32) -> i64 {
    -encode_marker(bc, cond)
}

/// Structured rectangle mesh: `nx` by `ny` cells, each split into two
/// triangles. Sides can carry edge markers; the left/right columns can
/// be tied through the `.pbc` file or physically merged into a cylinder.
pub struct Grid {
    pub nx: usize,
    pub ny: usize,
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    /// Edge markers per side (already negated); 0 means none.
    pub left: i64,
    pub right: i64,
    pub bottom: i64,
    pub top: i64,
    /// Restrict the bottom marker to a cell range.
    pub bottom_cells: Option<Range<usize>>,
    /// Merge the right node column onto the left (cylinder topology).
    pub merge_lr: bool,
    /// Tie the left and right node columns with periodic PBC entries.
    pub pbc_lr: bool,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            nx: 8,
            ny: 8,
            x0: 0.0,
            y0: 0.0,
            x1: 1.0,
            y1: 1.0,
            left: 0,
            right: 0,
            bottom: 0,
            top: 0,
            bottom_cells: None,
            merge_lr: false,
            pbc_lr: false,
        }
    }
}

impl Grid {
    fn cols(&self) -> usize {
        if self.merge_lr {
            self.nx
        } else {
            self.nx + 1
        }
    }

    /// Node index in mesh-file order; under `merge_lr` column `nx` wraps
    /// back onto column 0.
    pub fn node(&self, i: usize, j: usize) -> usize {
        let i = if self.merge_lr && i == self.nx { 0 } else { i };
        j * self.cols() + i
    }

    pub fn write(&self, base: &Path) {
        let dx = (self.x1 - self.x0) / self.nx as f64;
        let dy = (self.y1 - self.y0) / self.ny as f64;

        let mut node = format!("{} 2 0 1\n", self.cols() * (self.ny + 1));
        let mut idx = 0;
        for j in 0..=self.ny {
            for i in 0..self.cols() {
                let x = self.x0 + i as f64 * dx;
                let y = self.y0 + j as f64 * dy;
                let _ = writeln!(node, "{idx} {x} {y} 0");
                idx += 1;
            }
        }
        fs::write(base.with_extension("node"), node).unwrap();

        let mut ele = format!("{} 3 0\n", 2 * self.nx * self.ny);
        let mut idx = 0;
        for j in 0..self.ny {
            for i in 0..self.nx {
                let n00 = self.node(i, j);
                let n10 = self.node(i + 1, j);
                let n11 = self.node(i + 1, j + 1);
                let n01 = self.node(i, j + 1);
                let _ = writeln!(ele, "{idx} {n00} {n10} {n11} 0");
                idx += 1;
                let _ = writeln!(ele, "{idx} {n00} {n11} {n01} 0");
                idx += 1;
            }
        }
        fs::write(base.with_extension("ele"), ele).unwrap();

        let mut edges: Vec<(usize, usize, i64)> = Vec::new();
        if self.left != 0 {
            for j in 0..self.ny {
                edges.push((self.node(0, j), self.node(0, j + 1), self.left));
            }
        }
        if self.right != 0 {
            for j in 0..self.ny {
                edges.push((self.node(self.nx, j), self.node(self.nx, j + 1), self.right));
            }
        }
        if self.bottom != 0 {
            let cells = self.bottom_cells.clone().unwrap_or(0..self.nx);
            for i in cells {
                edges.push((self.node(i, 0), self.node(i + 1, 0), self.bottom));
            }
        }
        if self.top != 0 {
            for i in 0..self.nx {
                edges.push((self.node(i, self.ny), self.node(i + 1, self.ny), self.top));
            }
        }
        let mut edge = format!("{} 1\n", edges.len());
        for (idx, (n0, n1, marker)) in edges.iter().enumerate() {
            let _ = writeln!(edge, "{idx} {n0} {n1} {marker}");
        }
        fs::write(base.with_extension("edge"), edge).unwrap();

        let mut pbc = String::new();
        if self.pbc_lr {
            let _ = writeln!(pbc, "{}", self.ny + 1);
            for j in 0..=self.ny {
                let _ = writeln!(pbc, "{j} {} {} 0", self.node(0, j), self.node(self.nx, j));
            }
        } else {
            pbc.push_str("0\n");
        }
        fs::write(base.with_extension("pbc"), pbc).unwrap();
    }
}

pub fn bdry_fixed(name: &str, tset: f64) -> String {
    format!(
        "<BeginBdry>\n<BdryType> = 0\n<Tset> = {tset}\n<qs> = 0\n<beta> = 0\n<h> = 0\n\
         <Tinf> = 0\n<BdryName> = \"{name}\"\n<EndBdry>\n"
    )
}

pub fn bdry_convection(name: &str, h: f64, tinf: f64) -> String {
    format!(
        "<BeginBdry>\n<BdryType> = 2\n<Tset> = 0\n<qs> = 0\n<beta> = 0\n<h> = {h}\n\
         <Tinf> = {tinf}\n<BdryName> = \"{name}\"\n<EndBdry>\n"
    )
}

pub fn bdry_radiation(name: &str, beta: f64, tinf: f64) -> String {
    format!(
        "<BeginBdry>\n<BdryType> = 3\n<Tset> = 0\n<qs> = 0\n<beta> = {beta}\n<h> = 0\n\
         <Tinf> = {tinf}\n<BdryName> = \"{name}\"\n<EndBdry>\n"
    )
}

pub fn conductor_fixed(name: &str, v: f64) -> String {
    format!(
        "<BeginConductor>\n<Tc> = {v}\n<qc> = 0\n<CircType> = 1\n\
         <CircName> = \"{name}\"\n<EndConductor>\n"
    )
}

pub fn conductor_flow(name: &str, q: f64) -> String {
    format!(
        "<BeginConductor>\n<Tc> = 0\n<qc> = {q}\n<CircType> = 0\n\
         <CircName> = \"{name}\"\n<EndConductor>\n"
    )
}

pub fn material(kx: f64, ky: f64, kt: f64, qv: f64) -> String {
    format!(
        "<BeginBlock>\n<Kx> = {kx}\n<Ky> = {ky}\n<Kt> = {kt}\n<qv> = {qv}\n\
         <TKPoints> = 0\n<EndBlock>\n"
    )
}

/// Problem-file contents; a single default block label covers the mesh.
pub struct ProblemFile {
    pub precision: f64,
    pub problem_type: &'static str,
    pub depth: f64,
    pub dt: Option<f64>,
    pub bdrys: Vec<String>,
    pub conductors: Vec<String>,
    pub materials: Vec<String>,
}

impl Default for ProblemFile {
    fn default() -> Self {
        Self {
            precision: 1e-11,
            problem_type: "planar",
            depth: 1.0,
            dt: None,
            bdrys: Vec::new(),
            conductors: Vec::new(),
            materials: vec![material(1.0, 1.0, 0.0, 0.0)],
        }
    }
}

impl ProblemFile {
    pub fn write(&self, base: &Path) {
        let mut text = String::new();
        let _ = writeln!(text, "[Format] = 1");
        let _ = writeln!(text, "[Precision] = {}", self.precision);
        let _ = writeln!(text, "[LengthUnits] = meters");
        let _ = writeln!(text, "[ProblemType] = {}", self.problem_type);
        let _ = writeln!(text, "[Coordinates] = cartesian");
        let _ = writeln!(text, "[Depth] = {}", self.depth);
        if let Some(dt) = self.dt {
            let _ = writeln!(text, "[dt] = {dt}");
        }
        let _ = writeln!(text, "[BdryProps] = {}", self.bdrys.len());
        for b in &self.bdrys {
            text.push_str(b);
        }
        let _ = writeln!(text, "[BlockProps] = {}", self.materials.len());
        for m in &self.materials {
            text.push_str(m);
        }
        let _ = writeln!(text, "[ConductorProps] = {}", self.conductors.len());
        for c in &self.conductors {
            text.push_str(c);
        }
        let _ = writeln!(text, "[NumBlockLabels] = 1");
        let _ = writeln!(text, "0.5\t0.5\t1\t0\t0\t2");
        fs::write(base.with_extension("feh"), text).unwrap();
    }
}

/// Find the mesh node at `(x, y)`; node order changes with renumbering.
pub fn node_at(mesh: &Mesh, x: f64, y: f64) -> usize {
    mesh.nodes
        .iter()
        .position(|n| (n.x - x).abs() < 1e-9 && (n.y - y).abs() < 1e-9)
        .unwrap_or_else(|| panic!("no node at ({x}, {y})"))
}
