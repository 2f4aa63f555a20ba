//! Mesh loader for the triangulator's output files.
//!
//! Four files share the problem basename: `.node` (coordinates plus an
//! encoded point marker), `.pbc` (periodic node pairs), `.ele`
//! (triangles with a block-label attribute), and `.edge` (segments with
//! an encoded boundary marker). Coordinates are converted to meters on
//! load. When `delete_files` is set, the mesher's temporary files are
//! removed after a successful load; the missing-material error path
//! removes them as well.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{HearthError, Result};
use crate::problem::HeatProblem;
use crate::props::BoundaryKind;

/// Mesh node with decoded point-property and conductor membership.
#[derive(Debug, Clone, Copy, Default)]
pub struct Node {
    /// Coordinates in meters.
    pub x: f64,
    pub y: f64,
    /// Index into the point-property table, or -1.
    pub boundary_marker: i32,
    /// Index of the conductor the node belongs to, or -1.
    pub in_conductor: i32,
}

/// Triangle element.
#[derive(Debug, Clone, Copy)]
pub struct Element {
    pub p: [usize; 3],
    /// Block-label index.
    pub lbl: usize,
    /// Material index resolved through the label.
    pub blk: usize,
    /// Boundary-property index on the edge from local node k to k+1, or -1.
    pub e: [i32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PbcKind {
    Periodic,
    Antiperiodic,
}

/// Periodic boundary condition tying a pair of nodes.
#[derive(Debug, Clone, Copy)]
pub struct CommonPoint {
    pub a: usize,
    pub b: usize,
    pub kind: PbcKind,
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub nodes: Vec<Node>,
    pub elements: Vec<Element>,
    pub pbcs: Vec<CommonPoint>,
}

/// Pack a boundary-property index and conductor index into a mesh marker.
/// Both are -1 for "none", which encodes to 0.
pub fn encode_marker(bc: i32, cond: i32) -> i64 {
    (1 + bc) as i64 + 0x10000 * (1 + cond) as i64
}

/// Invert [`encode_marker`]. Any non-positive marker decodes to none.
pub fn decode_marker(raw: i64) -> (i32, i32) {
    if raw <= 0 {
        return (-1, -1);
    }
    let bc = (raw & 0xffff) as i32 - 1;
    let cond = (raw >> 16) as i32 - 1;
    (bc, cond)
}

/// Whitespace-token reader with a per-file error constructor.
struct FileReader<'a> {
    tokens: std::str::SplitAsciiWhitespace<'a>,
    err: fn(String) -> HearthError,
}

impl<'a> FileReader<'a> {
    fn new(text: &'a str, err: fn(String) -> HearthError) -> Self {
        Self {
            tokens: text.split_ascii_whitespace(),
            err,
        }
    }

    fn value<T: FromStr>(&mut self) -> Result<T> {
        match self.tokens.next() {
            Some(tok) => tok
                .parse()
                .map_err(|_| (self.err)(format!("bad value: {tok}"))),
            None => Err((self.err)("unexpected end of file".into())),
        }
    }
}

/// Split off the first line; its first token is the record count, the
/// rest of the line is header noise.
fn count_and_body(text: &str, err: fn(String) -> HearthError) -> Result<(usize, &str)> {
    let (first, body) = text.split_once('\n').unwrap_or((text, ""));
    let count = FileReader::new(first, err).value()?;
    Ok((count, body))
}

fn read_file(base: &Path, ext: &str, err: fn(String) -> HearthError) -> Result<String> {
    let path = base.with_extension(ext);
    fs::read_to_string(&path).map_err(|e| err(format!("{}: {e}", path.display())))
}

fn remove_mesh_files(base: &Path, include_edge: bool) {
    for ext in ["ele", "node", "pbc", "poly"] {
        let _ = fs::remove_file(base.with_extension(ext));
    }
    if include_edge {
        let _ = fs::remove_file(base.with_extension("edge"));
    }
}

/// Load the mesh files for `base`, binding elements to materials and
/// edges to boundary properties.
pub fn load_mesh(problem: &HeatProblem, base: &Path, delete_files: bool) -> Result<Mesh> {
    let scale = problem.length_units.meters_per_unit();

    // nodes
    let text = read_file(base, "node", HearthError::BadElementFile)?;
    let (num_nodes, body) = count_and_body(&text, HearthError::BadElementFile)?;
    let mut rd = FileReader::new(body, HearthError::BadElementFile);
    let mut nodes = Vec::with_capacity(num_nodes);
    for _ in 0..num_nodes {
        let _index: i64 = rd.value()?;
        let x: f64 = rd.value()?;
        let y: f64 = rd.value()?;
        let raw: i64 = rd.value()?;
        let (bc, cond) = decode_marker(raw);
        if bc >= problem.point_props.len() as i32 {
            return Err(HearthError::BadElementFile(format!(
                "node point-property index {bc} out of range"
            )));
        }
        if cond >= problem.conductors.len() as i32 {
            return Err(HearthError::BadElementFile(format!(
                "node conductor index {cond} out of range"
            )));
        }
        nodes.push(Node {
            x: x * scale,
            y: y * scale,
            boundary_marker: bc,
            in_conductor: cond,
        });
    }

    // periodic boundary conditions
    let text = read_file(base, "pbc", HearthError::BadPbcFile)?;
    let (num_pbcs, body) = count_and_body(&text, HearthError::BadPbcFile)?;
    let mut rd = FileReader::new(body, HearthError::BadPbcFile);
    let mut pbcs = Vec::with_capacity(num_pbcs);
    for _ in 0..num_pbcs {
        let _index: i64 = rd.value()?;
        let a: usize = rd.value()?;
        let b: usize = rd.value()?;
        let t: i32 = rd.value()?;
        if a >= num_nodes || b >= num_nodes {
            return Err(HearthError::BadPbcFile(format!(
                "node pair ({a}, {b}) out of range"
            )));
        }
        let kind = match t {
            0 => PbcKind::Periodic,
            1 => PbcKind::Antiperiodic,
            other => {
                return Err(HearthError::BadPbcFile(format!(
                    "unknown periodicity type {other}"
                )))
            }
        };
        pbcs.push(CommonPoint { a, b, kind });
    }

    // elements
    let text = read_file(base, "ele", HearthError::BadElementFile)?;
    let (num_els, body) = count_and_body(&text, HearthError::BadElementFile)?;
    let mut rd = FileReader::new(body, HearthError::BadElementFile);
    let default_label = problem.labels.iter().position(|l| l.is_default);
    let mut elements = Vec::with_capacity(num_els);
    for _ in 0..num_els {
        let _index: i64 = rd.value()?;
        let mut p = [0usize; 3];
        for node in &mut p {
            *node = rd.value()?;
            if *node >= num_nodes {
                return Err(HearthError::BadElementFile(format!(
                    "element node {node} out of range"
                )));
            }
        }
        let attr: i64 = rd.value()?;
        let lbl = if attr >= 1 {
            Some(attr as usize - 1)
        } else {
            default_label
        };
        let material = lbl
            .and_then(|l| problem.labels.get(l))
            .and_then(|label| usize::try_from(label.block_type).ok())
            .filter(|&blk| blk < problem.materials.len());
        let (lbl, blk) = match (lbl, material) {
            (Some(lbl), Some(blk)) => (lbl, blk),
            _ => {
                if delete_files {
                    remove_mesh_files(base, true);
                }
                return Err(HearthError::MissingMaterialProps);
            }
        };
        elements.push(Element {
            p,
            lbl,
            blk,
            e: [-1; 3],
        });
    }

    // node -> element adjacency, two passes
    let mut offsets = vec![0usize; num_nodes + 1];
    for el in &elements {
        for &p in &el.p {
            offsets[p + 1] += 1;
        }
    }
    for i in 1..=num_nodes {
        offsets[i] += offsets[i - 1];
    }
    let mut members = vec![0usize; 3 * num_els];
    let mut fill = offsets.clone();
    for (i, el) in elements.iter().enumerate() {
        for &p in &el.p {
            members[fill[p]] = i;
            fill[p] += 1;
        }
    }

    // edges carrying boundary conditions
    let text = read_file(base, "edge", HearthError::BadEdgeFile)?;
    let mut rd = FileReader::new(&text, HearthError::BadEdgeFile);
    let num_edges: usize = rd.value()?;
    let _marker_flag: i64 = rd.value()?;
    for _ in 0..num_edges {
        let _index: i64 = rd.value()?;
        let n0: usize = rd.value()?;
        let n1: usize = rd.value()?;
        let raw: i64 = rd.value()?;
        if n0 >= num_nodes || n1 >= num_nodes {
            return Err(HearthError::BadEdgeFile(format!(
                "edge ({n0}, {n1}) out of range"
            )));
        }
        // meaningful edge markers are written negated
        let (bc, cond) = if raw < 0 { decode_marker(-raw) } else { (-1, -1) };
        if cond >= 0 {
            if cond >= problem.conductors.len() as i32 {
                return Err(HearthError::BadEdgeFile(format!(
                    "edge conductor index {cond} out of range"
                )));
            }
            nodes[n0].in_conductor = cond;
            nodes[n1].in_conductor = cond;
        }
        if bc < 0 {
            continue;
        }
        let prop = problem.boundary_props.get(bc as usize).ok_or_else(|| {
            HearthError::BadEdgeFile(format!("edge boundary index {bc} out of range"))
        })?;
        // convection is applied to at most one element per edge
        let single = matches!(prop.kind, BoundaryKind::Convection { .. });
        for &ei in &members[offsets[n0]..offsets[n0 + 1]] {
            let el = &mut elements[ei];
            let mut hit = false;
            for local in 0..3 {
                let a = el.p[local];
                let b = el.p[(local + 1) % 3];
                if (a == n0 && b == n1) || (a == n1 && b == n0) {
                    el.e[local] = bc;
                    hit = true;
                }
            }
            if single && hit {
                break;
            }
        }
    }

    if delete_files {
        remove_mesh_files(base, false);
    }

    Ok(Mesh {
        nodes,
        elements,
        pbcs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props::{BlockLabel, BoundaryProp, Conductor, MaterialProp};

    #[test]
    fn marker_codec_round_trips() {
        assert_eq!(encode_marker(-1, -1), 0);
        assert_eq!(decode_marker(0), (-1, -1));
        let edge_cases = [-1, 0, 1, 2, 255, 0xFFFF - 2];
        for &bc in &edge_cases {
            for &cond in &edge_cases {
                assert_eq!(decode_marker(encode_marker(bc, cond)), (bc, cond));
            }
        }
    }

    fn square_problem() -> HeatProblem {
        HeatProblem {
            length_units: crate::units::LengthUnit::Meters,
            boundary_props: vec![
                BoundaryProp {
                    name: "fixed".into(),
                    kind: BoundaryKind::FixedTemperature { tset: 10.0 },
                },
                BoundaryProp {
                    name: "film".into(),
                    kind: BoundaryKind::Convection { h: 5.0, tinf: 0.0 },
                },
            ],
            materials: vec![MaterialProp {
                kx: 1.0,
                ky: 1.0,
                ..Default::default()
            }],
            conductors: vec![Conductor::FixedTemperature {
                name: "pad".into(),
                v: 20.0,
            }],
            labels: vec![BlockLabel {
                block_type: 0,
                is_default: true,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    /// Unit square split into two triangles along the diagonal 0-2.
    fn write_square(dir: &std::path::Path, edge_marker: i64) -> std::path::PathBuf {
        let base = dir.join("case");
        std::fs::write(
            base.with_extension("node"),
            "4 2 0 1\n0 0 0 0\n1 1 0 0\n2 1 1 0\n3 0 1 0\n",
        )
        .unwrap();
        std::fs::write(base.with_extension("pbc"), "0\n").unwrap();
        std::fs::write(
            base.with_extension("ele"),
            "2 3 0\n0 0 1 2 0\n1 0 2 3 0\n",
        )
        .unwrap();
        std::fs::write(
            base.with_extension("edge"),
            format!("1 1\n0 0 2 {edge_marker}\n"),
        )
        .unwrap();
        base
    }

    #[test]
    fn interior_fixed_edge_tags_both_elements() {
        let dir = tempfile::tempdir().unwrap();
        // boundary prop 0 (fixed), no conductor
        let base = write_square(dir.path(), -encode_marker(0, -1));
        let mesh = load_mesh(&square_problem(), &base, false).unwrap();
        // edge 0-2 is local edge 2 of element 0 and local edge 0 of element 1
        assert_eq!(mesh.elements[0].e, [-1, -1, 0]);
        assert_eq!(mesh.elements[1].e, [0, -1, -1]);
    }

    #[test]
    fn convection_edge_tags_one_element() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_square(dir.path(), -encode_marker(1, -1));
        let mesh = load_mesh(&square_problem(), &base, false).unwrap();
        let tagged: usize = mesh
            .elements
            .iter()
            .map(|el| el.e.iter().filter(|&&e| e >= 0).count())
            .sum();
        assert_eq!(tagged, 1);
    }

    #[test]
    fn edge_conductor_propagates_to_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_square(dir.path(), -encode_marker(0, 0));
        let mesh = load_mesh(&square_problem(), &base, false).unwrap();
        assert_eq!(mesh.nodes[0].in_conductor, 0);
        assert_eq!(mesh.nodes[2].in_conductor, 0);
        assert_eq!(mesh.nodes[1].in_conductor, -1);
    }

    #[test]
    fn missing_default_label_is_fatal_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_square(dir.path(), 0);
        let mut problem = square_problem();
        problem.labels[0].is_default = false;
        let err = load_mesh(&problem, &base, true).unwrap_err();
        assert!(matches!(err, HearthError::MissingMaterialProps));
        assert!(!base.with_extension("node").exists());
        assert!(!base.with_extension("edge").exists());
    }

    #[test]
    fn delete_files_keeps_edge_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_square(dir.path(), 0);
        load_mesh(&square_problem(), &base, true).unwrap();
        assert!(!base.with_extension("node").exists());
        assert!(base.with_extension("edge").exists());
    }

    #[test]
    fn coordinates_scale_to_meters() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_square(dir.path(), 0);
        let mut problem = square_problem();
        problem.length_units = crate::units::LengthUnit::Millimeters;
        let mesh = load_mesh(&problem, &base, false).unwrap();
        assert_eq!(mesh.nodes[2].x, 0.001);
        assert_eq!(mesh.nodes[2].y, 0.001);
    }
}
