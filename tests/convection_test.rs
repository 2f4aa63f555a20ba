//! Convection-cooled rod: the heat flow recovered at the hot conductor
//! equals the integrated surface convection loss.

mod common;

use approx::assert_relative_eq;
use common::*;
use hearth::props::BoundaryKind;
use hearth::solver::HeatSolver;

#[test]
fn conductor_flow_balances_convection_loss() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("rod");
    // 1 m x 0.1 m rod, hot conductor on the left, film on the right end
    Grid {
        nx: 20,
        ny: 2,
        x1: 1.0,
        y1: 0.1,
        left: edge_marker(-1, 0),
        right: edge_marker(0, -1),
        ..Default::default()
    }
    .write(&base);
    let (h, tinf) = (10.0, 20.0);
    ProblemFile {
        bdrys: vec![bdry_convection("film", h, tinf)],
        conductors: vec![conductor_fixed("hot", 100.0)],
        ..Default::default()
    }
    .write(&base);

    let mut solver = HeatSolver::load(&base, None, false).unwrap();
    let solution = solver.analyze().unwrap();

    // 1-D balance: k (100 - Tr)/L = h (Tr - Tinf)  =>  Tr = 300/11
    let t_end = solution.v[node_at(&solver.mesh, 1.0, 0.05)];
    assert_relative_eq!(t_end, 300.0 / 11.0, max_relative = 1e-6);

    // integrate the discrete convection loss over the tagged edges
    let mut loss = 0.0;
    for el in &solver.mesh.elements {
        for j in 0..3 {
            if el.e[j] < 0 {
                continue;
            }
            let prop = &solver.problem.boundary_props[el.e[j] as usize];
            if let BoundaryKind::Convection { h, tinf } = prop.kind {
                let a = &solver.mesh.nodes[el.p[j]];
                let b = &solver.mesh.nodes[el.p[(j + 1) % 3]];
                let l = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
                let t_mid = (solution.v[el.p[j]] + solution.v[el.p[(j + 1) % 3]]) / 2.0;
                loss += h * l * (t_mid - tinf);
            }
        }
    }

    assert_relative_eq!(solution.flows[0], loss, max_relative = 1e-6);
    assert_relative_eq!(
        solution.flows[0],
        0.1 * (100.0 - 300.0 / 11.0),
        max_relative = 1e-6
    );
}
