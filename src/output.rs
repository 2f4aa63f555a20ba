//! Solution file output.
//!
//! The solution file echoes the problem file verbatim and appends a
//! `[Solution]` section: nodal coordinates (converted back to the
//! problem's length unit), temperatures and row tags, the element
//! connectivity, and per-conductor temperature/heat-flow pairs.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::error::Result;
use crate::solver::{HeatSolver, Solution};

/// Write `<base>.anh` next to the problem file.
pub fn write_results(solver: &HeatSolver, solution: &Solution) -> Result<()> {
    let base = solver.base();
    let mut input = File::open(base.with_extension("feh"))?;
    let file = File::create(base.with_extension("anh"))?;
    let mut out = BufWriter::new(file);
    io::copy(&mut input, &mut out)?;
    write_solution(solver, solution, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Append the `[Solution]` section to `out`.
pub fn write_solution<W: Write>(
    solver: &HeatSolver,
    solution: &Solution,
    out: &mut W,
) -> Result<()> {
    let cf = solver.problem.length_units.meters_per_unit();
    let nn = solver.mesh.nodes.len();

    writeln!(out, "[Solution]")?;
    writeln!(out, "{nn}")?;
    for (i, node) in solver.mesh.nodes.iter().enumerate() {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            node.x / cf,
            node.y / cf,
            solution.v[i],
            solution.q[i]
        )?;
    }

    writeln!(out, "{}", solver.mesh.elements.len())?;
    for el in &solver.mesh.elements {
        writeln!(out, "{}\t{}\t{}\t{}", el.p[0], el.p[1], el.p[2], el.lbl)?;
    }

    writeln!(out, "{}", solver.problem.conductors.len())?;
    for i in 0..solver.problem.conductors.len() {
        writeln!(out, "{}\t{}", solution.v[nn + i], solution.flows[i])?;
    }
    Ok(())
}
