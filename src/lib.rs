//! Two-dimensional finite-element heat conduction solver.
//!
//! Loads a meshed planar or axisymmetric region with thermal boundary
//! conditions, material properties (optionally temperature-dependent),
//! volumetric sources and lumped conductors, assembles a symmetric
//! sparse system over the nodal temperatures, and solves it with a
//! diagonally preconditioned conjugate gradient inside a Picard loop
//! for the nonlinear cases.

pub mod error;
pub mod mesh;
pub mod output;
pub mod problem;
pub mod props;
pub mod renumber;
pub mod scan;
pub mod solver;
pub mod sparse;
pub mod stats;
pub mod units;
