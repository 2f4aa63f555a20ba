//! Problem-file (.feh) loader.
//!
//! The file is a sequence of bracketed scalar assignments and repeated
//! record blocks. The loader drives the token scanner, populates the
//! typed property tables, and hands any unrecognized token to the
//! [`TokenHandler`] hook; the heat solver consumes `[dt]` there. An
//! unhandled token aborts the load.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{HearthError, Result};
use crate::props::{BlockLabel, BoundaryProp, Conductor, MaterialProp, PointProp};
use crate::scan::Scanner;
use crate::units::LengthUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProblemType {
    #[default]
    Planar,
    Axisymmetric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinateSystem {
    #[default]
    Cartesian,
    Polar,
}

/// Hook for solver-specific tokens the shared loader does not know.
///
/// Return true if the token was consumed (including its value).
pub trait TokenHandler {
    fn handle_token(&mut self, token: &str, sc: &mut Scanner<'_>) -> bool;
}

/// A loaded heat-conduction problem: global scalars plus the property
/// tables the assembler indexes into.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatProblem {
    pub file_format: f64,
    pub precision: f64,
    pub min_angle: f64,
    /// Out-of-plane depth for planar problems, in problem length units.
    pub depth: f64,
    pub length_units: LengthUnit,
    pub coords: CoordinateSystem,
    pub problem_type: ProblemType,
    /// Center and radii of the axisymmetric external region, in problem
    /// length units.
    pub ext_zo: f64,
    pub ext_ro: f64,
    pub ext_ri: f64,
    pub comment: String,
    pub ac_solver: i32,
    pub force_max_mesh: bool,
    /// Implicit-Euler time step; 0 selects the steady problem.
    pub dt: f64,
    pub point_props: Vec<PointProp>,
    pub boundary_props: Vec<BoundaryProp>,
    pub materials: Vec<MaterialProp>,
    pub conductors: Vec<Conductor>,
    pub labels: Vec<BlockLabel>,
}

impl Default for HeatProblem {
    fn default() -> Self {
        Self {
            file_format: -1.0,
            precision: 1.0e-8,
            min_angle: 0.0,
            depth: -1.0,
            length_units: LengthUnit::Inches,
            coords: CoordinateSystem::Cartesian,
            problem_type: ProblemType::Planar,
            ext_zo: 0.0,
            ext_ro: 0.0,
            ext_ri: 0.0,
            comment: String::new(),
            ac_solver: 0,
            force_max_mesh: false,
            dt: 0.0,
            point_props: Vec::new(),
            boundary_props: Vec::new(),
            materials: Vec::new(),
            conductors: Vec::new(),
            labels: Vec::new(),
        }
    }
}

impl TokenHandler for HeatProblem {
    fn handle_token(&mut self, token: &str, sc: &mut Scanner<'_>) -> bool {
        if token == "[dt]" {
            sc.expect_char('=');
            if let Some(dt) = sc.parse_value() {
                self.dt = dt;
            }
            return true;
        }
        false
    }
}

/// Read `<dst> = value`, reporting failure through the scanner.
fn scalar<T: FromStr>(sc: &mut Scanner<'_>, dst: &mut T) -> bool {
    let ok = sc.expect_char('=');
    match sc.parse_value() {
        Some(v) => {
            *dst = v;
            ok
        }
        None => false,
    }
}

/// Read a record list: `= count` followed by count records.
fn record_list<T>(
    sc: &mut Scanner<'_>,
    what: &str,
    dst: &mut Vec<T>,
    read: fn(&mut Scanner<'_>) -> Option<T>,
) -> Result<()> {
    if !sc.expect_char('=') {
        return Err(HearthError::Parse(format!(
            "missing '=' after {what} count: {}",
            sc.diagnostics()
        )));
    }
    let count: usize = sc
        .parse_value()
        .ok_or_else(|| HearthError::Parse(format!("bad {what} count")))?;
    dst.reserve(count);
    while dst.len() < count {
        match read(sc) {
            Some(record) => dst.push(record),
            None => break,
        }
    }
    if dst.len() != count {
        return Err(HearthError::Parse(format!(
            "expected {count} {what}, got {}: {}",
            dst.len(),
            sc.diagnostics()
        )));
    }
    Ok(())
}

impl HeatProblem {
    /// Load `<base>.feh`.
    pub fn load(base: &Path) -> Result<Self> {
        let path = base.with_extension("feh");
        let text = fs::read_to_string(&path)
            .map_err(|e| HearthError::Parse(format!("couldn't read {}: {e}", path.display())))?;
        Self::parse(&text)
    }

    /// Parse a problem from its full text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut problem = HeatProblem::default();
        let mut sc = Scanner::new(text);
        problem.load_from(&mut sc)?;
        if !sc.diagnostics().is_empty() {
            tracing::warn!("problem file anomalies:\n{}", sc.diagnostics());
        }
        Ok(problem)
    }

    /// Restore every field to its load-time default.
    pub fn clear(&mut self) {
        *self = HeatProblem::default();
    }

    fn load_from(&mut self, sc: &mut Scanner<'_>) -> Result<()> {
        let mut success = true;
        while let Some(token) = sc.next_token() {
            match token.as_str() {
                "[format]" => success &= scalar(sc, &mut self.file_format),
                "[precision]" => success &= scalar(sc, &mut self.precision),
                "[minangle]" => success &= scalar(sc, &mut self.min_angle),
                "[depth]" => success &= scalar(sc, &mut self.depth),
                "[extzo]" => success &= scalar(sc, &mut self.ext_zo),
                "[extro]" => success &= scalar(sc, &mut self.ext_ro),
                "[extri]" => success &= scalar(sc, &mut self.ext_ri),
                "[acsolver]" => success &= scalar(sc, &mut self.ac_solver),
                "[lengthunits]" => {
                    success &= sc.expect_char('=');
                    if let Some(word) = sc.next_token() {
                        if let Some(unit) = LengthUnit::from_keyword(&word) {
                            self.length_units = unit;
                        }
                    }
                }
                "[coordinates]" => {
                    success &= sc.expect_char('=');
                    match sc.next_token().as_deref() {
                        Some("cartesian") => self.coords = CoordinateSystem::Cartesian,
                        Some("polar") => self.coords = CoordinateSystem::Polar,
                        _ => {}
                    }
                }
                "[problemtype]" => {
                    success &= sc.expect_char('=');
                    match sc.next_token().as_deref() {
                        Some("planar") => self.problem_type = ProblemType::Planar,
                        Some("axisymmetric") => self.problem_type = ProblemType::Axisymmetric,
                        _ => {}
                    }
                }
                "[comment]" => {
                    success &= sc.expect_char('=');
                    if let Some(comment) = sc.parse_string() {
                        self.comment = comment;
                    }
                }
                "[forcemaxmesh]" => {
                    let mut flag = 0i32;
                    success &= scalar(sc, &mut flag);
                    self.force_max_mesh = flag != 0;
                }
                "[pointprops]" => {
                    record_list(sc, "point properties", &mut self.point_props, PointProp::from_scan)?
                }
                "[bdryprops]" => record_list(
                    sc,
                    "boundary properties",
                    &mut self.boundary_props,
                    BoundaryProp::from_scan,
                )?,
                "[blockprops]" => {
                    record_list(sc, "materials", &mut self.materials, MaterialProp::from_scan)?
                }
                "[circuitprops]" | "[conductorprops]" => {
                    record_list(sc, "conductors", &mut self.conductors, Conductor::from_scan)?
                }
                "[numblocklabels]" => {
                    record_list(sc, "block labels", &mut self.labels, BlockLabel::from_scan)?
                }
                // geometry sections the solver has no use for
                "[numpoints]" | "[numsegments]" | "[numarcsegments]" | "[numholes]" => {
                    success &= sc.expect_char('=');
                    let count: usize = sc.parse_value().unwrap_or_else(|| {
                        success = false;
                        0
                    });
                    sc.skip_line();
                    for _ in 0..count {
                        sc.skip_line();
                    }
                }
                other => {
                    if !self.handle_token(other, sc) {
                        return Err(HearthError::Parse(format!(
                            "unknown token: {other}\n{}",
                            sc.diagnostics()
                        )));
                    }
                }
            }
            if !success {
                return Err(HearthError::Parse(format!(
                    "parse error near token {token}:\n{}",
                    sc.diagnostics()
                )));
            }
        }
        Ok(())
    }
}
