//! Typed property records from the problem file.
//!
//! Each record type parses its own `<begin...>`/`<end...>` block off the
//! scanner and can write itself back in the same syntax, so a written
//! record re-reads to an identical value.

use std::io::{self, Write};

use num_complex::Complex64;

use crate::scan::Scanner;

/// Nodal property: a prescribed temperature or a point heat-flow density.
///
/// The two are mutually exclusive: `qp == 0` means the node temperature
/// is fixed at `tp`, otherwise `qp` is a point source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointProp {
    pub name: String,
    pub tp: f64,
    pub qp: f64,
}

impl PointProp {
    pub fn from_scan(sc: &mut Scanner<'_>) -> Option<Self> {
        if !sc.expect_token("<beginpoint>") {
            return None;
        }
        let mut prop = PointProp::default();
        loop {
            let tok = sc.next_token()?;
            match tok.as_str() {
                "<endpoint>" => break,
                "<t_p>" => {
                    sc.expect_char('=');
                    prop.tp = sc.parse_value()?;
                }
                "<q_p>" => {
                    sc.expect_char('=');
                    prop.qp = sc.parse_value()?;
                }
                "<pointname>" => {
                    sc.expect_char('=');
                    prop.name = sc.parse_string()?;
                }
                other => sc.note(&format!("PointProp: unexpected token: {other}")),
            }
        }
        Some(prop)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "<BeginPoint>")?;
        writeln!(w, "<T_p> = {}", self.tp)?;
        writeln!(w, "<q_p> = {}", self.qp)?;
        writeln!(w, "<PointName> = \"{}\"", self.name)?;
        writeln!(w, "<EndPoint>")
    }
}

/// Boundary condition applied along mesh edges, tagged by `BdryType`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryKind {
    /// Format 0: prescribed temperature.
    FixedTemperature { tset: f64 },
    /// Format 1: prescribed surface heat flux.
    HeatFlux { qs: f64 },
    /// Format 2: convection with film coefficient `h` and ambient `tinf`.
    Convection { h: f64, tinf: f64 },
    /// Format 3: radiation with emissivity `beta` and ambient `tinf`.
    Radiation { beta: f64, tinf: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryProp {
    pub name: String,
    pub kind: BoundaryKind,
}

impl BoundaryProp {
    pub fn from_scan(sc: &mut Scanner<'_>) -> Option<Self> {
        if !sc.expect_token("<beginbdry>") {
            return None;
        }
        let mut name = String::new();
        let (mut format, mut tset, mut qs, mut beta, mut h, mut tinf) =
            (0i32, 0.0, 0.0, 0.0, 0.0, 0.0);
        loop {
            let tok = sc.next_token()?;
            match tok.as_str() {
                "<endbdry>" => break,
                "<bdrytype>" => {
                    sc.expect_char('=');
                    format = sc.parse_value()?;
                }
                "<tset>" => {
                    sc.expect_char('=');
                    tset = sc.parse_value()?;
                }
                "<qs>" => {
                    sc.expect_char('=');
                    qs = sc.parse_value()?;
                }
                "<beta>" => {
                    sc.expect_char('=');
                    beta = sc.parse_value()?;
                }
                "<h>" => {
                    sc.expect_char('=');
                    h = sc.parse_value()?;
                }
                "<tinf>" => {
                    sc.expect_char('=');
                    tinf = sc.parse_value()?;
                }
                "<bdryname>" => {
                    sc.expect_char('=');
                    name = sc.parse_string()?;
                }
                other => sc.note(&format!("BoundaryProp: unexpected token: {other}")),
            }
        }
        let kind = match format {
            0 => BoundaryKind::FixedTemperature { tset },
            1 => BoundaryKind::HeatFlux { qs },
            2 => BoundaryKind::Convection { h, tinf },
            3 => BoundaryKind::Radiation { beta, tinf },
            other => {
                sc.note(&format!("BoundaryProp: unknown boundary type {other}"));
                BoundaryKind::FixedTemperature { tset }
            }
        };
        Some(BoundaryProp { name, kind })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let (format, tset, qs, beta, h, tinf) = match self.kind {
            BoundaryKind::FixedTemperature { tset } => (0, tset, 0.0, 0.0, 0.0, 0.0),
            BoundaryKind::HeatFlux { qs } => (1, 0.0, qs, 0.0, 0.0, 0.0),
            BoundaryKind::Convection { h, tinf } => (2, 0.0, 0.0, 0.0, h, tinf),
            BoundaryKind::Radiation { beta, tinf } => (3, 0.0, 0.0, beta, 0.0, tinf),
        };
        writeln!(w, "<BeginBdry>")?;
        writeln!(w, "<BdryType> = {format}")?;
        writeln!(w, "<Tset> = {tset}")?;
        writeln!(w, "<qs> = {qs}")?;
        writeln!(w, "<beta> = {beta}")?;
        writeln!(w, "<h> = {h}")?;
        writeln!(w, "<Tinf> = {tinf}")?;
        writeln!(w, "<BdryName> = \"{}\"", self.name)?;
        writeln!(w, "<EndBdry>")
    }
}

/// Material assigned to a region: orthotropic conductivity, volumetric
/// heat source, heat capacity, and an optional `(T, k)` lookup table.
///
/// A non-empty table makes the material temperature-dependent and the
/// problem nonlinear.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterialProp {
    pub kx: f64,
    pub ky: f64,
    pub kt: f64,
    pub qv: f64,
    pub table: Vec<(f64, f64)>,
}

impl MaterialProp {
    /// Thermal conductivity at temperature `t`.
    ///
    /// Kx is returned as the real part, Ky as the imaginary part. With a
    /// lookup table the scalar interpolant is broadcast to both axes and
    /// saturates outside the tabulated range.
    pub fn conductivity(&self, t: f64) -> Complex64 {
        let n = self.table.len();
        if n == 0 {
            return Complex64::new(self.kx, self.ky);
        }
        if n == 1 {
            let k = self.table[0].1;
            return Complex64::new(k, k);
        }
        if t <= self.table[0].0 {
            let k = self.table[0].1;
            return Complex64::new(k, k);
        }
        if t >= self.table[n - 1].0 {
            let k = self.table[n - 1].1;
            return Complex64::new(k, k);
        }
        for pair in self.table.windows(2) {
            let (t0, k0) = pair[0];
            let (t1, k1) = pair[1];
            if t >= t0 && t <= t1 {
                let k = k0 + (k1 - k0) * (t - t0) / (t1 - t0);
                return Complex64::new(k, k);
            }
        }
        // unordered table; fall back to the constant values
        Complex64::new(self.kx, self.ky)
    }

    pub fn from_scan(sc: &mut Scanner<'_>) -> Option<Self> {
        if !sc.expect_token("<beginblock>") {
            return None;
        }
        let mut prop = MaterialProp::default();
        loop {
            let tok = sc.next_token()?;
            match tok.as_str() {
                "<endblock>" => break,
                "<kx>" => {
                    sc.expect_char('=');
                    prop.kx = sc.parse_value()?;
                }
                "<ky>" => {
                    sc.expect_char('=');
                    prop.ky = sc.parse_value()?;
                }
                "<kt>" => {
                    sc.expect_char('=');
                    prop.kt = sc.parse_value()?;
                }
                "<qv>" => {
                    sc.expect_char('=');
                    prop.qv = sc.parse_value()?;
                }
                "<tkpoints>" => {
                    sc.expect_char('=');
                    let npts: usize = sc.parse_value()?;
                    prop.table.reserve(npts);
                    for _ in 0..npts {
                        let t: f64 = sc.parse_value()?;
                        let k: f64 = sc.parse_value()?;
                        prop.table.push((t, k));
                    }
                }
                other => sc.note(&format!("MaterialProp: unexpected token: {other}")),
            }
        }
        Some(prop)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "<BeginBlock>")?;
        writeln!(w, "<Kx> = {}", self.kx)?;
        writeln!(w, "<Ky> = {}", self.ky)?;
        writeln!(w, "<Kt> = {}", self.kt)?;
        writeln!(w, "<qv> = {}", self.qv)?;
        writeln!(w, "<TKPoints> = {}", self.table.len())?;
        for (t, k) in &self.table {
            writeln!(w, "{t}\t{k}")?;
        }
        writeln!(w, "<EndBlock>")
    }
}

/// Lumped conductor region, tagged by `CircType`.
///
/// A fixed-flow conductor floats in temperature and adds one unknown to
/// the linear system; a fixed-temperature conductor pins its nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Conductor {
    /// CircType 0: prescribed total heat flow `q`.
    FixedFlow { name: String, q: f64 },
    /// CircType 1: prescribed temperature `v`.
    FixedTemperature { name: String, v: f64 },
}

impl Conductor {
    pub fn from_scan(sc: &mut Scanner<'_>) -> Option<Self> {
        if !sc.expect_token("<beginconductor>") {
            return None;
        }
        let mut name = String::new();
        let (mut circ_type, mut tc, mut qc) = (0i32, 0.0, 0.0);
        loop {
            let tok = sc.next_token()?;
            match tok.as_str() {
                "<endconductor>" => break,
                "<tc>" => {
                    sc.expect_char('=');
                    tc = sc.parse_value()?;
                }
                "<qc>" => {
                    sc.expect_char('=');
                    qc = sc.parse_value()?;
                }
                "<circtype>" => {
                    sc.expect_char('=');
                    circ_type = sc.parse_value()?;
                }
                "<circname>" => {
                    sc.expect_char('=');
                    name = sc.parse_string()?;
                }
                other => sc.note(&format!("Conductor: unexpected token: {other}")),
            }
        }
        match circ_type {
            1 => Some(Conductor::FixedTemperature { name, v: tc }),
            0 => Some(Conductor::FixedFlow { name, q: qc }),
            other => {
                sc.note(&format!("Conductor: unknown conductor type {other}"));
                Some(Conductor::FixedFlow { name, q: qc })
            }
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let (name, circ_type, tc, qc) = match self {
            Conductor::FixedFlow { name, q } => (name, 0, 0.0, *q),
            Conductor::FixedTemperature { name, v } => (name, 1, *v, 0.0),
        };
        writeln!(w, "<BeginConductor>")?;
        writeln!(w, "<Tc> = {tc}")?;
        writeln!(w, "<qc> = {qc}")?;
        writeln!(w, "<CircType> = {circ_type}")?;
        writeln!(w, "<CircName> = \"{name}\"")?;
        writeln!(w, "<EndConductor>")
    }
}

/// Regional attribute marker: position, material index, and the
/// default/external flags.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockLabel {
    pub x: f64,
    pub y: f64,
    /// Index into the material table; -1 once decremented means "none".
    pub block_type: i32,
    pub max_area: f64,
    pub group: i32,
    /// Element lies in the conformally mapped external region.
    pub is_external: bool,
    /// Fallback label for elements without an explicit one.
    pub is_default: bool,
}

impl BlockLabel {
    /// Labels are single lines: `x y blocktype maxarea group flags`,
    /// flags bit 0 = external, bit 1 = default. `blocktype` is 1-based
    /// in the file.
    pub fn from_scan(sc: &mut Scanner<'_>) -> Option<Self> {
        let x = sc.parse_value()?;
        let y = sc.parse_value()?;
        let block_type: i32 = sc.parse_value()?;
        let max_area = sc.parse_value()?;
        let group = sc.parse_value()?;
        let flags: i32 = sc.parse_value()?;
        Some(BlockLabel {
            x,
            y,
            block_type: block_type - 1,
            max_area,
            group,
            is_external: flags & 1 != 0,
            is_default: flags & 2 != 0,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let flags = (self.is_external as i32) | ((self.is_default as i32) << 1);
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.x,
            self.y,
            self.block_type + 1,
            self.max_area,
            self.group,
            flags
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn round_trip<T, W, R>(value: &T, write: W, read: R) -> T
    where
        W: Fn(&T, &mut Vec<u8>),
        R: Fn(&mut Scanner<'_>) -> Option<T>,
    {
        let mut buf = Vec::new();
        write(value, &mut buf);
        let text = String::from_utf8(buf).unwrap();
        let mut sc = Scanner::new(&text);
        let got = read(&mut sc).expect("record should re-read");
        assert!(sc.diagnostics().is_empty(), "diags: {}", sc.diagnostics());
        got
    }

    #[test]
    fn point_prop_round_trips() {
        let prop = PointProp {
            name: "Hot Spot".into(),
            tp: 0.0,
            qp: 1.5e3,
        };
        let got = round_trip(&prop, |p, b| p.write_to(b).unwrap(), PointProp::from_scan);
        assert_eq!(got, prop);
    }

    #[test]
    fn boundary_prop_round_trips_every_variant() {
        let kinds = [
            BoundaryKind::FixedTemperature { tset: 350.0 },
            BoundaryKind::HeatFlux { qs: -20.0 },
            BoundaryKind::Convection { h: 12.5, tinf: 293.15 },
            BoundaryKind::Radiation { beta: 0.8, tinf: 300.0 },
        ];
        for kind in kinds {
            let prop = BoundaryProp {
                name: "edge".into(),
                kind,
            };
            let got =
                round_trip(&prop, |p, b| p.write_to(b).unwrap(), BoundaryProp::from_scan);
            assert_eq!(got, prop);
        }
    }

    #[test]
    fn material_prop_round_trips_with_table() {
        let prop = MaterialProp {
            kx: 45.0,
            ky: 51.0,
            kt: 3.6e6,
            qv: 100.0,
            table: vec![(250.0, 40.0), (500.0, 30.0), (750.0, 25.0)],
        };
        let got =
            round_trip(&prop, |p, b| p.write_to(b).unwrap(), MaterialProp::from_scan);
        assert_eq!(got, prop);
    }

    #[test]
    fn conductor_round_trips_both_types() {
        for cond in [
            Conductor::FixedTemperature {
                name: "inner".into(),
                v: 400.0,
            },
            Conductor::FixedFlow {
                name: "outer".into(),
                q: -75.0,
            },
        ] {
            let got = round_trip(&cond, |p, b| p.write_to(b).unwrap(), Conductor::from_scan);
            assert_eq!(got, cond);
        }
    }

    #[test]
    fn block_label_round_trips_flags() {
        let lbl = BlockLabel {
            x: 0.5,
            y: -0.25,
            block_type: 2,
            max_area: 0.01,
            group: 3,
            is_external: true,
            is_default: true,
        };
        let got = round_trip(&lbl, |p, b| p.write_to(b).unwrap(), BlockLabel::from_scan);
        assert_eq!(got, lbl);
    }

    #[test]
    fn conductivity_without_table_is_orthotropic() {
        let mat = MaterialProp {
            kx: 2.0,
            ky: 3.0,
            ..Default::default()
        };
        let k = mat.conductivity(500.0);
        assert_abs_diff_eq!(k.re, 2.0);
        assert_abs_diff_eq!(k.im, 3.0);
    }

    #[test]
    fn conductivity_single_point_broadcasts() {
        let mat = MaterialProp {
            kx: 2.0,
            ky: 3.0,
            table: vec![(300.0, 7.0)],
            ..Default::default()
        };
        let k = mat.conductivity(900.0);
        assert_abs_diff_eq!(k.re, 7.0);
        assert_abs_diff_eq!(k.im, 7.0);
    }

    #[test]
    fn conductivity_interpolates_and_saturates() {
        let mat = MaterialProp {
            table: vec![(200.0, 10.0), (400.0, 20.0)],
            ..Default::default()
        };
        assert_abs_diff_eq!(mat.conductivity(100.0).re, 10.0);
        assert_abs_diff_eq!(mat.conductivity(300.0).re, 15.0);
        assert_abs_diff_eq!(mat.conductivity(900.0).re, 20.0);
    }
}
