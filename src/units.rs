//! Length units and physical constants.
//!
//! All coordinates are converted to meters on mesh load; the output
//! writer divides them back out with the same factor.

/// Stefan-Boltzmann constant, W·m⁻²·K⁻⁴.
pub const KSB: f64 = 5.670373e-8;

/// Length unit of the problem geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthUnit {
    #[default]
    Inches,
    Millimeters,
    Centimeters,
    Meters,
    Mils,
    Microns,
}

impl LengthUnit {
    /// Conversion factor to the internal working unit of meters.
    pub fn meters_per_unit(self) -> f64 {
        match self {
            LengthUnit::Inches => 0.0254,
            LengthUnit::Millimeters => 0.001,
            LengthUnit::Centimeters => 0.01,
            LengthUnit::Meters => 1.0,
            LengthUnit::Mils => 2.54e-5,
            LengthUnit::Microns => 1.0e-6,
        }
    }

    /// Map a `[lengthunits]` keyword to the unit, if recognized.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "inches" => Some(LengthUnit::Inches),
            "millimeters" => Some(LengthUnit::Millimeters),
            "centimeters" => Some(LengthUnit::Centimeters),
            "meters" => Some(LengthUnit::Meters),
            "mils" => Some(LengthUnit::Mils),
            "microns" => Some(LengthUnit::Microns),
            _ => None,
        }
    }
}
