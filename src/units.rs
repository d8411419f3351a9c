use std::fmt;

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Length,
    Area,
}

/// Measurement units for planar lengths and areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Metre,
    Kilometre,
    SquareMetre,
    Hectare,
    SquareKilometre,
}

impl Unit {
    pub fn dimension(&self) -> Dimension {
        match self {
            Unit::Metre | Unit::Kilometre => Dimension::Length,
            Unit::SquareMetre | Unit::Hectare | Unit::SquareKilometre => Dimension::Area,
        }
    }

    /// Size of one unit expressed in the base unit of its dimension (m or m²).
    fn base_factor(&self) -> f64 {
        match self {
            Unit::Metre => 1.0,
            Unit::Kilometre => 1_000.0,
            Unit::SquareMetre => 1.0,
            Unit::Hectare => 10_000.0,
            Unit::SquareKilometre => 1_000_000.0,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Metre => "m",
            Unit::Kilometre => "km",
            Unit::SquareMetre => "m²",
            Unit::Hectare => "ha",
            Unit::SquareKilometre => "km²",
        }
    }
}

/// A unit-tagged scalar. Quantities carry no arithmetic, detag them with
/// `value_in` before summing or averaging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    value: f64,
    unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn to(&self, unit: Unit) -> Result<Quantity> {
        if self.unit.dimension() != unit.dimension() {
            return Err(AnalysisError::IncompatibleUnits {
                from: self.unit,
                to: unit,
            });
        }
        Ok(Quantity {
            value: self.value * self.unit.base_factor() / unit.base_factor(),
            unit,
        })
    }

    /// Plain number in the requested unit.
    pub fn value_in(&self, unit: Unit) -> Result<f64> {
        Ok(self.to(unit)?.value)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} {}", self.value, self.unit.symbol())
    }
}
