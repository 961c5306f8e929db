//! Cost and storage units
//!
//! Every algorithm works on integral units so that remaining-budget values can
//! be used as exact memoization keys. Measured inputs (seconds, bytes) are
//! converted once, at tree construction time, through [`Quantization`].

mod allocator;

pub use allocator::StorageTracker;

use crate::tree::TreeError;

/// Recompute time in quantized time units.
pub type Cost = u64;

/// Checkpoint size in quantized storage units.
pub type Storage = u64;

/// Conversion from measured quantities into integral units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantization {
    /// Seconds represented by one [`Cost`] unit.
    pub time_unit: f64,

    /// Bytes represented by one [`Storage`] unit.
    pub storage_unit: f64,
}

impl Default for Quantization {
    fn default() -> Self {
        Self {
            time_unit: 1.0,
            storage_unit: 1.0,
        }
    }
}

impl Quantization {
    /// Create a quantization with explicit units.
    pub fn new(time_unit: f64, storage_unit: f64) -> Result<Self, TreeError> {
        for (field, unit) in [("time unit", time_unit), ("storage unit", storage_unit)] {
            if !unit.is_finite() || unit <= 0.0 {
                return Err(TreeError::InvalidQuantization {
                    field,
                    value: unit,
                });
            }
        }
        Ok(Self {
            time_unit,
            storage_unit,
        })
    }

    /// Measured seconds to cost units (rounded to nearest).
    pub fn cost(&self, seconds: f64) -> Result<Cost, TreeError> {
        let field = "recompute cost";
        let scaled = checked_measurement(field, seconds)? / self.time_unit;
        within_units(field, seconds, scaled.round())
    }

    /// Measured bytes to storage units (rounded up).
    pub fn storage(&self, bytes: f64) -> Result<Storage, TreeError> {
        let field = "storage cost";
        let scaled = checked_measurement(field, bytes)? / self.storage_unit;
        within_units(field, bytes, scaled.ceil())
    }

    /// Measured byte budget to storage units (rounded down).
    ///
    /// Rounding down keeps every quantized plan within the measured quota. A
    /// budget beyond the unit range saturates to [`Storage::MAX`].
    pub fn budget(&self, bytes: f64) -> Result<Storage, TreeError> {
        if bytes.is_finite() && bytes < 0.0 {
            return Err(TreeError::NegativeBudget(bytes));
        }
        let scaled = checked_measurement("cache budget", bytes)? / self.storage_unit;
        Ok(scaled.floor() as Storage)
    }
}

fn within_units(field: &'static str, value: f64, units: f64) -> Result<u64, TreeError> {
    // u64::MAX as f64 rounds up to 2^64, the first value that does not fit.
    if units >= u64::MAX as f64 {
        Err(TreeError::MeasurementOverflow { field, value })
    } else {
        Ok(units as u64)
    }
}

fn checked_measurement(field: &'static str, value: f64) -> Result<f64, TreeError> {
    if !value.is_finite() {
        return Err(TreeError::NonFiniteMeasurement { field, value });
    }
    if value < 0.0 {
        return Err(TreeError::NegativeMeasurement { field, value });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding_directions() {
        let q = Quantization::new(0.5, 1024.0).unwrap();
        assert_eq!(q.cost(1.2).unwrap(), 2);
        assert_eq!(q.cost(1.3).unwrap(), 3);
        assert_eq!(q.storage(1025.0).unwrap(), 2);
        assert_eq!(q.budget(2047.0).unwrap(), 1);
    }

    #[test]
    fn test_negative_measurements_are_fatal() {
        let q = Quantization::default();
        assert!(matches!(
            q.cost(-1.0),
            Err(TreeError::NegativeMeasurement { .. })
        ));
        assert!(matches!(
            q.storage(f64::NAN),
            Err(TreeError::NonFiniteMeasurement { .. })
        ));
        assert!(matches!(q.budget(-0.5), Err(TreeError::NegativeBudget(_))));
    }

    #[test]
    fn test_out_of_range_measurements_rejected() {
        let q = Quantization::new(1e-9, 1e-9).unwrap();
        assert!(matches!(
            q.cost(1e12),
            Err(TreeError::MeasurementOverflow { field: "recompute cost", .. })
        ));
        assert!(matches!(
            q.storage(1e12),
            Err(TreeError::MeasurementOverflow { field: "storage cost", .. })
        ));
        assert_eq!(q.budget(1e12).unwrap(), Storage::MAX);
        assert_eq!(q.cost(1.0).unwrap(), 1_000_000_000);
    }

    #[test]
    fn test_invalid_units_rejected() {
        assert!(Quantization::new(0.0, 1.0).is_err());
        assert!(Quantization::new(1.0, f64::INFINITY).is_err());
    }
}
