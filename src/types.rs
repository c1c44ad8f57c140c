//! Common types for footprint geometry and volume accounting.
//!
//! All lengths are centimetres, all volumes are litres. The single
//! conversion between the two is [`CM3_PER_LITRE`].

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Global numerical tolerance for floating-point comparisons.
///
/// Used for per-axis fit division and for the volume guard.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Cubic centimetres per litre.
pub const CM3_PER_LITRE: f64 = 1_000.0;

/// Three axis lengths of a rectangular footprint (length, width, height) in cm.
///
/// # Examples
/// ```
/// use stockplace::types::Dims3;
///
/// let cell = Dims3::new(100.0, 100.0, 50.0);
/// assert_eq!(cell.volume_litres(), 500.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Dims3 {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl Dims3 {
    /// Creates a new footprint.
    #[inline]
    pub const fn new(length: f64, width: f64, height: f64) -> Self {
        Self {
            length,
            width,
            height,
        }
    }

    /// Converts to tuple format for API compatibility.
    #[inline]
    pub const fn as_tuple(&self) -> (f64, f64, f64) {
        (self.length, self.width, self.height)
    }

    /// Creates from tuple format.
    #[inline]
    pub const fn from_tuple(tuple: (f64, f64, f64)) -> Self {
        Self::new(tuple.0, tuple.1, tuple.2)
    }

    /// Axis lengths as an array, indexed 0 = length, 1 = width, 2 = height.
    #[inline]
    pub const fn axes(&self) -> [f64; 3] {
        [self.length, self.width, self.height]
    }

    /// Raw volume in cm³.
    #[inline]
    pub fn volume_cm3(&self) -> f64 {
        self.length * self.width * self.height
    }

    /// Volume in litres.
    #[inline]
    pub fn volume_litres(&self) -> f64 {
        self.volume_cm3() / CM3_PER_LITRE
    }

    /// Checks if all components are positive and finite.
    #[inline]
    pub fn is_valid_dimension(&self) -> bool {
        self.axes().iter().all(|v| *v > 0.0 && v.is_finite())
    }
}

impl From<(f64, f64, f64)> for Dims3 {
    #[inline]
    fn from(tuple: (f64, f64, f64)) -> Self {
        Self::from_tuple(tuple)
    }
}

/// Percentage of `used` in `capacity`, 0 when the capacity is 0.
#[inline]
pub fn percent_of(used: f64, capacity: f64) -> f64 {
    if capacity <= 0.0 {
        return 0.0;
    }
    used / capacity * 100.0
}

/// Validation functions shared by the model and the API layer.
pub mod validation {

    /// Validates a single dimension.
    ///
    /// # Returns
    /// `Ok(())` for valid values, otherwise error text
    pub fn validate_dimension(value: f64, name: &str) -> Result<(), String> {
        if value.is_nan() {
            return Err(format!("{} must not be NaN", name));
        }
        if value.is_infinite() {
            return Err(format!("{} must not be infinite", name));
        }
        if value <= 0.0 {
            return Err(format!("{} must be positive, got: {}", name, value));
        }
        Ok(())
    }

    /// Validates all three dimensions of a footprint.
    pub fn validate_dimensions_3d(dims: (f64, f64, f64), subject: &str) -> Result<(), String> {
        validate_dimension(dims.0, &format!("{} length", subject))?;
        validate_dimension(dims.1, &format!("{} width", subject))?;
        validate_dimension(dims.2, &format!("{} height", subject))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dims_volume_in_litres() {
        let dims = Dims3::new(40.0, 30.0, 20.0);
        assert!((dims.volume_cm3() - 24_000.0).abs() < EPSILON_GENERAL);
        assert!((dims.volume_litres() - 24.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn test_cell_and_item_share_unit() {
        // 1 m³ cell holds exactly 1000 one-litre items by volume
        let cell = Dims3::new(100.0, 100.0, 100.0);
        let item = Dims3::new(10.0, 10.0, 10.0);
        assert!((cell.volume_litres() / item.volume_litres() - 1000.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn test_dims_validity() {
        assert!(Dims3::new(1.0, 2.0, 3.0).is_valid_dimension());
        assert!(!Dims3::new(0.0, 2.0, 3.0).is_valid_dimension());
        assert!(!Dims3::new(1.0, f64::NAN, 3.0).is_valid_dimension());
        assert!(!Dims3::new(1.0, 2.0, f64::INFINITY).is_valid_dimension());
    }

    #[test]
    fn test_percent_of_zero_capacity() {
        assert_eq!(percent_of(5.0, 0.0), 0.0);
        assert!((percent_of(25.0, 100.0) - 25.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn test_validation_dimension() {
        assert!(validation::validate_dimension(10.0, "Length").is_ok());
        assert!(validation::validate_dimension(0.0, "Length").is_err());
        assert!(validation::validate_dimension(-1.0, "Length").is_err());
        assert!(validation::validate_dimension(f64::NAN, "Length").is_err());
        assert!(validation::validate_dimension(f64::INFINITY, "Length").is_err());
    }

    #[test]
    fn test_validation_dimensions_3d_names_the_axis() {
        let err = validation::validate_dimensions_3d((10.0, -2.0, 5.0), "Cell").unwrap_err();
        assert!(err.contains("Cell width"), "unexpected message: {err}");
    }
}
