//! Decimal to fixed-point conversion.
//!
//! `to_fixed_point(v, s) == round(v * s)`, rounding half away from zero.
//! The round trip through [`from_fixed_point`] is exact to within
//! `0.5 / s` in the decimal domain.

use crate::domain::{ConversionError, FixedPointScalar, FixedPointVector, Scale};

// 2^63 is exactly representable; anything at or above it overflows i64.
const I64_UPPER_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Scale and round a single decimal.
///
/// Exact ties round away from zero, so `-2.5` units becomes `-3`. A
/// JavaScript `Math.round` based converter rounds negative ties toward
/// positive infinity (`-2`); the two can differ by one unit on such inputs.
pub fn to_fixed_point(value: f64, scale: Scale) -> Result<i64, ConversionError> {
    if !value.is_finite() {
        return Err(ConversionError::NonFinite { value });
    }

    let scaled = (value * scale.get() as f64).round();
    if !scaled.is_finite() || scaled >= I64_UPPER_BOUND || scaled < -I64_UPPER_BOUND {
        return Err(ConversionError::OutOfRange {
            value,
            scale: scale.get(),
        });
    }

    Ok(scaled as i64)
}

/// Scale and round a single decimal, keeping the scale alongside the result.
pub fn to_fixed_point_scalar(value: f64, scale: Scale) -> Result<FixedPointScalar, ConversionError> {
    to_fixed_point(value, scale).map(|v| FixedPointScalar::from_scaled(v, scale))
}

/// Convert every element, preserving order and length.
///
/// Fails on the first element that cannot be converted, reporting its index.
pub fn to_fixed_point_vector(
    values: &[f64],
    scale: Scale,
) -> Result<FixedPointVector, ConversionError> {
    let converted = values
        .iter()
        .enumerate()
        .map(|(index, &value)| to_fixed_point(value, scale).map_err(|e| e.at(index)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FixedPointVector::from_scaled(converted, scale))
}

/// Map a fixed-point integer back into the decimal domain.
pub fn from_fixed_point(value: i64, scale: Scale) -> f64 {
    value as f64 / scale.get() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_SCALE;

    #[test]
    fn test_converts_with_default_scale() {
        assert_eq!(to_fixed_point(0.5, DEFAULT_SCALE), Ok(500_000_000));
        assert_eq!(to_fixed_point(-1.25, DEFAULT_SCALE), Ok(-1_250_000_000));
        assert_eq!(to_fixed_point(0.0, DEFAULT_SCALE), Ok(0));
    }

    #[test]
    fn test_rounds_to_nearest() {
        let scale = Scale::new(10).expect("scale");
        assert_eq!(to_fixed_point(0.14, scale), Ok(1));
        assert_eq!(to_fixed_point(0.16, scale), Ok(2));
        assert_eq!(to_fixed_point(-0.16, scale), Ok(-2));
        assert_eq!(to_fixed_point(0.25, scale), Ok(3));
    }

    #[test]
    fn test_ties_round_away_from_zero() {
        let unit = Scale::new(1).expect("scale");
        assert_eq!(to_fixed_point(2.5, unit), Ok(3));
        assert_eq!(to_fixed_point(-2.5, unit), Ok(-3));
        assert_eq!(to_fixed_point(-0.5, unit), Ok(-1));
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(matches!(
            to_fixed_point(f64::NAN, DEFAULT_SCALE),
            Err(ConversionError::NonFinite { .. })
        ));
        assert!(matches!(
            to_fixed_point(f64::INFINITY, DEFAULT_SCALE),
            Err(ConversionError::NonFinite { .. })
        ));
        assert!(matches!(
            to_fixed_point(f64::NEG_INFINITY, DEFAULT_SCALE),
            Err(ConversionError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_rejects_values_outside_i64() {
        assert!(matches!(
            to_fixed_point(1e10, DEFAULT_SCALE),
            Err(ConversionError::OutOfRange { .. })
        ));
        assert!(matches!(
            to_fixed_point(-1e10, DEFAULT_SCALE),
            Err(ConversionError::OutOfRange { .. })
        ));
        assert!(to_fixed_point(9.0, DEFAULT_SCALE).is_ok());
    }

    #[test]
    fn test_vector_preserves_order_and_length() {
        let values = [0.1, -0.2, 0.3, 0.0];
        let converted = to_fixed_point_vector(&values, DEFAULT_SCALE).expect("convert");
        assert_eq!(converted.len(), values.len());
        assert_eq!(
            converted.as_slice(),
            &[100_000_000, -200_000_000, 300_000_000, 0]
        );
        assert_eq!(converted.scale(), DEFAULT_SCALE);
    }

    #[test]
    fn test_vector_reports_failing_index() {
        let values = [0.1, 0.2, f64::NAN, 0.4];
        let err = to_fixed_point_vector(&values, DEFAULT_SCALE).expect_err("should fail");
        match err {
            ConversionError::Element { index, source } => {
                assert_eq!(index, 2);
                assert!(matches!(*source, ConversionError::NonFinite { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_vector() {
        let converted = to_fixed_point_vector(&[], DEFAULT_SCALE).expect("convert");
        assert!(converted.is_empty());
    }

    #[test]
    fn test_scalar_keeps_scale() {
        let scalar = to_fixed_point_scalar(0.5, DEFAULT_SCALE).expect("convert");
        assert_eq!(scalar.value(), 500_000_000);
        assert_eq!(scalar.scale(), DEFAULT_SCALE);
    }

    #[test]
    fn test_inversion() {
        assert_eq!(from_fixed_point(500_000_000, DEFAULT_SCALE), 0.5);
        assert_eq!(from_fixed_point(-3, Scale::new(4).expect("scale")), -0.75);
    }

    mod proptest_round_trip {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Rounding error never exceeds half a unit of the scale.
            #[test]
            fn round_trip_within_resolution(v in -1000.0f64..1000.0, factor in 1i64..=1_000_000_000) {
                let scale = Scale::new(factor).unwrap();
                let fixed = to_fixed_point(v, scale).unwrap();
                let back = from_fixed_point(fixed, scale);
                // Floating-point slack for the multiplication and division themselves.
                let slack = v.abs() * f64::EPSILON * 4.0 + f64::EPSILON;
                prop_assert!((back - v).abs() <= scale.resolution() * (1.0 + 1e-3) + slack,
                    "v={} fixed={} back={}", v, fixed, back);
            }

            /// Vector conversion is element-wise scalar conversion.
            #[test]
            fn vector_matches_scalar(values in prop::collection::vec(-100.0f64..100.0, 0..64)) {
                let converted = to_fixed_point_vector(&values, DEFAULT_SCALE).unwrap();
                prop_assert_eq!(converted.len(), values.len());
                for (i, v) in values.iter().enumerate() {
                    prop_assert_eq!(converted.as_slice()[i], to_fixed_point(*v, DEFAULT_SCALE).unwrap());
                }
            }
        }
    }
}
