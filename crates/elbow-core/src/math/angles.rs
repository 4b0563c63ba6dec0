//! Angle wrapping

/// Wrap an angle in degrees into (-180, 180]
///
/// Uses ((angle + 180) mod 360) - 180 with a floor modulo, mapping the -180
/// boundary to +180. Angles already inside the range are returned unchanged,
/// so wrapping is idempotent bit-for-bit. NaN stays NaN.
pub fn normalize_angle_deg(angle: f64) -> f64 {
    if angle > -180.0 && angle <= 180.0 {
        return angle;
    }
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_in_range_unchanged() {
        for a in [-179.5, -90.0, 0.0, 0.1, 45.0, 180.0] {
            assert_eq!(normalize_angle_deg(a), a);
        }
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(normalize_angle_deg(-180.0), 180.0);
        assert_eq!(normalize_angle_deg(540.0), 180.0);
        assert_eq!(normalize_angle_deg(360.0), 0.0);
    }

    #[test]
    fn test_wraps_large_values() {
        assert_relative_eq!(normalize_angle_deg(190.0), -170.0, epsilon = 1e-9);
        assert_relative_eq!(normalize_angle_deg(-190.0), 170.0, epsilon = 1e-9);
        assert_relative_eq!(normalize_angle_deg(725.0), 5.0, epsilon = 1e-9);
        assert_relative_eq!(normalize_angle_deg(-1085.0), -5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_range_and_idempotence_over_sweep() {
        let mut a = -2000.0;
        while a < 2000.0 {
            let n = normalize_angle_deg(a);
            assert!(n > -180.0 && n <= 180.0, "{a} -> {n}");
            assert_eq!(normalize_angle_deg(n), n);
            a += 7.3;
        }
    }

    #[test]
    fn test_nan_propagates() {
        assert!(normalize_angle_deg(f64::NAN).is_nan());
    }
}
