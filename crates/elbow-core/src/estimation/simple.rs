//! Joint angles from fixed, known mounting axes

use super::{decompose, relative_rotation, JointAngleEstimator, JointAngles, MountingAxes};
use crate::{Mat3, Vec3};

/// Stateless estimator assuming the configured mounting is exact
#[derive(Debug, Clone)]
pub struct SimpleEstimator {
    axes: MountingAxes,
}

impl SimpleEstimator {
    pub fn new(axes: MountingAxes) -> Self {
        Self {
            axes: axes.normalized(),
        }
    }
}

impl Default for SimpleEstimator {
    fn default() -> Self {
        Self::new(MountingAxes::default())
    }
}

impl JointAngleEstimator for SimpleEstimator {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn update(&mut self, r_a: &Mat3, _gyro_a: &Vec3, r_b: &Mat3, _gyro_b: &Vec3) -> JointAngles {
        decompose(&relative_rotation(r_a, r_b), &self.axes)
    }

    fn axes(&self) -> MountingAxes {
        self.axes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::quaternion_from_axis_angle;
    use approx::assert_relative_eq;

    fn rot(axis: Vec3, deg: f64) -> Mat3 {
        *quaternion_from_axis_angle(&axis, deg.to_radians())
            .to_rotation_matrix()
            .matrix()
    }

    #[test]
    fn test_same_orientation_is_zero() {
        let mut estimator = SimpleEstimator::default();
        let r = rot(Vec3::new(1.0, 2.0, -0.5), 33.0);

        let angles = estimator.update(&r, &Vec3::zeros(), &r, &Vec3::zeros());

        assert_relative_eq!(angles.flexion_deg, 0.0, epsilon = 1e-9);
        assert_relative_eq!(angles.pronation_deg, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flexion_about_y() {
        let mut estimator = SimpleEstimator::default();

        let angles = estimator.update(
            &Mat3::identity(),
            &Vec3::zeros(),
            &rot(Vec3::y(), 30.0),
            &Vec3::zeros(),
        );

        assert_relative_eq!(angles.flexion_deg, 30.0, epsilon = 1e-9);
        assert_relative_eq!(angles.pronation_deg, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_custom_axes() {
        let axes = MountingAxes {
            flexion: Vec3::new(0.0, 0.0, 3.0),
            pronation: Vec3::y(),
        };
        let mut estimator = SimpleEstimator::new(axes);
        assert_eq!(estimator.axes().flexion, Vec3::z());

        let r_b = rot(Vec3::y(), -25.0) * rot(Vec3::z(), 60.0);
        let angles = estimator.update(&Mat3::identity(), &Vec3::zeros(), &r_b, &Vec3::zeros());

        assert_relative_eq!(angles.flexion_deg, 60.0, epsilon = 1e-9);
        assert_relative_eq!(angles.pronation_deg, -25.0, epsilon = 1e-9);
    }

    #[test]
    fn test_diverged_input_is_undefined() {
        let mut estimator = SimpleEstimator::default();
        let bad = Mat3::from_element(f64::NAN);

        let angles = estimator.update(&bad, &Vec3::zeros(), &Mat3::identity(), &Vec3::zeros());

        assert!(angles.flexion_deg.is_nan());
        assert!(angles.pronation_deg.is_nan());
    }
}
