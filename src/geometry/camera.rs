//! Pinhole camera model.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use super::Pose;

/// Pinhole intrinsics. The defaults correspond to a Kinect-class RGB sensor
/// at VGA resolution, which is what the training and test corpora were
/// captured with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fx: 525.0,
            fy: 525.0,
            cx: 319.5,
            cy: 239.5,
            width: 640,
            height: 480,
        }
    }
}

impl Camera {
    /// Projects a camera-frame point onto the image plane. Points at or
    /// behind the camera do not project.
    pub fn project(&self, p: &Point3<f64>) -> Option<(f64, f64)> {
        if p.z <= 0.0 {
            return None;
        }
        Some((
            self.fx * p.x / p.z + self.cx,
            self.fy * p.y / p.z + self.cy,
        ))
    }

    /// Projects the model origin of a pose into the image.
    pub fn project_origin(&self, pose: &Pose) -> Option<(f64, f64)> {
        self.project(&Point3::from(pose.translation))
    }

    pub fn image_center(&self) -> (f64, f64) {
        (f64::from(self.width) / 2.0, f64::from(self.height) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_project_on_axis() {
        let cam = Camera::default();
        let (u, v) = cam.project(&Point3::new(0.0, 0.0, 1.0)).unwrap();
        assert_relative_eq!(u, cam.cx, epsilon = 1e-12);
        assert_relative_eq!(v, cam.cy, epsilon = 1e-12);
    }

    #[test]
    fn test_project_behind_camera() {
        let cam = Camera::default();
        assert!(cam.project(&Point3::new(0.1, 0.1, -0.5)).is_none());
        assert!(cam.project(&Point3::new(0.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn test_project_origin_uses_translation() {
        let cam = Camera::default();
        let pose = Pose::from_rvec_tvec(Vector3::zeros(), Vector3::new(0.1, 0.0, 1.0));
        let (u, _) = cam.project_origin(&pose).unwrap();
        assert!(u > cam.cx);
    }
}
