//! Rigid 6-DoF poses and the error metrics defined between them.
//!
//! A pose maps model coordinates into camera coordinates. On disk a pose is
//! stored as an axis-angle rotation vector plus a translation vector, which
//! keeps the YAML files short and diffable.

use std::fs::File;
use std::path::Path;

use nalgebra::{Point3, UnitQuaternion, Vector3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Builds a pose from an axis-angle rotation vector and a translation.
    pub fn from_rvec_tvec(rvec: Vector3<f64>, tvec: Vector3<f64>) -> Self {
        Self {
            rotation: UnitQuaternion::from_scaled_axis(rvec),
            translation: tvec,
        }
    }

    /// Axis-angle rotation vector of this pose.
    pub fn rvec(&self) -> Vector3<f64> {
        self.rotation.scaled_axis()
    }

    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation * p + self.translation
    }

    /// Reads a pose from a YAML file with `rvec`/`tvec` entries.
    pub fn read_yaml(path: &Path) -> Result<Pose> {
        let raw: PoseYaml = serde_yaml::from_reader(File::open(path)?)?;
        Ok(raw.into())
    }

    /// Writes this pose as a YAML file with `rvec`/`tvec` entries.
    pub fn write_yaml(&self, path: &Path) -> Result<()> {
        serde_yaml::to_writer(File::create(path)?, &PoseYaml::from(self))?;
        Ok(())
    }
}

/// On-disk representation of a pose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseYaml {
    pub rvec: [f64; 3],
    pub tvec: [f64; 3],
}

impl From<&Pose> for PoseYaml {
    fn from(p: &Pose) -> Self {
        let r = p.rvec();
        let t = p.translation;
        Self {
            rvec: [r.x, r.y, r.z],
            tvec: [t.x, t.y, t.z],
        }
    }
}

impl From<PoseYaml> for Pose {
    fn from(raw: PoseYaml) -> Self {
        Pose::from_rvec_tvec(Vector3::from(raw.rvec), Vector3::from(raw.tvec))
    }
}

/// Distance between the origins of two poses.
pub fn dist_between(p: &Pose, q: &Pose) -> f64 {
    (p.translation - q.translation).norm()
}

/// Rotation D such that P · D = Q, i.e. the difference rotation that maps
/// orientation P onto orientation Q.
pub fn diff_rotation(p: &Pose, q: &Pose) -> UnitQuaternion<f64> {
    p.rotation.inverse() * q.rotation
}

/// Angle between the orientations of two poses: the axis-angle magnitude of
/// the difference rotation `diff_rotation(p, q)`.
pub fn angle_between(p: &Pose, q: &Pose) -> f64 {
    diff_rotation(p, q).angle()
}

/// Translates a pose; the translation vector is given in model coordinates.
pub fn translate_pose(p: &Pose, model_tvec: &Vector3<f64>) -> Pose {
    Pose {
        rotation: p.rotation,
        translation: p.translation + p.rotation * model_tvec,
    }
}

/// Rotates a pose. With D equivalent to the axis-angle vector `model_rvec`,
/// the new orientation is Q = P · D, so `diff_rotation(p, rotate_pose(p, d))`
/// recovers D.
pub fn rotate_pose(p: &Pose, model_rvec: &Vector3<f64>) -> Pose {
    Pose {
        rotation: p.rotation * UnitQuaternion::from_scaled_axis(*model_rvec),
        translation: p.translation,
    }
}

/// Returns an orientation with a uniformly random rotation axis and the
/// specified angle in axis-angle representation.
pub fn random_orientation<R: Rng>(rng: &mut R, angle: f64) -> UnitQuaternion<f64> {
    loop {
        let axis = Vector3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let n = axis.norm();
        if n > 1e-6 && n <= 1.0 {
            return UnitQuaternion::from_scaled_axis(axis * (angle / n));
        }
    }
}

/// Perturbs a pose by a random translation within `max_t` per axis and a
/// random rotation about a random axis with angle up to `max_r`.
pub fn randomize_pose<R: Rng>(rng: &mut R, pose: &Pose, max_t: f64, max_r: f64) -> Pose {
    let jitter = Vector3::new(
        rng.gen_range(-max_t..=max_t),
        rng.gen_range(-max_t..=max_t),
        rng.gen_range(-max_t..=max_t),
    );
    let angle = rng.gen_range(0.0..=max_r);
    Pose {
        rotation: random_orientation(rng, angle) * pose.rotation,
        translation: pose.translation + jitter,
    }
}
