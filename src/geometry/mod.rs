//! Geometry utilities: rigid poses, error metrics, pinhole camera model.

pub mod camera;
pub mod pose;

pub use camera::Camera;
pub use pose::{
    angle_between, diff_rotation, dist_between, random_orientation, randomize_pose, rotate_pose,
    translate_pose, Pose,
};
