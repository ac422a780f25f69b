//! Organized point clouds and the 2-D→3-D index mapping used to lift inlier
//! keypoints into the query cloud.

use nalgebra::Point3;
use tracing::warn;

use crate::features::KeyPoint;

/// An organized point cloud with row-major `width × height` layout, as
/// produced by an RGB-D sensor. May be empty when no cloud accompanies a
/// query image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    width: usize,
    height: usize,
    points: Vec<Point3<f32>>,
}

impl PointCloud {
    pub fn new(width: usize, height: usize, points: Vec<Point3<f32>>) -> Self {
        debug_assert_eq!(width * height, points.len());
        Self {
            width,
            height,
            points,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, u: usize, v: usize) -> Option<Point3<f32>> {
        if u < self.width && v < self.height {
            Some(self.points[v * self.width + u])
        } else {
            None
        }
    }

    pub fn points(&self) -> &[Point3<f32>] {
        &self.points
    }
}

/// Maps image keypoints into cloud points by index correspondence: pixel
/// (u, v), scaled to the cloud's resolution, maps to the cloud point at
/// (u, v). No camera information is involved, which is valid when image and
/// cloud come from the same RGB-D sensor. Indices falling outside the cloud
/// bounds are dropped with a warning.
pub fn map_to_cloud(
    keypoints: &[KeyPoint],
    image_width: u32,
    image_height: u32,
    cloud: &PointCloud,
) -> Vec<Point3<f32>> {
    if cloud.is_empty() || image_width == 0 || image_height == 0 {
        return Vec::new();
    }
    let scale_w = cloud.width() as f32 / image_width as f32;
    let scale_h = cloud.height() as f32 / image_height as f32;
    let mut mapped = Vec::with_capacity(keypoints.len());
    for kp in keypoints {
        let u = (kp.x * scale_w) as usize;
        let v = (kp.y * scale_h) as usize;
        match cloud.get(u, v) {
            Some(p) => mapped.push(p),
            None => warn!(
                "cannot find 3d point for inlier at ({:.1}, {:.1}), outside of point cloud",
                kp.x, kp.y
            ),
        }
    }
    mapped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_cloud(w: usize, h: usize) -> PointCloud {
        let points = (0..h)
            .flat_map(|v| (0..w).map(move |u| Point3::new(u as f32, v as f32, 1.0)))
            .collect();
        PointCloud::new(w, h, points)
    }

    #[test]
    fn test_get_in_bounds() {
        let cloud = grid_cloud(4, 3);
        assert_eq!(cloud.get(2, 1), Some(Point3::new(2.0, 1.0, 1.0)));
        assert_eq!(cloud.get(4, 1), None);
        assert_eq!(cloud.get(0, 3), None);
    }

    #[test]
    fn test_map_to_cloud_identity_scale() {
        let cloud = grid_cloud(8, 8);
        let kps = vec![KeyPoint { x: 3.0, y: 5.0 }];
        let mapped = map_to_cloud(&kps, 8, 8, &cloud);
        assert_eq!(mapped, vec![Point3::new(3.0, 5.0, 1.0)]);
    }

    #[test]
    fn test_map_to_cloud_scales_to_cloud_resolution() {
        // Image twice the cloud resolution: pixel 6 maps to column 3.
        let cloud = grid_cloud(8, 8);
        let kps = vec![KeyPoint { x: 6.0, y: 10.0 }];
        let mapped = map_to_cloud(&kps, 16, 16, &cloud);
        assert_eq!(mapped, vec![Point3::new(3.0, 5.0, 1.0)]);
    }

    #[test]
    fn test_map_to_cloud_drops_out_of_bounds() {
        let cloud = grid_cloud(4, 4);
        let kps = vec![KeyPoint { x: 100.0, y: 1.0 }, KeyPoint { x: 1.0, y: 1.0 }];
        let mapped = map_to_cloud(&kps, 4, 4, &cloud);
        assert_eq!(mapped.len(), 1);
    }

    #[test]
    fn test_map_to_empty_cloud() {
        let kps = vec![KeyPoint { x: 1.0, y: 1.0 }];
        assert!(map_to_cloud(&kps, 4, 4, &PointCloud::empty()).is_empty());
    }
}
