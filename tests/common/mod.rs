//! Shared fixtures: synthetic textured objects, training directories and
//! cluttered test scenes small enough to recognize in milliseconds.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use image::GrayImage;
use nalgebra::{Point3, Vector3};

use clutrec::cloud::PointCloud;
use clutrec::engine::{PatchEngine, PIXEL_SIZE_M};
use clutrec::experiment::{TrainFeatures, TrainFeaturesCache};
use clutrec::features::{write_fe_params, FeatureExtractionParams, StageParams};
use clutrec::geometry::{translate_pose, Pose};

/// Deterministic synthetic texture; distinct seeds give unrelated objects,
/// and the bit mixing keeps patches from repeating across positions.
pub fn textured_image(w: u32, h: u32, seed: u32) -> GrayImage {
    GrayImage::from_fn(w, h, |x, y| {
        let mut v = x
            .wrapping_mul(0x9E37_79B1)
            ^ y.wrapping_mul(0x85EB_CA77)
            ^ seed.wrapping_mul(0xC2B2_AE3D);
        v ^= v >> 13;
        v = v.wrapping_mul(0x27D4_EB2F);
        image::Luma([(v & 0xFF) as u8])
    })
}

/// A 96x96 scene with the 64x64 object pasted at `(dx, dy)` on a flat
/// background.
pub fn scene_with_object(obj: &GrayImage, dx: u32, dy: u32) -> GrayImage {
    GrayImage::from_fn(96, 96, |x, y| {
        if (dx..dx + 64).contains(&x) && (dy..dy + 64).contains(&y) {
            *obj.get_pixel(x - dx, y - dy)
        } else {
            image::Luma([0])
        }
    })
}

/// Canonical pose of the i-th training object.
pub fn object_pose(index: usize) -> Pose {
    Pose::from_rvec_tvec(
        Vector3::zeros(),
        Vector3::new(0.1 * index as f64, 0.2, 0.5),
    )
}

/// Pose the engine reports for an object pasted at `(dx, dy)`.
pub fn shifted_pose(index: usize, dx: u32, dy: u32) -> Pose {
    translate_pose(
        &object_pose(index),
        &Vector3::new(
            f64::from(dx) * PIXEL_SIZE_M,
            f64::from(dy) * PIXEL_SIZE_M,
            0.0,
        ),
    )
}

/// An organized cloud the size of a test scene.
pub fn scene_cloud() -> PointCloud {
    let points = (0..96u32)
        .flat_map(|v| (0..96u32).map(move |u| Point3::new(u as f32 * 0.001, v as f32 * 0.001, 0.8)))
        .collect();
    PointCloud::new(96, 96, points)
}

/// Stage parameters tuned for the synthetic fixtures: a slightly higher
/// inlier floor keeps accidental cross-object consensus out.
pub fn stage_params() -> StageParams {
    let mut params = StageParams::default();
    params.guess.min_inliers = 20;
    params
}

/// Writes a training set of `objects` (name, seed) pairs under
/// `root/<train_set>`, one 64x64 view each, and returns its directory.
pub fn write_train_set(
    root: &Path,
    train_set: &str,
    objects: &[(&str, u32)],
    params: &FeatureExtractionParams,
) -> PathBuf {
    let train_dir = root.join(train_set);
    for (i, (name, seed)) in objects.iter().enumerate() {
        let obj_dir = train_dir.join(name);
        fs::create_dir_all(&obj_dir).unwrap();
        textured_image(64, 64, *seed)
            .save(obj_dir.join("view_000.png"))
            .unwrap();
        object_pose(i)
            .write_yaml(&obj_dir.join("view_000.pose.yaml"))
            .unwrap();
    }
    write_fe_params(&train_dir.join("features.config.yaml"), params).unwrap();
    train_dir
}

/// Generates features for a freshly written training set and populates the
/// cache, returning the cache entry directory that recognizers load from.
pub fn prepare_features(
    root: &Path,
    train_set: &str,
    params: &FeatureExtractionParams,
) -> PathBuf {
    let train_dir = root.join(train_set);
    let tr_feat = TrainFeatures::new(train_set, params.clone());
    tr_feat.generate(&PatchEngine, &train_dir).unwrap();
    let cache = TrainFeaturesCache::new(root.join("train_cache"));
    if !cache.train_features_exist(&tr_feat).unwrap() {
        cache
            .add_train_features(&tr_feat, &train_dir, true)
            .unwrap();
    }
    cache.train_features_dir(&tr_feat).unwrap()
}
