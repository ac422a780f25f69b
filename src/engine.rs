//! Bundled reference implementation of the feature-engine seam.
//!
//! Extracts fixed-grid intensity-patch descriptors and generates pose
//! hypotheses by voting on the dominant 2-D displacement between matched
//! keypoints. It stands in for a full descriptor/RANSAC engine behind the
//! [`FeatureEngine`] trait and keeps the pipeline exercisable end to end;
//! any serious deployment plugs a real engine into the same seam.

use image::GrayImage;
use nalgebra::Vector3;

use crate::error::Result;
use crate::features::{
    FeatureEngine, FeatureExtractionParams, FeatureSet, GuessParams, KeyPoint, MatcherParams,
};
use crate::geometry::translate_pose;
use crate::recognition::Guess;
use crate::training::{Observation, TrainingBase};

/// Metric span attributed to one pixel of image displacement when adjusting
/// the observation pose by the voted offset.
pub const PIXEL_SIZE_M: f64 = 0.001;

#[derive(Debug, Clone, Copy, Default)]
pub struct PatchEngine;

impl FeatureEngine for PatchEngine {
    fn extract(&self, params: &FeatureExtractionParams, image: &GrayImage) -> Result<FeatureSet> {
        let (w, h) = image.dimensions();
        let r = params.patch_radius;
        let step = params.grid_spacing.max(1);
        let mut set = FeatureSet::default();
        if w < 2 * r + 1 || h < 2 * r + 1 {
            return Ok(set);
        }
        let mut y = r;
        while y < h - r {
            let mut x = r;
            while x < w - r {
                let patch = sample_patch(image, x, y, r);
                let lo = patch.iter().copied().min().unwrap_or(0);
                let hi = patch.iter().copied().max().unwrap_or(0);
                if f32::from(hi - lo) >= params.min_contrast {
                    set.keypoints.push(KeyPoint {
                        x: x as f32,
                        y: y as f32,
                    });
                    set.descriptors.push(patch);
                }
                x += step;
            }
            y += step;
        }
        Ok(set)
    }

    fn match_base(
        &self,
        query: &FeatureSet,
        base: &TrainingBase,
        matcher: &MatcherParams,
        guess: &GuessParams,
    ) -> Result<Vec<Guess>> {
        let mut guesses = Vec::new();
        for object in base.objects() {
            let mut best: Option<Guess> = None;
            for obs in &object.observations {
                let Some(candidate) = self.match_observation(query, object.id, &object.name, obs, matcher, guess)
                else {
                    continue;
                };
                let better = best
                    .as_ref()
                    .map_or(true, |b| candidate.inliers.len() > b.inliers.len());
                if better {
                    best = Some(candidate);
                }
            }
            if let Some(g) = best {
                guesses.push(g);
            }
        }
        Ok(guesses)
    }
}

impl PatchEngine {
    fn match_observation(
        &self,
        query: &FeatureSet,
        object_id: usize,
        object_name: &str,
        obs: &Observation,
        matcher: &MatcherParams,
        guess: &GuessParams,
    ) -> Option<Guess> {
        let corr = nearest_neighbor_matches(query, &obs.features, matcher);
        if corr.len() < guess.min_inliers as usize {
            return None;
        }
        let (dx, dy, inliers) = vote_displacement(&corr, query, &obs.features, guess);
        if inliers.len() < guess.min_inliers as usize {
            return None;
        }
        let pose = translate_pose(
            &obs.pose,
            &Vector3::new(f64::from(dx) * PIXEL_SIZE_M, f64::from(dy) * PIXEL_SIZE_M, 0.0),
        );
        let image_points = corr
            .iter()
            .map(|&(qi, _, _)| query.keypoints[qi])
            .collect();
        Some(Guess {
            object_id,
            object_name: object_name.to_string(),
            pose,
            image_points,
            inliers,
            inlier_cloud: Vec::new(),
        })
    }
}

fn sample_patch(image: &GrayImage, cx: u32, cy: u32, r: u32) -> Vec<u8> {
    let mut patch = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
    for y in cy - r..=cy + r {
        for x in cx - r..=cx + r {
            patch.push(image.get_pixel(x, y).0[0]);
        }
    }
    patch
}

fn l1_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| u32::from(x.abs_diff(y)))
        .sum()
}

/// Nearest-neighbor matching of query descriptors against one observation,
/// with an optional ratio test. Returns (query index, train index, distance)
/// triples.
fn nearest_neighbor_matches(
    query: &FeatureSet,
    train: &FeatureSet,
    matcher: &MatcherParams,
) -> Vec<(usize, usize, u32)> {
    let mut corr = Vec::new();
    if train.is_empty() {
        return corr;
    }
    for (qi, qdesc) in query.descriptors.iter().enumerate() {
        let mut best = u32::MAX;
        let mut second = u32::MAX;
        let mut best_ti = 0usize;
        for (ti, tdesc) in train.descriptors.iter().enumerate() {
            let d = l1_distance(qdesc, tdesc);
            if d < best {
                second = best;
                best = d;
                best_ti = ti;
            } else if d < second {
                second = d;
            }
        }
        if matcher.do_ratio_test
            && second != u32::MAX
            && best as f32 >= matcher.ratio_threshold * second as f32
        {
            continue;
        }
        corr.push((qi, best_ti, best));
    }
    corr
}

/// Consensus step: hypothesize the displacement of each correspondence in
/// turn (up to the iteration budget) and keep the one explaining the most
/// correspondences within the projection error bound.
fn vote_displacement(
    corr: &[(usize, usize, u32)],
    query: &FeatureSet,
    train: &FeatureSet,
    guess: &GuessParams,
) -> (f32, f32, Vec<usize>) {
    let displacement = |&(qi, ti, _): &(usize, usize, u32)| {
        let q = query.keypoints[qi];
        let t = train.keypoints[ti];
        (q.x - t.x, q.y - t.y)
    };
    let mut best_inliers: Vec<usize> = Vec::new();
    let mut best_d = (0.0f32, 0.0f32);
    let budget = (guess.ransac_iterations as usize).min(corr.len());
    for hyp in corr.iter().take(budget) {
        let (hx, hy) = displacement(hyp);
        let inliers: Vec<usize> = corr
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                let (dx, dy) = displacement(c);
                (dx - hx).abs() <= guess.max_projection_error
                    && (dy - hy).abs() <= guess.max_projection_error
            })
            .map(|(i, _)| i)
            .collect();
        if inliers.len() > best_inliers.len() {
            best_inliers = inliers;
            best_d = (hx, hy);
        }
    }
    (best_d.0, best_d.1, best_inliers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Pose;
    use crate::training::TexturedObject;

    fn textured_image(w: u32, h: u32, seed: u32) -> GrayImage {
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

    fn base_from_image(name: &str, img: &GrayImage) -> TrainingBase {
        let features = PatchEngine
            .extract(&FeatureExtractionParams::default(), img)
            .unwrap();
        TrainingBase::new(vec![TexturedObject {
            id: 0,
            name: name.to_string(),
            observations: vec![Observation {
                features,
                pose: Pose::identity(),
            }],
        }])
    }

    #[test]
    fn test_extract_grid_density() {
        let img = textured_image(64, 64, 1);
        let set = PatchEngine
            .extract(&FeatureExtractionParams::default(), &img)
            .unwrap();
        // 8x8 grid positions at spacing 8 within the 64x64 frame.
        assert_eq!(set.len(), 64);
        assert_eq!(set.descriptors[0].len(), 49);
    }

    #[test]
    fn test_extract_skips_flat_patches() {
        let img = GrayImage::from_pixel(64, 64, image::Luma([128]));
        let set = PatchEngine
            .extract(&FeatureExtractionParams::default(), &img)
            .unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_self_match_is_dense_and_aligned() {
        let img = textured_image(64, 64, 3);
        let base = base_from_image("tea_box", &img);
        let query = PatchEngine
            .extract(&FeatureExtractionParams::default(), &img)
            .unwrap();
        let guesses = PatchEngine
            .match_base(
                &query,
                &base,
                &MatcherParams::default(),
                &GuessParams::default(),
            )
            .unwrap();
        assert_eq!(guesses.len(), 1);
        let g = &guesses[0];
        assert_eq!(g.object_name, "tea_box");
        assert_eq!(g.inliers.len(), 64);
        // Zero displacement keeps the observation pose.
        assert!(g.pose.translation.norm() < 1e-9);
    }

    #[test]
    fn test_offset_scene_votes_displacement() {
        let obj = textured_image(64, 64, 5);
        let base = base_from_image("milk_carton", &obj);
        // Paste the object at (16, 16) on a flat background.
        let scene = GrayImage::from_fn(96, 96, |x, y| {
            if (16..80).contains(&x) && (16..80).contains(&y) {
                *obj.get_pixel(x - 16, y - 16)
            } else {
                image::Luma([0])
            }
        });
        let query = PatchEngine
            .extract(&FeatureExtractionParams::default(), &scene)
            .unwrap();
        let guesses = PatchEngine
            .match_base(
                &query,
                &base,
                &MatcherParams::default(),
                &GuessParams::default(),
            )
            .unwrap();
        assert_eq!(guesses.len(), 1);
        let g = &guesses[0];
        assert!(g.inliers.len() >= 36);
        // Displacement of 16 pixels maps to 16 * PIXEL_SIZE_M of translation.
        assert!((g.pose.translation.x - 0.016).abs() < 1e-9);
        assert!((g.pose.translation.y - 0.016).abs() < 1e-9);
    }

    #[test]
    fn test_no_guess_below_min_inliers() {
        let base = base_from_image("tea_box", &textured_image(64, 64, 7));
        let query = PatchEngine
            .extract(
                &FeatureExtractionParams::default(),
                &GrayImage::from_pixel(96, 96, image::Luma([0])),
            )
            .unwrap();
        let guesses = PatchEngine
            .match_base(
                &query,
                &base,
                &MatcherParams::default(),
                &GuessParams::default(),
            )
            .unwrap();
        assert!(guesses.is_empty());
    }
}
