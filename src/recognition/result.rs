//! Inputs and outputs of one recognition call.

use std::collections::HashMap;

use image::GrayImage;
use nalgebra::Point3;

use crate::cloud::PointCloud;
use crate::features::{FeatureSet, KeyPoint};
use crate::geometry::Pose;

/// A candidate recognition outcome: object identity, estimated pose, and the
/// correspondences supporting that pose. Created by the matching stage;
/// the inlier cloud is filled in by the 2-D→3-D mapping step.
#[derive(Debug, Clone)]
pub struct Guess {
    /// Id of the matched object within the base it was matched against.
    pub object_id: usize,
    pub object_name: String,
    pub pose: Pose,
    /// Query-image location of every correspondence behind this guess.
    pub image_points: Vec<KeyPoint>,
    /// Indices into `image_points` of the consensus inliers.
    pub inliers: Vec<usize>,
    /// Back-projected inlier points in the query cloud frame.
    pub inlier_cloud: Vec<Point3<f32>>,
}

impl Guess {
    /// Number of raw correspondences behind this guess.
    pub fn matches(&self) -> usize {
        self.image_points.len()
    }

    /// Image locations of the inlier correspondences.
    pub fn inlier_points(&self) -> Vec<KeyPoint> {
        self.inliers
            .iter()
            .filter_map(|&i| self.image_points.get(i).copied())
            .collect()
    }
}

/// The input pair for one recognition request. The cloud may be empty when
/// no depth data accompanies the image.
#[derive(Debug, Clone)]
pub struct Query {
    pub image: GrayImage,
    pub cloud: PointCloud,
}

/// One recognition call's output bundle.
#[derive(Debug, Clone)]
pub struct Recognition {
    /// Whether any acceptable guess was found. `locate_choice` is `Some` iff
    /// this is true.
    pub guess_made: bool,
    /// Detect-stage candidates, best-ranked first.
    pub detect_choices: Vec<Guess>,
    /// The accepted guess, refined by the locate stage unless locating was
    /// disabled.
    pub locate_choice: Option<Guess>,
    /// Features extracted from the query image.
    pub features: FeatureSet,
}

impl Recognition {
    pub fn none(features: FeatureSet) -> Self {
        Self {
            guess_made: false,
            detect_choices: Vec::new(),
            locate_choice: None,
            features,
        }
    }
}

/// Positive recognition outcomes of a whole test-set run, keyed by image
/// name. Queries that produced no acceptable guess have no entry.
#[derive(Debug, Clone, Default)]
pub struct SetResult {
    guesses: HashMap<String, Guess>,
}

impl SetResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, img_name: String, guess: Guess) {
        self.guesses.insert(img_name, guess);
    }

    pub fn guess_made(&self, img_name: &str) -> bool {
        self.guesses.contains_key(img_name)
    }

    pub fn get(&self, img_name: &str) -> Option<&Guess> {
        self.guesses.get(img_name)
    }

    pub fn len(&self) -> usize {
        self.guesses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guesses.is_empty()
    }
}
