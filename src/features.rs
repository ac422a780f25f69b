//! Feature sets, per-stage parameter bundles, and the seam to the external
//! feature/matching engine.

use std::fs::File;
use std::path::Path;

use image::GrayImage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::recognition::Guess;
use crate::training::TrainingBase;

/// 2-D keypoint in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
}

/// Keypoints plus their descriptors, as extracted from one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub keypoints: Vec<KeyPoint>,
    pub descriptors: Vec<Vec<u8>>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn read_yaml(path: &Path) -> Result<FeatureSet> {
        Ok(serde_yaml::from_reader(File::open(path)?)?)
    }

    pub fn write_yaml(&self, path: &Path) -> Result<()> {
        serde_yaml::to_writer(File::create(path)?, self)?;
        Ok(())
    }
}

/// Feature extraction configuration. Hashed to form the cache key for
/// precomputed training features, so every field matters for content
/// addressing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureExtractionParams {
    pub detector_type: String,
    /// Keypoint grid pitch in pixels.
    pub grid_spacing: u32,
    /// Half-width of the descriptor patch.
    pub patch_radius: u32,
    /// Minimum intensity range within a patch for it to yield a keypoint.
    pub min_contrast: f32,
}

impl Default for FeatureExtractionParams {
    fn default() -> Self {
        Self {
            detector_type: "grid".to_string(),
            grid_spacing: 8,
            patch_radius: 3,
            min_contrast: 8.0,
        }
    }
}

/// SHA-256 hex digest of the canonical YAML serialization of the extraction
/// parameters. Changing any single field changes the digest.
pub fn params_digest(params: &FeatureExtractionParams) -> Result<String> {
    let yaml = serde_yaml::to_string(params)?;
    Ok(format!("{:x}", Sha256::digest(yaml.as_bytes())))
}

pub fn read_fe_params(path: &Path) -> Result<FeatureExtractionParams> {
    Ok(serde_yaml::from_reader(File::open(path)?)?)
}

pub fn write_fe_params(path: &Path, params: &FeatureExtractionParams) -> Result<()> {
    serde_yaml::to_writer(File::create(path)?, params)?;
    Ok(())
}

/// Descriptor matcher configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherParams {
    pub matcher_type: String,
    pub knn: u32,
    pub do_ratio_test: bool,
    pub ratio_threshold: f32,
}

impl Default for MatcherParams {
    fn default() -> Self {
        Self {
            matcher_type: "brute-force-l1".to_string(),
            knn: 1,
            do_ratio_test: false,
            ratio_threshold: 0.8,
        }
    }
}

/// Guess generator configuration: the consensus step that turns raw
/// correspondences into pose hypotheses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuessParams {
    pub min_inliers: u32,
    pub max_projection_error: f32,
    pub ransac_iterations: u32,
}

impl Default for GuessParams {
    fn default() -> Self {
        Self {
            min_inliers: 15,
            max_projection_error: 2.0,
            ransac_iterations: 100,
        }
    }
}

/// Parameter bundle for one pipeline stage: feature extraction, matching and
/// guess generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageParams {
    pub features: FeatureExtractionParams,
    pub matcher: MatcherParams,
    pub guess: GuessParams,
}

impl StageParams {
    /// Loads a stage configuration from a YAML file. An unreadable or
    /// malformed file is a configuration error.
    pub fn from_file(path: &Path) -> Result<StageParams> {
        let f = File::open(path).map_err(|e| {
            Error::Config(format!(
                "cannot read configuration file '{}': {}",
                path.display(),
                e
            ))
        })?;
        serde_yaml::from_reader(f).map_err(|e| {
            Error::Config(format!(
                "malformed configuration file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    pub fn write_file(&self, path: &Path) -> Result<()> {
        serde_yaml::to_writer(File::create(path)?, self)?;
        Ok(())
    }
}

/// Seam to the external feature/matching engine: descriptor extraction plus
/// matching with pose hypothesis generation. Implementations return at most
/// one guess per plausibly-matched object; each guess carries the estimated
/// pose, its inlier indices and the full correspondence list.
pub trait FeatureEngine: Send + Sync {
    fn extract(&self, params: &FeatureExtractionParams, image: &GrayImage) -> Result<FeatureSet>;

    fn match_base(
        &self,
        query: &FeatureSet,
        base: &TrainingBase,
        matcher: &MatcherParams,
        guess: &GuessParams,
    ) -> Result<Vec<Guess>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_deterministic() {
        let p = FeatureExtractionParams::default();
        assert_eq!(params_digest(&p).unwrap(), params_digest(&p).unwrap());
    }

    #[test]
    fn test_digest_sensitive_to_every_scalar() {
        let base = FeatureExtractionParams::default();
        let d0 = params_digest(&base).unwrap();

        let mut p = base.clone();
        p.detector_type = "harris".to_string();
        assert_ne!(d0, params_digest(&p).unwrap());

        let mut p = base.clone();
        p.grid_spacing += 1;
        assert_ne!(d0, params_digest(&p).unwrap());

        let mut p = base.clone();
        p.patch_radius += 1;
        assert_ne!(d0, params_digest(&p).unwrap());

        let mut p = base.clone();
        p.min_contrast += 0.5;
        assert_ne!(d0, params_digest(&p).unwrap());
    }

    #[test]
    fn test_stage_params_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detect.config.yaml");
        let mut params = StageParams::default();
        params.guess.min_inliers = 42;
        params.write_file(&path).unwrap();
        let read = StageParams::from_file(&path).unwrap();
        assert_eq!(params, read);
    }

    #[test]
    fn test_stage_params_missing_file_is_config_error() {
        let err = StageParams::from_file(Path::new("/nonexistent/detect.config.yaml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_stage_params_malformed_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "features: [not, a, mapping]").unwrap();
        let err = StageParams::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_feature_set_yaml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view.features.yaml");
        let fs = FeatureSet {
            keypoints: vec![KeyPoint { x: 3.0, y: 11.0 }],
            descriptors: vec![vec![1, 2, 3, 4]],
        };
        fs.write_yaml(&path).unwrap();
        assert_eq!(fs, FeatureSet::read_yaml(&path).unwrap());
    }
}
