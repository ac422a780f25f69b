//! Content-addressed cache of extracted training features.
//!
//! Feature extraction over a training set is by far the most expensive
//! preprocessing step, so its results are cached under
//! `<cache_dir>/<train_set>/<digest>` where the digest is the content hash
//! of the extraction parameters. Experiments sharing a training feature
//! configuration then reuse one cache entry.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::features::{
    params_digest, read_fe_params, write_fe_params, FeatureEngine, FeatureExtractionParams,
};
use crate::io::load_image;
use crate::training::list_template_names;

/// A marker file held while a directory is being mutated, so that an
/// interrupted run is externally detectable as dirty.
#[derive(Debug, Clone)]
pub struct FileFlag {
    path: PathBuf,
}

impl FileFlag {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set(&self) -> Result<()> {
        fs::write(&self.path, b"")?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// The cache key: a training set plus the feature extraction configuration
/// used on it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainFeatures {
    pub train_set: String,
    pub fe_params: FeatureExtractionParams,
}

impl TrainFeatures {
    pub fn new(train_set: impl Into<String>, fe_params: FeatureExtractionParams) -> Self {
        Self {
            train_set: train_set.into(),
            fe_params,
        }
    }

    /// Runs feature extraction over every view image of every template in
    /// the training directory, writing `<view>.features.yaml` files next to
    /// the images. The dirty flag is held for the duration; a crash leaves
    /// it behind for the cache to detect.
    pub fn generate(&self, engine: &dyn FeatureEngine, train_dir: &Path) -> Result<()> {
        let dirty = FileFlag::new(train_dir.join("dirty.flag"));
        dirty.set()?;
        for template in list_template_names(train_dir)? {
            let template_dir = train_dir.join(&template);
            info!("extracting features for template {}", template);
            let mut images: Vec<PathBuf> = fs::read_dir(&template_dir)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
                .collect();
            images.sort();
            for img_path in images {
                let image = load_image(&img_path)?;
                let features = engine.extract(&self.fe_params, &image)?;
                let stem = img_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                features.write_yaml(&template_dir.join(format!("{stem}.features.yaml")))?;
            }
        }
        dirty.clear()
    }
}

/// Filesystem cache keyed by (train set, extraction parameter digest).
#[derive(Debug, Clone)]
pub struct TrainFeaturesCache {
    cache_dir: PathBuf,
}

impl TrainFeaturesCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Deterministic location of a cache entry.
    pub fn train_features_dir(&self, tr_feat: &TrainFeatures) -> Result<PathBuf> {
        let digest = params_digest(&tr_feat.fe_params)?;
        Ok(self.cache_dir.join(&tr_feat.train_set).join(digest))
    }

    pub fn train_features_exist(&self, tr_feat: &TrainFeatures) -> Result<bool> {
        Ok(self.train_features_dir(tr_feat)?.exists())
    }

    /// Copies generated features (and view poses) from the training
    /// directory into the cache. Refuses to overwrite an existing entry and
    /// refuses to read from a dirty training directory. With
    /// `consistency_check`, the training directory's own extraction
    /// configuration must hash identically to the requested one, guarding
    /// against silently mixing parameters.
    pub fn add_train_features(
        &self,
        tr_feat: &TrainFeatures,
        train_dir: &Path,
        consistency_check: bool,
    ) -> Result<()> {
        if self.train_features_exist(tr_feat)? {
            return Err(Error::CacheState(format!(
                "train features already exist for '{}'",
                tr_feat.train_set
            )));
        }
        let dirty = FileFlag::new(train_dir.join("dirty.flag"));
        if dirty.exists() {
            return Err(Error::CacheState(format!(
                "discovered possible inconsistency in '{}': the extraction of features \
                 might not have been complete. Flag '{}' exists; re-run feature \
                 extraction and remove the flag to resolve this.",
                train_dir.display(),
                dirty.path().display()
            )));
        }
        if consistency_check {
            let stored = read_fe_params(&train_dir.join("features.config.yaml")).map_err(|e| {
                Error::Data(format!(
                    "cannot read stored feature configuration in '{}': {}",
                    train_dir.display(),
                    e
                ))
            })?;
            let stored_digest = params_digest(&stored)?;
            let wanted_digest = params_digest(&tr_feat.fe_params)?;
            if stored_digest != wanted_digest {
                return Err(Error::Data(format!(
                    "cannot add train features, feature extraction parameter mismatch \
                     detected. Make sure the features.config.yaml in the training base \
                     directory matches the supplied feature configuration. Checksums \
                     {stored_digest} (stored) and {wanted_digest} (supplied)"
                )));
            }
        }

        let entry_dir = self.train_features_dir(tr_feat)?;
        fs::create_dir_all(&entry_dir)?;
        let templates = list_template_names(train_dir)?;
        for template in &templates {
            let src_dir = train_dir.join(template);
            let dst_dir = entry_dir.join(template);
            fs::create_dir_all(&dst_dir)?;
            for entry in fs::read_dir(&src_dir)? {
                let path = entry?.path();
                let fname = path
                    .file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if fname.ends_with(".features.yaml") || fname.ends_with(".pose.yaml") {
                    fs::copy(&path, dst_dir.join(&fname))?;
                }
            }
        }
        let mut config = templates.iter().cloned().collect::<Vec<_>>().join("\n");
        config.push('\n');
        fs::write(entry_dir.join("config.txt"), config)?;
        write_fe_params(&entry_dir.join("features.config.yaml"), &tr_feat.fe_params)
    }
}
