//! Ground truth for labeled test corpora.
//!
//! A test set carries a `testdesc.txt` descriptor mapping every image name to
//! the object labels visible in it (`image_00000.png = tea_box milk_carton`,
//! an empty right-hand side marks an empty scene). An optional
//! `<image>.ground.yaml` per image refines the labels with known poses; when
//! present it is authoritative for that image.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::pose::{Pose, PoseYaml};

/// One expected object on a scene, with its pose when known.
#[derive(Debug, Clone)]
pub struct NamedPose {
    pub name: String,
    pub pose: Option<Pose>,
}

/// The labels expected on one test scene. Empty for empty scenes.
#[derive(Debug, Clone, Default)]
pub struct LabelSet {
    pub labels: Vec<NamedPose>,
}

impl LabelSet {
    pub fn on_scene(&self, name: &str) -> bool {
        self.labels.iter().any(|np| np.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Ground truth for a whole test set, keyed by image name.
pub type SetGroundTruth = BTreeMap<String, LabelSet>;

#[derive(Debug, Serialize, Deserialize)]
struct LabelSetYaml(BTreeMap<String, PoseYaml>);

/// Reads a per-image ground file: a YAML mapping of object name to pose.
pub fn read_label_set(path: &Path) -> Result<LabelSet> {
    let raw: LabelSetYaml = serde_yaml::from_reader(File::open(path)?)?;
    Ok(LabelSet {
        labels: raw
            .0
            .into_iter()
            .map(|(name, pose)| NamedPose {
                name,
                pose: Some(pose.into()),
            })
            .collect(),
    })
}

/// Writes a per-image ground file for every label that carries a pose.
pub fn write_label_set(path: &Path, labels: &LabelSet) -> Result<()> {
    let raw = LabelSetYaml(
        labels
            .labels
            .iter()
            .filter_map(|np| {
                np.pose
                    .as_ref()
                    .map(|p| (np.name.clone(), PoseYaml::from(p)))
            })
            .collect(),
    );
    serde_yaml::to_writer(File::create(path)?, &raw)?;
    Ok(())
}

/// Parses `testdesc.txt` into label sets without pose information. A missing
/// descriptor is a data error, recoverable at the experiment level.
pub fn load_ground_truth_without_poses(testdesc: &Path) -> Result<SetGroundTruth> {
    let file = File::open(testdesc).map_err(|e| {
        Error::Data(format!(
            "cannot open testdesc file '{}', does it exist? ({})",
            testdesc.display(),
            e
        ))
    })?;
    let mut ground = SetGroundTruth::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let Some((key, val)) = line.split_once('=') else {
            continue;
        };
        let labels = val
            .split_whitespace()
            .map(|name| NamedPose {
                name: name.to_string(),
                pose: None,
            })
            .collect();
        ground.insert(key.trim().to_string(), LabelSet { labels });
    }
    Ok(ground)
}

/// Loads the full ground truth: the descriptor plus any per-image ground
/// files found next to it.
pub fn load_ground_truth(testdesc: &Path) -> Result<SetGroundTruth> {
    let mut ground = load_ground_truth_without_poses(testdesc)?;
    let dir = testdesc.parent().unwrap_or_else(|| Path::new(""));
    for (img_name, labels) in ground.iter_mut() {
        let ground_path = dir.join(format!("{img_name}.ground.yaml"));
        if ground_path.is_file() {
            *labels = read_label_set(&ground_path)?;
        }
    }
    Ok(ground)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use std::fs;

    #[test]
    fn test_parse_testdesc() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testdesc.txt");
        fs::write(
            &path,
            "image_00000.png = tea_box milk_carton\nimage_00001.png =\nnot a mapping line\n",
        )
        .unwrap();
        let ground = load_ground_truth_without_poses(&path).unwrap();
        assert_eq!(ground.len(), 2);
        let first = &ground["image_00000.png"];
        assert!(first.on_scene("tea_box"));
        assert!(first.on_scene("milk_carton"));
        assert!(!first.on_scene("juice_bottle"));
        assert!(ground["image_00001.png"].is_empty());
    }

    #[test]
    fn test_missing_testdesc_is_data_error() {
        let err = load_ground_truth_without_poses(Path::new("/nonexistent/testdesc.txt"))
            .unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }

    #[test]
    fn test_ground_yaml_overrides_labels() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("testdesc.txt"),
            "image_00000.png = tea_box\n",
        )
        .unwrap();
        let labels = LabelSet {
            labels: vec![NamedPose {
                name: "tea_box".to_string(),
                pose: Some(Pose::from_rvec_tvec(
                    Vector3::zeros(),
                    Vector3::new(0.1, 0.2, 0.5),
                )),
            }],
        };
        write_label_set(&dir.path().join("image_00000.png.ground.yaml"), &labels).unwrap();

        let ground = load_ground_truth(&dir.path().join("testdesc.txt")).unwrap();
        let np = &ground["image_00000.png"].labels[0];
        assert_eq!(np.name, "tea_box");
        let pose = np.pose.as_ref().unwrap();
        assert!((pose.translation - Vector3::new(0.1, 0.2, 0.5)).norm() < 1e-9);
    }
}
