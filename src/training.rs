//! Training objects and the bases that own them.
//!
//! Object ids are indices local to one `TrainingBase`. An object must never
//! be aliased into a second base; build an independent copy with
//! [`TexturedObject::detached_copy`] instead.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::features::FeatureSet;
use crate::geometry::Pose;

/// One reference view of a training object: extracted features plus the
/// known pose of the object in that view.
#[derive(Debug, Clone)]
pub struct Observation {
    pub features: FeatureSet,
    pub pose: Pose,
}

/// A named rigid textured object with one or more reference observations.
/// Immutable once loaded.
#[derive(Debug, Clone)]
pub struct TexturedObject {
    /// Index within the owning base; assigned by `TrainingBase::new`.
    pub id: usize,
    pub name: String,
    pub observations: Vec<Observation>,
}

impl TexturedObject {
    /// Structurally independent copy for use in a different base. The id is
    /// reset; the new base assigns its own.
    pub fn detached_copy(&self) -> TexturedObject {
        TexturedObject {
            id: 0,
            name: self.name.clone(),
            observations: self.observations.clone(),
        }
    }
}

/// An ordered collection of training objects. Rebuilt whenever the object
/// set changes.
#[derive(Debug, Clone, Default)]
pub struct TrainingBase {
    objects: Vec<TexturedObject>,
}

impl TrainingBase {
    pub fn new(mut objects: Vec<TexturedObject>) -> Self {
        for (i, obj) in objects.iter_mut().enumerate() {
            obj.id = i;
        }
        Self { objects }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn objects(&self) -> &[TexturedObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&TexturedObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn template_names(&self) -> BTreeSet<String> {
        self.objects.iter().map(|o| o.name.clone()).collect()
    }
}

/// Lists the template names of a training directory: its immediate
/// subdirectories, sorted.
pub fn list_template_names(dir: &Path) -> Result<BTreeSet<String>> {
    if !dir.is_dir() {
        return Err(Error::Config(format!(
            "training directory '{}' does not exist",
            dir.display()
        )));
    }
    let mut names = BTreeSet::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

/// Loads a training base from a features directory. Template names come from
/// `config.txt` when present, otherwise from the subdirectory listing. Each
/// template directory contributes one observation per `<view>.features.yaml`
/// file, paired with its `<view>.pose.yaml`. An existing but empty directory
/// yields an empty base.
pub fn load_training_base(dir: &Path) -> Result<TrainingBase> {
    if !dir.is_dir() {
        return Err(Error::Config(format!(
            "training base directory '{}' does not exist",
            dir.display()
        )));
    }
    let config = dir.join("config.txt");
    let names: Vec<String> = if config.is_file() {
        fs::read_to_string(&config)?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        list_template_names(dir)?.into_iter().collect()
    };

    let mut objects = Vec::with_capacity(names.len());
    for name in names {
        let obj_dir = dir.join(&name);
        if !obj_dir.is_dir() {
            return Err(Error::Config(format!(
                "template '{}' listed in '{}' has no directory",
                name,
                config.display()
            )));
        }
        let mut stems: Vec<String> = fs::read_dir(&obj_dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let fname = e.file_name().to_string_lossy().into_owned();
                fname
                    .strip_suffix(".features.yaml")
                    .map(|stem| stem.to_string())
            })
            .collect();
        stems.sort();

        let mut observations = Vec::with_capacity(stems.len());
        for stem in stems {
            let features = FeatureSet::read_yaml(&obj_dir.join(format!("{stem}.features.yaml")))?;
            let pose_path = obj_dir.join(format!("{stem}.pose.yaml"));
            if !pose_path.is_file() {
                return Err(Error::Config(format!(
                    "missing pose file '{}' for view '{}'",
                    pose_path.display(),
                    stem
                )));
            }
            let pose = Pose::read_yaml(&pose_path)?;
            observations.push(Observation { features, pose });
        }
        objects.push(TexturedObject {
            id: 0,
            name,
            observations,
        });
    }
    Ok(TrainingBase::new(objects))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::KeyPoint;

    fn object(name: &str) -> TexturedObject {
        TexturedObject {
            id: 99,
            name: name.to_string(),
            observations: vec![Observation {
                features: FeatureSet {
                    keypoints: vec![KeyPoint { x: 1.0, y: 2.0 }],
                    descriptors: vec![vec![0, 1, 2]],
                },
                pose: Pose::identity(),
            }],
        }
    }

    #[test]
    fn test_base_assigns_ids_by_index() {
        let base = TrainingBase::new(vec![object("a"), object("b"), object("c")]);
        let ids: Vec<usize> = base.objects().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_detached_copy_is_independent() {
        let base = TrainingBase::new(vec![object("a"), object("b")]);
        let copy = base.objects()[1].detached_copy();
        assert_eq!(copy.id, 0);
        assert_eq!(copy.name, "b");
        // Building a single-object base re-assigns ids locally and leaves the
        // original base untouched.
        let single = TrainingBase::new(vec![copy]);
        assert_eq!(single.objects()[0].id, 0);
        assert_eq!(base.objects()[1].id, 1);
    }

    #[test]
    fn test_load_missing_directory_is_config_error() {
        let err = load_training_base(Path::new("/nonexistent/base")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_empty_directory_yields_empty_base() {
        let dir = tempfile::tempdir().unwrap();
        let base = load_training_base(dir.path()).unwrap();
        assert!(base.is_empty());
    }

    #[test]
    fn test_load_from_config_txt() {
        let dir = tempfile::tempdir().unwrap();
        let obj_dir = dir.path().join("tea_box");
        fs::create_dir(&obj_dir).unwrap();
        let fs_set = FeatureSet {
            keypoints: vec![KeyPoint { x: 3.0, y: 3.0 }],
            descriptors: vec![vec![7; 9]],
        };
        fs_set
            .write_yaml(&obj_dir.join("view_000.features.yaml"))
            .unwrap();
        Pose::identity()
            .write_yaml(&obj_dir.join("view_000.pose.yaml"))
            .unwrap();
        fs::write(dir.path().join("config.txt"), "tea_box\n").unwrap();

        let base = load_training_base(dir.path()).unwrap();
        assert_eq!(base.len(), 1);
        assert_eq!(base.objects()[0].name, "tea_box");
        assert_eq!(base.objects()[0].observations.len(), 1);
    }
}
