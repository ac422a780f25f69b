//! Scheduler scenarios: batch execution, recognizer reuse across experiments
//! sharing training features, and per-experiment failure isolation.

mod common;

use std::fs;
use std::sync::Arc;

use clutrec::db::db_open;
use clutrec::engine::PatchEngine;
use clutrec::experiment::{Experiment, ExperimentRunner, TrainFeaturesCache};
use clutrec::ground::{write_label_set, LabelSet, NamedPose};

use common::{scene_cloud, scene_with_object, shifted_pose, textured_image, write_train_set};

fn paramset_for_fixtures() -> clutrec::experiment::Paramset {
    let mut paramset = clutrec::experiment::Paramset::default();
    paramset.detect_pms_guess.min_inliers = 20;
    paramset.locate_pms_guess.min_inliers = 20;
    paramset.pms_choice.accept_threshold = 20.0;
    paramset
}

/// Writes a two-scene test set: the first scene shows `milk_carton` (object
/// index 1) at a 16-pixel offset with a matching cloud and ground pose, the
/// second scene is empty.
fn write_test_set(root: &std::path::Path, test_set: &str) {
    let test_dir = root.join(test_set);
    fs::create_dir_all(&test_dir).unwrap();

    scene_with_object(&textured_image(64, 64, 5), 16, 16)
        .save(test_dir.join("scene_000.png"))
        .unwrap();
    clutrec::io::save_pcd(&test_dir.join("cloud_000.pcd"), &scene_cloud()).unwrap();
    write_label_set(
        &test_dir.join("scene_000.png.ground.yaml"),
        &LabelSet {
            labels: vec![NamedPose {
                name: "milk_carton".to_string(),
                pose: Some(shifted_pose(1, 16, 16)),
            }],
        },
    )
    .unwrap();

    textured_image(96, 96, 0)
        .save(test_dir.join("scene_001.png"))
        .unwrap();

    fs::write(
        test_dir.join("testdesc.txt"),
        "scene_000.png = milk_carton\nscene_001.png =\n",
    )
    .unwrap();
}

#[test]
fn runner_executes_batch_and_reuses_one_training_base() {
    let root = tempfile::tempdir().unwrap();
    let params = clutrec::features::FeatureExtractionParams::default();
    write_train_set(
        root.path(),
        "ias_train",
        &[("tea_box", 3), ("milk_carton", 5)],
        &params,
    );
    write_test_set(root.path(), "clutter_test");

    let conn = db_open(&root.path().join("experiments.sqlite3")).unwrap();
    for threshold in [20.0f32, 25.0] {
        let mut exp = Experiment {
            train_set: "ias_train".to_string(),
            test_set: "clutter_test".to_string(),
            paramset: paramset_for_fixtures(),
            ..Default::default()
        };
        exp.paramset.pms_choice.accept_threshold = threshold;
        exp.serialize(&conn).unwrap();
    }

    let runner_conn = db_open(&root.path().join("experiments.sqlite3")).unwrap();
    let cache = TrainFeaturesCache::new(root.path().join("train_cache"));
    let mut runner =
        ExperimentRunner::new(runner_conn, cache, root.path(), Arc::new(PatchEngine));
    assert!(runner.run_once().unwrap());

    // Both experiments share the training feature configuration, so the
    // training base was loaded exactly once.
    assert_eq!(runner.bases_loaded(), 1);

    let conn = db_open(&root.path().join("experiments.sqlite3")).unwrap();
    for id in [1i64, 2] {
        let exp = Experiment::deserialize(&conn, id).unwrap();
        assert!(exp.has_run, "experiment {id} should have run");
        assert!(!exp.skip);
        assert!(!exp.time.is_empty());
        assert!(!exp.vcs_commit.is_empty());

        // Scene 0 is a clean hit, scene 1 a clean true negative.
        assert!(exp.response.value < 1e-4);
        assert_eq!(exp.response.succ_rate, 0.5);
        assert_eq!(exp.response.none_rate, 0.0);
        assert_eq!(exp.response.mislabel_rate, 0.0);
        assert_eq!(exp.response.detect_tp, 1);
        assert_eq!(exp.response.detect_tn, 1);
        assert!(exp.response.sipc_score.final_score > 0.99);
        assert!(exp.response.avg_keypoints > 0.0);
        assert!(exp.response.avg_detect_guesses > 0.0);
    }

    // Nothing left to do.
    assert!(!runner.run_once().unwrap());
}

#[test]
fn consistency_mismatch_skips_only_the_offending_experiment() {
    let root = tempfile::tempdir().unwrap();
    let params = clutrec::features::FeatureExtractionParams::default();
    write_train_set(root.path(), "ias_train", &[("milk_carton", 5)], &params);
    write_test_set(root.path(), "clutter_test");

    let conn = db_open(&root.path().join("experiments.sqlite3")).unwrap();
    for spacing in [8u32, 8, 4] {
        let mut exp = Experiment {
            train_set: "ias_train".to_string(),
            test_set: "clutter_test".to_string(),
            paramset: paramset_for_fixtures(),
            ..Default::default()
        };
        exp.paramset.train_pms_fe.grid_spacing = spacing;
        exp.serialize(&conn).unwrap();
    }

    let runner_conn = db_open(&root.path().join("experiments.sqlite3")).unwrap();
    let cache = TrainFeaturesCache::new(root.path().join("train_cache"));
    let mut runner =
        ExperimentRunner::new(runner_conn, cache, root.path(), Arc::new(PatchEngine));
    assert!(runner.run_once().unwrap());

    // The stored features.config.yaml only matches the default spacing, so
    // the cache refuses the odd configuration out; that experiment is
    // skipped, the two matching ones run against a single loaded base.
    let conn = db_open(&root.path().join("experiments.sqlite3")).unwrap();
    let ran: Vec<bool> = (1..=3)
        .map(|id| Experiment::deserialize(&conn, id).unwrap().has_run)
        .collect();
    let skipped: Vec<bool> = (1..=3)
        .map(|id| Experiment::deserialize(&conn, id).unwrap().skip)
        .collect();
    assert_eq!(ran.iter().filter(|&&b| b).count(), 2);
    assert_eq!(skipped.iter().filter(|&&b| b).count(), 1);
    assert_eq!(runner.bases_loaded(), 1);
}

#[test]
fn missing_test_image_marks_experiment_skipped() {
    let root = tempfile::tempdir().unwrap();
    let params = clutrec::features::FeatureExtractionParams::default();
    write_train_set(root.path(), "ias_train", &[("tea_box", 3)], &params);

    let test_dir = root.path().join("broken_test");
    fs::create_dir_all(&test_dir).unwrap();
    fs::write(test_dir.join("testdesc.txt"), "missing.png = tea_box\n").unwrap();

    let conn = db_open(&root.path().join("experiments.sqlite3")).unwrap();
    let mut exp = Experiment {
        train_set: "ias_train".to_string(),
        test_set: "broken_test".to_string(),
        paramset: paramset_for_fixtures(),
        ..Default::default()
    };
    exp.serialize(&conn).unwrap();

    let runner_conn = db_open(&root.path().join("experiments.sqlite3")).unwrap();
    let cache = TrainFeaturesCache::new(root.path().join("train_cache"));
    let mut runner =
        ExperimentRunner::new(runner_conn, cache, root.path(), Arc::new(PatchEngine));
    // The batch completes despite the failure.
    assert!(runner.run_once().unwrap());

    let conn = db_open(&root.path().join("experiments.sqlite3")).unwrap();
    let exp = Experiment::deserialize(&conn, 1).unwrap();
    assert!(exp.skip, "failed experiment must be disabled");
    assert!(!exp.has_run);

    // Skipped experiments are no longer selected.
    assert!(!runner.run_once().unwrap());
}
