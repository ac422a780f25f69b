//! The experiment runner: a long-lived loop that polls the database for
//! pending experiments, carries them out over a test corpus, and persists
//! the scored responses.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rusqlite::Connection;
use tracing::{error, info};

use crate::cloud::PointCloud;
use crate::error::{Error, Result};
use crate::experiment::cache::{TrainFeatures, TrainFeaturesCache};
use crate::experiment::paramsel::{
    select_experiments_not_run, sort_experiments_by_train_features, Experiment,
};
use crate::experiment::response::{CutSseResponseFunction, ResponseFunction};
use crate::features::{FeatureEngine, StageParams};
use crate::ground::load_ground_truth;
use crate::io::{cloud_path, load_image, load_pcd};
use crate::recognition::{Query, Recognizer, SetResult};

/// Carries out pending experiments against a test corpus. All work is
/// synchronous; one experiment runs to completion before the next starts.
pub struct ExperimentRunner {
    conn: Connection,
    cache: TrainFeaturesCache,
    data_root: PathBuf,
    engine: Arc<dyn FeatureEngine>,
    poll_interval: Duration,
    /// Observed between batches only; there is no cancellation point inside
    /// a running experiment.
    pub terminate: Arc<AtomicBool>,
    bases_loaded: u64,
}

impl ExperimentRunner {
    pub fn new(
        conn: Connection,
        cache: TrainFeaturesCache,
        data_root: impl Into<PathBuf>,
        engine: Arc<dyn FeatureEngine>,
    ) -> Self {
        Self {
            conn,
            cache,
            data_root: data_root.into(),
            engine,
            poll_interval: Duration::from_secs(3),
            terminate: Arc::new(AtomicBool::new(false)),
            bases_loaded: 0,
        }
    }

    pub fn set_poll_interval(&mut self, poll_interval: Duration) {
        self.poll_interval = poll_interval;
    }

    /// Number of training-base loads so far. Consecutive experiments sharing
    /// a training feature configuration load exactly once.
    pub fn bases_loaded(&self) -> u64 {
        self.bases_loaded
    }

    /// Daemon mode: dispatches batches until the terminate flag is set,
    /// sleeping between polls when the queue is empty.
    pub fn run(&mut self) -> Result<()> {
        while !self.terminate.load(Ordering::Relaxed) {
            info!("querying database for experiments to carry out");
            if !self.run_once()? {
                thread::sleep(self.poll_interval);
            }
        }
        Ok(())
    }

    /// Processes one batch of pending experiments. Returns whether any work
    /// was found.
    pub fn run_once(&mut self) -> Result<bool> {
        let mut exps = select_experiments_not_run(&self.conn)?;
        if exps.is_empty() {
            return Ok(false);
        }
        // Group experiments sharing training features so the loaded
        // recognizer is reused; reloading only happens on a key change.
        sort_experiments_by_train_features(&mut exps);

        let mut current: Option<TrainFeatures> = None;
        let mut recognizer: Option<Recognizer> = None;
        for mut exp in exps {
            if exp.skip {
                // Toggled externally between select and execution.
                info!("skipping experiment (id={})", exp.id);
                continue;
            }
            match self.run_single(&mut exp, &mut current, &mut recognizer) {
                Ok(()) => {
                    exp.serialize(&self.conn)?;
                    info!(
                        "experiment finished (id={}, response={})",
                        exp.id, exp.response.value
                    );
                }
                Err(Error::Data(msg)) => {
                    error!("{msg}");
                    error!("experiment failed, no results recorded (id={})", exp.id);
                    error!(
                        "before running the experiment again, clear the 'skip' flag in \
                         the experiment record (id={})",
                        exp.id
                    );
                    exp.skip = true;
                    current = None;
                    recognizer = None;
                    exp.serialize(&self.conn)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    fn run_single(
        &mut self,
        exp: &mut Experiment,
        current: &mut Option<TrainFeatures>,
        recognizer: &mut Option<Recognizer>,
    ) -> Result<()> {
        let tr_feat = TrainFeatures::new(exp.train_set.clone(), exp.paramset.train_pms_fe.clone());
        if current.as_ref() != Some(&tr_feat) || recognizer.is_none() {
            let train_dir = self.data_root.join(&exp.train_set);
            if !self.cache.train_features_exist(&tr_feat)? {
                tr_feat.generate(&*self.engine, &train_dir)?;
                self.cache.add_train_features(&tr_feat, &train_dir, true)?;
            }
            let features_dir = self.cache.train_features_dir(&tr_feat)?;
            *recognizer = Some(Recognizer::new(
                self.engine.clone(),
                &features_dir,
                StageParams::default(),
                StageParams::default(),
            )?);
            self.bases_loaded += 1;
            *current = Some(tr_feat);
        }
        let rec = match recognizer.as_mut() {
            Some(rec) => rec,
            None => return Err(Error::Data(format!(
                "no recognizer available for experiment id={}",
                exp.id
            ))),
        };
        rec.reset_stats();
        rec.reconfigure(&exp.paramset)?;
        self.run_experiment(rec, exp)
    }

    fn run_experiment(&self, rec: &mut Recognizer, exp: &mut Experiment) -> Result<()> {
        let test_dir = self.data_root.join(&exp.test_set);
        let ground = load_ground_truth(&test_dir.join("testdesc.txt"))?;
        let mut result = SetResult::new();
        for img_name in ground.keys() {
            let img_path = test_dir.join(img_name);
            let image = load_image(&img_path).map_err(|_| {
                Error::Data(format!(
                    "cannot read image '{}' for experiment with id={}. Check whether \
                     the image file exists; full path is '{}'",
                    img_name,
                    exp.id,
                    img_path.display()
                ))
            })?;
            let cp = cloud_path(&img_path);
            let cloud = if cp.is_file() {
                load_pcd(&cp)?
            } else {
                PointCloud::empty()
            };
            let query = Query { image, cloud };
            let recognition = rec.recognize(&query)?;
            match recognition.locate_choice {
                Some(choice) => {
                    info!("recognized {} on {}", choice.object_name, img_name);
                    result.put(img_name.clone(), choice);
                }
                None => info!("recognized NONE on {}", img_name),
            }
        }

        let response_fn = CutSseResponseFunction::new(
            exp.paramset.max_trans_error,
            exp.paramset.max_angle_error,
        );
        response_fn.compute(&result, &ground, &mut exp.response);
        rec.stats().populate_response(&mut exp.response);
        exp.record_time();
        exp.record_commit();
        exp.has_run = true;
        Ok(())
    }
}
