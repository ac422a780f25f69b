//! The recognition core: detect candidates over the full training base, then
//! refine ranked candidates object-by-object until one passes the acceptance
//! threshold.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::cloud::map_to_cloud;
use crate::error::Result;
use crate::experiment::paramsel::Paramset;
use crate::features::{FeatureEngine, FeatureSet, StageParams};
use crate::recognition::ranking::{ranking_by_name, sort_by_ranking, GuessRanking, InliersRanking};
use crate::recognition::result::{Guess, Query, Recognition};
use crate::recognition::stats::RecognizerStats;
use crate::training::{load_training_base, TrainingBase};

/// Two-stage single-object recognizer. Not safe for concurrent `recognize`
/// calls; callers serialize access (the experiment runner reuses one
/// instance strictly sequentially).
pub struct Recognizer {
    engine: Arc<dyn FeatureEngine>,
    detect_params: StageParams,
    locate_params: StageParams,
    base: TrainingBase,
    ranking: Arc<dyn GuessRanking>,
    accept_threshold: f64,
    do_locate: bool,
    stats: RecognizerStats,
}

impl Recognizer {
    /// Builds a recognizer over the training base found in `features_dir`.
    /// A missing directory is a configuration error; an empty one yields an
    /// empty base that always reports "no guess".
    pub fn new(
        engine: Arc<dyn FeatureEngine>,
        features_dir: &Path,
        detect_params: StageParams,
        locate_params: StageParams,
    ) -> Result<Self> {
        let base = load_training_base(features_dir)?;
        Ok(Self {
            engine,
            detect_params,
            locate_params,
            base,
            ranking: Arc::new(InliersRanking),
            accept_threshold: f64::NEG_INFINITY,
            do_locate: true,
            stats: RecognizerStats::default(),
        })
    }

    /// Builds a recognizer from stage configuration files. Unreadable or
    /// malformed files are fatal here.
    pub fn from_config_files(
        engine: Arc<dyn FeatureEngine>,
        features_dir: &Path,
        detect_config: &Path,
        locate_config: &Path,
    ) -> Result<Self> {
        let detect_params = StageParams::from_file(detect_config)?;
        let locate_params = StageParams::from_file(locate_config)?;
        Self::new(engine, features_dir, detect_params, locate_params)
    }

    pub fn detect_params(&self) -> &StageParams {
        &self.detect_params
    }

    /// Writes through to the live detect-stage configuration.
    pub fn detect_params_mut(&mut self) -> &mut StageParams {
        &mut self.detect_params
    }

    pub fn locate_params(&self) -> &StageParams {
        &self.locate_params
    }

    /// Writes through to the live locate-stage configuration.
    pub fn locate_params_mut(&mut self) -> &mut StageParams {
        &mut self.locate_params
    }

    pub fn accept_threshold(&self) -> f64 {
        self.accept_threshold
    }

    pub fn set_accept_threshold(&mut self, accept_threshold: f64) {
        self.accept_threshold = accept_threshold;
    }

    pub fn ranking(&self) -> Arc<dyn GuessRanking> {
        self.ranking.clone()
    }

    pub fn set_ranking(&mut self, ranking: Arc<dyn GuessRanking>) {
        self.ranking = ranking;
    }

    pub fn do_locate(&self) -> bool {
        self.do_locate
    }

    pub fn set_do_locate(&mut self, do_locate: bool) {
        self.do_locate = do_locate;
    }

    /// Names of the objects this recognizer knows.
    pub fn template_names(&self) -> BTreeSet<String> {
        self.base.template_names()
    }

    pub fn stats(&self) -> RecognizerStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// Atomically replaces the acceptance threshold, ranking strategy and
    /// both stage parameter sets from a persisted paramset. The training
    /// base is kept, so one loaded recognizer serves many configurations as
    /// long as the training feature configuration itself is unchanged.
    pub fn reconfigure(&mut self, paramset: &Paramset) -> Result<()> {
        self.detect_params = StageParams {
            features: paramset.recog_pms_fe.clone(),
            matcher: paramset.detect_pms_match.clone(),
            guess: paramset.detect_pms_guess.clone(),
        };
        self.locate_params = StageParams {
            features: paramset.recog_pms_fe.clone(),
            matcher: paramset.locate_pms_match.clone(),
            guess: paramset.locate_pms_guess.clone(),
        };
        self.accept_threshold = f64::from(paramset.pms_choice.accept_threshold);
        self.ranking = ranking_by_name(&paramset.pms_choice.ranking)?;
        Ok(())
    }

    /// Attempts to find one object in the scene.
    ///
    /// Detect-stage guesses are ranked best-first; starting from the top
    /// candidate, each is relocated against a single-object base until the
    /// refined guess scores at least the acceptance threshold. A candidate
    /// whose locate stage yields nothing is rejected and the next one is
    /// tried. With locating disabled, the top detect candidate is gated by
    /// the threshold directly.
    pub fn recognize(&mut self, query: &Query) -> Result<Recognition> {
        self.stats.queries += 1;

        let features = self
            .engine
            .extract(&self.detect_params.features, &query.image)?;
        self.stats.acc_keypoints += features.len() as u64;

        let mut guesses = self.detect(&features)?;
        if guesses.is_empty() {
            // Worst case for a non-empty scene: nothing was detected at all.
            return Ok(Recognition::none(features));
        }

        let (w, h) = query.image.dimensions();
        for guess in &mut guesses {
            guess.inlier_cloud = map_to_cloud(&guess.inlier_points(), w, h, &query.cloud);
        }
        sort_by_ranking(&mut guesses, &*self.ranking);

        let mut choice: Option<Guess> = None;
        let mut choice_idx = 0usize;
        if self.do_locate {
            for (i, candidate) in guesses.iter().enumerate() {
                let Some(refined) = self.locate(&features, query, candidate)? else {
                    continue;
                };
                if self.ranking.score(&refined) >= self.accept_threshold {
                    choice = Some(refined);
                    choice_idx = i;
                    break;
                }
            }
        } else if self.ranking.score(&guesses[0]) >= self.accept_threshold {
            choice = Some(guesses[0].clone());
        }

        if let Some(chosen) = choice.as_mut() {
            chosen.inlier_cloud = map_to_cloud(&chosen.inlier_points(), w, h, &query.cloud);
            let detect_choice = &guesses[choice_idx];
            self.stats.choices += 1;
            self.stats.acc_detect_choice_matches += detect_choice.matches() as u64;
            self.stats.acc_detect_choice_inliers += detect_choice.inliers.len() as u64;
            if self.do_locate {
                self.stats.acc_locate_choice_matches += chosen.matches() as u64;
                self.stats.acc_locate_choice_inliers += chosen.inliers.len() as u64;
            }
        }

        Ok(Recognition {
            guess_made: choice.is_some(),
            detect_choices: guesses,
            locate_choice: choice,
            features,
        })
    }

    /// Detect stage: match the query against the full training base.
    fn detect(&mut self, features: &FeatureSet) -> Result<Vec<Guess>> {
        let guesses = self.engine.match_base(
            features,
            &self.base,
            &self.detect_params.matcher,
            &self.detect_params.guess,
        )?;
        self.stats.acc_detect_guesses += guesses.len() as u64;
        for g in &guesses {
            self.stats.acc_detect_matches += g.matches() as u64;
            self.stats.acc_detect_inliers += g.inliers.len() as u64;
        }
        Ok(guesses)
    }

    /// Locate stage: re-match the query against a base holding only the
    /// candidate's object, built from an independent copy because object ids
    /// are coupled to their owning base.
    fn locate(
        &mut self,
        features: &FeatureSet,
        query: &Query,
        candidate: &Guess,
    ) -> Result<Option<Guess>> {
        if self.locate_params.matcher.do_ratio_test {
            warn!("ratio test enabled for the locate stage, likely a misconfiguration");
        }
        let Some(object) = self.base.find(&candidate.object_name) else {
            return Ok(None);
        };
        let single = TrainingBase::new(vec![object.detached_copy()]);

        let mut guesses = self.engine.match_base(
            features,
            &single,
            &self.locate_params.matcher,
            &self.locate_params.guess,
        )?;
        self.stats.acc_locate_guesses += guesses.len() as u64;
        for g in &guesses {
            self.stats.acc_locate_matches += g.matches() as u64;
            self.stats.acc_locate_inliers += g.inliers.len() as u64;
        }

        if guesses.is_empty() {
            // The object was detected in clutter; failing to relocate it
            // against only itself is unexpected.
            warn!(
                "no guess made when relocating '{}', candidate rejected",
                candidate.object_name
            );
            return Ok(None);
        }

        let (w, h) = query.image.dimensions();
        for guess in &mut guesses {
            guess.inlier_cloud = map_to_cloud(&guess.inlier_points(), w, h, &query.cloud);
        }
        sort_by_ranking(&mut guesses, &*self.ranking);
        Ok(Some(guesses.remove(0)))
    }
}
