//! Persisted parameter-selection records.
//!
//! Every record corresponds to a row in the experiment database, addressed
//! by rowid; `id <= 0` marks an object that has not been written yet. The
//! matcher/guess/feature parameter structs manage no persistence of their
//! own, so their row ids are tracked alongside them in [`Paramset`].

use std::f32::consts::PI;
use std::process::Command;

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::Connection;

use crate::db::{insert_or_update, MemberMap};
use crate::error::Result;
use crate::features::{params_digest, FeatureExtractionParams, GuessParams, MatcherParams};
use crate::sipc::SipcScore;

/// Acceptance threshold plus the name of the ranking strategy used to order
/// and gate guesses.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceParams {
    pub id: i64,
    pub accept_threshold: f32,
    pub ranking: String,
}

impl Default for ChoiceParams {
    fn default() -> Self {
        Self {
            id: -1,
            accept_threshold: 0.0,
            ranking: "InliersRanking".to_string(),
        }
    }
}

impl ChoiceParams {
    pub fn serialize(&mut self, conn: &Connection) -> Result<()> {
        let mut m = MemberMap::new();
        m.insert(
            "accept_threshold".into(),
            Value::Real(f64::from(self.accept_threshold)),
        );
        m.insert("ranking".into(), Value::Text(self.ranking.clone()));
        insert_or_update(conn, "pms_choice", &m, &mut self.id)
    }

    pub fn deserialize(conn: &Connection, id: i64) -> Result<ChoiceParams> {
        let (accept_threshold, ranking) = conn.query_row(
            "select accept_threshold, ranking from pms_choice where id = ?1",
            [id],
            |row| Ok((row.get::<_, f64>(0)? as f32, row.get::<_, String>(1)?)),
        )?;
        Ok(ChoiceParams {
            id,
            accept_threshold,
            ranking,
        })
    }
}

pub fn serialize_pms_fe(
    conn: &Connection,
    pms: &FeatureExtractionParams,
    id: &mut i64,
) -> Result<()> {
    let mut m = MemberMap::new();
    m.insert("detector_type".into(), Value::Text(pms.detector_type.clone()));
    m.insert(
        "grid_spacing".into(),
        Value::Integer(i64::from(pms.grid_spacing)),
    );
    m.insert(
        "patch_radius".into(),
        Value::Integer(i64::from(pms.patch_radius)),
    );
    m.insert(
        "min_contrast".into(),
        Value::Real(f64::from(pms.min_contrast)),
    );
    insert_or_update(conn, "pms_fe", &m, id)
}

pub fn deserialize_pms_fe(conn: &Connection, id: i64) -> Result<FeatureExtractionParams> {
    Ok(conn.query_row(
        "select detector_type, grid_spacing, patch_radius, min_contrast from pms_fe where id = ?1",
        [id],
        |row| {
            Ok(FeatureExtractionParams {
                detector_type: row.get(0)?,
                grid_spacing: row.get::<_, i64>(1)? as u32,
                patch_radius: row.get::<_, i64>(2)? as u32,
                min_contrast: row.get::<_, f64>(3)? as f32,
            })
        },
    )?)
}

pub fn serialize_pms_match(conn: &Connection, pms: &MatcherParams, id: &mut i64) -> Result<()> {
    let mut m = MemberMap::new();
    m.insert("matcher_type".into(), Value::Text(pms.matcher_type.clone()));
    m.insert("knn".into(), Value::Integer(i64::from(pms.knn)));
    m.insert(
        "do_ratio_test".into(),
        Value::Integer(i64::from(pms.do_ratio_test)),
    );
    m.insert(
        "ratio_threshold".into(),
        Value::Real(f64::from(pms.ratio_threshold)),
    );
    insert_or_update(conn, "pms_match", &m, id)
}

pub fn deserialize_pms_match(conn: &Connection, id: i64) -> Result<MatcherParams> {
    Ok(conn.query_row(
        "select matcher_type, knn, do_ratio_test, ratio_threshold from pms_match where id = ?1",
        [id],
        |row| {
            Ok(MatcherParams {
                matcher_type: row.get(0)?,
                knn: row.get::<_, i64>(1)? as u32,
                do_ratio_test: row.get(2)?,
                ratio_threshold: row.get::<_, f64>(3)? as f32,
            })
        },
    )?)
}

pub fn serialize_pms_guess(conn: &Connection, pms: &GuessParams, id: &mut i64) -> Result<()> {
    let mut m = MemberMap::new();
    m.insert(
        "min_inliers".into(),
        Value::Integer(i64::from(pms.min_inliers)),
    );
    m.insert(
        "max_projection_error".into(),
        Value::Real(f64::from(pms.max_projection_error)),
    );
    m.insert(
        "ransac_iterations".into(),
        Value::Integer(i64::from(pms.ransac_iterations)),
    );
    insert_or_update(conn, "pms_guess", &m, id)
}

pub fn deserialize_pms_guess(conn: &Connection, id: i64) -> Result<GuessParams> {
    Ok(conn.query_row(
        "select min_inliers, max_projection_error, ransac_iterations from pms_guess where id = ?1",
        [id],
        |row| {
            Ok(GuessParams {
                min_inliers: row.get::<_, i64>(0)? as u32,
                max_projection_error: row.get::<_, f64>(1)? as f32,
                ransac_iterations: row.get::<_, i64>(2)? as u32,
            })
        },
    )?)
}

/// A full persisted configuration: feature extraction for training and for
/// recognition, matcher and guess-generator parameters doubled for the
/// detect and locate stages, the choice parameters, and the error bounds
/// that define a successful localization.
#[derive(Debug, Clone, PartialEq)]
pub struct Paramset {
    pub train_pms_fe: FeatureExtractionParams,
    pub recog_pms_fe: FeatureExtractionParams,
    pub detect_pms_match: MatcherParams,
    pub detect_pms_guess: GuessParams,
    pub locate_pms_match: MatcherParams,
    pub locate_pms_guess: GuessParams,
    pub pms_choice: ChoiceParams,

    pub train_pms_fe_id: i64,
    pub recog_pms_fe_id: i64,
    pub detect_pms_match_id: i64,
    pub detect_pms_guess_id: i64,
    pub locate_pms_match_id: i64,
    pub locate_pms_guess_id: i64,

    /// Maximum translational error for a guess to count as a success.
    pub max_trans_error: f32,
    /// Maximum angular error for a guess to count as a success.
    pub max_angle_error: f32,
}

impl Default for Paramset {
    fn default() -> Self {
        Self {
            train_pms_fe: FeatureExtractionParams::default(),
            recog_pms_fe: FeatureExtractionParams::default(),
            detect_pms_match: MatcherParams::default(),
            detect_pms_guess: GuessParams::default(),
            locate_pms_match: MatcherParams::default(),
            locate_pms_guess: GuessParams::default(),
            pms_choice: ChoiceParams::default(),
            train_pms_fe_id: -1,
            recog_pms_fe_id: -1,
            detect_pms_match_id: -1,
            detect_pms_guess_id: -1,
            locate_pms_match_id: -1,
            locate_pms_guess_id: -1,
            max_trans_error: 0.03,
            max_angle_error: PI / 9.0,
        }
    }
}

impl Paramset {
    /// Writes every component row, assigning ids for new components.
    pub fn serialize(&mut self, conn: &Connection) -> Result<()> {
        serialize_pms_fe(conn, &self.train_pms_fe, &mut self.train_pms_fe_id)?;
        serialize_pms_fe(conn, &self.recog_pms_fe, &mut self.recog_pms_fe_id)?;
        serialize_pms_match(conn, &self.detect_pms_match, &mut self.detect_pms_match_id)?;
        serialize_pms_guess(conn, &self.detect_pms_guess, &mut self.detect_pms_guess_id)?;
        serialize_pms_match(conn, &self.locate_pms_match, &mut self.locate_pms_match_id)?;
        serialize_pms_guess(conn, &self.locate_pms_guess, &mut self.locate_pms_guess_id)?;
        self.pms_choice.serialize(conn)
    }
}

/// Statistics of one experiment run over a test set. All rate and average
/// fields are final values (not accumulators); the response is immutable
/// once attached to an experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: i64,
    /// Value of the response function; lower is better.
    pub value: f32,
    pub sipc_score: SipcScore,
    pub succ_rate: f32,
    pub avg_angle_err: f32,
    pub avg_succ_angle_err: f32,
    pub avg_trans_err: f32,
    pub avg_succ_trans_err: f32,
    pub avg_angle_sq_err: f32,
    pub avg_succ_angle_sq_err: f32,
    pub avg_trans_sq_err: f32,
    pub avg_succ_trans_sq_err: f32,
    /// Fraction of scenes where a guess was made but the label was wrong.
    pub mislabel_rate: f32,
    /// Fraction of scenes where no choice was made although the scene was
    /// not empty.
    pub none_rate: f32,
    pub avg_keypoints: f32,
    pub avg_detect_matches: f32,
    pub avg_detect_guesses: f32,
    pub avg_detect_inliers: f32,
    pub avg_detect_choice_matches: f32,
    pub avg_detect_choice_inliers: f32,
    pub detect_tp: i32,
    pub detect_fp: i32,
    pub detect_fn: i32,
    pub detect_tn: i32,
    pub avg_locate_matches: f32,
    pub avg_locate_guesses: f32,
    pub avg_locate_inliers: f32,
    pub avg_locate_choice_matches: f32,
    pub avg_locate_choice_inliers: f32,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            id: -1,
            value: 0.0,
            sipc_score: SipcScore::default(),
            succ_rate: 0.0,
            avg_angle_err: 0.0,
            avg_succ_angle_err: 0.0,
            avg_trans_err: 0.0,
            avg_succ_trans_err: 0.0,
            avg_angle_sq_err: 0.0,
            avg_succ_angle_sq_err: 0.0,
            avg_trans_sq_err: 0.0,
            avg_succ_trans_sq_err: 0.0,
            mislabel_rate: 0.0,
            none_rate: 0.0,
            avg_keypoints: 0.0,
            avg_detect_matches: 0.0,
            avg_detect_guesses: 0.0,
            avg_detect_inliers: 0.0,
            avg_detect_choice_matches: 0.0,
            avg_detect_choice_inliers: 0.0,
            detect_tp: 0,
            detect_fp: 0,
            detect_fn: 0,
            detect_tn: 0,
            avg_locate_matches: 0.0,
            avg_locate_guesses: 0.0,
            avg_locate_inliers: 0.0,
            avg_locate_choice_matches: 0.0,
            avg_locate_choice_inliers: 0.0,
        }
    }
}

impl Response {
    pub fn fail_rate(&self) -> f32 {
        1.0 - self.succ_rate
    }

    pub fn avg_fail_angle_err(&self) -> f32 {
        if self.fail_rate() == 0.0 {
            0.0
        } else {
            (self.avg_angle_err - self.succ_rate * self.avg_succ_angle_err) / self.fail_rate()
        }
    }

    pub fn avg_fail_trans_err(&self) -> f32 {
        if self.fail_rate() == 0.0 {
            0.0
        } else {
            (self.avg_trans_err - self.succ_rate * self.avg_succ_trans_err) / self.fail_rate()
        }
    }

    pub fn detect_tp_rate(&self) -> f32 {
        let p = self.detect_tp + self.detect_fn;
        if p == 0 {
            0.0
        } else {
            self.detect_tp as f32 / p as f32
        }
    }

    pub fn detect_fp_rate(&self) -> f32 {
        let n = self.detect_fp + self.detect_tn;
        if n == 0 {
            0.0
        } else {
            self.detect_fp as f32 / n as f32
        }
    }

    pub fn serialize(&mut self, conn: &Connection) -> Result<()> {
        let mut m = MemberMap::new();
        let real = |v: f32| Value::Real(f64::from(v));
        m.insert("value".into(), real(self.value));
        m.insert(
            "sipc_frames".into(),
            Value::Integer(i64::from(self.sipc_score.frames)),
        );
        m.insert("sipc_acc_score".into(), real(self.sipc_score.acc_score));
        m.insert("sipc_final_score".into(), real(self.sipc_score.final_score));
        m.insert("sipc_rscore".into(), real(self.sipc_score.rscore));
        m.insert("sipc_tscore".into(), real(self.sipc_score.tscore));
        m.insert("sipc_cscore".into(), real(self.sipc_score.cscore));
        m.insert("sipc_max_rscore".into(), real(self.sipc_score.max_rscore));
        m.insert("sipc_max_tscore".into(), real(self.sipc_score.max_tscore));
        m.insert("sipc_max_cscore".into(), real(self.sipc_score.max_cscore));
        m.insert("succ_rate".into(), real(self.succ_rate));
        m.insert("avg_angle_err".into(), real(self.avg_angle_err));
        m.insert("avg_succ_angle_err".into(), real(self.avg_succ_angle_err));
        m.insert("avg_trans_err".into(), real(self.avg_trans_err));
        m.insert("avg_succ_trans_err".into(), real(self.avg_succ_trans_err));
        m.insert("avg_angle_sq_err".into(), real(self.avg_angle_sq_err));
        m.insert(
            "avg_succ_angle_sq_err".into(),
            real(self.avg_succ_angle_sq_err),
        );
        m.insert("avg_trans_sq_err".into(), real(self.avg_trans_sq_err));
        m.insert(
            "avg_succ_trans_sq_err".into(),
            real(self.avg_succ_trans_sq_err),
        );
        m.insert("mislabel_rate".into(), real(self.mislabel_rate));
        m.insert("none_rate".into(), real(self.none_rate));
        m.insert("avg_keypoints".into(), real(self.avg_keypoints));
        m.insert("avg_detect_matches".into(), real(self.avg_detect_matches));
        m.insert("avg_detect_guesses".into(), real(self.avg_detect_guesses));
        m.insert("avg_detect_inliers".into(), real(self.avg_detect_inliers));
        m.insert(
            "avg_detect_choice_matches".into(),
            real(self.avg_detect_choice_matches),
        );
        m.insert(
            "avg_detect_choice_inliers".into(),
            real(self.avg_detect_choice_inliers),
        );
        m.insert("detect_tp".into(), Value::Integer(i64::from(self.detect_tp)));
        m.insert("detect_fp".into(), Value::Integer(i64::from(self.detect_fp)));
        m.insert("detect_fn".into(), Value::Integer(i64::from(self.detect_fn)));
        m.insert("detect_tn".into(), Value::Integer(i64::from(self.detect_tn)));
        m.insert("avg_locate_matches".into(), real(self.avg_locate_matches));
        m.insert("avg_locate_guesses".into(), real(self.avg_locate_guesses));
        m.insert("avg_locate_inliers".into(), real(self.avg_locate_inliers));
        m.insert(
            "avg_locate_choice_matches".into(),
            real(self.avg_locate_choice_matches),
        );
        m.insert(
            "avg_locate_choice_inliers".into(),
            real(self.avg_locate_choice_inliers),
        );
        insert_or_update(conn, "response", &m, &mut self.id)
    }

    pub fn deserialize(conn: &Connection, id: i64) -> Result<Response> {
        Ok(conn.query_row(
            "select value, sipc_frames, sipc_acc_score, sipc_final_score, sipc_rscore, \
             sipc_tscore, sipc_cscore, sipc_max_rscore, sipc_max_tscore, sipc_max_cscore, \
             succ_rate, avg_angle_err, avg_succ_angle_err, avg_trans_err, avg_succ_trans_err, \
             avg_angle_sq_err, avg_succ_angle_sq_err, avg_trans_sq_err, avg_succ_trans_sq_err, \
             mislabel_rate, none_rate, avg_keypoints, avg_detect_matches, avg_detect_guesses, \
             avg_detect_inliers, avg_detect_choice_matches, avg_detect_choice_inliers, \
             detect_tp, detect_fp, detect_fn, detect_tn, avg_locate_matches, \
             avg_locate_guesses, avg_locate_inliers, avg_locate_choice_matches, \
             avg_locate_choice_inliers from response where id = ?1",
            [id],
            |row| {
                let f = |i: usize| row.get::<_, f64>(i).map(|v| v as f32);
                Ok(Response {
                    id,
                    value: f(0)?,
                    sipc_score: SipcScore {
                        frames: row.get::<_, i64>(1)? as u32,
                        acc_score: f(2)?,
                        final_score: f(3)?,
                        rscore: f(4)?,
                        tscore: f(5)?,
                        cscore: f(6)?,
                        max_rscore: f(7)?,
                        max_tscore: f(8)?,
                        max_cscore: f(9)?,
                    },
                    succ_rate: f(10)?,
                    avg_angle_err: f(11)?,
                    avg_succ_angle_err: f(12)?,
                    avg_trans_err: f(13)?,
                    avg_succ_trans_err: f(14)?,
                    avg_angle_sq_err: f(15)?,
                    avg_succ_angle_sq_err: f(16)?,
                    avg_trans_sq_err: f(17)?,
                    avg_succ_trans_sq_err: f(18)?,
                    mislabel_rate: f(19)?,
                    none_rate: f(20)?,
                    avg_keypoints: f(21)?,
                    avg_detect_matches: f(22)?,
                    avg_detect_guesses: f(23)?,
                    avg_detect_inliers: f(24)?,
                    avg_detect_choice_matches: f(25)?,
                    avg_detect_choice_inliers: f(26)?,
                    detect_tp: row.get::<_, i64>(27)? as i32,
                    detect_fp: row.get::<_, i64>(28)? as i32,
                    detect_fn: row.get::<_, i64>(29)? as i32,
                    detect_tn: row.get::<_, i64>(30)? as i32,
                    avg_locate_matches: f(31)?,
                    avg_locate_guesses: f(32)?,
                    avg_locate_inliers: f(33)?,
                    avg_locate_choice_matches: f(34)?,
                    avg_locate_choice_inliers: f(35)?,
                })
            },
        )?)
    }
}

/// One parameter-search trial. Created externally with `has_run = false`,
/// picked up by the runner, mutated in place with results, and persisted;
/// never deleted by this subsystem.
#[derive(Debug, Clone, Default)]
pub struct Experiment {
    pub id: i64,
    pub paramset: Paramset,
    pub response: Response,
    pub train_set: String,
    pub test_set: String,
    pub time: String,
    pub vcs_commit: String,
    /// Temporarily disables the experiment; must be cleared manually after a
    /// failure before the experiment is retried.
    pub skip: bool,
    pub has_run: bool,
}

impl Experiment {
    /// Stamps the experiment with the current UTC time.
    pub fn record_time(&mut self) {
        self.time = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    }

    /// Stamps the experiment with the current revision-control commit.
    pub fn record_commit(&mut self) {
        self.vcs_commit = vcs_commit();
    }

    /// Writes the experiment and its components. The response is only
    /// persisted (and referenced) once the experiment has run.
    pub fn serialize(&mut self, conn: &Connection) -> Result<()> {
        self.paramset.serialize(conn)?;
        let response_id = if self.has_run {
            self.response.serialize(conn)?;
            Value::Integer(self.response.id)
        } else {
            Value::Null
        };
        let mut m = MemberMap::new();
        m.insert(
            "train_pms_fe_id".into(),
            Value::Integer(self.paramset.train_pms_fe_id),
        );
        m.insert(
            "recog_pms_fe_id".into(),
            Value::Integer(self.paramset.recog_pms_fe_id),
        );
        m.insert(
            "detect_pms_match_id".into(),
            Value::Integer(self.paramset.detect_pms_match_id),
        );
        m.insert(
            "detect_pms_guess_id".into(),
            Value::Integer(self.paramset.detect_pms_guess_id),
        );
        m.insert(
            "locate_pms_match_id".into(),
            Value::Integer(self.paramset.locate_pms_match_id),
        );
        m.insert(
            "locate_pms_guess_id".into(),
            Value::Integer(self.paramset.locate_pms_guess_id),
        );
        m.insert(
            "pms_choice_id".into(),
            Value::Integer(self.paramset.pms_choice.id),
        );
        m.insert(
            "max_trans_error".into(),
            Value::Real(f64::from(self.paramset.max_trans_error)),
        );
        m.insert(
            "max_angle_error".into(),
            Value::Real(f64::from(self.paramset.max_angle_error)),
        );
        m.insert("response_id".into(), response_id);
        m.insert("train_set".into(), Value::Text(self.train_set.clone()));
        m.insert("test_set".into(), Value::Text(self.test_set.clone()));
        m.insert("time".into(), Value::Text(self.time.clone()));
        m.insert("vcs_commit".into(), Value::Text(self.vcs_commit.clone()));
        m.insert("skip".into(), Value::Integer(i64::from(self.skip)));
        m.insert("has_run".into(), Value::Integer(i64::from(self.has_run)));
        insert_or_update(conn, "experiment", &m, &mut self.id)
    }

    /// Loads an experiment and all referenced component rows.
    pub fn deserialize(conn: &Connection, id: i64) -> Result<Experiment> {
        struct Row {
            train_pms_fe_id: i64,
            recog_pms_fe_id: i64,
            detect_pms_match_id: i64,
            detect_pms_guess_id: i64,
            locate_pms_match_id: i64,
            locate_pms_guess_id: i64,
            pms_choice_id: i64,
            max_trans_error: f32,
            max_angle_error: f32,
            response_id: Option<i64>,
            train_set: String,
            test_set: String,
            time: String,
            vcs_commit: String,
            skip: bool,
            has_run: bool,
        }
        let r = conn.query_row(
            "select train_pms_fe_id, recog_pms_fe_id, detect_pms_match_id, \
             detect_pms_guess_id, locate_pms_match_id, locate_pms_guess_id, pms_choice_id, \
             max_trans_error, max_angle_error, response_id, train_set, test_set, time, \
             vcs_commit, skip, has_run from experiment where id = ?1",
            [id],
            |row| {
                Ok(Row {
                    train_pms_fe_id: row.get(0)?,
                    recog_pms_fe_id: row.get(1)?,
                    detect_pms_match_id: row.get(2)?,
                    detect_pms_guess_id: row.get(3)?,
                    locate_pms_match_id: row.get(4)?,
                    locate_pms_guess_id: row.get(5)?,
                    pms_choice_id: row.get(6)?,
                    max_trans_error: row.get::<_, f64>(7)? as f32,
                    max_angle_error: row.get::<_, f64>(8)? as f32,
                    response_id: row.get(9)?,
                    train_set: row.get(10)?,
                    test_set: row.get(11)?,
                    time: row.get(12)?,
                    vcs_commit: row.get(13)?,
                    skip: row.get(14)?,
                    has_run: row.get(15)?,
                })
            },
        )?;
        let paramset = Paramset {
            train_pms_fe: deserialize_pms_fe(conn, r.train_pms_fe_id)?,
            recog_pms_fe: deserialize_pms_fe(conn, r.recog_pms_fe_id)?,
            detect_pms_match: deserialize_pms_match(conn, r.detect_pms_match_id)?,
            detect_pms_guess: deserialize_pms_guess(conn, r.detect_pms_guess_id)?,
            locate_pms_match: deserialize_pms_match(conn, r.locate_pms_match_id)?,
            locate_pms_guess: deserialize_pms_guess(conn, r.locate_pms_guess_id)?,
            pms_choice: ChoiceParams::deserialize(conn, r.pms_choice_id)?,
            train_pms_fe_id: r.train_pms_fe_id,
            recog_pms_fe_id: r.recog_pms_fe_id,
            detect_pms_match_id: r.detect_pms_match_id,
            detect_pms_guess_id: r.detect_pms_guess_id,
            locate_pms_match_id: r.locate_pms_match_id,
            locate_pms_guess_id: r.locate_pms_guess_id,
            max_trans_error: r.max_trans_error,
            max_angle_error: r.max_angle_error,
        };
        let response = match r.response_id {
            Some(rid) => Response::deserialize(conn, rid)?,
            None => Response::default(),
        };
        Ok(Experiment {
            id,
            paramset,
            response,
            train_set: r.train_set,
            test_set: r.test_set,
            time: r.time,
            vcs_commit: r.vcs_commit,
            skip: r.skip,
            has_run: r.has_run,
        })
    }
}

/// Current revision-control commit, or "unknown" when not in a checkout.
pub fn vcs_commit() -> String {
    Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Selects pending experiments: not yet run and not disabled, in id order.
pub fn select_experiments_not_run(conn: &Connection) -> Result<Vec<Experiment>> {
    let mut stmt =
        conn.prepare("select id from experiment where has_run = 0 and skip = 0 order by id")?;
    let ids: Vec<i64> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    ids.into_iter()
        .map(|id| Experiment::deserialize(conn, id))
        .collect()
}

/// Stable-sorts experiments so that trials sharing a training set and
/// training feature configuration become adjacent, maximizing reuse of a
/// loaded recognizer.
pub fn sort_experiments_by_train_features(exps: &mut [Experiment]) {
    exps.sort_by_key(|e| {
        let digest = params_digest(&e.paramset.train_pms_fe).unwrap_or_default();
        (e.train_set.clone(), digest)
    });
}
