//! Per-scene recognition scoring, averaged over a test corpus.
//!
//! The scheme scores each test scene by category and adds a continuous bonus
//! on true positives that grows as the pose error shrinks. Empty scenes are
//! covered as well, extending the original contest scoring:
//!
//! ```text
//!  scene type   choice                     score      ROC terminology
//! ------------------------------------------------------------------
//!  empty        none                       1.0        true negative
//!  empty        some object                0.0        false positive
//!  not empty    none                       0.0        false negative
//!  not empty    object on scene            0.5 + x    true positive
//!  not empty    object not on scene        0.0        false positive
//! ```
//!
//! where `x = 0.25·rscore + 0.25·tscore`.

use serde::{Deserialize, Serialize};

/// Rotation sub-score in [0, 1]: full marks at zero angular error, linear
/// falloff to zero at `max_angle_err`.
pub fn rscore(angle_err: f64, max_angle_err: f64) -> f64 {
    if max_angle_err <= 0.0 {
        return 0.0;
    }
    (1.0 - angle_err / max_angle_err).clamp(0.0, 1.0)
}

/// Translation sub-score in [0, 1]: full marks at zero translational error,
/// linear falloff to zero at `max_trans_err`.
pub fn tscore(trans_err: f64, max_trans_err: f64) -> f64 {
    if max_trans_err <= 0.0 {
        return 0.0;
    }
    (1.0 - trans_err / max_trans_err).clamp(0.0, 1.0)
}

/// Running accumulator of per-scene scores, with the rotation, translation
/// and object-match sub-scores kept separately (each with its running
/// maximum) for an auditable breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SipcScore {
    pub frames: u32,
    pub acc_score: f32,
    pub final_score: f32,
    pub rscore: f32,
    pub tscore: f32,
    pub cscore: f32,
    pub max_rscore: f32,
    pub max_tscore: f32,
    pub max_cscore: f32,
}

impl SipcScore {
    /// Empty scene, no guess made.
    pub fn add_true_negative(&mut self) {
        self.frames += 1;
        self.acc_score += 1.0;
    }

    /// Empty scene, but some guess was made.
    pub fn add_false_positive(&mut self) {
        self.frames += 1;
    }

    /// Non-empty scene, no guess made.
    pub fn add_false_negative(&mut self) {
        self.frames += 1;
        self.bump_maxima();
    }

    /// Non-empty scene, guess names an object that is not on the scene.
    pub fn add_wrong_label(&mut self) {
        self.frames += 1;
        self.bump_maxima();
    }

    /// Non-empty scene with a correctly labeled guess; the bonus grows as
    /// the combined normalized error shrinks.
    pub fn add_true_positive(
        &mut self,
        angle_err: f64,
        trans_err: f64,
        max_angle_err: f64,
        max_trans_err: f64,
    ) {
        self.frames += 1;
        self.bump_maxima();
        let r = rscore(angle_err, max_angle_err) as f32;
        let t = tscore(trans_err, max_trans_err) as f32;
        self.rscore += r;
        self.tscore += t;
        self.cscore += 1.0;
        self.acc_score += 0.5 + 0.25 * r + 0.25 * t;
    }

    /// Averages the accumulated per-scene scores into `final_score`.
    pub fn compute_final_score(&mut self) {
        self.final_score = if self.frames > 0 {
            self.acc_score / self.frames as f32
        } else {
            0.0
        };
    }

    fn bump_maxima(&mut self) {
        self.max_rscore += 1.0;
        self.max_tscore += 1.0;
        self.max_cscore += 1.0;
    }
}
