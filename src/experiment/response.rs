//! Response functions: reduce a whole test-set's recognition outcomes plus
//! ground truth into a scalar objective and a bundle of derived statistics.
//!
//! The response is deliberately defined over the whole test set rather than
//! per query so that corpus-level statistics can be collected in the same
//! pass. The smaller the value, the better the configuration; parameter
//! search minimizes it.

use crate::experiment::paramsel::Response;
use crate::geometry::{angle_between, dist_between};
use crate::ground::{LabelSet, SetGroundTruth};
use crate::recognition::{Guess, SetResult};
use crate::sipc::SipcScore;

pub trait ResponseFunction {
    fn compute(&self, result: &SetResult, ground: &SetGroundTruth, response: &mut Response);
}

/// Smallest combined normalized error of the guess against any matching
/// labeled pose, or `None` when no matching label carries a pose.
fn best_matching_errors(
    guess: &Guess,
    labels: &LabelSet,
    max_trans: f64,
    max_angle: f64,
) -> Option<(f64, f64)> {
    let mut best: Option<(f64, f64, f64)> = None;
    for np in &labels.labels {
        if np.name != guess.object_name {
            continue;
        }
        let Some(pose) = &np.pose else { continue };
        let da = angle_between(&guess.pose, pose);
        let dt = dist_between(&guess.pose, pose);
        let combined = (dt / max_trans).powi(2) + (da / max_angle).powi(2);
        if best.map_or(true, |(c, _, _)| combined < c) {
            best = Some((combined, da, dt));
        }
    }
    best.map(|(_, da, dt)| (da, dt))
}

/// Shared statistics pass: zeroes the response value and fills every
/// corpus-level descriptive statistic. Called by every response function
/// before it computes its own value.
pub fn populate_statistics(
    result: &SetResult,
    ground: &SetGroundTruth,
    max_trans: f64,
    max_angle: f64,
    r: &mut Response,
) {
    r.value = 0.0;
    let n = ground.len();
    let mut successes = 0u32;
    let mut mislabels = 0u32;
    let mut nones = 0u32;
    let mut err_count = 0u32;
    let (mut angle_sum, mut trans_sum) = (0.0f64, 0.0f64);
    let (mut angle_sq_sum, mut trans_sq_sum) = (0.0f64, 0.0f64);
    let (mut s_angle_sum, mut s_trans_sum) = (0.0f64, 0.0f64);
    let (mut s_angle_sq_sum, mut s_trans_sq_sum) = (0.0f64, 0.0f64);
    let mut sipc = SipcScore::default();
    r.detect_tp = 0;
    r.detect_fp = 0;
    r.detect_fn = 0;
    r.detect_tn = 0;

    for (img_name, labels) in ground {
        match result.get(img_name) {
            None => {
                if labels.is_empty() {
                    r.detect_tn += 1;
                    sipc.add_true_negative();
                } else {
                    r.detect_fn += 1;
                    nones += 1;
                    sipc.add_false_negative();
                }
            }
            Some(guess) => {
                if !labels.on_scene(&guess.object_name) {
                    r.detect_fp += 1;
                    mislabels += 1;
                    if labels.is_empty() {
                        sipc.add_false_positive();
                    } else {
                        sipc.add_wrong_label();
                    }
                } else {
                    r.detect_tp += 1;
                    match best_matching_errors(guess, labels, max_trans, max_angle) {
                        Some((da, dt)) => {
                            err_count += 1;
                            angle_sum += da;
                            trans_sum += dt;
                            angle_sq_sum += da * da;
                            trans_sq_sum += dt * dt;
                            if da <= max_angle && dt <= max_trans {
                                successes += 1;
                                s_angle_sum += da;
                                s_trans_sum += dt;
                                s_angle_sq_sum += da * da;
                                s_trans_sq_sum += dt * dt;
                            }
                            sipc.add_true_positive(da, dt, max_angle, max_trans);
                        }
                        None => {
                            // Label is correct but no ground pose is known;
                            // the localization cannot be verified.
                            sipc.add_true_positive(max_angle, max_trans, max_angle, max_trans);
                        }
                    }
                }
            }
        }
    }

    sipc.compute_final_score();
    r.sipc_score = sipc;

    let rate = |count: u32| {
        if n == 0 {
            0.0
        } else {
            count as f32 / n as f32
        }
    };
    let avg = |sum: f64, count: u32| {
        if count == 0 {
            0.0
        } else {
            (sum / f64::from(count)) as f32
        }
    };
    r.succ_rate = rate(successes);
    r.mislabel_rate = rate(mislabels);
    r.none_rate = rate(nones);
    r.avg_angle_err = avg(angle_sum, err_count);
    r.avg_trans_err = avg(trans_sum, err_count);
    r.avg_angle_sq_err = avg(angle_sq_sum, err_count);
    r.avg_trans_sq_err = avg(trans_sq_sum, err_count);
    r.avg_succ_angle_err = avg(s_angle_sum, successes);
    r.avg_succ_trans_err = avg(s_trans_sum, successes);
    r.avg_succ_angle_sq_err = avg(s_angle_sq_sum, successes);
    r.avg_succ_trans_sq_err = avg(s_trans_sq_sum, successes);
}

/// Response value from the squared error, cut off at 1.0 per scene.
///
/// A scene with no guess costs 1.0 when it was not empty and nothing
/// otherwise; a scene with a guess costs the smallest normalized squared
/// error over all matching ground labels, clipped at 1.0.
#[derive(Debug, Clone, Copy)]
pub struct CutSseResponseFunction {
    pub max_trans_error: f32,
    pub max_angle_error: f32,
}

impl CutSseResponseFunction {
    pub fn new(max_trans_error: f32, max_angle_error: f32) -> Self {
        Self {
            max_trans_error,
            max_angle_error,
        }
    }
}

impl Default for CutSseResponseFunction {
    fn default() -> Self {
        Self::new(0.03, std::f32::consts::PI / 9.0)
    }
}

impl ResponseFunction for CutSseResponseFunction {
    fn compute(&self, result: &SetResult, ground: &SetGroundTruth, response: &mut Response) {
        let max_t = f64::from(self.max_trans_error);
        let max_a = f64::from(self.max_angle_error);
        populate_statistics(result, ground, max_t, max_a, response);

        let mut acc = 0.0f64;
        for (img_name, labels) in ground {
            match result.get(img_name) {
                None => {
                    if !labels.is_empty() {
                        acc += 1.0;
                    }
                }
                Some(guess) => {
                    let mut penalty = 1.0f64;
                    for np in &labels.labels {
                        if np.name != guess.object_name {
                            continue;
                        }
                        let Some(pose) = &np.pose else { continue };
                        let dt = dist_between(&guess.pose, pose);
                        let da = angle_between(&guess.pose, pose);
                        let sse = (dt / max_t).powi(2) + (da / max_a).powi(2);
                        penalty = penalty.min(sse);
                    }
                    acc += penalty;
                }
            }
        }
        response.value = if ground.is_empty() {
            0.0
        } else {
            (acc / ground.len() as f64) as f32
        };
    }
}
