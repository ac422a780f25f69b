//! Per-recognizer running statistics.
//!
//! All fields are additive accumulators, including the per-stage counts that
//! later become rates. They must be reset explicitly between measurement
//! windows; averaging happens only in [`RecognizerStats::populate_response`].

use crate::experiment::paramsel::Response;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecognizerStats {
    /// Queries processed since the last reset.
    pub queries: u64,
    pub acc_keypoints: u64,
    pub acc_detect_matches: u64,
    pub acc_detect_guesses: u64,
    pub acc_detect_inliers: u64,
    pub acc_detect_choice_matches: u64,
    pub acc_detect_choice_inliers: u64,
    pub acc_locate_matches: u64,
    pub acc_locate_guesses: u64,
    pub acc_locate_inliers: u64,
    pub acc_locate_choice_matches: u64,
    pub acc_locate_choice_inliers: u64,
    /// Queries for which a choice was accepted.
    pub choices: u64,
}

fn avg(numerator: u64, denominator: u64) -> f32 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f32 / denominator as f32
    }
}

impl RecognizerStats {
    pub fn reset(&mut self) {
        *self = RecognizerStats::default();
    }

    /// Computes averages from the accumulated counters and merges them into
    /// the response. Zero denominators yield zero rather than NaN.
    pub fn populate_response(&self, r: &mut Response) {
        r.avg_keypoints = avg(self.acc_keypoints, self.queries);
        r.avg_detect_matches = avg(self.acc_detect_matches, self.queries);
        r.avg_detect_guesses = avg(self.acc_detect_guesses, self.queries);
        r.avg_detect_inliers = avg(self.acc_detect_inliers, self.acc_detect_guesses);
        r.avg_detect_choice_matches = avg(self.acc_detect_choice_matches, self.choices);
        r.avg_detect_choice_inliers = avg(self.acc_detect_choice_inliers, self.choices);
        r.avg_locate_matches = avg(self.acc_locate_matches, self.queries);
        r.avg_locate_guesses = avg(self.acc_locate_guesses, self.queries);
        r.avg_locate_inliers = avg(self.acc_locate_inliers, self.acc_locate_guesses);
        r.avg_locate_choice_matches = avg(self.acc_locate_choice_matches, self.choices);
        r.avg_locate_choice_inliers = avg(self.acc_locate_choice_inliers, self.choices);
    }
}
