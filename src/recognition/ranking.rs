//! Pluggable guess-ranking strategies.
//!
//! A ranking scores a guess as a real number, higher is better. Rankings
//! order detect-stage candidates and gate acceptance of the final choice.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::geometry::Camera;
use crate::recognition::Guess;

pub trait GuessRanking: Send + Sync {
    fn score(&self, guess: &Guess) -> f64;
}

/// Ranks guesses purely by their inlier support.
#[derive(Debug, Clone, Copy, Default)]
pub struct InliersRanking;

impl GuessRanking for InliersRanking {
    fn score(&self, guess: &Guess) -> f64 {
        guess.inliers.len() as f64
    }
}

/// Ranks guesses by how central the projected object origin lies in the
/// image; guesses whose origin does not project score lowest.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProximityRanking {
    camera: Camera,
}

impl ProximityRanking {
    pub fn new(camera: Camera) -> Self {
        Self { camera }
    }
}

impl GuessRanking for ProximityRanking {
    fn score(&self, guess: &Guess) -> f64 {
        match self.camera.project_origin(&guess.pose) {
            Some((u, v)) => {
                let (cu, cv) = self.camera.image_center();
                1.0 / (1.0 + ((u - cu).powi(2) + (v - cv).powi(2)).sqrt())
            }
            None => 0.0,
        }
    }
}

/// Resolves a ranking strategy from its persisted name. An unknown name is a
/// data error so that one bad experiment row does not take down a batch.
pub fn ranking_by_name(name: &str) -> Result<Arc<dyn GuessRanking>> {
    match name {
        "InliersRanking" => Ok(Arc::new(InliersRanking)),
        "ProximityRanking" => Ok(Arc::new(ProximityRanking::default())),
        other => Err(Error::Data(format!("unknown ranking '{other}'"))),
    }
}

/// Sorts guesses best-first under the given ranking. The sort is stable, so
/// ties keep their original order.
pub fn sort_by_ranking(guesses: &mut [Guess], ranking: &dyn GuessRanking) {
    guesses.sort_by(|a, b| {
        ranking
            .score(b)
            .partial_cmp(&ranking.score(a))
            .unwrap_or(Ordering::Equal)
    });
}
