//! The two-stage detect→locate recognition core.

pub mod ranking;
pub mod recognizer;
pub mod result;
pub mod stats;

pub use ranking::{ranking_by_name, sort_by_ranking, GuessRanking, InliersRanking, ProximityRanking};
pub use recognizer::Recognizer;
pub use result::{Guess, Query, Recognition, SetResult};
pub use stats::RecognizerStats;
