//! Parameter-search experiments: persisted trial records, the train-feature
//! cache, response functions, and the runner that ties them together.

pub mod cache;
pub mod paramsel;
pub mod response;
pub mod runner;

pub use cache::{FileFlag, TrainFeatures, TrainFeaturesCache};
pub use paramsel::{
    select_experiments_not_run, sort_experiments_by_train_features, ChoiceParams, Experiment,
    Paramset, Response,
};
pub use response::{CutSseResponseFunction, ResponseFunction};
pub use runner::ExperimentRunner;
