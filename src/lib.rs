//! Single-object recognition in cluttered scenes, plus the experiment
//! machinery used to tune the recognizer's parameters against labeled test
//! corpora.
//!
//! The recognition pipeline proceeds in two stages:
//!
//! 1. **Detect** – match query features against the full training base and
//!    produce one candidate guess per plausibly-matched object.
//! 2. **Locate** – re-match the query against a single-object training base
//!    for each ranked candidate until one passes the acceptance threshold.
//!
//! Around the core sit the experiment subsystem (a sqlite-backed queue of
//! parameter-search trials, a content-addressed cache of extracted training
//! features, and response/score functions that reduce a whole test set to a
//! scalar objective) and the narrow seams to external collaborators: the
//! feature engine, image and point-cloud I/O, and ground-truth parsing.

pub mod cloud;
pub mod db;
pub mod engine;
pub mod error;
pub mod experiment;
pub mod features;
pub mod geometry;
pub mod ground;
pub mod io;
pub mod recognition;
pub mod sipc;
pub mod training;

pub use error::{Error, Result};
