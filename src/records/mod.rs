//! Personal-record tracking: estimating sets and keeping each exercise's
//! cached best value in step with its workout history.

pub mod estimator;
pub mod maintainer;
pub mod pin;
pub mod state;

pub use estimator::estimate;
pub use state::{Candidate, Decision, RecordEvent, RecordState};
