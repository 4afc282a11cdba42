pub mod error;
pub mod workout_service;

pub use error::ServiceError;
pub use workout_service::{ExerciseRecord, WorkoutDetail, WorkoutService};
