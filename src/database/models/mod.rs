pub mod exercise;
pub mod workout;

pub use exercise::{Exercise, LockedRecord};
pub use workout::{Workout, WorkoutSetRow};
