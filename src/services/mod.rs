pub mod attendance;
pub mod schedule;
pub mod submission;
