/// Same cool-off period between every attempt.
pub mod fixed;
