pub mod dashboard;
pub mod health;
pub mod statistics;
pub mod test_runs;
