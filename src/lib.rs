// Library crate shared by the binary and the integration tests.

pub mod config;
pub mod coverage;
pub mod dashboard;
pub mod error;
pub mod history;
pub mod routes;
pub mod server;
pub mod settings;
pub mod state;
pub mod template;
