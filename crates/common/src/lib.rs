//! Shared building blocks for the backend crates: logging setup, startup
//! environment checks and the wire types returned by diagnostics endpoints.

pub mod types;
pub mod utils;
pub mod env;
