pub mod routes;
pub mod startup;
pub mod state;
pub mod errors;

pub use startup::{build_app, run_with};
