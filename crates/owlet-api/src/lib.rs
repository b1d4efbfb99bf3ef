pub mod attempt;
pub mod auth;
pub mod badge;
pub mod config;
pub mod error;
pub mod learner;
pub mod metrics;
pub mod review;
pub mod router;
pub mod scoring;
pub mod state;
pub mod tracing;

pub use config::ApiConfig;
pub use state::{ApiState, AuthConfig};
