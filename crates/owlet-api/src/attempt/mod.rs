//! Lesson attempts: start, answer submission, finalization.

pub mod model;
pub mod routes;
pub mod service;

pub use routes::routes;
pub use service::AttemptService;
