//! Status API

pub mod health;
pub mod jobs;

pub use health::health_routes;
pub use jobs::job_routes;
