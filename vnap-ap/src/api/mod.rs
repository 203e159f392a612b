//! HTTP API handlers for vnap-ap
//!
//! **[APA-API-010]** REST surface: address parsing, batch jobs, admin
//! operations, health probes.

pub mod admin;
pub mod health;
pub mod jobs;
pub mod parse;

pub use admin::admin_routes;
pub use health::health_routes;
pub use jobs::job_routes;
pub use parse::parse_routes;
