//! Service layer: parse orchestration, batch jobs, seeding, external parser

pub mod external_parser;
pub mod job_runner;
pub mod parse_service;
pub mod seed_service;

pub use external_parser::ExternalParserClient;
pub use job_runner::{JobRunner, JobState, JobStatus};
pub use parse_service::{ParseOptions, ParseOutcome, ParseService};
pub use seed_service::{SeedOutcome, SeedReport, SeedService};
