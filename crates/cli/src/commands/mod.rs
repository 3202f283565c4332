//! Subcommand implementations

pub mod ask;
pub mod investigate;
pub mod metrics;
pub mod status;
