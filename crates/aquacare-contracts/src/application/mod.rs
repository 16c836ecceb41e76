//! Application layer
//!
//! Orchestrates use cases and coordinates domain objects.

pub mod commands;
pub mod queries;
pub mod dto;

pub use commands::{ContractService, ServicePorts};
pub use queries::ContractQueries;
pub use dto::*;
