//! Ports module
//!
//! Hexagonal architecture ports (interfaces).

pub mod inbound;
pub mod outbound;
