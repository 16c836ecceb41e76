//! Domain module
//!
//! Aggregates, value objects, events and the pure services that implement
//! contract lifecycle and identity rules.

pub mod aggregates;
pub mod value_objects;
pub mod events;
pub mod services;

pub use aggregates::*;
pub use value_objects::*;
pub use events::*;
