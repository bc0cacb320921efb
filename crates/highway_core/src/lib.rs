//! highway_core: entity model, storage ports, policy bootstrap and the
//! request enforcement gate for the admin console.
//!
//! Nothing in here talks to a database or the network. `highway_postgres`
//! implements the ports; `highway_server` wires everything into axum.

pub mod enforcement;
pub mod error;
pub mod memory;
pub mod policy;
pub mod ports;
pub mod service;
pub mod types;

pub use enforcement::{EnforcementGate, GateOutcome, Skipper};
pub use error::HighwayError;
pub use policy::PolicyRuntime;
