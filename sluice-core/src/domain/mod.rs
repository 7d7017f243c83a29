//! Core domain types
//!
//! These types describe one remote run from the moment it is staged until it
//! reaches a terminal state. They are shared between the client crate (which
//! talks to the control plane and object store) and the runner (which drives
//! the run).

pub mod asset;
pub mod log;
pub mod params;
pub mod run;
pub mod workspace;
