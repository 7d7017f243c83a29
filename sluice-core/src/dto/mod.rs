//! Data Transfer Objects for the control plane
//!
//! Wire shapes of the batch-compute service's REST API. Field names follow the
//! service's camelCase JSON; domain code converts them into the types in
//! [`crate::domain`] as early as possible.

pub mod application;
pub mod job_run;
