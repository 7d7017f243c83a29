//! Sluice Core
//!
//! Core types shared by the sluice client and runner.
//!
//! This crate contains:
//! - Domain types: assets, run parameters, workspaces, run handles and attempts, log lines
//! - DTOs: wire shapes for the batch-compute control plane
//! - Small parsers for object URIs and duration strings

pub mod domain;
pub mod dto;
pub mod duration;
pub mod uri;

pub use domain::params::ParameterError;
pub use uri::ObjectUri;
