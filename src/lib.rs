//! Composable output filters with deferred, pre-flush content substitution.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
