//! Browse censorship measurement result files as HTML tables, with the
//! rendered output kept in a content-addressed on-disk cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
