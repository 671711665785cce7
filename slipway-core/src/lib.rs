//! Slipway Core
//!
//! Core types and pure logic for the Slipway release orchestrator.
//!
//! This crate contains:
//! - Domain types: trigger context, build artifacts, registry target, image tags, reports
//! - Filters: GitHub-style path and branch patterns
//! - Tags: version tag calculation for container images
//!
//! Nothing in here performs I/O. Process execution and HTTP live in the runner and client.

pub mod domain;
pub mod filter;
pub mod tags;
