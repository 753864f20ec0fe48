//! Shared test utilities for the pact verifier.
//!
//! This crate provides:
//! - Pact fixtures built around a small user provider
//! - Proptest generators for JSON values and state labels
//! - Mock HTTP clients and provider-state hooks

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
