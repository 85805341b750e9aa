//! Core types and trait definitions for Muster.
//!
//! Holds the identity credential, the authority resolver, the disclosure
//! policy engine and the ledger data model. This crate is free of HTTP,
//! database and runtime dependencies; every other crate depends on it.

// We intentionally use `impl Future` returns in traits (stabilised in Rust
// 1.75). Suppress the advisory lint about `Send` bounds on the futures.
#![allow(async_fn_in_trait)]

pub mod authority;
pub mod credential;
pub mod disclosure;
pub mod enrollment;
pub mod error;
pub mod policy;
pub mod request;
pub mod service;
pub mod time;

pub use error::{Error, Result};
