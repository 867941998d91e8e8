//! Core types and trait definitions for Gatehouse, the group-administration
//! and project-access surface of the review server.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Backends implement the traits in [`store`]; the algorithms in [`audit`],
//! [`access`] and [`edit`] only talk to those traits.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod account;
pub mod audit;
pub mod edit;
pub mod error;
pub mod group;
pub mod store;

pub use error::{Error, Result};
