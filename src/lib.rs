//! fxquote - cached foreign-exchange quotes under a latency budget
//!
//! The server answers `GET /quote` from a per-bucket cache and only goes to
//! the upstream provider on a miss. Every I/O step runs under a [`Deadline`]
//! derived from the request's own bound.
//!
//! # Modules
//!
//! - [`service`] - The cache-or-fetch pipeline
//! - [`upstream`] - Deadline-bound fetcher and upstream body parsing
//! - [`cache`] - SQLite-backed quote cache keyed by time bucket
//! - [`server`] - axum router and wire reply formatting
//! - [`client`] - Bounded one-shot client that logs quotes to a file
//! - [`mock`] - Mock upstream with a configurable delay
//!
//! [`Deadline`]: deadline::Deadline

pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod deadline;
pub mod error;
pub mod logging;
pub mod mock;
pub mod quote;
pub mod server;
pub mod service;
pub mod upstream;
