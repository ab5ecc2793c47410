//! # taskrank
//!
//! Core library for a per-user to-do system with time-bucketed completion
//! leaderboards. Persistence is delegated to an external document store
//! behind the [`store::DocumentStore`] trait; this crate owns the task
//! lifecycle, the leaderboard bucketing rules, and the live-query plumbing.
//!
//! ## Module Organization
//!
//! - `models`: Task and leaderboard data structures
//! - `store`: Document store boundary and in-memory implementation
//! - `tasks`: Task repository (CRUD, completion, live feeds)
//! - `leaderboard`: Completion counter aggregation and ranked reads
//! - `periods`: Day/week/month period key derivation
//! - `session`: Signed-in user identity
//! - `config`: Configuration management
//! - `error`: Common error types

pub mod config;
pub mod error;
pub mod leaderboard;
pub mod models;
pub mod periods;
pub mod session;
pub mod store;
pub mod tasks;

/// Current version of the taskrank library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
