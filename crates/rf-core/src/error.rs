//! # FeedError
//!
//! Centralized error handling for the Rusty-Feed ecosystem.
//! The propagation policy: failures scoped to one remote identity are
//! absorbed (and logged) at the aggregation boundary; failures on the
//! current user's own write path are always surfaced to the caller.
//! A thread parent that cannot be found is a natural thread boundary,
//! not an error, so it has no variant here.

use thiserror::Error;

/// The primary error type for all rf-core operations.
#[derive(Error, Debug)]
pub enum FeedError {
    /// A single author's archive cannot be reached. Degrade gracefully:
    /// omit their content, log, move on.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The query mechanism itself failed. Surfaced to the caller of
    /// `list_posts`, never swallowed.
    #[error("aggregation failed: {0}")]
    Aggregation(String),

    /// A write to the current user's own archive failed. Local state is
    /// left unchanged so the caller can retry or report.
    #[error("mutation failed: {0}")]
    Mutation(String),

    /// A mutation or scoped read was attempted with no current user set.
    #[error("no current user")]
    NoCurrentUser,

    /// The persisted local state could not be read or written.
    #[error("state store error: {0}")]
    State(String),

    /// Resource not found (e.g. Profile, Post)
    #[error("{0} not found: {1}")]
    NotFound(String, String),
}

/// A specialized Result type for Rusty-Feed logic.
pub type Result<T> = std::result::Result<T, FeedError>;
