/// Common error types
///
/// This module provides the crate-wide error taxonomy. Repository and
/// leaderboard operations return `Result<T, Error>`; none of the variants
/// is retried automatically — failures are surfaced to the caller and
/// retry policy stays outside this crate.

use crate::periods::Granularity;
use crate::store::StoreError;
use thiserror::Error;

/// Crate result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for repository and leaderboard operations
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected at the boundary (empty title, oversized description)
    #[error("validation failed: {0}")]
    Validation(String),

    /// No task exists with the given id
    #[error("task not found: {0}")]
    NotFound(String),

    /// The caller is not the owner of the task
    #[error("not the owner of task {0}")]
    Forbidden(String),

    /// The task was already completed; completion is terminal for mutation
    /// and guards the leaderboard against double counting
    #[error("task {0} is already completed")]
    AlreadyCompleted(String),

    /// The backing store failed; surfaced as-is, never retried here
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Some leaderboard counters were updated and some were not
    ///
    /// The three period counters are updated independently with no
    /// transaction. The completion itself has already committed when this
    /// is raised, so nothing is rolled back; the caller learns which
    /// periods took the increment.
    #[error("leaderboard update incomplete: succeeded {succeeded:?}, failed {failed:?}")]
    PartialAggregation {
        /// Granularities whose counter took the increment
        succeeded: Vec<Granularity>,

        /// Granularities whose counter update failed
        failed: Vec<Granularity>,
    },
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut parts: Vec<String> = Vec::new();
        for (field, field_errors) in errors.field_errors() {
            for err in field_errors {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string());
                parts.push(format!("{}: {}", field, message));
            }
        }
        parts.sort();
        Error::Validation(parts.join("; "))
    }
}
