/// Configuration management
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `TASKRANK_TASKS_COLLECTION`: Task collection name (default: tasks)
/// - `TASKRANK_LEADERBOARDS_COLLECTION`: Counter collection name
///   (default: leaderboards)
///
/// # Example
///
/// ```no_run
/// use taskrank::config::AppConfig;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = AppConfig::from_env()?;
/// assert_eq!(config.tasks_collection, "tasks");
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Collection holding task documents
    pub tasks_collection: String,

    /// Collection holding leaderboard counter documents
    pub leaderboards_collection: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            tasks_collection: "tasks".to_string(),
            leaderboards_collection: "leaderboards".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a collection name is set but empty.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let tasks_collection =
            env::var("TASKRANK_TASKS_COLLECTION").unwrap_or_else(|_| "tasks".to_string());
        let leaderboards_collection = env::var("TASKRANK_LEADERBOARDS_COLLECTION")
            .unwrap_or_else(|_| "leaderboards".to_string());

        if tasks_collection.is_empty() {
            anyhow::bail!("TASKRANK_TASKS_COLLECTION must not be empty");
        }
        if leaderboards_collection.is_empty() {
            anyhow::bail!("TASKRANK_LEADERBOARDS_COLLECTION must not be empty");
        }

        Ok(AppConfig {
            tasks_collection,
            leaderboards_collection,
        })
    }
}
