/// Data structures persisted by the document store
///
/// - `task`: Task documents and their creation/update inputs
/// - `leaderboard`: Counter documents and ranked entries

pub mod leaderboard;
pub mod task;

pub use leaderboard::{CounterDoc, LeaderboardEntry};
pub use task::{Priority, Task, TaskDraft, TaskPatch};
