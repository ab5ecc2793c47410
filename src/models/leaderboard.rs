/// Leaderboard counter documents and ranked entries
///
/// One [`CounterDoc`] exists per granularity × period, created lazily by
/// the first completion that lands in the bucket and merged (never
/// overwritten) by every completion after it.

use crate::session::UserId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A persisted completion counter for one period
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CounterDoc {
    /// Completion count per user
    #[serde(default)]
    pub counts: BTreeMap<UserId, i64>,

    /// ISO date the document was last touched; diagnostic only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

/// One row of a ranked leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// User the count belongs to
    pub user: UserId,

    /// Completed-task count for the period
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_counter_doc_decodes() {
        let doc: CounterDoc = serde_json::from_value(json!({
            "counts": {"alice": 3, "bob": 1},
            "date": "2024-03-07",
        }))
        .unwrap();

        assert_eq!(doc.counts.get(&UserId::from("alice")), Some(&3));
        assert_eq!(doc.date, NaiveDate::from_ymd_opt(2024, 3, 7));
    }

    #[test]
    fn test_counter_doc_tolerates_missing_fields() {
        let doc: CounterDoc = serde_json::from_value(json!({})).unwrap();
        assert!(doc.counts.is_empty());
        assert!(doc.date.is_none());
    }
}
