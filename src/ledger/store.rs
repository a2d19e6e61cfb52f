//! Usage ledger persistence
//!
//! `usage.json` holds exactly one day's counts keyed by requester. An older
//! deployment stored a bare `day -> total` map with no per-user breakdown;
//! that shape is still accepted on read and treated as zero usage for every
//! requester (the totals cannot be disaggregated), but it is never written
//! back.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{PixelbotError, Result};

use super::UsageLedger;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LedgerFile {
    Current(UsageLedger),
    Legacy(HashMap<String, u64>),
}

use LedgerFile::{Current, Legacy};

/// Load the ledger from `path`, rolling it to `today`.
///
/// A missing file and the legacy single-integer format both yield an empty
/// ledger for `today`; a present-but-unparsable file is an error.
pub fn load_ledger(path: &Path, today: NaiveDate) -> Result<UsageLedger> {
    if !path.exists() {
        debug!("No usage ledger at {:?}, starting fresh", path);
        return Ok(UsageLedger::for_day(today));
    }

    let content = fs::read_to_string(path)
        .map_err(|e| PixelbotError::LedgerError(format!("failed to read {path:?}: {e}")))?;

    let parsed: LedgerFile = serde_json::from_str(&content)
        .map_err(|e| PixelbotError::LedgerError(format!("invalid ledger in {path:?}: {e}")))?;

    match parsed {
        Current(ledger) if ledger.day() == today => Ok(ledger),
        Current(ledger) => {
            debug!("Pruning stale ledger day {}", ledger.day());
            Ok(UsageLedger::for_day(today))
        }
        Legacy(entries) => {
            warn!(
                "Migrating legacy usage ledger ({} day entries); per-user counts reset to zero",
                entries.len()
            );
            Ok(UsageLedger::for_day(today))
        }
    }
}

/// Write the ledger to `path`, always in the current keyed-map shape.
pub fn save_ledger(path: &Path, ledger: &UsageLedger) -> Result<()> {
    let content = serde_json::to_string(ledger)
        .map_err(|e| PixelbotError::SerializationError(e.to_string()))?;

    fs::write(path, content)
        .map_err(|e| PixelbotError::LedgerError(format!("failed to write {path:?}: {e}")))?;

    debug!("Saved usage ledger to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{QuotaCheck, QuotaPolicy};
    use tempfile::TempDir;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_missing_file_starts_fresh() {
        let temp = TempDir::new().unwrap();
        let ledger = load_ledger(&temp.path().join("usage.json"), day("2026-08-06")).unwrap();
        assert_eq!(ledger.total(), 0);
        assert_eq!(ledger.day(), day("2026-08-06"));
    }

    #[test]
    fn test_round_trip_preserves_counts() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("usage.json");
        let today = day("2026-08-06");

        let mut ledger = UsageLedger::for_day(today);
        ledger.record(today, "alice");
        ledger.record(today, "alice");
        ledger.record(today, "bob");
        save_ledger(&path, &ledger).unwrap();

        let loaded = load_ledger(&path, today).unwrap();
        assert_eq!(loaded.count_for("alice"), 2);
        assert_eq!(loaded.count_for("bob"), 1);
        assert_eq!(loaded.total(), 3);
    }

    #[test]
    fn test_stale_day_is_pruned_on_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("usage.json");
        let yesterday = day("2026-08-05");

        let mut ledger = UsageLedger::for_day(yesterday);
        ledger.record(yesterday, "alice");
        save_ledger(&path, &ledger).unwrap();

        let loaded = load_ledger(&path, day("2026-08-06")).unwrap();
        assert_eq!(loaded.total(), 0);
        assert_eq!(loaded.day(), day("2026-08-06"));
    }

    #[test]
    fn test_legacy_single_integer_format_reads_as_zero_usage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("usage.json");
        fs::write(&path, r#"{"2026-08-06": 17}"#).unwrap();

        let today = day("2026-08-06");
        let ledger = load_ledger(&path, today).unwrap();
        assert_eq!(ledger.total(), 0);
        assert_eq!(
            ledger.check(today, "alice", &QuotaPolicy::default()),
            QuotaCheck::Allowed
        );

        // Once written back, the file is in the current shape.
        save_ledger(&path, &ledger).unwrap();
        let reloaded = load_ledger(&path, today).unwrap();
        assert_eq!(reloaded.day(), today);
    }

    #[test]
    fn test_garbage_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("usage.json");
        fs::write(&path, "not json").unwrap();

        assert!(load_ledger(&path, day("2026-08-06")).is_err());
    }
}
