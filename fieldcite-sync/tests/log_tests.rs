use chrono::{Duration, Utc};
use fieldcite_sync::{open_store_in_memory, SyncLog, MAX_LOG_ENTRIES};
use fieldcite_types::{SyncLogEntry, SyncLogKind};
use pretty_assertions::assert_eq;

fn make_log() -> SyncLog {
    SyncLog::new(open_store_in_memory().unwrap())
}

/// An entry with an explicit timestamp offset, so ordering is deterministic.
fn entry_at(kind: SyncLogKind, details: &str, seconds_ago: i64) -> SyncLogEntry {
    let mut entry = SyncLogEntry::new(kind, details);
    entry.timestamp = Utc::now() - Duration::seconds(seconds_ago);
    entry
}

// ── append / recent ─────────────────────────────────────────────

#[test]
fn append_and_read_back() {
    let log = make_log();
    log.append(&entry_at(SyncLogKind::SyncStart, "starting", 2))
        .unwrap();
    log.append(&entry_at(SyncLogKind::SyncComplete, "done", 1))
        .unwrap();

    let recent = log.recent(10).unwrap();
    assert_eq!(recent.len(), 2);
    // Newest first.
    assert_eq!(recent[0].kind, SyncLogKind::SyncComplete);
    assert_eq!(recent[1].kind, SyncLogKind::SyncStart);
}

#[test]
fn recent_respects_limit() {
    let log = make_log();
    for i in 0..5 {
        log.append(&entry_at(SyncLogKind::Retry, &format!("r{i}"), 100 - i))
            .unwrap();
    }
    assert_eq!(log.recent(3).unwrap().len(), 3);
}

// ── cap ─────────────────────────────────────────────────────────

#[test]
fn appending_past_the_cap_evicts_the_oldest() {
    let log = make_log();
    for i in 0..(MAX_LOG_ENTRIES as i64 + 1) {
        log.append(&entry_at(
            SyncLogKind::SyncStart,
            &format!("entry {i}"),
            1000 - i,
        ))
        .unwrap();
    }

    assert_eq!(log.count().unwrap(), MAX_LOG_ENTRIES);

    // "entry 0" was the oldest; it must be the one evicted.
    let all = log.recent(MAX_LOG_ENTRIES).unwrap();
    assert!(all.iter().all(|e| e.details != "entry 0"));
    assert!(all.iter().any(|e| e.details == "entry 1"));
}

#[test]
fn log_stays_capped_under_continued_writes() {
    let log = make_log();
    for i in 0..(MAX_LOG_ENTRIES as i64 + 40) {
        log.append(&entry_at(SyncLogKind::SyncError, &format!("e{i}"), 2000 - i))
            .unwrap();
    }
    assert_eq!(log.count().unwrap(), MAX_LOG_ENTRIES);
}

// ── last completed ──────────────────────────────────────────────

#[test]
fn last_completed_at_reads_the_newest_sync_complete() {
    let log = make_log();
    assert_eq!(log.last_completed_at().unwrap(), None);

    let older = entry_at(SyncLogKind::SyncComplete, "first", 60);
    let newer = entry_at(SyncLogKind::SyncComplete, "second", 5);
    log.append(&older).unwrap();
    log.append(&newer).unwrap();
    log.append(&entry_at(SyncLogKind::SyncError, "noise", 1))
        .unwrap();

    assert_eq!(log.last_completed_at().unwrap(), Some(newer.timestamp));
}
