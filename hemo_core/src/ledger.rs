//! In-memory results ledger shared by all calculator modules.
//!
//! Holds at most one entry per calculator type. Every mutation publishes the
//! full entry set through a watch channel, so subscribers always observe the
//! latest state and intermediate states may be skipped.

use crate::keys::CanonicalKey;
use crate::types::{CalcEntry, CalcType};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;

/// Immutable view of the ledger at one revision
///
/// Entries are in publish order: an upsert moves the replaced type to the end.
#[derive(Clone, Debug, Default)]
pub struct LedgerSnapshot {
    entries: Arc<Vec<CalcEntry>>,
    revision: u64,
}

impl LedgerSnapshot {
    pub fn entries(&self) -> &[CalcEntry] {
        &self.entries
    }

    /// Incremented on every publish, including `clear`
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, calc_type: CalcType) -> Option<&CalcEntry> {
        self.entries.iter().find(|e| e.calc_type == calc_type)
    }

    pub fn present_types(&self) -> BTreeSet<CalcType> {
        self.entries.iter().map(|e| e.calc_type).collect()
    }

    /// Raw value of `key` from the most recently timestamped entry holding it
    ///
    /// Equal timestamps resolve to the later-published entry.
    pub fn latest_raw(&self, key: CanonicalKey) -> Option<&str> {
        let mut best: Option<(i64, &str)> = None;
        for entry in self.entries.iter() {
            // First matching item within an entry wins.
            let Some((_, item)) = entry.keyed_items().find(|(k, _)| *k == key) else {
                continue;
            };
            match best {
                Some((ts, _)) if entry.timestamp_millis < ts => {}
                _ => best = Some((entry.timestamp_millis, item.value.as_str())),
            }
        }
        best.map(|(_, value)| value)
    }

    /// Latest value of `key` parsed as `T`; `None` if absent or unparseable
    pub fn latest_value<T: FromStr>(&self, key: CanonicalKey) -> Option<T> {
        self.latest_raw(key)?.trim().parse().ok()
    }

    /// Latest finite numeric value of `key`
    pub fn latest_f64(&self, key: CanonicalKey) -> Option<f64> {
        self.latest_value::<f64>(key).filter(|v| v.is_finite())
    }

    /// Latest non-blank string value of `key`
    pub fn latest_string(&self, key: CanonicalKey) -> Option<String> {
        self.latest_raw(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }
}

/// Shared store of per-calculator results
///
/// Safe to use from any thread; does not need a running async runtime.
pub struct ResultsLedger {
    tx: watch::Sender<LedgerSnapshot>,
}

impl Default for ResultsLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultsLedger {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LedgerSnapshot::default());
        Self { tx }
    }

    /// Replace the entry of the same type and publish
    pub fn upsert(&self, entry: CalcEntry) {
        let calc_type = entry.calc_type;
        self.tx.send_modify(|snapshot| {
            let entries = Arc::make_mut(&mut snapshot.entries);
            entries.retain(|e| e.calc_type != calc_type);
            entries.push(entry);
            snapshot.revision += 1;
        });
        tracing::debug!(calc_type = %calc_type, "Published ledger entry");
    }

    /// Remove every entry and publish the empty set
    pub fn clear(&self) {
        self.tx.send_modify(|snapshot| {
            snapshot.entries = Arc::new(Vec::new());
            snapshot.revision += 1;
        });
        tracing::debug!("Cleared ledger");
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LedgerSnapshot> {
        self.tx.subscribe()
    }

    pub fn has_any_results(&self) -> bool {
        !self.tx.borrow().is_empty()
    }

    pub fn present_types(&self) -> BTreeSet<CalcType> {
        self.tx.borrow().present_types()
    }

    pub fn latest_value<T: FromStr>(&self, key: CanonicalKey) -> Option<T> {
        self.tx.borrow().latest_value(key)
    }

    pub fn latest_f64(&self, key: CanonicalKey) -> Option<f64> {
        self.tx.borrow().latest_f64(key)
    }

    pub fn latest_string(&self, key: CanonicalKey) -> Option<String> {
        self.tx.borrow().latest_string(key)
    }
}
