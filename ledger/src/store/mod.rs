//! Persistence store for the ledger snapshot
//!
//! Every save fans the serialized snapshot out to several redundant slots;
//! every load walks the slots in recovery order and returns the first one
//! that validates, copying it back into the primary slot. Neither direction
//! returns an error: a failed save is reported in a [`SaveReport`], and a
//! load with nothing usable degrades to an empty ledger.

mod backend;
mod checksum;
mod slots;

pub use backend::{FileStorage, KeyValueStorage, MemoryStorage, StorageError, StorageErrorKind};
pub use checksum::{checksum_string, rolling_checksum};
pub use slots::{
    SlotLayout, StorageSlot, DEFAULT_BASE_KEY, LAST_DAILY_BACKUP_KEY, LAST_SAVE_TIME_KEY,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{LedgerSnapshot, LotId, RecoveredSnapshot, SkippedRecord};

use crate::clock::{Clock, SystemClock};

/// Snapshot persistence over a key-value backend
pub struct LedgerStore<S: KeyValueStorage> {
    storage: S,
    layout: SlotLayout,
    clock: Box<dyn Clock>,
}

/// A slot write that did not go through
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotFailure {
    pub slot: StorageSlot,
    pub kind: &'static str,
    pub message: String,
}

/// Outcome of one `save` call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SaveReport {
    pub written: Vec<StorageSlot>,
    pub failed: Vec<SlotFailure>,
    /// The daily slot was refreshed by this save
    pub daily_rotated: bool,
    /// Set when the snapshot could not be serialized at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveReport {
    /// The primary slot holds the new snapshot
    pub fn ok(&self) -> bool {
        self.written.contains(&StorageSlot::Primary)
    }

    /// Every attempted slot was written
    pub fn is_complete(&self) -> bool {
        self.ok() && self.failed.is_empty()
    }
}

/// Outcome of one `load` call
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub snapshot: LedgerSnapshot,
    /// Slot the snapshot came from; `None` when every slot was empty or invalid
    pub source: Option<StorageSlot>,
    /// The primary slot was rewritten from a backup slot
    pub repaired: bool,
    /// Records in the source slot that could not be read
    pub skipped: Vec<SkippedRecord>,
    /// Lots whose remaining stock was rebuilt from their sales
    pub reconciled: Vec<LotId>,
    /// The source slot's raw text was copied to the quarantine key
    pub quarantined: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotStatus {
    pub slot: StorageSlot,
    pub key: String,
    pub present: bool,
    pub valid: bool,
    pub bytes: usize,
}

/// Read-only health view of every slot and the metadata keys
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreDiagnostics {
    pub slots: Vec<SlotStatus>,
    /// `None` when either the primary slot or the stored checksum is missing
    pub checksum_matches: Option<bool>,
    pub last_save_time: Option<DateTime<Utc>>,
    pub last_daily_backup: Option<String>,
}

impl<S: KeyValueStorage> LedgerStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            layout: SlotLayout::default(),
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_layout(mut self, layout: SlotLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Persist the whole snapshot to every slot written on save, rotating the
    /// daily slot on the first save of a calendar day. Each slot write is
    /// attempted independently.
    pub fn save(&mut self, snapshot: &LedgerSnapshot) -> SaveReport {
        let mut report = SaveReport::default();

        let payload = match serde_json::to_string(snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize ledger snapshot");
                report.error = Some(e.to_string());
                return report;
            }
        };

        self.rotate_daily(&payload, &mut report);

        for slot in StorageSlot::WRITTEN_ON_SAVE {
            self.write_slot(slot, &payload, &mut report);
        }

        if report.ok() {
            self.write_meta(&self.layout.checksum_key(), &checksum_string(&payload));
            let millis = self.clock.now().timestamp_millis().to_string();
            self.write_meta(LAST_SAVE_TIME_KEY, &millis);
        } else {
            tracing::error!(
                failed = report.failed.len(),
                "ledger snapshot was not written to the primary slot"
            );
        }

        report
    }

    /// Load the first valid snapshot in recovery order, repairing the primary
    /// slot when it came from a backup. Falls back to an empty ledger.
    pub fn load(&mut self) -> LoadReport {
        for slot in StorageSlot::RECOVERY_ORDER {
            let Some(raw) = self.read_slot(slot) else {
                continue;
            };

            match parse_slot(&raw) {
                Ok(recovered) => {
                    let quarantined =
                        !recovered.is_lossless() && self.quarantine(slot, &raw, &recovered);
                    let repaired = slot != StorageSlot::Primary && self.repair_primary(slot, &raw);
                    if slot == StorageSlot::Primary {
                        self.check_primary_checksum(&raw);
                    }

                    let RecoveredSnapshot {
                        snapshot,
                        skipped,
                        reconciled,
                    } = recovered;
                    tracing::info!(
                        slot = %slot,
                        repaired,
                        lots = snapshot.inventory.len(),
                        sales = snapshot.sales.len(),
                        skipped = skipped.len(),
                        reconciled = reconciled.len(),
                        "ledger snapshot loaded"
                    );
                    return LoadReport {
                        snapshot,
                        source: Some(slot),
                        repaired,
                        skipped,
                        reconciled,
                        quarantined,
                    };
                }
                Err(reason) => {
                    tracing::warn!(slot = %slot, %reason, "storage slot is invalid, trying next");
                }
            }
        }

        tracing::warn!("no valid ledger snapshot in any slot, starting empty");
        LoadReport {
            snapshot: LedgerSnapshot::empty(),
            source: None,
            repaired: false,
            skipped: Vec::new(),
            reconciled: Vec::new(),
            quarantined: false,
        }
    }

    /// Write `snapshot` into the emergency slot; meant for the unload path
    pub fn emergency_backup(&mut self, snapshot: &LedgerSnapshot) -> bool {
        let payload = match serde_json::to_string(snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize emergency backup");
                return false;
            }
        };
        let mut report = SaveReport::default();
        self.write_slot(StorageSlot::Emergency, &payload, &mut report);
        report.failed.is_empty()
    }

    pub fn diagnostics(&self) -> StoreDiagnostics {
        let slots = StorageSlot::RECOVERY_ORDER
            .iter()
            .map(|slot| {
                let key = self.layout.key(*slot);
                let raw = self.read_slot(*slot);
                SlotStatus {
                    slot: *slot,
                    present: raw.is_some(),
                    valid: raw.as_deref().is_some_and(|raw| parse_slot(raw).is_ok()),
                    bytes: raw.as_ref().map_or(0, String::len),
                    key,
                }
            })
            .collect();

        let primary = self.read_slot(StorageSlot::Primary);
        let stored_checksum = self.read_key(&self.layout.checksum_key());
        let checksum_matches = match (primary, stored_checksum) {
            (Some(raw), Some(stored)) => Some(checksum_string(&raw) == stored),
            _ => None,
        };

        let last_save_time = self
            .read_key(LAST_SAVE_TIME_KEY)
            .and_then(|millis| millis.trim().parse::<i64>().ok())
            .and_then(DateTime::<Utc>::from_timestamp_millis);

        StoreDiagnostics {
            slots,
            checksum_matches,
            last_save_time,
            last_daily_backup: self.read_key(LAST_DAILY_BACKUP_KEY),
        }
    }

    fn rotate_daily(&mut self, payload: &str, report: &mut SaveReport) {
        let today = self.clock.today().to_string();
        if self.read_key(LAST_DAILY_BACKUP_KEY).as_deref() == Some(today.as_str()) {
            return;
        }

        // Keep the state the ledger ended the previous day with
        let previous = self
            .read_slot(StorageSlot::Primary)
            .filter(|raw| parse_slot(raw).is_ok());
        let daily = previous.as_deref().unwrap_or(payload);

        let failures_before = report.failed.len();
        self.write_slot(StorageSlot::Daily, daily, report);
        if report.failed.len() == failures_before {
            report.daily_rotated = true;
            self.write_meta(LAST_DAILY_BACKUP_KEY, &today);
        }
    }

    fn write_slot(&mut self, slot: StorageSlot, payload: &str, report: &mut SaveReport) {
        let key = self.layout.key(slot);
        match self.storage.set(&key, payload) {
            Ok(()) => report.written.push(slot),
            Err(e) => {
                tracing::warn!(slot = %slot, key = %key, error = %e, "storage slot write failed");
                report.failed.push(SlotFailure {
                    slot,
                    kind: e.kind.as_str(),
                    message: e.message,
                });
            }
        }
    }

    fn write_meta(&mut self, key: &str, value: &str) {
        if let Err(e) = self.storage.set(key, value) {
            tracing::warn!(key = %key, error = %e, "storage metadata write failed");
        }
    }

    fn repair_primary(&mut self, source: StorageSlot, raw: &str) -> bool {
        let key = self.layout.key(StorageSlot::Primary);
        match self.storage.set(&key, raw) {
            Ok(()) => {
                self.write_meta(&self.layout.checksum_key(), &checksum_string(raw));
                tracing::info!(source = %source, "primary slot restored from backup");
                true
            }
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "could not restore primary slot");
                false
            }
        }
    }

    /// Keep the raw text of a slot that did not load cleanly, so the save that
    /// follows cannot erase the only copy. An earlier quarantine is never replaced.
    fn quarantine(
        &mut self,
        source: StorageSlot,
        raw: &str,
        recovered: &RecoveredSnapshot,
    ) -> bool {
        for record in &recovered.skipped {
            tracing::warn!(
                slot = %source,
                collection = record.collection,
                index = record.index,
                reason = %record.reason,
                "stored record skipped"
            );
        }
        for lot_id in &recovered.reconciled {
            tracing::warn!(slot = %source, lot_id = %lot_id, "remaining stock rebuilt from sales");
        }

        let key = self.layout.quarantine_key();
        if self.read_key(&key).is_some() {
            tracing::warn!(key = %key, "quarantine already holds data, keeping it");
            return false;
        }
        match self.storage.set(&key, raw) {
            Ok(()) => {
                tracing::warn!(slot = %source, key = %key, "original slot contents quarantined");
                true
            }
            Err(e) => {
                tracing::error!(slot = %source, key = %key, error = %e, "could not quarantine slot contents");
                false
            }
        }
    }

    fn check_primary_checksum(&self, raw: &str) {
        if let Some(stored) = self.read_key(&self.layout.checksum_key()) {
            if stored != checksum_string(raw) {
                tracing::warn!("primary slot checksum mismatch; contents still parse, keeping them");
            }
        }
    }

    fn read_slot(&self, slot: StorageSlot) -> Option<String> {
        self.read_key(&self.layout.key(slot))
    }

    fn read_key(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "storage read failed");
                None
            }
        }
    }
}

/// Parse a stored slot. Any JSON with the snapshot shape is accepted; records
/// inside it are read one by one.
fn parse_slot(raw: &str) -> Result<RecoveredSnapshot, String> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| format!("not valid JSON: {e}"))?;
    if !LedgerSnapshot::has_snapshot_shape(&value) {
        return Err("no inventory, sales or restDays array".to_string());
    }
    Ok(LedgerSnapshot::from_value_lenient(&value))
}
