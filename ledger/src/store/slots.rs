//! Named storage slots and their recovery priority

use serde::Serialize;

/// Default base key, shared with snapshots written by the browser app
pub const DEFAULT_BASE_KEY: &str = "accountRecords";

/// Milliseconds since the epoch of the last successful save
pub const LAST_SAVE_TIME_KEY: &str = "lastSaveTime";

/// ISO date of the last daily-slot write
pub const LAST_DAILY_BACKUP_KEY: &str = "lastDailyBackup";

/// One redundant copy of the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageSlot {
    Primary,
    /// Rewritten on every save
    Mirror,
    /// Rewritten on every save, read before the daily slot
    MostRecent,
    /// Holds the previous day's end state; written on the first save of a day
    Daily,
    /// Written when the page unloads
    Emergency,
}

impl StorageSlot {
    /// Order in which `load` tries the slots
    pub const RECOVERY_ORDER: [StorageSlot; 5] = [
        StorageSlot::Primary,
        StorageSlot::Mirror,
        StorageSlot::MostRecent,
        StorageSlot::Daily,
        StorageSlot::Emergency,
    ];

    /// Slots that receive the fresh payload on every save
    pub const WRITTEN_ON_SAVE: [StorageSlot; 3] = [
        StorageSlot::Primary,
        StorageSlot::Mirror,
        StorageSlot::MostRecent,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            StorageSlot::Primary => "",
            StorageSlot::Mirror => "_backup",
            StorageSlot::MostRecent => "_ts1",
            StorageSlot::Daily => "_daily",
            StorageSlot::Emergency => "_emergency",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StorageSlot::Primary => "primary",
            StorageSlot::Mirror => "mirror",
            StorageSlot::MostRecent => "most_recent",
            StorageSlot::Daily => "daily",
            StorageSlot::Emergency => "emergency",
        }
    }
}

impl std::fmt::Display for StorageSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps slots to concrete storage keys under one base key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotLayout {
    base_key: String,
}

impl SlotLayout {
    pub fn new(base_key: impl Into<String>) -> Self {
        Self {
            base_key: base_key.into(),
        }
    }

    pub fn base_key(&self) -> &str {
        &self.base_key
    }

    pub fn key(&self, slot: StorageSlot) -> String {
        format!("{}{}", self.base_key, slot.suffix())
    }

    pub fn checksum_key(&self) -> String {
        format!("{}_checksum", self.base_key)
    }

    /// Holds the raw text of a slot that loaded with records dropped or rewritten
    pub fn quarantine_key(&self) -> String {
        format!("{}_unreadable", self.base_key)
    }
}

impl Default for SlotLayout {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_KEY)
    }
}
