//! The persisted ledger snapshot

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{InventoryLot, SaleRecord};
use crate::types::{LotId, SaleId};

/// Top-level array fields that mark a stored value as a ledger snapshot.
/// `records` is the single-list layout used before lots and sales were split.
pub const SNAPSHOT_ARRAY_FIELDS: &[&str] = &["inventory", "sales", "restDays", "records"];

/// The complete ledger state, always persisted as one unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    /// Newest first
    #[serde(default)]
    pub inventory: Vec<InventoryLot>,
    /// Newest first
    #[serde(default)]
    pub sales: Vec<SaleRecord>,
    /// Sorted ascending, no duplicates
    #[serde(default)]
    pub rest_days: Vec<NaiveDate>,
}

/// A stored record that could not be read and was left out
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRecord {
    pub collection: &'static str,
    pub index: usize,
    pub reason: String,
}

/// A snapshot read record by record from stored JSON
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveredSnapshot {
    pub snapshot: LedgerSnapshot,
    pub skipped: Vec<SkippedRecord>,
    /// Lots whose `remain_boxes` disagreed with their sales and was rewritten
    pub reconciled: Vec<LotId>,
}

impl RecoveredSnapshot {
    /// Every stored record came through unchanged
    pub fn is_lossless(&self) -> bool {
        self.skipped.is_empty() && self.reconciled.is_empty()
    }
}

impl LedgerSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.inventory.is_empty() && self.sales.is_empty() && self.rest_days.is_empty()
    }

    /// Structural check on raw JSON: an object carrying at least one of the
    /// expected array fields
    pub fn has_snapshot_shape(value: &Value) -> bool {
        value.as_object().is_some_and(|object| {
            SNAPSHOT_ARRAY_FIELDS
                .iter()
                .any(|field| object.get(*field).is_some_and(|v| v.is_array()))
        })
    }

    /// Read a stored snapshot without letting one bad record discard the rest.
    ///
    /// Records that do not deserialize are skipped, derived amounts are
    /// recomputed and each lot's remaining stock is reconciled with its sales.
    /// Missing or non-array collections read as empty.
    pub fn from_value_lenient(value: &Value) -> RecoveredSnapshot {
        let mut skipped = Vec::new();

        let mut inventory: Vec<InventoryLot> = read_records(value, "inventory", &mut skipped);
        let mut sales: Vec<SaleRecord> = read_records(value, "sales", &mut skipped);
        let rest_days: Vec<NaiveDate> = read_records(value, "restDays", &mut skipped);

        keep_recomputed(&mut inventory, "inventory", &mut skipped, InventoryLot::recompute);
        keep_recomputed(&mut sales, "sales", &mut skipped, SaleRecord::recompute);

        let mut snapshot = Self {
            inventory,
            sales,
            rest_days,
        };
        snapshot.normalize_rest_days();
        let reconciled = snapshot.reconcile_stock();

        RecoveredSnapshot {
            snapshot,
            skipped,
            reconciled,
        }
    }

    /// Rewrite each lot's `remain_boxes` as `boxes - sold`, kept within
    /// `0..=boxes`, and refresh its status. Returns the lots that changed.
    pub fn reconcile_stock(&mut self) -> Vec<LotId> {
        let sold: Vec<Decimal> = self
            .inventory
            .iter()
            .map(|lot| self.sold_from_lot(&lot.id))
            .collect();

        let mut reconciled = Vec::new();
        for (lot, sold) in self.inventory.iter_mut().zip(sold) {
            let expected = lot
                .boxes
                .saturating_sub(sold)
                .clamp(Decimal::ZERO, lot.boxes.max(Decimal::ZERO));
            if lot.remain_boxes != expected {
                lot.remain_boxes = expected;
                reconciled.push(lot.id.clone());
            }
            lot.refresh_status();
        }
        reconciled
    }

    pub fn lot(&self, id: &LotId) -> Option<&InventoryLot> {
        self.inventory.iter().find(|lot| &lot.id == id)
    }

    pub fn lot_index(&self, id: &LotId) -> Option<usize> {
        self.inventory.iter().position(|lot| &lot.id == id)
    }

    pub fn sale(&self, id: &SaleId) -> Option<&SaleRecord> {
        self.sales.iter().find(|sale| &sale.id == id)
    }

    pub fn sale_index(&self, id: &SaleId) -> Option<usize> {
        self.sales.iter().position(|sale| &sale.id == id)
    }

    pub fn sales_for_lot<'a>(&'a self, id: &'a LotId) -> impl Iterator<Item = &'a SaleRecord> + 'a {
        self.sales.iter().filter(move |sale| &sale.inventory_id == id)
    }

    /// Sum of `sell_boxes` over every sale drawn from the lot
    pub fn sold_from_lot(&self, id: &LotId) -> Decimal {
        self.sales_for_lot(id)
            .fold(Decimal::ZERO, |sum, sale| sum.saturating_add(sale.sell_boxes))
    }

    pub fn is_rest_day(&self, date: NaiveDate) -> bool {
        self.rest_days.binary_search(&date).is_ok()
    }

    /// Mark a rest day; returns `false` when it was already marked
    pub fn add_rest_day(&mut self, date: NaiveDate) -> bool {
        match self.rest_days.binary_search(&date) {
            Ok(_) => false,
            Err(pos) => {
                self.rest_days.insert(pos, date);
                true
            }
        }
    }

    /// Unmark a rest day; returns `false` when it was not marked
    pub fn remove_rest_day(&mut self, date: NaiveDate) -> bool {
        match self.rest_days.binary_search(&date) {
            Ok(pos) => {
                self.rest_days.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Restore the rest-day ordering after reading an older snapshot
    pub fn normalize_rest_days(&mut self) {
        self.rest_days.sort_unstable();
        self.rest_days.dedup();
    }
}

fn read_records<T: DeserializeOwned>(
    value: &Value,
    collection: &'static str,
    skipped: &mut Vec<SkippedRecord>,
) -> Vec<T> {
    let Some(items) = value.get(collection).and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match T::deserialize(item) {
            Ok(record) => Some(record),
            Err(e) => {
                skipped.push(SkippedRecord {
                    collection,
                    index,
                    reason: e.to_string(),
                });
                None
            }
        })
        .collect()
}

fn keep_recomputed<T, E: std::fmt::Display>(
    records: &mut Vec<T>,
    collection: &'static str,
    skipped: &mut Vec<SkippedRecord>,
    recompute: impl Fn(&mut T) -> Result<(), E>,
) {
    let mut index = 0;
    records.retain_mut(|record| {
        let kept = match recompute(record) {
            Ok(()) => true,
            Err(e) => {
                skipped.push(SkippedRecord {
                    collection,
                    index,
                    reason: e.to_string(),
                });
                false
            }
        };
        index += 1;
        kept
    });
}
