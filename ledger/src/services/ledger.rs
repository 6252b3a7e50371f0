//! Ledger service: inventory lots, sale records and rest days
//!
//! Keeps `remain_boxes = boxes - sold` true for every lot across add, edit
//! and delete of both collections. Each operation validates completely
//! before touching state, so a rejected call leaves the ledger unchanged;
//! each accepted mutation persists the whole snapshot.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::{
    InventoryLot, InventoryUpdate, LedgerSnapshot, LotId, LotStatus, NewInventoryLot,
    NewSaleRecord, SaleId, SaleRecord, SaleUpdate, SalesStats,
};
use validator::Validate;

use crate::error::{LedgerError, LedgerResult};
use crate::services::reporting::ReportingService;
use crate::store::{KeyValueStorage, LedgerStore, SaveReport, StorageSlot};

/// Ledger service owning the in-memory snapshot and its store
pub struct LedgerService<S: KeyValueStorage> {
    store: LedgerStore<S>,
    snapshot: LedgerSnapshot,
    recovered_from: Option<StorageSlot>,
    repaired: bool,
}

/// An accepted mutation and how its persistence went
#[derive(Debug, Clone)]
pub struct Committed<T> {
    pub value: T,
    /// `None` when the call changed nothing and no save was needed
    pub save: Option<SaveReport>,
}

impl<T> Committed<T> {
    /// The change is in the primary slot, or there was nothing to persist
    pub fn is_durable(&self) -> bool {
        self.save.as_ref().map_or(true, SaveReport::ok)
    }
}

impl<S: KeyValueStorage> LedgerService<S> {
    /// Hydrate from the first valid slot in the store
    pub fn open(mut store: LedgerStore<S>) -> Self {
        let report = store.load();
        Self {
            store,
            snapshot: report.snapshot,
            recovered_from: report.source,
            repaired: report.repaired,
        }
    }

    /// Slot the ledger was hydrated from; `None` means it started empty
    pub fn recovered_from(&self) -> Option<StorageSlot> {
        self.recovered_from
    }

    /// The primary slot was rebuilt from a backup while opening
    pub fn was_repaired(&self) -> bool {
        self.repaired
    }

    pub fn store(&self) -> &LedgerStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut LedgerStore<S> {
        &mut self.store
    }

    pub fn snapshot(&self) -> &LedgerSnapshot {
        &self.snapshot
    }

    // ------------------------------------------------------------------------
    // Inventory
    // ------------------------------------------------------------------------

    /// Record a purchase; the whole lot starts in stock
    pub fn add_inventory(&mut self, input: NewInventoryLot) -> LedgerResult<Committed<InventoryLot>> {
        input.validate()?;

        let lot = InventoryLot::new(LotId::generate(), input, self.store.clock().now())?;
        tracing::debug!(lot_id = %lot.id, fruit = %lot.fruit, boxes = %lot.boxes, "inventory lot added");

        self.snapshot.inventory.insert(0, lot.clone());
        Ok(self.commit(lot))
    }

    /// Edit a lot. The new size may not drop below what has already been sold.
    pub fn update_inventory(
        &mut self,
        id: &LotId,
        update: InventoryUpdate,
    ) -> LedgerResult<Committed<InventoryLot>> {
        update.validate()?;

        let idx = self
            .snapshot
            .lot_index(id)
            .ok_or_else(|| LedgerError::LotNotFound(id.clone()))?;
        let lot = &self.snapshot.inventory[idx];

        let sold = lot.sold_boxes();
        let boxes = update.boxes.unwrap_or(lot.boxes);
        if boxes < sold {
            return Err(LedgerError::InvalidBounds {
                lot_id: id.clone(),
                requested: boxes,
                sold,
            });
        }

        let mut edited = lot.clone();
        if let Some(fruit) = update.fruit {
            edited.fruit = fruit.trim().to_string();
        }
        if let Some(price_per_box) = update.price_per_box {
            edited.price_per_box = price_per_box;
        }
        edited.boxes = boxes;
        edited.remain_boxes = boxes - sold;
        edited.recompute()?;

        tracing::debug!(lot_id = %id, boxes = %edited.boxes, remain = %edited.remain_boxes, "inventory lot updated");
        self.snapshot.inventory[idx] = edited.clone();
        Ok(self.commit(edited))
    }

    /// Remove a lot that no sale refers to
    pub fn delete_inventory(&mut self, id: &LotId) -> LedgerResult<Committed<InventoryLot>> {
        let idx = self
            .snapshot
            .lot_index(id)
            .ok_or_else(|| LedgerError::LotNotFound(id.clone()))?;

        let count = self.snapshot.sales_for_lot(id).count();
        if count > 0 {
            return Err(LedgerError::HasDependentSales {
                lot_id: id.clone(),
                count,
            });
        }

        let lot = self.snapshot.inventory.remove(idx);
        tracing::debug!(lot_id = %id, "inventory lot deleted");
        Ok(self.commit(lot))
    }

    // ------------------------------------------------------------------------
    // Sales
    // ------------------------------------------------------------------------

    /// Record a sale and draw its boxes from the lot
    pub fn add_sale(&mut self, input: NewSaleRecord) -> LedgerResult<Committed<SaleRecord>> {
        input.validate()?;

        let idx = self
            .snapshot
            .lot_index(&input.inventory_id)
            .ok_or_else(|| LedgerError::LotNotFound(input.inventory_id.clone()))?;
        let lot = &self.snapshot.inventory[idx];

        if lot.status == LotStatus::Finished {
            return Err(LedgerError::LotFinished(lot.id.clone()));
        }
        if input.sell_boxes > lot.remain_boxes {
            return Err(LedgerError::InsufficientStock {
                lot_id: lot.id.clone(),
                requested: input.sell_boxes,
                available: lot.remain_boxes,
            });
        }

        let sale =
            SaleRecord::against_lot(SaleId::generate(), input, lot, self.store.clock().now())?;

        let lot = &mut self.snapshot.inventory[idx];
        lot.remain_boxes -= sale.sell_boxes;
        lot.refresh_status();
        tracing::debug!(
            sale_id = %sale.id,
            lot_id = %lot.id,
            sell_boxes = %sale.sell_boxes,
            remain = %lot.remain_boxes,
            "sale recorded"
        );

        self.snapshot.sales.insert(0, sale.clone());
        Ok(self.commit(sale))
    }

    /// Edit a sale. A quantity change moves only the difference between the
    /// old and new `sell_boxes` in or out of the lot.
    pub fn update_sale(
        &mut self,
        id: &SaleId,
        update: SaleUpdate,
    ) -> LedgerResult<Committed<SaleRecord>> {
        update.validate()?;

        let sale_idx = self
            .snapshot
            .sale_index(id)
            .ok_or_else(|| LedgerError::SaleNotFound(id.clone()))?;
        let sale = &self.snapshot.sales[sale_idx];

        let old_boxes = sale.sell_boxes;
        let new_boxes = update.sell_boxes.unwrap_or(old_boxes);
        let delta = new_boxes - old_boxes;

        let lot_idx = if delta.is_zero() {
            None
        } else {
            let lot_idx = self
                .snapshot
                .lot_index(&sale.inventory_id)
                .ok_or_else(|| LedgerError::LotNotFound(sale.inventory_id.clone()))?;
            let lot = &self.snapshot.inventory[lot_idx];
            if delta > lot.remain_boxes {
                return Err(LedgerError::InsufficientStock {
                    lot_id: lot.id.clone(),
                    requested: new_boxes,
                    available: old_boxes.saturating_add(lot.remain_boxes),
                });
            }
            Some(lot_idx)
        };

        let mut edited = sale.clone();
        if let Some(location) = update.location {
            edited.location = location.trim().to_string();
        }
        if let Some(cash) = update.cash {
            edited.cash = cash;
        }
        if let Some(alipay) = update.alipay {
            edited.alipay = alipay;
        }
        if let Some(wechat) = update.wechat {
            edited.wechat = wechat;
        }
        edited.sell_boxes = new_boxes;
        edited.recompute()?;

        if let Some(lot_idx) = lot_idx {
            let lot = &mut self.snapshot.inventory[lot_idx];
            lot.remain_boxes -= delta;
            lot.refresh_status();
        }
        self.snapshot.sales[sale_idx] = edited.clone();

        tracing::debug!(sale_id = %id, delta = %delta, "sale updated");
        Ok(self.commit(edited))
    }

    /// Remove a sale and return its boxes to the lot
    pub fn delete_sale(&mut self, id: &SaleId) -> LedgerResult<Committed<SaleRecord>> {
        let sale_idx = self
            .snapshot
            .sale_index(id)
            .ok_or_else(|| LedgerError::SaleNotFound(id.clone()))?;

        let sale = self.snapshot.sales.remove(sale_idx);
        match self.snapshot.lot_index(&sale.inventory_id) {
            Some(lot_idx) => {
                let lot = &mut self.snapshot.inventory[lot_idx];
                lot.remain_boxes += sale.sell_boxes;
                lot.status = LotStatus::Active;
            }
            None => {
                tracing::warn!(sale_id = %id, lot_id = %sale.inventory_id, "deleted sale referenced a missing lot");
            }
        }

        tracing::debug!(sale_id = %id, "sale deleted");
        Ok(self.commit(sale))
    }

    // ------------------------------------------------------------------------
    // Rest days
    // ------------------------------------------------------------------------

    /// Mark a day without market attendance; a repeat call changes nothing
    pub fn add_rest_day(&mut self, date: NaiveDate) -> Committed<bool> {
        if self.snapshot.add_rest_day(date) {
            tracing::debug!(%date, "rest day added");
            self.commit(true)
        } else {
            Committed {
                value: false,
                save: None,
            }
        }
    }

    pub fn remove_rest_day(&mut self, date: NaiveDate) -> Committed<bool> {
        if self.snapshot.remove_rest_day(date) {
            tracing::debug!(%date, "rest day removed");
            self.commit(true)
        } else {
            Committed {
                value: false,
                save: None,
            }
        }
    }

    // ------------------------------------------------------------------------
    // Read views
    // ------------------------------------------------------------------------

    pub fn inventory(&self) -> &[InventoryLot] {
        &self.snapshot.inventory
    }

    pub fn sales(&self) -> &[SaleRecord] {
        &self.snapshot.sales
    }

    pub fn rest_days(&self) -> &[NaiveDate] {
        &self.snapshot.rest_days
    }

    pub fn lot(&self, id: &LotId) -> Option<&InventoryLot> {
        self.snapshot.lot(id)
    }

    pub fn sale(&self, id: &SaleId) -> Option<&SaleRecord> {
        self.snapshot.sale(id)
    }

    pub fn sales_for_lot<'a>(&'a self, id: &'a LotId) -> impl Iterator<Item = &'a SaleRecord> + 'a {
        self.snapshot.sales_for_lot(id)
    }

    /// Lots that can still be sold from
    pub fn active_inventory(&self) -> Vec<&InventoryLot> {
        self.snapshot
            .inventory
            .iter()
            .filter(|lot| lot.is_sellable())
            .collect()
    }

    /// Boxes remaining across active lots
    pub fn total_stock(&self) -> Decimal {
        self.snapshot
            .inventory
            .iter()
            .filter(|lot| lot.status == LotStatus::Active)
            .fold(Decimal::ZERO, |sum, lot| sum.saturating_add(lot.remain_boxes))
    }

    /// Income, profit and cost over sales dated within the last `days` days
    pub fn stats_over_window(&self, days: u32) -> SalesStats {
        self.reporting().window_stats(days)
    }

    pub fn reporting(&self) -> ReportingService<'_> {
        ReportingService::new(&self.snapshot, self.store.clock().today())
    }

    /// Write the in-memory snapshot to the emergency slot
    pub fn emergency_backup(&mut self) -> bool {
        self.store.emergency_backup(&self.snapshot)
    }

    fn commit<T>(&mut self, value: T) -> Committed<T> {
        let save = self.store.save(&self.snapshot);
        if !save.ok() {
            tracing::warn!(
                failed = save.failed.len(),
                "ledger change kept in memory but not persisted"
            );
        }
        Committed {
            value,
            save: Some(save),
        }
    }
}
