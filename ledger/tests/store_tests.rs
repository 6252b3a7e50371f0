//! Persistence store tests
//!
//! Tests for slot redundancy including:
//! - Recovery: a corrupted primary slot is restored from the first valid backup
//! - Round-trip: `load(save(snapshot)) == snapshot`
//! - File-backed storage survives reopening

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{InventoryLot, LedgerSnapshot, LotId, NewInventoryLot, NewSaleRecord, SaleId, SaleRecord};
use stall_ledger::store::{checksum_string, KeyValueStorage, SlotLayout};
use stall_ledger::{
    FileStorage, LedgerService, LedgerStore, ManualClock, MemoryStorage, StorageSlot,
};

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 11, 2, 8, 0, 0).unwrap())
}

fn sample_snapshot(lot_boxes: i64, sold: i64, rest_days: &[u32]) -> LedgerSnapshot {
    let created_at = Utc.with_ymd_and_hms(2024, 11, 1, 6, 30, 0).unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 11, 1).unwrap();

    let mut lot = InventoryLot::new(
        LotId::new("1730442600000"),
        NewInventoryLot {
            date,
            fruit: "橙子".to_string(),
            boxes: Decimal::from(lot_boxes),
            price_per_box: Decimal::new(655, 1),
        },
        created_at,
    )
    .unwrap();

    let mut snapshot = LedgerSnapshot::empty();
    if sold > 0 {
        let sale = SaleRecord::against_lot(
            SaleId::generate(),
            NewSaleRecord {
                date,
                location: "北街".to_string(),
                inventory_id: lot.id.clone(),
                sell_boxes: Decimal::from(sold),
                cash: Decimal::from(sold * 70),
                alipay: Decimal::ZERO,
                wechat: Decimal::new(125, 1),
            },
            &lot,
            created_at,
        )
        .unwrap();
        lot.remain_boxes -= sale.sell_boxes;
        lot.refresh_status();
        snapshot.sales.push(sale);
    }
    snapshot.inventory.push(lot);
    for day in rest_days {
        snapshot.add_rest_day(NaiveDate::from_ymd_opt(2024, 10, *day).unwrap());
    }
    snapshot
}

// ============================================================================
// Recovery Tests
// ============================================================================

#[cfg(test)]
mod recovery_tests {
    use super::*;

    /// Garbage in the primary slot falls back to the mirror and heals the primary
    #[test]
    fn test_corrupt_primary_recovers_from_mirror() {
        let snapshot = sample_snapshot(30, 12, &[5]);
        let mut store = LedgerStore::new(MemoryStorage::new()).with_clock(clock());
        assert!(store.save(&snapshot).ok());

        let layout = SlotLayout::default();
        store
            .storage_mut()
            .set(&layout.key(StorageSlot::Primary), "}{ not json")
            .unwrap();

        let report = store.load();
        assert_eq!(report.snapshot, snapshot);
        assert_eq!(report.source, Some(StorageSlot::Mirror));
        assert!(report.repaired);

        let primary = store
            .storage()
            .get(&layout.key(StorageSlot::Primary))
            .unwrap()
            .unwrap();
        let mirror = store
            .storage()
            .get(&layout.key(StorageSlot::Mirror))
            .unwrap()
            .unwrap();
        assert_eq!(primary, mirror);

        let checksum = store.storage().get(&layout.checksum_key()).unwrap().unwrap();
        assert_eq!(checksum, checksum_string(&primary));

        let diagnostics = store.diagnostics();
        assert_eq!(diagnostics.checksum_matches, Some(true));
        assert!(diagnostics.slots.iter().take(3).all(|slot| slot.valid));
    }

    /// A structurally wrong primary is treated like a corrupt one
    #[test]
    fn test_wrong_shape_primary_recovers() {
        let snapshot = sample_snapshot(10, 0, &[]);
        let mut store = LedgerStore::new(MemoryStorage::new()).with_clock(clock());
        store.save(&snapshot);

        store
            .storage_mut()
            .set("accountRecords", r#"{"customers":[]}"#)
            .unwrap();

        let ledger = LedgerService::open(store);
        assert_eq!(ledger.snapshot(), &snapshot);
        assert_eq!(ledger.recovered_from(), Some(StorageSlot::Mirror));
        assert!(ledger.was_repaired());
    }

    /// Every slot corrupt degrades to an empty ledger that still accepts writes
    #[test]
    fn test_all_slots_corrupt_starts_empty() {
        let mut storage = MemoryStorage::new();
        for slot in StorageSlot::RECOVERY_ORDER {
            storage
                .set(&SlotLayout::default().key(slot), "null")
                .unwrap();
        }

        let mut ledger =
            LedgerService::open(LedgerStore::new(storage).with_clock(clock()));
        assert!(ledger.snapshot().is_empty());
        assert_eq!(ledger.recovered_from(), None);

        let lot = ledger
            .add_inventory(NewInventoryLot {
                date: NaiveDate::from_ymd_opt(2024, 11, 2).unwrap(),
                fruit: "葡萄".to_string(),
                boxes: Decimal::from(8),
                price_per_box: Decimal::from(45),
            })
            .unwrap();
        assert!(lot.is_durable());
    }

    /// Snapshots written by the browser app load unchanged, legacy ids included
    #[test]
    fn test_loads_browser_snapshot() {
        let raw = r#"{
            "inventory": [{
                "id": "1730442600000",
                "date": "2024-11-01",
                "fruit": "梨",
                "boxes": 50,
                "pricePerBox": 80,
                "totalCost": 4000,
                "remainBoxes": 30,
                "status": "active",
                "createdAt": "2024-11-01T06:30:00.000Z"
            }],
            "sales": [{
                "id": "1730460000000",
                "date": "2024-11-01",
                "location": "东门",
                "inventoryId": "1730442600000",
                "fruit": "梨",
                "sellBoxes": 20,
                "cash": 300,
                "alipay": 100,
                "wechat": 0,
                "totalIncome": 400,
                "costPerBox": 80,
                "cost": 1600,
                "profit": -1200,
                "createdAt": "2024-11-01T11:20:00.000Z"
            }],
            "restDays": ["2024-10-31"]
        }"#;

        let mut storage = MemoryStorage::new();
        storage.set("accountRecords", raw).unwrap();
        let ledger = LedgerService::open(LedgerStore::new(storage).with_clock(clock()));

        assert_eq!(ledger.recovered_from(), Some(StorageSlot::Primary));
        let lot = ledger.lot(&LotId::new("1730442600000")).unwrap();
        assert_eq!(lot.remain_boxes, Decimal::from(30));
        assert_eq!(ledger.sales()[0].profit, Decimal::from(-1200));
        assert_eq!(ledger.total_stock(), Decimal::from(30));
    }

    /// A null field in every slot keeps the lot, and the next save cannot erase
    /// the original text
    #[test]
    fn test_null_field_in_every_slot_keeps_lot() {
        let raw = r#"{
            "inventory": [{
                "id": "1730442600000",
                "date": "2024-11-01",
                "fruit": "梨",
                "boxes": 50,
                "pricePerBox": 80,
                "totalCost": 4000,
                "remainBoxes": null,
                "status": "active",
                "createdAt": "2024-11-01T06:30:00.000Z"
            }],
            "sales": [],
            "restDays": []
        }"#;

        let layout = SlotLayout::default();
        let mut storage = MemoryStorage::new();
        for slot in StorageSlot::RECOVERY_ORDER {
            storage.set(&layout.key(slot), raw).unwrap();
        }

        let mut ledger = LedgerService::open(LedgerStore::new(storage).with_clock(clock()));
        assert_eq!(ledger.recovered_from(), Some(StorageSlot::Primary));
        let lot_id = LotId::new("1730442600000");
        assert_eq!(ledger.lot(&lot_id).unwrap().remain_boxes, Decimal::from(50));

        let rest_day = ledger.add_rest_day(NaiveDate::from_ymd_opt(2024, 11, 3).unwrap());
        assert!(rest_day.is_durable());

        let store = ledger.store();
        for slot in [StorageSlot::Primary, StorageSlot::Mirror, StorageSlot::MostRecent] {
            let stored = store.storage().get(&layout.key(slot)).unwrap().unwrap();
            let stored: LedgerSnapshot = serde_json::from_str(&stored).unwrap();
            assert_eq!(stored.inventory.len(), 1, "slot {slot} lost the lot");
            assert_eq!(stored.inventory[0].boxes, Decimal::from(50));
        }
        assert_eq!(
            store.storage().get(&layout.quarantine_key()).unwrap().as_deref(),
            Some(raw)
        );
    }

    /// One unreadable sale is dropped; its neighbours and the lot survive
    #[test]
    fn test_unreadable_sale_is_skipped_not_the_slot() {
        let raw = r#"{
            "inventory": [{
                "id": "lot-1", "date": "2024-11-01", "fruit": "橙子",
                "boxes": 10, "pricePerBox": 50, "remainBoxes": 6, "status": "active",
                "createdAt": "2024-11-01T06:30:00Z"
            }],
            "sales": [
                {
                    "id": "sale-1", "date": "2024-11-01", "location": "北街",
                    "inventoryId": "lot-1", "fruit": "橙子", "sellBoxes": 4,
                    "cash": 240, "alipay": 0, "wechat": 0, "costPerBox": 50,
                    "createdAt": "2024-11-01T10:00:00Z"
                },
                { "id": "sale-2", "date": "yesterday" }
            ]
        }"#;

        let mut store = LedgerStore::new(MemoryStorage::new()).with_clock(clock());
        store.storage_mut().set("accountRecords", raw).unwrap();
        let report = store.load();

        assert_eq!(report.source, Some(StorageSlot::Primary));
        assert_eq!(report.snapshot.inventory.len(), 1);
        assert_eq!(report.snapshot.sales.len(), 1);
        assert_eq!(report.snapshot.sales[0].profit, Decimal::from(40));
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].collection, "sales");
        assert_eq!(report.skipped[0].index, 1);
        assert!(report.quarantined);
    }
}

// ============================================================================
// File Storage Tests
// ============================================================================

#[cfg(test)]
mod file_storage_tests {
    use super::*;

    /// A file-backed ledger reopens with its changes and heals a damaged primary file
    #[test]
    fn test_file_backed_ledger_survives_restart() {
        let dir = tempfile::tempdir().unwrap();

        let lot_id = {
            let storage = FileStorage::open(dir.path()).unwrap();
            let mut ledger = LedgerService::open(LedgerStore::new(storage).with_clock(clock()));
            ledger
                .add_inventory(NewInventoryLot {
                    date: NaiveDate::from_ymd_opt(2024, 11, 2).unwrap(),
                    fruit: "西瓜".to_string(),
                    boxes: Decimal::from(12),
                    price_per_box: Decimal::from(30),
                })
                .unwrap()
                .value
                .id
        };

        std::fs::write(dir.path().join("accountRecords.json"), "truncated{").unwrap();

        let storage = FileStorage::open(dir.path()).unwrap();
        let ledger = LedgerService::open(LedgerStore::new(storage).with_clock(clock()));

        assert!(ledger.was_repaired());
        assert_eq!(ledger.lot(&lot_id).unwrap().boxes, Decimal::from(12));
        let healed = std::fs::read_to_string(dir.path().join("accountRecords.json")).unwrap();
        assert!(healed.contains("西瓜"));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Whatever is saved loads back unchanged
        #[test]
        fn prop_save_load_round_trip(
            (boxes, sold) in (1i64..200).prop_flat_map(|boxes| (Just(boxes), 0..=boxes)),
            rest_days in prop::collection::vec(1u32..31, 0..6),
        ) {
            let snapshot = sample_snapshot(boxes, sold, &rest_days);
            let mut store = LedgerStore::new(MemoryStorage::new()).with_clock(clock());

            prop_assert!(store.save(&snapshot).is_complete());
            let report = store.load();

            prop_assert_eq!(report.snapshot, snapshot);
            prop_assert_eq!(report.source, Some(StorageSlot::Primary));
            prop_assert!(!report.repaired);
        }

        /// Corrupting the primary slot with any text still recovers the saved snapshot
        #[test]
        fn prop_recovers_from_any_primary_garbage(garbage in "[^\\[{]{0,40}") {
            let snapshot = sample_snapshot(20, 5, &[1, 2]);
            let mut store = LedgerStore::new(MemoryStorage::new()).with_clock(clock());
            store.save(&snapshot);

            store.storage_mut().set("accountRecords", &garbage).unwrap();
            let report = store.load();

            prop_assert_eq!(report.snapshot, snapshot);
            prop_assert_eq!(report.source, Some(StorageSlot::Mirror));
        }
    }
}
