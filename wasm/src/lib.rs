//! WebAssembly bindings for the stall ledger
//!
//! Exposes a [`WasmLedger`] handle backed by `window.localStorage`. Every
//! mutating call takes and returns JSON strings: `{ success: true, data,
//! persisted }` on success, or the ledger's error body with `success: false`.
//! Opening a handle registers a `beforeunload` listener that writes the
//! emergency slot; `free()` removes it again.

mod storage;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use shared::{InventoryUpdate, LotId, NewInventoryLot, NewSaleRecord, SaleId, SaleUpdate};
use stall_ledger::store::KeyValueStorage;
use stall_ledger::{
    Committed, LedgerError, LedgerResult, LedgerService, LedgerStore, SlotLayout,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

pub use storage::LocalStorage;

// Re-export shared types for use from Rust callers of this crate
pub use shared::models::*;
pub use shared::types::*;

const UNLOAD_EVENT: &str = "beforeunload";

type SharedLedger<S> = Rc<RefCell<LedgerService<S>>>;

/// Ledger handle for the browser
#[wasm_bindgen]
pub struct WasmLedger {
    inner: SharedLedger<LocalStorage>,
    on_unload: Option<Closure<dyn FnMut()>>,
}

#[wasm_bindgen]
impl WasmLedger {
    /// Open the ledger stored under the default `accountRecords` key
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<WasmLedger, JsValue> {
        Self::open(SlotLayout::default())
    }

    #[wasm_bindgen(js_name = withBaseKey)]
    pub fn with_base_key(base_key: &str) -> Result<WasmLedger, JsValue> {
        Self::open(SlotLayout::new(base_key))
    }

    fn open(layout: SlotLayout) -> Result<WasmLedger, JsValue> {
        let storage = LocalStorage::open().map_err(|e| JsValue::from_str(&e.to_string()))?;
        let ledger = LedgerService::open(LedgerStore::new(storage).with_layout(layout));
        if ledger.was_repaired() {
            web_sys::console::info_1(&JsValue::from_str("ledger restored from a backup slot"));
        }

        let inner = Rc::new(RefCell::new(ledger));
        let on_unload = register_unload_backup(&inner);
        Ok(WasmLedger { inner, on_unload })
    }

    /// Slot the ledger was loaded from, or `undefined` when it started empty
    #[wasm_bindgen(js_name = recoveredFrom)]
    pub fn recovered_from(&self) -> Option<String> {
        self.inner.borrow().recovered_from().map(|slot| slot.as_str().to_string())
    }

    /// The whole ledger as `{ inventory, sales, restDays }`
    pub fn snapshot(&self) -> String {
        to_json(self.inner.borrow().snapshot())
    }

    #[wasm_bindgen(js_name = addInventory)]
    pub fn add_inventory(&mut self, input: &str) -> String {
        let result = parse_input::<NewInventoryLot>(input)
            .and_then(|input| self.inner.borrow_mut().add_inventory(input));
        finish(result)
    }

    #[wasm_bindgen(js_name = updateInventory)]
    pub fn update_inventory(&mut self, id: &str, update: &str) -> String {
        let result = parse_input::<InventoryUpdate>(update)
            .and_then(|update| {
                self.inner
                    .borrow_mut()
                    .update_inventory(&LotId::new(id), update)
            });
        finish(result)
    }

    #[wasm_bindgen(js_name = deleteInventory)]
    pub fn delete_inventory(&mut self, id: &str) -> String {
        finish(self.inner.borrow_mut().delete_inventory(&LotId::new(id)))
    }

    #[wasm_bindgen(js_name = addSale)]
    pub fn add_sale(&mut self, input: &str) -> String {
        let result = parse_input::<NewSaleRecord>(input)
            .and_then(|input| self.inner.borrow_mut().add_sale(input));
        finish(result)
    }

    #[wasm_bindgen(js_name = updateSale)]
    pub fn update_sale(&mut self, id: &str, update: &str) -> String {
        let result = parse_input::<SaleUpdate>(update)
            .and_then(|update| {
                self.inner
                    .borrow_mut()
                    .update_sale(&SaleId::new(id), update)
            });
        finish(result)
    }

    #[wasm_bindgen(js_name = deleteSale)]
    pub fn delete_sale(&mut self, id: &str) -> String {
        finish(self.inner.borrow_mut().delete_sale(&SaleId::new(id)))
    }

    /// `date` is `YYYY-MM-DD`; `data` is whether the set changed
    #[wasm_bindgen(js_name = addRestDay)]
    pub fn add_rest_day(&mut self, date: &str) -> String {
        let result = parse_date(date).map(|date| self.inner.borrow_mut().add_rest_day(date));
        finish(result)
    }

    #[wasm_bindgen(js_name = removeRestDay)]
    pub fn remove_rest_day(&mut self, date: &str) -> String {
        let result = parse_date(date).map(|date| self.inner.borrow_mut().remove_rest_day(date));
        finish(result)
    }

    #[wasm_bindgen(js_name = activeInventory)]
    pub fn active_inventory(&self) -> String {
        to_json(&self.inner.borrow().active_inventory())
    }

    /// Decimal string, e.g. `"30"`
    #[wasm_bindgen(js_name = totalStock)]
    pub fn total_stock(&self) -> String {
        self.inner.borrow().total_stock().normalize().to_string()
    }

    #[wasm_bindgen(js_name = statsOverWindow)]
    pub fn stats_over_window(&self, days: u32) -> String {
        to_json(&self.inner.borrow().stats_over_window(days))
    }

    #[wasm_bindgen(js_name = salesByLocation)]
    pub fn sales_by_location(&self, days: u32) -> String {
        to_json(&self.inner.borrow().reporting().sales_by_location(days))
    }

    #[wasm_bindgen(js_name = salesByDate)]
    pub fn sales_by_date(&self, days: u32) -> String {
        to_json(&self.inner.borrow().reporting().sales_by_date(days))
    }

    #[wasm_bindgen(js_name = salesPace)]
    pub fn sales_pace(&self, days: u32) -> String {
        to_json(&self.inner.borrow().reporting().sales_pace(days))
    }

    #[wasm_bindgen(js_name = lotProgress)]
    pub fn lot_progress(&self) -> String {
        to_json(&self.inner.borrow().reporting().lot_progress())
    }

    #[wasm_bindgen(js_name = exportSalesCsv)]
    pub fn export_sales_csv(&self) -> String {
        match self.inner.borrow().reporting().export_sales_csv() {
            Ok(csv) => to_json(&json!({ "success": true, "data": csv })),
            Err(e) => to_json(&e.to_response()),
        }
    }

    /// Per-slot health of the stored ledger
    pub fn diagnostics(&self) -> String {
        to_json(&self.inner.borrow().store().diagnostics())
    }

    /// Write the current ledger to the emergency slot
    #[wasm_bindgen(js_name = emergencyBackup)]
    pub fn emergency_backup(&mut self) -> bool {
        self.inner.borrow_mut().emergency_backup()
    }
}

impl Drop for WasmLedger {
    fn drop(&mut self) {
        let (Some(closure), Some(window)) = (self.on_unload.take(), web_sys::window()) else {
            return;
        };
        if let Err(e) = window
            .remove_event_listener_with_callback(UNLOAD_EVENT, closure.as_ref().unchecked_ref())
        {
            web_sys::console::warn_2(&JsValue::from_str("could not remove unload listener"), &e);
        }
    }
}

/// Write the emergency slot when the page unloads. The listener holds only a
/// weak reference, so a freed handle is not kept alive by it.
fn register_unload_backup(ledger: &SharedLedger<LocalStorage>) -> Option<Closure<dyn FnMut()>> {
    let window = web_sys::window()?;
    let ledger = Rc::downgrade(ledger);
    let closure = Closure::<dyn FnMut()>::new(move || {
        if !backup_on_unload(&ledger) {
            web_sys::console::warn_1(&JsValue::from_str("emergency backup on unload failed"));
        }
    });

    match window.add_event_listener_with_callback(UNLOAD_EVENT, closure.as_ref().unchecked_ref()) {
        Ok(()) => Some(closure),
        Err(e) => {
            web_sys::console::warn_2(&JsValue::from_str("could not register unload backup"), &e);
            None
        }
    }
}

/// Emergency backup for a ledger that may already be gone or busy
fn backup_on_unload<S: KeyValueStorage>(ledger: &Weak<RefCell<LedgerService<S>>>) -> bool {
    let Some(shared) = ledger.upgrade() else {
        return false;
    };
    let Ok(mut ledger) = shared.try_borrow_mut() else {
        return false;
    };
    ledger.emergency_backup()
}

fn finish<T: Serialize>(result: LedgerResult<Committed<T>>) -> String {
    if let Ok(committed) = &result {
        if !committed.is_durable() {
            web_sys::console::warn_1(&JsValue::from_str(
                "ledger change kept in memory but not saved",
            ));
        }
    }
    respond(result)
}

/// Render an operation outcome as the JSON body handed back to the page
fn respond<T: Serialize>(result: LedgerResult<Committed<T>>) -> String {
    match result {
        Ok(committed) => to_json(&json!({
            "success": true,
            "data": committed.value,
            "persisted": committed.is_durable(),
        })),
        Err(e) => to_json(&e.to_response()),
    }
}

fn parse_input<T: DeserializeOwned>(input: &str) -> LedgerResult<T> {
    serde_json::from_str(input).map_err(|e| LedgerError::Validation {
        field: "input".to_string(),
        message: format!("Invalid input JSON: {}", e),
        message_zh: "输入格式不正确".to_string(),
    })
}

fn parse_date(date: &str) -> LedgerResult<NaiveDate> {
    date.parse::<NaiveDate>()
        .map_err(|_| LedgerError::Validation {
            field: "date".to_string(),
            message: format!("Invalid date: {}", date),
            message_zh: "日期格式应为 YYYY-MM-DD".to_string(),
        })
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        format!(
            r#"{{"success":false,"error":{{"code":"SERIALIZATION_ERROR","message_en":"{}","message_zh":"数据序列化失败"}}}}"#,
            e.to_string().replace('"', "'")
        )
    })
}
