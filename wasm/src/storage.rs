//! `window.localStorage` as a ledger storage backend

use stall_ledger::store::{KeyValueStorage, StorageError, StorageErrorKind};
use wasm_bindgen::JsValue;

/// Browser `localStorage`, shared by every tab of the origin
pub struct LocalStorage {
    inner: web_sys::Storage,
}

impl LocalStorage {
    /// Open the window's local storage; fails outside a browser window or
    /// when storage is disabled
    pub fn open() -> Result<Self, StorageError> {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::new(StorageErrorKind::Unavailable, "no window"))?;
        let inner = window
            .local_storage()
            .map_err(js_error)?
            .ok_or_else(|| {
                StorageError::new(StorageErrorKind::Unavailable, "localStorage is disabled")
            })?;
        Ok(Self { inner })
    }
}

impl KeyValueStorage for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get_item(key).map_err(js_error)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.set_item(key, value).map_err(js_error)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.inner.remove_item(key).map_err(js_error)
    }
}

fn js_error(err: JsValue) -> StorageError {
    let name = js_sys::Reflect::get(&err, &JsValue::from_str("name"))
        .ok()
        .and_then(|name| name.as_string());
    let message = js_sys::Reflect::get(&err, &JsValue::from_str("message"))
        .ok()
        .and_then(|message| message.as_string())
        .or_else(|| err.as_string())
        .unwrap_or_else(|| "localStorage error".to_string());

    StorageError::new(error_kind(name.as_deref()), message)
}

/// Map a DOMException name onto a storage error kind
fn error_kind(name: Option<&str>) -> StorageErrorKind {
    match name {
        // Firefox reports the legacy name
        Some("QuotaExceededError") | Some("NS_ERROR_DOM_QUOTA_REACHED") => {
            StorageErrorKind::QuotaExceeded
        }
        Some("SecurityError") => StorageErrorKind::Unavailable,
        _ => StorageErrorKind::Io,
    }
}
