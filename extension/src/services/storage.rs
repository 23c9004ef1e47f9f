// Chrome Storage API Integration
// chrome.storage.local behind the core's KeyValueStore

use async_trait::async_trait;
use serde_json::Value;
use stellar_wallet_core::{KeyValueStore, StorageError};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use super::{from_js, to_js};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = get, catch)]
    fn local_get(keys: JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = set, catch)]
    fn local_set(items: JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = remove, catch)]
    fn local_remove(keys: JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = clear, catch)]
    fn local_clear() -> Result<js_sys::Promise, JsValue>;
}

fn unavailable(e: JsValue) -> StorageError {
    StorageError::Unavailable(format!("{:?}", e))
}

async fn settle(promise: Result<js_sys::Promise, JsValue>) -> Result<JsValue, StorageError> {
    JsFuture::from(promise.map_err(unavailable)?)
        .await
        .map_err(unavailable)
}

#[derive(Clone, Copy, Default)]
pub struct ChromeStorage;

#[async_trait(?Send)]
impl KeyValueStore for ChromeStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let keys = js_sys::Array::new();
        keys.push(&key.into());

        let result = settle(local_get(keys.into())).await?;
        let item = js_sys::Reflect::get(&result, &key.into()).map_err(unavailable)?;
        if item.is_undefined() {
            return Ok(None);
        }

        from_js(&item)
            .map(Some)
            .map_err(|reason| StorageError::Decode {
                key: key.to_string(),
                reason,
            })
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let item = to_js(&value).map_err(|e| StorageError::Encode {
            key: key.to_string(),
            reason: format!("{:?}", e),
        })?;

        let obj = js_sys::Object::new();
        js_sys::Reflect::set(&obj, &key.into(), &item).map_err(unavailable)?;
        settle(local_set(obj.into())).await?;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        let array = js_sys::Array::new();
        for key in keys {
            array.push(&(*key).into());
        }
        settle(local_remove(array.into())).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        log::info!("Clearing storage...");
        settle(local_clear()).await?;
        Ok(())
    }
}
