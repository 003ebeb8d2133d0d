//! `KeyValueStore` trait — the narrow persistence seam the wizard talks to.
//!
//! Values are opaque JSON strings. Callers own serialization so a corrupt
//! value surfaces at the caller as a parse failure rather than a store error.

use async_trait::async_trait;

use crate::error::StoreError;

/// Backend-agnostic, last-write-wins key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Insert or overwrite a value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a key. Returns whether anything was removed.
    async fn remove(&self, key: &str) -> Result<bool, StoreError>;
}
