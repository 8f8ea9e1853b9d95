//! Revocable preview handles for encoded page images.
//!
//! A [`PreviewHandle`] is the headless counterpart of a browser object URL:
//! an opaque `blob:` identifier that resolves to the PNG bytes of one page
//! until it is revoked. The [`PreviewRegistry`] owns the bytes; handles are
//! cheap to clone and carry no data themselves.
//!
//! Every handle must be revoked exactly once, either when a newer run
//! supersedes it or when the session resets. Revoking twice is harmless and
//! reported as `false`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

/// Revocable reference to an in-memory image blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PreviewHandle {
    #[serde(rename = "url", serialize_with = "serialize_blob_url")]
    id: Uuid,
    mime_type: &'static str,
}

impl PreviewHandle {
    /// `blob:pdfpages/<uuid>` style identifier.
    pub fn url(&self) -> String {
        blob_url(&self.id)
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }
}

fn blob_url(id: &Uuid) -> String {
    format!("blob:pdfpages/{}", id)
}

fn serialize_blob_url<S: Serializer>(id: &Uuid, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&blob_url(id))
}

impl fmt::Display for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Owner of all live preview blobs.
///
/// Cloning the registry shares the same underlying table.
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    blobs: Arc<Mutex<HashMap<Uuid, Arc<Vec<u8>>>>>,
}

impl fmt::Debug for PreviewRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewRegistry")
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<Vec<u8>>>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register PNG bytes and hand out a new handle.
    pub fn create(&self, bytes: Arc<Vec<u8>>) -> PreviewHandle {
        let id = Uuid::new_v4();
        self.table().insert(id, bytes);
        PreviewHandle {
            id,
            mime_type: "image/png",
        }
    }

    /// Bytes behind a handle, or `None` once revoked.
    pub fn resolve(&self, handle: &PreviewHandle) -> Option<Arc<Vec<u8>>> {
        self.table().get(&handle.id).cloned()
    }

    /// Inline `data:` URI for the handle, suitable for an `<img src>`.
    pub fn data_uri(&self, handle: &PreviewHandle) -> Option<String> {
        self.resolve(handle).map(|bytes| {
            format!("data:{};base64,{}", handle.mime_type, STANDARD.encode(bytes.as_slice()))
        })
    }

    /// Release one handle. Returns `true` if it was still live.
    pub fn revoke(&self, handle: &PreviewHandle) -> bool {
        self.table().remove(&handle.id).is_some()
    }

    /// Release a group of handles, returning how many were live.
    pub fn revoke_many<'a>(&self, handles: impl IntoIterator<Item = &'a PreviewHandle>) -> usize {
        let mut table = self.table();
        let released = handles
            .into_iter()
            .filter(|h| table.remove(&h.id).is_some())
            .count();
        if released > 0 {
            debug!("Revoked {} preview handle(s)", released);
        }
        released
    }

    /// Release every handle the registry still holds.
    pub fn revoke_all(&self) -> usize {
        let mut table = self.table();
        let released = table.len();
        table.clear();
        released
    }

    /// Number of handles that have not been revoked.
    pub fn outstanding(&self) -> usize {
        self.table().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_until_revoked() {
        let reg = PreviewRegistry::new();
        let h = reg.create(Arc::new(vec![1, 2, 3]));
        assert_eq!(reg.resolve(&h).as_deref(), Some(&vec![1, 2, 3]));
        assert!(h.url().starts_with("blob:pdfpages/"));

        assert!(reg.revoke(&h));
        assert!(reg.resolve(&h).is_none());
        assert!(!reg.revoke(&h), "second revoke is a no-op");
    }

    #[test]
    fn revoke_all_empties_registry() {
        let reg = PreviewRegistry::new();
        let handles: Vec<_> = (0..4).map(|i| reg.create(Arc::new(vec![i]))).collect();
        assert_eq!(reg.outstanding(), 4);
        assert_eq!(reg.revoke_all(), 4);
        assert_eq!(reg.outstanding(), 0);
        assert!(handles.iter().all(|h| reg.resolve(h).is_none()));
    }

    #[test]
    fn revoke_many_counts_only_live_handles() {
        let reg = PreviewRegistry::new();
        let a = reg.create(Arc::new(vec![0]));
        let b = reg.create(Arc::new(vec![1]));
        reg.revoke(&a);
        assert_eq!(reg.revoke_many([&a, &b]), 1);
    }

    #[test]
    fn data_uri_is_base64_png() {
        let reg = PreviewRegistry::new();
        let h = reg.create(Arc::new(b"\x89PNG".to_vec()));
        let uri = reg.data_uri(&h).unwrap();
        assert_eq!(uri, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn handle_serialises_as_blob_url() {
        let reg = PreviewRegistry::new();
        let h = reg.create(Arc::new(vec![7]));
        let json = serde_json::to_value(&h).unwrap();
        assert_eq!(json["url"], serde_json::Value::String(h.url()));
        assert_eq!(json["mime_type"], "image/png");
    }
}
