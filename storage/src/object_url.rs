//! Locally resolvable URLs for in-memory audio blobs.
//!
//! Every call to [`ObjectUrlRegistry::create`] mints a new URL, even for identical bytes.
//! URLs stay resolvable until they are revoked; nothing is revoked automatically.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use uuid::Uuid;

pub const OBJECT_URL_PREFIX: &str = "blob:cadence/";

/// The audio an object URL points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectBlob {
    pub bytes: Arc<[u8]>,
    pub mime: Arc<str>,
}

#[derive(Clone, Debug, Default)]
pub struct ObjectUrlRegistry {
    blobs: Arc<Mutex<HashMap<String, ObjectBlob>>>,
}

impl ObjectUrlRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new URL referencing `bytes`.
    pub fn create(&self, bytes: impl Into<Arc<[u8]>>, mime: impl Into<Arc<str>>) -> String {
        let url = format!("{OBJECT_URL_PREFIX}{}", Uuid::new_v4());
        let blob = ObjectBlob {
            bytes: bytes.into(),
            mime: mime.into(),
        };
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.clone(), blob);
        url
    }

    #[must_use]
    pub fn resolve(&self, url: &str) -> Option<ObjectBlob> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    /// Release the blob behind `url`. Returns `false` if the URL was unknown.
    pub fn revoke(&self, url: &str) -> bool {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url)
            .is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_object_url(url: &str) -> bool {
        url.starts_with(OBJECT_URL_PREFIX)
    }
}
