//! Texture registry for the pipeline manager's callers.
//!
//! Textures are looked up by a stable id derived from their name, so game
//! code can resolve ids once and bind views each frame. The store never
//! interprets the view type; it is whatever the graphics backend hands out.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// Name-addressed texture id: the first 8 bytes of SHA-256 over the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextureId(pub u64);

impl TextureId {
    pub fn from_name(name: &str) -> Self {
        let digest = Sha256::digest(name.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        TextureId(u64::from_le_bytes(bytes))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("texture already registered: {0}")]
    Duplicate(String),
    #[error("texture not registered: {0}")]
    NotFound(String),
    #[error("texture name must not be empty")]
    EmptyName,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug)]
struct Entry<V> {
    name: String,
    view: V,
}

/// Registry of texture views keyed by [`TextureId`].
#[derive(Debug)]
pub struct TextureStore<V> {
    entries: BTreeMap<TextureId, Entry<V>>,
}

impl<V> Default for TextureStore<V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<V> TextureStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `view` under `name`. A name can only be registered once.
    pub fn register(&mut self, name: &str, view: V) -> Result<TextureId, AssetError> {
        if name.is_empty() {
            return Err(AssetError::EmptyName);
        }
        let id = TextureId::from_name(name);
        if self.entries.contains_key(&id) {
            tracing::warn!(name, "duplicate texture registration rejected");
            return Err(AssetError::Duplicate(name.to_string()));
        }
        self.entries.insert(
            id,
            Entry {
                name: name.to_string(),
                view,
            },
        );
        tracing::debug!(name, id = id.0, "texture registered");
        Ok(id)
    }

    /// Id of a registered name.
    pub fn id(&self, name: &str) -> Option<TextureId> {
        let id = TextureId::from_name(name);
        self.entries.contains_key(&id).then_some(id)
    }

    pub fn get(&self, id: TextureId) -> Option<&V> {
        self.entries.get(&id).map(|e| &e.view)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&V> {
        self.get(TextureId::from_name(name))
    }

    /// Like [`TextureStore::id`], failing with [`AssetError::NotFound`].
    pub fn require(&self, name: &str) -> Result<TextureId, AssetError> {
        self.id(name)
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }

    pub fn name(&self, id: TextureId) -> Option<&str> {
        self.entries.get(&id).map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name to id table, sorted by name.
    pub fn manifest(&self) -> BTreeMap<String, TextureId> {
        self.entries
            .iter()
            .map(|(id, e)| (e.name.clone(), *id))
            .collect()
    }

    /// Writes the manifest as pretty JSON for inspection.
    pub fn save_manifest(&self, path: impl AsRef<Path>) -> Result<(), AssetError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &self.manifest())?;
        Ok(())
    }
}

pub fn crate_info() -> &'static str {
    "shadekit-assets v0.1.0"
}
