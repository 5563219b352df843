// Copyright (c) 2025 - Cowboy AI, Inc.
//! Equipment Registry
//!
//! Static descriptions of units, extensions and sites. The registry says what
//! exists; the event log says where it is.
//!
//! The bundled implementation is loaded from a JSON file:
//!
//! ```json
//! {
//!   "units": [{ "id": "...", "unit_number": "EX-01", "equipment_type": "excavator",
//!               "supplier_name": null, "ownership": "owned" }],
//!   "extensions": [{ "id": "...", "code": "BKT-1", "extension_type": "bucket" }],
//!   "sites": [{ "id": "...", "title": "North Yard" }]
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::domain::{EquipmentUnit, Extension, Site};
use crate::errors::{EngineError, EngineResult};

/// Lookup of registered units, extensions and sites
#[async_trait]
pub trait EquipmentRegistry: Send + Sync {
    /// Every registered unit, active or not
    async fn units(&self) -> EngineResult<Vec<EquipmentUnit>>;

    /// Units currently in service
    async fn active_units(&self) -> EngineResult<Vec<EquipmentUnit>> {
        Ok(self.units().await?.into_iter().filter(|u| u.active).collect())
    }

    async fn unit(&self, unit_id: Uuid) -> EngineResult<Option<EquipmentUnit>>;

    async fn extensions(&self) -> EngineResult<Vec<Extension>>;

    async fn extension(&self, extension_id: Uuid) -> EngineResult<Option<Extension>>;

    async fn sites(&self) -> EngineResult<Vec<Site>>;
}

/// On-disk layout of a registry file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryFile {
    #[serde(default)]
    pub units: Vec<EquipmentUnit>,
    #[serde(default)]
    pub extensions: Vec<Extension>,
    #[serde(default)]
    pub sites: Vec<Site>,
}

/// Registry held in process memory
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    contents: RwLock<RegistryFile>,
}

impl InMemoryRegistry {
    pub fn new(units: Vec<EquipmentUnit>, extensions: Vec<Extension>, sites: Vec<Site>) -> Self {
        Self {
            contents: RwLock::new(RegistryFile {
                units,
                extensions,
                sites,
            }),
        }
    }

    /// Parse a registry from JSON text
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let file: RegistryFile = serde_json::from_str(json)?;
        Ok(Self {
            contents: RwLock::new(file),
        })
    }

    /// Load a registry file from disk
    pub async fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            EngineError::Configuration(format!("cannot read registry {}: {}", path.display(), e))
        })?;
        let registry = Self::from_json(&json)?;

        {
            let contents = registry.contents.read().await;
            info!(
                path = %path.display(),
                units = contents.units.len(),
                extensions = contents.extensions.len(),
                sites = contents.sites.len(),
                "Loaded equipment registry"
            );
        }

        Ok(registry)
    }

    /// Register or replace a unit
    pub async fn upsert_unit(&self, unit: EquipmentUnit) {
        let mut contents = self.contents.write().await;
        contents.units.retain(|u| u.id != unit.id);
        contents.units.push(unit);
    }
}

#[async_trait]
impl EquipmentRegistry for InMemoryRegistry {
    async fn units(&self) -> EngineResult<Vec<EquipmentUnit>> {
        Ok(self.contents.read().await.units.clone())
    }

    async fn unit(&self, unit_id: Uuid) -> EngineResult<Option<EquipmentUnit>> {
        Ok(self
            .contents
            .read()
            .await
            .units
            .iter()
            .find(|u| u.id == unit_id)
            .cloned())
    }

    async fn extensions(&self) -> EngineResult<Vec<Extension>> {
        Ok(self.contents.read().await.extensions.clone())
    }

    async fn extension(&self, extension_id: Uuid) -> EngineResult<Option<Extension>> {
        Ok(self
            .contents
            .read()
            .await
            .extensions
            .iter()
            .find(|x| x.id == extension_id)
            .cloned())
    }

    async fn sites(&self) -> EngineResult<Vec<Site>> {
        Ok(self.contents.read().await.sites.clone())
    }
}
