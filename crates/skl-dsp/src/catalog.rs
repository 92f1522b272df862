//! Firmware module catalog
//!
//! Maps module UUIDs (from the firmware manifest) to firmware module ids and
//! hands out private instance ids. A private id is the firmware-side address
//! of one instantiation; each module class has `max_instances` of them.

use crate::error::{DspError, Result};
use crate::module::ModuleUuid;
use tracing::debug;

/// One module class known to the firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Module class identifier
    pub uuid: ModuleUuid,
    /// Firmware module id
    pub module_id: u16,
    /// Topology instance id owning each private id, indexed by private id
    pvt_ids: Vec<Option<u8>>,
}

impl CatalogEntry {
    /// Entry with every private id free.
    pub fn new(uuid: ModuleUuid, module_id: u16, max_instances: usize) -> Self {
        Self {
            uuid,
            module_id,
            pvt_ids: vec![None; max_instances.min(usize::from(u8::MAX) + 1)],
        }
    }

    /// Number of private ids.
    pub fn max_instances(&self) -> usize {
        self.pvt_ids.len()
    }

    /// Number of private ids in use.
    pub fn instances_in_use(&self) -> usize {
        self.pvt_ids.iter().filter(|p| p.is_some()).count()
    }
}

/// UUID-keyed module table.
#[derive(Debug, Clone, Default)]
pub struct ModuleCatalog {
    entries: Vec<CatalogEntry>,
}

impl ModuleCatalog {
    /// Catalog from manifest entries.
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Add or replace an entry.
    pub fn register(&mut self, entry: CatalogEntry) {
        debug!("catalog: {} -> module {}", entry.uuid, entry.module_id);
        match self.entries.iter_mut().find(|e| e.uuid == entry.uuid) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Entry for a UUID.
    pub fn entry(&self, uuid: &ModuleUuid) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.uuid == *uuid)
    }

    fn entry_mut(&mut self, uuid: &ModuleUuid) -> Result<&mut CatalogEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.uuid == *uuid)
            .ok_or_else(|| DspError::UnknownModule {
                uuid: uuid.to_string(),
            })
    }

    /// Firmware module id of a UUID.
    ///
    /// # Errors
    ///
    /// Returns error if the UUID is not in the catalog.
    pub fn module_id(&self, uuid: &ModuleUuid) -> Result<u16> {
        self.entry(uuid)
            .map(|e| e.module_id)
            .ok_or_else(|| DspError::UnknownModule {
                uuid: uuid.to_string(),
            })
    }

    /// Allocate the lowest free private id for `instance_id`.
    ///
    /// # Errors
    ///
    /// Returns error if the UUID is unknown or every private id is taken.
    pub fn get_pvt_id(&mut self, uuid: &ModuleUuid, instance_id: u8) -> Result<u8> {
        let entry = self.entry_mut(uuid)?;
        let Some(slot) = entry.pvt_ids.iter().position(Option::is_none) else {
            return Err(DspError::NoPrivateId {
                module_id: entry.module_id,
                max_instances: entry.max_instances(),
            });
        };
        entry.pvt_ids[slot] = Some(instance_id);
        // slot < 256 by construction
        let pvt_id = slot as u8;
        debug!(
            "catalog: module {} instance {instance_id} -> pvt id {pvt_id}",
            entry.module_id
        );
        Ok(pvt_id)
    }

    /// Release a private id. Unknown UUIDs and free ids are ignored.
    pub fn put_pvt_id(&mut self, uuid: &ModuleUuid, pvt_id: u8) {
        if let Ok(entry) = self.entry_mut(uuid) {
            if let Some(slot) = entry.pvt_ids.get_mut(usize::from(pvt_id)) {
                *slot = None;
            }
        }
    }

    /// Private id currently held by a topology instance.
    pub fn pvt_id_of(&self, uuid: &ModuleUuid, instance_id: u8) -> Option<u8> {
        self.entry(uuid)?
            .pvt_ids
            .iter()
            .position(|p| *p == Some(instance_id))
            .and_then(|p| u8::try_from(p).ok())
    }
}
