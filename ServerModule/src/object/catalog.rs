//! # Prefab Catalog
//!
//! The static set of object types the registry is allowed to spawn. Types
//! are registered in code or loaded from JSON before the session starts and
//! stay stable for the catalog's lifetime.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use xrs_shared::{ObjectTypeId, Pose, SyncResult};

/// Grabbable sub-object carried by a prefab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrabbableSpec {
    /// Rest offset of the sub-object relative to the anchor
    pub dock_offset: Pose,
}

/// One spawnable object type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefabEntry {
    /// Human readable name
    pub display_name: String,

    /// Offset of the object from its anchor
    #[serde(default)]
    pub anchor_local_offset: Pose,

    /// Present when the object carries a grabbable sub-object
    #[serde(default)]
    pub grabbable: Option<GrabbableSpec>,
}

impl PrefabEntry {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            anchor_local_offset: Pose::identity(),
            grabbable: None,
        }
    }

    /// Attach a grabbable sub-object docked at `dock_offset`
    pub fn with_grabbable(mut self, dock_offset: Pose) -> Self {
        self.grabbable = Some(GrabbableSpec { dock_offset });
        self
    }
}

/// Catalog of spawnable types keyed by type id
#[derive(Debug, Clone, Default)]
pub struct PrefabCatalog {
    entries: HashMap<ObjectTypeId, PrefabEntry>,
}

impl PrefabCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a JSON object of `type id -> entry`
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let raw: HashMap<String, PrefabEntry> = serde_json::from_str(json)?;
        let mut catalog = PrefabCatalog::new();
        for (type_id, entry) in raw {
            catalog.register(ObjectTypeId::new(type_id), entry);
        }
        Ok(catalog)
    }

    /// Builder-style registration
    pub fn with(mut self, type_id: impl Into<String>, entry: PrefabEntry) -> Self {
        self.register(ObjectTypeId::new(type_id), entry);
        self
    }

    /// Registers a type, replacing any previous entry
    pub fn register(&mut self, type_id: ObjectTypeId, entry: PrefabEntry) {
        if self.entries.contains_key(&type_id) {
            log::warn!("Replacing existing prefab registration for type: {}", type_id);
        }
        log::debug!("Registered prefab {} ({})", type_id, entry.display_name);
        self.entries.insert(type_id, entry);
    }

    pub fn get(&self, type_id: &ObjectTypeId) -> Option<&PrefabEntry> {
        self.entries.get(type_id)
    }

    pub fn contains(&self, type_id: &ObjectTypeId) -> bool {
        self.entries.contains_key(type_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_from_json() {
        let catalog = PrefabCatalog::from_json(
            r#"{
                "SolarPanel": {
                    "display_name": "Solar panel",
                    "grabbable": {
                        "dock_offset": {
                            "position": { "x": 0.0, "y": 0.2, "z": 0.0 },
                            "rotation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 }
                        }
                    }
                },
                "Inverter": { "display_name": "Inverter" }
            }"#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 2);
        let panel = catalog.get(&ObjectTypeId::from("SolarPanel")).unwrap();
        assert_eq!(panel.grabbable.as_ref().unwrap().dock_offset.position.y, 0.2);
        assert!(catalog.get(&ObjectTypeId::from("Inverter")).unwrap().grabbable.is_none());
    }
}
