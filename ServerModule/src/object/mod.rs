//! # Object Registry
//!
//! Server-authoritative map from object type id to at most one live
//! instance. The first reference to a type spawns it from the prefab
//! catalog at the staging pose; later references return the same instance.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use log::{debug, info, warn};
use xrs_shared::constants::spatial::FIRST_INSTANCE_ID;
use xrs_shared::{InstanceId, ObjectTypeId, PlayerId, Pose, SyncError, SyncResult};

use crate::spatial::AuthorityObject;

// Submodules
pub mod catalog;   // Prefab catalog

pub use catalog::{GrabbableSpec, PrefabCatalog, PrefabEntry};

/// Live instances keyed by type id
#[derive(Debug)]
pub struct ObjectRegistry {
    /// Types allowed to spawn
    catalog: PrefabCatalog,

    /// Pose new instances are staged at
    staging_pose: Pose,

    /// At most one entry per type
    live: BTreeMap<ObjectTypeId, AuthorityObject>,

    /// Next network instance id
    next_instance_id: InstanceId,
}

impl ObjectRegistry {
    pub fn new(catalog: PrefabCatalog, staging_pose: Pose) -> Self {
        Self {
            catalog,
            staging_pose,
            live: BTreeMap::new(),
            next_instance_id: FIRST_INSTANCE_ID,
        }
    }

    pub fn catalog(&self) -> &PrefabCatalog {
        &self.catalog
    }

    /// Return the live instance of `type_id`, spawning it on first reference.
    ///
    /// The boolean is `true` when this call spawned the instance.
    pub fn get_or_spawn(
        &mut self,
        type_id: &ObjectTypeId,
        default_owner: &PlayerId,
    ) -> SyncResult<(&mut AuthorityObject, bool)> {
        let slot = match self.live.entry(type_id.clone()) {
            Entry::Occupied(live) => return Ok((live.into_mut(), false)),
            Entry::Vacant(slot) => slot,
        };

        let prefab = match self.catalog.get(type_id) {
            Some(prefab) => prefab,
            None => {
                warn!("Refusing to spawn unknown object type: {}", type_id);
                return Err(SyncError::UnknownTypeId(type_id.to_string()));
            }
        };

        let instance_id = self.next_instance_id;
        self.next_instance_id += 1;
        info!("Spawning {} ({}) as instance {}", type_id, prefab.display_name, instance_id);

        let object = AuthorityObject::instantiate(
            type_id.clone(),
            instance_id,
            prefab,
            self.staging_pose,
            default_owner,
        );
        Ok((slot.insert(object), true))
    }

    pub fn get(&self, type_id: &ObjectTypeId) -> Option<&AuthorityObject> {
        self.live.get(type_id)
    }

    pub fn get_mut(&mut self, type_id: &ObjectTypeId) -> Option<&mut AuthorityObject> {
        self.live.get_mut(type_id)
    }

    /// Remove the bookkeeping entry of a torn-down object
    pub fn release(&mut self, type_id: &ObjectTypeId) -> Option<AuthorityObject> {
        let released = self.live.remove(type_id);
        match &released {
            Some(object) => debug!("Released {} (instance {})", type_id, object.instance_id),
            None => debug!("Release of {} ignored, no live instance", type_id),
        }
        released
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn type_ids(&self) -> Vec<ObjectTypeId> {
        self.live.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuthorityObject> {
        self.live.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AuthorityObject> {
        self.live.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ObjectRegistry {
        let catalog = PrefabCatalog::new()
            .with("SolarPanel", PrefabEntry::new("Solar panel").with_grabbable(Pose::identity()))
            .with("Inverter", PrefabEntry::new("Inverter"));
        ObjectRegistry::new(catalog, Pose::identity())
    }

    #[test]
    fn at_most_one_instance_per_type() {
        let host = PlayerId::from("host");
        let mut registry = registry();
        let type_id = ObjectTypeId::from("SolarPanel");

        let (first, spawned) = registry.get_or_spawn(&type_id, &host).unwrap();
        let first_id = first.instance_id;
        assert!(spawned);

        let (second, spawned) = registry.get_or_spawn(&type_id, &host).unwrap();
        assert!(!spawned);
        assert_eq!(second.instance_id, first_id);
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut registry = registry();
        let err = registry
            .get_or_spawn(&ObjectTypeId::from("Windmill"), &PlayerId::from("host"))
            .map(|_| ())
            .unwrap_err();
        assert_eq!(err, SyncError::UnknownTypeId("Windmill".into()));
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn live_instance_is_returned_even_after_its_prefab_changes() {
        let host = PlayerId::from("host");
        let mut registry = registry();
        let type_id = ObjectTypeId::from("Inverter");

        let first_id = registry.get_or_spawn(&type_id, &host).unwrap().0.instance_id;
        registry.catalog = PrefabCatalog::new();

        let (object, spawned) = registry.get_or_spawn(&type_id, &host).unwrap();
        assert!(!spawned);
        assert_eq!(object.instance_id, first_id);
        assert!(registry.get_or_spawn(&ObjectTypeId::from("SolarPanel"), &host).is_err());
    }

    #[test]
    fn release_allows_a_fresh_instance() {
        let host = PlayerId::from("host");
        let mut registry = registry();
        let type_id = ObjectTypeId::from("Inverter");

        let first_id = registry.get_or_spawn(&type_id, &host).unwrap().0.instance_id;
        assert!(registry.release(&type_id).is_some());
        assert!(registry.release(&type_id).is_none());

        let (object, spawned) = registry.get_or_spawn(&type_id, &host).unwrap();
        assert!(spawned);
        assert_ne!(object.instance_id, first_id);
    }
}
