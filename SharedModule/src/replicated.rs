//! # Replicated Variables
//!
//! An observable value that one role may write and everyone may read. The
//! authority writes through [`Replicated::set`], which marks the value dirty
//! for the next replication flush; peers receive the binding value through
//! [`Replicated::apply_remote`]. Subscribers run on every actual change, on
//! both sides.

use log::warn;
use std::fmt;

use crate::connection::NetRole;
use crate::error::{SyncError, SyncResult};

/// Callback invoked with `(old, new)` after a change
pub type ChangeCallback<T> = Box<dyn FnMut(&T, &T) + Send + 'static>;

/// A value replicated from its writer to every peer
pub struct Replicated<T> {
    /// Current value
    value: T,

    /// The only role allowed to call `set`
    writer: NetRole,

    /// Changed since the last flush
    dirty: bool,

    /// Incremented on every change
    version: u64,

    /// Change listeners
    subscribers: Vec<ChangeCallback<T>>,
}

impl<T: Clone + PartialEq> Replicated<T> {
    /// Authority-writable, everyone-readable
    pub fn authority(value: T) -> Self {
        Self {
            value,
            writer: NetRole::Authority,
            dirty: false,
            version: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn writer(&self) -> NetRole {
        self.writer
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Register a change listener
    pub fn subscribe(&mut self, callback: impl FnMut(&T, &T) + Send + 'static) {
        self.subscribers.push(Box::new(callback));
    }

    /// Write the value as `role`. Returns whether the value changed.
    pub fn set(&mut self, role: NetRole, value: T) -> SyncResult<bool> {
        if role != self.writer {
            warn!("Rejected write to replicated value by {:?} (writer is {:?})", role, self.writer);
            return Err(SyncError::permission_denied("replicated write"));
        }
        let changed = self.replace(value);
        if changed {
            self.dirty = true;
        }
        Ok(changed)
    }

    /// Apply a binding value received from the writer. Returns whether it changed.
    pub fn apply_remote(&mut self, value: T) -> bool {
        self.replace(value)
    }

    /// Take the value for replication if it changed since the last flush
    pub fn take_dirty(&mut self) -> Option<T> {
        if self.dirty {
            self.dirty = false;
            Some(self.value.clone())
        } else {
            None
        }
    }

    fn replace(&mut self, value: T) -> bool {
        if value == self.value {
            return false;
        }
        let old = std::mem::replace(&mut self.value, value);
        self.version += 1;
        for subscriber in self.subscribers.iter_mut() {
            subscriber(&old, &self.value);
        }
        true
    }
}

impl<T: fmt::Debug> fmt::Debug for Replicated<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replicated")
            .field("value", &self.value)
            .field("writer", &self.writer)
            .field("dirty", &self.dirty)
            .field("version", &self.version)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn client_write_is_rejected() {
        let mut value = Replicated::authority(1u32);
        assert_eq!(
            value.set(NetRole::Client, 2),
            Err(SyncError::permission_denied("replicated write"))
        );
        assert_eq!(*value.get(), 1);
        assert!(!value.is_dirty());
    }

    #[test]
    fn subscribers_fire_only_on_change() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut value = Replicated::authority(0u32);
        let sink = Arc::clone(&seen);
        value.subscribe(move |old, new| sink.lock().unwrap().push((*old, *new)));

        assert_eq!(value.set(NetRole::Authority, 5), Ok(true));
        assert_eq!(value.set(NetRole::Authority, 5), Ok(false));
        assert!(value.apply_remote(7));
        assert!(!value.apply_remote(7));

        assert_eq!(*seen.lock().unwrap(), vec![(0, 5), (5, 7)]);
        assert_eq!(value.version(), 2);
    }

    #[test]
    fn dirty_flag_clears_on_flush() {
        let mut value = Replicated::authority("a".to_string());
        value.set(NetRole::Authority, "b".to_string()).unwrap();
        assert_eq!(value.take_dirty(), Some("b".to_string()));
        assert_eq!(value.take_dirty(), None);
    }
}
