//! Identity / reference bookkeeping for cyclic and shared object graphs.
//!
//! This module only provides the bookkeeping primitive described in the POF stream design: a map
//! from an object's identity to the reference id it was first written/read at. Driving these maps
//! while walking an arbitrary object graph is the responsibility of the (out of scope) higher
//! level tree-traversal reader/writer; [crate::stream::PofWriter] and [crate::stream::PofReader]
//! only expose the primitive so that a serializer strategy can opt in to it.

use std::collections::{HashMap, HashSet};

/// Tracks which object identities a [crate::stream::PofWriter] has already emitted, so that a
/// cycle or shared reference can be re-encoded as a back-reference instead of being written again.
///
/// References are disabled for the entire write of an evolvable object's frame, because preserving
/// references through unknown future data is not sound (see the POF design notes on cyclic graphs).
#[derive(Debug, Default)]
pub struct WriterIdentityTable {
    enabled: bool,
    next_id: i32,
    by_identity: HashMap<usize, i32>,
}

impl WriterIdentityTable {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            next_id: 0,
            by_identity: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up a previously registered reference id for `identity`, without registering it.
    pub fn lookup(&self, identity: usize) -> Option<i32> {
        if !self.enabled {
            return None;
        }
        self.by_identity.get(&identity).copied()
    }

    /// Register `identity`, returning the newly assigned reference id, or `None` if references are
    /// disabled or the identity was already registered (use [WriterIdentityTable::lookup] first).
    pub fn register(&mut self, identity: usize) -> Option<i32> {
        if !self.enabled || self.by_identity.contains_key(&identity) {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.by_identity.insert(identity, id);
        Some(id)
    }
}

/// The inverse of [WriterIdentityTable]: tracks reference ids a [crate::stream::PofReader] has
/// bound to a freshly constructed object, so that a later back-reference can resolve to it.
#[derive(Debug, Default)]
pub struct ReaderIdentityTable {
    enabled: bool,
    next_id: i32,
    seen: HashSet<i32>,
}

impl ReaderIdentityTable {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            next_id: 0,
            seen: HashSet::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Bind the current read position's identity to a freshly constructed object, returning the
    /// reference id it was assigned. Mirrors `registerIdentity` in the stream reader contract.
    pub fn register(&mut self) -> Option<i32> {
        if !self.enabled {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.seen.insert(id);
        Some(id)
    }

    pub fn is_registered(&self, id: i32) -> bool {
        self.seen.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_table_assigns_ids_once_per_identity() {
        let mut table = WriterIdentityTable::new(true);
        assert_eq!(table.lookup(0x1000), None);
        assert_eq!(table.register(0x1000), Some(0));
        // Second registration of the same identity is a no-op; callers must check lookup first.
        assert_eq!(table.register(0x1000), None);
        assert_eq!(table.lookup(0x1000), Some(0));
        assert_eq!(table.register(0x2000), Some(1));
    }

    #[test]
    fn disabled_table_never_registers() {
        let mut table = WriterIdentityTable::new(false);
        assert_eq!(table.register(0x1000), None);
        assert_eq!(table.lookup(0x1000), None);
    }

    #[test]
    fn reader_table_assigns_sequential_ids() {
        let mut table = ReaderIdentityTable::new(true);
        let a = table.register().unwrap();
        let b = table.register().unwrap();
        assert_ne!(a, b);
        assert!(table.is_registered(a));
        assert!(table.is_registered(b));
        assert!(!table.is_registered(b + 100));
    }
}
