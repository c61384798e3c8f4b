//! Per-class version bookkeeping for evolvable user types.
//!
//! An [Evolvable] type tracks the schema version the data on the wire was written with
//! (`data_version`), the schema version the running code implements (`impl_version`), and any
//! bytes belonging to properties newer than `impl_version` that this code doesn't understand
//! (`future_data`). A [hierarchical serializer](crate::serializer::hierarchical) keeps one
//! [Evolvable] per ancestor class in an [EvolvableHolder], so that unknown future data for one
//! class in the hierarchy doesn't get confused with another's.

use std::collections::BTreeMap;

/// The version state of a single evolvable class.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Evolvable {
    data_version: i32,
    impl_version: i32,
    future_data: Vec<u8>,
}

impl Evolvable {
    pub fn new(impl_version: i32) -> Self {
        Self {
            data_version: impl_version,
            impl_version,
            future_data: Vec::new(),
        }
    }

    /// The version the data on the wire was actually written with.
    pub fn data_version(&self) -> i32 {
        self.data_version
    }

    pub fn set_data_version(&mut self, version: i32) {
        self.data_version = version;
    }

    /// The version this running code implements.
    pub fn impl_version(&self) -> i32 {
        self.impl_version
    }

    /// Bytes belonging to properties newer than `impl_version`, preserved verbatim so they survive
    /// a read-modify-write cycle by code that doesn't understand them.
    pub fn future_data(&self) -> &[u8] {
        &self.future_data
    }

    pub fn set_future_data(&mut self, data: Vec<u8>) {
        self.future_data = data;
    }

    /// The version a frame for this class should be written with: whichever of `data_version` and
    /// `impl_version` is higher, so that data originally written by a newer version of this same
    /// class keeps claiming that version number even if re-saved by older code.
    pub fn effective_version(&self) -> i32 {
        self.data_version.max(self.impl_version)
    }

    pub fn has_future_data(&self) -> bool {
        !self.future_data.is_empty()
    }
}

/// A type id (ancestor class id) keyed set of [Evolvable] state, iterated in ascending type id
/// order so a hierarchical serializer always walks classes the same way on write as on read.
#[derive(Clone, Debug, Default)]
pub struct EvolvableHolder {
    by_type_id: BTreeMap<i32, Evolvable>,
}

impl EvolvableHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type_id.is_empty()
    }

    /// The ascending list of class ids this holder has state for.
    pub fn type_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.by_type_id.keys().copied()
    }

    pub fn get(&self, type_id: i32) -> Option<&Evolvable> {
        self.by_type_id.get(&type_id)
    }

    /// Get the entry for `type_id`, creating it (at `impl_version`) on first access.
    pub fn entry_or_insert(&mut self, type_id: i32, impl_version: i32) -> &mut Evolvable {
        self.by_type_id
            .entry(type_id)
            .or_insert_with(|| Evolvable::new(impl_version))
    }

    pub fn insert(&mut self, type_id: i32, evolvable: Evolvable) {
        self.by_type_id.insert(type_id, evolvable);
    }
}
