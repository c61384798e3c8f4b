//! The hierarchical serializer strategy: one nested, independently versioned frame per class in an
//! object's inheritance chain.
//!
//! Each ancestor class that is itself a registered user type gets its own nested frame, keyed by
//! both its property index and its type id, so that a class deep in the chain can evolve (gain
//! properties in a later schema version) without the classes above or below it in the chain having
//! to know or care. A reader that only knows some of the classes in the chain still preserves the
//! unknown ones' nested frames byte-for-byte, because [crate::stream::PofReader::read_nested_raw]
//! captures them without needing to interpret their contents.

use std::collections::BTreeSet;
use std::io::Cursor;

use crate::error::{Error, ErrorKind, ErrorLocation, MalformedError, Result};
use crate::evolvable::EvolvableHolder;
use crate::registry::PofContext;
use crate::stream::{PofReader, PofWriter};

/// A type whose wire representation is the union of its own properties and those of every
/// ancestor class that is independently registered and (potentially) independently evolvable.
///
/// `type_chain` lists the object's own class and every ancestor up to (but not including) any root
/// that is never itself a POF user type, most-derived first. Rust has no runtime class hierarchy
/// to walk, so the implementor states it explicitly (typically generated alongside the type rather
/// than hand-maintained).
pub trait HierarchicalObject: Default {
    fn type_chain(&self) -> Vec<&'static str>;

    fn evolvable_holder(&self) -> &EvolvableHolder;
    fn evolvable_holder_mut(&mut self) -> &mut EvolvableHolder;

    /// Write the slice of this object's properties declared by the class named `class_name` (one
    /// of [HierarchicalObject::type_chain]'s entries).
    fn write_class(&self, class_name: &str, writer: &mut PofWriter<&mut Vec<u8>>) -> Result<()>;

    /// Read properties belonging to `class_name` into `self`. Called once per ancestor frame, in
    /// ascending type-id order, against a fresh [Default] instance.
    fn read_class(&mut self, class_name: &str, reader: &mut PofReader<Cursor<Vec<u8>>>) -> Result<()>;
}

fn name_for_id<'a>(ctx: &PofContext, names: &[&'a str], type_id: i32) -> Option<&'a str> {
    names
        .iter()
        .copied()
        .find(|name| ctx.lookup_type_id(name) == Some(type_id))
}

/// Drives a [HierarchicalObject] through one nested frame per registered ancestor class, sorted
/// ascending by type id so the wire layout is deterministic regardless of declaration order.
#[derive(Debug, Default)]
pub struct HierarchicalSerializer;

impl HierarchicalSerializer {
    pub fn serialize<T: HierarchicalObject>(
        ctx: &PofContext,
        obj: &T,
        writer: &mut PofWriter<&mut Vec<u8>>,
    ) -> Result<()> {
        let names = obj.type_chain();
        let mut ids: BTreeSet<i32> = names
            .iter()
            .filter_map(|name| ctx.lookup_type_id(name))
            .collect();
        ids.extend(obj.evolvable_holder().type_ids());

        for id in ids {
            let evolvable = obj.evolvable_holder().get(id).cloned().unwrap_or_default();
            let class_name = name_for_id(ctx, &names, id);
            writer.write_nested(id, id, evolvable.effective_version(), |nested| {
                if let Some(name) = class_name {
                    obj.write_class(name, nested)?;
                }
                nested.write_remainder(evolvable.future_data())
            })?;
        }
        writer.write_remainder(&[])
    }

    pub fn deserialize<T: HierarchicalObject>(
        ctx: &PofContext,
        reader: &mut PofReader<Cursor<Vec<u8>>>,
    ) -> Result<T> {
        let mut obj = T::default();
        let names = obj.type_chain();

        loop {
            let next = reader.next_property_index()?;
            if next < 0 {
                break;
            }
            let (nested_type_id, version, mut nested) = reader.read_nested(next)?.ok_or_else(|| {
                Error::at(
                    ErrorKind::from(MalformedError::UnexpectedEndOfFrame),
                    ErrorLocation::unknown().with_property_index(next),
                )
            })?;

            if let Some(name) = name_for_id(ctx, &names, nested_type_id) {
                obj.read_class(name, &mut nested)
                    .map_err(|e| e.while_in_frame(nested_type_id))?;
            }
            let future_data = nested
                .read_remainder()
                .map_err(|e| e.while_in_frame(nested_type_id))?;

            let entry = obj.evolvable_holder_mut().entry_or_insert(nested_type_id, 0);
            entry.set_data_version(version);
            entry.set_future_data(future_data);
        }
        reader.read_remainder()?;
        Ok(obj)
    }
}
