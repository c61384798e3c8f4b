//! The reflective (annotation-driven) serializer strategy: a fixed attribute table drives indexed
//! property access instead of per-type hand-written `write_external`/`read_external` code.
//!
//! A reflection-based host would build this table by scanning annotated getters/setters at
//! runtime. Rust has no runtime reflection, so [ReflectiveSerializerBuilder] is the one-time,
//! explicitly-constructed equivalent: a caller (typically a derive macro in a higher-level crate,
//! out of scope here) lists each property once, and the builder performs the same index-assignment
//! pass an annotation scan would, then freezes the result into a plain `Vec` that the hot path
//! walks in index order with no further per-call indirection beyond the closures themselves.

use std::io::Cursor;

use crate::error::{ConfigurationError, Error, ErrorKind, Result};
use crate::stream::{PofReader, PofWriter};

type WriteFn<T> = Box<dyn Fn(&T, i32, &mut PofWriter<&mut Vec<u8>>) -> Result<()> + Send + Sync>;
type ReadFn<T> = Box<dyn Fn(&mut T, i32, &mut PofReader<Cursor<Vec<u8>>>) -> Result<()> + Send + Sync>;

/// One property of a [ReflectiveSerializer]'s attribute table: a stable wire index, a declared
/// name (used only to break ties when indexes are auto-assigned), and the codec used to move the
/// property's value in and out of the frame.
pub struct PropertyAttribute<T> {
    index: Option<i32>,
    name: &'static str,
    write: WriteFn<T>,
    read: ReadFn<T>,
}

impl<T> PropertyAttribute<T> {
    /// Build an attribute from a raw getter/setter pair. This is the plug-in point the POF
    /// reflective serializer design calls out for "non-default encodings for complex fields": any
    /// [PofWriter]/[PofReader] method, or a nested frame, can back a property this way.
    pub fn custom(
        name: &'static str,
        index: Option<i32>,
        write: impl Fn(&T, i32, &mut PofWriter<&mut Vec<u8>>) -> Result<()> + Send + Sync + 'static,
        read: impl Fn(&mut T, i32, &mut PofReader<Cursor<Vec<u8>>>) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            index,
            name,
            write: Box::new(write),
            read: Box::new(read),
        }
    }

    pub fn i32(
        name: &'static str,
        index: Option<i32>,
        get: impl Fn(&T) -> i32 + Send + Sync + 'static,
        set: impl Fn(&mut T, i32) + Send + Sync + 'static,
    ) -> Self {
        Self::custom(
            name,
            index,
            move |obj, idx, w| w.write_i32(idx, get(obj)),
            move |obj, idx, r| {
                if let Some(v) = r.read_i32(idx)? {
                    set(obj, v);
                }
                Ok(())
            },
        )
    }

    pub fn i64(
        name: &'static str,
        index: Option<i32>,
        get: impl Fn(&T) -> i64 + Send + Sync + 'static,
        set: impl Fn(&mut T, i64) + Send + Sync + 'static,
    ) -> Self {
        Self::custom(
            name,
            index,
            move |obj, idx, w| w.write_i64(idx, get(obj)),
            move |obj, idx, r| {
                if let Some(v) = r.read_i64(idx)? {
                    set(obj, v);
                }
                Ok(())
            },
        )
    }

    pub fn f64(
        name: &'static str,
        index: Option<i32>,
        get: impl Fn(&T) -> f64 + Send + Sync + 'static,
        set: impl Fn(&mut T, f64) + Send + Sync + 'static,
    ) -> Self {
        Self::custom(
            name,
            index,
            move |obj, idx, w| w.write_f64(idx, get(obj)),
            move |obj, idx, r| {
                if let Some(v) = r.read_f64(idx)? {
                    set(obj, v);
                }
                Ok(())
            },
        )
    }

    pub fn string(
        name: &'static str,
        index: Option<i32>,
        get: impl Fn(&T) -> Option<String> + Send + Sync + 'static,
        set: impl Fn(&mut T, Option<String>) + Send + Sync + 'static,
    ) -> Self {
        Self::custom(
            name,
            index,
            move |obj, idx, w| w.write_string(idx, get(obj).as_deref()),
            move |obj, idx, r| {
                if let Some(v) = r.read_string(idx)? {
                    set(obj, v);
                }
                Ok(())
            },
        )
    }

    pub fn bytes(
        name: &'static str,
        index: Option<i32>,
        get: impl Fn(&T) -> Vec<u8> + Send + Sync + 'static,
        set: impl Fn(&mut T, Vec<u8>) + Send + Sync + 'static,
    ) -> Self {
        Self::custom(
            name,
            index,
            move |obj, idx, w| w.write_bytes(idx, &get(obj)),
            move |obj, idx, r| {
                if let Some(v) = r.read_bytes(idx)? {
                    set(obj, v);
                }
                Ok(())
            },
        )
    }
}

/// Collects [PropertyAttribute]s for `T` and assigns final wire indexes once, up front, rather
/// than on every (de)serialize call.
pub struct ReflectiveSerializerBuilder<T> {
    new_blank: fn() -> T,
    attributes: Vec<PropertyAttribute<T>>,
}

impl<T> ReflectiveSerializerBuilder<T> {
    pub fn new(new_blank: fn() -> T) -> Self {
        Self {
            new_blank,
            attributes: Vec::new(),
        }
    }

    pub fn property(mut self, attribute: PropertyAttribute<T>) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Freeze the attribute table: properties with an explicit index keep it; properties without
    /// one are sorted by declared name and assigned the ascending integer slots the explicit
    /// indexes left free.
    pub fn build(mut self) -> Result<ReflectiveSerializer<T>> {
        let mut used = std::collections::BTreeSet::new();
        for attr in &self.attributes {
            if let Some(idx) = attr.index {
                if !used.insert(idx) {
                    return Err(Error::from(ErrorKind::from(
                        ConfigurationError::DuplicatePropertyIndex(idx),
                    )));
                }
            }
        }

        self.attributes.sort_by(|a, b| a.name.cmp(b.name));
        let mut next_free = 0i32;
        let mut assigned = Vec::with_capacity(self.attributes.len());
        for mut attr in self.attributes {
            let index = match attr.index {
                Some(idx) => idx,
                None => {
                    while used.contains(&next_free) {
                        next_free += 1;
                    }
                    used.insert(next_free);
                    next_free
                }
            };
            attr.index = Some(index);
            assigned.push(attr);
        }
        assigned.sort_by_key(|a| a.index.unwrap());

        Ok(ReflectiveSerializer {
            new_blank: self.new_blank,
            attributes: assigned,
        })
    }
}

/// A fixed, index-ordered attribute table driving (de)serialization of `T`. Built once via
/// [ReflectiveSerializerBuilder]; the hot path in [ReflectiveSerializer::serialize] and
/// [ReflectiveSerializer::deserialize] is a plain ordered walk with no further reflection.
pub struct ReflectiveSerializer<T> {
    new_blank: fn() -> T,
    attributes: Vec<PropertyAttribute<T>>,
}

impl<T> ReflectiveSerializer<T> {
    pub fn serialize(&self, obj: &T, writer: &mut PofWriter<&mut Vec<u8>>) -> Result<()> {
        for attr in &self.attributes {
            (attr.write)(obj, attr.index.unwrap(), writer)?;
        }
        if !writer.is_terminated() {
            writer.write_remainder(&[])?;
        }
        Ok(())
    }

    pub fn deserialize(&self, reader: &mut PofReader<Cursor<Vec<u8>>>) -> Result<T> {
        let mut obj = (self.new_blank)();
        for attr in &self.attributes {
            (attr.read)(&mut obj, attr.index.unwrap(), reader)?;
        }
        reader.read_remainder()?;
        Ok(obj)
    }

    /// The final index each attribute's name was assigned, in build order. Mostly useful for
    /// tests and diagnostics.
    pub fn indexes(&self) -> Vec<(&'static str, i32)> {
        self.attributes
            .iter()
            .map(|a| (a.name, a.index.unwrap()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{read_user_type, write_user_type};

    #[derive(Debug, Default, PartialEq, Eq)]
    struct Person {
        name: String,
        age: i32,
    }

    fn person_serializer() -> ReflectiveSerializer<Person> {
        ReflectiveSerializerBuilder::new(Person::default)
            .property(PropertyAttribute::string(
                "name",
                None,
                |p| Some(p.name.clone()),
                |p, v| p.name = v.unwrap_or_default(),
            ))
            .property(PropertyAttribute::i32("age", None, |p| p.age, |p, v| p.age = v))
            .build()
            .unwrap()
    }

    #[test]
    fn unindexed_properties_are_assigned_in_name_order() {
        let s = person_serializer();
        // "age" < "name" alphabetically, so age gets index 0 and name gets index 1.
        assert_eq!(s.indexes(), vec![("age", 0), ("name", 1)]);
    }

    #[test]
    fn explicit_indexes_are_kept_and_gaps_are_filled() {
        let s = ReflectiveSerializerBuilder::new(Person::default)
            .property(PropertyAttribute::string(
                "name",
                Some(5),
                |p| Some(p.name.clone()),
                |p, v| p.name = v.unwrap_or_default(),
            ))
            .property(PropertyAttribute::i32("age", None, |p| p.age, |p, v| p.age = v))
            .build()
            .unwrap();
        assert_eq!(s.indexes(), vec![("age", 0), ("name", 5)]);
    }

    #[test]
    fn reflective_round_trip() {
        let s = person_serializer();
        let person = Person {
            name: "Ada".to_string(),
            age: 30,
        };
        let bytes = write_user_type(42, 0, false, |w| s.serialize(&person, w)).unwrap();
        let (type_id, _, mut reader) = read_user_type(bytes, false).unwrap();
        assert_eq!(type_id, 42);
        let back = s.deserialize(&mut reader).unwrap();
        assert_eq!(back, person);
    }
}
