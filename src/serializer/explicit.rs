//! The explicit serializer strategy: a type writes and reads its own properties.
//!
//! This is the simplest of the three strategies ([crate::serializer]): the type implements
//! [PortableObject] itself, choosing its own property indexes and order (the frame protocol still
//! enforces that they come out ascending). [ExplicitSerializer] just dispatches to it, threading
//! the evolvable version id through the frame when the type also implements [Evolvable].

use std::io::Write;

use crate::error::Result;
use crate::evolvable::Evolvable as EvolvableState;
use crate::serializer::SeekRead;
use crate::stream::{PofReader, PofWriter};

/// A type that serializes itself by writing and reading its own indexed properties directly,
/// rather than going through a reflective attribute table or a per-class hierarchical frame.
///
/// Implementors own the full flat property index space for their frame and must keep
/// `write_external`/`read_external` in lockstep as the type's schema evolves.
pub trait PortableObject: Sized {
    /// Write this object's properties to `writer` in ascending index order. Must not call
    /// [PofWriter::write_remainder]; the caller ([ExplicitSerializer]) does that once, after
    /// appending any preserved evolvable future data.
    fn write_external<W: Write>(&self, writer: &mut PofWriter<W>) -> Result<()>;

    /// Read this object's properties from `reader`. The caller has already consumed the frame's
    /// type id and version; `reader` is scoped to the properties themselves.
    fn read_external<R: SeekRead>(reader: &mut PofReader<R>) -> Result<Self>;
}

/// Opt-in for a [PortableObject] whose wire payload may carry properties from a newer schema
/// version that this running code does not understand.
///
/// Implementors keep one [EvolvableState] (typically behind a field of that exact type) and return
/// references to it so [ExplicitSerializer] can read/write `data_version` and `future_data` around
/// the call to [PortableObject::write_external]/[PortableObject::read_external].
pub trait Evolvable: PortableObject {
    fn evolvable(&self) -> &EvolvableState;
    fn evolvable_mut(&mut self) -> &mut EvolvableState;
}

/// Drives a [PortableObject] (optionally [Evolvable]) through the three-step frame protocol:
/// version id, ascending properties, remainder.
#[derive(Debug, Default)]
pub struct ExplicitSerializer;

impl ExplicitSerializer {
    /// Serialize a plain, non-evolvable [PortableObject]: version is always `0`, remainder is
    /// always empty.
    pub fn serialize<T: PortableObject, W: Write>(obj: &T, writer: &mut PofWriter<W>) -> Result<()> {
        obj.write_external(writer)?;
        if !writer.is_terminated() {
            writer.write_remainder(&[])?;
        }
        Ok(())
    }

    pub fn deserialize<T: PortableObject, R: SeekRead>(reader: &mut PofReader<R>) -> Result<T> {
        let obj = T::read_external(reader)?;
        reader.read_remainder()?;
        Ok(obj)
    }

    /// Serialize an [Evolvable] [PortableObject]: writes its properties then appends its stored
    /// `future_data` as the remainder, so a read-modify-write by older code preserves whatever a
    /// newer version of this same type originally wrote.
    pub fn serialize_evolvable<T: Evolvable, W: Write>(
        obj: &T,
        writer: &mut PofWriter<W>,
    ) -> Result<()> {
        obj.write_external(writer)?;
        if !writer.is_terminated() {
            writer.write_remainder(obj.evolvable().future_data())?;
        }
        Ok(())
    }

    /// Deserialize an [Evolvable] [PortableObject], recording the version the wire payload was
    /// written at and capturing any unrecognized trailing properties as `future_data`.
    pub fn deserialize_evolvable<T: Evolvable, R: SeekRead>(
        version: i32,
        reader: &mut PofReader<R>,
    ) -> Result<T> {
        let mut obj = T::read_external(reader)?;
        obj.evolvable_mut().set_data_version(version);
        let future_data = reader.read_remainder()?;
        obj.evolvable_mut().set_future_data(future_data);
        Ok(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{read_user_type, write_user_type};

    #[derive(Debug, PartialEq, Eq, Default)]
    struct Point {
        x: i32,
        y: i32,
    }

    impl PortableObject for Point {
        fn write_external<W: Write>(&self, writer: &mut PofWriter<W>) -> Result<()> {
            writer.write_i32(0, self.x)?;
            writer.write_i32(1, self.y)?;
            Ok(())
        }

        fn read_external<R: SeekRead>(reader: &mut PofReader<R>) -> Result<Self> {
            let x = reader.read_i32(0)?.unwrap_or(0);
            let y = reader.read_i32(1)?.unwrap_or(0);
            Ok(Point { x, y })
        }
    }

    #[derive(Debug, PartialEq, Eq, Default)]
    struct Versioned {
        name: String,
        evolvable: EvolvableState,
    }

    impl PortableObject for Versioned {
        fn write_external<W: Write>(&self, writer: &mut PofWriter<W>) -> Result<()> {
            writer.write_string(0, Some(&self.name))
        }

        fn read_external<R: SeekRead>(reader: &mut PofReader<R>) -> Result<Self> {
            let name = reader.read_string(0)?.flatten().unwrap_or_default();
            Ok(Versioned {
                name,
                evolvable: EvolvableState::default(),
            })
        }
    }

    impl Evolvable for Versioned {
        fn evolvable(&self) -> &EvolvableState {
            &self.evolvable
        }

        fn evolvable_mut(&mut self) -> &mut EvolvableState {
            &mut self.evolvable
        }
    }

    #[test]
    fn explicit_round_trip() {
        let point = Point { x: 3, y: -4 };
        let bytes = write_user_type(100, 0, false, |w| ExplicitSerializer::serialize(&point, w)).unwrap();
        let (type_id, _, mut reader) = read_user_type(bytes, false).unwrap();
        assert_eq!(type_id, 100);
        let back: Point = ExplicitSerializer::deserialize(&mut reader).unwrap();
        assert_eq!(back, point);
    }

    #[test]
    fn evolvable_future_data_survives_a_round_trip_by_older_code() {
        // A "v2" writer appends an extra trailing property this "v1" type doesn't know about.
        let v2_bytes = write_user_type(200, 2, false, |w| {
            w.write_string(0, Some("hi"))?;
            w.write_i32(9, 42)?;
            w.write_remainder(&[])
        })
        .unwrap();

        let (type_id, version, mut reader) = read_user_type(v2_bytes.clone(), false).unwrap();
        let v1: Versioned = ExplicitSerializer::deserialize_evolvable(version, &mut reader).unwrap();
        assert_eq!(v1.name, "hi");
        assert_eq!(v1.evolvable.data_version(), 2);
        assert!(v1.evolvable.has_future_data());

        let roundtripped = write_user_type(type_id, v1.evolvable.effective_version(), false, |w| {
            ExplicitSerializer::serialize_evolvable(&v1, w)
        })
        .unwrap();
        assert_eq!(roundtripped, v2_bytes);
    }
}
