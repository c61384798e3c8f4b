//! The safe fallback registry: resolves any type to one of the two reserved ids
//! ([TYPE_PORTABLE]/[TYPE_SERIALIZABLE]) instead of a [PofContext]'s explicitly registered ones.
//!
//! A [PofContext] only knows the finite set of user types it was configured with; anything else is
//! an [UnknownTypeError]. [SafePofContext] is the fallback a caller reaches for when it would
//! rather carry an arbitrary portable object or an opaque serializable blob than fail the encode
//! outright. Resolution only asks two questions of a [FallbackCatalog]: does this class
//! implement the portable-object contract, and if not, does it at least carry a native-serializable
//! marker. Neither means [UnsupportedError::NeitherPortableNorSerializable].

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::sync::RwLock;

use crate::error::{Error, ErrorKind, Result, UnsupportedError};
use crate::registry::{TYPE_PORTABLE, TYPE_SERIALIZABLE};
use crate::stream::{PofReader, PofWriter};

/// Answers the two yes/no questions [SafePofContext] needs about a class name: does it implement
/// the portable-object contract, and does it at least carry the native-serializable marker.
///
/// A caller typically backs this with a static table generated alongside its types, the same way a
/// [crate::registry::config::TypeCatalog] would, but the fallback registry only ever needs these
/// two booleans rather than the full descriptor a real registration requires.
pub trait FallbackCatalog {
    fn is_portable(&self, class_name: &str) -> bool;
    fn is_serializable(&self, class_name: &str) -> bool;
}

/// A context that always resolves a class name to one of the two reserved type ids rather than to
/// a registered, schema-specific one.
///
/// Resolution is memoized per class name, same as [crate::registry::PofContext]'s ancestor walk,
/// since repeatedly asking the [FallbackCatalog] the same two questions for a hot type is wasted
/// work.
#[derive(Debug)]
pub struct SafePofContext<C> {
    catalog: C,
    cache: RwLock<HashMap<String, i32>>,
}

impl<C: FallbackCatalog> SafePofContext<C> {
    pub fn new(catalog: C) -> Self {
        Self {
            catalog,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve `class_name` to [TYPE_PORTABLE] or [TYPE_SERIALIZABLE].
    pub fn type_id_for(&self, class_name: &str) -> Result<i32> {
        if let Some(id) = self.cache.read().unwrap().get(class_name) {
            return Ok(*id);
        }

        let id = if self.catalog.is_portable(class_name) {
            TYPE_PORTABLE
        } else if self.catalog.is_serializable(class_name) {
            TYPE_SERIALIZABLE
        } else {
            return Err(Error::from(ErrorKind::from(
                UnsupportedError::NeitherPortableNorSerializable(class_name.to_string()),
            )));
        };

        self.cache.write().unwrap().insert(class_name.to_string(), id);
        Ok(id)
    }

    pub fn is_empty_cache(&self) -> bool {
        self.cache.read().unwrap().is_empty()
    }
}

/// Write a [TYPE_PORTABLE]-tagged frame: the assembly-qualified type name at index 0, the
/// object's own fully-encoded POF payload (type id, version, properties, remainder and all) as an
/// opaque octet string at index 1. This is what lets a reader with no static knowledge of
/// `type_name` still instantiate and decode the value: it reads the name, looks up a serializer
/// for it by name, and decodes the payload bytes as a nested user-type frame.
pub fn write_portable_fallback<W: Write>(
    writer: &mut PofWriter<W>,
    type_name: &str,
    payload: &[u8],
) -> Result<()> {
    writer.write_string(0, Some(type_name))?;
    writer.write_bytes(1, payload)?;
    writer.write_remainder(&[])
}

/// Read back a [TYPE_PORTABLE]-tagged frame written by [write_portable_fallback]: the class name
/// and its fully-encoded nested payload, ready to be handed to [crate::stream::read_user_type].
pub fn read_portable_fallback<R: Read + std::io::Seek>(
    reader: &mut PofReader<R>,
) -> Result<(String, Vec<u8>)> {
    let name = reader.read_string(0)?.flatten().unwrap_or_default();
    let payload = reader.read_bytes(1)?.unwrap_or_default();
    reader.read_remainder()?;
    Ok((name, payload))
}

/// Write a [TYPE_SERIALIZABLE]-tagged frame: an opaque byte blob with no POF-level property
/// structure at all, carried as a single length-prefixed octet string (property index `0`).
pub fn write_serializable_fallback<W: Write>(writer: &mut PofWriter<W>, blob: &[u8]) -> Result<()> {
    writer.write_bytes(0, blob)?;
    writer.write_remainder(&[])
}

/// Read back a [TYPE_SERIALIZABLE]-tagged frame's opaque blob.
pub fn read_serializable_fallback(reader: &mut PofReader<Cursor<Vec<u8>>>) -> Result<Vec<u8>> {
    let blob = reader.read_bytes(0)?.unwrap_or_default();
    reader.read_remainder()?;
    Ok(blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{read_user_type, write_user_type};

    struct TestCatalog;
    impl FallbackCatalog for TestCatalog {
        fn is_portable(&self, class_name: &str) -> bool {
            class_name == "pkg.Portable"
        }

        fn is_serializable(&self, class_name: &str) -> bool {
            class_name == "pkg.Legacy"
        }
    }

    #[test]
    fn resolves_a_portable_object_to_the_reserved_portable_id() {
        let ctx = SafePofContext::new(TestCatalog);
        assert_eq!(ctx.type_id_for("pkg.Portable").unwrap(), TYPE_PORTABLE);
    }

    #[test]
    fn resolves_a_legacy_class_to_the_reserved_serializable_id() {
        let ctx = SafePofContext::new(TestCatalog);
        assert_eq!(ctx.type_id_for("pkg.Legacy").unwrap(), TYPE_SERIALIZABLE);
    }

    #[test]
    fn resolving_an_unsupported_class_is_an_error() {
        let ctx = SafePofContext::new(TestCatalog);
        let err = ctx.type_id_for("pkg.Mystery").unwrap_err();
        assert_matches::assert_matches!(
            err.kind(),
            ErrorKind::Unsupported(UnsupportedError::NeitherPortableNorSerializable(_))
        );
    }

    #[test]
    fn resolution_is_memoized() {
        let ctx = SafePofContext::new(TestCatalog);
        assert!(ctx.is_empty_cache());
        ctx.type_id_for("pkg.Portable").unwrap();
        assert!(!ctx.is_empty_cache());
    }

    #[test]
    fn portable_fallback_round_trips_name_and_nested_payload() {
        let inner = write_user_type(7, 0, false, |w| {
            w.write_i32(0, 42)?;
            w.write_remainder(&[])
        })
        .unwrap();
        let bytes = write_user_type(TYPE_PORTABLE, 0, false, |w| {
            write_portable_fallback(w, "pkg.Portable", &inner)
        })
        .unwrap();

        let (type_id, _, mut reader) = read_user_type(bytes, false).unwrap();
        assert_eq!(type_id, TYPE_PORTABLE);
        let (name, payload) = read_portable_fallback(&mut reader).unwrap();
        assert_eq!(name, "pkg.Portable");
        assert_eq!(payload, inner);
    }

    #[test]
    fn serializable_fallback_round_trips_an_opaque_blob() {
        let blob = vec![1, 2, 3, 4];
        let bytes =
            write_user_type(TYPE_SERIALIZABLE, 0, false, |w| write_serializable_fallback(w, &blob)).unwrap();
        let (type_id, _, mut reader) = read_user_type(bytes, false).unwrap();
        assert_eq!(type_id, TYPE_SERIALIZABLE);
        let back = read_serializable_fallback(&mut reader).unwrap();
        assert_eq!(back, blob);
    }
}
