//! The POF type registry ([PofContext]): the map from type id to Rust type and serializer, and
//! back, that every (de)serialize call consults to turn a wire type id into something it can read
//! a frame's properties into.
//!
//! [config::load] builds a [PofContext] from an in-memory configuration tree; the [safe fallback
//! registry](safe) resolves any class to one of the two universal fallback type ids instead, for
//! callers that would rather carry an opaque object than fail an unresolved lookup outright.

#[cfg(feature = "config")]
pub mod config;
pub mod safe;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::error::{ConfigurationError, Error, ErrorKind, Result, UnknownTypeError};

/// A type id reserved by the [safe fallback registry](safe) for objects serialized through the
/// portable-object contract without a statically known type id.
pub const TYPE_PORTABLE: i32 = i32::MAX - 1;

/// A type id reserved by the [safe fallback registry](safe) for objects with no POF-aware
/// serializer at all, carried as an opaque blob.
pub const TYPE_SERIALIZABLE: i32 = i32::MAX;

/// Which concrete (de)serialization strategy a [UserTypeDescriptor] uses. The strategy's actual
/// read/write logic lives in [crate::serializer]; the registry only needs to know which one
/// applies to dispatch correctly and to validate configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SerializerStrategy {
    /// The type implements the portable-object contract itself
    /// ([crate::serializer::explicit::PortableObject]).
    Explicit,
    /// Properties are discovered from a build-time attribute table
    /// ([crate::serializer::reflective]).
    Reflective,
    /// One nested frame per ancestor class, each independently evolvable
    /// ([crate::serializer::hierarchical]).
    Hierarchical,
}

/// A serializer registration: which strategy a type uses, and (for evolvable hierarchical types)
/// the version this process implements.
pub trait PofSerializer: Send + Sync + std::fmt::Debug {
    fn strategy(&self) -> SerializerStrategy;

    /// The schema version this process implements for this type. Only meaningful for
    /// [SerializerStrategy::Hierarchical] and [SerializerStrategy::Explicit] types that also
    /// implement the evolvable contract; `0` otherwise.
    fn impl_version(&self) -> i32 {
        0
    }
}

/// A plain serializer registration carrying no data beyond its strategy and version, sufficient
/// for any type whose actual read/write logic is reached through compile-time generics rather
/// than a registry-held trait object.
#[derive(Clone, Debug)]
pub struct DescriptorSerializer {
    strategy: SerializerStrategy,
    impl_version: i32,
}

impl DescriptorSerializer {
    pub fn new(strategy: SerializerStrategy, impl_version: i32) -> Self {
        Self {
            strategy,
            impl_version,
        }
    }
}

impl PofSerializer for DescriptorSerializer {
    fn strategy(&self) -> SerializerStrategy {
        self.strategy
    }

    fn impl_version(&self) -> i32 {
        self.impl_version
    }
}

/// Everything the registry knows about one registered user type.
#[derive(Debug)]
pub struct UserTypeDescriptor {
    type_id: i32,
    type_name: String,
    is_interface: bool,
    is_abstract: bool,
    /// The type this one directly extends, if any (declared, not reflected: Rust has no runtime
    /// class hierarchy to introspect).
    super_type_name: Option<String>,
    /// Interfaces/traits this type is declared to implement, for interface-based resolution.
    interface_names: Vec<String>,
    serializer: Arc<dyn PofSerializer>,
}

impl UserTypeDescriptor {
    pub fn new(
        type_id: i32,
        type_name: impl Into<String>,
        serializer: Arc<dyn PofSerializer>,
    ) -> Self {
        Self {
            type_id,
            type_name: type_name.into(),
            is_interface: false,
            is_abstract: false,
            super_type_name: None,
            interface_names: Vec::new(),
            serializer,
        }
    }

    pub fn interface(mut self, is_interface: bool) -> Self {
        self.is_interface = is_interface;
        self
    }

    pub fn abstract_type(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    pub fn extends(mut self, super_type_name: impl Into<String>) -> Self {
        self.super_type_name = Some(super_type_name.into());
        self
    }

    pub fn implements(mut self, interface_name: impl Into<String>) -> Self {
        self.interface_names.push(interface_name.into());
        self
    }

    pub fn type_id(&self) -> i32 {
        self.type_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_interface(&self) -> bool {
        self.is_interface
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn serializer(&self) -> &Arc<dyn PofSerializer> {
        &self.serializer
    }
}

/// The set of flags a [PofContext] enforces while resolving and registering user types.
#[derive(Clone, Copy, Debug)]
pub struct ContextFlags {
    /// Whether a type declared as an interface may be registered at all.
    pub allow_interfaces: bool,
    /// Whether an abstract type may be registered at all.
    pub allow_subclasses: bool,
    /// Whether identity/reference tracking is available for objects serialized through this
    /// context (always disabled for a frame belonging to an evolvable type, regardless of this
    /// flag; see [crate::identity]).
    pub references_enabled: bool,
}

impl Default for ContextFlags {
    fn default() -> Self {
        Self {
            allow_interfaces: true,
            allow_subclasses: true,
            references_enabled: false,
        }
    }
}

#[derive(Default)]
struct Maps {
    by_type_id: HashMap<i32, Arc<UserTypeDescriptor>>,
    by_type_name: HashMap<String, Arc<UserTypeDescriptor>>,
    /// Memoized subclass-walk resolutions: a type name not directly registered, resolved to the
    /// nearest registered ancestor's type id.
    subclass_cache: HashMap<String, i32>,
}

/// The live type registry: the map from type id to descriptor and back that a (de)serialize call
/// consults to resolve a wire type id, or a Rust type, to a serializer.
///
/// Internally guarded by an [RwLock] rather than a lock-free concurrent map: registration happens
/// once at startup while lookups dominate at runtime, so a `RwLock<HashMap<_>>` gives
/// effectively-uncontended read access without pulling in a new dependency.
#[derive(Default)]
pub struct PofContext {
    flags: ContextFlags,
    maps: RwLock<Maps>,
}

impl std::fmt::Debug for PofContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let maps = self.maps.read().unwrap();
        f.debug_struct("PofContext")
            .field("flags", &self.flags)
            .field("registered_types", &maps.by_type_id.len())
            .finish()
    }
}

impl PofContext {
    pub fn new(flags: ContextFlags) -> Self {
        Self {
            flags,
            maps: RwLock::new(Maps::default()),
        }
    }

    pub fn flags(&self) -> ContextFlags {
        self.flags
    }

    /// Register a user type, enforcing the invariants from the POF configuration design: no
    /// duplicate type id or name, no reserved id, and the interface/abstract-type flags honored.
    pub fn register(&self, descriptor: UserTypeDescriptor) -> Result<()> {
        if descriptor.type_id == TYPE_PORTABLE || descriptor.type_id == TYPE_SERIALIZABLE {
            return Err(Error::from(ErrorKind::from(ConfigurationError::ReservedTypeId(
                descriptor.type_id,
            ))));
        }
        if descriptor.type_id < 0 {
            return Err(Error::from(ErrorKind::from(ConfigurationError::InvalidTypeId(
                descriptor.type_id,
            ))));
        }
        if descriptor.is_interface && !self.flags.allow_interfaces {
            return Err(Error::from(ErrorKind::from(ConfigurationError::ForbiddenInterface(
                descriptor.type_name.clone(),
            ))));
        }
        if descriptor.is_abstract && !self.flags.allow_subclasses {
            return Err(Error::from(ErrorKind::from(ConfigurationError::ForbiddenAbstractType(
                descriptor.type_name.clone(),
            ))));
        }

        let mut maps = self.maps.write().unwrap();
        if maps.by_type_id.contains_key(&descriptor.type_id) {
            return Err(Error::from(ErrorKind::from(ConfigurationError::DuplicateTypeId(
                descriptor.type_id,
            ))));
        }
        if maps.by_type_name.contains_key(&descriptor.type_name) {
            return Err(Error::from(ErrorKind::from(ConfigurationError::DuplicateType(
                descriptor.type_name.clone(),
            ))));
        }

        debug!(
            type_id = descriptor.type_id,
            type_name = %descriptor.type_name,
            "registered user type"
        );
        let descriptor = Arc::new(descriptor);
        maps.by_type_id.insert(descriptor.type_id, descriptor.clone());
        maps.by_type_name.insert(descriptor.type_name.clone(), descriptor);
        maps.subclass_cache.clear();
        Ok(())
    }

    /// Look up a type id by its exact registered name, with no subclass or interface fallback and
    /// no memoization. Used by [crate::serializer::hierarchical] to resolve each class in an
    /// object's declared ancestor chain directly: a hierarchical type's ancestors either are
    /// registered under their own name or they aren't, there is no inheritance walk to perform.
    pub fn lookup_type_id(&self, type_name: &str) -> Option<i32> {
        self.maps
            .read()
            .unwrap()
            .by_type_name
            .get(type_name)
            .map(|d| d.type_id)
    }

    pub fn type_by_id(&self, type_id: i32) -> Result<Arc<UserTypeDescriptor>> {
        self.maps
            .read()
            .unwrap()
            .by_type_id
            .get(&type_id)
            .cloned()
            .ok_or_else(|| Error::from(ErrorKind::from(UnknownTypeError::ById(type_id))))
    }

    /// Resolve `type_name` to a registered type id, in the order described by the POF type
    /// registry design: an exact match, then the nearest registered ancestor in `ancestor_chain`
    /// (nearest-first, memoized), then, among registered interfaces `interface_names` overlaps
    /// with, the one with the smallest type id (a deterministic, arbitrary-but-stable tie-break;
    /// the configuration format this is adapted from leaves interface-assignability ordering
    /// unspecified). `ancestor_chain` is supplied by the caller (nearest superclass first) because
    /// Rust has no runtime class hierarchy to walk the way a reflection-based host would.
    pub fn type_id_by_type_name(
        &self,
        type_name: &str,
        ancestor_chain: &[&str],
        interface_names: &[&str],
    ) -> Result<i32> {
        {
            let maps = self.maps.read().unwrap();
            if let Some(d) = maps.by_type_name.get(type_name) {
                return Ok(d.type_id);
            }
            if let Some(&id) = maps.subclass_cache.get(type_name) {
                return Ok(id);
            }
        }

        if self.flags.allow_subclasses {
            let maps = self.maps.read().unwrap();
            for ancestor in ancestor_chain {
                if let Some(d) = maps.by_type_name.get(*ancestor) {
                    let id = d.type_id;
                    drop(maps);
                    warn!(type_name, ancestor = *ancestor, type_id = id, "resolved via ancestor fallback");
                    self.maps
                        .write()
                        .unwrap()
                        .subclass_cache
                        .insert(type_name.to_string(), id);
                    return Ok(id);
                }
            }
        }

        if self.flags.allow_interfaces && !interface_names.is_empty() {
            let maps = self.maps.read().unwrap();
            let mut best: Option<i32> = None;
            for name in interface_names {
                if let Some(d) = maps.by_type_name.get(*name) {
                    if d.is_interface {
                        best = Some(match best {
                            Some(current) => current.min(d.type_id),
                            None => d.type_id,
                        });
                    }
                }
            }
            if let Some(id) = best {
                warn!(type_name, type_id = id, "resolved via interface fallback");
                return Ok(id);
            }
        }

        Err(Error::from(ErrorKind::from(UnknownTypeError::ByName(
            type_name.to_string(),
        ))))
    }

    pub fn len(&self) -> usize {
        self.maps.read().unwrap().by_type_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn descriptor(type_id: i32, name: &str) -> UserTypeDescriptor {
        UserTypeDescriptor::new(
            type_id,
            name,
            Arc::new(DescriptorSerializer::new(SerializerStrategy::Explicit, 0)),
        )
    }

    #[test]
    fn exact_match_resolves_directly() {
        let ctx = PofContext::new(ContextFlags::default());
        ctx.register(descriptor(1, "pkg.Foo")).unwrap();
        assert_eq!(
            ctx.type_id_by_type_name("pkg.Foo", &[], &[]).unwrap(),
            1
        );
    }

    #[test]
    fn duplicate_type_id_is_rejected() {
        let ctx = PofContext::new(ContextFlags::default());
        ctx.register(descriptor(1, "pkg.Foo")).unwrap();
        let err = ctx.register(descriptor(1, "pkg.Bar")).unwrap_err();
        assert_matches::assert_matches!(
            err.kind(),
            ErrorKind::Configuration(ConfigurationError::DuplicateTypeId(1))
        );
    }

    #[test]
    fn duplicate_type_name_is_rejected() {
        let ctx = PofContext::new(ContextFlags::default());
        ctx.register(descriptor(1, "pkg.Foo")).unwrap();
        let err = ctx.register(descriptor(2, "pkg.Foo")).unwrap_err();
        assert_matches::assert_matches!(
            err.kind(),
            ErrorKind::Configuration(ConfigurationError::DuplicateType(_))
        );
    }

    #[test]
    fn reserved_type_ids_cannot_be_registered() {
        let ctx = PofContext::new(ContextFlags::default());
        let err = ctx.register(descriptor(TYPE_PORTABLE, "pkg.Foo")).unwrap_err();
        assert_matches::assert_matches!(
            err.kind(),
            ErrorKind::Configuration(ConfigurationError::ReservedTypeId(_))
        );
    }

    #[test]
    fn unregistered_subclass_resolves_to_nearest_registered_ancestor() {
        let ctx = PofContext::new(ContextFlags::default());
        ctx.register(
            descriptor(1, "pkg.Base")
        )
        .unwrap();
        // pkg.Mid extends pkg.Base but is not itself registered; pkg.Derived extends pkg.Mid.
        let mid = UserTypeDescriptor::new(
            2,
            "pkg.Mid",
            Arc::new(DescriptorSerializer::new(SerializerStrategy::Explicit, 0)),
        )
        .extends("pkg.Base");
        ctx.register(mid).unwrap();

        assert_eq!(
            ctx.type_id_by_type_name("pkg.Unregistered", &["pkg.Mid", "pkg.Base"], &[])
                .unwrap(),
            2
        );
    }

    #[test]
    fn interface_resolution_breaks_ties_with_smallest_type_id() {
        let ctx = PofContext::new(ContextFlags::default());
        let iface_a = UserTypeDescriptor::new(
            5,
            "pkg.IfaceA",
            Arc::new(DescriptorSerializer::new(SerializerStrategy::Explicit, 0)),
        )
        .interface(true);
        let iface_b = UserTypeDescriptor::new(
            3,
            "pkg.IfaceB",
            Arc::new(DescriptorSerializer::new(SerializerStrategy::Explicit, 0)),
        )
        .interface(true);
        ctx.register(iface_a).unwrap();
        ctx.register(iface_b).unwrap();

        let id = ctx
            .type_id_by_type_name("pkg.Impl", &[], &["pkg.IfaceA", "pkg.IfaceB"])
            .unwrap();
        assert_eq!(id, 3);
    }

    #[test]
    fn unknown_type_reports_by_name() {
        let ctx = PofContext::new(ContextFlags::default());
        let err = ctx.type_id_by_type_name("pkg.Nope", &[], &[]).unwrap_err();
        assert_matches::assert_matches!(
            err.kind(),
            ErrorKind::UnknownType(UnknownTypeError::ByName(_))
        );
    }

    #[test]
    fn forbidden_interface_registration_is_rejected_when_disabled() {
        let flags = ContextFlags {
            allow_interfaces: false,
            ..ContextFlags::default()
        };
        let ctx = PofContext::new(flags);
        let iface = UserTypeDescriptor::new(
            1,
            "pkg.Iface",
            Arc::new(DescriptorSerializer::new(SerializerStrategy::Explicit, 0)),
        )
        .interface(true);
        let err = ctx.register(iface).unwrap_err();
        assert_matches::assert_matches!(
            err.kind(),
            ErrorKind::Configuration(ConfigurationError::ForbiddenInterface(_))
        );
    }
}
