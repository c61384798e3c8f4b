//! Per-type serializer strategies: the three ways a user type can be driven through a
//! [crate::stream::PofWriter]/[crate::stream::PofReader] frame.
//!
//! - [explicit]: the type writes and reads its own flat property list
//!   ([explicit::PortableObject]).
//! - [reflective]: a one-time-built attribute table ([reflective::ReflectiveSerializer]) drives
//!   index-ordered property access with no further reflection on the hot path.
//! - [hierarchical]: one nested frame per ancestor class in an inheritance chain
//!   ([hierarchical::HierarchicalSerializer]), each independently evolvable.
//!
//! All three obey the same frame protocol described in [crate::stream]: optional version id,
//! properties in ascending index order, then a remainder. Which strategy a given type id uses is
//! recorded on its [crate::registry::UserTypeDescriptor] as a
//! [crate::registry::SerializerStrategy]; that enum only identifies the strategy for registry
//! bookkeeping; dispatch to the generic `serialize`/`deserialize` functions below happens at the
//! call site, where the concrete type is statically known.

pub mod explicit;
pub mod hierarchical;
pub mod reflective;

trait_set::trait_set! {
    /// Shorthand for the bound every [crate::stream::PofReader] source needs: buffered random
    /// access so [crate::stream::PofReader::next_property_index] can peek and seek back.
    pub trait SeekRead = std::io::Read + std::io::Seek;
}
