//! A crate to (de)serialize Rust data types to/from bytes in the Portable Object Format (POF).
//!
//! This is the detailed API documentation. For a higher level introduction see the [README].
//!
//! [README]: https://crates.io/crates/pof/
//!
//! POF is a binary, self-describing serialization format built around three ideas: values are
//! encoded with packed, variable-length integers wherever a fixed width would waste bytes; a
//! user-defined type's wire shape is a frame of ascending `(property index, value)` pairs rather
//! than a type name, so renaming a field or a class costs nothing on the wire; and a type's schema
//! can evolve (gain properties in a later version) without breaking an older process that only
//! understands some of them, because unknown trailing properties are captured verbatim rather than
//! rejected.
//!
//! # Usage
//!
//! Add the following to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! pof = "0.1.0"
//! ```
//!
//! ## Low level API
//!
//! The [stream] module is the primitive layer: [stream::PofWriter] and [stream::PofReader] drive
//! one user-type frame at a time over any `Write`/`Read + Seek` byte sink or source.
//!
//! ```
//! use pof::stream::{write_user_type, read_user_type};
//!
//! let bytes = write_user_type(1, 0, false, |w| {
//!     w.write_i32(0, 42)?;
//!     w.write_string(1, Some("hello"))?;
//!     w.write_remainder(&[])
//! }).unwrap();
//!
//! let (type_id, _version, mut reader) = read_user_type(bytes, false).unwrap();
//! assert_eq!(type_id, 1);
//! assert_eq!(reader.read_i32(0).unwrap(), Some(42));
//! assert_eq!(reader.read_string(1).unwrap().flatten().as_deref(), Some("hello"));
//! ```
//!
//! ## Serializer strategies
//!
//! Three ways to drive a Rust type through that frame live in [serializer]:
//!
//! - [serializer::explicit]: the type writes and reads its own properties by implementing
//!   [serializer::explicit::PortableObject], the way a hand-written `impl` would.
//! - [serializer::reflective]: a one-time-built table of [serializer::reflective::PropertyAttribute]
//!   drives index assignment and property access without runtime reflection.
//! - [serializer::hierarchical]: a type whose wire shape is the union of its own properties and
//!   its ancestors', one independently evolvable nested frame per class.
//!
//! ## Type registry
//!
//! [registry::PofContext] maps type ids to registered Rust types and the [registry::PofSerializer]
//! strategy each one uses, resolving unregistered subclasses to their nearest registered ancestor
//! and unregistered interface implementors by smallest assignable type id. [registry::config::load]
//! builds a [registry::PofContext] from an in-memory configuration tree (behind the `config`
//! feature, enabled by default); [registry::safe] is a simpler fallback that resolves any class to
//! one of two universal ids instead of failing an unresolved lookup.
//!
//! # Supported data types
//!
//! | POF type                  | Rust type                         |
//! |----------------------------|------------------------------------|
//! | Packed Int30 / Int64       | `i32`, `i64`                       |
//! | Packed Int128              | [codec::RawInt128]                 |
//! | Float32 / Float64          | `f32`, `f64`                       |
//! | Fixed-width integers       | `i8`, `u8`, `i16`, `u16`            |
//! | Octet String               | `&[u8]` / `Vec<u8>`                |
//! | Char String                | `&str` / `String`                  |
//! | Year-Month Interval        | [types::RawYearMonthInterval]      |
//! | User Type                  | implements one of the three [serializer] strategies |
//!
//! # Unsupported / out of scope
//!
//! This crate does not walk an arbitrary object graph for you (no Serde-style derive, no automatic
//! struct reflection over named fields), does not implement an on-the-wire transport, and does not
//! parse XML/JSON configuration documents directly: [registry::config::PofConfigDocument] is the
//! shape a caller's own document loader deserializes into via `serde`.
//!
//! # Error handling
//!
//! (De)serialization and registry calls return [error::Result]. An [error::Error] carries an
//! [error::ErrorKind] describing what went wrong and an [error::ErrorLocation] describing where,
//! including the chain of enclosing user types and the property index being processed when known.
//!
//! This crate does not try to be clone free or to support `no_std`. Memory is allocated to read and
//! write frames; when deserializing bytes received from an untrusted source, use
//! [stream::read_user_type_with_config] with a [stream::Config] that caps how large a single
//! length-prefixed value (a bytes/string property or a nested frame) the reader will allocate, so a
//! corrupted or hostile length prefix cannot force an unbounded allocation attempt. [stream::read_user_type]
//! uses a generous default bound.
//!
//! # Logging
//!
//! This crate emits [tracing] events at the boundaries most useful for diagnosing malformed input
//! or registry misconfiguration: `trace!` for individual property reads/writes, `debug!` for
//! frame/nested-frame boundaries and registry resolutions, `warn!` when a frame is read with
//! trailing future data or a registry lookup falls back to an ancestor. Enable a `tracing`
//! subscriber in your application to see them; this crate never initializes one itself.

pub mod codec;
#[cfg(feature = "config")]
mod debug;
pub mod error;
pub mod evolvable;
pub mod identity;
pub mod registry;
pub mod serializer;
pub mod stream;
pub mod types;

#[cfg(feature = "config")]
#[doc(inline)]
pub use debug::hex_dump;

#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use registry::PofContext;
#[doc(inline)]
pub use stream::{
    read_user_type, read_user_type_with_config, write_user_type, Config, PofReader, PofWriter,
};
