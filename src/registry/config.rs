//! Build a [PofContext] from an in-memory configuration tree.
//!
//! XML parsing is out of scope for this crate (see the crate-level docs): `PofConfigDocument` is
//! the `serde`-deserializable shape a caller's own XML/JSON/TOML loader produces, mirroring the
//! `user-type-list` / `user-type` / `include` / `default-serializer` document this is modeled on.
//! Resolving `<include>` is left to the caller too (a URI is just an opaque string key here);
//! [load] takes an `include_resolver` closure so callers can back it with whatever resource loader
//! fits their deployment (filesystem, embedded resource, network fetch).
//!
//! Reflection-based serializer construction has no Rust equivalent, so the three-constructor-shape
//! fallback the POF configuration design describes becomes an explicit [SerializerFactory] trait:
//! a caller-supplied [TypeCatalog] answers "does this class implement the portable-object contract
//! / bear the portable annotation / extend this other class / implement this interface", and a
//! caller-supplied factory registry answers "how do I build a serializer for this class name".

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::error::{ConfigurationError, Error, ErrorKind, Result};
use crate::registry::{ContextFlags, PofContext, PofSerializer, UserTypeDescriptor};

/// One `<user-type>` entry: a class name and optionally a fixed type id and a custom serializer.
///
/// `type_id` is `Option` because a single `user-type-list` must either assign an id to every entry
/// or to none of them ([ConfigurationError::PartialTypeIdAssignment]); when every entry in a
/// document omits it, ids are assigned sequentially in document order starting at `0`.
#[derive(Clone, Debug, Deserialize)]
pub struct UserTypeConfig {
    #[serde(rename = "type-id", default)]
    pub type_id: Option<i32>,
    #[serde(rename = "class-name")]
    pub class_name: String,
    #[serde(default)]
    pub serializer: Option<SerializerConfig>,
}

/// A `<serializer>` entry: the serializer's own class name, plus any `<init-params>` to pass to
/// its [SerializerFactory].
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SerializerConfig {
    #[serde(rename = "class-name")]
    pub class_name: String,
    #[serde(rename = "init-params", default)]
    pub init_params: Vec<InitParam>,
}

/// One `<init-param>` value, either a literal or one of the substitutable tokens the POF
/// configuration format recognizes: `{type-id}`, `{class-name}`, `{class}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitParam {
    Literal(String),
    TypeIdToken,
    ClassNameToken,
    ClassToken,
}

impl InitParam {
    /// Resolve this parameter against the user type it is being instantiated for.
    pub fn resolve(&self, type_id: i32, class_name: &str) -> String {
        match self {
            InitParam::Literal(s) => s.clone(),
            InitParam::TypeIdToken => type_id.to_string(),
            InitParam::ClassNameToken | InitParam::ClassToken => class_name.to_string(),
        }
    }
}

/// A full configuration document: the top-level flags, an optional default serializer, the list of
/// user types it declares directly, and any documents it includes.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PofConfigDocument {
    #[serde(rename = "allow-interfaces", default)]
    pub allow_interfaces: bool,
    #[serde(rename = "allow-subclasses", default)]
    pub allow_subclasses: bool,
    #[serde(rename = "enable-references", default)]
    pub enable_references: bool,
    #[serde(rename = "default-serializer", default)]
    pub default_serializer: Option<SerializerConfig>,
    #[serde(rename = "user-type-list", default)]
    pub user_type_list: Vec<UserTypeConfig>,
    #[serde(default)]
    pub include: Vec<String>,
}

/// What a [TypeCatalog] knows about one class name, standing in for the runtime introspection a
/// reflection-based loader would perform (implements-portable-object, bears-portable-annotation,
/// is-interface, is-abstract, declared supertype/interfaces).
#[derive(Clone, Debug, Default)]
pub struct TypeMetadata {
    pub is_portable_object: bool,
    pub has_portable_annotation: bool,
    pub is_interface: bool,
    pub is_abstract: bool,
    pub super_type_name: Option<String>,
    pub interface_names: Vec<String>,
}

/// Answers what [TypeMetadata] a class name has. A caller typically backs this with a static table
/// generated alongside its types (there is no runtime reflection to fall back to).
pub trait TypeCatalog {
    fn metadata(&self, class_name: &str) -> Option<TypeMetadata>;
}

/// Builds a [PofSerializer] for one configured user type, given its final type id, class name, and
/// resolved init params. Registered by serializer class name in a [SerializerFactoryRegistry].
pub trait SerializerFactory: Send + Sync {
    fn create(
        &self,
        type_id: i32,
        class_name: &str,
        init_params: &[String],
    ) -> Result<Arc<dyn PofSerializer>>;
}

/// Maps a serializer's configured class name to the [SerializerFactory] that knows how to build
/// it, standing in for the three-constructor-shape reflection fallback described in the POF
/// configuration design (a Rust factory already encapsulates however it builds a serializer; there
/// is no further constructor-arity search to perform once the factory is found).
#[derive(Default)]
pub struct SerializerFactoryRegistry {
    factories: HashMap<String, Arc<dyn SerializerFactory>>,
}

impl SerializerFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class_name: impl Into<String>, factory: Arc<dyn SerializerFactory>) {
        self.factories.insert(class_name.into(), factory);
    }

    fn get(&self, class_name: &str) -> Option<&Arc<dyn SerializerFactory>> {
        self.factories.get(class_name)
    }
}

fn build_serializer(
    cfg: Option<&SerializerConfig>,
    default_serializer: Option<&SerializerConfig>,
    factories: &SerializerFactoryRegistry,
    catalog: &dyn TypeCatalog,
    type_id: i32,
    class_name: &str,
) -> Result<Arc<dyn PofSerializer>> {
    if let Some(serializer_cfg) = cfg.or(default_serializer) {
        let factory = factories.get(&serializer_cfg.class_name).ok_or_else(|| {
            Error::from(ErrorKind::from(ConfigurationError::MissingSerializer(
                serializer_cfg.class_name.clone(),
            )))
        })?;
        let params: Vec<String> = serializer_cfg
            .init_params
            .iter()
            .map(|p| p.resolve(type_id, class_name))
            .collect();
        return factory.create(type_id, class_name, &params);
    }

    let meta = catalog.metadata(class_name).unwrap_or_default();
    let builtin_name = if meta.is_portable_object {
        "__pof_explicit__"
    } else if meta.has_portable_annotation {
        "__pof_reflective__"
    } else {
        return Err(Error::from(ErrorKind::from(ConfigurationError::MissingSerializer(
            class_name.to_string(),
        ))));
    };

    match factories.get(builtin_name) {
        Some(factory) => factory.create(type_id, class_name, &[]),
        None => Err(Error::from(ErrorKind::from(ConfigurationError::MissingSerializer(
            class_name.to_string(),
        )))),
    }
}

/// Flatten `doc` and everything it (transitively) includes into one list of `(document, flags)`
/// pairs, resolving `<include>` via `resolver` and breaking cycles by tracking visited URIs,
/// mirroring the POF configuration design's include-cycle protection.
fn flatten_includes(
    uri: Option<&str>,
    doc: PofConfigDocument,
    resolver: &dyn Fn(&str) -> Result<PofConfigDocument>,
    visited: &mut HashSet<String>,
) -> Result<Vec<PofConfigDocument>> {
    if let Some(uri) = uri {
        if !visited.insert(uri.to_string()) {
            return Err(Error::from(ErrorKind::from(ConfigurationError::IncludeCycle(
                uri.to_string(),
            ))));
        }
    }

    let mut out = Vec::new();
    for include_uri in &doc.include {
        debug!(uri = %include_uri, "resolving configuration include");
        let included = resolver(include_uri)?;
        out.extend(flatten_includes(Some(include_uri), included, resolver, visited)?);
    }
    out.push(doc);
    Ok(out)
}

/// Build a [PofContext] from a top-level [PofConfigDocument], resolving `<include>` directives
/// through `include_resolver`, consulting `catalog` for the implicit-serializer decision described
/// in the POF configuration design, and `factories` for every explicit or default serializer.
///
/// Boolean flags and user-type lists combine across the whole include tree: flags with logical-OR,
/// user types by concatenation in (included-first, then including-document) order.
pub fn load(
    doc: PofConfigDocument,
    include_resolver: impl Fn(&str) -> Result<PofConfigDocument>,
    catalog: &dyn TypeCatalog,
    factories: &SerializerFactoryRegistry,
) -> Result<PofContext> {
    let mut visited = HashSet::new();
    let docs = flatten_includes(None, doc, &include_resolver, &mut visited)?;
    debug!(documents = docs.len(), "loading POF configuration");

    let mut allow_interfaces = false;
    let mut allow_subclasses = false;
    let mut enable_references = false;
    let mut default_serializer: Option<SerializerConfig> = None;
    let mut user_types: Vec<UserTypeConfig> = Vec::new();

    for d in docs {
        allow_interfaces |= d.allow_interfaces;
        allow_subclasses |= d.allow_subclasses;
        enable_references |= d.enable_references;
        if default_serializer.is_none() {
            default_serializer = d.default_serializer;
        }
        user_types.extend(d.user_type_list);
    }

    let any_id = user_types.iter().any(|u| u.type_id.is_some());
    let all_ids = user_types.iter().all(|u| u.type_id.is_some());
    if any_id && !all_ids {
        return Err(Error::from(ErrorKind::from(
            ConfigurationError::PartialTypeIdAssignment,
        )));
    }

    let ctx = PofContext::new(ContextFlags {
        allow_interfaces,
        allow_subclasses,
        references_enabled: enable_references,
    });

    for (i, user_type) in user_types.iter().enumerate() {
        let type_id = user_type.type_id.unwrap_or(i as i32);
        debug!(class_name = %user_type.class_name, type_id, "resolving configured user type");
        let meta = catalog.metadata(&user_type.class_name).unwrap_or_default();

        let serializer = build_serializer(
            user_type.serializer.as_ref(),
            default_serializer.as_ref(),
            factories,
            catalog,
            type_id,
            &user_type.class_name,
        )?;

        let mut descriptor = UserTypeDescriptor::new(type_id, user_type.class_name.clone(), serializer)
            .interface(meta.is_interface)
            .abstract_type(meta.is_abstract);
        if let Some(super_name) = &meta.super_type_name {
            descriptor = descriptor.extends(super_name.clone());
        }
        for iface in &meta.interface_names {
            descriptor = descriptor.implements(iface.clone());
        }
        ctx.register(descriptor)?;
    }

    Ok(ctx)
}
