//! Information about a (de)serialization or registry failure and the location at which it failed.

use std::fmt::{Debug, Display};

use crate::codec::PackedWidth;

pub type Result<T> = std::result::Result<T, Error>;

// --- Error ------------------------------------------------------------------------------------

/// Details of a POF failure and, where known, the location in the stream or registry where the
/// problem occurred.
///
/// An error consists of an [ErrorKind] that identifies the kind of error that occurred, and an
/// [ErrorLocation] that describes where it occurred.
#[derive(Debug)]
#[non_exhaustive]
pub struct Error {
    kind: ErrorKind,
    location: ErrorLocation,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, location: ErrorLocation) -> Self {
        Self { kind, location }
    }

    /// Get details about the kind of error that occurred.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Get details about where the error occurred.
    pub fn location(&self) -> &ErrorLocation {
        &self.location
    }

    pub(crate) fn at<L>(kind: ErrorKind, location: L) -> Self
    where
        ErrorLocation: From<L>,
    {
        Self {
            kind,
            location: location.into(),
        }
    }

    /// Attach (or merge in) location context as the error unwinds out of a nested frame.
    pub(crate) fn with_context(mut self, ctx: ErrorLocation) -> Self {
        self.location = self.location.merge(ctx);
        self
    }

    /// Record that this error is propagating out of the nested frame for `type_id`.
    ///
    /// The first frame boundary an error crosses becomes its [ErrorLocation::type_id]; every frame
    /// boundary after that is recorded as an enclosing ancestor in
    /// [ErrorLocation::parent_type_ids], so a failure nested several frames deep keeps the whole
    /// chain as it is handed back up through [crate::stream::PofWriter::write_nested] and
    /// [crate::serializer::hierarchical::HierarchicalSerializer::deserialize].
    pub(crate) fn while_in_frame(self, type_id: i32) -> Self {
        if self.location.type_id.is_some() {
            self.with_context(ErrorLocation::unknown().with_parent(type_id))
        } else {
            self.with_context(ErrorLocation::in_frame(type_id))
        }
    }

    /// Record the byte offset in the stream at which this error was first raised, if none is
    /// already known.
    pub(crate) fn while_at_offset(self, offset: u64) -> Self {
        self.with_context(ErrorLocation::at_offset(offset))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ErrorKind::Io(e) => write!(f, "I/O fault: {} (at {})", e, self.location),
            ErrorKind::Malformed(e) => {
                write!(f, "malformed POF data: {} (at {})", e, self.location)
            }
            ErrorKind::Configuration(e) => write!(f, "POF configuration fault: {}", e),
            ErrorKind::UnknownType(e) => write!(f, "unknown POF type: {}", e),
            ErrorKind::Sequence(e) => write!(f, "POF sequencing fault: {} (at {})", e, self.location),
            ErrorKind::Unsupported(e) => write!(f, "unsupported POF type: {}", e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::at(ErrorKind::Io(e), ErrorLocation::unknown())
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::at(kind, ErrorLocation::unknown())
    }
}

// --- ErrorKind ----------------------------------------------------------------------------------

/// Details about the kind of error that occurred.
///
/// Errors can be roughly split into the categories named in the POF error handling design:
///   - [ErrorKind::Io]: the underlying byte sink/source failed.
///   - [ErrorKind::Malformed]: the bytes read are not valid POF (packed-int overflow, bad string
///     length, frame that ends mid-property).
///   - [ErrorKind::Configuration]: the type registry was configured inconsistently. Raised eagerly
///     at context construction; the context built from it must not be used.
///   - [ErrorKind::UnknownType]: a lookup by id, type, or name found no registration and no
///     inheritance match.
///   - [ErrorKind::Sequence]: a property index was written or read out of ascending order.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    Io(std::io::Error),
    Malformed(MalformedError),
    Configuration(ConfigurationError),
    UnknownType(UnknownTypeError),
    Sequence(SequenceError),
    Unsupported(UnsupportedError),
}

impl From<MalformedError> for ErrorKind {
    fn from(e: MalformedError) -> Self {
        Self::Malformed(e)
    }
}

impl From<ConfigurationError> for ErrorKind {
    fn from(e: ConfigurationError) -> Self {
        Self::Configuration(e)
    }
}

impl From<UnknownTypeError> for ErrorKind {
    fn from(e: UnknownTypeError) -> Self {
        Self::UnknownType(e)
    }
}

impl From<SequenceError> for ErrorKind {
    fn from(e: SequenceError) -> Self {
        Self::Sequence(e)
    }
}

impl From<UnsupportedError> for ErrorKind {
    fn from(e: UnsupportedError) -> Self {
        Self::Unsupported(e)
    }
}

// --- ErrorLocation --------------------------------------------------------------------------------

/// Details about where in the stream or object graph an error occurred.
///
/// Errors raised deep in the codec have no notion of which user-type frame or nested frame they
/// were raised within, so location is accumulated as the error propagates back up through the
/// stream reader/writer and serializer layers, the same way the chain of enclosing tags is
/// accumulated in a TTLV-style (de)serializer.
#[derive(Clone, Debug, Default)]
pub struct ErrorLocation {
    offset: Option<u64>,
    parent_type_ids: Vec<i32>,
    type_id: Option<i32>,
    property_index: Option<i32>,
}

impl ErrorLocation {
    pub(crate) fn unknown() -> Self {
        Self::default()
    }

    pub(crate) fn at_offset(offset: u64) -> Self {
        Self {
            offset: Some(offset),
            ..Default::default()
        }
    }

    pub(crate) fn in_frame(type_id: i32) -> Self {
        Self {
            type_id: Some(type_id),
            ..Default::default()
        }
    }

    pub(crate) fn with_offset(mut self, offset: u64) -> Self {
        self.offset.get_or_insert(offset);
        self
    }

    pub(crate) fn with_type_id(mut self, type_id: i32) -> Self {
        self.type_id.get_or_insert(type_id);
        self
    }

    pub(crate) fn with_property_index(mut self, index: i32) -> Self {
        self.property_index.get_or_insert(index);
        self
    }

    pub(crate) fn with_parent(mut self, parent_type_id: i32) -> Self {
        self.parent_type_ids.insert(0, parent_type_id);
        self
    }

    pub(crate) fn merge(mut self, other: ErrorLocation) -> Self {
        if let Some(offset) = other.offset {
            self = self.with_offset(offset);
        }
        if let Some(type_id) = other.type_id {
            self = self.with_type_id(type_id);
        }
        if let Some(index) = other.property_index {
            self = self.with_property_index(index);
        }
        for parent in other.parent_type_ids.into_iter().rev() {
            self = self.with_parent(parent);
        }
        self
    }

    pub fn is_unknown(&self) -> bool {
        self.offset.is_none()
            && self.parent_type_ids.is_empty()
            && self.type_id.is_none()
            && self.property_index.is_none()
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn parent_type_ids(&self) -> &[i32] {
        &self.parent_type_ids
    }

    pub fn type_id(&self) -> Option<i32> {
        self.type_id
    }

    pub fn property_index(&self) -> Option<i32> {
        self.property_index
    }
}

impl Display for ErrorLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unknown() {
            return f.write_str("unknown");
        }

        let mut sep_str = "";
        let mut sep = || {
            let s = sep_str;
            sep_str = ", ";
            s
        };

        if let Some(offset) = self.offset {
            write!(f, "{}offset {}", sep(), offset)?;
        }
        if !self.parent_type_ids.is_empty() {
            write!(f, "{}type chain ", sep())?;
            let mut iter = self.parent_type_ids.iter();
            write!(f, "{}", iter.next().unwrap())?;
            for id in iter {
                write!(f, " > {}", id)?;
            }
        }
        if let Some(type_id) = self.type_id {
            write!(f, "{}type id {}", sep(), type_id)?;
        }
        if let Some(index) = self.property_index {
            write!(f, "{}property {}", sep(), index)?;
        }
        Ok(())
    }
}

// --- MalformedError -------------------------------------------------------------------------------

/// Failure because the bytes read do not conform to the packed POF encoding.
#[derive(Debug)]
#[non_exhaustive]
pub enum MalformedError {
    /// A packed integer's continuation chain produced more bytes than the target width allows.
    PackedIntOverflow { width: PackedWidth },

    /// A string length prefix was negative but not the `-1` null sentinel.
    NegativeStringLength(i32),

    /// The frame ended (remainder reached) before the expected property was found.
    UnexpectedEndOfFrame,

    /// The string's bytes were not valid UTF-8.
    InvalidUtf8,

    /// A boolean-style fixed value was neither 0 nor 1.
    InvalidBooleanValue(u8),

    /// A [crate::types::RawYearMonthInterval] was constructed with a months component outside
    /// `-11..=11`, or with years and months of opposite non-zero sign.
    InvalidYearMonthInterval { years: i32, months: i32 },

    /// A length-prefixed value (bytes, string, or nested frame) declared a length longer than the
    /// reader's configured [crate::stream::Config::max_len], so the allocation was refused instead
    /// of attempted.
    LengthExceedsLimit { len: usize, max: usize },
}

impl Display for MalformedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedError::PackedIntOverflow { width } => {
                write!(f, "packed integer exceeds {:?} width", width)
            }
            MalformedError::NegativeStringLength(n) => {
                write!(f, "negative string length {} (only -1 is a valid sentinel)", n)
            }
            MalformedError::UnexpectedEndOfFrame => f.write_str("unexpected end of frame"),
            MalformedError::InvalidUtf8 => f.write_str("string bytes are not valid UTF-8"),
            MalformedError::InvalidBooleanValue(v) => {
                write!(f, "invalid encoded boolean value {}", v)
            }
            MalformedError::InvalidYearMonthInterval { years, months } => write!(
                f,
                "invalid year-month interval: years={} months={} (months must be in -11..=11 \
                 and agree in sign with years)",
                years, months
            ),
            MalformedError::LengthExceedsLimit { len, max } => write!(
                f,
                "length-prefixed value of {} bytes exceeds the configured maximum of {} bytes",
                len, max
            ),
        }
    }
}

// --- ConfigurationError ----------------------------------------------------------------------------

/// Failure while building a [crate::registry::PofContext] from configuration.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConfigurationError {
    DuplicateTypeId(i32),
    DuplicateType(String),
    InvalidTypeId(i32),
    MissingSerializer(String),
    ForbiddenInterface(String),
    ForbiddenAbstractType(String),
    ReservedTypeId(i32),
    IncludeCycle(String),
    PartialTypeIdAssignment,
    DuplicatePropertyIndex(i32),
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigurationError::DuplicateTypeId(id) => {
                write!(f, "type id {} is registered more than once", id)
            }
            ConfigurationError::DuplicateType(name) => {
                write!(f, "type {} is registered more than once", name)
            }
            ConfigurationError::InvalidTypeId(id) => write!(f, "invalid type id {}", id),
            ConfigurationError::MissingSerializer(name) => write!(
                f,
                "type {} has no configured serializer and implements neither the portable-object \
                 contract nor the portable annotation",
                name
            ),
            ConfigurationError::ForbiddenInterface(name) => write!(
                f,
                "type {} is an interface but allow-interfaces is disabled",
                name
            ),
            ConfigurationError::ForbiddenAbstractType(name) => write!(
                f,
                "type {} is abstract but allow-subclasses is disabled",
                name
            ),
            ConfigurationError::ReservedTypeId(id) => {
                write!(f, "type id {} is reserved by the safe fallback registry", id)
            }
            ConfigurationError::IncludeCycle(uri) => {
                write!(f, "configuration include cycle detected at {}", uri)
            }
            ConfigurationError::PartialTypeIdAssignment => write!(
                f,
                "type-id must be specified for either all or none of the user types in a \
                 configuration document"
            ),
            ConfigurationError::DuplicatePropertyIndex(idx) => write!(
                f,
                "property index {} is explicitly assigned to more than one attribute",
                idx
            ),
        }
    }
}

// --- UnknownTypeError -------------------------------------------------------------------------------

/// Failure because a lookup by id, type, or name found no registration and no inheritance match.
#[derive(Debug)]
#[non_exhaustive]
pub enum UnknownTypeError {
    ById(i32),
    ByName(String),
}

impl Display for UnknownTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnknownTypeError::ById(id) => write!(f, "no user type registered for type id {}", id),
            UnknownTypeError::ByName(name) => {
                write!(f, "no user type registered for type {}", name)
            }
        }
    }
}

// --- UnsupportedError -------------------------------------------------------------------------------

/// Failure because the [safe fallback registry](crate::registry::safe) was asked to resolve a type
/// that qualifies for neither reserved fallback id: it is neither a portable object nor bears the
/// native-serializable marker.
#[derive(Debug)]
#[non_exhaustive]
pub enum UnsupportedError {
    NeitherPortableNorSerializable(String),
}

impl Display for UnsupportedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnsupportedError::NeitherPortableNorSerializable(name) => write!(
                f,
                "{} is registered with neither a POF serializer nor a native-serializable \
                 fallback and cannot be resolved to a type id",
                name
            ),
        }
    }
}

// --- SequenceError ----------------------------------------------------------------------------------

/// Failure because property indexes were not written/read in strictly ascending order.
#[derive(Debug)]
#[non_exhaustive]
pub enum SequenceError {
    OutOfOrder { previous: i32, next: i32 },
    FrameAlreadyTerminated,
}

impl Display for SequenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SequenceError::OutOfOrder { previous, next } => write!(
                f,
                "property index {} is not strictly greater than the previous index {}",
                next, previous
            ),
            SequenceError::FrameAlreadyTerminated => {
                f.write_str("write attempted after the frame's remainder was already written")
            }
        }
    }
}
