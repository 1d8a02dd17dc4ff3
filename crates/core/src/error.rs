//! Error types for structuring, unstructuring, schema resolution and the
//! external-record collaborator.
//!
//! Every user-visible failure is a single value carrying a ready-to-display
//! message. Raw failures raised deep inside a conversion are rewritten once,
//! at the innermost enclosing record boundary; errors that already carry
//! that shape travel to the caller unchanged.

/// Coarse classification shared by every conversion error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A value does not conform to the expected descriptor.
    TypeMismatch,
    /// A record field is absent and has neither a default nor an optional marker.
    MissingRequiredField,
    /// A union could not pick exactly one member, or the union itself is malformed.
    AmbiguousUnion,
    /// No hook is registered for an encountered kind.
    UnsupportedType,
    /// The external-record collaborator signaled a failure.
    ExternalCollaboratorError,
}

// ──────────────────────────────────────────────
// Structuring
// ──────────────────────────────────────────────

/// Failure while converting dynamic data into a typed value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StructureError {
    #[error("Cannot structure {owner}: {value} is not an instance of {expected}")]
    TypeMismatch {
        owner: String,
        expected: String,
        value: String,
    },

    #[error("Cannot structure {owner}: missing required field '{field}'")]
    MissingRequiredField { owner: String, field: String },

    /// An external record field that may not be null was absent or null.
    #[error("Cannot structure {owner}: field '{field}' is not nullable")]
    NotNullable { owner: String, field: String },

    #[error("Cannot structure {union}: {reason}")]
    AmbiguousUnion { union: String, reason: String },

    #[error("Cannot structure {owner}: no hook registered for {kind}")]
    UnsupportedType { owner: String, kind: String },

    #[error("Cannot structure {owner}: nesting depth exceeds the limit of {limit}")]
    DepthExceeded { owner: String, limit: usize },

    #[error("Cannot structure {model}: {source}")]
    External {
        model: String,
        #[source]
        source: ExternalError,
    },
}

impl StructureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StructureError::TypeMismatch { .. } | StructureError::DepthExceeded { .. } => {
                ErrorKind::TypeMismatch
            }
            StructureError::MissingRequiredField { .. } | StructureError::NotNullable { .. } => {
                ErrorKind::MissingRequiredField
            }
            StructureError::AmbiguousUnion { .. } => ErrorKind::AmbiguousUnion,
            StructureError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            StructureError::External { .. } => ErrorKind::ExternalCollaboratorError,
        }
    }

    /// Name of the record, union or type the error is reported against.
    pub fn owner(&self) -> &str {
        match self {
            StructureError::TypeMismatch { owner, .. }
            | StructureError::MissingRequiredField { owner, .. }
            | StructureError::NotNullable { owner, .. }
            | StructureError::UnsupportedType { owner, .. }
            | StructureError::DepthExceeded { owner, .. } => owner,
            StructureError::AmbiguousUnion { union, .. } => union,
            StructureError::External { model, .. } => model,
        }
    }
}

// ──────────────────────────────────────────────
// Unstructuring
// ──────────────────────────────────────────────

/// Failure while converting a typed value back into dynamic data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UnstructureError {
    /// A record field could not be unstructured.
    #[error("Cannot unstructure {owner}: field '{field}' {reason}")]
    Field {
        owner: String,
        field: String,
        reason: String,
    },

    #[error("Cannot unstructure {owner}: missing field '{field}'")]
    MissingField { owner: String, field: String },

    #[error("Cannot unstructure {expected}: {value} is not an instance of {expected}")]
    TypeMismatch { expected: String, value: String },

    #[error("Cannot unstructure {owner}: no hook registered for {kind}")]
    UnsupportedType { owner: String, kind: String },

    #[error("Cannot unstructure {owner}: nesting depth exceeds the limit of {limit}")]
    DepthExceeded { owner: String, limit: usize },

    /// The catalog could not describe the model.
    #[error("Cannot unstructure {model}: {source}")]
    Catalog {
        model: String,
        #[source]
        source: ExternalError,
    },

    #[error("Cannot unstructure {model}: field '{field}': {source}")]
    External {
        model: String,
        field: String,
        #[source]
        source: ExternalError,
    },
}

impl UnstructureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UnstructureError::Field { .. }
            | UnstructureError::TypeMismatch { .. }
            | UnstructureError::DepthExceeded { .. } => ErrorKind::TypeMismatch,
            UnstructureError::MissingField { .. } => ErrorKind::MissingRequiredField,
            UnstructureError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            UnstructureError::Catalog { .. } | UnstructureError::External { .. } => {
                ErrorKind::ExternalCollaboratorError
            }
        }
    }
}

// ──────────────────────────────────────────────
// Hooks
// ──────────────────────────────────────────────

/// What a conversion hook returns on failure.
///
/// `Invalid` is a raw failure: the engine rewrites it into a `TypeMismatch`
/// at the nearest record boundary. The other variants are already formatted
/// and are propagated unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HookError {
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Structure(#[from] StructureError),
    #[error(transparent)]
    Unstructure(#[from] UnstructureError),
}

impl HookError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        HookError::Invalid(reason.into())
    }
}

// ──────────────────────────────────────────────
// Resolution
// ──────────────────────────────────────────────

/// Configuration errors raised while declaring or resolving schemas.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("unknown type reference '{name}' in {owner}")]
    UnknownType { name: String, owner: String },

    #[error("record '{0}' is already declared")]
    DuplicateRecord(String),

    #[error("record '{record}' declares field '{field}' more than once")]
    DuplicateField { record: String, field: String },

    /// A union declaration that can never be disambiguated.
    #[error("invalid union in {owner}: {source}")]
    InvalidUnion {
        owner: String,
        #[source]
        source: StructureError,
    },
}

// ──────────────────────────────────────────────
// External collaborator
// ──────────────────────────────────────────────

/// Errors reported by a [`ModelCatalog`](crate::external::ModelCatalog).
///
/// An unfetched relation is not an error; catalogs report it through
/// [`Fetched::NotLoaded`](crate::external::Fetched::NotLoaded).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExternalError {
    #[error("unknown model '{0}'")]
    UnknownModel(String),

    #[error("model '{model}' has no field '{field}'")]
    UnknownField { model: String, field: String },

    #[error("{0}")]
    Rejected(String),
}
