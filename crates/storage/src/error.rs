use recast_core::ExternalError;

/// All errors that can be returned by the in-memory model catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// No model with this name is registered.
    #[error("model not registered: {model}")]
    ModelNotFound { model: String },

    /// A model with this name is already registered.
    #[error("model already registered: {model}")]
    AlreadyRegistered { model: String },

    /// The model declares no field with this name.
    #[error("field not found: {model}.{field}")]
    FieldNotFound { model: String, field: String },

    /// Backward relations are owned by the other side and are never assigned
    /// on construction.
    #[error("backward relation {model}.{field} cannot be assigned on construction")]
    BackwardAssignment { model: String, field: String },

    /// `load_relation` was called on a field that is not a to-many relation.
    #[error("{model}.{field} is not a to-many relation")]
    NotToMany { model: String, field: String },

    /// A relation names a model that is not registered.
    #[error("relation {model}.{field} refers to unregistered model {related}")]
    DanglingRelation {
        model: String,
        field: String,
        related: String,
    },
}

impl From<StorageError> for ExternalError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::ModelNotFound { model } => ExternalError::UnknownModel(model),
            StorageError::FieldNotFound { model, field } => {
                ExternalError::UnknownField { model, field }
            }
            other => ExternalError::Rejected(other.to_string()),
        }
    }
}
