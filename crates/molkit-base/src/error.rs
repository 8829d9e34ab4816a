use thiserror::Error;

use crate::key::UniqueKey;

/// Failure of a typed extraction from an [`AnyValue`](crate::value::AnyValue).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CastError {
    #[error("cannot extract a '{requested}' from an empty value")]
    Empty { requested: &'static str },

    #[error("stored value of type '{stored}' cannot be extracted as '{requested}'")]
    Mismatch {
        requested: &'static str,
        stored: &'static str,
    },
}

/// Failure of a property or control-parameter lookup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BaseError {
    #[error("no value set for key '{name}' (id {id})")]
    NotFound { id: u64, name: String },

    #[error("key id {0} has no registered name")]
    UnregisteredKey(u64),

    #[error(transparent)]
    Cast(#[from] CastError),
}

impl BaseError {
    pub(crate) fn not_found(key: UniqueKey) -> Self {
        Self::NotFound {
            id: key.id(),
            name: key.name().unwrap_or_default(),
        }
    }
}
