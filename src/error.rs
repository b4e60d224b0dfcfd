use thiserror::Error;

/// Failure surface of the engine API.
///
/// Every variant aborts a single operation and leaves the rest of the scene
/// untouched; nothing here is fatal to the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("an entity with id '{0}' already exists")]
    DuplicateId(String),
    #[error("no entity with id '{0}'")]
    NotFound(String),
    #[error("unknown entity kind '{0}'")]
    UnknownKind(String),
    #[error("unknown body type '{0}'")]
    UnknownBodyType(String),
    #[error("unknown collision shape '{0}'")]
    UnknownShape(String),
    #[error("unknown light type '{0}'")]
    UnknownLightType(String),
    #[error("invalid color value '{0}'")]
    InvalidColor(String),
    #[error("entity '{id}' does not support the '{property}' update")]
    UnknownProperty { id: String, property: &'static str },
    #[error("{0}")]
    InvalidState(&'static str),
    #[error("resource load failed for '{name}': {reason}")]
    ResourceLoad { name: String, reason: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
