//! Error types for collision checking.

use thiserror::Error;

/// Result type for collision operations.
pub type Result<T> = std::result::Result<T, CollisionError>;

/// Errors reported by the collision engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CollisionError {
    /// The request names a group the robot model does not define.
    #[error("invalid request: unknown group '{group}'")]
    InvalidRequest { group: String },

    /// A link, object or attached body name is not known.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    /// Shape is degenerate or its distance field would be empty.
    #[error("geometry error: {0}")]
    Geometry(String),
}

impl CollisionError {
    pub(crate) fn link_not_found(name: &str) -> Self {
        Self::NotFound {
            kind: "link",
            name: name.to_string(),
        }
    }

    pub(crate) fn joint_not_found(name: &str) -> Self {
        Self::NotFound {
            kind: "joint",
            name: name.to_string(),
        }
    }

    pub(crate) fn object_not_found(name: &str) -> Self {
        Self::NotFound {
            kind: "object",
            name: name.to_string(),
        }
    }

    pub(crate) fn attached_body_not_found(name: &str) -> Self {
        Self::NotFound {
            kind: "attached body",
            name: name.to_string(),
        }
    }
}
