//! Error types for STEP import.

use stepbrep_geom::GeomError;
use stepbrep_math::FrameError;
use stepbrep_topo::TopoError;
use thiserror::Error;

/// Coarse classification of a [`StepError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// No constructor is registered for an instance's type.
    UnknownType,
    /// A required attribute is absent or has the wrong shape.
    MissingAttribute,
    /// A referenced instance cannot be resolved.
    UnresolvableReference,
    /// Geometry cannot be built (parallel axes, zero radius, bad knots).
    DegenerateGeometry,
    /// Loops do not close or orientation flags are inconsistent.
    TopologyMismatch,
    /// The file could not be read or tokenized.
    Syntax,
    /// The entity resolved but has no BREP counterpart.
    Unsupported,
}

/// Errors that can occur during STEP import.
#[derive(Error, Debug)]
pub enum StepError {
    /// I/O error reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Lexer error: unexpected character or malformed token.
    #[error("Lexer error at line {line}, column {col}: {message}")]
    Lexer {
        /// Line number (1-indexed).
        line: usize,
        /// Column number (1-indexed).
        col: usize,
        /// Error message.
        message: String,
    },

    /// Parser error: unexpected token or malformed structure.
    #[error("Parser error{}: {message}", entity_id.map(|id| format!(" at entity #{}", id)).unwrap_or_default())]
    Parser {
        /// Entity ID where the error occurred, if known.
        entity_id: Option<u64>,
        /// Error message.
        message: String,
    },

    /// No constructor is registered for the instance's type.
    #[error("#{id}: unknown entity type {type_name}")]
    UnknownType {
        /// Instance id.
        id: u64,
        /// Runtime type key (`A+B` for complex instances).
        type_name: String,
    },

    /// A required attribute is absent, derived, or of the wrong kind.
    #[error("#{id}: missing attribute `{attribute}` of {type_name}{}", detail.as_ref().map(|d| format!(" ({d})")).unwrap_or_default())]
    MissingAttribute {
        /// Instance id.
        id: u64,
        /// Declared type owning the attribute.
        type_name: String,
        /// Attribute name.
        attribute: String,
        /// What was found instead, if anything.
        detail: Option<String>,
    },

    /// A select attribute holds a variant no domain type handles.
    #[error("#{id}: unhandled select variant {variant} in `{attribute}`")]
    UnhandledSelect {
        /// Instance id.
        id: u64,
        /// Attribute name.
        attribute: String,
        /// The select's active type.
        variant: String,
    },

    /// An instance id referenced from the file does not exist.
    #[error("missing entity reference: #{0}")]
    MissingEntity(u64),

    /// A handle refers to an entity whose load failed.
    #[error("stale entity handle")]
    StaleHandle,

    /// An entity was read while it was still loading.
    #[error("#{0}: cyclic reference read before load completed")]
    CyclicReference(u64),

    /// A reference resolved to an entity of the wrong kind.
    #[error("#{id}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Instance id of the referenced entity.
        id: u64,
        /// Expected kind.
        expected: String,
        /// Actual kind.
        actual: String,
    },

    /// Frame construction failed.
    #[error("#{id}: {source}")]
    Frame {
        /// Placement instance id.
        id: u64,
        /// Underlying failure.
        source: FrameError,
    },

    /// A geometric primitive could not be built.
    #[error("#{id}: invalid geometry: {source}")]
    Geometry {
        /// Curve or surface instance id.
        id: u64,
        /// Underlying failure.
        source: GeomError,
    },

    /// A curve has neither a trim nor bounding vertices.
    #[error("#{0}: no endpoint data")]
    NoEndpointData(u64),

    /// Other invalid geometry.
    #[error("#{id}: invalid geometry: {message}")]
    InvalidGeometry {
        /// Instance id.
        id: u64,
        /// Error message.
        message: String,
    },

    /// Invalid topology (open loop, repeated edge, bad bounds).
    #[error("#{id}: invalid topology: {message}")]
    InvalidTopology {
        /// Instance id.
        id: u64,
        /// Error message.
        message: String,
    },

    /// The output container rejected an element.
    #[error("BREP container: {0}")]
    Container(#[from] TopoError),

    /// The entity resolved but cannot be emitted.
    #[error("#{id}: unsupported entity {type_name}")]
    UnsupportedEntity {
        /// Instance id.
        id: u64,
        /// Its type.
        type_name: String,
    },

    /// The file contains no top-level shape.
    #[error("no shapes found in STEP file")]
    NoShapes,

    /// Reader options are out of range.
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl StepError {
    /// Create a lexer error.
    pub fn lexer(line: usize, col: usize, message: impl Into<String>) -> Self {
        Self::Lexer {
            line,
            col,
            message: message.into(),
        }
    }

    /// Create a parser error.
    pub fn parser(entity_id: Option<u64>, message: impl Into<String>) -> Self {
        Self::Parser {
            entity_id,
            message: message.into(),
        }
    }

    /// Create a missing-attribute error.
    pub fn missing_attribute(
        id: u64,
        type_name: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        Self::MissingAttribute {
            id,
            type_name: type_name.into(),
            attribute: attribute.into(),
            detail: None,
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(id: u64, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            id,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a topology error.
    pub fn topology(id: u64, message: impl Into<String>) -> Self {
        Self::InvalidTopology {
            id,
            message: message.into(),
        }
    }

    /// Create a geometry error.
    pub fn geometry(id: u64, message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            id,
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::Lexer { .. } | Self::Parser { .. } | Self::InvalidOptions(_) => {
                ErrorKind::Syntax
            }
            Self::UnknownType { .. } => ErrorKind::UnknownType,
            Self::MissingAttribute { .. } | Self::NoEndpointData(_) => ErrorKind::MissingAttribute,
            Self::UnhandledSelect { .. }
            | Self::MissingEntity(_)
            | Self::StaleHandle
            | Self::CyclicReference(_)
            | Self::TypeMismatch { .. } => ErrorKind::UnresolvableReference,
            Self::Frame { .. } | Self::Geometry { .. } | Self::InvalidGeometry { .. } => {
                ErrorKind::DegenerateGeometry
            }
            Self::InvalidTopology { .. } | Self::Container(_) => ErrorKind::TopologyMismatch,
            Self::UnsupportedEntity { .. } | Self::NoShapes => ErrorKind::Unsupported,
        }
    }

    /// The instance id closest to the failure, when known.
    pub fn instance_id(&self) -> Option<u64> {
        match self {
            Self::Parser { entity_id, .. } => *entity_id,
            Self::UnknownType { id, .. }
            | Self::MissingAttribute { id, .. }
            | Self::UnhandledSelect { id, .. }
            | Self::TypeMismatch { id, .. }
            | Self::Frame { id, .. }
            | Self::Geometry { id, .. }
            | Self::InvalidGeometry { id, .. }
            | Self::InvalidTopology { id, .. }
            | Self::UnsupportedEntity { id, .. } => Some(*id),
            Self::MissingEntity(id) | Self::CyclicReference(id) | Self::NoEndpointData(id) => {
                Some(*id)
            }
            _ => None,
        }
    }
}

/// Result type for STEP import.
pub type Result<T> = std::result::Result<T, StepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_id() {
        let e = StepError::missing_attribute(12, "CIRCLE", "radius");
        assert_eq!(e.kind(), ErrorKind::MissingAttribute);
        assert_eq!(e.instance_id(), Some(12));
        assert_eq!(e.to_string(), "#12: missing attribute `radius` of CIRCLE");

        let e = StepError::Frame {
            id: 4,
            source: FrameError::ZeroLengthAxis,
        };
        assert_eq!(e.kind(), ErrorKind::DegenerateGeometry);

        assert_eq!(StepError::StaleHandle.kind(), ErrorKind::UnresolvableReference);
        assert_eq!(StepError::StaleHandle.instance_id(), None);
    }

    #[test]
    fn test_kind_serializes_kebab_case() {
        let s = serde_json::to_string(&ErrorKind::TopologyMismatch).unwrap();
        assert_eq!(s, "\"topology-mismatch\"");
    }
}
