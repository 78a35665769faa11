use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while assembling a scenario.
///
/// All of these abort scenario construction. Step-time callbacks never return them;
/// recoverable conditions met while stepping are logged instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid scenario or API parameter.
    #[error("invalid scenario parameter: {0}")]
    InvalidParam(String),

    /// The packer wrote a different number of particles than the builder counted.
    #[error("particle count mismatch: {expected} particles were built but {written} were packed")]
    CountMismatch { expected: usize, written: usize },

    /// The dynamics engine refused to create a body.
    #[error("failed to create dynamics body `{name}`: {reason}")]
    BodyCreation { name: String, reason: String },

    /// The collision engine could not build a geometry for a shape.
    #[error("failed to create collision geometry for `{name}`")]
    GeometryCreation { name: String },

    /// The dynamics world could not be initialized.
    #[error("failed to initialize the dynamics world: {0}")]
    WorldInit(String),

    /// Static collision primitives are installed once and never changed.
    #[error("static collision geometry is already installed")]
    StaticGeometryFrozen,

    /// No preset scenario with that name.
    #[error("unknown scenario `{0}`")]
    UnknownScenario(String),

    /// Configuration (de)serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Propagated I/O errors (telemetry sink creation, trajectory export).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_mismatch_is_descriptive() {
        let e = Error::CountMismatch {
            expected: 120,
            written: 118,
        };
        let msg = e.to_string();
        assert!(msg.contains("120"));
        assert!(msg.contains("118"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let e: Error = io.into();
        assert!(e.to_string().contains("disk full"));
    }
}
