use thiserror::Error;

/// Taxonomie d'erreurs du kernel. Aucune n'est fatale au processus :
/// Validation → drop + log côté ingestion, NotFound → 404 côté API,
/// Storage → log + on continue (la vue mémoire reste autoritaire).
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("invalid telemetry: {0}")]
    Validation(String),

    #[error("unknown device {0}")]
    DeviceNotFound(String),

    #[error("unknown alert {0}")]
    AlertNotFound(String),

    #[error("storage: {0}")]
    Storage(String),
}

impl From<std::io::Error> for FleetError {
    fn from(e: std::io::Error) -> Self {
        FleetError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for FleetError {
    fn from(e: serde_json::Error) -> Self {
        FleetError::Storage(e.to_string())
    }
}
