use thiserror::Error;

/// Failures the viewer core can surface to its host.
///
/// Only `FetchFailure` and `EmptyFeed` ever reach the viewer; persistence
/// problems are logged and dropped where they happen.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewerError {
    #[error("failed to fetch reels: {0}")]
    FetchFailure(String),

    #[error("no reels available")]
    EmptyFeed,

    #[error("failed to persist telemetry: {0}")]
    PersistenceFailure(String),

    #[error("reel catalog error: {0}")]
    Catalog(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ViewerError {
    fn from(err: serde_json::Error) -> Self {
        ViewerError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ViewerError::FetchFailure("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(ViewerError::EmptyFeed.to_string(), "no reels available");
    }

    #[test]
    fn serde_errors_convert() {
        let parse: Result<u32, _> = serde_json::from_str("not json");
        let err: ViewerError = parse.unwrap_err().into();
        assert!(matches!(err, ViewerError::Serialization(_)));
    }
}
