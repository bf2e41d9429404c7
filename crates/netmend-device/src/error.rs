use std::path::PathBuf;

/// Errors building an execution adapter.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("failed to read fixture {path}: {source}")]
    FixtureIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid fixture {path}: {source}")]
    FixtureYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}
