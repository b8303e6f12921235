use std::path::PathBuf;
use thiserror::Error;

/// Failures loading or validating `pdb-advisor.toml`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file {0} does not exist")]
    NotFound(PathBuf),

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    /// `field` is the dotted TOML path, e.g. `transport.rate_limit.rps`.
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },
}
