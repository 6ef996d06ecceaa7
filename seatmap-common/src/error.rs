//! Common error types for seatmap

use thiserror::Error;

/// Common result type for seatmap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the seatmap crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML file could not be parsed
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let config = Error::Config("max_records must be positive".to_string());
        assert_eq!(config.to_string(), "Configuration error: max_records must be positive");

        let io: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "seatmap.toml").into();
        assert!(matches!(io, Error::Io(_)));
        assert_eq!(io.to_string(), "IO error: seatmap.toml");

        let parse: Error = toml::from_str::<toml::Value>("= broken").unwrap_err().into();
        assert!(matches!(parse, Error::TomlParse(_)));
    }
}
