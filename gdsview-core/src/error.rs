//! Error types for the gdsview core

use thiserror::Error;

/// Main error type for gdsview core operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid geometry for item {id}: {source}")]
    Geometry {
        id: u64,
        #[source]
        source: GeometryError,
    },

    #[error("Input/Output error: {message}")]
    Io { message: String },
}

impl Error {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn geometry(id: u64, source: GeometryError) -> Self {
        Self::Geometry { id, source }
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io { message: message.into() }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("TOML parsing error: {}", err))
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::config(format!("TOML serialization error: {}", err))
    }
}

/// Why a bounding box was refused by the index.
///
/// These never abort a build or a query; they are collected into a
/// [`BuildReport`](crate::spatial::BuildReport) for the caller to surface.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum GeometryError {
    #[error("non-finite coordinate in box ({min_x}, {min_y}, {max_x}, {max_y})")]
    NonFinite {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },

    #[error("inverted box: min ({min_x}, {min_y}) exceeds max ({max_x}, {max_y})")]
    Inverted {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },
}

/// Result type for gdsview core operations
pub type Result<T> = std::result::Result<T, Error>;
