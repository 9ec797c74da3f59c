//! Error types and result aliases.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error in {context}: {error}")]
    Json {
        error: serde_json::Error,
        context: String,
    },

    #[error("TOML parse error in {context}: {error}")]
    Toml {
        error: toml::de::Error,
        context: String,
    },

    #[error("Config file not found: no 'rollkit.toml' in {0} or any parent directory")]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration in {context}: {message}")]
    InvalidConfig { context: String, message: String },

    #[error("Manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("Invalid manifest {path}: {message}")]
    InvalidManifest { path: PathBuf, message: String },

    #[error("Package not found: {name}. Available packages: {available}")]
    PackageNotFound { name: String, available: String },

    #[error("Recursive dependency: {chain}. Use 'rollkit tree' to inspect dependencies.")]
    CircularDependency { chain: String },

    #[error("Corrupt module state file {path}: {message}")]
    CorruptState { path: PathBuf, message: String },

    #[error("Invalid version '{version}' in {package}: {message}")]
    InvalidVersion {
        package: String,
        version: String,
        message: String,
    },

    #[error("Not a repository: {0}")]
    NotARepository(PathBuf),

    #[error("Version control error in {path}: {message}")]
    Vcs { path: PathBuf, message: String },

    #[error("Registry error for {package}: {message}")]
    Registry { package: String, message: String },

    #[error("Lockfile error in {path}: {message}")]
    Lockfile { path: PathBuf, message: String },

    #[error("Task execution failed for {package}::{task}: {message}")]
    TaskExecution {
        package: String,
        task: String,
        message: String,
    },

    #[error("{operation} failed after {attempts} attempts")]
    RetriesExhausted { operation: String, attempts: u32 },

    #[error("Release error: {0}")]
    Release(String),

    #[error("Mutex lock error: {0}")]
    MutexLock(String),
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Toml {
            error,
            context: "rollkit.toml".to_string(),
        }
    }
}

impl Error {
    /// Returns `true` for errors that only mean "there is no repository here".
    pub fn is_not_a_repository(&self) -> bool {
        matches!(self, Error::NotARepository(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
