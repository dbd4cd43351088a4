use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribeError {
    #[error("IO error while {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed metadata in {path} (line {line}): {message}")]
    MalformedMetadata {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Cannot derive a slug for {path}: title and filename are both empty")]
    EmptySlug { path: PathBuf },

    #[error("Duplicate post slug '{slug}' in {path} conflicts with {existing_path}")]
    DuplicateSlug {
        slug: String,
        path: PathBuf,
        existing_path: PathBuf,
    },

    #[error("Theme does not define the '{name}' template")]
    MissingTemplate { name: String },

    #[error("Failed to render markdown in {path}: {message}")]
    RenderFailure { path: PathBuf, message: String },

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("TOML parse error in {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Unknown syntax highlighting theme: {name}")]
    UnknownSyntaxTheme { name: String },

    #[error("Directory walk error in {path}: {message}")]
    WalkDir { path: PathBuf, message: String },

    #[error("No posts could be built ({failed} failed)")]
    NoPosts { failed: usize },

    #[error("Cannot write {path}: {message}")]
    OutputConflict { path: PathBuf, message: String },

    #[error("Build exceeded its {seconds}s time limit")]
    Timeout { seconds: u64 },
}

impl ScribeError {
    /// Errors that exclude a single source file instead of failing the build.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            ScribeError::MalformedMetadata { .. }
                | ScribeError::EmptySlug { .. }
                | ScribeError::RenderFailure { .. }
                | ScribeError::Io { .. }
        )
    }

    pub(crate) fn malformed(path: &Path, line: usize, message: impl Into<String>) -> Self {
        ScribeError::MalformedMetadata {
            path: path.to_path_buf(),
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScribeError>;

pub trait IoContext<T> {
    fn io_context(self, action: &'static str, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context(self, action: &'static str, path: &Path) -> Result<T> {
        self.map_err(|source| ScribeError::Io {
            action,
            path: path.to_path_buf(),
            source,
        })
    }
}
