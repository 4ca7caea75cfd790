use crate::version::Version;
use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SolcError>;

/// Various error types
#[derive(Debug, Error)]
pub enum SolcError {
    /// Errors related to the Solc executable itself.
    #[error("solc exited with {0}\n{1}")]
    CompilerInvocationFailed(std::process::ExitStatus, String),
    #[error("invalid version: `{0}`")]
    InvalidVersion(String),
    #[error("invalid version expression: `{0}`")]
    InvalidVersionExpression(String),
    #[error("empty version expression")]
    EmptyVersionExpression,
    #[error("multi-line comment not closed")]
    UnterminatedComment,
    /// Failed to map a source unit name back to a file.
    #[error("unable to find `{0}` in the project root or include paths. Check configured remappings.")]
    UnresolvedImport(String),
    #[error("source unit name `{name}` is ambiguous. It can be resolved as:\n{}", candidates.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join("\n"))]
    AmbiguousImport { name: String, candidates: Vec<PathBuf> },
    #[error("failed to resolve import `{1}` of `{0}`: {2}")]
    FailedResolveImport(String, String, Box<SolcError>),
    #[error("file `{0}` is not located in the project root or include paths")]
    SourceUnitNotInRoots(PathBuf),
    #[error("same source unit name `{name}` for multiple source files:\n{}\n{}", first.display(), second.display())]
    DuplicateSourceUnitName { name: String, first: PathBuf, second: PathBuf },
    #[error("config file `{}` is included more than once", .0.display())]
    CyclicSubconfig(PathBuf),
    #[error("unable to compile the following files with the configured solc version `{version}`:\n{files}")]
    IncompatibleTargetVersion { version: Version, files: String },
    #[error("no solc version exists that can compile the following files:\n{0}")]
    NoCompatibleCompilerVersion(String),
    #[error("the minimal supported solc version for this platform is `{minimum}`, requested `{requested}`")]
    UnsupportedCompilerVersion { requested: Version, minimum: Version },
    #[error("solc version `{0}` does not exist")]
    UnknownCompilerVersion(Version),
    #[error("checksum mismatch for {file}: expected {expected}, found {detected} for {version}")]
    ChecksumMismatch { version: Version, expected: String, detected: String, file: PathBuf },
    #[error("unable to fetch or parse the solc release list from `{0}`")]
    CompilerCatalogUnavailable(String),
    #[error(transparent)]
    Remapping(#[from] crate::remappings::RemappingError),
    /// Deserialization error
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    /// Filesystem IO error
    #[error(transparent)]
    Io(#[from] SolcIoError),
    #[cfg(not(target_arch = "wasm32"))]
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    /// General purpose message.
    #[error("{0}")]
    Message(String),
}

impl SolcError {
    /// An io error, annotated with the path the failing operation touched.
    pub(crate) fn io(source: io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io(SolcIoError::new(source, path))
    }

    /// Turns a compiler process that exited with a failure status into an error, carrying
    /// whatever diagnostic the process left behind (stderr preferred over stdout).
    pub(crate) fn solc_output(output: &std::process::Output) -> Self {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let diagnostic = [stderr.trim(), stdout.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or("<empty output>")
            .to_string();
        Self::CompilerInvocationFailed(output.status, diagnostic)
    }

    /// A one-off error carrying only a message.
    pub fn msg(msg: impl std::fmt::Display) -> Self {
        Self::Message(msg.to_string())
    }
}

/// An io error together with the path it occurred at.
///
/// Bare `io::Error`s are useless in a build that touches hundreds of files, so every io
/// failure in this crate is tagged with its path when it is raised.
#[derive(Debug, Error)]
#[error("\"{}\": {source}", path.display())]
pub struct SolcIoError {
    path: PathBuf,
    source: io::Error,
}

impl SolcIoError {
    pub fn new(source: io::Error, path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), source }
    }

    /// The path the failing operation touched.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
