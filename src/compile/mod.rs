//! Abstraction over the `solc` command line binary.

use crate::{
    artifacts::{SolcInput, SolcOutput},
    error::{Result, SolcError},
    version::{Version, VersionRanges},
};
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    process::Stdio,
    str::FromStr,
};

pub mod project;

/// The name of the `solc` binary on the system
pub const SOLC: &str = "solc";

/// `--base-path` together with `--include-path` landed in 0.8.8, which is also the version from
/// which on sources can be addressed by their source unit name in standard JSON `urls`.
/// <https://github.com/ethereum/solidity/releases/tag/v0.8.8>
pub const BASE_PATH_SOLC: Version = Version::new(0, 8, 8);

/// A concrete `solc` executable together with its version.
#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct Solc {
    /// Path to the `solc` executable
    pub solc: PathBuf,
    /// Compiler version.
    pub version: Version,
}

impl Solc {
    /// A new instance which points to `solc`. Invokes `solc --version` to determine the version.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let version = Self::version(path)?;
        Ok(Self::new_with_version(path, version))
    }

    /// A new instance which points to `solc` with the given version.
    pub fn new_with_version(path: impl Into<PathBuf>, version: Version) -> Self {
        Self { solc: path.into(), version }
    }

    /// Whether this version understands `--base-path`/`--include-path` and source-unit-name
    /// `urls`.
    pub fn supports_base_path(&self) -> bool {
        self.version >= BASE_PATH_SOLC
    }

    /// Invokes `solc --version` and parses the reported version.
    pub fn version(solc: impl Into<PathBuf>) -> Result<Version> {
        let solc = solc.into();
        let mut cmd = std::process::Command::new(&solc);
        cmd.arg("--version").stdin(Stdio::piped()).stderr(Stdio::piped()).stdout(Stdio::piped());
        debug!(?cmd, "getting solc version");
        let output = cmd.output().map_err(|e| SolcError::io(e, solc))?;
        let version = version_from_output(output)?;
        debug!(%version);
        Ok(version)
    }

    /// Parses a lone solidity source for the version ranges its pragma allows.
    pub fn source_version_ranges(content: &str) -> Result<VersionRanges> {
        Ok(crate::resolver::parse::SolData::parse(content, false)?.versions)
    }

    /// Configures the solc invocation for a compiler run in the given project root.
    ///
    /// This passes `--standard-json`, opens up the configured allow paths and, for compilers
    /// that support it, sets `--base-path=.` plus one `--include-path` per configured include
    /// directory. The working directory is the project root so that `.` means the same thing
    /// for us and the compiler.
    pub fn configure_cmd(
        &self,
        root: &Path,
        include_paths: &[PathBuf],
        allow_paths: &BTreeSet<PathBuf>,
    ) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.solc);
        cmd.stdin(Stdio::piped()).stderr(Stdio::piped()).stdout(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd.current_dir(root);
        cmd.arg("--standard-json");

        let allow = allow_paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(",");
        cmd.arg(format!("--allow-paths=.,{allow}"));

        if self.supports_base_path() {
            cmd.arg("--base-path=.");
            for path in include_paths {
                cmd.arg(format!("--include-path={}", path.display()));
            }
        }
        cmd
    }

    /// Runs `solc --standard-json` with the given input.
    ///
    /// A non-zero exit is fatal; compiler diagnostics of any severity come back inside the
    /// output document and are not treated as failures here.
    pub async fn compile(
        &self,
        input: &SolcInput,
        root: &Path,
        include_paths: &[PathBuf],
        allow_paths: &BTreeSet<PathBuf>,
    ) -> Result<SolcOutput> {
        use tokio::io::AsyncWriteExt;

        let mut cmd = self.configure_cmd(root, include_paths, allow_paths);
        debug!(?cmd, "compiling");

        let mut child = cmd.spawn().map_err(|err| SolcError::io(err, &self.solc))?;
        let content = serde_json::to_vec(input)?;
        let mut stdin = child.stdin.take().expect("stdin is piped");
        stdin.write_all(&content).await.map_err(|err| SolcError::io(err, &self.solc))?;
        stdin.flush().await.map_err(|err| SolcError::io(err, &self.solc))?;
        drop(stdin);

        let output =
            child.wait_with_output().await.map_err(|err| SolcError::io(err, &self.solc))?;
        if !output.status.success() {
            return Err(SolcError::solc_output(&output));
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

impl AsRef<Path> for Solc {
    fn as_ref(&self) -> &Path {
        &self.solc
    }
}

fn version_from_output(output: std::process::Output) -> Result<Version> {
    if !output.status.success() {
        return Err(SolcError::solc_output(&output));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .last()
        .ok_or_else(|| SolcError::msg("version not found in solc output"))?;
    // `+` in the g++ build tag is not valid in a build string
    Version::from_str(&version.trim_start_matches("Version: ").replace(".g++", ".gcc"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[cfg(unix)]
    #[test]
    fn can_parse_version_output() {
        use std::os::unix::process::ExitStatusExt;
        let output = std::process::Output {
            status: std::process::ExitStatus::from_raw(0),
            stdout: b"solc, the solidity compiler commandline interface\nVersion: 0.8.13+commit.abee5f2e.Linux.g++\n".to_vec(),
            stderr: Vec::new(),
        };
        let version = version_from_output(output).unwrap();
        assert_eq!(version, Version::new(0, 8, 13));
        assert_eq!(version.build.as_deref(), Some("commit.abee5f2e.Linux.gcc"));
    }

    #[test]
    fn base_path_support_cutoff() {
        let old = Solc::new_with_version("solc", Version::new(0, 8, 7));
        let new = Solc::new_with_version("solc", Version::new(0, 8, 8));
        assert!(!old.supports_base_path());
        assert!(new.supports_base_path());
    }

    #[test]
    fn source_version_ranges_helper() {
        let ranges = Solc::source_version_ranges("pragma solidity ^0.8.0;\n").unwrap();
        assert!(ranges.contains(&Version::new(0, 8, 13)));
        assert!(!ranges.contains(&Version::new(0, 9, 0)));
    }
}
