#![doc = include_str!("../README.md")]
#![warn(rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

pub mod error;

pub mod artifacts;
pub use artifacts::{EvmVersion, OutputKind, SolcInput, SolcOutput};

pub mod cache;
pub use cache::BuildManifest;

mod compile;
pub use compile::{
    project::{ProjectCompileOutput, ProjectCompiler},
    Solc, BASE_PATH_SOLC, SOLC,
};

mod config;
pub use config::{
    CompilerConfig, ConfigFile, ProjectPathsConfig, ProjectPathsConfigBuilder, SolcConfig,
    CONFIG_FILE_NAME,
};

pub mod remappings;
pub use remappings::Remapping;

pub mod resolver;
pub use resolver::Graph;

pub mod svm;
pub use svm::SolcVersionManager;

pub mod units;
pub use units::CompilationUnit;

pub mod utils;

pub mod version;
pub use version::{Version, VersionExpr, VersionRange, VersionRanges};

use error::Result;
use std::{collections::HashMap, path::PathBuf};

/// Represents a solidity project and drives `solc` builds of its contracts.
#[derive(Clone, Debug)]
pub struct Project {
    /// The layout of the project
    pub paths: ProjectPathsConfig,
    /// The EVM version to compile for, compiler default when unset
    pub evm_version: Option<EvmVersion>,
    /// A compiler version every unit is forced to use; it must satisfy each unit's pragmas
    pub target_version: Option<Version>,
    /// Which outputs to request from the compiler
    pub output_kinds: Vec<OutputKind>,
    /// Whether unchanged units reuse the artifacts of the previous build
    pub cached: bool,
    /// Partition into as many compilation units as possible instead of as few as possible
    pub maximize_units: bool,
    /// Offline mode, if set, network access (catalog fetch, compiler download) is disallowed
    pub offline: bool,
    /// Maximum number of `solc` processes to run simultaneously.
    solc_jobs: usize,
}

impl Project {
    /// Convenience function to call `ProjectBuilder::default()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use solbuild::Project;
    ///
    /// let project = Project::builder().build()?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn builder() -> ProjectBuilder {
        ProjectBuilder::default()
    }

    /// Creates a project for the given root, honoring a `solbuild.toml` config file when
    /// present.
    pub fn from_config(root: impl Into<PathBuf>) -> Result<Self> {
        let root = utils::canonicalized(root.into());
        let config_path = root.join(CONFIG_FILE_NAME);
        let config = if config_path.is_file() {
            ConfigFile::load(&config_path)?
        } else {
            ConfigFile::default()
        };
        let solc = config.compiler.solc;

        let paths = ProjectPathsConfig::builder()
            .root(&root)
            .include_paths(solc.include_paths)
            .allow_paths(solc.allow_paths)
            .remappings(solc.remappings)
            .build()?;

        Ok(Project {
            paths,
            evm_version: solc.evm_version,
            target_version: solc.target_version,
            ..ProjectBuilder::default().build()?
        })
    }

    /// Returns the root directory of the project.
    pub fn root(&self) -> &PathBuf {
        &self.paths.root
    }

    /// Returns the directory build artifacts and the manifest are written to.
    pub fn build_dir(&self) -> &PathBuf {
        &self.paths.build
    }

    /// Maximum number of `solc` processes running at the same time.
    pub fn solc_jobs(&self) -> usize {
        self.solc_jobs
    }

    /// Sets the maximum number of parallel `solc` processes.
    ///
    /// # Panics
    ///
    /// if `jobs == 0`
    pub fn set_solc_jobs(&mut self, jobs: usize) {
        assert!(jobs > 0);
        self.solc_jobs = jobs;
    }

    /// Compiles all sources found under the project's sources directory.
    pub async fn compile(&self) -> Result<ProjectCompileOutput> {
        self.compile_files(&self.paths.input_files()).await
    }

    /// Compiles the given entry files and everything they import.
    pub async fn compile_files(&self, files: &[PathBuf]) -> Result<ProjectCompileOutput> {
        ProjectCompiler::new(self, files)?.compile().await
    }

    /// Compiles the given entry files with in-memory contents substituted for files present in
    /// `overrides`, as an editor integration does for unsaved buffers.
    ///
    /// `ignore_errors` additionally makes graph construction tolerant of malformed sources and
    /// unresolvable imports. Batch builds should keep it unset.
    pub async fn compile_with(
        &self,
        files: &[PathBuf],
        overrides: &HashMap<PathBuf, String>,
        ignore_errors: bool,
    ) -> Result<ProjectCompileOutput> {
        ProjectCompiler::with_overrides(self, files, overrides, ignore_errors)?.compile().await
    }
}

/// Builder for a [`Project`].
#[derive(Clone, Debug)]
pub struct ProjectBuilder {
    paths: Option<ProjectPathsConfig>,
    evm_version: Option<EvmVersion>,
    target_version: Option<Version>,
    output_kinds: Vec<OutputKind>,
    cached: bool,
    maximize_units: bool,
    offline: bool,
    solc_jobs: Option<usize>,
}

impl Default for ProjectBuilder {
    fn default() -> Self {
        Self {
            paths: None,
            evm_version: None,
            target_version: None,
            output_kinds: vec![OutputKind::All],
            cached: true,
            maximize_units: false,
            offline: false,
            solc_jobs: None,
        }
    }
}

impl ProjectBuilder {
    #[must_use]
    pub fn paths(mut self, paths: ProjectPathsConfig) -> Self {
        self.paths = Some(paths);
        self
    }

    #[must_use]
    pub fn evm_version(mut self, version: EvmVersion) -> Self {
        self.evm_version = Some(version);
        self
    }

    /// Locks all units to the given compiler version.
    #[must_use]
    pub fn target_version(mut self, version: Version) -> Self {
        self.target_version = Some(version);
        self
    }

    #[must_use]
    pub fn output_kinds(mut self, kinds: impl IntoIterator<Item = OutputKind>) -> Self {
        self.output_kinds = kinds.into_iter().collect();
        self
    }

    /// Disables artifact reuse, every build compiles from scratch.
    #[must_use]
    pub fn ephemeral(self) -> Self {
        self.set_cached(false)
    }

    /// Sets the cache status
    #[must_use]
    pub fn set_cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    /// Partition into as many compilation units as possible, duplicating shared sources where
    /// needed. This can compile projects whose connected pragmas have no common version.
    #[must_use]
    pub fn maximize_units(mut self, maximize: bool) -> Self {
        self.maximize_units = maximize;
        self
    }

    /// Activates offline mode
    ///
    /// Prevents possible network access to download or check compiler binaries
    #[must_use]
    pub fn offline(self) -> Self {
        self.set_offline(true)
    }

    /// Sets the offline status
    #[must_use]
    pub fn set_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Sets the maximum number of parallel `solc` processes to run simultaneously.
    ///
    /// # Panics
    ///
    /// `jobs` must be at least 1
    #[must_use]
    pub fn solc_jobs(mut self, jobs: usize) -> Self {
        assert!(jobs > 0);
        self.solc_jobs = Some(jobs);
        self
    }

    pub fn build(self) -> Result<Project> {
        let Self {
            paths,
            evm_version,
            target_version,
            output_kinds,
            cached,
            maximize_units,
            offline,
            solc_jobs,
        } = self;

        let paths = paths.map(Ok).unwrap_or_else(ProjectPathsConfig::current)?;

        Ok(Project {
            paths,
            evm_version,
            target_version,
            output_kinds,
            cached,
            maximize_units,
            offline,
            solc_jobs: solc_jobs.unwrap_or_else(num_cpus::get),
        })
    }
}
