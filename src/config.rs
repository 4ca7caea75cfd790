//! Project configuration: the filesystem layout and the solc settings a build consumes.

use crate::{
    artifacts::EvmVersion,
    error::{Result, SolcError},
    remappings::Remapping,
    utils,
    version::Version,
};
use serde::Deserialize;
use std::{
    collections::{BTreeSet, HashSet},
    fs,
    path::{Path, PathBuf},
};

/// The file name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "solbuild.toml";

/// Where to find all files and where to write the build artifacts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectPathsConfig {
    /// Project root
    pub root: PathBuf,
    /// Where the project's entry sources live, used when compiling the whole project
    pub sources: PathBuf,
    /// Where to store the build artifacts and the build manifest
    pub build: PathBuf,
    /// Additional roots searched when resolving a source unit name to a file, in order
    pub include_paths: Vec<PathBuf>,
    /// Additional roots the compiler is allowed to read from
    pub allow_paths: BTreeSet<PathBuf>,
    /// The configured import remappings, in declaration order
    pub remappings: Vec<Remapping>,
}

impl ProjectPathsConfig {
    pub fn builder() -> ProjectPathsConfigBuilder {
        ProjectPathsConfigBuilder::default()
    }

    /// Creates a config for the current directory.
    pub fn current() -> Result<Self> {
        Self::builder().build()
    }

    /// All roots searched when mapping a source unit name to a file, most specific use first:
    /// the project root, then every include path in order.
    pub fn search_roots(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.root).chain(self.include_paths.iter())
    }

    /// Returns the source unit name of a file provided as a command-line argument.
    ///
    /// The file is looked up in all search roots, the longest matching root wins and the
    /// remaining relative path, with forward slashes, is the source unit name.
    pub fn resolve_cmdline_arg(&self, file: &Path) -> Result<String> {
        let file = utils::canonicalize(file)?;
        self.search_roots()
            .filter_map(|root| file.strip_prefix(root).ok().map(|rel| (root, rel)))
            .max_by_key(|(root, _)| root.components().count())
            .map(|(_, rel)| utils::slash_path(rel))
            .ok_or_else(|| SolcError::SourceUnitNotInRoots(file.clone()))
    }

    /// Maps a source unit name back to the file it denotes.
    ///
    /// Tries `<root>/<name>` for every search root. Exactly one existing file must result,
    /// otherwise the import is unresolved or ambiguous and the configuration (remappings,
    /// include paths) needs to disambiguate.
    pub fn find_source_path(&self, source_unit_name: &str) -> Result<PathBuf> {
        let mut matching = Vec::new();
        for root in self.search_roots() {
            let candidate = root.join(source_unit_name);
            if candidate.is_file() {
                matching.push(candidate);
            }
        }

        match matching.len() {
            0 => Err(SolcError::UnresolvedImport(source_unit_name.to_string())),
            1 => Ok(matching.remove(0)),
            _ => Err(SolcError::AmbiguousImport {
                name: source_unit_name.to_string(),
                candidates: matching,
            }),
        }
    }

    /// Returns all solidity files under the configured sources directory.
    pub fn input_files(&self) -> Vec<PathBuf> {
        utils::sol_source_files(&self.sources)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ProjectPathsConfigBuilder {
    root: Option<PathBuf>,
    sources: Option<PathBuf>,
    build: Option<PathBuf>,
    include_paths: Vec<PathBuf>,
    allow_paths: BTreeSet<PathBuf>,
    remappings: Vec<Remapping>,
}

impl ProjectPathsConfigBuilder {
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(utils::canonicalized(root.into()));
        self
    }

    pub fn sources(mut self, sources: impl Into<PathBuf>) -> Self {
        self.sources = Some(utils::canonicalized(sources.into()));
        self
    }

    pub fn build_dir(mut self, build: impl Into<PathBuf>) -> Self {
        self.build = Some(build.into());
        self
    }

    pub fn include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_paths.push(utils::canonicalized(path.into()));
        self
    }

    pub fn include_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for path in paths {
            self = self.include_path(path);
        }
        self
    }

    pub fn allow_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.allow_paths.insert(utils::canonicalized(path.into()));
        self
    }

    pub fn allow_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for path in paths {
            self = self.allow_path(path);
        }
        self
    }

    pub fn remapping(mut self, remapping: Remapping) -> Self {
        self.remappings.push(remapping);
        self
    }

    pub fn remappings(mut self, remappings: impl IntoIterator<Item = Remapping>) -> Self {
        self.remappings.extend(remappings);
        self
    }

    pub fn build(self) -> Result<ProjectPathsConfig> {
        let root = match self.root {
            Some(root) => root,
            None => std::env::current_dir()
                .map_err(|err| SolcError::io(err, "."))
                .map(utils::canonicalized)?,
        };
        let node_modules = root.join("node_modules");
        let mut include_paths = self.include_paths;
        // npm packages resolve out of the box, same as solc's default lookup in hardhat setups
        if include_paths.is_empty() && node_modules.is_dir() {
            include_paths.push(node_modules);
        }
        Ok(ProjectPathsConfig {
            sources: self.sources.unwrap_or_else(|| root.join("contracts")),
            build: self.build.unwrap_or_else(|| root.join(".solbuild")),
            include_paths,
            allow_paths: self.allow_paths,
            remappings: self.remappings,
            root,
        })
    }
}

/// The `[compiler.solc]` section of the configuration file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolcConfig {
    pub allow_paths: Vec<PathBuf>,
    pub include_paths: Vec<PathBuf>,
    pub remappings: Vec<Remapping>,
    pub evm_version: Option<EvmVersion>,
    pub target_version: Option<Version>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    pub solc: SolcConfig,
}

/// The project configuration file, `solbuild.toml`.
///
/// A config file can pull in further config files via `subconfigs`; they are merged in order,
/// relative paths are taken relative to the including file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub subconfigs: Vec<PathBuf>,
    pub compiler: CompilerConfig,
}

impl ConfigFile {
    /// Loads the config file at `path` together with all its subconfigs.
    pub fn load(path: &Path) -> Result<Self> {
        let mut visited = HashSet::new();
        Self::load_inner(path, &mut visited)
    }

    fn load_inner(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<Self> {
        let canonical = utils::canonicalize(path)?;
        if !visited.insert(canonical.clone()) {
            return Err(SolcError::CyclicSubconfig(canonical));
        }
        trace!("loading config file \"{}\"", canonical.display());

        let content =
            fs::read_to_string(&canonical).map_err(|err| SolcError::io(err, &canonical))?;
        let mut config: Self = toml::from_str(&content)?;

        let base = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
        let subconfigs = std::mem::take(&mut config.subconfigs);
        for subconfig in subconfigs {
            let subconfig =
                if subconfig.is_absolute() { subconfig } else { base.join(subconfig) };
            let loaded = Self::load_inner(&subconfig, visited)?;
            config.merge(loaded);
        }
        Ok(config)
    }

    /// Merges a subconfig into this config: list options are appended, scalar options of the
    /// subconfig win when set.
    fn merge(&mut self, other: Self) {
        let solc = &mut self.compiler.solc;
        let other = other.compiler.solc;
        solc.allow_paths.extend(other.allow_paths);
        solc.include_paths.extend(other.include_paths);
        solc.remappings.extend(other.remappings);
        if other.evm_version.is_some() {
            solc.evm_version = other.evm_version;
        }
        if other.target_version.is_some() {
            solc.target_version = other.target_version;
        }
    }
}
