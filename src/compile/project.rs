//! Manages compiling of a [`Project`].
//!
//! The compilation of a project is performed in several steps:
//!
//! 1. The import graph of the entry files is resolved, see [`crate::resolver::Graph`].
//! 2. The graph is partitioned into version-consistent compilation units, see [`crate::units`],
//!    and units are put into ascending order of their hash so consumers see a deterministic
//!    result.
//! 3. For each unit an exact compiler version is chosen: the configured target version if set
//!    (which must lie within the unit's ranges), otherwise the greatest known release the unit
//!    allows. Missing binaries are installed up front, see [`crate::svm`].
//! 4. Units whose recorded inputs in the previous build manifest are unchanged reuse their
//!    prior artifacts; everything else is compiled, several units at a time.
//! 5. Fresh artifacts are staged under `tmp/` inside the build directory and only promoted,
//!    together with a new manifest, once every unit has succeeded. A failed or cancelled build
//!    leaves the previous artifacts untouched.

use crate::{
    artifacts::{Error, Settings, SolcInput, SolcOutput},
    cache::{self, BuildManifest, UnitBuildInfo},
    error::{Result, SolcError},
    resolver::Graph,
    svm::SolcVersionManager,
    units::CompilationUnit,
    utils, Project, Solc,
};
use futures_util::{stream, StreamExt, TryStreamExt};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    path::{Path, PathBuf},
};

/// Drives the compilation of a set of entry files within a project.
#[derive(Debug)]
pub struct ProjectCompiler<'a> {
    project: &'a Project,
    graph: Graph,
}

impl<'a> ProjectCompiler<'a> {
    /// Bootstraps the compilation by resolving the import graph of the given entry files.
    pub fn new(project: &'a Project, files: &[PathBuf]) -> Result<Self> {
        Self::with_overrides(project, files, &HashMap::new(), false)
    }

    /// Same as [`Self::new`] with in-memory contents substituted for the given files.
    ///
    /// `ignore_errors` makes graph construction tolerant of malformed and unresolvable
    /// imports; batch builds keep it unset.
    pub fn with_overrides(
        project: &'a Project,
        files: &[PathBuf],
        overrides: &HashMap<PathBuf, String>,
        ignore_errors: bool,
    ) -> Result<Self> {
        if files.is_empty() && overrides.is_empty() {
            return Err(SolcError::msg("no source files provided to compile"));
        }
        let graph =
            Graph::resolve_with_overrides(&project.paths, files, overrides, ignore_errors)?;
        Ok(Self { project, graph })
    }

    /// Compiles all units of the graph and persists the build.
    pub async fn compile(self) -> Result<ProjectCompileOutput> {
        let Self { project, graph } = self;
        let build_dir = project.paths.build.clone();

        let units = if project.maximize_units {
            graph.compilation_units_maximize()?
        } else {
            graph.compilation_units_minimize()?
        };
        if units.is_empty() {
            return Ok(ProjectCompileOutput { compiled: Vec::new() });
        }

        let settings = Settings::new(
            project.paths.remappings.clone(),
            project.evm_version,
            &project.output_kinds,
        );
        let allow_paths = cache::sorted_paths(&project.paths.allow_paths);
        let mut sorted_include_paths = project.paths.include_paths.clone();
        sorted_include_paths.sort();

        let prior = if project.cached {
            match BuildManifest::read(&build_dir) {
                Ok(manifest) => Some(manifest),
                Err(err) => {
                    debug!("no reusable build manifest: {err}");
                    None
                }
            }
        } else {
            None
        };

        let solcs = plan_versions(project, &units).await?;

        std::fs::create_dir_all(&build_dir).map_err(|err| SolcError::io(err, &build_dir))?;
        // leftovers of a cancelled build
        cache::discard_staged(&build_dir);

        let results: std::result::Result<Vec<(usize, SolcOutput)>, SolcError> =
            stream::iter(units.iter().zip(solcs.iter()).enumerate().map(
                |(idx, (unit, solc))| {
                    let settings = &settings;
                    let allow_paths = &allow_paths;
                    let sorted_include_paths = &sorted_include_paths;
                    let prior = prior.as_ref();
                    let build_dir = &build_dir;
                    async move {
                        let output = compile_unit(
                            project,
                            unit,
                            solc,
                            settings,
                            prior,
                            allow_paths,
                            sorted_include_paths,
                            build_dir,
                        )
                        .await?;
                        stage_artifacts(&output, &build_dir.join(cache::TMP_DIR).join(unit.hash_hex()))
                            .await?;
                        Ok::<_, SolcError>((idx, output))
                    }
                },
            ))
            .buffer_unordered(project.solc_jobs())
            .try_collect()
            .await;

        let results = match results {
            Ok(results) => results,
            Err(err) => {
                // sibling tasks are dropped at this point, nothing half-done survives
                cache::discard_staged(&build_dir);
                return Err(err);
            }
        };

        let mut outputs: Vec<Option<SolcOutput>> = vec![None; units.len()];
        for (idx, output) in results {
            outputs[idx] = Some(output);
        }
        let compiled: Vec<(CompilationUnit, SolcOutput)> = units
            .into_iter()
            .zip(outputs.into_iter().map(|out| out.expect("every unit completed")))
            .collect();

        cache::promote_build_dir(&build_dir)?;
        let manifest = build_manifest(
            &compiled,
            &solcs,
            &settings,
            &allow_paths,
            &sorted_include_paths,
        );
        manifest.write(&build_dir)?;
        trace!("wrote build manifest with {} units", manifest.compilation_units.len());

        Ok(ProjectCompileOutput { compiled })
    }
}

/// Chooses an exact compiler version for every unit and makes sure its binary is available.
async fn plan_versions(project: &Project, units: &[CompilationUnit]) -> Result<Vec<Solc>> {
    let svm = SolcVersionManager::new()?;
    let known = if project.offline { svm.installed() } else { svm.list_all().await? };

    let mut solcs = Vec::with_capacity(units.len());
    for unit in units {
        let version = match &project.target_version {
            Some(target) => {
                if !unit.versions().contains(target) {
                    return Err(SolcError::IncompatibleTargetVersion {
                        version: target.clone(),
                        files: unit_files(unit),
                    });
                }
                target.clone()
            }
            // the greatest known version the unit allows
            None => known
                .iter()
                .rev()
                .find(|version| unit.versions().contains(version))
                .cloned()
                .ok_or_else(|| SolcError::NoCompatibleCompilerVersion(unit_files(unit)))?,
        };

        let path = if project.offline {
            svm.installed_path(&version).ok_or_else(|| {
                SolcError::msg(format!("missing solc `{version}` installation in offline mode"))
            })?
        } else {
            svm.ensure_installed(&version).await?
        };
        trace!("unit {} compiles with solc {version}", unit.hash_hex());
        solcs.push(Solc::new_with_version(path, version));
    }
    Ok(solcs)
}

fn unit_files(unit: &CompilationUnit) -> String {
    let mut files: Vec<String> =
        unit.sources().values().map(|src| src.path.display().to_string()).collect();
    files.sort();
    files.join("\n")
}

#[allow(clippy::too_many_arguments)]
async fn compile_unit(
    project: &Project,
    unit: &CompilationUnit,
    solc: &Solc,
    settings: &Settings,
    prior: Option<&BuildManifest>,
    allow_paths: &[PathBuf],
    sorted_include_paths: &[PathBuf],
    build_dir: &Path,
) -> Result<SolcOutput> {
    let hash = unit.hash_hex();

    // pure-data reuse decision: unit hash, names, paths and settings, nothing else
    if let Some(info) = prior.and_then(|manifest| {
        manifest.matching_unit(
            &hash,
            &unit.source_unit_names(),
            allow_paths,
            sorted_include_paths,
            settings,
        )
    }) {
        if let Some(output) = info.load_output(build_dir) {
            debug!("reusing prior artifacts for unit {hash}");
            return Ok(output);
        }
        debug!("prior artifacts for unit {hash} unusable, recompiling");
    }

    compile_unit_raw(project, unit, solc, settings).await
}

/// Invokes the compiler for one unit, bypassing any reuse.
async fn compile_unit_raw(
    project: &Project,
    unit: &CompilationUnit,
    solc: &Solc,
    settings: &Settings,
) -> Result<SolcOutput> {
    use crate::artifacts::InputSource;

    let mut sources = BTreeMap::new();
    for (name, source) in unit.sources() {
        let input = match &source.content {
            // in-memory overrides are inlined
            Some(content) => InputSource::content(content.clone()),
            None if solc.supports_base_path() => {
                // the compiler resolves the source unit name through base/include paths
                InputSource::url(name.clone())
            }
            // older compilers only understand real paths
            None => InputSource::url(source.path.display().to_string()),
        };
        sources.insert(name.clone(), input);
    }

    let input = SolcInput::new(sources, settings.clone());
    solc.compile(
        &input,
        &project.paths.root,
        &project.paths.include_paths,
        &project.paths.allow_paths,
    )
    .await
}

/// Writes one unit's artifacts into its staging directory.
///
/// The AST of every source unit goes to `asts/<sanitized name>.json`, every contract to
/// `contracts/<name>.json`. Contract names cannot contain slashes, so only the source unit
/// names need rewriting.
async fn stage_artifacts(output: &SolcOutput, unit_dir: &Path) -> Result<()> {
    let ast_dir = unit_dir.join("asts");
    tokio::fs::create_dir_all(&ast_dir).await.map_err(|err| SolcError::io(err, &ast_dir))?;
    for (name, source) in &output.sources {
        let file = ast_dir.join(format!("{}.json", utils::sanitize_filename(name)));
        if file.is_file() {
            return Err(SolcError::msg(format!(
                "cannot write build artifact `{}`, the file already exists",
                file.display()
            )));
        }
        let json = serde_json::to_vec(source)?;
        tokio::fs::write(&file, json).await.map_err(|err| SolcError::io(err, &file))?;
    }

    let contracts_dir = unit_dir.join("contracts");
    tokio::fs::create_dir_all(&contracts_dir)
        .await
        .map_err(|err| SolcError::io(err, &contracts_dir))?;
    for contracts in output.contracts.values() {
        for (contract, info) in contracts {
            let file = contracts_dir.join(format!("{contract}.json"));
            let json = serde_json::to_vec(info)?;
            tokio::fs::write(&file, json).await.map_err(|err| SolcError::io(err, &file))?;
        }
    }
    Ok(())
}

fn build_manifest(
    compiled: &[(CompilationUnit, SolcOutput)],
    solcs: &[Solc],
    settings: &Settings,
    allow_paths: &[PathBuf],
    sorted_include_paths: &[PathBuf],
) -> BuildManifest {
    let mut compilation_units = BTreeMap::new();
    for ((unit, output), solc) in compiled.iter().zip(solcs) {
        let hash = unit.hash_hex();

        let sources = output
            .sources
            .keys()
            .map(|name| {
                let rel = PathBuf::from(&hash)
                    .join("asts")
                    .join(format!("{}.json", utils::sanitize_filename(name)));
                (name.clone(), rel)
            })
            .collect();

        let contracts = output
            .contracts
            .iter()
            .map(|(name, contracts)| {
                let per_contract = contracts
                    .keys()
                    .map(|contract| {
                        let rel =
                            PathBuf::from(&hash).join("contracts").join(format!("{contract}.json"));
                        (contract.clone(), rel)
                    })
                    .collect();
                (name.clone(), per_contract)
            })
            .collect();

        compilation_units.insert(
            hash.clone(),
            UnitBuildInfo {
                build_dir: hash,
                sources,
                contracts,
                errors: output.errors.clone(),
                source_units: unit.source_unit_names(),
                allow_paths: allow_paths.to_vec(),
                include_paths: sorted_include_paths.to_vec(),
                settings: settings.clone(),
                compiler_version: solc.version.clone(),
            },
        );
    }
    BuildManifest { compilation_units }
}

/// The result of a project compilation, one output per compilation unit, in ascending order of
/// the unit hashes.
#[derive(Clone, Debug)]
pub struct ProjectCompileOutput {
    compiled: Vec<(CompilationUnit, SolcOutput)>,
}

impl ProjectCompileOutput {
    /// All `(unit, output)` pairs of this build.
    pub fn outputs(&self) -> &[(CompilationUnit, SolcOutput)] {
        &self.compiled
    }

    pub fn into_outputs(self) -> Vec<(CompilationUnit, SolcOutput)> {
        self.compiled
    }

    /// All diagnostics the compiler reported across units.
    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        self.compiled.iter().flat_map(|(_, output)| output.errors.iter())
    }

    /// Whether any unit produced a diagnostic of severity `error`.
    ///
    /// Such units still appear in the output; they did not stop other units from compiling.
    pub fn has_compiler_errors(&self) -> bool {
        self.compiled.iter().any(|(_, output)| output.has_error())
    }
}

impl fmt::Display for ProjectCompileOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_compiler_errors() {
            return f.write_str("compilation succeeded");
        }
        for err in self.errors() {
            writeln!(f, "{err}")?;
        }
        Ok(())
    }
}
