//! The persistent build manifest and artifact reuse.
//!
//! The manifest `build.json` at the root of the project build directory is the sole authority
//! when deciding whether a compilation unit's prior outputs can be reused: the unit hash, the
//! sorted source unit names, the include and allow paths and the compiler settings all have to
//! match, nothing else (in particular no file modification times) is consulted. Artifacts that
//! are missing on disk or fail to deserialize silently disqualify their unit, forcing a
//! recompile of that unit only.

use crate::{
    artifacts::{Contract, Error, Settings, SolcOutput, SourceFile},
    error::{Result, SolcError},
    utils,
    version::Version,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

/// The file name of the build manifest.
pub const MANIFEST_FILE: &str = "build.json";

/// The staging directory new artifacts are written to before promotion.
pub const TMP_DIR: &str = "tmp";

/// The persisted record of one compilation unit of the latest build.
///
/// All artifact paths are relative to the directory `build.json` lives in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitBuildInfo {
    /// the unit's directory, relative to the build dir
    pub build_dir: String,
    /// source unit name -> relative path of the serialized AST
    pub sources: BTreeMap<String, PathBuf>,
    /// source unit name -> contract name -> relative path of the serialized contract info
    pub contracts: BTreeMap<String, BTreeMap<String, PathBuf>>,
    /// the diagnostics the compiler reported for this unit
    pub errors: Vec<Error>,
    /// the unit's source unit names, ascending
    pub source_units: Vec<String>,
    /// the allow paths the unit was compiled with, ascending
    pub allow_paths: Vec<PathBuf>,
    /// the include paths the unit was compiled with, ascending
    pub include_paths: Vec<PathBuf>,
    /// the effective compiler settings
    pub settings: Settings,
    /// the exact compiler version the unit was compiled with
    pub compiler_version: Version,
}

impl UnitBuildInfo {
    /// Whether this entry describes the same inputs as the given unit descriptor.
    pub fn matches(
        &self,
        source_units: &[String],
        allow_paths: &[PathBuf],
        include_paths: &[PathBuf],
        settings: &Settings,
    ) -> bool {
        self.source_units == source_units
            && self.allow_paths == allow_paths
            && self.include_paths == include_paths
            && &self.settings == settings
    }

    /// Loads the unit's prior output from disk.
    ///
    /// Returns `None` when any referenced artifact is missing or undeserializable; the caller
    /// falls back to recompiling the unit.
    pub fn load_output(&self, build_dir: &Path) -> Option<SolcOutput> {
        let mut sources = BTreeMap::new();
        for (name, rel) in &self.sources {
            let source: SourceFile = match utils::read_json_file(&build_dir.join(rel)) {
                Ok(source) => source,
                Err(err) => {
                    warn!("failed to load cached artifact \"{}\": {err}", rel.display());
                    return None;
                }
            };
            sources.insert(name.clone(), source);
        }

        let mut contracts: BTreeMap<String, BTreeMap<String, Contract>> = BTreeMap::new();
        for (name, unit_contracts) in &self.contracts {
            let entry = contracts.entry(name.clone()).or_default();
            for (contract, rel) in unit_contracts {
                let contract_info: Contract = match utils::read_json_file(&build_dir.join(rel)) {
                    Ok(contract) => contract,
                    Err(err) => {
                        warn!("failed to load cached artifact \"{}\": {err}", rel.display());
                        return None;
                    }
                };
                entry.insert(contract.clone(), contract_info);
            }
        }

        Some(SolcOutput { errors: self.errors.clone(), sources, contracts })
    }
}

/// The build manifest, keyed by hex-encoded compilation unit hash.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub compilation_units: BTreeMap<String, UnitBuildInfo>,
}

impl BuildManifest {
    /// Reads the manifest of the given build directory.
    pub fn read(build_dir: &Path) -> Result<Self> {
        utils::read_json_file(&build_dir.join(MANIFEST_FILE))
    }

    /// Writes the manifest into the given build directory.
    pub fn write(&self, build_dir: &Path) -> Result<()> {
        let path = build_dir.join(MANIFEST_FILE);
        utils::create_parent_dir_all(&path)?;
        utils::write_json_file(self, &path, 64 * 1024)
    }

    /// Returns the entry for the given unit if the recorded inputs match exactly.
    pub fn matching_unit(
        &self,
        unit_hash: &str,
        source_units: &[String],
        allow_paths: &[PathBuf],
        include_paths: &[PathBuf],
        settings: &Settings,
    ) -> Option<&UnitBuildInfo> {
        let entry = self.compilation_units.get(unit_hash)?;
        if entry.matches(source_units, allow_paths, include_paths, settings) {
            Some(entry)
        } else {
            debug!("build settings changed for unit {unit_hash}, recompiling");
            None
        }
    }
}

/// Returns the sorted allow paths the manifest stores for comparison.
pub(crate) fn sorted_paths(paths: &BTreeSet<PathBuf>) -> Vec<PathBuf> {
    paths.iter().cloned().collect()
}

/// Promotes a finished build: removes the artifacts of the previous build and moves everything
/// under `tmp/` one level up.
///
/// Staged artifacts never leak into the visible build directory unless the whole build
/// succeeded, and old artifact directories that are not part of the new build disappear.
pub(crate) fn promote_build_dir(build_dir: &Path) -> Result<()> {
    let tmp = build_dir.join(TMP_DIR);
    if !tmp.is_dir() {
        return Err(SolcError::msg("no staged build artifacts to promote"));
    }

    for entry in std::fs::read_dir(build_dir).map_err(|err| SolcError::io(err, build_dir))? {
        let entry = entry.map_err(|err| SolcError::io(err, build_dir))?;
        let path = entry.path();
        let name = entry.file_name();
        if name == TMP_DIR || name == MANIFEST_FILE {
            continue;
        }
        if path.is_dir() {
            std::fs::remove_dir_all(&path).map_err(|err| SolcError::io(err, &path))?;
        } else {
            std::fs::remove_file(&path).map_err(|err| SolcError::io(err, &path))?;
        }
    }

    for entry in std::fs::read_dir(&tmp).map_err(|err| SolcError::io(err, &tmp))? {
        let entry = entry.map_err(|err| SolcError::io(err, &tmp))?;
        let from = entry.path();
        let to = build_dir.join(entry.file_name());
        std::fs::rename(&from, &to).map_err(|err| SolcError::io(err, &from))?;
    }
    std::fs::remove_dir(&tmp).map_err(|err| SolcError::io(err, &tmp))?;
    Ok(())
}

/// Discards staged artifacts of a failed build.
pub(crate) fn discard_staged(build_dir: &Path) {
    let tmp = build_dir.join(TMP_DIR);
    if tmp.is_dir() {
        if let Err(err) = std::fs::remove_dir_all(&tmp) {
            warn!("failed to discard staged artifacts: {err}");
        }
    }
}
