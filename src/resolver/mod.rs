//! Resolution of the entire import graph for a build.
//!
//! Starting from the entry files, every `import` is resolved to a canonical source unit name
//! (honoring remappings), the name is mapped back to a file via the configured search roots and
//! the file is pre-parsed in turn, until the transitive closure is complete.
//!
//! Some constraints we're working with here:
//!
//!   1. Each file can declare a version range it is compatible with via `pragma solidity`; the
//!      ranges of all files compiled together must have a non-empty intersection.
//!   2. An import can reach outside the project root through remappings and include paths, see
//!      [`crate::remappings::Remapping`].
//!   3. Cyclic imports are legal, so the graph is an arena of nodes addressed by index rather
//!      than an ownership tree.
//!
//! The graph is immutable once resolved; partitioning it into compilation units happens in
//! [`crate::units`].

use crate::{
    config::ProjectPathsConfig,
    error::{Result, SolcError},
    version::VersionRanges,
};
use rayon::prelude::*;
use std::{
    collections::{BTreeSet, HashMap, VecDeque},
    fmt::Write as _,
    path::{Path, PathBuf},
};

pub mod names;
pub mod parse;

use parse::{ContentHash, SolData};

/// A node in the import graph, a single source unit.
#[derive(Clone, Debug)]
pub struct SourceNode {
    /// canonical source unit name
    name: String,
    /// absolute path of the file
    path: PathBuf,
    /// intersected `pragma solidity` ranges, any version if no pragma is present
    versions: VersionRanges,
    /// BLAKE2b-256 hash of the file content
    hash: ContentHash,
    /// in-memory content overriding the file on disk, for unsaved editor buffers
    content: Option<String>,
    /// source unit names of imports that could not be resolved, empty on a clean build
    unresolved_imports: BTreeSet<String>,
}

impl SourceNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn versions(&self) -> &VersionRanges {
        &self.versions
    }

    pub fn content_hash(&self) -> &ContentHash {
        &self.hash
    }

    /// The in-memory override content, if any.
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn unresolved_imports(&self) -> &BTreeSet<String> {
        &self.unresolved_imports
    }
}

/// The resolved import graph.
///
/// An edge from `U` to `V` means "`V` imports `U`", so a node with no outgoing edges is a file
/// nothing imports, a sink. Nodes are stored in an arena and addressed by index.
#[derive(Debug)]
pub struct Graph {
    pub(crate) nodes: Vec<SourceNode>,
    /// source unit name to node index, for fast lookup
    pub(crate) indices: HashMap<String, usize>,
    /// `imports[i]` holds the nodes that node `i` imports
    pub(crate) imports: Vec<Vec<usize>>,
    /// `importers[i]` holds the nodes that import node `i`
    pub(crate) importers: Vec<Vec<usize>>,
}

impl Graph {
    /// Resolves the graph spanned by the given entry files.
    pub fn resolve(paths: &ProjectPathsConfig, files: &[PathBuf]) -> Result<Self> {
        Self::resolve_with_overrides(paths, files, &HashMap::new(), false)
    }

    /// Resolves the graph spanned by the given entry files, substituting in-memory contents for
    /// files present in `overrides`.
    ///
    /// With `ignore_errors` set, unresolvable and malformed imports are recorded on their
    /// importing node instead of failing the build; batch builds keep it unset.
    pub fn resolve_with_overrides(
        paths: &ProjectPathsConfig,
        files: &[PathBuf],
        overrides: &HashMap<PathBuf, String>,
        ignore_errors: bool,
    ) -> Result<Self> {
        // resolve a source unit name for every entry file, enforcing one name per path
        let mut paths_by_name: HashMap<String, PathBuf> = HashMap::new();
        let mut pending = Vec::new();
        for file in files {
            let file = match crate::utils::canonicalize(file) {
                Ok(file) => file,
                Err(_) if ignore_errors => continue,
                Err(err) => return Err(err.into()),
            };
            let name = paths.resolve_cmdline_arg(&file)?;
            if let Some(existing) = paths_by_name.get(&name) {
                if *existing != file {
                    return Err(SolcError::DuplicateSourceUnitName {
                        name,
                        first: existing.clone(),
                        second: file,
                    });
                }
                continue;
            }
            paths_by_name.insert(name.clone(), file.clone());
            let content = overrides.get(&file).cloned();
            pending.push((name, file, content));
        }

        // pre-parse all entries up front, the import closure is discovered from them
        let parsed: Vec<(String, PathBuf, Option<String>, SolData)> = pending
            .into_par_iter()
            .map(|(name, path, content)| {
                let data = match &content {
                    Some(content) => SolData::parse(content, ignore_errors)?,
                    None => SolData::read(&path, ignore_errors)?,
                };
                Ok((name, path, content, data))
            })
            .collect::<Result<_>>()?;

        let mut indices = HashMap::new();
        let mut queue = VecDeque::new();
        for entry in parsed {
            indices.insert(entry.0.clone(), indices.len());
            queue.push_back(entry);
        }

        let mut nodes: Vec<SourceNode> = Vec::with_capacity(queue.len());
        let mut imports: Vec<Vec<usize>> = Vec::with_capacity(queue.len());
        let mut importers: Vec<Vec<usize>> = vec![Vec::new(); queue.len()];

        while let Some((name, path, content, data)) = queue.pop_front() {
            let importer = nodes.len();
            debug_assert_eq!(indices[&name], importer);

            let mut resolved_imports = Vec::with_capacity(data.imports.len());
            let mut unresolved_imports = BTreeSet::new();

            for import in &data.imports {
                let import_name = names::resolve_import(&name, import, &paths.remappings);

                let imported = if let Some(idx) = indices.get(&import_name).copied() {
                    // already known, but the same name must not denote a second file
                    if let Ok(import_path) = paths
                        .find_source_path(&import_name)
                        .and_then(|p| crate::utils::canonicalize(&p).map_err(Into::into))
                    {
                        let known = &paths_by_name[&import_name];
                        if *known != import_path {
                            return Err(SolcError::DuplicateSourceUnitName {
                                name: import_name,
                                first: known.clone(),
                                second: import_path,
                            });
                        }
                    }
                    idx
                } else {
                    let import_path = match paths
                        .find_source_path(&import_name)
                        .and_then(|p| crate::utils::canonicalize(&p).map_err(Into::into))
                    {
                        Ok(path) => path,
                        Err(_err) if ignore_errors => {
                            trace!(
                                "failed to resolve import \"{}\" of \"{}\"",
                                import_name,
                                name
                            );
                            unresolved_imports.insert(import_name);
                            continue;
                        }
                        Err(err) => {
                            return Err(SolcError::FailedResolveImport(
                                name,
                                import.clone(),
                                Box::new(err),
                            ))
                        }
                    };

                    let content = overrides.get(&import_path).cloned();
                    let data = match &content {
                        Some(content) => SolData::parse(content, ignore_errors),
                        None => SolData::read(&import_path, ignore_errors),
                    }?;

                    let idx = indices.len();
                    indices.insert(import_name.clone(), idx);
                    paths_by_name.insert(import_name.clone(), import_path.clone());
                    importers.push(Vec::new());
                    queue.push_back((import_name, import_path, content, data));
                    idx
                };

                if !resolved_imports.contains(&imported) {
                    resolved_imports.push(imported);
                    importers[imported].push(importer);
                }
            }

            nodes.push(SourceNode {
                name,
                path,
                versions: data.versions,
                hash: data.hash,
                content,
                unresolved_imports,
            });
            imports.push(resolved_imports);
        }

        trace!("resolved graph with {} source units", nodes.len());
        Ok(Self { nodes, indices, imports, importers })
    }

    /// How many nodes the graph contains.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Gets a node by index.
    ///
    /// # Panics
    ///
    /// if the `index` node id is not included in the graph
    pub fn node(&self, index: usize) -> &SourceNode {
        &self.nodes[index]
    }

    /// Looks a node up by its source unit name.
    pub fn node_by_name(&self, name: &str) -> Option<&SourceNode> {
        self.indices.get(name).map(|idx| &self.nodes[*idx])
    }

    /// Returns an iterator over all nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &SourceNode> {
        self.nodes.iter()
    }

    /// Returns all the resolved source unit names and their index in the graph.
    pub fn files(&self) -> &HashMap<String, usize> {
        &self.indices
    }

    /// Returns the indices of the nodes the given node imports.
    pub fn imported_nodes(&self, from: usize) -> &[usize] {
        &self.imports[from]
    }

    /// Returns the indices of the nodes importing the given node.
    pub fn importing_nodes(&self, of: usize) -> &[usize] {
        &self.importers[of]
    }

    /// All imports that could not be resolved, as `(importer name, import name)` pairs.
    pub fn unresolved_imports(&self) -> impl Iterator<Item = (&str, &str)> {
        self.nodes.iter().flat_map(|node| {
            node.unresolved_imports.iter().map(move |import| (node.name(), import.as_str()))
        })
    }

    /// Writes `path (pragma)` lines for the given members, used in incompatibility errors.
    pub(crate) fn format_files_list(&self, members: impl IntoIterator<Item = usize>) -> String {
        let mut out = String::new();
        for idx in members {
            let node = &self.nodes[idx];
            let _ = writeln!(out, "{} ({})", node.path.display(), node.versions);
        }
        out.pop();
        out
    }
}
