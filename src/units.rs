//! Partitioning of the import graph into version-consistent compilation units.
//!
//! Two policies exist. The default merges every weakly connected component into one unit, which
//! compiles every file exactly once but can fail on components whose pragmas have no common
//! version. The maximizing policy instead derives one unit per sink (a file nothing imports)
//! spanning all of its transitive imports, which tolerates per-file version splits at the cost
//! of compiling shared files more than once.

use crate::{
    error::{Result, SolcError},
    resolver::{parse::ContentHash, Graph},
    version::VersionRanges,
};
use std::{
    collections::{BTreeMap, HashSet, VecDeque},
    path::PathBuf,
};

/// A member of a [CompilationUnit].
#[derive(Clone, Debug)]
pub struct UnitSource {
    /// absolute path of the file
    pub path: PathBuf,
    /// in-memory content overriding the file on disk
    pub content: Option<String>,
}

/// A closed set of source units compiled together in one compiler invocation, together with the
/// intersection of their version ranges.
///
/// The unit's identity is the XOR of its members' content hashes, which makes it independent of
/// member order and cheap to compare against a previous build.
#[derive(Clone, Debug)]
pub struct CompilationUnit {
    /// all sources of this unit, by source unit name
    sources: BTreeMap<String, UnitSource>,
    versions: VersionRanges,
    hash: ContentHash,
}

impl CompilationUnit {
    fn from_members(graph: &Graph, members: &[usize]) -> Result<Self> {
        let mut sources = BTreeMap::new();
        let mut versions = VersionRanges::any();
        let mut hash: ContentHash = [0; 32];

        for &idx in members {
            let node = graph.node(idx);
            versions = &versions & node.versions();
            for (acc, byte) in hash.iter_mut().zip(node.content_hash()) {
                *acc ^= byte;
            }
            sources.insert(
                node.name().to_string(),
                UnitSource {
                    path: node.path().to_path_buf(),
                    content: node.content().map(str::to_string),
                },
            );
        }

        if versions.is_empty() {
            return Err(SolcError::msg(format!(
                "discovered incompatible solidity versions in the following sources:\n{}",
                graph.format_files_list(members.iter().copied())
            )));
        }
        Ok(Self { sources, versions, hash })
    }

    /// All sources of this unit keyed by source unit name.
    pub fn sources(&self) -> &BTreeMap<String, UnitSource> {
        &self.sources
    }

    /// The source unit names of the members, in ascending order.
    pub fn source_unit_names(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    /// The intersection of all members' version ranges, guaranteed non-empty.
    pub fn versions(&self) -> &VersionRanges {
        &self.versions
    }

    /// The XOR of all members' content hashes.
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// The unit hash in hex, as used to key the build manifest.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Graph {
    /// Partitions the graph so that every file ends up in exactly one compilation unit.
    ///
    /// Every weakly connected component becomes one unit. In rare cases a component has no
    /// common compiler version even though each import edge on its own would be satisfiable,
    /// for example:
    /// - `Lib.sol` requires `0.5.*`
    /// - `A.sol` requires `=0.5.0` and imports `Lib.sol`
    /// - `B.sol` requires `=0.5.1` and imports `Lib.sol`
    ///
    /// Those components fail here; the maximizing policy can compile them.
    pub fn compilation_units_minimize(&self) -> Result<Vec<CompilationUnit>> {
        let mut visited = vec![false; self.len()];
        let mut units = Vec::new();

        for start in 0..self.len() {
            if visited[start] {
                continue;
            }
            // collect the weakly connected component of `start`
            let mut members = Vec::new();
            let mut queue = VecDeque::from([start]);
            visited[start] = true;
            while let Some(node) = queue.pop_front() {
                members.push(node);
                let neighbours =
                    self.imported_nodes(node).iter().chain(self.importing_nodes(node));
                for &next in neighbours {
                    if !visited[next] {
                        visited[next] = true;
                        queue.push_back(next);
                    }
                }
            }
            units.push(CompilationUnit::from_members(self, &members)?);
        }

        units.sort_by(|a, b| a.hash.cmp(&b.hash));
        Ok(units)
    }

    /// Partitions the graph into as many compilation units as possible.
    ///
    /// Every sink spans one unit covering it and all of its transitive imports. Cyclic import
    /// groups that nothing outside the group imports act as sinks as well. A file imported from
    /// multiple units is a member of each of them.
    pub fn compilation_units_maximize(&self) -> Result<Vec<CompilationUnit>> {
        let mut units = Vec::new();

        for sink in (0..self.len()).filter(|&idx| self.importing_nodes(idx).is_empty()) {
            units.push(CompilationUnit::from_members(self, &self.closure_of(&[sink]))?);
        }

        // terminal cycles have no sink, every member is imported from within the group
        for scc in self.cyclic_components() {
            let scc_set: HashSet<usize> = scc.iter().copied().collect();
            let terminal = scc
                .iter()
                .all(|&idx| self.importing_nodes(idx).iter().all(|i| scc_set.contains(i)));
            if terminal {
                units.push(CompilationUnit::from_members(self, &self.closure_of(&scc))?);
            }
        }

        units.sort_by(|a, b| a.hash.cmp(&b.hash));
        Ok(units)
    }

    /// Returns the given nodes together with all their transitive imports.
    fn closure_of(&self, start: &[usize]) -> Vec<usize> {
        let mut members = Vec::new();
        let mut seen: HashSet<usize> = start.iter().copied().collect();
        let mut queue: VecDeque<usize> = start.iter().copied().collect();
        while let Some(node) = queue.pop_front() {
            members.push(node);
            for &import in self.imported_nodes(node) {
                if seen.insert(import) {
                    queue.push_back(import);
                }
            }
        }
        members
    }

    /// Returns all strongly connected components that contain a cycle, i.e. more than one node
    /// or a self-import.
    fn cyclic_components(&self) -> Vec<Vec<usize>> {
        // iterative Tarjan, the graph can be deep enough that recursion is not an option
        struct State {
            index: usize,
            lowlink: Vec<usize>,
            number: Vec<usize>,
            on_stack: Vec<bool>,
            stack: Vec<usize>,
            components: Vec<Vec<usize>>,
        }
        const UNVISITED: usize = usize::MAX;

        let mut st = State {
            index: 0,
            lowlink: vec![UNVISITED; self.len()],
            number: vec![UNVISITED; self.len()],
            on_stack: vec![false; self.len()],
            stack: Vec::new(),
            components: Vec::new(),
        };

        for root in 0..self.len() {
            if st.number[root] != UNVISITED {
                continue;
            }
            // frame: (node, next child position)
            let mut frames = vec![(root, 0usize)];
            while let Some(&mut (node, ref mut child)) = frames.last_mut() {
                if *child == 0 {
                    st.number[node] = st.index;
                    st.lowlink[node] = st.index;
                    st.index += 1;
                    st.stack.push(node);
                    st.on_stack[node] = true;
                }
                if let Some(&next) = self.imported_nodes(node).get(*child) {
                    *child += 1;
                    if st.number[next] == UNVISITED {
                        frames.push((next, 0));
                    } else if st.on_stack[next] {
                        st.lowlink[node] = st.lowlink[node].min(st.number[next]);
                    }
                } else {
                    if st.lowlink[node] == st.number[node] {
                        let mut component = Vec::new();
                        loop {
                            let popped = st.stack.pop().unwrap();
                            st.on_stack[popped] = false;
                            component.push(popped);
                            if popped == node {
                                break;
                            }
                        }
                        let cyclic = component.len() > 1
                            || self.imported_nodes(node).contains(&node);
                        if cyclic {
                            st.components.push(component);
                        }
                    }
                    frames.pop();
                    if let Some(&mut (parent, _)) = frames.last_mut() {
                        st.lowlink[parent] = st.lowlink[parent].min(st.lowlink[node]);
                    }
                }
            }
        }
        st.components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ProjectPathsConfig, utils};
    use pretty_assertions::assert_eq;
    use std::fs;

    fn project(files: &[(&str, &str)]) -> (tempfile::TempDir, ProjectPathsConfig, Vec<PathBuf>) {
        let tmp = tempfile::tempdir().unwrap();
        let root = utils::canonicalized(tmp.path());
        let mut paths = Vec::new();
        for (name, content) in files {
            let path = root.join(name);
            utils::create_parent_dir_all(&path).unwrap();
            fs::write(&path, content).unwrap();
            paths.push(path);
        }
        let config = ProjectPathsConfig::builder().root(&root).build().unwrap();
        (tmp, config, paths)
    }

    #[test]
    fn minimize_merges_connected_files() {
        let (_tmp, config, files) = project(&[
            ("a.sol", "pragma solidity >=0.7.0;\nimport \"./b.sol\";"),
            ("b.sol", "pragma solidity ^0.7.0;"),
        ]);
        let graph = Graph::resolve(&config, &files[..1]).unwrap();
        let units = graph.compilation_units_minimize().unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].source_unit_names(), vec!["a.sol", "b.sol"]);
        let versions = units[0].versions();
        assert!(versions.contains(&"0.7.0".parse().unwrap()));
        assert!(versions.contains(&"0.7.6".parse().unwrap()));
        assert!(!versions.contains(&"0.8.0".parse().unwrap()));
    }

    #[test]
    fn minimize_fails_on_incompatible_component() {
        let (_tmp, config, files) = project(&[
            ("a.sol", "pragma solidity ^0.8.0;\nimport \"./b.sol\";"),
            ("b.sol", "pragma solidity ^0.7.0;"),
        ]);
        let graph = Graph::resolve(&config, &files[..1]).unwrap();
        assert!(graph.compilation_units_minimize().is_err());
        // the maximizing policy cannot help here either, the sink spans both files
        assert!(graph.compilation_units_maximize().is_err());
    }

    #[test]
    fn minimize_keeps_disconnected_files_apart() {
        let (_tmp, config, files) = project(&[
            ("a.sol", "pragma solidity ^0.8.0;"),
            ("b.sol", "pragma solidity ^0.7.0;"),
        ]);
        let graph = Graph::resolve(&config, &files).unwrap();
        let units = graph.compilation_units_minimize().unwrap();
        assert_eq!(units.len(), 2);
    }

    #[test]
    fn cyclic_imports_form_one_unit() {
        let (_tmp, config, files) = project(&[
            ("a.sol", "pragma solidity ^0.8.0;\nimport \"./b.sol\";"),
            ("b.sol", "pragma solidity ^0.8.0;\nimport \"./a.sol\";"),
        ]);
        let graph = Graph::resolve(&config, &files).unwrap();

        let units = graph.compilation_units_minimize().unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].source_unit_names(), vec!["a.sol", "b.sol"]);
        assert!(units[0].versions().contains(&"0.8.13".parse().unwrap()));

        // nothing imports the cycle from outside, so it is a unit under maximization too
        let units = graph.compilation_units_maximize().unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].source_unit_names(), vec!["a.sol", "b.sol"]);
    }

    #[test]
    fn maximize_spans_one_unit_per_sink() {
        let (_tmp, config, files) = project(&[
            ("app1.sol", "pragma solidity ^0.8.0;\nimport \"./lib.sol\";"),
            ("app2.sol", "pragma solidity ^0.8.1;\nimport \"./lib.sol\";"),
            ("lib.sol", "pragma solidity >=0.6.0;"),
        ]);
        let graph = Graph::resolve(&config, &files).unwrap();
        let units = graph.compilation_units_maximize().unwrap();

        // the shared library is covered by both units
        assert_eq!(units.len(), 2);
        for unit in &units {
            assert_eq!(unit.len(), 2);
            assert!(unit.sources().contains_key("lib.sol"));
        }
    }

    #[test]
    fn maximize_splits_what_minimize_cannot_compile() {
        let (_tmp, config, files) = project(&[
            ("a.sol", "pragma solidity =0.5.0;\nimport \"./lib.sol\";"),
            ("b.sol", "pragma solidity =0.5.1;\nimport \"./lib.sol\";"),
            ("lib.sol", "pragma solidity >=0.5.0 <0.6.0;"),
        ]);
        let graph = Graph::resolve(&config, &files).unwrap();

        assert!(graph.compilation_units_minimize().is_err());
        let units = graph.compilation_units_maximize().unwrap();
        assert_eq!(units.len(), 2);
    }

    #[test]
    fn unit_hash_is_stable_under_member_reordering() {
        let sources = [
            ("a.sol", "pragma solidity ^0.8.0;\nimport \"./b.sol\";\nimport \"./c.sol\";"),
            ("b.sol", "pragma solidity ^0.8.0;"),
            ("c.sol", "pragma solidity ^0.8.0;"),
        ];
        let (_tmp, config, files) = project(&sources);
        let hash_fwd = {
            let graph = Graph::resolve(&config, &files).unwrap();
            graph.compilation_units_minimize().unwrap()[0].hash_hex()
        };
        let reversed: Vec<_> = files.iter().rev().cloned().collect();
        let hash_rev = {
            let graph = Graph::resolve(&config, &reversed).unwrap();
            graph.compilation_units_minimize().unwrap()[0].hash_hex()
        };
        assert_eq!(hash_fwd, hash_rev);
    }

    #[test]
    fn units_are_sorted_by_hash() {
        let (_tmp, config, files) = project(&[
            ("a.sol", "pragma solidity ^0.8.0;"),
            ("b.sol", "pragma solidity ^0.8.0;"),
            ("c.sol", "pragma solidity ^0.8.0;"),
        ]);
        let graph = Graph::resolve(&config, &files).unwrap();
        let units = graph.compilation_units_minimize().unwrap();
        let hashes: Vec<_> = units.iter().map(|u| u.hash_hex()).collect();
        let mut sorted = hashes.clone();
        sorted.sort();
        assert_eq!(hashes, sorted);
    }
}
