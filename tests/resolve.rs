//! Integration tests for import resolution and partitioning on real (temporary) projects.

use pretty_assertions::assert_eq;
use solbuild::{
    artifacts::Settings, cache::BuildManifest, error::SolcError, Graph, ProjectPathsConfig,
};
use std::{collections::HashMap, fs, path::Path, path::PathBuf};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn write_file(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn canonical_root(tmp: &tempfile::TempDir) -> PathBuf {
    solbuild::utils::canonicalized(tmp.path())
}

#[test]
fn resolves_transitive_imports() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let root = canonical_root(&tmp);
    let entry = write_file(
        &root,
        "contracts/Token.sol",
        "pragma solidity ^0.8.0;\nimport \"./utils/Math.sol\";\ncontract Token {}",
    );
    write_file(
        &root,
        "contracts/utils/Math.sol",
        "pragma solidity ^0.8.0;\nimport \"../interfaces/IMath.sol\";\nlibrary Math {}",
    );
    write_file(&root, "contracts/interfaces/IMath.sol", "pragma solidity >=0.6.0;");

    let paths = ProjectPathsConfig::builder().root(&root).build().unwrap();
    let graph = Graph::resolve(&paths, &[entry]).unwrap();

    // every transitive import appears as a node, addressed by source unit name
    assert_eq!(graph.len(), 3);
    for name in
        ["contracts/Token.sol", "contracts/utils/Math.sol", "contracts/interfaces/IMath.sol"]
    {
        assert!(graph.node_by_name(name).is_some(), "missing {name}");
    }

    let token = graph.files()["contracts/Token.sol"];
    let math = graph.files()["contracts/utils/Math.sol"];
    let imath = graph.files()["contracts/interfaces/IMath.sol"];
    assert_eq!(graph.imported_nodes(token).to_vec(), vec![math]);
    assert_eq!(graph.imported_nodes(math).to_vec(), vec![imath]);
    assert_eq!(graph.importing_nodes(imath).to_vec(), vec![math]);
    assert!(graph.importing_nodes(token).is_empty());
}

#[test]
fn remapped_imports_resolve_through_include_paths() {
    let tmp = tempfile::tempdir().unwrap();
    let root = canonical_root(&tmp);
    let entry = write_file(
        &root,
        "contracts/App.sol",
        "pragma solidity ^0.8.0;\nimport \"@lib/Math.sol\";",
    );
    write_file(&root, "node_modules/math-lib/Math.sol", "pragma solidity ^0.8.0;");

    let paths = ProjectPathsConfig::builder()
        .root(&root)
        .remapping("@lib/=math-lib/".parse().unwrap())
        .build()
        .unwrap();
    let graph = Graph::resolve(&paths, &[entry]).unwrap();

    // the import is rewritten by the remapping and found under node_modules
    let node = graph.node_by_name("math-lib/Math.sol").expect("resolved through remapping");
    assert_eq!(node.path(), root.join("node_modules/math-lib/Math.sol"));
}

#[test]
fn duplicate_source_unit_names_are_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let root = canonical_root(&tmp);
    let first = write_file(&root, "A.sol", "pragma solidity ^0.8.0;");
    let second = write_file(&root, "vendored/A.sol", "pragma solidity ^0.8.0;");

    let paths = ProjectPathsConfig::builder()
        .root(&root)
        .include_path(root.join("vendored"))
        .build()
        .unwrap();
    // both files resolve to the source unit name `A.sol`
    let err = Graph::resolve(&paths, &[first, second]).unwrap_err();
    assert!(matches!(err, SolcError::DuplicateSourceUnitName { .. }), "{err}");
}

#[test]
fn same_entry_twice_is_not_a_conflict() {
    let tmp = tempfile::tempdir().unwrap();
    let root = canonical_root(&tmp);
    let entry = write_file(&root, "A.sol", "pragma solidity ^0.8.0;");

    let paths = ProjectPathsConfig::builder().root(&root).build().unwrap();
    let graph = Graph::resolve(&paths, &[entry.clone(), entry]).unwrap();
    assert_eq!(graph.len(), 1);
}

#[test]
fn unresolved_imports_are_fatal_for_batch_builds() {
    let tmp = tempfile::tempdir().unwrap();
    let root = canonical_root(&tmp);
    let entry = write_file(
        &root,
        "App.sol",
        "pragma solidity ^0.8.0;\nimport \"./Missing.sol\";",
    );

    let paths = ProjectPathsConfig::builder().root(&root).build().unwrap();
    let err = Graph::resolve(&paths, &[entry]).unwrap_err();
    assert!(matches!(err, SolcError::FailedResolveImport(..)), "{err}");
}

#[test]
fn unresolved_imports_are_recorded_in_tolerant_mode() {
    let tmp = tempfile::tempdir().unwrap();
    let root = canonical_root(&tmp);
    let entry = write_file(
        &root,
        "App.sol",
        "pragma solidity ^0.8.0;\nimport \"./Missing.sol\";\nimport \"./Present.sol\";",
    );
    write_file(&root, "Present.sol", "pragma solidity ^0.8.0;");

    let paths = ProjectPathsConfig::builder().root(&root).build().unwrap();
    let graph =
        Graph::resolve_with_overrides(&paths, &[entry], &HashMap::new(), true).unwrap();

    assert_eq!(graph.len(), 2);
    let unresolved: Vec<_> = graph.unresolved_imports().collect();
    assert_eq!(unresolved, vec![("App.sol", "Missing.sol")]);
}

#[test]
fn overridden_content_shadows_the_file_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let root = canonical_root(&tmp);
    let entry = write_file(&root, "App.sol", "pragma solidity ^0.7.0;");
    write_file(&root, "Lib.sol", "pragma solidity ^0.8.0;");

    // the unsaved buffer adds an import and a different pragma
    let overrides = HashMap::from([(
        entry.clone(),
        "pragma solidity ^0.8.0;\nimport \"./Lib.sol\";".to_string(),
    )]);

    let paths = ProjectPathsConfig::builder().root(&root).build().unwrap();
    let graph = Graph::resolve_with_overrides(&paths, &[entry], &overrides, false).unwrap();

    assert_eq!(graph.len(), 2);
    let node = graph.node_by_name("App.sol").unwrap();
    assert!(node.content().is_some());
    assert!(node.versions().contains(&"0.8.1".parse().unwrap()));
    assert!(!node.versions().contains(&"0.7.1".parse().unwrap()));
}

#[test]
fn manifest_reuse_decision_matches_unit_descriptor() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let root = canonical_root(&tmp);
    let entry = write_file(
        &root,
        "App.sol",
        "pragma solidity ^0.8.0;\nimport \"./Lib.sol\";",
    );
    write_file(&root, "Lib.sol", "pragma solidity ^0.8.0;");

    let paths = ProjectPathsConfig::builder().root(&root).build().unwrap();
    let graph = Graph::resolve(&paths, &[entry]).unwrap();
    let units = graph.compilation_units_minimize().unwrap();
    assert_eq!(units.len(), 1);
    let unit = &units[0];

    let settings = Settings::new(vec![], None, &[solbuild::OutputKind::All]);
    let info = solbuild::cache::UnitBuildInfo {
        build_dir: unit.hash_hex(),
        sources: Default::default(),
        contracts: Default::default(),
        errors: vec![],
        source_units: unit.source_unit_names(),
        allow_paths: vec![],
        include_paths: vec![],
        settings: settings.clone(),
        compiler_version: "0.8.19".parse().unwrap(),
    };
    let manifest = BuildManifest {
        compilation_units: [(unit.hash_hex(), info)].into_iter().collect(),
    };

    // identical descriptor: hit
    assert!(manifest
        .matching_unit(&unit.hash_hex(), &unit.source_unit_names(), &[], &[], &settings)
        .is_some());

    // different settings: miss
    let other = Settings::new(vec![], None, &[solbuild::OutputKind::Abi]);
    assert!(manifest
        .matching_unit(&unit.hash_hex(), &unit.source_unit_names(), &[], &[], &other)
        .is_none());

    // touching a source changes the unit hash, which misses as well
    write_file(&root, "Lib.sol", "pragma solidity ^0.8.0;\n// changed");
    let graph = Graph::resolve(&paths, &[root.join("App.sol")]).unwrap();
    let changed = &graph.compilation_units_minimize().unwrap()[0];
    assert_ne!(changed.hash_hex(), unit.hash_hex());
    assert!(manifest
        .matching_unit(&changed.hash_hex(), &changed.source_unit_names(), &[], &[], &settings)
        .is_none());
}
