//! Utility functions

use crate::error::{SolcError, SolcIoError};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Extensions acceptable by solc compiler.
pub const SOLC_EXTENSIONS: &[&str] = &["sol", "yul"];

/// Returns an iterator over all files under the given root with an acceptable extension.
pub fn source_files_iter<'a>(
    root: &Path,
    extensions: &'a [&'a str],
) -> impl Iterator<Item = PathBuf> + 'a {
    WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path().extension().map(|ext| extensions.iter().any(|e| ext == *e)).unwrap_or_default()
        })
        .map(|e| e.path().into())
}

/// Returns a list of absolute paths to all the solidity files under the root.
///
/// NOTE: this does not resolve imports from other locations
///
/// # Examples
///
/// ```no_run
/// use solbuild::utils;
/// let sources = utils::sol_source_files("./contracts".as_ref());
/// ```
pub fn sol_source_files(root: &Path) -> Vec<PathBuf> {
    source_files_iter(root, SOLC_EXTENSIONS).collect()
}

/// Canonicalize the path, platform-agnostic.
///
/// On windows this will ensure the path only consists of `/` separators.
pub fn canonicalize(path: impl AsRef<Path>) -> Result<PathBuf, SolcIoError> {
    let path = path.as_ref();
    let res = dunce::canonicalize(path);
    #[cfg(windows)]
    let res = res.map(|p| {
        use path_slash::PathBufExt;
        PathBuf::from(p.to_slash_lossy().as_ref())
    });
    res.map_err(|err| SolcIoError::new(err, path))
}

/// Canonicalize the path if it exists, otherwise return it unchanged.
pub fn canonicalized(path: impl Into<PathBuf>) -> PathBuf {
    let path = path.into();
    canonicalize(&path).unwrap_or(path)
}

/// Returns a forward-slash representation of the path.
pub fn slash_path(path: &Path) -> String {
    use path_slash::PathExt;
    path.to_slash_lossy().into_owned()
}

/// Rewrites a source unit name into a name that is safe to use as a filename on all platforms.
///
/// Source unit names contain `/` separators and may contain other characters that are not
/// acceptable in file names, all of them are replaced with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Reads the json file and deserialize it into the provided type.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, SolcError> {
    let content = fs::read(path).map_err(|err| SolcError::io(err, path))?;
    serde_json::from_slice(&content).map_err(Into::into)
}

/// Writes serializes the provided value to JSON and writes it to a file.
pub fn write_json_file<T: Serialize>(
    value: &T,
    path: &Path,
    capacity: usize,
) -> Result<(), SolcError> {
    let file = fs::File::create(path).map_err(|err| SolcError::io(err, path))?;
    let mut writer = std::io::BufWriter::with_capacity(capacity, file);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush().map_err(|e| SolcError::io(e, path))
}

/// Creates the parent directory of the `file` and all its ancestors if it does not exist.
pub fn create_parent_dir_all(file: &Path) -> Result<(), SolcError> {
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            SolcError::msg(format!(
                "Failed to create artifact parent folder \"{}\": {}",
                parent.display(),
                err
            ))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_sanitize_source_unit_names() {
        assert_eq!(sanitize_filename("contracts/A.sol.json"), "contracts_A.sol.json");
        assert_eq!(sanitize_filename("@oz/utils/Math.sol"), "@oz_utils_Math.sol");
        assert_eq!(sanitize_filename("weird\"name?.sol"), "weird_name_.sol");
    }

    #[test]
    fn can_find_solidity_sources() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("src/inner")).unwrap();
        fs::write(root.join("src/A.sol"), "").unwrap();
        fs::write(root.join("src/inner/B.sol"), "").unwrap();
        fs::write(root.join("src/README.md"), "").unwrap();

        let mut found = sol_source_files(root);
        found.sort();
        assert_eq!(found, vec![root.join("src/A.sol"), root.join("src/inner/B.sol")]);
    }
}
