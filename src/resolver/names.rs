//! Conversion of import strings into canonical source unit names.
//!
//! This follows solc's own rules, see
//! <https://docs.soliditylang.org/en/latest/path-resolution.html>: relative imports are joined
//! onto the parent's directory purely lexically, everything else passes through, and remappings
//! are applied to the result in both cases.

use crate::remappings::Remapping;

/// Resolves the source unit name of an import found in the file with the given source unit name.
pub fn resolve_import(parent: &str, import: &str, remappings: &[Remapping]) -> String {
    if import.starts_with("./") || import.starts_with("../") {
        resolve_relative_import(parent, import, remappings)
    } else {
        apply_remappings(parent, import, remappings)
    }
}

/// Applies at most one remapping to the given source unit name.
///
/// The remapping with the longest matching prefix wins. Among prefixes of equal length the one
/// with the longest context wins, and among those the one declared last.
pub fn apply_remappings(parent: &str, source_unit_name: &str, remappings: &[Remapping]) -> String {
    let chosen = remappings
        .iter()
        .enumerate()
        .filter(|(_, r)| r.matches(parent, source_unit_name))
        .max_by_key(|(declared, r)| (r.selection_key(), *declared));

    match chosen {
        Some((_, remapping)) => {
            source_unit_name.replacen(&remapping.prefix, remapping.target(), 1)
        }
        None => source_unit_name.to_string(),
    }
}

fn resolve_relative_import(parent: &str, import: &str, remappings: &[Remapping]) -> String {
    // `.` and empty segments are no-ops in the import string
    let import_parts: Vec<&str> =
        import.split('/').filter(|part| !part.is_empty() && *part != ".").collect();

    // the parent's directory: drop trailing empty segments and the file name itself
    let mut parent_parts: Vec<&str> = parent.split('/').collect();
    while parent_parts.last() == Some(&"") {
        parent_parts.pop();
    }
    parent_parts.pop();
    while parent_parts.last() == Some(&"") {
        parent_parts.pop();
    }

    // collapse `..` within the import itself, leading ones are kept
    let mut normalized: Vec<&str> = Vec::new();
    for part in import_parts {
        if part == ".." {
            if normalized.last().map_or(true, |last| *last == "..") {
                normalized.push("..");
            } else {
                normalized.pop();
            }
        } else {
            normalized.push(part);
        }
    }

    // leading `..` segments consume parent components, never ascending above zero
    let mut first_regular = None;
    for (idx, part) in normalized.iter().enumerate() {
        if *part == ".." {
            while parent_parts.last() == Some(&"") {
                parent_parts.pop();
            }
            parent_parts.pop();
        } else {
            first_regular = Some(idx);
            break;
        }
    }
    if let Some(idx) = first_regular {
        normalized.drain(..idx);
    }

    let source_unit_name = if parent_parts.is_empty() {
        normalized.join("/")
    } else {
        format!("{}/{}", parent_parts.join("/"), normalized.join("/"))
    };
    apply_remappings(parent, &source_unit_name, remappings)
}
