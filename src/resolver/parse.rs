//! A comment-aware pre-parser extracting the data the resolver needs from a solidity file.
//!
//! Unlike a real parser this only looks at `pragma solidity` and `import` directives, which is
//! all the graph needs; everything else in the file is irrelevant here. Comments are stripped
//! first so that commented-out directives are not picked up, and directives inside string
//! literals are ignored.

use crate::{
    error::{Result, SolcError},
    version::{VersionExpr, VersionRanges},
};
use blake2::{digest::consts::U32, Blake2b, Digest};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{collections::HashSet, fs, path::Path};

type Blake2b256 = Blake2b<U32>;

/// A 256-bit BLAKE2b hash of a source file's raw bytes.
pub type ContentHash = [u8; 32];

/// Hashes the raw bytes of a source file.
pub fn content_hash(bytes: &[u8]) -> ContentHash {
    let mut hasher = Blake2b256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

static RE_SOL_PRAGMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"pragma\s+solidity\s+(?P<version>[^;]+);").unwrap());

static RE_SOL_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"import\s*(?P<directive>[^;]+);").unwrap());

/// Matches the quoted path literals inside an import directive body.
static RE_IMPORT_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(?P<p1>[^"]*)"|'(?P<p2>[^']*)'"#).unwrap());

/// Represents the extracted data of a solidity source file relevant for the resolver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolData {
    /// The version ranges the file's `pragma solidity` directives allow, intersected.
    ///
    /// Any version when no pragma is present.
    pub versions: VersionRanges,
    /// Import path literals, deduplicated, in order of appearance.
    pub imports: Vec<String>,
    /// BLAKE2b-256 hash over the raw file bytes.
    pub hash: ContentHash,
}

impl SolData {
    /// Reads and pre-parses the file at `path`.
    pub fn read(path: &Path, ignore_errors: bool) -> Result<Self> {
        let bytes = fs::read(path).map_err(|err| SolcError::io(err, path))?;
        let content = std::str::from_utf8(&bytes)
            .map_err(|err| SolcError::msg(format!("{}: {err}", path.display())))?;
        Self::parse(content, ignore_errors)
    }

    /// Pre-parses the given source content.
    ///
    /// With `ignore_errors` set, malformed pragmas and imports as well as an unterminated
    /// multi-line comment are skipped instead of failing; editor integrations use this for
    /// files that are mid-edit.
    pub fn parse(content: &str, ignore_errors: bool) -> Result<Self> {
        let hash = content_hash(content.as_bytes());
        let stripped = strip_comments(content, ignore_errors)?;
        let versions = parse_version_pragmas(&stripped, ignore_errors)?;
        let imports = parse_imports(&stripped, ignore_errors)?;
        Ok(Self { versions, imports, hash })
    }
}

/// Returns `true` if every string literal in the given line prefix is closed.
///
/// `\` escapes the next character inside a literal. Both `'` and `"` delimiters count.
fn string_closed(line: &str) -> bool {
    let mut opening_char = None;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match opening_char {
            None => {
                if c == '"' || c == '\'' {
                    opening_char = Some(c);
                }
            }
            Some(open) => {
                if c == '\\' {
                    chars.next();
                } else if c == open {
                    opening_char = None;
                }
            }
        }
    }
    opening_char.is_none()
}

/// The line prefix preceding byte offset `pos`.
fn line_prefix(source: &str, pos: usize) -> &str {
    source[..pos].rsplit('\n').next().unwrap_or("")
}

/// Removes all comments from the source.
///
/// Alternately finds the earliest single-line or multi-line comment start that is not inside a
/// string literal and cuts it out, until no comment remains. An unterminated multi-line comment
/// is an error unless `ignore_errors` is set, in which case it swallows the rest of the file.
pub fn strip_comments(source: &str, ignore_errors: bool) -> Result<String> {
    static RE_COMMENT_START: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?m)(//.*$|/\*)").unwrap());
    static RE_MULTILINE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*/").unwrap());

    let mut source = source.to_string();
    'outer: loop {
        for m in RE_COMMENT_START.find_iter(&source) {
            // `//` and `/*` inside solidity strings do not start a comment
            if !string_closed(line_prefix(&source, m.start())) {
                continue;
            }

            if m.as_str() == "/*" {
                let rest = match RE_MULTILINE_END.find_at(&source, m.end()) {
                    Some(end) => source[end.end()..].to_string(),
                    None if ignore_errors => String::new(),
                    None => return Err(SolcError::UnterminatedComment),
                };
                source = format!("{}{}", &source[..m.start()], rest);
            } else {
                source = format!("{}{}", &source[..m.start()], &source[m.end()..]);
            }
            continue 'outer;
        }
        return Ok(source);
    }
}

fn parse_version_pragmas(source: &str, ignore_errors: bool) -> Result<VersionRanges> {
    let mut versions: Option<VersionRanges> = None;
    for caps in RE_SOL_PRAGMA.captures_iter(source) {
        let m = caps.get(0).unwrap();
        // ignore pragmas in a string
        if !string_closed(line_prefix(source, m.start())) {
            continue;
        }

        let expr = match caps["version"].trim().parse::<VersionExpr>() {
            Ok(expr) => expr,
            Err(_) if ignore_errors => continue,
            Err(err) => return Err(err),
        };
        versions = Some(match versions {
            // multiple version pragmas in a single file intersect
            Some(ranges) => &ranges & expr.ranges(),
            None => expr.into_ranges(),
        });
    }

    // any version can be used when no pragma solidity is present
    Ok(versions.unwrap_or_else(VersionRanges::any))
}

fn parse_imports(source: &str, ignore_errors: bool) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut imports = Vec::new();
    for caps in RE_SOL_IMPORT.captures_iter(source) {
        let m = caps.get(0).unwrap();
        // ignore imports in a string
        if !string_closed(line_prefix(source, m.start())) {
            continue;
        }

        // the path is the last quoted literal of the directive, which covers the plain,
        // aliased, `* as X from` and `{..} from` forms
        let directive = &caps["directive"];
        let path = RE_IMPORT_PATH
            .captures_iter(directive)
            .last()
            .and_then(|caps| caps.name("p1").or_else(|| caps.name("p2")))
            .map(|m| m.as_str().to_string());
        match path {
            Some(path) => {
                if seen.insert(path.clone()) {
                    imports.push(path);
                }
            }
            None if ignore_errors => continue,
            None => {
                return Err(SolcError::msg(format!("invalid import directive: `{directive}`")))
            }
        }
    }
    Ok(imports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(content: &str) -> SolData {
        SolData::parse(content, false).unwrap()
    }

    #[test]
    fn can_strip_line_comments() {
        let s = strip_comments("uint a; // comment\nuint b;", false).unwrap();
        assert_eq!(s, "uint a; \nuint b;");
    }

    #[test]
    fn can_strip_block_comments() {
        let s = strip_comments("uint a; /* one\ntwo */ uint b;", false).unwrap();
        assert_eq!(s, "uint a;  uint b;");

        // nested comment starts inside a block comment disappear with it
        let s = strip_comments("/* // still a block\n*/uint a;", false).unwrap();
        assert_eq!(s, "uint a;");
    }

    #[test]
    fn comment_markers_in_strings_survive(){
        let s = strip_comments(r#"string a = "not // a comment";"#, false).unwrap();
        assert_eq!(s, r#"string a = "not // a comment";"#);

        let s = strip_comments(r#"string a = 'not /* a comment */';"#, false).unwrap();
        assert_eq!(s, r#"string a = 'not /* a comment */';"#);

        // escaped quote does not close the string
        let s = strip_comments(r#"string a = "esc \" // keep";"#, false).unwrap();
        assert_eq!(s, r#"string a = "esc \" // keep";"#);
    }

    #[test]
    fn unterminated_comment() {
        let err = strip_comments("uint a; /* oops", false).unwrap_err();
        assert!(matches!(err, SolcError::UnterminatedComment));

        // tolerant mode swallows the rest of the file
        let s = strip_comments("uint a; /* oops", true).unwrap();
        assert_eq!(s, "uint a; ");
    }

    #[test]
    fn can_parse_pragma() {
        let data = parse("pragma solidity ^0.8.0;\ncontract C {}");
        assert!(data.versions.contains(&"0.8.13".parse().unwrap()));
        assert!(!data.versions.contains(&"0.9.0".parse().unwrap()));
        assert!(!data.versions.contains(&"0.7.9".parse().unwrap()));
    }

    #[test]
    fn multiple_pragmas_intersect() {
        let data = parse("pragma solidity >=0.7.0;\npragma solidity <0.8.0;");
        assert!(data.versions.contains(&"0.7.6".parse().unwrap()));
        assert!(!data.versions.contains(&"0.8.0".parse().unwrap()));
    }

    #[test]
    fn missing_pragma_is_any_version() {
        let data = parse("contract C {}");
        assert!(data.versions.contains(&"0.4.11".parse().unwrap()));
        assert!(data.versions.contains(&"0.8.26".parse().unwrap()));
    }

    #[test]
    fn commented_out_pragma_is_ignored() {
        let data = parse("// pragma solidity ^0.5.0;\npragma solidity ^0.8.0;");
        assert!(data.versions.contains(&"0.8.1".parse().unwrap()));
        assert!(!data.versions.contains(&"0.5.1".parse().unwrap()));
    }

    #[test]
    fn invalid_pragma() {
        assert!(SolData::parse("pragma solidity bogus;", false).is_err());
        // tolerant mode skips it, leaving the default
        let data = SolData::parse("pragma solidity bogus;", true).unwrap();
        assert!(data.versions.contains(&"0.8.0".parse().unwrap()));
    }

    #[test]
    fn can_capture_imports() {
        let content = r#"
import "./Plain.sol";
import './SingleQuoted.sol';
import "./Aliased.sol" as Alias;
import * as Star from "./Star.sol";
import { T } from "../Test.sol";
import {ReentrancyGuard} from "@openzeppelin/contracts/utils/ReentrancyGuard.sol";
import {DsTest} from "ds-test/test.sol";
"#;
        let data = parse(content);
        assert_eq!(
            data.imports,
            vec![
                "./Plain.sol",
                "./SingleQuoted.sol",
                "./Aliased.sol",
                "./Star.sol",
                "../Test.sol",
                "@openzeppelin/contracts/utils/ReentrancyGuard.sol",
                "ds-test/test.sol",
            ]
        );
    }

    #[test]
    fn imports_are_deduplicated() {
        let data = parse("import \"./A.sol\";\nimport {X} from \"./A.sol\";\nimport \"./B.sol\";");
        assert_eq!(data.imports, vec!["./A.sol", "./B.sol"]);
    }

    #[test]
    fn malformed_import() {
        assert!(SolData::parse("import no quotes here;", false).is_err());
        let data = SolData::parse("import no quotes here;\nimport \"./Ok.sol\";", true).unwrap();
        assert_eq!(data.imports, vec!["./Ok.sol"]);
    }

    #[test]
    fn hash_is_over_raw_bytes() {
        let a = parse("contract A {} // trailing");
        let b = parse("contract A {} ");
        let b2 = parse("contract A {} ");
        // stripping does not influence the hash, content does
        assert_ne!(a.hash, b.hash);
        assert_eq!(b.hash, b2.hash);
    }
}
