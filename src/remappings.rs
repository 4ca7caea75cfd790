//! Solc import remappings.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A solc remapping, a context-scoped prefix rewrite applied to import strings.
///
/// The solidity compiler can only reference files that exist locally on your computer, so
/// importing directly from a package name such as `@openzeppelin/contracts/...` requires telling
/// the compiler where that prefix actually lives:
///
/// ```text
/// @openzeppelin/=node_modules/@openzeppelin/
/// ```
///
/// A remapping may additionally carry a `context`, which limits it to imports resolved inside
/// source units whose name starts with that context. The textual format is
/// `[context:]prefix=[target]`, forward-slash separators; both `context` and `target` may be
/// empty. An empty (or absent) target removes the prefix.
///
/// See also <https://docs.soliditylang.org/en/latest/path-resolution.html#import-remapping>.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Remapping {
    pub context: Option<String>,
    pub prefix: String,
    pub target: Option<String>,
}

impl Remapping {
    /// The replacement the matched prefix is rewritten to.
    pub fn target(&self) -> &str {
        self.target.as_deref().unwrap_or("")
    }

    /// Whether this remapping applies to the given import resolved inside the given parent
    /// source unit.
    pub fn matches(&self, parent_source_unit: &str, source_unit_name: &str) -> bool {
        let context_matches =
            self.context.as_deref().map_or(true, |ctx| parent_source_unit.starts_with(ctx));
        context_matches && source_unit_name.starts_with(&self.prefix)
    }

    fn context_len(&self) -> usize {
        self.context.as_deref().map_or(0, str::len)
    }

    /// Orders matching remappings for selection: longest prefix first, then longest context,
    /// later-declared entries win ties (callers iterate declaration order and use `max_by` with
    /// a non-strict comparison).
    pub(crate) fn selection_key(&self) -> (usize, usize) {
        (self.prefix.len(), self.context_len())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RemappingError {
    #[error("invalid remapping format, found `{0}`, expected `[context:]prefix=[target]`")]
    InvalidRemapping(String),
    #[error("remapping prefix can't be empty, found `{0}`, expected `[context:]prefix=[target]`")]
    EmptyRemappingPrefix(String),
}

impl FromStr for Remapping {
    type Err = RemappingError;

    fn from_str(remapping: &str) -> Result<Self, Self::Err> {
        let (name, target) = remapping
            .split_once('=')
            .ok_or_else(|| RemappingError::InvalidRemapping(remapping.to_string()))?;
        let (context, prefix) =
            name.split_once(':').map_or((None, name), |(context, prefix)| {
                (Some(context.to_string()), prefix)
            });
        if prefix.is_empty() {
            return Err(RemappingError::EmptyRemappingPrefix(remapping.to_string()));
        }
        // a remapping starting with just `:` has no context, an empty target removes the prefix
        let context = context.filter(|c| !c.is_empty());
        let target = if target.is_empty() { None } else { Some(target.to_string()) };
        Ok(Remapping { context, prefix: prefix.to_string(), target })
    }
}

impl fmt::Display for Remapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "{context}:")?;
        }
        write!(f, "{}={}", self.prefix, self.target())
    }
}

impl Serialize for Remapping {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Remapping {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        let remapping = String::deserialize(deserializer)?;
        Remapping::from_str(&remapping).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn can_parse_remappings() {
        let r: Remapping = "@openzeppelin/=node_modules/@openzeppelin/".parse().unwrap();
        assert_eq!(r.context, None);
        assert_eq!(r.prefix, "@openzeppelin/");
        assert_eq!(r.target.as_deref(), Some("node_modules/@openzeppelin/"));

        let r: Remapping = "lib/:ds-test/=lib/ds-test/src/".parse().unwrap();
        assert_eq!(r.context.as_deref(), Some("lib/"));
        assert_eq!(r.prefix, "ds-test/");
        assert_eq!(r.target.as_deref(), Some("lib/ds-test/src/"));
    }

    #[test]
    fn empty_context_and_target_are_absent() {
        let r: Remapping = ":xyz=".parse().unwrap();
        assert_eq!(r.context, None);
        assert_eq!(r.prefix, "xyz");
        assert_eq!(r.target, None);
        assert_eq!(r.target(), "");
    }

    #[test]
    fn rejects_malformed_remappings() {
        assert_eq!(
            "no-equals-sign".parse::<Remapping>(),
            Err(RemappingError::InvalidRemapping("no-equals-sign".to_string()))
        );
        assert_eq!(
            "ctx:=target".parse::<Remapping>(),
            Err(RemappingError::EmptyRemappingPrefix("ctx:=target".to_string()))
        );
    }

    #[test]
    fn display_round_trip() {
        for s in ["a/=b/", "ctx:a/=b/", "xyz="] {
            let r: Remapping = s.parse().unwrap();
            assert_eq!(r.to_string(), s);
            assert_eq!(r.to_string().parse::<Remapping>().unwrap(), r);
        }
    }

    #[test]
    fn context_scoping() {
        let r: Remapping = "ctx:xyz=abc".parse().unwrap();
        assert!(r.matches("ctx/Contract.sol", "xyz/Foo.sol"));
        assert!(!r.matches("other", "xyz/Foo.sol"));
        assert!(!r.matches("ctx/Contract.sol", "abc/Foo.sol"));

        let global: Remapping = "xyz=".parse().unwrap();
        assert!(global.matches("anything/at/all.sol", "xyz/Foo.sol"));
    }
}
