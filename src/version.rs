//! Semantic version (and npm-style version range) handling as used by `pragma solidity`.
//!
//! This follows npm's semver expression grammar with the compromises solc itself makes:
//!
//! * A version cannot start with a `v` prefix.
//! * Partial versions that do not represent a range are not supported, e.g. `x.1.2` or `0.X.7`.
//! * Whitespace between an operator and a partial is permitted, `>= 1.2.3 <= 7.8.9` is valid.
//! * Prerelease and build tags are parsed but ignored in comparison.
//! * A hyphen range cannot include additional operators, `~1.2.3 - ^4.5.6` is rejected.

use crate::error::{Result, SolcError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    ops::BitAnd,
    str::FromStr,
};

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<major>0|[1-9][0-9]*)\.(?P<minor>0|[1-9][0-9]*)\.(?P<patch>0|[1-9][0-9]*)(?:-(?P<prerelease>[-0-9A-Za-z]+(?:\.[-0-9A-Za-z]+)*))?(?:\+(?P<build>[-0-9A-Za-z]+(?:\.[-0-9A-Za-z]+)*))?$",
    )
    .unwrap()
});

/// A single Solidity compiler version, not a range of versions.
///
/// Prerelease and build tags are preserved for printing but never participate in comparison,
/// equality or hashing.
#[derive(Clone, Debug)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
    pub build: Option<String>,
}

impl Version {
    /// A plain `major.minor.patch` version without prerelease and build tags.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch, prerelease: None, build: None }
    }

    fn triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.triple() == other.triple()
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.triple().hash(state)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.triple().cmp(&other.triple())
    }
}

impl FromStr for Version {
    type Err = SolcError;

    fn from_str(s: &str) -> Result<Self> {
        let caps =
            VERSION_RE.captures(s).ok_or_else(|| SolcError::InvalidVersion(s.to_string()))?;
        // the named number groups only match valid u64s
        Ok(Version {
            major: caps["major"].parse().unwrap(),
            minor: caps["minor"].parse().unwrap(),
            patch: caps["patch"].parse().unwrap(),
            prerelease: caps.name("prerelease").map(|m| m.as_str().to_string()),
            build: caps.name("build").map(|m| m.as_str().to_string()),
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(prerelease) = &self.prerelease {
            write!(f, "-{prerelease}")?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A range of versions given by a lower and an optional upper bound, each inclusive or not.
///
/// An unset lower bound defaults to `0.0.0` inclusive. A range whose lower bound exceeds its
/// upper bound collapses into the canonical empty range `(0.0.0, 0.0.0)` with both endpoints
/// exclusive.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VersionRange {
    lower: Version,
    lower_inclusive: bool,
    upper: Option<Version>,
    upper_inclusive: bool,
}

impl VersionRange {
    /// The range containing every version, `[0.0.0, +inf)`.
    pub fn any() -> Self {
        Self { lower: Version::new(0, 0, 0), lower_inclusive: true, upper: None, upper_inclusive: false }
    }

    /// The canonical empty range.
    pub fn empty() -> Self {
        Self {
            lower: Version::new(0, 0, 0),
            lower_inclusive: false,
            upper: Some(Version::new(0, 0, 0)),
            upper_inclusive: false,
        }
    }

    /// A range with both bounds set, normalized to [`VersionRange::empty`] when the bounds
    /// describe no version.
    pub fn bounded(
        lower: Version,
        lower_inclusive: bool,
        upper: Version,
        upper_inclusive: bool,
    ) -> Self {
        if lower > upper || (lower == upper && !(lower_inclusive && upper_inclusive)) {
            return Self::empty();
        }
        Self { lower, lower_inclusive, upper: Some(upper), upper_inclusive }
    }

    /// A range with only the lower bound set.
    pub fn from_lower(lower: Version, inclusive: bool) -> Self {
        Self { lower, lower_inclusive: inclusive, upper: None, upper_inclusive: false }
    }

    /// A range with only the upper bound set, the lower bound defaults to `0.0.0` inclusive.
    pub fn below(upper: Version, inclusive: bool) -> Self {
        Self::bounded(Version::new(0, 0, 0), true, upper, inclusive)
    }

    pub fn lower(&self) -> &Version {
        &self.lower
    }

    pub fn lower_inclusive(&self) -> bool {
        self.lower_inclusive
    }

    pub fn upper(&self) -> Option<&Version> {
        self.upper.as_ref()
    }

    pub fn upper_inclusive(&self) -> bool {
        self.upper_inclusive
    }

    /// Whether no version is contained in this range.
    pub fn is_empty(&self) -> bool {
        self.lower == Version::new(0, 0, 0)
            && !self.lower_inclusive
            && self.upper.as_ref() == Some(&self.lower)
            && !self.upper_inclusive
    }

    /// Whether the given version lies within this range.
    pub fn contains(&self, version: &Version) -> bool {
        if self.is_empty() {
            return false;
        }
        let lower_check =
            if self.lower_inclusive { *version >= self.lower } else { *version > self.lower };
        if !lower_check {
            return false;
        }
        match &self.upper {
            None => true,
            Some(upper) => {
                if self.upper_inclusive {
                    version <= upper
                } else {
                    version < upper
                }
            }
        }
    }
}

impl BitAnd for &VersionRange {
    type Output = VersionRange;

    /// Intersects two version ranges.
    ///
    /// The stricter bound wins on both ends; on a numeric tie the exclusive flag dominates.
    fn bitand(self, other: &VersionRange) -> VersionRange {
        let (lower, lower_inclusive) = match self.lower.cmp(&other.lower) {
            Ordering::Less => (other.lower.clone(), other.lower_inclusive),
            Ordering::Greater => (self.lower.clone(), self.lower_inclusive),
            Ordering::Equal => {
                (self.lower.clone(), self.lower_inclusive && other.lower_inclusive)
            }
        };

        let (upper, upper_inclusive) = match (&self.upper, &other.upper) {
            (None, None) => (None, false),
            (Some(u), None) => (Some(u.clone()), self.upper_inclusive),
            (None, Some(u)) => (Some(u.clone()), other.upper_inclusive),
            (Some(a), Some(b)) => match a.cmp(b) {
                Ordering::Less => (Some(a.clone()), self.upper_inclusive),
                Ordering::Greater => (Some(b.clone()), other.upper_inclusive),
                Ordering::Equal => {
                    (Some(a.clone()), self.upper_inclusive && other.upper_inclusive)
                }
            },
        };

        match upper {
            Some(upper) => VersionRange::bounded(lower, lower_inclusive, upper, upper_inclusive),
            None => VersionRange::from_lower(lower, lower_inclusive),
        }
    }
}

impl BitAnd for VersionRange {
    type Output = VersionRange;

    fn bitand(self, other: VersionRange) -> VersionRange {
        (&self) & (&other)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", if self.lower_inclusive { ">=" } else { ">" }, self.lower)?;
        if let Some(upper) = &self.upper {
            write!(f, " {}{}", if self.upper_inclusive { "<=" } else { "<" }, upper)?;
        }
        Ok(())
    }
}

/// An ordered sequence of version ranges, interpreted as their union.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionRanges {
    ranges: Vec<VersionRange>,
}

impl VersionRanges {
    pub fn new(ranges: impl IntoIterator<Item = VersionRange>) -> Self {
        Self { ranges: ranges.into_iter().collect() }
    }

    /// The union containing every version.
    pub fn any() -> Self {
        Self { ranges: vec![VersionRange::any()] }
    }

    /// Whether no version is contained in the union.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty() || self.ranges.iter().all(VersionRange::is_empty)
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.ranges.iter().any(|range| range.contains(version))
    }

    pub fn iter(&self) -> impl Iterator<Item = &VersionRange> {
        self.ranges.iter()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }
}

impl From<VersionRange> for VersionRanges {
    fn from(range: VersionRange) -> Self {
        Self { ranges: vec![range] }
    }
}

impl BitAnd for &VersionRanges {
    type Output = VersionRanges;

    /// Intersects two unions by intersecting every pair of ranges and keeping the non-empty
    /// results.
    fn bitand(self, other: &VersionRanges) -> VersionRanges {
        let mut ranges = Vec::new();
        for r1 in &self.ranges {
            for r2 in &other.ranges {
                let new_range = r1 & r2;
                if !new_range.is_empty() {
                    ranges.push(new_range);
                }
            }
        }
        VersionRanges { ranges }
    }
}

impl BitAnd for VersionRanges {
    type Output = VersionRanges;

    fn bitand(self, other: VersionRanges) -> VersionRanges {
        (&self) & (&other)
    }
}

impl fmt::Display for VersionRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, range) in self.ranges.iter().enumerate() {
            if idx > 0 {
                f.write_str(" || ")?;
            }
            write!(f, "{range}")?;
        }
        Ok(())
    }
}

const NUMBER: &str = r"x|X|\*|0|[1-9][0-9]*";

static PARTIAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\s*(?P<major>{NUMBER})\s*(?:\.\s*(?P<minor>{NUMBER}))?\s*(?:\.\s*(?P<patch>{NUMBER}))?\s*$"
    ))
    .unwrap()
});

static RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\s*(?P<operator>\^|~|<=|>=|<|>|=)?\s*(?P<major>{NUMBER})\s*(?:\.\s*(?P<minor>{NUMBER}))?\s*(?:\.\s*(?P<patch>{NUMBER}))?\s*"
    ))
    .unwrap()
});

static RANGES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(\s*(?:\^|~|<=|>=|<|>|=)?\s*(?:{NUMBER})\s*(?:\.\s*(?:{NUMBER}))?\s*(?:\.\s*(?:{NUMBER}))?\s*)+$"
    ))
    .unwrap()
});

/// A partial version with wildcard or missing positions resolved to `None`.
type Partial = (Option<u64>, Option<u64>, Option<u64>);

/// A parsed user-level version constraint, e.g. the argument of `pragma solidity`.
///
/// Disjuncts are separated by `||`; within a disjunct all atoms are intersected.
#[derive(Clone, Debug)]
pub struct VersionExpr {
    expression: String,
    ranges: VersionRanges,
}

impl VersionExpr {
    /// The ranges this expression evaluates to.
    pub fn ranges(&self) -> &VersionRanges {
        &self.ranges
    }

    pub fn into_ranges(self) -> VersionRanges {
        self.ranges
    }

    /// Whether the given version satisfies this expression.
    pub fn matches(&self, version: &Version) -> bool {
        self.ranges.contains(version)
    }

    fn parse_range(range_str: &str) -> Result<VersionRange> {
        if !RANGES_RE.is_match(range_str) {
            return Err(SolcError::InvalidVersionExpression(range_str.to_string()));
        }

        let mut ret = VersionRange::any();
        for caps in RANGE_RE.captures_iter(range_str) {
            let partial = Self::parse_partial(&caps, range_str)?;
            let operator = caps.name("operator").map(|m| m.as_str());
            ret = &ret & &Self::evaluate(operator, partial, range_str)?;
        }
        Ok(ret)
    }

    fn parse_hyphen_range(hyphen_range: &str) -> Result<VersionRange> {
        let invalid = || SolcError::InvalidVersionExpression(hyphen_range.to_string());
        let (left, right) = hyphen_range.split_once('-').ok_or_else(invalid)?;
        if right.contains('-') {
            return Err(invalid());
        }
        let left_caps = PARTIAL_RE.captures(left).ok_or_else(invalid)?;
        let right_caps = PARTIAL_RE.captures(right).ok_or_else(invalid)?;

        let lower = Self::evaluate_ge(Self::parse_partial(&left_caps, hyphen_range)?);
        let upper = Self::evaluate_le(Self::parse_partial(&right_caps, hyphen_range)?, hyphen_range)?;
        Ok(&lower & &upper)
    }

    fn parse_partial(caps: &regex::Captures<'_>, expr: &str) -> Result<Partial> {
        fn position(m: Option<regex::Match<'_>>) -> Option<u64> {
            match m.map(|m| m.as_str()) {
                None | Some("x") | Some("X") | Some("*") => None,
                // the regex only lets valid numbers through
                Some(num) => Some(num.parse().unwrap()),
            }
        }

        let major = position(caps.name("major"));
        let minor = position(caps.name("minor"));
        let patch = position(caps.name("patch"));

        // partials must be in descending significance: 1.2.x, 1.x.x, x.x.x, never x.0.1 or 1.x.5
        if (major.is_none() && (minor.is_some() || patch.is_some()))
            || (minor.is_none() && patch.is_some())
        {
            return Err(SolcError::InvalidVersionExpression(expr.to_string()));
        }
        Ok((major, minor, patch))
    }

    fn evaluate(operator: Option<&str>, partial: Partial, expr: &str) -> Result<VersionRange> {
        match operator {
            Some("^") => Self::evaluate_caret(partial, expr),
            Some("~") => Self::evaluate_tilde(partial, expr),
            Some("<") => Self::evaluate_lt(partial, expr),
            Some("<=") => Self::evaluate_le(partial, expr),
            Some(">") => Self::evaluate_gt(partial, expr),
            Some(">=") => Ok(Self::evaluate_ge(partial)),
            Some("=") | None => Ok(Self::evaluate_eq(partial)),
            Some(_) => Err(SolcError::InvalidVersionExpression(expr.to_string())),
        }
    }

    fn evaluate_caret(partial: Partial, expr: &str) -> Result<VersionRange> {
        let invalid = || SolcError::InvalidVersionExpression(expr.to_string());
        match partial {
            (None, ..) => Err(invalid()),
            // ^1.x.x := >=1.0.0 <2.0.0
            (Some(major), None, _) => Ok(VersionRange::bounded(
                Version::new(major, 0, 0),
                true,
                Version::new(major + 1, 0, 0),
                false,
            )),
            // ^1.2.x := >=1.2.0 <2.0.0, ^0.2.x := >=0.2.0 <0.3.0
            (Some(major), Some(minor), None) => {
                let upper = if major != 0 {
                    Version::new(major + 1, 0, 0)
                } else {
                    Version::new(major, minor + 1, 0)
                };
                Ok(VersionRange::bounded(Version::new(major, minor, 0), true, upper, false))
            }
            (Some(major), Some(minor), Some(patch)) => {
                let upper = if major != 0 {
                    // ^1.2.3 := >=1.2.3 <2.0.0
                    Version::new(major + 1, 0, 0)
                } else if minor != 0 {
                    // ^0.2.3 := >=0.2.3 <0.3.0
                    Version::new(major, minor + 1, 0)
                } else if patch != 0 {
                    // ^0.0.3 := >=0.0.3 <0.0.4
                    Version::new(major, minor, patch + 1)
                } else {
                    return Err(invalid());
                };
                Ok(VersionRange::bounded(Version::new(major, minor, patch), true, upper, false))
            }
        }
    }

    fn evaluate_tilde(partial: Partial, expr: &str) -> Result<VersionRange> {
        match partial {
            (None, ..) => Err(SolcError::InvalidVersionExpression(expr.to_string())),
            // ~1.x.x := >=1.0.0 <2.0.0
            (Some(major), None, _) => Ok(VersionRange::bounded(
                Version::new(major, 0, 0),
                true,
                Version::new(major + 1, 0, 0),
                false,
            )),
            // ~1.2.x := >=1.2.0 <1.3.0, ~1.2.3 := >=1.2.3 <1.3.0
            (Some(major), Some(minor), patch) => Ok(VersionRange::bounded(
                Version::new(major, minor, patch.unwrap_or(0)),
                true,
                Version::new(major, minor + 1, 0),
                false,
            )),
        }
    }

    fn evaluate_lt(partial: Partial, expr: &str) -> Result<VersionRange> {
        match partial {
            (None, ..) => Err(SolcError::InvalidVersionExpression(expr.to_string())),
            // <1.x.x := <1.0.0, <1.2.x := <1.2.0, <1.2.3 := <1.2.3
            (Some(major), minor, patch) => Ok(VersionRange::below(
                Version::new(major, minor.unwrap_or(0), patch.unwrap_or(0)),
                false,
            )),
        }
    }

    fn evaluate_le(partial: Partial, expr: &str) -> Result<VersionRange> {
        match partial {
            (None, ..) => Err(SolcError::InvalidVersionExpression(expr.to_string())),
            // <=1.x.x := <2.0.0
            (Some(major), None, _) => Ok(VersionRange::below(Version::new(major + 1, 0, 0), false)),
            // <=1.2.x := <1.3.0
            (Some(major), Some(minor), None) => {
                Ok(VersionRange::below(Version::new(major, minor + 1, 0), false))
            }
            // <=1.2.3 := <=1.2.3
            (Some(major), Some(minor), Some(patch)) => {
                Ok(VersionRange::below(Version::new(major, minor, patch), true))
            }
        }
    }

    fn evaluate_gt(partial: Partial, expr: &str) -> Result<VersionRange> {
        match partial {
            (None, ..) => Err(SolcError::InvalidVersionExpression(expr.to_string())),
            // >1.x.x := >=2.0.0
            (Some(major), None, _) => {
                Ok(VersionRange::from_lower(Version::new(major + 1, 0, 0), true))
            }
            // >1.2.x := >=1.3.0
            (Some(major), Some(minor), None) => {
                Ok(VersionRange::from_lower(Version::new(major, minor + 1, 0), true))
            }
            // >1.2.3 := >1.2.3
            (Some(major), Some(minor), Some(patch)) => {
                Ok(VersionRange::from_lower(Version::new(major, minor, patch), false))
            }
        }
    }

    fn evaluate_ge(partial: Partial) -> VersionRange {
        // >=x.x.x := >=0.0.0, >=1.2.x := >=1.2.0, >=1.2.3 := >=1.2.3
        let (major, minor, patch) = partial;
        VersionRange::from_lower(
            Version::new(major.unwrap_or(0), minor.unwrap_or(0), patch.unwrap_or(0)),
            true,
        )
    }

    fn evaluate_eq(partial: Partial) -> VersionRange {
        match partial {
            // x.x.x := >=0.0.0
            (None, ..) => VersionRange::any(),
            // 1.x.x := >=1.0.0 <2.0.0
            (Some(major), None, _) => VersionRange::bounded(
                Version::new(major, 0, 0),
                true,
                Version::new(major + 1, 0, 0),
                false,
            ),
            // 1.2.x := >=1.2.0 <1.3.0
            (Some(major), Some(minor), None) => VersionRange::bounded(
                Version::new(major, minor, 0),
                true,
                Version::new(major, minor + 1, 0),
                false,
            ),
            // 1.2.3 := >=1.2.3 <=1.2.3
            (Some(major), Some(minor), Some(patch)) => {
                let v = Version::new(major, minor, patch);
                VersionRange::bounded(v.clone(), true, v, true)
            }
        }
    }
}

impl FromStr for VersionExpr {
    type Err = SolcError;

    fn from_str(expr: &str) -> Result<Self> {
        if expr.trim().is_empty() {
            return Err(SolcError::EmptyVersionExpression);
        }

        let mut evaluated = Vec::new();
        for disjunct in expr.split("||") {
            if disjunct.contains('-') {
                evaluated.push(Self::parse_hyphen_range(disjunct)?);
            } else {
                evaluated.push(Self::parse_range(disjunct)?);
            }
        }
        Ok(Self { expression: expr.to_string(), ranges: VersionRanges::new(evaluated) })
    }
}

impl fmt::Display for VersionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn expr(s: &str) -> VersionExpr {
        s.parse().unwrap()
    }

    #[test]
    fn version_basic_usage() {
        let v1 = v("0.8.9-alpha.2+commit.12345678");
        assert_eq!(v1.major, 0);
        assert_eq!(v1.minor, 8);
        assert_eq!(v1.patch, 9);
        assert_eq!(v1.prerelease.as_deref(), Some("alpha.2"));
        assert_eq!(v1.build.as_deref(), Some("commit.12345678"));
        assert!(v1 < v("0.8.13"));
        assert!(v1 > v("0.8.7"));
        // prerelease and build tags are ignored in comparison
        assert_eq!(v1, v("0.8.9"));
        assert_eq!(v("0.8.9"), v("0.8.9-abc+def"));
    }

    #[test]
    fn version_display_round_trip() {
        let s = "1.2.3-abc.def-012-ABC-abc+xyz-123.XYZ";
        assert_eq!(v(s).to_string(), s);
        assert_eq!(v(&v(s).to_string()), v(s));
    }

    #[test]
    fn version_invalid() {
        for s in [">0.8.1", "=0.8.1", "v0.8.1", "x.8.1", "0.8", "0.8.01", "0.8.1 "] {
            assert!(
                matches!(s.parse::<Version>(), Err(SolcError::InvalidVersion(_))),
                "`{s}` should not parse"
            );
        }
    }

    #[test]
    fn range_empty_normalization() {
        assert!(VersionRange::bounded(v("1.2.3"), true, v("0.9.9"), false).is_empty());
        assert!(VersionRange::bounded(v("1.2.3"), true, v("1.2.3"), false).is_empty());
        assert!(VersionRange::bounded(v("1.2.3"), false, v("1.2.3"), true).is_empty());
        assert!(VersionRange::bounded(v("1.2.3"), false, v("1.2.3"), false).is_empty());
        assert!(!VersionRange::bounded(v("1.2.3"), true, v("1.2.3"), true).is_empty());
        assert_eq!(
            VersionRange::bounded(v("1.2.3"), true, v("0.9.9"), false),
            VersionRange::empty()
        );
    }

    #[test]
    fn range_contains() {
        let r1 = VersionRange::bounded(v("1.2.3"), true, v("2.0.0"), false);
        assert!(r1.contains(&v("1.2.3")));
        assert!(r1.contains(&v("1.2.4")));
        assert!(!r1.contains(&v("1.2.2")));
        assert!(!r1.contains(&v("2.0.0")));
        assert!(r1.contains(&v("1.9.999")));

        let r2 = VersionRange::bounded(v("0.8.9"), false, v("1.0.1"), true);
        assert!(!r2.contains(&v("0.8.9")));
        assert!(!r2.contains(&v("0.8.8")));
        assert!(r2.contains(&v("0.8.10")));
        assert!(r2.contains(&v("1.0.1")));
        assert!(r2.contains(&v("0.9.9")));

        let r3 = VersionRange::from_lower(v("0.8.1"), false);
        assert!(!r3.contains(&v("0.8.1")));
        assert!(r3.contains(&v("0.8.2")));
        assert!(r3.contains(&v("999999.999999.99999")));

        assert!(!VersionRange::empty().contains(&v("0.0.0")));
    }

    #[test]
    fn range_intersection() {
        let a = VersionRange::bounded(v("0.8.0"), true, v("0.9.0"), false);
        let b = VersionRange::bounded(v("0.8.5"), true, v("1.0.0"), true);
        let both = &a & &b;
        assert_eq!(both, VersionRange::bounded(v("0.8.5"), true, v("0.9.0"), false));

        // commutativity
        assert_eq!(&a & &b, &b & &a);

        // associativity
        let c = VersionRange::from_lower(v("0.8.7"), false);
        assert_eq!(&(&a & &b) & &c, &a & &(&b & &c));

        // exclusive endpoint dominates on ties
        let d = VersionRange::bounded(v("0.8.0"), false, v("0.9.0"), true);
        let tied = &a & &d;
        assert!(!tied.lower_inclusive());
        assert!(!tied.upper_inclusive());

        // empty is absorbing
        assert!((&a & &VersionRange::empty()).is_empty());
        assert!((&VersionRange::empty() & &a).is_empty());
    }

    #[test]
    fn membership_matches_intersection() {
        let a = VersionRange::bounded(v("0.7.0"), true, v("0.8.20"), false);
        let b = VersionRange::bounded(v("0.8.0"), true, v("0.9.0"), false);
        let both = &a & &b;
        for version in ["0.6.9", "0.7.0", "0.7.6", "0.8.0", "0.8.19", "0.8.20", "0.9.0"] {
            let version = v(version);
            assert_eq!(
                both.contains(&version),
                a.contains(&version) && b.contains(&version),
                "{version}"
            );
        }
    }

    #[test]
    fn ranges_union_intersection() {
        let a = VersionRanges::new([
            VersionRange::bounded(v("0.5.0"), true, v("0.6.0"), false),
            VersionRange::bounded(v("0.8.0"), true, v("0.9.0"), false),
        ]);
        let b = VersionRange::from_lower(v("0.5.8"), true).into();
        let both = &a & &b;
        assert_eq!(both.len(), 2);
        assert!(both.contains(&v("0.5.9")));
        assert!(!both.contains(&v("0.5.7")));
        assert!(both.contains(&v("0.8.1")));

        let disjoint = &a & &VersionRanges::from(VersionRange::from_lower(v("1.0.0"), true));
        assert!(disjoint.is_empty());
    }

    #[test]
    fn caret_expression() {
        // pragma solidity ^0.8.0;
        let e = expr("^0.8.0");
        assert_eq!(
            *e.ranges(),
            VersionRanges::from(VersionRange::bounded(v("0.8.0"), true, v("0.9.0"), false))
        );
        assert!(e.matches(&v("0.8.13")));
        assert!(!e.matches(&v("0.9.0")));
        assert!(!e.matches(&v("0.7.9")));

        assert_eq!(
            *expr("^1.2.3").ranges(),
            VersionRanges::from(VersionRange::bounded(v("1.2.3"), true, v("2.0.0"), false))
        );
        assert_eq!(
            *expr("^0.0.3").ranges(),
            VersionRanges::from(VersionRange::bounded(v("0.0.3"), true, v("0.0.4"), false))
        );
        assert_eq!(
            *expr("^0.2").ranges(),
            VersionRanges::from(VersionRange::bounded(v("0.2.0"), true, v("0.3.0"), false))
        );
        assert_eq!(
            *expr("^1.x").ranges(),
            VersionRanges::from(VersionRange::bounded(v("1.0.0"), true, v("2.0.0"), false))
        );
        assert!(expr_err("^0.0.0"));
        assert!(expr_err("^x.x.x"));
    }

    fn expr_err(s: &str) -> bool {
        s.parse::<VersionExpr>().is_err()
    }

    #[test]
    fn tilde_expression() {
        assert_eq!(
            *expr("~1.2.3").ranges(),
            VersionRanges::from(VersionRange::bounded(v("1.2.3"), true, v("1.3.0"), false))
        );
        assert_eq!(
            *expr("~1.2").ranges(),
            VersionRanges::from(VersionRange::bounded(v("1.2.0"), true, v("1.3.0"), false))
        );
        assert_eq!(
            *expr("~1").ranges(),
            VersionRanges::from(VersionRange::bounded(v("1.0.0"), true, v("2.0.0"), false))
        );
    }

    #[test]
    fn comparator_expressions() {
        assert_eq!(
            *expr("<1.2.x").ranges(),
            VersionRanges::from(VersionRange::below(v("1.2.0"), false))
        );
        assert_eq!(
            *expr("<=1.2.x").ranges(),
            VersionRanges::from(VersionRange::below(v("1.3.0"), false))
        );
        assert_eq!(
            *expr("<=1.2.3").ranges(),
            VersionRanges::from(VersionRange::below(v("1.2.3"), true))
        );
        assert_eq!(
            *expr(">1.2.x").ranges(),
            VersionRanges::from(VersionRange::from_lower(v("1.3.0"), true))
        );
        assert_eq!(
            *expr(">1.2.3").ranges(),
            VersionRanges::from(VersionRange::from_lower(v("1.2.3"), false))
        );
        assert_eq!(
            *expr(">=x.x.x").ranges(),
            VersionRanges::from(VersionRange::from_lower(v("0.0.0"), true))
        );
    }

    #[test]
    fn exact_and_wildcard_expressions() {
        assert_eq!(
            *expr("=1.2.3").ranges(),
            VersionRanges::from(VersionRange::bounded(v("1.2.3"), true, v("1.2.3"), true))
        );
        assert_eq!(expr("1.2.3").ranges(), expr("=1.2.3").ranges());
        assert_eq!(
            *expr("1.2.x").ranges(),
            VersionRanges::from(VersionRange::bounded(v("1.2.0"), true, v("1.3.0"), false))
        );
        assert_eq!(
            *expr("1.X").ranges(),
            VersionRanges::from(VersionRange::bounded(v("1.0.0"), true, v("2.0.0"), false))
        );
        assert_eq!(*expr("*").ranges(), VersionRanges::any());
    }

    #[test]
    fn conjunction_by_whitespace() {
        let e = expr(">=0.8.0 <0.9.0");
        assert_eq!(
            *e.ranges(),
            VersionRanges::from(VersionRange::bounded(v("0.8.0"), true, v("0.9.0"), false))
        );

        // whitespace around operators and inside triples is permitted
        let e = expr(">= 1.2.3 <= 7.8.9");
        assert_eq!(
            *e.ranges(),
            VersionRanges::from(VersionRange::bounded(v("1.2.3"), true, v("7.8.9"), true))
        );
    }

    #[test]
    fn hyphen_ranges() {
        let e = expr("1.2.3 - 2.3.4");
        assert_eq!(
            *e.ranges(),
            VersionRanges::from(VersionRange::bounded(v("1.2.3"), true, v("2.3.4"), true))
        );

        // missing positions on the right take the next tick
        let e = expr("1.2 - 2.3");
        assert_eq!(
            *e.ranges(),
            VersionRanges::from(VersionRange::bounded(v("1.2.0"), true, v("2.4.0"), false))
        );

        // exotic whitespace is fine
        let e = expr("1.2.3 \t-\r\n 4.5.6");
        assert_eq!(
            *e.ranges(),
            VersionRanges::from(VersionRange::bounded(v("1.2.3"), true, v("4.5.6"), true))
        );

        assert!(expr_err(">=1.2.3 - <=4.5.6"));
        assert!(expr_err("~1.2.3 - ^4.5.6"));
        assert!(expr_err("1.2.3 - 4.5.6 - 7.8.9"));
    }

    #[test]
    fn disjunction() {
        // every version with major 0 matches, no version with major >= 1 does
        let e = expr("~0 || >=1.0.0 <1 || ^0");
        for version in ["0.0.0", "0.4.11", "0.8.26", "0.999.999"] {
            assert!(e.matches(&v(version)), "{version}");
        }
        for version in ["1.0.0", "1.2.3", "2.0.0"] {
            assert!(!e.matches(&v(version)), "{version}");
        }
    }

    #[test]
    fn invalid_expressions() {
        for s in ["", "   ", "x.2.3", "1.x.5", "^", ">=", "abc", "0.8.0 qq", "||"] {
            assert!(expr_err(s), "`{s}` should not parse");
        }
        assert!(matches!("".parse::<VersionExpr>(), Err(SolcError::EmptyVersionExpression)));
        assert!(matches!(" \t".parse::<VersionExpr>(), Err(SolcError::EmptyVersionExpression)));
    }
}
