//! Semantic versions
//!
//! Package versions are plain `major.minor.micro` triples of decimal
//! integers. Leading zeros are accepted (`1.02.0` is `1.2.0`); signs,
//! whitespace, pre-release and build metadata are not.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Invalid version '{input}': {reason}")]
    Format { input: String, reason: String },
}

impl VersionError {
    fn format(input: &str, reason: impl fmt::Display) -> Self {
        VersionError::Format {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A `major.minor.micro` version, ordered component-wise
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemanticVersion {
    major: u64,
    minor: u64,
    micro: u64,
}

impl SemanticVersion {
    pub const fn new(major: u64, minor: u64, micro: u64) -> Self {
        Self {
            major,
            minor,
            micro,
        }
    }

    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let parts: Vec<&str> = input.split('.').collect();
        let [major, minor, micro] = parts[..] else {
            return Err(VersionError::format(
                input,
                format!("expected 3 components, found {}", parts.len()),
            ));
        };
        Ok(Self::new(
            Self::component(input, major)?,
            Self::component(input, minor)?,
            Self::component(input, micro)?,
        ))
    }

    fn component(input: &str, part: &str) -> Result<u64, VersionError> {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(VersionError::format(
                input,
                format!("'{}' is not a non-negative integer", part),
            ));
        }
        part.parse().map_err(|e| VersionError::format(input, e))
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn micro(&self) -> u64 {
        self.micro
    }

    /// Versions sharing a major component are compatible
    pub fn is_compatible_with(&self, other: &SemanticVersion) -> bool {
        self.major == other.major
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

impl FromStr for SemanticVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<SemanticVersion> for semver::Version {
    fn from(version: SemanticVersion) -> Self {
        semver::Version::new(version.major, version.minor, version.micro)
    }
}

impl TryFrom<semver::Version> for SemanticVersion {
    type Error = VersionError;

    fn try_from(version: semver::Version) -> Result<Self, Self::Error> {
        if !version.pre.is_empty() || !version.build.is_empty() {
            return Err(VersionError::format(
                &version.to_string(),
                "pre-release and build metadata are not allowed",
            ));
        }
        Ok(Self::new(version.major, version.minor, version.patch))
    }
}

impl Serialize for SemanticVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemanticVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::cmp::Ordering;

    #[rstest]
    #[case("0.0.0", SemanticVersion::new(0, 0, 0))]
    #[case("1.2.3", SemanticVersion::new(1, 2, 3))]
    #[case("10.20.30", SemanticVersion::new(10, 20, 30))]
    #[case("1.02.0", SemanticVersion::new(1, 2, 0))]
    #[case("01.0.007", SemanticVersion::new(1, 0, 7))]
    fn test_parse_valid(#[case] input: &str, #[case] expected: SemanticVersion) {
        assert_eq!(SemanticVersion::parse(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("1")]
    #[case("1.2")]
    #[case("1.2.3.4")]
    #[case("1..3")]
    #[case("1.2.3-alpha")]
    #[case("1.2.3+build.5")]
    #[case("-1.2.3")]
    #[case(" 1.2.3")]
    #[case("v1.2.3")]
    #[case("a.b.c")]
    #[case("1.+2.3")]
    #[case("1.2. 3")]
    #[case("1.2.99999999999999999999")]
    fn test_parse_invalid(#[case] input: &str) {
        assert!(matches!(
            SemanticVersion::parse(input),
            Err(VersionError::Format { .. })
        ));
    }

    #[test]
    fn test_compare() {
        let a = SemanticVersion::parse("1.2.3").unwrap();
        let b = SemanticVersion::parse("1.2.4").unwrap();
        assert_eq!(a.cmp(&b), Ordering::Less);
        assert!(SemanticVersion::new(2, 0, 0) > SemanticVersion::new(1, 99, 99));
        assert!(SemanticVersion::new(1, 10, 0) > SemanticVersion::new(1, 9, 9));
    }

    #[test]
    fn test_compatibility() {
        let v = SemanticVersion::new(1, 4, 0);
        assert!(v.is_compatible_with(&SemanticVersion::new(1, 0, 0)));
        assert!(!v.is_compatible_with(&SemanticVersion::new(2, 4, 0)));
    }

    #[test]
    fn test_semver_conversions() {
        let v = SemanticVersion::new(3, 1, 4);
        let sv: semver::Version = v.into();
        assert_eq!(sv, semver::Version::new(3, 1, 4));
        assert_eq!(SemanticVersion::try_from(sv).unwrap(), v);

        let pre = semver::Version::parse("1.0.0-rc.1").unwrap();
        assert!(SemanticVersion::try_from(pre).is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let v = SemanticVersion::new(0, 9, 12);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"0.9.12\"");
        let back: SemanticVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
        assert!(serde_json::from_str::<SemanticVersion>("\"0.9\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_display_parse_round_trip(major in 0u64..10_000, minor in 0u64..10_000, micro in 0u64..10_000) {
            let v = SemanticVersion::new(major, minor, micro);
            prop_assert_eq!(SemanticVersion::parse(&v.to_string()).unwrap(), v);
        }

        #[test]
        fn prop_order_matches_tuple_order(
            a in (0u64..5, 0u64..5, 0u64..5),
            b in (0u64..5, 0u64..5, 0u64..5),
        ) {
            let va = SemanticVersion::new(a.0, a.1, a.2);
            let vb = SemanticVersion::new(b.0, b.1, b.2);
            prop_assert_eq!(va.cmp(&vb), a.cmp(&b));
        }
    }
}
