use crate::version::SemanticVersion;
use std::fmt;

/// A dependency on `id` with optional inclusive version bounds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemanticDependency {
    id: String,
    min: Option<SemanticVersion>,
    max: Option<SemanticVersion>,
}

impl SemanticDependency {
    pub fn new(
        id: impl Into<String>,
        min: Option<SemanticVersion>,
        max: Option<SemanticVersion>,
    ) -> Self {
        Self {
            id: id.into(),
            min,
            max,
        }
    }

    /// A dependency accepting any version of `id`
    pub fn any(id: impl Into<String>) -> Self {
        Self::new(id, None, None)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn min(&self) -> Option<SemanticVersion> {
        self.min
    }

    pub fn max(&self) -> Option<SemanticVersion> {
        self.max
    }

    /// Check whether package `id` at `version` satisfies this dependency
    pub fn matches(&self, id: &str, version: SemanticVersion) -> bool {
        id == self.id
            && self.min.map_or(true, |min| min <= version)
            && self.max.map_or(true, |max| max >= version)
    }
}

impl fmt::Display for SemanticDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |v: Option<SemanticVersion>| v.map_or_else(|| "_".to_string(), |v| v.to_string());
        write!(f, "{}[{},{}]", self.id, bound(self.min), bound(self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const V1: SemanticVersion = SemanticVersion::new(1, 0, 0);
    const V2: SemanticVersion = SemanticVersion::new(2, 0, 0);

    #[rstest]
    #[case(Some(V1), Some(V2), "1.0.0", true)]
    #[case(Some(V1), Some(V2), "2.0.0", true)]
    #[case(Some(V1), Some(V2), "1.5.3", true)]
    #[case(Some(V1), Some(V2), "0.9.9", false)]
    #[case(Some(V1), Some(V2), "2.0.1", false)]
    #[case(None, Some(V2), "0.0.1", true)]
    #[case(Some(V1), None, "99.0.0", true)]
    #[case(None, None, "0.0.0", true)]
    fn test_matches_bounds(
        #[case] min: Option<SemanticVersion>,
        #[case] max: Option<SemanticVersion>,
        #[case] version: &str,
        #[case] expected: bool,
    ) {
        let dep = SemanticDependency::new("json", min, max);
        let version = SemanticVersion::parse(version).unwrap();
        assert_eq!(dep.matches("json", version), expected);
    }

    #[test]
    fn test_matches_requires_same_id() {
        let dep = SemanticDependency::any("json");
        assert!(!dep.matches("xml", V1));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            SemanticDependency::new("json", Some(V1), None).to_string(),
            "json[1.0.0,_]"
        );
        assert_eq!(SemanticDependency::any("xml").to_string(), "xml[_,_]");
    }
}
