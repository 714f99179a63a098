//! Function references: `group/name[@version]`

use std::fmt;
use std::str::FromStr;

use crate::error::KaffineError;

/// A parsed `group/name[@version]` reference
///
/// The group is optional (`Logger`, `Logger@v1`), as is the version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub group: Option<String>,
    pub name: String,
    pub version: Option<String>,
}

impl FunctionRef {
    /// `group/name`, or just `name` without a group
    pub fn group_name(&self) -> String {
        match &self.group {
            Some(group) => format!("{}/{}", group, self.name),
            None => self.name.clone(),
        }
    }
}

impl FromStr for FunctionRef {
    type Err = KaffineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| KaffineError::InvalidReference {
            reference: s.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        let (path, version) = match trimmed.split_once('@') {
            Some((path, version)) => {
                if version.is_empty() {
                    return Err(invalid("version after '@' is empty"));
                }
                if version.contains('@') {
                    return Err(invalid("more than one '@'"));
                }
                (path, Some(version.to_string()))
            }
            None => (trimmed, None),
        };

        let (group, name) = match path.rsplit_once('/') {
            Some((group, name)) => {
                if group.is_empty() {
                    return Err(invalid("group before '/' is empty"));
                }
                (Some(group.to_string()), name)
            }
            None => (None, path),
        };

        if name.is_empty() {
            return Err(invalid("function name is empty"));
        }

        Ok(Self {
            group,
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.group_name())?;
        if let Some(version) = &self.version {
            write!(f, "@{version}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod reference_tests {
    use super::*;

    #[test]
    fn test_parse_full_reference() {
        let r: FunctionRef = "acme/Logger@v1.0.0".parse().unwrap();
        assert_eq!(r.group.as_deref(), Some("acme"));
        assert_eq!(r.name, "Logger");
        assert_eq!(r.version.as_deref(), Some("v1.0.0"));
        assert_eq!(r.group_name(), "acme/Logger");
        assert_eq!(r.to_string(), "acme/Logger@v1.0.0");
    }

    #[test]
    fn test_parse_partial_references() {
        let r: FunctionRef = "Logger".parse().unwrap();
        assert_eq!(r.group, None);
        assert_eq!(r.version, None);
        assert_eq!(r.group_name(), "Logger");

        let r: FunctionRef = "Logger@v1.0.0".parse().unwrap();
        assert_eq!(r.group, None);
        assert_eq!(r.version.as_deref(), Some("v1.0.0"));

        // Groups may be dotted or nested; the last segment is the name
        let r: FunctionRef = "example.com/tools/Logger".parse().unwrap();
        assert_eq!(r.group.as_deref(), Some("example.com/tools"));
        assert_eq!(r.name, "Logger");
    }

    #[test]
    fn test_reject_malformed_references() {
        for bad in ["", "acme/", "/Logger", "Logger@", "a/b@v1@v2", "@v1"] {
            assert!(bad.parse::<FunctionRef>().is_err(), "accepted {bad:?}");
        }
    }
}
