//! Target repository parsing.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static REPOSITORY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_-]+)/([A-Za-z0-9_.-]+)$")
        .expect("repository pattern is a valid regex")
});

/// A GitHub repository addressed as `organization/name`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetRepository {
    pub organization: String,
    pub name: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid repository format detected ('{0}'), expected owner/repo")]
pub struct RepositoryParseError(pub String);

impl TargetRepository {
    pub fn parse(value: &str) -> Result<Self, RepositoryParseError> {
        let captures = REPOSITORY_PATTERN
            .captures(value)
            .ok_or_else(|| RepositoryParseError(value.to_string()))?;
        Ok(Self {
            organization: captures[1].to_string(),
            name: captures[2].to_string(),
        })
    }
}

impl FromStr for TargetRepository {
    type Err = RepositoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TargetRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.organization, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_owner_and_name() {
        let repo = TargetRepository::parse("acme/widgets").unwrap();
        assert_eq!(repo.organization, "acme");
        assert_eq!(repo.name, "widgets");
        assert_eq!(repo.to_string(), "acme/widgets");
    }

    #[test]
    fn test_dots_allowed_in_name_only() {
        assert!(TargetRepository::parse("acme/widgets.js").is_ok());
        assert!(TargetRepository::parse("ac.me/widgets").is_err());
    }

    #[test]
    fn test_rejects_malformed_strings() {
        for bad in ["acme", "acme/widgets/extra", "/widgets", "acme/", "", "acme widgets/x"] {
            let err = TargetRepository::parse(bad).unwrap_err();
            assert_eq!(err, RepositoryParseError(bad.to_string()), "input: {bad:?}");
        }
    }
}
