//! Document path templates such as `users/{userId}/emails/{emailId}`.
//!
//! A template is a `/`-separated list of segments; a segment is either a
//! literal collection/document name or a `{param}` wildcard that captures
//! exactly one non-empty path segment.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path template")]
    Empty,
    #[error("empty segment in path template {0:?}")]
    EmptySegment(String),
    #[error("malformed wildcard segment {0:?}")]
    MalformedWildcard(String),
    #[error("duplicate wildcard {{{0}}}")]
    DuplicateWildcard(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed document path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

/// Wildcard values captured by [`PathTemplate::matches`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(BTreeMap<String, String>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl PathTemplate {
    /// Parse a template. Leading and trailing slashes are ignored.
    pub fn parse(template: &str) -> Result<Self, PathError> {
        let trimmed = template.trim_matches('/');
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = Vec::new();
        let mut seen = Vec::new();
        for part in trimmed.split('/') {
            if part.is_empty() {
                return Err(PathError::EmptySegment(template.to_string()));
            }
            if let Some(inner) = part.strip_prefix('{') {
                let name = inner
                    .strip_suffix('}')
                    .filter(|n| !n.is_empty() && !n.contains(['{', '}']))
                    .ok_or_else(|| PathError::MalformedWildcard(part.to_string()))?;
                if seen.contains(&name) {
                    return Err(PathError::DuplicateWildcard(name.to_string()));
                }
                seen.push(name);
                segments.push(Segment::Param(name.to_string()));
            } else if part.contains(['{', '}']) {
                return Err(PathError::MalformedWildcard(part.to_string()));
            } else {
                segments.push(Segment::Literal(part.to_string()));
            }
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    /// Match a relative document path, returning captured wildcards.
    ///
    /// Returns `None` if the segment count differs, a literal differs, or a
    /// wildcard would capture an empty segment.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(PathParams(params))
    }

    /// Names of the wildcards, in template order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emails() -> PathTemplate {
        PathTemplate::parse("users/{userId}/emails/{emailId}").unwrap()
    }

    #[test]
    fn captures_wildcards() {
        let params = emails().matches("users/u-42/emails/msg-7").unwrap();
        assert_eq!(params.get("userId"), Some("u-42"));
        assert_eq!(params.get("emailId"), Some("msg-7"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn ignores_surrounding_slashes() {
        let t = PathTemplate::parse("/users/{userId}/emails/{emailId}/").unwrap();
        assert_eq!(t.as_str(), "users/{userId}/emails/{emailId}");
        assert!(t.matches("/users/a/emails/b").is_some());
    }

    #[test]
    fn rejects_wrong_literal_or_depth() {
        let t = emails();
        assert!(t.matches("users/a/drafts/b").is_none());
        assert!(t.matches("users/a/emails").is_none());
        assert!(t.matches("users/a/emails/b/attachments/c").is_none());
    }

    #[test]
    fn wildcard_never_matches_empty_segment() {
        assert!(emails().matches("users//emails/b").is_none());
    }

    #[test]
    fn param_names_in_order() {
        let t = emails();
        let names: Vec<&str> = t.params().collect();
        assert_eq!(names, vec!["userId", "emailId"]);
    }

    #[test]
    fn parse_errors() {
        assert_eq!(PathTemplate::parse("/"), Err(PathError::Empty));
        assert!(matches!(
            PathTemplate::parse("users//emails"),
            Err(PathError::EmptySegment(_))
        ));
        assert!(matches!(
            PathTemplate::parse("users/{userId/emails"),
            Err(PathError::MalformedWildcard(_))
        ));
        assert!(matches!(
            PathTemplate::parse("users/{}/emails"),
            Err(PathError::MalformedWildcard(_))
        ));
        assert!(matches!(
            PathTemplate::parse("users/x{id}"),
            Err(PathError::MalformedWildcard(_))
        ));
        assert_eq!(
            PathTemplate::parse("users/{id}/emails/{id}"),
            Err(PathError::DuplicateWildcard("id".into()))
        );
    }
}
