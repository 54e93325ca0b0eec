//! Path filters for exports and imports
//!
//! A filter is an ordered list of `(pattern, include | exclude)` rules with
//! an explicit default. The first rule whose pattern matches a path decides;
//! when none match, the default applies. Rules are never reordered or merged.
//!
//! Module filters see a resource through its directory (see
//! [`PathFilter::accepts_resource`]): `nested` covers `nested/a.txt`, and a
//! class is matched by its package directory.
//!
//! Patterns are slash-separated segments:
//! - a literal segment matches itself
//! - `*` matches exactly one segment
//! - `**` matches zero or more segments and must be a whole segment
//! - `*` and `?` inside a segment (`*.class`) match within that segment only

use crate::error::ModuleError;
use crate::root::resource_dir;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a filter rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterAction {
    Include,
    Exclude,
}

impl fmt::Display for FilterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterAction::Include => write!(f, "include"),
            FilterAction::Exclude => write!(f, "exclude"),
        }
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Glob(glob::Pattern),
    Any,
    Recursive,
}

impl Segment {
    fn compile(pattern: &str, segment: &str) -> Result<Self, ModuleError> {
        match segment {
            "**" => Ok(Segment::Recursive),
            "*" => Ok(Segment::Any),
            s if s.contains("**") => Err(ModuleError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: format!("'**' must be a whole path segment, found '{}'", s),
            }),
            s if s.contains(['*', '?', '[']) => glob::Pattern::new(s)
                .map(Segment::Glob)
                .map_err(|e| ModuleError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.msg.to_string(),
                }),
            s => Ok(Segment::Literal(s.to_string())),
        }
    }

    fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::Literal(literal) => literal == segment,
            Segment::Glob(glob) => glob.matches(segment),
            Segment::Any => true,
            // Handled by the sequence matcher
            Segment::Recursive => false,
        }
    }
}

/// Compiled path pattern
#[derive(Debug, Clone)]
pub struct PathPattern {
    text: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a pattern such as `org/example/**` or `META-INF/*.toml`
    pub fn new(text: &str) -> Result<Self, ModuleError> {
        let segments = split_path(text)
            .map(|segment| Segment::compile(text, segment))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            text: text.to_string(),
            segments,
        })
    }

    /// Pattern as written
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Check whether a slash-separated path matches this pattern
    pub fn matches(&self, path: &str) -> bool {
        let path: Vec<&str> = split_path(path).collect();
        match_segments(&self.segments, &path)
    }
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::Recursive, rest)) => {
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((segment, rest)) => match path.split_first() {
            Some((head, tail)) => segment.matches(head) && match_segments(rest, tail),
            None => false,
        },
    }
}

/// Leading, trailing and doubled slashes carry no segment
fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// One `(pattern, action)` rule
#[derive(Debug, Clone)]
pub struct FilterRule {
    pub pattern: PathPattern,
    pub action: FilterAction,
}

/// Ordered, first-match-wins path filter
#[derive(Debug, Clone)]
pub struct PathFilter {
    rules: Vec<FilterRule>,
    default: FilterAction,
}

impl PathFilter {
    /// Filter that accepts every path
    pub fn accept_all() -> Self {
        Self {
            rules: Vec::new(),
            default: FilterAction::Include,
        }
    }

    /// Filter that rejects every path
    pub fn reject_all() -> Self {
        Self {
            rules: Vec::new(),
            default: FilterAction::Exclude,
        }
    }

    pub fn builder() -> PathFilterBuilder {
        PathFilterBuilder::default()
    }

    /// Action of the first matching rule, or the default
    pub fn action_for(&self, path: &str) -> FilterAction {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .map(|rule| rule.action)
            .unwrap_or(self.default)
    }

    /// Check whether a path passes the filter
    pub fn accepts(&self, path: &str) -> bool {
        self.action_for(path) == FilterAction::Include
    }

    /// Check whether the resource at `path` passes the filter
    ///
    /// Rules are matched against the resource's directory.
    pub fn accepts_resource(&self, path: &str) -> bool {
        self.accepts(resource_dir(path))
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    pub fn default_action(&self) -> FilterAction {
        self.default
    }

    /// True if the filter cannot reject anything
    pub fn is_accept_all(&self) -> bool {
        self.default == FilterAction::Include
            && self.rules.iter().all(|r| r.action == FilterAction::Include)
    }

    /// True if the filter cannot accept anything
    pub fn is_reject_all(&self) -> bool {
        self.default == FilterAction::Exclude
            && self.rules.iter().all(|r| r.action == FilterAction::Exclude)
    }
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::accept_all()
    }
}

impl fmt::Display for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rules.is_empty() {
            return match self.default {
                FilterAction::Include => write!(f, "all"),
                FilterAction::Exclude => write!(f, "none"),
            };
        }
        for rule in &self.rules {
            write!(f, "{} {}, ", rule.action, rule.pattern.as_str())?;
        }
        write!(f, "otherwise {}", self.default)
    }
}

/// Collects rules as text; patterns are compiled by [`PathFilterBuilder::build`]
#[derive(Debug, Clone, Default)]
pub struct PathFilterBuilder {
    rules: Vec<(String, FilterAction)>,
    default: Option<FilterAction>,
}

impl PathFilterBuilder {
    pub fn include(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.rule(pattern, FilterAction::Include)
    }

    pub fn exclude(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.rule(pattern, FilterAction::Exclude)
    }

    /// Append a rule after all existing ones
    pub fn rule(&mut self, pattern: impl Into<String>, action: FilterAction) -> &mut Self {
        self.rules.push((pattern.into(), action));
        self
    }

    /// Set the action used when no rule matches
    pub fn default_action(&mut self, action: FilterAction) -> &mut Self {
        self.default = Some(action);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.default.is_none()
    }

    /// Compile all patterns
    ///
    /// Without an explicit default, a filter made only of include rules
    /// defaults to exclude (an allow-list); any other filter defaults to
    /// include.
    pub fn build(&self) -> Result<PathFilter, ModuleError> {
        let rules = self
            .rules
            .iter()
            .map(|(pattern, action)| {
                Ok(FilterRule {
                    pattern: PathPattern::new(pattern)?,
                    action: *action,
                })
            })
            .collect::<Result<Vec<_>, ModuleError>>()?;

        let inferred = if !rules.is_empty()
            && rules.iter().all(|r| r.action == FilterAction::Include)
        {
            FilterAction::Exclude
        } else {
            FilterAction::Include
        };

        Ok(PathFilter {
            rules,
            default: self.default.unwrap_or(inferred),
        })
    }
}
