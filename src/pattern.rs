//! Regex matching of a single reference into batch identifiers.

use regex::Regex;

use crate::config::RegexConfig;
use crate::data::BatchIdentifiers;
use crate::errors::ConnectorError;
use crate::types::GroupName;

/// Compiled regex plus one name per capturing group.
///
/// Matching is anchored at the start of the reference but not at its end.
/// Invariant: `group_names.len()` equals the pattern's capturing-group count.
#[derive(Clone, Debug)]
pub struct PatternMatcher {
    source: String,
    regex: Regex,
    group_names: Vec<GroupName>,
}

impl PatternMatcher {
    /// Compile `pattern` and bind `group_names` to its capturing groups positionally.
    pub fn new<I, S>(pattern: &str, group_names: I) -> Result<Self, ConnectorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<GroupName>,
    {
        let regex = Regex::new(&format!(r"\A(?:{pattern})")).map_err(|err| {
            ConnectorError::Configuration(format!("invalid pattern '{pattern}': {err}"))
        })?;
        let group_names: Vec<GroupName> = group_names.into_iter().map(Into::into).collect();
        // captures_len counts the implicit whole-match group.
        let capturing = regex.captures_len() - 1;
        if capturing != group_names.len() {
            return Err(ConnectorError::Configuration(format!(
                "pattern '{pattern}' has {capturing} capturing group(s) but {} group name(s) were declared: {group_names:?}",
                group_names.len()
            )));
        }
        for (idx, name) in group_names.iter().enumerate() {
            if group_names[..idx].contains(name) {
                return Err(ConnectorError::Configuration(format!(
                    "group name '{name}' is declared more than once for pattern '{pattern}'"
                )));
            }
        }
        Ok(Self {
            source: pattern.to_string(),
            regex,
            group_names,
        })
    }

    /// Compile from a config entry.
    pub fn from_config(config: &RegexConfig) -> Result<Self, ConnectorError> {
        Self::new(&config.pattern, config.group_names.iter().cloned())
    }

    /// Pattern source text.
    pub fn pattern(&self) -> &str {
        &self.source
    }

    /// Declared group names, in group order.
    pub fn group_names(&self) -> &[GroupName] {
        &self.group_names
    }

    /// Apply the pattern to `reference`.
    ///
    /// Returns `None` when the pattern does not match. A group that does not
    /// participate in the match yields an empty value so the identifier keys
    /// always equal the declared group names.
    pub fn match_reference(&self, reference: &str) -> Option<BatchIdentifiers> {
        let captures = self.regex.captures(reference)?;
        Some(
            self.group_names
                .iter()
                .enumerate()
                .map(|(idx, name)| {
                    let value = captures
                        .get(idx + 1)
                        .map(|m| m.as_str())
                        .unwrap_or_default();
                    (name.clone(), value.to_string())
                })
                .collect(),
        )
    }

    /// True when both matchers use the same pattern text and group names.
    pub fn same_as(&self, other: &PatternMatcher) -> bool {
        self.pattern() == other.pattern() && self.group_names == other.group_names
    }
}
