//! Ignore rules for unit-of-work capture
//!
//! A rule is either an exact string or a `re:` prefixed regex. Each rule is
//! tested against `"METHOD path"` and against the bare path, so `"GET /up"`
//! ignores only GETs while `"/up"` ignores every method. Paths such as
//! `/admin/` are always exact.

use regex::Regex;

/// Prefix marking a rule as a regular expression
pub const PATTERN_PREFIX: &str = "re:";

/// One configured ignore rule
#[derive(Debug, Clone)]
pub enum IgnoreRule {
    Exact(String),
    Pattern(Regex),
}

impl IgnoreRule {
    /// Parse a rule; `re:^/assets/` compiles as a regex, anything else is exact
    pub fn parse(rule: &str) -> Result<Self, regex::Error> {
        let rule = rule.trim();
        match rule.strip_prefix(PATTERN_PREFIX) {
            Some(pattern) => Ok(Self::Pattern(Regex::new(pattern.trim())?)),
            None => Ok(Self::Exact(rule.to_string())),
        }
    }

    pub fn matches_text(&self, text: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == text,
            Self::Pattern(re) => re.is_match(text),
        }
    }

    pub fn matches(&self, method: &str, path: &str) -> bool {
        self.matches_text(&format!("{} {}", method, path)) || self.matches_text(path)
    }
}

/// Compiled ignore rules plus the collector's own mount path
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    mount_path: String,
    rules: Vec<IgnoreRule>,
}

impl IgnoreRules {
    /// Compile rules, skipping (and logging) any that fail to parse
    ///
    /// Configuration validation rejects bad rules up front; this only guards
    /// callers that build rules outside of `AppConfig`.
    pub fn new(mount_path: &str, rules: &[String]) -> Self {
        let rules = rules
            .iter()
            .filter(|r| !r.trim().is_empty())
            .filter_map(|r| match IgnoreRule::parse(r) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    tracing::warn!(rule = %r, error = %e, "Skipping invalid ignore rule");
                    None
                }
            })
            .collect();

        Self {
            mount_path: mount_path.trim_end_matches('/').to_string(),
            rules,
        }
    }

    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    /// Whether a path lies under the collector's own mount path
    pub fn is_self_path(&self, path: &str) -> bool {
        if self.mount_path.is_empty() {
            return false;
        }
        match path.strip_prefix(self.mount_path.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    pub fn is_ignored(&self, method: &str, path: &str) -> bool {
        self.is_self_path(path) || self.rules.iter().any(|r| r.matches(method, path))
    }

    /// Job names are matched as plain text
    pub fn is_ignored_job(&self, job_name: &str) -> bool {
        self.rules.iter().any(|r| r.matches_text(job_name))
    }
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self::new(crate::core::constants::DEFAULT_MOUNT_PATH, &[])
    }
}
