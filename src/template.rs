//! Placeholder expansion for attachment patterns.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Expands placeholder tokens in a raw pattern before it is split into globs.
pub trait TemplateExpander: Send + Sync {
    fn expand(&self, raw: &str) -> String;
}

/// Matches `${NAME}` or `$NAME`.
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("token regex is valid")
});

/// Expands `${NAME}` and `$NAME` from a variable map, like build
/// environment variables. Unknown tokens are left untouched.
#[derive(Debug, Clone, Default)]
pub struct EnvExpander {
    vars: HashMap<String, String>,
}

impl EnvExpander {
    pub fn new(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }

    /// Expander over the current process environment.
    pub fn from_env() -> Self {
        Self::new(std::env::vars().collect())
    }

    /// Parse `KEY=VALUE` assignments. Entries without `=` are ignored.
    pub fn from_assignments<I, S>(assignments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let vars = assignments
            .into_iter()
            .filter_map(|a| {
                a.as_ref()
                    .split_once('=')
                    .map(|(k, v)| (k.trim().to_string(), v.to_string()))
            })
            .collect();
        Self::new(vars)
    }

    /// Add or replace a variable.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Layer `other` on top of `self`; later values win.
    pub fn merged(mut self, other: EnvExpander) -> Self {
        self.vars.extend(other.vars);
        self
    }
}

impl TemplateExpander for EnvExpander {
    fn expand(&self, raw: &str) -> String {
        TOKEN
            .replace_all(raw, |caps: &Captures<'_>| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                match self.vars.get(name) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expands_both_forms() {
        let exp = EnvExpander::from_assignments(["BUILD_NUMBER=42", "JOB=core"]);
        assert_eq!(
            exp.expand("logs/${JOB}-$BUILD_NUMBER.log"),
            "logs/core-42.log"
        );
    }

    #[test]
    fn test_unknown_tokens_left_verbatim() {
        let exp = EnvExpander::default();
        assert_eq!(exp.expand("${MISSING}/*.log, $ALSO"), "${MISSING}/*.log, $ALSO");
    }

    #[test]
    fn test_value_may_contain_commas() {
        let exp = EnvExpander::from_assignments(["REPORTS=a/*.xml,b/*.xml"]);
        assert_eq!(exp.expand("${REPORTS}, *.log"), "a/*.xml,b/*.xml, *.log");
    }

    #[test]
    fn test_merged_later_wins() {
        let base = EnvExpander::from_assignments(["A=1", "B=2"]);
        let over = EnvExpander::from_assignments(["B=3"]);
        assert_eq!(base.merged(over).expand("$A$B"), "13");
    }
}
