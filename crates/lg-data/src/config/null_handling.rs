//! Missing-value detection for imported cells

use serde::{Deserialize, Serialize};

/// Cell contents that count as "no value"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NullConfig {
    /// Patterns to treat as missing
    pub patterns: Vec<String>,

    /// Whether to trim whitespace before checking
    pub trim_whitespace: bool,

    /// Case sensitive matching
    pub case_sensitive: bool,
}

impl Default for NullConfig {
    fn default() -> Self {
        Self::from_patterns(["", "-", "N/A", "null", "none"])
    }
}

impl NullConfig {
    /// Build a case-insensitive, whitespace-trimming config
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = Self {
            patterns: Vec::new(),
            trim_whitespace: true,
            case_sensitive: false,
        };
        for pattern in patterns {
            config.add_pattern(pattern.into());
        }
        // An empty cell is always missing
        config.add_pattern(String::new());
        config
    }

    /// Check if a value should be treated as missing
    pub fn is_null(&self, value: &str) -> bool {
        let test_value = if self.trim_whitespace { value.trim() } else { value };

        self.patterns.iter().any(|pattern| {
            if self.case_sensitive {
                test_value == pattern
            } else {
                test_value.eq_ignore_ascii_case(pattern)
            }
        })
    }

    /// The cell's content, or `None` when it counts as missing
    pub fn cell<'a>(&self, raw: &'a str) -> Option<&'a str> {
        if self.is_null(raw) {
            None
        } else if self.trim_whitespace {
            Some(raw.trim())
        } else {
            Some(raw)
        }
    }

    /// Add a pattern
    pub fn add_pattern(&mut self, pattern: String) {
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }
}
