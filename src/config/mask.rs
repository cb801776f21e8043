//! Test name masks
//!
//! `~` matches any run of characters, `*` matches any run of characters
//! except `.`, everything else is literal.

use regex::Regex;
use std::fmt;

/// A compiled test name mask, matched against `Suite.method` names
#[derive(Clone, Debug)]
pub struct TestMask {
    source: String,
    pattern: Regex,
}

impl TestMask {
    pub fn new(mask: &str) -> Result<Self, regex::Error> {
        let source = mask.trim().to_string();
        let pattern = Regex::new(&mask_to_pattern(&source))?;
        Ok(Self { source, pattern })
    }

    /// Mask as it was written
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Compiled pattern text
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn is_match(&self, full_name: &str) -> bool {
        self.pattern.is_match(full_name)
    }
}

impl fmt::Display for TestMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl PartialEq for TestMask {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

fn mask_to_pattern(mask: &str) -> String {
    let mut pattern = String::with_capacity(mask.len() * 2 + 2);
    pattern.push('^');
    let mut literal = String::new();

    for ch in mask.chars() {
        let wildcard = match ch {
            '~' => ".*",
            '*' => "[^.]*",
            _ => {
                literal.push(ch);
                continue;
            }
        };
        pattern.push_str(&regex::escape(&literal));
        literal.clear();
        pattern.push_str(wildcard);
    }

    pattern.push_str(&regex::escape(&literal));
    pattern.push('$');
    pattern
}
