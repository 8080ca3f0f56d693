//! Parsing of HAProxy diagnostic output.

use std::sync::LazyLock;

use regex::Regex;

/// Matches a severity tag line such as `[WARNING]` or `[ALERT]`.
static TAG_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[[A-Z]+\]").expect("tag line pattern is valid"));

/// Prefix HAProxy puts in front of continuation lines.
const CONTINUATION_PREFIX: &str = "   |";

/// Turns multi-line checker output into discrete messages.
#[derive(Debug, Clone, Default)]
pub struct OutputParser {
    denylist: Vec<String>,
}

impl OutputParser {
    /// Creates a parser that skips boilerplate lines found in `denylist`.
    pub fn new(denylist: Vec<String>) -> Self {
        Self { denylist }
    }

    /// Splits `raw` into one message per severity tag.
    ///
    /// Continuation lines are appended to the message they follow, with the
    /// prefix removed. Lines before the first tag are dropped.
    pub fn parse(&self, raw: &str) -> Vec<String> {
        let mut messages = Vec::new();
        let mut current: Option<String> = None;

        for line in raw.lines() {
            if self.is_boilerplate(line) {
                continue;
            }

            if TAG_LINE.is_match(line) {
                if let Some(done) = current.take() {
                    messages.push(done);
                }
                current = Some(line.to_string());
            } else if let Some(rest) = line.strip_prefix(CONTINUATION_PREFIX) {
                if let Some(message) = current.as_mut() {
                    message.push_str(rest);
                }
            }
        }

        if let Some(done) = current {
            messages.push(done);
        }

        messages
    }

    /// A line is boilerplate when it is blank or part of a denylisted string.
    fn is_boilerplate(&self, line: &str) -> bool {
        line.trim().is_empty() || self.denylist.iter().any(|entry| entry.contains(line))
    }
}
