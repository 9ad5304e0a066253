//! Prompt templates with `{name}` placeholders.

use regex::{Captures, Regex};
use std::sync::OnceLock;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    // A placeholder is a brace pair whose body contains no brace.
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{([^{}]*)\}").expect("placeholder regex is valid"))
}

/// Replace every `{key}` in `template` with the matching value from `params`.
///
/// Unknown keys and keys mapped to an empty value are left as the literal
/// `{key}` text. Substituted values are never scanned again, and `{{` is not
/// an escape.
pub fn format_template(template: &str, params: &[(&str, &str)]) -> String {
    placeholder()
        .replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            match params.iter().find(|(k, _)| *k == key) {
                Some((_, value)) if !value.is_empty() => (*value).to_string(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// A named prompt, read once and shared read-only for the whole process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn render(&self, params: &[(&str, &str)]) -> String {
        format_template(&self.text, params)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}
