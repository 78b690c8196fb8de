use serde::{Deserialize, Serialize};
use std::fmt;

/// A CSS selector plus an optional text-content filter.
///
/// Without `content` the locator resolves to elements matching `selector`.
/// With `content` only matches whose text content contains the given string
/// are kept, mirroring a "contains" query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Locator {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            content: None,
        }
    }

    /// Locator matching `selector` elements whose text contains `content`.
    pub fn contains(selector: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            content: Some(content.into()),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            Some(content) => write!(f, "{} containing {:?}", self.selector, content),
            None => write!(f, "{}", self.selector),
        }
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        Locator::new(s)
    }
}

impl From<String> for Locator {
    fn from(s: String) -> Self {
        Locator::new(s)
    }
}

impl From<&String> for Locator {
    fn from(s: &String) -> Self {
        Locator::new(s.as_str())
    }
}

impl From<(&str, &str)> for Locator {
    fn from((selector, content): (&str, &str)) -> Self {
        Locator::contains(selector, content)
    }
}

/// Selector for a row of the Nextcloud file list.
pub fn file_row_selector(file_name: &str) -> String {
    format!("tr[data-file='{file_name}']")
}
