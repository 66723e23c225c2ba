//! The three reference-bearing field kinds a payload can contain.

use serde::{Deserialize, Serialize};

/// A structured reference to another record.
///
/// `reference` holds the target as a locator string, absolute or relative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Reference {
    pub fn new(reference: impl Into<String>) -> Self {
        Reference {
            reference: Some(reference.into()),
            display: None,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }
}

/// A bare text value shaped like a locator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uri(pub String);

impl Uri {
    pub fn new(value: impl Into<String>) -> Self {
        Uri(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Uri {
    fn from(value: &str) -> Self {
        Uri(value.to_string())
    }
}

/// Human-readable rich text embedded in a record.
///
/// `div` is an XHTML fragment whose `a@href` and `img@src` attributes may
/// point at other records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrative {
    pub status: String,
    pub div: String,
}

impl Narrative {
    pub fn new(div: impl Into<String>) -> Self {
        Narrative {
            status: "generated".to_string(),
            div: div.into(),
        }
    }
}
