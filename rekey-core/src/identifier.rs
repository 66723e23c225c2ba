use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Path segment that separates a record's id from its version id.
pub const HISTORY_SEGMENT: &str = "_history";

/// The address of a record: type, id, optional version and optional origin.
///
/// Two identifiers are equal when their record type and record id match and,
/// if both carry a version, their versions match. The origin is metadata and
/// never takes part in equality or hashing.
#[derive(Clone, Serialize, Deserialize)]
pub struct Identifier {
    record_type: String,
    record_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    origin: Option<String>,
}

impl Identifier {
    /// Creates an origin-less, unversioned identifier.
    pub fn new(record_type: impl Into<String>, record_id: impl Into<String>) -> Self {
        Identifier {
            record_type: record_type.into(),
            record_id: record_id.into(),
            version_id: None,
            origin: None,
        }
    }

    /// Returns a copy carrying the given version.
    pub fn with_version(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    /// Returns a copy asserted to belong to `origin`.
    ///
    /// Trailing slashes are dropped so that `http://a/` and `http://a` name
    /// the same origin.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        self.origin = Some(origin.trim_end_matches('/').to_string());
        self
    }

    /// Returns an origin-less copy.
    pub fn without_origin(&self) -> Self {
        Identifier {
            origin: None,
            ..self.clone()
        }
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn has_origin(&self) -> bool {
        self.origin.is_some()
    }

    /// True when both identifiers name the same record, ignoring versions.
    pub fn same_record(&self, other: &Identifier) -> bool {
        self.record_type == other.record_type && self.record_id == other.record_id
    }

    /// Renders the identifier as a locator string,
    /// `[origin/]Type/id[/_history/version]`.
    pub fn to_locator(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        if !self.same_record(other) {
            return false;
        }
        match (&self.version_id, &other.version_id) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl Eq for Identifier {}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Versions may be absent on one side of an equal pair, so they stay out.
        self.record_type.hash(state);
        self.record_id.hash(state);
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(origin) = &self.origin {
            write!(f, "{}/", origin)?;
        }
        write!(f, "{}/{}", self.record_type, self.record_id)?;
        if let Some(version) = &self.version_id {
            write!(f, "/{}/{}", HISTORY_SEGMENT, version)?;
        }
        Ok(())
    }
}
