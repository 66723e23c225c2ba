//! Classification of identifiers and locators relative to the serving system.

use serde::Deserialize;

use crate::identifier::{HISTORY_SEGMENT, Identifier};
use crate::locator::Locator;

/// How an identifier relates to this server's namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OriginKind {
    /// Carries an origin that is not this server.
    Foreign,
    /// Placeholder meant to be replaced during import.
    Temporary,
    /// Shaped like one of this server's own identifiers.
    Local,
    /// None of the above; malformed from the server's point of view.
    Internal,
}

/// Decides how identifiers and locators relate to the serving system.
///
/// Implementations may consult durable state; the importer calls them
/// synchronously and never caches their answers.
pub trait OriginClassifier {
    fn classify(&self, identifier: &Identifier) -> OriginKind;

    /// Whether the locator addresses this server rather than an external system.
    fn is_own_authority(&self, locator: &Locator) -> bool;

    /// Converts an own-authority locator to an identifier.
    ///
    /// Returns `None` when the locator does not have identifier shape.
    fn locator_to_identifier(&self, locator: &Locator) -> Option<Identifier>;
}

impl<T: OriginClassifier + ?Sized> OriginClassifier for &T {
    fn classify(&self, identifier: &Identifier) -> OriginKind {
        (**self).classify(identifier)
    }

    fn is_own_authority(&self, locator: &Locator) -> bool {
        (**self).is_own_authority(locator)
    }

    fn locator_to_identifier(&self, locator: &Locator) -> Option<Identifier> {
        (**self).locator_to_identifier(locator)
    }
}

fn default_temporary_prefix() -> String {
    "tmp-".to_string()
}

/// Settings for [`Localhost`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LocalhostConfig {
    /// The server's own serving address, e.g. `http://localhost/fhir`.
    pub base: String,
    /// Record ids starting with this prefix are batch-local placeholders.
    #[serde(default = "default_temporary_prefix")]
    pub temporary_prefix: String,
}

impl LocalhostConfig {
    pub fn new(base: impl Into<String>) -> Self {
        LocalhostConfig {
            base: base.into(),
            temporary_prefix: default_temporary_prefix(),
        }
    }
}

/// The default classifier: a server reachable under a single base address.
#[derive(Debug, Clone)]
pub struct Localhost {
    base: String,
    temporary_prefix: String,
}

impl Localhost {
    pub fn new(base: impl Into<String>) -> Self {
        Self::from_config(LocalhostConfig::new(base))
    }

    pub fn from_config(config: LocalhostConfig) -> Self {
        Localhost {
            base: config.base.trim_end_matches('/').to_string(),
            temporary_prefix: config.temporary_prefix,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Whether `origin` names this server.
    pub fn is_own_origin(&self, origin: &str) -> bool {
        Locator::parse(origin)
            .and_then(|loc| loc.strip_base(&self.base).map(str::is_empty))
            .unwrap_or(false)
    }

    fn is_temporary(&self, identifier: &Identifier) -> bool {
        !self.temporary_prefix.is_empty()
            && identifier.record_id().starts_with(&self.temporary_prefix)
    }
}

/// Record types are an ASCII letter followed by ASCII alphanumerics.
fn is_record_type(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric())
}

/// Record and version ids are 1..=64 characters of `[A-Za-z0-9.-]`.
fn is_record_id(s: &str) -> bool {
    (1..=64).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

fn is_well_formed(identifier: &Identifier) -> bool {
    is_record_type(identifier.record_type())
        && is_record_id(identifier.record_id())
        && identifier.version_id().is_none_or(is_record_id)
}

impl OriginClassifier for Localhost {
    fn classify(&self, identifier: &Identifier) -> OriginKind {
        if self.is_temporary(identifier) {
            return OriginKind::Temporary;
        }
        if let Some(origin) = identifier.origin() {
            if !self.is_own_origin(origin) {
                return OriginKind::Foreign;
            }
        }
        if is_well_formed(identifier) {
            OriginKind::Local
        } else {
            OriginKind::Internal
        }
    }

    fn is_own_authority(&self, locator: &Locator) -> bool {
        !locator.is_absolute() || locator.strip_base(&self.base).is_some()
    }

    fn locator_to_identifier(&self, locator: &Locator) -> Option<Identifier> {
        if locator.is_fragment() {
            return None;
        }
        let (origin, path) = if locator.is_absolute() {
            let rest = Locator::parse(locator.path_part())?;
            (Some(&self.base), rest.strip_base(&self.base)?.to_string())
        } else {
            (None, locator.path_part().to_string())
        };

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let identifier = match segments.as_slice() {
            [record_type, record_id] if !record_type.is_empty() && !record_id.is_empty() => {
                Identifier::new(*record_type, *record_id)
            }
            [record_type, record_id, history, version]
                if *history == HISTORY_SEGMENT
                    && !record_type.is_empty()
                    && !record_id.is_empty()
                    && !version.is_empty() =>
            {
                Identifier::new(*record_type, *record_id).with_version(*version)
            }
            _ => return None,
        };

        Some(match origin {
            Some(base) => identifier.with_origin(base.as_str()),
            None => identifier,
        })
    }
}
