use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;

/// The operation a batch entry performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Create,
    Read,
    Update,
    Delete,
}

impl Verb {
    /// Whether the verb replaces an existing record under its own identity.
    pub fn is_update_in_place(self) -> bool {
        matches!(self, Verb::Update)
    }

    /// Maps an HTTP method to a verb: `POST`, `GET`, `PUT`, `DELETE`.
    pub fn from_http_method(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "POST" => Some(Verb::Create),
            "GET" | "HEAD" => Some(Verb::Read),
            "PUT" => Some(Verb::Update),
            "DELETE" => Some(Verb::Delete),
            _ => None,
        }
    }
}

/// One unit of work inside a batch.
///
/// `payload` is absent for deletions. Deletion entries keep their identifier
/// through an import; every other entry gets a canonical one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry<R> {
    pub verb: Verb,
    pub identifier: Identifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<R>,
    #[serde(default)]
    pub deleted: bool,
}

impl<R> BatchEntry<R> {
    pub fn new(verb: Verb, identifier: Identifier, payload: Option<R>) -> Self {
        BatchEntry {
            verb,
            identifier,
            payload,
            deleted: verb == Verb::Delete,
        }
    }

    pub fn create(identifier: Identifier, payload: R) -> Self {
        Self::new(Verb::Create, identifier, Some(payload))
    }

    pub fn update(identifier: Identifier, payload: R) -> Self {
        Self::new(Verb::Update, identifier, Some(payload))
    }

    pub fn read(identifier: Identifier) -> Self {
        Self::new(Verb::Read, identifier, None)
    }

    pub fn delete(identifier: Identifier) -> Self {
        Self::new(Verb::Delete, identifier, None)
    }

    pub fn is_deletion(&self) -> bool {
        self.deleted
    }

    pub fn payload(&self) -> Option<&R> {
        self.payload.as_ref()
    }

    /// Consumes the entry and returns its payload.
    pub fn into_payload(self) -> Option<R> {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_update_is_in_place() {
        assert!(Verb::Update.is_update_in_place());
        assert!(!Verb::Create.is_update_in_place());
        assert!(!Verb::Delete.is_update_in_place());
        assert!(!Verb::Read.is_update_in_place());
    }

    #[test]
    fn http_methods() {
        assert_eq!(Verb::from_http_method("post"), Some(Verb::Create));
        assert_eq!(Verb::from_http_method("PUT"), Some(Verb::Update));
        assert_eq!(Verb::from_http_method("DELETE"), Some(Verb::Delete));
        assert_eq!(Verb::from_http_method("GET"), Some(Verb::Read));
        assert_eq!(Verb::from_http_method("PATCH"), None);
    }

    #[test]
    fn delete_entries_are_flagged() {
        let entry: BatchEntry<()> = BatchEntry::delete(Identifier::new("Patient", "1"));
        assert!(entry.is_deletion());
        assert!(entry.payload().is_none());

        let entry = BatchEntry::create(Identifier::new("Patient", "tmp-1"), ());
        assert!(!entry.is_deletion());
        assert_eq!(entry.into_payload(), Some(()));
    }
}
