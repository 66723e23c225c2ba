use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::error::ImportError;
use crate::identifier::Identifier;

/// Maps the identifiers a client supplied to the canonical identifiers the
/// server assigned, for the duration of one import.
///
/// Each original identifier is assigned at most once. Lookups of identifiers
/// that were never assigned return `None`; nothing is ever created on read.
#[derive(Debug, Default)]
pub struct IdentifierMap {
    entries: IndexMap<Identifier, Identifier>,
}

impl IdentifierMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `original` is now known as `canonical`.
    ///
    /// Returns the stored canonical identifier, or
    /// [`ImportError::DuplicateIdentifier`] if `original` was already assigned.
    pub fn assign(
        &mut self,
        original: Identifier,
        canonical: Identifier,
    ) -> Result<&Identifier, ImportError> {
        match self.entries.entry(original) {
            Entry::Occupied(occupied) => {
                Err(ImportError::DuplicateIdentifier(occupied.key().clone()))
            }
            Entry::Vacant(vacant) => Ok(&*vacant.insert(canonical)),
        }
    }

    /// Returns the canonical identifier assigned to `original`, if any.
    pub fn lookup(&self, original: &Identifier) -> Option<&Identifier> {
        self.entries.get(original)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(original, canonical)` pairs in assignment order.
    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &Identifier)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp(id: &str) -> Identifier {
        Identifier::new("Patient", id).with_origin("http://localhost/fhir")
    }

    #[test]
    fn assign_and_lookup() {
        let mut map = IdentifierMap::new();
        let canonical = Identifier::new("Patient", "1").with_version("1");
        let stored = map.assign(temp("tmp-1"), canonical.clone()).unwrap();
        assert_eq!(stored.to_locator(), "Patient/1/_history/1");

        assert_eq!(map.lookup(&temp("tmp-1")).map(|c| c.to_locator()), Some(canonical.to_locator()));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn lookup_missing_creates_nothing() {
        let map = IdentifierMap::new();
        assert!(map.lookup(&temp("tmp-1")).is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn lookup_ignores_origin_of_the_query() {
        let mut map = IdentifierMap::new();
        map.assign(temp("tmp-1"), Identifier::new("Patient", "1")).unwrap();
        assert!(map.lookup(&Identifier::new("Patient", "tmp-1")).is_some());
    }

    #[test]
    fn second_assignment_is_rejected() {
        let mut map = IdentifierMap::new();
        map.assign(temp("tmp-1"), Identifier::new("Patient", "1")).unwrap();

        let err = map.assign(temp("tmp-1"), Identifier::new("Patient", "2")).unwrap_err();
        assert!(matches!(err, ImportError::DuplicateIdentifier(_)));

        // The first association is untouched.
        assert_eq!(map.lookup(&temp("tmp-1")).unwrap().record_id(), "1");
    }

    #[test]
    fn iter_in_assignment_order() {
        let mut map = IdentifierMap::new();
        map.assign(temp("tmp-b"), Identifier::new("Patient", "1")).unwrap();
        map.assign(temp("tmp-a"), Identifier::new("Patient", "2")).unwrap();

        let originals: Vec<_> = map.iter().map(|(o, _)| o.record_id().to_string()).collect();
        assert_eq!(originals, ["tmp-b", "tmp-a"]);
    }
}
