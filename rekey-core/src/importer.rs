//! Two-pass internalization of a batch.
//!
//! Pass one gives every non-deletion entry a canonical identifier and records
//! the renames in an [`IdentifierMap`]. Pass two rewrites every reference in
//! every payload against that map. Pass two only starts once pass one has
//! succeeded for the whole batch, so entries may reference entries that come
//! later in the batch.

use log::{debug, info, trace, warn};

use crate::entry::BatchEntry;
use crate::error::ImportError;
use crate::generator::IdentifierGenerator;
use crate::identifier::Identifier;
use crate::locator::Locator;
use crate::map::IdentifierMap;
use crate::markup::{self, MarkupOutcome};
use crate::origin::{OriginClassifier, OriginKind};
use crate::payload::{FieldMut, FieldRewriter, Payload};

/// A successfully internalized batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Internalized<R> {
    /// The entries, in submission order, with identifiers and payloads rewritten.
    pub entries: Vec<BatchEntry<R>>,
    /// Indices of entries holding a narrative that was not well-formed markup
    /// and was therefore left unchanged.
    pub unparseable_markup: Vec<usize>,
}

impl<R> Internalized<R> {
    pub fn into_entries(self) -> Vec<BatchEntry<R>> {
        self.entries
    }
}

/// Accumulates the entries of one batch and internalizes them.
///
/// Each importer owns its entries; concurrent batches use separate importers.
/// The classifier and generator may be shared, e.g. by passing references.
pub struct BatchImporter<C, G, R> {
    classifier: C,
    generator: G,
    entries: Vec<BatchEntry<R>>,
}

impl<C, G, R> BatchImporter<C, G, R>
where
    C: OriginClassifier,
    G: IdentifierGenerator,
    R: Payload,
{
    pub fn new(classifier: C, generator: G) -> Self {
        BatchImporter {
            classifier,
            generator,
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, entry: BatchEntry<R>) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs both passes over every entry added so far.
    pub fn internalize(self) -> Result<Internalized<R>, ImportError> {
        internalize(self.entries, &self.classifier, &self.generator)
    }
}

impl<C, G, R> Extend<BatchEntry<R>> for BatchImporter<C, G, R> {
    fn extend<I: IntoIterator<Item = BatchEntry<R>>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

/// Internalizes a whole batch: canonical identifiers for every non-deletion
/// entry, then canonical references in every payload.
///
/// On error nothing of the batch may be used; entries are dropped.
pub fn internalize<R, C, G>(
    mut entries: Vec<BatchEntry<R>>,
    classifier: &C,
    generator: &G,
) -> Result<Internalized<R>, ImportError>
where
    R: Payload,
    C: OriginClassifier + ?Sized,
    G: IdentifierGenerator + ?Sized,
{
    let map = internalize_keys(&mut entries, classifier, generator)?;
    for (original, canonical) in map.iter() {
        debug!("{} -> {}", original, canonical);
    }
    let unparseable_markup = internalize_references(&mut entries, classifier, &map)?;

    info!(
        "internalized batch of {} entries, {} identifiers remapped",
        entries.len(),
        map.len()
    );
    Ok(Internalized {
        entries,
        unparseable_markup,
    })
}

/// Pass one: assigns a canonical identifier to every non-deletion entry.
pub(crate) fn internalize_keys<R, C, G>(
    entries: &mut [BatchEntry<R>],
    classifier: &C,
    generator: &G,
) -> Result<IdentifierMap, ImportError>
where
    C: OriginClassifier + ?Sized,
    G: IdentifierGenerator + ?Sized,
{
    let mut map = IdentifierMap::new();

    for entry in entries.iter_mut() {
        if entry.deleted {
            continue;
        }

        let original = entry.identifier.clone();
        let minted = match classifier.classify(&original) {
            OriginKind::Foreign | OriginKind::Temporary => generator.next_identifier(&original),
            OriginKind::Local if entry.verb.is_update_in_place() => generator.next_version(&original),
            OriginKind::Local => generator.next_identifier(&original),
            OriginKind::Internal => return Err(ImportError::MalformedIdentifier(original)),
        }
        .map_err(|e| ImportError::Generator(Box::new(e)))?;

        entry.identifier = map.assign(original, minted.without_origin())?.clone();
    }

    Ok(map)
}

/// Pass two: rewrites every reference-bearing field of every non-deletion
/// payload. Returns the indices of entries with unparseable narratives.
pub(crate) fn internalize_references<R, C>(
    entries: &mut [BatchEntry<R>],
    classifier: &C,
    map: &IdentifierMap,
) -> Result<Vec<usize>, ImportError>
where
    R: Payload,
    C: OriginClassifier + ?Sized,
{
    let mut unparseable = Vec::new();

    for (index, entry) in entries.iter_mut().enumerate() {
        if entry.deleted {
            continue;
        }
        let Some(payload) = entry.payload.as_mut() else {
            continue;
        };

        let mut internalizer = ReferenceInternalizer {
            classifier,
            map,
            entry: index,
            unparseable_markup: 0,
        };
        payload.rewrite_fields(&mut internalizer)?;
        if internalizer.unparseable_markup > 0 {
            unparseable.push(index);
        }
    }

    Ok(unparseable)
}

/// Rewrites the reference-bearing fields of one payload.
struct ReferenceInternalizer<'a, C: ?Sized> {
    classifier: &'a C,
    map: &'a IdentifierMap,
    entry: usize,
    unparseable_markup: usize,
}

impl<C: OriginClassifier + ?Sized> ReferenceInternalizer<'_, C> {
    /// Resolves one own-authority identifier. `None` leaves the reference as it was.
    fn internalize_identifier(&self, original: Identifier) -> Result<Option<Identifier>, ImportError> {
        match self.classifier.classify(&original) {
            OriginKind::Foreign | OriginKind::Temporary => match self.map.lookup(&original) {
                Some(canonical) => Ok(Some(canonical.clone())),
                None => Err(ImportError::UnresolvedReference(original)),
            },
            OriginKind::Local => Ok(Some(original.without_origin())),
            OriginKind::Internal => Ok(None),
        }
    }

    /// Resolves one locator string. `None` leaves the value as it was.
    fn internalize_locator(&self, value: &str) -> Result<Option<String>, ImportError> {
        let Some(locator) = Locator::parse(value) else {
            return Ok(None);
        };
        if !self.classifier.is_own_authority(&locator) {
            return Ok(None);
        }
        let Some(original) = self.classifier.locator_to_identifier(&locator) else {
            return Ok(None);
        };

        let resolved = self
            .internalize_identifier(original)?
            .map(|identifier| identifier.to_locator());
        if let Some(resolved) = &resolved {
            trace!("entry {}: reference {} -> {}", self.entry, value, resolved);
        }
        Ok(resolved)
    }
}

impl<C: OriginClassifier + ?Sized> FieldRewriter for ReferenceInternalizer<'_, C> {
    type Error = ImportError;

    fn rewrite_field(&mut self, field: FieldMut<'_>) -> Result<(), ImportError> {
        match field {
            FieldMut::Reference(reference) => {
                if let Some(value) = reference.reference.as_mut() {
                    if let Some(resolved) = self.internalize_locator(value)? {
                        *value = resolved;
                    }
                }
            }
            FieldMut::Uri(uri) => {
                if let Some(resolved) = self.internalize_locator(&uri.0)? {
                    uri.0 = resolved;
                }
            }
            FieldMut::Narrative(narrative) => {
                let outcome = markup::rewrite_links(
                    &narrative.div,
                    |locator: &str| -> Result<String, ImportError> {
                        Ok(self
                            .internalize_locator(locator)?
                            .unwrap_or_else(|| locator.to_string()))
                    },
                )?;
                match outcome {
                    MarkupOutcome::Rewritten(div) => narrative.div = div,
                    MarkupOutcome::Unparseable => {
                        warn!(
                            "entry {}: narrative is not well-formed markup, left unchanged",
                            self.entry
                        );
                        self.unparseable_markup += 1;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Narrative, Reference, Uri};
    use crate::generator::SequenceGenerator;
    use crate::record::{Element, Record};
    use crate::sequence::MemorySequence;

    const SERVER: &str = "http://server";

    /// Classifies by record id prefix: `tmp-`, `foreign-`, `local-`, anything
    /// else is internal. Locators under `http://server` or relative are own.
    struct PrefixClassifier;

    impl OriginClassifier for PrefixClassifier {
        fn classify(&self, identifier: &Identifier) -> OriginKind {
            let id = identifier.record_id();
            if id.starts_with("tmp-") {
                OriginKind::Temporary
            } else if id.starts_with("foreign-") {
                OriginKind::Foreign
            } else if id.starts_with("local-") {
                OriginKind::Local
            } else {
                OriginKind::Internal
            }
        }

        fn is_own_authority(&self, locator: &Locator) -> bool {
            !locator.is_absolute() || locator.strip_base(SERVER).is_some()
        }

        fn locator_to_identifier(&self, locator: &Locator) -> Option<Identifier> {
            let path = locator.strip_base(SERVER).unwrap_or(locator.as_str());
            let mut segments = path.split('/');
            let mut id = Identifier::new(segments.next()?, segments.next()?);
            if let (Some("_history"), Some(version)) = (segments.next(), segments.next()) {
                id = id.with_version(version);
            }
            Some(if locator.is_absolute() { id.with_origin(SERVER) } else { id })
        }
    }

    fn generator() -> SequenceGenerator<MemorySequence> {
        SequenceGenerator::new(MemorySequence::new())
    }

    fn at_server(record_type: &str, id: &str) -> Identifier {
        Identifier::new(record_type, id).with_origin(SERVER)
    }

    fn subject_of(entry: &BatchEntry<Record>) -> Option<&str> {
        entry
            .payload()?
            .get("subject")?
            .as_reference()?
            .reference()
    }

    #[test]
    fn keys_pass_skips_deletions() {
        let original = at_server("Patient", "tmp-1");
        let mut entries = vec![BatchEntry::<Record>::delete(original.clone())];
        let map = internalize_keys(&mut entries, &PrefixClassifier, &generator()).unwrap();

        assert!(map.is_empty());
        assert_eq!(entries[0].identifier.to_locator(), original.to_locator());
    }

    #[test]
    fn keys_pass_rejects_internal_identifiers() {
        let mut entries = vec![BatchEntry::create(at_server("Patient", "42"), Record::new("Patient"))];
        let err = internalize_keys(&mut entries, &PrefixClassifier, &generator()).unwrap_err();
        assert!(matches!(err, ImportError::MalformedIdentifier(_)));
    }

    #[test]
    fn keys_pass_versions_local_updates() {
        let mut entries = vec![BatchEntry::update(at_server("Patient", "local-42"), Record::new("Patient"))];
        internalize_keys(&mut entries, &PrefixClassifier, &generator()).unwrap();
        assert_eq!(entries[0].identifier.to_locator(), "Patient/local-42/_history/1");
    }

    #[test]
    fn keys_pass_gives_local_creates_a_fresh_identity() {
        let mut entries = vec![BatchEntry::create(at_server("Patient", "local-42"), Record::new("Patient"))];
        internalize_keys(&mut entries, &PrefixClassifier, &generator()).unwrap();
        assert_eq!(entries[0].identifier.to_locator(), "Patient/1/_history/1");
    }

    #[test]
    fn references_pass_resolves_against_the_map() {
        let mut map = IdentifierMap::new();
        map.assign(at_server("Patient", "tmp-1"), Identifier::new("Patient", "9").with_version("1"))
            .unwrap();

        let record = Record::new("Observation")
            .with("subject", Reference::new("http://server/Patient/tmp-1"))
            .with("focus", Uri::new("Patient/tmp-1/_history/3"));
        let mut entries = vec![BatchEntry::create(Identifier::new("Observation", "1"), record)];

        let unparseable = internalize_references(&mut entries, &PrefixClassifier, &map).unwrap();
        assert!(unparseable.is_empty());
        assert_eq!(subject_of(&entries[0]), Some("Patient/9/_history/1"));

        let focus = entries[0].payload().unwrap().get("focus").and_then(Element::as_uri).unwrap();
        assert_eq!(focus.as_str(), "Patient/9/_history/1");
    }

    #[test]
    fn references_pass_leaves_external_and_internal_alone() {
        let record = Record::new("Observation")
            .with("subject", Reference::new("http://elsewhere/Patient/tmp-1"))
            .with("device", Reference::new("http://server/Device/7?x=1"))
            .with("note", Reference::new("   "));
        let mut entries = vec![BatchEntry::create(Identifier::new("Observation", "1"), record.clone())];

        internalize_references(&mut entries, &PrefixClassifier, &IdentifierMap::new()).unwrap();
        assert_eq!(entries[0].payload(), Some(&record));
    }

    #[test]
    fn unparseable_narrative_is_reported() {
        let record = Record::new("Patient").with("text", Narrative::new("<div><a href=\"Patient/tmp-1\">"));
        let mut entries = vec![BatchEntry::create(Identifier::new("Patient", "1"), record.clone())];

        let unparseable = internalize_references(&mut entries, &PrefixClassifier, &IdentifierMap::new()).unwrap();
        assert_eq!(unparseable, [0]);
        assert_eq!(entries[0].payload(), Some(&record));
    }

    #[test]
    fn narrative_links_follow_the_same_rule() {
        let record = Record::new("Patient").with(
            "text",
            Narrative::new(r#"<div><a href="Patient/tmp-1">self</a></div>"#),
        );
        let batch = vec![BatchEntry::create(at_server("Patient", "tmp-1"), record)];

        let result = internalize(batch, &PrefixClassifier, &generator()).unwrap();
        let div = &result.entries[0].payload().unwrap().get("text").and_then(Element::as_narrative).unwrap().div;
        assert_eq!(div, r#"<div><a href="Patient/1/_history/1">self</a></div>"#);
    }

    #[test]
    fn narrative_with_unresolved_link_fails() {
        let record = Record::new("Patient").with(
            "text",
            Narrative::new(r#"<div><img src="Binary/tmp-404"/></div>"#),
        );
        let batch = vec![BatchEntry::create(at_server("Patient", "tmp-1"), record)];

        let err = internalize(batch, &PrefixClassifier, &generator()).unwrap_err();
        assert!(matches!(err, ImportError::UnresolvedReference(ref id) if id.record_id() == "tmp-404"));
    }

    #[test]
    fn importer_accumulates_entries() {
        let generator = generator();
        let mut importer = BatchImporter::new(&PrefixClassifier, &generator);
        importer.add(BatchEntry::create(at_server("Patient", "tmp-1"), Record::new("Patient")));
        importer.extend([BatchEntry::delete(at_server("Patient", "local-3"))]);
        assert_eq!(importer.len(), 2);

        let entries = importer.internalize().unwrap().into_entries();
        assert_eq!(entries[0].identifier.to_locator(), "Patient/1/_history/1");
        assert_eq!(entries[1].identifier.to_locator(), "http://server/Patient/local-3");
    }

    #[test]
    fn generator_failures_abort() {
        #[derive(Debug, thiserror::Error)]
        #[error("sequence unavailable")]
        struct Unavailable;

        struct Broken;

        impl IdentifierGenerator for Broken {
            type Error = Unavailable;

            fn next_identifier(&self, _: &Identifier) -> Result<Identifier, Unavailable> {
                Err(Unavailable)
            }

            fn next_version(&self, _: &Identifier) -> Result<Identifier, Unavailable> {
                Err(Unavailable)
            }
        }

        let batch = vec![BatchEntry::create(at_server("Patient", "tmp-1"), Record::new("Patient"))];
        let err = internalize(batch, &PrefixClassifier, &Broken).unwrap_err();
        assert!(matches!(err, ImportError::Generator(_)));
        assert_eq!(err.status_code(), 500);
    }
}
