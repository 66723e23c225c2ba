use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::field::{Narrative, Reference, Uri};
use crate::payload::{FieldRewriter, FieldVisitor, Payload};

/// A schemaless record: a type name and an ordered tree of typed fields.
///
/// Use this when record shapes are not known at compile time. The
/// reference-bearing kinds are explicit variants of [`Element`], so the
/// walker finds them without knowing any field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    record_type: String,
    #[serde(default)]
    fields: IndexMap<String, Element>,
}

/// One value inside a [`Record`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Element {
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
    Uri(Uri),
    Reference(Reference),
    Narrative(Narrative),
    List(Vec<Element>),
    Record(Record),
}

impl Record {
    pub fn new(record_type: impl Into<String>) -> Self {
        Record {
            record_type: record_type.into(),
            fields: IndexMap::new(),
        }
    }

    /// Builder-style field insertion.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Element>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts a field, returning the previous value under that name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Element>) -> Option<Element> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn get(&self, name: &str) -> Option<&Element> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.fields.get_mut(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Element)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Element {
    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Element::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_uri(&self) -> Option<&Uri> {
        match self {
            Element::Uri(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_narrative(&self) -> Option<&Narrative> {
        match self {
            Element::Narrative(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Element::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Element]> {
        match self {
            Element::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Element::Record(r) => Some(r),
            _ => None,
        }
    }
}

impl Payload for Record {
    fn visit_fields(&self, visitor: &mut dyn FieldVisitor) {
        self.fields.visit_fields(visitor);
    }

    fn rewrite_fields<W: FieldRewriter>(&mut self, rewriter: &mut W) -> Result<(), W::Error> {
        self.fields.rewrite_fields(rewriter)
    }
}

impl Payload for Element {
    fn visit_fields(&self, visitor: &mut dyn FieldVisitor) {
        match self {
            Element::Uri(u) => u.visit_fields(visitor),
            Element::Reference(r) => r.visit_fields(visitor),
            Element::Narrative(n) => n.visit_fields(visitor),
            Element::List(items) => items.visit_fields(visitor),
            Element::Record(r) => r.visit_fields(visitor),
            Element::Bool(_) | Element::Integer(_) | Element::Decimal(_) | Element::Text(_) => {}
        }
    }

    fn rewrite_fields<W: FieldRewriter>(&mut self, rewriter: &mut W) -> Result<(), W::Error> {
        match self {
            Element::Uri(u) => u.rewrite_fields(rewriter),
            Element::Reference(r) => r.rewrite_fields(rewriter),
            Element::Narrative(n) => n.rewrite_fields(rewriter),
            Element::List(items) => items.rewrite_fields(rewriter),
            Element::Record(r) => r.rewrite_fields(rewriter),
            Element::Bool(_) | Element::Integer(_) | Element::Decimal(_) | Element::Text(_) => Ok(()),
        }
    }
}

impl From<bool> for Element {
    fn from(v: bool) -> Self {
        Element::Bool(v)
    }
}

impl From<i64> for Element {
    fn from(v: i64) -> Self {
        Element::Integer(v)
    }
}

impl From<f64> for Element {
    fn from(v: f64) -> Self {
        Element::Decimal(v)
    }
}

impl From<&str> for Element {
    fn from(v: &str) -> Self {
        Element::Text(v.to_string())
    }
}

impl From<String> for Element {
    fn from(v: String) -> Self {
        Element::Text(v)
    }
}

impl From<Uri> for Element {
    fn from(v: Uri) -> Self {
        Element::Uri(v)
    }
}

impl From<Reference> for Element {
    fn from(v: Reference) -> Self {
        Element::Reference(v)
    }
}

impl From<Narrative> for Element {
    fn from(v: Narrative) -> Self {
        Element::Narrative(v)
    }
}

impl From<Record> for Element {
    fn from(v: Record) -> Self {
        Element::Record(v)
    }
}

impl<T: Into<Element>> From<Vec<T>> for Element {
    fn from(v: Vec<T>) -> Self {
        Element::List(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{FieldMut, references};
    use std::convert::Infallible;

    fn observation() -> Record {
        Record::new("Observation")
            .with("status", "final")
            .with("subject", Reference::new("Patient/tmp-1"))
            .with("instantiates", Uri::new("Questionnaire/tmp-2"))
            .with("text", Narrative::new("<div/>"))
            .with(
                "component",
                vec![Record::new("Component").with("focus", Reference::new("Device/tmp-3"))],
            )
    }

    #[test]
    fn walker_finds_nested_fields_by_kind() {
        let refs = references(&observation());
        assert_eq!(refs, ["Patient/tmp-1", "Questionnaire/tmp-2", "Device/tmp-3"]);
    }

    #[test]
    fn plain_text_is_not_a_reference() {
        let record = Record::new("Note").with("comment", "Patient/tmp-1");
        assert!(references(&record).is_empty());
    }

    #[test]
    fn rewrite_reaches_every_kind() {
        struct Tag(usize);

        impl FieldRewriter for Tag {
            type Error = Infallible;

            fn rewrite_field(&mut self, field: FieldMut<'_>) -> Result<(), Infallible> {
                self.0 += 1;
                match field {
                    FieldMut::Reference(r) => r.display = Some("seen".into()),
                    FieldMut::Uri(u) => u.0.push_str("#seen"),
                    FieldMut::Narrative(n) => n.status = "seen".into(),
                }
                Ok(())
            }
        }

        let mut record = observation();
        let mut tag = Tag(0);
        record.rewrite_fields(&mut tag).unwrap();

        assert_eq!(tag.0, 4);
        assert_eq!(
            record.get("subject").and_then(Element::as_reference).and_then(|r| r.display.as_deref()),
            Some("seen")
        );
        assert_eq!(
            record.get("instantiates").and_then(Element::as_uri).map(Uri::as_str),
            Some("Questionnaire/tmp-2#seen")
        );
        assert_eq!(
            record.get("text").and_then(Element::as_narrative).map(|n| n.status.as_str()),
            Some("seen")
        );
    }

    #[test]
    fn builder_and_accessors() {
        let mut record = Record::new("Patient").with("active", true).with("age", 42i64);
        assert_eq!(record.record_type(), "Patient");
        assert_eq!(record.len(), 2);
        assert_eq!(record.insert("active", false), Some(Element::Bool(true)));
        assert!(record.get_mut("age").is_some());
        assert_eq!(record.fields().count(), 2);
    }
}
