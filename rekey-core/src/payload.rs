use indexmap::IndexMap;

use crate::field::{Narrative, Reference, Uri};

/// A read-only view of one reference-bearing field.
#[derive(Debug, Clone, Copy)]
pub enum Field<'a> {
    Reference(&'a Reference),
    Uri(&'a Uri),
    Narrative(&'a Narrative),
}

/// A mutable view of one reference-bearing field.
#[derive(Debug)]
pub enum FieldMut<'a> {
    Reference(&'a mut Reference),
    Uri(&'a mut Uri),
    Narrative(&'a mut Narrative),
}

/// A visitor for inspecting the reference-bearing fields of a payload.
pub trait FieldVisitor {
    fn visit_field(&mut self, field: Field<'_>);
}

/// A rewriter for replacing reference-bearing fields in place.
///
/// Returning an error stops the walk; fields already rewritten keep their
/// new values.
pub trait FieldRewriter {
    type Error;

    fn rewrite_field(&mut self, field: FieldMut<'_>) -> Result<(), Self::Error>;
}

/// A record payload whose reference-bearing fields can be walked.
///
/// Fields are found by their declared kind ([`Reference`], [`Uri`],
/// [`Narrative`]), never by name. Walk order within one payload is
/// unspecified. Implement it with `#[derive(Payload)]` for plain structs and
/// enums.
pub trait Payload {
    /// Visits every reference-bearing field.
    fn visit_fields(&self, visitor: &mut dyn FieldVisitor);

    /// Hands every reference-bearing field to `rewriter` for in-place replacement.
    fn rewrite_fields<W: FieldRewriter>(&mut self, rewriter: &mut W) -> Result<(), W::Error>;
}

/// Collects every locator string reachable from `payload`.
///
/// Structured references and bare URIs contribute their value; narratives
/// are not parsed here and contribute nothing.
pub fn references<P: Payload + ?Sized>(payload: &P) -> Vec<String> {
    struct Collector(Vec<String>);

    impl FieldVisitor for Collector {
        fn visit_field(&mut self, field: Field<'_>) {
            match field {
                Field::Reference(r) => self.0.extend(r.reference.clone()),
                Field::Uri(u) => self.0.push(u.0.clone()),
                Field::Narrative(_) => {}
            }
        }
    }

    let mut collector = Collector(Vec::new());
    payload.visit_fields(&mut collector);
    collector.0
}

// Field kinds

impl Payload for Reference {
    fn visit_fields(&self, visitor: &mut dyn FieldVisitor) {
        visitor.visit_field(Field::Reference(self));
    }

    fn rewrite_fields<W: FieldRewriter>(&mut self, rewriter: &mut W) -> Result<(), W::Error> {
        rewriter.rewrite_field(FieldMut::Reference(self))
    }
}

impl Payload for Uri {
    fn visit_fields(&self, visitor: &mut dyn FieldVisitor) {
        visitor.visit_field(Field::Uri(self));
    }

    fn rewrite_fields<W: FieldRewriter>(&mut self, rewriter: &mut W) -> Result<(), W::Error> {
        rewriter.rewrite_field(FieldMut::Uri(self))
    }
}

impl Payload for Narrative {
    fn visit_fields(&self, visitor: &mut dyn FieldVisitor) {
        visitor.visit_field(Field::Narrative(self));
    }

    fn rewrite_fields<W: FieldRewriter>(&mut self, rewriter: &mut W) -> Result<(), W::Error> {
        rewriter.rewrite_field(FieldMut::Narrative(self))
    }
}

// Leaf implementations

macro_rules! impl_payload_leaf {
    ($($t:ty),* $(,)?) => {
        $(
            impl Payload for $t {
                fn visit_fields(&self, _visitor: &mut dyn FieldVisitor) {}

                fn rewrite_fields<W: FieldRewriter>(&mut self, _rewriter: &mut W) -> Result<(), W::Error> {
                    Ok(())
                }
            }
        )*
    };
}

impl_payload_leaf!(bool, char, String, (), u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

// Containers

impl<T: Payload> Payload for Vec<T> {
    fn visit_fields(&self, visitor: &mut dyn FieldVisitor) {
        for item in self {
            item.visit_fields(visitor);
        }
    }

    fn rewrite_fields<W: FieldRewriter>(&mut self, rewriter: &mut W) -> Result<(), W::Error> {
        for item in self {
            item.rewrite_fields(rewriter)?;
        }
        Ok(())
    }
}

impl<T: Payload> Payload for Option<T> {
    fn visit_fields(&self, visitor: &mut dyn FieldVisitor) {
        if let Some(inner) = self {
            inner.visit_fields(visitor);
        }
    }

    fn rewrite_fields<W: FieldRewriter>(&mut self, rewriter: &mut W) -> Result<(), W::Error> {
        match self {
            Some(inner) => inner.rewrite_fields(rewriter),
            None => Ok(()),
        }
    }
}

impl<T: Payload> Payload for Box<T> {
    fn visit_fields(&self, visitor: &mut dyn FieldVisitor) {
        (**self).visit_fields(visitor);
    }

    fn rewrite_fields<W: FieldRewriter>(&mut self, rewriter: &mut W) -> Result<(), W::Error> {
        (**self).rewrite_fields(rewriter)
    }
}

impl<T: Payload> Payload for IndexMap<String, T> {
    fn visit_fields(&self, visitor: &mut dyn FieldVisitor) {
        for value in self.values() {
            value.visit_fields(visitor);
        }
    }

    fn rewrite_fields<W: FieldRewriter>(&mut self, rewriter: &mut W) -> Result<(), W::Error> {
        for value in self.values_mut() {
            value.rewrite_fields(rewriter)?;
        }
        Ok(())
    }
}
