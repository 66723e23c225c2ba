use crate::identifier::{HISTORY_SEGMENT, Identifier};
use crate::sequence::Sequence;

/// Mints canonical identifiers for records entering the server.
pub trait IdentifierGenerator {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Mints a brand-new identity for the record `original` stood for.
    fn next_identifier(&self, original: &Identifier) -> Result<Identifier, Self::Error>;

    /// Mints the next version of the record `original` already names.
    fn next_version(&self, original: &Identifier) -> Result<Identifier, Self::Error>;
}

impl<T: IdentifierGenerator + ?Sized> IdentifierGenerator for &T {
    type Error = T::Error;

    fn next_identifier(&self, original: &Identifier) -> Result<Identifier, Self::Error> {
        (**self).next_identifier(original)
    }

    fn next_version(&self, original: &Identifier) -> Result<Identifier, Self::Error> {
        (**self).next_version(original)
    }
}

/// Generates identifiers from named counters.
///
/// Record ids come from one counter per record type; versions come from one
/// counter per record identity (`Type/id/_history`). Fresh identities start
/// at the first value of their version counter.
#[derive(Debug, Default)]
pub struct SequenceGenerator<S> {
    sequence: S,
}

impl<S: Sequence> SequenceGenerator<S> {
    pub fn new(sequence: S) -> Self {
        SequenceGenerator { sequence }
    }

    pub fn sequence(&self) -> &S {
        &self.sequence
    }

    fn next_version_id(&self, identity: &Identifier, floor: u64) -> Result<String, S::Error> {
        let name = format!(
            "{}/{}/{}",
            identity.record_type(),
            identity.record_id(),
            HISTORY_SEGMENT
        );
        Ok(self.sequence.next(&name, floor)?.to_string())
    }
}

impl<S: Sequence> IdentifierGenerator for SequenceGenerator<S> {
    type Error = S::Error;

    fn next_identifier(&self, original: &Identifier) -> Result<Identifier, Self::Error> {
        let record_id = self.sequence.next(original.record_type(), 0)?;
        let identity = Identifier::new(original.record_type(), record_id.to_string());
        let version = self.next_version_id(&identity, 0)?;
        Ok(identity.with_version(version))
    }

    fn next_version(&self, original: &Identifier) -> Result<Identifier, Self::Error> {
        // A numeric original version is a floor, so the result always differs from it.
        let floor = original
            .version_id()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        let identity = Identifier::new(original.record_type(), original.record_id());
        let version = self.next_version_id(&identity, floor)?;
        Ok(identity.with_version(version))
    }
}
