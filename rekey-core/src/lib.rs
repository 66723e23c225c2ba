//! Rekey translates a batch of interrelated records into a server's own
//! identifier space before the batch is committed.
//!
//! Core concepts:
//! - **Identifier**: the address of a record (type, id, optional version, optional origin)
//! - **OriginClassifier**: decides how an identifier relates to this server (foreign, temporary, local, internal)
//! - **IdentifierGenerator**: mints canonical identifiers, usually from a **Sequence**
//! - **Payload**: a record whose reference-bearing fields (**Reference**, **Uri**, **Narrative**) can be walked
//! - **BatchImporter**: assigns canonical identifiers to every entry, then rewrites every reference
//!
//! # Example
//!
//! ```
//! use rekey_core::{
//!     BatchEntry, Identifier, Localhost, MemorySequence, Record, Reference, SequenceGenerator,
//!     internalize,
//! };
//!
//! let localhost = Localhost::new("http://localhost/fhir");
//! let generator = SequenceGenerator::new(MemorySequence::new());
//!
//! let batch = vec![
//!     BatchEntry::create(
//!         Identifier::new("Observation", "tmp-2"),
//!         Record::new("Observation").with("subject", Reference::new("Patient/tmp-1")),
//!     ),
//!     BatchEntry::create(Identifier::new("Patient", "tmp-1"), Record::new("Patient")),
//! ];
//!
//! let result = internalize(batch, &localhost, &generator).unwrap();
//! assert_eq!(result.entries[1].identifier.to_locator(), "Patient/1/_history/1");
//! let subject = result.entries[0].payload().unwrap().get("subject").unwrap();
//! assert_eq!(subject.as_reference().unwrap().reference(), Some("Patient/1/_history/1"));
//! ```

mod entry;
mod error;
mod field;
mod generator;
mod identifier;
mod importer;
mod locator;
mod map;
pub mod markup;
mod origin;
mod payload;
mod record;
mod sequence;

pub use entry::{BatchEntry, Verb};
pub use error::{BoxError, ErrorClass, ImportError};
pub use field::{Narrative, Reference, Uri};
pub use generator::{IdentifierGenerator, SequenceGenerator};
pub use identifier::{HISTORY_SEGMENT, Identifier};
pub use importer::{BatchImporter, Internalized, internalize};
pub use locator::Locator;
pub use map::IdentifierMap;
pub use markup::MarkupOutcome;
pub use origin::{Localhost, LocalhostConfig, OriginClassifier, OriginKind};
pub use payload::{Field, FieldMut, FieldRewriter, FieldVisitor, Payload, references};
pub use record::{Element, Record};
pub use sequence::{MemorySequence, Sequence, SequenceExhausted};

#[cfg(feature = "derive")]
pub use rekey_derive::{Payload, record};
