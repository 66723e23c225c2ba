use crate::identifier::Identifier;

/// Boxed error raised by a collaborator (identifier generator, sequence).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fatal conditions that abort a batch import.
///
/// Any of these means the batch must not be persisted: entries may already
/// have been partially rewritten when the error surfaced.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// An entry's identifier could not be placed in any origin category.
    #[error("identifier supplied without a recognizable origin: {0}")]
    MalformedIdentifier(Identifier),

    /// A reference that must point into the batch matched no entry.
    #[error("reference does not resolve to a resource on the server or in the current batch: {0}")]
    UnresolvedReference(Identifier),

    /// Two entries in one batch carry the same identifier.
    #[error("identifier appears on more than one entry in the batch: {0}")]
    DuplicateIdentifier(Identifier),

    /// The identifier generator failed.
    #[error("identifier generator failed: {0}")]
    Generator(#[source] BoxError),
}

/// How an [`ImportError`] should be surfaced to whoever submitted the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The batch itself is invalid.
    ClientInput,
    /// The batch is well formed but conflicts with server state.
    Conflict,
    /// A collaborator of the importer failed.
    Collaborator,
}

impl ImportError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ImportError::MalformedIdentifier(_) | ImportError::DuplicateIdentifier(_) => {
                ErrorClass::ClientInput
            }
            ImportError::UnresolvedReference(_) => ErrorClass::Conflict,
            ImportError::Generator(_) => ErrorClass::Collaborator,
        }
    }

    /// HTTP status code matching [`ImportError::class`].
    pub fn status_code(&self) -> u16 {
        match self.class() {
            ErrorClass::ClientInput => 400,
            ErrorClass::Conflict => 409,
            ErrorClass::Collaborator => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_and_unresolved_are_distinct() {
        let id = Identifier::new("Patient", "1");
        let malformed = ImportError::MalformedIdentifier(id.clone());
        let unresolved = ImportError::UnresolvedReference(id);

        assert_eq!(malformed.class(), ErrorClass::ClientInput);
        assert_eq!(malformed.status_code(), 400);
        assert_eq!(unresolved.class(), ErrorClass::Conflict);
        assert_eq!(unresolved.status_code(), 409);
    }

    #[test]
    fn generator_errors_keep_their_source() {
        let source = std::io::Error::other("disk gone");
        let err = ImportError::Generator(Box::new(source));
        assert_eq!(err.status_code(), 500);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("disk gone"));
    }

    #[test]
    fn messages_name_the_identifier() {
        let id = Identifier::new("Patient", "tmp-9").with_origin("http://localhost/fhir");
        let err = ImportError::UnresolvedReference(id);
        assert!(err.to_string().ends_with("http://localhost/fhir/Patient/tmp-9"));
    }
}
