//! Error taxonomy of the indexing pipeline.
//!
//! Every variant here is recovered locally by the collector or the
//! converter; none of them aborts a crawl. Storage and configuration
//! failures travel as `anyhow::Error` instead.

use thiserror::Error;

/// A failure attributed to one contributor, resource or row.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A contributor query timed out, errored, or its task panicked.
    #[error("contributor '{authority}' unreachable: {reason}")]
    ContributorUnreachable { authority: String, reason: String },

    /// A preference document could not be parsed.
    #[error("resource {resource_id} of '{package}' could not be parsed: {source}")]
    DocumentParse {
        package: String,
        resource_id: i32,
        #[source]
        source: DocumentParseError,
    },

    /// A discovered component failed the trust check.
    #[error("contributor '{authority}' is not trusted")]
    UntrustedContributor { authority: String },

    /// A row could not be built.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Why a preference document was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentParseError {
    #[error("malformed document at byte {position}: {message}")]
    Malformed { position: u64, message: String },

    #[error("document must start with <PreferenceScreen>, found <{found}>")]
    UnexpectedRoot { found: String },

    #[error("unresolved resource reference '{reference}'")]
    UnresolvedReference { reference: String },

    #[error("document could not be read: {0}")]
    Unreadable(String),
}

/// Why an [`IndexData`](crate::index_data::IndexData) row could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("index row has no key")]
    MissingKey,
    #[error("index row has no title")]
    MissingTitle,
    #[error("index row payload could not be serialized")]
    UnserializablePayload,
}
