//! Help desk ticket and message types used by the thread resolver.

use chrono::NaiveDateTime;
use pyo3::prelude::*;
use std::fmt;
use thiserror::Error;

/// Threading identifiers of one inbound email.
#[pyclass]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmailIdentifiers {
    /// Provider-assigned id; the idempotency key for ingestion.
    #[pyo3(get, set)]
    pub provider_message_id: String,
    /// RFC 5322 `Message-ID`.
    #[pyo3(get, set)]
    pub internet_message_id: Option<String>,
    /// Provider-level thread grouping.
    #[pyo3(get, set)]
    pub conversation_id: Option<String>,
    #[pyo3(get, set)]
    pub in_reply_to: Option<String>,
    /// Ancestor message ids, oldest first.
    #[pyo3(get, set)]
    pub references: Vec<String>,
}

#[pymethods]
impl EmailIdentifiers {
    #[new]
    #[pyo3(signature = (provider_message_id, internet_message_id=None, conversation_id=None, in_reply_to=None, references=None))]
    fn new(
        provider_message_id: String,
        internet_message_id: Option<String>,
        conversation_id: Option<String>,
        in_reply_to: Option<String>,
        references: Option<Vec<String>>,
    ) -> Self {
        Self {
            provider_message_id,
            internet_message_id,
            conversation_id,
            in_reply_to,
            references: references.unwrap_or_default(),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "EmailIdentifiers(provider_message_id={:?}, in_reply_to={:?}, references={})",
            self.provider_message_id,
            self.in_reply_to,
            self.references.len()
        )
    }
}

/// Provider envelope of a received email, before header parsing.
#[derive(Clone, Debug, Default)]
pub struct RawMessage {
    pub provider_message_id: String,
    pub internet_message_id: Option<String>,
    pub conversation_id: Option<String>,
    pub subject: String,
    /// Header (name, value) pairs in the order the provider returned them.
    pub headers: Vec<(String, String)>,
}

/// An inbound email ready for threading.
#[pyclass]
#[derive(Clone, Debug, Default)]
pub struct IncomingEmail {
    #[pyo3(get, set)]
    pub identifiers: EmailIdentifiers,
    #[pyo3(get, set)]
    pub subject: String,
}

#[pymethods]
impl IncomingEmail {
    #[new]
    fn new(identifiers: EmailIdentifiers, subject: String) -> Self {
        Self {
            identifiers,
            subject,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "IncomingEmail(provider_message_id={:?}, subject={:?})",
            self.identifiers.provider_message_id, self.subject
        )
    }
}

/// A support conversation owned by one tenant and one mailbox.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ticket {
    #[pyo3(get)]
    pub id: String,
    #[pyo3(get)]
    pub tenant_id: String,
    #[pyo3(get)]
    pub subject: String,
    #[pyo3(get)]
    pub email_account_id: String,
    #[pyo3(get)]
    pub provider_conversation_id: Option<String>,
    #[pyo3(get)]
    pub is_archived: bool,
    #[pyo3(get)]
    pub created_at: NaiveDateTime,
}

#[pymethods]
impl Ticket {
    fn __repr__(&self) -> String {
        format!(
            "Ticket(id={:?}, subject={:?}, email_account_id={:?}, archived={})",
            self.id, self.subject, self.email_account_id, self.is_archived
        )
    }
}

/// Ticket fields supplied by the caller; the store assigns the id.
#[derive(Clone, Debug)]
pub struct NewTicket {
    pub tenant_id: String,
    pub subject: String,
    pub email_account_id: String,
    pub provider_conversation_id: Option<String>,
    pub is_archived: bool,
    pub created_at: NaiveDateTime,
}

/// A processed email attached to a ticket. Immutable once stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredMessage {
    pub ticket_id: String,
    pub provider_message_id: String,
    pub internet_message_id: Option<String>,
    pub created_at: NaiveDateTime,
}

/// What ingestion did with an inbound email.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Already recorded; nothing written.
    Duplicate,
    Appended { ticket_id: String },
    Created { ticket_id: String },
}

impl IngestOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Appended { .. } => "appended",
            Self::Created { .. } => "created",
        }
    }

    pub fn ticket_id(&self) -> Option<&str> {
        match self {
            Self::Duplicate => None,
            Self::Appended { ticket_id } | Self::Created { ticket_id } => Some(ticket_id),
        }
    }
}

/// Matching strategies in the order they are tried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    Idempotency,
    InReplyTo,
    References,
    ConversationId,
    Subject,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idempotency => "idempotency",
            Self::InReplyTo => "in_reply_to",
            Self::References => "references",
            Self::ConversationId => "conversation_id",
            Self::Subject => "subject",
        };
        f.write_str(name)
    }
}

/// Failures reported by a ticket/message store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Errors surfaced to callers of the thread resolver.
///
/// A failed lookup is never reported as "no match".
#[derive(Error, Debug)]
pub enum ThreadingError {
    #[error("Store lookup failed during {strategy} matching: {source}")]
    StoreLookupFailure { strategy: Strategy, source: StoreError },
    #[error("Store write failed while ingesting {provider_message_id}: {source}")]
    StoreWriteFailure {
        provider_message_id: String,
        source: StoreError,
    },
}
