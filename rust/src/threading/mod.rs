//! Inbound email threading for the help desk.
//!
//! Decides whether a newly received email continues an existing ticket,
//! using the email's threading headers, the provider's conversation id
//! and, as a last resort, a reply-style subject line.

mod headers;
mod resolver;
mod store;
mod types;

pub use headers::extract_threading_headers;
pub use resolver::ThreadResolver;
pub use store::{InMemoryHelpdeskStore, MessageStoreRead, MessageStoreWrite};
pub use types::{
    EmailIdentifiers, IncomingEmail, IngestOutcome, NewTicket, RawMessage, StoreError,
    StoredMessage, Strategy, ThreadingError, Ticket,
};
