//! Matching inbound emails to existing help desk tickets.

use chrono::NaiveDateTime;

use crate::config::ThreadingConfig;
use crate::{log_changes, log_checks};

use super::store::{MessageStoreRead, MessageStoreWrite};
use super::types::{
    EmailIdentifiers, IncomingEmail, IngestOutcome, NewTicket, StoreError, StoredMessage,
    Strategy, ThreadingError, Ticket,
};

/// Inputs shared by every matching strategy.
struct LookupContext<'a> {
    email_account_id: &'a str,
    identifiers: &'a EmailIdentifiers,
    subject: &'a str,
}

type StrategyFn<S> =
    fn(&ThreadResolver<S>, &LookupContext<'_>) -> Result<Option<Ticket>, StoreError>;

/// Resolves inbound emails to tickets through a store.
///
/// Strategies run from most to least reliable and stop at the first hit:
/// In-Reply-To, References, provider conversation id, then a reply-subject
/// fallback. All of them are scoped to a single email account.
pub struct ThreadResolver<S> {
    store: S,
    config: ThreadingConfig,
}

impl<S> ThreadResolver<S> {
    pub fn new(store: S, config: ThreadingConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ThreadingConfig {
        &self.config
    }
}

impl<S: MessageStoreRead> ThreadResolver<S> {
    /// Whether this provider message was already ingested. Read-only.
    pub fn message_exists(&self, provider_message_id: &str) -> Result<bool, ThreadingError> {
        self.store
            .message_exists(provider_message_id)
            .map_err(|source| ThreadingError::StoreLookupFailure {
                strategy: Strategy::Idempotency,
                source,
            })
    }

    /// Find the ticket an inbound email belongs to, or `None` to open a new one.
    ///
    /// A store failure in any strategy aborts the search with
    /// [`ThreadingError::StoreLookupFailure`].
    pub fn find_existing_ticket(
        &self,
        email_account_id: &str,
        identifiers: &EmailIdentifiers,
        subject: &str,
    ) -> Result<Option<Ticket>, ThreadingError> {
        let ctx = LookupContext {
            email_account_id,
            identifiers,
            subject,
        };
        let verbosity = self.config.verbosity;

        for (strategy, run) in Self::strategies() {
            let found = run(self, &ctx)
                .map_err(|source| ThreadingError::StoreLookupFailure { strategy, source })?;
            match found {
                Some(ticket) => {
                    log_changes!(
                        verbosity,
                        "Matched {} to ticket {} by {}",
                        identifiers.provider_message_id,
                        ticket.id,
                        strategy
                    );
                    return Ok(Some(ticket));
                }
                None => log_checks!(
                    verbosity,
                    "No {} match for {}",
                    strategy,
                    identifiers.provider_message_id
                ),
            }
        }
        Ok(None)
    }

    fn strategies() -> [(Strategy, StrategyFn<S>); 4] {
        [
            (Strategy::InReplyTo, Self::match_in_reply_to),
            (Strategy::References, Self::match_references),
            (Strategy::ConversationId, Self::match_conversation),
            (Strategy::Subject, Self::match_reply_subject),
        ]
    }

    fn match_in_reply_to(&self, ctx: &LookupContext<'_>) -> Result<Option<Ticket>, StoreError> {
        let parent = ctx
            .identifiers
            .in_reply_to
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        match parent {
            Some(id) => self.store.ticket_for_message(ctx.email_account_id, id),
            None => Ok(None),
        }
    }

    fn match_references(&self, ctx: &LookupContext<'_>) -> Result<Option<Ticket>, StoreError> {
        if ctx.identifiers.references.is_empty() {
            return Ok(None);
        }
        self.store
            .latest_ticket_for_messages(ctx.email_account_id, &ctx.identifiers.references)
    }

    fn match_conversation(&self, ctx: &LookupContext<'_>) -> Result<Option<Ticket>, StoreError> {
        match ctx.identifiers.conversation_id.as_deref() {
            Some(id) if !id.is_empty() => {
                self.store.ticket_by_conversation(ctx.email_account_id, id)
            }
            _ => Ok(None),
        }
    }

    /// Last resort for clients that drop threading headers. Active tickets
    /// are preferred; archived ones are only consulted when none match.
    fn match_reply_subject(&self, ctx: &LookupContext<'_>) -> Result<Option<Ticket>, StoreError> {
        let Some(stripped) = self.config.strip_reply_prefix(ctx.subject) else {
            return Ok(None);
        };
        if let Some(active) =
            self.store
                .latest_ticket_by_subject(ctx.email_account_id, stripped, false)?
        {
            return Ok(Some(active));
        }
        self.store
            .latest_ticket_by_subject(ctx.email_account_id, stripped, true)
    }
}

impl<S: MessageStoreRead + MessageStoreWrite> ThreadResolver<S> {
    /// Record an inbound email, appending it to a matched ticket or opening a new one.
    ///
    /// Redelivered emails are reported as [`IngestOutcome::Duplicate`], both
    /// when caught up front and when the store's uniqueness constraint
    /// rejects the write.
    pub fn ingest(
        &self,
        tenant_id: &str,
        email_account_id: &str,
        email: &IncomingEmail,
        received_at: NaiveDateTime,
    ) -> Result<IngestOutcome, ThreadingError> {
        let ids = &email.identifiers;
        let verbosity = self.config.verbosity;

        if self.message_exists(&ids.provider_message_id)? {
            log_checks!(verbosity, "Skipping already ingested {}", ids.provider_message_id);
            return Ok(IngestOutcome::Duplicate);
        }
        if let Some(internet_id) = &ids.internet_message_id {
            let seen = self
                .store
                .internet_message_exists(internet_id)
                .map_err(|source| ThreadingError::StoreLookupFailure {
                    strategy: Strategy::Idempotency,
                    source,
                })?;
            if seen {
                log_checks!(
                    verbosity,
                    "Skipping {}: {} already ingested",
                    ids.provider_message_id,
                    internet_id
                );
                return Ok(IngestOutcome::Duplicate);
            }
        }

        let write_err = |source: StoreError| ThreadingError::StoreWriteFailure {
            provider_message_id: ids.provider_message_id.clone(),
            source,
        };

        let existing = self.find_existing_ticket(email_account_id, ids, &email.subject)?;
        let (ticket_id, created) = match existing {
            Some(ticket) => {
                if ticket.provider_conversation_id.is_none() {
                    if let Some(conversation_id) = &ids.conversation_id {
                        self.store
                            .attach_conversation(&ticket.id, conversation_id)
                            .map_err(write_err)?;
                    }
                }
                (ticket.id, false)
            }
            None => {
                let ticket = self
                    .store
                    .insert_ticket(NewTicket {
                        tenant_id: tenant_id.to_string(),
                        subject: email.subject.clone(),
                        email_account_id: email_account_id.to_string(),
                        provider_conversation_id: ids.conversation_id.clone(),
                        is_archived: false,
                        created_at: received_at,
                    })
                    .map_err(write_err)?;
                (ticket.id, true)
            }
        };

        let message = StoredMessage {
            ticket_id: ticket_id.clone(),
            provider_message_id: ids.provider_message_id.clone(),
            internet_message_id: ids.internet_message_id.clone(),
            created_at: received_at,
        };
        match self.store.insert_message(message) {
            Ok(()) => {}
            Err(StoreError::Duplicate { entity, key }) => {
                log_checks!(verbosity, "Concurrent delivery of {} ({})", key, entity);
                return Ok(IngestOutcome::Duplicate);
            }
            Err(source) => return Err(write_err(source)),
        }

        if created {
            log_changes!(
                verbosity,
                "Created ticket {} for {}",
                ticket_id,
                ids.provider_message_id
            );
            Ok(IngestOutcome::Created { ticket_id })
        } else {
            log_changes!(
                verbosity,
                "Appended {} to ticket {}",
                ids.provider_message_id,
                ticket_id
            );
            Ok(IngestOutcome::Appended { ticket_id })
        }
    }
}
