//! Ticket/message store seams and an in-memory implementation.
//!
//! The resolver only reads through [`MessageStoreRead`]; ingestion also
//! writes through [`MessageStoreWrite`]. Every lookup is scoped to one
//! email account and returns the newest match first.

use chrono::NaiveDateTime;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::types::{NewTicket, StoreError, StoredMessage, Ticket};

pub trait MessageStoreRead {
    /// Whether a message with this provider id has been recorded.
    fn message_exists(&self, provider_message_id: &str) -> Result<bool, StoreError>;

    /// Whether a message with this internet message id has been recorded, in any account.
    fn internet_message_exists(&self, internet_message_id: &str) -> Result<bool, StoreError>;

    /// Ticket of the stored message with this internet message id, within the account.
    fn ticket_for_message(
        &self,
        email_account_id: &str,
        internet_message_id: &str,
    ) -> Result<Option<Ticket>, StoreError>;

    /// Ticket of the most recently created stored message whose internet
    /// message id is any of `internet_message_ids`, within the account.
    fn latest_ticket_for_messages(
        &self,
        email_account_id: &str,
        internet_message_ids: &[String],
    ) -> Result<Option<Ticket>, StoreError>;

    fn ticket_by_conversation(
        &self,
        email_account_id: &str,
        conversation_id: &str,
    ) -> Result<Option<Ticket>, StoreError>;

    /// Newest ticket whose subject equals `subject` ignoring case.
    fn latest_ticket_by_subject(
        &self,
        email_account_id: &str,
        subject: &str,
        is_archived: bool,
    ) -> Result<Option<Ticket>, StoreError>;
}

pub trait MessageStoreWrite {
    fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket, StoreError>;

    /// Fails with [`StoreError::Duplicate`] if the provider or internet
    /// message id is already recorded.
    fn insert_message(&self, message: StoredMessage) -> Result<(), StoreError>;

    fn attach_conversation(&self, ticket_id: &str, conversation_id: &str)
        -> Result<(), StoreError>;
}

#[derive(Default)]
struct Tables {
    tickets: Vec<Ticket>,
    ticket_positions: FxHashMap<String, usize>,
    messages: Vec<StoredMessage>,
    provider_ids: FxHashSet<String>,
    internet_ids: FxHashSet<String>,
    next_ticket: u64,
}

impl Tables {
    fn ticket(&self, ticket_id: &str) -> Option<&Ticket> {
        self.ticket_positions
            .get(ticket_id)
            .and_then(|&pos| self.tickets.get(pos))
    }

    /// Newest of the matching items; later insertion breaks `created_at` ties.
    fn newest<'a, T, I>(items: I, created_at: impl Fn(&T) -> NaiveDateTime) -> Option<&'a T>
    where
        T: 'a,
        I: Iterator<Item = (usize, &'a T)>,
    {
        items
            .max_by_key(|(pos, item)| (created_at(*item), *pos))
            .map(|(_, item)| item)
    }

    fn newest_message_ticket(
        &self,
        email_account_id: &str,
        matches: impl Fn(&str) -> bool,
    ) -> Option<Ticket> {
        let candidates = self.messages.iter().enumerate().filter(|(_, m)| {
            m.internet_message_id.as_deref().is_some_and(&matches)
                && self
                    .ticket(&m.ticket_id)
                    .is_some_and(|t| t.email_account_id == email_account_id)
        });
        Self::newest(candidates, |m: &StoredMessage| m.created_at)
            .and_then(|m| self.ticket(&m.ticket_id))
            .cloned()
    }
}

/// Process-local store backed by vectors under a mutex.
///
/// Enforces uniqueness of provider and internet message ids the way a
/// database constraint would. `set_unavailable(true)` makes every call fail.
#[derive(Default)]
pub struct InMemoryHelpdeskStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl InMemoryHelpdeskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    pub fn ticket_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.tickets.len())
    }

    /// Stored messages of a ticket in insertion order.
    pub fn messages_for_ticket(&self, ticket_id: &str) -> Result<Vec<StoredMessage>, StoreError> {
        Ok(self
            .lock()?
            .messages
            .iter()
            .filter(|m| m.ticket_id == ticket_id)
            .cloned()
            .collect())
    }

    pub fn get_ticket(&self, ticket_id: &str) -> Result<Option<Ticket>, StoreError> {
        Ok(self.lock()?.ticket(ticket_id).cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("store marked unavailable".to_string()));
        }
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }
}

impl MessageStoreRead for InMemoryHelpdeskStore {
    fn message_exists(&self, provider_message_id: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.provider_ids.contains(provider_message_id))
    }

    fn internet_message_exists(&self, internet_message_id: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.internet_ids.contains(internet_message_id))
    }

    fn ticket_for_message(
        &self,
        email_account_id: &str,
        internet_message_id: &str,
    ) -> Result<Option<Ticket>, StoreError> {
        let tables = self.lock()?;
        Ok(tables.newest_message_ticket(email_account_id, |id| id == internet_message_id))
    }

    fn latest_ticket_for_messages(
        &self,
        email_account_id: &str,
        internet_message_ids: &[String],
    ) -> Result<Option<Ticket>, StoreError> {
        let wanted: FxHashSet<&str> = internet_message_ids.iter().map(String::as_str).collect();
        let tables = self.lock()?;
        Ok(tables.newest_message_ticket(email_account_id, |id| wanted.contains(id)))
    }

    fn ticket_by_conversation(
        &self,
        email_account_id: &str,
        conversation_id: &str,
    ) -> Result<Option<Ticket>, StoreError> {
        let tables = self.lock()?;
        let candidates = tables.tickets.iter().enumerate().filter(|(_, t)| {
            t.email_account_id == email_account_id
                && t.provider_conversation_id.as_deref() == Some(conversation_id)
        });
        Ok(Tables::newest(candidates, |t: &Ticket| t.created_at).cloned())
    }

    fn latest_ticket_by_subject(
        &self,
        email_account_id: &str,
        subject: &str,
        is_archived: bool,
    ) -> Result<Option<Ticket>, StoreError> {
        let wanted = subject.to_lowercase();
        let tables = self.lock()?;
        let candidates = tables.tickets.iter().enumerate().filter(|(_, t)| {
            t.email_account_id == email_account_id
                && t.is_archived == is_archived
                && t.subject.to_lowercase() == wanted
        });
        Ok(Tables::newest(candidates, |t: &Ticket| t.created_at).cloned())
    }
}

impl MessageStoreWrite for InMemoryHelpdeskStore {
    fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        let mut tables = self.lock()?;
        tables.next_ticket += 1;
        let stored = Ticket {
            id: format!("ticket-{}", tables.next_ticket),
            tenant_id: ticket.tenant_id,
            subject: ticket.subject,
            email_account_id: ticket.email_account_id,
            provider_conversation_id: ticket.provider_conversation_id,
            is_archived: ticket.is_archived,
            created_at: ticket.created_at,
        };
        let pos = tables.tickets.len();
        tables.ticket_positions.insert(stored.id.clone(), pos);
        tables.tickets.push(stored.clone());
        Ok(stored)
    }

    fn insert_message(&self, message: StoredMessage) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        if tables.provider_ids.contains(&message.provider_message_id) {
            return Err(StoreError::Duplicate {
                entity: "provider_message_id",
                key: message.provider_message_id,
            });
        }
        if let Some(id) = &message.internet_message_id {
            if tables.internet_ids.contains(id) {
                return Err(StoreError::Duplicate {
                    entity: "internet_message_id",
                    key: id.clone(),
                });
            }
            tables.internet_ids.insert(id.clone());
        }
        tables
            .provider_ids
            .insert(message.provider_message_id.clone());
        tables.messages.push(message);
        Ok(())
    }

    fn attach_conversation(
        &self,
        ticket_id: &str,
        conversation_id: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        let pos = tables.ticket_positions.get(ticket_id).copied();
        match pos.and_then(|pos| tables.tickets.get_mut(pos)) {
            Some(ticket) => {
                ticket.provider_conversation_id = Some(conversation_id.to_string());
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("ticket {ticket_id}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn new_ticket(account: &str, subject: &str, archived: bool, hour: u32) -> NewTicket {
        NewTicket {
            tenant_id: "tenant-a".to_string(),
            subject: subject.to_string(),
            email_account_id: account.to_string(),
            provider_conversation_id: None,
            is_archived: archived,
            created_at: at(hour),
        }
    }

    fn message(ticket_id: &str, provider_id: &str, internet_id: &str, hour: u32) -> StoredMessage {
        StoredMessage {
            ticket_id: ticket_id.to_string(),
            provider_message_id: provider_id.to_string(),
            internet_message_id: Some(internet_id.to_string()),
            created_at: at(hour),
        }
    }

    #[test]
    fn test_insert_message_enforces_uniqueness() {
        let store = InMemoryHelpdeskStore::new();
        let ticket = store.insert_ticket(new_ticket("box-1", "Leak", false, 1)).unwrap();

        store.insert_message(message(&ticket.id, "p1", "<m1@x>", 1)).unwrap();

        assert_eq!(
            store.insert_message(message(&ticket.id, "p1", "<m2@x>", 2)),
            Err(StoreError::Duplicate {
                entity: "provider_message_id",
                key: "p1".to_string()
            })
        );
        assert!(matches!(
            store.insert_message(message(&ticket.id, "p2", "<m1@x>", 2)),
            Err(StoreError::Duplicate {
                entity: "internet_message_id",
                ..
            })
        ));
        assert!(store.message_exists("p1").unwrap());
        assert!(!store.message_exists("p2").unwrap());
    }

    #[test]
    fn test_internet_message_exists_spans_accounts() {
        let store = InMemoryHelpdeskStore::new();
        let ticket = store.insert_ticket(new_ticket("box-1", "Leak", false, 1)).unwrap();
        store.insert_message(message(&ticket.id, "p1", "<m1@x>", 1)).unwrap();

        assert!(store.internet_message_exists("<m1@x>").unwrap());
        assert!(!store.internet_message_exists("<m2@x>").unwrap());
    }

    #[test]
    fn test_get_ticket_by_id() {
        let store = InMemoryHelpdeskStore::new();
        let first = store.insert_ticket(new_ticket("box-1", "A", false, 1)).unwrap();
        let second = store.insert_ticket(new_ticket("box-1", "B", false, 2)).unwrap();

        assert_eq!(store.get_ticket(&second.id).unwrap(), Some(second));
        assert_eq!(store.get_ticket(&first.id).unwrap(), Some(first));
        assert_eq!(store.get_ticket("ticket-99").unwrap(), None);
    }

    #[test]
    fn test_latest_ticket_for_messages_prefers_newest() {
        let store = InMemoryHelpdeskStore::new();
        let older = store.insert_ticket(new_ticket("box-1", "A", false, 1)).unwrap();
        let newer = store.insert_ticket(new_ticket("box-1", "B", false, 2)).unwrap();
        store.insert_message(message(&older.id, "p1", "<a@x>", 5)).unwrap();
        store.insert_message(message(&newer.id, "p2", "<b@x>", 3)).unwrap();

        let refs = vec!["<a@x>".to_string(), "<b@x>".to_string()];
        let found = store.latest_ticket_for_messages("box-1", &refs).unwrap();

        // Message recency decides, not ticket recency.
        assert_eq!(found.map(|t| t.id), Some(older.id));
    }

    #[test]
    fn test_subject_lookup_scoped_and_case_insensitive() {
        let store = InMemoryHelpdeskStore::new();
        store.insert_ticket(new_ticket("box-2", "Pump failure", false, 1)).unwrap();
        let mine = store.insert_ticket(new_ticket("box-1", "PUMP FAILURE", false, 1)).unwrap();

        let found = store
            .latest_ticket_by_subject("box-1", "pump failure", false)
            .unwrap();
        assert_eq!(found.map(|t| t.id), Some(mine.id));
        assert!(store
            .latest_ticket_by_subject("box-1", "pump failure", true)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_attach_conversation() {
        let store = InMemoryHelpdeskStore::new();
        let ticket = store.insert_ticket(new_ticket("box-1", "Leak", false, 1)).unwrap();
        store.attach_conversation(&ticket.id, "conv-1").unwrap();

        let found = store.ticket_by_conversation("box-1", "conv-1").unwrap();
        assert_eq!(found.map(|t| t.id), Some(ticket.id));
        assert!(store.ticket_by_conversation("box-2", "conv-1").unwrap().is_none());
        assert!(matches!(
            store.attach_conversation("ticket-99", "conv-1"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_unavailable_store_fails_every_call() {
        let store = InMemoryHelpdeskStore::new();
        store.set_unavailable(true);

        assert!(matches!(
            store.message_exists("p1"),
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.insert_ticket(new_ticket("box-1", "Leak", false, 1)).is_err());

        store.set_unavailable(false);
        assert_eq!(store.ticket_count().unwrap(), 0);
    }
}
