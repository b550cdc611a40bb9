//! Session records and the recording pipeline.
//!
//! A completed interval becomes a [`SessionRecord`] and goes to the
//! [`SessionStore`] on a blocking task, exactly once per completion. The
//! caller never waits on the store; the outcome comes back asynchronously
//! as a [`Notice`](crate::events::Notice).

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::StoreError;
use crate::events::Notice;

/// Opaque handle identifying the user a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserHandle(String);

impl UserHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One completed measured interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub duration_secs: u64,
    /// `None` when the user never picked a category.
    pub category: Option<String>,
    pub user: UserHandle,
    pub completed_at: DateTime<Utc>,
}

/// Where finished sessions go. Implementations may block; the recorder
/// always calls this off the tick path.
pub trait SessionStore: Send + Sync {
    fn persist_session(&self, record: &SessionRecord) -> Result<(), StoreError>;
}

/// Supplies the identity sessions are attributed to.
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Option<UserHandle>;
}

/// Hands completed intervals to the store without blocking the caller.
///
/// Every accepted interval reaches the store exactly once. Failures are
/// reported on the notice channel and never retried; the timer has already
/// moved on.
pub struct SessionRecorder {
    store: Arc<dyn SessionStore>,
    notices: mpsc::UnboundedSender<Notice>,
}

impl SessionRecorder {
    /// Returns the recorder and the receiving end of its notice stream.
    pub fn new(store: Arc<dyn SessionStore>) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (notices, rx) = mpsc::unbounded_channel();
        (Self { store, notices }, rx)
    }

    /// Queue one session for persistence. Zero-length intervals are
    /// rejected outright and nothing reaches the store.
    ///
    /// Must be called from within a tokio runtime.
    pub fn record(&self, duration_secs: u64, category: Option<String>, user: UserHandle) -> bool {
        if duration_secs == 0 {
            return false;
        }
        let record = SessionRecord {
            duration_secs,
            category,
            user,
            completed_at: Utc::now(),
        };
        let store = Arc::clone(&self.store);
        let notices = self.notices.clone();
        tokio::task::spawn_blocking(move || {
            let notice = match store.persist_session(&record) {
                Ok(()) => Notice::SessionSaved {
                    duration_secs: record.duration_secs,
                    category: record.category,
                    at: Utc::now(),
                },
                Err(e) => Notice::SessionSaveFailed {
                    duration_secs: record.duration_secs,
                    category: record.category,
                    reason: e.to_string(),
                    at: Utc::now(),
                },
            };
            let _ = notices.send(notice);
        });
        true
    }

    /// Surface a completion that had to be discarded because no profile
    /// was set.
    pub fn notify_identity_missing(&self, duration_secs: u64) {
        let _ = self.notices.send(Notice::IdentityMissing {
            duration_secs,
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use super::*;

    /// In-memory store for exercising the recording pipeline.
    #[derive(Default)]
    pub struct MemoryStore {
        records: Mutex<Vec<SessionRecord>>,
        fail_with: Option<String>,
    }

    impl MemoryStore {
        pub fn failing(reason: &str) -> Self {
            Self {
                records: Mutex::new(Vec::new()),
                fail_with: Some(reason.to_string()),
            }
        }

        pub fn records(&self) -> Vec<SessionRecord> {
            self.records.lock().unwrap().clone()
        }
    }

    impl SessionStore for MemoryStore {
        fn persist_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
            if let Some(reason) = &self.fail_with {
                return Err(StoreError::QueryFailed(reason.clone()));
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    /// Identity provider whose answer can change mid-test.
    pub struct SwitchableIdentity(Mutex<Option<UserHandle>>);

    impl SwitchableIdentity {
        pub fn named(name: &str) -> Self {
            Self(Mutex::new(Some(UserHandle::new(name))))
        }

        pub fn absent() -> Self {
            Self(Mutex::new(None))
        }

        pub fn clear(&self) {
            *self.0.lock().unwrap() = None;
        }
    }

    impl IdentityProvider for SwitchableIdentity {
        fn current_identity(&self) -> Option<UserHandle> {
            self.0.lock().unwrap().clone()
        }
    }
}
