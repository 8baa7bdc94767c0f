// Best-effort security audit logging
// One security_logs row per event; failures are absorbed and reported through tracing

use async_trait::async_trait;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::{
    db::DieselPool,
    models::{NewSecurityLog, Resolution, SecurityEventKind, UserId},
    schema::security_logs,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to acquire database connection: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Query(#[from] diesel::result::Error),
}

/// Source of per-call database sessions for the security logger
#[async_trait]
pub trait SecurityLogStore: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn SecurityLogSession>, StoreError>;

    /// Reachability probe used by the health endpoint
    async fn health_check(&self) -> Result<(), StoreError> {
        let session = self.acquire().await?;
        session.release().await
    }
}

/// A single connection scoped to one logger call
#[async_trait]
pub trait SecurityLogSession: Send {
    async fn create(&mut self, record: &NewSecurityLog) -> Result<(), StoreError>;

    async fn release(self: Box<Self>) -> Result<(), StoreError>;
}

/// Store backed by the shared diesel-async pool
#[derive(Clone)]
pub struct DieselSecurityLogStore {
    pool: DieselPool,
}

impl DieselSecurityLogStore {
    pub fn new(pool: DieselPool) -> Self {
        Self { pool }
    }
}

struct PooledSession {
    conn: bb8::PooledConnection<'static, AsyncDieselConnectionManager<AsyncPgConnection>>,
}

#[async_trait]
impl SecurityLogStore for DieselSecurityLogStore {
    async fn acquire(&self) -> Result<Box<dyn SecurityLogSession>, StoreError> {
        let conn = self
            .pool
            .get_owned()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Box::new(PooledSession { conn }))
    }
}

#[async_trait]
impl SecurityLogSession for PooledSession {
    async fn create(&mut self, record: &NewSecurityLog) -> Result<(), StoreError> {
        use diesel_async::RunQueryDsl;

        diesel::insert_into(security_logs::table)
            .values(record)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn release(self: Box<Self>) -> Result<(), StoreError> {
        // Dropping the pooled connection hands it back to bb8
        drop(self.conn);
        Ok(())
    }
}

/// A security event as reported by a caller
#[derive(Debug, Clone, Default, Serialize)]
pub struct SecurityEvent {
    pub user_id: Option<UserId>,
    pub event_type: String,
    pub details: Map<String, Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl SecurityEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Default::default()
        }
    }

    pub fn user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn ip_address(mut self, ip_address: Option<impl Into<String>>) -> Self {
        self.ip_address = ip_address.map(Into::into);
        self
    }

    pub fn user_agent(mut self, user_agent: Option<impl Into<String>>) -> Self {
        self.user_agent = user_agent.map(Into::into);
        self
    }
}

/// Payload emitted when an event could not be stored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackRecord {
    pub event: String,
    pub user_id: Option<UserId>,
    pub details: Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub error: String,
}

/// What happened to an event. Never an error; callers are free to ignore it.
#[derive(Debug, Clone, PartialEq)]
pub enum LogOutcome {
    Persisted { kind: SecurityEventKind },
    Fallback(FallbackRecord),
}

impl LogOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, LogOutcome::Persisted { .. })
    }
}

#[derive(Clone)]
pub struct SecurityLogger {
    store: Arc<dyn SecurityLogStore>,
    /// Writes started by `dispatch`, shared by every clone
    pending: TaskTracker,
}

impl SecurityLogger {
    pub fn new(store: Arc<dyn SecurityLogStore>) -> Self {
        Self {
            store,
            pending: TaskTracker::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn SecurityLogStore> {
        &self.store
    }

    /// Record a security event, positional form.
    ///
    /// Unknown names are stored as `NULL`, legacy names are mapped onto
    /// their current kind, and the caller's name is kept in
    /// `details.originalEventType`. Storage failures end up in the
    /// fallback log line instead of the caller.
    pub async fn log_security_event(
        &self,
        user_id: Option<UserId>,
        event_type: &str,
        details: Option<Map<String, Value>>,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> LogOutcome {
        self.log(SecurityEvent {
            user_id,
            event_type: event_type.to_string(),
            details: details.unwrap_or_default(),
            ip_address: ip_address.map(str::to_string),
            user_agent: user_agent.map(str::to_string),
        })
        .await
    }

    pub async fn log(&self, event: SecurityEvent) -> LogOutcome {
        let resolved = SecurityEventKind::resolve(&event.event_type);
        if resolved.resolution == Resolution::Unrecognized {
            warn!(
                "Invalid event type: {}. Defaulting to \"{}\".",
                event.event_type,
                SecurityEventKind::Null
            );
        }
        let kind = resolved.kind;

        let record = NewSecurityLog::new(
            kind,
            &event.event_type,
            event.details.clone(),
            event.ip_address.clone(),
            event.user_agent.clone(),
            event.user_id,
        );

        match self.persist(&record).await {
            Ok(()) => {
                info!("Security event logged: {}", kind);
                LogOutcome::Persisted { kind }
            },
            Err(e) => {
                error!("Failed to log security event: {}", e);

                let fallback = FallbackRecord {
                    event: kind.as_str().to_string(),
                    user_id: event.user_id,
                    details: Value::Object(event.details),
                    ip_address: event.ip_address,
                    user_agent: event.user_agent,
                    error: e.to_string(),
                };
                let payload = serde_json::to_string(&fallback)
                    .unwrap_or_else(|_| format!("{:?}", fallback));
                warn!(target: "security_audit_fallback", "Fallback Log: {}", payload);

                LogOutcome::Fallback(fallback)
            },
        }
    }

    /// Spawn the write on the runtime and return immediately
    pub fn dispatch(&self, event: SecurityEvent) {
        let logger = self.clone();
        self.pending.spawn(async move {
            logger.log(event).await;
        });
    }

    /// Number of dispatched writes still running
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Wait for every dispatched write to finish. Writes dispatched afterwards
    /// are still tracked.
    pub async fn drain(&self) {
        self.pending.close();
        self.pending.wait().await;
        self.pending.reopen();
    }

    async fn persist(&self, record: &NewSecurityLog) -> Result<(), StoreError> {
        let mut session = self.store.acquire().await?;
        let result = session.create(record).await;

        // Released on both paths, exactly once
        if let Err(e) = session.release().await {
            warn!("Failed to release security log connection: {}", e);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Counters {
        acquired: AtomicUsize,
        released: AtomicUsize,
        records: Mutex<Vec<NewSecurityLog>>,
    }

    struct FakeStore {
        counters: Arc<Counters>,
        fail_acquire: bool,
        fail_insert: bool,
        fail_release: bool,
    }

    struct FakeSession {
        counters: Arc<Counters>,
        fail_insert: bool,
        fail_release: bool,
    }

    impl FakeStore {
        fn healthy(counters: Arc<Counters>) -> Self {
            Self {
                counters,
                fail_acquire: false,
                fail_insert: false,
                fail_release: false,
            }
        }
    }

    #[async_trait]
    impl SecurityLogStore for FakeStore {
        async fn acquire(&self) -> Result<Box<dyn SecurityLogSession>, StoreError> {
            if self.fail_acquire {
                return Err(StoreError::Connection("connection refused".to_string()));
            }
            self.counters.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession {
                counters: self.counters.clone(),
                fail_insert: self.fail_insert,
                fail_release: self.fail_release,
            }))
        }
    }

    #[async_trait]
    impl SecurityLogSession for FakeSession {
        async fn create(&mut self, record: &NewSecurityLog) -> Result<(), StoreError> {
            if self.fail_insert {
                return Err(StoreError::Query(diesel::result::Error::NotFound));
            }
            self.counters.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn release(self: Box<Self>) -> Result<(), StoreError> {
            self.counters.released.fetch_add(1, Ordering::SeqCst);
            if self.fail_release {
                return Err(StoreError::Connection("socket closed".to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unknown_event_is_stored_as_null() {
        let counters = Arc::new(Counters::default());
        let logger = SecurityLogger::new(Arc::new(FakeStore::healthy(counters.clone())));

        let outcome = logger
            .log_security_event(None, "TOTALLY_MADE_UP", None, None, None)
            .await;

        assert_eq!(
            outcome,
            LogOutcome::Persisted {
                kind: SecurityEventKind::Null
            }
        );
        let records = counters.records.lock().unwrap();
        assert_eq!(records[0].event_type, "NULL");
        assert_eq!(records[0].details, json!({ "originalEventType": "TOTALLY_MADE_UP" }));
    }

    #[tokio::test]
    async fn test_release_failure_does_not_hide_successful_insert() {
        let counters = Arc::new(Counters::default());
        let store = FakeStore {
            fail_release: true,
            ..FakeStore::healthy(counters.clone())
        };
        let logger = SecurityLogger::new(Arc::new(store));

        let outcome = logger.log(SecurityEvent::new("MFA_ENABLED").user(3)).await;

        assert!(outcome.is_persisted());
        assert_eq!(counters.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_acquire_failure_falls_back_without_release() {
        let counters = Arc::new(Counters::default());
        let store = FakeStore {
            fail_acquire: true,
            ..FakeStore::healthy(counters.clone())
        };
        let logger = SecurityLogger::new(Arc::new(store));

        let outcome = logger
            .log(SecurityEvent::new("SUCCESSFUL_LOGIN").user(9).detail("method", "otp"))
            .await;

        match outcome {
            LogOutcome::Fallback(fallback) => {
                assert_eq!(fallback.event, "SUCCESSFUL_LOGIN");
                assert_eq!(fallback.user_id, Some(9));
                assert_eq!(fallback.details, json!({ "method": "otp" }));
                assert!(fallback.error.contains("connection refused"));
            },
            other => panic!("expected fallback, got {:?}", other),
        }
        assert_eq!(counters.acquired.load(Ordering::SeqCst), 0);
        assert_eq!(counters.released.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_health_check_releases_session() {
        let counters = Arc::new(Counters::default());
        let store = FakeStore::healthy(counters.clone());

        assert!(store.health_check().await.is_ok());
        assert_eq!(counters.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(counters.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_builder() {
        let event = SecurityEvent::new("LOGIN_OTP_SENT")
            .user(1)
            .detail("channel", "sms")
            .ip_address(Some("10.1.1.1"))
            .user_agent(None::<String>);

        assert_eq!(event.user_id, Some(1));
        assert_eq!(event.details.get("channel"), Some(&json!("sms")));
        assert_eq!(event.ip_address.as_deref(), Some("10.1.1.1"));
        assert_eq!(event.user_agent, None);
    }
}
