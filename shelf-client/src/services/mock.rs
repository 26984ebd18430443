//! Mock services for testing.
//!
//! Each mock shares its state between clones, so a test can keep one clone
//! to script responses and inspect calls while the coordinator owns another.

use super::{ConnectivityProvider, IdentityService, SyncService};
use async_trait::async_trait;
use shelf_types::{unix_now, ServiceError, SyncResult, User, UserId, UserProfile};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

/// Mock identity service backed by an in-memory account table.
#[derive(Debug, Default)]
pub struct MockIdentity {
    inner: Arc<Mutex<MockIdentityInner>>,
}

#[derive(Debug, Default)]
struct MockIdentityInner {
    accounts: HashMap<String, (String, UserId)>,
    profiles: HashMap<UserId, UserProfile>,
    current: Option<UserId>,
    fail_next_login: Option<ServiceError>,
    fail_next_logout: Option<ServiceError>,
    fail_next_profile: Option<ServiceError>,
    hold_next_login: Option<Arc<Notify>>,
    hold_next_profile: Option<Arc<Notify>>,
    login_calls: usize,
    logout_calls: usize,
    profile_fetches: usize,
}

impl MockIdentity {
    /// Create a mock with no accounts and no persisted session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account and return the user it signs in as.
    pub fn add_account(&self, email: &str, password: &str, name: &str) -> User {
        let mut inner = self.inner.lock().unwrap();
        let id = UserId::random();
        inner
            .accounts
            .insert(email.to_string(), (password.to_string(), id.clone()));
        inner.profiles.insert(
            id.clone(),
            UserProfile {
                name: name.to_string(),
                email: email.to_string(),
            },
        );
        User {
            id,
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    /// Pretend `id` already has a persisted session (as after an earlier run).
    pub fn restore_session(&self, id: &UserId) {
        let mut inner = self.inner.lock().unwrap();
        inner.current = Some(id.clone());
    }

    /// Id of the account currently signed in at the service.
    pub fn signed_in(&self) -> Option<UserId> {
        self.inner.lock().unwrap().current.clone()
    }

    /// Cause the next login() to fail with the given error.
    pub fn fail_next_login(&self, error: ServiceError) {
        self.inner.lock().unwrap().fail_next_login = Some(error);
    }

    /// Cause the next logout() to fail with the given error.
    pub fn fail_next_logout(&self, error: ServiceError) {
        self.inner.lock().unwrap().fail_next_logout = Some(error);
    }

    /// Cause the next fetch_user_profile() to fail with the given error.
    pub fn fail_next_profile(&self, error: ServiceError) {
        self.inner.lock().unwrap().fail_next_profile = Some(error);
    }

    /// Hold the next login() open until the returned gate is notified.
    pub fn hold_next_login(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.inner.lock().unwrap().hold_next_login = Some(Arc::clone(&gate));
        gate
    }

    /// Hold the next fetch_user_profile() open until the returned gate is notified.
    pub fn hold_next_profile(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.inner.lock().unwrap().hold_next_profile = Some(Arc::clone(&gate));
        gate
    }

    /// Number of login() calls so far.
    pub fn login_calls(&self) -> usize {
        self.inner.lock().unwrap().login_calls
    }

    /// Number of logout() calls so far.
    pub fn logout_calls(&self) -> usize {
        self.inner.lock().unwrap().logout_calls
    }

    /// Number of fetch_user_profile() calls so far.
    pub fn profile_fetches(&self) -> usize {
        self.inner.lock().unwrap().profile_fetches
    }
}

impl Clone for MockIdentity {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl IdentityService for MockIdentity {
    async fn current_user_id(&self) -> Option<UserId> {
        self.inner.lock().unwrap().current.clone()
    }

    async fn fetch_user_profile(&self, id: &UserId) -> Result<UserProfile, ServiceError> {
        let gate = {
            let mut inner = self.inner.lock().unwrap();
            inner.profile_fetches += 1;
            inner.hold_next_profile.take()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_profile.take() {
            return Err(error);
        }
        inner
            .profiles
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("profile {}", id)))
    }

    async fn login(&self, email: &str, password: &str) -> Result<User, ServiceError> {
        let gate = {
            let mut inner = self.inner.lock().unwrap();
            inner.login_calls += 1;
            inner.hold_next_login.take()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_login.take() {
            return Err(error);
        }

        let id = match inner.accounts.get(email) {
            Some((expected, id)) if expected == password => id.clone(),
            Some(_) => return Err(ServiceError::Auth("invalid password".into())),
            None => return Err(ServiceError::Auth(format!("no account for {}", email))),
        };
        let profile = inner
            .profiles
            .get(&id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("profile {}", id)))?;

        inner.current = Some(id.clone());
        Ok(User::from_profile(id, profile))
    }

    async fn logout(&self) -> Result<(), ServiceError> {
        let mut inner = self.inner.lock().unwrap();
        inner.logout_calls += 1;
        if let Some(error) = inner.fail_next_logout.take() {
            return Err(error);
        }
        inner.current = None;
        Ok(())
    }
}

/// Mock sync service with queued results.
#[derive(Debug)]
pub struct MockSync {
    inner: Arc<Mutex<MockSyncInner>>,
}

#[derive(Debug)]
struct MockSyncInner {
    results: VecDeque<Result<SyncResult, ServiceError>>,
    default_item_count: u64,
    hold_next: Option<Arc<Notify>>,
    calls: usize,
}

impl MockSync {
    /// Create a mock whose syncs succeed with zero items unless scripted.
    pub fn new() -> Self {
        Self::with_item_count(0)
    }

    /// Create a mock whose unscripted syncs report `count` items.
    pub fn with_item_count(count: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockSyncInner {
                results: VecDeque::new(),
                default_item_count: count,
                hold_next: None,
                calls: 0,
            })),
        }
    }

    /// Queue a result for a future sync_all() call.
    pub fn queue_result(&self, result: Result<SyncResult, ServiceError>) {
        self.inner.lock().unwrap().results.push_back(result);
    }

    /// Hold the next sync_all() open until the returned gate is notified.
    pub fn hold_next(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.inner.lock().unwrap().hold_next = Some(Arc::clone(&gate));
        gate
    }

    /// Number of sync_all() calls so far.
    pub fn calls(&self) -> usize {
        self.inner.lock().unwrap().calls
    }
}

impl Default for MockSync {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockSync {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl SyncService for MockSync {
    async fn sync_all(&self) -> Result<SyncResult, ServiceError> {
        let gate = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls += 1;
            inner.hold_next.take()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut inner = self.inner.lock().unwrap();
        inner
            .results
            .pop_front()
            .unwrap_or_else(|| Ok(SyncResult::succeeded(inner.default_item_count, unix_now())))
    }
}

/// Mock reachability monitor fed by the test.
#[derive(Debug, Clone)]
pub struct MockConnectivity {
    sender: mpsc::UnboundedSender<Result<bool, ServiceError>>,
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<bool, ServiceError>>>>,
}

impl MockConnectivity {
    /// Create a monitor with no pending changes.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
        }
    }

    /// Report a reachability value.
    pub fn report(&self, connected: bool) {
        let _ = self.sender.send(Ok(connected));
    }

    /// Make the monitor fail with the given error.
    pub fn fail(&self, error: ServiceError) {
        let _ = self.sender.send(Err(error));
    }
}

impl Default for MockConnectivity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectivityProvider for MockConnectivity {
    async fn next_change(&self) -> Result<bool, ServiceError> {
        let mut receiver = self.receiver.lock().await;
        receiver
            .recv()
            .await
            .unwrap_or_else(|| Err(ServiceError::Unavailable("monitor closed".into())))
    }
}
