use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::state::{Access, CapabilityGate, Session, SessionPhase, User};
use crate::api::{IdentityApi, LoginRequest, RegisterRequest};
use crate::error::ClientError;

/// Owns the authentication state of the running client and notifies subscribers on change.
pub struct SessionManager {
    api: Arc<dyn IdentityApi>,
    state: watch::Sender<Session>,
}

/// Marks an exchange as outstanding until it is settled or dropped. An exchange dropped
/// unsettled while the phase is still `Unknown` fails closed to `Anonymous`.
struct ExchangeGuard<'a> {
    state: &'a watch::Sender<Session>,
    armed: bool,
}

impl<'a> ExchangeGuard<'a> {
    fn begin(state: &'a watch::Sender<Session>) -> Self {
        state.send_modify(Session::begin_exchange);
        Self { state, armed: true }
    }

    fn settle(mut self, apply: impl FnOnce(&mut Session)) {
        self.armed = false;
        self.state.send_modify(|session| {
            apply(session);
            session.end_exchange();
        });
    }
}

impl Drop for ExchangeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_modify(|session| {
                if session.phase() == &SessionPhase::Unknown {
                    session.sign_out();
                }
                session.end_exchange();
            });
        }
    }
}

impl SessionManager {
    pub fn new(api: Arc<dyn IdentityApi>) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self { api, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Runs the eager startup status check in the background.
    pub fn spawn_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let _ = manager.refresh_status().await;
        })
    }

    /// Fail-closed: any error leaves the session anonymous, and the error is still returned.
    pub async fn refresh_status(&self) -> Result<Session, ClientError> {
        let guard = ExchangeGuard::begin(&self.state);
        match self.api.auth_status().await {
            Ok(status) => {
                match status.username.filter(|name| !name.is_empty()) {
                    Some(username) if status.is_authenticated => {
                        debug!(%username, "session is authenticated");
                        guard.settle(|session| session.authenticate(User { username }));
                    }
                    None if status.is_authenticated => {
                        warn!("status reported an authenticated session without a username");
                        guard.settle(Session::sign_out);
                    }
                    _ => guard.settle(Session::sign_out),
                }
                Ok(self.snapshot())
            }
            Err(err) => {
                warn!(error = %err, "session status check failed");
                guard.settle(Session::sign_out);
                Err(err)
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<User, ClientError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ClientError::Validation(
                "Username and password are required.".to_string(),
            ));
        }
        let guard = ExchangeGuard::begin(&self.state);
        let request = LoginRequest {
            username: username.trim().to_string(),
            password: password.to_string(),
        };
        match self.api.login(&request).await {
            Ok(resp) => {
                let user = User {
                    username: resp.username,
                };
                let signed_in = user.clone();
                guard.settle(move |session| session.authenticate(signed_in));
                Ok(user)
            }
            Err(err) => {
                warn!(error = %err, "login failed");
                guard.settle(Session::sign_out);
                Err(match err {
                    ClientError::Rejected { message, .. } => ClientError::Auth(message),
                    other => other,
                })
            }
        }
    }

    /// Local state is cleared whatever the remote outcome; a remote failure is only reported.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let guard = ExchangeGuard::begin(&self.state);
        let outcome = self.api.logout().await;
        if let Err(err) = &outcome {
            warn!(error = %err, "remote logout failed; clearing local session anyway");
        }
        guard.settle(Session::sign_out);
        outcome
    }

    /// Creates an account; the session itself is left untouched.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<String, ClientError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ClientError::Validation(
                "Username and password are required.".to_string(),
            ));
        }
        let request = RegisterRequest {
            username: username.trim().to_string(),
            password: password.to_string(),
            email: email
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
        };
        let resp = self.api.register(&request).await?;
        Ok(resp.message)
    }
}

impl CapabilityGate for SessionManager {
    fn access(&self) -> Access {
        self.state.borrow().access()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AuthStatusResponse, LoginResponse, RegisterResponse};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct StubIdentity {
        status: Mutex<VecDeque<Result<AuthStatusResponse, ClientError>>>,
        login: Mutex<VecDeque<Result<LoginResponse, ClientError>>>,
        logout: Mutex<VecDeque<Result<(), ClientError>>>,
        registered: Mutex<Vec<RegisterRequest>>,
        status_delay: Option<Duration>,
        login_delay: Option<Duration>,
    }

    #[async_trait]
    impl IdentityApi for StubIdentity {
        async fn auth_status(&self) -> Result<AuthStatusResponse, ClientError> {
            if let Some(delay) = self.status_delay {
                tokio::time::sleep(delay).await;
            }
            self.status
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Transport("no stub response".into())))
        }

        async fn login(&self, _request: &LoginRequest) -> Result<LoginResponse, ClientError> {
            if let Some(delay) = self.login_delay {
                tokio::time::sleep(delay).await;
            }
            self.login
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Transport("no stub response".into())))
        }

        async fn logout(&self) -> Result<(), ClientError> {
            self.logout.lock().await.pop_front().unwrap_or(Ok(()))
        }

        async fn register(
            &self,
            request: &RegisterRequest,
        ) -> Result<RegisterResponse, ClientError> {
            self.registered.lock().await.push(request.clone());
            Ok(RegisterResponse {
                message: "User created successfully".into(),
            })
        }
    }

    fn manager_with(stub: StubIdentity) -> (Arc<StubIdentity>, SessionManager) {
        let stub = Arc::new(stub);
        let manager = SessionManager::new(stub.clone());
        (stub, manager)
    }

    fn authenticated(username: &str) -> AuthStatusResponse {
        AuthStatusResponse {
            is_authenticated: true,
            username: Some(username.into()),
        }
    }

    #[tokio::test]
    async fn refresh_sets_user_from_status() {
        let (stub, manager) = manager_with(StubIdentity::default());
        stub.status.lock().await.push_back(Ok(authenticated("alice")));

        let session = manager.refresh_status().await.unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.user().unwrap().username, "alice");
        assert!(!session.is_loading());
        assert_eq!(manager.access(), Access::Allowed);
    }

    #[tokio::test]
    async fn refresh_fails_closed_on_transport_error() {
        let (stub, manager) = manager_with(StubIdentity::default());
        stub.status
            .lock()
            .await
            .push_back(Err(ClientError::Transport("connection refused".into())));

        let err = manager.refresh_status().await.unwrap_err();
        assert_eq!(err.code(), "network_error");
        let session = manager.snapshot();
        assert_eq!(session.phase(), &SessionPhase::Anonymous);
        assert!(!session.is_loading());
        assert_eq!(manager.access(), Access::Denied);
    }

    #[tokio::test]
    async fn authenticated_status_without_username_is_anonymous() {
        let (stub, manager) = manager_with(StubIdentity::default());
        stub.status.lock().await.push_back(Ok(AuthStatusResponse {
            is_authenticated: true,
            username: None,
        }));

        let session = manager.refresh_status().await.unwrap();
        assert!(!session.is_authenticated());
        assert!(session.user().is_none());
    }

    #[tokio::test]
    async fn gate_is_pending_while_refresh_outstanding() {
        let (stub, manager) = manager_with(StubIdentity {
            status_delay: Some(Duration::from_millis(50)),
            ..StubIdentity::default()
        });
        stub.status.lock().await.push_back(Ok(authenticated("alice")));
        let manager = Arc::new(manager);
        let mut rx = manager.subscribe();

        let handle = manager.spawn_refresh();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().access(), Access::Pending);
        handle.await.unwrap();
        assert_eq!(manager.access(), Access::Allowed);
    }

    #[tokio::test]
    async fn login_success_and_failure() {
        let (stub, manager) = manager_with(StubIdentity::default());
        stub.login.lock().await.push_back(Ok(LoginResponse {
            username: "bob".into(),
            message: Some("Login successful".into()),
        }));
        stub.login.lock().await.push_back(Err(ClientError::Auth(
            "Invalid Credentials".into(),
        )));

        let user = manager.login("bob", "pw").await.unwrap();
        assert_eq!(user.username, "bob");
        assert!(manager.snapshot().is_authenticated());

        let err = manager.login("bob", "wrong").await.unwrap_err();
        assert_eq!(err, ClientError::Auth("Invalid Credentials".into()));
        let session = manager.snapshot();
        assert!(!session.is_authenticated());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn login_rejection_is_reported_as_auth_failure() {
        let (stub, manager) = manager_with(StubIdentity::default());
        stub.login.lock().await.push_back(Err(ClientError::Rejected {
            status: 400,
            message: "bad request".into(),
        }));
        let err = manager.login("bob", "pw").await.unwrap_err();
        assert_eq!(err.code(), "auth_error");
    }

    #[tokio::test]
    async fn login_transport_error_is_not_swallowed() {
        let (_stub, manager) = manager_with(StubIdentity::default());
        let err = manager.login("bob", "pw").await.unwrap_err();
        assert_eq!(err.code(), "network_error");
        assert!(!manager.snapshot().is_loading());
    }

    #[tokio::test]
    async fn logout_clears_local_state_even_when_remote_fails() {
        let (stub, manager) = manager_with(StubIdentity::default());
        stub.status.lock().await.push_back(Ok(authenticated("alice")));
        manager.refresh_status().await.unwrap();
        stub.logout.lock().await.push_back(Err(ClientError::Transport(
            "server error 500: http 500".into(),
        )));

        assert!(manager.logout().await.is_err());
        let session = manager.snapshot();
        assert!(!session.is_authenticated());
        assert!(session.user().is_none());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn cancelled_exchange_releases_loading() {
        let (stub, manager) = manager_with(StubIdentity {
            login_delay: Some(Duration::from_secs(5)),
            ..StubIdentity::default()
        });
        stub.status.lock().await.push_back(Ok(AuthStatusResponse {
            is_authenticated: false,
            username: None,
        }));
        manager.refresh_status().await.unwrap();
        let result =
            tokio::time::timeout(Duration::from_millis(20), manager.login("a", "b")).await;
        assert!(result.is_err());
        assert!(!manager.snapshot().is_loading());
    }

    #[tokio::test]
    async fn aborted_startup_refresh_fails_closed() {
        let (stub, manager) = manager_with(StubIdentity {
            status_delay: Some(Duration::from_secs(5)),
            ..StubIdentity::default()
        });
        stub.status.lock().await.push_back(Ok(authenticated("alice")));
        let manager = Arc::new(manager);
        let mut rx = manager.subscribe();

        let handle = manager.spawn_refresh();
        rx.changed().await.unwrap();
        assert_eq!(manager.access(), Access::Pending);
        handle.abort();
        let _ = handle.await;

        let session = manager.snapshot();
        assert!(!session.is_loading());
        assert_eq!(session.phase(), &SessionPhase::Anonymous);
        assert_eq!(manager.access(), Access::Denied);
    }

    #[tokio::test]
    async fn cancelled_login_before_first_status_fails_closed() {
        let (_stub, manager) = manager_with(StubIdentity {
            login_delay: Some(Duration::from_secs(5)),
            ..StubIdentity::default()
        });
        let result =
            tokio::time::timeout(Duration::from_millis(20), manager.login("a", "b")).await;
        assert!(result.is_err());
        assert!(!manager.snapshot().is_loading());
        assert_eq!(manager.access(), Access::Denied);
    }

    #[tokio::test]
    async fn register_validates_and_keeps_session() {
        let (stub, manager) = manager_with(StubIdentity::default());
        let err = manager.register("  ", "pw", None).await.unwrap_err();
        assert_eq!(err.code(), "validation_error");

        let message = manager
            .register("carol", "pw", Some(" "))
            .await
            .unwrap();
        assert_eq!(message, "User created successfully");
        let sent = stub.registered.lock().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].email.is_none());
        assert_eq!(manager.snapshot().phase(), &SessionPhase::Unknown);
    }
}
