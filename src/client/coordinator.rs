//! Single-flight access token renewal.
//!
//! When several requests are rejected at once, exactly one renewal exchange
//! runs. Every caller, including the one that started it, waits on a
//! `oneshot` for the shared outcome. The exchange itself runs on a spawned
//! task so it always completes even if the caller that started it is dropped.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

use super::error::ClientError;
use super::token::TokenStore;

/// Default deadline for a renewal exchange.
pub const DEFAULT_RENEWAL_DEADLINE: Duration = Duration::from_secs(10);

/// Client-side view of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Valid,
    Renewing,
    LoggedOut,
}

/// Performs the actual renewal call, returning a new access token.
pub trait Renewer: Send + Sync + 'static {
    fn renew(&self) -> impl Future<Output = Result<String, ClientError>> + Send;
}

type Outcome = Result<String, ClientError>;

#[derive(Default)]
struct Flight {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<Outcome>>,
    /// Bumped every time the stored token changes. Always written together
    /// with the token, under this lock.
    generation: u64,
}

struct Inner<R> {
    renewer: R,
    tokens: TokenStore,
    flight: Mutex<Flight>,
    state: watch::Sender<SessionState>,
    deadline: Duration,
}

/// Owns the access token and serializes its renewal.
pub struct RenewalCoordinator<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for RenewalCoordinator<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Renewer> RenewalCoordinator<R> {
    pub fn new(renewer: R) -> Self {
        Self::with_deadline(renewer, DEFAULT_RENEWAL_DEADLINE)
    }

    pub fn with_deadline(renewer: R, deadline: Duration) -> Self {
        let (state, _) = watch::channel(SessionState::LoggedOut);
        Self {
            inner: Arc::new(Inner {
                renewer,
                tokens: TokenStore::new(),
                flight: Mutex::new(Flight::default()),
                state,
                deadline,
            }),
        }
    }

    /// The current access token, if any.
    pub fn token(&self) -> Option<String> {
        self.inner.tokens.get()
    }

    /// A read-only handle to the token slot.
    pub fn token_store(&self) -> TokenStore {
        self.inner.tokens.clone()
    }

    pub fn session_state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Watch session transitions, e.g. to react to a forced logout.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Store the token from a successful login or registration.
    pub fn sign_in(&self, token: String) {
        let mut flight = self.inner.lock();
        flight.generation += 1;
        self.inner.tokens.set(token);
        self.inner.state.send_replace(SessionState::Valid);
    }

    /// Forget the access token.
    pub fn sign_out(&self) {
        let mut flight = self.inner.lock();
        flight.generation += 1;
        self.inner.tokens.clear();
        self.inner.state.send_replace(SessionState::LoggedOut);
    }

    /// Obtain a fresh access token, joining the exchange in flight if there
    /// is one. Any renewal failure ends the session.
    pub async fn renew(&self) -> Result<String, ClientError> {
        let (tx, rx) = oneshot::channel();
        let start = {
            let mut flight = self.inner.lock();
            flight.waiters.push(tx);
            !std::mem::replace(&mut flight.in_flight, true)
        };
        self.join(start, rx).await
    }

    /// Renew on behalf of a request that was sent at `generation`. If the
    /// token has changed since, no exchange is started: a newer token is
    /// returned for replay, and a cleared one means the session already
    /// ended.
    async fn renew_after(&self, generation: u64) -> Result<String, ClientError> {
        let (tx, rx) = oneshot::channel();
        let start = {
            let mut flight = self.inner.lock();
            if flight.generation != generation {
                return self.inner.tokens.get().ok_or(ClientError::SessionExpired);
            }
            flight.waiters.push(tx);
            !std::mem::replace(&mut flight.in_flight, true)
        };
        self.join(start, rx).await
    }

    async fn join(&self, start: bool, rx: oneshot::Receiver<Outcome>) -> Result<String, ClientError> {
        if start {
            self.inner.state.send_replace(SessionState::Renewing);
            let inner = self.inner.clone();
            tokio::spawn(async move {
                let outcome = inner.exchange().await;
                inner.settle(outcome);
            });
        } else {
            debug!("Joining renewal in flight");
        }

        rx.await.unwrap_or(Err(ClientError::SessionExpired))
    }

    /// Run `op` with the current token. If the server rejects the token,
    /// renew once and replay `op` with the new token. A request is never
    /// replayed twice, and nothing is replayed if renewal fails.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, ClientError>
    where
        F: Fn(Option<String>) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let (used, generation) = {
            let flight = self.inner.lock();
            (self.inner.tokens.get(), flight.generation)
        };
        match op(used).await {
            Err(e) if e.is_auth_rejection() => {
                let token = self.renew_after(generation).await?;
                op(Some(token)).await
            }
            other => other,
        }
    }
}

impl<R: Renewer> Inner<R> {
    fn lock(&self) -> std::sync::MutexGuard<'_, Flight> {
        self.flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn exchange(&self) -> Outcome {
        let call = AssertUnwindSafe(self.renewer.renew()).catch_unwind();
        match tokio::time::timeout(self.deadline, call).await {
            Ok(Ok(Ok(token))) => Ok(token),
            Ok(Ok(Err(e))) => {
                warn!(error = %e, "Token renewal failed");
                Err(ClientError::SessionExpired)
            }
            Ok(Err(_)) => {
                warn!("Token renewal panicked");
                Err(ClientError::SessionExpired)
            }
            Err(_) => {
                warn!(deadline_ms = self.deadline.as_millis() as u64, "Token renewal timed out");
                Err(ClientError::SessionExpired)
            }
        }
    }

    /// Publish the outcome. Token update, waiter fan-out and clearing the
    /// in-flight flag happen under one lock hold, so no new caller can start
    /// a second exchange before every waiter has been served.
    fn settle(&self, outcome: Outcome) {
        let mut flight = self.lock();

        let state = match &outcome {
            Ok(token) => {
                self.tokens.set(token.clone());
                SessionState::Valid
            }
            Err(_) => {
                self.tokens.clear();
                SessionState::LoggedOut
            }
        };

        flight.generation += 1;
        for waiter in flight.waiters.drain(..) {
            // A dropped receiver just means that caller went away.
            let _ = waiter.send(outcome.clone());
        }
        flight.in_flight = false;
        self.state.send_replace(state);
    }
}
