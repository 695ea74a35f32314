use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::auth::AuthError;
use crate::events::LogoutReason;

/// Outcome shared by every request waiting on one refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("token refresh failed: {message}")]
pub struct RefreshFailure {
    pub status: Option<StatusCode>,
    pub message: String,
}

impl RefreshFailure {
    pub fn new(status: Option<StatusCode>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// The refreshing task went away before reporting an outcome.
    pub fn abandoned() -> Self {
        Self::new(None, "refresh abandoned before completion")
    }

    pub fn logout_reason(&self) -> LogoutReason {
        LogoutReason::RefreshFailed(self.status.map(|status| status.as_u16()))
    }
}

impl From<AuthError> for RefreshFailure {
    fn from(err: AuthError) -> Self {
        Self::new(err.status(), err.to_string())
    }
}

type RefreshOutcome = Result<String, RefreshFailure>;

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

/// Single-flight gate for token refreshes.
///
/// The first caller of [`acquire_or_wait`](Self::acquire_or_wait) receives the
/// lease and performs the refresh; everyone arriving while the lease is live is
/// queued and receives the same outcome, in arrival order, once the lease settles.
#[derive(Clone, Default)]
pub struct RefreshCoordinator {
    state: Arc<Mutex<RefreshState>>,
}

pub enum RefreshTicket {
    Lead(RefreshLease),
    Wait(RefreshWait),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire_or_wait(&self) -> RefreshTicket {
        let mut state = self.lock();
        if state.in_flight {
            let (sender, receiver) = oneshot::channel();
            state.waiters.push_back(sender);
            RefreshTicket::Wait(RefreshWait { receiver })
        } else {
            state.in_flight = true;
            RefreshTicket::Lead(RefreshLease {
                coordinator: self.clone(),
                settled: false,
            })
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().in_flight
    }

    pub fn pending(&self) -> usize {
        self.lock().waiters.len()
    }

    fn settle(&self, outcome: RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.lock();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };

        // a waiter whose caller gave up has dropped its receiver; skip it
        let mut delivered = 0;
        for waiter in waiters {
            if waiter.send(outcome.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive right to perform the current refresh.
///
/// Dropping an unsettled lease settles all waiters with
/// [`RefreshFailure::abandoned`] and reopens the gate.
pub struct RefreshLease {
    coordinator: RefreshCoordinator,
    settled: bool,
}

impl RefreshLease {
    /// Hands `outcome` to every queued waiter and returns how many were still listening.
    pub fn settle(mut self, outcome: RefreshOutcome) -> usize {
        self.settled = true;
        self.coordinator.settle(outcome)
    }
}

impl Drop for RefreshLease {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.settle(Err(RefreshFailure::abandoned()));
        }
    }
}

/// Place in the queue behind an in-flight refresh.
pub struct RefreshWait {
    receiver: oneshot::Receiver<RefreshOutcome>,
}

impl RefreshWait {
    pub async fn wait(self) -> RefreshOutcome {
        self.receiver
            .await
            .unwrap_or_else(|_| Err(RefreshFailure::abandoned()))
    }
}
