//! Completion token used to coordinate asynchronous export operations.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::task::{Context as TaskContext, Poll, Waker};
use std::time::{Duration, Instant};

/// The terminal outcome of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
}

struct State {
    outcome: Option<Outcome>,
    callbacks: Vec<Box<dyn FnOnce(bool) + Send>>,
    wakers: Vec<Waker>,
}

struct Inner {
    state: Mutex<State>,
    done: Condvar,
}

/// A completion token for an operation that may still be in flight.
///
/// The token starts out pending and transitions exactly once to either
/// success or failure; later transition attempts are ignored. Completion
/// callbacks registered against an already terminal token run immediately on
/// the registering thread.
///
/// Cloning is cheap and all clones observe the same underlying cell. The
/// token implements [`Future`] (resolving to `true` on success), so async
/// callers can await it without blocking a thread; synchronous callers can
/// use [`join`](CompletableResultCode::join).
#[derive(Clone)]
pub struct CompletableResultCode {
    inner: Arc<Inner>,
}

impl CompletableResultCode {
    /// Creates a new pending token.
    pub fn new() -> Self {
        CompletableResultCode {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    outcome: None,
                    callbacks: Vec::new(),
                    wakers: Vec::new(),
                }),
                done: Condvar::new(),
            }),
        }
    }

    /// Returns a token that has already succeeded.
    pub fn of_success() -> Self {
        let code = Self::new();
        code.succeed();
        code
    }

    /// Returns a token that has already failed.
    pub fn of_failure() -> Self {
        let code = Self::new();
        code.fail();
        code
    }

    /// Completes this token successfully.
    ///
    /// Returns `false` if the token was already terminal, in which case the
    /// call had no effect.
    pub fn succeed(&self) -> bool {
        self.complete(Outcome::Success)
    }

    /// Completes this token with a failure.
    ///
    /// Returns `false` if the token was already terminal, in which case the
    /// call had no effect.
    pub fn fail(&self) -> bool {
        self.complete(Outcome::Failure)
    }

    fn complete(&self, outcome: Outcome) -> bool {
        let (callbacks, wakers, success) = {
            let mut state = match self.inner.state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome);
            (
                std::mem::take(&mut state.callbacks),
                std::mem::take(&mut state.wakers),
                outcome == Outcome::Success,
            )
        };
        self.inner.done.notify_all();
        for callback in callbacks {
            callback(success);
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Whether the token has reached a terminal state.
    pub fn is_done(&self) -> bool {
        self.lock_state().outcome.is_some()
    }

    /// Whether the token completed successfully. `false` while pending.
    pub fn is_success(&self) -> bool {
        self.lock_state().outcome == Some(Outcome::Success)
    }

    /// Registers a callback to run once the token is terminal.
    ///
    /// The callback receives `true` on success. If the token is already
    /// terminal the callback runs before this method returns.
    pub fn when_complete(&self, callback: impl FnOnce(bool) + Send + 'static) {
        let mut callback = Some(Box::new(callback) as Box<dyn FnOnce(bool) + Send>);
        let immediate = {
            let mut state = self.lock_state();
            match state.outcome {
                Some(outcome) => Some(outcome == Outcome::Success),
                None => {
                    state.callbacks.push(callback.take().expect("callback not yet consumed"));
                    None
                }
            }
        };
        if let (Some(success), Some(callback)) = (immediate, callback) {
            callback(success);
        }
    }

    /// Blocks the calling thread until the token is terminal or the timeout
    /// elapses. Returns `true` only on success within the timeout.
    pub fn join(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock_state();
        loop {
            if let Some(outcome) = state.outcome {
                return outcome == Outcome::Success;
            }
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) => remaining,
                None => return false,
            };
            state = match self.inner.done.wait_timeout(state, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Fans in multiple tokens.
    ///
    /// The returned token completes once every constituent has completed and
    /// succeeds only if all of them succeeded. An empty collection yields an
    /// immediate success.
    pub fn of_all(codes: impl IntoIterator<Item = CompletableResultCode>) -> Self {
        let codes: Vec<_> = codes.into_iter().collect();
        if codes.is_empty() {
            return Self::of_success();
        }
        let result = Self::new();
        let remaining = Arc::new(AtomicUsize::new(codes.len()));
        let all_succeeded = Arc::new(AtomicBool::new(true));
        for code in codes {
            let result = result.clone();
            let remaining = Arc::clone(&remaining);
            let all_succeeded = Arc::clone(&all_succeeded);
            code.when_complete(move |success| {
                if !success {
                    all_succeeded.store(false, Ordering::Relaxed);
                }
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    if all_succeeded.load(Ordering::Relaxed) {
                        result.succeed();
                    } else {
                        result.fail();
                    }
                }
            });
        }
        result
    }

    /// Whether `other` is a clone of this token, observing the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, State> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for CompletableResultCode {
    fn default() -> Self {
        Self::new()
    }
}

impl Future for CompletableResultCode {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<bool> {
        let mut state = self.lock_state();
        match state.outcome {
            Some(outcome) => Poll::Ready(outcome == Outcome::Success),
            None => {
                state.wakers.push(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl fmt::Debug for CompletableResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        let label = match state.outcome {
            None => "pending",
            Some(Outcome::Success) => "success",
            Some(Outcome::Failure) => "failure",
        };
        f.debug_tuple("CompletableResultCode").field(&label).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn transitions_once() {
        let code = CompletableResultCode::new();
        assert!(!code.is_done());
        assert!(code.succeed());
        assert!(!code.fail());
        assert!(code.is_success());
    }

    #[test]
    fn callback_runs_immediately_when_terminal() {
        let code = CompletableResultCode::of_failure();
        let called = Arc::new(AtomicU32::new(0));
        let called_clone = Arc::clone(&called);
        code.when_complete(move |success| {
            assert!(!success);
            called_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(called.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn of_all_succeeds_only_if_every_constituent_succeeds() {
        let a = CompletableResultCode::new();
        let b = CompletableResultCode::new();
        let all = CompletableResultCode::of_all([a.clone(), b.clone()]);
        assert!(!all.is_done());
        a.succeed();
        assert!(!all.is_done());
        b.succeed();
        assert!(all.is_success());

        let c = CompletableResultCode::new();
        let d = CompletableResultCode::new();
        let mixed = CompletableResultCode::of_all([c.clone(), d.clone()]);
        c.fail();
        d.succeed();
        assert!(mixed.is_done());
        assert!(!mixed.is_success());
    }

    #[test]
    fn of_all_empty_is_success() {
        assert!(CompletableResultCode::of_all([]).is_success());
    }

    #[test]
    fn join_times_out_while_pending() {
        let code = CompletableResultCode::new();
        assert!(!code.join(Duration::from_millis(10)));
        code.succeed();
        assert!(code.join(Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn awaiting_resolves_on_completion() {
        let code = CompletableResultCode::new();
        let waiter = code.clone();
        let handle = tokio::spawn(async move { waiter.await });
        tokio::time::sleep(Duration::from_millis(5)).await;
        code.succeed();
        assert!(handle.await.unwrap());
    }
}
