use std::sync::{Mutex, MutexGuard, PoisonError};

/// A mutex-wrapped state with atomic transitions.
///
/// Service doubles keep their session bookkeeping in one of these so every
/// request and notification sees a consistent snapshot.
///
/// # Example
///
/// ```rust
/// use authprobe_common::StateMachine;
///
/// #[derive(Clone, PartialEq, Debug)]
/// enum Session {
///     SignedOut,
///     SignedIn(u64),
/// }
///
/// let machine = StateMachine::new(Session::SignedOut);
///
/// let changed = machine.transition(|state| match state {
///     Session::SignedOut => {
///         *state = Session::SignedIn(1);
///         true
///     }
///     Session::SignedIn(_) => false,
/// });
///
/// assert!(changed);
/// assert_eq!(machine.snapshot(), Session::SignedIn(1));
/// ```
#[derive(Debug, Default)]
pub struct StateMachine<S> {
    state: Mutex<S>,
}

impl<S> StateMachine<S> {
    pub fn new(initial_state: S) -> Self {
        Self {
            state: Mutex::new(initial_state),
        }
    }

    /// Direct access for reads that don't need a transition.
    ///
    /// A lock poisoned by a panicking writer is recovered; the state itself is
    /// always left consistent because transitions run to completion under the
    /// guard.
    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on the state while holding the lock and return its result.
    pub fn transition<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut state = self.lock();
        f(&mut state)
    }
}

impl<S: Clone> StateMachine<S> {
    pub fn snapshot(&self) -> S {
        self.lock().clone()
    }
}
