//! Fibers: lightweight cooperative tasks with their own stack-as-continuation
//! (spec.md §3, §4.5).
//!
//! A fiber owns an execution state, its current continuation, a priority,
//! `scheduled`/`bound` synchronization flags, two globals maps (heritable
//! and ordinary — see `crate::lib` doc comment for why there are two), an
//! optional join handle for its result, and trace flags. State transitions
//! are checked and flipped with the same atomic-CAS discipline the teacher's
//! scheduler uses for strand bookkeeping (`scheduler::ACTIVE_STRANDS`).

use avail_core::{Atom, Continuation, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};

/// A fiber's place in its lifecycle (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiberState {
    Unstarted,
    Running,
    Suspended,
    Interrupted,
    Terminated,
    Aborted,
    Retired,
}

impl FiberState {
    /// Whether this state is terminal with respect to scheduling — no
    /// further `running` transition is legal once reached (pre-`retired`).
    pub fn is_terminal(self) -> bool {
        matches!(self, FiberState::Terminated | FiberState::Aborted | FiberState::Retired)
    }
}

bitflags::bitflags! {
    /// Why a fiber's execution should be traced, reduced from the
    /// original's `TraceFlag`/`FiberDescriber` machinery to the subset
    /// relevant to a core re-implementation: whether to log each L1
    /// instruction executed, and whether to log each method invocation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TraceFlags: u8 {
        const TRACE_L1_INSTRUCTIONS = 0b0000_0001;
        const TRACE_SENDS = 0b0000_0010;
    }
}

/// The outcome delivered to a fiber's result slot once it retires.
#[derive(Debug, Clone)]
pub enum FiberOutcome {
    Succeeded(Value),
    Failed(crate::error::FiberFailure),
}

/// A oneshot-style slot a parent fiber can block on to observe a child's
/// result (spec.md §4.5 names the `terminated`/`aborted` transitions but
/// not the waiting mechanism; the original exposes
/// `resultContinuation`/`failureContinuation` for this — see SPEC_FULL.md).
#[derive(Clone)]
pub struct FiberJoinHandle {
    inner: Arc<(Mutex<Option<FiberOutcome>>, Condvar)>,
}

impl FiberJoinHandle {
    pub fn new() -> Self {
        FiberJoinHandle {
            inner: Arc::new((Mutex::new(None), Condvar::new())),
        }
    }

    /// Deliver the outcome and wake any waiter. Called exactly once, by
    /// the scheduler, as the fiber transitions to `terminated`/`aborted`.
    pub fn deliver(&self, outcome: FiberOutcome) {
        let (lock, cvar) = &*self.inner;
        let mut slot = lock.lock().unwrap();
        debug_assert!(slot.is_none(), "a fiber's outcome may be delivered only once");
        *slot = Some(outcome);
        cvar.notify_all();
    }

    /// Block the calling thread until the fiber's outcome is delivered.
    pub fn join(&self) -> FiberOutcome {
        let (lock, cvar) = &*self.inner;
        let mut slot = lock.lock().unwrap();
        while slot.is_none() {
            slot = cvar.wait(slot).unwrap();
        }
        slot.take().expect("outcome present once notified")
    }
}

impl Default for FiberJoinHandle {
    fn default() -> Self {
        Self::new()
    }
}

struct FiberInner {
    id: u64,
    priority: AtomicU32,
    state: Mutex<FiberState>,
    scheduled: Mutex<bool>,
    bound: Mutex<bool>,
    continuation: Mutex<Option<Continuation>>,
    /// Propagated to forked fibers (spec.md scenario 4).
    heritable_globals: RwLock<HashMap<Atom, Value>>,
    /// Local to this fiber only; never inherited by a fork.
    ordinary_globals: RwLock<HashMap<Atom, Value>>,
    trace_flags: Mutex<TraceFlags>,
    join_handle: FiberJoinHandle,
}

static NEXT_FIBER_ID: AtomicU64 = AtomicU64::new(1);

/// A lightweight cooperative task (spec.md §3, §4.5).
#[derive(Clone)]
pub struct Fiber(Arc<FiberInner>);

impl Fiber {
    pub fn new(priority: u8) -> Self {
        Fiber(Arc::new(FiberInner {
            id: NEXT_FIBER_ID.fetch_add(1, Ordering::Relaxed),
            priority: AtomicU32::new(priority as u32),
            state: Mutex::new(FiberState::Unstarted),
            scheduled: Mutex::new(false),
            bound: Mutex::new(false),
            continuation: Mutex::new(None),
            heritable_globals: RwLock::new(HashMap::new()),
            ordinary_globals: RwLock::new(HashMap::new()),
            trace_flags: Mutex::new(TraceFlags::empty()),
            join_handle: FiberJoinHandle::new(),
        }))
    }

    /// Fork a child fiber, propagating heritable globals only (spec.md
    /// scenario 4).
    pub fn fork(&self, priority: u8) -> Self {
        let child = Fiber::new(priority);
        let parent_heritable = self.0.heritable_globals.read().unwrap().clone();
        *child.0.heritable_globals.write().unwrap() = parent_heritable;
        child
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn priority(&self) -> u8 {
        self.0.priority.load(Ordering::Relaxed) as u8
    }

    pub fn state(&self) -> FiberState {
        *self.0.state.lock().unwrap()
    }

    pub fn join_handle(&self) -> &FiberJoinHandle {
        &self.0.join_handle
    }

    pub fn trace_flags(&self) -> TraceFlags {
        *self.0.trace_flags.lock().unwrap()
    }

    pub fn set_trace_flags(&self, flags: TraceFlags) {
        *self.0.trace_flags.lock().unwrap() = flags;
    }

    pub fn continuation(&self) -> Option<Continuation> {
        self.0.continuation.lock().unwrap().clone()
    }

    pub fn set_continuation(&self, continuation: Option<Continuation>) {
        *self.0.continuation.lock().unwrap() = continuation;
    }

    pub fn heritable_global(&self, key: &Atom) -> Option<Value> {
        self.0.heritable_globals.read().unwrap().get(key).cloned()
    }

    pub fn set_heritable_global(&self, key: Atom, value: Value) {
        self.0.heritable_globals.write().unwrap().insert(key, value);
    }

    pub fn ordinary_global(&self, key: &Atom) -> Option<Value> {
        self.0.ordinary_globals.read().unwrap().get(key).cloned()
    }

    pub fn set_ordinary_global(&self, key: Atom, value: Value) {
        self.0.ordinary_globals.write().unwrap().insert(key, value);
    }

    /// Flip `scheduled` from false to true, asserting the hard error
    /// spec.md §4.5 calls for: "It is a hard error to schedule a fiber
    /// already scheduled."
    pub fn mark_scheduled(&self) {
        let mut scheduled = self.0.scheduled.lock().unwrap();
        assert!(!*scheduled, "fiber {} scheduled twice", self.0.id);
        *scheduled = true;
    }

    pub fn clear_scheduled(&self) {
        *self.0.scheduled.lock().unwrap() = false;
    }

    /// Flip `bound` from false to true, asserting the companion hard error:
    /// "or to bind a fiber already bound."
    pub fn mark_bound(&self) {
        let mut bound = self.0.bound.lock().unwrap();
        assert!(!*bound, "fiber {} bound twice", self.0.id);
        *bound = true;
    }

    pub fn clear_bound(&self) {
        *self.0.bound.lock().unwrap() = false;
    }

    /// Attempt a state transition, asserting it is one spec.md §4.5 allows.
    pub fn transition(&self, to: FiberState) {
        let mut state = self.0.state.lock().unwrap();
        let legal = match (*state, to) {
            (FiberState::Unstarted, FiberState::Running) => true,
            (FiberState::Running, FiberState::Suspended) => true,
            (FiberState::Running, FiberState::Interrupted) => true,
            (FiberState::Suspended, FiberState::Running) => true,
            (FiberState::Interrupted, FiberState::Running) => true,
            (FiberState::Running, FiberState::Terminated) => true,
            (_, FiberState::Aborted) => !state.is_terminal(),
            (FiberState::Terminated, FiberState::Retired) => true,
            (FiberState::Aborted, FiberState::Retired) => true,
            _ => false,
        };
        assert!(legal, "illegal fiber transition {state:?} -> {to:?}");
        *state = to;
    }

    /// Cancel cooperatively by writing a terminal state prior to
    /// resumption (spec.md §4.5 "Cancellation").
    pub fn cancel(&self) {
        let mut state = self.0.state.lock().unwrap();
        if !state.is_terminal() {
            *state = FiberState::Aborted;
        }
    }
}

impl PartialEq for Fiber {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for Fiber {}

impl std::fmt::Debug for Fiber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fiber(#{}, {:?})", self.0.id, self.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_propagates_heritable_globals_only() {
        let parent = Fiber::new(100);
        let heritable_key = Atom::new("heritable");
        let ordinary_key = Atom::new("ordinary");
        parent.set_heritable_global(heritable_key.clone(), Value::Integer(1));
        parent.set_ordinary_global(ordinary_key.clone(), Value::Integer(2));

        let child = parent.fork(100);
        assert_eq!(child.heritable_global(&heritable_key), Some(Value::Integer(1)));
        assert_eq!(child.ordinary_global(&ordinary_key), None);
    }

    #[test]
    fn lifecycle_transitions() {
        let fiber = Fiber::new(100);
        fiber.transition(FiberState::Running);
        fiber.transition(FiberState::Terminated);
        fiber.transition(FiberState::Retired);
        assert_eq!(fiber.state(), FiberState::Retired);
    }

    #[test]
    #[should_panic(expected = "illegal fiber transition")]
    fn cannot_resume_a_retired_fiber() {
        let fiber = Fiber::new(100);
        fiber.transition(FiberState::Running);
        fiber.transition(FiberState::Terminated);
        fiber.transition(FiberState::Retired);
        fiber.transition(FiberState::Running);
    }

    #[test]
    #[should_panic(expected = "scheduled twice")]
    fn double_schedule_is_a_hard_error() {
        let fiber = Fiber::new(100);
        fiber.mark_scheduled();
        fiber.mark_scheduled();
    }

    #[test]
    fn join_handle_delivers_result() {
        let handle = FiberJoinHandle::new();
        let waiter = handle.clone();
        let worker = std::thread::spawn(move || {
            waiter.deliver(FiberOutcome::Succeeded(Value::Integer(42)));
        });
        let outcome = handle.join();
        worker.join().unwrap();
        assert!(matches!(outcome, FiberOutcome::Succeeded(Value::Integer(42))));
    }
}
