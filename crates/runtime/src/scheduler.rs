//! The fiber scheduler: a priority queue of fibers running on May
//! coroutines (spec.md §4.5, §5).
//!
//! Grounded directly on the teacher's `scheduler.rs`: the same lock-free
//! atomic fiber-lifecycle counters, the same bounded-slot-array registry
//! for stuck-fiber detection, and the same condvar-based shutdown wait. The
//! teacher schedules opaque native coroutines calling back into generated
//! LLVM code in spawn order; this scheduler instead schedules `Fiber`s that
//! run through `crate::interpreter::Interpreter`, replacing the teacher's
//! FIFO dispatch with spec.md's priority/quasi-deadline ordering.

use crate::error::FiberFailure;
use crate::fiber::{Fiber, FiberOutcome, FiberState, FiberJoinHandle};
use crate::interpreter::{to_fiber_failure, Interpreter};
use crate::primitive::PrimitiveRegistry;
use crate::registry::ModuleLoader;
use avail_core::{Atom, Function, Value};
use may::coroutine;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, Once};
use std::time::{SystemTime, UNIX_EPOCH};

pub static ACTIVE_FIBERS: AtomicUsize = AtomicUsize::new(0);
pub static TOTAL_SPAWNED: AtomicU64 = AtomicU64::new(0);
pub static TOTAL_RETIRED: AtomicU64 = AtomicU64::new(0);
pub static PEAK_FIBERS: AtomicUsize = AtomicUsize::new(0);

static SHUTDOWN_CONDVAR: Condvar = Condvar::new();
static SHUTDOWN_MUTEX: Mutex<()> = Mutex::new(());

const DEFAULT_REGISTRY_SIZE: usize = 1024;

/// Default coroutine stack size: 1MB, overridable via `AVAIL_FIBER_STACK_SIZE`.
const DEFAULT_FIBER_STACK_SIZE: usize = 0x100000;

static STACK_SIZE_INIT: Once = Once::new();

/// Parse a coroutine stack size from an optional env value, warning to
/// stderr and falling back to `DEFAULT_FIBER_STACK_SIZE` on a missing,
/// zero, or unparseable value (same convention as the teacher's
/// `parse_stack_size` for `SEQ_STACK_SIZE`).
fn parse_stack_size(env_value: Option<String>) -> usize {
    match env_value {
        Some(val) => match val.parse::<usize>() {
            Ok(0) => {
                eprintln!(
                    "Warning: AVAIL_FIBER_STACK_SIZE=0 is invalid, using default {DEFAULT_FIBER_STACK_SIZE}"
                );
                DEFAULT_FIBER_STACK_SIZE
            }
            Ok(size) => size,
            Err(_) => {
                eprintln!(
                    "Warning: AVAIL_FIBER_STACK_SIZE='{val}' is not a valid number, using default {DEFAULT_FIBER_STACK_SIZE}"
                );
                DEFAULT_FIBER_STACK_SIZE
            }
        },
        None => DEFAULT_FIBER_STACK_SIZE,
    }
}

/// Configure May's coroutine stack size from `AVAIL_FIBER_STACK_SIZE`, once
/// per process (May panics if `set_stack_size` is called after the first
/// coroutine spawns, so every `Scheduler::new` funnels through this).
fn configure_stack_size() {
    STACK_SIZE_INIT.call_once(|| {
        let stack_size = parse_stack_size(std::env::var("AVAIL_FIBER_STACK_SIZE").ok());
        may::config().set_stack_size(stack_size);
    });
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A slot in the fiber registry. A slot is free when `fiber_id == 0`.
pub struct FiberSlot {
    pub fiber_id: AtomicU64,
    pub spawn_time: AtomicU64,
}

impl FiberSlot {
    const fn new() -> Self {
        FiberSlot {
            fiber_id: AtomicU64::new(0),
            spawn_time: AtomicU64::new(0),
        }
    }
}

/// A fixed-size, lock-free registry of currently-running fibers, consulted
/// only by diagnostics and the watchdog — never on the scheduling hot path.
pub struct FiberRegistry {
    slots: Box<[FiberSlot]>,
    pub overflow_count: AtomicU64,
}

impl FiberRegistry {
    fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| FiberSlot::new()).collect::<Vec<_>>().into_boxed_slice();
        FiberRegistry {
            slots,
            overflow_count: AtomicU64::new(0),
        }
    }

    pub fn register(&self, fiber_id: u64) -> Option<usize> {
        let spawn_time = now_secs();
        for (idx, slot) in self.slots.iter().enumerate() {
            slot.spawn_time.store(spawn_time, Ordering::Relaxed);
            if slot
                .fiber_id
                .compare_exchange(0, fiber_id, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(idx);
            }
        }
        self.overflow_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn unregister(&self, fiber_id: u64) -> bool {
        for slot in self.slots.iter() {
            if slot
                .fiber_id
                .compare_exchange(fiber_id, 0, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                slot.spawn_time.store(0, Ordering::Release);
                return true;
            }
        }
        false
    }

    pub fn active_fibers(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.slots.iter().filter_map(|slot| {
            let id = slot.fiber_id.load(Ordering::Acquire);
            if id > 0 {
                Some((id, slot.spawn_time.load(Ordering::Relaxed)))
            } else {
                None
            }
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

static FIBER_REGISTRY: std::sync::OnceLock<FiberRegistry> = std::sync::OnceLock::new();

/// The process-wide fiber registry, sized via `AVAIL_FIBER_REGISTRY_SIZE`
/// (parse-or-warn-and-default, same convention as the teacher's
/// `SEQ_STRAND_REGISTRY_SIZE`).
pub fn fiber_registry() -> &'static FiberRegistry {
    FIBER_REGISTRY.get_or_init(|| {
        let size = std::env::var("AVAIL_FIBER_REGISTRY_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_REGISTRY_SIZE);
        FiberRegistry::new(size)
    })
}

/// A queued unit of work: the fiber plus the function and arguments it will
/// run, ordered by quasi-deadline (spec.md §4.5: priority 0-255 maps to a
/// deadline, and the scheduler always runs the nearest deadline first).
struct ScheduledFiber {
    fiber: Fiber,
    function: Function,
    args: Vec<Value>,
    deadline_millis: u64,
}

impl ScheduledFiber {
    fn quasi_deadline(priority: u8) -> u64 {
        let now_millis = u64::from(u32::try_from(now_secs()).unwrap_or(u32::MAX)) * 1000;
        now_millis + (u64::from(255 - priority) * 1000 / 256)
    }
}

impl PartialEq for ScheduledFiber {
    fn eq(&self, other: &Self) -> bool {
        self.deadline_millis == other.deadline_millis
    }
}
impl Eq for ScheduledFiber {}

impl PartialOrd for ScheduledFiber {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledFiber {
    // BinaryHeap is a max-heap; invert so the nearest deadline sorts highest
    // and is popped first.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.deadline_millis.cmp(&self.deadline_millis)
    }
}

/// The priority fiber scheduler: owns the method resolution and primitive
/// tables every interpreter invocation needs, and the ready queue.
pub struct Scheduler {
    loader: Arc<ModuleLoader>,
    primitives: Arc<PrimitiveRegistry>,
    queue: Mutex<BinaryHeap<ScheduledFiber>>,
}

impl Scheduler {
    pub fn new(loader: Arc<ModuleLoader>, primitives: Arc<PrimitiveRegistry>) -> Self {
        configure_stack_size();
        Scheduler {
            loader,
            primitives,
            queue: Mutex::new(BinaryHeap::new()),
        }
    }

    /// Schedule `function(args)` on a freshly created fiber at `priority`,
    /// returning a handle the caller can block on for the result (spec.md
    /// §4.5's fork/run/join lifecycle).
    pub fn spawn(&self, function: Function, args: Vec<Value>, priority: u8) -> FiberJoinHandle {
        let fiber = Fiber::new(priority);
        fiber.mark_scheduled();
        let handle = fiber.join_handle().clone();

        let new_count = ACTIVE_FIBERS.fetch_add(1, Ordering::Release) + 1;
        TOTAL_SPAWNED.fetch_add(1, Ordering::Relaxed);
        let mut peak = PEAK_FIBERS.load(Ordering::Acquire);
        while new_count > peak {
            match PEAK_FIBERS.compare_exchange_weak(peak, new_count, Ordering::Release, Ordering::Relaxed) {
                Ok(_) => break,
                Err(current) => peak = current,
            }
        }
        let _ = fiber_registry().register(fiber.id());

        tracing::debug!(fiber = fiber.id(), priority, "fiber scheduled");
        self.queue.lock().unwrap().push(ScheduledFiber {
            deadline_millis: ScheduledFiber::quasi_deadline(priority),
            fiber,
            function,
            args,
        });
        self.dispatch_one();
        handle
    }

    /// Fork `parent` into a child fiber and schedule it, propagating
    /// heritable globals (spec.md scenario 4). Returns the child fiber
    /// itself alongside its join handle so a caller can inspect what the
    /// child inherited without waiting for it to retire.
    pub fn fork(
        &self,
        parent: &Fiber,
        function: Function,
        args: Vec<Value>,
        priority: u8,
    ) -> (Fiber, FiberJoinHandle) {
        let child = parent.fork(priority);
        child.mark_scheduled();
        let handle = child.join_handle().clone();
        let returned_child = child.clone();

        ACTIVE_FIBERS.fetch_add(1, Ordering::Release);
        TOTAL_SPAWNED.fetch_add(1, Ordering::Relaxed);
        let _ = fiber_registry().register(child.id());

        self.queue.lock().unwrap().push(ScheduledFiber {
            deadline_millis: ScheduledFiber::quasi_deadline(priority),
            fiber: child,
            function,
            args,
        });
        self.dispatch_one();
        (returned_child, handle)
    }

    /// Pop the nearest-deadline ready fiber and run it to completion on a
    /// May coroutine. A fiber cancelled after being queued but before
    /// dispatch never runs its body (spec.md §5 cancellation model).
    fn dispatch_one(&self) {
        let Some(scheduled) = self.queue.lock().unwrap().pop() else {
            return;
        };

        let loader = Arc::clone(&self.loader);
        let primitives = Arc::clone(&self.primitives);
        unsafe {
            coroutine::spawn(move || {
                let ScheduledFiber { fiber, function, args, .. } = scheduled;
                fiber.clear_scheduled();

                let outcome = if fiber.state() == FiberState::Aborted {
                    FiberOutcome::Failed(FiberFailure::new(Value::Atom(Atom::new("cancelled-before-run")), None))
                } else {
                    let mut interpreter = Interpreter::new(&fiber, &loader, &primitives);
                    match interpreter.run(function, args) {
                        Ok(value) => FiberOutcome::Succeeded(value),
                        Err(err) => FiberOutcome::Failed(to_fiber_failure(err, fiber.continuation())),
                    }
                };

                complete(&fiber, outcome);
            });
        }
    }

    /// Block until every fiber spawned through this scheduler has retired
    /// (mirrors the teacher's `wait_all_strands`).
    pub fn wait_all(&self) {
        let mut guard = SHUTDOWN_MUTEX.lock().expect("scheduler: shutdown mutex poisoned");
        while ACTIVE_FIBERS.load(Ordering::Acquire) > 0 {
            guard = SHUTDOWN_CONDVAR.wait(guard).expect("scheduler: shutdown wait failed");
        }
    }
}

fn complete(fiber: &Fiber, outcome: FiberOutcome) {
    if matches!(outcome, FiberOutcome::Failed(_)) {
        tracing::warn!(fiber = fiber.id(), "fiber failed");
    }
    fiber.transition(FiberState::Retired);
    fiber_registry().unregister(fiber.id());
    let prev = ACTIVE_FIBERS.fetch_sub(1, Ordering::AcqRel);
    TOTAL_RETIRED.fetch_add(1, Ordering::Release);
    fiber.join_handle().deliver(outcome);
    if prev == 1 {
        let _guard = SHUTDOWN_MUTEX.lock().expect("scheduler: shutdown mutex poisoned");
        SHUTDOWN_CONDVAR.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::builtins;
    use avail_core::{AvailType, IntegerRange};
    use serial_test::serial;

    fn trivial_constant_function(value: i64) -> Function {
        let mut r#gen = avail_l1::Generator::start_block(
            vec![],
            vec![],
            false,
            vec![],
            AvailType::Integer(IntegerRange::ALL),
        );
        r#gen.push_literal(Value::Integer(value)).unwrap();
        let code = r#gen.end_block().unwrap();
        Function::new(code, vec![])
    }

    #[test]
    #[serial]
    fn spawn_runs_to_completion_and_delivers_result() {
        let loader = Arc::new(ModuleLoader::new());
        let mut registry = PrimitiveRegistry::new();
        builtins::install(&mut registry);
        let scheduler = Scheduler::new(loader, Arc::new(registry));

        let handle = scheduler.spawn(trivial_constant_function(7), vec![], 100);
        match handle.join() {
            FiberOutcome::Succeeded(Value::Integer(7)) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
        scheduler.wait_all();
    }

    #[test]
    #[serial]
    fn higher_priority_fibers_prefer_nearer_deadlines() {
        let a = ScheduledFiber::quasi_deadline(255);
        let b = ScheduledFiber::quasi_deadline(0);
        assert!(a <= b, "priority 255 must not have a later deadline than priority 0");
    }

    #[test]
    fn parse_stack_size_falls_back_on_missing_zero_or_invalid() {
        assert_eq!(parse_stack_size(Some("2097152".to_string())), 2097152);
        assert_eq!(parse_stack_size(None), DEFAULT_FIBER_STACK_SIZE);
        assert_eq!(parse_stack_size(Some("0".to_string())), DEFAULT_FIBER_STACK_SIZE);
        assert_eq!(parse_stack_size(Some("not-a-number".to_string())), DEFAULT_FIBER_STACK_SIZE);
    }
}
