//! The primitive registry: a flat table of opaque, numbered, side-effecting
//! functions the interpreter may invoke on a send (spec.md §1's "primitive
//! registry" external collaborator, §4.4's three outcomes, §6's primitive
//! flags).

use avail_core::{Continuation, ErrorCode, Function, PrimitiveFlags, PrimitiveNumber, Value};
use std::collections::HashMap;

/// What a primitive invocation produced (spec.md §4.4).
#[derive(Debug)]
pub enum Outcome {
    /// Push this value and continue after the call site.
    Success(Value),
    /// Push this reason code into the failure variable and fall through
    /// to the backing L1 body.
    Failure(ErrorCode),
    /// The primitive has prepared the interpreter to enter `function`
    /// directly (e.g. `Invoke`) rather than returning a value itself.
    ReadyToInvoke { function: Function, args: Vec<Value> },
    /// Resume exactly this reified activation record rather than entering
    /// a function fresh (spec.md §4.4 invariant I4) — the interpreter
    /// reconstructs a frame from the continuation's captured pc, locals,
    /// and operand stack instead of running `function`'s body from pc 0.
    Resume(Continuation),
}

pub type PrimitiveFn = fn(&[Value]) -> Outcome;

struct PrimitiveEntry {
    func: PrimitiveFn,
    flags: PrimitiveFlags,
    /// The `ErrorCode`s this primitive is allowed to fail with. A failure
    /// outside this set is a bug in the primitive, not in calling code
    /// (spec.md's supplemented "primitive failure variable type check",
    /// see SPEC_FULL.md).
    declared_failures: Vec<ErrorCode>,
}

/// The process-wide table of numbered primitives.
#[derive(Default)]
pub struct PrimitiveRegistry {
    entries: HashMap<PrimitiveNumber, PrimitiveEntry>,
}

impl PrimitiveRegistry {
    pub fn new() -> Self {
        PrimitiveRegistry::default()
    }

    pub fn register(
        &mut self,
        number: PrimitiveNumber,
        flags: PrimitiveFlags,
        declared_failures: Vec<ErrorCode>,
        func: PrimitiveFn,
    ) {
        self.entries.insert(
            number,
            PrimitiveEntry {
                func,
                flags,
                declared_failures,
            },
        );
    }

    pub fn flags(&self, number: PrimitiveNumber) -> Option<PrimitiveFlags> {
        self.entries.get(&number).map(|e| e.flags)
    }

    /// Invoke the numbered primitive. Returns `Err` only when a `Failure`
    /// outcome's code was not among the primitive's declared failures —
    /// that is a tier-1 contract violation (`GeneratorError`), not
    /// something the calling Avail code can be expected to handle.
    pub fn invoke(
        &self,
        number: PrimitiveNumber,
        args: &[Value],
    ) -> Result<Outcome, avail_core::GeneratorError> {
        let entry = self
            .entries
            .get(&number)
            .unwrap_or_else(|| panic!("no primitive registered for number {number}"));
        let outcome = (entry.func)(args);
        if let Outcome::Failure(code) = &outcome {
            if !entry.declared_failures.contains(code) {
                return Err(avail_core::GeneratorError::UndeclaredPrimitiveFailure {
                    primitive: number,
                    code: *code,
                });
            }
        }
        Ok(outcome)
    }
}

/// The small built-in set this core ships with: integer arithmetic and
/// tuple introspection, enough to exercise sends end to end without a
/// front end to write a richer standard library against.
pub mod builtins {
    use super::*;

    pub const INTEGER_ADD: PrimitiveNumber = 1;
    pub const INTEGER_SUBTRACT: PrimitiveNumber = 2;
    pub const INTEGER_EQUALS: PrimitiveNumber = 3;
    pub const TUPLE_SIZE: PrimitiveNumber = 4;
    pub const TUPLE_AT: PrimitiveNumber = 5;
    pub const CREATE_CONTINUATION: PrimitiveNumber = 6;
    pub const RESTART_CONTINUATION: PrimitiveNumber = 7;
    pub const RESUME_CONTINUATION: PrimitiveNumber = 8;

    fn integer_add(args: &[Value]) -> Outcome {
        match (&args[0], &args[1]) {
            (Value::Integer(a), Value::Integer(b)) => match a.checked_add(*b) {
                Some(sum) => Outcome::Success(Value::Integer(sum)),
                None => Outcome::Failure(ErrorCode::CannotConvertNotANumberToInteger),
            },
            _ => Outcome::Failure(ErrorCode::IncorrectArgumentType),
        }
    }

    fn integer_subtract(args: &[Value]) -> Outcome {
        match (&args[0], &args[1]) {
            (Value::Integer(a), Value::Integer(b)) => match a.checked_sub(*b) {
                Some(diff) => Outcome::Success(Value::Integer(diff)),
                None => Outcome::Failure(ErrorCode::CannotConvertNotANumberToInteger),
            },
            _ => Outcome::Failure(ErrorCode::IncorrectArgumentType),
        }
    }

    fn integer_equals(args: &[Value]) -> Outcome {
        Outcome::Success(Value::Integer(i64::from(args[0] == args[1])))
    }

    fn tuple_size(args: &[Value]) -> Outcome {
        match args[0].as_tuple() {
            Some(tuple) => Outcome::Success(Value::Integer(tuple.len() as i64)),
            None => Outcome::Failure(ErrorCode::IncorrectArgumentType),
        }
    }

    fn tuple_at(args: &[Value]) -> Outcome {
        let (Some(tuple), Value::Integer(index)) = (args[0].as_tuple(), &args[1]) else {
            return Outcome::Failure(ErrorCode::IncorrectArgumentType);
        };
        let Ok(index) = usize::try_from(index - 1) else {
            return Outcome::Failure(ErrorCode::SubscriptOutOfBounds);
        };
        match tuple.get(index) {
            Some(value) => Outcome::Success(value),
            None => Outcome::Failure(ErrorCode::SubscriptOutOfBounds),
        }
    }

    /// Reify a fresh, not-yet-entered activation record for `function`
    /// (spec.md §8 scenario 3). Rejected for a function backed by an
    /// infallible primitive — there is no L1 fallback body for such a
    /// function to resume into, so creating a continuation over it can
    /// never be meaningfully restarted or resumed.
    fn create_continuation(args: &[Value]) -> Outcome {
        match &args[0] {
            Value::Function(f) => match f.code().primitive() {
                Some((_, flags)) if flags.contains(PrimitiveFlags::CANNOT_FAIL) => {
                    Outcome::Failure(ErrorCode::CannotCreateContinuationForInfalliblePrimitiveFunction)
                }
                _ => {
                    let num_locals = f.code().num_locals() as usize;
                    let slots = vec![Value::Integer(0); num_locals];
                    Outcome::Success(Value::Continuation(Continuation::new(f.clone(), 0, slots, 0, None)))
                }
            },
            _ => Outcome::Failure(ErrorCode::IncorrectArgumentType),
        }
    }

    /// Re-enter a continuation's function from pc 0 with fresh locals,
    /// preserving only the leading argument slots (spec.md §4.4 invariant
    /// I4's "restart" case).
    fn restart_continuation(args: &[Value]) -> Outcome {
        match &args[0] {
            Value::Continuation(c) => {
                let function = c.function().clone();
                let num_args = function.code().num_args() as usize;
                let preserved = c.frame_slots().get(..num_args).unwrap_or(&[]).to_vec();
                Outcome::ReadyToInvoke { function, args: preserved }
            }
            _ => Outcome::Failure(ErrorCode::IncorrectArgumentType),
        }
    }

    /// Resume a continuation exactly where it was reified, restoring its
    /// captured pc, locals, and operand stack (spec.md §4.4 invariant I4's
    /// "resume" case).
    fn resume_continuation(args: &[Value]) -> Outcome {
        match &args[0] {
            Value::Continuation(c) => {
                let resumed = c.with_pc_and_slots(c.pc(), c.frame_slots().to_vec(), c.stack_depth());
                Outcome::Resume(resumed)
            }
            _ => Outcome::Failure(ErrorCode::IncorrectArgumentType),
        }
    }

    pub fn install(registry: &mut PrimitiveRegistry) {
        registry.register(
            INTEGER_ADD,
            PrimitiveFlags::CAN_FOLD | PrimitiveFlags::CAN_INLINE,
            vec![ErrorCode::IncorrectArgumentType, ErrorCode::CannotConvertNotANumberToInteger],
            integer_add,
        );
        registry.register(
            INTEGER_SUBTRACT,
            PrimitiveFlags::CAN_FOLD | PrimitiveFlags::CAN_INLINE,
            vec![ErrorCode::IncorrectArgumentType, ErrorCode::CannotConvertNotANumberToInteger],
            integer_subtract,
        );
        registry.register(
            INTEGER_EQUALS,
            PrimitiveFlags::CAN_FOLD | PrimitiveFlags::CANNOT_FAIL,
            vec![],
            integer_equals,
        );
        registry.register(
            TUPLE_SIZE,
            PrimitiveFlags::CAN_FOLD | PrimitiveFlags::CANNOT_FAIL,
            vec![ErrorCode::IncorrectArgumentType],
            tuple_size,
        );
        registry.register(
            TUPLE_AT,
            PrimitiveFlags::empty(),
            vec![ErrorCode::IncorrectArgumentType, ErrorCode::SubscriptOutOfBounds],
            tuple_at,
        );
        registry.register(
            CREATE_CONTINUATION,
            PrimitiveFlags::empty(),
            vec![
                ErrorCode::IncorrectArgumentType,
                ErrorCode::CannotCreateContinuationForInfalliblePrimitiveFunction,
            ],
            create_continuation,
        );
        registry.register(
            RESTART_CONTINUATION,
            PrimitiveFlags::empty(),
            vec![ErrorCode::IncorrectArgumentType],
            restart_continuation,
        );
        registry.register(
            RESUME_CONTINUATION,
            PrimitiveFlags::empty(),
            vec![ErrorCode::IncorrectArgumentType],
            resume_continuation,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use builtins::*;

    #[test]
    fn integer_add_succeeds() {
        let mut registry = PrimitiveRegistry::new();
        install(&mut registry);
        let outcome = registry
            .invoke(INTEGER_ADD, &[Value::Integer(2), Value::Integer(3)])
            .unwrap();
        assert!(matches!(outcome, Outcome::Success(Value::Integer(5))));
    }

    #[test]
    fn declared_failure_is_reported_not_panicked() {
        let mut registry = PrimitiveRegistry::new();
        install(&mut registry);
        let outcome = registry
            .invoke(INTEGER_ADD, &[Value::Integer(1), Value::Float(2.0)])
            .unwrap();
        assert!(matches!(outcome, Outcome::Failure(ErrorCode::IncorrectArgumentType)));
    }

    #[test]
    fn undeclared_failure_is_a_contract_violation() {
        let mut registry = PrimitiveRegistry::new();
        registry.register(99, PrimitiveFlags::empty(), vec![], |_| {
            Outcome::Failure(ErrorCode::IoError)
        });
        let err = registry.invoke(99, &[]).unwrap_err();
        assert!(matches!(
            err,
            avail_core::GeneratorError::UndeclaredPrimitiveFailure { primitive: 99, .. }
        ));
    }

    fn trivial_function() -> avail_core::Function {
        use avail_core::{AvailType, CompiledCode, FunctionType};
        let code = CompiledCode::new(
            vec![],
            0,
            1,
            0,
            1,
            FunctionType { arguments: vec![], result: Box::new(AvailType::Top) },
        );
        avail_core::Function::new(code, vec![])
    }

    #[test]
    fn create_continuation_rejects_infallible_primitive_function() {
        use avail_core::{AvailType, CompiledCode, FunctionType};
        let code = CompiledCode::new(
            vec![],
            0,
            0,
            0,
            1,
            FunctionType { arguments: vec![], result: Box::new(AvailType::Top) },
        )
        .with_primitive(INTEGER_EQUALS, PrimitiveFlags::CAN_FOLD | PrimitiveFlags::CANNOT_FAIL);
        let function = avail_core::Function::new(code, vec![]);

        let mut registry = PrimitiveRegistry::new();
        install(&mut registry);
        let outcome = registry
            .invoke(CREATE_CONTINUATION, &[Value::Function(function)])
            .unwrap();
        assert!(matches!(
            outcome,
            Outcome::Failure(ErrorCode::CannotCreateContinuationForInfalliblePrimitiveFunction)
        ));
    }

    #[test]
    fn create_continuation_succeeds_for_a_fallible_function() {
        let mut registry = PrimitiveRegistry::new();
        install(&mut registry);
        let outcome = registry
            .invoke(CREATE_CONTINUATION, &[Value::Function(trivial_function())])
            .unwrap();
        assert!(matches!(outcome, Outcome::Success(Value::Continuation(_))));
    }

    #[test]
    fn resume_continuation_restores_pc_and_slots() {
        let continuation =
            avail_core::Continuation::new(trivial_function(), 3, vec![Value::Integer(9)], 1, None);
        let mut registry = PrimitiveRegistry::new();
        install(&mut registry);
        let outcome = registry
            .invoke(RESUME_CONTINUATION, &[Value::Continuation(continuation)])
            .unwrap();
        match outcome {
            Outcome::Resume(resumed) => {
                assert_eq!(resumed.pc(), 3);
                assert_eq!(resumed.frame_slots(), &[Value::Integer(9)]);
            }
            _ => panic!("expected Outcome::Resume"),
        }
    }
}
