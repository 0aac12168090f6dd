//! The interpreter: executes a fiber's Level One nybblecodes, builds
//! continuations, and drives sends through `avail-dispatch` (spec.md §4.4).
//!
//! Rather than recursing natively for each nested call (which would make
//! "native stack depth" an opaque platform detail and reification an unsafe
//! stack walk), this interpreter keeps its own explicit call stack
//! (`frames: Vec<Frame>`). Nested calls push a `Frame`; returning pops one.
//! Reification is then a data transformation over that vector rather than
//! an unsafe unwind — a deliberate simplification from the native-stack
//! approach spec.md §4.4 describes, recorded in DESIGN.md.

use crate::error::{FiberFailure, PrimitiveFailure};
use crate::fiber::{Fiber, FiberState, TraceFlags};
use crate::registry::ModuleLoader;
use avail_l1::{ExtendedOpcode, NybbleReader, Opcode};

use avail_core::{
    Atom, CompiledCode, Continuation, ErrorCode, Function, GeneratorError, SlotKind, Tuple, Value, Variable,
};
use avail_dispatch::DispatchError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Number of explicit interpreter frames beyond which a send triggers
/// reification rather than pushing another frame directly (spec.md §4.4).
/// Configurable via `AVAIL_REIFY_DEPTH`, the same parse-or-warn-and-default
/// convention the teacher's `scheduler.rs`/`watchdog.rs` use for their own
/// environment-variable knobs.
fn reify_depth() -> usize {
    static DEPTH: OnceLock<usize> = OnceLock::new();
    *DEPTH.get_or_init(|| {
        std::env::var("AVAIL_REIFY_DEPTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(4096)
    })
}

/// A single activation: the executing function, its program counter (a
/// nybble offset), local slots, and the operand stack.
struct Frame {
    function: Function,
    pc: usize,
    /// `None` models an unassigned plain-value local; a `Variable`-kind
    /// slot is always `Some(Value::Variable(_))` from the moment the frame
    /// is created.
    locals: Vec<Option<Value>>,
    operand_stack: Vec<Value>,
}

impl Frame {
    fn new(function: Function, args: Vec<Value>) -> Self {
        let code = function.code();
        let mut locals: Vec<Option<Value>> = vec![None; code.num_locals() as usize];
        for (i, arg) in args.into_iter().enumerate().take(locals.len()) {
            locals[i] = Some(arg);
        }
        for i in 0..locals.len() {
            if code.local_kind(i) == Some(SlotKind::Variable) && locals[i].is_none() {
                locals[i] = Some(Value::Variable(Variable::new(avail_core::AvailType::Top)));
            }
        }
        let max_stack_depth = code.max_stack_depth() as usize;
        Frame {
            function,
            pc: 0,
            locals,
            operand_stack: Vec::with_capacity(max_stack_depth),
        }
    }

    /// Build a frame for a primitive's L1 fallback body, writing `failure`
    /// into the local slot immediately after the declared arguments so the
    /// body can read why the primitive gave up (spec.md §7 tier 2). A body
    /// with no such extra local slot simply cannot observe the code.
    fn new_with_failure(function: Function, args: Vec<Value>, failure: Option<ErrorCode>) -> Self {
        let mut frame = Frame::new(function, args);
        if let Some(code) = failure {
            let num_args = frame.code().num_args() as usize;
            if let Some(slot) = frame.locals.get_mut(num_args) {
                *slot = Some(Value::Integer(i64::from(code as u16)));
            }
        }
        frame
    }

    /// Reconstruct the exact activation record a continuation captured:
    /// same pc, same locals, same operand stack (spec.md §4.4 invariant
    /// I4's "resume" case) — unlike `Frame::new`, which always starts a
    /// fresh activation at pc 0 with only arguments populated.
    fn from_continuation(continuation: &Continuation) -> Self {
        let function = continuation.function().clone();
        let slots = continuation.frame_slots().to_vec();
        let stack_depth = continuation.stack_depth() as usize;
        let num_locals = slots.len() - stack_depth;
        let (locals, operand_stack) = slots.split_at(num_locals);
        Frame {
            function,
            pc: continuation.pc() as usize,
            locals: locals.iter().cloned().map(Some).collect(),
            operand_stack: operand_stack.to_vec(),
        }
    }

    fn code(&self) -> &CompiledCode {
        self.function.code()
    }

    fn pop(&mut self) -> Value {
        self.operand_stack
            .pop()
            .expect("operand stack underflow: a producer-side contract violation")
    }

    fn push(&mut self, value: Value) {
        self.operand_stack.push(value);
    }
}

/// What the interpreter did in response to one send (spec.md §4.4's three
/// outcomes, collapsed to what the caller of `Interpreter::run` needs).
enum SendResult {
    Pushed(Value),
    EnteredFunction,
}

/// Errors the interpreter can surface that are not tier-3 fiber failures:
/// generator contract violations and dispatch failures that escaped as an
/// uncaught exception.
#[derive(Debug)]
pub enum InterpreterError {
    Generator(GeneratorError),
    Dispatch(DispatchError),
}

impl From<GeneratorError> for InterpreterError {
    fn from(e: GeneratorError) -> Self {
        InterpreterError::Generator(e)
    }
}

/// Binds to exactly one fiber at a time (spec.md §4.4: "a fiber acquires
/// an interpreter when scheduled, releases it when it suspends,
/// terminates, or is forced to reify").
pub struct Interpreter<'a> {
    fiber: &'a Fiber,
    loader: &'a ModuleLoader,
    primitives: &'a crate::primitive::PrimitiveRegistry,
    frames: Vec<Frame>,
}

static REIFICATION_EVENTS: AtomicUsize = AtomicUsize::new(0);

pub fn reification_event_count() -> usize {
    REIFICATION_EVENTS.load(Ordering::Relaxed)
}

impl<'a> Interpreter<'a> {
    pub fn new(fiber: &'a Fiber, loader: &'a ModuleLoader, primitives: &'a crate::primitive::PrimitiveRegistry) -> Self {
        Interpreter {
            fiber,
            loader,
            primitives,
            frames: Vec::new(),
        }
    }

    /// Run `function(args)` to completion on the bound fiber, returning its
    /// result or the uncaught failure that aborted the fiber.
    pub fn run(&mut self, function: Function, args: Vec<Value>) -> Result<Value, InterpreterError> {
        self.fiber.transition(FiberState::Running);
        self.frames.push(Frame::new(function, args));
        let result = self.run_frames();
        match &result {
            Ok(_) => self.fiber.transition(FiberState::Terminated),
            Err(_) => self.fiber.cancel(),
        }
        result
    }

    fn run_frames(&mut self) -> Result<Value, InterpreterError> {
        loop {
            let finished_value = {
                let frame = self.frames.last_mut().expect("at least one frame while running");
                let code = frame.code();
                let mut reader = NybbleReader::new(code.nybblecodes());
                // Resume where this frame left off; cheap because reading
                // nybbles is a pure function of position, not internal state.
                for _ in 0..frame.pc {
                    reader.read_nybble();
                }
                if reader.at_end() {
                    Some(frame.pop())
                } else {
                    None
                }
            };

            if let Some(value) = finished_value {
                self.frames.pop();
                match self.frames.last_mut() {
                    Some(caller) => caller.push(value),
                    None => return Ok(value),
                }
                continue;
            }

            match self.step()? {
                SendResult::Pushed(_) | SendResult::EnteredFunction => continue,
            }
        }
    }

    /// Execute exactly one nybblecode instruction in the top frame.
    fn step(&mut self) -> Result<SendResult, InterpreterError> {
        let trace = self.fiber.trace_flags();
        let (opcode, ext) = {
            let frame = self.frames.last_mut().unwrap();
            let code = frame.code();
            let mut reader = NybbleReader::new(code.nybblecodes());
            for _ in 0..frame.pc {
                reader.read_nybble();
            }
            let nybble = reader.read_nybble().expect("checked not at_end");
            let opcode = Opcode::from_nybble(nybble).expect("generator only emits valid opcodes");
            let ext = if opcode == Opcode::Extension {
                let n = reader.read_nybble().expect("extension escape always has a second nybble");
                Some(ExtendedOpcode::from_nybble(n).expect("generator only emits valid extended opcodes"))
            } else {
                None
            };
            frame.pc = reader.position();
            (opcode, ext)
        };

        if trace.contains(TraceFlags::TRACE_L1_INSTRUCTIONS) {
            tracing::debug!(?opcode, ?ext, fiber = self.fiber.id(), "executing L1 instruction");
        }

        match opcode {
            Opcode::PushLiteral => {
                let index = self.read_varint() as usize;
                let literal = self.top().code().literal_at(index).cloned().expect("valid literal index");
                self.top_mut().push(literal);
            }
            Opcode::PushLocal => {
                let index = self.read_varint() as usize;
                let value = self.top().locals[index].clone().expect("read of unassigned local slot");
                self.top_mut().push(value);
            }
            Opcode::PushOuter => {
                let index = self.read_varint() as usize;
                let value = self.top().function.outer(index).cloned().expect("valid outer index");
                self.top_mut().push(value);
            }
            Opcode::GetLocal => {
                let index = self.read_varint() as usize;
                let value = self.deref_slot(index)?;
                self.top_mut().push(value);
            }
            Opcode::GetOuter => {
                let index = self.read_varint() as usize;
                let outer = self.top().function.outer(index).cloned().expect("valid outer index");
                let value = match outer {
                    Value::Variable(v) => v.get().expect("read of unassigned outer variable"),
                    other => other,
                };
                self.top_mut().push(value);
            }
            Opcode::SetLocal => {
                let index = self.read_varint() as usize;
                let value = self.top_mut().pop();
                self.set_slot(index, value)?;
            }
            Opcode::SetOuter => {
                let index = self.read_varint() as usize;
                let value = self.top_mut().pop();
                match self.top().function.outer(index).cloned() {
                    Some(Value::Variable(v)) => {
                        let reactors =
                            v.set(value).expect("outer variable type mismatch is a generator contract violation");
                        self.invoke_reactors(reactors)?;
                    }
                    _ => panic!("set_outer on a non-variable outer capture"),
                }
            }
            Opcode::GetTypeAtDepth => {
                let depth = self.read_varint() as usize;
                let frame = self.top();
                let index = frame.operand_stack.len().checked_sub(1 + depth).expect("depth within stack");
                let kind = frame.operand_stack[index].kind();
                self.top_mut().push(Value::Atom(Atom::new(kind.to_string())));
            }
            Opcode::MakeTuple => {
                let n = self.read_varint() as usize;
                let frame = self.top_mut();
                let start = frame.operand_stack.len() - n;
                let elements: Vec<Value> = frame.operand_stack.drain(start..).collect();
                frame.push(Value::Tuple(Tuple::from_values(elements)));
            }
            Opcode::Pop => {
                self.top_mut().pop();
            }
            Opcode::Call => {
                let message_index = self.read_varint() as usize;
                let _return_type_index = self.read_varint() as usize;
                let n = self.read_varint() as usize;
                return self.send(message_index, n);
            }
            Opcode::SuperCall => {
                let message_index = self.read_varint() as usize;
                let _return_type_index = self.read_varint() as usize;
                let n = self.read_varint() as usize;
                // The explicit type-tuple positional arguments contribute
                // 2n operands; the extra n (the statically-supplied types)
                // are discarded here because types are not first-class
                // values in this core's object model (DESIGN.md Open
                // Questions) — dispatch falls back to runtime value types.
                let frame = self.top_mut();
                let discard_from = frame.operand_stack.len() - n;
                frame.operand_stack.truncate(discard_from);
                return self.send(message_index, n);
            }
            Opcode::CloseCode => {
                let code_index = self.read_varint() as usize;
                let k = self.read_varint() as usize;
                let inner_code = self
                    .top()
                    .code()
                    .literal_at(code_index)
                    .and_then(|v| if let Value::CompiledCode(c) = v { Some(c.clone()) } else { None })
                    .expect("close_code literal must be a CompiledCode");
                let frame = self.top_mut();
                let start = frame.operand_stack.len() - k;
                let outers: Vec<Value> = frame.operand_stack.drain(start..).collect();
                frame.push(Value::Function(Function::new(inner_code, outers)));
            }
            Opcode::PushLabel => {
                let _slot = self.read_varint() as usize;
                let continuation = self.reify_current_frame();
                self.top_mut().push(Value::Continuation(continuation));
            }
            Opcode::LabelDeclaration => {}
            Opcode::Extension => match ext.expect("Extension always carries an ExtendedOpcode") {
                ExtendedOpcode::GetLiteral => {
                    let index = self.read_varint() as usize;
                    let literal = self.top().code().literal_at(index).cloned().expect("valid literal index");
                    let value = match literal {
                        Value::Variable(v) => v.get().expect("read of unassigned literal variable"),
                        other => other,
                    };
                    self.top_mut().push(value);
                }
                ExtendedOpcode::SetLiteral => {
                    let index = self.read_varint() as usize;
                    let value = self.top_mut().pop();
                    match self.top().code().literal_at(index).cloned() {
                        Some(Value::Variable(v)) => {
                            let reactors = v
                                .set(value)
                                .expect("literal variable type mismatch is a generator contract violation");
                            self.invoke_reactors(reactors)?;
                        }
                        _ => panic!("set_literal on a non-variable literal"),
                    }
                }
            },
        }

        Ok(SendResult::EnteredFunction)
    }

    fn send(&mut self, message_index: usize, n: usize) -> Result<SendResult, InterpreterError> {
        let message = self
            .top()
            .code()
            .literal_at(message_index)
            .cloned()
            .and_then(|v| if let Value::Atom(a) = v { Some(a) } else { None })
            .expect("send's message literal must be an atom");

        let frame = self.top_mut();
        let start = frame.operand_stack.len() - n;
        let args: Vec<Value> = frame.operand_stack.drain(start..).collect();

        let trace = self.fiber.trace_flags();
        if trace.contains(TraceFlags::TRACE_SENDS) {
            tracing::debug!(message = message.name(), fiber = self.fiber.id(), "send");
        }

        let method = self
            .loader
            .resolve(&message)
            .ok_or(InterpreterError::Dispatch(DispatchError::NoMethodDefinition))?;
        let definitions = method
            .lookup_by_values(&args)
            .map_err(InterpreterError::Dispatch)?;
        let definition = definitions.into_iter().next().expect("lookup returns exactly one definition on success");

        match definition.function.code().primitive() {
            Some((number, _flags)) => match self.primitives.invoke(number, &args)? {
                crate::primitive::Outcome::Success(value) => {
                    self.top_mut().push(value.clone());
                    Ok(SendResult::Pushed(value))
                }
                crate::primitive::Outcome::Failure(code) => {
                    let failure = PrimitiveFailure { primitive: number, code };
                    tracing::warn!(%failure, "primitive failed, falling back to L1 body");
                    self.frames.push(Frame::new_with_failure(definition.function, args, Some(code)));
                    Ok(SendResult::EnteredFunction)
                }
                crate::primitive::Outcome::ReadyToInvoke { function, args } => {
                    self.enter(function, args)
                }
                crate::primitive::Outcome::Resume(continuation) => {
                    self.frames.push(Frame::from_continuation(&continuation));
                    Ok(SendResult::EnteredFunction)
                }
            },
            None => self.enter(definition.function, args),
        }
    }

    fn enter(&mut self, function: Function, args: Vec<Value>) -> Result<SendResult, InterpreterError> {
        if self.frames.len() >= reify_depth() {
            REIFICATION_EVENTS.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(depth = self.frames.len(), "reifying before entering new frame");
            let continuation = self.reify_current_frame();
            self.fiber.set_continuation(Some(continuation));
        }
        self.frames.push(Frame::new(function, args));
        Ok(SendResult::EnteredFunction)
    }

    /// Fold the explicit frame stack into a `Continuation` chain, newest
    /// frame first, each linked to the next-older by `caller` (spec.md
    /// §4.4's reification description).
    fn reify_current_frame(&self) -> Continuation {
        let mut chain: Option<Continuation> = None;
        for frame in &self.frames {
            let mut slots: Vec<Value> = frame.locals.iter().map(|s| s.clone().unwrap_or(Value::Integer(0))).collect();
            slots.extend(frame.operand_stack.iter().cloned());
            let stack_depth = frame.operand_stack.len() as u32;
            chain = Some(Continuation::new(frame.function.clone(), frame.pc as u32, slots, stack_depth, chain));
        }
        chain.expect("reification requires at least one frame")
    }

    fn deref_slot(&mut self, index: usize) -> Result<Value, InterpreterError> {
        let frame = self.top();
        let value = frame.locals[index].clone().expect("read of unassigned local slot");
        Ok(match value {
            Value::Variable(v) => v.get().expect("read of unassigned local variable"),
            other => other,
        })
    }

    fn set_slot(&mut self, index: usize, value: Value) -> Result<(), InterpreterError> {
        let is_variable = self.top().code().local_kind(index) == Some(SlotKind::Variable);
        if is_variable {
            match self.top().locals[index].clone() {
                Some(Value::Variable(v)) => {
                    let reactors = v.set(value).expect("local variable type mismatch is a generator contract violation");
                    self.invoke_reactors(reactors)?;
                }
                _ => panic!("set_local on an uninitialized variable slot"),
            }
        } else {
            self.top_mut().locals[index] = Some(value);
        }
        Ok(())
    }

    /// Run each write reactor to completion on top of the current frame
    /// stack, discarding whatever it returns — a reactor runs for its
    /// effects, and letting its return value leak onto the triggering
    /// frame's operand stack would corrupt that frame's tracked stack
    /// depth (spec.md §5's write reactor semantics).
    fn invoke_reactors(&mut self, reactors: Vec<Function>) -> Result<(), InterpreterError> {
        for reactor in reactors {
            let floor = self.frames.len();
            self.frames.push(Frame::new(reactor, vec![]));
            self.run_to_floor(floor)?;
        }
        Ok(())
    }

    /// Drive frames until the stack is back down to `floor`, exactly like
    /// `run_frames` except the value a frame at `floor` would have pushed
    /// onto its caller is dropped instead, since there is no caller frame
    /// here to receive it.
    fn run_to_floor(&mut self, floor: usize) -> Result<(), InterpreterError> {
        while self.frames.len() > floor {
            let finished_value = {
                let frame = self.frames.last_mut().expect("loop invariant: frames.len() > floor");
                let code = frame.code();
                let mut reader = NybbleReader::new(code.nybblecodes());
                for _ in 0..frame.pc {
                    reader.read_nybble();
                }
                if reader.at_end() {
                    Some(frame.pop())
                } else {
                    None
                }
            };

            if let Some(value) = finished_value {
                self.frames.pop();
                if self.frames.len() > floor {
                    self.top_mut().push(value);
                }
                continue;
            }

            self.step()?;
        }
        Ok(())
    }

    fn read_varint(&mut self) -> u64 {
        let frame = self.frames.last_mut().unwrap();
        let code = frame.code();
        let mut reader = NybbleReader::new(code.nybblecodes());
        for _ in 0..frame.pc {
            reader.read_nybble();
        }
        let value = reader.read_varint().expect("generator always emits a terminated varint");
        frame.pc = reader.position();
        value
    }

    fn top(&self) -> &Frame {
        self.frames.last().unwrap()
    }

    fn top_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().unwrap()
    }
}

/// Convert an interpreter-level error into the tier-3 fiber failure the
/// scheduler delivers to a fiber's join handle, for failures that were
/// never wrapped in a more specific type on the way out.
pub fn to_fiber_failure(err: InterpreterError, at: Option<Continuation>) -> FiberFailure {
    let reason = match err {
        InterpreterError::Generator(e) => Value::Atom(Atom::new(e.to_string())),
        InterpreterError::Dispatch(e) => Value::Atom(Atom::new(e.to_string())),
    };
    FiberFailure::new(reason, at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{builtins, PrimitiveRegistry};
    use avail_core::{AvailType, FunctionType, IntegerRange, PrimitiveFlags};
    use avail_dispatch::Definition;
    use avail_l1::Generator;

    fn add_one_function(loader: &ModuleLoader) -> (Atom, Function) {
        let message = Atom::new("addOne:");
        let method = loader.define_method(message.clone(), 1);

        let mut r#gen = Generator::start_block(
            vec![AvailType::Integer(IntegerRange::ALL)],
            vec![avail_l1::SlotDecl::value(AvailType::Integer(IntegerRange::ALL))],
            false,
            vec![],
            AvailType::Integer(IntegerRange::ALL),
        );
        r#gen.get_local(0).unwrap();
        r#gen.push_literal(Value::Integer(1)).unwrap();
        r#gen.call(Value::Atom(Atom::new("plus:")), Value::Integer(0), 2).unwrap();
        let code = r#gen.end_block().unwrap();
        let function = Function::new(code, vec![]);

        method
            .add_definition(Definition::new(vec![AvailType::Integer(IntegerRange::ALL)], function.clone()))
            .unwrap();
        (message, function)
    }

    fn install_plus(loader: &ModuleLoader, registry: &mut PrimitiveRegistry) {
        builtins::install(registry);
        let plus = Atom::new("plus:");
        let method = loader.define_method(plus, 2);
        let ft = FunctionType {
            arguments: vec![AvailType::Integer(IntegerRange::ALL), AvailType::Integer(IntegerRange::ALL)],
            result: Box::new(AvailType::Integer(IntegerRange::ALL)),
        };
        let code = CompiledCode::new(vec![], 2, 0, 0, 1, ft).with_primitive(builtins::INTEGER_ADD, PrimitiveFlags::empty());
        let function = Function::new(code, vec![]);
        method
            .add_definition(Definition::new(
                vec![AvailType::Integer(IntegerRange::ALL), AvailType::Integer(IntegerRange::ALL)],
                function,
            ))
            .unwrap();
    }

    #[test]
    fn nested_send_through_a_primitive() {
        let loader = ModuleLoader::new();
        let mut registry = PrimitiveRegistry::new();
        install_plus(&loader, &mut registry);
        let (_message, function) = add_one_function(&loader);

        let fiber = Fiber::new(100);
        let mut interp = Interpreter::new(&fiber, &loader, &registry);
        let result = interp.run(function, vec![Value::Integer(41)]).unwrap();
        assert_eq!(result, Value::Integer(42));
        assert_eq!(fiber.state(), FiberState::Terminated);
    }

    #[test]
    fn primitive_failure_delivers_error_code_to_fallback_body() {
        let loader = ModuleLoader::new();
        let mut registry = PrimitiveRegistry::new();
        builtins::install(&mut registry);

        let message = Atom::new("faultyAdd:");
        let method = loader.define_method(message.clone(), 2);

        let mut r#gen = Generator::start_block(
            vec![AvailType::Integer(IntegerRange::ALL), AvailType::Float],
            vec![
                avail_l1::SlotDecl::value(AvailType::Integer(IntegerRange::ALL)),
                avail_l1::SlotDecl::value(AvailType::Float),
                avail_l1::SlotDecl::value(AvailType::Integer(IntegerRange::ALL)),
            ],
            false,
            vec![],
            AvailType::Integer(IntegerRange::ALL),
        );
        r#gen.primitive(builtins::INTEGER_ADD, PrimitiveFlags::empty());
        r#gen.get_local(2).unwrap();
        let code = r#gen.end_block().unwrap();
        let function = Function::new(code, vec![]);
        method
            .add_definition(Definition::new(
                vec![AvailType::Integer(IntegerRange::ALL), AvailType::Float],
                function,
            ))
            .unwrap();

        let mut driver_gen =
            Generator::start_block(vec![], vec![], false, vec![], AvailType::Integer(IntegerRange::ALL));
        driver_gen.push_literal(Value::Integer(1)).unwrap();
        driver_gen.push_literal(Value::Float(2.0)).unwrap();
        driver_gen.call(Value::Atom(message), Value::Integer(0), 2).unwrap();
        let driver_code = driver_gen.end_block().unwrap();
        let driver = Function::new(driver_code, vec![]);

        let fiber = Fiber::new(100);
        let mut interp = Interpreter::new(&fiber, &loader, &registry);
        let result = interp.run(driver, vec![]).unwrap();
        assert_eq!(result, Value::Integer(i64::from(ErrorCode::IncorrectArgumentType as u16)));
    }

    #[test]
    fn variable_write_invokes_registered_reactors() {
        let subject = Variable::new(AvailType::Top);
        let sentinel = Variable::new(AvailType::Top);

        let mut reactor_gen =
            Generator::start_block(vec![], vec![], false, vec![avail_l1::SlotDecl::variable(AvailType::Top)], AvailType::Integer(IntegerRange::ALL));
        reactor_gen.push_literal(Value::Integer(77)).unwrap();
        reactor_gen.set_outer(0).unwrap();
        reactor_gen.push_literal(Value::Integer(0)).unwrap();
        let reactor_code = reactor_gen.end_block().unwrap();
        let reactor = Function::new(reactor_code, vec![Value::Variable(sentinel.clone())]);
        subject.add_write_reactor(Atom::new("notify-sentinel"), reactor);

        let mut driver_gen = Generator::start_block(
            vec![],
            vec![],
            false,
            vec![avail_l1::SlotDecl::variable(AvailType::Top)],
            AvailType::Integer(IntegerRange::ALL),
        );
        driver_gen.push_literal(Value::Integer(5)).unwrap();
        driver_gen.set_outer(0).unwrap();
        driver_gen.get_outer(0).unwrap();
        let driver_code = driver_gen.end_block().unwrap();
        let driver = Function::new(driver_code, vec![Value::Variable(subject.clone())]);

        let loader = ModuleLoader::new();
        let registry = PrimitiveRegistry::new();
        let fiber = Fiber::new(100);
        let mut interp = Interpreter::new(&fiber, &loader, &registry);
        let result = interp.run(driver, vec![]).unwrap();

        assert_eq!(result, Value::Integer(5));
        assert_eq!(subject.get(), Ok(Value::Integer(5)));
        assert_eq!(sentinel.get(), Ok(Value::Integer(77)));
    }

    #[test]
    fn push_label_continuation_restarts_with_caller_and_leading_args_preserved() {
        let captured = Variable::new(AvailType::Top);

        let mut labeled_gen = Generator::start_block(
            vec![AvailType::Integer(IntegerRange::ALL)],
            vec![avail_l1::SlotDecl::value(AvailType::Integer(IntegerRange::ALL))],
            true,
            vec![avail_l1::SlotDecl::variable(AvailType::Top)],
            AvailType::Integer(IntegerRange::ALL),
        );
        labeled_gen.label_declaration().unwrap();
        labeled_gen.push_label().unwrap();
        labeled_gen.set_outer(0).unwrap();
        labeled_gen.push_literal(Value::Integer(123)).unwrap();
        let labeled_code = labeled_gen.end_block().unwrap();
        let labeled_function = Function::new(labeled_code, vec![Value::Variable(captured.clone())]);

        let loader = ModuleLoader::new();
        let message = Atom::new("labeled:");
        let method = loader.define_method(message.clone(), 1);
        method
            .add_definition(Definition::new(vec![AvailType::Integer(IntegerRange::ALL)], labeled_function.clone()))
            .unwrap();

        let mut driver_gen =
            Generator::start_block(vec![], vec![], false, vec![], AvailType::Integer(IntegerRange::ALL));
        driver_gen.push_literal(Value::Integer(7)).unwrap();
        driver_gen.call(Value::Atom(message), Value::Integer(0), 1).unwrap();
        let driver_code = driver_gen.end_block().unwrap();
        let driver = Function::new(driver_code, vec![]);

        let mut registry = PrimitiveRegistry::new();
        builtins::install(&mut registry);
        let fiber = Fiber::new(100);
        let mut interp = Interpreter::new(&fiber, &loader, &registry);
        let result = interp.run(driver, vec![]).unwrap();
        assert_eq!(result, Value::Integer(123));

        let Value::Continuation(continuation) = captured.get().unwrap() else {
            panic!("expected a captured continuation");
        };
        assert!(continuation.caller().is_some(), "label continuation must chain to its caller");
        assert_eq!(continuation.frame_slots()[0], Value::Integer(7), "leading argument slot must survive reification");

        let outcome = registry
            .invoke(builtins::RESTART_CONTINUATION, &[Value::Continuation(continuation)])
            .unwrap();
        match outcome {
            crate::primitive::Outcome::ReadyToInvoke { function, args } => {
                assert_eq!(function, labeled_function);
                assert_eq!(args, vec![Value::Integer(7)]);
            }
            _ => panic!("expected Outcome::ReadyToInvoke from restart_continuation"),
        }

        let fiber2 = Fiber::new(100);
        let mut interp2 = Interpreter::new(&fiber2, &loader, &registry);
        let restarted_result = interp2.run(labeled_function, vec![Value::Integer(7)]).unwrap();
        assert_eq!(restarted_result, Value::Integer(123));
    }
}
