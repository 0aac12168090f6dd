//! End-to-end exercises of the priority fiber scheduler: several fibers
//! spawned concurrently, a send to an undefined method surfacing as a tier-3
//! fiber failure, and a primitive invoked through a full send (spec.md §4.5
//! fork/run/join lifecycle, §4.4 send outcomes).

use avail_core::{Atom, AvailType, CompiledCode, Function, FunctionType, IntegerRange, PrimitiveFlags, Value};
use avail_dispatch::Definition;
use avail_l1::Generator;
use avail_vm::{Fiber, FiberOutcome, ModuleLoader, PrimitiveRegistry, Scheduler};
use std::sync::Arc;

fn constant_function(value: i64) -> Function {
    let mut r#gen = Generator::start_block(vec![], vec![], false, vec![], AvailType::Integer(IntegerRange::ALL));
    r#gen.push_literal(Value::Integer(value)).unwrap();
    let code = r#gen.end_block().unwrap();
    Function::new(code, vec![])
}

fn install_plus(loader: &ModuleLoader, registry: &mut PrimitiveRegistry) {
    avail_vm::primitive::builtins::install(registry);
    let method = loader.define_method(Atom::new("plus:"), 2);
    let function_type = FunctionType {
        arguments: vec![AvailType::Integer(IntegerRange::ALL), AvailType::Integer(IntegerRange::ALL)],
        result: Box::new(AvailType::Integer(IntegerRange::ALL)),
    };
    let code = CompiledCode::new(vec![], 2, 0, 0, 1, function_type)
        .with_primitive(avail_vm::primitive::builtins::INTEGER_ADD, PrimitiveFlags::empty());
    let function = Function::new(code, vec![]);
    method
        .add_definition(Definition::new(
            vec![AvailType::Integer(IntegerRange::ALL), AvailType::Integer(IntegerRange::ALL)],
            function,
        ))
        .unwrap();
}

fn sum_via_send_function() -> Function {
    let mut r#gen = Generator::start_block(vec![], vec![], false, vec![], AvailType::Integer(IntegerRange::ALL));
    r#gen.push_literal(Value::Integer(19)).unwrap();
    r#gen.push_literal(Value::Integer(23)).unwrap();
    r#gen.call(Value::Atom(Atom::new("plus:")), Value::Integer(0), 2).unwrap();
    let code = r#gen.end_block().unwrap();
    Function::new(code, vec![])
}

fn send_to_undefined_message_function() -> Function {
    let mut r#gen = Generator::start_block(vec![], vec![], false, vec![], AvailType::Integer(IntegerRange::ALL));
    r#gen.push_literal(Value::Integer(1)).unwrap();
    r#gen.call(Value::Atom(Atom::new("noSuchMethod:")), Value::Integer(0), 1).unwrap();
    let code = r#gen.end_block().unwrap();
    Function::new(code, vec![])
}

#[test]
fn concurrently_spawned_fibers_all_complete() {
    let loader = Arc::new(ModuleLoader::new());
    let registry = Arc::new(PrimitiveRegistry::new());
    let scheduler = Scheduler::new(loader, registry);

    let handles: Vec<_> = (0..20)
        .map(|i| scheduler.spawn(constant_function(i), vec![], (i % 256) as u8))
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            FiberOutcome::Succeeded(Value::Integer(n)) => assert_eq!(n, i as i64),
            other => panic!("fiber {i} produced unexpected outcome: {other:?}"),
        }
    }
    scheduler.wait_all();
}

#[test]
fn send_through_a_primitive_reaches_the_caller() {
    let loader = Arc::new(ModuleLoader::new());
    let mut registry = PrimitiveRegistry::new();
    install_plus(&loader, &mut registry);
    let scheduler = Scheduler::new(loader, Arc::new(registry));

    let handle = scheduler.spawn(sum_via_send_function(), vec![], 128);
    match handle.join() {
        FiberOutcome::Succeeded(Value::Integer(42)) => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
    scheduler.wait_all();
}

#[test]
fn fork_propagates_heritable_globals_and_joins_on_result() {
    let loader = Arc::new(ModuleLoader::new());
    let registry = Arc::new(PrimitiveRegistry::new());
    let scheduler = Scheduler::new(loader, registry);

    let parent = Fiber::new(128);
    let key = Atom::new("shared-config");
    parent.set_heritable_global(key.clone(), Value::Integer(7));

    let (child, handle) = scheduler.fork(&parent, constant_function(42), vec![], 128);
    assert_eq!(child.heritable_global(&key), Some(Value::Integer(7)));

    match handle.join() {
        FiberOutcome::Succeeded(Value::Integer(42)) => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
    scheduler.wait_all();
}

#[test]
fn send_to_an_undefined_message_fails_the_fiber() {
    let loader = Arc::new(ModuleLoader::new());
    let registry = Arc::new(PrimitiveRegistry::new());
    let scheduler = Scheduler::new(loader, registry);

    let handle = scheduler.spawn(send_to_undefined_message_function(), vec![], 128);
    match handle.join() {
        FiberOutcome::Failed(failure) => {
            assert!(matches!(failure.reason, Value::Atom(_)));
        }
        other => panic!("expected a failure, got {other:?}"),
    }
    scheduler.wait_all();
}
