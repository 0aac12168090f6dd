//! A tiny in-process builder API standing in for the real front end
//! (lexer/parser/message-splitter/macro-expander), which `spec.md` places
//! out of scope. Rather than parsing Avail source text, each "program" this
//! harness can run is built directly as Level One code with
//! `avail_l1::Generator`, the same way `avail-vm`'s own tests build their
//! fixtures.

use crate::error::ReplError;
use avail_core::{Atom, AvailType, CompiledCode, Function, FunctionType, IntegerRange, PrimitiveFlags, Value};
use avail_dispatch::Definition;
use avail_l1::Generator;
use avail_vm::primitive::{builtins, PrimitiveRegistry};
use avail_vm::ModuleLoader;

const INTEGER: AvailType = AvailType::Integer(IntegerRange::ALL);

/// The method table and primitive registry this harness's demo programs
/// send to — built once at startup.
pub struct Environment {
    pub loader: ModuleLoader,
    pub primitives: PrimitiveRegistry,
}

impl Environment {
    pub fn install() -> Self {
        let loader = ModuleLoader::new();
        let mut primitives = PrimitiveRegistry::new();
        builtins::install(&mut primitives);

        define_binary_primitive(&loader, "plus:", builtins::INTEGER_ADD);
        define_binary_primitive(&loader, "minus:", builtins::INTEGER_SUBTRACT);
        define_binary_primitive(&loader, "equals:", builtins::INTEGER_EQUALS);
        define_unary_tuple_primitive(&loader, "tupleSize:", builtins::TUPLE_SIZE);
        define_binary_primitive(&loader, "tupleAt:", builtins::TUPLE_AT);

        Environment { loader, primitives }
    }
}

fn define_binary_primitive(loader: &ModuleLoader, message: &str, primitive: avail_core::PrimitiveNumber) {
    let method = loader.define_method(Atom::new(message), 2);
    let function_type = FunctionType {
        arguments: vec![INTEGER, INTEGER],
        result: Box::new(INTEGER),
    };
    let code = CompiledCode::new(vec![], 2, 0, 0, 1, function_type).with_primitive(primitive, PrimitiveFlags::empty());
    let function = Function::new(code, vec![]);
    method
        .add_definition(Definition::new(vec![INTEGER, INTEGER], function))
        .expect("demo method tables never collide");
}

fn define_unary_tuple_primitive(loader: &ModuleLoader, message: &str, primitive: avail_core::PrimitiveNumber) {
    let method = loader.define_method(Atom::new(message), 1);
    let function_type = FunctionType {
        arguments: vec![AvailType::Tuple(avail_core::TupleType {
            element_type: Box::new(AvailType::Top),
            size_range: IntegerRange::ALL,
        })],
        result: Box::new(INTEGER),
    };
    let code = CompiledCode::new(vec![], 1, 0, 0, 1, function_type).with_primitive(primitive, PrimitiveFlags::empty());
    let function = Function::new(code, vec![]);
    method
        .add_definition(Definition::new(
            vec![AvailType::Tuple(avail_core::TupleType {
                element_type: Box::new(AvailType::Top),
                size_range: IntegerRange::ALL,
            })],
            function,
        ))
        .expect("demo method tables never collide");
}

fn binary_send_function(message: &str, a: i64, b: i64) -> Function {
    let mut r#gen = Generator::start_block(vec![], vec![], false, vec![], INTEGER);
    r#gen.push_literal(Value::Integer(a)).unwrap();
    r#gen.push_literal(Value::Integer(b)).unwrap();
    r#gen.call(Value::Atom(Atom::new(message)), Value::Integer(0), 2).unwrap();
    let code = r#gen.end_block().unwrap();
    Function::new(code, vec![])
}

/// `a + b`.
pub fn add(a: i64, b: i64) -> Function {
    binary_send_function("plus:", a, b)
}

/// `a - b`.
pub fn sub(a: i64, b: i64) -> Function {
    binary_send_function("minus:", a, b)
}

/// `a = b`, as an integer (`1`/`0`).
pub fn eq(a: i64, b: i64) -> Function {
    binary_send_function("equals:", a, b)
}

/// The size of a tuple built from `values`.
pub fn tuple_size(values: &[i64]) -> Function {
    let mut r#gen = Generator::start_block(vec![], vec![], false, vec![], INTEGER);
    for &v in values {
        r#gen.push_literal(Value::Integer(v)).unwrap();
    }
    r#gen.make_tuple(values.len() as u16).unwrap();
    r#gen.call(Value::Atom(Atom::new("tupleSize:")), Value::Integer(0), 1).unwrap();
    let code = r#gen.end_block().unwrap();
    Function::new(code, vec![])
}

/// The 1-indexed `index`th element of a tuple built from `values`.
pub fn tuple_at(index: i64, values: &[i64]) -> Result<Function, ReplError> {
    if values.is_empty() {
        return Err(ReplError::Logic("tuple-at needs at least one element".to_string()));
    }
    let mut r#gen = Generator::start_block(vec![], vec![], false, vec![], INTEGER);
    for &v in values {
        r#gen.push_literal(Value::Integer(v)).unwrap();
    }
    r#gen.make_tuple(values.len() as u16).unwrap();
    r#gen.push_literal(Value::Integer(index)).unwrap();
    r#gen.call(Value::Atom(Atom::new("tupleAt:")), Value::Integer(0), 2).unwrap();
    let code = r#gen.end_block().unwrap();
    Ok(Function::new(code, vec![]))
}
