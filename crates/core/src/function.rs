//! Functions: a `CompiledCode` paired with the outer values it closed over
//! at the point it was instantiated (spec.md §2, §6).
//!
//! Avail's literal-function instantiation captures outers by *variable*
//! when the outer is declared `var` (so later writes are visible to the
//! closure) and by *value* otherwise. We model both uniformly as `Value`,
//! since `Value::Variable` already carries that distinction; a captured
//! `Variable` is simply an outer whose `Value` happens to be
//! `Value::Variable(v)`.

use crate::compiled_code::CompiledCode;
use crate::types::AvailType;
use crate::value::Value;
use std::sync::Arc;

struct FunctionInner {
    code: CompiledCode,
    outers: Vec<Value>,
}

/// A callable closure: compiled code plus its captured environment.
#[derive(Clone)]
pub struct Function(Arc<FunctionInner>);

impl Function {
    pub fn new(code: CompiledCode, outers: Vec<Value>) -> Self {
        debug_assert_eq!(outers.len(), code.num_outers() as usize);
        Function(Arc::new(FunctionInner { code, outers }))
    }

    pub fn code(&self) -> &CompiledCode {
        &self.0.code
    }

    pub fn outer(&self, index: usize) -> Option<&Value> {
        self.0.outers.get(index)
    }

    pub fn num_outers(&self) -> usize {
        self.0.outers.len()
    }

    pub fn kind(&self) -> AvailType {
        AvailType::Function(self.0.code.function_type().clone())
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Function {}

impl std::hash::Hash for Function {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Function({}, {} outer(s))",
            self.0.code.origin_name().unwrap_or("<anonymous>"),
            self.0.outers.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FunctionType;

    #[test]
    fn outer_access() {
        let code = CompiledCode::new(
            vec![],
            0,
            0,
            1,
            1,
            FunctionType {
                arguments: vec![],
                result: Box::new(AvailType::Top),
            },
        );
        let f = Function::new(code, vec![Value::Integer(42)]);
        assert_eq!(f.outer(0), Some(&Value::Integer(42)));
        assert_eq!(f.outer(1), None);
    }

    #[test]
    fn identity_equality() {
        let code = CompiledCode::new(
            vec![],
            0,
            0,
            0,
            1,
            FunctionType {
                arguments: vec![],
                result: Box::new(AvailType::Top),
            },
        );
        let a = Function::new(code.clone(), vec![]);
        let b = Function::new(code, vec![]);
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
    }
}
