//! Compile-time values.

use num_bigint::BigInt;

use crate::ast::{Address, FunctionId};
use crate::types::TypeId;

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub ty: TypeId,
    pub kind: ValueKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Boolean(bool),
    Byte(u8),
    /// Used for every integer-kind type, including enums.
    Integer(BigInt),
    F32(f32),
    F64(f64),
    /// Unsized reals are held as a double; the width and semantics of wider
    /// host formats are not standardized enough to rely on.
    Real(f64),
    Function(FunctionId),
    Pointer(Address),
    Array {
        /// Concrete values for the leading elements. May be shorter than the
        /// array count when an ellipsis element fills the rest.
        elements: Vec<Value>,
        ellipsis: Option<Box<Value>>,
    },
    Slice {
        /// Pointer-typed value.
        start: Box<Value>,
        /// usize-typed value.
        count: Box<Value>,
    },
    Struct {
        /// One slot per member variable in declaration order; `None` marks an
        /// uninitialized member.
        members: Vec<Option<Value>>,
    },
    Union {
        /// Index of the currently held member and its value, or `None` when
        /// the union holds nothing.
        member: Option<(usize, Box<Value>)>,
    },
}

impl Value {
    pub fn new(ty: TypeId, kind: ValueKind) -> Self {
        Value { ty, kind }
    }

    pub fn as_integer(&self) -> &BigInt {
        match &self.kind {
            ValueKind::Integer(integer) => integer,
            _ => panic!("value is not an integer"),
        }
    }

    pub fn as_boolean(&self) -> bool {
        match self.kind {
            ValueKind::Boolean(boolean) => boolean,
            _ => panic!("value is not a boolean"),
        }
    }
}

/// Equality over scalar values. Aggregate and pointer comparisons are
/// rejected by the resolver or the evaluator before reaching here.
pub fn value_eq(lhs: &Value, rhs: &Value) -> bool {
    match (&lhs.kind, &rhs.kind) {
        (ValueKind::Boolean(a), ValueKind::Boolean(b)) => a == b,
        (ValueKind::Byte(a), ValueKind::Byte(b)) => a == b,
        (ValueKind::Integer(a), ValueKind::Integer(b)) => a == b,
        (ValueKind::F32(a), ValueKind::F32(b)) => a == b,
        (ValueKind::F64(a), ValueKind::F64(b)) => a == b,
        (ValueKind::Real(a), ValueKind::Real(b)) => a == b,
        (ValueKind::Function(a), ValueKind::Function(b)) => a == b,
        _ => unreachable!("illegal compile-time comparison"),
    }
}

pub fn value_lt(lhs: &Value, rhs: &Value) -> bool {
    match (&lhs.kind, &rhs.kind) {
        (ValueKind::Boolean(a), ValueKind::Boolean(b)) => a < b,
        (ValueKind::Byte(a), ValueKind::Byte(b)) => a < b,
        (ValueKind::Integer(a), ValueKind::Integer(b)) => a < b,
        (ValueKind::F32(a), ValueKind::F32(b)) => a < b,
        (ValueKind::F64(a), ValueKind::F64(b)) => a < b,
        (ValueKind::Real(a), ValueKind::Real(b)) => a < b,
        _ => unreachable!("illegal compile-time comparison"),
    }
}

pub fn value_gt(lhs: &Value, rhs: &Value) -> bool {
    match (&lhs.kind, &rhs.kind) {
        (ValueKind::Boolean(a), ValueKind::Boolean(b)) => a > b,
        (ValueKind::Byte(a), ValueKind::Byte(b)) => a > b,
        (ValueKind::Integer(a), ValueKind::Integer(b)) => a > b,
        (ValueKind::F32(a), ValueKind::F32(b)) => a > b,
        (ValueKind::F64(a), ValueKind::F64(b)) => a > b,
        (ValueKind::Real(a), ValueKind::Real(b)) => a > b,
        _ => unreachable!("illegal compile-time comparison"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn integer(value: i64) -> Value {
        Value::new(TypeId(0), ValueKind::Integer(BigInt::from(value)))
    }

    #[test]
    fn integer_equality_and_order() {
        assert!(value_eq(&integer(7), &integer(7)));
        assert!(!value_eq(&integer(7), &integer(8)));
        assert!(value_lt(&integer(-1), &integer(0)));
        assert!(value_gt(&integer(1), &integer(0)));
    }

    #[test]
    fn float_comparisons_follow_ieee754() {
        let nan = Value::new(TypeId(0), ValueKind::F64(f64::NAN));
        assert!(!value_eq(&nan, &nan));
        assert!(!value_lt(&nan, &nan));
        assert!(!value_gt(&nan, &nan));
    }

    #[test]
    fn boolean_order_false_before_true() {
        let t = Value::new(TypeId(0), ValueKind::Boolean(true));
        let f = Value::new(TypeId(0), ValueKind::Boolean(false));
        assert!(value_lt(&f, &t));
    }
}
