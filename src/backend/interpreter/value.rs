use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::{BinaryOp, FunctionParameter, Tree};
use crate::scope::Scope;
use crate::types::{self, TypeId};
use crate::walk::{WalkError, WalkResult};

/// A user-declared function together with the scope it closes over.
#[derive(Debug)]
pub struct FunctionValue {
    pub name: String,
    pub params: Vec<FunctionParameter>,
    pub body: Tree,
    pub scope: Scope<Value>,
}

/// A class declaration: its members live in a dedicated scope nested in the
/// declaration scope.
#[derive(Debug)]
pub struct ClassValue {
    pub name: String,
    pub type_id: TypeId,
    pub scope: Scope<Value>,
}

/// An instance: a snapshot of the class member payloads, mutable per
/// object.
#[derive(Debug)]
pub struct ObjectValue {
    pub class_name: String,
    pub type_id: TypeId,
    pub fields: FxHashMap<String, Value>,
}

/// Runtime value of the tree-walking backend. Compound values are shared
/// handles, so assigning an object to a second variable aliases it.
#[derive(Debug, Clone)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Character(char),
    String(Rc<String>),
    Null,
    Function(Rc<FunctionValue>),
    Class(Rc<ClassValue>),
    Object(Rc<RefCell<ObjectValue>>),
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Value::String(Rc::new(value.into()))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "int",
            Value::Double(_) => "double",
            Value::Character(_) => "char",
            Value::String(_) => "string",
            Value::Null => "null",
            Value::Function(_) => "function",
            Value::Class(_) => "class",
            Value::Object(_) => "object",
        }
    }

    /// The lattice type this value carries at runtime. `null` reports
    /// `unknown` so it unifies with any declared type.
    pub fn type_id(&self) -> TypeId {
        match self {
            Value::Boolean(_) => types::BOOLEAN,
            Value::Integer(_) => types::INT,
            Value::Double(_) => types::DOUBLE,
            Value::Character(_) => types::CHAR,
            Value::String(_) => types::STRING,
            Value::Null => types::UNKNOWN,
            Value::Function(_) | Value::Class(_) => types::OBJECT,
            Value::Object(object) => object.borrow().type_id,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Double(value) => Some(*value),
            _ => None,
        }
    }

    fn undefined(&self, op: BinaryOp, other: &Value) -> WalkError {
        WalkError::UndefinedOperator {
            operator: op.symbol(),
            left: self.kind_name().to_string(),
            right: other.kind_name().to_string(),
        }
    }

    pub fn apply(&self, op: BinaryOp, other: &Value) -> WalkResult<Value> {
        match op {
            BinaryOp::Add => self.add(other),
            BinaryOp::Sub => self.sub(other),
            BinaryOp::Mul => self.mul(other),
            BinaryOp::Div => self.div(other),
            BinaryOp::Mod => self.rem(other),
            BinaryOp::Pow => self.pow(other),
            BinaryOp::And => self.and(other),
            BinaryOp::Or => self.or(other),
            BinaryOp::Xor => self.xor(other),
            BinaryOp::Eq => self.equals(other),
            BinaryOp::Lt => self.compare(BinaryOp::Lt, other, |o| o.is_lt()),
            BinaryOp::Le => self.compare(BinaryOp::Le, other, |o| o.is_le()),
            BinaryOp::Gt => self.compare(BinaryOp::Gt, other, |o| o.is_gt()),
            BinaryOp::Ge => self.compare(BinaryOp::Ge, other, |o| o.is_ge()),
        }
    }

    pub fn add(&self, other: &Value) -> WalkResult<Value> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_add(*b))),
            (Value::String(a), Value::String(b)) => Ok(Value::String(Rc::new(format!("{a}{b}")))),
            _ => self.numeric(BinaryOp::Add, other, |a, b| a + b),
        }
    }

    pub fn sub(&self, other: &Value) -> WalkResult<Value> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_sub(*b))),
            _ => self.numeric(BinaryOp::Sub, other, |a, b| a - b),
        }
    }

    pub fn mul(&self, other: &Value) -> WalkResult<Value> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_mul(*b))),
            _ => self.numeric(BinaryOp::Mul, other, |a, b| a * b),
        }
    }

    pub fn div(&self, other: &Value) -> WalkResult<Value> {
        match (self, other) {
            (Value::Integer(_), Value::Integer(0)) => Err(WalkError::DivisionByZero),
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_div(*b))),
            // Double division by zero keeps IEEE semantics.
            _ => self.numeric(BinaryOp::Div, other, |a, b| a / b),
        }
    }

    pub fn rem(&self, other: &Value) -> WalkResult<Value> {
        match (self, other) {
            (Value::Integer(_), Value::Integer(0)) => Err(WalkError::DivisionByZero),
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_rem(*b))),
            _ => self.numeric(BinaryOp::Mod, other, |a, b| a % b),
        }
    }

    /// Exponentiation always produces a double, matching `Math.pow`.
    pub fn pow(&self, other: &Value) -> WalkResult<Value> {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => Ok(Value::Double(a.powf(b))),
            _ => Err(self.undefined(BinaryOp::Pow, other)),
        }
    }

    pub fn and(&self, other: &Value) -> WalkResult<Value> {
        self.logical(BinaryOp::And, other, |a, b| a && b)
    }

    pub fn or(&self, other: &Value) -> WalkResult<Value> {
        self.logical(BinaryOp::Or, other, |a, b| a || b)
    }

    pub fn xor(&self, other: &Value) -> WalkResult<Value> {
        self.logical(BinaryOp::Xor, other, |a, b| a ^ b)
    }

    pub fn equals(&self, other: &Value) -> WalkResult<Value> {
        let equal = match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Character(a), Value::Character(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => return Err(self.undefined(BinaryOp::Eq, other)),
            },
        };
        Ok(Value::Boolean(equal))
    }

    fn compare(
        &self,
        op: BinaryOp,
        other: &Value,
        check: impl FnOnce(std::cmp::Ordering) -> bool,
    ) -> WalkResult<Value> {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => {
                let ordering = a.partial_cmp(&b).ok_or_else(|| self.undefined(op, other))?;
                Ok(Value::Boolean(check(ordering)))
            }
            _ => Err(self.undefined(op, other)),
        }
    }

    fn numeric(
        &self,
        op: BinaryOp,
        other: &Value,
        apply: impl FnOnce(f64, f64) -> f64,
    ) -> WalkResult<Value> {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => Ok(Value::Double(apply(a, b))),
            _ => Err(self.undefined(op, other)),
        }
    }

    fn logical(
        &self,
        op: BinaryOp,
        other: &Value,
        apply: impl FnOnce(bool, bool) -> bool,
    ) -> WalkResult<Value> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(apply(*a, *b))),
            _ => Err(self.undefined(op, other)),
        }
    }

    /// The condition coercion table: numbers are true when positive, null
    /// is false, callable and compound values are true, and anything else
    /// refuses to act as a condition.
    pub fn coerce_bool(&self) -> WalkResult<bool> {
        match self {
            Value::Boolean(value) => Ok(*value),
            Value::Integer(value) => Ok(*value > 0),
            Value::Double(value) => Ok(*value > 0.0),
            Value::Null => Ok(false),
            Value::Function(_) | Value::Class(_) | Value::Object(_) => Ok(true),
            Value::Character(_) | Value::String(_) => Err(WalkError::CoercionError {
                type_name: self.kind_name().to_string(),
            }),
        }
    }

    /// Print formatting. Whole doubles keep one decimal place so `3.0`
    /// stays distinguishable from the integer `3`.
    pub fn to_output(&self) -> String {
        match self {
            Value::Boolean(value) => value.to_string(),
            Value::Integer(value) => value.to_string(),
            Value::Double(value) => {
                if value.fract() == 0.0 && value.is_finite() {
                    format!("{value:.1}")
                } else {
                    value.to_string()
                }
            }
            Value::Character(value) => value.to_string(),
            Value::String(value) => value.to_string(),
            Value::Null => "null".to_string(),
            Value::Function(function) => format!("<function {}>", function.name),
            Value::Class(class) => format!("<class {}>", class.name),
            Value::Object(object) => format!("<{} instance>", object.borrow().class_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_stays_integer() {
        let result = Value::Integer(7).div(&Value::Integer(2)).unwrap();
        assert!(matches!(result, Value::Integer(3)));
        let result = Value::Integer(7).rem(&Value::Integer(2)).unwrap();
        assert!(matches!(result, Value::Integer(1)));
    }

    #[test]
    fn mixed_arithmetic_widens_to_double() {
        let result = Value::Integer(1).add(&Value::Double(2.5)).unwrap();
        assert!(matches!(result, Value::Double(v) if v == 3.5));
    }

    #[test]
    fn power_produces_double_even_for_integers() {
        let result = Value::Integer(2).pow(&Value::Integer(3)).unwrap();
        assert!(matches!(result, Value::Double(v) if v == 8.0));
    }

    #[test]
    fn integer_division_by_zero_is_an_error() {
        assert!(matches!(
            Value::Integer(1).div(&Value::Integer(0)),
            Err(WalkError::DivisionByZero)
        ));
    }

    #[test]
    fn string_concatenation_requires_both_strings() {
        let result = Value::string("foo").add(&Value::string("bar")).unwrap();
        assert_eq!(result.to_output(), "foobar");
        let err = Value::string("foo").add(&Value::Integer(1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Operator '+' is not defined for type string and int"
        );
    }

    #[test]
    fn logical_operators_are_boolean_only() {
        let result = Value::Boolean(true).xor(&Value::Boolean(true)).unwrap();
        assert!(matches!(result, Value::Boolean(false)));
        let err = Value::Boolean(true).and(&Value::Integer(1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Operator '&&' is not defined for type boolean and int"
        );
    }

    #[test]
    fn equality_crosses_the_numeric_divide() {
        let result = Value::Integer(3).equals(&Value::Double(3.0)).unwrap();
        assert!(matches!(result, Value::Boolean(true)));
        assert!(Value::Integer(3).equals(&Value::string("3")).is_err());
    }

    #[test]
    fn comparisons_are_numeric_only() {
        let result = Value::Integer(2)
            .apply(BinaryOp::Lt, &Value::Double(2.5))
            .unwrap();
        assert!(matches!(result, Value::Boolean(true)));
        assert!(
            Value::string("a")
                .apply(BinaryOp::Lt, &Value::string("b"))
                .is_err()
        );
    }

    #[test]
    fn boolean_coercion_follows_the_table() {
        assert_eq!(Value::Integer(1).coerce_bool(), Ok(true));
        assert_eq!(Value::Integer(0).coerce_bool(), Ok(false));
        assert_eq!(Value::Integer(-3).coerce_bool(), Ok(false));
        assert_eq!(Value::Double(0.5).coerce_bool(), Ok(true));
        assert_eq!(Value::Double(0.0).coerce_bool(), Ok(false));
        assert_eq!(Value::Null.coerce_bool(), Ok(false));
        assert_eq!(Value::Boolean(true).coerce_bool(), Ok(true));
        assert_eq!(
            Value::string("x").coerce_bool(),
            Err(WalkError::CoercionError {
                type_name: "string".to_string()
            })
        );
        assert_eq!(
            Value::Character('x').coerce_bool(),
            Err(WalkError::CoercionError {
                type_name: "char".to_string()
            })
        );
    }

    #[test]
    fn compound_values_coerce_true() {
        let function = Value::Function(Rc::new(FunctionValue {
            name: "f".to_string(),
            params: Vec::new(),
            body: Tree {
                children: Vec::new(),
            },
            scope: Scope::root(),
        }));
        assert_eq!(function.coerce_bool(), Ok(true));

        let class = Value::Class(Rc::new(ClassValue {
            name: "C".to_string(),
            type_id: types::OBJECT,
            scope: Scope::root(),
        }));
        assert_eq!(class.coerce_bool(), Ok(true));

        let object = Value::Object(Rc::new(RefCell::new(ObjectValue {
            class_name: "C".to_string(),
            type_id: types::OBJECT,
            fields: FxHashMap::default(),
        })));
        assert_eq!(object.coerce_bool(), Ok(true));
    }

    #[test]
    fn output_formatting_keeps_whole_doubles_decimal() {
        assert_eq!(Value::Double(3.0).to_output(), "3.0");
        assert_eq!(Value::Double(3.5).to_output(), "3.5");
        assert_eq!(Value::Integer(3).to_output(), "3");
        assert_eq!(Value::Null.to_output(), "null");
        assert_eq!(Value::Boolean(false).to_output(), "false");
    }
}
