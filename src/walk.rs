use thiserror::Error;

use crate::ast::{BinaryOp, Node, Tree, TypeSpec};
use crate::scope::Scope;
use crate::types::{self, TypeId, TypeLattice};

/// Everything a walk over the AST can fail with, shared by every backend so
/// the harness can compare failure kinds across them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WalkError {
    #[error("Variable {name} is already declared in this scope")]
    Redeclaration { name: String },

    #[error("Variable {name} is not declared")]
    UndeclaredIdentifier { name: String },

    #[error("Type {incoming} is not assignable to {name} of type {declared}")]
    TypeIncompatibility {
        name: String,
        declared: String,
        incoming: String,
    },

    #[error("Operator '{operator}' is not defined for type {left} and {right}")]
    UndefinedOperator {
        operator: &'static str,
        left: String,
        right: String,
    },

    #[error("Unexpected {kind} in value position")]
    UnhandledNodeKind { kind: &'static str },

    #[error("Cannot interpret value of type {type_name} as boolean")]
    CoercionError { type_name: String },

    #[error("Unknown type {name}")]
    UnknownType { name: String },

    #[error("Function {name} expects {expected} arguments, got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Value of type {type_name} is not callable")]
    NotCallable { type_name: String },

    #[error("Division by zero")]
    DivisionByZero,
}

pub type WalkResult<T> = Result<T, WalkError>;

/// Per-backend dispatch over the closed node set.
///
/// A backend implements `visit` as one exhaustive match and inherits the
/// shared block rule from `walk_tree`: children are visited in order and
/// every bare value result is handed to `wrap_bare_value`, which backends
/// use for the implicit-print convention on expression statements.
pub trait Visitor {
    type Output;
    type Payload: Clone;

    fn visit(&mut self, node: &Node, scope: &Scope<Self::Payload>) -> WalkResult<Self::Output>;

    /// True for outputs that represent a value a block would otherwise
    /// discard (a bare expression, not an assignment or declaration).
    fn is_bare_value(output: &Self::Output) -> bool;

    /// Called on every bare value produced at block level.
    fn wrap_bare_value(
        &mut self,
        output: Self::Output,
        scope: &Scope<Self::Payload>,
    ) -> WalkResult<Self::Output>;

    fn walk_tree(
        &mut self,
        tree: &Tree,
        scope: &Scope<Self::Payload>,
    ) -> WalkResult<Vec<Self::Output>> {
        let mut outputs = Vec::with_capacity(tree.children.len());
        for child in &tree.children {
            let mut output = self.visit(child, scope)?;
            if Self::is_bare_value(&output) {
                output = self.wrap_bare_value(output, scope)?;
            }
            outputs.push(output);
        }
        Ok(outputs)
    }
}

/// Resolves a written type to the lattice, failing on named types no class
/// declaration has introduced.
pub fn resolve_spec(lattice: &TypeLattice, spec: &TypeSpec) -> WalkResult<TypeId> {
    lattice
        .resolve_spec(spec)
        .ok_or_else(|| WalkError::UnknownType {
            name: match spec {
                TypeSpec::Named(name) => name.clone(),
                other => format!("{other:?}"),
            },
        })
}

/// Declaration/assignment unification with the variable name attached to
/// failures.
pub fn unify_named(
    lattice: &TypeLattice,
    name: &str,
    declared: TypeId,
    incoming: TypeId,
    type_fixed: bool,
) -> WalkResult<TypeId> {
    lattice
        .unify_assignment(declared, incoming, type_fixed)
        .map_err(|_| WalkError::TypeIncompatibility {
            name: name.to_string(),
            declared: lattice.name(declared).to_string(),
            incoming: lattice.name(incoming).to_string(),
        })
}

/// Compound assignments accept the looser direction too: either the
/// variable widens to hold the result, or the operand narrows into the
/// variable's type.
pub fn unify_compound(
    lattice: &TypeLattice,
    name: &str,
    declared: TypeId,
    incoming: TypeId,
    type_fixed: bool,
) -> WalkResult<TypeId> {
    if let Ok(unified) = lattice.unify_assignment(declared, incoming, type_fixed) {
        return Ok(unified);
    }
    if lattice.unify_assignment(incoming, declared, true).is_ok() {
        return Ok(declared);
    }
    Err(WalkError::TypeIncompatibility {
        name: name.to_string(),
        declared: lattice.name(declared).to_string(),
        incoming: lattice.name(incoming).to_string(),
    })
}

/// The static result type of a binary expression, shared by both backends
/// so generated Java and interpreted values agree on widening.
///
/// An `unknown` operand makes the whole expression `unknown` (it resolves
/// at runtime in the interpreter and renders as `Object` in Java).
pub fn binary_result_type(
    lattice: &TypeLattice,
    op: BinaryOp,
    left: TypeId,
    right: TypeId,
) -> WalkResult<TypeId> {
    if left == types::UNKNOWN || right == types::UNKNOWN {
        return Ok(types::UNKNOWN);
    }
    let undefined = || WalkError::UndefinedOperator {
        operator: op.symbol(),
        left: lattice.name(left).to_string(),
        right: lattice.name(right).to_string(),
    };
    match op {
        BinaryOp::Add if left == types::STRING && right == types::STRING => Ok(types::STRING),
        BinaryOp::Pow if lattice.is_numeric(left) && lattice.is_numeric(right) => {
            Ok(types::DOUBLE)
        }
        _ if op.is_arithmetic() => {
            if lattice.is_numeric(left) && lattice.is_numeric(right) {
                lattice
                    .nearest_common_ancestor(left, right)
                    .ok_or_else(undefined)
            } else {
                Err(undefined())
            }
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
            if left == types::BOOLEAN && right == types::BOOLEAN {
                Ok(types::BOOLEAN)
            } else {
                Err(undefined())
            }
        }
        BinaryOp::Eq => {
            if left == right || (lattice.is_numeric(left) && lattice.is_numeric(right)) {
                Ok(types::BOOLEAN)
            } else {
                Err(undefined())
            }
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            if lattice.is_numeric(left) && lattice.is_numeric(right) {
                Ok(types::BOOLEAN)
            } else {
                Err(undefined())
            }
        }
        _ => Err(undefined()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_widens_to_the_common_ancestor() {
        let lattice = TypeLattice::new();
        assert_eq!(
            binary_result_type(&lattice, BinaryOp::Add, types::INT, types::DOUBLE),
            Ok(types::DOUBLE)
        );
        assert_eq!(
            binary_result_type(&lattice, BinaryOp::Mul, types::BYTE, types::SHORT),
            Ok(types::SHORT)
        );
    }

    #[test]
    fn power_always_produces_double() {
        let lattice = TypeLattice::new();
        assert_eq!(
            binary_result_type(&lattice, BinaryOp::Pow, types::INT, types::INT),
            Ok(types::DOUBLE)
        );
    }

    #[test]
    fn string_concatenation_needs_strings_on_both_sides() {
        let lattice = TypeLattice::new();
        assert_eq!(
            binary_result_type(&lattice, BinaryOp::Add, types::STRING, types::STRING),
            Ok(types::STRING)
        );
        assert!(binary_result_type(&lattice, BinaryOp::Add, types::STRING, types::INT).is_err());
    }

    #[test]
    fn logical_operators_reject_non_boolean_operands() {
        let lattice = TypeLattice::new();
        assert_eq!(
            binary_result_type(&lattice, BinaryOp::And, types::BOOLEAN, types::BOOLEAN),
            Ok(types::BOOLEAN)
        );
        let err = binary_result_type(&lattice, BinaryOp::And, types::BOOLEAN, types::INT)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Operator '&&' is not defined for type boolean and int"
        );
    }

    #[test]
    fn comparisons_produce_boolean() {
        let lattice = TypeLattice::new();
        assert_eq!(
            binary_result_type(&lattice, BinaryOp::Lt, types::INT, types::DOUBLE),
            Ok(types::BOOLEAN)
        );
        assert_eq!(
            binary_result_type(&lattice, BinaryOp::Eq, types::BOOLEAN, types::BOOLEAN),
            Ok(types::BOOLEAN)
        );
        assert!(binary_result_type(&lattice, BinaryOp::Lt, types::STRING, types::STRING).is_err());
    }

    #[test]
    fn unknown_operands_stay_unknown() {
        let lattice = TypeLattice::new();
        assert_eq!(
            binary_result_type(&lattice, BinaryOp::Add, types::UNKNOWN, types::INT),
            Ok(types::UNKNOWN)
        );
    }
}
