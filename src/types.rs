use std::collections::VecDeque;

use thiserror::Error;

use crate::ast::TypeSpec;

/// Handle into a [`TypeLattice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(usize);

pub const OBJECT: TypeId = TypeId(0);
pub const STRING: TypeId = TypeId(1);
pub const DOUBLE: TypeId = TypeId(2);
pub const FLOAT: TypeId = TypeId(3);
pub const LONG: TypeId = TypeId(4);
pub const INT: TypeId = TypeId(5);
pub const SHORT: TypeId = TypeId(6);
pub const BYTE: TypeId = TypeId(7);
pub const CHAR: TypeId = TypeId(8);
pub const BOOLEAN: TypeId = TypeId(9);
pub const VOID: TypeId = TypeId(10);
/// Placeholder for inferred declarations; adopts the first incoming type.
pub const UNKNOWN: TypeId = TypeId(11);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("Type {incoming} is not assignable to type {declared}")]
    Incompatible { declared: String, incoming: String },
}

#[derive(Debug, Clone)]
struct TypeNode {
    name: String,
    parents: Vec<TypeId>,
}

/// The directed acyclic graph of named types with explicit parent edges.
///
/// Seeded with the builtin types: `object` at the root, `string` below it,
/// the primitive widening chain `byte -> short -> int -> long -> float ->
/// double`, and the parentless `char`, `boolean`, `void` and `unknown`.
/// Primitives are deliberately disjoint from the `object` hierarchy, so
/// unifying a primitive with a reference type fails. Class declarations add
/// nodes below `object` during a walk.
///
/// Acyclicity holds by construction: a declared type may only name parents
/// that already exist.
#[derive(Debug, Clone)]
pub struct TypeLattice {
    types: Vec<TypeNode>,
}

impl TypeLattice {
    pub fn new() -> Self {
        let mut lattice = Self { types: Vec::new() };
        lattice.push("object", &[]);
        lattice.push("string", &[OBJECT]);
        lattice.push("double", &[]);
        lattice.push("float", &[DOUBLE]);
        lattice.push("long", &[FLOAT]);
        lattice.push("int", &[LONG]);
        lattice.push("short", &[INT]);
        lattice.push("byte", &[SHORT]);
        lattice.push("char", &[]);
        lattice.push("boolean", &[]);
        lattice.push("void", &[]);
        lattice.push("unknown", &[]);
        lattice
    }

    fn push(&mut self, name: &str, parents: &[TypeId]) -> TypeId {
        let id = TypeId(self.types.len());
        self.types.push(TypeNode {
            name: name.to_string(),
            parents: parents.to_vec(),
        });
        id
    }

    /// Adds a named type to the lattice. Parent order is significant: it is
    /// the tie-break order of [`TypeLattice::nearest_common_ancestor`].
    pub fn declare(&mut self, name: &str, parents: &[TypeId]) -> TypeId {
        self.push(name, parents)
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.types[id.0].name
    }

    pub fn parents(&self, id: TypeId) -> &[TypeId] {
        &self.types[id.0].parents
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.types
            .iter()
            .position(|node| node.name == name)
            .map(TypeId)
    }

    pub fn resolve_spec(&self, spec: &TypeSpec) -> Option<TypeId> {
        match spec {
            TypeSpec::Dynamic => Some(UNKNOWN),
            TypeSpec::Byte => Some(BYTE),
            TypeSpec::Short => Some(SHORT),
            TypeSpec::Int => Some(INT),
            TypeSpec::Long => Some(LONG),
            TypeSpec::Float => Some(FLOAT),
            TypeSpec::Double => Some(DOUBLE),
            TypeSpec::Boolean => Some(BOOLEAN),
            TypeSpec::Char => Some(CHAR),
            TypeSpec::Void => Some(VOID),
            TypeSpec::Named(name) => self.lookup(name),
        }
    }

    /// True when a numeric widening from `id` can reach `double`.
    pub fn is_numeric(&self, id: TypeId) -> bool {
        self.is_subtype(id, DOUBLE)
    }

    /// True iff `sup` is reachable from `sub` by following zero or more
    /// parent edges. Reflexive.
    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        if sub == sup {
            return true;
        }
        self.parents(sub)
            .iter()
            .any(|&parent| self.is_subtype(parent, sup))
    }

    /// The ancestor of `b` closest to `b` that `a` is a subtype of.
    ///
    /// Fast path: when `a` is already a subtype of `b` the answer is `b`
    /// itself. Otherwise the parent chain of `b` is expanded breadth-first,
    /// so the candidate reachable in the fewest edges wins; ties at equal
    /// depth are broken by parent declaration order.
    pub fn nearest_common_ancestor(&self, a: TypeId, b: TypeId) -> Option<TypeId> {
        if self.is_subtype(a, b) {
            return Some(b);
        }
        let mut queue: VecDeque<TypeId> = self.parents(b).iter().copied().collect();
        while let Some(candidate) = queue.pop_front() {
            if self.is_subtype(a, candidate) {
                return Some(candidate);
            }
            queue.extend(self.parents(candidate).iter().copied());
        }
        None
    }

    /// Unification used by declarations and assignments.
    ///
    /// An `unknown` declared type adopts the incoming type (inference on
    /// first use), and an `unknown` incoming type is accepted as-is. An
    /// incoming subtype keeps the declared type. Otherwise, unless the
    /// declaration is type-fixed, the declared type widens to the nearest
    /// common ancestor.
    pub fn unify_assignment(
        &self,
        declared: TypeId,
        incoming: TypeId,
        type_fixed: bool,
    ) -> Result<TypeId, TypeError> {
        if declared == UNKNOWN {
            return Ok(incoming);
        }
        if incoming == UNKNOWN {
            return Ok(declared);
        }
        if self.is_subtype(incoming, declared) {
            return Ok(declared);
        }
        if !type_fixed {
            if let Some(ancestor) = self.nearest_common_ancestor(declared, incoming) {
                return Ok(ancestor);
            }
        }
        Err(TypeError::Incompatible {
            declared: self.name(declared).to_string(),
            incoming: self.name(incoming).to_string(),
        })
    }
}

impl Default for TypeLattice {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtyping_is_reflexive() {
        let lattice = TypeLattice::new();
        for id in [OBJECT, STRING, DOUBLE, FLOAT, LONG, INT, SHORT, BYTE, CHAR, BOOLEAN, UNKNOWN] {
            assert!(lattice.is_subtype(id, id), "{} <: itself", lattice.name(id));
        }
    }

    #[test]
    fn subtyping_follows_the_widening_chain() {
        let lattice = TypeLattice::new();
        assert!(lattice.is_subtype(BYTE, SHORT));
        assert!(lattice.is_subtype(BYTE, DOUBLE));
        assert!(lattice.is_subtype(INT, DOUBLE));
        assert!(!lattice.is_subtype(DOUBLE, INT));
        assert!(!lattice.is_subtype(INT, BOOLEAN));
        assert!(!lattice.is_subtype(INT, OBJECT));
    }

    #[test]
    fn subtyping_is_transitive() {
        let lattice = TypeLattice::new();
        let all = [OBJECT, STRING, DOUBLE, FLOAT, LONG, INT, SHORT, BYTE, CHAR, BOOLEAN];
        for a in all {
            for b in all {
                for c in all {
                    if lattice.is_subtype(a, b) && lattice.is_subtype(b, c) {
                        assert!(
                            lattice.is_subtype(a, c),
                            "{} <: {} <: {} must be transitive",
                            lattice.name(a),
                            lattice.name(b),
                            lattice.name(c)
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn nearest_common_ancestor_takes_the_fast_path() {
        let lattice = TypeLattice::new();
        assert_eq!(lattice.nearest_common_ancestor(INT, DOUBLE), Some(DOUBLE));
        assert_eq!(lattice.nearest_common_ancestor(INT, INT), Some(INT));
    }

    #[test]
    fn nearest_common_ancestor_widens_upward() {
        let lattice = TypeLattice::new();
        assert_eq!(lattice.nearest_common_ancestor(DOUBLE, INT), Some(DOUBLE));
        assert_eq!(lattice.nearest_common_ancestor(LONG, BYTE), Some(LONG));
    }

    #[test]
    fn nearest_common_ancestor_fails_across_disjoint_hierarchies() {
        let lattice = TypeLattice::new();
        assert_eq!(lattice.nearest_common_ancestor(INT, STRING), None);
        assert_eq!(lattice.nearest_common_ancestor(BOOLEAN, INT), None);
    }

    #[test]
    fn declared_classes_meet_below_object() {
        let mut lattice = TypeLattice::new();
        let point = lattice.declare("Point", &[OBJECT]);
        let line = lattice.declare("Line", &[OBJECT]);
        assert!(lattice.is_subtype(point, OBJECT));
        assert_eq!(lattice.nearest_common_ancestor(point, line), Some(OBJECT));
        assert_eq!(lattice.lookup("Point"), Some(point));
    }

    #[test]
    fn unify_adopts_incoming_for_unknown() {
        let lattice = TypeLattice::new();
        assert_eq!(lattice.unify_assignment(UNKNOWN, INT, false), Ok(INT));
        assert_eq!(lattice.unify_assignment(UNKNOWN, INT, true), Ok(INT));
    }

    #[test]
    fn unify_keeps_declared_for_subtype_incoming() {
        let lattice = TypeLattice::new();
        assert_eq!(lattice.unify_assignment(DOUBLE, INT, false), Ok(DOUBLE));
        assert_eq!(lattice.unify_assignment(INT, INT, true), Ok(INT));
    }

    #[test]
    fn unify_widens_unless_type_fixed() {
        let lattice = TypeLattice::new();
        assert_eq!(lattice.unify_assignment(INT, DOUBLE, false), Ok(DOUBLE));
        assert_eq!(
            lattice.unify_assignment(INT, DOUBLE, true),
            Err(TypeError::Incompatible {
                declared: "int".to_string(),
                incoming: "double".to_string(),
            })
        );
    }

    #[test]
    fn widening_is_monotonic() {
        let lattice = TypeLattice::new();
        let mut declared = BYTE;
        for incoming in [SHORT, INT, LONG, FLOAT, DOUBLE] {
            let widened = lattice
                .unify_assignment(declared, incoming, false)
                .expect("widening within the numeric chain succeeds");
            assert!(
                lattice.is_subtype(declared, widened),
                "widening never narrows"
            );
            declared = widened;
        }
        // Once at the top of the chain, further unification is a no-op.
        assert_eq!(lattice.unify_assignment(declared, BYTE, false), Ok(DOUBLE));
    }

    #[test]
    fn unify_fails_across_disjoint_hierarchies() {
        let lattice = TypeLattice::new();
        assert!(lattice.unify_assignment(INT, STRING, false).is_err());
        assert!(lattice.unify_assignment(BOOLEAN, DOUBLE, false).is_err());
    }
}
