use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use rustc_hash::FxHashMap;

use crate::ast::{Access, BinaryOp, Node, Program, TypeSpec};
use crate::backend::Backend;
use crate::scope::{Scope, VariableRecord};
use crate::types::{self, TypeId, TypeLattice};
use crate::walk::{self, Visitor, WalkError, WalkResult};

mod value;

pub use value::{ClassValue, FunctionValue, ObjectValue, Value};

/// What a visited node left behind.
///
/// `Value` marks a bare expression result at block level; the shared walk
/// hands it to `wrap_bare_value`, which prints it. `Operation` carries a
/// value too but is never printed (assignments, calls), matching the rule
/// that only pure expression statements echo their result.
#[derive(Debug)]
pub enum Evaluated {
    Value(Value),
    Operation(Value),
    Unit,
}

impl Evaluated {
    fn into_value(self, kind: &'static str) -> WalkResult<Value> {
        match self {
            Evaluated::Value(value) | Evaluated::Operation(value) => Ok(value),
            Evaluated::Unit => Err(WalkError::UnhandledNodeKind { kind }),
        }
    }
}

/// Result of interpreting a whole program: everything the implicit-print
/// rule emitted, plus the value of the last bare expression.
#[derive(Debug)]
pub struct ProgramOutcome {
    pub result: Value,
    pub output: Vec<String>,
}

pub fn interpret(program: &Program) -> Result<ProgramOutcome, WalkError> {
    let mut walk = InterpreterWalk::new();
    let root = Scope::root();
    walk.walk_tree(&program.tree, &root)?;
    Ok(ProgramOutcome {
        result: walk.last_value,
        output: walk.output,
    })
}

struct InterpreterWalk {
    lattice: TypeLattice,
    output: Vec<String>,
    last_value: Value,
}

impl InterpreterWalk {
    fn new() -> Self {
        Self {
            lattice: TypeLattice::new(),
            output: Vec::new(),
            last_value: Value::Null,
        }
    }

    fn eval(&mut self, node: &Node, scope: &Scope<Value>) -> WalkResult<Value> {
        self.visit(node, scope)?.into_value(node.kind_name())
    }

    fn resolve_spec(&self, spec: &TypeSpec) -> WalkResult<TypeId> {
        walk::resolve_spec(&self.lattice, spec)
    }

    fn unify(
        &self,
        name: &str,
        declared: TypeId,
        incoming: TypeId,
        type_fixed: bool,
    ) -> WalkResult<TypeId> {
        walk::unify_named(&self.lattice, name, declared, incoming, type_fixed)
    }

    fn unify_compound(
        &self,
        name: &str,
        declared: TypeId,
        incoming: TypeId,
        type_fixed: bool,
    ) -> WalkResult<TypeId> {
        walk::unify_compound(&self.lattice, name, declared, incoming, type_fixed)
    }

    fn member(&self, parent: &Value, name: &str) -> Option<Value> {
        match parent {
            Value::Object(object) => object.borrow().fields.get(name).cloned(),
            Value::Class(class) => class.scope.resolve(name).map(|record| record.payload),
            _ => None,
        }
    }

    fn assign_simple(&mut self, name: &str, value: Value, scope: &Scope<Value>) -> WalkResult<()> {
        let record = scope
            .resolve(name)
            .ok_or_else(|| WalkError::UndeclaredIdentifier {
                name: name.to_string(),
            })?;
        let new_type = self.unify(name, record.type_id, value.type_id(), record.type_fixed)?;
        scope.update(name, |record| {
            record.type_id = new_type;
            record.payload = value;
        });
        Ok(())
    }

    fn assign_member(
        &mut self,
        parent: &Node,
        name: &str,
        dotted: Option<String>,
        value: Value,
        scope: &Scope<Value>,
    ) -> WalkResult<()> {
        let undeclared = || WalkError::UndeclaredIdentifier {
            name: dotted.clone().unwrap_or_else(|| name.to_string()),
        };
        match self.eval(parent, scope)? {
            Value::Object(object) => match object.borrow_mut().fields.get_mut(name) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(undeclared()),
            },
            Value::Class(class) => class
                .scope
                .update(name, |record| {
                    record.payload = value;
                })
                .ok_or_else(undeclared),
            _ => Err(undeclared()),
        }
    }

    fn assign_target(
        &mut self,
        variable: &Node,
        value: Value,
        scope: &Scope<Value>,
    ) -> WalkResult<()> {
        match variable {
            Node::Identifier { name, parent: None } => self.assign_simple(name, value, scope),
            Node::Identifier {
                name,
                parent: Some(parent),
            } => self.assign_member(parent, name, variable.dotted_path(), value, scope),
            other => Err(WalkError::UnhandledNodeKind {
                kind: other.kind_name(),
            }),
        }
    }

    fn read_target(&mut self, variable: &Node, scope: &Scope<Value>) -> WalkResult<Value> {
        self.eval(variable, scope)
    }

    fn compound_assign(
        &mut self,
        variable: &Node,
        op: BinaryOp,
        operand: Value,
        scope: &Scope<Value>,
    ) -> WalkResult<Value> {
        match variable {
            Node::Identifier { name, parent: None } => {
                let record =
                    scope
                        .resolve(name)
                        .ok_or_else(|| WalkError::UndeclaredIdentifier {
                            name: name.clone(),
                        })?;
                // `**=` forces the target to hold a double before the
                // result lands in it.
                let new_type = if op == BinaryOp::Pow {
                    self.unify(name, record.type_id, types::DOUBLE, record.type_fixed)?
                } else {
                    self.unify_compound(
                        name,
                        record.type_id,
                        operand.type_id(),
                        record.type_fixed,
                    )?
                };
                let result = record.payload.apply(op, &operand)?;
                let stored = result.clone();
                scope.update(name, |record| {
                    record.type_id = new_type;
                    record.payload = stored;
                });
                Ok(result)
            }
            Node::Identifier { parent: Some(_), .. } => {
                let current = self.read_target(variable, scope)?;
                let result = current.apply(op, &operand)?;
                self.assign_target(variable, result.clone(), scope)?;
                Ok(result)
            }
            other => Err(WalkError::UnhandledNodeKind {
                kind: other.kind_name(),
            }),
        }
    }

    fn condition(&mut self, node: &Node, scope: &Scope<Value>) -> WalkResult<bool> {
        self.eval(node, scope)?.coerce_bool()
    }

    fn call_function(
        &mut self,
        function: &Node,
        args: &[Node],
        scope: &Scope<Value>,
    ) -> WalkResult<Evaluated> {
        let callee = match self.eval(function, scope)? {
            Value::Function(function) => function,
            other => {
                return Err(WalkError::NotCallable {
                    type_name: other.kind_name().to_string(),
                });
            }
        };
        if args.len() != callee.params.len() {
            return Err(WalkError::ArityMismatch {
                name: callee.name.clone(),
                expected: callee.params.len(),
                found: args.len(),
            });
        }
        let mut arguments = Vec::with_capacity(args.len());
        for arg in args {
            arguments.push(self.eval(arg, scope)?);
        }
        let call_scope = callee.scope.child();
        for (param, argument) in callee.params.iter().zip(arguments) {
            let declared = self.resolve_spec(&param.type_spec)?;
            let type_id = self.unify(&param.name, declared, argument.type_id(), true)?;
            let accepted = call_scope.declare(VariableRecord {
                name: param.name.clone(),
                type_id,
                type_fixed: true,
                is_static: false,
                is_final: false,
                access: Access::Package,
                payload: argument,
            });
            if !accepted {
                return Err(WalkError::Redeclaration {
                    name: param.name.clone(),
                });
            }
        }
        self.walk_tree(&callee.body, &call_scope)?;
        // Functions are void; a call in value position yields null.
        Ok(Evaluated::Operation(Value::Null))
    }

    fn construct(
        &mut self,
        class: &Node,
        args: &[Node],
        scope: &Scope<Value>,
    ) -> WalkResult<Evaluated> {
        let class = match self.eval(class, scope)? {
            Value::Class(class) => class,
            other => {
                return Err(WalkError::NotCallable {
                    type_name: other.kind_name().to_string(),
                });
            }
        };
        // No constructors: arguments are evaluated for effect and dropped.
        for arg in args {
            self.eval(arg, scope)?;
        }
        let mut fields = FxHashMap::default();
        class.scope.for_each_local(|record| {
            fields.insert(record.name.clone(), record.payload.clone());
        });
        Ok(Evaluated::Value(Value::Object(Rc::new(RefCell::new(
            ObjectValue {
                class_name: class.name.clone(),
                type_id: class.type_id,
                fields,
            },
        )))))
    }
}

impl Visitor for InterpreterWalk {
    type Output = Evaluated;
    type Payload = Value;

    fn visit(&mut self, node: &Node, scope: &Scope<Value>) -> WalkResult<Evaluated> {
        match node {
            Node::IntegerLiteral(value) => Ok(Evaluated::Value(Value::Integer(*value))),
            Node::DoubleLiteral(value) => Ok(Evaluated::Value(Value::Double(*value))),
            Node::StringLiteral(value) => Ok(Evaluated::Value(Value::string(value.clone()))),
            Node::CharacterLiteral(value) => Ok(Evaluated::Value(Value::Character(*value))),
            Node::BooleanLiteral(value) => Ok(Evaluated::Value(Value::Boolean(*value))),

            Node::Identifier { name, parent: None } => {
                let record =
                    scope
                        .resolve(name)
                        .ok_or_else(|| WalkError::UndeclaredIdentifier {
                            name: name.clone(),
                        })?;
                Ok(Evaluated::Value(record.payload))
            }
            Node::Identifier {
                name,
                parent: Some(parent),
            } => {
                let parent_value = self.eval(parent, scope)?;
                let value = self.member(&parent_value, name).ok_or_else(|| {
                    WalkError::UndeclaredIdentifier {
                        name: node.dotted_path().unwrap_or_else(|| name.clone()),
                    }
                })?;
                Ok(Evaluated::Value(value))
            }

            // Both operands evaluate before the operator applies; logical
            // operators do not short-circuit.
            Node::Binary { left, op, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                Ok(Evaluated::Value(left.apply(*op, &right)?))
            }

            Node::VariableDeclaration {
                name,
                type_spec,
                value,
                is_static,
                is_final,
                access,
            } => {
                let declared = self.resolve_spec(type_spec)?;
                let payload = match value {
                    Some(node) => Some(self.eval(node, scope)?),
                    None => None,
                };
                let type_id = match &payload {
                    Some(value) => self.unify(name, declared, value.type_id(), false)?,
                    None => declared,
                };
                let accepted = scope.declare(VariableRecord {
                    name: name.clone(),
                    type_id,
                    type_fixed: false,
                    is_static: *is_static,
                    is_final: *is_final,
                    access: *access,
                    payload: payload.unwrap_or(Value::Null),
                });
                if !accepted {
                    return Err(WalkError::Redeclaration { name: name.clone() });
                }
                Ok(Evaluated::Unit)
            }

            Node::Assignment { variable, value } => {
                let value = self.eval(value, scope)?;
                self.assign_target(variable, value.clone(), scope)?;
                Ok(Evaluated::Operation(value))
            }

            Node::OperatorAssignment {
                variable,
                op,
                value,
            } => {
                let operand = self.eval(value, scope)?;
                let result = self.compound_assign(variable, *op, operand, scope)?;
                Ok(Evaluated::Operation(result))
            }

            Node::Increment { variable } => {
                let result =
                    self.compound_assign(variable, BinaryOp::Add, Value::Integer(1), scope)?;
                Ok(Evaluated::Operation(result))
            }
            Node::Decrement { variable } => {
                let result =
                    self.compound_assign(variable, BinaryOp::Sub, Value::Integer(1), scope)?;
                Ok(Evaluated::Operation(result))
            }

            Node::If {
                condition,
                body,
                else_body,
            } => {
                if self.condition(condition, scope)? {
                    self.walk_tree(body, &scope.child())?;
                } else if let Some(else_body) = else_body {
                    self.walk_tree(else_body, &scope.child())?;
                }
                Ok(Evaluated::Unit)
            }
            Node::While { condition, body } => {
                while self.condition(condition, scope)? {
                    self.walk_tree(body, &scope.child())?;
                }
                Ok(Evaluated::Unit)
            }
            Node::DoWhile { condition, body } => {
                loop {
                    self.walk_tree(body, &scope.child())?;
                    if !self.condition(condition, scope)? {
                        break;
                    }
                }
                Ok(Evaluated::Unit)
            }
            Node::For {
                declaration,
                condition,
                round,
                body,
            } => {
                // Declaration, condition and round share one loop scope;
                // each iteration of the body opens its own.
                let loop_scope = scope.child();
                self.visit(declaration, &loop_scope)?;
                while self.condition(condition, &loop_scope)? {
                    self.walk_tree(body, &loop_scope.child())?;
                    self.visit(round, &loop_scope)?;
                }
                Ok(Evaluated::Unit)
            }

            Node::FunctionDeclaration {
                name,
                params,
                body,
                is_static,
                is_final,
                access,
                in_class: _,
            } => {
                let function = Value::Function(Rc::new(FunctionValue {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    scope: scope.clone(),
                }));
                let accepted = scope.declare(VariableRecord {
                    name: name.clone(),
                    type_id: types::OBJECT,
                    type_fixed: true,
                    is_static: *is_static,
                    is_final: *is_final,
                    access: *access,
                    payload: function,
                });
                if !accepted {
                    return Err(WalkError::Redeclaration { name: name.clone() });
                }
                Ok(Evaluated::Unit)
            }
            Node::FunctionCall { function, args } => self.call_function(function, args, scope),

            Node::ClassDeclaration {
                name,
                fields,
                methods,
                classes,
                is_static,
                is_final,
                access,
            } => {
                let type_id = self.lattice.declare(name, &[types::OBJECT]);
                let class_scope = scope.child();
                for field in fields {
                    self.visit(field, &class_scope)?;
                }
                for method in methods {
                    self.visit(method, &class_scope)?;
                }
                for class in classes {
                    self.visit(class, &class_scope)?;
                }
                let class_value = Value::Class(Rc::new(ClassValue {
                    name: name.clone(),
                    type_id,
                    scope: class_scope,
                }));
                let accepted = scope.declare(VariableRecord {
                    name: name.clone(),
                    type_id: types::OBJECT,
                    type_fixed: true,
                    is_static: *is_static,
                    is_final: *is_final,
                    access: *access,
                    payload: class_value,
                });
                if !accepted {
                    return Err(WalkError::Redeclaration { name: name.clone() });
                }
                Ok(Evaluated::Unit)
            }
            Node::ClassConstruction { class, args } => self.construct(class, args, scope),

            Node::Tree(tree) => {
                self.walk_tree(tree, &scope.child())?;
                Ok(Evaluated::Unit)
            }
        }
    }

    fn is_bare_value(output: &Evaluated) -> bool {
        matches!(output, Evaluated::Value(_))
    }

    fn wrap_bare_value(
        &mut self,
        output: Evaluated,
        _scope: &Scope<Value>,
    ) -> WalkResult<Evaluated> {
        let Evaluated::Value(value) = output else {
            return Ok(output);
        };
        self.output.push(value.to_output());
        self.last_value = value.clone();
        Ok(Evaluated::Operation(value))
    }
}

/// Tree-walking backend: runs the program and returns what it printed.
pub struct Interpreter;

impl Interpreter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for Interpreter {
    fn name(&self) -> &'static str {
        "interpreter"
    }

    fn run(&mut self, program: &Program) -> Result<String> {
        Ok(interpret(program)?.output.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use indoc::indoc;

    fn run(input: &str) -> ProgramOutcome {
        let program = parse(input).expect("parse failed");
        interpret(&program).expect("interpret failed")
    }

    fn run_err(input: &str) -> WalkError {
        let program = parse(input).expect("parse failed");
        interpret(&program).expect_err("expected interpretation failure")
    }

    #[test]
    fn prints_the_final_bare_expression() {
        let outcome = run(indoc! {"
            var x = 1
            x += 2
            x
        "});
        assert_eq!(outcome.output, vec!["3"]);
        assert!(matches!(outcome.result, Value::Integer(3)));
    }

    #[test]
    fn mixed_arithmetic_prints_as_double() {
        let outcome = run(indoc! {"
            var x = 1
            var y = 2.5
            x + y
        "});
        assert_eq!(outcome.output, vec!["3.5"]);
    }

    #[test]
    fn zero_is_a_false_condition() {
        let outcome = run(indoc! {"
            if (0) { 1 } else { 2 }
        "});
        assert_eq!(outcome.output, vec!["2"]);
    }

    #[test]
    fn function_values_are_true_conditions() {
        let outcome = run(indoc! {"
            function f() { }
            if (f) { 1 } else { 2 }
        "});
        assert_eq!(outcome.output, vec!["1"]);
    }

    #[test]
    fn assignments_and_calls_are_not_printed() {
        let outcome = run(indoc! {"
            function noise() { }
            var x = 1
            x = 2
            noise()
            x
        "});
        assert_eq!(outcome.output, vec!["2"]);
    }

    #[test]
    fn redeclaration_in_the_same_scope_fails() {
        let err = run_err(indoc! {"
            var x = 1
            var x = 2
        "});
        assert_eq!(
            err,
            WalkError::Redeclaration {
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn inner_scopes_may_shadow() {
        let outcome = run(indoc! {"
            var x = 1
            if (true) {
                var x = 2
                x
            }
            x
        "});
        assert_eq!(outcome.output, vec!["2", "1"]);
    }

    #[test]
    fn block_locals_do_not_leak() {
        let err = run_err(indoc! {"
            {
                var hidden = 1
            }
            hidden
        "});
        assert_eq!(
            err,
            WalkError::UndeclaredIdentifier {
                name: "hidden".to_string()
            }
        );
    }

    #[test]
    fn typed_variables_widen_on_assignment() {
        let outcome = run(indoc! {"
            int x = 1
            x += 2.5
            x
        "});
        assert_eq!(outcome.output, vec!["3.5"]);
    }

    #[test]
    fn incompatible_assignment_fails() {
        let err = run_err(indoc! {r#"
            var x = 1
            x = "text"
        "#});
        assert_eq!(
            err,
            WalkError::TypeIncompatibility {
                name: "x".to_string(),
                declared: "int".to_string(),
                incoming: "string".to_string(),
            }
        );
    }

    #[test]
    fn power_assignment_turns_the_target_double() {
        let outcome = run(indoc! {"
            var x = 2
            x **= 3
            x
        "});
        assert_eq!(outcome.output, vec!["8.0"]);
    }

    #[test]
    fn while_loop_counts_down() {
        let outcome = run(indoc! {"
            var n = 3
            while (n) {
                n
                n -= 1
            }
        "});
        assert_eq!(outcome.output, vec!["3", "2", "1"]);
    }

    #[test]
    fn do_while_runs_at_least_once() {
        let outcome = run(indoc! {"
            var n = 0
            do {
                n
            } while (n)
        "});
        assert_eq!(outcome.output, vec!["0"]);
    }

    #[test]
    fn for_loop_shares_its_scope_with_the_round() {
        let outcome = run(indoc! {"
            var sum = 0
            for (var i = 1; i <= 3; i++) {
                sum += i
            }
            sum
        "});
        assert_eq!(outcome.output, vec!["6"]);
    }

    #[test]
    fn functions_bind_parameters_and_see_outer_variables() {
        let outcome = run(indoc! {"
            var base = 10
            function bump(int amount) {
                base + amount
            }
            bump(5)
            bump(7)
        "});
        assert_eq!(outcome.output, vec!["15", "17"]);
    }

    #[test]
    fn unknown_parameters_adopt_the_argument_type() {
        let outcome = run(indoc! {"
            function show(value) {
                value
            }
            show(2.5)
            show(true)
        "});
        assert_eq!(outcome.output, vec!["2.5", "true"]);
    }

    #[test]
    fn arity_mismatch_is_an_error() {
        let err = run_err(indoc! {"
            function f(a, b) { }
            f(1)
        "});
        assert_eq!(
            err,
            WalkError::ArityMismatch {
                name: "f".to_string(),
                expected: 2,
                found: 1,
            }
        );
    }

    #[test]
    fn calling_a_non_function_fails() {
        let err = run_err(indoc! {"
            var x = 1
            x()
        "});
        assert_eq!(
            err,
            WalkError::NotCallable {
                type_name: "int".to_string()
            }
        );
    }

    #[test]
    fn objects_carry_their_class_fields() {
        let outcome = run(indoc! {"
            class Point {
                var x = 1
                var y = 2
            }
            var p = new Point()
            p.x
            p.x = 5
            p.x + p.y
        "});
        assert_eq!(outcome.output, vec!["1", "7"]);
    }

    #[test]
    fn object_handles_alias() {
        let outcome = run(indoc! {"
            class Box {
                var value = 0
            }
            var a = new Box()
            var b = a
            b.value = 9
            a.value
        "});
        assert_eq!(outcome.output, vec!["9"]);
    }

    #[test]
    fn unknown_object_member_fails_with_the_dotted_name() {
        let err = run_err(indoc! {"
            class Point {
                var x = 1
            }
            var p = new Point()
            p.z
        "});
        assert_eq!(
            err,
            WalkError::UndeclaredIdentifier {
                name: "p.z".to_string()
            }
        );
    }

    #[test]
    fn integer_division_by_zero_surfaces() {
        let err = run_err("1 / 0");
        assert_eq!(err, WalkError::DivisionByZero);
    }

    #[test]
    fn string_conditions_refuse_to_coerce() {
        let err = run_err(indoc! {r#"
            if ("yes") { 1 }
        "#});
        assert_eq!(
            err,
            WalkError::CoercionError {
                type_name: "string".to_string()
            }
        );
    }

    #[test]
    fn logical_operands_evaluate_left_to_right_without_short_circuit() {
        let program = parse(indoc! {"
            function f() { 1 }
            function g() { 2 }
            f() || g()
        "})
        .expect("parse failed");
        let mut walk = InterpreterWalk::new();
        let root = Scope::root();
        let err = walk
            .walk_tree(&program.tree, &root)
            .expect_err("null || null has no operator");
        assert_eq!(
            err,
            WalkError::UndefinedOperator {
                operator: "||",
                left: "null".to_string(),
                right: "null".to_string(),
            }
        );
        // Both call bodies ran before the operator was applied.
        assert_eq!(walk.output, vec!["1", "2"]);
    }

    #[test]
    fn string_concatenation_round_trips() {
        let outcome = run(indoc! {r#"
            var greeting = "Hello, "
            greeting + "Shake"
        "#});
        assert_eq!(outcome.output, vec!["Hello, Shake"]);
    }
}
