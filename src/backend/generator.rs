use std::cell::Cell;
use std::mem;
use std::rc::Rc;

use anyhow::Result;

use crate::ast::{Access, BinaryOp, Node, Program, TypeSpec};
use crate::backend::Backend;
use crate::scope::{Scope, VariableRecord};
use crate::types::{self, TypeId, TypeLattice};
use crate::walk::{self, Visitor, WalkError, WalkResult, binary_result_type};

pub mod java;

use java::{
    JavaClass, JavaFunction, JavaParameter, JavaStatement, JavaType, JavaValue, JavaVariable,
};

/// A lowered expression with the lattice type it was assigned.
#[derive(Debug, Clone)]
pub struct TypedValue {
    pub value: JavaValue,
    pub type_id: TypeId,
}

/// What lowering a node produced. `Value` is a bare expression result (the
/// shared walk wraps it in a `System.out.println` call), `Operation` is an
/// expression with statement standing (assignments, calls), `Statement` is
/// already a statement, and `None` means the node landed in the
/// surrounding class instead (declarations).
#[derive(Debug)]
pub enum GenNode {
    Value(TypedValue),
    Operation(TypedValue),
    Statement(JavaStatement),
    None,
}

impl GenNode {
    fn into_value(self, kind: &'static str) -> WalkResult<TypedValue> {
        match self {
            GenNode::Value(value) | GenNode::Operation(value) => Ok(value),
            _ => Err(WalkError::UnhandledNodeKind { kind }),
        }
    }
}

/// Where a declaration currently lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    /// Top level: variables become static fields, initialized in `main`.
    Root,
    /// Class body: members attach to the class under construction.
    Class,
    /// Function or control-flow body: declarations are locals.
    Body,
}

/// A lowered compilation unit, kept together with the lattice the walk
/// grew (class declarations add type names the rendering needs).
#[derive(Debug)]
pub struct GeneratedUnit {
    class: JavaClass,
    lattice: TypeLattice,
}

impl GeneratedUnit {
    pub fn render(&self) -> String {
        self.class.render(&self.lattice)
    }
}

pub fn generate(program: &Program, unit: &str) -> Result<GeneratedUnit, WalkError> {
    let mut walk = GeneratorWalk::new(unit);
    let scope = Scope::root();
    let nodes = walk.walk_tree(&program.tree, &scope)?;
    let mut class = walk.root;
    class.functions.insert(
        0,
        JavaFunction {
            name: "main".to_string(),
            params: vec![JavaParameter {
                name: "args".to_string(),
                jtype: JavaType::Raw("String[]"),
            }],
            return_type: "void",
            body: statements(nodes),
            is_static: true,
            is_final: false,
            access: Access::Public,
        },
    );
    Ok(GeneratedUnit {
        class,
        lattice: walk.lattice,
    })
}

fn statements(nodes: Vec<GenNode>) -> Vec<JavaStatement> {
    nodes
        .into_iter()
        .filter_map(|node| match node {
            GenNode::Statement(statement) => Some(statement),
            GenNode::Operation(value) => Some(JavaStatement::Expression(value.value)),
            GenNode::Value(_) | GenNode::None => None,
        })
        .collect()
}

fn compound_operator(op: BinaryOp) -> Option<&'static str> {
    match op {
        BinaryOp::Add => Some("+="),
        BinaryOp::Sub => Some("-="),
        BinaryOp::Mul => Some("*="),
        BinaryOp::Div => Some("/="),
        BinaryOp::Mod => Some("%="),
        _ => None,
    }
}

struct GeneratorWalk {
    lattice: TypeLattice,
    root: JavaClass,
    nested: Vec<JavaClass>,
    context: Context,
}

type TypeCell = Rc<Cell<TypeId>>;

impl GeneratorWalk {
    fn new(unit: &str) -> Self {
        Self {
            lattice: TypeLattice::new(),
            root: JavaClass::new(unit, Access::Public),
            nested: Vec::new(),
            context: Context::Root,
        }
    }

    fn current_class(&mut self) -> &mut JavaClass {
        match self.nested.last_mut() {
            Some(class) => class,
            None => &mut self.root,
        }
    }

    fn eval(&mut self, node: &Node, scope: &Scope<TypeCell>) -> WalkResult<TypedValue> {
        self.visit(node, scope)?.into_value(node.kind_name())
    }

    fn walk_body(
        &mut self,
        tree: &crate::ast::Tree,
        scope: &Scope<TypeCell>,
    ) -> WalkResult<Vec<JavaStatement>> {
        let saved = mem::replace(&mut self.context, Context::Body);
        let nodes = self.walk_tree(tree, scope);
        self.context = saved;
        Ok(statements(nodes?))
    }

    /// The symbol table knows dotted paths only as whole strings; member
    /// access below a declared root does not resolve. Lookups on `a.b`
    /// therefore fail unless `a.b` itself was declared, and the failure
    /// names the full path.
    fn target_path(&self, variable: &Node) -> WalkResult<String> {
        variable
            .dotted_path()
            .ok_or_else(|| WalkError::UnhandledNodeKind {
                kind: variable.kind_name(),
            })
    }

    fn resolve(
        &self,
        path: &str,
        scope: &Scope<TypeCell>,
    ) -> WalkResult<VariableRecord<TypeCell>> {
        scope
            .resolve(path)
            .ok_or_else(|| WalkError::UndeclaredIdentifier {
                name: path.to_string(),
            })
    }

    /// Widens the stored type and the shared declaration cell together.
    fn widen(&self, path: &str, new_type: TypeId, scope: &Scope<TypeCell>) {
        scope.update(path, |record| {
            record.type_id = new_type;
            record.payload.set(new_type);
        });
    }

    fn declare(
        &mut self,
        scope: &Scope<TypeCell>,
        name: &str,
        type_id: TypeId,
        type_fixed: bool,
        is_static: bool,
        is_final: bool,
        access: Access,
    ) -> WalkResult<TypeCell> {
        let cell = Rc::new(Cell::new(type_id));
        let accepted = scope.declare(VariableRecord {
            name: name.to_string(),
            type_id,
            type_fixed,
            is_static,
            is_final,
            access,
            payload: Rc::clone(&cell),
        });
        if !accepted {
            return Err(WalkError::Redeclaration {
                name: name.to_string(),
            });
        }
        Ok(cell)
    }

    /// Static stand-in for the runtime coercion table: booleans, numbers,
    /// unknowns and object-rooted values (strings excepted) may steer a
    /// branch.
    fn check_condition(&self, type_id: TypeId) -> WalkResult<()> {
        let allowed = type_id == types::BOOLEAN
            || type_id == types::UNKNOWN
            || self.lattice.is_numeric(type_id)
            || (self.lattice.is_subtype(type_id, types::OBJECT) && type_id != types::STRING);
        if allowed {
            Ok(())
        } else {
            Err(WalkError::CoercionError {
                type_name: self.lattice.name(type_id).to_string(),
            })
        }
    }

    fn condition(&mut self, node: &Node, scope: &Scope<TypeCell>) -> WalkResult<JavaValue> {
        let value = self.eval(node, scope)?;
        self.check_condition(value.type_id)?;
        Ok(value.value)
    }

    fn variable_declaration(
        &mut self,
        scope: &Scope<TypeCell>,
        name: &str,
        type_spec: &TypeSpec,
        value: Option<&Node>,
        is_static: bool,
        is_final: bool,
        access: Access,
    ) -> WalkResult<GenNode> {
        let declared = walk::resolve_spec(&self.lattice, type_spec)?;
        let value = match value {
            Some(node) => Some(self.eval(node, scope)?),
            None => None,
        };
        let type_id = match &value {
            Some(value) => walk::unify_named(&self.lattice, name, declared, value.type_id, false)?,
            None => declared,
        };
        let cell = self.declare(scope, name, type_id, false, is_static, is_final, access)?;
        match self.context {
            Context::Root => {
                self.current_class().fields.push(JavaVariable {
                    name: name.to_string(),
                    jtype: cell,
                    value: None,
                    is_static: true,
                    is_final,
                    access: Access::Public,
                });
                Ok(match value {
                    Some(value) => GenNode::Statement(JavaStatement::Expression(
                        JavaValue::Assignment {
                            target: name.to_string(),
                            value: Box::new(value.value),
                        },
                    )),
                    None => GenNode::None,
                })
            }
            Context::Class => {
                self.current_class().fields.push(JavaVariable {
                    name: name.to_string(),
                    jtype: cell,
                    value: value.map(|value| value.value),
                    is_static,
                    is_final,
                    access,
                });
                Ok(GenNode::None)
            }
            Context::Body => Ok(GenNode::Statement(JavaStatement::LocalDeclaration(
                JavaVariable {
                    name: name.to_string(),
                    jtype: cell,
                    value: value.map(|value| value.value),
                    is_static: false,
                    is_final,
                    access: Access::Package,
                },
            ))),
        }
    }

    fn operator_assignment(
        &mut self,
        variable: &Node,
        op: BinaryOp,
        value: &Node,
        scope: &Scope<TypeCell>,
    ) -> WalkResult<GenNode> {
        let target = self.target_path(variable)?;
        let record = self.resolve(&target, scope)?;
        let operand = self.eval(value, scope)?;
        if op == BinaryOp::Pow {
            // `x **= v` lowers to `x = Math.pow(x, v)` with a double
            // target.
            let new_type = walk::unify_named(
                &self.lattice,
                &target,
                record.type_id,
                types::DOUBLE,
                record.type_fixed,
            )?;
            self.widen(&target, new_type, scope);
            return Ok(GenNode::Operation(TypedValue {
                value: JavaValue::Assignment {
                    target: target.clone(),
                    value: Box::new(JavaValue::Call {
                        target: "Math.pow".to_string(),
                        args: vec![JavaValue::Identifier(target), operand.value],
                    }),
                },
                type_id: new_type,
            }));
        }
        let operator = compound_operator(op).ok_or_else(|| WalkError::UndefinedOperator {
            operator: op.symbol(),
            left: self.lattice.name(record.type_id).to_string(),
            right: self.lattice.name(operand.type_id).to_string(),
        })?;
        let new_type = walk::unify_compound(
            &self.lattice,
            &target,
            record.type_id,
            operand.type_id,
            record.type_fixed,
        )?;
        self.widen(&target, new_type, scope);
        Ok(GenNode::Operation(TypedValue {
            value: JavaValue::OperatorAssignment {
                target,
                operator,
                value: Box::new(operand.value),
            },
            type_id: new_type,
        }))
    }

    fn step(
        &mut self,
        variable: &Node,
        scope: &Scope<TypeCell>,
        build: impl FnOnce(String) -> JavaValue,
    ) -> WalkResult<GenNode> {
        let target = self.target_path(variable)?;
        let record = self.resolve(&target, scope)?;
        let new_type = walk::unify_compound(
            &self.lattice,
            &target,
            record.type_id,
            types::INT,
            record.type_fixed,
        )?;
        self.widen(&target, new_type, scope);
        Ok(GenNode::Operation(TypedValue {
            value: build(target),
            type_id: new_type,
        }))
    }

    fn function_declaration(
        &mut self,
        scope: &Scope<TypeCell>,
        name: &str,
        params: &[crate::ast::FunctionParameter],
        body: &crate::ast::Tree,
        is_static: bool,
        is_final: bool,
        access: Access,
        in_class: bool,
    ) -> WalkResult<GenNode> {
        self.declare(scope, name, types::OBJECT, true, is_static, is_final, access)?;
        let function_scope = scope.child();
        let mut lowered_params = Vec::with_capacity(params.len());
        for param in params {
            let declared = walk::resolve_spec(&self.lattice, &param.type_spec)?;
            let cell = self.declare(
                &function_scope,
                &param.name,
                declared,
                true,
                false,
                false,
                Access::Package,
            )?;
            lowered_params.push(JavaParameter {
                name: param.name.clone(),
                jtype: JavaType::Cell(cell),
            });
        }
        let body = self.walk_body(body, &function_scope)?;
        let function = JavaFunction {
            name: name.to_string(),
            params: lowered_params,
            return_type: "void",
            body,
            // Root-level functions hang off the unit class statically.
            is_static: is_static || !in_class,
            is_final,
            access,
        };
        self.current_class().functions.push(function);
        Ok(GenNode::None)
    }

    fn class_declaration(
        &mut self,
        scope: &Scope<TypeCell>,
        name: &str,
        fields: &[Node],
        methods: &[Node],
        classes: &[Node],
        is_static: bool,
        is_final: bool,
        access: Access,
    ) -> WalkResult<GenNode> {
        self.lattice.declare(name, &[types::OBJECT]);
        self.declare(scope, name, types::OBJECT, true, is_static, is_final, access)?;
        self.nested.push(JavaClass {
            name: name.to_string(),
            access,
            is_static,
            is_final,
            fields: Vec::new(),
            functions: Vec::new(),
            subclasses: Vec::new(),
        });
        let class_scope = scope.child();
        let saved = mem::replace(&mut self.context, Context::Class);
        let mut visit_members = || -> WalkResult<()> {
            for field in fields {
                self.visit(field, &class_scope)?;
            }
            for method in methods {
                self.visit(method, &class_scope)?;
            }
            for class in classes {
                self.visit(class, &class_scope)?;
            }
            Ok(())
        };
        let outcome = visit_members();
        self.context = saved;
        let class = self.nested.pop();
        outcome?;
        if let Some(class) = class {
            self.current_class().subclasses.push(class);
        }
        Ok(GenNode::None)
    }
}

impl Visitor for GeneratorWalk {
    type Output = GenNode;
    type Payload = TypeCell;

    fn visit(&mut self, node: &Node, scope: &Scope<TypeCell>) -> WalkResult<GenNode> {
        match node {
            Node::IntegerLiteral(value) => Ok(GenNode::Value(TypedValue {
                value: JavaValue::Integer(*value),
                type_id: types::INT,
            })),
            Node::DoubleLiteral(value) => Ok(GenNode::Value(TypedValue {
                value: JavaValue::Double(*value),
                type_id: types::DOUBLE,
            })),
            Node::StringLiteral(value) => Ok(GenNode::Value(TypedValue {
                value: JavaValue::String(value.clone()),
                type_id: types::STRING,
            })),
            Node::CharacterLiteral(value) => Ok(GenNode::Value(TypedValue {
                value: JavaValue::Character(*value),
                type_id: types::CHAR,
            })),
            Node::BooleanLiteral(value) => Ok(GenNode::Value(TypedValue {
                value: JavaValue::Boolean(*value),
                type_id: types::BOOLEAN,
            })),

            Node::Identifier { .. } => {
                let path = self.target_path(node)?;
                let record = self.resolve(&path, scope)?;
                Ok(GenNode::Value(TypedValue {
                    value: JavaValue::Identifier(path),
                    type_id: record.type_id,
                }))
            }

            Node::Binary { left, op, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                let type_id = binary_result_type(&self.lattice, *op, left.type_id, right.type_id)?;
                let value = if *op == BinaryOp::Pow {
                    JavaValue::Call {
                        target: "Math.pow".to_string(),
                        args: vec![left.value, right.value],
                    }
                } else {
                    JavaValue::Binary {
                        left: Box::new(left.value),
                        operator: op.symbol(),
                        right: Box::new(right.value),
                    }
                };
                Ok(GenNode::Value(TypedValue { value, type_id }))
            }

            Node::VariableDeclaration {
                name,
                type_spec,
                value,
                is_static,
                is_final,
                access,
            } => self.variable_declaration(
                scope,
                name,
                type_spec,
                value.as_deref(),
                *is_static,
                *is_final,
                *access,
            ),

            Node::Assignment { variable, value } => {
                let target = self.target_path(variable)?;
                let record = self.resolve(&target, scope)?;
                let value = self.eval(value, scope)?;
                let new_type = walk::unify_named(
                    &self.lattice,
                    &target,
                    record.type_id,
                    value.type_id,
                    record.type_fixed,
                )?;
                self.widen(&target, new_type, scope);
                Ok(GenNode::Operation(TypedValue {
                    value: JavaValue::Assignment {
                        target,
                        value: Box::new(value.value),
                    },
                    type_id: new_type,
                }))
            }

            Node::OperatorAssignment {
                variable,
                op,
                value,
            } => self.operator_assignment(variable, *op, value, scope),

            Node::Increment { variable } => {
                self.step(variable, scope, |target| JavaValue::Increment { target })
            }
            Node::Decrement { variable } => {
                self.step(variable, scope, |target| JavaValue::Decrement { target })
            }

            Node::If {
                condition,
                body,
                else_body,
            } => {
                let condition = self.condition(condition, scope)?;
                let body = self.walk_body(body, &scope.child())?;
                let else_body = match else_body {
                    Some(tree) => Some(self.walk_body(tree, &scope.child())?),
                    None => None,
                };
                Ok(GenNode::Statement(JavaStatement::If {
                    condition,
                    body,
                    else_body,
                }))
            }
            Node::While { condition, body } => {
                let condition = self.condition(condition, scope)?;
                let body = self.walk_body(body, &scope.child())?;
                Ok(GenNode::Statement(JavaStatement::While { condition, body }))
            }
            Node::DoWhile { condition, body } => {
                let body = self.walk_body(body, &scope.child())?;
                let condition = self.condition(condition, scope)?;
                Ok(GenNode::Statement(JavaStatement::DoWhile {
                    condition,
                    body,
                }))
            }
            Node::For {
                declaration,
                condition,
                round,
                body,
            } => {
                let loop_scope = scope.child();
                let saved = mem::replace(&mut self.context, Context::Body);
                let header = (|| -> WalkResult<(JavaStatement, JavaValue, TypedValue)> {
                    let init = match self.visit(declaration, &loop_scope)? {
                        GenNode::Statement(statement) => statement,
                        GenNode::Operation(value) => JavaStatement::Expression(value.value),
                        _ => {
                            return Err(WalkError::UnhandledNodeKind {
                                kind: declaration.kind_name(),
                            });
                        }
                    };
                    let condition = self.condition(condition, &loop_scope)?;
                    let round = self
                        .visit(round, &loop_scope)?
                        .into_value(round.kind_name())?;
                    Ok((init, condition, round))
                })();
                self.context = saved;
                let (init, condition, round) = header?;
                let body = self.walk_body(body, &loop_scope.child())?;
                Ok(GenNode::Statement(JavaStatement::For {
                    init: Box::new(init),
                    condition,
                    round: round.value,
                    body,
                }))
            }

            Node::FunctionDeclaration {
                name,
                params,
                body,
                is_static,
                is_final,
                access,
                in_class,
            } => self.function_declaration(
                scope, name, params, body, *is_static, *is_final, *access, *in_class,
            ),

            // Call targets are taken literally rather than resolved
            // through the symbol table, so calls to later declarations
            // lower fine.
            Node::FunctionCall { function, args } => {
                let target = self.target_path(function)?;
                let mut lowered = Vec::with_capacity(args.len());
                for arg in args {
                    lowered.push(self.eval(arg, scope)?.value);
                }
                Ok(GenNode::Operation(TypedValue {
                    value: JavaValue::Call {
                        target,
                        args: lowered,
                    },
                    type_id: types::UNKNOWN,
                }))
            }

            Node::ClassDeclaration {
                name,
                fields,
                methods,
                classes,
                is_static,
                is_final,
                access,
            } => self.class_declaration(
                scope, name, fields, methods, classes, *is_static, *is_final, *access,
            ),

            Node::ClassConstruction { class, args } => {
                let path = self.target_path(class)?;
                self.resolve(&path, scope)?;
                let type_id = self.lattice.lookup(&path).unwrap_or(types::UNKNOWN);
                let mut lowered = Vec::with_capacity(args.len());
                for arg in args {
                    lowered.push(self.eval(arg, scope)?.value);
                }
                Ok(GenNode::Value(TypedValue {
                    value: JavaValue::Construction {
                        class: path,
                        args: lowered,
                    },
                    type_id,
                }))
            }

            Node::Tree(tree) => Ok(GenNode::Statement(JavaStatement::Block(
                self.walk_body(tree, &scope.child())?,
            ))),
        }
    }

    fn is_bare_value(output: &GenNode) -> bool {
        matches!(output, GenNode::Value(_))
    }

    fn wrap_bare_value(&mut self, output: GenNode, _scope: &Scope<TypeCell>) -> WalkResult<GenNode> {
        let GenNode::Value(value) = output else {
            return Ok(output);
        };
        Ok(GenNode::Statement(JavaStatement::Expression(
            JavaValue::Call {
                target: "System.out.println".to_string(),
                args: vec![value.value],
            },
        )))
    }
}

/// Source-to-source backend: lowers a program to a Java compilation unit.
pub struct Generator {
    unit: String,
}

impl Generator {
    pub fn new(unit: impl Into<String>) -> Self {
        Self { unit: unit.into() }
    }
}

impl Backend for Generator {
    fn name(&self) -> &'static str {
        "generator"
    }

    fn run(&mut self, program: &Program) -> Result<String> {
        Ok(generate(program, &self.unit)?.render())
    }
}
