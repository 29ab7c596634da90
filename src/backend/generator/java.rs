use std::cell::Cell;
use std::rc::Rc;

use crate::ast::Access;
use crate::types::{self, TypeId, TypeLattice};

/// Renders a lattice type as a Java type name. Unknown and object both
/// surface as `Object`; everything else keeps its lattice name (the
/// primitives are already spelled like Java keywords, declared classes keep
/// their declared casing).
pub fn type_name(lattice: &TypeLattice, id: TypeId) -> String {
    if id == types::UNKNOWN || id == types::OBJECT {
        return "Object".to_string();
    }
    if id == types::STRING {
        return "String".to_string();
    }
    lattice.name(id).to_string()
}

/// A Java type position. Cells are shared with the symbol table, so a
/// widening assignment after the declaration still renders the widened
/// type.
#[derive(Debug, Clone)]
pub enum JavaType {
    Cell(Rc<Cell<TypeId>>),
    Raw(&'static str),
}

impl JavaType {
    fn render(&self, lattice: &TypeLattice) -> String {
        match self {
            JavaType::Cell(cell) => type_name(lattice, cell.get()),
            JavaType::Raw(text) => text.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum JavaValue {
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Character(char),
    String(String),
    /// A fully qualified identifier path, already joined with dots.
    Identifier(String),
    Binary {
        left: Box<JavaValue>,
        operator: &'static str,
        right: Box<JavaValue>,
    },
    Call {
        target: String,
        args: Vec<JavaValue>,
    },
    Construction {
        class: String,
        args: Vec<JavaValue>,
    },
    Assignment {
        target: String,
        value: Box<JavaValue>,
    },
    OperatorAssignment {
        target: String,
        operator: &'static str,
        value: Box<JavaValue>,
    },
    Increment {
        target: String,
    },
    Decrement {
        target: String,
    },
}

impl JavaValue {
    pub fn render(&self, lattice: &TypeLattice) -> String {
        match self {
            JavaValue::Integer(value) => value.to_string(),
            JavaValue::Double(value) => {
                if value.fract() == 0.0 && value.is_finite() {
                    format!("{value:.1}")
                } else {
                    value.to_string()
                }
            }
            JavaValue::Boolean(value) => value.to_string(),
            JavaValue::Character(value) => format!("'{}'", escape_char(*value)),
            JavaValue::String(value) => format!("\"{}\"", escape_string(value)),
            JavaValue::Identifier(path) => path.clone(),
            JavaValue::Binary {
                left,
                operator,
                right,
            } => format!(
                "{} {} {}",
                left.render_operand(lattice),
                operator,
                right.render_operand(lattice)
            ),
            JavaValue::Call { target, args } => {
                format!("{}({})", target, render_args(lattice, args))
            }
            JavaValue::Construction { class, args } => {
                format!("new {}({})", class, render_args(lattice, args))
            }
            JavaValue::Assignment { target, value } => {
                format!("{} = {}", target, value.render(lattice))
            }
            JavaValue::OperatorAssignment {
                target,
                operator,
                value,
            } => format!("{} {} {}", target, operator, value.render(lattice)),
            JavaValue::Increment { target } => format!("{target}++"),
            JavaValue::Decrement { target } => format!("{target}--"),
        }
    }

    /// Nested binaries get parenthesized; everything else is atomic enough.
    fn render_operand(&self, lattice: &TypeLattice) -> String {
        match self {
            JavaValue::Binary { .. } => format!("({})", self.render(lattice)),
            _ => self.render(lattice),
        }
    }
}

fn render_args(lattice: &TypeLattice, args: &[JavaValue]) -> String {
    args.iter()
        .map(|arg| arg.render(lattice))
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape_char(value: char) -> String {
    match value {
        '\n' => "\\n".to_string(),
        '\t' => "\\t".to_string(),
        '\r' => "\\r".to_string(),
        '\0' => "\\0".to_string(),
        '\\' => "\\\\".to_string(),
        '\'' => "\\'".to_string(),
        other => other.to_string(),
    }
}

fn escape_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            other => escaped.push(other),
        }
    }
    escaped
}

#[derive(Debug, Clone)]
pub struct JavaVariable {
    pub name: String,
    pub jtype: Rc<Cell<TypeId>>,
    pub value: Option<JavaValue>,
    pub is_static: bool,
    pub is_final: bool,
    pub access: Access,
}

#[derive(Debug, Clone)]
pub struct JavaParameter {
    pub name: String,
    pub jtype: JavaType,
}

#[derive(Debug, Clone)]
pub struct JavaFunction {
    pub name: String,
    pub params: Vec<JavaParameter>,
    pub return_type: &'static str,
    pub body: Vec<JavaStatement>,
    pub is_static: bool,
    pub is_final: bool,
    pub access: Access,
}

#[derive(Debug, Clone)]
pub struct JavaClass {
    pub name: String,
    pub access: Access,
    pub is_static: bool,
    pub is_final: bool,
    pub fields: Vec<JavaVariable>,
    pub functions: Vec<JavaFunction>,
    pub subclasses: Vec<JavaClass>,
}

impl JavaClass {
    pub fn new(name: impl Into<String>, access: Access) -> Self {
        Self {
            name: name.into(),
            access,
            is_static: false,
            is_final: false,
            fields: Vec::new(),
            functions: Vec::new(),
            subclasses: Vec::new(),
        }
    }

    pub fn render(&self, lattice: &TypeLattice) -> String {
        let mut out = String::new();
        self.render_at(lattice, 0, &mut out);
        out
    }

    fn render_at(&self, lattice: &TypeLattice, indent: usize, out: &mut String) {
        let pad = padding(indent);
        out.push_str(&format!(
            "{pad}{}{}{}class {} {{\n",
            access_prefix(self.access),
            flag(self.is_static, "static "),
            flag(self.is_final, "final "),
            self.name
        ));
        let mut separate = false;
        for field in &self.fields {
            field.render_field(lattice, indent + 1, out);
            separate = true;
        }
        for function in &self.functions {
            if separate {
                out.push('\n');
            }
            function.render_at(lattice, indent + 1, out);
            separate = true;
        }
        for subclass in &self.subclasses {
            if separate {
                out.push('\n');
            }
            subclass.render_at(lattice, indent + 1, out);
            separate = true;
        }
        out.push_str(&format!("{pad}}}\n"));
    }
}

impl JavaVariable {
    fn render_field(&self, lattice: &TypeLattice, indent: usize, out: &mut String) {
        out.push_str(&format!(
            "{}{}{}{}{} {}{};\n",
            padding(indent),
            access_prefix(self.access),
            flag(self.is_static, "static "),
            flag(self.is_final, "final "),
            type_name(lattice, self.jtype.get()),
            self.name,
            match &self.value {
                Some(value) => format!(" = {}", value.render(lattice)),
                None => String::new(),
            }
        ));
    }

    /// Local declarations carry no access or static modifiers.
    fn render_local(&self, lattice: &TypeLattice) -> String {
        format!(
            "{}{} {}{}",
            flag(self.is_final, "final "),
            type_name(lattice, self.jtype.get()),
            self.name,
            match &self.value {
                Some(value) => format!(" = {}", value.render(lattice)),
                None => String::new(),
            }
        )
    }
}

impl JavaFunction {
    fn render_at(&self, lattice: &TypeLattice, indent: usize, out: &mut String) {
        let pad = padding(indent);
        let params = self
            .params
            .iter()
            .map(|param| format!("{} {}", param.jtype.render(lattice), param.name))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(
            "{pad}{}{}{}{} {}({}) {{\n",
            access_prefix(self.access),
            flag(self.is_static, "static "),
            flag(self.is_final, "final "),
            self.return_type,
            self.name,
            params
        ));
        for statement in &self.body {
            statement.render_at(lattice, indent + 1, out);
        }
        out.push_str(&format!("{pad}}}\n"));
    }
}

#[derive(Debug, Clone)]
pub enum JavaStatement {
    Expression(JavaValue),
    LocalDeclaration(JavaVariable),
    If {
        condition: JavaValue,
        body: Vec<JavaStatement>,
        else_body: Option<Vec<JavaStatement>>,
    },
    While {
        condition: JavaValue,
        body: Vec<JavaStatement>,
    },
    DoWhile {
        condition: JavaValue,
        body: Vec<JavaStatement>,
    },
    For {
        init: Box<JavaStatement>,
        condition: JavaValue,
        round: JavaValue,
        body: Vec<JavaStatement>,
    },
    Block(Vec<JavaStatement>),
}

impl JavaStatement {
    fn render_at(&self, lattice: &TypeLattice, indent: usize, out: &mut String) {
        let pad = padding(indent);
        match self {
            JavaStatement::Expression(value) => {
                out.push_str(&format!("{pad}{};\n", value.render(lattice)));
            }
            JavaStatement::LocalDeclaration(variable) => {
                out.push_str(&format!("{pad}{};\n", variable.render_local(lattice)));
            }
            JavaStatement::If {
                condition,
                body,
                else_body,
            } => {
                out.push_str(&format!("{pad}if ({}) {{\n", condition.render(lattice)));
                render_block(lattice, body, indent, out);
                if let Some(else_body) = else_body {
                    out.push_str(&format!("{pad}}} else {{\n"));
                    render_block(lattice, else_body, indent, out);
                }
                out.push_str(&format!("{pad}}}\n"));
            }
            JavaStatement::While { condition, body } => {
                out.push_str(&format!("{pad}while ({}) {{\n", condition.render(lattice)));
                render_block(lattice, body, indent, out);
                out.push_str(&format!("{pad}}}\n"));
            }
            JavaStatement::DoWhile { condition, body } => {
                out.push_str(&format!("{pad}do {{\n"));
                render_block(lattice, body, indent, out);
                out.push_str(&format!("{pad}}} while ({});\n", condition.render(lattice)));
            }
            JavaStatement::For {
                init,
                condition,
                round,
                body,
            } => {
                out.push_str(&format!(
                    "{pad}for ({}; {}; {}) {{\n",
                    init.render_inline(lattice),
                    condition.render(lattice),
                    round.render(lattice)
                ));
                render_block(lattice, body, indent, out);
                out.push_str(&format!("{pad}}}\n"));
            }
            JavaStatement::Block(body) => {
                out.push_str(&format!("{pad}{{\n"));
                render_block(lattice, body, indent, out);
                out.push_str(&format!("{pad}}}\n"));
            }
        }
    }

    /// Statement text without indentation or the trailing semicolon, for
    /// the `for` header.
    fn render_inline(&self, lattice: &TypeLattice) -> String {
        match self {
            JavaStatement::Expression(value) => value.render(lattice),
            JavaStatement::LocalDeclaration(variable) => variable.render_local(lattice),
            other => {
                let mut out = String::new();
                other.render_at(lattice, 0, &mut out);
                out.trim_end().to_string()
            }
        }
    }
}

fn render_block(
    lattice: &TypeLattice,
    body: &[JavaStatement],
    indent: usize,
    out: &mut String,
) {
    for statement in body {
        statement.render_at(lattice, indent + 1, out);
    }
}

fn padding(indent: usize) -> String {
    "    ".repeat(indent)
}

fn access_prefix(access: Access) -> &'static str {
    match access {
        Access::Public => "public ",
        Access::Protected => "protected ",
        Access::Package => "",
        Access::Private => "private ",
    }
}

fn flag(enabled: bool, text: &'static str) -> &'static str {
    if enabled { text } else { "" }
}
