/// Declared type written in source, resolved against the type lattice
/// when the declaration is visited.
#[derive(Debug, PartialEq, Clone)]
pub enum TypeSpec {
    /// `var`/`const`/`dynamic`: the type is inferred from the first use.
    Dynamic,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Char,
    Void,
    Named(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
    Package,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    And,
    Or,
    Xor,
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Xor => "^",
            BinaryOp::Eq => "==",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow
        )
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunctionParameter {
    pub name: String,
    pub type_spec: TypeSpec,
}

/// Ordered sequence of statement nodes: a block body or the program root.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Tree {
    pub children: Vec<Node>,
}

impl Tree {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }
}

/// The closed node variant set shared by every backend. Each node owns its
/// children; a walk visits each node exactly once.
#[derive(Debug, PartialEq, Clone)]
pub enum Node {
    IntegerLiteral(i64),
    DoubleLiteral(f64),
    StringLiteral(String),
    CharacterLiteral(char),
    BooleanLiteral(bool),

    /// An identifier, optionally the member of a parent path (`a.b.c` is
    /// `c` with parent `b` with parent `a`). Only the path root is resolved
    /// through the scope chain.
    Identifier {
        name: String,
        parent: Option<Box<Node>>,
    },

    Binary {
        left: Box<Node>,
        op: BinaryOp,
        right: Box<Node>,
    },

    VariableDeclaration {
        name: String,
        type_spec: TypeSpec,
        value: Option<Box<Node>>,
        is_static: bool,
        is_final: bool,
        access: Access,
    },
    Assignment {
        variable: Box<Node>,
        value: Box<Node>,
    },
    /// `+=`, `-=`, `*=`, `/=`, `%=` and `**=`; `op` is the arithmetic part.
    OperatorAssignment {
        variable: Box<Node>,
        op: BinaryOp,
        value: Box<Node>,
    },
    Increment {
        variable: Box<Node>,
    },
    Decrement {
        variable: Box<Node>,
    },

    If {
        condition: Box<Node>,
        body: Tree,
        else_body: Option<Tree>,
    },
    While {
        condition: Box<Node>,
        body: Tree,
    },
    DoWhile {
        condition: Box<Node>,
        body: Tree,
    },
    For {
        declaration: Box<Node>,
        condition: Box<Node>,
        round: Box<Node>,
        body: Tree,
    },

    FunctionDeclaration {
        name: String,
        params: Vec<FunctionParameter>,
        body: Tree,
        is_static: bool,
        is_final: bool,
        access: Access,
        in_class: bool,
    },
    FunctionCall {
        function: Box<Node>,
        args: Vec<Node>,
    },

    ClassDeclaration {
        name: String,
        fields: Vec<Node>,
        methods: Vec<Node>,
        classes: Vec<Node>,
        is_static: bool,
        is_final: bool,
        access: Access,
    },
    ClassConstruction {
        class: Box<Node>,
        args: Vec<Node>,
    },

    Tree(Tree),
}

impl Node {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::IntegerLiteral(_) => "integer literal",
            Node::DoubleLiteral(_) => "double literal",
            Node::StringLiteral(_) => "string literal",
            Node::CharacterLiteral(_) => "character literal",
            Node::BooleanLiteral(_) => "boolean literal",
            Node::Identifier { .. } => "identifier",
            Node::Binary { .. } => "binary expression",
            Node::VariableDeclaration { .. } => "variable declaration",
            Node::Assignment { .. } => "assignment",
            Node::OperatorAssignment { .. } => "operator assignment",
            Node::Increment { .. } => "increment",
            Node::Decrement { .. } => "decrement",
            Node::If { .. } => "if statement",
            Node::While { .. } => "while loop",
            Node::DoWhile { .. } => "do-while loop",
            Node::For { .. } => "for loop",
            Node::FunctionDeclaration { .. } => "function declaration",
            Node::FunctionCall { .. } => "function call",
            Node::ClassDeclaration { .. } => "class declaration",
            Node::ClassConstruction { .. } => "class construction",
            Node::Tree(_) => "tree",
        }
    }

    /// The dotted path of an identifier node (`a.b.c`), used for the
    /// non-recursive member lookup the symbol table performs.
    pub fn dotted_path(&self) -> Option<String> {
        match self {
            Node::Identifier { name, parent: None } => Some(name.clone()),
            Node::Identifier {
                name,
                parent: Some(parent),
            } => parent.dotted_path().map(|p| format!("{p}.{name}")),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Program {
    pub tree: Tree,
}
