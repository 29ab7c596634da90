#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    Identifier(&'a str),
    Integer(i64),
    Double(f64),
    String(String),
    Character(char),
    True,
    False,

    // Declaration keywords
    Var,
    Const,
    Dynamic,
    Boolean,
    Char,
    Byte,
    Short,
    Int,
    Long,
    Float,
    DoubleKeyword,
    Void,
    Function,
    Class,
    New,

    // Modifier keywords
    Static,
    Final,
    Public,
    Protected,
    Private,

    // Control flow keywords
    If,
    Else,
    While,
    Do,
    For,

    // Operators
    Plus,          // +
    Minus,         // -
    Star,          // *
    Slash,         // /
    Percent,       // %
    StarStar,      // **
    LogicalAnd,    // &&
    LogicalOr,     // ||
    LogicalXor,    // ^
    EqEquals,      // ==
    Smaller,       // <
    SmallerEq,     // <=
    Bigger,        // >
    BiggerEq,      // >=
    Assign,        // =
    PlusAssign,    // +=
    MinusAssign,   // -=
    StarAssign,    // *=
    SlashAssign,   // /=
    PercentAssign, // %=
    PowAssign,     // **=
    Incr,          // ++
    Decr,          // --

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Dot,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind<'a>, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn kind(&self) -> &TokenKind<'a> {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }
}
