use anyhow::{Result, bail};

use crate::ast::{Access, BinaryOp, FunctionParameter, Node, Program, Tree, TypeSpec};
use crate::lexer::tokenize;
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, Copy, Default)]
struct Modifiers {
    access: Option<Access>,
    is_static: bool,
    is_final: bool,
}

pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token<'a>>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse_program(mut self) -> Result<Program> {
        let tree = self.parse_statements_until(TokenKind::Eof)?;
        Ok(Program { tree })
    }

    fn parse_statements_until(&mut self, end: TokenKind<'static>) -> Result<Tree> {
        let mut children = Vec::new();
        while self.kind() != &end {
            if self.kind() == &TokenKind::Semicolon {
                self.advance();
                continue;
            }
            children.push(self.parse_statement()?);
        }
        Ok(Tree::new(children))
    }

    fn parse_statement(&mut self) -> Result<Node> {
        match self.kind() {
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::LBrace => Ok(Node::Tree(self.parse_block()?)),
            kind if is_declaration_start(kind) => self.parse_declaration(false),
            _ => self.parse_expression_statement(),
        }
    }

    /// Expression statements cover assignments too: the left-hand side is
    /// parsed as an ordinary expression and the statement kind is decided
    /// by the operator that follows it.
    fn parse_expression_statement(&mut self) -> Result<Node> {
        let expr = self.parse_expression()?;
        let node = match self.kind() {
            TokenKind::Assign => {
                self.advance();
                Node::Assignment {
                    variable: Box::new(expr),
                    value: Box::new(self.parse_expression()?),
                }
            }
            TokenKind::PlusAssign => self.operator_assignment(expr, BinaryOp::Add)?,
            TokenKind::MinusAssign => self.operator_assignment(expr, BinaryOp::Sub)?,
            TokenKind::StarAssign => self.operator_assignment(expr, BinaryOp::Mul)?,
            TokenKind::SlashAssign => self.operator_assignment(expr, BinaryOp::Div)?,
            TokenKind::PercentAssign => self.operator_assignment(expr, BinaryOp::Mod)?,
            TokenKind::PowAssign => self.operator_assignment(expr, BinaryOp::Pow)?,
            TokenKind::Incr => {
                self.advance();
                Node::Increment {
                    variable: Box::new(expr),
                }
            }
            TokenKind::Decr => {
                self.advance();
                Node::Decrement {
                    variable: Box::new(expr),
                }
            }
            _ => expr,
        };
        if self.kind() == &TokenKind::Semicolon {
            self.advance();
        }
        Ok(node)
    }

    fn operator_assignment(&mut self, variable: Node, op: BinaryOp) -> Result<Node> {
        self.advance();
        Ok(Node::OperatorAssignment {
            variable: Box::new(variable),
            op,
            value: Box::new(self.parse_expression()?),
        })
    }

    fn parse_declaration(&mut self, in_class: bool) -> Result<Node> {
        let modifiers = self.parse_modifiers()?;
        match self.kind() {
            TokenKind::Function => self.parse_function(modifiers, in_class),
            TokenKind::Class => self.parse_class(modifiers),
            _ => self.parse_variable_declaration(modifiers),
        }
    }

    fn parse_modifiers(&mut self) -> Result<Modifiers> {
        let mut modifiers = Modifiers::default();
        loop {
            let access = match self.kind() {
                TokenKind::Public => Some(Access::Public),
                TokenKind::Protected => Some(Access::Protected),
                TokenKind::Private => Some(Access::Private),
                TokenKind::Static => {
                    if modifiers.is_static {
                        bail!("Duplicate modifier 'static' at {}", self.position());
                    }
                    modifiers.is_static = true;
                    self.advance();
                    continue;
                }
                TokenKind::Final => {
                    if modifiers.is_final {
                        bail!("Duplicate modifier 'final' at {}", self.position());
                    }
                    modifiers.is_final = true;
                    self.advance();
                    continue;
                }
                _ => return Ok(modifiers),
            };
            if modifiers.access.is_some() {
                bail!("Duplicate access modifier at {}", self.position());
            }
            modifiers.access = access;
            self.advance();
        }
    }

    fn parse_variable_declaration(&mut self, modifiers: Modifiers) -> Result<Node> {
        let (type_spec, is_const) = match self.kind() {
            TokenKind::Var | TokenKind::Dynamic => (TypeSpec::Dynamic, false),
            TokenKind::Const => (TypeSpec::Dynamic, true),
            TokenKind::Boolean => (TypeSpec::Boolean, false),
            TokenKind::Char => (TypeSpec::Char, false),
            TokenKind::Byte => (TypeSpec::Byte, false),
            TokenKind::Short => (TypeSpec::Short, false),
            TokenKind::Int => (TypeSpec::Int, false),
            TokenKind::Long => (TypeSpec::Long, false),
            TokenKind::Float => (TypeSpec::Float, false),
            TokenKind::DoubleKeyword => (TypeSpec::Double, false),
            _ => return Err(self.error("declaration keyword")),
        };
        self.advance();
        let name = self.expect_identifier()?;
        let value = if self.kind() == &TokenKind::Assign {
            self.advance();
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        if self.kind() == &TokenKind::Semicolon {
            self.advance();
        }
        Ok(Node::VariableDeclaration {
            name,
            type_spec,
            value,
            is_static: modifiers.is_static,
            is_final: modifiers.is_final || is_const,
            access: modifiers.access.unwrap_or(Access::Package),
        })
    }

    fn parse_function(&mut self, modifiers: Modifiers, in_class: bool) -> Result<Node> {
        self.expect(TokenKind::Function, "'function'")?;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        while self.kind() != &TokenKind::RParen {
            if !params.is_empty() {
                self.expect(TokenKind::Comma, "','")?;
            }
            params.push(self.parse_parameter()?);
        }
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.parse_block()?;
        Ok(Node::FunctionDeclaration {
            name,
            params,
            body,
            is_static: modifiers.is_static,
            is_final: modifiers.is_final,
            access: modifiers.access.unwrap_or(Access::Package),
            in_class,
        })
    }

    fn parse_parameter(&mut self) -> Result<FunctionParameter> {
        let type_spec = match self.kind() {
            TokenKind::Boolean => Some(TypeSpec::Boolean),
            TokenKind::Char => Some(TypeSpec::Char),
            TokenKind::Byte => Some(TypeSpec::Byte),
            TokenKind::Short => Some(TypeSpec::Short),
            TokenKind::Int => Some(TypeSpec::Int),
            TokenKind::Long => Some(TypeSpec::Long),
            TokenKind::Float => Some(TypeSpec::Float),
            TokenKind::DoubleKeyword => Some(TypeSpec::Double),
            TokenKind::Dynamic => Some(TypeSpec::Dynamic),
            // `Type name` with a named type needs one token of lookahead.
            TokenKind::Identifier(type_name)
                if matches!(self.peek_kind(), TokenKind::Identifier(_)) =>
            {
                Some(TypeSpec::Named(type_name.to_string()))
            }
            _ => None,
        };
        if type_spec.is_some() {
            self.advance();
        }
        let name = self.expect_identifier()?;
        Ok(FunctionParameter {
            name,
            type_spec: type_spec.unwrap_or(TypeSpec::Dynamic),
        })
    }

    fn parse_class(&mut self, modifiers: Modifiers) -> Result<Node> {
        self.expect(TokenKind::Class, "'class'")?;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut classes = Vec::new();
        while self.kind() != &TokenKind::RBrace {
            if self.kind() == &TokenKind::Semicolon {
                self.advance();
                continue;
            }
            let member = self.parse_declaration(true)?;
            match &member {
                Node::VariableDeclaration { .. } => fields.push(member),
                Node::FunctionDeclaration { .. } => methods.push(member),
                Node::ClassDeclaration { .. } => classes.push(member),
                _ => bail!("Unexpected class member at {}", self.position()),
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Node::ClassDeclaration {
            name,
            fields,
            methods,
            classes,
            is_static: modifiers.is_static,
            is_final: modifiers.is_final,
            access: modifiers.access.unwrap_or(Access::Package),
        })
    }

    fn parse_if(&mut self) -> Result<Node> {
        self.expect(TokenKind::If, "'if'")?;
        let condition = self.parse_parenthesized_condition()?;
        let body = self.parse_body()?;
        let else_body = if self.kind() == &TokenKind::Else {
            self.advance();
            Some(self.parse_body()?)
        } else {
            None
        };
        Ok(Node::If {
            condition: Box::new(condition),
            body,
            else_body,
        })
    }

    fn parse_while(&mut self) -> Result<Node> {
        self.expect(TokenKind::While, "'while'")?;
        let condition = self.parse_parenthesized_condition()?;
        let body = self.parse_body()?;
        Ok(Node::While {
            condition: Box::new(condition),
            body,
        })
    }

    fn parse_do_while(&mut self) -> Result<Node> {
        self.expect(TokenKind::Do, "'do'")?;
        let body = self.parse_body()?;
        self.expect(TokenKind::While, "'while'")?;
        let condition = self.parse_parenthesized_condition()?;
        if self.kind() == &TokenKind::Semicolon {
            self.advance();
        }
        Ok(Node::DoWhile {
            condition: Box::new(condition),
            body,
        })
    }

    fn parse_for(&mut self) -> Result<Node> {
        self.expect(TokenKind::For, "'for'")?;
        self.expect(TokenKind::LParen, "'('")?;
        let declaration = if is_declaration_start(self.kind()) {
            self.parse_declaration(false)?
        } else {
            self.parse_expression_statement()?
        };
        // The declaration branches consume an optional `;` themselves.
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Semicolon, "';'")?;
        let round = self.parse_expression_statement()?;
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.parse_body()?;
        Ok(Node::For {
            declaration: Box::new(declaration),
            condition: Box::new(condition),
            round: Box::new(round),
            body,
        })
    }

    fn parse_parenthesized_condition(&mut self) -> Result<Node> {
        self.expect(TokenKind::LParen, "'('")?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RParen, "')'")?;
        Ok(condition)
    }

    fn parse_block(&mut self) -> Result<Tree> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let tree = self.parse_statements_until(TokenKind::RBrace)?;
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(tree)
    }

    /// A control-flow body: either a braced block or a single statement.
    fn parse_body(&mut self) -> Result<Tree> {
        if self.kind() == &TokenKind::LBrace {
            self.parse_block()
        } else {
            Ok(Tree::new(vec![self.parse_statement()?]))
        }
    }

    fn parse_expression(&mut self) -> Result<Node> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Node> {
        let mut left = self.parse_xor()?;
        while self.kind() == &TokenKind::LogicalOr {
            self.advance();
            left = binary(left, BinaryOp::Or, self.parse_xor()?);
        }
        Ok(left)
    }

    fn parse_xor(&mut self) -> Result<Node> {
        let mut left = self.parse_and()?;
        while self.kind() == &TokenKind::LogicalXor {
            self.advance();
            left = binary(left, BinaryOp::Xor, self.parse_and()?);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node> {
        let mut left = self.parse_comparison()?;
        while self.kind() == &TokenKind::LogicalAnd {
            self.advance();
            left = binary(left, BinaryOp::And, self.parse_comparison()?);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Node> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.kind() {
                TokenKind::EqEquals => BinaryOp::Eq,
                TokenKind::Smaller => BinaryOp::Lt,
                TokenKind::SmallerEq => BinaryOp::Le,
                TokenKind::Bigger => BinaryOp::Gt,
                TokenKind::BiggerEq => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.advance();
            left = binary(left, op, self.parse_additive()?);
        }
    }

    fn parse_additive(&mut self) -> Result<Node> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            left = binary(left, op, self.parse_multiplicative()?);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Node> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            left = binary(left, op, self.parse_power()?);
        }
    }

    // Right-associative: `2 ** 3 ** 2` is `2 ** (3 ** 2)`.
    fn parse_power(&mut self) -> Result<Node> {
        let base = self.parse_unary()?;
        if self.kind() == &TokenKind::StarStar {
            self.advance();
            let exponent = self.parse_power()?;
            return Ok(binary(base, BinaryOp::Pow, exponent));
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<Node> {
        if self.kind() == &TokenKind::Minus {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(match operand {
                Node::IntegerLiteral(value) => Node::IntegerLiteral(-value),
                Node::DoubleLiteral(value) => Node::DoubleLiteral(-value),
                other => binary(Node::IntegerLiteral(0), BinaryOp::Sub, other),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Node> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_identifier()?;
                    expr = Node::Identifier {
                        name,
                        parent: Some(Box::new(expr)),
                    };
                }
                TokenKind::LParen => {
                    let args = self.parse_arguments()?;
                    expr = Node::FunctionCall {
                        function: Box::new(expr),
                        args,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Node>> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        while self.kind() != &TokenKind::RParen {
            if !args.is_empty() {
                self.expect(TokenKind::Comma, "','")?;
            }
            args.push(self.parse_expression()?);
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Node> {
        match self.kind().clone() {
            TokenKind::Integer(value) => {
                self.advance();
                Ok(Node::IntegerLiteral(value))
            }
            TokenKind::Double(value) => {
                self.advance();
                Ok(Node::DoubleLiteral(value))
            }
            TokenKind::String(value) => {
                self.advance();
                Ok(Node::StringLiteral(value))
            }
            TokenKind::Character(value) => {
                self.advance();
                Ok(Node::CharacterLiteral(value))
            }
            TokenKind::True => {
                self.advance();
                Ok(Node::BooleanLiteral(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Node::BooleanLiteral(false))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Node::Identifier {
                    name: name.to_string(),
                    parent: None,
                })
            }
            TokenKind::New => {
                self.advance();
                let mut class = Node::Identifier {
                    name: self.expect_identifier()?,
                    parent: None,
                };
                while self.kind() == &TokenKind::Dot {
                    self.advance();
                    class = Node::Identifier {
                        name: self.expect_identifier()?,
                        parent: Some(Box::new(class)),
                    };
                }
                let args = self.parse_arguments()?;
                Ok(Node::ClassConstruction {
                    class: Box::new(class),
                    args,
                })
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            _ => Err(self.error("expression")),
        }
    }

    fn kind(&self) -> &TokenKind<'a> {
        self.tokens[self.pos].kind()
    }

    fn peek_kind(&self) -> &TokenKind<'a> {
        // The token stream always ends with Eof, so peeking past the last
        // real token is safe.
        self.tokens[(self.pos + 1).min(self.tokens.len() - 1)].kind()
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, kind: TokenKind<'static>, what: &str) -> Result<()> {
        if self.kind() == &kind {
            self.advance();
            Ok(())
        } else {
            Err(self.error(what))
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        if let TokenKind::Identifier(name) = self.kind() {
            let name = name.to_string();
            self.advance();
            Ok(name)
        } else {
            Err(self.error("identifier"))
        }
    }

    fn position(&self) -> String {
        let span = self.tokens[self.pos].span();
        format!("line {}, column {}", span.line, span.column)
    }

    fn error(&self, expected: &str) -> anyhow::Error {
        anyhow::anyhow!(
            "Expected {expected}, got {:?} at {}",
            self.kind(),
            self.position()
        )
    }
}

fn binary(left: Node, op: BinaryOp, right: Node) -> Node {
    Node::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

fn is_declaration_start(kind: &TokenKind<'_>) -> bool {
    matches!(
        kind,
        TokenKind::Var
            | TokenKind::Const
            | TokenKind::Dynamic
            | TokenKind::Boolean
            | TokenKind::Char
            | TokenKind::Byte
            | TokenKind::Short
            | TokenKind::Int
            | TokenKind::Long
            | TokenKind::Float
            | TokenKind::DoubleKeyword
            | TokenKind::Function
            | TokenKind::Class
            | TokenKind::Static
            | TokenKind::Final
            | TokenKind::Public
            | TokenKind::Protected
            | TokenKind::Private
    )
}

pub fn parse(input: &str) -> Result<Program> {
    Parser::new(tokenize(input)?).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn ident(name: &str) -> Node {
        Node::Identifier {
            name: name.to_string(),
            parent: None,
        }
    }

    #[test]
    fn parses_declaration_compound_assignment_and_bare_expression() {
        let input = indoc! {"
            var x = 1
            x += 2
            x
        "};
        let program = parse(input).expect("parse failed");
        assert_eq!(
            program.tree.children,
            vec![
                Node::VariableDeclaration {
                    name: "x".to_string(),
                    type_spec: TypeSpec::Dynamic,
                    value: Some(Box::new(Node::IntegerLiteral(1))),
                    is_static: false,
                    is_final: false,
                    access: Access::Package,
                },
                Node::OperatorAssignment {
                    variable: Box::new(ident("x")),
                    op: BinaryOp::Add,
                    value: Box::new(Node::IntegerLiteral(2)),
                },
                ident("x"),
            ]
        );
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let program = parse("1 + 2 * 3").expect("parse failed");
        assert_eq!(
            program.tree.children,
            vec![binary(
                Node::IntegerLiteral(1),
                BinaryOp::Add,
                binary(Node::IntegerLiteral(2), BinaryOp::Mul, Node::IntegerLiteral(3)),
            )]
        );
    }

    #[test]
    fn power_is_right_associative() {
        let program = parse("2 ** 3 ** 2").expect("parse failed");
        assert_eq!(
            program.tree.children,
            vec![binary(
                Node::IntegerLiteral(2),
                BinaryOp::Pow,
                binary(Node::IntegerLiteral(3), BinaryOp::Pow, Node::IntegerLiteral(2)),
            )]
        );
    }

    #[test]
    fn logical_or_binds_loosest() {
        let program = parse("a && b || c ^ d").expect("parse failed");
        assert_eq!(
            program.tree.children,
            vec![binary(
                binary(ident("a"), BinaryOp::And, ident("b")),
                BinaryOp::Or,
                binary(ident("c"), BinaryOp::Xor, ident("d")),
            )]
        );
    }

    #[test]
    fn unary_minus_folds_into_literals() {
        let program = parse("-3 + -2.5").expect("parse failed");
        assert_eq!(
            program.tree.children,
            vec![binary(
                Node::IntegerLiteral(-3),
                BinaryOp::Add,
                Node::DoubleLiteral(-2.5),
            )]
        );
    }

    #[test]
    fn dotted_identifiers_nest_towards_the_root() {
        let program = parse("a.b.c").expect("parse failed");
        assert_eq!(
            program.tree.children,
            vec![Node::Identifier {
                name: "c".to_string(),
                parent: Some(Box::new(Node::Identifier {
                    name: "b".to_string(),
                    parent: Some(Box::new(ident("a"))),
                })),
            }]
        );
    }

    #[test]
    fn parses_typed_declaration_with_modifiers() {
        let program = parse("public static final int counter = 0;").expect("parse failed");
        assert_eq!(
            program.tree.children,
            vec![Node::VariableDeclaration {
                name: "counter".to_string(),
                type_spec: TypeSpec::Int,
                value: Some(Box::new(Node::IntegerLiteral(0))),
                is_static: true,
                is_final: true,
                access: Access::Public,
            }]
        );
    }

    #[test]
    fn const_declarations_are_final() {
        let program = parse("const answer = 42").expect("parse failed");
        match &program.tree.children[0] {
            Node::VariableDeclaration { is_final, .. } => assert!(is_final),
            other => panic!("expected a variable declaration, got {other:?}"),
        }
    }

    #[test]
    fn parses_function_with_typed_parameters() {
        let input = indoc! {"
            function add(int a, b) {
                a + b
            }
        "};
        let program = parse(input).expect("parse failed");
        match &program.tree.children[0] {
            Node::FunctionDeclaration {
                name,
                params,
                in_class,
                ..
            } => {
                assert_eq!(name, "add");
                assert_eq!(
                    params,
                    &vec![
                        FunctionParameter {
                            name: "a".to_string(),
                            type_spec: TypeSpec::Int,
                        },
                        FunctionParameter {
                            name: "b".to_string(),
                            type_spec: TypeSpec::Dynamic,
                        },
                    ]
                );
                assert!(!in_class);
            }
            other => panic!("expected a function declaration, got {other:?}"),
        }
    }

    #[test]
    fn class_members_are_partitioned() {
        let input = indoc! {"
            class Point {
                var x = 0
                var y = 0
                function reset() {
                    x = 0
                }
            }
        "};
        let program = parse(input).expect("parse failed");
        match &program.tree.children[0] {
            Node::ClassDeclaration {
                name,
                fields,
                methods,
                classes,
                ..
            } => {
                assert_eq!(name, "Point");
                assert_eq!(fields.len(), 2);
                assert_eq!(methods.len(), 1);
                assert!(classes.is_empty());
                match &methods[0] {
                    Node::FunctionDeclaration { in_class, .. } => assert!(in_class),
                    other => panic!("expected a method, got {other:?}"),
                }
            }
            other => panic!("expected a class declaration, got {other:?}"),
        }
    }

    #[test]
    fn parses_for_loop() {
        let input = "for (var i = 0; i < 10; i++) { i }";
        let program = parse(input).expect("parse failed");
        match &program.tree.children[0] {
            Node::For {
                declaration,
                condition,
                round,
                body,
            } => {
                assert!(matches!(**declaration, Node::VariableDeclaration { .. }));
                assert!(matches!(**condition, Node::Binary { .. }));
                assert!(matches!(**round, Node::Increment { .. }));
                assert_eq!(body.children.len(), 1);
            }
            other => panic!("expected a for loop, got {other:?}"),
        }
    }

    #[test]
    fn if_without_braces_takes_a_single_statement() {
        let program = parse("if (a) b else c").expect("parse failed");
        match &program.tree.children[0] {
            Node::If {
                body, else_body, ..
            } => {
                assert_eq!(body.children, vec![ident("b")]);
                assert_eq!(
                    else_body.as_ref().map(|tree| tree.children.clone()),
                    Some(vec![ident("c")])
                );
            }
            other => panic!("expected an if statement, got {other:?}"),
        }
    }

    #[test]
    fn parses_class_construction_with_member_access() {
        let program = parse("var p = new geometry.Point()").expect("parse failed");
        match &program.tree.children[0] {
            Node::VariableDeclaration { value, .. } => match value.as_deref() {
                Some(Node::ClassConstruction { class, args }) => {
                    assert_eq!(class.dotted_path(), Some("geometry.Point".to_string()));
                    assert!(args.is_empty());
                }
                other => panic!("expected a construction, got {other:?}"),
            },
            other => panic!("expected a variable declaration, got {other:?}"),
        }
    }

    #[test]
    fn assignment_target_can_be_dotted() {
        let program = parse("p.x = 3").expect("parse failed");
        match &program.tree.children[0] {
            Node::Assignment { variable, .. } => {
                assert_eq!(variable.dotted_path(), Some("p.x".to_string()));
            }
            other => panic!("expected an assignment, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unbalanced_braces() {
        let err = parse("if (a) { b").expect_err("expected parse failure");
        assert!(err.to_string().contains("Expected"));
    }

    #[test]
    fn rejects_missing_condition_parens() {
        let err = parse("while a { b }").expect_err("expected parse failure");
        assert!(err.to_string().contains("Expected '('"));
    }
}
