use std::{iter::Peekable, str::CharIndices};

use anyhow::{Result, anyhow, bail};

use crate::token::{Span, Token, TokenKind};

/// Character scanner for Shake source. Newlines are plain whitespace
/// (statement separation is handled by the parser), line comments start
/// with `//` and block comments with `/*`.
pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 0,
        }
    }

    pub fn next_token(&mut self) -> Result<Token<'a>> {
        self.skip_trivia()?;

        let (start_idx, ch) = match self.chars.peek() {
            Some(&(idx, c)) => (idx, c),
            None => {
                let index = self.input.len();
                return Ok(Token::new(
                    TokenKind::Eof,
                    Span {
                        start: index,
                        end: index,
                        line: self.line,
                        column: self.column,
                    },
                ));
            }
        };

        let start_line = self.line;
        let start_column = self.column;
        let span1 = Span {
            start: start_idx,
            end: start_idx + ch.len_utf8(),
            line: start_line,
            column: start_column,
        };

        match ch {
            '+' => Ok(self.operator(span1, TokenKind::Plus, &[('=', TokenKind::PlusAssign), ('+', TokenKind::Incr)])),
            '-' => Ok(self.operator(span1, TokenKind::Minus, &[('=', TokenKind::MinusAssign), ('-', TokenKind::Decr)])),
            '*' => Ok(self.star(span1)),
            '/' => Ok(self.operator(span1, TokenKind::Slash, &[('=', TokenKind::SlashAssign)])),
            '%' => Ok(self.operator(span1, TokenKind::Percent, &[('=', TokenKind::PercentAssign)])),
            '=' => Ok(self.operator(span1, TokenKind::Assign, &[('=', TokenKind::EqEquals)])),
            '<' => Ok(self.operator(span1, TokenKind::Smaller, &[('=', TokenKind::SmallerEq)])),
            '>' => Ok(self.operator(span1, TokenKind::Bigger, &[('=', TokenKind::BiggerEq)])),
            '^' => Ok(self.single(span1, TokenKind::LogicalXor)),
            '&' => self.pair(span1, '&', TokenKind::LogicalAnd),
            '|' => self.pair(span1, '|', TokenKind::LogicalOr),
            '(' => Ok(self.single(span1, TokenKind::LParen)),
            ')' => Ok(self.single(span1, TokenKind::RParen)),
            '{' => Ok(self.single(span1, TokenKind::LBrace)),
            '}' => Ok(self.single(span1, TokenKind::RBrace)),
            ',' => Ok(self.single(span1, TokenKind::Comma)),
            ';' => Ok(self.single(span1, TokenKind::Semicolon)),
            '.' => Ok(self.single(span1, TokenKind::Dot)),
            '"' => self.read_string(start_idx, start_line, start_column),
            '\'' => self.read_character(start_idx, start_line, start_column),
            c if c.is_alphabetic() || c == '_' => {
                Ok(self.read_identifier(start_idx, start_line, start_column))
            }
            c if c.is_ascii_digit() => self.read_number(start_idx, start_line, start_column),
            _ => Err(anyhow!(
                "Unexpected character '{}' at line {}, column {}",
                ch,
                start_line,
                start_column
            )),
        }
    }

    fn single(&mut self, span: Span, kind: TokenKind<'a>) -> Token<'a> {
        self.advance_char();
        Token::new(kind, span)
    }

    /// Consumes one character, then extends the token when the next
    /// character matches one of the given continuations.
    fn operator(
        &mut self,
        span: Span,
        kind: TokenKind<'a>,
        continuations: &[(char, TokenKind<'a>)],
    ) -> Token<'a> {
        self.advance_char();
        if let Some(&(idx, next)) = self.chars.peek()
            && let Some((_, extended)) = continuations.iter().find(|(c, _)| *c == next)
        {
            self.advance_char();
            return Token::new(
                extended.clone(),
                Span {
                    end: idx + next.len_utf8(),
                    ..span
                },
            );
        }
        Token::new(kind, span)
    }

    // `*`, `*=`, `**` and `**=` share a prefix, so `*` gets its own path.
    fn star(&mut self, span: Span) -> Token<'a> {
        self.advance_char();
        match self.chars.peek() {
            Some(&(idx, '=')) => {
                self.advance_char();
                Token::new(TokenKind::StarAssign, Span { end: idx + 1, ..span })
            }
            Some(&(_, '*')) => {
                self.advance_char();
                match self.chars.peek() {
                    Some(&(idx, '=')) => {
                        self.advance_char();
                        Token::new(TokenKind::PowAssign, Span { end: idx + 1, ..span })
                    }
                    Some(&(idx, _)) => Token::new(TokenKind::StarStar, Span { end: idx, ..span }),
                    None => Token::new(
                        TokenKind::StarStar,
                        Span {
                            end: self.input.len(),
                            ..span
                        },
                    ),
                }
            }
            _ => Token::new(TokenKind::Star, span),
        }
    }

    /// For operators like `&&` whose first character is not a token on its
    /// own.
    fn pair(&mut self, span: Span, second: char, kind: TokenKind<'a>) -> Result<Token<'a>> {
        self.advance_char();
        match self.chars.peek() {
            Some(&(idx, c)) if c == second => {
                self.advance_char();
                Ok(Token::new(kind, Span { end: idx + 1, ..span }))
            }
            _ => bail!(
                "Unexpected character '{}' at line {}, column {} (expected '{0}{0}')",
                second,
                span.line,
                span.column
            ),
        }
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.chars.peek() {
                Some(&(_, c)) if c.is_whitespace() => {
                    self.advance_char();
                }
                Some(&(idx, '/')) => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    match lookahead.peek() {
                        Some(&(_, '/')) => {
                            while let Some(&(_, c)) = self.chars.peek() {
                                if c == '\n' {
                                    break;
                                }
                                self.advance_char();
                            }
                        }
                        Some(&(_, '*')) => {
                            let (line, column) = (self.line, self.column);
                            self.advance_char();
                            self.advance_char();
                            self.skip_block_comment(idx, line, column)?;
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_block_comment(&mut self, _start: usize, line: usize, column: usize) -> Result<()> {
        while let Some((_, c)) = self.advance_char() {
            if c == '*'
                && let Some(&(_, '/')) = self.chars.peek()
            {
                self.advance_char();
                return Ok(());
            }
        }
        bail!("Unterminated block comment at line {line}, column {column}")
    }

    fn read_identifier(&mut self, start: usize, line: usize, column: usize) -> Token<'a> {
        self.advance_char();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance_char();
            } else {
                break;
            }
        }

        let end_idx = self.current_index();
        let ident = &self.input[start..end_idx];
        let kind = match ident {
            "var" => TokenKind::Var,
            "const" => TokenKind::Const,
            "dynamic" => TokenKind::Dynamic,
            "boolean" => TokenKind::Boolean,
            "char" => TokenKind::Char,
            "byte" => TokenKind::Byte,
            "short" => TokenKind::Short,
            "int" => TokenKind::Int,
            "long" => TokenKind::Long,
            "float" => TokenKind::Float,
            "double" => TokenKind::DoubleKeyword,
            "void" => TokenKind::Void,
            "function" => TokenKind::Function,
            "class" => TokenKind::Class,
            "new" => TokenKind::New,
            "static" => TokenKind::Static,
            "final" => TokenKind::Final,
            "public" => TokenKind::Public,
            "protected" => TokenKind::Protected,
            "private" => TokenKind::Private,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "for" => TokenKind::For,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => TokenKind::Identifier(ident),
        };
        Token::new(
            kind,
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        )
    }

    fn read_number(&mut self, start: usize, line: usize, column: usize) -> Result<Token<'a>> {
        self.advance_char();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.advance_char();
            } else {
                break;
            }
        }

        let mut is_double = false;
        if let Some(&(_, '.')) = self.chars.peek() {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            // A trailing `.` is member access on an integer, not a double.
            if lookahead.peek().is_some_and(|&(_, c)| c.is_ascii_digit()) {
                is_double = true;
                self.advance_char();
                while let Some(&(_, c)) = self.chars.peek() {
                    if c.is_ascii_digit() {
                        self.advance_char();
                    } else {
                        break;
                    }
                }
            }
        }

        let end_idx = self.current_index();
        let literal = &self.input[start..end_idx];
        let kind = if is_double {
            let value = literal.parse::<f64>().map_err(|_| {
                anyhow!("Invalid double literal '{literal}' at line {line}, column {column}")
            })?;
            TokenKind::Double(value)
        } else {
            let value = literal.parse::<i64>().map_err(|_| {
                anyhow!("Invalid integer literal '{literal}' at line {line}, column {column}")
            })?;
            TokenKind::Integer(value)
        };
        Ok(Token::new(
            kind,
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        ))
    }

    fn read_string(&mut self, start: usize, line: usize, column: usize) -> Result<Token<'a>> {
        self.advance_char();
        let mut content = String::new();
        while let Some((idx, c)) = self.advance_char() {
            match c {
                '"' => {
                    return Ok(Token::new(
                        TokenKind::String(content),
                        Span {
                            start,
                            end: idx + 1,
                            line,
                            column,
                        },
                    ));
                }
                '\n' => break,
                '\\' => content.push(self.read_escape(line, column)?),
                _ => content.push(c),
            }
        }
        bail!("Unterminated string literal at line {line}, column {column}")
    }

    fn read_character(&mut self, start: usize, line: usize, column: usize) -> Result<Token<'a>> {
        self.advance_char();
        let value = match self.advance_char() {
            Some((_, '\\')) => self.read_escape(line, column)?,
            Some((_, '\'')) | None => {
                bail!("Empty character literal at line {line}, column {column}")
            }
            Some((_, c)) => c,
        };
        match self.advance_char() {
            Some((idx, '\'')) => Ok(Token::new(
                TokenKind::Character(value),
                Span {
                    start,
                    end: idx + 1,
                    line,
                    column,
                },
            )),
            _ => bail!("Unterminated character literal at line {line}, column {column}"),
        }
    }

    fn read_escape(&mut self, line: usize, column: usize) -> Result<char> {
        match self.advance_char() {
            Some((_, 'n')) => Ok('\n'),
            Some((_, 't')) => Ok('\t'),
            Some((_, 'r')) => Ok('\r'),
            Some((_, '0')) => Ok('\0'),
            Some((_, '\\')) => Ok('\\'),
            Some((_, '"')) => Ok('"'),
            Some((_, '\'')) => Ok('\''),
            Some((_, c)) => bail!("Invalid escape '\\{c}' at line {line}, column {column}"),
            None => bail!("Unterminated escape at line {line}, column {column}"),
        }
    }

    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }
}

pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::Eof);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        tokenize(input)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn tokenizes_a_declaration_and_compound_assignment() {
        let input = indoc! {"
            var x = 1
            x += 2
            x
        "};
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Var,
                TokenKind::Identifier("x"),
                TokenKind::Assign,
                TokenKind::Integer(1),
                TokenKind::Identifier("x"),
                TokenKind::PlusAssign,
                TokenKind::Integer(2),
                TokenKind::Identifier("x"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn distinguishes_the_star_family() {
        assert_eq!(
            kinds("a * b ** c *= d **= e"),
            vec![
                TokenKind::Identifier("a"),
                TokenKind::Star,
                TokenKind::Identifier("b"),
                TokenKind::StarStar,
                TokenKind::Identifier("c"),
                TokenKind::StarAssign,
                TokenKind::Identifier("d"),
                TokenKind::PowAssign,
                TokenKind::Identifier("e"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn distinguishes_increment_from_plus_assign() {
        assert_eq!(
            kinds("i++ + j += 1"),
            vec![
                TokenKind::Identifier("i"),
                TokenKind::Incr,
                TokenKind::Plus,
                TokenKind::Identifier("j"),
                TokenKind::PlusAssign,
                TokenKind::Integer(1),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_number_literals() {
        assert_eq!(
            kinds("42 3.5 0.25"),
            vec![
                TokenKind::Integer(42),
                TokenKind::Double(3.5),
                TokenKind::Double(0.25),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_string_and_character_literals_with_escapes() {
        assert_eq!(
            kinds(r#""hello\nworld" '\t' 'a'"#),
            vec![
                TokenKind::String("hello\nworld".to_string()),
                TokenKind::Character('\t'),
                TokenKind::Character('a'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert_eq!(
            kinds("if elsewhere else"),
            vec![
                TokenKind::If,
                TokenKind::Identifier("elsewhere"),
                TokenKind::Else,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_comments() {
        let input = indoc! {"
            var x = 1 // trailing
            /* block
               spanning lines */ x
        "};
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Var,
                TokenKind::Identifier("x"),
                TokenKind::Assign,
                TokenKind::Integer(1),
                TokenKind::Identifier("x"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tracks_line_and_column() {
        let tokens = tokenize("var x\n  = 1").expect("tokenize should succeed");
        let spans: Vec<(usize, usize)> = tokens
            .iter()
            .map(|token| (token.span.line, token.span.column))
            .collect();
        assert_eq!(spans, vec![(1, 0), (1, 4), (2, 2), (2, 4), (2, 5)]);
    }

    #[test]
    fn errors_on_invalid_character() {
        let err = tokenize("x = 1 @ 2").expect_err("expected lexing failure");
        assert!(err.to_string().contains("Unexpected character '@'"));
    }

    #[test]
    fn errors_on_lone_ampersand() {
        let err = tokenize("a & b").expect_err("expected lexing failure");
        assert!(err.to_string().contains("expected '&&'"));
    }

    #[test]
    fn errors_on_unterminated_string() {
        let err = tokenize("\"open").expect_err("expected lexing failure");
        assert!(err.to_string().contains("Unterminated string literal"));
    }

    #[test]
    fn errors_on_integer_overflow() {
        let err = tokenize("99999999999999999999999999").expect_err("expected overflow");
        assert!(err.to_string().contains("Invalid integer literal"));
    }
}
