use std::ops::Range;

use crate::error::ReplError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Int(i64),
    Double(f64),
    Str(String),
    True,
    False,

    Ident(String),

    // Keywords
    Val,
    Var,
    Def,
    If,
    Else,
    While,
    Throw,
    New,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,       // =
    EqEq,     // ==
    BangEq,   // !=
    Gt,
    Lt,
    GtEq,
    LtEq,
    AmpAmp,   // &&
    PipePipe, // ||
    Bang,     // !
    Colon,
    Comma,
    Dot,
    Semi,

    // Grouping
    LParen,
    RParen,
    LBrace,
    RBrace,

    /// Statement-ending line break.
    Newline,
    Eof,
}

impl TokenKind {
    /// How the token reads in "expected X but Y found" messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Int(n) => format!("integer literal {}", n),
            TokenKind::Double(n) => format!("double literal {}", n),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Ident(name) => format!("identifier {}", name),
            TokenKind::Newline => "newline".to_string(),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Val => "val",
            TokenKind::Var => "var",
            TokenKind::Def => "def",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Throw => "throw",
            TokenKind::New => "new",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Eq => "=",
            TokenKind::EqEq => "==",
            TokenKind::BangEq => "!=",
            TokenKind::Gt => ">",
            TokenKind::Lt => "<",
            TokenKind::GtEq => ">=",
            TokenKind::LtEq => "<=",
            TokenKind::AmpAmp => "&&",
            TokenKind::PipePipe => "||",
            TokenKind::Bang => "!",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Semi => ";",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            _ => "?",
        }
    }

    /// Tokens after which a line break cannot end a statement.
    fn continues_line(&self) -> bool {
        matches!(
            self,
            TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Percent
                | TokenKind::Eq
                | TokenKind::EqEq
                | TokenKind::BangEq
                | TokenKind::Gt
                | TokenKind::Lt
                | TokenKind::GtEq
                | TokenKind::LtEq
                | TokenKind::AmpAmp
                | TokenKind::PipePipe
                | TokenKind::Bang
                | TokenKind::Colon
                | TokenKind::Comma
                | TokenKind::Dot
                | TokenKind::LParen
                | TokenKind::LBrace
                | TokenKind::Else
                | TokenKind::Newline
                | TokenKind::Semi
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte span within the segment.
    pub span: Range<usize>,
}

/// Split a segment into tokens, ending with `Eof`.
///
/// Line breaks become `Newline` tokens only where they can end a statement:
/// not inside parentheses, not after an operator and not before `.` or
/// `else`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ReplError> {
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();

    // Map character indices to byte offsets
    let byte_pos: Vec<usize> = {
        let mut bp = Vec::with_capacity(len + 1);
        let mut offset = 0;
        for c in &chars {
            bp.push(offset);
            offset += c.len_utf8();
        }
        bp.push(offset);
        bp
    };

    let mut tokens: Vec<Token> = Vec::new();
    // Open brackets, innermost last; line breaks inside `(` are spaces.
    let mut nesting: Vec<char> = Vec::new();
    let mut i = 0;

    let push = |tokens: &mut Vec<Token>, kind: TokenKind, start: usize, end: usize| {
        tokens.push(Token {
            kind,
            span: byte_pos[start]..byte_pos[end],
        });
    };

    while i < len {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' => {
                i += 1;
            }

            '\n' => {
                let in_parens = nesting.last() == Some(&'(');
                let continues = tokens.last().is_none_or(|t| t.kind.continues_line());
                if !in_parens && !continues {
                    push(&mut tokens, TokenKind::Newline, i, i + 1);
                }
                i += 1;
            }

            // Comments
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < len && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start = i;
                i += 2;
                while i < len && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                if i >= len {
                    return Err(syntax("unclosed comment", byte_pos[start]..byte_pos[len]));
                }
                i += 2;
            }

            // String literal
            '"' => {
                let start = i;
                i += 1;
                let mut text = String::new();
                loop {
                    match chars.get(i) {
                        None | Some('\n') => {
                            return Err(syntax(
                                "unclosed string literal",
                                byte_pos[start]..byte_pos[i],
                            ));
                        }
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = match chars.get(i + 1) {
                                Some('n') => '\n',
                                Some('t') => '\t',
                                Some('r') => '\r',
                                Some('"') => '"',
                                Some('\'') => '\'',
                                Some('\\') => '\\',
                                _ => {
                                    return Err(syntax(
                                        "invalid escape character",
                                        byte_pos[i]..byte_pos[(i + 2).min(len)],
                                    ));
                                }
                            };
                            text.push(escaped);
                            i += 2;
                        }
                        Some(&other) => {
                            text.push(other);
                            i += 1;
                        }
                    }
                }
                push(&mut tokens, TokenKind::Str(text), start, i);
            }

            // Numbers; `1.toString` is a member access, `1.5` a double
            '0'..='9' => {
                let start = i;
                while i < len && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let is_double = i + 1 < len && chars[i] == '.' && chars[i + 1].is_ascii_digit();
                if is_double {
                    i += 1;
                    while i < len && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let span = byte_pos[start]..byte_pos[i];
                let kind = if is_double {
                    text.parse::<f64>()
                        .map(TokenKind::Double)
                        .map_err(|_| syntax("malformed floating point number", span.clone()))?
                } else {
                    text.parse::<i64>()
                        .map(TokenKind::Int)
                        .map_err(|_| syntax("integer number too large", span.clone()))?
                };
                push(&mut tokens, kind, start, i);
            }

            // Identifiers and keywords
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < len && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let kind = match ident.as_str() {
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    "val" => TokenKind::Val,
                    "var" => TokenKind::Var,
                    "def" => TokenKind::Def,
                    "if" => TokenKind::If,
                    "else" => TokenKind::Else,
                    "while" => TokenKind::While,
                    "throw" => TokenKind::Throw,
                    "new" => TokenKind::New,
                    _ => TokenKind::Ident(ident),
                };
                if matches!(kind, TokenKind::Else) {
                    drop_trailing_newline(&mut tokens);
                }
                push(&mut tokens, kind, start, i);
            }

            // Two-character operators
            '=' | '!' | '<' | '>' | '&' | '|' => {
                let next = chars.get(i + 1).copied();
                let (kind, width) = match (c, next) {
                    ('=', Some('=')) => (TokenKind::EqEq, 2),
                    ('=', _) => (TokenKind::Eq, 1),
                    ('!', Some('=')) => (TokenKind::BangEq, 2),
                    ('!', _) => (TokenKind::Bang, 1),
                    ('<', Some('=')) => (TokenKind::LtEq, 2),
                    ('<', _) => (TokenKind::Lt, 1),
                    ('>', Some('=')) => (TokenKind::GtEq, 2),
                    ('>', _) => (TokenKind::Gt, 1),
                    ('&', Some('&')) => (TokenKind::AmpAmp, 2),
                    ('|', Some('|')) => (TokenKind::PipePipe, 2),
                    _ => {
                        return Err(syntax(
                            format!("illegal character '{}'", c),
                            byte_pos[i]..byte_pos[i + 1],
                        ));
                    }
                };
                push(&mut tokens, kind, i, i + width);
                i += width;
            }

            '.' => {
                drop_trailing_newline(&mut tokens);
                push(&mut tokens, TokenKind::Dot, i, i + 1);
                i += 1;
            }

            '(' | '{' => {
                nesting.push(c);
                let kind = if c == '(' {
                    TokenKind::LParen
                } else {
                    TokenKind::LBrace
                };
                push(&mut tokens, kind, i, i + 1);
                i += 1;
            }

            ')' | '}' => {
                let open = if c == ')' { '(' } else { '{' };
                if nesting.pop() != Some(open) {
                    return Err(syntax(
                        format!("unbalanced '{}'", c),
                        byte_pos[i]..byte_pos[i + 1],
                    ));
                }
                let kind = if c == ')' {
                    TokenKind::RParen
                } else {
                    drop_trailing_newline(&mut tokens);
                    TokenKind::RBrace
                };
                push(&mut tokens, kind, i, i + 1);
                i += 1;
            }

            _ => {
                let kind = match c {
                    '+' => TokenKind::Plus,
                    '-' => TokenKind::Minus,
                    '*' => TokenKind::Star,
                    '/' => TokenKind::Slash,
                    '%' => TokenKind::Percent,
                    ':' => TokenKind::Colon,
                    ',' => TokenKind::Comma,
                    ';' => TokenKind::Semi,
                    _ => {
                        return Err(syntax(
                            format!("illegal character '{}'", c),
                            byte_pos[i]..byte_pos[i + 1],
                        ));
                    }
                };
                push(&mut tokens, kind, i, i + 1);
                i += 1;
            }
        }
    }

    if let Some(open) = nesting.last() {
        let close = if *open == '(' { ')' } else { '}' };
        return Err(syntax(
            format!("'{}' expected but end of input found", close),
            byte_pos[len]..byte_pos[len],
        ));
    }

    drop_trailing_newline(&mut tokens);
    push(&mut tokens, TokenKind::Eof, len, len);
    Ok(tokens)
}

fn drop_trailing_newline(tokens: &mut Vec<Token>) {
    if tokens.last().is_some_and(|t| t.kind == TokenKind::Newline) {
        tokens.pop();
    }
}

fn syntax(message: impl Into<String>, span: Range<usize>) -> ReplError {
    ReplError::Syntax {
        message: message.into(),
        span,
    }
}
