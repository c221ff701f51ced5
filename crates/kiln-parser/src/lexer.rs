//! Tokenization.

use kiln_common::Span;

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(u64),
    /// Integer literal with a `u` suffix.
    UInt(u64),
    Float(f64),
    Str(String),

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    ColonColon,
    Dot,
    Question,
    QuestionQuestion,
    Bang,
    Amp,
    AmpAmp,
    Star,
    At,
    Plus,
    Minus,
    Slash,
    Percent,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    PipePipe,

    Eof,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug)]
pub struct LexError {
    pub offset: u32,
    pub message: String,
}

pub struct Lexer<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.pos += 1,
                Some(b'#') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn ident(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        TokenKind::Ident(self.text[start..self.pos].to_string())
    }

    fn number(&mut self) -> Result<TokenKind, LexError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }

        let is_float = self.peek() == Some(b'.')
            && self.peek_at(1).is_some_and(|c| c.is_ascii_digit());

        if is_float {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }

            let text = &self.text[start..self.pos];
            return text
                .parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| LexError {
                    offset: start as u32,
                    message: format!("Invalid float literal {text}."),
                });
        }

        let text = &self.text[start..self.pos];
        let value = text.parse::<u64>().map_err(|_| LexError {
            offset: start as u32,
            message: format!("Invalid integer literal {text}."),
        })?;

        if self.peek() == Some(b'u') {
            self.pos += 1;
            Ok(TokenKind::UInt(value))
        } else {
            Ok(TokenKind::Int(value))
        }
    }

    fn string(&mut self) -> Result<TokenKind, LexError> {
        let start = self.pos;
        self.pos += 1; // opening quote

        let mut out = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(LexError {
                        offset: start as u32,
                        message: "Unterminated string literal.".into(),
                    });
                }
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(TokenKind::Str(out));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or(LexError {
                        offset: self.pos as u32,
                        message: "Unterminated escape sequence.".into(),
                    })?;
                    out.push(match escaped {
                        b'n' => '\n',
                        b't' => '\t',
                        b'r' => '\r',
                        b'0' => '\0',
                        b'"' => '"',
                        b'\\' => '\\',
                        other => {
                            return Err(LexError {
                                offset: self.pos as u32,
                                message: format!("Unknown escape \\{}.", other as char),
                            });
                        }
                    });
                    self.pos += 1;
                }
                Some(_) => {
                    let c = self.text[self.pos..].chars().next().expect("in bounds");
                    out.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn punct(&mut self) -> Result<TokenKind, LexError> {
        let two = |a: u8, b: u8| -> bool {
            self.bytes.get(self.pos) == Some(&a) && self.bytes.get(self.pos + 1) == Some(&b)
        };

        let (kind, len) = if two(b':', b':') {
            (TokenKind::ColonColon, 2)
        } else if two(b'?', b'?') {
            (TokenKind::QuestionQuestion, 2)
        } else if two(b'&', b'&') {
            (TokenKind::AmpAmp, 2)
        } else if two(b'|', b'|') {
            (TokenKind::PipePipe, 2)
        } else if two(b'=', b'=') {
            (TokenKind::Eq, 2)
        } else if two(b'!', b'=') {
            (TokenKind::Ne, 2)
        } else if two(b'<', b'=') {
            (TokenKind::Le, 2)
        } else if two(b'>', b'=') {
            (TokenKind::Ge, 2)
        } else if two(b'+', b'=') {
            (TokenKind::PlusAssign, 2)
        } else if two(b'-', b'=') {
            (TokenKind::MinusAssign, 2)
        } else if two(b'*', b'=') {
            (TokenKind::StarAssign, 2)
        } else if two(b'/', b'=') {
            (TokenKind::SlashAssign, 2)
        } else if two(b'%', b'=') {
            (TokenKind::PercentAssign, 2)
        } else {
            let kind = match self.peek().expect("caller checked") {
                b'(' => TokenKind::LParen,
                b')' => TokenKind::RParen,
                b'{' => TokenKind::LBrace,
                b'}' => TokenKind::RBrace,
                b'[' => TokenKind::LBracket,
                b']' => TokenKind::RBracket,
                b',' => TokenKind::Comma,
                b':' => TokenKind::Colon,
                b'.' => TokenKind::Dot,
                b'?' => TokenKind::Question,
                b'!' => TokenKind::Bang,
                b'&' => TokenKind::Amp,
                b'*' => TokenKind::Star,
                b'@' => TokenKind::At,
                b'+' => TokenKind::Plus,
                b'-' => TokenKind::Minus,
                b'/' => TokenKind::Slash,
                b'%' => TokenKind::Percent,
                b'=' => TokenKind::Assign,
                b'<' => TokenKind::Lt,
                b'>' => TokenKind::Gt,
                other => {
                    return Err(LexError {
                        offset: self.pos as u32,
                        message: format!("Unexpected character {}.", other as char),
                    });
                }
            };
            (kind, 1)
        };

        self.pos += len;
        Ok(kind)
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia();
            let start = self.pos;

            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span: Span::at(start as u32),
                });
                return Ok(tokens);
            };

            let kind = if c.is_ascii_alphabetic() || c == b'_' {
                self.ident()
            } else if c.is_ascii_digit() {
                self.number()?
            } else if c == b'"' {
                self.string()?
            } else {
                self.punct()?
            };

            tokens.push(Token {
                kind,
                span: Span::new(start as u32, self.pos as u32),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        Lexer::new(text)
            .tokenize()
            .expect("lexes")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn numbers_classify_by_suffix() {
        assert_eq!(
            kinds("3 4u 2.5"),
            vec![
                TokenKind::Int(3),
                TokenKind::UInt(4),
                TokenKind::Float(2.5),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn compound_punctuation_wins_over_single() {
        assert_eq!(
            kinds("== = <= ?? ::"),
            vec![
                TokenKind::Eq,
                TokenKind::Assign,
                TokenKind::Le,
                TokenKind::QuestionQuestion,
                TokenKind::ColonColon,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn comments_skip_to_line_end() {
        assert_eq!(
            kinds("a # comment\nb"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Ident("b".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn strings_unescape() {
        assert_eq!(
            kinds(r#""hi\n""#),
            vec![TokenKind::Str("hi\n".into()), TokenKind::Eof]
        );
    }
}
