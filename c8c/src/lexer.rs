use crate::token::{Token, TokenKind};
use std::iter::Peekable;
use std::str::CharIndices;

/// Source scanner. The compiler core only needs a token sequence ending in
/// `Eof`; this produces one from text.
pub struct Lexer<'a> {
    code: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(code: &'a str) -> Self {
        Self { code }
    }

    pub fn parse(self) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut last_line = 0;
        for (idx, line) in self.code.lines().enumerate() {
            last_line = idx as u32 + 1;
            let toks = LineLexer::new(line, last_line).parse();
            if toks.is_empty() {
                continue;
            }
            tokens.extend(toks);
            tokens.push(Token::new(TokenKind::NewLine, "", last_line));
        }
        tokens.push(Token::new(TokenKind::Eof, "", last_line));
        tokens
    }
}

struct LineLexer<'a> {
    iter: Peekable<CharIndices<'a>>,
    line: u32,
}

impl<'a> LineLexer<'a> {
    fn new(line: &'a str, number: u32) -> Self {
        Self {
            iter: line.char_indices().peekable(),
            line: number,
        }
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.iter.clone().nth(n).map(|(_, ch)| ch)
    }

    fn consume(&mut self) -> Option<char> {
        self.iter.next().map(|(_, ch)| ch)
    }

    fn token(&self, kind: TokenKind, literal: impl Into<String>) -> Token {
        Token::new(kind, literal, self.line)
    }
}

impl<'a> LineLexer<'a> {
    fn parse(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(ch0) = self.peek_nth(0) {
            if ch0.is_whitespace() {
                self.consume();
                continue;
            }

            if let Some(ch1) = self.peek_nth(1) {
                if ch0 == '/' && ch1 == '/' {
                    break;
                }
                if let Some(kind) = double_char_token(ch0, ch1) {
                    self.consume();
                    self.consume();
                    tokens.push(self.token(kind, format!("{}{}", ch0, ch1)));
                    continue;
                }
            }

            if let Some(kind) = single_char_token(ch0) {
                self.consume();
                tokens.push(self.token(kind, ch0.to_string()));
                continue;
            }

            if ch0.is_ascii_digit() {
                let tok = self.parse_number();
                tokens.push(tok);
                continue;
            }

            if ch0.is_ascii_alphabetic() || ch0 == '_' {
                let mut word = String::new();
                while let Some(ch) = self.peek_nth(0) {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        word.push(ch);
                        self.consume();
                    } else {
                        break;
                    }
                }
                let kind = TokenKind::keyword(&word).unwrap_or(TokenKind::Identifier);
                tokens.push(self.token(kind, word));
                continue;
            }

            self.consume();
            tokens.push(self.token(TokenKind::Error, ch0.to_string()));
        }
        tokens
    }

    /// Decimal or `0x` hex. The literal is normalized to decimal.
    fn parse_number(&mut self) -> Token {
        let mut text = String::new();
        while let Some(ch) = self.peek_nth(0) {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                text.push(ch);
                self.consume();
            } else {
                break;
            }
        }
        let digits = text.replace('_', "");
        let value = match digits.strip_prefix("0x").or(digits.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => digits.parse::<u64>(),
        };
        match value {
            Ok(v) => self.token(TokenKind::Number, v.to_string()),
            Err(_) => self.token(TokenKind::Error, text),
        }
    }
}

fn double_char_token(ch0: char, ch1: char) -> Option<TokenKind> {
    match (ch0, ch1) {
        ('=', '=') => Some(TokenKind::Equal),
        ('!', '=') => Some(TokenKind::NotEqual),
        ('<', '=') => Some(TokenKind::LessEqual),
        ('>', '=') => Some(TokenKind::GreaterEqual),
        ('<', '<') => Some(TokenKind::ShiftLeft),
        ('>', '>') => Some(TokenKind::ShiftRight),
        ('&', '&') => Some(TokenKind::AndAnd),
        ('|', '|') => Some(TokenKind::OrOr),
        _ => None,
    }
}

fn single_char_token(ch: char) -> Option<TokenKind> {
    match ch {
        '+' => Some(TokenKind::Plus),
        '-' => Some(TokenKind::Minus),
        '*' => Some(TokenKind::Star),
        '/' => Some(TokenKind::Slash),
        '%' => Some(TokenKind::Percent),
        '&' => Some(TokenKind::Ampersand),
        '|' => Some(TokenKind::Pipe),
        '^' => Some(TokenKind::Caret),
        '!' => Some(TokenKind::Bang),
        '<' => Some(TokenKind::Less),
        '>' => Some(TokenKind::Greater),
        '=' => Some(TokenKind::Assign),
        '(' => Some(TokenKind::LeftParen),
        ')' => Some(TokenKind::RightParen),
        '[' => Some(TokenKind::LeftBracket),
        ']' => Some(TokenKind::RightBracket),
        '{' => Some(TokenKind::LeftBrace),
        '}' => Some(TokenKind::RightBrace),
        ',' => Some(TokenKind::Comma),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(code: &str) -> Vec<TokenKind> {
        Lexer::new(code).parse().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn let_statement() {
        use TokenKind::*;
        assert_eq!(
            kinds("let x *byte = 0x10"),
            vec![Let, Identifier, Star, Byte, Assign, Number, NewLine, Eof]
        );
    }

    #[test]
    fn comments_and_blank_lines() {
        use TokenKind::*;
        let code = "// header\n\nlet a byte // trailing\n   \n";
        assert_eq!(kinds(code), vec![Let, Identifier, Byte, NewLine, Eof]);
    }

    #[test]
    fn double_char_operators() {
        use TokenKind::*;
        assert_eq!(
            kinds("a<=b>>c&&d||e!=f"),
            vec![
                Identifier,
                LessEqual,
                Identifier,
                ShiftRight,
                Identifier,
                AndAnd,
                Identifier,
                OrOr,
                Identifier,
                NotEqual,
                Identifier,
                NewLine,
                Eof
            ]
        );
    }

    #[test]
    fn hex_literal_is_normalized() {
        let tokens = Lexer::new("0xFF").parse();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].literal, "255");
    }

    #[test]
    fn line_numbers_start_at_one() {
        let tokens = Lexer::new("let a byte\nlet b byte").parse();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[4].line, 2);
    }

    #[test]
    fn unknown_character() {
        let tokens = Lexer::new("a $ b").parse();
        assert_eq!(tokens[1].kind, TokenKind::Error);
    }
}
