use strum::Display;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>, line: u32) -> Self {
        Token {
            kind,
            literal: literal.into(),
            line,
        }
    }

    /// Label of pass-through and root nodes.
    pub fn empty() -> Self {
        Token::new(TokenKind::Empty, "", 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TokenKind {
    Identifier,
    Number,

    // Keywords
    Let,
    Fn,
    Return,
    If,
    Else,
    While,
    Byte,
    Bool,
    Void,
    True,
    False,

    // Operators
    Plus,         // '+'
    Minus,        // '-'
    Star,         // '*'
    Slash,        // '/'
    Percent,      // '%'
    Ampersand,    // '&'
    Pipe,         // '|'
    Caret,        // '^'
    ShiftLeft,    // '<<'
    ShiftRight,   // '>>'
    AndAnd,       // '&&'
    OrOr,         // '||'
    Bang,         // '!'
    Equal,        // '=='
    NotEqual,     // '!='
    Less,         // '<'
    LessEqual,    // '<='
    Greater,      // '>'
    GreaterEqual, // '>='
    Assign,       // '='

    // Punctuation
    LeftParen,    // '('
    RightParen,   // ')'
    LeftBracket,  // '['
    RightBracket, // ']'
    LeftBrace,    // '{'
    RightBrace,   // '}'
    Comma,        // ','

    // Layout and sentinels
    NewLine,
    Eof,
    Empty,
    Error,
}

impl TokenKind {
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "let" => TokenKind::Let,
            "fn" => TokenKind::Fn,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "byte" => TokenKind::Byte,
            "bool" => TokenKind::Bool,
            "void" => TokenKind::Void,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_type_keyword(self) -> bool {
        matches!(self, TokenKind::Byte | TokenKind::Bool | TokenKind::Void)
    }
}
