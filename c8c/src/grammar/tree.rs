use crate::error::{internal, Result};
use crate::token::{Token, TokenKind};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub value: Token,
    pub children: Vec<Node>,
}

impl Node {
    pub fn leaf(value: Token) -> Self {
        Node {
            value,
            children: vec![],
        }
    }

    pub fn new(value: Token, children: Vec<Node>) -> Self {
        Node { value, children }
    }

    pub fn kind(&self) -> TokenKind {
        self.value.kind
    }

    pub fn literal(&self) -> &str {
        &self.value.literal
    }

    pub fn line(&self) -> u32 {
        self.value.line
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Child by position. A missing child means the tree did not come from
    /// the grammar.
    pub fn child(&self, idx: usize) -> Result<&Node> {
        match self.children.get(idx) {
            Some(node) => Ok(node),
            None => internal(format!(
                "`{}` node on line {} has no child #{}",
                self.value.kind, self.value.line, idx
            )),
        }
    }

    /// Both operands of a binary operator node.
    pub fn operands(&self) -> Result<(&Node, &Node)> {
        match self.children.as_slice() {
            [lhs, rhs] => Ok((lhs, rhs)),
            _ => internal(format!(
                "`{}` on line {} has {} operands",
                self.value.kind,
                self.value.line,
                self.children.len()
            )),
        }
    }

    /// Deepest node along the last-child spine.
    pub fn last_leaf(&self) -> &Node {
        let mut node = self;
        while let Some(last) = node.children.last() {
            node = last;
        }
        node
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.value.literal.is_empty() {
            self.value.kind.to_string()
        } else {
            self.value.literal.clone()
        };
        if self.children.is_empty() {
            return write!(f, "{}", label);
        }
        write!(f, "({}", label)?;
        for child in &self.children {
            write!(f, " {}", child)?;
        }
        write!(f, ")")
    }
}

/// Output of a parse. The root is labelled `Empty` and holds the program
/// node (labelled by the `Eof` token) as its only child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxTree {
    pub root: Node,
}

impl SyntaxTree {
    pub fn empty() -> Self {
        SyntaxTree {
            root: Node::leaf(Token::empty()),
        }
    }

    pub fn program(&self) -> Result<&Node> {
        let program = self.root.child(0)?;
        if program.kind() != TokenKind::Eof {
            return internal("program node is not labelled by end of stream");
        }
        Ok(program)
    }

    /// Top-level statements.
    pub fn statements(&self) -> Result<&[Node]> {
        Ok(&self.program()?.children)
    }
}

impl fmt::Display for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(kind: TokenKind, literal: &str) -> Token {
        Token::new(kind, literal, 1)
    }

    #[test]
    fn display_as_sexpr() {
        let node = Node::new(
            tok(TokenKind::Minus, "-"),
            vec![
                Node::leaf(tok(TokenKind::Number, "8")),
                Node::leaf(tok(TokenKind::Identifier, "x")),
            ],
        );
        assert_eq!(node.to_string(), "(- 8 x)");
    }

    #[test]
    fn last_leaf_follows_right_spine() {
        let ty = Node::new(
            tok(TokenKind::LeftBracket, "["),
            vec![
                Node::leaf(tok(TokenKind::Number, "4")),
                Node::new(
                    tok(TokenKind::Star, "*"),
                    vec![Node::leaf(tok(TokenKind::Byte, "byte"))],
                ),
            ],
        );
        assert_eq!(ty.last_leaf().kind(), TokenKind::Byte);
    }

    #[test]
    fn missing_child_is_internal() {
        let node = Node::leaf(tok(TokenKind::Let, "let"));
        assert!(node.child(0).is_err());
        assert!(node.operands().is_err());
    }
}
