//! Backtracking grammar engine.
//!
//! Productions are data: a [`Grammar`] maps each [`Rule`] to an ordered list
//! of alternatives, and parsing is ordered choice over them. Every attempt
//! works on a copy of the [`TokenStream`] and is committed only when the whole
//! alternative matched. Results are memoized per rule and stream position for
//! the duration of one parse. A rule whose first alternative starts with the
//! rule itself is grown iteratively from its base alternatives, which yields
//! left-associated trees.

mod rules;
mod tree;

pub use rules::{Rule, GRAMMAR};
pub use tree::{Node, SyntaxTree};

use crate::error::{Error, Result};
use crate::token::{Token, TokenKind};
use indexmap::IndexMap;
use std::collections::HashMap;

/// What a matched terminal contributes to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Becomes a child node.
    Leaf,
    /// Labels the node built by the enclosing alternative.
    Label,
    /// Matched and dropped.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminal {
    pub kind: TokenKind,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Terminal(Terminal),
    Rule(Rule),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternative {
    pub symbols: Vec<Symbol>,
}

#[derive(Debug, Clone)]
pub struct NonTerminal {
    pub rule: Rule,
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone)]
pub struct Grammar {
    pub rules: IndexMap<Rule, NonTerminal>,
    pub start: Rule,
}

/// Read-only view of the remaining input. Copying it is how attempts
/// backtrack.
#[derive(Debug, Clone, Copy)]
pub struct TokenStream<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> TokenStream<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        TokenStream { tokens, pos: 0 }
    }

    pub fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn rest(&self) -> &'t [Token] {
        &self.tokens[self.pos.min(self.tokens.len())..]
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn at(&self, pos: usize) -> Self {
        TokenStream {
            tokens: self.tokens,
            pos,
        }
    }
}

/// Nodes produced by one alternative before it is closed.
#[derive(Debug, Default)]
pub struct Partial {
    pub label: Option<Token>,
    pub children: Vec<Node>,
}

impl Partial {
    fn seeded(children: Vec<Node>) -> Self {
        Partial {
            label: None,
            children,
        }
    }

    /// Labelled alternatives produce one node, unlabelled ones splice their
    /// children into the caller.
    fn close(self) -> Vec<Node> {
        match self.label {
            Some(label) => vec![Node::new(label, self.children)],
            None => self.children,
        }
    }
}

type Memo = HashMap<(Rule, usize), Option<(Vec<Node>, usize)>>;

/// State of one parse: the grammar and its memo table.
pub struct Session<'g> {
    grammar: &'g Grammar,
    memo: Memo,
}

impl Terminal {
    /// Match the next token. On success the stream advances and the token
    /// lands in `out` according to the role; newlines never become nodes.
    pub fn build(&self, stream: &mut TokenStream, out: &mut Partial) -> bool {
        let Some(token) = stream.peek() else {
            return false;
        };
        if token.kind != self.kind {
            return false;
        }
        match self.role {
            Role::Leaf if token.kind != TokenKind::NewLine => {
                out.children.push(Node::leaf(token.clone()))
            }
            Role::Label => out.label = Some(token.clone()),
            _ => {}
        }
        stream.advance();
        true
    }
}

impl NonTerminal {
    fn is_left_recursive(&self) -> bool {
        self.alternatives
            .first()
            .and_then(|alt| alt.symbols.first())
            .is_some_and(|sym| *sym == Symbol::Rule(self.rule))
    }

    fn is_recursive(&self, alt: &Alternative) -> bool {
        alt.symbols.first() == Some(&Symbol::Rule(self.rule))
    }

    /// Match this production at the head of `stream`. On success the matched
    /// nodes are appended to `out` and the stream is advanced; on failure
    /// neither is touched.
    pub fn build(&self, session: &mut Session, stream: &mut TokenStream, out: &mut Vec<Node>) -> bool {
        let key = (self.rule, stream.pos());
        let result = match session.memo.get(&key) {
            Some(hit) => hit.clone(),
            None => {
                let result = if self.is_left_recursive() {
                    self.grow(session, *stream)
                } else {
                    self.alternatives
                        .iter()
                        .find_map(|alt| session.build_alternative(&alt.symbols, vec![], *stream))
                        .map(|(nodes, rest)| (nodes, rest.pos()))
                };
                session.memo.insert(key, result.clone());
                result
            }
        };
        match result {
            Some((nodes, end)) => {
                out.extend(nodes);
                *stream = stream.at(end);
                true
            }
            None => false,
        }
    }

    /// Match a base alternative, then repeatedly extend it with the tail of a
    /// recursive alternative, feeding the nodes built so far in as the left
    /// operand.
    fn grow(&self, session: &mut Session, stream: TokenStream) -> Option<(Vec<Node>, usize)> {
        let (mut nodes, mut rest) = self
            .alternatives
            .iter()
            .filter(|alt| !self.is_recursive(alt))
            .find_map(|alt| session.build_alternative(&alt.symbols, vec![], stream))?;

        'grow: loop {
            for alt in self.alternatives.iter().filter(|alt| self.is_recursive(alt)) {
                let tail = &alt.symbols[1..];
                if let Some((next, after)) = session.build_alternative(tail, nodes.clone(), rest) {
                    if after.pos() > rest.pos() {
                        nodes = next;
                        rest = after;
                        continue 'grow;
                    }
                }
            }
            break;
        }
        Some((nodes, rest.pos()))
    }
}

impl<'g> Session<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Session {
            grammar,
            memo: HashMap::new(),
        }
    }

    fn build_alternative<'t>(
        &mut self,
        symbols: &[Symbol],
        seed: Vec<Node>,
        stream: TokenStream<'t>,
    ) -> Option<(Vec<Node>, TokenStream<'t>)> {
        let mut stream = stream;
        let mut partial = Partial::seeded(seed);
        for symbol in symbols {
            let matched = match symbol {
                Symbol::Terminal(terminal) => terminal.build(&mut stream, &mut partial),
                Symbol::Rule(rule) => {
                    let grammar = self.grammar;
                    match grammar.rules.get(rule) {
                        Some(nt) => nt.build(self, &mut stream, &mut partial.children),
                        None => false,
                    }
                }
            };
            if !matched {
                return None;
            }
        }
        Some((partial.close(), stream))
    }
}

/// Result of [`Grammar::parse`].
#[derive(Debug, Clone)]
pub struct Parsed {
    pub tree: SyntaxTree,
    pub remaining: Vec<Token>,
    pub matched: bool,
}

impl Parsed {
    pub fn into_tree(self) -> Result<SyntaxTree> {
        if self.matched {
            Ok(self.tree)
        } else {
            Err(Error::Syntax)
        }
    }
}

impl Grammar {
    /// Parse a whole token sequence from the start production. Success
    /// requires every token to be consumed; on failure the tree is empty and
    /// the residual is the untouched input.
    pub fn parse(&self, tokens: &[Token]) -> Parsed {
        let failed = || Parsed {
            tree: SyntaxTree::empty(),
            remaining: tokens.to_vec(),
            matched: false,
        };

        let Some(start) = self.rules.get(&self.start) else {
            return failed();
        };
        let mut session = Session::new(self);
        let mut stream = TokenStream::new(tokens);
        let mut nodes = vec![];
        if !start.build(&mut session, &mut stream, &mut nodes) || !stream.rest().is_empty() {
            return failed();
        }

        let program = match <[Node; 1]>::try_from(nodes) {
            Ok([program]) if program.kind() == TokenKind::Eof => program,
            _ => return failed(),
        };
        Parsed {
            tree: SyntaxTree {
                root: Node::new(Token::empty(), vec![program]),
            },
            remaining: vec![],
            matched: true,
        }
    }
}

/// Parse with the language grammar.
pub fn parse(tokens: &[Token]) -> Parsed {
    GRAMMAR.parse(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn tree(code: &str) -> String {
        let parsed = parse(&Lexer::new(code).parse());
        assert!(parsed.matched, "rejected: {}", code);
        parsed.tree.to_string()
    }

    #[test]
    fn empty_program() {
        assert_eq!(tree(""), "(Empty Eof)");
    }

    #[test]
    fn global_declarations() {
        assert_eq!(
            tree("let x byte\nlet p *byte\nlet a [4]bool"),
            "(Empty (Eof (let x byte) (let p (* byte)) (let a ([ 4 bool))))"
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        assert_eq!(
            tree("fn main() void {\nlet x byte = 8 - 3 - 2\n}"),
            "(Empty (Eof (fn main ( void ({ (let x byte (- (- 8 3) 2)))))))"
        );
    }

    #[test]
    fn division_is_left_associative() {
        assert_eq!(
            tree("fn main() void {\nlet q byte = 24 / 4 / 2\n}"),
            "(Empty (Eof (fn main ( void ({ (let q byte (/ (/ 24 4) 2)))))))"
        );
    }

    #[test]
    fn modulo_is_left_associative() {
        assert_eq!(
            tree("fn main() void {\nlet m byte = 20 % 7 % 4\n}"),
            "(Empty (Eof (fn main ( void ({ (let m byte (% (% 20 7) 4)))))))"
        );
    }

    #[test]
    fn precedence() {
        assert_eq!(
            tree("fn f() void {\nlet b bool = 1 + 2 < 3 && true\n}"),
            "(Empty (Eof (fn f ( void ({ (let b bool (&& (< (+ 1 2) 3) true)))))))"
        );
    }

    #[test]
    fn parenthesized_expression_is_flattened() {
        assert_eq!(
            tree("fn f() void {\nlet x byte = 8 - (3 - 2)\n}"),
            "(Empty (Eof (fn f ( void ({ (let x byte (- 8 (- 3 2))))))))"
        );
    }

    #[test]
    fn postfix_indexing_chains() {
        assert_eq!(
            tree("fn f() void {\nm[1][2] = *p\n}"),
            "(Empty (Eof (fn f ( void ({ (= ([ ([ m 1) 2) (* p)))))))"
        );
    }

    #[test]
    fn calls_and_parameters() {
        assert_eq!(
            tree("fn add(a byte, b byte) byte {\nreturn a + b\n}\nfn main() void {\nadd(1, 2)\n}"),
            "(Empty (Eof (fn add (( (a byte) (b byte)) byte ({ (return (+ a b)))) \
             (fn main ( void ({ (( add 1 2))))))"
        );
    }

    #[test]
    fn if_else_chain() {
        assert_eq!(
            tree("fn f() void {\nif a {\n} else if b {\n} else {\n}\n}"),
            "(Empty (Eof (fn f ( void ({ (if a { (if b { {)))))))"
        );
    }

    #[test]
    fn rejected_stream_is_untouched() {
        let tokens = Lexer::new("let x").parse();
        let parsed = parse(&tokens);
        assert!(!parsed.matched);
        assert_eq!(parsed.remaining, tokens);
        assert_eq!(parsed.tree, SyntaxTree::empty());
        assert!(matches!(parsed.into_tree(), Err(Error::Syntax)));
    }

    #[test]
    fn missing_end_of_stream_is_rejected() {
        let mut tokens = Lexer::new("let x byte").parse();
        tokens.pop();
        assert!(!parse(&tokens).matched);
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let mut tokens = Lexer::new("let x byte").parse();
        tokens.push(Token::new(TokenKind::Identifier, "y", 2));
        let parsed = parse(&tokens);
        assert!(!parsed.matched);
        assert_eq!(parsed.remaining.len(), tokens.len());
    }
}
