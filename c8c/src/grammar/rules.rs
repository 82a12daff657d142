use super::{Alternative, Grammar, NonTerminal, Role, Symbol, Terminal};
use crate::token::TokenKind;
use indexmap::IndexMap;
use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rule {
    Program,
    OptNewlines,
    Newlines,
    TopLevel,
    TopStatement,
    GlobalLet,
    Function,
    Parameters,
    ParameterList,
    Parameter,
    Type,
    Block,
    Statements,
    Statement,
    Let,
    Return,
    If,
    While,
    Assignment,
    Expression,
    LogicOr,
    LogicAnd,
    Equality,
    Comparison,
    BitOr,
    BitXor,
    BitAnd,
    Shift,
    Additive,
    Multiplicative,
    Unary,
    Postfix,
    Primary,
    Call,
    Arguments,
}

fn n(rule: Rule) -> Symbol {
    Symbol::Rule(rule)
}

/// Terminal that labels the node of its alternative.
fn l(kind: TokenKind) -> Symbol {
    Symbol::Terminal(Terminal {
        kind,
        role: Role::Label,
    })
}

/// Terminal kept as a leaf.
fn t(kind: TokenKind) -> Symbol {
    Symbol::Terminal(Terminal {
        kind,
        role: Role::Leaf,
    })
}

/// Terminal matched and dropped.
fn s(kind: TokenKind) -> Symbol {
    Symbol::Terminal(Terminal {
        kind,
        role: Role::Skip,
    })
}

struct Builder {
    rules: IndexMap<Rule, NonTerminal>,
}

impl Builder {
    fn rule(&mut self, rule: Rule, alternatives: Vec<Vec<Symbol>>) -> &mut Self {
        let alternatives = alternatives
            .into_iter()
            .map(|symbols| Alternative { symbols })
            .collect();
        self.rules.insert(rule, NonTerminal { rule, alternatives });
        self
    }

    /// `rule := rule op next | ... | next` for each operator.
    fn binary(&mut self, rule: Rule, ops: &[TokenKind], next: Rule) -> &mut Self {
        let mut alternatives: Vec<Vec<Symbol>> =
            ops.iter().map(|&op| vec![n(rule), l(op), n(next)]).collect();
        alternatives.push(vec![n(next)]);
        self.rule(rule, alternatives)
    }
}

pub static GRAMMAR: Lazy<Grammar> = Lazy::new(|| {
    use Rule::*;
    use TokenKind as K;

    let mut g = Builder {
        rules: IndexMap::new(),
    };

    g.rule(
        Program,
        vec![
            vec![n(OptNewlines), n(TopLevel), l(K::Eof)],
            vec![n(OptNewlines), l(K::Eof)],
        ],
    )
    .rule(OptNewlines, vec![vec![t(K::NewLine), n(OptNewlines)], vec![]])
    .rule(Newlines, vec![vec![t(K::NewLine), n(OptNewlines)]])
    .rule(
        TopLevel,
        vec![
            vec![n(TopStatement), n(Newlines), n(TopLevel)],
            vec![n(TopStatement), n(OptNewlines)],
        ],
    )
    .rule(TopStatement, vec![vec![n(Function)], vec![n(GlobalLet)]])
    .rule(GlobalLet, vec![vec![l(K::Let), t(K::Identifier), n(Type)]])
    .rule(
        Function,
        vec![vec![
            l(K::Fn),
            t(K::Identifier),
            n(Parameters),
            n(Type),
            n(Block),
        ]],
    )
    .rule(
        Parameters,
        vec![
            vec![l(K::LeftParen), n(ParameterList), s(K::RightParen)],
            vec![l(K::LeftParen), s(K::RightParen)],
        ],
    )
    .rule(
        ParameterList,
        vec![
            vec![n(Parameter), s(K::Comma), n(ParameterList)],
            vec![n(Parameter)],
        ],
    )
    .rule(Parameter, vec![vec![l(K::Identifier), n(Type)]])
    .rule(
        Type,
        vec![
            vec![l(K::Star), n(Type)],
            vec![l(K::LeftBracket), t(K::Number), s(K::RightBracket), n(Type)],
            vec![t(K::Byte)],
            vec![t(K::Bool)],
            vec![t(K::Void)],
        ],
    );

    g.rule(
        Block,
        vec![
            vec![
                l(K::LeftBrace),
                n(OptNewlines),
                n(Statements),
                s(K::RightBrace),
            ],
            vec![l(K::LeftBrace), n(OptNewlines), s(K::RightBrace)],
        ],
    )
    .rule(
        Statements,
        vec![
            vec![n(Statement), n(Newlines), n(Statements)],
            vec![n(Statement), n(OptNewlines)],
        ],
    )
    .rule(
        Statement,
        vec![
            vec![n(Let)],
            vec![n(Return)],
            vec![n(If)],
            vec![n(While)],
            vec![n(Assignment)],
            vec![n(Call)],
            vec![n(Block)],
        ],
    )
    .rule(
        Let,
        vec![
            vec![
                l(K::Let),
                t(K::Identifier),
                n(Type),
                s(K::Assign),
                n(Expression),
            ],
            vec![l(K::Let), t(K::Identifier), n(Type)],
        ],
    )
    .rule(
        Return,
        vec![vec![l(K::Return), n(Expression)], vec![l(K::Return)]],
    )
    .rule(
        If,
        vec![
            vec![l(K::If), n(Expression), n(Block), s(K::Else), n(Block)],
            vec![l(K::If), n(Expression), n(Block), s(K::Else), n(If)],
            vec![l(K::If), n(Expression), n(Block)],
        ],
    )
    .rule(While, vec![vec![l(K::While), n(Expression), n(Block)]])
    .rule(
        Assignment,
        vec![vec![n(Unary), l(K::Assign), n(Expression)]],
    );

    g.rule(Expression, vec![vec![n(LogicOr)]])
        .binary(LogicOr, &[K::OrOr], LogicAnd)
        .binary(LogicAnd, &[K::AndAnd], Equality)
        .binary(Equality, &[K::Equal, K::NotEqual], Comparison)
        .binary(
            Comparison,
            &[K::Less, K::LessEqual, K::Greater, K::GreaterEqual],
            BitOr,
        )
        .binary(BitOr, &[K::Pipe], BitXor)
        .binary(BitXor, &[K::Caret], BitAnd)
        .binary(BitAnd, &[K::Ampersand], Shift)
        .binary(Shift, &[K::ShiftLeft, K::ShiftRight], Additive)
        .binary(Additive, &[K::Plus, K::Minus], Multiplicative)
        .binary(Multiplicative, &[K::Slash, K::Percent], Unary)
        .rule(
            Unary,
            vec![
                vec![l(K::Bang), n(Unary)],
                vec![l(K::Star), n(Unary)],
                vec![n(Postfix)],
            ],
        )
        .rule(
            Postfix,
            vec![
                vec![n(Postfix), l(K::LeftBracket), n(Expression), s(K::RightBracket)],
                vec![n(Primary)],
            ],
        )
        .rule(
            Primary,
            vec![
                vec![n(Call)],
                vec![t(K::Identifier)],
                vec![t(K::Number)],
                vec![t(K::True)],
                vec![t(K::False)],
                vec![s(K::LeftParen), n(Expression), s(K::RightParen)],
            ],
        )
        .rule(
            Call,
            vec![
                vec![
                    t(K::Identifier),
                    l(K::LeftParen),
                    n(Arguments),
                    s(K::RightParen),
                ],
                vec![t(K::Identifier), l(K::LeftParen), s(K::RightParen)],
            ],
        )
        .rule(
            Arguments,
            vec![
                vec![n(Expression), s(K::Comma), n(Arguments)],
                vec![n(Expression)],
            ],
        );

    Grammar {
        rules: g.rules,
        start: Program,
    }
});
