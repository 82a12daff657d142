use crate::error::{internal, Result, SemanticError};
use crate::grammar::Node;
use crate::token::TokenKind;
use crate::types::{Symbol, Type};

/// Name lookup as seen from the current point of a walk.
pub trait Environment {
    fn lookup(&self, name: &str) -> Option<Symbol>;
}

/// Infers the type of a subtree. Shared by the analyzer, which validates
/// every construct, and the emitter, which needs operand types to pick
/// instruction sequences.
pub struct DataTypeFactory<'e, E: Environment> {
    env: &'e E,
}

fn unexpected(expected: &str, found: &Type, node: &Node) -> SemanticError {
    SemanticError::UnexpectedDataType {
        expected: expected.to_string(),
        found: found.to_string(),
        line: node.line(),
    }
}

fn mismatch(left: &Type, right: &Type, node: &Node) -> SemanticError {
    SemanticError::DataTypesMismatch {
        left: left.to_string(),
        right: right.to_string(),
        line: node.line(),
    }
}

/// A `*` or `[` subtree whose right spine ends in a type keyword is a type;
/// anything else is a value expression.
pub fn is_type(node: &Node) -> bool {
    node.last_leaf().kind().is_type_keyword()
}

/// Byte literal value, if `node` is a literal that fits.
pub fn byte_literal(node: &Node) -> Option<u8> {
    match node.kind() {
        TokenKind::Number => node.literal().parse().ok(),
        _ => None,
    }
}

impl<'e, E: Environment> DataTypeFactory<'e, E> {
    pub fn new(env: &'e E) -> Self {
        DataTypeFactory { env }
    }

    /// Type of either a type annotation or a value expression.
    pub fn data_type(&self, node: &Node) -> Result<Type> {
        if is_type(node) {
            self.declared_type(node)
        } else {
            self.infer(node)
        }
    }

    pub fn declared_type(&self, node: &Node) -> Result<Type> {
        match node.kind() {
            TokenKind::Byte => Ok(Type::BYTE),
            TokenKind::Bool => Ok(Type::BOOL),
            TokenKind::Void => Ok(Type::VOID),
            TokenKind::Star => {
                let to = self.declared_type(node.child(0)?)?;
                if to.is_void() {
                    return Err(SemanticError::PointerToVoid { line: node.line() }.into());
                }
                Ok(Type::pointer(to))
            }
            TokenKind::LeftBracket => {
                let length = node.child(0)?;
                let Ok(n) = length.literal().parse::<usize>() else {
                    return Err(SemanticError::UnexpectedDataType {
                        expected: "array length".to_string(),
                        found: length.literal().to_string(),
                        line: node.line(),
                    }
                    .into());
                };
                let of = self.declared_type(node.child(1)?)?;
                if of.is_void() {
                    return Err(unexpected("byte, bool, pointer or array", &of, node).into());
                }
                Ok(Type::array(n, of))
            }
            other => internal(format!("`{}` is not a type on line {}", other, node.line())),
        }
    }

    pub fn infer(&self, node: &Node) -> Result<Type> {
        use TokenKind as K;
        match node.kind() {
            K::Number => match byte_literal(node) {
                Some(_) => Ok(Type::BYTE),
                None => Err(SemanticError::UnexpectedDataType {
                    expected: "byte".to_string(),
                    found: node.literal().to_string(),
                    line: node.line(),
                }
                .into()),
            },
            K::True | K::False => Ok(Type::BOOL),
            K::Identifier => self.identifier(node, false),
            K::LeftParen => self.call(node),
            K::Bang => {
                let operand = self.infer(node.child(0)?)?;
                if !operand.is_bool() {
                    return Err(unexpected("bool", &operand, node).into());
                }
                Ok(Type::BOOL)
            }
            K::Star => {
                let operand = self.infer(node.child(0)?)?;
                match operand {
                    Type::Pointer(to) => Ok(*to),
                    other => Err(SemanticError::InvalidIndirectOf {
                        found: other.to_string(),
                        line: node.line(),
                    }
                    .into()),
                }
            }
            K::LeftBracket => self.index(node),
            K::AndAnd | K::OrOr => {
                let (lhs, rhs) = self.binary(node)?;
                if !lhs.is_bool() {
                    return Err(unexpected("bool", &lhs, node).into());
                }
                if !rhs.is_bool() {
                    return Err(unexpected("bool", &rhs, node).into());
                }
                Ok(Type::BOOL)
            }
            K::Equal | K::NotEqual => {
                let (lhs, rhs) = self.binary(node)?;
                if lhs != rhs {
                    return Err(mismatch(&lhs, &rhs, node).into());
                }
                if !lhs.is_scalar() {
                    return Err(unexpected("byte, bool or pointer", &lhs, node).into());
                }
                Ok(Type::BOOL)
            }
            K::Less | K::LessEqual | K::Greater | K::GreaterEqual => {
                let (lhs, rhs) = self.binary(node)?;
                if !lhs.is_numeric() {
                    return Err(unexpected("numeric", &lhs, node).into());
                }
                if !rhs.is_numeric() {
                    return Err(unexpected("numeric", &rhs, node).into());
                }
                if lhs != rhs {
                    return Err(mismatch(&lhs, &rhs, node).into());
                }
                Ok(Type::BOOL)
            }
            K::Plus | K::Minus => {
                let (lhs, rhs) = self.binary(node)?;
                if !lhs.is_numeric() {
                    return Err(unexpected("numeric", &lhs, node).into());
                }
                if !rhs.is_byte() {
                    return Err(unexpected("byte", &rhs, node).into());
                }
                Ok(lhs)
            }
            K::ShiftLeft | K::ShiftRight | K::Slash | K::Percent => {
                let (lhs, rhs) = self.binary(node)?;
                if !lhs.is_byte() {
                    return Err(unexpected("byte", &lhs, node).into());
                }
                if !rhs.is_byte() {
                    return Err(unexpected("byte", &rhs, node).into());
                }
                Ok(Type::BYTE)
            }
            K::Ampersand | K::Pipe | K::Caret => {
                let (lhs, rhs) = self.binary(node)?;
                if !lhs.is_numeric() {
                    return Err(unexpected("numeric", &lhs, node).into());
                }
                if lhs != rhs {
                    return Err(mismatch(&lhs, &rhs, node).into());
                }
                Ok(lhs)
            }
            other => internal(format!(
                "`{}` is not an expression on line {}",
                other,
                node.line()
            )),
        }
    }

    fn binary(&self, node: &Node) -> Result<(Type, Type)> {
        let (lhs, rhs) = node.operands()?;
        Ok((self.infer(lhs)?, self.infer(rhs)?))
    }

    /// Resolve an identifier. `callee` is set when it sits directly under a
    /// call node as the called name.
    pub fn identifier(&self, node: &Node, callee: bool) -> Result<Type> {
        let name = node.literal();
        let Some(symbol) = self.env.lookup(name) else {
            return Err(SemanticError::UnresolvedReference {
                name: name.to_string(),
                line: node.line(),
            }
            .into());
        };
        match (callee, symbol.is_function) {
            (true, false) => Err(SemanticError::IdentifierIsNotFunction {
                name: name.to_string(),
                line: node.line(),
            }
            .into()),
            (false, true) => Err(SemanticError::IdentifierIsFunction {
                name: name.to_string(),
                line: node.line(),
            }
            .into()),
            _ => Ok(symbol.ty),
        }
    }

    fn call(&self, node: &Node) -> Result<Type> {
        let callee = node.child(0)?;
        let Type::Function { ret, args } = self.identifier(callee, true)? else {
            return internal(format!("`{}` has no signature", callee.literal()));
        };
        let given = &node.children[1..];
        if given.len() != args.len() {
            return Err(SemanticError::ParameterCountMismatch {
                name: callee.literal().to_string(),
                expected: args.len(),
                found: given.len(),
                line: node.line(),
            }
            .into());
        }
        for (param, arg) in args.iter().zip(given) {
            let ty = self.infer(arg)?;
            if *param != ty {
                return Err(mismatch(param, &ty, arg).into());
            }
        }
        Ok(*ret)
    }

    fn index(&self, node: &Node) -> Result<Type> {
        let (array, index) = node.operands()?;
        let array_ty = self.infer(array)?;
        let Type::Array { length, of } = array_ty else {
            return Err(SemanticError::InvalidIndirectOf {
                found: array_ty.to_string(),
                line: node.line(),
            }
            .into());
        };
        let index_ty = self.infer(index)?;
        if !index_ty.is_byte() {
            return Err(SemanticError::NonByteArrayIndex {
                found: index_ty.to_string(),
                line: node.line(),
            }
            .into());
        }
        if let Some(i) = byte_literal(index) {
            if i as usize >= length {
                return Err(SemanticError::ArrayIndexOutOfBounds {
                    index: i as usize,
                    length,
                    line: node.line(),
                }
                .into());
            }
        }
        Ok(*of)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::token::Token;
    use std::collections::HashMap;

    struct Env(HashMap<String, Symbol>);

    impl Environment for Env {
        fn lookup(&self, name: &str) -> Option<Symbol> {
            self.0.get(name).cloned()
        }
    }

    fn env() -> Env {
        let symbols = [
            Symbol::variable("b", Type::BYTE),
            Symbol::variable("f", Type::BOOL),
            Symbol::variable("p", Type::pointer(Type::BYTE)),
            Symbol::variable("a", Type::array(4, Type::pointer(Type::BOOL))),
            Symbol::function("g", Type::function(Type::BYTE, vec![Type::BYTE])),
        ];
        Env(symbols.into_iter().map(|s| (s.name.clone(), s)).collect())
    }

    fn leaf(kind: TokenKind, literal: &str) -> Node {
        Node::leaf(Token::new(kind, literal, 3))
    }

    fn op(kind: TokenKind, children: Vec<Node>) -> Node {
        Node::new(Token::new(kind, "", 3), children)
    }

    fn id(name: &str) -> Node {
        leaf(TokenKind::Identifier, name)
    }

    fn num(n: &str) -> Node {
        leaf(TokenKind::Number, n)
    }

    fn semantic(result: Result<Type>) -> SemanticError {
        match result {
            Err(Error::Semantic(e)) => e,
            other => panic!("expected semantic error, got {:?}", other),
        }
    }

    #[test]
    fn type_annotations() {
        let env = env();
        let factory = DataTypeFactory::new(&env);
        let ty = op(
            TokenKind::LeftBracket,
            vec![num("3"), op(TokenKind::Star, vec![leaf(TokenKind::Byte, "byte")])],
        );
        assert!(is_type(&ty));
        assert_eq!(factory.data_type(&ty).ok(), Some(Type::array(3, Type::pointer(Type::BYTE))));
    }

    #[test]
    fn pointer_to_void() {
        let env = env();
        let factory = DataTypeFactory::new(&env);
        let ty = op(TokenKind::Star, vec![leaf(TokenKind::Void, "void")]);
        assert_eq!(semantic(factory.declared_type(&ty)), SemanticError::PointerToVoid { line: 3 });
    }

    #[test]
    fn indirection_peels_layers() {
        let env = env();
        let factory = DataTypeFactory::new(&env);
        let expr = op(TokenKind::Star, vec![op(TokenKind::LeftBracket, vec![id("a"), num("1")])]);
        assert!(!is_type(&expr));
        assert_eq!(factory.data_type(&expr).ok(), Some(Type::BOOL));

        let bad = op(TokenKind::Star, vec![id("b")]);
        assert!(matches!(
            semantic(factory.infer(&bad)),
            SemanticError::InvalidIndirectOf { .. }
        ));
    }

    #[test]
    fn literal_index_bounds() {
        let env = env();
        let factory = DataTypeFactory::new(&env);
        let expr = op(TokenKind::LeftBracket, vec![id("a"), num("4")]);
        assert_eq!(
            semantic(factory.infer(&expr)),
            SemanticError::ArrayIndexOutOfBounds {
                index: 4,
                length: 4,
                line: 3
            }
        );
        let expr = op(TokenKind::LeftBracket, vec![id("a"), id("f")]);
        assert!(matches!(
            semantic(factory.infer(&expr)),
            SemanticError::NonByteArrayIndex { .. }
        ));
    }

    #[test]
    fn ordering_wants_numeric() {
        let env = env();
        let factory = DataTypeFactory::new(&env);
        let expr = op(TokenKind::Less, vec![id("f"), id("b")]);
        assert_eq!(
            semantic(factory.infer(&expr)),
            SemanticError::UnexpectedDataType {
                expected: "numeric".to_string(),
                found: "bool".to_string(),
                line: 3
            }
        );
    }

    #[test]
    fn pointer_arithmetic_keeps_pointer() {
        let env = env();
        let factory = DataTypeFactory::new(&env);
        let expr = op(TokenKind::Plus, vec![id("p"), num("2")]);
        assert_eq!(factory.infer(&expr).ok(), Some(Type::pointer(Type::BYTE)));
        let expr = op(TokenKind::Plus, vec![id("b"), id("p")]);
        assert!(factory.infer(&expr).is_err());
    }

    #[test]
    fn calls() {
        let env = env();
        let factory = DataTypeFactory::new(&env);
        let ok = op(TokenKind::LeftParen, vec![id("g"), num("1")]);
        assert_eq!(factory.infer(&ok).ok(), Some(Type::BYTE));

        let arity = op(TokenKind::LeftParen, vec![id("g")]);
        assert!(matches!(
            semantic(factory.infer(&arity)),
            SemanticError::ParameterCountMismatch { expected: 1, found: 0, .. }
        ));

        let wrong = op(TokenKind::LeftParen, vec![id("g"), id("f")]);
        assert!(matches!(
            semantic(factory.infer(&wrong)),
            SemanticError::DataTypesMismatch { .. }
        ));

        let not_fn = op(TokenKind::LeftParen, vec![id("b")]);
        assert!(matches!(
            semantic(factory.infer(&not_fn)),
            SemanticError::IdentifierIsNotFunction { .. }
        ));

        assert!(matches!(
            semantic(factory.infer(&id("g"))),
            SemanticError::IdentifierIsFunction { .. }
        ));
    }

    #[test]
    fn literal_must_fit_in_byte() {
        let env = env();
        let factory = DataTypeFactory::new(&env);
        assert_eq!(
            semantic(factory.infer(&num("256"))),
            SemanticError::UnexpectedDataType {
                expected: "byte".to_string(),
                found: "256".to_string(),
                line: 3
            }
        );
    }

    #[test]
    fn unresolved() {
        let env = env();
        let factory = DataTypeFactory::new(&env);
        assert!(matches!(
            semantic(factory.infer(&id("nope"))),
            SemanticError::UnresolvedReference { .. }
        ));
    }
}
