//! Semantic analysis: scope construction and type checking of every
//! statement, dispatched on the token that heads the statement node.

mod factory;
mod intrinsic;

pub use factory::{byte_literal, is_type, DataTypeFactory, Environment};
pub use intrinsic::Intrinsic;

use crate::error::{internal, Result, SemanticError};
use crate::grammar::{Node, SyntaxTree};
use crate::token::TokenKind;
use crate::types::{ScopeId, ScopeTree, Symbol, Type};
use strum::IntoEnumIterator;

pub struct Analyzer {
    scopes: ScopeTree,
    current: ScopeId,
    /// Declared return type of the function being analyzed.
    returns: Option<Type>,
}

impl Environment for Analyzer {
    fn lookup(&self, name: &str) -> Option<Symbol> {
        self.scopes.resolve(self.current, name).cloned()
    }
}

/// Check a whole program. The returned scope tree holds every global and
/// function symbol in its root.
pub fn analyze(tree: &SyntaxTree) -> Result<ScopeTree> {
    let mut analyzer = Analyzer::new();
    for statement in tree.statements()? {
        analyzer.statement(statement)?;
    }
    Ok(analyzer.scopes)
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        let mut scopes = ScopeTree::new();
        for intrinsic in Intrinsic::iter() {
            scopes.declare(ScopeTree::ROOT, intrinsic.symbol());
        }
        Analyzer {
            scopes,
            current: ScopeTree::ROOT,
            returns: None,
        }
    }

    fn factory(&self) -> DataTypeFactory<'_, Self> {
        DataTypeFactory::new(self)
    }

    fn declare(&mut self, node: &Node, ty: Type, is_function: bool) -> Result<()> {
        let name = node.literal().to_string();
        let symbol = Symbol {
            name: name.clone(),
            ty,
            is_function,
        };
        if !self.scopes.declare(self.current, symbol) {
            return Err(SemanticError::NameAlreadyInUse {
                name,
                line: node.line(),
            }
            .into());
        }
        Ok(())
    }

    pub fn statement(&mut self, node: &Node) -> Result<()> {
        match node.kind() {
            TokenKind::Let => self.let_statement(node),
            TokenKind::Fn => self.function(node),
            TokenKind::LeftBrace => self.block(node),
            TokenKind::Assign => self.assign(node),
            TokenKind::LeftParen => self.call(node),
            TokenKind::If => self.if_statement(node),
            TokenKind::While => self.while_statement(node),
            TokenKind::Return => self.return_statement(node),
            other => internal(format!(
                "`{}` is not a statement on line {}",
                other,
                node.line()
            )),
        }
    }

    /// Statements of a block in a fresh child scope.
    fn block(&mut self, node: &Node) -> Result<()> {
        let outer = self.current;
        self.current = self.scopes.open(outer);
        let result = node.children.iter().try_for_each(|s| self.statement(s));
        self.current = outer;
        result
    }

    fn let_statement(&mut self, node: &Node) -> Result<()> {
        let name = node.child(0)?;
        let ty = self.factory().data_type(node.child(1)?)?;
        if ty.is_void() {
            return Err(SemanticError::UnexpectedDataType {
                expected: "byte, bool, pointer or array".to_string(),
                found: ty.to_string(),
                line: node.line(),
            }
            .into());
        }
        if let Some(init) = node.children.get(2) {
            if !ty.is_scalar() {
                return Err(SemanticError::UnexpectedDataType {
                    expected: "byte, bool or pointer".to_string(),
                    found: ty.to_string(),
                    line: node.line(),
                }
                .into());
            }
            let init_ty = self.factory().infer(init)?;
            if init_ty != ty {
                return Err(SemanticError::DataTypesMismatch {
                    left: ty.to_string(),
                    right: init_ty.to_string(),
                    line: node.line(),
                }
                .into());
            }
        }
        self.declare(name, ty, false)
    }

    fn function(&mut self, node: &Node) -> Result<()> {
        let name = node.child(0)?;
        let params = node.child(1)?;
        let ret = self.factory().data_type(node.child(2)?)?;
        let body = node.child(3)?;

        if !(ret.is_scalar() || ret.is_void()) {
            return Err(SemanticError::UnexpectedDataType {
                expected: "byte, bool, pointer or void".to_string(),
                found: ret.to_string(),
                line: node.line(),
            }
            .into());
        }

        let mut args = vec![];
        for param in &params.children {
            let ty = self.factory().data_type(param.child(0)?)?;
            if !ty.is_scalar() {
                return Err(SemanticError::UnexpectedDataType {
                    expected: "byte, bool or pointer".to_string(),
                    found: ty.to_string(),
                    line: param.line(),
                }
                .into());
            }
            args.push(ty);
        }

        // Registered before the body so the function can call itself.
        self.declare(name, Type::function(ret.clone(), args.clone()), true)?;

        let outer = self.current;
        self.current = self.scopes.open(outer);
        self.returns = Some(ret.clone());
        let result = self.function_body(params, &args, body, &ret);
        self.returns = None;
        self.current = outer;
        result
    }

    fn function_body(&mut self, params: &Node, args: &[Type], body: &Node, ret: &Type) -> Result<()> {
        for (param, ty) in params.children.iter().zip(args) {
            self.declare(param, ty.clone(), false)?;
        }
        for statement in &body.children {
            self.statement(statement)?;
        }
        let actual = match body.children.last() {
            Some(last) if last.kind() == TokenKind::Return => self.returned_type(last)?,
            _ => Type::VOID,
        };
        if actual != *ret {
            return Err(SemanticError::DataTypesMismatch {
                left: ret.to_string(),
                right: actual.to_string(),
                line: body.children.last().map_or(body.line(), Node::line),
            }
            .into());
        }
        Ok(())
    }

    fn returned_type(&self, node: &Node) -> Result<Type> {
        match node.children.first() {
            Some(value) => self.factory().infer(value),
            None => Ok(Type::VOID),
        }
    }

    fn return_statement(&mut self, node: &Node) -> Result<()> {
        let Some(expected) = self.returns.clone() else {
            return internal(format!("return outside of a function on line {}", node.line()));
        };
        let actual = self.returned_type(node)?;
        if actual != expected {
            return Err(SemanticError::DataTypesMismatch {
                left: expected.to_string(),
                right: actual.to_string(),
                line: node.line(),
            }
            .into());
        }
        Ok(())
    }

    fn assign(&mut self, node: &Node) -> Result<()> {
        let (lhs, rhs) = node.operands()?;
        if !matches!(
            lhs.kind(),
            TokenKind::Identifier | TokenKind::Star | TokenKind::LeftBracket
        ) {
            return Err(SemanticError::UnexpectedDataType {
                expected: "assignable location".to_string(),
                found: lhs.literal().to_string(),
                line: node.line(),
            }
            .into());
        }
        let factory = self.factory();
        let lhs_ty = factory.infer(lhs)?;
        if !lhs_ty.is_scalar() {
            return Err(SemanticError::UnexpectedDataType {
                expected: "byte, bool or pointer".to_string(),
                found: lhs_ty.to_string(),
                line: node.line(),
            }
            .into());
        }
        let rhs_ty = factory.infer(rhs)?;
        if lhs_ty != rhs_ty {
            return Err(SemanticError::DataTypesMismatch {
                left: lhs_ty.to_string(),
                right: rhs_ty.to_string(),
                line: node.line(),
            }
            .into());
        }
        Ok(())
    }

    /// A call in statement position must not produce a value.
    fn call(&mut self, node: &Node) -> Result<()> {
        let ty = self.factory().infer(node)?;
        if !ty.is_void() {
            return Err(SemanticError::UnreachableCode {
                name: node.child(0)?.literal().to_string(),
                line: node.line(),
            }
            .into());
        }
        Ok(())
    }

    fn condition(&self, node: &Node) -> Result<()> {
        let ty = self.factory().infer(node)?;
        if !ty.is_bool() {
            return Err(SemanticError::UnexpectedDataType {
                expected: "bool".to_string(),
                found: ty.to_string(),
                line: node.line(),
            }
            .into());
        }
        Ok(())
    }

    fn if_statement(&mut self, node: &Node) -> Result<()> {
        self.condition(node.child(0)?)?;
        self.block(node.child(1)?)?;
        match node.children.get(2) {
            Some(other) if other.kind() == TokenKind::If => self.if_statement(other),
            Some(other) => self.block(other),
            None => Ok(()),
        }
    }

    fn while_statement(&mut self, node: &Node) -> Result<()> {
        self.condition(node.child(0)?)?;
        self.block(node.child(1)?)
    }
}
