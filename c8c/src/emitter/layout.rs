use crate::error::{internal, ResourceError, Result};
use crate::grammar::Node;
use crate::token::TokenKind;
use crate::types::{ScopeTree, Type};
use c8arch::mem::{GLOBAL_BASE, GLOBAL_LIMIT};
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    pub addr: u16,
    pub ty: Type,
}

/// Static placement of top-level variables.
#[derive(Debug, Clone)]
pub struct GlobalLayout {
    pub globals: IndexMap<String, Global>,
    /// Initial contents of the global section, starting at `GLOBAL_BASE`.
    pub bytes: Vec<u8>,
}

impl GlobalLayout {
    /// Place every top-level `let` in declaration order.
    pub fn build(statements: &[Node], scopes: &ScopeTree) -> Result<Self> {
        let mut layout = GlobalLayout {
            globals: IndexMap::new(),
            bytes: vec![],
        };
        for statement in statements.iter().filter(|s| s.kind() == TokenKind::Let) {
            let name = statement.child(0)?.literal();
            let Some(symbol) = scopes.root().symbols.get(name) else {
                return internal(format!("global `{}` was never declared", name));
            };
            layout.place(name, &symbol.ty)?;
        }
        Ok(layout)
    }

    fn place(&mut self, name: &str, ty: &Type) -> Result<()> {
        let addr = self.end();
        let size = ty.checked_size().unwrap_or(usize::MAX);
        match (addr as usize).checked_add(size) {
            Some(end) if end <= GLOBAL_LIMIT as usize => {}
            _ => return Err(ResourceError::GlobalSectionOverflow(size, addr as usize).into()),
        }
        initial(ty, addr, &mut self.bytes);
        self.globals.insert(
            name.to_string(),
            Global {
                addr,
                ty: ty.clone(),
            },
        );
        Ok(())
    }

    /// First address past the global section, where the stack begins.
    pub fn end(&self) -> u16 {
        GLOBAL_BASE + self.bytes.len() as u16
    }
}

/// Initial bytes of a value placed at `addr`. Pointers hold the address right
/// after themselves; everything else starts zeroed.
fn initial(ty: &Type, addr: u16, out: &mut Vec<u8>) {
    match ty {
        Type::Pointer(_) => out.extend((addr + 2).to_be_bytes()),
        Type::Array { length, of } => {
            let step = of.size_of() as u16;
            for i in 0..*length as u16 {
                initial(of, addr + i * step, out);
            }
        }
        other => out.extend(std::iter::repeat(0).take(other.size_of())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use crate::grammar;
    use crate::lexer::Lexer;

    fn layout(code: &str) -> Result<GlobalLayout> {
        let tree = grammar::parse(&Lexer::new(code).parse()).into_tree()?;
        let scopes = analyze(&tree)?;
        GlobalLayout::build(tree.statements()?, &scopes)
    }

    #[test]
    fn byte_then_pointer() {
        let layout = layout("let x byte\nlet y *byte").unwrap();
        assert_eq!(layout.globals["x"].addr, GLOBAL_BASE);
        assert_eq!(layout.globals["y"].addr, GLOBAL_BASE + 1);
        assert_eq!(layout.end(), GLOBAL_BASE + 3);
        let after = (GLOBAL_BASE + 3).to_be_bytes();
        assert_eq!(layout.bytes, vec![0, after[0], after[1]]);
    }

    #[test]
    fn array_of_pointers() {
        let layout = layout("let a [2]*bool").unwrap();
        let first = (GLOBAL_BASE + 2).to_be_bytes();
        let second = (GLOBAL_BASE + 4).to_be_bytes();
        assert_eq!(layout.bytes, vec![first[0], first[1], second[0], second[1]]);
    }

    #[test]
    fn overflow() {
        let err = layout("let big [250][10]byte").unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Resource(ResourceError::GlobalSectionOverflow(2500, _))
        ));
    }

    #[test]
    fn size_that_overflows_usize() {
        let err = layout("let a [9223372036854775808][2]byte").unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Resource(ResourceError::GlobalSectionOverflow(usize::MAX, 0x20C))
        ));
    }

    #[test]
    fn functions_take_no_space() {
        let layout = layout("let a byte\nfn f() void {\n}\nlet b byte").unwrap();
        assert_eq!(layout.globals["b"].addr, GLOBAL_BASE + 1);
    }
}
