use super::Type;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    pub is_function: bool,
}

impl Symbol {
    pub fn variable(name: impl Into<String>, ty: Type) -> Self {
        Symbol {
            name: name.into(),
            ty,
            is_function: false,
        }
    }

    pub fn function(name: impl Into<String>, ty: Type) -> Self {
        Symbol {
            name: name.into(),
            ty,
            is_function: true,
        }
    }
}

pub type ScopeId = usize;

/// One lexical region. Owns its bindings; lookups that miss fall back to the
/// parent.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub symbols: IndexMap<String, Symbol>,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
}

/// Arena of scopes. Index 0 is the global scope. Closed scopes stay in the
/// arena as children of their parent.
#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    pub const ROOT: ScopeId = 0;

    pub fn new() -> Self {
        ScopeTree {
            scopes: vec![Scope::default()],
        }
    }

    pub fn open(&mut self, parent: ScopeId) -> ScopeId {
        let id = self.scopes.len();
        self.scopes.push(Scope {
            parent: Some(parent),
            ..Default::default()
        });
        self.scopes[parent].children.push(id);
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    pub fn root(&self) -> &Scope {
        &self.scopes[Self::ROOT]
    }

    /// Insert into `scope`. Fails iff the name is already bound in that very
    /// scope; shadowing an outer binding is allowed.
    pub fn declare(&mut self, scope: ScopeId, symbol: Symbol) -> bool {
        let symbols = &mut self.scopes[scope].symbols;
        if symbols.contains_key(&symbol.name) {
            return false;
        }
        symbols.insert(symbol.name.clone(), symbol);
        true
    }

    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let scope = &self.scopes[id];
            if let Some(symbol) = scope.symbols.get(name) {
                return Some(symbol);
            }
            cursor = scope.parent;
        }
        None
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_in_same_scope() {
        let mut tree = ScopeTree::new();
        assert!(tree.declare(ScopeTree::ROOT, Symbol::variable("x", Type::BYTE)));
        assert!(!tree.declare(ScopeTree::ROOT, Symbol::variable("x", Type::BOOL)));
        assert_eq!(tree.resolve(ScopeTree::ROOT, "x").map(|s| &s.ty), Some(&Type::BYTE));
    }

    #[test]
    fn shadowing_leaves_outer_binding() {
        let mut tree = ScopeTree::new();
        tree.declare(ScopeTree::ROOT, Symbol::variable("x", Type::BYTE));
        let inner = tree.open(ScopeTree::ROOT);
        assert!(tree.declare(inner, Symbol::variable("x", Type::BOOL)));
        assert_eq!(tree.resolve(inner, "x").map(|s| &s.ty), Some(&Type::BOOL));
        assert_eq!(tree.resolve(ScopeTree::ROOT, "x").map(|s| &s.ty), Some(&Type::BYTE));
        assert_eq!(tree.root().children, vec![inner]);
    }

    #[test]
    fn lookup_walks_parents() {
        let mut tree = ScopeTree::new();
        tree.declare(ScopeTree::ROOT, Symbol::function("f", Type::function(Type::VOID, vec![])));
        let a = tree.open(ScopeTree::ROOT);
        let b = tree.open(a);
        assert!(tree.resolve(b, "f").is_some_and(|s| s.is_function));
        assert!(tree.resolve(b, "g").is_none());
    }
}
