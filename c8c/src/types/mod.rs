mod scope;

pub use scope::{Scope, ScopeId, ScopeTree, Symbol};

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Simple {
    Byte,
    Bool,
    Void,
}

impl Simple {
    pub fn size(self) -> usize {
        match self {
            Simple::Byte | Simple::Bool => 1,
            Simple::Void => 0,
        }
    }
}

/// Language types. Equality is structural: the derived `PartialEq` compares
/// element types recursively and array lengths exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Type {
    Simple(Simple),
    Pointer(Box<Type>),
    Array { length: usize, of: Box<Type> },
    Function { ret: Box<Type>, args: Vec<Type> },
}

impl Type {
    pub const BYTE: Type = Type::Simple(Simple::Byte);
    pub const BOOL: Type = Type::Simple(Simple::Bool);
    pub const VOID: Type = Type::Simple(Simple::Void);

    pub fn pointer(to: Type) -> Type {
        Type::Pointer(Box::new(to))
    }

    pub fn array(length: usize, of: Type) -> Type {
        Type::Array {
            length,
            of: Box::new(of),
        }
    }

    pub fn function(ret: Type, args: Vec<Type>) -> Type {
        Type::Function {
            ret: Box::new(ret),
            args,
        }
    }

    /// Bytes of storage a value of this type occupies, or `None` when the
    /// count does not fit in `usize`.
    pub fn checked_size(&self) -> Option<usize> {
        match self {
            Type::Simple(simple) => Some(simple.size()),
            Type::Pointer(_) => Some(2),
            Type::Array { length, of } => length.checked_mul(of.checked_size()?),
            Type::Function { .. } => Some(0),
        }
    }

    /// Saturating form of [`Type::checked_size`] for types already placed.
    pub fn size_of(&self) -> usize {
        self.checked_size().unwrap_or(usize::MAX)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_byte() || self.is_pointer()
    }

    pub fn is_byte(&self) -> bool {
        *self == Type::BYTE
    }

    pub fn is_bool(&self) -> bool {
        *self == Type::BOOL
    }

    pub fn is_void(&self) -> bool {
        *self == Type::VOID
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }

    /// Types that fit in registers: byte, bool and pointers.
    pub fn is_scalar(&self) -> bool {
        self.is_byte() || self.is_bool() || self.is_pointer()
    }
}

pub fn compare(t1: &Type, t2: &Type) -> bool {
    t1 == t2
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Simple(Simple::Byte) => write!(f, "byte"),
            Type::Simple(Simple::Bool) => write!(f, "bool"),
            Type::Simple(Simple::Void) => write!(f, "void"),
            Type::Pointer(to) => write!(f, "*{}", to),
            Type::Array { length, of } => write!(f, "[{}]{}", length, of),
            Type::Function { ret, args } => {
                write!(f, "fn(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ") {}", ret)
            }
        }
    }
}
