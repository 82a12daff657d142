use crate::types::{Symbol, Type};
use strum::{Display, EnumIter, EnumString};

/// Device functions that exist before any user code. They are ordinary
/// callees to the analyzer; the emitter expands them inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Intrinsic {
    Draw,
    GetDelay,
    SetDelay,
    GetSound,
    SetSound,
}

impl Intrinsic {
    pub fn signature(self) -> Type {
        match self {
            Intrinsic::Draw => Type::function(
                Type::BOOL,
                vec![Type::BYTE, Type::BYTE, Type::pointer(Type::BYTE), Type::BYTE],
            ),
            Intrinsic::GetDelay | Intrinsic::GetSound => Type::function(Type::BYTE, vec![]),
            Intrinsic::SetDelay | Intrinsic::SetSound => {
                Type::function(Type::VOID, vec![Type::BYTE])
            }
        }
    }

    pub fn symbol(self) -> Symbol {
        Symbol::function(self.to_string(), self.signature())
    }

    pub fn parse(name: &str) -> Option<Self> {
        name.parse().ok()
    }
}
