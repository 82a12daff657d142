use crate::emitter::{Image, Operand};
use crate::error::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SymbolMap {
    pub entry: u16,
    pub stack: u16,
    pub code: IndexMap<String, CodeEntry>,
    pub data: IndexMap<String, DataEntry>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeEntry {
    pub addr: u16,
    pub size: u16,
    #[serde(rename = "type")]
    pub ty: String,
    /// Offset of every frame slot from the frame base.
    pub stacks: IndexMap<String, u16>,
    /// Slots cached in registers for the whole function.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub registers: IndexMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataEntry {
    pub addr: u16,
    pub size: usize,
    #[serde(rename = "type")]
    pub ty: String,
}

impl SymbolMap {
    pub fn generate(image: &Image) -> Self {
        let code = image
            .functions
            .iter()
            .map(|f| {
                let stacks = f
                    .frame
                    .slots
                    .iter()
                    .map(|slot| (slot.name.clone(), slot.offset))
                    .collect();
                let registers = f
                    .pinned
                    .iter()
                    .map(|(name, operand)| {
                        let regs = match operand {
                            Operand::Single(r) => r.to_string(),
                            Operand::Pair { hi, lo } => format!("{}:{}", hi, lo),
                        };
                        (name.clone(), regs)
                    })
                    .collect();
                let entry = CodeEntry {
                    addr: f.addr,
                    size: f.size(),
                    ty: f.ty.to_string(),
                    stacks,
                    registers,
                };
                (f.name.clone(), entry)
            })
            .collect();

        let data = image
            .globals
            .iter()
            .map(|(name, global)| {
                let entry = DataEntry {
                    addr: global.addr,
                    size: global.ty.size_of(),
                    ty: global.ty.to_string(),
                };
                (name.clone(), entry)
            })
            .collect();

        SymbolMap {
            entry: image.entry,
            stack: image.stack_start,
            code,
            data,
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}
