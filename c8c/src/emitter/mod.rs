mod code;
mod frame;
mod function;
mod layout;
mod optimizer;
mod registers;

pub use code::{Code, Imm, Line};
pub use frame::{FrameTree, Slot, SAVE_AREA};
pub use layout::{Global, GlobalLayout};
pub use registers::{Operand, RegisterAllocator};

use crate::error::{internal, Error, ResourceError, Result};
use crate::grammar::SyntaxTree;
use crate::token::TokenKind;
use crate::types::{ScopeTree, Type};
use crate::Config;
use bimap::BiMap;
use c8arch::inst::Inst;
use c8arch::mem::{GLOBAL_BASE, MEMORY_SIZE, PROGRAM_START, TRAMPOLINE};
use c8arch::reg::Reg;
use function::FunctionCodegen;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Linked function, kept for listings and symbol maps.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub addr: u16,
    pub ty: Type,
    pub frame: FrameTree,
    /// Frame slots living in registers, by slot name.
    pub pinned: Vec<(String, Operand)>,
    pub code: Code,
}

impl Function {
    pub fn size(&self) -> u16 {
        self.code.size()
    }
}

/// A complete memory image together with everything placed in it.
#[derive(Debug, Clone)]
pub struct Image {
    pub memory: Vec<u8>,
    pub entry: u16,
    pub stack_start: u16,
    pub code_start: u16,
    pub globals: IndexMap<String, Global>,
    pub functions: Vec<Function>,
    /// Address of every label, functions included.
    pub labels: HashMap<String, u16>,
}

impl Image {
    /// Bytes from the program start, the form CHIP-8 interpreters load.
    pub fn program(&self) -> &[u8] {
        &self.memory[PROGRAM_START as usize..]
    }

    /// Big-endian word at `addr`, if both bytes lie in memory.
    pub fn word(&self, addr: u16) -> Option<u16> {
        let addr = addr as usize;
        match self.memory.get(addr..addr + 2)? {
            &[hi, lo] => Some(u16::from_be_bytes([hi, lo])),
            _ => None,
        }
    }
}

/// Generate code for every function of an analyzed tree and link it.
pub fn emit(tree: &SyntaxTree, scopes: &ScopeTree, config: &Config) -> Result<Image> {
    let statements = tree.statements()?;
    let layout = GlobalLayout::build(statements, scopes)?;

    let mut functions = vec![];
    for node in statements.iter().filter(|s| s.kind() == TokenKind::Fn) {
        let name = node.child(0)?.literal().to_string();
        let Some(symbol) = scopes.root().symbols.get(&name) else {
            return internal(format!("function `{}` was never declared", name));
        };
        let frame = FrameTree::build(node)?;
        let counts = optimizer::count_uses(node, &frame);

        // Every pinned slot is a register expressions can no longer use, so
        // give them back one by one until the function fits.
        let mut budget = config.cache_registers.min(optimizer::MAX_PINNED);
        let (pinned, code) = loop {
            let selected = optimizer::select(&frame, &counts, budget);
            let mut gen = FunctionCodegen::new(&name, scopes, &layout, &frame, name == config.entry);
            gen.pin(&selected)?;
            let mut pinned: Vec<(String, Operand)> = gen
                .pinned()
                .iter()
                .map(|(&id, &operand)| (frame.slots[id].name.clone(), operand))
                .collect();
            pinned.sort_by_key(|(_, operand)| operand.low());
            match gen.generate(node) {
                Ok(code) => break (pinned, code),
                Err(Error::Resource(ResourceError::RegisterPoolExhausted)) if budget > 0 => {
                    budget -= 1;
                }
                Err(e) => return Err(e),
            }
        };

        functions.push(Function {
            name,
            addr: 0,
            ty: symbol.ty.clone(),
            frame,
            pinned,
            code,
        });
    }

    link(layout, functions, config)
}

/// Pack code against the top of memory, resolve labels and write the image.
fn link(layout: GlobalLayout, mut functions: Vec<Function>, config: &Config) -> Result<Image> {
    let total: usize = functions.iter().map(|f| f.size() as usize).sum();
    let stack_start = layout.end();
    if (stack_start as usize) + total > MEMORY_SIZE {
        return Err(ResourceError::CodeSectionOverflow(total, stack_start as usize).into());
    }
    let code_start = (MEMORY_SIZE - total) as u16;

    let mut entries: BiMap<String, u16> = BiMap::new();
    let mut labels: HashMap<String, u16> = HashMap::new();
    let mut addr = code_start;
    for function in &mut functions {
        function.addr = addr;
        entries.insert(function.name.clone(), addr);
        for line in &function.code.lines {
            match line {
                Line::Label(name) => {
                    labels.insert(name.clone(), addr);
                }
                Line::Inst(_) => addr += c8arch::mem::INST_SIZE,
            }
        }
    }

    let Some(&entry) = entries.get_by_left(&config.entry) else {
        return internal(format!("entry function `{}` is not defined", config.entry));
    };

    let mut memory = vec![0u8; MEMORY_SIZE];
    let [sp_hi, sp_lo] = stack_start.to_be_bytes();
    let prologue = [
        Inst::LD(Reg::SP_HI, sp_hi),
        Inst::LD(Reg::SP_LO, sp_lo),
        Inst::JP(entry),
    ];
    let trampoline = [Inst::LDI(0), Inst::RET()];
    write(&mut memory, PROGRAM_START, &prologue);
    write(&mut memory, TRAMPOLINE, &trampoline);

    let base = GLOBAL_BASE as usize;
    memory[base..base + layout.bytes.len()].copy_from_slice(&layout.bytes);

    for function in &functions {
        let mut resolved = vec![];
        for line in &function.code.lines {
            if let Line::Inst(inst) = line {
                resolved.push(inst.clone().resolve(|imm| match imm {
                    Imm::Addr(addr) => Ok(addr),
                    Imm::Label(name) => match labels.get(&name) {
                        Some(&addr) => Ok(addr),
                        None => internal(format!("undefined label `{}`", name)),
                    },
                })?);
            }
        }
        write(&mut memory, function.addr, &resolved);
    }

    Ok(Image {
        memory,
        entry,
        stack_start,
        code_start,
        globals: layout.globals,
        functions,
        labels,
    })
}

fn write(memory: &mut [u8], addr: u16, insts: &[Inst]) {
    for (i, inst) in insts.iter().enumerate() {
        let at = addr as usize + i * c8arch::mem::INST_SIZE as usize;
        memory[at..at + 2].copy_from_slice(&inst.to_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use crate::grammar;
    use crate::lexer::Lexer;

    fn build(code: &str) -> Result<Image> {
        let tree = grammar::parse(&Lexer::new(code).parse()).into_tree()?;
        let scopes = analyze(&tree)?;
        emit(&tree, &scopes, &Config::default())
    }

    #[test]
    fn code_ends_at_top_of_memory() {
        let image = build("fn f() void {\n}\nfn main() void {\n}").unwrap();
        // f: RET, main: JP halt
        assert_eq!(image.code_start, 0x1000 - 4);
        assert_eq!(image.functions[0].addr, 0xFFC);
        assert_eq!(image.entry, 0xFFE);
        assert_eq!(image.word(0xFFC), Some(0x00EE));
        assert_eq!(image.word(0xFFE), Some(0x1FFE));
        assert_eq!(image.word(0x204), Some(0x1FFE));
        assert_eq!(image.word(0xFFF), None);
        assert_eq!(image.word(u16::MAX), None);
    }

    #[test]
    fn stack_follows_globals() {
        let image = build("let a [4]byte\nfn main() void {\n}").unwrap();
        assert_eq!(image.stack_start, GLOBAL_BASE + 4);
        assert_eq!(image.word(0x200), Some(0x6D02));
        assert_eq!(image.word(0x202), Some(0x6E10));
    }

    #[test]
    fn trampoline_is_installed() {
        let image = build("fn main() void {\n}").unwrap();
        assert_eq!(&image.memory[0x206..0x20A], &[0xA0, 0x00, 0x00, 0xEE]);
        assert_eq!(image.program().len(), MEMORY_SIZE - PROGRAM_START as usize);
    }

    #[test]
    fn missing_entry() {
        assert!(matches!(build("fn f() void {\n}"), Err(Error::Internal(_))));
    }

    #[test]
    fn labels_resolve_inside_function() {
        let image = build("fn main() void {\nwhile true {\n}\n}").unwrap();
        let top = image.labels["main.while1"];
        assert_eq!(top, image.entry);
        let end = image.labels["main.wend2"];
        assert!(end > top);
    }
}
