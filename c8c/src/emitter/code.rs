use c8arch::inst::Inst;
use std::fmt;

/// Address operand of an instruction before linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Imm {
    Addr(u16),
    Label(String),
}

impl fmt::Display for Imm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Imm::Addr(addr) => write!(f, "0x{:03X}", addr),
            Imm::Label(label) => write!(f, "{}", label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Label(String),
    Inst(Inst<Imm>),
}

/// Instruction stream of one function.
#[derive(Debug, Clone, Default)]
pub struct Code {
    pub name: String,
    pub lines: Vec<Line>,
    labels: usize,
}

impl Code {
    pub fn new(name: &str) -> Self {
        Code {
            name: name.to_string(),
            lines: vec![],
            labels: 0,
        }
    }

    pub fn emit(&mut self, inst: Inst<Imm>) {
        self.lines.push(Line::Inst(inst));
    }

    pub fn label(&mut self, label: &str) {
        self.lines.push(Line::Label(label.to_string()));
    }

    /// Label unique within the program: function name plus a counter.
    pub fn fresh_label(&mut self, hint: &str) -> String {
        self.labels += 1;
        format!("{}.{}{}", self.name, hint, self.labels)
    }

    /// Size in bytes.
    pub fn size(&self) -> u16 {
        let count = self
            .lines
            .iter()
            .filter(|line| matches!(line, Line::Inst(_)))
            .count();
        count as u16 * c8arch::mem::INST_SIZE
    }
}

pub fn label(name: &str) -> Imm {
    Imm::Label(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use c8arch::reg::Reg;

    #[test]
    fn size_ignores_labels() {
        let mut code = Code::new("f");
        let top = code.fresh_label("loop");
        code.label(&top);
        code.emit(Inst::LD(Reg::V2, 1));
        code.emit(Inst::JP(label(&top)));
        assert_eq!(code.size(), 4);
        assert_eq!(top, "f.loop1");
    }
}
