use crate::reg::Reg;

use color_print::cformat;

/// One machine instruction. `I` is the type of 12-bit address operands, so
/// code can carry symbolic targets until link time and be resolved with
/// [`Inst::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inst<I = u16> {
    CLS(),
    RET(),
    JP(I),
    CALL(I),

    SE(Reg, u8),
    SNE(Reg, u8),
    SER(Reg, Reg),
    SNER(Reg, Reg),

    LD(Reg, u8),
    ADD(Reg, u8),

    MOV(Reg, Reg),
    OR(Reg, Reg),
    AND(Reg, Reg),
    XOR(Reg, Reg),
    ADDR(Reg, Reg),
    SUB(Reg, Reg),
    SHR(Reg),
    SUBN(Reg, Reg),
    SHL(Reg),

    LDI(I),
    ADDI(Reg),
    DRW(Reg, Reg, u8),

    GDT(Reg),
    GST(Reg),
    SDT(Reg),
    SST(Reg),

    STM(Reg),
    LDM(Reg),
}

impl<I> Inst<I> {
    pub fn resolve<J, E>(self, mut f: impl FnMut(I) -> Result<J, E>) -> Result<Inst<J>, E> {
        Ok(match self {
            Inst::JP(a) => Inst::JP(f(a)?),
            Inst::CALL(a) => Inst::CALL(f(a)?),
            Inst::LDI(a) => Inst::LDI(f(a)?),

            Inst::CLS() => Inst::CLS(),
            Inst::RET() => Inst::RET(),
            Inst::SE(x, nn) => Inst::SE(x, nn),
            Inst::SNE(x, nn) => Inst::SNE(x, nn),
            Inst::SER(x, y) => Inst::SER(x, y),
            Inst::SNER(x, y) => Inst::SNER(x, y),
            Inst::LD(x, nn) => Inst::LD(x, nn),
            Inst::ADD(x, nn) => Inst::ADD(x, nn),
            Inst::MOV(x, y) => Inst::MOV(x, y),
            Inst::OR(x, y) => Inst::OR(x, y),
            Inst::AND(x, y) => Inst::AND(x, y),
            Inst::XOR(x, y) => Inst::XOR(x, y),
            Inst::ADDR(x, y) => Inst::ADDR(x, y),
            Inst::SUB(x, y) => Inst::SUB(x, y),
            Inst::SHR(x) => Inst::SHR(x),
            Inst::SUBN(x, y) => Inst::SUBN(x, y),
            Inst::SHL(x) => Inst::SHL(x),
            Inst::ADDI(x) => Inst::ADDI(x),
            Inst::DRW(x, y, n) => Inst::DRW(x, y, n),
            Inst::GDT(x) => Inst::GDT(x),
            Inst::GST(x) => Inst::GST(x),
            Inst::SDT(x) => Inst::SDT(x),
            Inst::SST(x) => Inst::SST(x),
            Inst::STM(x) => Inst::STM(x),
            Inst::LDM(x) => Inst::LDM(x),
        })
    }
}

fn xnn(op: u16, x: Reg, nn: u8) -> u16 {
    op << 12 | (x.index() as u16) << 8 | nn as u16
}

fn xy(op: u16, x: Reg, y: Reg, n: u16) -> u16 {
    op << 12 | (x.index() as u16) << 8 | (y.index() as u16) << 4 | n
}

fn nnn(op: u16, addr: u16) -> u16 {
    op << 12 | (addr & 0x0FFF)
}

impl Inst<u16> {
    /// 16-bit encoding, most significant nibble first.
    ///
    /// Shifts are encoded with X = Y so both the original (`Vx = Vy >> 1`)
    /// and the modern (`Vx = Vx >> 1`) interpretation agree.
    pub fn to_bin(&self) -> u16 {
        match *self {
            Inst::CLS() => 0x00E0,
            Inst::RET() => 0x00EE,
            Inst::JP(a) => nnn(0x1, a),
            Inst::CALL(a) => nnn(0x2, a),
            Inst::SE(x, nn) => xnn(0x3, x, nn),
            Inst::SNE(x, nn) => xnn(0x4, x, nn),
            Inst::SER(x, y) => xy(0x5, x, y, 0x0),
            Inst::LD(x, nn) => xnn(0x6, x, nn),
            Inst::ADD(x, nn) => xnn(0x7, x, nn),
            Inst::MOV(x, y) => xy(0x8, x, y, 0x0),
            Inst::OR(x, y) => xy(0x8, x, y, 0x1),
            Inst::AND(x, y) => xy(0x8, x, y, 0x2),
            Inst::XOR(x, y) => xy(0x8, x, y, 0x3),
            Inst::ADDR(x, y) => xy(0x8, x, y, 0x4),
            Inst::SUB(x, y) => xy(0x8, x, y, 0x5),
            Inst::SHR(x) => xy(0x8, x, x, 0x6),
            Inst::SUBN(x, y) => xy(0x8, x, y, 0x7),
            Inst::SHL(x) => xy(0x8, x, x, 0xE),
            Inst::SNER(x, y) => xy(0x9, x, y, 0x0),
            Inst::LDI(a) => nnn(0xA, a),
            Inst::DRW(x, y, n) => xy(0xD, x, y, (n & 0x0F) as u16),
            Inst::GDT(x) => xnn(0xF, x, 0x07),
            Inst::GST(x) => xnn(0xF, x, 0x08),
            Inst::SDT(x) => xnn(0xF, x, 0x15),
            Inst::SST(x) => xnn(0xF, x, 0x18),
            Inst::ADDI(x) => xnn(0xF, x, 0x1E),
            Inst::STM(x) => xnn(0xF, x, 0x55),
            Inst::LDM(x) => xnn(0xF, x, 0x65),
        }
    }

    pub fn to_bytes(&self) -> [u8; 2] {
        self.to_bin().to_be_bytes()
    }

    /// Decode a 16-bit word. Returns `None` for words outside the supported set.
    pub fn from_bin(bin: u16) -> Option<Self> {
        let op = bin >> 12;
        let x = Reg::from(((bin >> 8) & 0xF) as u8);
        let y = Reg::from(((bin >> 4) & 0xF) as u8);
        let n = (bin & 0xF) as u8;
        let nn = (bin & 0xFF) as u8;
        let addr = bin & 0x0FFF;
        let inst = match op {
            0x0 => match bin {
                0x00E0 => Inst::CLS(),
                0x00EE => Inst::RET(),
                _ => return None,
            },
            0x1 => Inst::JP(addr),
            0x2 => Inst::CALL(addr),
            0x3 => Inst::SE(x, nn),
            0x4 => Inst::SNE(x, nn),
            0x5 if n == 0 => Inst::SER(x, y),
            0x6 => Inst::LD(x, nn),
            0x7 => Inst::ADD(x, nn),
            0x8 => match n {
                0x0 => Inst::MOV(x, y),
                0x1 => Inst::OR(x, y),
                0x2 => Inst::AND(x, y),
                0x3 => Inst::XOR(x, y),
                0x4 => Inst::ADDR(x, y),
                0x5 => Inst::SUB(x, y),
                0x6 => Inst::SHR(x),
                0x7 => Inst::SUBN(x, y),
                0xE => Inst::SHL(x),
                _ => return None,
            },
            0x9 if n == 0 => Inst::SNER(x, y),
            0xA => Inst::LDI(addr),
            0xD => Inst::DRW(x, y, n),
            0xF => match nn {
                0x07 => Inst::GDT(x),
                0x08 => Inst::GST(x),
                0x15 => Inst::SDT(x),
                0x18 => Inst::SST(x),
                0x1E => Inst::ADDI(x),
                0x55 => Inst::STM(x),
                0x65 => Inst::LDM(x),
                _ => return None,
            },
            _ => return None,
        };
        Some(inst)
    }
}

impl<I: std::fmt::UpperHex> Inst<I> {
    pub fn cformat(&self) -> String {
        macro_rules! rr {
            ($name:expr, $x:expr, $y:expr) => {
                cformat!("<r>{:<5}</><b>{:<3} {:<3}</>", $name, $x, $y)
            };
        }

        macro_rules! ri {
            ($name:expr, $x:expr, $imm:expr) => {
                cformat!("<r>{:<5}</><b>{:<3} <y>0x{:0>2X}</></>", $name, $x, $imm)
            };
        }

        macro_rules! a {
            ($name:expr, $addr:expr) => {
                cformat!("<r>{:<5}</><y>0x{:0>3X}</>", $name, $addr)
            };
        }

        match self {
            Inst::CLS() => rr!("cls", "", ""),
            Inst::RET() => rr!("ret", "", ""),
            Inst::JP(a) => a!("jp", a),
            Inst::CALL(a) => a!("call", a),
            Inst::SE(x, nn) => ri!("se", x, nn),
            Inst::SNE(x, nn) => ri!("sne", x, nn),
            Inst::SER(x, y) => rr!("se", x, y),
            Inst::SNER(x, y) => rr!("sne", x, y),
            Inst::LD(x, nn) => ri!("ld", x, nn),
            Inst::ADD(x, nn) => ri!("add", x, nn),
            Inst::MOV(x, y) => rr!("mov", x, y),
            Inst::OR(x, y) => rr!("or", x, y),
            Inst::AND(x, y) => rr!("and", x, y),
            Inst::XOR(x, y) => rr!("xor", x, y),
            Inst::ADDR(x, y) => rr!("add", x, y),
            Inst::SUB(x, y) => rr!("sub", x, y),
            Inst::SHR(x) => rr!("shr", x, ""),
            Inst::SUBN(x, y) => rr!("subn", x, y),
            Inst::SHL(x) => rr!("shl", x, ""),
            Inst::LDI(a) => a!("ldi", a),
            Inst::ADDI(x) => rr!("addi", x, ""),
            Inst::DRW(x, y, n) => cformat!("<r>{:<5}</><b>{:<3} {:<3}</> <y>{}</>", "drw", x, y, n),
            Inst::GDT(x) => rr!("gdt", x, ""),
            Inst::GST(x) => rr!("gst", x, ""),
            Inst::SDT(x) => rr!("sdt", x, ""),
            Inst::SST(x) => rr!("sst", x, ""),
            Inst::STM(x) => rr!("stm", x, ""),
            Inst::LDM(x) => rr!("ldm", x, ""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_immediate_layout() {
        assert_eq!(Inst::LD(Reg::V3, 0x42).to_bin(), 0x6342);
        assert_eq!(Inst::LD(Reg::VD, 0x02).to_bytes(), [0x6D, 0x02]);
    }

    #[test]
    fn jump_layout() {
        assert_eq!(Inst::JP(0x234).to_bin(), 0x1234);
        assert_eq!(Inst::JP(0xFFF).to_bytes(), [0x1F, 0xFF]);
    }

    #[test]
    fn shifts_encode_same_register_twice() {
        assert_eq!(Inst::SHR(Reg::V5).to_bin(), 0x8556);
        assert_eq!(Inst::SHL(Reg::VA).to_bin(), 0x8AAE);
    }

    macro_rules! test_inst {
        ($($name:ident: $inst:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    let inst: Inst = $inst;
                    assert_eq!(Inst::from_bin(inst.to_bin()), Some(inst));
                }
            )*
        }
    }

    test_inst! {
        test_call: Inst::CALL(0x206),
        test_sner: Inst::SNER(Reg::V2, Reg::V3),
        test_sub: Inst::SUB(Reg::V0, Reg::VC),
        test_ldi: Inst::LDI(0x20A),
        test_drw: Inst::DRW(Reg::V2, Reg::V3, 5),
        test_gst: Inst::GST(Reg::V4),
        test_stm: Inst::STM(Reg::VC),
    }

    #[test]
    fn unknown_words() {
        assert_eq!(Inst::from_bin(0x0123), None);
        assert_eq!(Inst::from_bin(0xE09E), None);
    }

    #[test]
    fn resolve_labels() {
        let inst: Inst<&str> = Inst::CALL("main");
        let resolved = inst.resolve(|label| match label {
            "main" => Ok(0x300),
            other => Err(other.to_string()),
        });
        assert_eq!(resolved, Ok(Inst::CALL(0x300)));
    }
}
