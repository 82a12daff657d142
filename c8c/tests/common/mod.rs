//! Minimal interpreter for compiled images.

#![allow(dead_code)]

use c8arch::inst::Inst;
use c8arch::mem::{MEMORY_SIZE, PROGRAM_START};
use c8arch::reg::Reg;
use c8c::{compile_source, Config, Image};

pub struct State {
    pub mem: Vec<u8>,
    pub v: [u8; 16],
    pub i: u16,
    pub pc: u16,
    pub stack: Vec<u16>,
    pub delay: u8,
    pub sound: u8,
    pub draws: Vec<(u8, u8, u16, u8)>,
    halted: bool,
}

impl State {
    pub fn new(memory: &[u8]) -> Self {
        State {
            mem: memory.to_vec(),
            v: [0; 16],
            i: 0,
            pc: PROGRAM_START,
            stack: vec![],
            delay: 0,
            sound: 0,
            draws: vec![],
            halted: false,
        }
    }

    fn get(&self, r: Reg) -> u8 {
        self.v[r.index() as usize]
    }

    fn set(&mut self, r: Reg, val: u8) {
        self.v[r.index() as usize] = val;
    }

    pub fn byte(&self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }

    pub fn exec(&mut self) {
        let pc = self.pc;
        let word = u16::from_be_bytes([self.mem[pc as usize], self.mem[pc as usize + 1]]);
        let inst = Inst::from_bin(word).unwrap_or_else(|| panic!("bad word {:04X} at {:03X}", word, pc));
        self.pc += 2;
        match inst {
            Inst::CLS() => {}
            Inst::RET() => self.pc = self.stack.pop().expect("stack underflow"),
            Inst::JP(a) => {
                if a == pc {
                    self.halted = true;
                }
                self.pc = a;
            }
            Inst::CALL(a) => {
                assert!(self.stack.len() < 64, "stack overflow");
                self.stack.push(self.pc);
                self.pc = a;
            }
            Inst::SE(x, nn) => self.skip_if(self.get(x) == nn),
            Inst::SNE(x, nn) => self.skip_if(self.get(x) != nn),
            Inst::SER(x, y) => self.skip_if(self.get(x) == self.get(y)),
            Inst::SNER(x, y) => self.skip_if(self.get(x) != self.get(y)),
            Inst::LD(x, nn) => self.set(x, nn),
            Inst::ADD(x, nn) => self.set(x, self.get(x).wrapping_add(nn)),
            Inst::MOV(x, y) => self.set(x, self.get(y)),
            Inst::OR(x, y) => self.set(x, self.get(x) | self.get(y)),
            Inst::AND(x, y) => self.set(x, self.get(x) & self.get(y)),
            Inst::XOR(x, y) => self.set(x, self.get(x) ^ self.get(y)),
            Inst::ADDR(x, y) => {
                let (sum, carry) = self.get(x).overflowing_add(self.get(y));
                self.set(x, sum);
                self.set(Reg::VF, carry as u8);
            }
            Inst::SUB(x, y) => {
                let (a, b) = (self.get(x), self.get(y));
                self.set(x, a.wrapping_sub(b));
                self.set(Reg::VF, (a >= b) as u8);
            }
            Inst::SUBN(x, y) => {
                let (a, b) = (self.get(x), self.get(y));
                self.set(x, b.wrapping_sub(a));
                self.set(Reg::VF, (b >= a) as u8);
            }
            Inst::SHR(x) => {
                let a = self.get(x);
                self.set(x, a >> 1);
                self.set(Reg::VF, a & 1);
            }
            Inst::SHL(x) => {
                let a = self.get(x);
                self.set(x, a << 1);
                self.set(Reg::VF, a >> 7);
            }
            Inst::LDI(a) => self.i = a,
            Inst::ADDI(x) => self.i += self.get(x) as u16,
            Inst::DRW(x, y, n) => {
                self.draws.push((self.get(x), self.get(y), self.i, n));
                self.set(Reg::VF, 0);
            }
            Inst::GDT(x) => self.set(x, self.delay),
            Inst::GST(x) => self.set(x, self.sound),
            Inst::SDT(x) => self.delay = self.get(x),
            Inst::SST(x) => self.sound = self.get(x),
            Inst::STM(x) => {
                for r in 0..=x.index() as usize {
                    self.mem[self.i as usize + r] = self.v[r];
                }
            }
            Inst::LDM(x) => {
                for r in 0..=x.index() as usize {
                    self.v[r] = self.mem[self.i as usize + r];
                }
            }
        }
        assert!((self.i as usize) < MEMORY_SIZE, "I out of range");
    }

    fn skip_if(&mut self, cond: bool) {
        if cond {
            self.pc += 2;
        }
    }

    /// Run until the entry function halts.
    pub fn run(&mut self, max_steps: usize) {
        for _ in 0..max_steps {
            self.exec();
            if self.halted {
                return;
            }
        }
        panic!("program did not halt within {} steps", max_steps);
    }
}

/// Compile `code`, run it to the halt loop and return the final state.
pub fn run(code: &str) -> (Image, State) {
    let image = compile_source(code, &Config::default()).unwrap_or_else(|e| panic!("{}", e));
    let mut state = State::new(&image.memory);
    state.run(200_000);
    (image, state)
}

/// Final value of a byte global.
pub fn global(image: &Image, state: &State, name: &str) -> u8 {
    state.byte(image.globals[name].addr)
}
