use crate::error::{ResourceError, Result};
use crate::types::Type;
use c8arch::reg::Reg;

/// A value held in registers. Pointers occupy a high and a low register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Single(Reg),
    Pair { hi: Reg, lo: Reg },
}

impl Operand {
    /// Register holding a byte value, or the low half of a pointer.
    pub fn low(self) -> Reg {
        match self {
            Operand::Single(r) => r,
            Operand::Pair { lo, .. } => lo,
        }
    }

    pub fn regs(self) -> Vec<Reg> {
        match self {
            Operand::Single(r) => vec![r],
            Operand::Pair { hi, lo } => vec![hi, lo],
        }
    }
}

const POOL: usize = (Reg::POOL_LAST.index() - Reg::POOL_FIRST.index() + 1) as usize;

/// Free-list over the general purpose pool `V2..VC`. Every register below
/// `next_free` is in use.
#[derive(Debug, Clone)]
pub struct RegisterAllocator {
    used: [bool; POOL],
    next_free: usize,
}

impl Default for RegisterAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterAllocator {
    pub fn new() -> Self {
        RegisterAllocator {
            used: [false; POOL],
            next_free: 0,
        }
    }

    fn reg(slot: usize) -> Reg {
        Reg::from(Reg::POOL_FIRST.index() + slot as u8)
    }

    fn slot(reg: Reg) -> Option<usize> {
        let idx = reg.index();
        if (Reg::POOL_FIRST.index()..=Reg::POOL_LAST.index()).contains(&idx) {
            Some((idx - Reg::POOL_FIRST.index()) as usize)
        } else {
            None
        }
    }

    pub fn alloc(&mut self) -> Result<Reg> {
        let Some(slot) = (self.next_free..POOL).find(|&i| !self.used[i]) else {
            return Err(ResourceError::RegisterPoolExhausted.into());
        };
        self.used[slot] = true;
        self.next_free = slot + 1;
        Ok(Self::reg(slot))
    }

    /// Registers for a value of `ty`. If the pool runs dry halfway through a
    /// pointer, the half already taken stays taken.
    pub fn alloc_for(&mut self, ty: &Type) -> Result<Operand> {
        if ty.is_pointer() {
            let hi = self.alloc()?;
            let lo = self.alloc()?;
            Ok(Operand::Pair { hi, lo })
        } else {
            Ok(Operand::Single(self.alloc()?))
        }
    }

    pub fn free_reg(&mut self, reg: Reg) {
        if let Some(slot) = Self::slot(reg) {
            self.used[slot] = false;
            if slot < self.next_free {
                self.next_free = slot;
            }
        }
    }

    pub fn free(&mut self, operand: Operand) {
        for reg in operand.regs() {
            self.free_reg(reg);
        }
    }

    pub fn available(&self) -> usize {
        self.used.iter().filter(|used| !**used).count()
    }

    pub fn capacity() -> usize {
        POOL
    }
}
