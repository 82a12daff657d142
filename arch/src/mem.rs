//! Memory map of the target machine.
//!
//! ```text
//! 0x000 +----------------------+
//!       | interpreter reserved |
//! 0x200 +----------------------+
//!       | prologue (3 inst)    |  LD VD, sp.hi / LD VE, sp.lo / JP entry
//! 0x206 | address trampoline   |  LDI ??? / RET, patched at run time
//! 0x20A | return value slot    |  2 bytes
//! 0x20C +----------------------+
//!       | globals              |
//!       +----------------------+  <- initial stack frame base
//!       | stack (grows up)     |
//!       +----------------------+
//!       | code                 |
//! 0x1000+----------------------+
//! ```

/// Addressable memory of the machine.
pub const MEMORY_SIZE: usize = 0x1000;

/// Address the machine starts executing at.
pub const PROGRAM_START: u16 = 0x200;

/// Size of a single instruction in bytes.
pub const INST_SIZE: u16 = 2;

/// Number of instructions in the fixed prologue.
pub const PROLOGUE_LEN: u16 = 3;

/// Self-modifying `LDI` + `RET` pair used to load a computed address into I.
pub const TRAMPOLINE: u16 = PROGRAM_START + PROLOGUE_LEN * INST_SIZE;

/// Two bytes through which functions hand their result back to the caller.
pub const RETURN_SLOT: u16 = TRAMPOLINE + 2 * INST_SIZE;

/// First address of the global section.
pub const GLOBAL_BASE: u16 = RETURN_SLOT + 2;

/// Exclusive upper bound of the global section.
pub const GLOBAL_LIMIT: u16 = 0xA00;

/// Opcode byte of `LDI`, or-ed with the high nibble of a patched address.
pub const LDI_OPCODE: u8 = 0xA0;
