pub mod inst;
pub mod mem;
pub mod reg;
