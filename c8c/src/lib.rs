pub mod analyzer;
pub mod emitter;
pub mod error;
pub mod grammar;
pub mod lexer;
pub mod token;
pub mod types;
pub mod util;

pub use emitter::Image;
pub use error::{Error, Result};
pub use lexer::Lexer;
pub use token::{Token, TokenKind};
pub use util::display::binprint;
pub use util::maps::SymbolMap;

use serde::{Deserialize, Serialize};

/// Compiler knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Function the prologue jumps to.
    pub entry: String,
    /// Pool registers the optimizer may dedicate to variables of one function.
    pub cache_registers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            entry: "main".to_string(),
            cache_registers: 6,
        }
    }
}

/// Compile a token stream into a memory image.
pub fn compile(tokens: &[Token], config: &Config) -> Result<Image> {
    let tree = grammar::parse(tokens).into_tree()?;
    let scopes = analyzer::analyze(&tree)?;
    emitter::emit(&tree, &scopes, config)
}

pub fn compile_source(code: &str, config: &Config) -> Result<Image> {
    compile(&Lexer::new(code).parse(), config)
}
