use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Syntax error: token stream does not match the grammar")]
    Syntax,

    #[error("{0}")]
    Semantic(#[from] SemanticError),

    #[error("{0}")]
    Resource(#[from] ResourceError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    #[error("line {line}: unresolved reference `{name}`")]
    UnresolvedReference { name: String, line: u32 },

    #[error("line {line}: `{name}` is a function")]
    IdentifierIsFunction { name: String, line: u32 },

    #[error("line {line}: `{name}` is not a function")]
    IdentifierIsNotFunction { name: String, line: u32 },

    #[error("line {line}: data types mismatch: {left} and {right}")]
    DataTypesMismatch {
        left: String,
        right: String,
        line: u32,
    },

    #[error("line {line}: unexpected data type: expected {expected}, found {found}")]
    UnexpectedDataType {
        expected: String,
        found: String,
        line: u32,
    },

    #[error("line {line}: pointer to void")]
    PointerToVoid { line: u32 },

    #[error("line {line}: index {index} is out of bounds for array of length {length}")]
    ArrayIndexOutOfBounds { index: usize, length: usize, line: u32 },

    #[error("line {line}: array index must be byte, found {found}")]
    NonByteArrayIndex { found: String, line: u32 },

    #[error("line {line}: `{name}` takes {expected} arguments, {found} given")]
    ParameterCountMismatch {
        name: String,
        expected: usize,
        found: usize,
        line: u32,
    },

    #[error("line {line}: name `{name}` is already in use")]
    NameAlreadyInUse { name: String, line: u32 },

    #[error("line {line}: result of `{name}` is discarded")]
    UnreachableCode { name: String, line: u32 },

    #[error("line {line}: invalid indirection of {found}")]
    InvalidIndirectOf { found: String, line: u32 },
}

impl SemanticError {
    pub fn line(&self) -> u32 {
        match self {
            SemanticError::UnresolvedReference { line, .. }
            | SemanticError::IdentifierIsFunction { line, .. }
            | SemanticError::IdentifierIsNotFunction { line, .. }
            | SemanticError::DataTypesMismatch { line, .. }
            | SemanticError::UnexpectedDataType { line, .. }
            | SemanticError::PointerToVoid { line }
            | SemanticError::ArrayIndexOutOfBounds { line, .. }
            | SemanticError::NonByteArrayIndex { line, .. }
            | SemanticError::ParameterCountMismatch { line, .. }
            | SemanticError::NameAlreadyInUse { line, .. }
            | SemanticError::UnreachableCode { line, .. }
            | SemanticError::InvalidIndirectOf { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("Register pool exhausted")]
    RegisterPoolExhausted,

    #[error("Global section overflow: {0} bytes needed at 0x{1:04X}")]
    GlobalSectionOverflow(usize, usize),

    #[error("Code section overflow: {0} bytes of code do not fit above 0x{1:04X}")]
    CodeSectionOverflow(usize, usize),

    #[error("line {line}: stack frame of `{function}` does not fit in memory")]
    FrameOverflow { function: String, line: u32 },

    #[error("line {0}: element offset exceeds the address space")]
    OffsetOutOfRange(u32),

    #[error("line {0}: sprite height must be a literal between 1 and 15")]
    SpriteHeightNotLiteral(u32),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand for contract violations on malformed trees.
pub fn internal<T>(msg: impl Into<String>) -> Result<T> {
    Err(Error::Internal(msg.into()))
}

impl Error {
    /// Source line the error points at, when there is one.
    pub fn line(&self) -> Option<u32> {
        match self {
            Error::Semantic(e) => Some(e.line()),
            Error::Resource(ResourceError::FrameOverflow { line, .. })
            | Error::Resource(ResourceError::OffsetOutOfRange(line))
            | Error::Resource(ResourceError::SpriteHeightNotLiteral(line)) => Some(*line),
            _ => None,
        }
    }
}
