use thiserror::Error;

use super::NodeId;

/// The result of a circuit operation.
pub type Result<T> = std::result::Result<T, CircuitError>;

/// Error returned when a circuit operation failed.
#[derive(Debug, Error)]
pub enum CircuitError {
    /// A different gate with the given id already exists.
    #[error("a different gate with id={0} already exists")]
    DuplicateId(NodeId),

    /// The id 0 is reserved for the constant gate only.
    #[error("id=0 is reserved for the constant gate")]
    IdZeroReserved,

    /// The gate with the given id does not exist.
    #[error("gate with id={0} does not exist")]
    NodeDoesNotExist(NodeId),

    /// The circuit has reached an invalid state. This should never happen once
    /// a circuit has been built: the builder checks integrity before handing
    /// the circuit out.
    #[error("the circuit has reached an invalid state - this should not happen - error: {0}")]
    InvalidState(String),

    /// The underlying SAT engine failed.
    #[error("sat engine error: {0}")]
    Sat(String),

    /// Just forwarding a [`LoaderError`].
    #[error("{0}")]
    LoaderError(#[from] LoaderError),
}

/// Error returned when reading a circuit from its textual form failed.
///
/// These carry the line number of the offending token: structural parse errors
/// abort construction and are reported with their context.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Invalid token, something else was expected.
    #[error("line {line}: invalid token: {msg}")]
    InvalidToken { line: usize, msg: String },

    /// Primary inputs are declared with even literals only.
    #[error("line {line}: input literal {literal} cannot be inverted")]
    InvertedInput { line: usize, literal: u64 },

    /// A literal exceeds the declared maximum variable index.
    #[error("line {line}: literal {literal} exceeds maximum variable index {max_var}")]
    LiteralOutOfRange {
        line: usize,
        literal: u64,
        max_var: u64,
    },

    /// Sequential circuits (latches) are not supported.
    #[error("sequential circuits are not supported ({0} latches declared)")]
    Sequential(u64),

    /// A symbol line refers to an input/output position that does not exist.
    #[error("line {line}: symbol index {index} is out of range")]
    SymbolOutOfRange { line: usize, index: usize },

    /// An IO error occured (file doesn't exist, read failure, ...).
    #[error("io error: {0}")]
    IoError(String),
}
