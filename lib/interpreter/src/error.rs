use cursor::Line;
use parser::ParseErrors;
use scanner::ScanError;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RuntimeErrorType {
    #[error("Operand must be a number.")]
    OperandMustBeNumber,
    #[error("Operands must be numbers.")]
    OperandsMustBeNumbers,
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),
    #[error("Can only call functions.")]
    NotCallable,
    #[error("Expected {expected} arguments but got {got}.")]
    ArityMismatch { expected: usize, got: usize },
    #[error("Failed to write output: {0}")]
    Output(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{error}")]
pub struct RuntimeError {
    pub error: RuntimeErrorType,
    pub line: Line,
}

impl RuntimeError {
    pub fn new(error: RuntimeErrorType, line: Line) -> Self {
        Self { error, line }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InterpretError {
    #[error(transparent)]
    ScanError(#[from] ScanError),
    #[error(transparent)]
    CompileError(#[from] ParseErrors),
    #[error(transparent)]
    RuntimeError(#[from] RuntimeError),
}
