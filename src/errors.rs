//! Error types for the execution core
//!
//! Error kinds:
//! - VP_SCHEMA_MISMATCH: block construction/consumption contract violated
//! - VP_COLUMN_NOT_FOUND: a plan references an absent column
//! - VP_PLAN_COMPILATION: structurally invalid plan node
//! - VP_EXECUTION_FAILED: runtime failure during processing
//! - VP_CANCELLED: cooperative shutdown
//! - VP_INVALID_CONFIG: engine configuration rejected

use std::fmt;

use thiserror::Error;

/// Result type for execution operations
pub type ExecResult<T> = Result<T, ExecError>;

/// Failure categories surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SchemaMismatch,
    ColumnNotFound,
    PlanCompilation,
    Execution,
    Cancelled,
    InvalidConfig,
}

impl ErrorKind {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::SchemaMismatch => "VP_SCHEMA_MISMATCH",
            ErrorKind::ColumnNotFound => "VP_COLUMN_NOT_FOUND",
            ErrorKind::PlanCompilation => "VP_PLAN_COMPILATION",
            ErrorKind::Execution => "VP_EXECUTION_FAILED",
            ErrorKind::Cancelled => "VP_CANCELLED",
            ErrorKind::InvalidConfig => "VP_INVALID_CONFIG",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Execution error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecError {
    /// Columns disagree on length, or a block does not match the expected schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A referenced column is absent from the block schema
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Plan node cannot be compiled into a transform
    #[error("Plan compilation failed: {0}")]
    PlanCompilation(String),

    /// Runtime failure while processing blocks
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Pipeline was cancelled before completing
    #[error("Pipeline cancelled")]
    Cancelled,

    /// Engine configuration rejected
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Error raised by a named pipeline stage
    #[error("[{stage}] {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<ExecError>,
    },
}

impl ExecError {
    pub fn schema_mismatch(msg: impl Into<String>) -> Self {
        Self::SchemaMismatch(msg.into())
    }

    pub fn column_not_found(name: impl Into<String>) -> Self {
        Self::ColumnNotFound(name.into())
    }

    pub fn plan_compilation(msg: impl Into<String>) -> Self {
        Self::PlanCompilation(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Attributes this error to a pipeline stage.
    ///
    /// Cancellation is never attributed, and an already attributed error
    /// keeps its original stage.
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        match self {
            ExecError::Cancelled | ExecError::Stage { .. } => self,
            other => ExecError::Stage {
                stage: stage.into(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the failure category, looking through stage attribution
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecError::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
            ExecError::ColumnNotFound(_) => ErrorKind::ColumnNotFound,
            ExecError::PlanCompilation(_) => ErrorKind::PlanCompilation,
            ExecError::Execution(_) => ErrorKind::Execution,
            ExecError::Cancelled => ErrorKind::Cancelled,
            ExecError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            ExecError::Stage { source, .. } => source.kind(),
        }
    }

    /// Returns the stage that raised the error, if attributed
    pub fn stage(&self) -> Option<&str> {
        match self {
            ExecError::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}
