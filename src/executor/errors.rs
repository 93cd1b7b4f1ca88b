//! Executor error types
//!
//! Error codes:
//! - AERO_CURSOR_STATE (ERROR)
//! - AERO_JUMP_UNSUPPORTED (ERROR)
//! - AERO_CURSOR_UNKNOWN (ERROR)
//! - AERO_CURSOR_FINISHED (ERROR)
//! - AERO_TABLE_DEFINITION_CHANGED (ERROR)
//! - AERO_CONCURRENT_SCAN_AND_UPDATE (ERROR)
//! - AERO_PLAN_INVALID (ERROR)
//! - AERO_QUERY_TIMEOUT (ERROR)
//! - AERO_ROW_OUTPUT (ERROR)
//! - AERO_EXECUTION_FAILED (ERROR)
//! - AERO_DATA_CORRUPTION (FATAL)

use std::fmt;

use crate::config::ConfigError;
use crate::index::IndexError;
use crate::row::RowError;
use crate::schema::SchemaError;
use crate::storage::StorageError;

/// Severity levels for executor errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation failed but the layer is healthy
    Error,
    /// Stored data is unreadable
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Executor error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorErrorCode {
    /// Operation not allowed in the cursor's current state
    AeroCursorState,
    /// Jump on a cursor without an order-compatible scan
    AeroJumpUnsupported,
    /// Cursor id not registered in the session
    AeroCursorUnknown,
    /// Scan continued after it finished
    AeroCursorFinished,
    /// Table or index definition changed since the scan was opened
    AeroTableDefinitionChanged,
    /// An update touched the columns a scan is ordered by
    AeroConcurrentScanAndUpdate,
    /// Plan construction or validation failed
    AeroPlanInvalid,
    /// Query deadline elapsed
    AeroQueryTimeout,
    /// Row output sink rejected a row
    AeroRowOutput,
    /// Storage failure during execution
    AeroExecutionFailed,
    /// Stored row failed its checksum (FATAL)
    AeroDataCorruption,
}

impl ExecutorErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorErrorCode::AeroCursorState => "AERO_CURSOR_STATE",
            ExecutorErrorCode::AeroJumpUnsupported => "AERO_JUMP_UNSUPPORTED",
            ExecutorErrorCode::AeroCursorUnknown => "AERO_CURSOR_UNKNOWN",
            ExecutorErrorCode::AeroCursorFinished => "AERO_CURSOR_FINISHED",
            ExecutorErrorCode::AeroTableDefinitionChanged => "AERO_TABLE_DEFINITION_CHANGED",
            ExecutorErrorCode::AeroConcurrentScanAndUpdate => "AERO_CONCURRENT_SCAN_AND_UPDATE",
            ExecutorErrorCode::AeroPlanInvalid => "AERO_PLAN_INVALID",
            ExecutorErrorCode::AeroQueryTimeout => "AERO_QUERY_TIMEOUT",
            ExecutorErrorCode::AeroRowOutput => "AERO_ROW_OUTPUT",
            ExecutorErrorCode::AeroExecutionFailed => "AERO_EXECUTION_FAILED",
            ExecutorErrorCode::AeroDataCorruption => "AERO_DATA_CORRUPTION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            ExecutorErrorCode::AeroDataCorruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// True for errors that leave a scan permanently unusable
    pub fn invalidates_scan(&self) -> bool {
        matches!(
            self,
            ExecutorErrorCode::AeroTableDefinitionChanged
                | ExecutorErrorCode::AeroConcurrentScanAndUpdate
        )
    }
}

impl fmt::Display for ExecutorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Executor error type with full context
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorError {
    /// Error code
    code: ExecutorErrorCode,
    /// Human-readable message
    message: String,
    /// Table, index or cursor the error is about
    context: Option<String>,
}

impl ExecutorError {
    fn new(code: ExecutorErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
        }
    }

    /// Create a cursor state error
    pub fn cursor_state(operation: &str, state: impl fmt::Display) -> Self {
        Self::new(
            ExecutorErrorCode::AeroCursorState,
            format!("Cannot {} a cursor that is {}", operation, state),
        )
    }

    /// Create a jump-unsupported error
    pub fn jump_unsupported(operator: &str) -> Self {
        Self::new(
            ExecutorErrorCode::AeroJumpUnsupported,
            format!("{} does not support jump", operator),
        )
    }

    /// Create an unknown cursor error
    pub fn cursor_unknown(cursor: impl fmt::Display) -> Self {
        Self::new(
            ExecutorErrorCode::AeroCursorUnknown,
            format!("Unknown cursor {}", cursor),
        )
    }

    /// Create a cursor finished error
    pub fn cursor_finished(cursor: impl fmt::Display) -> Self {
        Self::new(
            ExecutorErrorCode::AeroCursorFinished,
            format!("Cursor {} is finished", cursor),
        )
    }

    /// Create a definition-changed error
    pub fn table_definition_changed(table: impl Into<String>) -> Self {
        let table = table.into();
        Self::new(
            ExecutorErrorCode::AeroTableDefinitionChanged,
            format!("Definition of {} changed during the scan", table),
        )
        .with_context(table)
    }

    /// Create a concurrent scan and update error
    pub fn concurrent_scan_and_update(cursor: impl fmt::Display) -> Self {
        Self::new(
            ExecutorErrorCode::AeroConcurrentScanAndUpdate,
            format!("Scanned rows were updated for cursor {}", cursor),
        )
    }

    /// Create a plan validation error
    pub fn plan_invalid(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::AeroPlanInvalid, reason)
    }

    /// Create a query timeout error
    pub fn query_timeout(elapsed_ms: u128) -> Self {
        Self::new(
            ExecutorErrorCode::AeroQueryTimeout,
            format!("Query timed out after {} ms", elapsed_ms),
        )
    }

    /// Create a row output error
    pub fn row_output(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::AeroRowOutput, reason)
    }

    /// Create an execution failed error
    pub fn execution_failed(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::AeroExecutionFailed, reason)
    }

    /// Create a data corruption error (FATAL)
    pub fn data_corruption(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::AeroDataCorruption, reason)
    }

    /// Attaches the table, index or cursor the error is about
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Returns the error code
    pub fn code(&self) -> ExecutorErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the context if any
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(context) = &self.context {
            write!(f, " ({})", context)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExecutorError {}

impl From<RowError> for ExecutorError {
    fn from(err: RowError) -> Self {
        match err {
            RowError::ChecksumMismatch { .. } | RowError::Malformed(_) => {
                ExecutorError::data_corruption(err.to_string())
            }
            _ => ExecutorError::plan_invalid(err.to_string()),
        }
    }
}

impl From<SchemaError> for ExecutorError {
    fn from(err: SchemaError) -> Self {
        ExecutorError::plan_invalid(err.to_string())
    }
}

impl From<IndexError> for ExecutorError {
    fn from(err: IndexError) -> Self {
        ExecutorError::plan_invalid(err.to_string())
    }
}

impl From<ConfigError> for ExecutorError {
    fn from(err: ConfigError) -> Self {
        ExecutorError::plan_invalid(err.to_string())
    }
}

impl From<StorageError> for ExecutorError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Row(e) => e.into(),
            StorageError::UnknownTable(_)
            | StorageError::UnknownIndex(_)
            | StorageError::UnknownGroup(_) => {
                ExecutorError::table_definition_changed(err.to_string())
            }
            other => ExecutorError::execution_failed(other.to_string()),
        }
    }
}

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TableId;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ExecutorErrorCode::AeroCursorState.code(),
            "AERO_CURSOR_STATE"
        );
        assert_eq!(
            ExecutorErrorCode::AeroTableDefinitionChanged.code(),
            "AERO_TABLE_DEFINITION_CHANGED"
        );
        assert_eq!(
            ExecutorErrorCode::AeroConcurrentScanAndUpdate.code(),
            "AERO_CONCURRENT_SCAN_AND_UPDATE"
        );
    }

    #[test]
    fn test_corruption_is_fatal() {
        let err: ExecutorError = RowError::ChecksumMismatch {
            expected: 1,
            computed: 2,
        }
        .into();
        assert!(err.is_fatal());
        assert_eq!(err.code(), ExecutorErrorCode::AeroDataCorruption);
    }

    #[test]
    fn test_storage_errors_map_to_codes() {
        let missing: ExecutorError = StorageError::UnknownTable(TableId(4)).into();
        assert_eq!(missing.code(), ExecutorErrorCode::AeroTableDefinitionChanged);
        assert!(missing.code().invalidates_scan());

        let dup: ExecutorError = StorageError::DuplicateKey {
            table: "t".into(),
            key: "(1)".into(),
        }
        .into();
        assert_eq!(dup.code(), ExecutorErrorCode::AeroExecutionFailed);
        assert!(!dup.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = ExecutorError::table_definition_changed("customer");
        let display = format!("{}", err);
        assert!(display.contains("AERO_TABLE_DEFINITION_CHANGED"));
        assert!(display.contains("ERROR"));
        assert!(display.ends_with("(customer)"));
    }
}
