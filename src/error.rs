use aws_sdk_dynamodb::error::{BuildError, ProvideErrorMetadata};
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::delete_table::DeleteTableError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::operation::list_tables::ListTablesError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_runtime_api::http::Response;
use std::error::Error as StdError;
use std::{fmt, io};

type DynamoListTablesError = SdkError<ListTablesError, Response>;
type DynamoDescribeTableError = SdkError<DescribeTableError, Response>;
type DynamoCreateTableError = SdkError<CreateTableError, Response>;
type DynamoDeleteTableError = SdkError<DeleteTableError, Response>;
type DynamoScanError = SdkError<ScanError, Response>;
type DynamoBatchWriteItemError = SdkError<BatchWriteItemError, Response>;

/// Coarse classification of a remote store failure
///
/// Decides whether a failure is retried, skipped, or treated as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The table (or another resource) does not exist
    NotFound,
    /// The store rejected the request because of throughput limits
    Throttled,
    /// The request was malformed or violated a constraint
    Validation,
    /// Anything else, including transport failures
    Other,
}

impl ErrorKind {
    fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("ResourceNotFoundException") => ErrorKind::NotFound,
            Some(
                "ProvisionedThroughputExceededException"
                | "ThrottlingException"
                | "RequestLimitExceeded",
            ) => ErrorKind::Throttled,
            Some("ValidationException") => ErrorKind::Validation,
            _ => ErrorKind::Other,
        }
    }
}

/// Transfer engine error
#[derive(Debug)]
pub enum Error {
    /// DynamoDB request builder error
    BuildError(BuildError),
    /// DynamoDB ListTables operation error
    DynamoListTablesError(DynamoListTablesError),
    /// DynamoDB DescribeTable operation error
    DynamoDescribeTableError(DynamoDescribeTableError),
    /// DynamoDB CreateTable operation error
    DynamoCreateTableError(DynamoCreateTableError),
    /// DynamoDB DeleteTable operation error
    DynamoDeleteTableError(DynamoDeleteTableError),
    /// DynamoDB Scan operation error
    DynamoScanError(DynamoScanError),
    /// DynamoDB BatchWriteItem operation error
    DynamoBatchWriteItemError(DynamoBatchWriteItemError),
    /// Classified failure reported by a store that is not backed by the SDK
    Service {
        /// Failure classification
        kind: ErrorKind,
        /// Human readable detail
        message: String,
    },
    /// The source table schema could not be read
    SchemaFetch {
        /// Table that was described
        table: String,
        /// Underlying store failure
        source: Box<Error>,
    },
    /// The destination table could not be created
    TableCreate {
        /// Table that was being created
        table: String,
        /// Underlying store failure
        source: Box<Error>,
    },
    /// The created table did not become active within the polling budget
    TableNotReady {
        /// Table that was polled
        table: String,
        /// Number of status checks performed
        attempts: u32,
    },
    /// The deleted table was still present after the polling budget
    DeleteTimeout {
        /// Table that was polled
        table: String,
        /// Number of status checks performed
        attempts: u32,
    },
    /// Batch size outside `1..=25`
    InvalidBatchSize(usize),
    /// Existing destination key schema differs from the source
    SchemaMismatch {
        /// Source table name
        source_table: String,
        /// Destination table name
        dest_table: String,
    },
    /// Local file system error
    Io(io::Error),
}

impl Error {
    /// Build a classified store failure
    pub fn service(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error::Service {
            kind,
            message: message.into(),
        }
    }

    /// Classify this error
    ///
    /// SDK errors are classified by their service error code. Wrapping
    /// variants report the classification of the error they wrap.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Service { kind, .. } => *kind,
            Error::SchemaFetch { source, .. } | Error::TableCreate { source, .. } => source.kind(),
            Error::DynamoListTablesError(e) => ErrorKind::from_code(e.code()),
            Error::DynamoDescribeTableError(e) => ErrorKind::from_code(e.code()),
            Error::DynamoCreateTableError(e) => ErrorKind::from_code(e.code()),
            Error::DynamoDeleteTableError(e) => ErrorKind::from_code(e.code()),
            Error::DynamoScanError(e) => ErrorKind::from_code(e.code()),
            Error::DynamoBatchWriteItemError(e) => ErrorKind::from_code(e.code()),
            Error::InvalidBatchSize(_) | Error::SchemaMismatch { .. } => ErrorKind::Validation,
            Error::BuildError(_)
            | Error::TableNotReady { .. }
            | Error::DeleteTimeout { .. }
            | Error::Io(_) => ErrorKind::Other,
        }
    }

    /// Check if the error reports a missing table
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if the error reports store-side throttling
    ///
    /// Throttled batch writes are retried like unprocessed items.
    pub fn is_throttled(&self) -> bool {
        self.kind() == ErrorKind::Throttled
    }

    /// Check if the error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::SchemaFetch { .. }
                | Error::TableCreate { .. }
                | Error::TableNotReady { .. }
                | Error::DeleteTimeout { .. }
                | Error::InvalidBatchSize(_)
                | Error::SchemaMismatch { .. }
        )
    }
}

macro_rules! impl_from_error {
    ($name:ident) => {
        impl From<$name> for Error {
            fn from(e: $name) -> Self {
                Error::$name(e)
            }
        }
    };
}

impl_from_error!(BuildError);
impl_from_error!(DynamoListTablesError);
impl_from_error!(DynamoDescribeTableError);
impl_from_error!(DynamoCreateTableError);
impl_from_error!(DynamoDeleteTableError);
impl_from_error!(DynamoScanError);
impl_from_error!(DynamoBatchWriteItemError);

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BuildError(e) => write!(f, "DynamoDB request builder error: {}", e),
            Error::DynamoListTablesError(e) => {
                write!(f, "DynamoDB ListTables operation failed: {}", e)
            }
            Error::DynamoDescribeTableError(e) => {
                write!(f, "DynamoDB DescribeTable operation failed: {}", e)
            }
            Error::DynamoCreateTableError(e) => {
                write!(f, "DynamoDB CreateTable operation failed: {}", e)
            }
            Error::DynamoDeleteTableError(e) => {
                write!(f, "DynamoDB DeleteTable operation failed: {}", e)
            }
            Error::DynamoScanError(e) => {
                write!(f, "DynamoDB Scan operation failed: {}", e)
            }
            Error::DynamoBatchWriteItemError(e) => {
                write!(f, "DynamoDB BatchWriteItem operation failed: {}", e)
            }
            Error::Service { kind, message } => write!(f, "store error ({:?}): {}", kind, message),
            Error::SchemaFetch { table, source } => {
                write!(f, "failed to read schema of table {}: {}", table, source)
            }
            Error::TableCreate { table, source } => {
                write!(f, "failed to create table {}: {}", table, source)
            }
            Error::TableNotReady { table, attempts } => write!(
                f,
                "table {} did not become active after {} checks",
                table, attempts
            ),
            Error::DeleteTimeout { table, attempts } => write!(
                f,
                "table {} still exists after {} deletion checks",
                table, attempts
            ),
            Error::InvalidBatchSize(size) => write!(
                f,
                "batch size {} is out of range, must be between 1 and {}",
                size,
                crate::MAX_BATCH_SIZE
            ),
            Error::SchemaMismatch {
                source_table,
                dest_table,
            } => write!(
                f,
                "key schema of existing table {} does not match source table {}",
                dest_table, source_table
            ),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::SchemaFetch { source, .. } | Error::TableCreate { source, .. } => {
                Some(source.as_ref())
            }
            Error::Io(e) => Some(e),
            Error::BuildError(e) => Some(e),
            _ => None,
        }
    }
}
