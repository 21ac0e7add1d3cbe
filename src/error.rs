use thiserror::Error;

pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Failure taxonomy for the class-group and attendance core. Every rejected
/// operation surfaces one of these; partial writes never happen.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A create/update/save submission violates an invariant. `field` names
    /// the offending wire field so the UI can place the message inline.
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The targeted record does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A save for the same class group is still in flight; the caller must
    /// wait for it to settle before resubmitting.
    #[error("a save is already in flight for this class group")]
    SaveInFlight,

    /// SQLite failure reading or writing the store/ledger.
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl CoreError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> CoreError {
        CoreError::Validation {
            field,
            message: message.into(),
        }
    }
}
