use std::fmt;

/// Errors that can occur when using an AssociationStore
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssocError {
    /// Failed to acquire lock on the store
    LockError,
    /// A copy policy was requested for a value that cannot be duplicated
    NotDuplicable {
        /// Name of the offending value type
        type_name: &'static str,
    },
    /// The global store was already created
    AlreadyInitialized,
}

impl fmt::Display for AssocError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AssocError::LockError => write!(f, "Failed to acquire lock"),
            AssocError::NotDuplicable { type_name } => {
                write!(f, "Value of type {} cannot be duplicated", type_name)
            }
            AssocError::AlreadyInitialized => {
                write!(f, "Global association store is already initialized")
            }
        }
    }
}

impl std::error::Error for AssocError {}
