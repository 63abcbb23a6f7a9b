use std::fmt;

/// Indicates the specific type/cause of a capacity error.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CapacityError {
    /// A frame's decoded payload exceeds the configured maximum message size.
    MessageTooLong {
        /// The size the message would have been.
        size: usize,
        /// The configured ceiling.
        max_size: usize,
    },
    /// `httparse` ran out of header slots.
    TooManyHeaders,
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityError::MessageTooLong { size, max_size } => {
                write!(f, "message too long: {size} > {max_size}")
            }
            CapacityError::TooManyHeaders => write!(f, "too many headers"),
        }
    }
}

impl std::error::Error for CapacityError {}
