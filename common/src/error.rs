use core::fmt;

/// Status codes returned by every HAL operation.
///
/// The set is closed: drivers map their internal failures onto the most
/// specific variant instead of adding new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HalError {
    /// The device or layer has not been initialized.
    NotInitialized,
    /// `init` was called on something that is already initialized.
    AlreadyInitialized,
    /// The operation is not legal in the current state.
    InvalidState,
    /// An argument is out of range or malformed.
    InvalidParameter,
    /// A required reference is missing or no longer valid.
    NullReference,
    /// A transfer is already in flight.
    Busy,
    /// The operation did not complete before its deadline.
    Timeout,
    /// A buffer has no room left.
    Full,
    /// An allocator has no free block or memory left.
    NoSpace,
    /// No entry matches the requested name or index.
    NotFound,
    /// The operation is not permitted in the current mode.
    PermissionDenied,
}

impl HalError {
    /// Short, stable name of the code.
    pub const fn as_str(self) -> &'static str {
        match self {
            HalError::NotInitialized => "not initialized",
            HalError::AlreadyInitialized => "already initialized",
            HalError::InvalidState => "invalid state",
            HalError::InvalidParameter => "invalid parameter",
            HalError::NullReference => "null reference",
            HalError::Busy => "busy",
            HalError::Timeout => "timeout",
            HalError::Full => "full",
            HalError::NoSpace => "no space",
            HalError::NotFound => "not found",
            HalError::PermissionDenied => "permission denied",
        }
    }
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
