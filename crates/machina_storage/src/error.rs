//! Error types for resource storage.

/// Errors raised while building or configuring storages.
///
/// Runtime transfers never fail with an error: they report the amount that
/// was actually moved. These errors cover invalid configuration and the few
/// operations that hard-reject their arguments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// A slot or energy buffer was built without a capacity, or with a capacity
    /// it can never hold.
    #[error("invalid capacity {capacity}: expected 1..={max}")]
    InvalidCapacity {
        /// The rejected capacity (0 if none was set).
        capacity: u64,
        /// The largest capacity this kind of slot accepts.
        max: u64,
    },

    /// An amount larger than the slot capacity was set directly.
    #[error("amount {amount} exceeds slot capacity {capacity}")]
    InvalidAmount {
        /// The rejected amount.
        amount: u64,
        /// The slot capacity.
        capacity: u64,
    },

    /// The same slot group type was declared twice in one storage.
    #[error("duplicate slot group type: {0}")]
    DuplicateGroup(String),

    /// No slot group of the requested type exists.
    #[error("unknown slot group type: {0}")]
    UnknownGroup(String),

    /// The resource does not pass the slot filter.
    #[error("resource {0} is rejected by the slot filter")]
    Filtered(String),
}

/// Errors raised while reading a packet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    /// The buffer ended before the value was complete.
    #[error("unexpected end of packet: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes required by the read.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// The buffer held bytes that do not decode to a valid value.
    #[error("invalid packet data: {0}")]
    InvalidData(String),
}

/// Error parsing a namespaced identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    /// The identifier has an empty path.
    #[error("identifier '{0}' has an empty path")]
    EmptyPath(String),

    /// The namespace contains a character outside `[a-z0-9_.-]`.
    #[error("invalid character {character:?} in namespace of '{identifier}'")]
    InvalidNamespace {
        /// The identifier being parsed.
        identifier: String,
        /// The offending character.
        character: char,
    },

    /// The path contains a character outside `[a-z0-9_.-/]`.
    #[error("invalid character {character:?} in path of '{identifier}'")]
    InvalidPath {
        /// The identifier being parsed.
        identifier: String,
        /// The offending character.
        character: char,
    },
}

impl From<IdentifierError> for PacketError {
    fn from(err: IdentifierError) -> Self {
        PacketError::InvalidData(err.to_string())
    }
}
