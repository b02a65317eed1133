//! Out-of-band control channel contracts

use serde::{Deserialize, Serialize};

/// Fixed size of a control datagram (bytes)
pub const RPC_BUFFER_SIZE: usize = 1024;

/// Process-wide control method codes.
///
/// Carried as a big-endian `i32` at the head of a control datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpcMethod {
    /// Payload: decimal aligned offset in ns
    OffsetUpdate,
    StartRecording,
    StopRecording,
}

impl RpcMethod {
    pub const fn code(self) -> i32 {
        match self {
            Self::OffsetUpdate => 3,
            Self::StartRecording => 4,
            Self::StopRecording => 5,
        }
    }

    /// `None` for codes this build does not know
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            3 => Some(Self::OffsetUpdate),
            4 => Some(Self::StartRecording),
            5 => Some(Self::StopRecording),
            _ => None,
        }
    }
}

/// Header preceding a transferred file's bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDetails {
    pub name: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for method in [
            RpcMethod::OffsetUpdate,
            RpcMethod::StartRecording,
            RpcMethod::StopRecording,
        ] {
            assert_eq!(RpcMethod::from_code(method.code()), Some(method));
        }
        assert_eq!(RpcMethod::from_code(0), None);
        assert_eq!(RpcMethod::from_code(-7), None);
    }
}
