// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

use super::NtStatus;

/// Failures reported by the partition manager
///
/// Every variant converts to exactly one status code; buffer-size variants also carry
/// the byte count a caller needs to retry with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartMgrError {
    #[error("insufficient resources")]
    InsufficientResources,

    #[error("buffer too small: {required} bytes required")]
    BufferTooSmall { required: usize },

    #[error("buffer overflow: {required} bytes required")]
    BufferOverflow { required: usize },

    #[error("input buffer too short: {required} bytes required")]
    InfoLengthMismatch { required: usize },

    #[error("invalid device request")]
    InvalidDeviceRequest,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("not supported")]
    NotSupported,

    #[error("name too long: {0}")]
    NameTooLong(String),

    #[error("lower device failed: {0}")]
    Lower(NtStatus),
}

impl PartMgrError {
    pub fn status(&self) -> NtStatus {
        match self {
            Self::InsufficientResources => NtStatus::INSUFFICIENT_RESOURCES,
            Self::BufferTooSmall { .. } => NtStatus::BUFFER_TOO_SMALL,
            Self::BufferOverflow { .. } => NtStatus::BUFFER_OVERFLOW,
            Self::InfoLengthMismatch { .. } => NtStatus::INFO_LENGTH_MISMATCH,
            Self::InvalidDeviceRequest => NtStatus::INVALID_DEVICE_REQUEST,
            Self::InvalidParameter(_) => NtStatus::INVALID_PARAMETER,
            Self::NotSupported => NtStatus::NOT_SUPPORTED,
            Self::NameTooLong(_) => NtStatus::NAME_TOO_LONG,
            Self::Lower(status) => *status,
        }
    }

    /// Byte count to report with the failure
    pub fn information(&self) -> usize {
        match self {
            Self::BufferTooSmall { required }
            | Self::BufferOverflow { required }
            | Self::InfoLengthMismatch { required } => *required,
            _ => 0,
        }
    }
}

impl From<NtStatus> for PartMgrError {
    fn from(status: NtStatus) -> Self {
        Self::Lower(status)
    }
}

pub type Result<T> = std::result::Result<T, PartMgrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_errors_report_required_bytes() {
        let err = PartMgrError::BufferTooSmall { required: 144 };
        assert_eq!(err.status(), NtStatus::BUFFER_TOO_SMALL);
        assert_eq!(err.information(), 144);

        let err = PartMgrError::BufferOverflow { required: 48 };
        assert_eq!(err.status(), NtStatus::BUFFER_OVERFLOW);
        assert_eq!(err.information(), 48);
    }

    #[test]
    fn lower_failures_pass_through_verbatim() {
        let err = PartMgrError::from(NtStatus::IO_DEVICE_ERROR);
        assert_eq!(err.status(), NtStatus::IO_DEVICE_ERROR);
        assert_eq!(err.information(), 0);
    }
}
