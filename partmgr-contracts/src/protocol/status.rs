// SPDX-License-Identifier: GPL-3.0-only

/// A host status code, as carried in a completed request
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NtStatus(pub u32);

impl NtStatus {
    pub const SUCCESS: Self = Self(0x0000_0000);
    pub const PENDING: Self = Self(0x0000_0103);
    pub const BUFFER_OVERFLOW: Self = Self(0x8000_0005);
    pub const INFO_LENGTH_MISMATCH: Self = Self(0xC000_0004);
    pub const INVALID_PARAMETER: Self = Self(0xC000_000D);
    pub const INVALID_DEVICE_REQUEST: Self = Self(0xC000_0010);
    pub const BUFFER_TOO_SMALL: Self = Self(0xC000_0023);
    pub const OBJECT_NAME_NOT_FOUND: Self = Self(0xC000_0034);
    pub const OBJECT_NAME_COLLISION: Self = Self(0xC000_0035);
    pub const INSUFFICIENT_RESOURCES: Self = Self(0xC000_009A);
    pub const DEVICE_NOT_READY: Self = Self(0xC000_00A3);
    pub const NOT_SUPPORTED: Self = Self(0xC000_00BB);
    pub const NAME_TOO_LONG: Self = Self(0xC000_0106);
    pub const IO_DEVICE_ERROR: Self = Self(0xC000_0185);

    /// Success and informational codes; warnings such as buffer overflow are not success.
    pub fn is_success(self) -> bool {
        (self.0 as i32) >= 0
    }

    pub fn is_warning(self) -> bool {
        self.0 >> 30 == 0b10
    }

    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::SUCCESS => "STATUS_SUCCESS",
            Self::PENDING => "STATUS_PENDING",
            Self::BUFFER_OVERFLOW => "STATUS_BUFFER_OVERFLOW",
            Self::INFO_LENGTH_MISMATCH => "STATUS_INFO_LENGTH_MISMATCH",
            Self::INVALID_PARAMETER => "STATUS_INVALID_PARAMETER",
            Self::INVALID_DEVICE_REQUEST => "STATUS_INVALID_DEVICE_REQUEST",
            Self::BUFFER_TOO_SMALL => "STATUS_BUFFER_TOO_SMALL",
            Self::OBJECT_NAME_NOT_FOUND => "STATUS_OBJECT_NAME_NOT_FOUND",
            Self::OBJECT_NAME_COLLISION => "STATUS_OBJECT_NAME_COLLISION",
            Self::INSUFFICIENT_RESOURCES => "STATUS_INSUFFICIENT_RESOURCES",
            Self::DEVICE_NOT_READY => "STATUS_DEVICE_NOT_READY",
            Self::NOT_SUPPORTED => "STATUS_NOT_SUPPORTED",
            Self::NAME_TOO_LONG => "STATUS_NAME_TOO_LONG",
            Self::IO_DEVICE_ERROR => "STATUS_IO_DEVICE_ERROR",
            _ => return None,
        };
        Some(name)
    }
}

impl std::fmt::Display for NtStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({:#010x})", self.0),
            None => write!(f, "{:#010x}", self.0),
        }
    }
}

impl std::fmt::Debug for NtStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}
