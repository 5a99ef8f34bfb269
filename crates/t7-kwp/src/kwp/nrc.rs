//! KWP2000 negative response codes

use std::fmt;

/// Reason code carried at byte 5 of a negative (0x7F) response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    GeneralReject,
    ServiceNotSupported,
    SubFunctionNotSupportedInvalidFormat,
    BusyRepeatRequest,
    ConditionsNotCorrect,
    RoutineNotComplete,
    RequestOutOfRange,
    SecurityAccessDenied,
    InvalidKey,
    ExceedNumberOfAttempts,
    RequiredTimeDelayNotExpired,
    DownloadNotAccepted,
    ImproperDownloadType,
    CannotDownloadToSpecifiedAddress,
    CannotDownloadNumberOfBytesRequested,
    UploadNotAccepted,
    ImproperUploadType,
    CannotUploadFromSpecifiedAddress,
    CannotUploadNumberOfBytesRequested,
    TransferSuspended,
    TransferAborted,
    IllegalAddressInBlockTransfer,
    IllegalByteCountInBlockTransfer,
    IllegalBlockTransferType,
    BlockTransferDataChecksumError,
    ResponsePending,
    IncorrectByteCountDuringBlockTransfer,
    ServiceNotSupportedInActiveDiagnosticMode,

    /// Unknown/manufacturer specific code
    Unknown(u8),
}

impl From<u8> for ResponseCode {
    fn from(value: u8) -> Self {
        match value {
            0x10 => Self::GeneralReject,
            0x11 => Self::ServiceNotSupported,
            0x12 => Self::SubFunctionNotSupportedInvalidFormat,
            0x21 => Self::BusyRepeatRequest,
            0x22 => Self::ConditionsNotCorrect,
            0x23 => Self::RoutineNotComplete,
            0x31 => Self::RequestOutOfRange,
            0x33 => Self::SecurityAccessDenied,
            0x35 => Self::InvalidKey,
            0x36 => Self::ExceedNumberOfAttempts,
            0x37 => Self::RequiredTimeDelayNotExpired,
            0x40 => Self::DownloadNotAccepted,
            0x41 => Self::ImproperDownloadType,
            0x42 => Self::CannotDownloadToSpecifiedAddress,
            0x43 => Self::CannotDownloadNumberOfBytesRequested,
            0x50 => Self::UploadNotAccepted,
            0x51 => Self::ImproperUploadType,
            0x52 => Self::CannotUploadFromSpecifiedAddress,
            0x53 => Self::CannotUploadNumberOfBytesRequested,
            0x71 => Self::TransferSuspended,
            0x72 => Self::TransferAborted,
            0x74 => Self::IllegalAddressInBlockTransfer,
            0x75 => Self::IllegalByteCountInBlockTransfer,
            0x76 => Self::IllegalBlockTransferType,
            0x77 => Self::BlockTransferDataChecksumError,
            0x78 => Self::ResponsePending,
            0x79 => Self::IncorrectByteCountDuringBlockTransfer,
            0x80 => Self::ServiceNotSupportedInActiveDiagnosticMode,
            other => Self::Unknown(other),
        }
    }
}

impl From<ResponseCode> for u8 {
    fn from(code: ResponseCode) -> Self {
        match code {
            ResponseCode::GeneralReject => 0x10,
            ResponseCode::ServiceNotSupported => 0x11,
            ResponseCode::SubFunctionNotSupportedInvalidFormat => 0x12,
            ResponseCode::BusyRepeatRequest => 0x21,
            ResponseCode::ConditionsNotCorrect => 0x22,
            ResponseCode::RoutineNotComplete => 0x23,
            ResponseCode::RequestOutOfRange => 0x31,
            ResponseCode::SecurityAccessDenied => 0x33,
            ResponseCode::InvalidKey => 0x35,
            ResponseCode::ExceedNumberOfAttempts => 0x36,
            ResponseCode::RequiredTimeDelayNotExpired => 0x37,
            ResponseCode::DownloadNotAccepted => 0x40,
            ResponseCode::ImproperDownloadType => 0x41,
            ResponseCode::CannotDownloadToSpecifiedAddress => 0x42,
            ResponseCode::CannotDownloadNumberOfBytesRequested => 0x43,
            ResponseCode::UploadNotAccepted => 0x50,
            ResponseCode::ImproperUploadType => 0x51,
            ResponseCode::CannotUploadFromSpecifiedAddress => 0x52,
            ResponseCode::CannotUploadNumberOfBytesRequested => 0x53,
            ResponseCode::TransferSuspended => 0x71,
            ResponseCode::TransferAborted => 0x72,
            ResponseCode::IllegalAddressInBlockTransfer => 0x74,
            ResponseCode::IllegalByteCountInBlockTransfer => 0x75,
            ResponseCode::IllegalBlockTransferType => 0x76,
            ResponseCode::BlockTransferDataChecksumError => 0x77,
            ResponseCode::ResponsePending => 0x78,
            ResponseCode::IncorrectByteCountDuringBlockTransfer => 0x79,
            ResponseCode::ServiceNotSupportedInActiveDiagnosticMode => 0x80,
            ResponseCode::Unknown(v) => v,
        }
    }
}

impl fmt::UpperHex for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value: u8 = (*self).into();
        fmt::UpperHex::fmt(&value, f)
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::GeneralReject => "general reject",
            Self::ServiceNotSupported => "service not supported",
            Self::SubFunctionNotSupportedInvalidFormat => "sub-function not supported or invalid format",
            Self::BusyRepeatRequest => "busy, repeat request",
            Self::ConditionsNotCorrect => "conditions not correct or request sequence error",
            Self::RoutineNotComplete => "routine not complete",
            Self::RequestOutOfRange => "request out of range",
            Self::SecurityAccessDenied => "security access denied",
            Self::InvalidKey => "invalid key",
            Self::ExceedNumberOfAttempts => "exceeded number of attempts",
            Self::RequiredTimeDelayNotExpired => "required time delay not expired",
            Self::DownloadNotAccepted => "download not accepted",
            Self::ImproperDownloadType => "improper download type",
            Self::CannotDownloadToSpecifiedAddress => "cannot download to specified address",
            Self::CannotDownloadNumberOfBytesRequested => "cannot download number of bytes requested",
            Self::UploadNotAccepted => "upload not accepted",
            Self::ImproperUploadType => "improper upload type",
            Self::CannotUploadFromSpecifiedAddress => "cannot upload from specified address",
            Self::CannotUploadNumberOfBytesRequested => "cannot upload number of bytes requested",
            Self::TransferSuspended => "transfer suspended",
            Self::TransferAborted => "transfer aborted",
            Self::IllegalAddressInBlockTransfer => "illegal address in block transfer",
            Self::IllegalByteCountInBlockTransfer => "illegal byte count in block transfer",
            Self::IllegalBlockTransferType => "illegal block transfer type",
            Self::BlockTransferDataChecksumError => "block transfer data checksum error",
            Self::ResponsePending => "request correctly received, response pending",
            Self::IncorrectByteCountDuringBlockTransfer => "incorrect byte count during block transfer",
            Self::ServiceNotSupportedInActiveDiagnosticMode => {
                "service not supported in active diagnostic mode"
            }
            Self::Unknown(v) => return write!(f, "unknown response code 0x{:02X}", v),
        };
        f.write_str(text)
    }
}
