//! Error types for Wi-Fi control

use thiserror::Error;

/// Result type for adapter operations
pub type WifiResult<T> = Result<T, WifiError>;

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Why a privileged platform operation could not be used
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Unavailable {
    #[error("operation not found")]
    NotFound,

    #[error("access denied")]
    AccessDenied,

    #[error("invocation fault: {0}")]
    InvocationFault(String),
}

/// Errors related to adapter operations
#[derive(Error, Debug, Clone)]
pub enum WifiError {
    #[error("WiFi scan failed: {0}")]
    ScanFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Profile operation failed: {0}")]
    ProfileFailed(String),

    #[error("Network interface error: {0}")]
    InterfaceError(String),

    #[error("wpa_supplicant error: {0}")]
    WpaSupplicantError(String),

    #[error("Privileged operation `{operation}` unavailable: {reason}")]
    OperationUnavailable {
        operation: &'static str,
        reason: Unavailable,
    },
}

/// Errors related to service operations
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Connection request rejected for {0}")]
    ConnectRejected(String),

    #[error("No connection confirmation within {0:?}")]
    ConfirmationTimeout(std::time::Duration),

    #[error("Connectivity listener closed")]
    ListenerClosed,
}
