use thiserror::Error;

/// virtnet error types
#[derive(Error, Debug)]
pub enum NetError {
    /// Malformed CIDR block or IP literal
    #[error("Invalid address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    /// Address block too small to hold host, broadcast and a DHCP lease
    #[error("Netmask too strict for {cidr}: only {usable} usable addresses ({family})")]
    RangeTooSmall {
        cidr: String,
        usable: u128,
        family: String,
    },

    /// Forwarding mode not one of isolated/nat/route/bridge
    #[error("Unsupported network mode '{0}'")]
    UnsupportedMode(String),

    /// Bridge mode without a bridge name
    #[error("'bridge' must be provided when using the bridged network mode")]
    MissingBridge,

    /// Failure reported by the virtualization service, message passed through
    #[error("Virtualization service error: {0}")]
    External(String),

    /// Lookup found no network with the given identity
    #[error("Network not found: {0}")]
    NotFound(String),

    /// Polling deadline exceeded before the target state was reached
    #[error("Timeout waiting for network {subject} to reach {target} after {timeout_ms}ms")]
    ConvergenceTimeout {
        subject: String,
        target: String,
        timeout_ms: u64,
        last_error: Option<String>,
    },

    /// A change to an immutable field was requested in place
    #[error("Network '{name}' must be replaced to change: {}", .fields.join(", "))]
    ReplacementRequired { name: String, fields: Vec<String> },

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl NetError {
    /// Whether this error means the network is absent rather than broken.
    pub fn is_not_found(&self) -> bool {
        matches!(self, NetError::NotFound(_))
    }

    pub(crate) fn invalid_address(input: &str, reason: impl ToString) -> Self {
        NetError::InvalidAddress {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for NetError {
    fn from(err: serde_json::Error) -> Self {
        NetError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for NetError {
    fn from(err: serde_yaml::Error) -> Self {
        NetError::SerializationError(err.to_string())
    }
}

/// Result type alias for virtnet operations
pub type Result<T> = std::result::Result<T, NetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_address_display() {
        let error = NetError::invalid_address("10.0.0.0/33", "invalid IP address syntax");
        assert_eq!(
            error.to_string(),
            "Invalid address '10.0.0.0/33': invalid IP address syntax"
        );
    }

    #[test]
    fn test_range_too_small_display() {
        let error = NetError::RangeTooSmall {
            cidr: "10.0.0.0/30".to_string(),
            usable: 2,
            family: "ipv4".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Netmask too strict for 10.0.0.0/30: only 2 usable addresses (ipv4)"
        );
    }

    #[test]
    fn test_unsupported_mode_display() {
        let error = NetError::UnsupportedMode("spanning".to_string());
        assert_eq!(error.to_string(), "Unsupported network mode 'spanning'");
    }

    #[test]
    fn test_convergence_timeout_display() {
        let error = NetError::ConvergenceTimeout {
            subject: "k8snet".to_string(),
            target: "ACTIVE".to_string(),
            timeout_ms: 60000,
            last_error: None,
        };
        assert_eq!(
            error.to_string(),
            "Timeout waiting for network k8snet to reach ACTIVE after 60000ms"
        );
    }

    #[test]
    fn test_replacement_required_display() {
        let error = NetError::ReplacementRequired {
            name: "k8snet".to_string(),
            fields: vec!["mode".to_string(), "addresses".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "Network 'k8snet' must be replaced to change: mode, addresses"
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(NetError::NotFound("abc".to_string()).is_not_found());
        assert!(!NetError::External("boom".to_string()).is_not_found());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let net_error: NetError = io_error.into();
        assert!(matches!(net_error, NetError::IoError(_)));
        assert!(net_error.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_yaml_error_conversion() {
        let result: std::result::Result<serde_yaml::Value, _> =
            serde_yaml::from_str("invalid: yaml: content:");
        let net_error: NetError = result.unwrap_err().into();
        assert!(matches!(net_error, NetError::SerializationError(_)));
    }
}
