//! Error types for DSP orchestration operations

use skl_chip::ipc::status;
use thiserror::Error;

/// Result type alias for DSP operations
pub type Result<T> = std::result::Result<T, DspError>;

/// Errors that can occur while driving the DSP firmware
#[derive(Debug, Error)]
pub enum DspError {
    /// Firmware replied with a non-success status
    #[error("Firmware rejected {request}: status {status} ({})", status::describe(*.status))]
    Firmware {
        /// Request that was rejected
        request: &'static str,
        /// Raw firmware status code
        status: u32,
    },

    /// IPC transport failed before a reply was received
    #[error("IPC transport failed: {reason}")]
    Transport {
        /// Reason for failure
        reason: String,
    },

    /// No free or matching pin slot on a module
    #[error("No free {direction} pin on module {module_id}:{instance_id}")]
    NoFreePin {
        /// "input" or "output"
        direction: &'static str,
        /// Firmware module id
        module_id: u16,
        /// Topology instance id
        instance_id: u8,
    },

    /// Module init attempted on a pipeline that is not in the created state
    #[error("Pipeline {ppl_id} is not in the created state")]
    PipeNotCreated {
        /// Pipeline id
        ppl_id: u8,
    },

    /// Topology record carries an out-of-range index or inconsistent field
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Reason for failure
        reason: String,
    },

    /// Module UUID not present in the firmware catalog
    #[error("Unknown module UUID {uuid}")]
    UnknownModule {
        /// Formatted UUID
        uuid: String,
    },

    /// Every private id of a module is in use
    #[error("No free private id for module {module_id} (max {max_instances} instances)")]
    NoPrivateId {
        /// Firmware module id
        module_id: u16,
        /// Instance limit of the module
        max_instances: usize,
    },

    /// PCI device id with no registered DSP variant
    #[error("Unsupported PCI device {pci_id:#06x}")]
    UnsupportedDevice {
        /// PCI device id
        pci_id: u16,
    },

    /// DMA backend failure
    #[error("DMA failed: {reason}")]
    Dma {
        /// Reason for failure
        reason: String,
    },

    /// Object is in a state that does not allow the operation
    #[error("Invalid state: {state}")]
    InvalidState {
        /// Current state description
        state: String,
    },
}

impl DspError {
    /// Create a firmware status error
    pub fn firmware(request: &'static str, status: u32) -> Self {
        Self::Firmware { request, status }
    }

    /// Create a transport error
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a DMA error
    pub fn dma(reason: impl Into<String>) -> Self {
        Self::Dma {
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(state: impl Into<String>) -> Self {
        Self::InvalidState {
            state: state.into(),
        }
    }

    /// Firmware status code, if the firmware produced this error.
    pub fn firmware_status(&self) -> Option<u32> {
        match self {
            Self::Firmware { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firmware_error_names_status() {
        let err = DspError::firmware("BIND", status::INVALID_RESOURCE_STATE);
        assert_eq!(
            err.to_string(),
            "Firmware rejected BIND: status 12 (invalid resource state)"
        );
        assert_eq!(err.firmware_status(), Some(12));
    }

    #[test]
    fn test_helpers_build_struct_variants() {
        assert!(matches!(DspError::dma("x"), DspError::Dma { .. }));
        assert!(DspError::transport("x").firmware_status().is_none());
    }
}
