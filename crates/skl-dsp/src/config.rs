//! Driver configuration
//!
//! Code-level knobs of the orchestration engine. There is no configuration
//! file: the topology loader (or the CLI) builds a [`DspConfig`] from the
//! detected variant and overrides what it needs.

use skl_chip::ipc::MAILBOX_SIZE;
use skl_chip::pcie::DspVariant;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DspConfig {
    /// Mailbox window size; large-config payloads are split at this size
    pub mailbox_size: usize,
    /// Topology declares per-resource DMA buffer sizes
    pub declared_dma_buffers: bool,
    /// Firmware log priority applied by `enable_logging`
    pub log_priority: u32,
    /// Number of DSP cores
    pub num_cores: u8,
}

impl Default for DspConfig {
    fn default() -> Self {
        Self {
            mailbox_size: MAILBOX_SIZE,
            declared_dma_buffers: false,
            log_priority: 0,
            num_cores: 2,
        }
    }
}

impl DspConfig {
    /// Defaults for a detected variant.
    pub fn for_variant(variant: &DspVariant) -> Self {
        Self {
            num_cores: variant.num_cores,
            ..Self::default()
        }
    }

    /// Override the mailbox window size.
    #[must_use]
    pub fn with_mailbox_size(mut self, mailbox_size: usize) -> Self {
        self.mailbox_size = mailbox_size;
        self
    }

    /// Mark DMA buffer sizes as declared by the topology.
    #[must_use]
    pub fn with_declared_dma_buffers(mut self, declared: bool) -> Self {
        self.declared_dma_buffers = declared;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skl_chip::pcie::device_id;

    #[test]
    fn test_variant_sets_core_count() {
        let cnl = DspVariant::from_pci_id(device_id::CNL).unwrap();
        let cfg = DspConfig::for_variant(cnl);
        assert_eq!(cfg.num_cores, 4);
        assert_eq!(cfg.mailbox_size, MAILBOX_SIZE);
        assert!(!cfg.declared_dma_buffers);
    }

    #[test]
    fn test_builders_override_defaults() {
        let cfg = DspConfig::default()
            .with_mailbox_size(64)
            .with_declared_dma_buffers(true);
        assert_eq!(cfg.mailbox_size, 64);
        assert!(cfg.declared_dma_buffers);
    }
}
