//! Module and module-instance data model
//!
//! A [`Module`] is a firmware catalog entry: what a class of processing block
//! can do (resources, format interfaces, pin counts). A [`ModuleConfig`] is
//! one placement of that module inside a pipeline as described by the
//! topology. The orchestration code only mutates the pin arrays and the
//! lifecycle state of a `ModuleConfig`; everything else is owned by the
//! topology loader.

use crate::error::{DspError, Result};
use crate::pin::Pin;
use bytes::Bytes;
use skl_chip::topology::{DeviceType, HwConnType, ModuleType};
use std::fmt;
use std::sync::Arc;

/// 128-bit module class identifier, in firmware byte order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModuleUuid(pub [u8; 16]);

impl ModuleUuid {
    /// Copier module.
    pub const COPIER: Self = Self([
        131, 12, 160, 155, 18, 202, 131, 74, 148, 60, 31, 162, 232, 47, 157, 218,
    ]);
}

impl fmt::Display for ModuleUuid {
    // Little-endian GUID text form: the first three groups are byte-swapped.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-",
            b[3], b[2], b[1], b[0], b[5], b[4], b[7], b[6], b[8], b[9]
        )?;
        for byte in &b[10..] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ModuleUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleUuid({self})")
    }
}

/// Identity of a module instance.
///
/// `module_id` is assigned by the firmware per module class, `instance_id`
/// by the topology, `pvt_id` by the driver per instantiation. Firmware
/// messages address pipeline members by `(module_id, pvt_id)`; pins record
/// their peer by `(module_id, instance_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModuleInstanceId {
    /// Firmware module type id
    pub module_id: u16,
    /// Topology instance id
    pub instance_id: u8,
    /// Firmware private id
    pub pvt_id: u8,
}

impl ModuleInstanceId {
    /// Whether two ids name the same topology instance (private id ignored).
    pub const fn same_instance(&self, other: &Self) -> bool {
        self.module_id == other.module_id && self.instance_id == other.instance_id
    }
}

impl fmt::Display for ModuleInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module_id, self.instance_id)
    }
}

/// Audio format of one module pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioFormat {
    /// Channel count
    pub channels: u8,
    /// Sample rate in Hz
    pub s_freq: u32,
    /// Container width in bits
    pub bit_depth: u32,
    /// Significant bits per sample
    pub valid_bit_depth: u8,
    /// Channel configuration (mono, stereo, 5.1, ...)
    pub ch_cfg: u32,
    /// Interleaving style
    pub interleaving: u32,
    /// Sample type
    pub sample_type: u8,
    /// Channel map, one nibble per channel
    pub ch_map: u32,
}

/// Format interface: one input format per input pin, one output format per
/// output pin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleInterface {
    /// Input pin formats
    pub inputs: Vec<AudioFormat>,
    /// Output pin formats
    pub outputs: Vec<AudioFormat>,
}

/// Resource descriptor of a module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModuleResource {
    /// Instance page count
    pub is_pages: u32,
    /// Cycles per second budget
    pub cps: u32,
    /// Input buffer size in bytes
    pub ibs: u32,
    /// Output buffer size in bytes
    pub obs: u32,
    /// Gateway DMA buffer size, used when the topology declares it
    pub dma_buffer_size: u32,
    /// Cycles per chunk
    pub cpc: u32,
}

/// Firmware catalog entry for a module class.
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Module class identifier
    pub uuid: ModuleUuid,
    /// Resource descriptors, selected by [`ModuleConfig::res_idx`]
    pub resources: Vec<ModuleResource>,
    /// Format interfaces, selected by [`ModuleConfig::fmt_idx`]
    pub formats: Vec<ModuleInterface>,
    /// Number of input pins of every instance
    pub max_input_pins: u8,
    /// Number of output pins of every instance
    pub max_output_pins: u8,
    /// Module is loaded on demand rather than built into the base firmware
    pub loadable: bool,
}

/// Lifecycle of a module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ModuleState {
    /// Not instantiated in firmware
    #[default]
    Uninit,
    /// Loadable module code present in firmware
    Loaded,
    /// INIT_INSTANCE succeeded
    InitDone,
    /// At least one output pin bound
    BindDone,
}

/// Gain module parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GainConfig {
    /// Target volume per channel; channels past the end use the first entry
    pub volume: Vec<u32>,
    /// Ramp curve
    pub ramp_type: u32,
    /// Ramp duration
    pub ramp_duration: u64,
}

impl GainConfig {
    /// Target volume for an output channel.
    pub fn volume_for(&self, channel: usize) -> u32 {
        self.volume
            .get(channel)
            .or_else(|| self.volume.first())
            .copied()
            .unwrap_or(0)
    }
}

/// One placement of a module in a pipeline.
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    /// Instance identity
    pub id: ModuleInstanceId,
    /// Module class
    pub m_type: ModuleType,
    /// Catalog entry
    pub module: Arc<Module>,
    /// Selected resource descriptor
    pub res_idx: usize,
    /// Selected format interface
    pub fmt_idx: usize,
    /// Owning pipeline id
    pub pipe_id: u8,
    /// DSP core
    pub core_id: u8,
    /// Scheduling domain
    pub domain: u8,
    /// Gateway device
    pub dev_type: DeviceType,
    /// Gateway side
    pub hw_conn_type: HwConnType,
    /// Virtual bus (SSP port, DMIC link, ...)
    pub vbus_id: u8,
    /// TDM time slot
    pub time_slot: u8,
    /// SoundWire stream number
    pub sdw_stream_num: u8,
    /// SoundWire multi-link aggregation
    pub sdw_agg_enable: bool,
    /// DMA buffer size multiplier applied to the directional buffer size
    pub dma_buffer_size: u32,
    /// INIT capability blob (NHLT gateway blob, algorithm parameters)
    pub caps: Bytes,
    /// Gain parameters of GAIN modules
    pub gain: Option<GainConfig>,
    /// Input pins, `module.max_input_pins` long
    pub in_pins: Vec<Pin>,
    /// Output pins, `module.max_output_pins` long
    pub out_pins: Vec<Pin>,
    /// Lifecycle state
    pub state: ModuleState,
}

impl ModuleConfig {
    /// Placement with all pins dynamic and every optional field zeroed.
    pub fn new(id: ModuleInstanceId, m_type: ModuleType, module: Arc<Module>, pipe_id: u8) -> Self {
        let in_pins = (0..module.max_input_pins).map(Pin::dynamic).collect();
        let out_pins = (0..module.max_output_pins).map(Pin::dynamic).collect();
        Self {
            id,
            m_type,
            module,
            res_idx: 0,
            fmt_idx: 0,
            pipe_id,
            core_id: 0,
            domain: 0,
            dev_type: DeviceType::None,
            hw_conn_type: HwConnType::None,
            vbus_id: 0,
            time_slot: 0,
            sdw_stream_num: 0,
            sdw_agg_enable: false,
            dma_buffer_size: 0,
            caps: Bytes::new(),
            gain: None,
            in_pins,
            out_pins,
            state: ModuleState::Uninit,
        }
    }

    /// Set the gateway device and side.
    #[must_use]
    pub fn with_gateway(mut self, dev_type: DeviceType, hw_conn_type: HwConnType) -> Self {
        self.dev_type = dev_type;
        self.hw_conn_type = hw_conn_type;
        self
    }

    /// Set the INIT capability blob.
    #[must_use]
    pub fn with_caps(mut self, caps: impl Into<Bytes>) -> Self {
        self.caps = caps.into();
        self
    }

    /// Selected resource descriptor.
    ///
    /// # Errors
    ///
    /// Returns error if `res_idx` is out of range.
    pub fn resource(&self) -> Result<&ModuleResource> {
        self.module.resources.get(self.res_idx).ok_or_else(|| {
            DspError::invalid_argument(format!(
                "module {}: resource index {} out of range ({} resources)",
                self.id,
                self.res_idx,
                self.module.resources.len()
            ))
        })
    }

    /// Selected format interface.
    ///
    /// # Errors
    ///
    /// Returns error if `fmt_idx` is out of range.
    pub fn interface(&self) -> Result<&ModuleInterface> {
        self.module.formats.get(self.fmt_idx).ok_or_else(|| {
            DspError::invalid_argument(format!(
                "module {}: format index {} out of range ({} interfaces)",
                self.id,
                self.fmt_idx,
                self.module.formats.len()
            ))
        })
    }

    /// Format of input pin `index` in the selected interface.
    ///
    /// # Errors
    ///
    /// Returns error if the interface or the pin format is missing.
    pub fn input_format(&self, index: usize) -> Result<&AudioFormat> {
        self.interface()?.inputs.get(index).ok_or_else(|| {
            DspError::invalid_argument(format!("module {}: no input format {index}", self.id))
        })
    }

    /// Format of output pin `index` in the selected interface.
    ///
    /// # Errors
    ///
    /// Returns error if the interface or the pin format is missing.
    pub fn output_format(&self, index: usize) -> Result<&AudioFormat> {
        self.interface()?.outputs.get(index).ok_or_else(|| {
            DspError::invalid_argument(format!("module {}: no output format {index}", self.id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn copier() -> Arc<Module> {
        Arc::new(Module {
            uuid: ModuleUuid::COPIER,
            resources: vec![ModuleResource {
                ibs: 384,
                obs: 384,
                ..ModuleResource::default()
            }],
            formats: vec![ModuleInterface {
                inputs: vec![AudioFormat::default()],
                outputs: vec![AudioFormat::default(); 2],
            }],
            max_input_pins: 1,
            max_output_pins: 2,
            loadable: false,
        })
    }

    #[test]
    fn test_copier_uuid_text_form() {
        assert_eq!(
            ModuleUuid::COPIER.to_string(),
            "9ba00c83-ca12-4a83-943c-1fa2e82f9dda"
        );
    }

    #[test]
    fn test_new_config_sizes_pins_from_module() {
        let id = ModuleInstanceId {
            module_id: 1,
            instance_id: 2,
            pvt_id: 0,
        };
        let cfg = ModuleConfig::new(id, ModuleType::Copier, copier(), 1);
        assert_eq!(cfg.in_pins.len(), 1);
        assert_eq!(cfg.out_pins.len(), 2);
        assert!(cfg.out_pins.iter().all(|p| p.is_dynamic && !p.in_use));
        assert_eq!(cfg.state, ModuleState::Uninit);
    }

    #[test]
    fn test_out_of_range_indices_are_rejected() {
        let id = ModuleInstanceId::default();
        let mut cfg = ModuleConfig::new(id, ModuleType::Mixer, copier(), 1);
        assert!(cfg.output_format(1).is_ok());
        assert!(cfg.output_format(2).is_err());
        cfg.res_idx = 3;
        assert!(matches!(cfg.resource(), Err(DspError::InvalidArgument { .. })));
    }

    #[test]
    fn test_gain_volume_falls_back_to_first_channel() {
        let gain = GainConfig {
            volume: vec![10, 20],
            ..GainConfig::default()
        };
        assert_eq!(gain.volume_for(1), 20);
        assert_eq!(gain.volume_for(5), 10);
        assert_eq!(GainConfig::default().volume_for(0), 0);
    }

    #[test]
    fn test_module_states_are_ordered() {
        assert!(ModuleState::InitDone < ModuleState::BindDone);
        assert!(ModuleState::Loaded < ModuleState::InitDone);
    }
}
