//! Topology enumerations shared between the topology binary and the firmware.
//!
//! The numeric values are part of the topology file ABI and are carried into
//! IPC payloads unchanged, so every enum is `#[repr(u32)]` with explicit
//! discriminants and a `from_raw` decoder.

/// Firmware module class of a module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ModuleType {
    /// Mixer: base configuration only.
    Mixer = 0,
    /// Copier: moves data between a gateway (DMA/link) and the pipeline.
    Copier = 1,
    /// Channel up/down mixer.
    UpDownMixer = 2,
    /// Synchronous sample-rate converter.
    SrcInt = 3,
    /// Generic processing algorithm with an opaque parameter blob.
    Algo = 4,
    /// Base configuration plus output format.
    BaseOutFmt = 5,
    /// Keyword pre-buffer.
    Kpb = 6,
    /// Microphone select (demux).
    MicSelect = 7,
    /// Probe extraction/injection module.
    Probe = 8,
    /// Asynchronous sample-rate converter.
    Asrc = 9,
    /// Gain/volume module.
    Gain = 10,
}

impl ModuleType {
    /// Decode a topology module type value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Mixer,
            1 => Self::Copier,
            2 => Self::UpDownMixer,
            3 => Self::SrcInt,
            4 => Self::Algo,
            5 => Self::BaseOutFmt,
            6 => Self::Kpb,
            7 => Self::MicSelect,
            8 => Self::Probe,
            9 => Self::Asrc,
            10 => Self::Gain,
            _ => return None,
        })
    }
}

/// Device (gateway) type a copier is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DeviceType {
    /// Bluetooth over an I2S/SSP port.
    Bt = 0,
    /// Digital microphone link.
    Dmic = 1,
    /// I2S/SSP port.
    I2s = 2,
    /// SLIMbus link (no gateway support).
    Slimbus = 3,
    /// HD-Audio link DMA.
    HdaLink = 4,
    /// HD-Audio host DMA.
    HdaHost = 5,
    /// SoundWire PCM stream.
    SdwPcm = 6,
    /// SoundWire PDM stream.
    SdwPdm = 7,
    /// No device: pure in-memory module.
    None = 8,
}

impl DeviceType {
    /// Decode a topology device type value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Bt,
            1 => Self::Dmic,
            2 => Self::I2s,
            3 => Self::Slimbus,
            4 => Self::HdaLink,
            5 => Self::HdaHost,
            6 => Self::SdwPcm,
            7 => Self::SdwPdm,
            8 => Self::None,
            _ => return None,
        })
    }
}

/// Which side of the DSP the gateway faces.
///
/// `Source` means the module sources data into the DSP from the host side of
/// the gateway (playback for host DMA), `Sink` the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum HwConnType {
    /// Not connected to hardware.
    #[default]
    None = 0,
    /// Data flows from the gateway into the pipeline.
    Source = 1,
    /// Data flows from the pipeline out to the gateway.
    Sink = 2,
}

impl HwConnType {
    /// Decode a topology connection type value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::None,
            1 => Self::Source,
            2 => Self::Sink,
            _ => return None,
        })
    }
}

/// PCM stream direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamDirection {
    /// Host to device.
    #[default]
    Playback,
    /// Device to host.
    Capture,
}

/// Bit depths accepted by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BitDepth {
    Depth8 = 8,
    Depth16 = 16,
    Depth24 = 24,
    Depth32 = 32,
}

impl BitDepth {
    /// Map a PCM sample width in bits to a firmware bit depth.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(Self::Depth8),
            16 => Some(Self::Depth16),
            24 => Some(Self::Depth24),
            32 => Some(Self::Depth32),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_type_round_trips_raw_values() {
        for raw in 0..=10 {
            let ty = ModuleType::from_raw(raw).unwrap();
            assert_eq!(ty as u32, raw);
        }
        assert_eq!(ModuleType::from_raw(11), None);
    }

    #[test]
    fn device_type_round_trips_raw_values() {
        for raw in 0..=8 {
            assert_eq!(DeviceType::from_raw(raw).unwrap() as u32, raw);
        }
        assert_eq!(DeviceType::from_raw(42), None);
    }

    #[test]
    fn only_firmware_bit_depths_are_accepted() {
        assert_eq!(BitDepth::from_bits(24), Some(BitDepth::Depth24));
        assert_eq!(BitDepth::from_bits(20), None);
    }
}
