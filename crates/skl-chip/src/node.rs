//! Gateway connector node ids.
//!
//! A copier or probe that talks to hardware names its gateway with a 32-bit
//! connector node id:
//!
//! ```text
//! 31          13 12      8 7         0
//! ┌─────────────┬─────────┬───────────┐
//! │  reserved   │ DMA type│  vindex   │
//! └─────────────┴─────────┴───────────┘
//! ```
//!
//! `DMA type` is a [`DmaClass`], `vindex` the channel/port index inside that
//! class. For I2S-class gateways `vindex` is itself split into an SSP time
//! slot (bits 0–3) and an I2S instance (bits 4–7), see [`SspDmaNode`].
//!
//! The all-ones value [`NodeId::NON_GATEWAY`] marks a copier without an
//! external gateway.

use crate::topology::{DeviceType, HwConnType};

const VINDEX_SHIFT: u32 = 0;
const VINDEX_MASK: u32 = 0xFF;
const DMA_TYPE_SHIFT: u32 = 8;
const DMA_TYPE_MASK: u32 = 0x1F;

/// vindex used by SoundWire streams aggregated across several master links.
pub const SDW_AGGREGATED_VINDEX: u8 = 0x50;

/// Gateway DMA class.
///
/// ```text
/// Value  Class
/// ────── ─────────────────────
/// 0x00   HDA host output
/// 0x01   HDA host input
/// 0x02   HDA host in/out
/// 0x08   HDA link output
/// 0x09   HDA link input
/// 0x0A   HDA link in/out
/// 0x0B   DMIC link input
/// 0x0C   I2S link output
/// 0x0D   I2S link input
/// 0x10   SoundWire link output
/// 0x11   SoundWire link input
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DmaClass {
    HdaHostOutput = 0x00,
    HdaHostInput = 0x01,
    HdaHostInOut = 0x02,
    HdaLinkOutput = 0x08,
    HdaLinkInput = 0x09,
    HdaLinkInOut = 0x0A,
    DmicLinkInput = 0x0B,
    I2sLinkOutput = 0x0C,
    I2sLinkInput = 0x0D,
    SdwLinkOutput = 0x10,
    SdwLinkInput = 0x11,
}

impl DmaClass {
    /// Decode a raw 5-bit DMA type.
    #[must_use]
    pub const fn from_raw(value: u8) -> Option<Self> {
        Some(match value {
            0x00 => Self::HdaHostOutput,
            0x01 => Self::HdaHostInput,
            0x02 => Self::HdaHostInOut,
            0x08 => Self::HdaLinkOutput,
            0x09 => Self::HdaLinkInput,
            0x0A => Self::HdaLinkInOut,
            0x0B => Self::DmicLinkInput,
            0x0C => Self::I2sLinkOutput,
            0x0D => Self::I2sLinkInput,
            0x10 => Self::SdwLinkOutput,
            0x11 => Self::SdwLinkInput,
            _ => return None,
        })
    }

    /// DMA class of a gateway device on the given side of the DSP.
    ///
    /// A `Source` connection selects the output class of the pair. DMIC is
    /// capture-only and always maps to its input class. Devices without a
    /// gateway (SLIMbus, in-memory modules) return `None`.
    #[must_use]
    pub const fn for_device(dev: DeviceType, conn: HwConnType) -> Option<Self> {
        let source = matches!(conn, HwConnType::Source);
        Some(match dev {
            DeviceType::Bt | DeviceType::I2s => {
                pick(source, Self::I2sLinkOutput, Self::I2sLinkInput)
            }
            DeviceType::Dmic => Self::DmicLinkInput,
            DeviceType::HdaLink => pick(source, Self::HdaLinkOutput, Self::HdaLinkInput),
            DeviceType::HdaHost => pick(source, Self::HdaHostOutput, Self::HdaHostInput),
            DeviceType::SdwPcm | DeviceType::SdwPdm => {
                pick(source, Self::SdwLinkOutput, Self::SdwLinkInput)
            }
            DeviceType::Slimbus | DeviceType::None => return None,
        })
    }
}

const fn pick(source: bool, out: DmaClass, inp: DmaClass) -> DmaClass {
    if source {
        out
    } else {
        inp
    }
}

/// Connector node id of a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Copier with no external gateway.
    pub const NON_GATEWAY: Self = Self(0xFFFF_FFFF);

    /// Encode a DMA class and index.
    #[must_use]
    pub const fn new(class: DmaClass, vindex: u8) -> Self {
        Self(
            ((vindex as u32 & VINDEX_MASK) << VINDEX_SHIFT)
                | ((class as u32 & DMA_TYPE_MASK) << DMA_TYPE_SHIFT),
        )
    }

    /// Wrap a raw value read back from a message.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw wire value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Channel/port index.
    #[must_use]
    pub const fn vindex(self) -> u8 {
        ((self.0 >> VINDEX_SHIFT) & VINDEX_MASK) as u8
    }

    /// Raw 5-bit DMA type field.
    #[must_use]
    pub const fn dma_type(self) -> u8 {
        ((self.0 >> DMA_TYPE_SHIFT) & DMA_TYPE_MASK) as u8
    }

    /// Decoded DMA class, `None` for unknown types and the non-gateway id.
    #[must_use]
    pub const fn class(self) -> Option<DmaClass> {
        if self.is_gateway() {
            DmaClass::from_raw(self.dma_type())
        } else {
            None
        }
    }

    /// `false` for [`NodeId::NON_GATEWAY`].
    #[must_use]
    pub const fn is_gateway(self) -> bool {
        self.0 != Self::NON_GATEWAY.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.class() {
            Some(class) => write!(f, "{:#010x} ({class:?}, vindex {})", self.0, self.vindex()),
            None if !self.is_gateway() => write!(f, "{:#010x} (non-gateway)", self.0),
            None => write!(f, "{:#010x}", self.0),
        }
    }
}

/// SSP (I2S) vindex: time slot in the low nibble, I2S instance in the high.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SspDmaNode {
    /// TDM time slot, 0–15.
    pub time_slot: u8,
    /// SSP port, 0–15.
    pub i2s_instance: u8,
}

impl SspDmaNode {
    /// Pack into a vindex.
    #[must_use]
    pub const fn vindex(self) -> u8 {
        (self.time_slot & 0xF) | ((self.i2s_instance & 0xF) << 4)
    }

    /// Unpack a vindex.
    #[must_use]
    pub const fn from_vindex(vindex: u8) -> Self {
        Self {
            time_slot: vindex & 0xF,
            i2s_instance: vindex >> 4,
        }
    }
}

/// Bluetooth offload vindex: host DMA id plus the virtual bus folded in at bit 3.
#[must_use]
pub const fn bt_vindex(host_dma_id: u8, vbus_id: u8) -> u8 {
    host_dma_id.wrapping_add(vbus_id << 3)
}

/// I2S node id used for DMA clock control, keyed on stream direction.
#[must_use]
pub const fn i2s_node_id(instance: u8, time_slot: u8, playback: bool) -> NodeId {
    let class = if playback {
        DmaClass::I2sLinkOutput
    } else {
        DmaClass::I2sLinkInput
    };
    NodeId::new(
        class,
        SspDmaNode {
            time_slot,
            i2s_instance: instance,
        }
        .vindex(),
    )
}
