//! PCI identifiers and DSP variants.
//!
//! The audio DSP sits behind the HD-Audio controller's PCI function. The
//! controller's device ID selects the firmware family, the core count and
//! the firmware image.
//!
//! ```text
//! ID      Platform               Family  Cores  Firmware
//! ─────── ────────────────────── ─────── ────── ─────────────────────────
//! 0x9d70  Sunrise Point-LP (SKL) Skl     2      intel/dsp_fw_release.bin
//! 0x9d71  Kaby Lake              Skl     2      intel/dsp_fw_kbl.bin
//! 0x5a98  Broxton-P              Bxt     2      intel/dsp_fw_bxtn.bin
//! 0x3198  Gemini Lake            Bxt     2      intel/dsp_fw_glk.bin
//! 0x9dc8  Cannon Lake            Cnl     4      intel/dsp_fw_cnl.bin
//! 0x34c8  Ice Lake               Cnl     4      intel/dsp_fw_icl.bin
//! ```

/// Intel vendor ID (PCI-SIG assigned).
pub const INTEL_VENDOR_ID: u16 = 0x8086;

/// HD-Audio controller device IDs with an attached audio DSP.
pub mod device_id {
    /// Sunrise Point-LP (Skylake).
    pub const SKL: u16 = 0x9D70;
    /// Kaby Lake.
    pub const KBL: u16 = 0x9D71;
    /// Broxton-P.
    pub const BXT: u16 = 0x5A98;
    /// Gemini Lake.
    pub const GLK: u16 = 0x3198;
    /// Cannon Lake.
    pub const CNL: u16 = 0x9DC8;
    /// Ice Lake.
    pub const ICL: u16 = 0x34C8;
}

/// All device IDs the driver binds to.
pub const ALL_DEVICE_IDS: &[u16] = &[
    device_id::SKL,
    device_id::KBL,
    device_id::BXT,
    device_id::GLK,
    device_id::CNL,
    device_id::ICL,
];

/// PCI BAR holding the ADSP MMIO window.
pub const ADSP_MMIO_BAR: u32 = 4;

/// Firmware family. Decides the boot flow and the code-loader capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DspFamily {
    /// Skylake / Kaby Lake: firmware loaded through a dedicated code-loader DMA.
    Skl,
    /// Broxton / Gemini Lake: firmware streamed over a host DMA stream.
    Bxt,
    /// Cannon Lake / Ice Lake: host DMA streaming, four cores, SoundWire links.
    Cnl,
}

/// One entry of the supported-hardware table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DspVariant {
    /// PCI device ID.
    pub pci_id: u16,
    /// Marketing name of the platform.
    pub name: &'static str,
    /// Firmware family.
    pub family: DspFamily,
    /// Number of DSP cores.
    pub num_cores: u8,
    /// Default firmware image path (relative to the firmware search path).
    pub fw_name: &'static str,
}

/// Supported variants, one per device ID.
pub const VARIANTS: &[DspVariant] = &[
    DspVariant {
        pci_id: device_id::SKL,
        name: "Skylake",
        family: DspFamily::Skl,
        num_cores: 2,
        fw_name: "intel/dsp_fw_release.bin",
    },
    DspVariant {
        pci_id: device_id::KBL,
        name: "Kaby Lake",
        family: DspFamily::Skl,
        num_cores: 2,
        fw_name: "intel/dsp_fw_kbl.bin",
    },
    DspVariant {
        pci_id: device_id::BXT,
        name: "Broxton-P",
        family: DspFamily::Bxt,
        num_cores: 2,
        fw_name: "intel/dsp_fw_bxtn.bin",
    },
    DspVariant {
        pci_id: device_id::GLK,
        name: "Gemini Lake",
        family: DspFamily::Bxt,
        num_cores: 2,
        fw_name: "intel/dsp_fw_glk.bin",
    },
    DspVariant {
        pci_id: device_id::CNL,
        name: "Cannon Lake",
        family: DspFamily::Cnl,
        num_cores: 4,
        fw_name: "intel/dsp_fw_cnl.bin",
    },
    DspVariant {
        pci_id: device_id::ICL,
        name: "Ice Lake",
        family: DspFamily::Cnl,
        num_cores: 4,
        fw_name: "intel/dsp_fw_icl.bin",
    },
];

impl DspVariant {
    /// Look up the variant for a PCI device ID.
    #[must_use]
    pub fn from_pci_id(id: u16) -> Option<&'static Self> {
        VARIANTS.iter().find(|v| v.pci_id == id)
    }

    /// `vendor:device` string usable with `lspci -d`.
    #[must_use]
    pub fn lspci_filter(&self) -> String {
        format!("{INTEL_VENDOR_ID:04x}:{:04x}", self.pci_id)
    }
}
