//! DSP lifecycle manager
//!
//! Brings the DSP up and down around the orchestration engine. Register,
//! interrupt and firmware-image work belongs to the platform and is reached
//! through [`DspPlatform`]. This module sequences those calls and keeps
//! per-core bookkeeping.
//!
//! ```text
//! Operation     Sequence
//! ───────────── ─────────────────────────────────────────────────────────────
//! init          ppcap on, ppcap irq on, map BAR 4, select ops, ops.init,
//!               core tables, DMA clock controls
//! load_firmware ops.init_fw, first boot done
//! suspend_late  flush (suspend-active) or cancel pending D0i3 work
//! suspend       DSP sleep, ppcap irq off, ppcap off        (ppcap only)
//! resume        ppcap on, ppcap irq on, then after first boot:
//!               DSP wake, notifications off, A-state config,
//!               DMA buffer config, DMA clock controls      (ppcap only)
//! free          ppcap irq off, ops.cleanup, unmap BAR
//! ```

use crate::context::DspContext;
use crate::error::{DspError, Result};
use crate::fw_params::{AstateConfig, DmaCtrlConfig, NhltSource};
use crate::ipc::IpcTransport;
use bytes::Bytes;
use skl_chip::pcie::{DspFamily, DspVariant, ADSP_MMIO_BAR};
use std::fmt::Debug;
use tracing::{debug, error, info, warn};

/// Code-loader capabilities of a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOps {
    /// Loader can allocate DMA buffers for the firmware image
    pub dma_buffers: bool,
    /// Loader streams through host DMA (prepare/trigger/cleanup)
    pub host_stream: bool,
}

/// Platform services the lifecycle manager drives.
pub trait DspPlatform: Debug + Send {
    /// PCI device id of the controller.
    fn pci_id(&self) -> u16;

    /// Firmware image to boot, `None` for the variant default.
    fn fw_name(&self) -> Option<&str> {
        None
    }

    /// Whether the controller has the processing-pipe capability.
    fn ppcap_supported(&self) -> bool;

    /// Enable or disable the processing-pipe capability.
    fn set_ppcap(&mut self, enable: bool);

    /// Enable or disable the processing-pipe interrupt.
    fn set_ppcap_interrupt(&mut self, enable: bool);

    /// Map a PCI BAR.
    ///
    /// # Errors
    ///
    /// Returns error if the BAR cannot be mapped.
    fn map_bar(&mut self, bar: u32) -> Result<()>;

    /// Unmap a previously mapped BAR.
    fn unmap_bar(&mut self, bar: u32);

    /// Family-specific DSP init (register setup, IPC channel, loader).
    ///
    /// # Errors
    ///
    /// Returns error if the DSP does not come up.
    fn dsp_init(&mut self, family: DspFamily, fw_name: &str, loader: LoaderOps) -> Result<()>;

    /// Load and boot the firmware image.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware fails to boot.
    fn load_firmware(&mut self, family: DspFamily) -> Result<()>;

    /// Family-specific DSP teardown.
    fn dsp_cleanup(&mut self, family: DspFamily);

    /// Power up or down one DSP core.
    ///
    /// # Errors
    ///
    /// Returns error if the core does not reach the requested state.
    fn set_core_power(&mut self, core: u8, on: bool) -> Result<()>;

    /// Put the DSP to sleep.
    ///
    /// # Errors
    ///
    /// Returns error if the DSP refuses to sleep.
    fn dsp_sleep(&mut self) -> Result<()>;

    /// Wake the DSP.
    ///
    /// # Errors
    ///
    /// Returns error if the DSP does not wake.
    fn dsp_wake(&mut self) -> Result<()>;

    /// Run any pending D0i3 work now.
    fn flush_d0i3(&mut self) {}

    /// Drop any pending D0i3 work.
    fn cancel_d0i3(&mut self) {}
}

/// Family-specific DSP operations.
pub trait DspOps: Debug + Send + Sync {
    /// Firmware family.
    fn family(&self) -> DspFamily;

    /// Code-loader capabilities.
    fn loader_ops(&self) -> LoaderOps;

    /// Bring the DSP up.
    ///
    /// # Errors
    ///
    /// Returns the platform's init error.
    fn init(&self, platform: &mut dyn DspPlatform, fw_name: &str) -> Result<()> {
        platform.dsp_init(self.family(), fw_name, self.loader_ops())
    }

    /// Boot the firmware.
    ///
    /// # Errors
    ///
    /// Returns the platform's load error.
    fn init_fw(&self, platform: &mut dyn DspPlatform) -> Result<()> {
        platform.load_firmware(self.family())
    }

    /// Tear the DSP down.
    fn cleanup(&self, platform: &mut dyn DspPlatform) {
        platform.dsp_cleanup(self.family());
    }
}

/// Skylake / Kaby Lake.
#[derive(Debug)]
pub struct SklOps;

impl DspOps for SklOps {
    fn family(&self) -> DspFamily {
        DspFamily::Skl
    }

    fn loader_ops(&self) -> LoaderOps {
        LoaderOps {
            dma_buffers: true,
            host_stream: false,
        }
    }
}

/// Broxton / Gemini Lake.
#[derive(Debug)]
pub struct BxtOps;

impl DspOps for BxtOps {
    fn family(&self) -> DspFamily {
        DspFamily::Bxt
    }

    fn loader_ops(&self) -> LoaderOps {
        LoaderOps {
            dma_buffers: true,
            host_stream: true,
        }
    }
}

/// Cannon Lake / Ice Lake.
#[derive(Debug)]
pub struct CnlOps;

impl DspOps for CnlOps {
    fn family(&self) -> DspFamily {
        DspFamily::Cnl
    }

    fn loader_ops(&self) -> LoaderOps {
        BxtOps.loader_ops()
    }
}

static SKL_OPS: SklOps = SklOps;
static BXT_OPS: BxtOps = BxtOps;
static CNL_OPS: CnlOps = CnlOps;

/// Operations for a PCI device id, `None` if unsupported.
pub fn variant_ops(pci_id: u16) -> Option<&'static dyn DspOps> {
    let variant = DspVariant::from_pci_id(pci_id)?;
    Some(match variant.family {
        DspFamily::Skl => &SKL_OPS,
        DspFamily::Bxt => &BXT_OPS,
        DspFamily::Cnl => &CNL_OPS,
    })
}

/// Power state of one DSP core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoreState {
    /// Powered down
    #[default]
    Off,
    /// Powered and running
    Running,
}

/// Base-firmware configuration re-applied after every resume.
#[derive(Debug, Default)]
pub struct ResumeConfig {
    /// A-state table
    pub astate: Vec<AstateConfig>,
    /// DMA buffer configuration blob
    pub dma_cfg: Bytes,
    /// Per-link DMA clock controls
    pub dma_ctrl: DmaCtrlConfig,
    /// NHLT lookup for the DMA clock controls
    pub nhlt: Option<Box<dyn NhltSource + Send>>,
}

impl ResumeConfig {
    fn apply_dma_clk_controls<T: IpcTransport>(&self, ctx: &mut DspContext<T>) -> Result<()> {
        match &self.nhlt {
            Some(nhlt) => ctx.set_dma_clk_controls(&self.dma_ctrl, &**nhlt),
            None if self.dma_ctrl.headers.is_empty() => Ok(()),
            None => Err(DspError::invalid_state("DMA clock controls without an NHLT")),
        }
    }
}

/// Brings one DSP up and down.
#[derive(Debug)]
pub struct DspManager<P: DspPlatform> {
    platform: P,
    variant: &'static DspVariant,
    ops: &'static dyn DspOps,
    core_state: Vec<CoreState>,
    core_usage: Vec<u32>,
    resume_cfg: ResumeConfig,
    first_boot: bool,
    suspend_active: bool,
}

impl<P: DspPlatform> DspManager<P> {
    /// Bring the DSP up on `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`DspError::UnsupportedDevice`] for an unknown PCI id, or the
    /// first platform or IPC failure. A failure after the BAR is mapped
    /// releases the DSP again, unmapping the BAR.
    pub fn init<T: IpcTransport>(
        mut platform: P,
        ctx: &mut DspContext<T>,
        resume_cfg: ResumeConfig,
    ) -> Result<Self> {
        let pci_id = platform.pci_id();
        platform.set_ppcap(true);
        platform.set_ppcap_interrupt(true);
        platform.map_bar(ADSP_MMIO_BAR)?;

        let (Some(variant), Some(ops)) = (DspVariant::from_pci_id(pci_id), variant_ops(pci_id))
        else {
            platform.unmap_bar(ADSP_MMIO_BAR);
            return Err(DspError::UnsupportedDevice { pci_id });
        };

        let fw_name = platform.fw_name().unwrap_or(variant.fw_name).to_owned();
        if let Err(e) = ops.init(&mut platform, &fw_name) {
            platform.unmap_bar(ADSP_MMIO_BAR);
            return Err(e);
        }
        info!("{} DSP up: {} cores, firmware {fw_name}", variant.name, variant.num_cores);

        let cores = usize::from(variant.num_cores);
        let mgr = Self {
            platform,
            variant,
            ops,
            core_state: vec![CoreState::Off; cores],
            core_usage: vec![0; cores],
            resume_cfg,
            first_boot: true,
            suspend_active: false,
        };
        if let Err(e) = mgr.resume_cfg.apply_dma_clk_controls(ctx) {
            error!("DMA clock controls rejected, releasing DSP: {e}");
            mgr.free();
            return Err(e);
        }
        Ok(mgr)
    }

    /// Boot the firmware.
    ///
    /// # Errors
    ///
    /// Returns the platform's load error.
    pub fn load_firmware(&mut self) -> Result<()> {
        self.ops.init_fw(&mut self.platform)?;
        self.first_boot = false;
        debug!("firmware booted");
        Ok(())
    }

    /// Tear the DSP down and hand the platform back.
    pub fn free(mut self) -> P {
        self.platform.set_ppcap_interrupt(false);
        self.ops.cleanup(&mut self.platform);
        self.platform.unmap_bar(ADSP_MMIO_BAR);
        info!("{} DSP released", self.variant.name);
        self.platform
    }

    /// Mark the audio IP as staying active across system suspend.
    pub fn set_suspend_active(&mut self, active: bool) {
        self.suspend_active = active;
    }

    /// Settle pending D0i3 work before suspend.
    pub fn suspend_late(&mut self) {
        if self.suspend_active {
            self.platform.flush_d0i3();
        } else {
            self.platform.cancel_d0i3();
        }
    }

    /// Put the DSP to sleep.
    ///
    /// # Errors
    ///
    /// Returns error if the DSP refuses to sleep; ppcap stays enabled.
    pub fn suspend(&mut self) -> Result<()> {
        if !self.platform.ppcap_supported() {
            return Ok(());
        }
        self.platform.dsp_sleep()?;
        self.platform.set_ppcap_interrupt(false);
        self.platform.set_ppcap(false);
        debug!("DSP suspended");
        Ok(())
    }

    /// Wake the DSP and restore the base-firmware configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the DSP does not wake or a configuration step is
    /// rejected. Notification disable is best-effort.
    pub fn resume<T: IpcTransport>(&mut self, ctx: &mut DspContext<T>) -> Result<()> {
        if !self.platform.ppcap_supported() {
            return Ok(());
        }
        self.platform.set_ppcap(true);
        self.platform.set_ppcap_interrupt(true);

        if self.first_boot {
            return Ok(());
        }

        self.platform.dsp_wake()?;

        if let Err(e) = ctx.enable_notification(false) {
            warn!("resume: notification disable failed: {e}");
        }
        if !self.resume_cfg.astate.is_empty() {
            ctx.set_astate_cfg(&self.resume_cfg.astate)?;
        }
        if !self.resume_cfg.dma_cfg.is_empty() {
            ctx.set_dma_cfg(&self.resume_cfg.dma_cfg)?;
        }
        self.resume_cfg.apply_dma_clk_controls(ctx)?;
        debug!("DSP resumed");
        Ok(())
    }

    /// Take a reference on `core`, powering it up on first use.
    ///
    /// # Errors
    ///
    /// Returns error for an out-of-range core or a failed power-up.
    pub fn core_get(&mut self, core: u8) -> Result<()> {
        let idx = self.core_index(core)?;
        if self.core_usage[idx] == 0 {
            self.platform.set_core_power(core, true)?;
            self.core_state[idx] = CoreState::Running;
        }
        self.core_usage[idx] += 1;
        Ok(())
    }

    /// Drop a reference on `core`, powering it down on last use.
    ///
    /// # Errors
    ///
    /// Returns error for an out-of-range or unreferenced core, or a failed
    /// power-down.
    pub fn core_put(&mut self, core: u8) -> Result<()> {
        let idx = self.core_index(core)?;
        if self.core_usage[idx] == 0 {
            return Err(DspError::invalid_state(format!("core {core} not in use")));
        }
        self.core_usage[idx] -= 1;
        if self.core_usage[idx] == 0 {
            self.platform.set_core_power(core, false)?;
            self.core_state[idx] = CoreState::Off;
        }
        Ok(())
    }

    fn core_index(&self, core: u8) -> Result<usize> {
        let idx = usize::from(core);
        if idx >= self.core_state.len() {
            return Err(DspError::invalid_argument(format!(
                "core {core} out of range ({} cores)",
                self.core_state.len()
            )));
        }
        Ok(idx)
    }

    /// Power state of `core`.
    pub fn core_state(&self, core: u8) -> Option<CoreState> {
        self.core_state.get(usize::from(core)).copied()
    }

    /// Reference count of `core`.
    pub fn core_usage(&self, core: u8) -> Option<u32> {
        self.core_usage.get(usize::from(core)).copied()
    }

    /// Number of DSP cores.
    pub fn num_cores(&self) -> usize {
        self.core_state.len()
    }

    /// Hardware variant.
    pub fn variant(&self) -> &'static DspVariant {
        self.variant
    }

    /// Selected family operations.
    pub fn ops(&self) -> &'static dyn DspOps {
        self.ops
    }

    /// Whether the firmware has not booted yet.
    pub fn is_first_boot(&self) -> bool {
        self.first_boot
    }

    /// Underlying platform.
    pub fn platform(&self) -> &P {
        &self.platform
    }
}
