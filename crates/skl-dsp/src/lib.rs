//! Pipeline and module orchestration for Intel Skylake-family audio DSPs.
//!
//! The DSP firmware is a black box reached only through IPC. This crate
//! describes audio topology as modules wired into pipelines and drives that
//! graph through the firmware: create, configure, bind, run, stop, delete.
//!
//! # Layers
//!
//! ```text
//! DspManager      bring-up, suspend/resume, core bookkeeping   (lifecycle)
//! BraSession      SoundWire bulk transfer over two pipelines   (bra)
//! DspContext      init/uninit, bind/unbind, pipe state machine,
//!                 base-firmware parameters, probes
//! IpcClient       request/reply over an IpcTransport           (ipc)
//! ```
//!
//! Hardware is reached only through traits: [`IpcTransport`] for the
//! mailbox, [`DmaBackend`] for host DMA streams and [`DspPlatform`] for
//! registers and power. The [`backends`] module implements the first two in
//! memory, so everything runs without a DSP.
//!
//! # Quick start
//!
//! ```no_run
//! use skl_dsp::backends::VirtualFirmware;
//! use skl_dsp::pipeline::Pipe;
//! use skl_dsp::{DspConfig, DspContext};
//!
//! # fn main() -> skl_dsp::Result<()> {
//! let mut ctx = DspContext::new(VirtualFirmware::new(), DspConfig::default());
//! let mut pipe = Pipe::new(1, 0, 2);
//! ctx.create_pipeline(&mut pipe)?;
//! ctx.run_pipe(&mut pipe)?;
//! ctx.delete_pipe(&mut pipe)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! Every mutating operation takes `&mut` on the context and on the module
//! and pipe records it touches. There are no internal locks: callers sharing
//! a context across threads wrap it in their own mutex.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod backends;
mod bind;
pub mod bra;
mod catalog;
mod config;
mod context;
mod error;
pub mod format;
mod fw_params;
pub mod ipc;
pub mod lifecycle;
pub mod module;
pub mod pin;
pub mod pipeline;
pub mod probe;

/// Firmware ABI constants (re-exported from skl-chip).
pub mod chip {
    pub use skl_chip::ipc::{param, ppl_state, status};
    pub use skl_chip::node::NodeId;
    pub use skl_chip::pcie::{device_id, DspFamily, DspVariant, ALL_DEVICE_IDS, VARIANTS};
    pub use skl_chip::topology::{DeviceType, HwConnType, ModuleType, StreamDirection};
}

pub use bra::{BraConfig, BraPath, BraRequest, BraSession, DmaBackend};
pub use catalog::{CatalogEntry, ModuleCatalog};
pub use config::DspConfig;
pub use context::DspContext;
pub use error::{DspError, Result};
pub use fw_params::{
    AstateConfig, DmaCtrlConfig, DmaCtrlHeader, NhltEndpoint, NhltSource, StaticNhlt,
};
pub use ipc::{IpcClient, IpcMessage, IpcReply, IpcTransport, Opcode};
pub use lifecycle::{variant_ops, DspManager, DspOps, DspPlatform, ResumeConfig};
pub use module::{AudioFormat, Module, ModuleConfig, ModuleInstanceId, ModuleState, ModuleUuid};
pub use pipeline::{Pipe, PipeState, TopologyEvent, TopologyNotifier};

/// Commonly used types.
pub mod prelude {
    pub use crate::backends::{LoopbackDma, VirtualFirmware};
    pub use crate::{
        BraConfig, BraRequest, BraSession, DspConfig, DspContext, DspError, ModuleCatalog,
        ModuleConfig, Pipe, Result,
    };
}
