//! Software backends
//!
//! - **VirtualFirmware**: [`IpcTransport`](crate::ipc::IpcTransport) that
//!   emulates the firmware's pipeline, instance and binding bookkeeping
//! - **LoopbackDma**: [`DmaBackend`](crate::bra::DmaBackend) that copies
//!   playback buffers into capture buffers
//!
//! Both keep every step observable, so orchestration code runs without a
//! DSP.

pub mod loopback;
pub mod virtual_fw;

pub use loopback::LoopbackDma;
pub use virtual_fw::VirtualFirmware;
