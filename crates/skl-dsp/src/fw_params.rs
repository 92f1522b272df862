//! Base firmware parameters
//!
//! Large-config writes addressed to the base firmware (module 0, instance 0):
//!
//! ```text
//! Param  Name          Payload
//! ────── ───────────── ────────────────────────────────────────────────────
//!  3     notification  notify mask, enable
//!  4     A-state       count, count × (kcps, clock source)
//!  5     DMA control   node id, config length (dwords), gateway blob
//!  6     logging       aging period, FIFO period, core mask,
//!                      per core (enable, priority)
//! 20     system time   UTC µs, low dword then high dword
//! 25     DMA config    opaque, supplied by the topology
//! ```
//!
//! DMA clock controls turn each configured I2S link header into one DMA
//! control write, with the gateway blob looked up in the platform's NHLT.

use crate::context::DspContext;
use crate::error::{DspError, Result};
use crate::ipc::{IpcTransport, LargeConfigMsg};
use bytes::{BufMut, Bytes, BytesMut};
use skl_chip::abi::{self, logs};
use skl_chip::ipc::param;
use skl_chip::node::{i2s_node_id, NodeId};
use skl_chip::topology::StreamDirection;
use std::fmt::Debug;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error};

/// One A-state (clock) table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AstateConfig {
    /// Kilo-cycles per second of the state
    pub kcps: u32,
    /// Clock source
    pub clk_src: u32,
}

/// One I2S link entry of the topology's DMA control configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmaCtrlHeader {
    /// SSP port
    pub vbus_id: u8,
    /// Sample width in bits
    pub fmt: u32,
    /// Channel count
    pub ch: u8,
    /// Sample rate
    pub freq: u32,
    /// Link direction
    pub direction: StreamDirection,
    /// TDM time slot
    pub tdm_slot: u8,
    /// DMA control data appended to the NHLT blob
    pub data: Bytes,
}

/// DMA control configuration from the topology.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DmaCtrlConfig {
    /// Per-link entries
    pub headers: Vec<DmaCtrlHeader>,
}

/// Platform NHLT lookup.
pub trait NhltSource: Debug {
    /// I2S gateway blob for an SSP port and stream format.
    fn i2s_blob(
        &self,
        vbus_id: u8,
        bits: u32,
        channels: u8,
        rate: u32,
        direction: StreamDirection,
    ) -> Option<Bytes>;
}

/// NHLT endpoint entry held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NhltEndpoint {
    /// SSP port
    pub vbus_id: u8,
    /// Sample width in bits
    pub bits: u32,
    /// Channel count
    pub channels: u8,
    /// Sample rate
    pub rate: u32,
    /// Direction
    pub direction: StreamDirection,
    /// Gateway blob
    pub blob: Bytes,
}

/// NHLT built from a list of endpoints.
#[derive(Debug, Clone, Default)]
pub struct StaticNhlt {
    /// Endpoints
    pub endpoints: Vec<NhltEndpoint>,
}

impl NhltSource for StaticNhlt {
    fn i2s_blob(
        &self,
        vbus_id: u8,
        bits: u32,
        channels: u8,
        rate: u32,
        direction: StreamDirection,
    ) -> Option<Bytes> {
        self.endpoints
            .iter()
            .find(|e| {
                e.vbus_id == vbus_id
                    && e.bits == bits
                    && e.channels == channels
                    && e.rate == rate
                    && e.direction == direction
            })
            .map(|e| e.blob.clone())
    }
}

impl<T: IpcTransport> DspContext<T> {
    fn set_base_fw_param(&mut self, param_id: u32, data: &[u8]) -> Result<()> {
        self.ipc
            .set_large_config(&LargeConfigMsg::base_fw(param_id), data)
    }

    /// Enable or disable firmware logging on `core`.
    ///
    /// # Errors
    ///
    /// Returns error if `core` is out of range or the firmware rejects it.
    pub fn enable_logging(&mut self, core: u8, enable: bool) -> Result<()> {
        if core >= self.config.num_cores {
            return Err(DspError::invalid_argument(format!(
                "core {core} out of range ({} cores)",
                self.config.num_cores
            )));
        }
        let mut buf = BytesMut::with_capacity(12 + 8 * usize::from(self.config.num_cores));
        buf.put_u32_le(logs::AGING_TIMER_PERIOD);
        buf.put_u32_le(logs::FIFO_FULL_TIMER_PERIOD);
        buf.put_u32_le(1 << core);
        for c in 0..self.config.num_cores {
            if c == core {
                buf.put_u32_le(u32::from(enable));
                buf.put_u32_le(self.config.log_priority);
            } else {
                buf.put_u64_le(0);
            }
        }
        debug!("firmware logging core {core}: {enable}");
        self.set_base_fw_param(param::ENABLE_LOGS, &buf)
    }

    /// Send the current UTC time.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the request.
    pub fn set_system_time(&mut self) -> Result<()> {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX));
        self.set_system_time_us(micros)
    }

    /// Send a UTC time in microseconds.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the request.
    pub fn set_system_time_us(&mut self, micros: u64) -> Result<()> {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u32_le((micros & 0xFFFF_FFFF) as u32);
        buf.put_u32_le((micros >> 32) as u32);
        self.set_base_fw_param(param::SYSTEM_TIME, &buf)
    }

    /// Load the A-state table.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the table.
    pub fn set_astate_cfg(&mut self, states: &[AstateConfig]) -> Result<()> {
        let mut buf = BytesMut::with_capacity(4 + 8 * states.len());
        buf.put_u32_le(states.len() as u32);
        for s in states {
            buf.put_u32_le(s.kcps);
            buf.put_u32_le(s.clk_src);
        }
        self.set_base_fw_param(param::ASTATE, &buf)
    }

    /// Enable or disable underrun/overrun notifications.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the request.
    pub fn enable_notification(&mut self, enable: bool) -> Result<()> {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u32_le(abi::NOTIFICATION_MASK_ALL);
        buf.put_u32_le(u32::from(enable));
        self.set_base_fw_param(param::NOTIFICATION, &buf)
    }

    /// Send a gateway blob through DMA control. Empty blobs are skipped.
    ///
    /// The config length is always the I2S blob length: NHLT blobs may carry
    /// extra data the firmware does not count.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the blob.
    pub fn set_dma_control(&mut self, caps: &[u8], node: NodeId) -> Result<()> {
        if caps.is_empty() {
            return Ok(());
        }
        let mut buf = BytesMut::with_capacity(abi::DMA_CONTROL_HDR_SIZE + caps.len());
        buf.put_u32_le(node.raw());
        buf.put_u32_le(abi::DMA_I2S_BLOB_DWORDS);
        buf.put_slice(caps);
        debug!("dma control {node}: {} bytes", caps.len());
        self.set_base_fw_param(param::DMA_CONTROL, &buf)
    }

    /// Apply the DMA clock controls of every configured I2S link.
    ///
    /// # Errors
    ///
    /// Returns [`DspError::InvalidArgument`] for a link without NHLT blob or
    /// control data, or the firmware error of the first rejected write.
    pub fn set_dma_clk_controls(
        &mut self,
        cfg: &DmaCtrlConfig,
        nhlt: &dyn NhltSource,
    ) -> Result<()> {
        for hdr in &cfg.headers {
            let blob = nhlt
                .i2s_blob(hdr.vbus_id, hdr.fmt, hdr.ch, hdr.freq, hdr.direction)
                .filter(|_| !hdr.data.is_empty());
            let Some(blob) = blob else {
                error!(
                    "no NHLT config: vbus {} ch {} fmt {} rate {}",
                    hdr.vbus_id, hdr.ch, hdr.fmt, hdr.freq
                );
                return Err(DspError::invalid_argument(format!(
                    "no NHLT blob for SSP{} {}ch {}bit {}Hz",
                    hdr.vbus_id, hdr.ch, hdr.fmt, hdr.freq
                )));
            };

            let mut config = BytesMut::with_capacity(blob.len() + hdr.data.len());
            config.put_slice(&blob);
            config.put_slice(&hdr.data);
            let node = i2s_node_id(
                hdr.vbus_id,
                hdr.tdm_slot,
                hdr.direction == StreamDirection::Playback,
            );
            self.set_dma_control(&config, node)?;
        }
        Ok(())
    }

    /// Send the topology's DMA buffer configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects it.
    pub fn set_dma_cfg(&mut self, data: &[u8]) -> Result<()> {
        self.set_base_fw_param(param::DMA_CFG, data)
    }
}
