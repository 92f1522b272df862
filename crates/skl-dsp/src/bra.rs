//! BRA (bulk register access) orchestrator
//!
//! A BRA transfer moves one block of data out over a SoundWire master link
//! and reads one block back, using a pair of throwaway pipelines built
//! without any topology:
//!
//! ```text
//! playback (ppl 1)   host DMA ─▶ [host copier 1] ─▶ [link copier 2] ─▶ SoundWire
//! capture  (ppl 2)   SoundWire ─▶ [link copier 3] ─▶ [host copier 4] ─▶ host DMA
//! ```
//!
//! Enable order:
//!
//! 1. prepare playback DMA, mark uncached, copy the TX payload in
//! 2. prepare capture DMA, mark uncached
//! 3. create playback pipe, init host and link copier, bind them
//! 4. create capture pipe, init link and host copier, bind them
//! 5. run capture pipe, then playback pipe
//! 6. trigger capture DMA, then playback DMA
//! 7. wait the settle delay, copy the capture buffer out
//!
//! [`BraSession`] owns everything built along the way. A failed step, an
//! explicit [`BraSession::disable`] or dropping the session tears it all
//! down: stop DMA, stop pipes, unbind, delete pipes, release DMA and
//! private ids. Teardown continues past individual failures and reports
//! the first one.

use crate::context::DspContext;
use crate::error::{DspError, Result};
use crate::ipc::IpcTransport;
use crate::module::{
    AudioFormat, Module, ModuleConfig, ModuleInstanceId, ModuleInterface, ModuleResource,
    ModuleState, ModuleUuid,
};
use crate::pipeline::{Pipe, PipeParams};
use bytes::Bytes;
use skl_chip::topology::{DeviceType, HwConnType, ModuleType, StreamDirection};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Host DMA streams used by BRA.
pub trait DmaBackend: Debug + Send {
    /// Allocate a stream and its buffer; returns the stream tag (1-based).
    ///
    /// # Errors
    ///
    /// Returns error if no stream or buffer is available.
    fn prepare(&mut self, format: u32, size: usize, direction: StreamDirection) -> Result<u8>;

    /// Mark the first `pages` pages of the stream buffer uncached.
    ///
    /// # Errors
    ///
    /// Returns error if the tag is unknown.
    fn set_uncached(&mut self, tag: u8, pages: usize) -> Result<()>;

    /// Stream buffer.
    ///
    /// # Errors
    ///
    /// Returns error if the tag is unknown.
    fn buffer(&self, tag: u8) -> Result<&[u8]>;

    /// Stream buffer, mutably.
    ///
    /// # Errors
    ///
    /// Returns error if the tag is unknown.
    fn buffer_mut(&mut self, tag: u8) -> Result<&mut [u8]>;

    /// Start or stop a stream.
    ///
    /// # Errors
    ///
    /// Returns error if the tag is unknown.
    fn trigger(&mut self, start: bool, tag: u8, direction: StreamDirection) -> Result<()>;

    /// Release a stream and its buffer.
    ///
    /// # Errors
    ///
    /// Returns error if the tag is unknown.
    fn cleanup(&mut self, tag: u8, direction: StreamDirection) -> Result<()>;
}

/// One side of the BRA pipeline pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BraPath {
    /// Pipeline id
    pub ppl_id: u8,
    /// Host copier instance id
    pub host_instance: u8,
    /// Link copier instance id
    pub link_instance: u8,
    /// Sample format of both copiers
    pub format: AudioFormat,
    /// Copier input and output buffer size
    pub buffer_size: u32,
    /// SoundWire stream number of the link copier
    pub sdw_stream: u8,
    /// Link copier gateway blob
    pub link_caps: Bytes,
}

/// BRA construction constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BraConfig {
    /// Playback (TX) path
    pub playback: BraPath,
    /// Capture (RX) path
    pub capture: BraPath,
    /// Pipeline priority
    pub pipe_priority: u8,
    /// Pipeline memory pages
    pub pipe_pages: u16,
    /// Copier module class
    pub copier_uuid: ModuleUuid,
    /// Copier cycles per second
    pub cps: u32,
    /// Copier DMA buffer size in the resource descriptor
    pub dma_buffer_size: u32,
    /// Host DMA frame format (32 bit × 2)
    pub dma_format: u32,
    /// Wait between triggering and reading the capture buffer
    pub settle: Duration,
}

fn caps(words: [u32; 4]) -> Bytes {
    words.iter().flat_map(|w| w.to_le_bytes()).collect::<Vec<u8>>().into()
}

impl Default for BraConfig {
    fn default() -> Self {
        Self {
            playback: BraPath {
                ppl_id: 1,
                host_instance: 1,
                link_instance: 2,
                format: AudioFormat {
                    channels: 1,
                    s_freq: 96_000,
                    bit_depth: 32,
                    valid_bit_depth: 24,
                    ch_cfg: 0,
                    interleaving: 0,
                    sample_type: 0,
                    ch_map: 0xFFFF_FFF1,
                },
                buffer_size: 384,
                sdw_stream: 0x13,
                link_caps: caps([0, 1, 0x1013, 0]),
            },
            capture: BraPath {
                ppl_id: 2,
                host_instance: 4,
                link_instance: 3,
                format: AudioFormat {
                    channels: 6,
                    s_freq: 48_000,
                    bit_depth: 32,
                    valid_bit_depth: 24,
                    ch_cfg: 8,
                    interleaving: 0,
                    sample_type: 0,
                    ch_map: 0xFF65_7120,
                },
                buffer_size: 1152,
                sdw_stream: 0x14,
                link_caps: caps([0, 1, 0x1114, 1]),
            },
            pipe_priority: 0,
            pipe_pages: 2,
            copier_uuid: ModuleUuid::COPIER,
            cps: 100_000,
            dma_buffer_size: 2,
            dma_format: 0x40,
            settle: Duration::from_millis(100),
        }
    }
}

impl BraConfig {
    /// Constants of the FPGA validation platform.
    pub fn fpga() -> Self {
        let mut cfg = Self::default();
        cfg.playback.sdw_stream = 0x3;
        cfg.playback.link_caps = caps([0, 1, 0x1003, 0]);
        cfg.capture.sdw_stream = 0x4;
        cfg.capture.link_caps = caps([0, 1, 0x1104, 1]);
        cfg
    }

    /// Override the settle delay.
    #[must_use]
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    fn copier_module(&self, path: &BraPath) -> Arc<Module> {
        Arc::new(Module {
            uuid: self.copier_uuid,
            resources: vec![ModuleResource {
                is_pages: 0,
                cps: self.cps,
                ibs: path.buffer_size,
                obs: path.buffer_size,
                dma_buffer_size: self.dma_buffer_size,
                cpc: 0,
            }],
            formats: vec![ModuleInterface {
                inputs: vec![path.format],
                outputs: vec![path.format],
            }],
            max_input_pins: 1,
            max_output_pins: 1,
            loadable: false,
        })
    }
}

/// One BRA transfer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BraRequest {
    /// SoundWire master link
    pub mstr_num: u32,
    /// Data to send
    pub tx: Bytes,
    /// Bytes to receive
    pub rx_size: usize,
}

#[derive(Debug, Clone, Copy)]
struct DmaStream {
    tag: u8,
    direction: StreamDirection,
    running: bool,
}

/// Copiers of one path, source first.
#[derive(Debug, Default)]
struct PathModules {
    src: Option<ModuleConfig>,
    dst: Option<ModuleConfig>,
}

/// A live BRA pipeline pair.
#[derive(Debug)]
pub struct BraSession<'a, T: IpcTransport, D: DmaBackend> {
    ctx: &'a mut DspContext<T>,
    dma: &'a mut D,
    config: BraConfig,
    mstr_num: u32,
    pb_dma: Option<DmaStream>,
    cp_dma: Option<DmaStream>,
    pb_pipe: Pipe,
    cp_pipe: Pipe,
    pb_mods: PathModules,
    cp_mods: PathModules,
    rx: Bytes,
    torn_down: bool,
}

fn uncached_pages(size: usize, page_size: usize) -> usize {
    size.div_ceil(page_size.max(1))
}

impl<'a, T: IpcTransport, D: DmaBackend> BraSession<'a, T, D> {
    /// Build, run and read back one BRA transfer.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failed step, after tearing down
    /// everything built so far.
    pub fn enable(
        ctx: &'a mut DspContext<T>,
        dma: &'a mut D,
        request: &BraRequest,
        config: BraConfig,
    ) -> Result<Self> {
        info!(
            "BRA enable on link {}: tx {}B rx {}B",
            request.mstr_num,
            request.tx.len(),
            request.rx_size
        );
        let pb_pipe = Pipe::new(config.playback.ppl_id, config.pipe_priority, config.pipe_pages);
        let cp_pipe = Pipe::new(config.capture.ppl_id, config.pipe_priority, config.pipe_pages);
        let mut session = Self {
            ctx,
            dma,
            config,
            mstr_num: request.mstr_num,
            pb_dma: None,
            cp_dma: None,
            pb_pipe,
            cp_pipe,
            pb_mods: PathModules::default(),
            cp_mods: PathModules::default(),
            rx: Bytes::new(),
            torn_down: false,
        };
        // On error the partially built session is dropped and torn down.
        session.setup(request)?;
        Ok(session)
    }

    fn setup(&mut self, request: &BraRequest) -> Result<()> {
        let page_size = rustix::param::page_size();

        let pb_tag = self.prepare_dma(request.tx.len(), StreamDirection::Playback, page_size)?;
        let buf = self.dma.buffer_mut(pb_tag)?;
        let n = request.tx.len().min(buf.len());
        buf[..n].copy_from_slice(&request.tx[..n]);

        let cp_tag = self.prepare_dma(request.rx_size, StreamDirection::Capture, page_size)?;

        self.setup_playback(pb_tag)
            .inspect_err(|e| error!("BRA: TX pipeline setup failed: {e}"))?;
        self.setup_capture(cp_tag)
            .inspect_err(|e| error!("BRA: RX pipeline setup failed: {e}"))?;

        self.ctx
            .run_pipe(&mut self.cp_pipe)
            .inspect_err(|e| error!("BRA: RX run pipeline failed: {e}"))?;
        self.ctx
            .run_pipe(&mut self.pb_pipe)
            .inspect_err(|e| error!("BRA: TX run pipeline failed: {e}"))?;

        self.start_dma(StreamDirection::Capture)?;
        self.start_dma(StreamDirection::Playback)?;

        debug!("BRA: waiting {:?}", self.config.settle);
        std::thread::sleep(self.config.settle);

        let rx = self.dma.buffer(cp_tag)?;
        if rx.len() < request.rx_size {
            return Err(DspError::dma(format!(
                "capture buffer holds {} bytes, {} requested",
                rx.len(),
                request.rx_size
            )));
        }
        self.rx = Bytes::copy_from_slice(&rx[..request.rx_size]);
        info!("BRA: received {} bytes", self.rx.len());
        Ok(())
    }

    fn prepare_dma(
        &mut self,
        size: usize,
        direction: StreamDirection,
        page_size: usize,
    ) -> Result<u8> {
        let tag = self
            .dma
            .prepare(self.config.dma_format, size, direction)
            .inspect_err(|e| error!("BRA: {direction:?} DMA prepare failed: {e}"))?;
        let stream = DmaStream {
            tag,
            direction,
            running: false,
        };
        match direction {
            StreamDirection::Playback => self.pb_dma = Some(stream),
            StreamDirection::Capture => self.cp_dma = Some(stream),
        }
        if tag == 0 {
            return Err(DspError::dma(format!("{direction:?} DMA returned stream tag 0")));
        }
        self.dma.set_uncached(tag, uncached_pages(size, page_size))?;
        Ok(tag)
    }

    fn start_dma(&mut self, direction: StreamDirection) -> Result<()> {
        let slot = match direction {
            StreamDirection::Playback => &mut self.pb_dma,
            StreamDirection::Capture => &mut self.cp_dma,
        };
        let Some(stream) = slot.as_mut() else {
            return Err(DspError::invalid_state(format!("{direction:?} DMA not prepared")));
        };
        self.dma
            .trigger(true, stream.tag, direction)
            .inspect_err(|e| error!("BRA: {direction:?} DMA trigger failed: {e}"))?;
        stream.running = true;
        Ok(())
    }

    fn copier(
        &mut self,
        instance_id: u8,
        module: Arc<Module>,
        ppl_id: u8,
        dev_type: DeviceType,
        hw_conn_type: HwConnType,
    ) -> Result<ModuleConfig> {
        let uuid = self.config.copier_uuid;
        let module_id = self.ctx.catalog.module_id(&uuid)?;
        let pvt_id = self.ctx.catalog.get_pvt_id(&uuid, instance_id)?;
        let id = ModuleInstanceId {
            module_id,
            instance_id,
            pvt_id,
        };
        Ok(ModuleConfig::new(id, ModuleType::Copier, module, ppl_id)
            .with_gateway(dev_type, hw_conn_type))
    }

    fn setup_playback(&mut self, tag: u8) -> Result<()> {
        let path = self.config.playback.clone();
        self.ctx.create_pipeline(&mut self.pb_pipe)?;
        self.pb_pipe.params = PipeParams {
            host_dma_id: tag - 1,
            link_dma_id: 0,
            ch: path.format.channels,
            s_freq: path.format.s_freq,
            s_fmt: path.format.bit_depth,
            link_type: 0,
            stream: StreamDirection::Playback,
        };

        let module = self.config.copier_module(&path);
        let host = self.copier(
            path.host_instance,
            module.clone(),
            path.ppl_id,
            DeviceType::HdaHost,
            HwConnType::Source,
        )?;
        self.pb_mods.src = Some(host);
        let mut link = self.copier(
            path.link_instance,
            module,
            path.ppl_id,
            DeviceType::SdwPcm,
            HwConnType::Source,
        )?;
        link.sdw_stream_num = path.sdw_stream;
        link.caps = path.link_caps.clone();
        self.pb_mods.dst = Some(link);

        let (Some(host), Some(link)) = (self.pb_mods.src.as_mut(), self.pb_mods.dst.as_mut()) else {
            return Err(DspError::invalid_state("playback copiers missing"));
        };
        self.ctx.init_module(host, &self.pb_pipe)?;
        self.ctx.init_module(link, &self.pb_pipe)?;
        self.ctx.bind_modules(host, link)
    }

    fn setup_capture(&mut self, tag: u8) -> Result<()> {
        let path = self.config.capture.clone();
        self.ctx.create_pipeline(&mut self.cp_pipe)?;
        self.cp_pipe.params = PipeParams {
            host_dma_id: tag - 1,
            link_dma_id: 0,
            ch: path.format.channels,
            s_freq: path.format.s_freq,
            s_fmt: path.format.bit_depth,
            link_type: 0,
            stream: StreamDirection::Capture,
        };

        let module = self.config.copier_module(&path);
        let mut link = self.copier(
            path.link_instance,
            module.clone(),
            path.ppl_id,
            DeviceType::SdwPcm,
            HwConnType::Sink,
        )?;
        link.sdw_stream_num = path.sdw_stream;
        link.caps = path.link_caps.clone();
        self.cp_mods.src = Some(link);
        let host = self.copier(
            path.host_instance,
            module,
            path.ppl_id,
            DeviceType::HdaHost,
            HwConnType::Sink,
        )?;
        self.cp_mods.dst = Some(host);

        let (Some(link), Some(host)) = (self.cp_mods.src.as_mut(), self.cp_mods.dst.as_mut()) else {
            return Err(DspError::invalid_state("capture copiers missing"));
        };
        self.ctx.init_module(link, &self.cp_pipe)?;
        self.ctx.init_module(host, &self.cp_pipe)?;
        self.ctx.bind_modules(link, host)
    }

    /// SoundWire master link of the session.
    pub fn mstr_num(&self) -> u32 {
        self.mstr_num
    }

    /// Data read back from the capture stream.
    pub fn rx_data(&self) -> &[u8] {
        &self.rx
    }

    /// Playback pipeline.
    pub fn playback_pipe(&self) -> &Pipe {
        &self.pb_pipe
    }

    /// Capture pipeline.
    pub fn capture_pipe(&self) -> &Pipe {
        &self.cp_pipe
    }

    /// Copiers in pipeline order: playback host, playback link, capture
    /// link, capture host.
    pub fn copiers(&self) -> impl Iterator<Item = &ModuleConfig> {
        [
            &self.pb_mods.src,
            &self.pb_mods.dst,
            &self.cp_mods.src,
            &self.cp_mods.dst,
        ]
        .into_iter()
        .flatten()
    }

    /// Stream tags: playback, capture.
    pub fn stream_tags(&self) -> (Option<u8>, Option<u8>) {
        (self.pb_dma.map(|s| s.tag), self.cp_dma.map(|s| s.tag))
    }

    /// DSP context the session runs on.
    pub fn context(&self) -> &DspContext<T> {
        &*self.ctx
    }

    /// Tear the session down.
    ///
    /// # Errors
    ///
    /// Returns the first teardown failure; every step is attempted anyway.
    pub fn disable(mut self) -> Result<()> {
        info!("BRA disable on link {}", self.mstr_num);
        self.teardown()
    }

    fn teardown(&mut self) -> Result<()> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;
        let mut first: Option<DspError> = None;
        let mut keep = |step: &str, result: Result<()>| {
            if let Err(e) = result {
                warn!("BRA teardown: {step} failed: {e}");
                first.get_or_insert(e);
            }
        };

        for stream in [self.cp_dma.as_mut(), self.pb_dma.as_mut()].into_iter().flatten() {
            if stream.running {
                keep("DMA stop", self.dma.trigger(false, stream.tag, stream.direction));
                stream.running = false;
            }
        }

        keep("TX pipeline stop", self.ctx.stop_pipe(&mut self.pb_pipe));
        keep("RX pipeline stop", self.ctx.stop_pipe(&mut self.cp_pipe));

        for mods in [&mut self.pb_mods, &mut self.cp_mods] {
            if let (Some(src), Some(dst)) = (mods.src.as_mut(), mods.dst.as_mut()) {
                keep("unbind", self.ctx.unbind_modules(src, dst));
            }
        }

        for (pipe, mods) in [
            (&mut self.pb_pipe, &mut self.pb_mods),
            (&mut self.cp_pipe, &mut self.cp_mods),
        ] {
            let result = self.ctx.delete_pipe(pipe);
            if result.is_ok() {
                // the firmware drops a pipeline's instances with it
                for m in [mods.src.as_mut(), mods.dst.as_mut()].into_iter().flatten() {
                    m.state = ModuleState::Uninit;
                }
            }
            keep("pipeline delete", result);
        }

        for stream in [self.pb_dma.take(), self.cp_dma.take()].into_iter().flatten() {
            keep("DMA cleanup", self.dma.cleanup(stream.tag, stream.direction));
        }

        let uuid = self.config.copier_uuid;
        for m in [&self.pb_mods, &self.cp_mods]
            .into_iter()
            .flat_map(|p| [&p.src, &p.dst])
            .flatten()
        {
            self.ctx.catalog.put_pvt_id(&uuid, m.id.pvt_id);
        }

        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<T: IpcTransport, D: DmaBackend> Drop for BraSession<'_, T, D> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            error!("BRA teardown on link {}: {e}", self.mstr_num);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{LoopbackDma, VirtualFirmware};
    use crate::catalog::{CatalogEntry, ModuleCatalog};
    use crate::ipc::Opcode;
    use crate::pin::PinState;
    use crate::pipeline::PipeState;
    use crate::DspConfig;
    use skl_chip::ipc::status;

    fn ctx() -> DspContext<VirtualFirmware> {
        DspContext::new(VirtualFirmware::new(), DspConfig::default()).with_catalog(
            ModuleCatalog::from_entries([CatalogEntry::new(ModuleUuid::COPIER, 3, 8)]),
        )
    }

    fn config() -> BraConfig {
        BraConfig::default().with_settle(Duration::ZERO)
    }

    fn request() -> BraRequest {
        BraRequest {
            mstr_num: 1,
            tx: Bytes::from_static(b"bulk register access"),
            rx_size: 8,
        }
    }

    #[test]
    fn test_defaults_match_production_constants() {
        let cfg = BraConfig::default();
        assert_eq!(cfg.playback.sdw_stream, 0x13);
        assert_eq!(cfg.capture.sdw_stream, 0x14);
        assert_eq!(cfg.capture.format.ch_map, 0xFF65_7120);
        assert_eq!(cfg.settle, Duration::from_millis(100));
        assert_eq!(&cfg.capture.link_caps[8..12], &0x1114u32.to_le_bytes());

        let fpga = BraConfig::fpga();
        assert_eq!(fpga.playback.sdw_stream, 0x3);
        assert_eq!(&fpga.playback.link_caps[8..12], &0x1003u32.to_le_bytes());
    }

    #[test]
    fn test_uncached_pages_round_up() {
        assert_eq!(uncached_pages(0, 4096), 0);
        assert_eq!(uncached_pages(1, 4096), 1);
        assert_eq!(uncached_pages(4097, 4096), 2);
    }

    #[test]
    fn test_enable_runs_both_pipes() {
        let mut ctx = ctx();
        let mut dma = LoopbackDma::new();
        let session = BraSession::enable(&mut ctx, &mut dma, &request(), config()).unwrap();

        assert_eq!(session.playback_pipe().state, PipeState::Started);
        assert_eq!(session.capture_pipe().state, PipeState::Started);
        assert_eq!(session.copiers().count(), 4);
        assert!(session.copiers().all(|m| m.state >= ModuleState::InitDone));
        assert_eq!(session.rx_data(), b"bulk reg");
        assert_eq!(session.context().transport().bindings().len(), 2);

        let (pb, cp) = session.stream_tags();
        let host = session.copiers().next().unwrap();
        // host DMA index is the stream tag minus one
        let inst = session
            .context()
            .transport()
            .instance(host.id.module_id, host.id.pvt_id)
            .unwrap();
        assert_eq!(inst.blob[68..72], u32::from(pb.unwrap() - 1).to_le_bytes());
        assert!(cp.is_some());
        session.disable().unwrap();

        assert_eq!(ctx.transport().pipeline_count(), 0);
        assert_eq!(ctx.transport().instance_count(), 0);
        assert_eq!(dma.live_streams(), 0);
        assert_eq!(ctx.catalog().entry(&ModuleUuid::COPIER).unwrap().instances_in_use(), 0);
    }

    #[test]
    fn test_disable_unbinds_every_pin() {
        let mut ctx = ctx();
        let mut dma = LoopbackDma::new();
        let mut session = BraSession::enable(&mut ctx, &mut dma, &request(), config()).unwrap();
        session.teardown().unwrap();
        assert!(session
            .copiers()
            .flat_map(|m| m.in_pins.iter().chain(&m.out_pins))
            .all(|p| p.state == PinState::Unbind && !p.in_use));
        assert_eq!(session.playback_pipe().state, PipeState::Invalid);
    }

    #[test]
    fn test_failed_step_releases_everything() {
        let mut ctx = ctx();
        let mut dma = LoopbackDma::new();
        ctx.transport_mut().fail_next(Opcode::Bind, status::INVALID_RESOURCE_STATE);
        let err = BraSession::enable(&mut ctx, &mut dma, &request(), config()).unwrap_err();
        assert!(err.firmware_status().is_some());
        assert_eq!(ctx.transport().pipeline_count(), 0);
        assert_eq!(dma.live_streams(), 0);
    }

    #[test]
    fn test_unknown_copier_fails_cleanly() {
        let mut ctx = DspContext::new(VirtualFirmware::new(), DspConfig::default());
        let mut dma = LoopbackDma::new();
        let err = BraSession::enable(&mut ctx, &mut dma, &request(), config()).unwrap_err();
        assert!(matches!(err, DspError::UnknownModule { .. }));
        assert_eq!(ctx.transport().pipeline_count(), 0);
        assert_eq!(dma.live_streams(), 0);
    }

    /// Loopback DMA whose buffers read back shorter than allocated.
    #[derive(Debug)]
    struct ShortDma {
        inner: LoopbackDma,
        visible: usize,
    }

    impl DmaBackend for ShortDma {
        fn prepare(&mut self, format: u32, size: usize, direction: StreamDirection) -> Result<u8> {
            self.inner.prepare(format, size, direction)
        }
        fn set_uncached(&mut self, tag: u8, pages: usize) -> Result<()> {
            self.inner.set_uncached(tag, pages)
        }
        fn buffer(&self, tag: u8) -> Result<&[u8]> {
            let buf = self.inner.buffer(tag)?;
            Ok(&buf[..buf.len().min(self.visible)])
        }
        fn buffer_mut(&mut self, tag: u8) -> Result<&mut [u8]> {
            self.inner.buffer_mut(tag)
        }
        fn trigger(&mut self, start: bool, tag: u8, direction: StreamDirection) -> Result<()> {
            self.inner.trigger(start, tag, direction)
        }
        fn cleanup(&mut self, tag: u8, direction: StreamDirection) -> Result<()> {
            self.inner.cleanup(tag, direction)
        }
    }

    #[test]
    fn test_short_capture_buffer_is_an_error() {
        let mut ctx = ctx();
        let mut dma = ShortDma {
            inner: LoopbackDma::new(),
            visible: 4,
        };
        let err = BraSession::enable(&mut ctx, &mut dma, &request(), config()).unwrap_err();
        assert!(matches!(err, DspError::Dma { .. }));
        assert_eq!(ctx.transport().pipeline_count(), 0);
        assert_eq!(dma.inner.live_streams(), 0);
    }

    #[test]
    fn test_drop_tears_down() {
        let mut ctx = ctx();
        let mut dma = LoopbackDma::new();
        {
            let _session = BraSession::enable(&mut ctx, &mut dma, &request(), config()).unwrap();
        }
        assert_eq!(ctx.transport().pipeline_count(), 0);
        assert_eq!(dma.live_streams(), 0);
    }
}
