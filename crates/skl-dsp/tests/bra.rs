//! BRA transfer tests
//!
//! Runs complete bulk transfers over the virtual firmware and loopback DMA.

use bytes::Bytes;
use skl_dsp::backends::{LoopbackDma, VirtualFirmware};
use skl_dsp::chip::{ppl_state, status};
use skl_dsp::pin::PinState;
use skl_dsp::{
    BraConfig, BraRequest, BraSession, CatalogEntry, DspConfig, DspContext, ModuleCatalog,
    ModuleState, ModuleUuid, Opcode, PipeState,
};
use std::time::{Duration, Instant};

fn ctx() -> DspContext<VirtualFirmware> {
    let catalog = ModuleCatalog::from_entries([CatalogEntry::new(ModuleUuid::COPIER, 1, 8)]);
    DspContext::new(VirtualFirmware::new(), DspConfig::default()).with_catalog(catalog)
}

fn request(tx: &'static [u8], rx_size: usize) -> BraRequest {
    BraRequest {
        mstr_num: 0,
        tx: Bytes::from_static(tx),
        rx_size,
    }
}

#[test]
fn test_transfer_round_trip() {
    let mut ctx = ctx();
    let mut dma = LoopbackDma::new();
    let start = Instant::now();
    let request = request(b"0123456789abcdef", 12);
    let session = BraSession::enable(&mut ctx, &mut dma, &request, BraConfig::default()).unwrap();

    assert!(start.elapsed() >= Duration::from_millis(100));
    assert_eq!(session.rx_data().len(), 12);
    assert_eq!(session.rx_data(), b"0123456789ab");
    assert_eq!(session.playback_pipe().state, PipeState::Started);
    assert_eq!(session.capture_pipe().state, PipeState::Started);
    assert!(session.copiers().all(|m| m.state >= ModuleState::InitDone));
    assert!(session
        .copiers()
        .flat_map(|m| m.out_pins.iter())
        .filter(|p| p.in_use)
        .all(|p| p.state == PinState::BindDone));

    let fw = session.context().transport();
    assert_eq!(fw.pipeline_state(1), Some(ppl_state::RUNNING));
    assert_eq!(fw.pipeline_state(2), Some(ppl_state::RUNNING));
    assert_eq!(fw.instance_count(), 4);
    assert_eq!(fw.bindings().len(), 2);

    session.disable().unwrap();
    assert_eq!(ctx.transport().pipeline_count(), 0);
    assert_eq!(dma.live_streams(), 0);
}

#[test]
fn test_capture_pipe_runs_first() {
    let mut ctx = ctx();
    let mut dma = LoopbackDma::new();
    let cfg = BraConfig::default().with_settle(Duration::ZERO);
    BraSession::enable(&mut ctx, &mut dma, &request(b"abcd", 4), cfg)
        .unwrap()
        .disable()
        .unwrap();

    let fw = ctx.transport();
    let created: Vec<u32> = fw
        .requests(Opcode::CreatePipeline)
        .iter()
        .map(|m| m.field(16, 0xFF))
        .collect();
    assert_eq!(created, [1, 2]);

    // pause then run: capture (2) first, then playback (1)
    let running: Vec<u32> = fw
        .requests(Opcode::SetPipelineState)
        .iter()
        .filter(|m| m.field(0, 0x1F) == ppl_state::RUNNING)
        .map(|m| m.field(16, 0xFF))
        .collect();
    assert_eq!(running, [2, 1]);

    let deleted: Vec<u32> = fw
        .requests(Opcode::DeletePipeline)
        .iter()
        .map(|m| m.field(16, 0xFF))
        .collect();
    assert_eq!(deleted, [1, 2]);
    assert_eq!(fw.requests(Opcode::Unbind).len(), 2);
}

#[test]
fn test_fpga_streams() {
    let mut ctx = ctx();
    let mut dma = LoopbackDma::new();
    let cfg = BraConfig::fpga().with_settle(Duration::ZERO);
    let session = BraSession::enable(&mut ctx, &mut dma, &request(b"xy", 2), cfg).unwrap();
    let link = session.copiers().nth(1).unwrap();
    assert_eq!(link.sdw_stream_num, 0x3);
    let blob = &session
        .context()
        .transport()
        .instance(link.id.module_id, link.id.pvt_id)
        .unwrap()
        .blob;
    // SoundWire link output class over stream 3
    assert_eq!(blob[68..72], 0x1003u32.to_le_bytes());
}

#[test]
fn test_failed_run_tears_down() {
    let mut ctx = ctx();
    let mut dma = LoopbackDma::new();
    ctx.transport_mut().fail_next(Opcode::SetPipelineState, status::INVALID_RESOURCE_STATE);
    let cfg = BraConfig::default().with_settle(Duration::ZERO);
    assert!(BraSession::enable(&mut ctx, &mut dma, &request(b"abcd", 4), cfg).is_err());

    assert_eq!(ctx.transport().pipeline_count(), 0);
    assert!(ctx.transport().bindings().is_empty());
    assert_eq!(dma.live_streams(), 0);
    assert_eq!(ctx.catalog().entry(&ModuleUuid::COPIER).unwrap().instances_in_use(), 0);
}

#[test]
fn test_back_to_back_sessions() {
    let mut ctx = ctx();
    let mut dma = LoopbackDma::new();
    let cfg = BraConfig::default().with_settle(Duration::ZERO);
    for payload in [&b"first"[..], &b"second"[..]] {
        let req = BraRequest {
            mstr_num: 2,
            tx: Bytes::from_static(payload),
            rx_size: payload.len(),
        };
        let session = BraSession::enable(&mut ctx, &mut dma, &req, cfg.clone()).unwrap();
        assert_eq!(session.rx_data(), payload);
        assert_eq!(session.mstr_num(), 2);
    }
    assert_eq!(ctx.transport().pipeline_count(), 0);
}
