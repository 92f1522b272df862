//! Module format calculator
//!
//! Builds the INIT_INSTANCE payload of a module instance. Every payload
//! starts with the base configuration (resource numbers plus the input
//! format of pin 0 of the selected interface) followed by a module-type
//! specific extension:
//!
//! ```text
//! Type                       Extension                                   Size
//! ────────────────────────── ─────────────────────────────────────────── ──────────
//! COPIER                     out fmt, feature mask, gateway, caps        80 + caps
//! PROBE                      probe gateway (node id, dma buffer size)    48
//! SRCINT / ASRC              target rate, mode                           48
//! UPDWMIX                    out ch cfg, coeff select, coeffs, ch map    76
//! ALGO                       caps verbatim                               40 + caps
//! BASE_OUTFMT / MIC_SEL/ KPB out fmt                                     64
//! GAIN                       one gain record per output channel          40 + 20·ch
//! other                      none                                        40
//! ```

use crate::error::{DspError, Result};
use crate::module::{AudioFormat, ModuleConfig};
use crate::pipeline::PipeParams;
use bytes::{BufMut, Bytes, BytesMut};
use skl_chip::abi;
use skl_chip::node::{bt_vindex, DmaClass, NodeId, SspDmaNode, SDW_AGGREGATED_VINDEX};
use skl_chip::topology::{DeviceType, HwConnType, ModuleType, StreamDirection};
use tracing::{debug, warn};

/// Context the calculator needs beyond the module and its pipe.
#[derive(Debug, Clone, Copy)]
pub struct BlobOptions {
    /// Topology declares per-resource DMA buffer sizes
    pub declared_dma_buffers: bool,
    /// Gateway of probe modules
    pub probe_node: NodeId,
}

impl Default for BlobOptions {
    fn default() -> Self {
        Self {
            declared_dma_buffers: false,
            probe_node: NodeId::NON_GATEWAY,
        }
    }
}

/// Computed INIT_INSTANCE payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleBlob {
    data: Bytes,
}

impl ModuleBlob {
    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume into the payload buffer.
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Little-endian dword at byte offset `off`, `None` past the end.
    pub fn dword(&self, off: usize) -> Option<u32> {
        let bytes = self.data.get(off..off + 4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Append the 24-byte packed audio format.
pub fn put_audio_format(buf: &mut BytesMut, fmt: &AudioFormat) {
    buf.put_u32_le(fmt.s_freq);
    buf.put_u32_le(fmt.bit_depth);
    buf.put_u32_le(fmt.ch_map);
    buf.put_u32_le(fmt.ch_cfg);
    buf.put_u32_le(fmt.interleaving);
    buf.put_u8(fmt.channels);
    buf.put_u8(fmt.valid_bit_depth);
    buf.put_u8(fmt.sample_type);
    buf.put_u8(0);
}

/// Payload size of a module instance.
///
/// # Errors
///
/// Returns error if a GAIN module's interface has no output format.
pub fn param_size(mcfg: &ModuleConfig) -> Result<usize> {
    Ok(match mcfg.m_type {
        ModuleType::Copier => abi::CPR_CFG_SIZE + mcfg.caps.len(),
        ModuleType::Probe => abi::PROBE_CFG_SIZE,
        ModuleType::SrcInt | ModuleType::Asrc => abi::SRC_CFG_SIZE,
        ModuleType::UpDownMixer => abi::UPDWMIX_CFG_SIZE,
        ModuleType::Algo => abi::BASE_CFG_SIZE + mcfg.caps.len(),
        ModuleType::BaseOutFmt | ModuleType::MicSelect | ModuleType::Kpb => {
            abi::BASE_OUTFMT_CFG_SIZE
        }
        ModuleType::Gain => {
            let channels = usize::from(mcfg.output_format(0)?.channels);
            abi::BASE_CFG_SIZE + abi::GAIN_RECORD_SIZE * channels
        }
        ModuleType::Mixer => abi::BASE_CFG_SIZE,
    })
}

/// Gateway node id of a copier.
///
/// Devices without a gateway yield [`NodeId::NON_GATEWAY`].
pub fn node_id(mcfg: &ModuleConfig, params: &PipeParams) -> NodeId {
    let Some(class) = DmaClass::for_device(mcfg.dev_type, mcfg.hw_conn_type) else {
        return NodeId::NON_GATEWAY;
    };
    let vindex = match mcfg.dev_type {
        DeviceType::Bt => bt_vindex(params.host_dma_id, mcfg.vbus_id),
        DeviceType::I2s => SspDmaNode {
            time_slot: mcfg.time_slot,
            i2s_instance: mcfg.vbus_id,
        }
        .vindex(),
        DeviceType::Dmic => mcfg.vbus_id.wrapping_add(mcfg.time_slot),
        DeviceType::HdaLink => params.link_dma_id,
        DeviceType::HdaHost => params.host_dma_id,
        DeviceType::SdwPcm | DeviceType::SdwPdm => {
            if mcfg.sdw_agg_enable {
                SDW_AGGREGATED_VINDEX
            } else {
                mcfg.sdw_stream_num
            }
        }
        DeviceType::Slimbus | DeviceType::None => return NodeId::NON_GATEWAY,
    };
    NodeId::new(class, vindex)
}

/// Gateway DMA buffer size of a copier, `None` when the connection type
/// gives no buffer direction.
///
/// # Errors
///
/// Returns error if the selected resource is out of range.
pub fn copier_dma_buffer_size(mcfg: &ModuleConfig, opts: &BlobOptions) -> Result<Option<u32>> {
    let res = mcfg.resource()?;
    if opts.declared_dma_buffers {
        return Ok(Some(res.dma_buffer_size));
    }
    let host = mcfg.dev_type == DeviceType::HdaHost;
    let io_buf = match mcfg.hw_conn_type {
        HwConnType::Source if host => res.ibs,
        HwConnType::Source => res.obs,
        HwConnType::Sink if host => res.obs,
        HwConnType::Sink => res.ibs,
        HwConnType::None => return Ok(None),
    };
    let size = mcfg.dma_buffer_size.wrapping_mul(io_buf);
    if size != 0 {
        return Ok(Some(size));
    }
    // Default to two periods of the directional buffer.
    Ok(Some(match mcfg.hw_conn_type {
        HwConnType::Source => 2 * res.obs,
        _ => 2 * res.ibs,
    }))
}

fn put_base(buf: &mut BytesMut, mcfg: &ModuleConfig) -> Result<()> {
    let res = mcfg.resource()?;
    let fmt = mcfg.input_format(0)?;
    debug!(
        "base fmt: ch={} rate={} bits={}/{} ch_cfg={:#x} type={}",
        fmt.channels, fmt.s_freq, fmt.bit_depth, fmt.valid_bit_depth, fmt.ch_cfg, fmt.sample_type
    );
    buf.put_u32_le(res.cps);
    buf.put_u32_le(res.ibs);
    buf.put_u32_le(res.obs);
    buf.put_u32_le(res.is_pages);
    put_audio_format(buf, fmt);
    Ok(())
}

fn put_copier(
    buf: &mut BytesMut,
    mcfg: &ModuleConfig,
    params: &PipeParams,
    opts: &BlobOptions,
) -> Result<()> {
    put_base(buf, mcfg)?;
    put_audio_format(buf, mcfg.output_format(0)?);

    let node = node_id(mcfg, params);
    let dma_buffer_size = if node.is_gateway() {
        copier_dma_buffer_size(mcfg, opts)?
    } else {
        None
    };

    // feature mask, then gateway: node id, dma buffer size, config length
    buf.put_u32_le(0);
    buf.put_u32_le(node.raw());
    match dma_buffer_size {
        Some(size) => {
            buf.put_u32_le(size);
            buf.put_u32_le((mcfg.caps.len() / 4) as u32);
            buf.put_slice(&mcfg.caps);
        }
        None => {
            if node.is_gateway() {
                warn!(
                    "copier {}: wrong connection type {:?}, gateway left unconfigured",
                    mcfg.id, mcfg.hw_conn_type
                );
            }
            buf.put_u32_le(0);
            buf.put_u32_le(0);
            buf.put_bytes(0, mcfg.caps.len());
        }
    }
    debug!("copier {}: node {node}, dma buffer {dma_buffer_size:?}", mcfg.id);
    Ok(())
}

/// Compute the INIT_INSTANCE payload of `mcfg` placed in a pipe with `params`.
///
/// # Errors
///
/// Returns error if the resource or format indices of `mcfg` are out of
/// range, or a GAIN module has no gain parameters.
pub fn module_config_blob(
    mcfg: &ModuleConfig,
    params: &PipeParams,
    opts: &BlobOptions,
) -> Result<ModuleBlob> {
    let size = param_size(mcfg)?;
    let mut buf = BytesMut::with_capacity(size);

    match mcfg.m_type {
        ModuleType::Copier => put_copier(&mut buf, mcfg, params, opts)?,
        ModuleType::Probe => {
            put_base(&mut buf, mcfg)?;
            buf.put_u32_le(opts.probe_node.raw());
            buf.put_u32_le(mcfg.resource()?.dma_buffer_size);
        }
        ModuleType::SrcInt | ModuleType::Asrc => {
            put_base(&mut buf, mcfg)?;
            buf.put_u32_le(mcfg.output_format(0)?.s_freq);
            let mode = match (mcfg.m_type, params.stream) {
                (ModuleType::Asrc, StreamDirection::Playback) => abi::asrc_mode::DOWNLINK,
                (ModuleType::Asrc, StreamDirection::Capture) => abi::asrc_mode::UPLINK,
                _ => abi::asrc_mode::NONE,
            };
            buf.put_u32_le(mode);
        }
        ModuleType::UpDownMixer => {
            put_base(&mut buf, mcfg)?;
            let out = mcfg.output_format(0)?;
            buf.put_u32_le(out.ch_cfg);
            // coefficient select 0: firmware default coefficients
            buf.put_u32_le(0);
            buf.put_bytes(0, 4 * abi::UP_DOWN_MIXER_MAX_COEFF);
            buf.put_u32_le(out.ch_map);
        }
        ModuleType::Algo => {
            put_base(&mut buf, mcfg)?;
            buf.put_slice(&mcfg.caps);
        }
        ModuleType::BaseOutFmt | ModuleType::MicSelect | ModuleType::Kpb => {
            put_base(&mut buf, mcfg)?;
            put_audio_format(&mut buf, mcfg.output_format(0)?);
        }
        ModuleType::Gain => {
            put_base(&mut buf, mcfg)?;
            let gain = mcfg.gain.as_ref().ok_or_else(|| {
                DspError::invalid_argument(format!("gain module {} has no gain data", mcfg.id))
            })?;
            let channels = usize::from(mcfg.output_format(0)?.channels);
            for ch in 0..channels {
                buf.put_u32_le(abi::ALL_CHANNELS);
                buf.put_u32_le(gain.volume_for(ch));
                buf.put_u32_le(gain.ramp_type);
                buf.put_u64_le(gain.ramp_duration);
            }
        }
        ModuleType::Mixer => put_base(&mut buf, mcfg)?,
    }

    debug_assert_eq!(buf.len(), size);
    debug!(
        "module {} type {:?}: config size {} bytes",
        mcfg.id,
        mcfg.m_type,
        buf.len()
    );
    Ok(ModuleBlob { data: buf.freeze() })
}

/// Copier extra-output-pin format record (`CPR_SINK_FMT`).
pub fn cpr_pin_format(sink_id: u32, src: &AudioFormat, dst: &AudioFormat) -> Bytes {
    let mut buf = BytesMut::with_capacity(abi::CPR_PIN_FMT_SIZE);
    buf.put_u32_le(sink_id);
    put_audio_format(&mut buf, src);
    put_audio_format(&mut buf, dst);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{
        GainConfig, Module, ModuleInstanceId, ModuleInterface, ModuleResource, ModuleUuid,
    };
    use std::sync::Arc;

    fn fmt(channels: u8, s_freq: u32) -> AudioFormat {
        AudioFormat {
            channels,
            s_freq,
            bit_depth: 32,
            valid_bit_depth: 24,
            ch_map: 0xFFFF_FFF1,
            ..AudioFormat::default()
        }
    }

    fn mcfg(m_type: ModuleType, in_fmt: AudioFormat, out_fmt: AudioFormat) -> ModuleConfig {
        let module = Module {
            uuid: ModuleUuid::COPIER,
            resources: vec![ModuleResource {
                cps: 100_000,
                ibs: 384,
                obs: 384,
                is_pages: 1,
                dma_buffer_size: 2,
                cpc: 0,
            }],
            formats: vec![ModuleInterface {
                inputs: vec![in_fmt],
                outputs: vec![out_fmt],
            }],
            max_input_pins: 1,
            max_output_pins: 1,
            loadable: false,
        };
        let id = ModuleInstanceId {
            module_id: 1,
            instance_id: 1,
            pvt_id: 0,
        };
        ModuleConfig::new(id, m_type, Arc::new(module), 1)
    }

    fn host_params() -> PipeParams {
        PipeParams {
            host_dma_id: 3,
            link_dma_id: 1,
            ..PipeParams::default()
        }
    }

    #[test]
    fn test_base_layout() {
        let cfg = mcfg(ModuleType::Mixer, fmt(2, 48_000), fmt(2, 48_000));
        let blob = module_config_blob(&cfg, &host_params(), &BlobOptions::default()).unwrap();
        assert_eq!(blob.size(), 40);
        assert_eq!(blob.dword(0), Some(100_000));
        assert_eq!(blob.dword(4), Some(384));
        assert_eq!(blob.dword(12), Some(1));
        assert_eq!(blob.dword(16), Some(48_000));
        assert_eq!(blob.dword(20), Some(32));
        assert_eq!(blob.dword(24), Some(0xFFFF_FFF1));
        assert_eq!(&blob.as_bytes()[36..40], &[2, 24, 0, 0]);
    }

    #[test]
    fn test_hda_host_node_id_follows_connection() {
        let params = host_params();
        let src = mcfg(ModuleType::Copier, fmt(1, 48_000), fmt(1, 48_000))
            .with_gateway(DeviceType::HdaHost, HwConnType::Source);
        let sink = src.clone().with_gateway(DeviceType::HdaHost, HwConnType::Sink);

        let a = node_id(&src, &params);
        let b = node_id(&sink, &params);
        assert_eq!(a.class(), Some(DmaClass::HdaHostOutput));
        assert_eq!(b.class(), Some(DmaClass::HdaHostInput));
        assert_eq!(a.vindex(), 3);
        assert_eq!(b.vindex(), 3);
    }

    #[test]
    fn test_node_id_per_device() {
        let params = host_params();
        let mut cfg = mcfg(ModuleType::Copier, fmt(1, 48_000), fmt(1, 48_000));
        cfg.vbus_id = 2;
        cfg.time_slot = 1;
        cfg.sdw_stream_num = 0x13;

        cfg.hw_conn_type = HwConnType::Sink;
        cfg.dev_type = DeviceType::I2s;
        assert_eq!(node_id(&cfg, &params).raw(), 0x0D21);
        cfg.dev_type = DeviceType::Bt;
        assert_eq!(node_id(&cfg, &params).raw(), 0x0D00 | (3 + (2 << 3)));
        cfg.dev_type = DeviceType::Dmic;
        assert_eq!(node_id(&cfg, &params).raw(), 0x0B03);
        cfg.dev_type = DeviceType::HdaLink;
        assert_eq!(node_id(&cfg, &params).raw(), 0x0901);
        cfg.dev_type = DeviceType::SdwPcm;
        assert_eq!(node_id(&cfg, &params).raw(), 0x1113);
        cfg.sdw_agg_enable = true;
        assert_eq!(node_id(&cfg, &params).raw(), 0x1150);
        cfg.dev_type = DeviceType::Slimbus;
        assert_eq!(node_id(&cfg, &params), NodeId::NON_GATEWAY);
    }

    #[test]
    fn test_copier_dma_buffer_defaults_to_twice_obs() {
        let cfg = mcfg(ModuleType::Copier, fmt(1, 48_000), fmt(1, 48_000))
            .with_gateway(DeviceType::HdaHost, HwConnType::Source);
        assert_eq!(cfg.dma_buffer_size, 0);
        let blob = module_config_blob(&cfg, &host_params(), &BlobOptions::default()).unwrap();
        assert_eq!(blob.size(), 80);
        assert_eq!(blob.dword(64), Some(0));
        assert_eq!(blob.dword(68), Some(0x0003));
        assert_eq!(blob.dword(72), Some(768));
    }

    #[test]
    fn test_copier_dma_buffer_multiplier_uses_directional_buffer() {
        let mut cfg = mcfg(ModuleType::Copier, fmt(1, 48_000), fmt(1, 48_000))
            .with_gateway(DeviceType::HdaLink, HwConnType::Sink);
        cfg.dma_buffer_size = 3;
        let opts = BlobOptions::default();
        assert_eq!(copier_dma_buffer_size(&cfg, &opts).unwrap(), Some(3 * 384));

        let declared = BlobOptions {
            declared_dma_buffers: true,
            ..opts
        };
        assert_eq!(copier_dma_buffer_size(&cfg, &declared).unwrap(), Some(2));
    }

    #[test]
    fn test_copier_caps_are_appended() {
        let caps: Vec<u8> = [0u32, 1, 0x1013, 0].iter().flat_map(|d| d.to_le_bytes()).collect();
        let mut cfg = mcfg(ModuleType::Copier, fmt(1, 96_000), fmt(1, 96_000))
            .with_gateway(DeviceType::SdwPcm, HwConnType::Source)
            .with_caps(caps.clone());
        cfg.sdw_stream_num = 0x13;
        let blob = module_config_blob(&cfg, &host_params(), &BlobOptions::default()).unwrap();
        assert_eq!(blob.size(), 96);
        assert_eq!(blob.dword(68), Some(0x1013));
        assert_eq!(blob.dword(76), Some(4));
        assert_eq!(&blob.as_bytes()[80..], &caps[..]);
    }

    #[test]
    fn test_non_gateway_copier_leaves_gateway_empty() {
        let cfg = mcfg(ModuleType::Copier, fmt(1, 48_000), fmt(1, 48_000)).with_caps(vec![7u8; 8]);
        let blob = module_config_blob(&cfg, &host_params(), &BlobOptions::default()).unwrap();
        assert_eq!(blob.size(), 88);
        assert_eq!(blob.dword(64), Some(0));
        assert_eq!(blob.dword(68), Some(0xFFFF_FFFF));
        assert_eq!(blob.dword(72), Some(0));
        assert_eq!(blob.dword(76), Some(0));
        assert!(blob.as_bytes()[80..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_gain_has_one_record_per_output_channel() {
        let mut cfg = mcfg(ModuleType::Gain, fmt(2, 48_000), fmt(2, 48_000));
        cfg.gain = Some(GainConfig {
            volume: vec![0x100, 0x200],
            ramp_type: 1,
            ramp_duration: 5,
        });
        let blob = module_config_blob(&cfg, &host_params(), &BlobOptions::default()).unwrap();
        assert_eq!(blob.size(), abi::BASE_CFG_SIZE + 2 * abi::GAIN_RECORD_SIZE);
        assert_eq!(blob.dword(40), Some(abi::ALL_CHANNELS));
        assert_eq!(blob.dword(44), Some(0x100));
        assert_eq!(blob.dword(64), Some(0x200));
        assert_eq!(blob.dword(52), Some(5));
    }

    #[test]
    fn test_gain_without_data_is_rejected() {
        let cfg = mcfg(ModuleType::Gain, fmt(2, 48_000), fmt(2, 48_000));
        assert!(module_config_blob(&cfg, &host_params(), &BlobOptions::default()).is_err());
    }

    #[test]
    fn test_asrc_mode_follows_stream_direction() {
        let cfg = mcfg(ModuleType::Asrc, fmt(2, 44_100), fmt(2, 48_000));
        let mut params = host_params();
        let blob = module_config_blob(&cfg, &params, &BlobOptions::default()).unwrap();
        assert_eq!(blob.size(), 48);
        assert_eq!(blob.dword(40), Some(48_000));
        assert_eq!(blob.dword(44), Some(abi::asrc_mode::DOWNLINK));

        params.stream = StreamDirection::Capture;
        let blob = module_config_blob(&cfg, &params, &BlobOptions::default()).unwrap();
        assert_eq!(blob.dword(44), Some(abi::asrc_mode::UPLINK));

        let src = mcfg(ModuleType::SrcInt, fmt(2, 44_100), fmt(2, 48_000));
        let blob = module_config_blob(&src, &params, &BlobOptions::default()).unwrap();
        assert_eq!(blob.dword(44), Some(abi::asrc_mode::NONE));
    }

    #[test]
    fn test_updown_mixer_layout() {
        let mut out = fmt(6, 48_000);
        out.ch_cfg = 8;
        out.ch_map = 0xFF65_7120;
        let cfg = mcfg(ModuleType::UpDownMixer, fmt(2, 48_000), out);
        let blob = module_config_blob(&cfg, &host_params(), &BlobOptions::default()).unwrap();
        assert_eq!(blob.size(), 76);
        assert_eq!(blob.dword(40), Some(8));
        assert_eq!(blob.dword(44), Some(0));
        assert!((48..72).step_by(4).all(|off| blob.dword(off) == Some(0)));
        assert_eq!(blob.dword(72), Some(0xFF65_7120));
    }

    #[test]
    fn test_outfmt_family_and_algo() {
        for ty in [ModuleType::BaseOutFmt, ModuleType::MicSelect, ModuleType::Kpb] {
            let cfg = mcfg(ty, fmt(2, 48_000), fmt(1, 16_000));
            let blob = module_config_blob(&cfg, &host_params(), &BlobOptions::default()).unwrap();
            assert_eq!(blob.size(), 64);
            assert_eq!(blob.dword(40), Some(16_000));
        }
        let algo = mcfg(ModuleType::Algo, fmt(2, 48_000), fmt(2, 48_000)).with_caps(vec![9u8; 12]);
        let blob = module_config_blob(&algo, &host_params(), &BlobOptions::default()).unwrap();
        assert_eq!(blob.size(), 52);
        assert_eq!(&blob.as_bytes()[40..], &[9u8; 12]);
    }

    #[test]
    fn test_probe_gateway() {
        let cfg = mcfg(ModuleType::Probe, fmt(2, 48_000), fmt(2, 48_000));
        let opts = BlobOptions {
            probe_node: NodeId::new(DmaClass::HdaHostInput, 7),
            ..BlobOptions::default()
        };
        let blob = module_config_blob(&cfg, &host_params(), &opts).unwrap();
        assert_eq!(blob.size(), 48);
        assert_eq!(blob.dword(40), Some(0x0107));
        assert_eq!(blob.dword(44), Some(2));
    }

    #[test]
    fn test_cpr_pin_format_record() {
        let rec = cpr_pin_format(1, &fmt(1, 48_000), &fmt(2, 96_000));
        assert_eq!(rec.len(), abi::CPR_PIN_FMT_SIZE);
        assert_eq!(&rec[..4], &1u32.to_le_bytes());
        assert_eq!(&rec[28..32], &96_000u32.to_le_bytes());
    }
}
