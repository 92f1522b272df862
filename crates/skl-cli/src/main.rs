//! `skl`: command-line interface for the audio DSP orchestration engine.
//!
//! ```text
//! USAGE:
//!   skl variants                     List supported DSP variants
//!   skl node-id <dev> <conn> <idx>   Compute a gateway node id
//!   skl decode-node <raw>            Decode a raw node id
//!   skl demo                         Run a playback topology on the virtual firmware
//!   skl bra <tx> [--rx-size N]       Run a BRA transfer over loopback DMA
//! ```
//!
//! `demo` and `bra` run against the software backends and print the IPC
//! traffic they generate.

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use skl_dsp::backends::{LoopbackDma, VirtualFirmware};
use skl_dsp::chip::{DeviceType, HwConnType, ModuleType, NodeId, VARIANTS};
use skl_dsp::module::{ModuleInterface, ModuleResource};
use skl_dsp::pipeline::PipeParams;
use skl_dsp::{
    AudioFormat, BraConfig, BraRequest, BraSession, CatalogEntry, DspConfig, DspContext, Module,
    ModuleCatalog, ModuleConfig, ModuleInstanceId, ModuleUuid, Pipe,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skl", about = "Skylake-family audio DSP orchestration CLI", version)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List supported DSP variants.
    Variants,
    /// Compute the gateway node id of a copier.
    NodeId {
        /// Gateway device.
        device: Device,
        /// Side of the connection.
        conn: Conn,
        /// DMA index, SSP port, SoundWire stream or DMIC base.
        index: u8,
        /// TDM time slot (I2S) or DMIC offset.
        #[arg(long, default_value_t = 0)]
        time_slot: u8,
    },
    /// Decode a raw node id (decimal or 0x-prefixed hex).
    DecodeNode {
        /// Raw node id.
        #[arg(value_parser = parse_u32)]
        raw: u32,
    },
    /// Build, run and tear down a playback topology on the virtual firmware.
    Demo,
    /// Run one BRA transfer over loopback DMA.
    Bra {
        /// Data to send.
        tx: String,
        /// Bytes to read back (defaults to the TX length).
        #[arg(long)]
        rx_size: Option<usize>,
        /// SoundWire master link.
        #[arg(long, default_value_t = 0)]
        link: u32,
        /// Use the FPGA stream numbers.
        #[arg(long)]
        fpga: bool,
        /// Settle delay in milliseconds.
        #[arg(long, default_value_t = 100)]
        settle_ms: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Device {
    HdaHost,
    HdaLink,
    I2s,
    Dmic,
    Bt,
    SdwPcm,
}

impl From<Device> for DeviceType {
    fn from(d: Device) -> Self {
        match d {
            Device::HdaHost => Self::HdaHost,
            Device::HdaLink => Self::HdaLink,
            Device::I2s => Self::I2s,
            Device::Dmic => Self::Dmic,
            Device::Bt => Self::Bt,
            Device::SdwPcm => Self::SdwPcm,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Conn {
    Source,
    Sink,
}

impl From<Conn> for HwConnType {
    fn from(c: Conn) -> Self {
        match c {
            Conn::Source => Self::Source,
            Conn::Sink => Self::Sink,
        }
    }
}

fn parse_u32(s: &str) -> Result<u32> {
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    value.with_context(|| format!("invalid number: {s}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into())
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Cmd::Variants => cmd_variants(),
        Cmd::NodeId {
            device,
            conn,
            index,
            time_slot,
        } => cmd_node_id(device, conn, index, time_slot),
        Cmd::DecodeNode { raw } => {
            println!("{}", NodeId::from_raw(raw));
            Ok(())
        }
        Cmd::Demo => cmd_demo(),
        Cmd::Bra {
            tx,
            rx_size,
            link,
            fpga,
            settle_ms,
        } => cmd_bra(&tx, rx_size, link, fpga, settle_ms),
    }
}

fn cmd_variants() -> Result<()> {
    println!("{:<8} {:<24} {:<6} {:<6} Firmware", "PCI ID", "Platform", "Family", "Cores");
    for v in VARIANTS {
        println!(
            "{:#06x}   {:<24} {:<6} {:<6} {}",
            v.pci_id,
            v.name,
            format!("{:?}", v.family),
            v.num_cores,
            v.fw_name
        );
    }
    Ok(())
}

fn stereo() -> AudioFormat {
    AudioFormat {
        channels: 2,
        s_freq: 48_000,
        bit_depth: 32,
        valid_bit_depth: 24,
        ch_cfg: 1,
        interleaving: 0,
        sample_type: 0,
        ch_map: 0xFFFF_FF10,
    }
}

fn copier_module() -> Arc<Module> {
    Arc::new(Module {
        uuid: ModuleUuid::COPIER,
        resources: vec![ModuleResource {
            is_pages: 0,
            cps: 100_000,
            ibs: 384,
            obs: 384,
            dma_buffer_size: 2,
            cpc: 0,
        }],
        formats: vec![ModuleInterface {
            inputs: vec![stereo()],
            outputs: vec![stereo()],
        }],
        max_input_pins: 1,
        max_output_pins: 1,
        loadable: false,
    })
}

fn cmd_node_id(device: Device, conn: Conn, index: u8, time_slot: u8) -> Result<()> {
    let id = ModuleInstanceId::default();
    let mut mcfg = ModuleConfig::new(id, ModuleType::Copier, copier_module(), 0)
        .with_gateway(device.into(), conn.into());
    let mut params = PipeParams::default();
    match device {
        Device::HdaHost | Device::Bt => params.host_dma_id = index,
        Device::HdaLink => params.link_dma_id = index,
        Device::I2s | Device::Dmic => mcfg.vbus_id = index,
        Device::SdwPcm => mcfg.sdw_stream_num = index,
    }
    mcfg.time_slot = time_slot;

    let node = skl_dsp::format::node_id(&mcfg, &params);
    if !node.is_gateway() {
        bail!("no gateway for this device and connection");
    }
    println!("{node}");
    Ok(())
}

fn print_log(fw: &VirtualFirmware) {
    for (i, msg) in fw.log().iter().enumerate() {
        println!(
            "{i:3}  {:<18} {:#010x} {:#010x}  {} bytes",
            msg.opcode.name(),
            msg.primary,
            msg.extension,
            msg.payload.len()
        );
    }
}

fn virtual_context() -> DspContext<VirtualFirmware> {
    let catalog = ModuleCatalog::from_entries([CatalogEntry::new(ModuleUuid::COPIER, 1, 8)]);
    DspContext::new(VirtualFirmware::new(), DspConfig::default()).with_catalog(catalog)
}

fn cmd_demo() -> Result<()> {
    let mut ctx = virtual_context();

    let mut pipe = Pipe::new(1, 0, 2);
    pipe.params.host_dma_id = 0;
    pipe.params.link_dma_id = 1;
    ctx.create_pipeline(&mut pipe)?;

    let mut placements = Vec::new();
    for (instance_id, dev, conn) in [
        (0, DeviceType::HdaHost, HwConnType::Source),
        (1, DeviceType::HdaLink, HwConnType::Sink),
    ] {
        let id = ModuleInstanceId {
            module_id: ctx.catalog().module_id(&ModuleUuid::COPIER)?,
            instance_id,
            pvt_id: ctx.catalog_mut().get_pvt_id(&ModuleUuid::COPIER, instance_id)?,
        };
        let mut mcfg = ModuleConfig::new(id, ModuleType::Copier, copier_module(), pipe.ppl_id)
            .with_gateway(dev, conn);
        ctx.init_module(&mut mcfg, &pipe)?;
        placements.push(mcfg);
    }
    let [host, link] = placements.as_mut_slice() else {
        bail!("expected two copiers");
    };

    ctx.bind_modules(host, link)?;
    ctx.run_pipe(&mut pipe)?;
    info!("pipe {} running", pipe.ppl_id);
    ctx.stop_pipe(&mut pipe)?;
    ctx.unbind_modules(host, link)?;
    ctx.uninit_module(link)?;
    ctx.uninit_module(host)?;
    ctx.delete_pipe(&mut pipe)?;

    print_log(ctx.transport());
    println!("format mismatches: {}", ctx.format_mismatches());
    Ok(())
}

fn cmd_bra(tx: &str, rx_size: Option<usize>, link: u32, fpga: bool, settle_ms: u64) -> Result<()> {
    let mut ctx = virtual_context();
    let mut dma = LoopbackDma::new();

    let config = if fpga { BraConfig::fpga() } else { BraConfig::default() };
    let request = BraRequest {
        mstr_num: link,
        tx: Bytes::copy_from_slice(tx.as_bytes()),
        rx_size: rx_size.unwrap_or(tx.len()),
    };

    let config = config.with_settle(Duration::from_millis(settle_ms));
    let session = BraSession::enable(&mut ctx, &mut dma, &request, config)
        .context("BRA enable failed")?;
    let rx: Vec<String> = session.rx_data().iter().map(|b| format!("{b:02x}")).collect();
    println!("rx ({} bytes): {}", session.rx_data().len(), rx.join(" "));
    session.disable().context("BRA disable failed")?;

    print_log(ctx.transport());
    Ok(())
}
