//! DSP context
//!
//! [`DspContext`] owns everything the orchestration engine needs between
//! calls: the IPC client, the topology notifier, the module catalog and the
//! probe configuration. Topology records ([`ModuleConfig`], [`Pipe`]) stay
//! with the caller and are passed in by `&mut`.
//!
//! The context takes no locks. Operations are expected to be issued one at a
//! time by a single topology controller; callers that share a context across
//! threads wrap it in their own mutex.

use crate::catalog::ModuleCatalog;
use crate::config::DspConfig;
use crate::error::{DspError, Result};
use crate::format::{self, BlobOptions, ModuleBlob};
use crate::ipc::{InitInstanceMsg, IpcClient, IpcTransport, LargeConfigMsg};
use crate::module::{ModuleConfig, ModuleState};
use crate::pipeline::{NullNotifier, Pipe, PipeState, TopologyNotifier};
use crate::probe::ProbeConfig;
use bytes::Bytes;
use skl_chip::ipc::PPL_INSTANCE_NONE;
use skl_chip::topology::ModuleType;
use tracing::{debug, error};

/// Orchestration state of one DSP.
#[derive(Debug)]
pub struct DspContext<T: IpcTransport> {
    pub(crate) ipc: IpcClient<T>,
    pub(crate) notifier: Box<dyn TopologyNotifier>,
    pub(crate) config: DspConfig,
    pub(crate) catalog: ModuleCatalog,
    pub(crate) probe: ProbeConfig,
    pub(crate) format_mismatches: u64,
}

impl<T: IpcTransport> DspContext<T> {
    /// Context over `transport` with an empty catalog and no notifier.
    pub fn new(transport: T, config: DspConfig) -> Self {
        Self {
            ipc: IpcClient::with_mailbox_size(transport, config.mailbox_size),
            notifier: Box::new(NullNotifier),
            config,
            catalog: ModuleCatalog::default(),
            probe: ProbeConfig::default(),
            format_mismatches: 0,
        }
    }

    /// Deliver topology events to `notifier`.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Box<dyn TopologyNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Use `catalog` for UUID and private id lookups.
    #[must_use]
    pub fn with_catalog(mut self, catalog: ModuleCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// IPC transport.
    pub fn transport(&self) -> &T {
        self.ipc.transport()
    }

    /// IPC transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        self.ipc.transport_mut()
    }

    /// IPC client, for requests the context has no helper for.
    pub fn ipc_mut(&mut self) -> &mut IpcClient<T> {
        &mut self.ipc
    }

    /// Engine configuration.
    pub fn config(&self) -> &DspConfig {
        &self.config
    }

    /// Module catalog.
    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    /// Module catalog, mutably.
    pub fn catalog_mut(&mut self) -> &mut ModuleCatalog {
        &mut self.catalog
    }

    /// Probe configuration.
    pub fn probe_config(&self) -> &ProbeConfig {
        &self.probe
    }

    /// Probe configuration, mutably.
    pub fn probe_config_mut(&mut self) -> &mut ProbeConfig {
        &mut self.probe
    }

    /// Number of format mismatches seen by bind since the context was built.
    pub fn format_mismatches(&self) -> u64 {
        self.format_mismatches
    }

    /// Compute the INIT payload of `mcfg` placed in `pipe`.
    ///
    /// Building a probe payload records the extraction buffer size on the
    /// probe configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the topology indices of `mcfg` are out of range.
    pub fn module_config_blob(&mut self, mcfg: &ModuleConfig, pipe: &Pipe) -> Result<ModuleBlob> {
        let opts = BlobOptions {
            declared_dma_buffers: self.config.declared_dma_buffers,
            probe_node: self.probe.extraction_node(),
        };
        let blob = format::module_config_blob(mcfg, &pipe.params, &opts)?;
        if mcfg.m_type == ModuleType::Probe {
            self.probe.edma_buffsize = mcfg.resource()?.dma_buffer_size;
        }
        Ok(blob)
    }

    /// Instantiate `mcfg` in firmware.
    ///
    /// # Errors
    ///
    /// Returns [`DspError::PipeNotCreated`] unless `pipe` is `Created`, or
    /// the payload or firmware error.
    pub fn init_module(&mut self, mcfg: &mut ModuleConfig, pipe: &Pipe) -> Result<()> {
        debug!("init module {} pvt {} in pipe {}", mcfg.id, mcfg.id.pvt_id, pipe.ppl_id);
        if pipe.state != PipeState::Created {
            error!("module {}: pipe {} is {:?}, not created", mcfg.id, pipe.ppl_id, pipe.state);
            return Err(DspError::PipeNotCreated {
                ppl_id: pipe.ppl_id,
            });
        }

        let blob = self.module_config_blob(mcfg, pipe)?;
        let msg = InitInstanceMsg {
            module_id: mcfg.id.module_id,
            instance_id: mcfg.id.pvt_id,
            ppl_instance_id: pipe.ppl_id,
            core_id: mcfg.core_id,
            domain: mcfg.domain,
        };
        self.ipc
            .init_instance(&msg, blob.into_bytes())
            .inspect_err(|e| error!("module {}: init failed: {e}", mcfg.id))?;
        mcfg.state = ModuleState::InitDone;
        Ok(())
    }

    /// Destroy the firmware instance of `mcfg`.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the request; the state is kept.
    pub fn uninit_module(&mut self, mcfg: &mut ModuleConfig) -> Result<()> {
        debug!("uninit module {} pvt {}", mcfg.id, mcfg.id.pvt_id);
        self.ipc
            .delete_instance(mcfg.id.module_id, mcfg.id.pvt_id)
            .inspect_err(|e| error!("module {}: delete failed: {e}", mcfg.id))?;
        mcfg.state = ModuleState::Uninit;
        Ok(())
    }

    /// Instantiate a probe module outside any pipeline.
    ///
    /// Probes are addressed by their topology instance id.
    ///
    /// # Errors
    ///
    /// Returns the payload or firmware error.
    pub fn init_probe_module(&mut self, mcfg: &mut ModuleConfig, pipe: &Pipe) -> Result<()> {
        debug!("init probe module {}", mcfg.id);
        let blob = self.module_config_blob(mcfg, pipe)?;
        let msg = InitInstanceMsg {
            module_id: mcfg.id.module_id,
            instance_id: mcfg.id.instance_id,
            ppl_instance_id: PPL_INSTANCE_NONE,
            core_id: mcfg.core_id,
            domain: mcfg.domain,
        };
        self.ipc.init_instance(&msg, blob.into_bytes())?;
        mcfg.state = ModuleState::InitDone;
        Ok(())
    }

    /// Destroy a probe module instance.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the request.
    pub fn uninit_probe_module(&mut self, mcfg: &mut ModuleConfig) -> Result<()> {
        debug!("uninit probe module {}", mcfg.id);
        self.ipc
            .delete_instance(mcfg.id.module_id, mcfg.id.instance_id)?;
        mcfg.state = ModuleState::Uninit;
        Ok(())
    }

    /// Write parameter `param_id` of a module instance.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects any block of the write.
    pub fn set_module_params(
        &mut self,
        mcfg: &ModuleConfig,
        param_id: u8,
        data: &[u8],
    ) -> Result<()> {
        let msg = LargeConfigMsg {
            module_id: mcfg.id.module_id,
            instance_id: mcfg.id.pvt_id,
            param_id,
        };
        self.ipc.set_large_config(&msg, data)
    }

    /// Read parameter `param_id` of a module instance, `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the read.
    pub fn get_module_params(
        &mut self,
        mcfg: &ModuleConfig,
        param_id: u8,
        size: usize,
    ) -> Result<Bytes> {
        let msg = LargeConfigMsg {
            module_id: mcfg.id.module_id,
            instance_id: mcfg.id.pvt_id,
            param_id,
        };
        self.ipc.get_large_config(&msg, &[], size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::VirtualFirmware;
    use crate::ipc::Opcode;
    use crate::module::{
        AudioFormat, Module, ModuleInstanceId, ModuleInterface, ModuleResource, ModuleUuid,
    };
    use skl_chip::ipc as hdr;
    use skl_chip::node::DmaClass;
    use std::sync::Arc;

    fn module() -> Arc<Module> {
        Arc::new(Module {
            uuid: ModuleUuid::COPIER,
            resources: vec![ModuleResource {
                ibs: 384,
                obs: 384,
                dma_buffer_size: 4096,
                ..ModuleResource::default()
            }],
            formats: vec![ModuleInterface {
                inputs: vec![AudioFormat::default()],
                outputs: vec![AudioFormat::default()],
            }],
            max_input_pins: 1,
            max_output_pins: 1,
            loadable: false,
        })
    }

    fn mixer(pvt_id: u8) -> ModuleConfig {
        let id = ModuleInstanceId {
            module_id: 2,
            instance_id: 5,
            pvt_id,
        };
        ModuleConfig::new(id, ModuleType::Mixer, module(), 1)
    }

    fn ctx() -> DspContext<VirtualFirmware> {
        DspContext::new(VirtualFirmware::new(), DspConfig::default())
    }

    #[test]
    fn test_init_requires_created_pipe() {
        let mut ctx = ctx();
        let mut mcfg = mixer(0);
        let pipe = Pipe::new(1, 0, 2);
        assert!(matches!(
            ctx.init_module(&mut mcfg, &pipe),
            Err(DspError::PipeNotCreated { ppl_id: 1 })
        ));
        assert_eq!(mcfg.state, ModuleState::Uninit);
        assert!(ctx.transport().log().is_empty());
    }

    #[test]
    fn test_init_addresses_private_id() {
        let mut ctx = ctx();
        let mut mcfg = mixer(3);
        mcfg.core_id = 1;
        let mut pipe = Pipe::new(1, 0, 2);
        ctx.create_pipeline(&mut pipe).unwrap();
        ctx.init_module(&mut mcfg, &pipe).unwrap();
        assert_eq!(mcfg.state, ModuleState::InitDone);

        let inst = ctx.transport().instance(2, 3).unwrap();
        assert_eq!(inst.ppl_id, 1);
        assert_eq!(inst.core_id, 1);
        assert_eq!(inst.blob.len(), skl_chip::abi::BASE_CFG_SIZE);

        ctx.uninit_module(&mut mcfg).unwrap();
        assert_eq!(mcfg.state, ModuleState::Uninit);
        assert_eq!(ctx.transport().instance_count(), 0);
    }

    #[test]
    fn test_failed_init_keeps_state() {
        let mut ctx = ctx();
        let mut mcfg = mixer(0);
        let mut pipe = Pipe::new(1, 0, 2);
        ctx.create_pipeline(&mut pipe).unwrap();
        ctx.transport_mut().fail_next(Opcode::InitInstance, hdr::status::OUT_OF_MEMORY);
        assert!(ctx.init_module(&mut mcfg, &pipe).is_err());
        assert_eq!(mcfg.state, ModuleState::Uninit);
    }

    #[test]
    fn test_probe_module_lives_outside_pipelines() {
        let mut ctx = ctx();
        ctx.probe_config_mut().edma_type = DmaClass::HdaHostInput;
        ctx.probe_config_mut().edma_id = 4;
        let id = ModuleInstanceId {
            module_id: 9,
            instance_id: 2,
            pvt_id: 0,
        };
        let mut probe = ModuleConfig::new(id, ModuleType::Probe, module(), 0);
        ctx.init_probe_module(&mut probe, &Pipe::default()).unwrap();

        let inst = ctx.transport().instance(9, 2).unwrap();
        assert_eq!(inst.ppl_id, hdr::PPL_INSTANCE_NONE);
        assert_eq!(ctx.probe_config().edma_buffsize, 4096);
        // probe gateway follows the base config
        let node = u32::from_le_bytes(inst.blob[40..44].try_into().unwrap());
        assert_eq!(node, 0x0104);

        ctx.uninit_probe_module(&mut probe).unwrap();
        assert!(ctx.transport().instance(9, 2).is_none());
    }

    #[test]
    fn test_module_params_round_trip_through_firmware() {
        let mut ctx = ctx();
        let mcfg = mixer(1);
        ctx.set_module_params(&mcfg, 10, &[1, 2, 3, 4]).unwrap();
        assert_eq!(&ctx.transport().param(2, 1, 10).unwrap()[..], &[1, 2, 3, 4]);
        let read = ctx.get_module_params(&mcfg, 10, 6).unwrap();
        assert_eq!(&read[..], &[1, 2, 3, 4, 0, 0]);
    }
}
