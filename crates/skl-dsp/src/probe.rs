//! Probe points
//!
//! A probe module taps module queues (extractors) or feeds data into them
//! (injectors). Extracted data leaves through one shared gateway, the
//! extraction DMA, whose node id and buffer size end up in the probe
//! module's INIT payload.
//!
//! Connect/disconnect requests are large-config writes on the probe
//! module instance. Each point is described by a 12-byte record:
//!
//! ```text
//! off  field
//! ──── ─────────────────
//! 0    probe point id
//! 4    purpose
//! 8    DMA node id
//! ```
//!
//! Disconnect only carries the point ids.

use crate::context::DspContext;
use crate::error::Result;
use crate::ipc::{IpcTransport, LargeConfigMsg};
use crate::module::ModuleConfig;
use bytes::{BufMut, BytesMut};
use skl_chip::ipc::param;
use skl_chip::node::{DmaClass, NodeId};
use tracing::{debug, error};

/// Connection state of a probe point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeState {
    /// Extractor not connected
    #[default]
    ExtNone,
    /// Extractor connected
    ExtConnected,
    /// Injector not connected
    InjNone,
    /// Injector connected
    InjConnected,
    /// Injector disconnected after use
    InjDisconnected,
}

/// One probe point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbePoint {
    /// Firmware probe point id (module, instance, queue, direction)
    pub id: u32,
    /// Extraction or injection purpose code
    pub purpose: u32,
    /// Gateway of an injector
    pub node: Option<NodeId>,
    /// Connection state
    pub state: ProbeState,
}

impl ProbePoint {
    /// Unconnected extractor.
    pub fn extractor(id: u32, purpose: u32) -> Self {
        Self {
            id,
            purpose,
            node: None,
            state: ProbeState::ExtNone,
        }
    }

    /// Unconnected injector feeding from `node`.
    pub fn injector(id: u32, purpose: u32, node: NodeId) -> Self {
        Self {
            id,
            purpose,
            node: Some(node),
            state: ProbeState::InjNone,
        }
    }
}

/// Probe configuration of a DSP context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// DMA class of the extraction gateway
    pub edma_type: DmaClass,
    /// DMA index of the extraction gateway
    pub edma_id: u8,
    /// Extraction buffer size, recorded when a probe module blob is built
    pub edma_buffsize: u32,
    /// Extraction points
    pub extractors: Vec<ProbePoint>,
    /// Injection points
    pub injectors: Vec<ProbePoint>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            edma_type: DmaClass::HdaHostInput,
            edma_id: 0,
            edma_buffsize: 0,
            extractors: Vec::new(),
            injectors: Vec::new(),
        }
    }
}

impl ProbeConfig {
    /// Node id of the extraction gateway.
    pub const fn extraction_node(&self) -> NodeId {
        NodeId::new(self.edma_type, self.edma_id)
    }
}

fn probe_msg(mcfg: &ModuleConfig, param_id: u32) -> LargeConfigMsg {
    LargeConfigMsg {
        module_id: mcfg.id.module_id,
        instance_id: mcfg.id.instance_id,
        param_id: param_id as u8,
    }
}

impl<T: IpcTransport> DspContext<T> {
    /// Connect every unconnected extractor in one request.
    ///
    /// No-op when there is nothing to connect.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the request; no point changes
    /// state.
    pub fn probe_point_connect_ext(&mut self, mcfg: &ModuleConfig) -> Result<()> {
        let node = self.probe.extraction_node();
        let pending: Vec<usize> = self
            .probe
            .extractors
            .iter()
            .enumerate()
            .filter(|(_, p)| p.state == ProbeState::ExtNone)
            .map(|(i, _)| i)
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let mut buf = BytesMut::with_capacity(12 * pending.len());
        for &i in &pending {
            let point = &self.probe.extractors[i];
            buf.put_u32_le(point.id);
            buf.put_u32_le(point.purpose);
            buf.put_u32_le(node.raw());
        }
        debug!("probe {}: connect {} extractors", mcfg.id, pending.len());
        self.ipc
            .set_large_config(&probe_msg(mcfg, param::PROBE_CONNECT), &buf)
            .inspect_err(|e| error!("probe {}: extractor connect failed: {e}", mcfg.id))?;

        for i in pending {
            self.probe.extractors[i].state = ProbeState::ExtConnected;
        }
        Ok(())
    }

    /// Disconnect every connected extractor in one request.
    ///
    /// No-op when nothing is connected.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the request; no point changes
    /// state.
    pub fn probe_point_disconnect_ext(&mut self, mcfg: &ModuleConfig) -> Result<()> {
        let connected: Vec<usize> = self
            .probe
            .extractors
            .iter()
            .enumerate()
            .filter(|(_, p)| p.state == ProbeState::ExtConnected)
            .map(|(i, _)| i)
            .collect();
        if connected.is_empty() {
            return Ok(());
        }

        let mut buf = BytesMut::with_capacity(4 * connected.len());
        for &i in &connected {
            buf.put_u32_le(self.probe.extractors[i].id);
        }
        debug!("probe {}: disconnect {} extractors", mcfg.id, connected.len());
        self.ipc
            .set_large_config(&probe_msg(mcfg, param::PROBE_DISCONNECT), &buf)
            .inspect_err(|e| error!("probe {}: extractor disconnect failed: {e}", mcfg.id))?;

        for i in connected {
            self.probe.extractors[i].state = ProbeState::ExtNone;
        }
        Ok(())
    }

    /// Connect injector `index`.
    ///
    /// No-op unless the injector exists and is not connected.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the request.
    pub fn probe_point_connect_inj(&mut self, mcfg: &ModuleConfig, index: usize) -> Result<()> {
        let Some(point) = self.probe.injectors.get(index).copied() else {
            return Ok(());
        };
        if point.state == ProbeState::InjConnected {
            return Ok(());
        }

        let mut buf = BytesMut::with_capacity(12);
        buf.put_u32_le(point.id);
        buf.put_u32_le(point.purpose);
        buf.put_u32_le(point.node.unwrap_or(NodeId::NON_GATEWAY).raw());
        debug!("probe {}: connect injector {index}", mcfg.id);
        self.ipc
            .set_large_config(&probe_msg(mcfg, param::PROBE_CONNECT), &buf)?;
        self.probe.injectors[index].state = ProbeState::InjConnected;
        Ok(())
    }

    /// Disconnect injector `index`.
    ///
    /// No-op unless the injector is connected.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the request.
    pub fn probe_point_disconnect_inj(&mut self, mcfg: &ModuleConfig, index: usize) -> Result<()> {
        let Some(point) = self.probe.injectors.get(index).copied() else {
            return Ok(());
        };
        if point.state != ProbeState::InjConnected {
            return Ok(());
        }

        debug!("probe {}: disconnect injector {index}", mcfg.id);
        self.ipc
            .set_large_config(&probe_msg(mcfg, param::PROBE_DISCONNECT), &point.id.to_le_bytes())
            .inspect_err(|e| error!("probe {}: injector disconnect failed: {e}", mcfg.id))?;
        self.probe.injectors[index].state = ProbeState::InjDisconnected;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::VirtualFirmware;
    use crate::ipc::Opcode;
    use crate::module::{Module, ModuleInstanceId};
    use crate::DspConfig;
    use skl_chip::topology::ModuleType;
    use std::sync::Arc;

    fn probe_module() -> ModuleConfig {
        let id = ModuleInstanceId {
            module_id: 7,
            instance_id: 0,
            pvt_id: 0,
        };
        ModuleConfig::new(id, ModuleType::Probe, Arc::new(Module::default()), 0)
    }

    fn ctx() -> DspContext<VirtualFirmware> {
        let mut ctx = DspContext::new(VirtualFirmware::new(), DspConfig::default());
        ctx.probe_config_mut().extractors = vec![
            ProbePoint::extractor(0x100, 0),
            ProbePoint::extractor(0x200, 0),
            ProbePoint::extractor(0x300, 0),
        ];
        ctx.probe_config_mut().injectors =
            vec![ProbePoint::injector(0x400, 1, NodeId::new(DmaClass::HdaHostOutput, 2))];
        ctx
    }

    fn large_config_payloads(ctx: &DspContext<VirtualFirmware>) -> Vec<Vec<u8>> {
        ctx.transport()
            .log()
            .iter()
            .filter(|m| m.opcode == Opcode::LargeConfigSet)
            .map(|m| m.payload.to_vec())
            .collect()
    }

    #[test]
    fn test_extractor_disconnect_without_connections_is_noop() {
        let mut ctx = ctx();
        ctx.probe_point_disconnect_ext(&probe_module()).unwrap();
        assert!(ctx.transport().log().is_empty());
    }

    #[test]
    fn test_extractors_disconnect_in_one_message() {
        let mut ctx = ctx();
        let mcfg = probe_module();
        ctx.probe_config_mut().extractors[2].state = ProbeState::ExtConnected;
        ctx.probe_point_connect_ext(&mcfg).unwrap();
        assert!(ctx
            .probe_config()
            .extractors
            .iter()
            .all(|p| p.state == ProbeState::ExtConnected));

        ctx.probe_point_disconnect_ext(&mcfg).unwrap();
        let payloads = large_config_payloads(&ctx);
        assert_eq!(payloads.len(), 2);
        // connect only carried the two pending points
        assert_eq!(payloads[0].len(), 24);
        let ids: Vec<u32> = payloads[1]
            .chunks(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(ids, vec![0x100, 0x200, 0x300]);
        assert!(ctx
            .probe_config()
            .extractors
            .iter()
            .all(|p| p.state == ProbeState::ExtNone));
    }

    #[test]
    fn test_failed_disconnect_keeps_points_connected() {
        let mut ctx = ctx();
        let mcfg = probe_module();
        ctx.probe_point_connect_ext(&mcfg).unwrap();
        ctx.transport_mut().fail_next(Opcode::LargeConfigSet, 7);
        assert!(ctx.probe_point_disconnect_ext(&mcfg).is_err());
        assert_eq!(
            ctx.probe_config().extractors[0].state,
            ProbeState::ExtConnected
        );
    }

    #[test]
    fn test_injector_disconnect_marks_disconnected() {
        let mut ctx = ctx();
        let mcfg = probe_module();
        ctx.probe_point_disconnect_inj(&mcfg, 0).unwrap();
        assert!(ctx.transport().log().is_empty());

        ctx.probe_point_connect_inj(&mcfg, 0).unwrap();
        ctx.probe_point_disconnect_inj(&mcfg, 0).unwrap();
        assert_eq!(
            ctx.probe_config().injectors[0].state,
            ProbeState::InjDisconnected
        );
        let last = ctx.transport().log().last().unwrap().clone();
        assert_eq!(&last.payload[..], &0x400u32.to_le_bytes());

        // out of range index
        ctx.probe_point_disconnect_inj(&mcfg, 5).unwrap();
    }
}
