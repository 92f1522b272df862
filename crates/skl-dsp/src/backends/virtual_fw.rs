// SPDX-License-Identifier: GPL-2.0-only

//! Virtual firmware backend
//!
//! Implements [`IpcTransport`] by emulating the firmware's bookkeeping in
//! host memory. No DSP, no mailbox, no interrupts: every request is decoded
//! from its header words and applied to an in-memory model of pipelines,
//! module instances and queue bindings, then answered with the status the
//! real firmware would return.
//!
//! ```text
//! Request            Checked                                       Failure status
//! ────────────────── ───────────────────────────────────────────── ──────────────────────
//! CREATE_PPL         id not in use                                 RESOURCE_ID_EXISTS
//! SET_PPL_STATE      pipeline exists; RUNNING only from PAUSED     INVALID_RESOURCE_ID/STATE
//! DELETE_PPL         pipeline exists (drops its instances)         INVALID_RESOURCE_ID
//! INIT_INSTANCE      owning pipeline exists; instance not in use   INVALID_RESOURCE_ID/EXISTS
//! DELETE_INSTANCE    instance exists                               INVALID_RESOURCE_ID
//! BIND               both ends exist; neither queue occupied       INVALID_RESOURCE_ID/STATE
//! UNBIND             binding exists                                INVALID_RESOURCE_ID
//! LARGE_CONFIG_SET   blocks arrive in order                        INVALID_PARAM
//! LARGE_CONFIG_GET   always; unknown parameters read as empty
//! ```
//!
//! Every received request is kept in a message log, and failures can be
//! injected per opcode to exercise error paths.

use crate::error::Result;
use crate::ipc::{IpcMessage, IpcReply, IpcTransport, Opcode};
use bytes::{Bytes, BytesMut};
use skl_chip::ipc::{self as hdr, ppl_state, status};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, trace};

/// Firmware address of a module instance: `(module id, instance id)`.
pub type InstanceKey = (u16, u8);

/// One firmware queue binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    /// Source instance
    pub src: InstanceKey,
    /// Source output queue
    pub src_queue: u8,
    /// Destination instance
    pub dst: InstanceKey,
    /// Destination input queue
    pub dst_queue: u8,
}

/// Module instance as seen by the firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualInstance {
    /// Owning pipeline, [`hdr::PPL_INSTANCE_NONE`] for probes
    pub ppl_id: u8,
    /// DSP core
    pub core_id: u8,
    /// INIT payload
    pub blob: Bytes,
}

#[derive(Debug)]
struct Reassembly {
    key: (u16, u8, u8),
    total: usize,
    data: BytesMut,
}

/// In-memory firmware model.
#[derive(Debug, Default)]
pub struct VirtualFirmware {
    pipelines: BTreeMap<u8, u32>,
    instances: BTreeMap<InstanceKey, VirtualInstance>,
    bindings: Vec<Binding>,
    params: BTreeMap<(u16, u8, u8), Bytes>,
    pending: Option<Reassembly>,
    log: Vec<IpcMessage>,
    failures: VecDeque<(Opcode, u32)>,
}

impl VirtualFirmware {
    /// Empty firmware: no pipelines, no instances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next request of `opcode` with `status`.
    ///
    /// Injections queue up and are consumed in order.
    pub fn fail_next(&mut self, opcode: Opcode, status: u32) {
        self.failures.push_back((opcode, status));
    }

    /// Every request received so far.
    pub fn log(&self) -> &[IpcMessage] {
        &self.log
    }

    /// Forget the message log.
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Requests of one kind, in arrival order.
    pub fn requests(&self, opcode: Opcode) -> Vec<&IpcMessage> {
        self.log.iter().filter(|m| m.opcode == opcode).collect()
    }

    /// States requested through SET_PPL_STATE, in arrival order.
    pub fn pipeline_state_requests(&self) -> Vec<u32> {
        self.log
            .iter()
            .filter(|m| m.opcode == Opcode::SetPipelineState)
            .map(|m| m.field(hdr::PPL_STATE_SHIFT, hdr::PPL_STATE_MASK))
            .collect()
    }

    /// Whether pipeline `ppl_id` exists.
    pub fn has_pipeline(&self, ppl_id: u8) -> bool {
        self.pipelines.contains_key(&ppl_id)
    }

    /// Firmware state of pipeline `ppl_id` (`skl_chip::ipc::ppl_state`).
    pub fn pipeline_state(&self, ppl_id: u8) -> Option<u32> {
        self.pipelines.get(&ppl_id).copied()
    }

    /// Number of live pipelines.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Instance `(module_id, instance_id)`, if initialised.
    pub fn instance(&self, module_id: u16, instance_id: u8) -> Option<&VirtualInstance> {
        self.instances.get(&(module_id, instance_id))
    }

    /// Number of live instances.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Live bindings.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Last value written to a module parameter.
    pub fn param(&self, module_id: u16, instance_id: u8, param_id: u8) -> Option<&Bytes> {
        self.params.get(&(module_id, instance_id, param_id))
    }

    /// Preload a module parameter returned by LARGE_CONFIG_GET.
    pub fn set_param(
        &mut self,
        module_id: u16,
        instance_id: u8,
        param_id: u8,
        data: impl Into<Bytes>,
    ) {
        self.params.insert((module_id, instance_id, param_id), data.into());
    }

    fn take_failure(&mut self, opcode: Opcode) -> Option<u32> {
        let pos = self.failures.iter().position(|(op, _)| *op == opcode)?;
        self.failures.remove(pos).map(|(_, status)| status)
    }

    fn dispatch(&mut self, msg: &IpcMessage) -> IpcReply {
        let module_key = || -> InstanceKey {
            (
                msg.field(hdr::MOD_ID_SHIFT, hdr::MOD_ID_MASK) as u16,
                msg.field(hdr::MOD_INSTANCE_ID_SHIFT, hdr::MOD_INSTANCE_ID_MASK) as u8,
            )
        };
        let ppl_id = msg.field(hdr::PPL_INSTANCE_ID_SHIFT, hdr::PPL_INSTANCE_ID_MASK) as u8;

        match msg.opcode {
            Opcode::CreatePipeline => {
                if self.pipelines.contains_key(&ppl_id) {
                    return IpcReply::error(status::RESOURCE_ID_EXISTS);
                }
                self.pipelines.insert(ppl_id, ppl_state::RESET);
                IpcReply::ok()
            }
            Opcode::SetPipelineState => {
                let requested = msg.field(hdr::PPL_STATE_SHIFT, hdr::PPL_STATE_MASK);
                let Some(current) = self.pipelines.get_mut(&ppl_id) else {
                    return IpcReply::error(status::INVALID_RESOURCE_ID);
                };
                let allowed = match requested {
                    ppl_state::RUNNING => {
                        *current == ppl_state::PAUSED || *current == ppl_state::RUNNING
                    }
                    ppl_state::PAUSED => true,
                    ppl_state::RESET => *current != ppl_state::RUNNING,
                    _ => false,
                };
                if !allowed {
                    return IpcReply::error(status::INVALID_RESOURCE_STATE);
                }
                *current = requested;
                IpcReply::ok()
            }
            Opcode::DeletePipeline => {
                if self.pipelines.remove(&ppl_id).is_none() {
                    return IpcReply::error(status::INVALID_RESOURCE_ID);
                }
                let dropped: Vec<InstanceKey> = self
                    .instances
                    .iter()
                    .filter(|(_, inst)| inst.ppl_id == ppl_id)
                    .map(|(key, _)| *key)
                    .collect();
                for key in &dropped {
                    self.instances.remove(key);
                }
                self.bindings
                    .retain(|b| !dropped.contains(&b.src) && !dropped.contains(&b.dst));
                IpcReply::ok()
            }
            Opcode::InitInstance => {
                let key = module_key();
                let ppl = msg
                    .ext_field(hdr::INIT_PPL_INSTANCE_ID_SHIFT, hdr::INIT_PPL_INSTANCE_ID_MASK)
                    as u8;
                let dwords = msg
                    .ext_field(hdr::INIT_PARAM_BLOCK_SIZE_SHIFT, hdr::INIT_PARAM_BLOCK_SIZE_MASK);
                if ppl != hdr::PPL_INSTANCE_NONE && !self.pipelines.contains_key(&ppl) {
                    return IpcReply::error(status::INVALID_RESOURCE_ID);
                }
                if dwords as usize * 4 != msg.payload.len() {
                    return IpcReply::error(status::INVALID_PARAM);
                }
                if self.instances.contains_key(&key) {
                    return IpcReply::error(status::RESOURCE_ID_EXISTS);
                }
                self.instances.insert(
                    key,
                    VirtualInstance {
                        ppl_id: ppl,
                        core_id: msg.ext_field(hdr::INIT_CORE_ID_SHIFT, hdr::INIT_CORE_ID_MASK)
                            as u8,
                        blob: msg.payload.clone(),
                    },
                );
                IpcReply::ok()
            }
            Opcode::DeleteInstance => {
                let key = module_key();
                if self.instances.remove(&key).is_none() {
                    return IpcReply::error(status::INVALID_RESOURCE_ID);
                }
                self.bindings.retain(|b| b.src != key && b.dst != key);
                IpcReply::ok()
            }
            Opcode::Bind | Opcode::Unbind => {
                let ext = |shift, mask| msg.ext_field(shift, mask);
                let binding = Binding {
                    src: module_key(),
                    src_queue: ext(hdr::BIND_SRC_QUEUE_SHIFT, hdr::BIND_SRC_QUEUE_MASK) as u8,
                    dst: (
                        ext(hdr::BIND_DST_MOD_ID_SHIFT, hdr::BIND_DST_MOD_ID_MASK) as u16,
                        ext(hdr::BIND_DST_INSTANCE_ID_SHIFT, hdr::BIND_DST_INSTANCE_ID_MASK) as u8,
                    ),
                    dst_queue: ext(hdr::BIND_DST_QUEUE_SHIFT, hdr::BIND_DST_QUEUE_MASK) as u8,
                };
                if msg.opcode == Opcode::Unbind {
                    let before = self.bindings.len();
                    self.bindings.retain(|b| *b != binding);
                    return if self.bindings.len() == before {
                        IpcReply::error(status::INVALID_RESOURCE_ID)
                    } else {
                        IpcReply::ok()
                    };
                }
                if !self.instances.contains_key(&binding.src)
                    || !self.instances.contains_key(&binding.dst)
                {
                    return IpcReply::error(status::INVALID_RESOURCE_ID);
                }
                let occupied = self.bindings.iter().any(|b| {
                    (b.src == binding.src && b.src_queue == binding.src_queue)
                        || (b.dst == binding.dst && b.dst_queue == binding.dst_queue)
                });
                if occupied {
                    return IpcReply::error(status::INVALID_RESOURCE_STATE);
                }
                self.bindings.push(binding);
                IpcReply::ok()
            }
            Opcode::LargeConfigSet => self.large_config_set(msg, module_key()),
            Opcode::LargeConfigGet => {
                let (module_id, instance_id) = module_key();
                let param_id = msg.ext_field(hdr::LC_PARAM_ID_SHIFT, hdr::LC_PARAM_ID_MASK) as u8;
                let data = self
                    .params
                    .get(&(module_id, instance_id, param_id))
                    .cloned()
                    .unwrap_or_default();
                IpcReply::with_payload(data)
            }
        }
    }

    fn large_config_set(
        &mut self,
        msg: &IpcMessage,
        (module_id, instance_id): InstanceKey,
    ) -> IpcReply {
        let key = (
            module_id,
            instance_id,
            msg.ext_field(hdr::LC_PARAM_ID_SHIFT, hdr::LC_PARAM_ID_MASK) as u8,
        );
        let off_size =
            msg.ext_field(hdr::LC_DATA_OFF_SIZE_SHIFT, hdr::LC_DATA_OFF_SIZE_MASK) as usize;
        let init = msg.ext_field(hdr::LC_INIT_BLOCK_SHIFT, hdr::LC_INIT_BLOCK_MASK) == 1;
        let last = msg.ext_field(hdr::LC_FINAL_BLOCK_SHIFT, hdr::LC_FINAL_BLOCK_MASK) == 1;

        if init {
            self.pending = Some(Reassembly {
                key,
                total: off_size,
                data: BytesMut::with_capacity(off_size),
            });
        }
        let Some(pending) = self.pending.as_mut() else {
            return IpcReply::error(status::INVALID_PARAM);
        };
        if pending.key != key || (!init && off_size != pending.data.len()) {
            self.pending = None;
            return IpcReply::error(status::INVALID_PARAM);
        }
        pending.data.extend_from_slice(&msg.payload);
        if pending.data.len() > pending.total {
            self.pending = None;
            return IpcReply::error(status::INVALID_PARAM);
        }
        if last {
            if let Some(done) = self.pending.take() {
                trace!("virtual fw: param {:?} = {} bytes", done.key, done.data.len());
                self.params.insert(done.key, done.data.freeze());
            }
        }
        IpcReply::ok()
    }
}

impl IpcTransport for VirtualFirmware {
    fn send(&mut self, msg: IpcMessage) -> Result<IpcReply> {
        let reply = match self.take_failure(msg.opcode) {
            Some(status) => {
                debug!("virtual fw: injected failure {status} for {}", msg.opcode.name());
                IpcReply::error(status)
            }
            None => self.dispatch(&msg),
        };
        trace!("virtual fw: {} -> status {}", msg.opcode.name(), reply.status);
        self.log.push(msg);
        Ok(reply)
    }
}
