//! IPC client facade
//!
//! Logical request/response calls on top of an [`IpcTransport`]. Each call
//! builds the (primary, extension) header words from the `skl-chip` bit
//! layout, sends them with an optional payload, and turns a non-zero
//! firmware status into [`DspError::Firmware`].
//!
//! The facade never retries; retry and timeout policy belong to the
//! transport.

use crate::error::{DspError, Result};
use bytes::{Bytes, BytesMut};
use skl_chip::ipc::{self as hdr, put, status};
use std::fmt::Debug;
use tracing::{debug, trace};

/// Logical IPC request kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Module parameter write, possibly fragmented.
    LargeConfigSet,
    /// Module parameter read.
    LargeConfigGet,
    /// Create a module instance inside a pipeline.
    InitInstance,
    /// Destroy a module instance.
    DeleteInstance,
    /// Connect an output queue to an input queue.
    Bind,
    /// Disconnect a queue pair.
    Unbind,
    /// Create a pipeline.
    CreatePipeline,
    /// Delete a pipeline.
    DeletePipeline,
    /// Move a pipeline to a new state.
    SetPipelineState,
}

impl Opcode {
    /// Firmware message type number carried in the primary header.
    pub const fn msg_type(self) -> u32 {
        match self {
            Self::LargeConfigSet => hdr::module::LARGE_CONFIG_SET,
            Self::LargeConfigGet => hdr::module::LARGE_CONFIG_GET,
            Self::InitInstance => hdr::module::INIT_INSTANCE,
            Self::DeleteInstance => hdr::module::DELETE_INSTANCE,
            Self::Bind => hdr::module::BIND,
            Self::Unbind => hdr::module::UNBIND,
            Self::CreatePipeline => hdr::glb::CREATE_PPL,
            Self::DeletePipeline => hdr::glb::DELETE_PPL,
            Self::SetPipelineState => hdr::glb::SET_PPL_STATE,
        }
    }

    /// Whether the message addresses a module (as opposed to the firmware).
    pub const fn is_module_msg(self) -> bool {
        !matches!(
            self,
            Self::CreatePipeline | Self::DeletePipeline | Self::SetPipelineState
        )
    }

    /// Decode the opcode of a primary header word.
    pub fn from_primary(primary: u32) -> Option<Self> {
        let ty = hdr::get(primary, hdr::TYPE_SHIFT, hdr::TYPE_MASK);
        let module =
            hdr::get(primary, hdr::TARGET_SHIFT, hdr::TARGET_MASK) == hdr::target::MODULE_MSG;
        [
            Self::LargeConfigSet,
            Self::LargeConfigGet,
            Self::InitInstance,
            Self::DeleteInstance,
            Self::Bind,
            Self::Unbind,
            Self::CreatePipeline,
            Self::DeletePipeline,
            Self::SetPipelineState,
        ]
        .into_iter()
        .find(|op| op.is_module_msg() == module && op.msg_type() == ty)
    }

    /// Short request name used in logs and errors.
    pub const fn name(self) -> &'static str {
        match self {
            Self::LargeConfigSet => "LARGE_CONFIG_SET",
            Self::LargeConfigGet => "LARGE_CONFIG_GET",
            Self::InitInstance => "INIT_INSTANCE",
            Self::DeleteInstance => "DELETE_INSTANCE",
            Self::Bind => "BIND",
            Self::Unbind => "UNBIND",
            Self::CreatePipeline => "CREATE_PIPELINE",
            Self::DeletePipeline => "DELETE_PIPELINE",
            Self::SetPipelineState => "SET_PIPELINE_STATE",
        }
    }
}

/// One request as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpcMessage {
    /// Logical request kind (also encoded in `primary`).
    pub opcode: Opcode,
    /// Primary header word.
    pub primary: u32,
    /// Extension header word.
    pub extension: u32,
    /// Mailbox payload.
    pub payload: Bytes,
}

impl IpcMessage {
    fn new(opcode: Opcode, fields: u32, extension: u32, payload: Bytes) -> Self {
        let target = if opcode.is_module_msg() {
            hdr::target::MODULE_MSG
        } else {
            hdr::target::FW_GEN_MSG
        };
        let primary = fields
            | put(opcode.msg_type(), hdr::TYPE_SHIFT, hdr::TYPE_MASK)
            | put(hdr::dir::REQUEST, hdr::DIR_SHIFT, hdr::DIR_MASK)
            | put(target, hdr::TARGET_SHIFT, hdr::TARGET_MASK);
        Self {
            opcode,
            primary,
            extension,
            payload,
        }
    }

    /// Primary header field.
    pub const fn field(&self, shift: u32, mask: u32) -> u32 {
        hdr::get(self.primary, shift, mask)
    }

    /// Extension header field.
    pub const fn ext_field(&self, shift: u32, mask: u32) -> u32 {
        hdr::get(self.extension, shift, mask)
    }
}

/// Firmware reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpcReply {
    /// Firmware status, [`status::SUCCESS`] on success.
    pub status: u32,
    /// Inbox payload (large-config reads).
    pub payload: Bytes,
}

impl IpcReply {
    /// Successful reply without payload.
    pub fn ok() -> Self {
        Self::default()
    }

    /// Successful reply carrying data.
    pub fn with_payload(payload: impl Into<Bytes>) -> Self {
        Self {
            status: status::SUCCESS,
            payload: payload.into(),
        }
    }

    /// Error reply.
    pub fn error(status: u32) -> Self {
        Self {
            status,
            payload: Bytes::new(),
        }
    }
}

/// Raw mailbox transport.
///
/// `send` blocks until the firmware has replied or the transport gave up.
/// Transport-level failures (timeouts, dead DSP) are returned as
/// [`DspError::Transport`]; a received reply is returned as-is even when its
/// status is an error.
pub trait IpcTransport: Debug + Send {
    /// Send one request and wait for its reply.
    ///
    /// # Errors
    ///
    /// Returns error if no reply could be obtained.
    fn send(&mut self, msg: IpcMessage) -> Result<IpcReply>;
}

impl<T: IpcTransport + ?Sized> IpcTransport for Box<T> {
    fn send(&mut self, msg: IpcMessage) -> Result<IpcReply> {
        (**self).send(msg)
    }
}

/// INIT_INSTANCE parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitInstanceMsg {
    /// Firmware module id.
    pub module_id: u16,
    /// Instance id (private id for pipeline members).
    pub instance_id: u8,
    /// Owning pipeline, [`hdr::PPL_INSTANCE_NONE`] for probes.
    pub ppl_instance_id: u8,
    /// DSP core.
    pub core_id: u8,
    /// Scheduling domain (0 = LL, 1 = DP).
    pub domain: u8,
}

/// BIND / UNBIND parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindUnbindMsg {
    /// Source module id.
    pub module_id: u16,
    /// Source instance id.
    pub instance_id: u8,
    /// Destination module id.
    pub dst_module_id: u16,
    /// Destination instance id.
    pub dst_instance_id: u8,
    /// Source output queue.
    pub src_queue: u8,
    /// Destination input queue.
    pub dst_queue: u8,
    /// `true` to bind, `false` to unbind.
    pub bind: bool,
}

/// LARGE_CONFIG addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LargeConfigMsg {
    /// Target module id.
    pub module_id: u16,
    /// Target instance id.
    pub instance_id: u8,
    /// Parameter id.
    pub param_id: u8,
}

impl LargeConfigMsg {
    /// Base firmware parameter.
    pub const fn base_fw(param_id: u32) -> Self {
        Self {
            module_id: hdr::BASE_FW_MODULE_ID,
            instance_id: hdr::BASE_FW_INSTANCE_ID,
            param_id: param_id as u8,
        }
    }
}

/// Synchronous IPC client.
#[derive(Debug)]
pub struct IpcClient<T: IpcTransport> {
    transport: T,
    mailbox_size: usize,
}

impl<T: IpcTransport> IpcClient<T> {
    /// Wrap a transport using the default mailbox window.
    pub fn new(transport: T) -> Self {
        Self::with_mailbox_size(transport, hdr::MAILBOX_SIZE)
    }

    /// Wrap a transport with an explicit mailbox window size.
    pub fn with_mailbox_size(transport: T, mailbox_size: usize) -> Self {
        Self {
            transport,
            mailbox_size: mailbox_size.max(4),
        }
    }

    /// Underlying transport.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Mailbox window size used to fragment large payloads.
    pub const fn mailbox_size(&self) -> usize {
        self.mailbox_size
    }

    fn exchange(&mut self, msg: IpcMessage) -> Result<IpcReply> {
        let opcode = msg.opcode;
        trace!(
            "ipc tx {}: primary={:#010x} ext={:#010x} payload={}B",
            opcode.name(),
            msg.primary,
            msg.extension,
            msg.payload.len()
        );
        let reply = self.transport.send(msg)?;
        if reply.status != status::SUCCESS {
            debug!(
                "ipc {} failed: status {} ({})",
                opcode.name(),
                reply.status,
                status::describe(reply.status)
            );
            return Err(DspError::firmware(opcode.name(), reply.status));
        }
        Ok(reply)
    }

    /// Create a pipeline.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the pipeline.
    pub fn create_pipeline(
        &mut self,
        memory_pages: u16,
        priority: u8,
        ppl_id: u8,
        lp_mode: bool,
    ) -> Result<()> {
        debug!("create pipeline {ppl_id}: pages={memory_pages} priority={priority} lp={lp_mode}");
        let pages = checked(
            "memory pages",
            u32::from(memory_pages),
            hdr::PPL_MEM_SIZE_SHIFT,
            hdr::PPL_MEM_SIZE_MASK,
        )?;
        let priority =
            checked("priority", u32::from(priority), hdr::PPL_TYPE_SHIFT, hdr::PPL_TYPE_MASK)?;
        let fields = pages | priority | ppl_field(ppl_id)?;
        let ext = put(u32::from(lp_mode), hdr::PPL_LP_MODE_SHIFT, hdr::PPL_LP_MODE_MASK);
        self.exchange(IpcMessage::new(Opcode::CreatePipeline, fields, ext, Bytes::new()))
            .map(drop)
    }

    /// Delete a pipeline.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the request.
    pub fn delete_pipeline(&mut self, ppl_id: u8) -> Result<()> {
        debug!("delete pipeline {ppl_id}");
        let fields = ppl_field(ppl_id)?;
        self.exchange(IpcMessage::new(Opcode::DeletePipeline, fields, 0, Bytes::new()))
            .map(drop)
    }

    /// Request a pipeline state (`skl_chip::ipc::ppl_state`).
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the transition.
    pub fn set_pipeline_state(&mut self, ppl_id: u8, state: u32) -> Result<()> {
        debug!("set pipeline {ppl_id} state {state}");
        let fields = ppl_field(ppl_id)?
            | checked("pipeline state", state, hdr::PPL_STATE_SHIFT, hdr::PPL_STATE_MASK)?;
        self.exchange(IpcMessage::new(Opcode::SetPipelineState, fields, 0, Bytes::new()))
            .map(drop)
    }

    /// Create a module instance with its configuration blob.
    ///
    /// # Errors
    ///
    /// Returns error if the blob is not dword sized or the firmware rejects it.
    pub fn init_instance(&mut self, msg: &InitInstanceMsg, param: Bytes) -> Result<()> {
        if param.len() % 4 != 0 {
            return Err(DspError::invalid_argument(format!(
                "init blob of {} bytes is not dword aligned",
                param.len()
            )));
        }
        let dwords = u32::try_from(param.len() / 4)
            .ok()
            .filter(|d| *d <= hdr::INIT_PARAM_BLOCK_SIZE_MASK)
            .ok_or_else(|| DspError::invalid_argument("init blob too large"))?;
        debug!(
            "init instance {}:{} ppl={} core={} domain={} blob={}B",
            msg.module_id,
            msg.instance_id,
            msg.ppl_instance_id,
            msg.core_id,
            msg.domain,
            param.len()
        );
        let fields = module_fields(msg.module_id, msg.instance_id)?;
        let ext = put(dwords, hdr::INIT_PARAM_BLOCK_SIZE_SHIFT, hdr::INIT_PARAM_BLOCK_SIZE_MASK)
            | checked(
                "pipeline id",
                u32::from(msg.ppl_instance_id),
                hdr::INIT_PPL_INSTANCE_ID_SHIFT,
                hdr::INIT_PPL_INSTANCE_ID_MASK,
            )?
            | checked(
                "core id",
                u32::from(msg.core_id),
                hdr::INIT_CORE_ID_SHIFT,
                hdr::INIT_CORE_ID_MASK,
            )?
            | checked(
                "domain",
                u32::from(msg.domain),
                hdr::INIT_DOMAIN_SHIFT,
                hdr::INIT_DOMAIN_MASK,
            )?;
        self.exchange(IpcMessage::new(Opcode::InitInstance, fields, ext, param))
            .map(drop)
    }

    /// Destroy a module instance.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the request.
    pub fn delete_instance(&mut self, module_id: u16, instance_id: u8) -> Result<()> {
        debug!("delete instance {module_id}:{instance_id}");
        let fields = module_fields(module_id, instance_id)?;
        self.exchange(IpcMessage::new(Opcode::DeleteInstance, fields, 0, Bytes::new()))
            .map(drop)
    }

    /// Bind or unbind a queue pair.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the request.
    pub fn bind_unbind(&mut self, msg: &BindUnbindMsg) -> Result<()> {
        let opcode = if msg.bind { Opcode::Bind } else { Opcode::Unbind };
        debug!(
            "{} {}:{}[{}] -> {}:{}[{}]",
            opcode.name(),
            msg.module_id,
            msg.instance_id,
            msg.src_queue,
            msg.dst_module_id,
            msg.dst_instance_id,
            msg.dst_queue
        );
        let fields = module_fields(msg.module_id, msg.instance_id)?;
        let dst_module = checked(
            "destination module id",
            u32::from(msg.dst_module_id),
            hdr::BIND_DST_MOD_ID_SHIFT,
            hdr::BIND_DST_MOD_ID_MASK,
        )?;
        let dst_instance = checked(
            "destination instance id",
            u32::from(msg.dst_instance_id),
            hdr::BIND_DST_INSTANCE_ID_SHIFT,
            hdr::BIND_DST_INSTANCE_ID_MASK,
        )?;
        let dst_queue = checked(
            "destination queue",
            u32::from(msg.dst_queue),
            hdr::BIND_DST_QUEUE_SHIFT,
            hdr::BIND_DST_QUEUE_MASK,
        )?;
        let src_queue = checked(
            "source queue",
            u32::from(msg.src_queue),
            hdr::BIND_SRC_QUEUE_SHIFT,
            hdr::BIND_SRC_QUEUE_MASK,
        )?;
        let ext = dst_module | dst_instance | dst_queue | src_queue;
        self.exchange(IpcMessage::new(opcode, fields, ext, Bytes::new()))
            .map(drop)
    }

    /// Write a module parameter.
    ///
    /// Payloads larger than the mailbox window are sent as a block sequence:
    /// the first block is flagged *init* and carries the total size, later
    /// blocks carry their byte offset, the last block is flagged *final*.
    ///
    /// # Errors
    ///
    /// Returns error on the first rejected block; earlier blocks are not
    /// rolled back.
    pub fn set_large_config(&mut self, msg: &LargeConfigMsg, data: &[u8]) -> Result<()> {
        let total = u32::try_from(data.len())
            .ok()
            .filter(|t| *t <= hdr::LC_DATA_OFF_SIZE_MASK)
            .ok_or_else(|| DspError::invalid_argument("large config payload too large"))?;
        debug!(
            "large config set {}:{} param {} ({} bytes)",
            msg.module_id, msg.instance_id, msg.param_id, total
        );
        let fields = module_fields(msg.module_id, msg.instance_id)?;
        let base_ext = put(u32::from(msg.param_id), hdr::LC_PARAM_ID_SHIFT, hdr::LC_PARAM_ID_MASK);

        let mut offset = 0usize;
        loop {
            let remaining = data.len() - offset;
            let chunk = remaining.min(self.mailbox_size);
            let first = offset == 0;
            let last = chunk == remaining;
            // The init block announces the total size; later blocks their offset.
            let off_size = if first { total } else { offset as u32 };
            let ext = base_ext
                | put(off_size, hdr::LC_DATA_OFF_SIZE_SHIFT, hdr::LC_DATA_OFF_SIZE_MASK)
                | put(u32::from(first), hdr::LC_INIT_BLOCK_SHIFT, hdr::LC_INIT_BLOCK_MASK)
                | put(u32::from(last), hdr::LC_FINAL_BLOCK_SHIFT, hdr::LC_FINAL_BLOCK_MASK);
            let payload = Bytes::copy_from_slice(&data[offset..offset + chunk]);
            self.exchange(IpcMessage::new(Opcode::LargeConfigSet, fields, ext, payload))?;
            offset += chunk;
            if last {
                return Ok(());
            }
        }
    }

    /// Read a module parameter of at most `size` bytes.
    ///
    /// `request` is sent as the read payload (some parameters take a
    /// selector).
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the read.
    pub fn get_large_config(
        &mut self,
        msg: &LargeConfigMsg,
        request: &[u8],
        size: usize,
    ) -> Result<Bytes> {
        let size32 = u32::try_from(size)
            .ok()
            .filter(|s| *s <= hdr::LC_DATA_OFF_SIZE_MASK)
            .ok_or_else(|| DspError::invalid_argument("large config read too large"))?;
        debug!(
            "large config get {}:{} param {} ({} bytes)",
            msg.module_id, msg.instance_id, msg.param_id, size
        );
        let fields = module_fields(msg.module_id, msg.instance_id)?;
        let ext = put(size32, hdr::LC_DATA_OFF_SIZE_SHIFT, hdr::LC_DATA_OFF_SIZE_MASK)
            | put(u32::from(msg.param_id), hdr::LC_PARAM_ID_SHIFT, hdr::LC_PARAM_ID_MASK)
            | put(1, hdr::LC_INIT_BLOCK_SHIFT, hdr::LC_INIT_BLOCK_MASK)
            | put(1, hdr::LC_FINAL_BLOCK_SHIFT, hdr::LC_FINAL_BLOCK_MASK);
        let reply = self.exchange(IpcMessage::new(
            Opcode::LargeConfigGet,
            fields,
            ext,
            Bytes::copy_from_slice(request),
        ))?;
        let mut data = BytesMut::from(&reply.payload[..reply.payload.len().min(size)]);
        data.resize(size, 0);
        Ok(data.freeze())
    }
}

/// Place a caller-supplied `value` into a header field, refusing values
/// wider than the field.
fn checked(name: &'static str, value: u32, shift: u32, mask: u32) -> Result<u32> {
    if value & !mask != 0 {
        return Err(DspError::invalid_argument(format!(
            "{name} {value:#x} does not fit field mask {mask:#x}"
        )));
    }
    Ok(put(value, shift, mask))
}

fn ppl_field(ppl_id: u8) -> Result<u32> {
    checked(
        "pipeline id",
        u32::from(ppl_id),
        hdr::PPL_INSTANCE_ID_SHIFT,
        hdr::PPL_INSTANCE_ID_MASK,
    )
}

fn module_fields(module_id: u16, instance_id: u8) -> Result<u32> {
    let module = checked("module id", u32::from(module_id), hdr::MOD_ID_SHIFT, hdr::MOD_ID_MASK)?;
    let instance = checked(
        "instance id",
        u32::from(instance_id),
        hdr::MOD_INSTANCE_ID_SHIFT,
        hdr::MOD_INSTANCE_ID_MASK,
    )?;
    Ok(module | instance)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records requests and answers with a scripted status.
    #[derive(Debug, Default)]
    struct Recorder {
        sent: Vec<IpcMessage>,
        fail_with: Option<u32>,
    }

    impl IpcTransport for Recorder {
        fn send(&mut self, msg: IpcMessage) -> Result<IpcReply> {
            let reply = match (msg.opcode, self.fail_with) {
                (_, Some(code)) => IpcReply::error(code),
                (Opcode::LargeConfigGet, None) => IpcReply::with_payload(vec![0xAB; 3]),
                _ => IpcReply::ok(),
            };
            self.sent.push(msg);
            Ok(reply)
        }
    }

    #[test]
    fn test_bind_header_layout() {
        let mut ipc = IpcClient::new(Recorder::default());
        ipc.bind_unbind(&BindUnbindMsg {
            module_id: 3,
            instance_id: 1,
            dst_module_id: 4,
            dst_instance_id: 2,
            src_queue: 1,
            dst_queue: 0,
            bind: true,
        })
        .unwrap();

        let msg = &ipc.transport().sent[0];
        assert_eq!(msg.opcode, Opcode::Bind);
        assert_eq!(msg.field(hdr::MOD_ID_SHIFT, hdr::MOD_ID_MASK), 3);
        assert_eq!(msg.field(hdr::TARGET_SHIFT, hdr::TARGET_MASK), hdr::target::MODULE_MSG);
        assert_eq!(msg.ext_field(hdr::BIND_DST_MOD_ID_SHIFT, hdr::BIND_DST_MOD_ID_MASK), 4);
        assert_eq!(msg.ext_field(hdr::BIND_SRC_QUEUE_SHIFT, hdr::BIND_SRC_QUEUE_MASK), 1);
        assert_eq!(Opcode::from_primary(msg.primary), Some(Opcode::Bind));
    }

    #[test]
    fn test_pipeline_messages_target_firmware() {
        let mut ipc = IpcClient::new(Recorder::default());
        ipc.create_pipeline(2, 0, 1, true).unwrap();
        let msg = &ipc.transport().sent[0];
        assert_eq!(msg.field(hdr::TARGET_SHIFT, hdr::TARGET_MASK), hdr::target::FW_GEN_MSG);
        assert_eq!(msg.field(hdr::PPL_MEM_SIZE_SHIFT, hdr::PPL_MEM_SIZE_MASK), 2);
        assert_eq!(msg.field(hdr::PPL_INSTANCE_ID_SHIFT, hdr::PPL_INSTANCE_ID_MASK), 1);
        assert_eq!(msg.ext_field(hdr::PPL_LP_MODE_SHIFT, hdr::PPL_LP_MODE_MASK), 1);
        assert_eq!(Opcode::from_primary(msg.primary), Some(Opcode::CreatePipeline));
    }

    #[test]
    fn test_oversized_fields_are_refused() {
        let mut ipc = IpcClient::new(Recorder::default());
        assert!(matches!(
            ipc.create_pipeline(0x800, 0, 1, false),
            Err(DspError::InvalidArgument { .. })
        ));
        let queue = BindUnbindMsg {
            module_id: 3,
            instance_id: 1,
            dst_module_id: 4,
            dst_instance_id: 2,
            src_queue: 8,
            dst_queue: 0,
            bind: true,
        };
        assert!(matches!(ipc.bind_unbind(&queue), Err(DspError::InvalidArgument { .. })));
        assert!(ipc.transport().sent.is_empty());

        ipc.create_pipeline(0x7FF, 0, 1, false).unwrap();
        let msg = &ipc.transport().sent[0];
        assert_eq!(msg.field(hdr::PPL_MEM_SIZE_SHIFT, hdr::PPL_MEM_SIZE_MASK), 0x7FF);
    }

    #[test]
    fn test_firmware_status_becomes_error() {
        let mut ipc = IpcClient::new(Recorder {
            fail_with: Some(status::INVALID_PARAM),
            ..Recorder::default()
        });
        let err = ipc.delete_pipeline(1).unwrap_err();
        assert_eq!(err.firmware_status(), Some(status::INVALID_PARAM));
    }

    #[test]
    fn test_init_instance_counts_dwords() {
        let mut ipc = IpcClient::new(Recorder::default());
        let msg = InitInstanceMsg {
            module_id: 1,
            instance_id: 0,
            ppl_instance_id: 2,
            core_id: 1,
            domain: 0,
        };
        ipc.init_instance(&msg, Bytes::from(vec![0u8; 40])).unwrap();
        let sent = &ipc.transport().sent[0];
        assert_eq!(
            sent.ext_field(hdr::INIT_PARAM_BLOCK_SIZE_SHIFT, hdr::INIT_PARAM_BLOCK_SIZE_MASK),
            10
        );
        assert_eq!(sent.ext_field(hdr::INIT_CORE_ID_SHIFT, hdr::INIT_CORE_ID_MASK), 1);

        assert!(ipc.init_instance(&msg, Bytes::from(vec![0u8; 6])).is_err());
    }

    #[test]
    fn test_large_config_is_fragmented() {
        let mut ipc = IpcClient::with_mailbox_size(Recorder::default(), 8);
        let data: Vec<u8> = (0..20).collect();
        ipc.set_large_config(&LargeConfigMsg::base_fw(6), &data).unwrap();

        let sent = &ipc.transport().sent;
        assert_eq!(sent.len(), 3);
        let off =
            |m: &IpcMessage| m.ext_field(hdr::LC_DATA_OFF_SIZE_SHIFT, hdr::LC_DATA_OFF_SIZE_MASK);
        let init = |m: &IpcMessage| m.ext_field(hdr::LC_INIT_BLOCK_SHIFT, hdr::LC_INIT_BLOCK_MASK);
        let fin = |m: &IpcMessage| m.ext_field(hdr::LC_FINAL_BLOCK_SHIFT, hdr::LC_FINAL_BLOCK_MASK);

        assert_eq!((off(&sent[0]), init(&sent[0]), fin(&sent[0])), (20, 1, 0));
        assert_eq!((off(&sent[1]), init(&sent[1]), fin(&sent[1])), (8, 0, 0));
        assert_eq!((off(&sent[2]), init(&sent[2]), fin(&sent[2])), (16, 0, 1));
        assert_eq!(&sent[2].payload[..], &[16, 17, 18, 19]);
    }

    #[test]
    fn test_small_large_config_is_single_block() {
        let mut ipc = IpcClient::new(Recorder::default());
        ipc.set_large_config(&LargeConfigMsg::base_fw(20), &[0; 8]).unwrap();
        let sent = &ipc.transport().sent[0];
        assert_eq!(sent.ext_field(hdr::LC_INIT_BLOCK_SHIFT, hdr::LC_INIT_BLOCK_MASK), 1);
        assert_eq!(sent.ext_field(hdr::LC_FINAL_BLOCK_SHIFT, hdr::LC_FINAL_BLOCK_MASK), 1);
    }

    #[test]
    fn test_get_large_config_pads_short_reply() {
        let mut ipc = IpcClient::new(Recorder::default());
        let data = ipc.get_large_config(&LargeConfigMsg::base_fw(4), &[], 5).unwrap();
        assert_eq!(&data[..], &[0xAB, 0xAB, 0xAB, 0, 0]);
    }
}
