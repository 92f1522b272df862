//! IPC message layout for the Skylake-family firmware.
//!
//! Every message is a pair of 32-bit words written to the host→DSP doorbell
//! registers, plus an optional payload in the outbox mailbox window.
//!
//! ```text
//! primary   31 30 29 28..24        23..16       15..0
//!           BSY TGT DIR TYPE        INSTANCE     MODULE ID          (module msg)
//!           BSY TGT DIR TYPE        PPL INSTANCE PPL TYPE | MEM SIZE (global msg)
//! extension message-specific (see per-message modules below)
//! ```
//!
//! `TGT` selects the message class: 0 = firmware-global (pipeline management),
//! 1 = module message (instances, bind, large config).

/// Place `value` into a bit field.
#[must_use]
pub const fn put(value: u32, shift: u32, mask: u32) -> u32 {
    (value & mask) << shift
}

/// Extract a bit field.
#[must_use]
pub const fn get(word: u32, shift: u32, mask: u32) -> u32 {
    (word >> shift) & mask
}

// ── Primary header, common fields ────────────────────────────────────────────

/// Message type (global or module type number).
pub const TYPE_SHIFT: u32 = 24;
pub const TYPE_MASK: u32 = 0x1F;

/// Direction: 0 = request, 1 = reply.
pub const DIR_SHIFT: u32 = 29;
pub const DIR_MASK: u32 = 0x1;

/// Target: 0 = firmware-global message, 1 = module message.
pub const TARGET_SHIFT: u32 = 30;
pub const TARGET_MASK: u32 = 0x1;

/// Message targets.
pub mod target {
    pub const FW_GEN_MSG: u32 = 0;
    pub const MODULE_MSG: u32 = 1;
}

/// Message directions.
pub mod dir {
    pub const REQUEST: u32 = 0;
    pub const REPLY: u32 = 1;
}

/// Global (firmware-generic) message types.
pub mod glb {
    pub const CREATE_PPL: u32 = 17;
    pub const DELETE_PPL: u32 = 18;
    pub const SET_PPL_STATE: u32 = 19;
    pub const GET_PPL_STATE: u32 = 20;
}

/// Module message types.
pub mod module {
    pub const INIT_INSTANCE: u32 = 0;
    pub const CONFIG_GET: u32 = 1;
    pub const CONFIG_SET: u32 = 2;
    pub const LARGE_CONFIG_GET: u32 = 3;
    pub const LARGE_CONFIG_SET: u32 = 4;
    pub const BIND: u32 = 5;
    pub const UNBIND: u32 = 6;
    pub const SET_DX: u32 = 7;
    pub const SET_D0IX: u32 = 8;
    pub const DELETE_INSTANCE: u32 = 11;
}

// ── Module message primary fields ────────────────────────────────────────────

pub const MOD_ID_SHIFT: u32 = 0;
pub const MOD_ID_MASK: u32 = 0xFFFF;
pub const MOD_INSTANCE_ID_SHIFT: u32 = 16;
pub const MOD_INSTANCE_ID_MASK: u32 = 0xFF;

// ── Pipeline message primary fields ──────────────────────────────────────────

/// Pipeline memory size in pages (CREATE_PPL).
pub const PPL_MEM_SIZE_SHIFT: u32 = 0;
pub const PPL_MEM_SIZE_MASK: u32 = 0x7FF;
/// Pipeline priority (CREATE_PPL).
pub const PPL_TYPE_SHIFT: u32 = 11;
pub const PPL_TYPE_MASK: u32 = 0x1F;
/// Pipeline instance id (all pipeline messages).
pub const PPL_INSTANCE_ID_SHIFT: u32 = 16;
pub const PPL_INSTANCE_ID_MASK: u32 = 0xFF;
/// Requested pipeline state (SET_PPL_STATE).
pub const PPL_STATE_SHIFT: u32 = 0;
pub const PPL_STATE_MASK: u32 = 0x1F;
/// Low-power mode flag (CREATE_PPL extension).
pub const PPL_LP_MODE_SHIFT: u32 = 0;
pub const PPL_LP_MODE_MASK: u32 = 0x1;

/// Pipeline instance value meaning "not part of a pipeline" (probe modules).
pub const PPL_INSTANCE_NONE: u8 = 0xFF;

// ── INIT_INSTANCE extension ──────────────────────────────────────────────────

/// Size of the init payload in dwords.
pub const INIT_PARAM_BLOCK_SIZE_SHIFT: u32 = 0;
pub const INIT_PARAM_BLOCK_SIZE_MASK: u32 = 0xFFFF;
pub const INIT_PPL_INSTANCE_ID_SHIFT: u32 = 16;
pub const INIT_PPL_INSTANCE_ID_MASK: u32 = 0xFF;
pub const INIT_CORE_ID_SHIFT: u32 = 24;
pub const INIT_CORE_ID_MASK: u32 = 0xF;
pub const INIT_DOMAIN_SHIFT: u32 = 28;
pub const INIT_DOMAIN_MASK: u32 = 0x1;

// ── BIND / UNBIND extension ──────────────────────────────────────────────────

pub const BIND_DST_MOD_ID_SHIFT: u32 = 0;
pub const BIND_DST_MOD_ID_MASK: u32 = 0xFFFF;
pub const BIND_DST_INSTANCE_ID_SHIFT: u32 = 16;
pub const BIND_DST_INSTANCE_ID_MASK: u32 = 0xFF;
pub const BIND_DST_QUEUE_SHIFT: u32 = 24;
pub const BIND_DST_QUEUE_MASK: u32 = 0x7;
pub const BIND_SRC_QUEUE_SHIFT: u32 = 27;
pub const BIND_SRC_QUEUE_MASK: u32 = 0x7;

// ── LARGE_CONFIG_SET / GET extension ─────────────────────────────────────────

/// Total size on the init block, offset on subsequent blocks.
pub const LC_DATA_OFF_SIZE_SHIFT: u32 = 0;
pub const LC_DATA_OFF_SIZE_MASK: u32 = 0xF_FFFF;
pub const LC_PARAM_ID_SHIFT: u32 = 20;
pub const LC_PARAM_ID_MASK: u32 = 0xFF;
pub const LC_FINAL_BLOCK_SHIFT: u32 = 28;
pub const LC_FINAL_BLOCK_MASK: u32 = 0x1;
pub const LC_INIT_BLOCK_SHIFT: u32 = 29;
pub const LC_INIT_BLOCK_MASK: u32 = 0x1;

/// Outbox mailbox window size. Large payloads are split into blocks of this size.
pub const MAILBOX_SIZE: usize = 4096;

/// Firmware pipeline states as carried by SET_PPL_STATE.
pub mod ppl_state {
    pub const INVALID: u32 = 0;
    pub const UNINITIALIZED: u32 = 1;
    pub const RESET: u32 = 2;
    pub const PAUSED: u32 = 3;
    pub const RUNNING: u32 = 4;
    pub const ERROR_STOP: u32 = 5;
    pub const SAVED: u32 = 6;
    pub const RESTORED: u32 = 7;
}

/// Large-config parameter ids.
pub mod param {
    /// Copier: format of an additional output pin.
    pub const CPR_SINK_FMT: u32 = 2;
    /// Base firmware: underrun/overrun notification mask.
    pub const NOTIFICATION: u32 = 3;
    /// Base firmware: A-state (clock) table.
    pub const ASTATE: u32 = 4;
    /// Base firmware: DMA control blob for a gateway.
    pub const DMA_CONTROL: u32 = 5;
    /// Base firmware: firmware logging state.
    pub const ENABLE_LOGS: u32 = 6;
    /// Base firmware: UTC time in microseconds.
    pub const SYSTEM_TIME: u32 = 20;
    /// Base firmware: DMA buffer configuration.
    pub const DMA_CFG: u32 = 25;
    /// Probe module: connect probe points.
    pub const PROBE_CONNECT: u32 = 3;
    /// Probe module: disconnect probe points.
    pub const PROBE_DISCONNECT: u32 = 4;
}

/// Base firmware module addressing (module 0, instance 0).
pub const BASE_FW_MODULE_ID: u16 = 0;
pub const BASE_FW_INSTANCE_ID: u8 = 0;

/// Reply status codes returned by the firmware.
pub mod status {
    pub const SUCCESS: u32 = 0;
    pub const UNKNOWN_MESSAGE_TYPE: u32 = 1;
    pub const MESSAGE_TOO_LARGE: u32 = 2;
    pub const OUT_OF_MEMORY: u32 = 6;
    pub const INVALID_PARAM: u32 = 7;
    pub const INVALID_RESOURCE_ID: u32 = 9;
    pub const RESOURCE_ID_EXISTS: u32 = 10;
    pub const INVALID_RESOURCE_STATE: u32 = 12;
    pub const POWER_TRANSITION_FAILED: u32 = 13;

    /// Human-readable name of a status code.
    #[must_use]
    pub const fn describe(code: u32) -> &'static str {
        match code {
            SUCCESS => "success",
            UNKNOWN_MESSAGE_TYPE => "unknown message type",
            MESSAGE_TOO_LARGE => "message too large",
            OUT_OF_MEMORY => "out of memory",
            INVALID_PARAM => "invalid parameter",
            INVALID_RESOURCE_ID => "invalid resource id",
            RESOURCE_ID_EXISTS => "resource id exists",
            INVALID_RESOURCE_STATE => "invalid resource state",
            POWER_TRANSITION_FAILED => "power transition failed",
            _ => "unknown status",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_round_trip_through_a_word() {
        let word = put(0x1234, MOD_ID_SHIFT, MOD_ID_MASK)
            | put(7, MOD_INSTANCE_ID_SHIFT, MOD_INSTANCE_ID_MASK)
            | put(module::BIND, TYPE_SHIFT, TYPE_MASK)
            | put(target::MODULE_MSG, TARGET_SHIFT, TARGET_MASK);

        assert_eq!(get(word, MOD_ID_SHIFT, MOD_ID_MASK), 0x1234);
        assert_eq!(get(word, MOD_INSTANCE_ID_SHIFT, MOD_INSTANCE_ID_MASK), 7);
        assert_eq!(get(word, TYPE_SHIFT, TYPE_MASK), module::BIND);
        assert_eq!(get(word, TARGET_SHIFT, TARGET_MASK), target::MODULE_MSG);
    }

    #[test]
    fn put_truncates_to_mask() {
        assert_eq!(put(0x1F, BIND_SRC_QUEUE_SHIFT, BIND_SRC_QUEUE_MASK), 0x7 << 27);
    }

    #[test]
    fn bind_queues_do_not_overlap_destination_instance() {
        let dst_inst = put(0xFF, BIND_DST_INSTANCE_ID_SHIFT, BIND_DST_INSTANCE_ID_MASK);
        let queues = put(7, BIND_DST_QUEUE_SHIFT, BIND_DST_QUEUE_MASK)
            | put(7, BIND_SRC_QUEUE_SHIFT, BIND_SRC_QUEUE_MASK);
        assert_eq!(dst_inst & queues, 0);
    }
}
