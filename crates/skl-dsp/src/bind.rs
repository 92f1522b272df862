//! Bind/unbind protocol
//!
//! A bind connects one output queue of `src` to one input queue of `dst`:
//!
//! ```text
//! 1. both modules InitDone or later        else Ok(()) without IPC
//! 2. claim src output pin, dst input pin   rollback src pin on dst failure
//! 3. copier output pin > 0: CPR_SINK_FMT   describes the extra pin's formats
//! 4. compare src out fmt / dst in fmt      warn and count, never fail
//! 5. BIND                                  src BindDone, both pins BindDone
//! ```
//!
//! Every failure after step 2 frees both pins again.

use crate::context::DspContext;
use crate::error::{DspError, Result};
use crate::format::cpr_pin_format;
use crate::ipc::{BindUnbindMsg, IpcTransport, LargeConfigMsg};
use crate::module::{AudioFormat, ModuleConfig, ModuleState};
use crate::pin::{alloc_queue, clear_module_state, free_queue, queue_index, PinState};
use skl_chip::ipc::param;
use skl_chip::topology::ModuleType;
use tracing::{debug, error, warn};

/// Field-by-field differences between two pin formats.
fn format_differences(src: &AudioFormat, dst: &AudioFormat) -> Vec<(&'static str, u32, u32)> {
    let fields = [
        ("channels", u32::from(src.channels), u32::from(dst.channels)),
        ("s_freq", src.s_freq, dst.s_freq),
        ("bit_depth", src.bit_depth, dst.bit_depth),
        ("valid_bit_depth", u32::from(src.valid_bit_depth), u32::from(dst.valid_bit_depth)),
        ("ch_cfg", src.ch_cfg, dst.ch_cfg),
        ("interleaving", src.interleaving, dst.interleaving),
        ("sample_type", u32::from(src.sample_type), u32::from(dst.sample_type)),
        ("ch_map", src.ch_map, dst.ch_map),
    ];
    fields.into_iter().filter(|(_, a, b)| a != b).collect()
}

/// Firmware queue number of the pin at `index`.
fn queue_number(index: usize) -> Result<u8> {
    u8::try_from(index)
        .map_err(|_| DspError::invalid_argument(format!("queue {index} out of range")))
}

impl<T: IpcTransport> DspContext<T> {
    /// Bind an output pin of `src` to an input pin of `dst`.
    ///
    /// No-op while either module is not yet initialised.
    ///
    /// # Errors
    ///
    /// Returns [`DspError::NoFreePin`] if either side has no free pin, or the
    /// firmware error of the sink-format or bind request. Pins are released
    /// on every error.
    pub fn bind_modules(&mut self, src: &mut ModuleConfig, dst: &mut ModuleConfig) -> Result<()> {
        debug!(
            "bind {} ({:?}) -> {} ({:?})",
            src.id, src.state, dst.id, dst.state
        );
        if src.state < ModuleState::InitDone || dst.state < ModuleState::InitDone {
            return Ok(());
        }

        let src_index = alloc_queue(&mut src.out_pins, dst.id).ok_or(DspError::NoFreePin {
            direction: "output",
            module_id: src.id.module_id,
            instance_id: src.id.instance_id,
        })?;
        let Some(dst_index) = alloc_queue(&mut dst.in_pins, src.id) else {
            free_queue(&mut src.out_pins, src_index);
            return Err(DspError::NoFreePin {
                direction: "input",
                module_id: dst.id.module_id,
                instance_id: dst.id.instance_id,
            });
        };

        if let Err(e) = self.bind_queues(src, dst, src_index, dst_index) {
            error!("bind {} -> {} failed: {e}", src.id, dst.id);
            free_queue(&mut src.out_pins, src_index);
            free_queue(&mut dst.in_pins, dst_index);
            return Err(e);
        }

        src.state = ModuleState::BindDone;
        src.out_pins[src_index].state = PinState::BindDone;
        dst.in_pins[dst_index].state = PinState::BindDone;
        Ok(())
    }

    fn bind_queues(
        &mut self,
        src: &ModuleConfig,
        dst: &ModuleConfig,
        src_index: usize,
        dst_index: usize,
    ) -> Result<()> {
        let src_fmt = *src.output_format(src_index)?;
        let dst_fmt = *dst.input_format(dst_index)?;

        if src.m_type == ModuleType::Copier && src_index > 0 {
            let record = cpr_pin_format(src_index as u32, src.input_format(0)?, &src_fmt);
            let msg = LargeConfigMsg {
                module_id: src.id.module_id,
                instance_id: src.id.pvt_id,
                param_id: param::CPR_SINK_FMT as u8,
            };
            debug!("copier {}: configure output pin {src_index}", src.id);
            self.ipc.set_large_config(&msg, &record)?;
        }

        self.check_formats(src, dst, &src_fmt, &dst_fmt);

        let msg = BindUnbindMsg {
            module_id: src.id.module_id,
            instance_id: src.id.pvt_id,
            dst_module_id: dst.id.module_id,
            dst_instance_id: dst.id.pvt_id,
            src_queue: queue_number(src_index)?,
            dst_queue: queue_number(dst_index)?,
            bind: true,
        };
        self.ipc.bind_unbind(&msg)
    }

    fn check_formats(
        &mut self,
        src: &ModuleConfig,
        dst: &ModuleConfig,
        src_fmt: &AudioFormat,
        dst_fmt: &AudioFormat,
    ) {
        let diffs = format_differences(src_fmt, dst_fmt);
        if diffs.is_empty() {
            return;
        }
        warn!("format mismatch between {} and {}", src.id, dst.id);
        for (field, a, b) in diffs {
            warn!("  {field}: src {a:#x} dst {b:#x}");
        }
        self.format_mismatches += 1;
    }

    /// Undo a bind between `src` and `dst`.
    ///
    /// No-op if the pair was never bound.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the unbind; pins stay bound.
    pub fn unbind_modules(&mut self, src: &mut ModuleConfig, dst: &mut ModuleConfig) -> Result<()> {
        debug!("unbind {} -> {}", src.id, dst.id);
        let (Some(src_index), Some(dst_index)) = (
            queue_index(&src.out_pins, dst.id),
            queue_index(&dst.in_pins, src.id),
        ) else {
            return Ok(());
        };
        if src.out_pins[src_index].state != PinState::BindDone
            || dst.in_pins[dst_index].state != PinState::BindDone
        {
            return Ok(());
        }

        let msg = BindUnbindMsg {
            module_id: src.id.module_id,
            instance_id: src.id.pvt_id,
            dst_module_id: dst.id.module_id,
            dst_instance_id: dst.id.pvt_id,
            src_queue: queue_number(src_index)?,
            dst_queue: queue_number(dst_index)?,
            bind: false,
        };
        self.ipc
            .bind_unbind(&msg)
            .inspect_err(|e| error!("unbind {} -> {} failed: {e}", src.id, dst.id))?;

        free_queue(&mut src.out_pins, src_index);
        free_queue(&mut dst.in_pins, dst_index);
        clear_module_state(src);
        Ok(())
    }
}
