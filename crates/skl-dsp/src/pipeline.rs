//! Pipeline state machine
//!
//! ```text
//!            create            run                 run
//! Invalid ───────────▶ Created ─────▶ (Paused) ─────▶ Started
//!    ▲                    │                ▲  stop      │
//!    │       delete       │                └────────────┘
//!    └────────────────────┴──── (pause first if Started/Reset)
//!                                 Paused ──reset──▶ Reset
//! ```
//!
//! The host only records a state after the firmware acknowledged it, so an
//! IPC failure leaves the pipe in its previous state. Calls made before the
//! required state is reached are no-ops returning `Ok(())`.

use crate::context::DspContext;
use crate::error::Result;
use crate::ipc::IpcTransport;
use skl_chip::ipc::ppl_state;
use skl_chip::topology::StreamDirection;
use std::fmt::Debug;
use tracing::{debug, error, warn};

/// Host view of a pipeline's firmware state.
///
/// Ordered: `Reset` compares greater than `Started`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PipeState {
    /// Not present in firmware
    #[default]
    Invalid,
    /// CREATE_PPL acknowledged
    Created,
    /// Paused (the firmware's stopped state)
    Paused,
    /// Running
    Started,
    /// DMA reset from the DSP side
    Reset,
}

/// Stream parameters of the PCM a pipeline serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipeParams {
    /// HDA host DMA channel
    pub host_dma_id: u8,
    /// HDA link DMA channel
    pub link_dma_id: u8,
    /// Channel count
    pub ch: u8,
    /// Sample rate
    pub s_freq: u32,
    /// Sample width in bits
    pub s_fmt: u32,
    /// Link type
    pub link_type: u8,
    /// Stream direction
    pub stream: StreamDirection,
}

/// A firmware pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pipe {
    /// Pipeline instance id
    pub ppl_id: u8,
    /// Scheduling priority
    pub pipe_priority: u8,
    /// Memory budget in pages
    pub memory_pages: u16,
    /// Low-power mode
    pub lp_mode: bool,
    /// Connection type of the pipe (FE/BE)
    pub conn_type: u32,
    /// Stream parameters
    pub params: PipeParams,
    /// Current state
    pub state: PipeState,
}

impl Pipe {
    /// Pipe in the `Invalid` state.
    pub fn new(ppl_id: u8, pipe_priority: u8, memory_pages: u16) -> Self {
        Self {
            ppl_id,
            pipe_priority,
            memory_pages,
            ..Self::default()
        }
    }
}

/// Topology change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyEvent {
    /// A pipeline entered the running state
    PipelineStart {
        /// Pipeline id
        ppl_id: u8,
    },
    /// A pipeline was deleted
    PipelineDelete {
        /// Pipeline id
        ppl_id: u8,
    },
}

/// Receiver of topology change events.
///
/// Delivery is best-effort: a failure is logged and never fails the
/// pipeline operation that emitted the event.
pub trait TopologyNotifier: Debug + Send {
    /// Deliver one event.
    ///
    /// # Errors
    ///
    /// Returns error if the event could not be delivered.
    fn notify(&mut self, event: TopologyEvent) -> Result<()>;
}

/// Notifier that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl TopologyNotifier for NullNotifier {
    fn notify(&mut self, _event: TopologyEvent) -> Result<()> {
        Ok(())
    }
}

impl<T: IpcTransport> DspContext<T> {
    fn set_pipe_state(&mut self, pipe: &Pipe, state: u32) -> Result<()> {
        debug!("pipe {}: request state {state}", pipe.ppl_id);
        self.ipc.set_pipeline_state(pipe.ppl_id, state)
    }

    /// Create `pipe` in firmware.
    ///
    /// # Errors
    ///
    /// Returns error if the firmware rejects the pipeline; the pipe stays
    /// `Invalid`.
    pub fn create_pipeline(&mut self, pipe: &mut Pipe) -> Result<()> {
        debug!("create pipe {}", pipe.ppl_id);
        self.ipc
            .create_pipeline(pipe.memory_pages, pipe.pipe_priority, pipe.ppl_id, pipe.lp_mode)
            .inspect_err(|e| error!("pipe {}: create failed: {e}", pipe.ppl_id))?;
        pipe.state = PipeState::Created;
        Ok(())
    }

    /// Run `pipe`, pausing it first.
    ///
    /// No-op unless the pipe exists in firmware.
    ///
    /// # Errors
    ///
    /// Returns error if either state change is rejected.
    pub fn run_pipe(&mut self, pipe: &mut Pipe) -> Result<()> {
        debug!("run pipe {} from {:?}", pipe.ppl_id, pipe.state);
        if pipe.state < PipeState::Created {
            return Ok(());
        }

        self.set_pipe_state(pipe, ppl_state::PAUSED)
            .inspect_err(|e| error!("pipe {}: pause failed: {e}", pipe.ppl_id))?;
        pipe.state = PipeState::Paused;

        self.set_pipe_state(pipe, ppl_state::RUNNING)
            .inspect_err(|e| error!("pipe {}: start failed: {e}", pipe.ppl_id))?;
        pipe.state = PipeState::Started;

        self.notify(TopologyEvent::PipelineStart {
            ppl_id: pipe.ppl_id,
        });
        Ok(())
    }

    /// Stop `pipe` (the firmware has no stop, pause stands in for it).
    ///
    /// No-op unless the pipe has been paused or run.
    ///
    /// # Errors
    ///
    /// Returns error if the pause is rejected.
    pub fn stop_pipe(&mut self, pipe: &mut Pipe) -> Result<()> {
        debug!("stop pipe {} from {:?}", pipe.ppl_id, pipe.state);
        if pipe.state < PipeState::Paused {
            return Ok(());
        }
        self.set_pipe_state(pipe, ppl_state::PAUSED)?;
        pipe.state = PipeState::Paused;
        Ok(())
    }

    /// Reset `pipe`'s DMA from the DSP side.
    ///
    /// No-op unless the pipe has been paused or run.
    ///
    /// # Errors
    ///
    /// Returns error if the reset is rejected.
    pub fn reset_pipe(&mut self, pipe: &mut Pipe) -> Result<()> {
        debug!("reset pipe {} from {:?}", pipe.ppl_id, pipe.state);
        if pipe.state < PipeState::Paused {
            return Ok(());
        }
        self.set_pipe_state(pipe, ppl_state::RESET)?;
        pipe.state = PipeState::Reset;
        Ok(())
    }

    /// Delete `pipe`, pausing it first if it is running or reset.
    ///
    /// # Errors
    ///
    /// Returns error if the pause or the delete is rejected.
    pub fn delete_pipe(&mut self, pipe: &mut Pipe) -> Result<()> {
        debug!("delete pipe {} from {:?}", pipe.ppl_id, pipe.state);
        if pipe.state >= PipeState::Started {
            self.set_pipe_state(pipe, ppl_state::PAUSED)
                .inspect_err(|e| error!("pipe {}: stop before delete failed: {e}", pipe.ppl_id))?;
            pipe.state = PipeState::Paused;
        }

        if pipe.state < PipeState::Created {
            return Ok(());
        }

        self.ipc
            .delete_pipeline(pipe.ppl_id)
            .inspect_err(|e| error!("pipe {}: delete failed: {e}", pipe.ppl_id))?;
        pipe.state = PipeState::Invalid;

        self.notify(TopologyEvent::PipelineDelete {
            ppl_id: pipe.ppl_id,
        });
        Ok(())
    }

    fn notify(&mut self, event: TopologyEvent) {
        if let Err(e) = self.notifier.notify(event) {
            warn!("topology event {event:?} not delivered: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::VirtualFirmware;
    use crate::error::DspError;
    use crate::DspConfig;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Default)]
    struct Events(Arc<Mutex<Vec<TopologyEvent>>>, bool);

    impl TopologyNotifier for Events {
        fn notify(&mut self, event: TopologyEvent) -> Result<()> {
            self.0.lock().unwrap().push(event);
            if self.1 {
                Err(DspError::invalid_state("listener gone"))
            } else {
                Ok(())
            }
        }
    }

    fn ctx() -> DspContext<VirtualFirmware> {
        DspContext::new(VirtualFirmware::new(), DspConfig::default())
    }

    fn states(ctx: &DspContext<VirtualFirmware>) -> Vec<u32> {
        ctx.transport().pipeline_state_requests()
    }

    #[test]
    fn test_run_passes_through_paused() {
        let mut ctx = ctx();
        let mut pipe = Pipe::new(1, 0, 2);
        ctx.create_pipeline(&mut pipe).unwrap();
        assert_eq!(pipe.state, PipeState::Created);

        ctx.run_pipe(&mut pipe).unwrap();
        assert_eq!(pipe.state, PipeState::Started);
        assert_eq!(states(&ctx), vec![ppl_state::PAUSED, ppl_state::RUNNING]);
    }

    #[test]
    fn test_run_before_create_is_noop() {
        let mut ctx = ctx();
        let mut pipe = Pipe::new(1, 0, 2);
        ctx.run_pipe(&mut pipe).unwrap();
        ctx.stop_pipe(&mut pipe).unwrap();
        ctx.reset_pipe(&mut pipe).unwrap();
        ctx.delete_pipe(&mut pipe).unwrap();
        assert_eq!(pipe.state, PipeState::Invalid);
        assert!(ctx.transport().log().is_empty());
    }

    #[test]
    fn test_stop_and_reset_need_paused() {
        let mut ctx = ctx();
        let mut pipe = Pipe::new(1, 0, 2);
        ctx.create_pipeline(&mut pipe).unwrap();
        ctx.stop_pipe(&mut pipe).unwrap();
        ctx.reset_pipe(&mut pipe).unwrap();
        assert_eq!(pipe.state, PipeState::Created);
        assert!(states(&ctx).is_empty());

        ctx.run_pipe(&mut pipe).unwrap();
        ctx.stop_pipe(&mut pipe).unwrap();
        assert_eq!(pipe.state, PipeState::Paused);
        ctx.reset_pipe(&mut pipe).unwrap();
        assert_eq!(pipe.state, PipeState::Reset);
    }

    #[test]
    fn test_delete_from_started_pauses_first() {
        let mut ctx = ctx();
        let mut pipe = Pipe::new(1, 0, 2);
        ctx.create_pipeline(&mut pipe).unwrap();
        ctx.run_pipe(&mut pipe).unwrap();
        ctx.delete_pipe(&mut pipe).unwrap();
        assert_eq!(pipe.state, PipeState::Invalid);
        assert_eq!(
            states(&ctx),
            vec![ppl_state::PAUSED, ppl_state::RUNNING, ppl_state::PAUSED]
        );
        assert!(!ctx.transport().has_pipeline(1));
    }

    #[test]
    fn test_delete_from_reset_pauses_first() {
        let mut ctx = ctx();
        let mut pipe = Pipe::new(1, 0, 2);
        ctx.create_pipeline(&mut pipe).unwrap();
        ctx.run_pipe(&mut pipe).unwrap();
        ctx.stop_pipe(&mut pipe).unwrap();
        ctx.reset_pipe(&mut pipe).unwrap();
        ctx.delete_pipe(&mut pipe).unwrap();
        assert_eq!(pipe.state, PipeState::Invalid);
        assert_eq!(states(&ctx).last(), Some(&ppl_state::PAUSED));
    }

    #[test]
    fn test_lifecycle_ends_invalid_from_created_or_paused() {
        for run_first in [false, true] {
            let mut ctx = ctx();
            let mut pipe = Pipe::new(3, 0, 2);
            ctx.create_pipeline(&mut pipe).unwrap();
            if run_first {
                ctx.run_pipe(&mut pipe).unwrap();
                ctx.stop_pipe(&mut pipe).unwrap();
                assert_eq!(pipe.state, PipeState::Paused);
            }
            ctx.delete_pipe(&mut pipe).unwrap();
            assert_eq!(pipe.state, PipeState::Invalid);
        }
    }

    #[test]
    fn test_failed_transition_keeps_state() {
        let mut ctx = ctx();
        let mut pipe = Pipe::new(1, 0, 2);
        ctx.create_pipeline(&mut pipe).unwrap();
        ctx.transport_mut().fail_next(crate::ipc::Opcode::SetPipelineState, 13);
        assert!(ctx.run_pipe(&mut pipe).is_err());
        assert_eq!(pipe.state, PipeState::Created);
    }

    #[test]
    fn test_notifications_are_best_effort() {
        let events = Events(Arc::default(), true);
        let mut ctx = ctx().with_notifier(Box::new(events.clone()));
        let mut pipe = Pipe::new(1, 0, 2);
        ctx.create_pipeline(&mut pipe).unwrap();
        ctx.run_pipe(&mut pipe).unwrap();
        ctx.delete_pipe(&mut pipe).unwrap();
        assert_eq!(
            *events.0.lock().unwrap(),
            vec![
                TopologyEvent::PipelineStart { ppl_id: 1 },
                TopologyEvent::PipelineDelete { ppl_id: 1 }
            ]
        );
    }
}
