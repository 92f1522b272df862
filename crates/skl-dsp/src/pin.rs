//! Pin/queue allocator
//!
//! Every module instance has fixed arrays of input and output pins. A pin's
//! position in its array is the firmware queue index used in BIND/UNBIND.
//!
//! ```text
//! Kind     Peer identity                      allocate                       free
//! ──────── ────────────────────────────────── ────────────────────────────── ─────────────────────
//! dynamic  assigned at bind, cleared at free  first !in_use && Unbind slot   clear in_use and peer
//! static   fixed by topology                  slot whose peer matches target peer left untouched
//! ```
//!
//! Both kinds return to [`PinState::Unbind`] with no target on free.

use crate::module::{ModuleConfig, ModuleInstanceId, ModuleState};
use tracing::trace;

/// Bind state of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinState {
    /// Not connected in firmware
    #[default]
    Unbind,
    /// BIND succeeded
    BindDone,
}

/// One input or output connection slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pin {
    /// Pin number from the topology; firmware queues are addressed by slot position
    pub pin_index: u8,
    /// Peer module instance
    pub id: ModuleInstanceId,
    /// Peer assigned at bind time (vs. fixed by topology)
    pub is_dynamic: bool,
    /// Claimed by an allocation
    pub in_use: bool,
    /// Bind state
    pub state: PinState,
    /// Instance currently bound through this pin
    pub tgt: Option<ModuleInstanceId>,
}

impl Pin {
    /// Free dynamic pin.
    pub fn dynamic(pin_index: u8) -> Self {
        Self {
            pin_index,
            is_dynamic: true,
            ..Self::default()
        }
    }

    /// Static pin wired by the topology to `peer`.
    pub fn fixed(pin_index: u8, peer: ModuleInstanceId) -> Self {
        Self {
            pin_index,
            id: peer,
            is_dynamic: false,
            ..Self::default()
        }
    }
}

/// Claim a pin for a connection to `target`.
///
/// Dynamic pins: the first slot that is neither in use nor bound is claimed
/// and records `target` as its peer. Static pins: the unbound slot whose
/// recorded peer is `target` is selected without touching its identity.
///
/// Returns `None` when no slot qualifies.
pub fn alloc_queue(pins: &mut [Pin], target: ModuleInstanceId) -> Option<usize> {
    for (i, pin) in pins.iter_mut().enumerate() {
        if pin.is_dynamic {
            if !pin.in_use && pin.state == PinState::Unbind {
                pin.in_use = true;
                pin.id = target;
                pin.tgt = Some(target);
                trace!("claimed dynamic pin {i} for {target}");
                return Some(i);
            }
        } else if pin.id.same_instance(&target) && pin.state == PinState::Unbind {
            pin.tgt = Some(target);
            trace!("selected static pin {i} for {target}");
            return Some(i);
        }
    }
    None
}

/// Release a pin claimed by [`alloc_queue`].
pub fn free_queue(pins: &mut [Pin], index: usize) {
    let Some(pin) = pins.get_mut(index) else {
        return;
    };
    if pin.is_dynamic {
        pin.in_use = false;
        pin.id = ModuleInstanceId::default();
    }
    pin.state = PinState::Unbind;
    pin.tgt = None;
}

/// Index of the pin whose peer is `peer`.
pub fn queue_index(pins: &[Pin], peer: ModuleInstanceId) -> Option<usize> {
    pins.iter().position(|p| p.id.same_instance(&peer))
}

/// Demote a module to [`ModuleState::InitDone`] once none of its output
/// pins is bound.
pub fn clear_module_state(mcfg: &mut ModuleConfig) {
    if mcfg.out_pins.iter().all(|p| p.state == PinState::Unbind) {
        mcfg.state = ModuleState::InitDone;
    }
}
