//! One-shot handover of a load from a guide rope to the pulley rig.
//!
//! While the load travels on its guide rope it sits inside a trigger volume. When it
//! leaves the volume the rope lets go, the pulley lays itself out, and the lifting winch
//! takes the weight.

use crate::pulley::PulleyBalancer;
use crate::rope::RopeSolver;
use crate::winch::WinchActuator;
use std::fmt::Debug;
use tether_core::JointBackend;

/// Components touched by the handover.
pub struct HandoverTargets<'a, B, J> {
    pub rope: &'a mut RopeSolver<B>,
    pub pulley: &'a mut PulleyBalancer<J>,
    pub winch: &'a mut WinchActuator<J>,
}

#[derive(Debug, Clone)]
pub struct LoadHandover<C> {
    trigger: C,
    armed: bool,
}

impl<C: Copy + PartialEq + Debug> LoadHandover<C> {
    /// Watch for `trigger` leaving the handover volume.
    pub fn new(trigger: C) -> Self {
        Self { trigger, armed: true }
    }

    /// Returns true if this exit fired the handover.
    pub fn on_trigger_exit<B, J, JB>(&mut self, collider: C, targets: HandoverTargets<'_, B, J>, joints: &mut JB) -> bool
    where
        B: Copy + Eq + Debug,
        J: Copy,
        JB: JointBackend<Joint = J>,
    {
        if !self.armed || collider != self.trigger {
            return false;
        }
        targets.rope.set_enabled(false);
        targets.pulley.apply_settings(joints);
        targets.winch.enable_load();
        log::info!("Load {:?} left the guide rope, pulley takes over", collider);
        self.armed = false;
        true
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn rearm(&mut self) {
        self.armed = true;
    }
}
