//! Collision groups and filtering.

use rapier3d::prelude::*;

/// Collision groups for the tether scene.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionGroup {
    /// Static environment (ground, piers)
    Environment = 1 << 0,
    /// Floating and free bodies the ropes attach to
    Body = 1 << 1,
    /// Winch segment proxies
    Winch = 1 << 2,
    /// Rope node probes (queries only)
    RopeProbe = 1 << 3,
    /// Loads hanging from winches
    Load = 1 << 4,
    /// Triggers and sensors
    Trigger = 1 << 5,
}

impl CollisionGroup {
    fn bits(groups: &[CollisionGroup]) -> Group {
        Group::from_bits_retain(groups.iter().fold(0, |acc, g| acc | *g as u32))
    }

    /// Membership and filter for this group.
    pub fn membership_filter(self) -> (Group, Group) {
        use CollisionGroup::*;
        let membership = Self::bits(&[self]);
        let filter = match self {
            Environment => Group::ALL,
            Body => Self::bits(&[Environment, Body, Winch, RopeProbe, Load]),
            // A winch never collides with its own segments.
            Winch => Self::bits(&[Environment, Body, RopeProbe, Load]),
            RopeProbe => Self::bits(&[Environment, Body, Winch, Load]),
            Load => Self::bits(&[Environment, Body, Winch, RopeProbe, Load, Trigger]),
            Trigger => Self::bits(&[Body, Load]),
        };
        (membership, filter)
    }

    pub fn interaction_groups(self) -> InteractionGroups {
        let (membership, filter) = self.membership_filter();
        InteractionGroups::new(membership, filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winch_ignores_itself() {
        let winch = CollisionGroup::Winch.interaction_groups();
        assert!(!winch.test(winch));
        assert!(winch.test(CollisionGroup::Load.interaction_groups()));
    }

    #[test]
    fn triggers_see_loads_only_among_movers() {
        let trigger = CollisionGroup::Trigger.interaction_groups();
        assert!(trigger.test(CollisionGroup::Load.interaction_groups()));
        assert!(!trigger.test(CollisionGroup::Winch.interaction_groups()));
        assert!(!trigger.test(CollisionGroup::RopeProbe.interaction_groups()));
    }

    #[test]
    fn rope_probe_sees_solid_groups() {
        let probe = CollisionGroup::RopeProbe.interaction_groups();
        for group in [
            CollisionGroup::Environment,
            CollisionGroup::Body,
            CollisionGroup::Winch,
            CollisionGroup::Load,
        ] {
            assert!(probe.test(group.interaction_groups()), "{group:?}");
        }
    }
}
