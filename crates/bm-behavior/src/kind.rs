//! Generator kinds, priorities and the preemption rule.

use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GeneratorKind {
    #[default]
    Idle,
    Point,
    Follow,
    Flee,
    Chase,
    Formation,
    Patrol,
    Wander,
}

impl GeneratorKind {
    /// Chase and flee win ties against everything else.
    #[inline]
    pub fn is_combat(self) -> bool {
        matches!(self, GeneratorKind::Chase | GeneratorKind::Flee)
    }

    /// Persistent generators stay installed after `Success`; they report
    /// "in band, holding" rather than "done".
    #[inline]
    pub fn is_persistent(self) -> bool {
        matches!(
            self,
            GeneratorKind::Idle | GeneratorKind::Follow | GeneratorKind::Chase | GeneratorKind::Formation
        )
    }

    pub fn default_priority(self) -> MovementPriority {
        match self {
            GeneratorKind::Idle => MovementPriority::Idle,
            GeneratorKind::Wander | GeneratorKind::Patrol => MovementPriority::Low,
            _ => MovementPriority::Normal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GeneratorKind::Idle => "idle",
            GeneratorKind::Point => "point",
            GeneratorKind::Follow => "follow",
            GeneratorKind::Flee => "flee",
            GeneratorKind::Chase => "chase",
            GeneratorKind::Formation => "formation",
            GeneratorKind::Patrol => "patrol",
            GeneratorKind::Wander => "wander",
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MovementPriority {
    Idle = 0,
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// Does a new `(kind, priority)` generator displace the active one?
///
/// Strictly higher priority always wins.  At equal priority only a combat
/// kind displaces a non-combat kind.
#[inline]
pub fn preempts(
    new_kind:        GeneratorKind,
    new_priority:    MovementPriority,
    active_kind:     GeneratorKind,
    active_priority: MovementPriority,
) -> bool {
    new_priority > active_priority
        || (new_priority == active_priority && new_kind.is_combat() && !active_kind.is_combat())
}
