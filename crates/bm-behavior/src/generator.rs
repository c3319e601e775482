//! The `MovementGenerator` trait, the extension point for movement behaviors.

use bm_core::{AgentId, AgentRng, AgentSnapshot, FormationPosition, Position};

use crate::{GeneratorContext, GeneratorKind, MovementPriority, MovementResult, preempts};

/// One movement behavior installed on one agent.
///
/// The manager owns at most one active and one pending generator per agent
/// and calls these methods sequentially for that agent; a generator never
/// sees two concurrent calls.  Generators are `Send` so the manager can
/// update different agents on different threads.
///
/// # Lifecycle
///
/// ```text
/// initialize ──▶ update* ──▶ finalize(interrupted = false)   (Success / failure)
///      │              │
///      │              └─ on_interrupted ──▶ finalize(interrupted = true)
///      └─ Err(code): the command is rejected, finalize is not called
/// ```
///
/// `reset` asks the generator to throw away its path and plan again on the
/// next update (after stuck recovery, or when the manager resumes it).
pub trait MovementGenerator: Send + 'static {
    fn kind(&self) -> GeneratorKind;

    fn priority(&self) -> MovementPriority;

    /// Prepare for the first update.  `Err` rejects the command with the
    /// given failure code (an invalid destination, a missing target).
    fn initialize(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>) -> Result<(), MovementResult>;

    fn reset(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>);

    fn update(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>, rng: &mut AgentRng) -> MovementResult;

    fn finalize(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>, interrupted: bool);

    /// May a generator of `new_kind` at `new_priority` replace this one?
    ///
    /// Default: the standard preemption rule (see [`preempts`]).
    fn can_be_interrupted(&self, new_kind: GeneratorKind, new_priority: MovementPriority) -> bool {
        preempts(new_kind, new_priority, self.kind(), self.priority())
    }

    fn on_interrupted(&mut self, _agent: &AgentSnapshot, _new_kind: GeneratorKind) {}

    /// The tracked target was observed at `new_position`.
    fn on_target_moved(&mut self, _agent: &AgentSnapshot, _new_position: Position) {}

    /// The agent being followed, chased, fled from or led by, if any.
    fn target(&self) -> Option<AgentId> {
        None
    }

    /// Where the generator is currently heading.
    fn destination(&self) -> Option<Position> {
        None
    }

    /// Speed of the last move order, while the generator drives the agent.
    fn speed(&self) -> Option<f32> {
        None
    }

    /// Replace the formation slot in place.  Only formation generators
    /// accept; everything else returns `false`.
    fn set_formation_slot(&mut self, _slot: FormationPosition) -> bool {
        false
    }
}
