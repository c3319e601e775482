//! The placeholder generator.

use bm_core::{AgentRng, AgentSnapshot};

use crate::{GeneratorContext, GeneratorKind, MovementGenerator, MovementPriority, MovementResult};

/// Occupies the slot when nothing else is installed.  Always successful;
/// anything outranks it.
#[derive(Clone, Debug, Default)]
pub struct IdleGenerator;

impl IdleGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl MovementGenerator for IdleGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Idle
    }

    fn priority(&self) -> MovementPriority {
        MovementPriority::Idle
    }

    fn initialize(&mut self, _agent: &AgentSnapshot, _ctx: &GeneratorContext<'_>) -> Result<(), MovementResult> {
        Ok(())
    }

    fn reset(&mut self, _agent: &AgentSnapshot, _ctx: &GeneratorContext<'_>) {}

    fn update(&mut self, _agent: &AgentSnapshot, _ctx: &GeneratorContext<'_>, _rng: &mut AgentRng) -> MovementResult {
        MovementResult::Success
    }

    fn finalize(&mut self, _agent: &AgentSnapshot, _ctx: &GeneratorContext<'_>, _interrupted: bool) {}

    fn can_be_interrupted(&self, _new_kind: GeneratorKind, _new_priority: MovementPriority) -> bool {
        true
    }
}
