//! `bm-validation`: movement validation and stuck handling.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                          |
//! |---------------|-------------------------------------------------------------------|
//! | [`validator`] | `MovementValidator`, `ValidatorConfig`, `DangerZone`, statistics  |
//! | [`stuck`]     | stuck state machine, `StuckConfig`, escalating recovery           |
//! | [`error`]     | `ValidationError`, `ValidationResult<T>`                          |
//!
//! All checks take the host world as a `&W where W: WorldQuery + ?Sized`, so
//! they work against the sandbox, a real host, or a `&dyn MovementHost`.
//!
//! # Feature flags
//!
//! | Flag      | Effect                                                     |
//! |-----------|------------------------------------------------------------|
//! | `fx-hash` | FxHash for the per-agent stuck table.                      |
//! | `serde`   | Derives `Serialize`/`Deserialize` on configs and stats.    |

pub mod error;
pub mod stuck;
pub mod validator;

#[cfg(test)]
mod tests;

pub use error::{ValidationError, ValidationResult};
pub use stuck::{RecoveryAction, RecoveryOutcome, StuckConfig, StuckRecord, StuckStatus};
pub use validator::{DangerZone, MovementValidator, ValidationStats, ValidatorConfig};
