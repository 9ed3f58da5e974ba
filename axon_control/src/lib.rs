//! # Axon Control Library
//!
//! Multi-axis drive-mode control stack. Runs a cyclic read → update → write
//! loop over per-axis command routers, enforces position/velocity/effort
//! limits with saturation and soft-band strictness, and arbitrates
//! controller mode switches against each drive's advertised capabilities
//! with a pause/resume protocol around the loop.
//!
//! ## Layers
//!
//! 1. **Axis layer** — per-cycle state refresh through every `CommandRouter`
//! 2. **Control cycle** — gated command push, controller host, limit pass
//!
//! Mode switching runs off-loop in the [`arbiter::ModeArbiter`]: feasibility
//! is checked lock-free against shared per-axis info blocks, the switch
//! batch itself pauses the loop and re-primes all limit derivative state
//! before resuming.

pub mod arbiter;
pub mod axis;
pub mod config;
pub mod cycle;
pub mod layer;
pub mod limits;
pub mod router;
pub mod sim;
pub mod stack;
