//! Deterministic test harness for the Palaver chat engine.
//!
//! Integration tests with a real backend suffer from non-reproducible
//! completion races: the interesting bugs in a delivery engine live exactly
//! in the orderings a real network produces once in a thousand runs. This
//! crate makes those orderings a test input instead:
//!
//! - [`ScriptedTransport`]: a transport double with scripted per-call
//!   outcomes and completion gates — a test can hold every transmit at the
//!   wire, then release them in whatever order the scenario needs (late
//!   acknowledgments, completions racing a logout, retries against a
//!   recovered network).
//!
//! - Paused virtual time: driven with tokio's `start_paused` test runtime,
//!   the typing debounce window elapses instantly and deterministically.
//!
//! The scenario tests for the engine's observable properties live in this
//! crate's `tests/` directory.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod scripted_transport;

pub use scripted_transport::{ScriptedTransport, TransportCall};
