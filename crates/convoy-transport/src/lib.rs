//! Transport implementations for the convoy engine.
//!
//! `LoopbackTransport` is the in-process transport used for local and dev
//! deployments: it simulates the pairing/auth handshake and performs work as
//! timed no-ops. `MockTransport` is fully scriptable and backs the engine's
//! tests.

pub mod loopback;
pub mod mock;

pub use loopback::{LoopbackConfig, LoopbackFactory, LoopbackTransport};
pub use mock::{MockFactory, MockTransport, PerformBehavior};
