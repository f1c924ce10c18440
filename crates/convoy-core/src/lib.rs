//! Shared data model for the convoy orchestrator: branded identifiers,
//! worker and operation records, the pool event bus, and the transport and
//! strategy seams the engine is built against.

pub mod errors;
pub mod events;
pub mod ids;
pub mod operation;
pub mod strategy;
pub mod transport;
pub mod worker;
