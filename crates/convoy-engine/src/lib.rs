//! Orchestration core: worker sessions, the self-healing pool registry,
//! the strategy registry, and the operation coordinator that fans work out
//! across ready workers.

pub mod coordinator;
pub mod error;
pub mod registry;
pub mod session;
pub mod strategies;

pub use coordinator::{CoordinatorConfig, OperationCoordinator};
pub use error::OrchestratorError;
pub use registry::{RegistryConfig, WorkerPoolRegistry};
pub use session::WorkerSession;
pub use strategies::StrategyRegistry;
