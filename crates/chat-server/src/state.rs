//! Application State

use std::sync::Arc;

use crate::agent::AgentCell;

/// Shared application state
///
/// The cell is the only shared mutable construct in the service; it is
/// passed into handlers instead of living in a global.
#[derive(Clone)]
pub struct AppState {
    /// Lazily-initialized, construct-once agent cell
    pub agents: Arc<AgentCell>,
}
