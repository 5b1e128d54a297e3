use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse design snapshot JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    /// An operation referenced a Node/Link/Demand/... that is not present in
    /// the expected layer or store.
    #[error("Referential integrity: {0}")]
    ReferentialIntegrity(String),

    /// The operation would break a documented model invariant (nested backup
    /// routes, disconnected route walk, coupled-link capacity edit, ...).
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A path / service-chain / disjoint-pair search found no valid result
    /// under the given limits. A normal negative answer, not a fault.
    #[error("Infeasible: {0}")]
    Infeasible(String),

    /// Forwarding-rule resolution could not reach a stable flow assignment
    /// (closed routing loop with no escape).
    #[error("Non-convergence resolving hop-by-hop traffic: {0}")]
    NonConvergence(String),

    /// A cached index disagrees with primary store state. Unlike every other
    /// variant this indicates a defect in the mutation cascade logic and
    /// callers should treat it as fatal.
    #[error("Internal inconsistency: {0}")]
    Inconsistency(String),
}

pub type Result<T> = std::result::Result<T, Error>;
