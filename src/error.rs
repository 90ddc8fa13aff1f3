use thiserror::Error;

/// Errors surfaced by the constrained Monte Carlo driver.
///
/// Sphere rejects and energy rejects are normal sampling outcomes and are
/// counted, never signaled. Only contract violations reach this type.
#[derive(Debug, Error)]
pub enum CmcError {
    /// A construction-time parameter was unusable. Fatal to the driver.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The energy oracle returned a non-finite site energy. The in-flight
    /// provisional move has been reverted before this is raised, so the
    /// spin field is left in its last accepted state.
    #[error("energy oracle returned a non-finite energy for site {site}")]
    OracleContractViolation { site: usize },

    /// A cancellation request was observed between sweeps.
    #[error("run cancelled between sweeps")]
    Cancelled,
}
