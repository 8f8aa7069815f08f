//! Request validation errors shared by the pull, push and advice endpoints.

/// A request that cannot be served as submitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Pull request without a usable `tickers` parameter.
    #[error("Tickers query parameter is required.")]
    MissingTickers,

    /// Push request without a usable `tickers` parameter.
    #[error("No tickers provided")]
    NoTickers,

    /// Advice request without a portfolio or with no holdings.
    #[error("Portfolio data is required.")]
    MissingPortfolio,
}
