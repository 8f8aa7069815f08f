//! Simulated Advice Generator
//!
//! Deterministic stand-in for a model-backed generator. Produces markdown
//! advice from the portfolio and the market snapshot using fixed thresholds
//! on each holding's daily change.

use std::fmt::Write as _;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::application::ports::{AdviceError, AdviceGeneratorPort};
use crate::domain::advice::{MarketSnapshot, PortfolioSnapshot, RequestContext};

/// Daily gain (percent) above which trimming is suggested.
const TRIM_THRESHOLD: f64 = 5.0;

/// Daily loss (percent) below which adding is suggested.
const DIP_THRESHOLD: f64 = -3.0;

/// Weight share above which a single holding counts as concentrated.
const CONCENTRATION_SHARE: f64 = 0.5;

const DISCLAIMER: &str = "**Disclaimer:** This information is for educational purposes only and is not financial advice. Please consult with a qualified financial advisor before making any investment decisions.";

/// Advice generator that needs no external model.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedAdviceGenerator;

impl SimulatedAdviceGenerator {
    /// Create a new generator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AdviceGeneratorPort for SimulatedAdviceGenerator {
    async fn generate(
        &self,
        _ctx: &RequestContext,
        portfolio: &PortfolioSnapshot,
        market: &MarketSnapshot,
    ) -> Result<String, AdviceError> {
        Ok(render_advice(portfolio, market))
    }
}

#[derive(Debug)]
struct Position<'a> {
    symbol: &'a str,
    value: Option<f64>,
    change_percent: Option<f64>,
}

fn render_advice(portfolio: &PortfolioSnapshot, market: &MarketSnapshot) -> String {
    let positions: Vec<Position<'_>> = portfolio
        .holdings
        .iter()
        .map(|h| {
            let quote = market.get(h.symbol.trim());
            let quantity = decimal_to_f64(h.quantity);
            Position {
                symbol: h.symbol.trim(),
                value: quote.and_then(|q| q.price).map(|p| p * quantity),
                change_percent: quote.and_then(|q| q.change_percent),
            }
        })
        .collect();

    let total: f64 = positions.iter().filter_map(|p| p.value).sum();
    let mut out = String::new();

    let _ = writeln!(out, "**Analysis:**");
    let _ = writeln!(
        out,
        "Your portfolio holds {} position(s); live prices were available for {}.",
        positions.len(),
        positions.iter().filter(|p| p.value.is_some()).count()
    );
    if let Some(top) = positions
        .iter()
        .filter(|p| p.value.is_some())
        .max_by(|a, b| a.value.unwrap_or(0.0).total_cmp(&b.value.unwrap_or(0.0)))
        && total > 0.0
    {
        let share = top.value.unwrap_or(0.0) / total;
        if share > CONCENTRATION_SHARE {
            let _ = writeln!(
                out,
                "{} makes up {:.0}% of the priced value, which is a concentrated exposure. Diversification could be improved.",
                top.symbol,
                share * 100.0
            );
        } else {
            let _ = writeln!(out, "No single holding dominates the priced value.");
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "**Recommendations:**");
    for (i, position) in positions.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, recommendation(position));
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "**Summary:** Review the recommendations above against your own goals and time horizon."
    );
    let _ = writeln!(out);
    let _ = write!(out, "{DISCLAIMER}");
    out
}

fn recommendation(position: &Position<'_>) -> String {
    match position.change_percent {
        Some(change) if change > TRIM_THRESHOLD => format!(
            "**Consider trimming {}:** it is up {change:.2}% today. Taking partial profits would reduce exposure.",
            position.symbol
        ),
        Some(change) if change < DIP_THRESHOLD => format!(
            "**Watch {} for an entry:** it is down {:.2}% today, which may be a buying opportunity if the thesis holds.",
            position.symbol,
            change.abs()
        ),
        Some(change) => format!(
            "**Hold {}:** the move today ({change:+.2}%) does not call for action.",
            position.symbol
        ),
        None => format!(
            "**Review {}:** no live market data was available for this holding.",
            position.symbol
        ),
    }
}

fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
