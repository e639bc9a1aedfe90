use serde::{Deserialize, Serialize};

/// How a statistic value reads to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatisticState {
    /// Good news.
    Positive,
    /// Bad news.
    Negative,
    /// Neither.
    Inconclusive,
}

/// Classify a summary statistic by name and formatted value.
///
/// Return-like statistics are positive unless the value carries a minus sign;
/// fees are never judged; any other statistic is negative when it carries a
/// minus sign and inconclusive otherwise.
#[must_use]
pub fn classify_statistic(key: &str, value: &str) -> StatisticState {
    let negative = value.contains('-');
    match key {
        "Unrealized" | "Net Profit" | "Return" | "Sharpe Ratio" => {
            if negative {
                StatisticState::Negative
            } else {
                StatisticState::Positive
            }
        }
        "Fees" => StatisticState::Inconclusive,
        _ if negative => StatisticState::Negative,
        _ => StatisticState::Inconclusive,
    }
}
