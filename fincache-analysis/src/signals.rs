//! RSI and MACD readings over a daily close series.

use serde::{Deserialize, Serialize};

use crate::{round2, round_to};

const RSI_PERIOD: usize = 14;
const RSI_NEUTRAL: f64 = 50.0;
const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;
const MACD_FAST_SPAN: usize = 12;
const MACD_SLOW_SPAN: usize = 26;
const MACD_SIGNAL_SPAN: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiSignal {
    Overbought,
    Oversold,
    Neutral,
}

impl RsiSignal {
    fn from_rsi(rsi: f64) -> Self {
        if rsi > RSI_OVERBOUGHT {
            RsiSignal::Overbought
        } else if rsi < RSI_OVERSOLD {
            RsiSignal::Oversold
        } else {
            RsiSignal::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacdTrend {
    Bullish,
    Bearish,
}

/// Latest indicator values. RSI is reported at 2dp, MACD lines at 4dp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSignals {
    pub rsi: f64,
    pub rsi_signal: RsiSignal,
    pub macd_trend: MacdTrend,
    pub macd_value: f64,
    pub macd_signal: f64,
}

impl TechnicalSignals {
    /// Read the indicators at the last close of `prices` (oldest first).
    ///
    /// A series too short for a 14-period RSI reports the neutral 50; an
    /// empty one reports flat MACD lines.
    pub fn from_prices(prices: &[f64]) -> Self {
        let rsi = rsi(prices, RSI_PERIOD).unwrap_or(RSI_NEUTRAL);

        let fast = ema(prices, MACD_FAST_SPAN);
        let slow = ema(prices, MACD_SLOW_SPAN);
        let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema(&macd, MACD_SIGNAL_SPAN);
        let macd_value = macd.last().copied().unwrap_or(0.0);
        let macd_signal = signal.last().copied().unwrap_or(0.0);

        Self {
            rsi: round2(rsi),
            rsi_signal: RsiSignal::from_rsi(rsi),
            macd_trend: if macd_value > macd_signal {
                MacdTrend::Bullish
            } else {
                MacdTrend::Bearish
            },
            macd_value: round_to(macd_value, 4),
            macd_signal: round_to(macd_signal, 4),
        }
    }
}

/// Simple-average RSI over the last `period` price changes.
fn rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() <= period {
        return None;
    }
    let recent = &prices[prices.len() - period - 1..];
    let (gain, loss) = recent.windows(2).fold((0.0, 0.0), |(g, l), w| {
        let delta = w[1] - w[0];
        (g + delta.max(0.0), l + (-delta).max(0.0))
    });
    let avg_gain = gain / period as f64;
    let avg_loss = loss / period as f64;
    let rs = avg_gain / (avg_loss + 1e-10);
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Recursive exponential moving average seeded with the first value.
fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &v in values {
        let next = prev.map_or(v, |p| alpha * v + (1.0 - alpha) * p);
        out.push(next);
        prev = Some(next);
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================
