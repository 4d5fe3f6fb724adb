use super::catalog::ComparisonKind;
use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Width of the warn band relative to the threshold.
pub const WARN_BAND_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::Pass => "pass",
            Verdict::Warn => "warn",
            Verdict::Fail => "fail",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PolicyOutcome {
    pub score: f64,
    pub verdict: Verdict,
}

/// Map a raw measurement against its threshold to a normalized score and a verdict.
///
/// Rejects `threshold <= 0` (or a non-finite threshold) and `distance < 0` (or NaN).
/// An infinite distance is accepted and lands at the far end of the scale.
pub fn evaluate(
    distance: f64,
    threshold: f64,
    comparison: ComparisonKind,
) -> Result<PolicyOutcome, Error> {
    if !(threshold.is_finite() && threshold > 0.0) {
        return Err(Error::InvalidThreshold(threshold));
    }
    if distance.is_nan() || distance < 0.0 {
        return Err(Error::InvalidDistance(distance));
    }

    let ratio = distance / threshold;
    let outcome = match comparison {
        ComparisonKind::LowerIsBetter => {
            let verdict = if distance <= threshold {
                Verdict::Pass
            } else if distance <= threshold * WARN_BAND_MULTIPLIER {
                Verdict::Warn
            } else {
                Verdict::Fail
            };
            PolicyOutcome {
                score: (1.0 - ratio).clamp(0.0, 1.0),
                verdict,
            }
        }
        ComparisonKind::HigherIsBetter => {
            let verdict = if distance >= threshold {
                Verdict::Pass
            } else if distance >= threshold / WARN_BAND_MULTIPLIER {
                Verdict::Warn
            } else {
                Verdict::Fail
            };
            PolicyOutcome {
                score: ratio.clamp(0.0, 1.0),
                verdict,
            }
        }
    };

    Ok(outcome)
}
