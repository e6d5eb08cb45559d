//! Discrepancy calculation and severity classification
//!
//! The calculator is pure: it only looks at the two counts it is given and
//! never touches persistence. Line items use it while counting, the
//! orchestrator uses it for final ledger figures, and reporting uses it
//! together with [`SeverityBands`] to flag unusual discrepancies.

use serde::{Deserialize, Serialize};

use crate::error::OpnameError;

/// Variance between the recorded and the counted quantity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    /// `actual - system`; positive is a surplus, negative a shortage
    pub variance: i64,
    /// Variance relative to the system quantity, in percent
    pub variance_percent: f64,
}

impl Discrepancy {
    /// Computes the discrepancy between a system and an actual quantity
    ///
    /// When the system quantity is zero the percentage cannot be derived
    /// from the ratio: it is `0` if nothing was counted either and `100`
    /// otherwise, whatever the sign of the count. The variance saturates at
    /// the `i64` bounds instead of overflowing.
    ///
    /// # Example
    ///
    /// ```rust
    /// use domain_opname::Discrepancy;
    ///
    /// let d = Discrepancy::calculate(100, 90);
    /// assert_eq!(d.variance, -10);
    /// assert_eq!(d.variance_percent, -10.0);
    ///
    /// assert_eq!(Discrepancy::calculate(0, 0).variance_percent, 0.0);
    /// assert_eq!(Discrepancy::calculate(0, 7).variance_percent, 100.0);
    /// ```
    pub fn calculate(system_quantity: i64, actual_quantity: i64) -> Self {
        let variance = actual_quantity.saturating_sub(system_quantity);
        let variance_percent = if system_quantity == 0 {
            if actual_quantity == 0 {
                0.0
            } else {
                100.0
            }
        } else {
            variance as f64 * 100.0 / system_quantity as f64
        };

        Self {
            variance,
            variance_percent,
        }
    }

    /// A discrepancy with no variance at all
    pub fn none() -> Self {
        Self {
            variance: 0,
            variance_percent: 0.0,
        }
    }

    /// True when the counted quantity differs from the recorded one
    pub fn is_nonzero(&self) -> bool {
        self.variance != 0
    }

    /// True when fewer units were counted than recorded
    pub fn is_shortage(&self) -> bool {
        self.variance < 0
    }

    /// True when more units were counted than recorded
    pub fn is_surplus(&self) -> bool {
        self.variance > 0
    }
}

/// A named variance-percent range used to flag discrepancies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityBand {
    /// Flag name shown to reviewers, e.g. `HIGH_LOSS`
    pub name: String,
    /// Inclusive lower bound in percent
    pub min_percent: f64,
    /// Inclusive upper bound in percent
    pub max_percent: f64,
    /// Whether discrepancies in this band need a supervisor's sign-off
    #[serde(default)]
    pub requires_approval: bool,
}

impl SeverityBand {
    /// Creates a band
    pub fn new(name: impl Into<String>, min_percent: f64, max_percent: f64) -> Self {
        Self {
            name: name.into(),
            min_percent,
            max_percent,
            requires_approval: false,
        }
    }

    /// Marks the band as requiring approval
    pub fn requiring_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    /// True when the percentage falls inside the band (bounds inclusive)
    pub fn contains(&self, percent: f64) -> bool {
        percent >= self.min_percent && percent <= self.max_percent
    }
}

/// Ordered set of severity bands
///
/// Bands are evaluated in order and the first match wins, so overlapping
/// bounds resolve toward the earlier band. This value is always passed in
/// explicitly by the caller; there is no process-wide default instance.
/// Configuration supplies a plain list of [`SeverityBand`] and goes through
/// [`SeverityBands::new`], so this type is never deserialized directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SeverityBands {
    bands: Vec<SeverityBand>,
}

impl SeverityBands {
    /// Builds a validated band set
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` if a band has an empty name, a lower bound
    /// above its upper bound, a NaN bound, or a name used twice.
    pub fn new(bands: Vec<SeverityBand>) -> Result<Self, OpnameError> {
        let mut seen = std::collections::HashSet::new();
        for band in &bands {
            if band.name.trim().is_empty() {
                return Err(OpnameError::validation("severity band name must not be empty"));
            }
            if band.min_percent.is_nan() || band.max_percent.is_nan() {
                return Err(OpnameError::validation(format!(
                    "severity band {} has a NaN bound",
                    band.name
                )));
            }
            if band.min_percent > band.max_percent {
                return Err(OpnameError::validation(format!(
                    "severity band {} has min {} above max {}",
                    band.name, band.min_percent, band.max_percent
                )));
            }
            if !seen.insert(band.name.as_str()) {
                return Err(OpnameError::validation(format!(
                    "severity band {} is defined twice",
                    band.name
                )));
            }
        }
        Ok(Self { bands })
    }

    /// Returns the first band containing the percentage
    pub fn classify(&self, variance_percent: f64) -> Option<&SeverityBand> {
        self.bands.iter().find(|band| band.contains(variance_percent))
    }

    /// Classifies a discrepancy by its percentage
    pub fn classify_discrepancy(&self, discrepancy: &Discrepancy) -> Option<&SeverityBand> {
        self.classify(discrepancy.variance_percent)
    }

    /// The configured bands in evaluation order
    pub fn bands(&self) -> &[SeverityBand] {
        &self.bands
    }
}

impl Default for SeverityBands {
    /// Losses of 20% or more are high, losses beyond 10% moderate, gains
    /// beyond 10% high, and everything from -10% to 10% normal.
    ///
    /// `NORMAL` is listed before `MODERATE_LOSS` so that exactly -10% stays
    /// normal; the moderate band only catches the open range (-20, -10).
    fn default() -> Self {
        Self {
            bands: vec![
                SeverityBand::new("HIGH_LOSS", f64::MIN, -20.0).requiring_approval(),
                SeverityBand::new("NORMAL", -10.0, 10.0),
                SeverityBand::new("MODERATE_LOSS", -20.0, -10.0),
                SeverityBand::new("HIGH_GAIN", 10.0, f64::MAX).requiring_approval(),
            ],
        }
    }
}
