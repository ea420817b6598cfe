//! Expected discovery significance with a relative background uncertainty.

use statrs::distribution::{ContinuousCDF, Normal};
use statrs::function::beta::checked_beta_reg;

use ro_types::Sentinel;

/// Gaussian-equivalent significance of observing `signal + background`
/// events over `background` known to `relative_uncertainty`.
///
/// Treats the background estimate as an auxiliary Poisson measurement with
/// `tau = 1 / (background * relative_uncertainty²)` and converts the
/// binomial p-value `I_{1/(1+tau)}(s + b, b·tau + 1)` to a one-sided normal
/// quantile. Returns `NaN` where the inputs leave the test undefined.
pub fn binomial_exp_z(signal: f64, background: f64, relative_uncertainty: f64) -> f64 {
    let main = signal + background;
    let tau = 1.0 / (background * relative_uncertainty * relative_uncertainty);
    let aux = background * tau;

    if !(main > 0.0 && tau.is_finite() && tau > 0.0 && aux.is_finite()) {
        return f64::NAN;
    }

    let p_value = match checked_beta_reg(main, aux + 1.0, 1.0 / (1.0 + tau)) {
        Ok(p) if p.is_finite() => p.clamp(0.0, 1.0),
        _ => return f64::NAN,
    };

    Normal::new(0.0, 1.0).map_or(f64::NAN, |normal| -normal.inverse_cdf(p_value))
}

/// Thresholds that decide when a significance is meaningful at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignificanceInputs {
    pub insignificance_threshold: f64,
    pub relative_bkg_uncertainty: f64,
    pub bkg_stat_uncertainty: f64,
}

impl SignificanceInputs {
    /// Minimum unweighted background count for the estimate to be
    /// trusted: `1 / stat_uncertainty²`.
    pub fn min_raw_background(&self) -> f64 {
        1.0 / (self.bkg_stat_uncertainty * self.bkg_stat_uncertainty)
    }

    /// Significance of one cut, or a [`Sentinel`] value.
    ///
    /// Checks run in order: signal below threshold, background below
    /// threshold, raw background too small; otherwise [`binomial_exp_z`].
    pub fn evaluate(&self, signal: f64, background: f64, raw_background: f64) -> f64 {
        if signal < self.insignificance_threshold {
            return Sentinel::SignalInsignificant.value();
        }
        if background < self.insignificance_threshold {
            return Sentinel::BackgroundInsignificant.value();
        }
        if raw_background < self.min_raw_background() {
            return Sentinel::BackgroundUnreliable.value();
        }
        binomial_exp_z(signal, background, self.relative_bkg_uncertainty)
    }
}

impl Default for SignificanceInputs {
    fn default() -> Self {
        Self {
            insignificance_threshold: 0.5,
            relative_bkg_uncertainty: 0.3,
            bkg_stat_uncertainty: 0.3,
        }
    }
}
