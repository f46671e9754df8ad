//! Black–Scholes option analytics: premium, Greeks, and an implied-volatility solver.

use crate::error::Error;

const SECONDS_PER_YEAR: f64 = 365.0 * 86_400.0;
const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Option payoff shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    /// European call.
    Call,
    /// European put.
    Put,
    /// Long straddle (one call + one put at the same strike).
    Straddle,
}

/// A European option (or straddle) definition.
#[derive(Debug, Clone, Copy)]
pub struct Option_ {
    /// Payoff shape.
    pub option_type: OptionType,
    /// Strike price.
    pub strike: f64,
    /// Maturity, epoch seconds.
    pub maturity: i64,
}

/// Standard normal CDF via the Abramowitz–Stegun rational approximation.
#[must_use]
pub fn normal_cdf(x: f64) -> f64 {
    let k = 1.0 / (1.0 + 0.231_641_9 * x);
    let poly = k
        * (0.319_381_530
            + k * (-0.356_563_782 + k * (1.781_477_937 + k * (-1.821_255_978 + 1.330_274_429 * k))));

    if x >= 0.0 {
        1.0 - normal_pdf(x) * poly
    } else {
        1.0 - normal_cdf(-x)
    }
}

/// Standard normal PDF.
#[must_use]
pub fn normal_pdf(x: f64) -> f64 {
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

struct Moments {
    n1: f64,
    n2: f64,
    n: f64,
    discount: f64,
}

fn moments(option: &Option_, spot: f64, forward: f64, vol: f64, t: i64) -> Moments {
    let tau = (option.maturity - t) as f64 / SECONDS_PER_YEAR;
    let sqrt_tau = tau.sqrt();
    let d1 = (forward / option.strike).ln() / (vol * sqrt_tau) + 0.5 * vol * sqrt_tau;
    let d2 = d1 - vol * sqrt_tau;
    let discount = spot / forward;

    let (n1, n2, n) = match option.option_type {
        OptionType::Call => (normal_cdf(d1), normal_cdf(d2), normal_pdf(d1)),
        OptionType::Put => (normal_cdf(d1) - 1.0, normal_cdf(d2) - 1.0, normal_pdf(d1)),
        OptionType::Straddle => (
            2.0 * normal_cdf(d1) - 1.0,
            2.0 * normal_cdf(d2) - 1.0,
            2.0 * normal_pdf(d1),
        ),
    };

    Moments { n1, n2, n, discount }
}

fn tau_sqrt(option: &Option_, t: i64) -> f64 {
    ((option.maturity - t) as f64 / SECONDS_PER_YEAR).sqrt()
}

/// Black–Scholes premium.
#[must_use]
pub fn premium(option: &Option_, spot: f64, forward: f64, vol: f64, t: i64) -> f64 {
    let m = moments(option, spot, forward, vol, t);
    m.discount * (forward * m.n1 - option.strike * m.n2)
}

/// Option delta (∂premium/∂spot, expressed as `N1`).
#[must_use]
pub fn delta(option: &Option_, spot: f64, forward: f64, vol: f64, t: i64) -> f64 {
    moments(option, spot, forward, vol, t).n1
}

/// Option gamma.
#[must_use]
pub fn gamma(option: &Option_, spot: f64, forward: f64, vol: f64, t: i64) -> f64 {
    let m = moments(option, spot, forward, vol, t);
    m.n / (spot * vol * tau_sqrt(option, t))
}

/// Option vega.
#[must_use]
pub fn vega(option: &Option_, spot: f64, forward: f64, vol: f64, t: i64) -> f64 {
    let m = moments(option, spot, forward, vol, t);
    spot * tau_sqrt(option, t) * m.n
}

/// Solve for the volatility that reproduces `market_premium` via Newton's method.
///
/// # Errors
///
/// Returns [`Error::NotConverged`] if `max_steps` is exhausted before `|premium - market_premium|`
/// drops below `tolerance`.
#[allow(clippy::too_many_arguments)]
pub fn implied_vol(
    option: &Option_,
    market_premium: f64,
    spot: f64,
    forward: f64,
    t: i64,
    tolerance: f64,
    max_steps: usize,
    initial_guess: f64,
) -> Result<f64, Error> {
    let mut vol = initial_guess;

    for _ in 0..max_steps {
        let p = premium(option, spot, forward, vol, t);
        let v = vega(option, spot, forward, vol, t);
        let diff = market_premium - p;
        vol += diff / v;

        if diff.abs() < tolerance {
            return Ok(vol);
        }
    }

    Err(Error::NotConverged(max_steps))
}

/// `implied_vol` with default tolerances: `tolerance = 1e-6`, `max_steps = 100`,
/// `initial_guess = 1.0`.
///
/// # Errors
///
/// See [`implied_vol`].
pub fn implied_vol_default(
    option: &Option_,
    market_premium: f64,
    spot: f64,
    forward: f64,
    t: i64,
) -> Result<f64, Error> {
    implied_vol(option, market_premium, spot, forward, t, 1e-6, 100, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(strike: f64, maturity: i64) -> Option_ {
        Option_ {
            option_type: OptionType::Call,
            strike,
            maturity,
        }
    }

    #[test]
    fn put_call_parity_holds() {
        let t = 0;
        let maturity = (0.25 * SECONDS_PER_YEAR) as i64;
        let (spot, forward, vol, strike) = (100.0, 100.0, 0.5, 100.0);

        let c = Option_ { option_type: OptionType::Call, strike, maturity };
        let p = Option_ { option_type: OptionType::Put, strike, maturity };
        let s = Option_ { option_type: OptionType::Straddle, strike, maturity };

        let premium_c = premium(&c, spot, forward, vol, t);
        let premium_p = premium(&p, spot, forward, vol, t);
        let premium_s = premium(&s, spot, forward, vol, t);

        let discount = spot / forward;
        assert!((premium_c - premium_p - discount * (forward - strike)).abs() < 1e-9);
        assert!((premium_s - (premium_c + premium_p)).abs() < 1e-9);
    }

    #[test]
    fn s7_implied_vol_round_trips() {
        let maturity = (0.25 * SECONDS_PER_YEAR) as i64;
        let option = call(100.0, maturity);
        let (spot, forward, t) = (100.0, 100.0, 0);

        let target_vol = 0.5;
        let target_premium = premium(&option, spot, forward, target_vol, t);

        let solved = implied_vol_default(&option, target_premium, spot, forward, t).unwrap();
        assert!((solved - target_vol).abs() < 1e-6);
    }

    #[test]
    fn implied_vol_reports_not_converged_on_exhausted_steps() {
        let maturity = (0.25 * SECONDS_PER_YEAR) as i64;
        let option = call(100.0, maturity);

        let err = implied_vol(&option, 1e9, 100.0, 100.0, 0, 1e-12, 2, 1.0).unwrap_err();
        assert!(matches!(err, Error::NotConverged(2)));
    }
}
