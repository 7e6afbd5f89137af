use analysis_core::stats::{mean, median_sorted, percentile_sorted, std_population};
use analysis_core::{McDistribution, Unavailable};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use statrs::distribution::Normal;

use crate::dcf::{dcf_fair_value, DcfInputs};

const GROWTH_SD_FACTOR: f64 = 0.3;
const WACC_SD_FACTOR: f64 = 0.15;
const TERMINAL_SD: f64 = 0.005;
const WACC_BOUNDS: (f64, f64) = (0.05, 0.25);
const TERMINAL_BOUNDS: (f64, f64) = (0.0, 0.05);

#[derive(Debug, Clone, Copy)]
pub struct MonteCarloConfig {
    pub trials: usize,
    pub seed: u64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self { trials: 1000, seed: 42 }
    }
}

/// One normal draw; a zero or invalid spread collapses to the mean.
fn draw(rng: &mut StdRng, mean: f64, sd: f64) -> f64 {
    match Normal::new(mean, sd.abs()) {
        Ok(dist) if sd.abs() > 0.0 => dist.sample(rng),
        _ => mean,
    }
}

/// Run one trial; `None` when the draw is discarded or produces no value.
fn trial(base: &DcfInputs, rng: &mut StdRng) -> Option<f64> {
    let growth = draw(rng, base.growth, base.growth * GROWTH_SD_FACTOR);
    let wacc = draw(rng, base.wacc, base.wacc * WACC_SD_FACTOR).clamp(WACC_BOUNDS.0, WACC_BOUNDS.1);
    let terminal_growth =
        draw(rng, base.terminal_growth, TERMINAL_SD).clamp(TERMINAL_BOUNDS.0, TERMINAL_BOUNDS.1);

    // Discarded, never redrawn.
    if wacc <= terminal_growth {
        return None;
    }

    let inputs = DcfInputs {
        growth,
        wacc,
        terminal_growth,
        ..base.clone()
    };
    dcf_fair_value(&inputs).ok().filter(|fv| *fv > 0.0)
}

/// Monte Carlo distribution of DCF fair value around `base`.
///
/// Trial `i` draws from its own generator seeded with `seed + i`, so the
/// result does not depend on how rayon schedules the work.
pub fn monte_carlo_dcf(base: &DcfInputs, config: &MonteCarloConfig) -> Result<McDistribution, Unavailable> {
    let mut values: Vec<f64> = (0..config.trials)
        .into_par_iter()
        .filter_map(|i| {
            let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(i as u64));
            trial(base, &mut rng)
        })
        .collect();

    if values.is_empty() {
        return Err(Unavailable::new("no Monte Carlo trial produced a fair value"));
    }
    if values.len() < config.trials {
        tracing::debug!("Monte Carlo kept {}/{} trials", values.len(), config.trials);
    }

    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = values.len();
    let pct = |q: f64| percentile_sorted(&values, q).unwrap_or(0.0);
    Ok(McDistribution {
        mean: mean(&values).unwrap_or(0.0),
        median: median_sorted(&values).unwrap_or(0.0),
        p10: pct(10.0),
        p25: pct(25.0),
        p75: pct(75.0),
        p90: pct(90.0),
        std: std_population(&values).unwrap_or(0.0),
        n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DcfInputs {
        DcfInputs::perpetuity(10e9, 0.08, 0.03, 0.10, 5, 1e9)
    }

    #[test]
    fn test_deterministic_under_seed() {
        let config = MonteCarloConfig::default();
        let a = monte_carlo_dcf(&base(), &config).unwrap();
        let b = monte_carlo_dcf(&base(), &config).unwrap();
        assert_eq!(a, b);

        let other = monte_carlo_dcf(&base(), &MonteCarloConfig { trials: 1000, seed: 7 }).unwrap();
        assert_ne!(a.mean, other.mean);
    }

    #[test]
    fn test_distribution_shape() {
        let d = monte_carlo_dcf(&base(), &MonteCarloConfig::default()).unwrap();
        assert!(d.n > 0 && d.n <= 1000);
        assert!(d.p10 <= d.p25 && d.p25 <= d.median && d.median <= d.p75 && d.p75 <= d.p90);
        assert!(d.std > 0.0);
        assert!(d.mean > 0.0);
    }

    #[test]
    fn test_no_survivors_is_unavailable() {
        let mut dead = base();
        dead.fcf = -1.0;
        assert!(monte_carlo_dcf(&dead, &MonteCarloConfig::default()).is_err());
        assert!(monte_carlo_dcf(&base(), &MonteCarloConfig { trials: 0, seed: 42 }).is_err());
    }

    #[test]
    fn test_zero_growth_spread_collapses_to_mean() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(draw(&mut rng, 0.0, 0.0), 0.0);
        assert_eq!(draw(&mut rng, 0.05, 0.0), 0.05);
    }
}
