use analysis_core::{ImpliedGrowth, Unavailable};

use crate::dcf::{dcf_fair_value, DcfInputs};

const GROWTH_LOW: f64 = -0.5;
const GROWTH_HIGH: f64 = 1.0;
const ITERATIONS: usize = 50;
const PRICE_TOLERANCE: f64 = 0.01;

/// Growth rate at which the DCF of `base` equals `price`, by bisection.
///
/// A growth that yields no fair value counts as a fair value of 0. When the
/// search never lands within tolerance the final midpoint is returned with
/// `converged = false`; `bracketed` tells whether the price lay between the
/// fair values at the two search endpoints at all.
pub fn implied_growth(price: f64, base: &DcfInputs) -> Result<ImpliedGrowth, Unavailable> {
    if base.fcf <= 0.0 || base.shares <= 0.0 {
        return Err(Unavailable::new("free cash flow and shares must be positive"));
    }
    if !(price.is_finite() && price > 0.0) {
        return Err(Unavailable::new("price must be positive"));
    }

    let fair_value_at = |g: f64| dcf_fair_value(&base.with_growth(g)).unwrap_or(0.0);

    let bracketed = fair_value_at(GROWTH_LOW) <= price && price <= fair_value_at(GROWTH_HIGH);

    let (mut low, mut high) = (GROWTH_LOW, GROWTH_HIGH);
    for _ in 0..ITERATIONS {
        let mid = (low + high) / 2.0;
        let fv = fair_value_at(mid);
        if (fv - price).abs() < PRICE_TOLERANCE {
            return Ok(ImpliedGrowth {
                growth: mid,
                converged: true,
                bracketed,
            });
        }
        if fv < price {
            low = mid;
        } else {
            high = mid;
        }
    }

    Ok(ImpliedGrowth {
        growth: (low + high) / 2.0,
        converged: false,
        bracketed,
    })
}
