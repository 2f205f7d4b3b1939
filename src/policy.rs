//! Trade sizing and pacing policy.
//!
//! Both functions are pure given the injected random source, so tests can
//! drive them with a seeded generator.

use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::time::Duration;

use crate::config::TradeSettings;

/// Trade size for the next cycle, in SOL.
///
/// Uniform in `[min_amount, max_amount)` when randomization is on, else
/// `min_amount`. An empty range always yields `min_amount`.
pub fn trade_amount<R: Rng>(settings: &TradeSettings, rng: &mut R) -> Decimal {
    if !settings.randomized || settings.min_amount >= settings.max_amount {
        return settings.min_amount;
    }
    let span = settings.max_amount - settings.min_amount;
    let fraction = Decimal::from_f64(rng.gen::<f64>()).unwrap_or_default();
    settings.min_amount + span * fraction
}

/// Delay before the next cycle.
///
/// Whole seconds, uniform in `[min_interval, max_interval)` when
/// randomization is on, else `min_interval`.
pub fn wait_interval<R: Rng>(settings: &TradeSettings, rng: &mut R) -> Duration {
    let secs = if !settings.randomized || settings.min_interval_secs >= settings.max_interval_secs
    {
        settings.min_interval_secs
    } else {
        rng.gen_range(settings.min_interval_secs..settings.max_interval_secs)
    };
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn randomized_settings() -> TradeSettings {
        TradeSettings {
            min_interval_secs: 60,
            max_interval_secs: 300,
            min_amount: Decimal::new(1, 2),
            max_amount: Decimal::new(1, 1),
            randomized: true,
            ..TradeSettings::default()
        }
    }

    #[test]
    fn randomized_outputs_stay_in_range() {
        let settings = randomized_settings();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..1000 {
            let amount = trade_amount(&settings, &mut rng);
            assert!(amount >= settings.min_amount, "amount {} below min", amount);
            assert!(amount < settings.max_amount, "amount {} not below max", amount);

            let interval = wait_interval(&settings, &mut rng);
            assert!(interval >= Duration::from_secs(60));
            assert!(interval < Duration::from_secs(300));
        }
    }

    #[test]
    fn non_randomized_always_uses_minimum() {
        let settings = TradeSettings {
            randomized: false,
            ..randomized_settings()
        };
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..10 {
            assert_eq!(trade_amount(&settings, &mut rng), settings.min_amount);
            assert_eq!(wait_interval(&settings, &mut rng), Duration::from_secs(60));
        }
    }

    #[test]
    fn degenerate_range_yields_minimum() {
        let settings = TradeSettings {
            min_interval_secs: 120,
            max_interval_secs: 120,
            min_amount: Decimal::new(5, 2),
            max_amount: Decimal::new(5, 2),
            randomized: true,
            ..TradeSettings::default()
        };
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(trade_amount(&settings, &mut rng), Decimal::new(5, 2));
        assert_eq!(wait_interval(&settings, &mut rng), Duration::from_secs(120));
    }
}
