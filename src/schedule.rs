//! Schedule parameter resolution: period units and yield strategies.
//!
//! Pure lookup tables mapping raw contract parameters (a period duration in
//! seconds, a yield strategy id) to what the UI shows for them. Resolution is
//! total: unknown durations fall back to the largest unit and unknown
//! strategy ids resolve to `None` rather than failing.

use once_cell::sync::Lazy;
use rust_decimal::Decimal;

use crate::types::DisplayAmount;

/// A display unit for period durations.
///
/// The table is ordered by threshold; a duration resolves to the first unit
/// whose threshold is strictly greater than it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodUnit {
    pub id: u64,
    /// Singular unit name; pluralized with "s" for display.
    pub name: &'static str,
    /// Upper bound (exclusive) of durations displayed in this unit.
    pub threshold_seconds: u64,
}

/// Ordered period unit table, seconds through months.
///
/// Anything at or above the month threshold is displayed in years.
pub static PERIOD_UNITS: &[PeriodUnit] = &[
    PeriodUnit {
        id: 0,
        name: "second",
        threshold_seconds: 60,
    },
    PeriodUnit {
        id: 1,
        name: "minute",
        threshold_seconds: 3_600,
    },
    PeriodUnit {
        id: 2,
        name: "hour",
        threshold_seconds: 86_400,
    },
    PeriodUnit {
        id: 3,
        name: "day",
        threshold_seconds: 604_800,
    },
    PeriodUnit {
        id: 4,
        name: "week",
        threshold_seconds: 2_592_000,
    },
    PeriodUnit {
        id: 5,
        name: "month",
        threshold_seconds: 31_536_000,
    },
];

/// Resolve a period duration to its pluralized display unit name.
///
/// Returns the name of the first unit in [`PERIOD_UNITS`] whose threshold is
/// strictly greater than `duration_seconds`, or `"years"` when none is.
/// Total over all durations; zero resolves to `"seconds"`.
pub fn resolve_period_name(duration_seconds: u64) -> String {
    for unit in PERIOD_UNITS {
        if duration_seconds < unit.threshold_seconds {
            return format!("{}s", unit.name);
        }
    }
    "years".to_string()
}

/// A yield-generating mechanism escrowed funds are deposited into while
/// awaiting release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YieldStrategy {
    pub id: u64,
    pub name: &'static str,
    /// Indicative annual percentage yield, for display only.
    pub apy: Decimal,
}

/// Known yield strategies, keyed by id. Ordering is presentational only.
pub static YIELD_STRATEGIES: Lazy<Vec<YieldStrategy>> = Lazy::new(|| {
    vec![
        YieldStrategy {
            id: 0,
            name: "None",
            apy: Decimal::ZERO,
        },
        YieldStrategy {
            id: 1,
            name: "Aave",
            apy: Decimal::new(50, 1),
        },
        YieldStrategy {
            id: 2,
            name: "Compound",
            apy: Decimal::new(38, 1),
        },
        YieldStrategy {
            id: 3,
            name: "Lido",
            apy: Decimal::new(42, 1),
        },
    ]
});

impl YieldStrategy {
    pub fn by_id(strategy_id: u64) -> Option<&'static YieldStrategy> {
        YIELD_STRATEGIES.iter().find(|s| s.id == strategy_id)
    }

    /// Estimated gain over one year for `amount`, in display units,
    /// rounded to cents.
    pub fn estimated_gain(&self, amount: &DisplayAmount) -> Decimal {
        (amount.0 * self.apy / Decimal::ONE_HUNDRED).round_dp(2)
    }
}

/// Resolve a strategy id to its display name.
///
/// Returns `None` for ids absent from [`YIELD_STRATEGIES`]; downstream
/// display code treats that as "unknown strategy".
pub fn resolve_strategy_name(strategy_id: u64) -> Option<&'static str> {
    YieldStrategy::by_id(strategy_id).map(|s| s.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_name_picks_smallest_exceeding_threshold() {
        assert_eq!(resolve_period_name(0), "seconds");
        assert_eq!(resolve_period_name(59), "seconds");
        assert_eq!(resolve_period_name(60), "minutes");
        assert_eq!(resolve_period_name(90), "minutes");
        assert_eq!(resolve_period_name(3_600), "hours");
        assert_eq!(resolve_period_name(86_400), "days");
        assert_eq!(resolve_period_name(604_800), "weeks");
        assert_eq!(resolve_period_name(2_592_000), "months");
    }

    #[test]
    fn period_name_falls_back_to_years() {
        assert_eq!(resolve_period_name(31_536_000), "years");
        assert_eq!(resolve_period_name(31_557_600), "years");
        assert_eq!(resolve_period_name(u64::MAX), "years");
    }

    #[test]
    fn strategy_name_lookup() {
        assert_eq!(resolve_strategy_name(0), Some("None"));
        assert_eq!(resolve_strategy_name(1), Some("Aave"));
        assert_eq!(resolve_strategy_name(999), None);
        assert_eq!(resolve_strategy_name(u64::MAX), None);
    }

    #[test]
    fn estimated_gain_rounds_to_cents() {
        let aave = YieldStrategy::by_id(1).unwrap();
        let amount = DisplayAmount::parse("100").unwrap();
        assert_eq!(aave.estimated_gain(&amount), Decimal::new(500, 2));

        let none = YieldStrategy::by_id(0).unwrap();
        assert_eq!(none.estimated_gain(&amount), Decimal::ZERO);
    }
}
