use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use domain::WalletSnapshot;

/// Percentage change from `past` to `current`; `None` when there is no base to compare.
pub fn percent_change(current: f64, past: f64) -> Option<f64> {
    if past == 0.0 || !past.is_finite() {
        return None;
    }
    Some(current / past * 100.0 - 100.0)
}

/// Value of the earliest snapshot recorded on `day` (UTC).
pub fn value_on_day(snapshots: &[WalletSnapshot], day: NaiveDate) -> Option<f64> {
    snapshots
        .iter()
        .filter(|s| s.created_at.date_naive() == day)
        .min_by_key(|s| s.created_at)
        .map(|s| s.value)
}

pub fn daily_reference(now: DateTime<Utc>) -> NaiveDate {
    (now - Duration::days(1)).date_naive()
}

/// Same calendar day one month back, clamped to the end of shorter months.
pub fn monthly_reference(now: DateTime<Utc>) -> Option<NaiveDate> {
    now.checked_sub_months(Months::new(1)).map(|then| then.date_naive())
}

pub fn daily_change(current: f64, snapshots: &[WalletSnapshot], now: DateTime<Utc>) -> Option<f64> {
    value_on_day(snapshots, daily_reference(now)).and_then(|past| percent_change(current, past))
}

pub fn monthly_change(
    current: f64,
    snapshots: &[WalletSnapshot],
    now: DateTime<Utc>,
) -> Option<f64> {
    let day = monthly_reference(now)?;
    value_on_day(snapshots, day).and_then(|past| percent_change(current, past))
}
