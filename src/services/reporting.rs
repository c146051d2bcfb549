use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::ReportingConfig;
use crate::db::DbPool;
use crate::entities::{contact, order, visit};
use crate::errors::ServiceError;

/// A concrete reporting interval. Bounds are inclusive; `end` is pinned to
/// the last millisecond of its day so day-granularity filters behave the way
/// dashboard consumers expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReportingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportingWindow {
    fn from_days(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: start_of_day(start),
            end: end_of_day(end),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .expect("midnight exists on every day")
        .and_utc()
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_milli_opt(23, 59, 59, 999)
        .expect("last millisecond exists on every day")
        .and_utc()
}

/// Monday of the ISO week containing `date`; a Sunday maps to the Monday six
/// days earlier.
fn monday_of_week(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).expect("every month has a first day")
}

fn first_of_quarter(date: NaiveDate) -> NaiveDate {
    let quarter_month = ((date.month0() / 3) * 3) + 1;
    NaiveDate::from_ymd_opt(date.year(), quarter_month, 1)
        .expect("every quarter has a first day")
}

/// Named reporting periods accepted by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportPeriod {
    AllTime,
    Today,
    Yesterday,
    ThisWeek,
    #[strum(serialize = "last_7d")]
    #[serde(rename = "last_7d")]
    Last7d,
    LastWeek,
    #[strum(serialize = "last_28d")]
    #[serde(rename = "last_28d")]
    Last28d,
    #[strum(serialize = "last_30d")]
    #[serde(rename = "last_30d")]
    Last30d,
    ThisMonth,
    LastMonth,
    #[strum(serialize = "last_90d")]
    #[serde(rename = "last_90d")]
    Last90d,
    QuarterToDate,
    ThisYear,
    LastYear,
}

/// Maps a named period to a concrete window. Pure function of
/// `(period, today, launch_date)`; no I/O.
pub fn resolve_period(
    period: ReportPeriod,
    today: NaiveDate,
    launch_date: NaiveDate,
) -> ReportingWindow {
    match period {
        ReportPeriod::AllTime => ReportingWindow::from_days(launch_date, today),
        ReportPeriod::Today => ReportingWindow::from_days(today, today),
        ReportPeriod::Yesterday => {
            let yesterday = today - Days::new(1);
            ReportingWindow::from_days(yesterday, yesterday)
        }
        ReportPeriod::ThisWeek => ReportingWindow::from_days(monday_of_week(today), today),
        ReportPeriod::Last7d => {
            ReportingWindow::from_days(today - Days::new(7), today - Days::new(1))
        }
        ReportPeriod::LastWeek => {
            let monday = monday_of_week(today) - Days::new(7);
            ReportingWindow::from_days(monday, monday + Days::new(6))
        }
        ReportPeriod::Last28d => {
            ReportingWindow::from_days(today - Days::new(28), today - Days::new(1))
        }
        ReportPeriod::Last30d => {
            ReportingWindow::from_days(today - Days::new(30), today - Days::new(1))
        }
        ReportPeriod::ThisMonth => ReportingWindow::from_days(first_of_month(today), today),
        ReportPeriod::LastMonth => {
            let last_of_previous = first_of_month(today) - Days::new(1);
            ReportingWindow::from_days(first_of_month(last_of_previous), last_of_previous)
        }
        ReportPeriod::Last90d => {
            ReportingWindow::from_days(today - Days::new(90), today - Days::new(1))
        }
        ReportPeriod::QuarterToDate => ReportingWindow::from_days(first_of_quarter(today), today),
        ReportPeriod::ThisYear => ReportingWindow::from_days(
            NaiveDate::from_ymd_opt(today.year(), 1, 1).expect("Jan 1 exists"),
            today,
        ),
        ReportPeriod::LastYear => ReportingWindow::from_days(
            NaiveDate::from_ymd_opt(today.year() - 1, 1, 1).expect("Jan 1 exists"),
            NaiveDate::from_ymd_opt(today.year() - 1, 12, 31).expect("Dec 31 exists"),
        ),
    }
}

/// Explicit-range mode: caller-supplied literal bounds, widened to whole days.
pub fn resolve_explicit(from: NaiveDate, to: NaiveDate) -> Result<ReportingWindow, ServiceError> {
    if to < from {
        return Err(ServiceError::InvalidRequest(format!(
            "reporting range end {to} precedes start {from}"
        )));
    }
    Ok(ReportingWindow::from_days(from, to))
}

/// Aggregates returned to dashboard consumers; rendering is out of scope.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReportSummary {
    pub window: ReportingWindow,
    pub orders_fulfilled: u64,
    pub orders_failed: u64,
    pub gross_revenue: Decimal,
    pub visits: u64,
    pub contacts: u64,
}

/// Resolves reporting windows and answers window-filtered aggregate queries.
#[derive(Clone)]
pub struct ReportingService {
    db: Arc<DbPool>,
    config: ReportingConfig,
}

impl ReportingService {
    pub fn new(db: Arc<DbPool>, config: ReportingConfig) -> Self {
        Self { db, config }
    }

    /// Resolves a named period key. An unrecognized key falls back to the
    /// `today` window unless `strict_periods` is set, in which case it is a
    /// caller error.
    pub fn resolve_key(&self, key: &str, today: NaiveDate) -> Result<ReportingWindow, ServiceError> {
        match key.parse::<ReportPeriod>() {
            Ok(period) => Ok(resolve_period(period, today, self.config.launch_date)),
            Err(_) if self.config.strict_periods => Err(ServiceError::InvalidRequest(format!(
                "unknown reporting period: {key}"
            ))),
            Err(_) => {
                tracing::debug!(key = %key, "unknown reporting period, defaulting to today");
                Ok(resolve_period(
                    ReportPeriod::Today,
                    today,
                    self.config.launch_date,
                ))
            }
        }
    }

    /// Counts orders, visits and contacts inside the window for one merchant.
    #[instrument(skip(self), fields(merchant_id = %merchant_id))]
    pub async fn summary(
        &self,
        merchant_id: Uuid,
        window: ReportingWindow,
    ) -> Result<ReportSummary, ServiceError> {
        let fulfilled = order::Entity::find()
            .filter(order::Column::MerchantId.eq(merchant_id))
            .filter(order::Column::Status.eq(order::status::FULFILLED))
            .filter(order::Column::CreatedAt.between(window.start, window.end))
            .all(&*self.db)
            .await?;
        let gross_revenue: Decimal = fulfilled.iter().map(|o| o.amount).sum();

        let orders_failed = order::Entity::find()
            .filter(order::Column::MerchantId.eq(merchant_id))
            .filter(order::Column::Status.eq(order::status::FAILED))
            .filter(order::Column::CreatedAt.between(window.start, window.end))
            .count(&*self.db)
            .await?;

        let visits = visit::Entity::find()
            .inner_join(crate::entities::funnel::Entity)
            .filter(crate::entities::funnel::Column::MerchantId.eq(merchant_id))
            .filter(visit::Column::CreatedAt.between(window.start, window.end))
            .count(&*self.db)
            .await?;

        let contacts = contact::Entity::find()
            .filter(contact::Column::MerchantId.eq(merchant_id))
            .filter(contact::Column::CreatedAt.between(window.start, window.end))
            .count(&*self.db)
            .await?;

        Ok(ReportSummary {
            window,
            orders_fulfilled: fulfilled.len() as u64,
            orders_failed,
            gross_revenue,
            visits,
            contacts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn launch() -> NaiveDate {
        date(2023, 1, 1)
    }

    #[test]
    fn yesterday_spans_the_whole_previous_day() {
        let window = resolve_period(ReportPeriod::Yesterday, date(2025, 3, 10), launch());
        assert_eq!(window.start.to_rfc3339(), "2025-03-09T00:00:00+00:00");
        assert_eq!(
            window.end.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "2025-03-09T23:59:59.999Z"
        );
    }

    #[test]
    fn last_week_is_monday_through_sunday() {
        // 2025-03-12 is a Wednesday
        let window = resolve_period(ReportPeriod::LastWeek, date(2025, 3, 12), launch());
        assert_eq!(window.start, start_of_day(date(2025, 3, 3)));
        assert_eq!(window.end, end_of_day(date(2025, 3, 9)));
    }

    #[test]
    fn sunday_maps_to_monday_six_days_earlier() {
        // 2025-03-16 is a Sunday; its week starts 2025-03-10
        let window = resolve_period(ReportPeriod::ThisWeek, date(2025, 3, 16), launch());
        assert_eq!(window.start, start_of_day(date(2025, 3, 10)));
        assert_eq!(window.end, end_of_day(date(2025, 3, 16)));
    }

    #[test_case(ReportPeriod::Last7d, date(2025, 3, 10), date(2025, 3, 3), date(2025, 3, 9); "seven day lookback excludes today")]
    #[test_case(ReportPeriod::Last28d, date(2025, 3, 10), date(2025, 2, 10), date(2025, 3, 9); "twenty eight day lookback")]
    #[test_case(ReportPeriod::Last30d, date(2025, 3, 10), date(2025, 2, 8), date(2025, 3, 9); "thirty day lookback")]
    #[test_case(ReportPeriod::Last90d, date(2025, 3, 10), date(2024, 12, 10), date(2025, 3, 9); "ninety day lookback")]
    #[test_case(ReportPeriod::ThisMonth, date(2025, 3, 10), date(2025, 3, 1), date(2025, 3, 10); "month to date")]
    #[test_case(ReportPeriod::LastMonth, date(2025, 3, 10), date(2025, 2, 1), date(2025, 2, 28); "previous calendar month")]
    #[test_case(ReportPeriod::QuarterToDate, date(2025, 5, 20), date(2025, 4, 1), date(2025, 5, 20); "quarter to date")]
    #[test_case(ReportPeriod::ThisYear, date(2025, 3, 10), date(2025, 1, 1), date(2025, 3, 10); "year to date")]
    #[test_case(ReportPeriod::LastYear, date(2025, 3, 10), date(2024, 1, 1), date(2024, 12, 31); "previous calendar year")]
    fn named_periods_resolve(
        period: ReportPeriod,
        today: NaiveDate,
        expected_start: NaiveDate,
        expected_end: NaiveDate,
    ) {
        let window = resolve_period(period, today, launch());
        assert_eq!(window.start, start_of_day(expected_start));
        assert_eq!(window.end, end_of_day(expected_end));
    }

    #[test]
    fn last_month_handles_january() {
        let window = resolve_period(ReportPeriod::LastMonth, date(2025, 1, 15), launch());
        assert_eq!(window.start, start_of_day(date(2024, 12, 1)));
        assert_eq!(window.end, end_of_day(date(2024, 12, 31)));
    }

    #[test]
    fn all_time_starts_at_launch() {
        let window = resolve_period(ReportPeriod::AllTime, date(2025, 3, 10), launch());
        assert_eq!(window.start, start_of_day(launch()));
        assert_eq!(window.end, end_of_day(date(2025, 3, 10)));
    }

    #[test]
    fn explicit_range_widens_to_whole_days() {
        let window = resolve_explicit(date(2025, 2, 1), date(2025, 2, 3)).unwrap();
        assert_eq!(window.start, start_of_day(date(2025, 2, 1)));
        assert_eq!(window.end, end_of_day(date(2025, 2, 3)));
        assert!(resolve_explicit(date(2025, 2, 3), date(2025, 2, 1)).is_err());
    }

    #[test]
    fn unknown_key_falls_back_to_today_by_default() {
        let service = ReportingService::new(
            Arc::new(sea_orm::DatabaseConnection::Disconnected),
            ReportingConfig::default(),
        );
        let today = date(2025, 3, 10);
        let window = service.resolve_key("fortnight", today).unwrap();
        assert_eq!(window, resolve_period(ReportPeriod::Today, today, launch()));
    }

    #[test]
    fn unknown_key_is_rejected_in_strict_mode() {
        let config = ReportingConfig {
            strict_periods: true,
            ..ReportingConfig::default()
        };
        let service =
            ReportingService::new(Arc::new(sea_orm::DatabaseConnection::Disconnected), config);
        assert!(matches!(
            service.resolve_key("fortnight", date(2025, 3, 10)),
            Err(ServiceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn period_keys_parse_from_their_wire_names() {
        for (key, expected) in [
            ("all_time", ReportPeriod::AllTime),
            ("today", ReportPeriod::Today),
            ("yesterday", ReportPeriod::Yesterday),
            ("this_week", ReportPeriod::ThisWeek),
            ("last_7d", ReportPeriod::Last7d),
            ("last_week", ReportPeriod::LastWeek),
            ("last_28d", ReportPeriod::Last28d),
            ("last_30d", ReportPeriod::Last30d),
            ("this_month", ReportPeriod::ThisMonth),
            ("last_month", ReportPeriod::LastMonth),
            ("last_90d", ReportPeriod::Last90d),
            ("quarter_to_date", ReportPeriod::QuarterToDate),
            ("this_year", ReportPeriod::ThisYear),
            ("last_year", ReportPeriod::LastYear),
        ] {
            assert_eq!(key.parse::<ReportPeriod>().unwrap(), expected, "key {key}");
        }
    }

    #[test]
    fn window_contains_is_inclusive_on_both_bounds() {
        let window = resolve_period(ReportPeriod::Yesterday, date(2025, 3, 10), launch());
        assert!(window.contains(window.start));
        assert!(window.contains(window.end));
        assert!(!window.contains(window.end + chrono::Duration::milliseconds(1)));
    }
}
