//! Read-side queries over reservations
//!
//! Reads bypass the allocator and go straight to the store.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::domain::slot::model::day_bounds;
use crate::domain::{DomainError, DomainResult, RepositoryProvider, Reservation, UpcomingFilter};
use crate::shared::SharedClock;

/// Longest booking trend that may be requested
pub const MAX_TREND_DAYS: u32 = 366;

/// Reservations created on one calendar day (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

pub struct ReservationQueries {
    repos: Arc<dyn RepositoryProvider>,
    clock: SharedClock,
}

impl ReservationQueries {
    pub fn new(repos: Arc<dyn RepositoryProvider>, clock: SharedClock) -> Self {
        Self { repos, clock }
    }

    pub async fn get(&self, id: &str) -> DomainResult<Reservation> {
        self.repos
            .reservations()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Reservation", id))
    }

    /// Newest first
    pub async fn list_by_owner(&self, owner_id: &str) -> DomainResult<Vec<Reservation>> {
        self.repos.reservations().find_by_owner(owner_id).await
    }

    /// Newest first
    pub async fn list_all(&self) -> DomainResult<Vec<Reservation>> {
        self.repos.reservations().find_all().await
    }

    /// Open reservations from now on, soonest first, at most `limit`.
    pub async fn list_upcoming(
        &self,
        filter: &UpcomingFilter,
        limit: u64,
    ) -> DomainResult<Vec<Reservation>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.repos
            .reservations()
            .find_upcoming(filter, self.clock.now(), limit)
            .await
    }

    /// Reservations created per day over the last `days` days, today
    /// included. Days without bookings are reported with a zero count.
    pub async fn booking_trend(&self, days: u32) -> DomainResult<Vec<DailyCount>> {
        if days == 0 || days > MAX_TREND_DAYS {
            return Err(DomainError::Validation(format!(
                "days must be between 1 and {}",
                MAX_TREND_DAYS
            )));
        }

        let today = self.clock.now().date_naive();
        let first = today - Duration::days(i64::from(days) - 1);
        let (since, _) = day_bounds(first);

        let mut counts: BTreeMap<NaiveDate, u64> = first
            .iter_days()
            .take(days as usize)
            .map(|d| (d, 0))
            .collect();

        for r in self.repos.reservations().find_created_since(since).await? {
            if let Some(count) = counts.get_mut(&r.created_at.date_naive()) {
                *count += 1;
            }
        }

        Ok(counts
            .into_iter()
            .map(|(date, count)| DailyCount { date, count })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::InMemoryRepositoryProvider;
    use crate::shared::FixedClock;
    use chrono::{DateTime, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap()
    }

    fn queries(repos: Arc<InMemoryRepositoryProvider>) -> ReservationQueries {
        ReservationQueries::new(repos, Arc::new(FixedClock::new(now())))
    }

    async fn seed(repos: &InMemoryRepositoryProvider, id: &str, created_days_ago: i64) {
        let created = now() - Duration::days(created_days_ago);
        let r = Reservation::new(id, "U1", "ST1", None, now() + Duration::days(1), created);
        repos.reservations().create(r).await.unwrap();
    }

    #[tokio::test]
    async fn trend_includes_empty_days_in_ascending_order() {
        let repos = InMemoryRepositoryProvider::shared();
        seed(&repos, "a", 0).await;
        seed(&repos, "b", 0).await;
        seed(&repos, "c", 2).await;
        seed(&repos, "too-old", 9).await;

        let trend = queries(repos).booking_trend(7).await.unwrap();
        assert_eq!(trend.len(), 7);
        assert_eq!(trend[0].date, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
        assert_eq!(trend[6].date, now().date_naive());

        let counts: Vec<u64> = trend.iter().map(|d| d.count).collect();
        assert_eq!(counts, vec![0, 0, 0, 0, 1, 0, 2]);
    }

    #[tokio::test]
    async fn trend_rejects_zero_days() {
        let repos = InMemoryRepositoryProvider::shared();
        let err = queries(repos).booking_trend(0).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let repos = InMemoryRepositoryProvider::shared();
        let err = queries(repos).get("nope").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn zero_limit_returns_nothing() {
        let repos = InMemoryRepositoryProvider::shared();
        seed(&repos, "a", 0).await;
        let q = queries(repos);
        assert!(q.list_upcoming(&UpcomingFilter::default(), 0).await.unwrap().is_empty());
        assert_eq!(q.list_upcoming(&UpcomingFilter::default(), 5).await.unwrap().len(), 1);
    }
}
