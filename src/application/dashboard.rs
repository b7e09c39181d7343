//! Role-specific dashboard summaries

use std::sync::Arc;

use crate::domain::{
    CallerIdentity, DomainError, DomainResult, RepositoryProvider, Reservation, Role,
    SlotAvailability, UpcomingFilter,
};
use crate::shared::SharedClock;

use super::reservations::{DailyCount, ReservationQueries};

pub const OWNER_UPCOMING_LIMIT: u64 = 5;
pub const STATION_UPCOMING_LIMIT: u64 = 10;
pub const TREND_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotCounts {
    pub total: u64,
    pub booked: u64,
    pub available: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardSummary {
    EvOwner {
        total_bookings: u64,
        completed_charges: u64,
        upcoming: Vec<Reservation>,
    },
    Backoffice {
        total_bookings: u64,
        trend: Vec<DailyCount>,
    },
    StationOperator {
        station_id: String,
        slots_today: SlotCounts,
        upcoming: Vec<Reservation>,
    },
}

pub struct DashboardService {
    repos: Arc<dyn RepositoryProvider>,
    queries: ReservationQueries,
    clock: SharedClock,
}

impl DashboardService {
    pub fn new(repos: Arc<dyn RepositoryProvider>, clock: SharedClock) -> Self {
        Self {
            queries: ReservationQueries::new(repos.clone(), clock.clone()),
            repos,
            clock,
        }
    }

    pub async fn summary(&self, caller: &CallerIdentity) -> DomainResult<DashboardSummary> {
        match caller.role {
            Role::EvOwner => self.owner_summary(&caller.user_id).await,
            Role::Backoffice => self.backoffice_summary().await,
            Role::StationOperator => {
                let station_id = caller.station_id.as_deref().ok_or_else(|| {
                    DomainError::Validation("station operator requires a station id".into())
                })?;
                self.station_summary(station_id).await
            }
        }
    }

    pub async fn trend(&self, days: u32) -> DomainResult<Vec<DailyCount>> {
        self.queries.booking_trend(days).await
    }

    async fn owner_summary(&self, owner_id: &str) -> DomainResult<DashboardSummary> {
        let mine = self.queries.list_by_owner(owner_id).await?;
        let completed_charges = mine.iter().filter(|r| r.completed && !r.canceled).count();
        let upcoming = self
            .queries
            .list_upcoming(&UpcomingFilter::owner(owner_id), OWNER_UPCOMING_LIMIT)
            .await?;

        Ok(DashboardSummary::EvOwner {
            total_bookings: mine.len() as u64,
            completed_charges: completed_charges as u64,
            upcoming,
        })
    }

    async fn backoffice_summary(&self) -> DomainResult<DashboardSummary> {
        let total_bookings = self.queries.list_all().await?.len() as u64;
        let trend = self.queries.booking_trend(TREND_DAYS).await?;
        Ok(DashboardSummary::Backoffice {
            total_bookings,
            trend,
        })
    }

    async fn station_summary(&self, station_id: &str) -> DomainResult<DashboardSummary> {
        let today = self.clock.now().date_naive();
        let slots = self
            .repos
            .slots()
            .list_by_station_and_day(station_id, today, SlotAvailability::All)
            .await?;
        let booked = slots.iter().filter(|s| s.claimed).count() as u64;
        let total = slots.len() as u64;

        let upcoming = self
            .queries
            .list_upcoming(&UpcomingFilter::station(station_id), STATION_UPCOMING_LIMIT)
            .await?;

        Ok(DashboardSummary::StationOperator {
            station_id: station_id.to_string(),
            slots_today: SlotCounts {
                total,
                booked,
                available: total - booked,
            },
            upcoming,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SlotSchedule, Transition};
    use crate::infrastructure::InMemoryRepositoryProvider;
    use crate::shared::FixedClock;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 7, 0, 0).unwrap()
    }

    async fn book(repos: &InMemoryRepositoryProvider, id: &str, owner: &str, hours: i64) {
        let r = Reservation::new(id, owner, "ST1", None, now() + Duration::hours(hours), now());
        repos.reservations().create(r).await.unwrap();
    }

    fn service(repos: Arc<InMemoryRepositoryProvider>) -> DashboardService {
        DashboardService::new(repos, Arc::new(FixedClock::new(now())))
    }

    #[tokio::test]
    async fn owner_sees_own_totals_and_five_upcoming() {
        let repos = InMemoryRepositoryProvider::shared();
        for i in 0..7 {
            book(&repos, &format!("R{i}"), "U1", 2 + i).await;
        }
        book(&repos, "other", "U2", 3).await;
        repos.reservations().transition("R0", Transition::Confirm, now()).await.unwrap();
        repos.reservations().transition("R0", Transition::Complete, now()).await.unwrap();

        let summary = service(repos)
            .summary(&CallerIdentity::new("U1", Role::EvOwner))
            .await
            .unwrap();
        let DashboardSummary::EvOwner {
            total_bookings,
            completed_charges,
            upcoming,
        } = summary
        else {
            panic!("expected owner summary");
        };
        assert_eq!(total_bookings, 7);
        assert_eq!(completed_charges, 1);
        assert_eq!(upcoming.len(), 5);
        assert_eq!(upcoming[0].id, "R1");
    }

    #[tokio::test]
    async fn backoffice_sees_total_and_week_trend() {
        let repos = InMemoryRepositoryProvider::shared();
        book(&repos, "a", "U1", 5).await;
        book(&repos, "b", "U2", 6).await;

        let summary = service(repos)
            .summary(&CallerIdentity::new("B1", Role::Backoffice))
            .await
            .unwrap();
        let DashboardSummary::Backoffice {
            total_bookings,
            trend,
        } = summary
        else {
            panic!("expected backoffice summary");
        };
        assert_eq!(total_bookings, 2);
        assert_eq!(trend.len(), 7);
        assert_eq!(trend.last().map(|d| d.count), Some(2));
    }

    #[tokio::test]
    async fn operator_sees_todays_slots() {
        let repos = InMemoryRepositoryProvider::shared();
        let slots = SlotSchedule::default()
            .daily_slots("ST1", now().date_naive())
            .unwrap();
        repos.slots().insert_many(slots.clone()).await.unwrap();
        repos.slots().claim(&slots[4].id, "U1", "R1").await.unwrap();
        book(&repos, "R1", "U1", 5).await;

        let caller = CallerIdentity::new("OP1", Role::StationOperator).at_station("ST1");
        let summary = service(repos).summary(&caller).await.unwrap();
        let DashboardSummary::StationOperator {
            slots_today,
            upcoming,
            ..
        } = summary
        else {
            panic!("expected operator summary");
        };
        assert_eq!(
            slots_today,
            SlotCounts {
                total: 10,
                booked: 1,
                available: 9
            }
        );
        assert_eq!(upcoming.len(), 1);
    }

    #[tokio::test]
    async fn operator_without_station_is_rejected() {
        let repos = InMemoryRepositoryProvider::shared();
        let err = service(repos)
            .summary(&CallerIdentity::new("OP1", Role::StationOperator))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
