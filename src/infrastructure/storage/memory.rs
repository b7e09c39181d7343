//! In-memory repositories for development and testing
//!
//! Each DashMap entry is guarded by its shard lock while `get_mut` is held,
//! so claim/release and conditional transitions are atomic per record, the
//! same guarantee the SQL conditional UPDATEs give.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::slot::{
    ChargingSlot, ClaimOutcome, ReleaseOutcome, SlotAvailability, SlotRepository,
};
use crate::domain::{
    DomainError, DomainResult, RepositoryProvider, Reservation, ReservationRepository,
    SlotAssignment, Transition, UpcomingFilter,
};

// ── Slots ───────────────────────────────────────────────────────

/// A station can hold one slot per start time.
type StartKey = (String, DateTime<Utc>);

fn start_key(slot: &ChargingSlot) -> StartKey {
    (slot.station_id.clone(), slot.start_time)
}

#[derive(Default)]
pub struct InMemorySlotRepository {
    slots: DashMap<String, ChargingSlot>,
    /// Uniqueness index on `(station_id, start_time)`, mapping to the slot id
    starts: DashMap<StartKey, String>,
}

impl InMemorySlotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn unreserve(&self, keys: &[StartKey]) {
        for key in keys {
            self.starts.remove(key);
        }
    }
}

#[async_trait]
impl SlotRepository for InMemorySlotRepository {
    /// All or nothing: on a duplicate start time or id no slot of the batch
    /// is stored.
    async fn insert_many(&self, mut slots: Vec<ChargingSlot>) -> DomainResult<u64> {
        // Same order for every caller, so racing batches collide on their
        // first key instead of each keeping a part.
        slots.sort_by(|a, b| {
            (&a.station_id, a.start_time, &a.id).cmp(&(&b.station_id, b.start_time, &b.id))
        });

        let mut reserved = Vec::with_capacity(slots.len());
        for slot in &slots {
            let key = start_key(slot);
            let taken = match self.starts.entry(key.clone()) {
                Entry::Occupied(_) => true,
                Entry::Vacant(vacant) => {
                    vacant.insert(slot.id.clone());
                    false
                }
            };
            if taken {
                self.unreserve(&reserved);
                return Err(DomainError::Conflict(format!(
                    "station {} already has a slot starting at {}",
                    slot.station_id, slot.start_time
                )));
            }
            reserved.push(key);
        }

        let mut ids = HashSet::with_capacity(slots.len());
        if let Some(dup) = slots
            .iter()
            .find(|s| !ids.insert(s.id.as_str()) || self.slots.contains_key(&s.id))
        {
            let message = format!("slot {} already exists", dup.id);
            self.unreserve(&reserved);
            return Err(DomainError::Conflict(message));
        }

        let inserted = slots.len() as u64;
        for slot in slots {
            self.slots.insert(slot.id.clone(), slot);
        }
        Ok(inserted)
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<ChargingSlot>> {
        Ok(self.slots.get(id).map(|s| s.clone()))
    }

    async fn claim(
        &self,
        slot_id: &str,
        owner_id: &str,
        reservation_id: &str,
    ) -> DomainResult<ClaimOutcome> {
        let Some(mut slot) = self.slots.get_mut(slot_id) else {
            return Ok(ClaimOutcome::NotFound);
        };
        if slot.claimed {
            return Ok(ClaimOutcome::Conflict);
        }
        slot.claimed = true;
        slot.reservation_id = Some(reservation_id.to_string());
        slot.owner_id = Some(owner_id.to_string());
        Ok(ClaimOutcome::Claimed(slot.clone()))
    }

    async fn release(
        &self,
        slot_id: &str,
        expected_reservation_id: &str,
    ) -> DomainResult<ReleaseOutcome> {
        let Some(mut slot) = self.slots.get_mut(slot_id) else {
            return Ok(ReleaseOutcome::NotFound);
        };
        if !slot.claimed || !slot.is_held_by(expected_reservation_id) {
            return Ok(ReleaseOutcome::NotFound);
        }
        slot.claimed = false;
        slot.reservation_id = None;
        slot.owner_id = None;
        Ok(ReleaseOutcome::Released)
    }

    async fn list_by_station_and_day(
        &self,
        station_id: &str,
        day: NaiveDate,
        availability: SlotAvailability,
    ) -> DomainResult<Vec<ChargingSlot>> {
        let mut slots: Vec<ChargingSlot> = self
            .slots
            .iter()
            .filter(|s| s.station_id == station_id && s.day() == day && availability.matches(s))
            .map(|s| s.clone())
            .collect();
        slots.sort_by_key(|s| s.start_time);
        Ok(slots)
    }

    async fn delete(&self, id: &str) -> DomainResult<bool> {
        let Some((_, slot)) = self.slots.remove(id) else {
            return Ok(false);
        };
        self.starts.remove(&start_key(&slot));
        Ok(true)
    }

    async fn delete_by_station_and_day(&self, station_id: &str, day: NaiveDate) -> DomainResult<u64> {
        let mut removed = 0;
        self.slots.retain(|_, s| {
            let keep = !(s.station_id == station_id && s.day() == day);
            if !keep {
                self.starts.remove(&start_key(s));
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

// ── Reservations ────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryReservationRepository {
    reservations: DashMap<String, Reservation>,
}

impl InMemoryReservationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect(&self, keep: impl Fn(&Reservation) -> bool) -> Vec<Reservation> {
        let mut out: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|r| keep(r))
            .map(|r| r.clone())
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }
}

#[async_trait]
impl ReservationRepository for InMemoryReservationRepository {
    async fn create(&self, reservation: Reservation) -> DomainResult<Reservation> {
        match self.reservations.entry(reservation.id.clone()) {
            Entry::Occupied(_) => Err(DomainError::Conflict(format!(
                "reservation {} already exists",
                reservation.id
            ))),
            Entry::Vacant(v) => {
                v.insert(reservation.clone());
                Ok(reservation)
            }
        }
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Reservation>> {
        Ok(self.reservations.get(id).map(|r| r.clone()))
    }

    async fn transition(
        &self,
        id: &str,
        transition: Transition,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<Reservation>> {
        let Some(mut r) = self.reservations.get_mut(id) else {
            return Ok(None);
        };
        if !r.permits(transition) {
            return Ok(None);
        }
        r.apply(transition, at);
        Ok(Some(r.clone()))
    }

    async fn reassign(
        &self,
        id: &str,
        expected_slot_id: Option<&str>,
        assignment: SlotAssignment,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<Reservation>> {
        let Some(mut r) = self.reservations.get_mut(id) else {
            return Ok(None);
        };
        if !r.is_open() || !r.holds_slot(expected_slot_id) {
            return Ok(None);
        }
        r.assign(assignment, at);
        Ok(Some(r.clone()))
    }

    async fn find_by_owner(&self, owner_id: &str) -> DomainResult<Vec<Reservation>> {
        Ok(self.collect(|r| r.owner_id == owner_id))
    }

    async fn find_all(&self) -> DomainResult<Vec<Reservation>> {
        Ok(self.collect(|_| true))
    }

    async fn find_upcoming(
        &self,
        filter: &UpcomingFilter,
        now: DateTime<Utc>,
        limit: u64,
    ) -> DomainResult<Vec<Reservation>> {
        let mut upcoming = self.collect(|r| r.is_upcoming(now) && filter.matches(r));
        upcoming.sort_by_key(|r| r.reservation_time);
        upcoming.truncate(limit as usize);
        Ok(upcoming)
    }

    async fn find_created_since(&self, since: DateTime<Utc>) -> DomainResult<Vec<Reservation>> {
        Ok(self.collect(|r| r.created_at >= since))
    }
}

// ── Provider ────────────────────────────────────────────────────

/// Repository provider holding everything in process memory.
#[derive(Default)]
pub struct InMemoryRepositoryProvider {
    slots: InMemorySlotRepository,
    reservations: InMemoryReservationRepository,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl RepositoryProvider for InMemoryRepositoryProvider {
    fn slots(&self) -> &dyn SlotRepository {
        &self.slots
    }

    fn reservations(&self) -> &dyn ReservationRepository {
        &self.reservations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 11, 10, 0, 0).unwrap()
    }

    async fn seeded() -> InMemorySlotRepository {
        let repo = InMemorySlotRepository::new();
        repo.insert_many(vec![
            ChargingSlot::new("ST1", start(), Duration::hours(1)).with_id("SL1"),
            ChargingSlot::new("ST1", start() + Duration::hours(1), Duration::hours(1))
                .with_id("SL2"),
        ])
        .await
        .unwrap();
        repo
    }

    #[tokio::test]
    async fn claim_then_conflict() {
        let repo = seeded().await;
        let slot = match repo.claim("SL1", "U1", "R1").await.unwrap() {
            ClaimOutcome::Claimed(slot) => slot,
            other => panic!("expected claim, got {:?}", other),
        };
        assert!(slot.claimed);
        assert_eq!(slot.reservation_id.as_deref(), Some("R1"));
        assert_eq!(slot.owner_id.as_deref(), Some("U1"));

        assert_eq!(repo.claim("SL1", "U2", "R2").await.unwrap(), ClaimOutcome::Conflict);
        assert_eq!(repo.claim("nope", "U2", "R2").await.unwrap(), ClaimOutcome::NotFound);
    }

    #[tokio::test]
    async fn release_is_keyed_on_reservation() {
        let repo = seeded().await;
        repo.claim("SL1", "U1", "R1").await.unwrap();

        assert_eq!(repo.release("SL1", "R2").await.unwrap(), ReleaseOutcome::NotFound);
        assert_eq!(repo.release("SL1", "R1").await.unwrap(), ReleaseOutcome::Released);
        assert_eq!(repo.release("SL1", "R1").await.unwrap(), ReleaseOutcome::NotFound);

        let slot = repo.find_by_id("SL1").await.unwrap().unwrap();
        assert!(!slot.claimed);
        assert!(slot.reservation_id.is_none() && slot.owner_id.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_have_one_winner() {
        let repo = Arc::new(seeded().await);
        let mut set = tokio::task::JoinSet::new();
        for i in 0..32 {
            let repo = repo.clone();
            set.spawn(async move {
                repo.claim("SL1", &format!("U{i}"), &format!("R{i}")).await.unwrap()
            });
        }

        let mut winners = Vec::new();
        while let Some(outcome) = set.join_next().await {
            if let ClaimOutcome::Claimed(slot) = outcome.unwrap() {
                winners.push(slot.reservation_id.unwrap());
            }
        }
        assert_eq!(winners.len(), 1);
        let slot = repo.find_by_id("SL1").await.unwrap().unwrap();
        assert_eq!(slot.reservation_id, Some(winners[0].clone()));
    }

    #[tokio::test]
    async fn batch_with_taken_start_time_stores_nothing() {
        let repo = seeded().await;
        let batch = vec![
            ChargingSlot::new("ST1", start() + Duration::hours(2), Duration::hours(1)).with_id("SL3"),
            ChargingSlot::new("ST1", start(), Duration::hours(1)).with_id("SL4"),
            ChargingSlot::new("ST1", start() + Duration::hours(3), Duration::hours(1)).with_id("SL5"),
        ];

        let err = repo.insert_many(batch).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        for id in ["SL3", "SL4", "SL5"] {
            assert!(repo.find_by_id(id).await.unwrap().is_none(), "{id} was stored");
        }

        // The rolled-back start times are free again
        let retry = vec![
            ChargingSlot::new("ST1", start() + Duration::hours(2), Duration::hours(1)).with_id("SL3"),
            ChargingSlot::new("ST1", start() + Duration::hours(3), Duration::hours(1)).with_id("SL5"),
        ];
        assert_eq!(repo.insert_many(retry).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn duplicate_start_within_a_batch_is_refused() {
        let repo = InMemorySlotRepository::new();
        let batch = vec![
            ChargingSlot::new("ST1", start(), Duration::hours(1)).with_id("A"),
            ChargingSlot::new("ST1", start(), Duration::minutes(30)).with_id("B"),
        ];
        assert!(repo.insert_many(batch).await.is_err());
        assert!(repo
            .list_by_station_and_day("ST1", start().date_naive(), SlotAvailability::All)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn deleted_start_time_can_be_reused() {
        let repo = seeded().await;
        assert!(repo.delete("SL1").await.unwrap());
        repo.insert_many(vec![ChargingSlot::new("ST1", start(), Duration::hours(1)).with_id("SL9")])
            .await
            .unwrap();

        let day = start().date_naive();
        assert_eq!(repo.delete_by_station_and_day("ST1", day).await.unwrap(), 2);
        let fresh = ChargingSlot::new("ST1", start(), Duration::hours(1));
        assert_eq!(repo.insert_many(vec![fresh]).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_day_batches_have_one_winner() {
        let repo = Arc::new(InMemorySlotRepository::new());
        let schedule = crate::domain::SlotSchedule::default();
        let day = start().date_naive();

        let mut set = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let repo = repo.clone();
            let slots = schedule.daily_slots("ST1", day).unwrap();
            set.spawn(async move { repo.insert_many(slots).await });
        }

        let mut oks = 0;
        while let Some(result) = set.join_next().await {
            match result.unwrap() {
                Ok(_) => oks += 1,
                Err(e) => assert!(matches!(e, DomainError::Conflict(_))),
            }
        }
        assert_eq!(oks, 1);
        let stored = repo
            .list_by_station_and_day("ST1", day, SlotAvailability::All)
            .await
            .unwrap();
        assert_eq!(stored.len(), 10);
    }

    #[tokio::test]
    async fn listing_filters_by_availability() {
        let repo = seeded().await;
        repo.claim("SL2", "U1", "R1").await.unwrap();
        let day = start().date_naive();

        let free = repo
            .list_by_station_and_day("ST1", day, SlotAvailability::Unclaimed)
            .await
            .unwrap();
        assert_eq!(free.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(), ["SL1"]);

        let all = repo
            .list_by_station_and_day("ST1", day, SlotAvailability::All)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].start_time < all[1].start_time);

        assert_eq!(repo.delete_by_station_and_day("ST1", day).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn transition_respects_precondition() {
        let repo = InMemoryReservationRepository::new();
        let now = start();
        repo.create(Reservation::new("R1", "U1", "ST1", None, now + Duration::days(1), now))
            .await
            .unwrap();

        assert!(repo.transition("R1", Transition::Complete, now).await.unwrap().is_none());
        assert!(repo.transition("R1", Transition::Confirm, now).await.unwrap().is_some());
        let done = repo.transition("R1", Transition::Complete, now).await.unwrap().unwrap();
        assert!(done.completed && done.confirmed);
        assert!(repo.transition("R1", Transition::Cancel, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upcoming_is_sorted_and_limited() {
        let repo = InMemoryReservationRepository::new();
        let now = start();
        for (id, hours) in [("R1", 30), ("R2", 5), ("R3", -2), ("R4", 10)] {
            repo.create(Reservation::new(id, "U1", "ST1", None, now + Duration::hours(hours), now))
                .await
                .unwrap();
        }
        repo.transition("R4", Transition::Cancel, now).await.unwrap();

        let upcoming = repo
            .find_upcoming(&UpcomingFilter::owner("U1"), now, 5)
            .await
            .unwrap();
        let ids: Vec<_> = upcoming.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["R2", "R1"]);

        let limited = repo.find_upcoming(&UpcomingFilter::default(), now, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }
}
