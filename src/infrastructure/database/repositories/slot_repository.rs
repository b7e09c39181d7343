//! SeaORM implementation of SlotRepository

use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr, UpdateMany,
};
use tracing::debug;

use crate::domain::slot::model::day_bounds;
use crate::domain::slot::{
    ChargingSlot, ClaimOutcome, ReleaseOutcome, SlotAvailability, SlotRepository,
};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::charging_slot;

pub struct SeaOrmSlotRepository {
    db: DatabaseConnection,
}

impl SeaOrmSlotRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: charging_slot::Model) -> ChargingSlot {
    ChargingSlot {
        id: m.id,
        station_id: m.station_id,
        start_time: m.start_time,
        end_time: m.end_time,
        claimed: m.claimed,
        reservation_id: m.reservation_id,
        owner_id: m.owner_id,
    }
}

fn domain_to_active(s: ChargingSlot) -> charging_slot::ActiveModel {
    charging_slot::ActiveModel {
        id: Set(s.id),
        station_id: Set(s.station_id),
        start_time: Set(s.start_time),
        end_time: Set(s.end_time),
        claimed: Set(s.claimed),
        reservation_id: Set(s.reservation_id),
        owner_id: Set(s.owner_id),
    }
}

pub(super) fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Storage(format!("Database error: {}", e))
}

/// `UPDATE charging_slots SET claimed = 1, ... WHERE id = ? AND claimed = 0`
fn claim_update(
    slot_id: &str,
    owner_id: &str,
    reservation_id: &str,
) -> UpdateMany<charging_slot::Entity> {
    charging_slot::Entity::update_many()
        .col_expr(charging_slot::Column::Claimed, Expr::value(true))
        .col_expr(charging_slot::Column::ReservationId, Expr::value(reservation_id))
        .col_expr(charging_slot::Column::OwnerId, Expr::value(owner_id))
        .filter(charging_slot::Column::Id.eq(slot_id))
        .filter(charging_slot::Column::Claimed.eq(false))
}

impl SeaOrmSlotRepository {
    /// Outcome of a claim that updated no row.
    async fn refused_claim(&self, slot_id: &str) -> DomainResult<ClaimOutcome> {
        Ok(match self.find_by_id(slot_id).await? {
            Some(_) => ClaimOutcome::Conflict,
            None => ClaimOutcome::NotFound,
        })
    }
}

// ── SlotRepository impl ─────────────────────────────────────────

#[async_trait]
impl SlotRepository for SeaOrmSlotRepository {
    async fn insert_many(&self, slots: Vec<ChargingSlot>) -> DomainResult<u64> {
        if slots.is_empty() {
            return Ok(0);
        }
        debug!(count = slots.len(), "Inserting charging slots");

        // One statement: a start time already taken rejects the whole batch.
        match charging_slot::Entity::insert_many(slots.into_iter().map(domain_to_active))
            .exec_without_returning(&self.db)
            .await
        {
            Ok(inserted) => Ok(inserted),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => Err(
                DomainError::Conflict("a slot already exists at one of these start times".into()),
            ),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<ChargingSlot>> {
        let model = charging_slot::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn claim(
        &self,
        slot_id: &str,
        owner_id: &str,
        reservation_id: &str,
    ) -> DomainResult<ClaimOutcome> {
        let update = claim_update(slot_id, owner_id, reservation_id);

        let outcome = if self.db.support_returning() {
            let claimed = update.exec_with_returning(&self.db).await.map_err(db_err)?;
            match claimed.into_iter().next() {
                Some(model) => ClaimOutcome::Claimed(model_to_domain(model)),
                None => self.refused_claim(slot_id).await?,
            }
        } else {
            let result = update.exec(&self.db).await.map_err(db_err)?;
            if result.rows_affected == 0 {
                self.refused_claim(slot_id).await?
            } else {
                // Only this caller knows `reservation_id`, so nothing can
                // release the slot before the read-back. A delete in between
                // reads as NotFound.
                match self.find_by_id(slot_id).await? {
                    Some(slot) => ClaimOutcome::Claimed(slot),
                    None => ClaimOutcome::NotFound,
                }
            }
        };
        debug!(slot_id, reservation_id, ?outcome, "Slot claim");
        Ok(outcome)
    }

    async fn release(
        &self,
        slot_id: &str,
        expected_reservation_id: &str,
    ) -> DomainResult<ReleaseOutcome> {
        let result = charging_slot::Entity::update_many()
            .col_expr(charging_slot::Column::Claimed, Expr::value(false))
            .col_expr(
                charging_slot::Column::ReservationId,
                Expr::value(Option::<String>::None),
            )
            .col_expr(
                charging_slot::Column::OwnerId,
                Expr::value(Option::<String>::None),
            )
            .filter(charging_slot::Column::Id.eq(slot_id))
            .filter(charging_slot::Column::ReservationId.eq(expected_reservation_id))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        Ok(if result.rows_affected > 0 {
            ReleaseOutcome::Released
        } else {
            ReleaseOutcome::NotFound
        })
    }

    async fn list_by_station_and_day(
        &self,
        station_id: &str,
        day: NaiveDate,
        availability: SlotAvailability,
    ) -> DomainResult<Vec<ChargingSlot>> {
        let (start, end) = day_bounds(day);
        let mut query = charging_slot::Entity::find()
            .filter(charging_slot::Column::StationId.eq(station_id))
            .filter(charging_slot::Column::StartTime.gte(start))
            .filter(charging_slot::Column::StartTime.lt(end));

        query = match availability {
            SlotAvailability::All => query,
            SlotAvailability::Claimed => query.filter(charging_slot::Column::Claimed.eq(true)),
            SlotAvailability::Unclaimed => query.filter(charging_slot::Column::Claimed.eq(false)),
        };

        let models = query
            .order_by_asc(charging_slot::Column::StartTime)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn delete(&self, id: &str) -> DomainResult<bool> {
        let result = charging_slot::Entity::delete_by_id(id.to_string())
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }

    async fn delete_by_station_and_day(&self, station_id: &str, day: NaiveDate) -> DomainResult<u64> {
        let (start, end) = day_bounds(day);
        let result = charging_slot::Entity::delete_many()
            .filter(charging_slot::Column::StationId.eq(station_id))
            .filter(charging_slot::Column::StartTime.gte(start))
            .filter(charging_slot::Column::StartTime.lt(end))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::SlotSchedule;
    use crate::infrastructure::database::{pooled_test_database, test_database};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 11).unwrap()
    }

    async fn seeded() -> (SeaOrmSlotRepository, Vec<ChargingSlot>) {
        let repo = SeaOrmSlotRepository::new(test_database().await);
        let slots = SlotSchedule::default().daily_slots("ST1", day()).unwrap();
        assert_eq!(repo.insert_many(slots.clone()).await.unwrap(), 10);
        (repo, slots)
    }

    #[tokio::test]
    async fn claim_is_conditional_on_unclaimed() {
        let (repo, slots) = seeded().await;
        let id = &slots[0].id;

        match repo.claim(id, "U1", "R1").await.unwrap() {
            ClaimOutcome::Claimed(slot) => {
                assert!(slot.claimed);
                assert!(slot.is_held_by("R1"));
                assert_eq!(slot.owner_id.as_deref(), Some("U1"));
            }
            other => panic!("expected claim, got {:?}", other),
        }

        assert_eq!(repo.claim(id, "U2", "R2").await.unwrap(), ClaimOutcome::Conflict);
        let stored = repo.find_by_id(id).await.unwrap().unwrap();
        assert!(stored.is_held_by("R1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_claims_have_one_winner() {
        let (db, _dir) = pooled_test_database().await;
        let repo = Arc::new(SeaOrmSlotRepository::new(db));
        let slots = SlotSchedule::default().daily_slots("ST1", day()).unwrap();
        repo.insert_many(slots.clone()).await.unwrap();
        let slot_id = slots[5].id.clone();

        for round in 0..5 {
            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let repo = repo.clone();
                    let slot_id = slot_id.clone();
                    tokio::spawn(async move {
                        repo.claim(&slot_id, &format!("U{i}"), &format!("R{round}-{i}")).await
                    })
                })
                .collect();

            let mut winners = Vec::new();
            for handle in handles {
                match handle.await.unwrap().unwrap() {
                    ClaimOutcome::Claimed(slot) => winners.push(slot.reservation_id.unwrap()),
                    ClaimOutcome::Conflict => {}
                    ClaimOutcome::NotFound => panic!("slot vanished"),
                }
            }
            assert_eq!(winners.len(), 1, "round {round}");
            let stored = repo.find_by_id(&slot_id).await.unwrap().unwrap();
            assert!(stored.is_held_by(&winners[0]));

            assert_eq!(
                repo.release(&slot_id, &winners[0]).await.unwrap(),
                ReleaseOutcome::Released
            );
        }
    }

    #[tokio::test]
    async fn taken_start_time_rejects_the_whole_batch() {
        let (repo, slots) = seeded().await;
        let mut again = SlotSchedule::default().daily_slots("ST1", day()).unwrap();
        // First start time is new, the rest collide
        again[0].start_time -= chrono::Duration::hours(1);

        let err = repo.insert_many(again.clone()).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(repo.find_by_id(&again[0].id).await.unwrap().is_none());

        let all = repo
            .list_by_station_and_day("ST1", day(), SlotAvailability::All)
            .await
            .unwrap();
        assert_eq!(all.len(), slots.len());
    }

    #[tokio::test]
    async fn claim_unknown_slot_is_not_found() {
        let (repo, _) = seeded().await;
        assert_eq!(
            repo.claim("missing", "U1", "R1").await.unwrap(),
            ClaimOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn release_is_keyed_on_reservation() {
        let (repo, slots) = seeded().await;
        let id = &slots[3].id;
        repo.claim(id, "U1", "R1").await.unwrap();

        assert_eq!(repo.release(id, "R2").await.unwrap(), ReleaseOutcome::NotFound);
        assert!(repo.find_by_id(id).await.unwrap().unwrap().claimed);

        assert_eq!(repo.release(id, "R1").await.unwrap(), ReleaseOutcome::Released);
        let freed = repo.find_by_id(id).await.unwrap().unwrap();
        assert!(!freed.claimed);
        assert!(freed.reservation_id.is_none());
        assert!(freed.owner_id.is_none());

        assert_eq!(repo.release(id, "R1").await.unwrap(), ReleaseOutcome::NotFound);
    }

    #[tokio::test]
    async fn listing_filters_by_day_and_availability() {
        let (repo, slots) = seeded().await;
        let other_day = SlotSchedule::default()
            .daily_slots("ST1", day().succ_opt().unwrap())
            .unwrap();
        repo.insert_many(other_day).await.unwrap();
        repo.claim(&slots[1].id, "U1", "R1").await.unwrap();

        let all = repo
            .list_by_station_and_day("ST1", day(), SlotAvailability::All)
            .await
            .unwrap();
        assert_eq!(all.len(), 10);
        assert!(all.windows(2).all(|w| w[0].start_time < w[1].start_time));

        let claimed = repo
            .list_by_station_and_day("ST1", day(), SlotAvailability::Claimed)
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, slots[1].id);

        let free = repo
            .list_by_station_and_day("ST1", day(), SlotAvailability::Unclaimed)
            .await
            .unwrap();
        assert_eq!(free.len(), 9);

        let elsewhere = repo
            .list_by_station_and_day("ST2", day(), SlotAvailability::All)
            .await
            .unwrap();
        assert!(elsewhere.is_empty());
    }

    #[tokio::test]
    async fn delete_single_and_whole_day() {
        let (repo, slots) = seeded().await;
        assert!(repo.delete(&slots[0].id).await.unwrap());
        assert!(!repo.delete(&slots[0].id).await.unwrap());

        assert_eq!(repo.delete_by_station_and_day("ST1", day()).await.unwrap(), 9);
        assert_eq!(repo.delete_by_station_and_day("ST1", day()).await.unwrap(), 0);
    }
}
