//! SeaORM implementation of ReservationRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr, UpdateMany,
};
use tracing::debug;

use super::slot_repository::db_err;
use crate::domain::reservation::{
    Reservation, ReservationRepository, SlotAssignment, Transition, UpcomingFilter,
};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::reservation;

pub struct SeaOrmReservationRepository {
    db: DatabaseConnection,
}

impl SeaOrmReservationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: reservation::Model) -> Reservation {
    Reservation {
        id: m.id,
        owner_id: m.owner_id,
        station_id: m.station_id,
        slot_id: m.slot_id,
        reservation_time: m.reservation_time,
        approved: m.approved,
        confirmed: m.confirmed,
        completed: m.completed,
        canceled: m.canceled,
        created_at: m.created_at,
        updated_at: m.updated_at,
    }
}

/// Restrict an update to reservations that are neither canceled nor completed.
fn only_open(update: UpdateMany<reservation::Entity>) -> UpdateMany<reservation::Entity> {
    update
        .filter(reservation::Column::Canceled.eq(false))
        .filter(reservation::Column::Completed.eq(false))
}

// ── ReservationRepository impl ──────────────────────────────────

#[async_trait]
impl ReservationRepository for SeaOrmReservationRepository {
    async fn create(&self, r: Reservation) -> DomainResult<Reservation> {
        debug!(reservation_id = %r.id, "Saving reservation");

        let id = r.id.clone();
        let model = reservation::ActiveModel {
            id: Set(r.id),
            owner_id: Set(r.owner_id),
            station_id: Set(r.station_id),
            slot_id: Set(r.slot_id),
            reservation_time: Set(r.reservation_time),
            approved: Set(r.approved),
            confirmed: Set(r.confirmed),
            completed: Set(r.completed),
            canceled: Set(r.canceled),
            created_at: Set(r.created_at),
            updated_at: Set(r.updated_at),
        };

        match model.insert(&self.db).await {
            Ok(saved) => Ok(model_to_domain(saved)),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => Err(
                DomainError::Conflict(format!("reservation {} already exists", id)),
            ),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Reservation>> {
        let model = reservation::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn transition(
        &self,
        id: &str,
        transition: Transition,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<Reservation>> {
        let update = reservation::Entity::update_many()
            .col_expr(reservation::Column::UpdatedAt, Expr::value(at))
            .filter(reservation::Column::Id.eq(id));

        // The WHERE clause carries the precondition of each transition
        let update = match transition {
            Transition::Approve => {
                only_open(update).col_expr(reservation::Column::Approved, Expr::value(true))
            }
            Transition::Confirm => {
                only_open(update).col_expr(reservation::Column::Confirmed, Expr::value(true))
            }
            Transition::Complete => only_open(update)
                .filter(reservation::Column::Confirmed.eq(true))
                .col_expr(reservation::Column::Completed, Expr::value(true)),
            Transition::Cancel => {
                only_open(update).col_expr(reservation::Column::Canceled, Expr::value(true))
            }
            Transition::Reopen => update
                .filter(reservation::Column::Canceled.eq(true))
                .col_expr(reservation::Column::Canceled, Expr::value(false))
                .col_expr(reservation::Column::Approved, Expr::value(false))
                .col_expr(reservation::Column::Confirmed, Expr::value(false))
                .col_expr(
                    reservation::Column::SlotId,
                    Expr::value(Option::<String>::None),
                ),
        };

        let result = update.exec(&self.db).await.map_err(db_err)?;
        debug!(
            reservation_id = id,
            transition = transition.as_str(),
            rows = result.rows_affected,
            "Reservation transition"
        );

        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    async fn reassign(
        &self,
        id: &str,
        expected_slot_id: Option<&str>,
        assignment: SlotAssignment,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<Reservation>> {
        let update = only_open(
            reservation::Entity::update_many()
                .col_expr(reservation::Column::SlotId, Expr::value(assignment.slot_id))
                .col_expr(reservation::Column::StationId, Expr::value(assignment.station_id))
                .col_expr(
                    reservation::Column::ReservationTime,
                    Expr::value(assignment.reservation_time),
                )
                .col_expr(reservation::Column::UpdatedAt, Expr::value(at))
                .filter(reservation::Column::Id.eq(id)),
        );

        let update = match expected_slot_id {
            Some(slot_id) => update.filter(reservation::Column::SlotId.eq(slot_id)),
            None => update.filter(reservation::Column::SlotId.is_null()),
        };

        let result = update.exec(&self.db).await.map_err(db_err)?;
        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    async fn find_by_owner(&self, owner_id: &str) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::OwnerId.eq(owner_id))
            .order_by_desc(reservation::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn find_all(&self) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .order_by_desc(reservation::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn find_upcoming(
        &self,
        filter: &UpcomingFilter,
        now: DateTime<Utc>,
        limit: u64,
    ) -> DomainResult<Vec<Reservation>> {
        let mut query = reservation::Entity::find()
            .filter(reservation::Column::Canceled.eq(false))
            .filter(reservation::Column::Completed.eq(false))
            .filter(reservation::Column::ReservationTime.gte(now));

        if let Some(owner_id) = &filter.owner_id {
            query = query.filter(reservation::Column::OwnerId.eq(owner_id.as_str()));
        }
        if let Some(station_id) = &filter.station_id {
            query = query.filter(reservation::Column::StationId.eq(station_id.as_str()));
        }

        let models = query
            .order_by_asc(reservation::Column::ReservationTime)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn find_created_since(&self, since: DateTime<Utc>) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::CreatedAt.gte(since))
            .order_by_asc(reservation::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }
}
