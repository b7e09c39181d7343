//! Create charging_slots table
//!
//! One row per bookable interval. `claimed`, `reservation_id` and `owner_id`
//! are only ever changed by single conditional UPDATE statements. A station
//! has at most one slot per start time.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChargingSlots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChargingSlots::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ChargingSlots::StationId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ChargingSlots::StartTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ChargingSlots::EndTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ChargingSlots::Claimed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ChargingSlots::ReservationId).string())
                    .col(ColumnDef::new(ChargingSlots::OwnerId).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_charging_slots_station_start")
                    .table(ChargingSlots::Table)
                    .col(ChargingSlots::StationId)
                    .col(ChargingSlots::StartTime)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_charging_slots_reservation")
                    .table(ChargingSlots::Table)
                    .col(ChargingSlots::ReservationId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChargingSlots::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum ChargingSlots {
    Table,
    Id,
    StationId,
    StartTime,
    EndTime,
    Claimed,
    ReservationId,
    OwnerId,
}
