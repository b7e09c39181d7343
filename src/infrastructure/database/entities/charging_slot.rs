//! Charging slot entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "charging_slots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub station_id: String,
    pub start_time: DateTimeUtc,
    pub end_time: DateTimeUtc,

    /// Set and cleared only by the conditional claim / release updates
    pub claimed: bool,

    #[sea_orm(nullable)]
    pub reservation_id: Option<String>,

    #[sea_orm(nullable)]
    pub owner_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
