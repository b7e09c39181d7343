//! Reservation entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reservations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub owner_id: String,
    pub station_id: String,

    /// No foreign key: slots may be deleted out-of-band by slot management
    #[sea_orm(nullable)]
    pub slot_id: Option<String>,

    pub reservation_time: DateTimeUtc,

    pub approved: bool,
    pub confirmed: bool,
    pub completed: bool,
    pub canceled: bool,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
