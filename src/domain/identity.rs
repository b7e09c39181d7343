//! Caller identity supplied by the (trusted) identity collaborator

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    EvOwner,
    Backoffice,
    StationOperator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EvOwner => "ev_owner",
            Self::Backoffice => "backoffice",
            Self::StationOperator => "station_operator",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "ev_owner" | "evowner" | "owner" => Ok(Self::EvOwner),
            "backoffice" | "back_office" => Ok(Self::Backoffice),
            "station_operator" | "stationoperator" | "operator" => Ok(Self::StationOperator),
            other => Err(DomainError::Validation(format!("unknown role '{}'", other))),
        }
    }
}

/// Who is calling, as vouched for by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
    pub role: Role,
    pub nic: Option<String>,
    /// Station an operator works at
    pub station_id: Option<String>,
}

impl CallerIdentity {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            nic: None,
            station_id: None,
        }
    }

    pub fn at_station(mut self, station_id: impl Into<String>) -> Self {
        self.station_id = Some(station_id.into());
        self
    }

    pub fn is_backoffice(&self) -> bool {
        self.role == Role::Backoffice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_loosely() {
        assert_eq!("ev_owner".parse::<Role>().unwrap(), Role::EvOwner);
        assert_eq!("EVOwner".parse::<Role>().unwrap(), Role::EvOwner);
        assert_eq!("Backoffice".parse::<Role>().unwrap(), Role::Backoffice);
        assert_eq!("station-operator".parse::<Role>().unwrap(), Role::StationOperator);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn display_matches_wire_name() {
        assert_eq!(Role::StationOperator.to_string(), "station_operator");
    }
}
