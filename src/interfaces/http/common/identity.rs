//! Extractors for the identity and deadline headers
//!
//! The identity collaborator in front of this service authenticates the user
//! and forwards who they are in trusted headers. Nothing here verifies them.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};

use crate::domain::{CallerIdentity, Role};

use super::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_NIC_HEADER: &str = "x-user-nic";
pub const STATION_ID_HEADER: &str = "x-station-id";
pub const DEADLINE_HEADER: &str = "x-request-deadline";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|s| Some(s.trim()).filter(|s| !s.is_empty()))
            .map_err(|_| ApiError::bad_request(format!("{} is not valid ASCII", name))),
    }
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct Caller(pub CallerIdentity);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;

        let user_id = header(headers, USER_ID_HEADER)?
            .ok_or_else(|| ApiError::unauthenticated("missing X-User-Id header"))?;
        let role: Role = header(headers, USER_ROLE_HEADER)?
            .ok_or_else(|| ApiError::unauthenticated("missing X-User-Role header"))?
            .parse()
            .map_err(|e: crate::domain::DomainError| ApiError::bad_request(e.to_string()))?;

        let mut identity = CallerIdentity::new(user_id, role);
        identity.nic = header(headers, USER_NIC_HEADER)?.map(str::to_string);
        identity.station_id = header(headers, STATION_ID_HEADER)?.map(str::to_string);

        Ok(Caller(identity))
    }
}

/// Optional absolute deadline for the request (`X-Request-Deadline`, RFC 3339).
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestDeadline(pub Option<DateTime<Utc>>);

impl<S> FromRequestParts<S> for RequestDeadline
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = header(&parts.headers, DEADLINE_HEADER)? else {
            return Ok(RequestDeadline(None));
        };
        let deadline = DateTime::parse_from_rfc3339(raw)
            .map_err(|e| ApiError::bad_request(format!("invalid X-Request-Deadline: {}", e)))?
            .with_timezone(&Utc);
        Ok(RequestDeadline(Some(deadline)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    async fn caller(req: Request<()>) -> Result<Caller, ApiError> {
        let (mut parts, _) = req.into_parts();
        Caller::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_all_identity_headers() {
        let req = Request::builder()
            .header("X-User-Id", "OP1")
            .header("X-User-Role", "station_operator")
            .header("X-User-Nic", "199012345678")
            .header("X-Station-Id", "ST1")
            .body(())
            .unwrap();

        let Caller(identity) = caller(req).await.unwrap();
        assert_eq!(identity.user_id, "OP1");
        assert_eq!(identity.role, Role::StationOperator);
        assert_eq!(identity.nic.as_deref(), Some("199012345678"));
        assert_eq!(identity.station_id.as_deref(), Some("ST1"));
    }

    #[tokio::test]
    async fn missing_user_is_unauthenticated() {
        let req = Request::builder()
            .header("X-User-Role", "ev_owner")
            .body(())
            .unwrap();
        let err = caller(req).await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_role_is_bad_request() {
        let req = Request::builder()
            .header("X-User-Id", "U1")
            .header("X-User-Role", "admin")
            .body(())
            .unwrap();
        let err = caller(req).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn deadline_is_parsed_to_utc() {
        let req = Request::builder()
            .header("X-Request-Deadline", "2025-03-10T11:00:00+02:00")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let RequestDeadline(deadline) = RequestDeadline::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(deadline.unwrap().to_rfc3339(), "2025-03-10T09:00:00+00:00");

        let req = Request::builder()
            .header("X-Request-Deadline", "tomorrow")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        assert!(RequestDeadline::from_request_parts(&mut parts, &()).await.is_err());
    }
}
