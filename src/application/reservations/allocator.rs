//! Reservation allocation: the write path
//!
//! Slot claims and reservation records live in two independently atomic
//! stores with no shared transaction. The claim is the authoritative step;
//! the reservation write confirms it, and a compensating release undoes the
//! claim when anything downstream fails. A claimed slot never outlives its
//! owning reservation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::{
    ChargingSlot, ClaimOutcome, DomainError, DomainResult, ReleaseOutcome, RepositoryProvider,
    Reservation, SlotAssignment, TimePolicy, Transition,
};
use crate::shared::{FieldUpdate, SharedClock};

// ── Commands ───────────────────────────────────────────────────────

/// Input for [`ReservationAllocator::create`].
///
/// Either `slot_id` is given (station and time follow the slot), or
/// `station_id` + `reservation_time` describe a slot-less reservation.
#[derive(Debug, Clone, Default)]
pub struct CreateReservation {
    pub owner_id: String,
    pub station_id: Option<String>,
    pub slot_id: Option<String>,
    pub reservation_time: Option<DateTime<Utc>>,
    /// Abort before any claim is issued once this instant has passed
    pub deadline: Option<DateTime<Utc>>,
}

/// Partial update for [`ReservationAllocator::update`].
#[derive(Debug, Clone, Default)]
pub struct ReservationUpdate {
    pub slot: FieldUpdate<String>,
    pub station_id: Option<String>,
    pub reservation_time: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
}

impl ReservationUpdate {
    pub fn move_to_slot(slot_id: impl Into<String>) -> Self {
        Self {
            slot: FieldUpdate::Set(slot_id.into()),
            ..Self::default()
        }
    }
}

/// Why a reopened reservation came back without its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReopenWarning {
    SlotMissing,
    SlotTaken,
    ReattachFailed,
}

impl ReopenWarning {
    pub fn code(&self) -> &'static str {
        match self {
            Self::SlotMissing => "slot_missing",
            Self::SlotTaken => "slot_taken",
            Self::ReattachFailed => "reattach_failed",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::SlotMissing => "slot no longer exists",
            Self::SlotTaken => "slot already booked by someone else",
            Self::ReattachFailed => "failed to re-attach slot",
        }
    }
}

impl std::fmt::Display for ReopenWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReopenOutcome {
    pub reservation: Reservation,
    pub warning: Option<ReopenWarning>,
}

// ── Metrics ────────────────────────────────────────────────────────

fn record_claim(outcome: &'static str) {
    metrics::counter!("booking_slot_claims_total", "outcome" => outcome).increment(1);
}

fn record_compensation(result: &'static str) {
    metrics::counter!("booking_compensations_total", "result" => result).increment(1);
}

fn record_inconsistency() {
    metrics::counter!("booking_inconsistencies_total").increment(1);
}

fn record_transition(transition: &'static str) {
    metrics::counter!("booking_transitions_total", "transition" => transition).increment(1);
}

/// Reason `transition` is refused for `r`, if it is.
fn refusal(r: &Reservation, transition: Transition) -> Option<&'static str> {
    match transition {
        Transition::Approve if r.canceled => Some("cannot approve a canceled reservation"),
        Transition::Approve if r.completed => Some("cannot approve a completed reservation"),
        Transition::Confirm if r.canceled => Some("cannot confirm a canceled reservation"),
        Transition::Confirm if r.completed => Some("reservation is already completed"),
        Transition::Complete if r.completed => Some("reservation is already completed"),
        Transition::Complete if r.canceled => Some("cannot complete a canceled reservation"),
        Transition::Complete if !r.confirmed => Some("must be confirmed first"),
        Transition::Cancel if r.canceled => Some("reservation is already canceled"),
        Transition::Cancel if r.completed => Some("cannot cancel a completed reservation"),
        Transition::Reopen if !r.canceled => Some("only canceled reservations can be reopened"),
        _ => None,
    }
}

// ── Allocator ──────────────────────────────────────────────────────

/// Orchestrates slot claims, reservation writes and the time policy.
///
/// Stateless between calls and holds no locks; any number of instances may
/// run against the same stores.
pub struct ReservationAllocator {
    repos: Arc<dyn RepositoryProvider>,
    policy: TimePolicy,
    clock: SharedClock,
}

impl ReservationAllocator {
    pub fn new(repos: Arc<dyn RepositoryProvider>, policy: TimePolicy, clock: SharedClock) -> Self {
        Self {
            repos,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &TimePolicy {
        &self.policy
    }

    // ── Create ─────────────────────────────────────────────────

    pub async fn create(&self, cmd: CreateReservation) -> DomainResult<Reservation> {
        if cmd.owner_id.trim().is_empty() {
            return Err(DomainError::Validation("owner_id is required".into()));
        }
        let now = self.clock.now();

        let slot = match cmd.slot_id.clone() {
            Some(slot_id) => self.load_slot(&slot_id).await?,
            None => return self.create_slotless(cmd, now).await,
        };
        if cmd.station_id.as_deref().is_some_and(|s| s != slot.station_id) {
            return Err(DomainError::Validation(format!(
                "slot {} does not belong to station {}",
                slot.id,
                cmd.station_id.as_deref().unwrap_or_default()
            )));
        }
        if cmd.reservation_time.is_some_and(|t| t != slot.start_time) {
            return Err(DomainError::Validation(
                "reservation time must match the slot start".into(),
            ));
        }

        self.policy.check_admission(slot.start_time, now)?;
        self.check_deadline(cmd.deadline)?;

        let reservation_id = uuid::Uuid::new_v4().to_string();
        let claimed = self.claim(&slot.id, &cmd.owner_id, &reservation_id).await?;

        let reservation = Reservation::new(
            reservation_id.clone(),
            cmd.owner_id,
            claimed.station_id.clone(),
            Some(claimed.id.clone()),
            claimed.start_time,
            now,
        );

        match self.repos.reservations().create(reservation).await {
            Ok(created) => {
                record_transition("create");
                info!(
                    reservation_id = %created.id,
                    owner_id = %created.owner_id,
                    slot_id = %claimed.id,
                    "✅ Reservation created"
                );
                Ok(created)
            }
            Err(e) => {
                warn!(slot_id = %claimed.id, error = %e, "Reservation insert failed after claim");
                Err(self.compensate(&claimed.id, &reservation_id, e).await)
            }
        }
    }

    async fn create_slotless(
        &self,
        cmd: CreateReservation,
        now: DateTime<Utc>,
    ) -> DomainResult<Reservation> {
        let (Some(station_id), Some(reservation_time)) = (cmd.station_id, cmd.reservation_time)
        else {
            return Err(DomainError::Validation(
                "either slot_id or station_id and reservation_time are required".into(),
            ));
        };
        if station_id.trim().is_empty() {
            return Err(DomainError::Validation("station_id is required".into()));
        }

        self.policy.check_admission(reservation_time, now)?;
        self.check_deadline(cmd.deadline)?;

        let reservation = Reservation::new(
            uuid::Uuid::new_v4().to_string(),
            cmd.owner_id,
            station_id,
            None,
            reservation_time,
            now,
        );
        let created = self.repos.reservations().create(reservation).await?;
        record_transition("create");
        info!(reservation_id = %created.id, station_id = %created.station_id, "✅ Slot-less reservation created");
        Ok(created)
    }

    // ── Update ─────────────────────────────────────────────────

    /// Reschedule a reservation.
    ///
    /// The lockout window is checked against the current reservation time.
    /// A new slot is claimed first; only after the reservation has been
    /// rebound is the old slot released.
    pub async fn update(&self, id: &str, changes: ReservationUpdate) -> DomainResult<Reservation> {
        let current = self.load(id).await?;
        if !current.is_open() {
            return Err(DomainError::InvalidState(format!(
                "cannot update a {} reservation",
                current.status()
            )));
        }
        let now = self.clock.now();
        self.policy.check_mutable(current.reservation_time, now)?;

        match changes.slot {
            FieldUpdate::Set(ref slot_id) if current.holds_slot(Some(slot_id.as_str())) => {
                self.reject_mismatch(&changes, &current.station_id, current.reservation_time)?;
                Ok(current)
            }
            FieldUpdate::Set(ref slot_id) => self.move_to_slot(current, slot_id, &changes, now).await,
            FieldUpdate::Clear if current.slot_id.is_some() => {
                self.detach_slot(current, &changes, now).await
            }
            FieldUpdate::Clear | FieldUpdate::Unchanged => {
                self.reschedule_slotless(current, &changes, now).await
            }
        }
    }

    fn reject_mismatch(
        &self,
        changes: &ReservationUpdate,
        station_id: &str,
        time: DateTime<Utc>,
    ) -> DomainResult<()> {
        if changes.station_id.as_deref().is_some_and(|s| s != station_id)
            || changes.reservation_time.is_some_and(|t| t != time)
        {
            return Err(DomainError::Validation(
                "station and time follow the slot and cannot be set separately".into(),
            ));
        }
        Ok(())
    }

    async fn move_to_slot(
        &self,
        current: Reservation,
        slot_id: &str,
        changes: &ReservationUpdate,
        now: DateTime<Utc>,
    ) -> DomainResult<Reservation> {
        let slot = self.load_slot(slot_id).await?;
        self.reject_mismatch(changes, &slot.station_id, slot.start_time)?;
        self.policy.check_admission(slot.start_time, now)?;
        self.check_deadline(changes.deadline)?;

        let claimed = self.claim(&slot.id, &current.owner_id, &current.id).await?;

        let assignment = SlotAssignment {
            slot_id: Some(claimed.id.clone()),
            station_id: claimed.station_id.clone(),
            reservation_time: claimed.start_time,
        };
        let rebound = self
            .repos
            .reservations()
            .reassign(&current.id, current.slot_id.as_deref(), assignment, now)
            .await;

        let updated = match rebound {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                let cause = self.explain(&current.id, None).await;
                return Err(self.compensate(&claimed.id, &current.id, cause).await);
            }
            Err(e) => return Err(self.compensate(&claimed.id, &current.id, e).await),
        };

        if let Some(old_slot) = current.slot_id.as_deref() {
            self.release_after_commit(old_slot, &current.id).await;
        }

        record_transition("update");
        info!(
            reservation_id = %updated.id,
            from = ?current.slot_id,
            to = %claimed.id,
            "🔁 Reservation moved to new slot"
        );
        Ok(updated)
    }

    async fn detach_slot(
        &self,
        current: Reservation,
        changes: &ReservationUpdate,
        now: DateTime<Utc>,
    ) -> DomainResult<Reservation> {
        let time = changes.reservation_time.unwrap_or(current.reservation_time);
        if time != current.reservation_time {
            self.policy.check_admission(time, now)?;
        }
        self.check_deadline(changes.deadline)?;

        let assignment = SlotAssignment {
            slot_id: None,
            station_id: changes
                .station_id
                .clone()
                .unwrap_or_else(|| current.station_id.clone()),
            reservation_time: time,
        };
        let updated = self
            .repos
            .reservations()
            .reassign(&current.id, current.slot_id.as_deref(), assignment, now)
            .await?;
        let Some(updated) = updated else {
            return Err(self.explain(&current.id, None).await);
        };

        if let Some(old_slot) = current.slot_id.as_deref() {
            self.release_after_commit(old_slot, &current.id).await;
        }
        record_transition("update");
        info!(reservation_id = %updated.id, "Reservation detached from its slot");
        Ok(updated)
    }

    async fn reschedule_slotless(
        &self,
        current: Reservation,
        changes: &ReservationUpdate,
        now: DateTime<Utc>,
    ) -> DomainResult<Reservation> {
        let station_id = changes
            .station_id
            .clone()
            .unwrap_or_else(|| current.station_id.clone());
        let time = changes.reservation_time.unwrap_or(current.reservation_time);

        if station_id == current.station_id && time == current.reservation_time {
            return Ok(current);
        }
        if current.slot_id.is_some() {
            return Err(DomainError::InvalidState(
                "time and station of a slotted reservation follow its slot".into(),
            ));
        }
        if time != current.reservation_time {
            self.policy.check_admission(time, now)?;
        }
        self.check_deadline(changes.deadline)?;

        let assignment = SlotAssignment {
            slot_id: None,
            station_id,
            reservation_time: time,
        };
        let updated = self
            .repos
            .reservations()
            .reassign(&current.id, None, assignment, now)
            .await?;
        let Some(updated) = updated else {
            return Err(self.explain(&current.id, None).await);
        };

        record_transition("update");
        info!(reservation_id = %updated.id, "Reservation rescheduled");
        Ok(updated)
    }

    // ── Cancel ─────────────────────────────────────────────────

    /// Cancel and release the held slot.
    ///
    /// The release is idempotent; a slot already released or deleted does
    /// not fail the cancel.
    pub async fn cancel(&self, id: &str) -> DomainResult<Reservation> {
        let current = self.load(id).await?;
        if let Some(reason) = refusal(&current, Transition::Cancel) {
            return Err(DomainError::InvalidState(reason.into()));
        }
        self.policy
            .check_mutable(current.reservation_time, self.clock.now())?;

        let canceled = self.apply(id, Transition::Cancel).await?;

        if let Some(slot_id) = canceled.slot_id.as_deref() {
            self.release_after_commit(slot_id, &canceled.id).await;
        }
        info!(reservation_id = %canceled.id, "❌ Reservation canceled");
        Ok(canceled)
    }

    // ── Forward transitions ────────────────────────────────────

    pub async fn approve(&self, id: &str) -> DomainResult<Reservation> {
        self.forward(id, Transition::Approve).await
    }

    pub async fn confirm(&self, id: &str) -> DomainResult<Reservation> {
        self.forward(id, Transition::Confirm).await
    }

    pub async fn complete(&self, id: &str) -> DomainResult<Reservation> {
        self.forward(id, Transition::Complete).await
    }

    async fn forward(&self, id: &str, transition: Transition) -> DomainResult<Reservation> {
        let current = self.load(id).await?;
        if let Some(reason) = refusal(&current, transition) {
            return Err(DomainError::InvalidState(reason.into()));
        }
        let updated = self.apply(id, transition).await?;
        info!(
            reservation_id = %updated.id,
            transition = transition.as_str(),
            status = %updated.status(),
            "Reservation transition applied"
        );
        Ok(updated)
    }

    // ── Reopen ─────────────────────────────────────────────────

    /// Flip a canceled reservation back to pending and try to win back its
    /// previous slot. Losing the slot is reported as a warning, not an error.
    pub async fn reopen(
        &self,
        id: &str,
        deadline: Option<DateTime<Utc>>,
    ) -> DomainResult<ReopenOutcome> {
        let current = self.load(id).await?;
        if let Some(reason) = refusal(&current, Transition::Reopen) {
            return Err(DomainError::InvalidState(reason.into()));
        }
        self.check_deadline(deadline)?;

        let previous_slot = current.slot_id.clone();
        let reopened = self.apply(id, Transition::Reopen).await?;

        let Some(slot_id) = previous_slot else {
            info!(reservation_id = %reopened.id, "🔓 Reservation reopened");
            return Ok(ReopenOutcome {
                reservation: reopened,
                warning: None,
            });
        };

        let outcome = match self
            .repos
            .slots()
            .claim(&slot_id, &reopened.owner_id, &reopened.id)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                record_claim("error");
                warn!(reservation_id = %reopened.id, slot_id = %slot_id, error = %e, "Slot re-claim failed");
                self.best_effort_release(&slot_id, &reopened.id).await;
                return Ok(Self::reopened_without_slot(reopened, ReopenWarning::ReattachFailed));
            }
        };

        let slot = match outcome {
            ClaimOutcome::Claimed(slot) => {
                record_claim("claimed");
                slot
            }
            ClaimOutcome::NotFound => {
                record_claim("not_found");
                return Ok(Self::reopened_without_slot(reopened, ReopenWarning::SlotMissing));
            }
            ClaimOutcome::Conflict => {
                record_claim("conflict");
                return Ok(Self::reopened_without_slot(reopened, ReopenWarning::SlotTaken));
            }
        };

        let assignment = SlotAssignment {
            slot_id: Some(slot.id.clone()),
            station_id: slot.station_id.clone(),
            reservation_time: slot.start_time,
        };
        let attached = self
            .repos
            .reservations()
            .reassign(&reopened.id, None, assignment, self.clock.now())
            .await;

        match attached {
            Ok(Some(reservation)) => {
                info!(reservation_id = %reservation.id, slot_id = %slot.id, "🔓 Reservation reopened with its slot");
                Ok(ReopenOutcome {
                    reservation,
                    warning: None,
                })
            }
            failed => {
                let cause = match failed {
                    Err(e) => e,
                    _ => DomainError::Conflict(format!(
                        "reservation {} changed while re-attaching slot {}",
                        reopened.id, slot.id
                    )),
                };
                let surfaced = self.compensate(&slot.id, &reopened.id, cause).await;
                if matches!(surfaced, DomainError::Inconsistency(_)) {
                    return Err(surfaced);
                }
                let latest = self.load(&reopened.id).await.unwrap_or(reopened);
                Ok(Self::reopened_without_slot(latest, ReopenWarning::ReattachFailed))
            }
        }
    }

    fn reopened_without_slot(reservation: Reservation, warning: ReopenWarning) -> ReopenOutcome {
        warn!(reservation_id = %reservation.id, warning = %warning, "Reservation reopened without a slot");
        ReopenOutcome {
            reservation,
            warning: Some(warning),
        }
    }

    // ── Helpers ────────────────────────────────────────────────

    async fn load(&self, id: &str) -> DomainResult<Reservation> {
        self.repos
            .reservations()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Reservation", id))
    }

    async fn load_slot(&self, id: &str) -> DomainResult<ChargingSlot> {
        self.repos
            .slots()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("ChargingSlot", id))
    }

    fn check_deadline(&self, deadline: Option<DateTime<Utc>>) -> DomainResult<()> {
        match deadline {
            Some(d) if self.clock.now() >= d => Err(DomainError::DeadlineExceeded(format!(
                "request deadline {} passed",
                d.to_rfc3339()
            ))),
            _ => Ok(()),
        }
    }

    /// Claim `slot_id` for `reservation_id`, mapping the outcome to errors.
    async fn claim(
        &self,
        slot_id: &str,
        owner_id: &str,
        reservation_id: &str,
    ) -> DomainResult<ChargingSlot> {
        match self.repos.slots().claim(slot_id, owner_id, reservation_id).await {
            Ok(ClaimOutcome::Claimed(slot)) => {
                record_claim("claimed");
                debug!(slot_id, reservation_id, "Slot claimed");
                Ok(slot)
            }
            Ok(ClaimOutcome::Conflict) => {
                record_claim("conflict");
                info!(slot_id, owner_id, "Slot already booked");
                Err(DomainError::Conflict("slot already booked".into()))
            }
            Ok(ClaimOutcome::NotFound) => {
                record_claim("not_found");
                Err(DomainError::not_found("ChargingSlot", slot_id))
            }
            Err(e) => {
                // The write may have landed before the failure surfaced
                record_claim("error");
                self.best_effort_release(slot_id, reservation_id).await;
                Err(e)
            }
        }
    }

    /// Undo a successful claim after a downstream failure.
    ///
    /// Returns the error to surface: `cause` when the slot was freed,
    /// `Inconsistency` when the release itself failed.
    async fn compensate(&self, slot_id: &str, reservation_id: &str, cause: DomainError) -> DomainError {
        match self.repos.slots().release(slot_id, reservation_id).await {
            Ok(outcome) => {
                record_compensation(match outcome {
                    ReleaseOutcome::Released => "released",
                    ReleaseOutcome::NotFound => "noop",
                });
                info!(slot_id, reservation_id, cause = %cause, "↩️ Claim compensated");
                cause
            }
            Err(release_err) => {
                record_compensation("failed");
                record_inconsistency();
                error!(
                    slot_id,
                    reservation_id,
                    cause = %cause,
                    release_error = %release_err,
                    "🚨 Compensating release failed; slot claimed without a valid reservation"
                );
                DomainError::Inconsistency(format!(
                    "slot {} remains claimed by {} after: {}",
                    slot_id, reservation_id, cause
                ))
            }
        }
    }

    async fn best_effort_release(&self, slot_id: &str, reservation_id: &str) {
        match self.repos.slots().release(slot_id, reservation_id).await {
            Ok(ReleaseOutcome::Released) => {
                record_compensation("released");
                info!(slot_id, reservation_id, "↩️ Released claim of unknown outcome");
            }
            Ok(ReleaseOutcome::NotFound) => {}
            Err(e) => {
                record_compensation("failed");
                warn!(slot_id, reservation_id, error = %e, "Release after failed claim also failed");
            }
        }
    }

    /// Release a slot whose reservation has already moved on. The reservation
    /// write is committed, so a failure here is logged rather than returned.
    async fn release_after_commit(&self, slot_id: &str, reservation_id: &str) {
        match self.repos.slots().release(slot_id, reservation_id).await {
            Ok(ReleaseOutcome::Released) => debug!(slot_id, reservation_id, "Slot released"),
            Ok(ReleaseOutcome::NotFound) => {
                debug!(slot_id, reservation_id, "Slot already released")
            }
            Err(e) => {
                record_inconsistency();
                error!(
                    slot_id,
                    reservation_id,
                    error = %e,
                    "🚨 Slot release failed; slot still claimed by a detached reservation"
                );
            }
        }
    }

    /// Conditional transition; a rejected write is explained by re-reading.
    async fn apply(&self, id: &str, transition: Transition) -> DomainResult<Reservation> {
        let updated = self
            .repos
            .reservations()
            .transition(id, transition, self.clock.now())
            .await?;
        match updated {
            Some(r) => {
                record_transition(transition.as_str());
                Ok(r)
            }
            None => Err(self.explain(id, Some(transition)).await),
        }
    }

    /// Turn a rejected conditional write into the error a caller should see.
    async fn explain(&self, id: &str, transition: Option<Transition>) -> DomainError {
        let current = match self.repos.reservations().find_by_id(id).await {
            Ok(Some(r)) => r,
            Ok(None) => return DomainError::not_found("Reservation", id),
            Err(e) => return e,
        };
        if let Some(reason) = transition.and_then(|t| refusal(&current, t)) {
            return DomainError::InvalidState(reason.into());
        }
        if !current.is_open() {
            return DomainError::InvalidState(format!(
                "reservation is {}",
                current.status()
            ));
        }
        DomainError::Conflict(format!("reservation {} was modified concurrently", id))
    }
}
