//! Registration engine
//!
//! Admission with full requirement validation, the waitlist, check-in,
//! substitutions, seeding, and refunds. Capacity counts confirmed plus
//! checked-in registrations; everyone past capacity queues in a dense
//! FIFO waitlist that compacts on every departure.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use circuit_core::{
    invariants, EngineError, EngineResult, Page, Registration, RegistrationFilter,
    RegistrationOrder, RegistrationStatus, SortDir, Standing, Store, Team, Tournament,
    TournamentStatus, ValidationErrors,
};

use crate::tx::in_tx;

#[derive(Debug, Clone)]
pub struct RegisterIndividualRequest {
    pub tournament_id: Uuid,
    pub participant_id: Uuid,
    pub display_name: String,
    pub mmr: Option<i32>,
    pub region: Option<String>,
    pub identity_verified: bool,
    pub entry_fee_paid: bool,
}

#[derive(Debug, Clone)]
pub struct RegisterTeamRequest {
    pub tournament_id: Uuid,
    pub participant_id: Uuid,
    pub display_name: String,
    pub team_id: Uuid,
    pub team_name: String,
    pub members: Vec<Uuid>,
    pub mmr: Option<i32>,
    pub region: Option<String>,
    pub identity_verified: bool,
    pub entry_fee_paid: bool,
}

pub struct RegistrationService {
    store: Arc<dyn Store>,
}

impl RegistrationService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(&self, registration_id: Uuid) -> EngineResult<Registration> {
        self.store
            .registrations()
            .find_by_id(registration_id)
            .await?
            .ok_or_else(|| EngineError::not_found("registration", registration_id))
    }

    pub async fn list(
        &self,
        filter: &RegistrationFilter,
        page: Page,
    ) -> EngineResult<Vec<Registration>> {
        self.store
            .registrations()
            .find_many(filter, RegistrationOrder::CreatedAt(SortDir::Asc), page)
            .await
    }

    /// Waitlisted registrations in promotion order.
    pub async fn waitlist(&self, tournament_id: Uuid) -> EngineResult<Vec<Registration>> {
        self.store
            .registrations()
            .find_many(
                &RegistrationFilter {
                    tournament_id: Some(tournament_id),
                    statuses: Some(vec![RegistrationStatus::Waitlisted]),
                    ..Default::default()
                },
                RegistrationOrder::WaitlistPosition,
                Page::all(),
            )
            .await
    }

    /// Admit an individual. Every failed requirement is gathered into one
    /// validation error; acceptance lands as CONFIRMED (with a standing
    /// row) or WAITLISTED when the field is full.
    pub async fn register_individual(
        &self,
        req: RegisterIndividualRequest,
    ) -> EngineResult<Registration> {
        in_tx(&self.store, move |s| {
            Box::pin(async move {
                let tournament = load_tournament(s, req.tournament_id).await?;
                validate_admission(
                    &tournament,
                    req.mmr,
                    req.region.as_deref(),
                    req.identity_verified,
                    req.entry_fee_paid,
                )?;

                ensure_not_registered(s, req.tournament_id, &[req.participant_id], None).await?;

                let mut registration = Registration::new(
                    req.tournament_id,
                    req.participant_id,
                    req.display_name.clone(),
                );
                registration.mmr = req.mmr;
                registration.region = req.region.clone();
                registration.identity_verified = req.identity_verified;
                registration.entry_fee_paid = req.entry_fee_paid;

                admit(s, &tournament, registration).await
            })
        })
        .await
    }

    /// Admit a whole team; the registering participant fronts the entry.
    pub async fn register_team(&self, req: RegisterTeamRequest) -> EngineResult<Registration> {
        in_tx(&self.store, move |s| {
            Box::pin(async move {
                let tournament = load_tournament(s, req.tournament_id).await?;

                let team = Team {
                    id: req.team_id,
                    name: req.team_name.clone(),
                    members: req.members.clone(),
                };
                let mut errs = ValidationErrors::new();
                invariants::check_team_size(&tournament, &team, &mut errs);
                errs.into_result()?;

                validate_admission(
                    &tournament,
                    req.mmr,
                    req.region.as_deref(),
                    req.identity_verified,
                    req.entry_fee_paid,
                )?;
                ensure_not_registered(s, req.tournament_id, &req.members, Some(req.team_id))
                    .await?;

                let mut registration = Registration::new(
                    req.tournament_id,
                    req.participant_id,
                    req.display_name.clone(),
                );
                registration.team = Some(team);
                registration.mmr = req.mmr;
                registration.region = req.region.clone();
                registration.identity_verified = req.identity_verified;
                registration.entry_fee_paid = req.entry_fee_paid;

                admit(s, &tournament, registration).await
            })
        })
        .await
    }

    /// Cancel a registration. A confirmed departure promotes the waitlist
    /// head and compacts the remaining positions to 1..k.
    pub async fn cancel(&self, registration_id: Uuid) -> EngineResult<Registration> {
        in_tx(&self.store, move |s| {
            Box::pin(async move {
                let mut registration = load_registration(s, registration_id).await?;
                let tournament = load_tournament(s, registration.tournament_id).await?;
                if tournament.status == TournamentStatus::InProgress
                    || tournament.status.is_terminal()
                {
                    return Err(EngineError::PreconditionFailed(format!(
                        "tournament {} no longer accepts cancellations ({})",
                        tournament.id, tournament.status
                    )));
                }

                let freed_slot = registration.status.occupies_slot();
                let was_waitlisted = registration.status == RegistrationStatus::Waitlisted;
                registration.transition_to(RegistrationStatus::Cancelled)?;
                registration.waitlist_position = None;
                let registration = s.registrations().update(&registration).await?;

                if freed_slot {
                    delete_standing(s, registration.tournament_id, registration.participant_id)
                        .await?;
                    promote_waitlist_head(s, registration.tournament_id).await?;
                }
                if freed_slot || was_waitlisted {
                    compact_waitlist(s, registration.tournament_id).await?;
                }
                Ok(registration)
            })
        })
        .await
    }

    /// Check in within the tournament's check-in window.
    pub async fn check_in(&self, registration_id: Uuid) -> EngineResult<Registration> {
        let mut registration = self.get(registration_id).await?;
        let tournament = load_tournament(self.store.as_ref(), registration.tournament_id).await?;

        if tournament.status != TournamentStatus::CheckIn {
            return Err(EngineError::PreconditionFailed(format!(
                "tournament {} is not in its check-in phase ({})",
                tournament.id, tournament.status
            )));
        }
        let now = Utc::now();
        if let Some(start) = tournament.check_in_start {
            if now < start {
                return Err(EngineError::PreconditionFailed(
                    "check-in window has not opened yet".to_string(),
                ));
            }
        }
        if let Some(end) = tournament.check_in_end {
            if now > end {
                return Err(EngineError::PreconditionFailed(
                    "check-in window has closed".to_string(),
                ));
            }
        }

        registration.transition_to(RegistrationStatus::CheckedIn)?;
        registration.checked_in_at = Some(now);
        self.store.registrations().update(&registration).await
    }

    pub async fn mark_no_show(&self, registration_id: Uuid) -> EngineResult<Registration> {
        let mut registration = self.get(registration_id).await?;
        registration.transition_to(RegistrationStatus::NoShow)?;
        self.store.registrations().update(&registration).await
    }

    /// Swap the participant behind a registration, carrying the standing
    /// row along. Only before play begins.
    pub async fn substitute(
        &self,
        registration_id: Uuid,
        new_participant_id: Uuid,
        new_display_name: String,
    ) -> EngineResult<Registration> {
        in_tx(&self.store, move |s| {
            Box::pin(async move {
                let mut registration = load_registration(s, registration_id).await?;
                let tournament = load_tournament(s, registration.tournament_id).await?;
                if tournament.status == TournamentStatus::InProgress
                    || tournament.status.is_terminal()
                {
                    return Err(EngineError::PreconditionFailed(format!(
                        "tournament {} no longer accepts substitutions ({})",
                        tournament.id, tournament.status
                    )));
                }
                ensure_not_registered(s, registration.tournament_id, &[new_participant_id], None)
                    .await?;

                let old_participant = registration.participant_id;
                registration.substituted_from = Some(old_participant);
                registration.substituted_at = Some(Utc::now());
                registration.participant_id = new_participant_id;
                registration.display_name = new_display_name.clone();
                let registration = s.registrations().update(&registration).await?;

                // Carry the standing across when one exists.
                let filter = circuit_core::StandingFilter {
                    tournament_id: Some(registration.tournament_id),
                    participant_id: Some(old_participant),
                    ..Default::default()
                };
                if let Some(mut standing) = s
                    .standings()
                    .find_many(&filter, circuit_core::StandingOrder::default(), Page::all())
                    .await?
                    .into_iter()
                    .next()
                {
                    standing.participant_id = new_participant_id;
                    standing.display_name = new_display_name;
                    s.standings().update(&standing).await?;
                }

                info!(
                    registration_id = %registration_id,
                    from = %old_participant,
                    to = %new_participant_id,
                    "participant substituted"
                );
                Ok(registration)
            })
        })
        .await
    }

    /// Idempotent refund: a second call is refused.
    pub async fn issue_refund(
        &self,
        registration_id: Uuid,
        amount: Option<i64>,
    ) -> EngineResult<Registration> {
        let mut registration = self.get(registration_id).await?;
        if registration.refund_issued {
            return Err(EngineError::PreconditionFailed(format!(
                "registration {} already refunded",
                registration_id
            )));
        }
        let tournament = load_tournament(self.store.as_ref(), registration.tournament_id).await?;
        registration.refund_issued = true;
        registration.refund_amount = Some(amount.unwrap_or(tournament.entry_fee));
        registration.refunded_at = Some(Utc::now());
        self.store.registrations().update(&registration).await
    }

    /// Order the field by MMR descending (earlier registration breaks
    /// ties) and assign seeds 1..n.
    pub async fn seed_by_mmr(&self, tournament_id: Uuid) -> EngineResult<Vec<Registration>> {
        in_tx(&self.store, move |s| {
            Box::pin(async move {
                let mut regs = active_registrations(s, tournament_id).await?;
                regs.sort_by(|a, b| {
                    b.mmr
                        .unwrap_or(i32::MIN)
                        .cmp(&a.mmr.unwrap_or(i32::MIN))
                        .then(a.created_at.cmp(&b.created_at))
                });

                let mut seeded = Vec::with_capacity(regs.len());
                for (i, mut reg) in regs.into_iter().enumerate() {
                    reg.seed = Some(i as u32 + 1);
                    seeded.push(s.registrations().update(&reg).await?);
                }
                Ok(seeded)
            })
        })
        .await
    }

    pub async fn set_manual_seed(
        &self,
        registration_id: Uuid,
        seed: u32,
    ) -> EngineResult<Registration> {
        if seed == 0 {
            return Err(EngineError::Validation({
                let mut errs = ValidationErrors::new();
                errs.add("seed must be 1 or greater");
                errs
            }));
        }
        let mut registration = self.get(registration_id).await?;
        registration.seed = Some(seed);
        self.store.registrations().update(&registration).await
    }

    /// Apply a whole seed list atomically; any missing registration aborts
    /// the batch.
    pub async fn set_bulk_seeds(
        &self,
        seeds: Vec<(Uuid, u32)>,
    ) -> EngineResult<Vec<Registration>> {
        in_tx(&self.store, move |s| {
            Box::pin(async move {
                let mut updated = Vec::with_capacity(seeds.len());
                for (registration_id, seed) in seeds {
                    let mut reg = load_registration(s, registration_id).await?;
                    reg.seed = Some(seed);
                    updated.push(s.registrations().update(&reg).await?);
                }
                Ok(updated)
            })
        })
        .await
    }
}

/// Confirmed and checked-in registrations, the seedable field.
async fn active_registrations(
    store: &dyn Store,
    tournament_id: Uuid,
) -> EngineResult<Vec<Registration>> {
    store
        .registrations()
        .find_many(
            &RegistrationFilter {
                tournament_id: Some(tournament_id),
                statuses: Some(vec![
                    RegistrationStatus::Confirmed,
                    RegistrationStatus::CheckedIn,
                ]),
                ..Default::default()
            },
            RegistrationOrder::CreatedAt(SortDir::Asc),
            Page::all(),
        )
        .await
}

async fn load_tournament(store: &dyn Store, id: Uuid) -> EngineResult<Tournament> {
    store
        .tournaments()
        .find_by_id(id)
        .await?
        .ok_or_else(|| EngineError::not_found("tournament", id))
}

async fn load_registration(store: &dyn Store, id: Uuid) -> EngineResult<Registration> {
    store
        .registrations()
        .find_by_id(id)
        .await?
        .ok_or_else(|| EngineError::not_found("registration", id))
}

/// Gather every failed admission requirement before rejecting.
fn validate_admission(
    tournament: &Tournament,
    mmr: Option<i32>,
    region: Option<&str>,
    identity_verified: bool,
    entry_fee_paid: bool,
) -> EngineResult<()> {
    let mut errs = ValidationErrors::new();

    if tournament.status != TournamentStatus::RegistrationOpen {
        errs.add(format!(
            "tournament {} is not open for registration ({})",
            tournament.id, tournament.status
        ));
    }
    let now = Utc::now();
    if let Some(start) = tournament.registration_start {
        if now < start {
            errs.add("registration window has not opened yet");
        }
    }
    if let Some(end) = tournament.registration_end {
        if now > end {
            errs.add("registration window has closed");
        }
    }
    if let Some(min) = tournament.min_mmr {
        if mmr.map_or(true, |v| v < min) {
            errs.add(format!("mmr below the minimum of {}", min));
        }
    }
    if let Some(max) = tournament.max_mmr {
        if mmr.map_or(true, |v| v > max) {
            errs.add(format!("mmr above the maximum of {}", max));
        }
    }
    if tournament.require_identity_verification && !identity_verified {
        errs.add("identity verification is required");
    }
    if !tournament.allowed_regions.is_empty() {
        match region {
            Some(r) if tournament.allowed_regions.iter().any(|a| a == r) => {}
            _ => errs.add("region is not allowed for this tournament"),
        }
    }
    if tournament.entry_fee > 0 && !entry_fee_paid {
        errs.add("entry fee has not been paid");
    }

    errs.into_result()
}

/// Duplicate guard over participants and, for teams, the team id.
async fn ensure_not_registered(
    store: &dyn Store,
    tournament_id: Uuid,
    participants: &[Uuid],
    team_id: Option<Uuid>,
) -> EngineResult<()> {
    let existing = store
        .registrations()
        .find_many(
            &RegistrationFilter {
                tournament_id: Some(tournament_id),
                ..Default::default()
            },
            RegistrationOrder::CreatedAt(SortDir::Asc),
            Page::all(),
        )
        .await?;

    for reg in existing
        .iter()
        .filter(|r| r.status != RegistrationStatus::Cancelled)
    {
        for p in participants {
            let clashes = reg.participant_id == *p
                || reg
                    .team
                    .as_ref()
                    .map(|t| t.members.contains(p))
                    .unwrap_or(false);
            if clashes {
                return Err(EngineError::Conflict(format!(
                    "participant {} is already registered in tournament {}",
                    p, tournament_id
                )));
            }
        }
        if let (Some(team_id), Some(team)) = (team_id, reg.team.as_ref()) {
            if team.id == team_id {
                return Err(EngineError::Conflict(format!(
                    "team {} is already registered in tournament {}",
                    team_id, tournament_id
                )));
            }
        }
    }
    Ok(())
}

/// Place an accepted registration: confirmed with a standing row while
/// capacity lasts, waitlisted at the next dense position after.
async fn admit(
    store: &dyn Store,
    tournament: &Tournament,
    mut registration: Registration,
) -> EngineResult<Registration> {
    let occupied = store
        .registrations()
        .count(&RegistrationFilter {
            tournament_id: Some(tournament.id),
            statuses: Some(vec![
                RegistrationStatus::Confirmed,
                RegistrationStatus::CheckedIn,
            ]),
            ..Default::default()
        })
        .await?;

    if (occupied as u32) < tournament.max_participants {
        registration.transition_to(RegistrationStatus::Confirmed)?;
        let registration = store.registrations().insert(&registration).await?;
        create_standing(store, &registration).await?;
        info!(
            tournament_id = %tournament.id,
            participant = %registration.participant_id,
            "registration confirmed"
        );
        Ok(registration)
    } else {
        let queued = store
            .registrations()
            .count(&RegistrationFilter {
                tournament_id: Some(tournament.id),
                statuses: Some(vec![RegistrationStatus::Waitlisted]),
                ..Default::default()
            })
            .await?;
        registration.transition_to(RegistrationStatus::Waitlisted)?;
        registration.waitlist_position = Some(queued as u32 + 1);
        let registration = store.registrations().insert(&registration).await?;
        info!(
            tournament_id = %tournament.id,
            participant = %registration.participant_id,
            position = queued + 1,
            "registration waitlisted"
        );
        Ok(registration)
    }
}

async fn create_standing(store: &dyn Store, registration: &Registration) -> EngineResult<Standing> {
    let mut standing = Standing::new(
        registration.tournament_id,
        registration.participant_id,
        registration.display_name.clone(),
    );
    standing.team_id = registration.team.as_ref().map(|t| t.id);
    standing.seed = registration.seed;
    store.standings().insert(&standing).await
}

async fn delete_standing(
    store: &dyn Store,
    tournament_id: Uuid,
    participant_id: Uuid,
) -> EngineResult<()> {
    let filter = circuit_core::StandingFilter {
        tournament_id: Some(tournament_id),
        participant_id: Some(participant_id),
        ..Default::default()
    };
    let standings = store
        .standings()
        .find_many(&filter, circuit_core::StandingOrder::default(), Page::all())
        .await?;
    for s in standings {
        store.standings().delete(s.id).await?;
    }
    Ok(())
}

/// FIFO promotion of the waitlist head into the freed slot.
async fn promote_waitlist_head(store: &dyn Store, tournament_id: Uuid) -> EngineResult<()> {
    let waitlist = store
        .registrations()
        .find_many(
            &RegistrationFilter {
                tournament_id: Some(tournament_id),
                statuses: Some(vec![RegistrationStatus::Waitlisted]),
                ..Default::default()
            },
            RegistrationOrder::WaitlistPosition,
            Page::all(),
        )
        .await?;

    if let Some(mut head) = waitlist.into_iter().next() {
        head.transition_to(RegistrationStatus::Confirmed)?;
        head.waitlist_position = None;
        let head = store.registrations().update(&head).await?;
        create_standing(store, &head).await?;
        info!(
            tournament_id = %tournament_id,
            participant = %head.participant_id,
            "waitlist head promoted"
        );
    }
    Ok(())
}

/// Renumber waitlist positions to a contiguous 1..k.
async fn compact_waitlist(store: &dyn Store, tournament_id: Uuid) -> EngineResult<()> {
    let waitlist = store
        .registrations()
        .find_many(
            &RegistrationFilter {
                tournament_id: Some(tournament_id),
                statuses: Some(vec![RegistrationStatus::Waitlisted]),
                ..Default::default()
            },
            RegistrationOrder::WaitlistPosition,
            Page::all(),
        )
        .await?;

    for (i, mut reg) in waitlist.into_iter().enumerate() {
        let expected = Some(i as u32 + 1);
        if reg.waitlist_position != expected {
            reg.waitlist_position = expected;
            store.registrations().update(&reg).await?;
        }
    }

    let all = store
        .registrations()
        .find_many(
            &RegistrationFilter {
                tournament_id: Some(tournament_id),
                ..Default::default()
            },
            RegistrationOrder::CreatedAt(SortDir::Asc),
            Page::all(),
        )
        .await?;
    invariants::check_waitlist_positions(&all)
}
