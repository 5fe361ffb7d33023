//! Registration and attendance operations
//!
//! Registrations are created exactly once per (user, event) pair, tracked
//! for attendance and rolled up into the per-student, per-event and global
//! summaries.

use crate::services::MailService;
use crate::{CoreError, Result};
use chrono::{DateTime, Utc};
use database::Db;
use db_storage::events::{Event, EventId, EventStatusCounts};
use db_storage::registrations::{
    AttendanceStatus, NewRegistration, Registration, RegistrationId, UpdateRegistration,
};
use db_storage::users::{User, UserId};
use serde::Serialize;
use std::sync::Arc;

/// How many other active events a registration confirmation suggests
const SUGGESTED_EVENTS: i64 = 3;

/// One row of the admin facing registration list of an event
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredStudent {
    pub student_id: UserId,
    pub username: String,
    pub email: String,
    pub roll_number: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub attendance_status: AttendanceStatus,
}

impl From<(Registration, User)> for RegisteredStudent {
    fn from((registration, user): (Registration, User)) -> Self {
        Self {
            student_id: user.id,
            username: user.username,
            email: user.email,
            roll_number: user.roll_number,
            registered_at: registration.registered_at,
            attendance_status: registration.attendance_status,
        }
    }
}

/// Participation summary of one student over all past events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StudentEventSummary {
    pub total_events_conducted: i64,
    pub total_events_registered: i64,
    pub total_events_present: i64,
    pub total_events_absent: i64,
}

/// Registration and attendance counters of a single event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminEventSummary {
    pub event_id: EventId,
    pub title: String,
    pub total_students: i64,
    pub total_registered: i64,
    pub total_present: i64,
    pub total_absent: i64,
}

/// Global event counters for the dashboard overview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverallEventSummary {
    pub total_events_conducted: i64,
    pub total_events_completed: i64,
    pub total_events_upcoming: i64,
    pub total_events_cancelled: i64,
}

impl From<EventStatusCounts> for OverallEventSummary {
    fn from(counts: EventStatusCounts) -> Self {
        Self {
            total_events_conducted: counts.total,
            total_events_completed: counts.completed,
            total_events_upcoming: counts.upcoming,
            total_events_cancelled: counts.cancelled,
        }
    }
}

/// Owns registrations, attendance tracking and the aggregate summaries
#[derive(Clone)]
pub struct RegistrationManager {
    db: Arc<Db>,
    mail_service: MailService,
}

impl RegistrationManager {
    pub fn new(db: Arc<Db>, mail_service: MailService) -> Self {
        Self { db, mail_service }
    }

    /// Registers a user for an event
    ///
    /// Uniqueness is enforced by the storage constraint, not by a
    /// check-then-act query: a duplicate call deterministically yields a
    /// conflict, no matter how the calls interleave. The confirmation mail
    /// is dispatched after the insert committed and its outcome is not
    /// awaited.
    #[tracing::instrument(err, skip_all, fields(%user_id, %event_id))]
    pub async fn register_student(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<Registration> {
        let db = Arc::clone(&self.db);

        let (registration, user, event, suggestions) = crate::block(
            move || -> Result<(Registration, User, Event, Vec<Event>)> {
                let mut conn = db.get_conn()?;

                // A foreign key violation surfaces as NotFound: the user or
                // event is gone.
                let registration = NewRegistration { user_id, event_id }
                    .try_insert(&mut conn)?
                    .ok_or(CoreError::Conflict("already registered for this event"))?;

                let user = User::get(&mut conn, user_id)?;
                let event = Event::get(&mut conn, event_id)?;
                let suggestions =
                    Event::get_active_excluding(&mut conn, event_id, SUGGESTED_EVENTS)?;

                Ok((registration, user, event, suggestions))
            },
        )
        .await??;

        let mail_service = self.mail_service.clone();

        tokio::spawn(async move {
            if let Err(e) = mail_service
                .send_registration_confirmation(&user, &event, &suggestions)
                .await
            {
                log::error!("Failed to send registration confirmation mail, {:#}", e);
            }
        });

        Ok(registration)
    }

    /// All registrations of one event, joined with the registered users
    ///
    /// An unknown or deleted event simply yields an empty list, matching the
    /// cascade semantics of event deletion.
    #[tracing::instrument(err, skip_all, fields(%event_id))]
    pub async fn registered_students(&self, event_id: EventId) -> Result<Vec<RegisteredStudent>> {
        let db = Arc::clone(&self.db);

        let students = crate::block(move || -> Result<Vec<RegisteredStudent>> {
            let mut conn = db.get_conn()?;

            let rows = Registration::get_for_event_with_users(&mut conn, event_id)?;

            Ok(rows.into_iter().map(RegisteredStudent::from).collect())
        })
        .await??;

        Ok(students)
    }

    /// Marks a registration as present or absent
    ///
    /// There is no attendance history, the previous marker is overwritten.
    #[tracing::instrument(err, skip_all, fields(%registration_id))]
    pub async fn update_attendance(
        &self,
        registration_id: RegistrationId,
        status: AttendanceStatus,
    ) -> Result<Registration> {
        if status == AttendanceStatus::NotApplicable {
            return Err(CoreError::validation(
                "attendance_status",
                "attendance can only be marked present or absent",
            ));
        }

        let db = Arc::clone(&self.db);

        let registration = crate::block(move || -> Result<Registration> {
            let mut conn = db.get_conn()?;

            let registration = UpdateRegistration {
                attendance_status: status,
            }
            .apply(&mut conn, registration_id)?;

            Ok(registration)
        })
        .await??;

        Ok(registration)
    }

    /// Participation counters of one student over all events whose date has
    /// passed, future events never count as conducted
    #[tracing::instrument(err, skip_all, fields(%student_id))]
    pub async fn student_summary(&self, student_id: UserId) -> Result<StudentEventSummary> {
        let db = Arc::clone(&self.db);
        let now = Utc::now();

        let summary = crate::block(move || -> Result<StudentEventSummary> {
            let mut conn = db.get_conn()?;

            let conducted = Event::count_conducted(&mut conn, now)?;
            let counts = Registration::student_counts(&mut conn, student_id, now)?;

            Ok(StudentEventSummary {
                total_events_conducted: conducted,
                total_events_registered: counts.registered,
                total_events_present: counts.present,
                total_events_absent: counts.absent,
            })
        })
        .await??;

        Ok(summary)
    }

    /// Registration and attendance counters of a single event
    ///
    /// `total_present` and `total_absent` count explicit markers only, a
    /// registration that was never marked is in neither bucket.
    #[tracing::instrument(err, skip_all, fields(%event_id))]
    pub async fn admin_summary(&self, event_id: EventId) -> Result<AdminEventSummary> {
        let db = Arc::clone(&self.db);

        let summary = crate::block(move || -> Result<AdminEventSummary> {
            let mut conn = db.get_conn()?;

            let event = Event::get(&mut conn, event_id)?;
            let total_students = User::count_students(&mut conn)?;
            let counts = Registration::attendance_counts(&mut conn, event_id)?;

            Ok(AdminEventSummary {
                event_id: event.id,
                title: event.title,
                total_students,
                total_registered: counts.registered,
                total_present: counts.present,
                total_absent: counts.absent,
            })
        })
        .await??;

        Ok(summary)
    }

    /// Global event counters, every event lands in exactly one of the
    /// completed/upcoming/cancelled buckets
    #[tracing::instrument(err, skip_all)]
    pub async fn overall_summary(&self) -> Result<OverallEventSummary> {
        let db = Arc::clone(&self.db);
        let now = Utc::now();

        let counts = crate::block(move || -> Result<EventStatusCounts> {
            let mut conn = db.get_conn()?;

            Ok(Event::status_counts(&mut conn, now)?)
        })
        .await??;

        Ok(counts.into())
    }
}
