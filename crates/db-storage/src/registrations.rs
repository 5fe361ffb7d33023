//! Contains the registration specific database structs and queries

use crate::events::EventId;
use crate::schema::{events, registrations, users};
use crate::users::{User, UserId};
use chrono::{DateTime, Utc};
use database::{DbConnection, Result};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

diesel_newtype!(RegistrationId);

sql_enum!(
    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    AttendanceStatus,
    "attendance_status",
    AttendanceStatusType,
    {
        Present = b"present",
        Absent = b"absent",
        NotApplicable = b"not_applicable",
    }
);

/// Diesel registration struct
///
/// Is used as a result in various queries. Represents a registration column
#[derive(Debug, Clone, Queryable, Identifiable, PartialEq)]
#[diesel(table_name = registrations)]
pub struct Registration {
    pub id: RegistrationId,
    pub user_id: UserId,
    pub event_id: EventId,
    pub registered_at: DateTime<Utc>,
    pub attendance_status: AttendanceStatus,
}

/// Per-event attendance counters
///
/// `present` and `absent` are explicit statuses; registrations that were
/// never marked stay in neither bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttendanceCounts {
    pub registered: i64,
    pub present: i64,
    pub absent: i64,
}

impl Registration {
    /// Returns all registrations of one event joined with the registered user,
    /// oldest registration first
    #[tracing::instrument(err, skip_all)]
    pub fn get_for_event_with_users(
        conn: &mut DbConnection,
        event_id: EventId,
    ) -> Result<Vec<(Registration, User)>> {
        let query = registrations::table
            .inner_join(users::table)
            .filter(registrations::event_id.eq(event_id))
            .order_by(registrations::registered_at.asc());

        let registrations = query.load(conn)?;

        Ok(registrations)
    }

    /// Attendance counters for a single event
    #[tracing::instrument(err, skip_all)]
    pub fn attendance_counts(
        conn: &mut DbConnection,
        event_id: EventId,
    ) -> Result<AttendanceCounts> {
        let registered = registrations::table
            .filter(registrations::event_id.eq(event_id))
            .count()
            .get_result(conn)?;

        let present = registrations::table
            .filter(
                registrations::event_id
                    .eq(event_id)
                    .and(registrations::attendance_status.eq(AttendanceStatus::Present)),
            )
            .count()
            .get_result(conn)?;

        let absent = registrations::table
            .filter(
                registrations::event_id
                    .eq(event_id)
                    .and(registrations::attendance_status.eq(AttendanceStatus::Absent)),
            )
            .count()
            .get_result(conn)?;

        Ok(AttendanceCounts {
            registered,
            present,
            absent,
        })
    }

    /// Attendance counters of one student over all events whose date has passed
    #[tracing::instrument(err, skip_all)]
    pub fn student_counts(
        conn: &mut DbConnection,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<AttendanceCounts> {
        let past_registrations = || {
            registrations::table
                .inner_join(events::table)
                .filter(
                    registrations::user_id
                        .eq(user_id)
                        .and(events::date.le(now)),
                )
        };

        let registered = past_registrations().count().get_result(conn)?;

        let present = past_registrations()
            .filter(registrations::attendance_status.eq(AttendanceStatus::Present))
            .count()
            .get_result(conn)?;

        let absent = past_registrations()
            .filter(registrations::attendance_status.eq(AttendanceStatus::Absent))
            .count()
            .get_result(conn)?;

        Ok(AttendanceCounts {
            registered,
            present,
            absent,
        })
    }
}

/// Diesel insertable registration struct
///
/// `registered_at` and the initial attendance status are filled in by
/// column defaults.
#[derive(Debug, Insertable)]
#[diesel(table_name = registrations)]
pub struct NewRegistration {
    pub user_id: UserId,
    pub event_id: EventId,
}

impl NewRegistration {
    /// Tries to insert the registration into the database
    ///
    /// Duplicate detection relies on the unique `(user_id, event_id)`
    /// constraint instead of a check-then-act query. When yielding a unique
    /// key violation, None is returned.
    #[tracing::instrument(err, skip_all)]
    pub fn try_insert(self, conn: &mut DbConnection) -> Result<Option<Registration>> {
        let query = self.insert_into(registrations::table);

        let result = query.get_result(conn);

        match result {
            Ok(registration) => Ok(Some(registration)),
            Err(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                ..,
            )) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Diesel registration struct for attendance updates
///
/// Attendance has no history, an update overwrites the previous marker.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = registrations)]
pub struct UpdateRegistration {
    pub attendance_status: AttendanceStatus,
}

impl UpdateRegistration {
    #[tracing::instrument(err, skip_all)]
    pub fn apply(
        self,
        conn: &mut DbConnection,
        registration_id: RegistrationId,
    ) -> Result<Registration> {
        let query = diesel::update(registrations::table)
            .filter(registrations::id.eq(registration_id))
            .set(self)
            .returning(registrations::all_columns);

        let registration = query.get_result(conn)?;

        Ok(registration)
    }
}
