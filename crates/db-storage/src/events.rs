//! Contains the event specific database structs and queries

use crate::schema::events;
use chrono::{DateTime, Utc};
use database::{DbConnection, Result};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

diesel_newtype!(EventId);

sql_enum!(
    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    EventStatus,
    "event_status",
    EventStatusType,
    {
        Active = b"active",
        Cancelled = b"cancelled",
    }
);

sql_enum!(
    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    EventMode,
    "event_mode",
    EventModeType,
    {
        Online = b"online",
        Offline = b"offline",
    }
);

/// Diesel event struct
///
/// Is used as a result in various queries. Represents an event column
#[derive(Debug, Clone, Queryable, Identifiable, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub category: String,
    pub status: EventStatus,
    pub description1: Option<String>,
    pub description2: Option<String>,
    pub description3: Option<String>,
    pub venue: String,
    pub mode: EventMode,
    pub meeting_link: String,
    pub date: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub organizer: String,
    pub representative: String,
    pub phone_number_representative: String,
    pub email_representative: String,
    pub registration_link: String,
    pub maximum_participants: i32,

    /// Blob store URLs in upload order, at most 5
    pub images: Vec<String>,
}

impl Event {
    /// Human readable location details depending on the event mode
    pub fn mode_details(&self) -> String {
        match self.mode {
            EventMode::Offline => format!("Venue: {}", self.venue),
            EventMode::Online => format!("Online ({})", self.meeting_link),
        }
    }
}

/// Non-persisted aggregate over the events table
///
/// Every event falls into exactly one of the completed/upcoming/cancelled
/// buckets, so the three partition counts sum up to `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventStatusCounts {
    pub total: i64,
    pub completed: i64,
    pub upcoming: i64,
    pub cancelled: i64,
}

impl Event {
    #[tracing::instrument(err, skip_all)]
    pub fn get(conn: &mut DbConnection, event_id: EventId) -> Result<Event> {
        let query = events::table.filter(events::id.eq(event_id));

        let event = query.first(conn)?;

        Ok(event)
    }

    /// Returns all events, newest date first
    #[tracing::instrument(err, skip_all)]
    pub fn get_all(conn: &mut DbConnection) -> Result<Vec<Event>> {
        let query = events::table.order_by(events::date.desc());

        let events = query.load(conn)?;

        Ok(events)
    }

    /// Returns up to `limit` active events other than `event_id`
    ///
    /// Used for the "you may also like" section of the registration
    /// confirmation mail.
    #[tracing::instrument(err, skip_all)]
    pub fn get_active_excluding(
        conn: &mut DbConnection,
        event_id: EventId,
        limit: i64,
    ) -> Result<Vec<Event>> {
        let query = events::table
            .filter(
                events::id
                    .ne(event_id)
                    .and(events::status.eq(EventStatus::Active)),
            )
            .order_by(events::date.asc())
            .limit(limit);

        let events = query.load(conn)?;

        Ok(events)
    }

    /// Flips the status of an active event to cancelled
    ///
    /// Returns `None` when no active event with the given id exists, i.e.
    /// the id is unknown or the event is already cancelled. The filter on
    /// the current status makes concurrent cancel calls race-free: only one
    /// of them gets the row.
    #[tracing::instrument(err, skip_all)]
    pub fn cancel(conn: &mut DbConnection, event_id: EventId) -> Result<Option<Event>> {
        let query = diesel::update(events::table)
            .filter(
                events::id
                    .eq(event_id)
                    .and(events::status.ne(EventStatus::Cancelled)),
            )
            .set(events::status.eq(EventStatus::Cancelled))
            .returning(events::all_columns);

        let event = query.get_result(conn).optional()?;

        Ok(event)
    }

    /// Hard-deletes the event, registrations cascade at the storage layer
    ///
    /// Returns `false` if no row was deleted.
    #[tracing::instrument(err, skip_all)]
    pub fn delete_by_id(conn: &mut DbConnection, event_id: EventId) -> Result<bool> {
        let lines_changed = diesel::delete(events::table)
            .filter(events::id.eq(event_id))
            .execute(conn)?;

        Ok(lines_changed > 0)
    }

    /// Number of events whose date has passed, regardless of status
    #[tracing::instrument(err, skip_all)]
    pub fn count_conducted(conn: &mut DbConnection, now: DateTime<Utc>) -> Result<i64> {
        let count = events::table
            .filter(events::date.le(now))
            .count()
            .get_result(conn)?;

        Ok(count)
    }

    /// Partitions all events into completed/upcoming/cancelled buckets
    #[tracing::instrument(err, skip_all)]
    pub fn status_counts(conn: &mut DbConnection, now: DateTime<Utc>) -> Result<EventStatusCounts> {
        let total = events::table.count().get_result(conn)?;

        let cancelled = events::table
            .filter(events::status.eq(EventStatus::Cancelled))
            .count()
            .get_result(conn)?;

        let completed = events::table
            .filter(
                events::date
                    .lt(now)
                    .and(events::status.ne(EventStatus::Cancelled)),
            )
            .count()
            .get_result(conn)?;

        let upcoming = events::table
            .filter(
                events::date
                    .ge(now)
                    .and(events::status.ne(EventStatus::Cancelled)),
            )
            .count()
            .get_result(conn)?;

        Ok(EventStatusCounts {
            total,
            completed,
            upcoming,
            cancelled,
        })
    }
}

/// Diesel insertable event struct
///
/// Represents fields that have to be provided on event insertion.
#[derive(Debug, Insertable)]
#[diesel(table_name = events)]
pub struct NewEvent {
    pub title: String,
    pub category: String,
    pub status: EventStatus,
    pub description1: Option<String>,
    pub description2: Option<String>,
    pub description3: Option<String>,
    pub venue: String,
    pub mode: EventMode,
    pub meeting_link: String,
    pub date: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    pub organizer: String,
    pub representative: String,
    pub phone_number_representative: String,
    pub email_representative: String,
    pub registration_link: String,
    pub maximum_participants: i32,
    pub images: Vec<String>,
}

impl NewEvent {
    #[tracing::instrument(err, skip_all)]
    pub fn insert(self, conn: &mut DbConnection) -> Result<Event> {
        let query = self.insert_into(events::table);

        let event = query.get_result(conn)?;

        Ok(event)
    }
}

/// Diesel event struct for updates
///
/// Is used in update queries. None fields will be ignored on update queries
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = events)]
pub struct UpdateEvent {
    pub title: Option<String>,
    pub category: Option<String>,
    pub description1: Option<String>,
    pub description2: Option<String>,
    pub description3: Option<String>,
    pub venue: Option<String>,
    pub mode: Option<EventMode>,
    pub meeting_link: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub organizer: Option<String>,
    pub representative: Option<String>,
    pub phone_number_representative: Option<String>,
    pub email_representative: Option<String>,
    pub registration_link: Option<String>,
    pub maximum_participants: Option<i32>,
    pub images: Option<Vec<String>>,
}

impl UpdateEvent {
    /// Applies the update to an event that is not cancelled
    ///
    /// Cancelled events are terminal, the filter keeps a concurrent
    /// cancellation from being overwritten.
    #[tracing::instrument(err, skip_all)]
    pub fn apply(self, conn: &mut DbConnection, event_id: EventId) -> Result<Event> {
        let query = diesel::update(events::table)
            .filter(
                events::id
                    .eq(event_id)
                    .and(events::status.ne(EventStatus::Cancelled)),
            )
            .set(self)
            .returning(events::all_columns);

        let event = query.get_result(conn)?;

        Ok(event)
    }
}
