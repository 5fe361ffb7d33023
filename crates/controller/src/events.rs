//! Event lifecycle operations
//!
//! Owns the multi-step create/update/cancel/delete flows that mix image
//! uploads against the object storage with the relational writes and the
//! after-commit mail notifications.

use crate::services::MailService;
use crate::storage::ObjectStorage;
use crate::{CoreError, Principal, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use database::Db;
use db_storage::events::{Event, EventId, EventMode, EventStatus, NewEvent, UpdateEvent};
use db_storage::users::User;
use serde::Deserialize;
use std::sync::Arc;
use validator::{Validate, ValidationError};

/// Maximum number of images per event, mirrored by a storage check constraint
pub const MAX_EVENT_IMAGES: usize = 5;

/// Fields required to publish a new event
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_mode_fields"))]
pub struct NewEventForm {
    #[validate(length(min = 1, max = 255, message = "title must be 1 to 255 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 50, message = "category must be 1 to 50 characters"))]
    pub category: String,
    pub description1: Option<String>,
    pub description2: Option<String>,
    pub description3: Option<String>,
    /// Required for offline events
    #[serde(default)]
    pub venue: String,
    pub mode: EventMode,
    /// Required for online events
    #[serde(default)]
    pub meeting_link: String,
    pub date: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    #[validate(length(min = 1, max = 255))]
    pub organizer: String,
    #[validate(length(min = 1, max = 255))]
    pub representative: String,
    #[validate(custom = "validate_phone")]
    pub phone_number_representative: String,
    #[validate(email)]
    pub email_representative: String,
    #[validate(url)]
    pub registration_link: String,
    #[validate(range(min = 1, message = "maximum_participants must be positive"))]
    pub maximum_participants: i32,
}

impl NewEventForm {
    fn into_new_event(self, images: Vec<String>) -> NewEvent {
        NewEvent {
            title: self.title,
            category: self.category,
            status: EventStatus::Active,
            description1: self.description1,
            description2: self.description2,
            description3: self.description3,
            venue: self.venue,
            mode: self.mode,
            meeting_link: self.meeting_link,
            date: self.date,
            registration_deadline: self.registration_deadline,
            organizer: self.organizer,
            representative: self.representative,
            phone_number_representative: self.phone_number_representative,
            email_representative: self.email_representative,
            registration_link: self.registration_link,
            maximum_participants: self.maximum_participants,
            images,
        }
    }
}

/// Partial update of an event
///
/// None fields keep their previous value, supplied fields replace it.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateEventForm {
    #[validate(length(min = 1, max = 255, message = "title must be 1 to 255 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 50, message = "category must be 1 to 50 characters"))]
    pub category: Option<String>,
    pub description1: Option<String>,
    pub description2: Option<String>,
    pub description3: Option<String>,
    pub venue: Option<String>,
    pub mode: Option<EventMode>,
    pub meeting_link: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub registration_deadline: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 255))]
    pub organizer: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub representative: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone_number_representative: Option<String>,
    #[validate(email)]
    pub email_representative: Option<String>,
    #[validate(url)]
    pub registration_link: Option<String>,
    #[validate(range(min = 1, message = "maximum_participants must be positive"))]
    pub maximum_participants: Option<i32>,
}

impl UpdateEventForm {
    pub fn is_empty(&self) -> bool {
        let UpdateEventForm {
            title,
            category,
            description1,
            description2,
            description3,
            venue,
            mode,
            meeting_link,
            date,
            registration_deadline,
            organizer,
            representative,
            phone_number_representative,
            email_representative,
            registration_link,
            maximum_participants,
        } = self;

        title.is_none()
            && category.is_none()
            && description1.is_none()
            && description2.is_none()
            && description3.is_none()
            && venue.is_none()
            && mode.is_none()
            && meeting_link.is_none()
            && date.is_none()
            && registration_deadline.is_none()
            && organizer.is_none()
            && representative.is_none()
            && phone_number_representative.is_none()
            && email_representative.is_none()
            && registration_link.is_none()
            && maximum_participants.is_none()
    }

    /// Checks the mode dependent required field against the merged state
    ///
    /// The venue/meeting link requirement spans the patch and the stored
    /// event: a patch may switch an event to offline only when a venue is
    /// either supplied or already present.
    fn validate_against(&self, current: &Event) -> Result<()> {
        let mode = self.mode.unwrap_or(current.mode);
        let venue = self.venue.as_deref().unwrap_or(&current.venue);
        let meeting_link = self
            .meeting_link
            .as_deref()
            .unwrap_or(&current.meeting_link);

        match mode {
            EventMode::Offline if venue.trim().is_empty() => Err(CoreError::validation(
                "venue",
                "venue is required for offline events",
            )),
            EventMode::Online if meeting_link.trim().is_empty() => Err(CoreError::validation(
                "meeting_link",
                "meeting_link is required for online events",
            )),
            _ => Ok(()),
        }
    }

    fn into_update_event(self, images: Option<Vec<String>>) -> UpdateEvent {
        UpdateEvent {
            title: self.title,
            category: self.category,
            description1: self.description1,
            description2: self.description2,
            description3: self.description3,
            venue: self.venue,
            mode: self.mode,
            meeting_link: self.meeting_link,
            date: self.date,
            registration_deadline: self.registration_deadline,
            organizer: self.organizer,
            representative: self.representative,
            phone_number_representative: self.phone_number_representative,
            email_representative: self.email_representative,
            registration_link: self.registration_link,
            maximum_participants: self.maximum_participants,
            images,
        }
    }
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let mut chars = phone.chars();

    let valid = phone.len() == 10
        && matches!(chars.next(), Some('6'..='9'))
        && chars.all(|c| c.is_ascii_digit());

    if valid {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone");
        err.message = Some("must be a 10 digit mobile number".into());
        Err(err)
    }
}

fn validate_mode_fields(form: &NewEventForm) -> Result<(), ValidationError> {
    match form.mode {
        EventMode::Offline if form.venue.trim().is_empty() => {
            let mut err = ValidationError::new("venue_required");
            err.message = Some("venue is required for offline events".into());
            Err(err)
        }
        EventMode::Online if form.meeting_link.trim().is_empty() => {
            let mut err = ValidationError::new("meeting_link_required");
            err.message = Some("meeting_link is required for online events".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

fn validate_image_count(count: usize) -> Result<()> {
    if count == 0 {
        return Err(CoreError::validation(
            "images",
            "at least one image required",
        ));
    }

    if count > MAX_EVENT_IMAGES {
        return Err(CoreError::validation(
            "images",
            "an event can have at most 5 images",
        ));
    }

    Ok(())
}

/// Owns the event lifecycle and its side effects
#[derive(Clone)]
pub struct EventManager {
    db: Arc<Db>,
    storage: Arc<ObjectStorage>,
    mail_service: MailService,
}

impl EventManager {
    pub fn new(db: Arc<Db>, storage: Arc<ObjectStorage>, mail_service: MailService) -> Self {
        Self {
            db,
            storage,
            mail_service,
        }
    }

    /// Publishes a new event
    ///
    /// Images are uploaded in input order before the row is written. A
    /// failing upload aborts the whole operation; blobs uploaded earlier in
    /// the same call are left behind, which is an accepted limitation of the
    /// missing distributed transaction. The "new event" mail goes out after
    /// the insert committed and its outcome is not awaited.
    #[tracing::instrument(err, skip_all, fields(title = %form.title))]
    pub async fn create_event(
        &self,
        principal: Principal,
        form: NewEventForm,
        images: Vec<Bytes>,
    ) -> Result<Event> {
        principal.require_admin()?;
        form.validate()?;
        validate_image_count(images.len())?;

        let mut image_urls = Vec::with_capacity(images.len());

        for data in images {
            let key = ObjectStorage::generate_image_key();
            let url = self
                .storage
                .put(&key, data)
                .await
                .map_err(CoreError::Upload)?;

            image_urls.push(url);
        }

        let db = Arc::clone(&self.db);

        let (event, recipients) = crate::block(move || -> Result<(Event, Vec<String>)> {
            let mut conn = db.get_conn()?;

            let event = form.into_new_event(image_urls).insert(&mut conn)?;
            let recipients = User::get_all_emails(&mut conn)?;

            Ok((event, recipients))
        })
        .await??;

        self.spawn_created_mail(recipients, event.clone());

        Ok(event)
    }

    /// Applies a partial update, optionally replacing the image set
    ///
    /// Replaced blobs are deleted best-effort: a failing deletion is logged
    /// and does not abort the update. A failing upload aborts before the row
    /// is touched, already deleted old blobs are not restored.
    #[tracing::instrument(err, skip_all, fields(%event_id))]
    pub async fn update_event(
        &self,
        principal: Principal,
        event_id: EventId,
        form: UpdateEventForm,
        new_images: Option<Vec<Bytes>>,
    ) -> Result<Event> {
        principal.require_admin()?;
        form.validate()?;

        let db = Arc::clone(&self.db);
        let current = crate::block(move || -> Result<Event> {
            let mut conn = db.get_conn()?;

            Ok(Event::get(&mut conn, event_id)?)
        })
        .await??;

        if current.status == EventStatus::Cancelled {
            return Err(CoreError::Conflict("the event is cancelled"));
        }

        form.validate_against(&current)?;

        if form.is_empty() && new_images.is_none() {
            return Ok(current);
        }

        let image_urls = match new_images {
            Some(images) => {
                validate_image_count(images.len())?;

                for url in &current.images {
                    let Some(key) = self.storage.key_for(url) else {
                        continue;
                    };

                    if let Err(e) = self.storage.delete(key).await {
                        log::warn!("Failed to delete replaced event image {}, {:#}", url, e);
                    }
                }

                let mut urls = Vec::with_capacity(images.len());

                for data in images {
                    let key = ObjectStorage::generate_image_key();
                    let url = self
                        .storage
                        .put(&key, data)
                        .await
                        .map_err(CoreError::Upload)?;

                    urls.push(url);
                }

                Some(urls)
            }
            None => None,
        };

        let db = Arc::clone(&self.db);

        let event = crate::block(move || -> Result<Event> {
            let mut conn = db.get_conn()?;

            Ok(form.into_update_event(image_urls).apply(&mut conn, event_id)?)
        })
        .await??;

        Ok(event)
    }

    /// Cancels an active event and notifies every user
    ///
    /// Cancellation is terminal and rejected when repeated, which keeps the
    /// bulk mail from going out twice.
    #[tracing::instrument(err, skip_all, fields(%event_id))]
    pub async fn cancel_event(&self, principal: Principal, event_id: EventId) -> Result<Event> {
        principal.require_admin()?;

        let db = Arc::clone(&self.db);

        let (event, recipients) = crate::block(move || -> Result<(Event, Vec<String>)> {
            let mut conn = db.get_conn()?;

            match Event::cancel(&mut conn, event_id)? {
                Some(event) => {
                    let recipients = User::get_all_emails(&mut conn)?;

                    Ok((event, recipients))
                }
                None => {
                    // Unknown id and repeated cancellation both miss the
                    // update filter, the extra get tells them apart.
                    Event::get(&mut conn, event_id)?;

                    Err(CoreError::Conflict("the event is already cancelled"))
                }
            }
        })
        .await??;

        self.spawn_cancelled_mail(recipients, event.clone());

        Ok(event)
    }

    /// Hard-deletes an event, its registrations cascade at the storage layer
    ///
    /// Stored images are intentionally left in the blob store.
    #[tracing::instrument(err, skip_all, fields(%event_id))]
    pub async fn delete_event(&self, principal: Principal, event_id: EventId) -> Result<()> {
        principal.require_admin()?;

        let db = Arc::clone(&self.db);

        crate::block(move || -> Result<()> {
            let mut conn = db.get_conn()?;

            if Event::delete_by_id(&mut conn, event_id)? {
                Ok(())
            } else {
                Err(CoreError::NotFound)
            }
        })
        .await??;

        Ok(())
    }

    /// Unauthenticated read of a single event
    #[tracing::instrument(err, skip_all, fields(%event_id))]
    pub async fn get_event(&self, event_id: EventId) -> Result<Event> {
        let db = Arc::clone(&self.db);

        let event = crate::block(move || -> Result<Event> {
            let mut conn = db.get_conn()?;

            Ok(Event::get(&mut conn, event_id)?)
        })
        .await??;

        Ok(event)
    }

    /// Unauthenticated read of all events, newest date first
    #[tracing::instrument(err, skip_all)]
    pub async fn get_events(&self) -> Result<Vec<Event>> {
        let db = Arc::clone(&self.db);

        let events = crate::block(move || -> Result<Vec<Event>> {
            let mut conn = db.get_conn()?;

            Ok(Event::get_all(&mut conn)?)
        })
        .await??;

        Ok(events)
    }

    fn spawn_created_mail(&self, recipients: Vec<String>, event: Event) {
        let mail_service = self.mail_service.clone();

        tokio::spawn(async move {
            if let Err(e) = mail_service.send_event_created(recipients, &event).await {
                log::error!("Failed to send event creation mail, {:#}", e);
            }
        });
    }

    fn spawn_cancelled_mail(&self, recipients: Vec<String>, event: Event) {
        let mail_service = self.mail_service.clone();

        tokio::spawn(async move {
            if let Err(e) = mail_service.send_event_cancelled(recipients, &event).await {
                log::error!("Failed to send event cancellation mail, {:#}", e);
            }
        });
    }
}
