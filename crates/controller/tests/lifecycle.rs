//! Database backed tests of the event and registration lifecycle
//!
//! A PostgreSQL instance has to be provided via the environment variables
//! `POSTGRES_BASE_URL` / `DATABASE_NAME` and the tests opt in through
//! `SAC_TEST_DATABASE`. Without the opt-in every test skips itself.

use chrono::{Duration, Utc};
use db_storage::events::{EventMode, EventStatus, NewEvent};
use db_storage::registrations::AttendanceStatus;
use db_storage::users::UserRole;
use sac_controller_core::events::{EventManager, UpdateEventForm};
use sac_controller_core::registrations::RegistrationManager;
use sac_controller_core::services::MailService;
use sac_controller_core::settings::{ObjectStorageSettings, Settings};
use sac_controller_core::storage::ObjectStorage;
use sac_controller_core::{CoreError, Principal};
use serial_test::serial;
use std::sync::Arc;
use test_util::DatabaseContext;

struct TestSetup {
    ctx: DatabaseContext,
    events: EventManager,
    registrations: RegistrationManager,
}

async fn setup() -> Option<TestSetup> {
    if !test_util::database_available() {
        eprintln!("SAC_TEST_DATABASE not set, skipping database test");
        return None;
    }

    let ctx = DatabaseContext::new(true).await;

    let settings = Settings {
        database: database::settings::Database {
            url: format!("{}/{}", ctx.base_url, ctx.db_name),
            max_connections: 5,
            min_idle_connections: 1,
        },
        object_storage: ObjectStorageSettings {
            uri: "http://localhost:9000".into(),
            bucket: "sac-events".into(),
            access_key: "minioadmin".into(),
            secret_key: "minioadmin".into(),
            public_base_url: None,
        },
        smtp: None,
        logging: Default::default(),
    }
    .into_shared();

    let mail_service = MailService::disabled(settings);
    let storage = Arc::new(ObjectStorage::broken());

    let events = EventManager::new(Arc::clone(&ctx.db), storage, mail_service.clone());
    let registrations = RegistrationManager::new(Arc::clone(&ctx.db), mail_service);

    Some(TestSetup {
        ctx,
        events,
        registrations,
    })
}

fn admin_principal(ctx: &DatabaseContext) -> Principal {
    let admin = ctx.create_test_user(900, UserRole::Admin).unwrap();
    Principal::new(admin.id, UserRole::Admin)
}

#[tokio::test]
#[serial]
async fn cancel_is_terminal_and_rejected_when_repeated() {
    let Some(TestSetup { ctx, events, .. }) = setup().await else {
        return;
    };

    let admin = admin_principal(&ctx);
    let event = ctx
        .create_test_event(1, Utc::now() + Duration::days(7))
        .unwrap();

    let cancelled = events.cancel_event(admin, event.id).await.unwrap();
    assert_eq!(cancelled.status, EventStatus::Cancelled);

    // the new status is immediately visible to readers
    let fetched = events.get_event(event.id).await.unwrap();
    assert_eq!(fetched.status, EventStatus::Cancelled);

    // repeating the cancellation is a conflict, not a second bulk mail
    let err = events.cancel_event(admin, event.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    // unknown ids stay not found
    let unknown = db_storage::events::EventId::from(uuid::Uuid::new_v4());
    let err = events.cancel_event(admin, unknown).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound));
}

#[tokio::test]
#[serial]
async fn mutating_operations_require_the_admin_role() {
    let Some(TestSetup {
        ctx,
        events,
        registrations: _,
    }) = setup().await
    else {
        return;
    };

    let student = ctx.create_test_user(1, UserRole::Student).unwrap();
    let principal = Principal::new(student.id, UserRole::Student);

    let event = ctx
        .create_test_event(1, Utc::now() + Duration::days(7))
        .unwrap();

    let err = events.cancel_event(principal, event.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden));

    let err = events.delete_event(principal, event.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden));

    let err = events
        .update_event(
            principal,
            event.id,
            UpdateEventForm {
                title: Some("Hijacked".into()),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden));

    // reads are unauthenticated
    assert_eq!(events.get_event(event.id).await.unwrap().id, event.id);
}

#[tokio::test]
#[serial]
async fn duplicate_registration_is_a_conflict_with_a_single_row() {
    let Some(TestSetup {
        ctx,
        registrations,
        ..
    }) = setup().await
    else {
        return;
    };

    let student = ctx.create_test_user(1, UserRole::Student).unwrap();
    let event = ctx
        .create_test_event(1, Utc::now() + Duration::days(7))
        .unwrap();

    let registration = registrations
        .register_student(student.id, event.id)
        .await
        .unwrap();
    assert_eq!(registration.user_id, student.id);
    assert_eq!(registration.event_id, event.id);
    assert_eq!(
        registration.attendance_status,
        AttendanceStatus::NotApplicable
    );

    let err = registrations
        .register_student(student.id, event.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    let students = registrations.registered_students(event.id).await.unwrap();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].student_id, student.id);
    assert_eq!(students[0].username, student.username);
    assert_eq!(
        students[0].attendance_status,
        AttendanceStatus::NotApplicable
    );
}

#[tokio::test]
#[serial]
async fn registering_for_a_missing_event_or_user_is_not_found() {
    let Some(TestSetup {
        ctx,
        registrations,
        ..
    }) = setup().await
    else {
        return;
    };

    let student = ctx.create_test_user(1, UserRole::Student).unwrap();
    let event = ctx
        .create_test_event(1, Utc::now() + Duration::days(7))
        .unwrap();

    let unknown_event = db_storage::events::EventId::from(uuid::Uuid::new_v4());
    let err = registrations
        .register_student(student.id, unknown_event)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound));

    let unknown_user = db_storage::users::UserId::from(uuid::Uuid::new_v4());
    let err = registrations
        .register_student(unknown_user, event.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound));
}

#[tokio::test]
#[serial]
async fn attendance_flows_into_the_admin_summary() {
    let Some(TestSetup {
        ctx,
        registrations,
        ..
    }) = setup().await
    else {
        return;
    };

    let present = ctx.create_test_user(1, UserRole::Student).unwrap();
    let absent = ctx.create_test_user(2, UserRole::Student).unwrap();
    let unmarked = ctx.create_test_user(3, UserRole::Student).unwrap();
    // a faculty member does not count into total_students
    ctx.create_test_user(4, UserRole::Faculty).unwrap();

    let event = ctx
        .create_test_event(1, Utc::now() - Duration::days(1))
        .unwrap();

    let first = registrations
        .register_student(present.id, event.id)
        .await
        .unwrap();
    let second = registrations
        .register_student(absent.id, event.id)
        .await
        .unwrap();
    registrations
        .register_student(unmarked.id, event.id)
        .await
        .unwrap();

    registrations
        .update_attendance(first.id, AttendanceStatus::Present)
        .await
        .unwrap();
    registrations
        .update_attendance(second.id, AttendanceStatus::Absent)
        .await
        .unwrap();

    let summary = registrations.admin_summary(event.id).await.unwrap();

    assert_eq!(summary.event_id, event.id);
    assert_eq!(summary.total_students, 3);
    assert_eq!(summary.total_registered, 3);
    assert_eq!(summary.total_present, 1);
    assert_eq!(summary.total_absent, 1);

    // the unmarked registration is in neither bucket
    assert!(summary.total_present + summary.total_absent <= summary.total_registered);
    assert!(summary.total_registered <= summary.total_students);
}

#[tokio::test]
#[serial]
async fn attendance_updates_are_validated_and_last_write_wins() {
    let Some(TestSetup {
        ctx,
        registrations,
        ..
    }) = setup().await
    else {
        return;
    };

    let student = ctx.create_test_user(1, UserRole::Student).unwrap();
    let event = ctx
        .create_test_event(1, Utc::now() - Duration::days(1))
        .unwrap();

    let registration = registrations
        .register_student(student.id, event.id)
        .await
        .unwrap();

    let err = registrations
        .update_attendance(registration.id, AttendanceStatus::NotApplicable)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    registrations
        .update_attendance(registration.id, AttendanceStatus::Absent)
        .await
        .unwrap();
    let updated = registrations
        .update_attendance(registration.id, AttendanceStatus::Present)
        .await
        .unwrap();
    assert_eq!(updated.attendance_status, AttendanceStatus::Present);

    let unknown = db_storage::registrations::RegistrationId::from(uuid::Uuid::new_v4());
    let err = registrations
        .update_attendance(unknown, AttendanceStatus::Present)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound));
}

#[tokio::test]
#[serial]
async fn deleting_an_event_cascades_its_registrations() {
    let Some(TestSetup {
        ctx,
        events,
        registrations,
    }) = setup().await
    else {
        return;
    };

    let admin = admin_principal(&ctx);
    let student = ctx.create_test_user(1, UserRole::Student).unwrap();
    let event = ctx
        .create_test_event(1, Utc::now() + Duration::days(7))
        .unwrap();

    registrations
        .register_student(student.id, event.id)
        .await
        .unwrap();

    events.delete_event(admin, event.id).await.unwrap();

    let err = events.get_event(event.id).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound));

    let students = registrations.registered_students(event.id).await.unwrap();
    assert!(students.is_empty());

    let err = events.delete_event(admin, event.id).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound));
}

#[tokio::test]
#[serial]
async fn updates_coalesce_with_the_stored_event() {
    let Some(TestSetup { ctx, events, .. }) = setup().await else {
        return;
    };

    let admin = admin_principal(&ctx);
    let event = ctx
        .create_test_event(1, Utc::now() + Duration::days(7))
        .unwrap();

    let updated = events
        .update_event(
            admin,
            event.id,
            UpdateEventForm {
                title: Some("Renamed Workshop".into()),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(updated.title, "Renamed Workshop");
    // everything not supplied keeps its previous value
    assert_eq!(updated.category, event.category);
    assert_eq!(updated.venue, event.venue);
    assert_eq!(updated.date, event.date);
    assert_eq!(updated.images, event.images);

    // an empty patch is a no-op
    let unchanged = events
        .update_event(admin, event.id, UpdateEventForm::default(), None)
        .await
        .unwrap();
    assert_eq!(unchanged, updated);

    let unknown = db_storage::events::EventId::from(uuid::Uuid::new_v4());
    let err = events
        .update_event(admin, unknown, UpdateEventForm::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound));
}

#[tokio::test]
#[serial]
async fn cancelled_events_reject_further_edits() {
    let Some(TestSetup { ctx, events, .. }) = setup().await else {
        return;
    };

    let admin = admin_principal(&ctx);
    let event = ctx
        .create_test_event(1, Utc::now() + Duration::days(7))
        .unwrap();

    events.cancel_event(admin, event.id).await.unwrap();

    let err = events
        .update_event(
            admin,
            event.id,
            UpdateEventForm {
                date: Some(Utc::now() + Duration::days(14)),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
}

#[tokio::test]
#[serial]
async fn image_order_survives_the_round_trip() {
    let Some(TestSetup { ctx, events, .. }) = setup().await else {
        return;
    };

    let urls = vec![
        "https://blobs.sac.example/events/first.jpg".to_owned(),
        "https://blobs.sac.example/events/second.jpg".to_owned(),
    ];

    let mut conn = ctx.db.get_conn().unwrap();
    let event = NewEvent {
        images: urls.clone(),
        ..test_new_event()
    }
    .insert(&mut conn)
    .unwrap();
    drop(conn);

    let fetched = events.get_event(event.id).await.unwrap();
    assert_eq!(fetched.images, urls);
}

#[tokio::test]
#[serial]
async fn the_image_cardinality_is_capped_by_the_storage_layer() {
    let Some(TestSetup { ctx, .. }) = setup().await else {
        return;
    };

    let urls: Vec<String> = (0..6)
        .map(|n| format!("https://blobs.sac.example/events/{n}.jpg"))
        .collect();

    let mut conn = ctx.db.get_conn().unwrap();
    let result = NewEvent {
        images: urls,
        ..test_new_event()
    }
    .insert(&mut conn);

    let err = result.unwrap_err();
    assert!(err.is_check_violation());
}

#[tokio::test]
#[serial]
async fn event_listing_is_ordered_by_date_descending() {
    let Some(TestSetup { ctx, events, .. }) = setup().await else {
        return;
    };

    let now = Utc::now();
    ctx.create_test_event(1, now - Duration::days(3)).unwrap();
    ctx.create_test_event(2, now + Duration::days(5)).unwrap();
    ctx.create_test_event(3, now + Duration::days(1)).unwrap();

    let listed = events.get_events().await.unwrap();

    assert_eq!(listed.len(), 3);
    assert!(listed
        .windows(2)
        .all(|pair| pair[0].date >= pair[1].date));
}

#[tokio::test]
#[serial]
async fn the_overall_summary_partitions_every_event() {
    let Some(TestSetup {
        ctx,
        events,
        registrations,
    }) = setup().await
    else {
        return;
    };

    let admin = admin_principal(&ctx);
    let now = Utc::now();

    ctx.create_test_event(1, now - Duration::days(3)).unwrap();
    ctx.create_test_event(2, now + Duration::days(5)).unwrap();
    let cancelled = ctx.create_test_event(3, now + Duration::days(9)).unwrap();
    events.cancel_event(admin, cancelled.id).await.unwrap();

    let summary = registrations.overall_summary().await.unwrap();

    assert_eq!(summary.total_events_conducted, 3);
    assert_eq!(summary.total_events_completed, 1);
    assert_eq!(summary.total_events_upcoming, 1);
    assert_eq!(summary.total_events_cancelled, 1);
    assert_eq!(
        summary.total_events_completed
            + summary.total_events_upcoming
            + summary.total_events_cancelled,
        summary.total_events_conducted
    );
}

#[tokio::test]
#[serial]
async fn the_student_summary_only_counts_past_events() {
    let Some(TestSetup {
        ctx,
        registrations,
        ..
    }) = setup().await
    else {
        return;
    };

    let student = ctx.create_test_user(1, UserRole::Student).unwrap();
    let now = Utc::now();

    let attended = ctx.create_test_event(1, now - Duration::days(10)).unwrap();
    let missed = ctx.create_test_event(2, now - Duration::days(5)).unwrap();
    // conducted but never registered
    ctx.create_test_event(3, now - Duration::days(2)).unwrap();
    // future events count nowhere
    let upcoming = ctx.create_test_event(4, now + Duration::days(2)).unwrap();

    let first = registrations
        .register_student(student.id, attended.id)
        .await
        .unwrap();
    let second = registrations
        .register_student(student.id, missed.id)
        .await
        .unwrap();
    registrations
        .register_student(student.id, upcoming.id)
        .await
        .unwrap();

    registrations
        .update_attendance(first.id, AttendanceStatus::Present)
        .await
        .unwrap();
    registrations
        .update_attendance(second.id, AttendanceStatus::Absent)
        .await
        .unwrap();

    let summary = registrations.student_summary(student.id).await.unwrap();

    assert_eq!(summary.total_events_conducted, 3);
    assert_eq!(summary.total_events_registered, 2);
    assert_eq!(summary.total_events_present, 1);
    assert_eq!(summary.total_events_absent, 1);
}

#[tokio::test]
#[serial]
async fn image_replacement_against_a_dead_blob_store_aborts_the_update() {
    let Some(TestSetup { ctx, events, .. }) = setup().await else {
        return;
    };

    let admin = admin_principal(&ctx);
    let event = ctx
        .create_test_event(1, Utc::now() + Duration::days(7))
        .unwrap();

    let err = events
        .update_event(
            admin,
            event.id,
            UpdateEventForm::default(),
            Some(vec![bytes::Bytes::from_static(b"not really a jpeg")]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Upload(_)));

    // the stored image set was not touched
    let fetched = events.get_event(event.id).await.unwrap();
    assert_eq!(fetched.images, event.images);
}

fn test_new_event() -> NewEvent {
    let date = Utc::now() + Duration::days(7);

    NewEvent {
        title: "Direct Insert".into(),
        category: "workshop".into(),
        status: EventStatus::Active,
        description1: None,
        description2: None,
        description3: None,
        venue: "Main Auditorium".into(),
        mode: EventMode::Offline,
        meeting_link: String::new(),
        date,
        registration_deadline: date - Duration::hours(2),
        organizer: "SAC".into(),
        representative: "Test Representative".into(),
        phone_number_representative: "9876543210".into(),
        email_representative: "rep@sac.example".into(),
        registration_link: "https://sac.example/register/direct".into(),
        maximum_participants: 100,
        images: vec!["https://blobs.sac.example/events/direct.jpg".into()],
    }
}
