table! {
    use crate::sql_types::*;

    events (id) {
        id -> Uuid,
        title -> Varchar,
        category -> Varchar,
        status -> Event_status,
        description1 -> Nullable<Text>,
        description2 -> Nullable<Text>,
        description3 -> Nullable<Text>,
        venue -> Varchar,
        mode -> Event_mode,
        meeting_link -> Varchar,
        date -> Timestamptz,
        registration_deadline -> Timestamptz,
        created_at -> Timestamptz,
        organizer -> Varchar,
        representative -> Varchar,
        phone_number_representative -> Varchar,
        email_representative -> Varchar,
        registration_link -> Varchar,
        maximum_participants -> Int4,
        images -> Array<Text>,
    }
}

table! {
    use crate::sql_types::*;

    registrations (id) {
        id -> Uuid,
        user_id -> Uuid,
        event_id -> Uuid,
        registered_at -> Timestamptz,
        attendance_status -> Attendance_status,
    }
}

// The users table is owned by the identity subsystem and carries more columns
// than listed here (credentials, otp, department). This core only ever reads
// the subset below.
table! {
    use crate::sql_types::*;

    users (id) {
        id -> Uuid,
        role -> User_role,
        username -> Varchar,
        phone_number -> Varchar,
        email -> Varchar,
        roll_number -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

joinable!(registrations -> events (event_id));
joinable!(registrations -> users (user_id));

allow_tables_to_appear_in_same_query!(events, registrations, users);
