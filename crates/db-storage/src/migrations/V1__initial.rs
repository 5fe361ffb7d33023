use barrel::backend::Pg;
use barrel::{types, Migration};

/// TIMESTAMPTZ column filled in by the database on insert
fn created_timestamp() -> barrel::types::Type {
    types::custom("TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP")
}

pub fn migration() -> String {
    let mut migr = Migration::new();

    migr.inject_custom(r#"CREATE EXTENSION IF NOT EXISTS "uuid-ossp""#);

    migr.inject_custom(
        "CREATE TYPE user_role AS ENUM ('admin', 'moderator', 'student', 'faculty', 'user')",
    );
    migr.inject_custom("CREATE TYPE event_status AS ENUM ('active', 'cancelled')");
    migr.inject_custom("CREATE TYPE event_mode AS ENUM ('online', 'offline')");
    migr.inject_custom(
        "CREATE TYPE attendance_status AS ENUM ('present', 'absent', 'not_applicable')",
    );

    // The users table belongs to the identity subsystem, which also owns the
    // credential and otp columns. They are created here so the uniqueness and
    // phone format constraints hold for every writer.
    migr.create_table("users", |table| {
        table.add_column(
            "id",
            types::custom("UUID DEFAULT uuid_generate_v4()").primary(true),
        );
        table.add_column("role", types::custom("user_role"));
        table.add_column("username", types::varchar(255).unique(true));
        table.add_column(
            "phone_number",
            types::custom("VARCHAR(15) UNIQUE CHECK (phone_number ~ '^[6-9][0-9]{9}$')"),
        );
        table.add_column("email", types::varchar(255).unique(true));
        table.add_column("roll_number", types::varchar(50).nullable(true));
        table.add_column("password", types::text());
        table.add_column("department", types::varchar(100).nullable(true));
        table.add_column(
            "year",
            types::custom("INT CHECK (year >= 1 AND year <= 4)").nullable(true),
        );
        table.add_column("section", types::varchar(10).nullable(true));
        table.add_column("otp", types::varchar(10).nullable(true));
        table.add_column("otp_expiry", types::custom("TIMESTAMPTZ").nullable(true));
        table.add_column("created_at", created_timestamp());
        table.add_column("updated_at", created_timestamp());
    });

    migr.create_table("events", |table| {
        table.add_column(
            "id",
            types::custom("UUID DEFAULT uuid_generate_v4()").primary(true),
        );
        table.add_column("title", types::varchar(255));
        table.add_column("category", types::varchar(50));
        table.add_column("status", types::custom("event_status DEFAULT 'active'"));
        table.add_column("description1", types::text().nullable(true));
        table.add_column("description2", types::text().nullable(true));
        table.add_column("description3", types::text().nullable(true));
        table.add_column("venue", types::varchar(255));
        table.add_column("mode", types::custom("event_mode"));
        table.add_column("meeting_link", types::varchar(255));
        table.add_column("date", types::custom("TIMESTAMPTZ"));
        table.add_column("registration_deadline", types::custom("TIMESTAMPTZ"));
        table.add_column("created_at", created_timestamp());
        table.add_column("organizer", types::varchar(255));
        table.add_column("representative", types::varchar(255));
        table.add_column(
            "phone_number_representative",
            types::custom(
                "VARCHAR(15) CHECK (phone_number_representative ~ '^[6-9][0-9]{9}$')",
            ),
        );
        table.add_column("email_representative", types::varchar(255));
        table.add_column("registration_link", types::varchar(255));
        table.add_column(
            "maximum_participants",
            types::custom("INT CHECK (maximum_participants > 0)"),
        );
        table.add_column(
            "images",
            types::custom("TEXT[] CHECK (cardinality(images) <= 5)"),
        );
    });

    migr.create_table("registrations", |table| {
        table.add_column(
            "id",
            types::custom("UUID DEFAULT uuid_generate_v4()").primary(true),
        );
        table.add_column(
            "user_id",
            types::custom("UUID REFERENCES users(id) ON DELETE CASCADE"),
        );
        table.add_column(
            "event_id",
            types::custom("UUID REFERENCES events(id) ON DELETE CASCADE"),
        );
        table.add_column("registered_at", created_timestamp());
        table.add_column(
            "attendance_status",
            types::custom("attendance_status DEFAULT 'not_applicable'"),
        );
        table.inject_custom("UNIQUE (user_id, event_id)");
    });

    migr.make::<Pg>()
}
