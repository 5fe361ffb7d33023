//! Contains the database ORM models and database migrations for the
//! event and registration lifecycle core. Builds upon sac-database.

#[macro_use]
extern crate diesel;

#[macro_use]
mod macros;
mod schema;

pub mod events;
pub mod migrations;
pub mod registrations;
pub mod users;

// SQL types reexport for schema.rs
pub mod sql_types {
    pub use super::events::EventModeType as Event_mode;
    pub use super::events::EventStatusType as Event_status;
    pub use super::registrations::AttendanceStatusType as Attendance_status;
    pub use super::users::UserRoleType as User_role;
    pub use diesel::sql_types::*;
}
