//! Contains the user specific database structs and queries
//!
//! Users are created and maintained by the identity subsystem. This core
//! only reads them for role checks, notification fan-out and summaries.

use crate::schema::users;
use chrono::{DateTime, Utc};
use database::{DbConnection, Result};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

diesel_newtype!(UserId);

sql_enum!(
    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    UserRole,
    "user_role",
    UserRoleType,
    {
        Admin = b"admin",
        Moderator = b"moderator",
        Student = b"student",
        Faculty = b"faculty",
        User = b"user",
    }
);

/// Diesel user struct
///
/// Is used as a result in various queries. Represents a user column
#[derive(Debug, Clone, Queryable, Identifiable)]
pub struct User {
    pub id: UserId,
    pub role: UserRole,
    pub username: String,
    pub phone_number: String,
    pub email: String,
    pub roll_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[tracing::instrument(err, skip_all)]
    pub fn get(conn: &mut DbConnection, user_id: UserId) -> Result<User> {
        let query = users::table.filter(users::id.eq(user_id));

        let user = query.first(conn)?;

        Ok(user)
    }

    #[tracing::instrument(err, skip_all)]
    pub fn get_by_username(conn: &mut DbConnection, username: &str) -> Result<User> {
        let query = users::table.filter(users::username.eq(username));

        let user = query.first(conn)?;

        Ok(user)
    }

    /// Returns the email addresses of every user, used for notification fan-out
    #[tracing::instrument(err, skip_all)]
    pub fn get_all_emails(conn: &mut DbConnection) -> Result<Vec<String>> {
        let emails = users::table.select(users::email).load(conn)?;

        Ok(emails)
    }

    #[tracing::instrument(err, skip_all)]
    pub fn count_students(conn: &mut DbConnection) -> Result<i64> {
        let count = users::table
            .filter(users::role.eq(UserRole::Student))
            .count()
            .get_result(conn)?;

        Ok(count)
    }
}
