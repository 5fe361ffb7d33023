//! Test helpers for database backed tests

pub mod database;

pub use self::database::DatabaseContext;

/// Returns true when the environment provides a PostgreSQL instance for tests
///
/// Database backed tests call this first and skip themselves when the
/// `SAC_TEST_DATABASE` opt-in is missing.
pub fn database_available() -> bool {
    std::env::var("SAC_TEST_DATABASE").is_ok()
}
