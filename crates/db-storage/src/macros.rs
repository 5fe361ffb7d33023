/// Creates one or more typed UUID ids
///
/// Defines the type and implements a variety of traits for it to be usable with diesel.
/// See <https://stackoverflow.com/a/59948116> for more information.
///
/// The expansion relies on `diesel::prelude::*` being available at the call site.
#[macro_export]
macro_rules! diesel_newtype {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        $(
            pub use __newtype_impl::$name;
        )+

        mod __newtype_impl {
            use diesel::backend::Backend;
            use diesel::deserialize::{self, FromSql};
            use diesel::prelude::*;
            use diesel::serialize::{self, Output, ToSql};
            use diesel::sql_types::Uuid as SqlUuid;
            use serde::{Deserialize, Serialize};
            use std::fmt;

            $(

            #[derive(
                Debug,
                Clone,
                Copy,
                PartialEq,
                Eq,
                PartialOrd,
                Ord,
                Hash,
                Serialize,
                Deserialize,
                AsExpression,
                FromSqlRow,
            )]
            $(#[$meta])*
            #[diesel(sql_type = SqlUuid)]
            pub struct $name(uuid::Uuid);

            impl $name {
                pub const fn from(inner: uuid::Uuid) -> Self {
                    Self(inner)
                }

                pub fn generate() -> Self {
                    Self(uuid::Uuid::new_v4())
                }

                pub fn inner(&self) -> &uuid::Uuid {
                    &self.0
                }

                pub fn into_inner(self) -> uuid::Uuid {
                    self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    self.0.fmt(f)
                }
            }

            impl<DB> ToSql<SqlUuid, DB> for $name
            where
                DB: Backend,
                uuid::Uuid: ToSql<SqlUuid, DB>,
            {
                fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, DB>) -> serialize::Result {
                    <uuid::Uuid as ToSql<SqlUuid, DB>>::to_sql(&self.0, out)
                }
            }

            impl<DB> FromSql<SqlUuid, DB> for $name
            where
                DB: Backend,
                uuid::Uuid: FromSql<SqlUuid, DB>,
            {
                fn from_sql(bytes: diesel::backend::RawValue<'_, DB>) -> deserialize::Result<Self> {
                    <uuid::Uuid as FromSql<SqlUuid, DB>>::from_sql(bytes).map(Self)
                }
            }

            )+
        }
    };
}

/// Defines an enum backed by a PostgreSQL enum type
///
/// Generates the diesel SQL type marker struct together with the Rust enum
/// and its ToSql/FromSql mappings. Relies on `diesel::prelude::*` being
/// available at the call site.
#[macro_export]
macro_rules! sql_enum {
    (
        $(#[$enum_meta:meta])*
        $enum_name:ident,
        $pg_type_lit:literal,
        $type_name:ident,
        {$($variant:ident = $value:literal),+ $(,)?}
    ) => {
        #[derive(Debug, Clone, Copy, SqlType, QueryId)]
        #[diesel(postgres_type(name = $pg_type_lit))]
        pub struct $type_name;

        #[derive(Debug, Clone, Copy, Eq, PartialEq, AsExpression, FromSqlRow)]
        #[diesel(sql_type = $type_name)]
        $(#[$enum_meta])*
        pub enum $enum_name {
            $($variant,)+
        }

        impl diesel::serialize::ToSql<$type_name, diesel::pg::Pg> for $enum_name {
            fn to_sql<'b>(
                &'b self,
                out: &mut diesel::serialize::Output<'b, '_, diesel::pg::Pg>,
            ) -> diesel::serialize::Result {
                let value: &'static [u8] = match *self {
                    $(Self::$variant => $value,)+
                };
                std::io::Write::write_all(out, value)?;
                Ok(diesel::serialize::IsNull::No)
            }
        }

        impl diesel::deserialize::FromSql<$type_name, diesel::pg::Pg> for $enum_name {
            fn from_sql(
                value: diesel::pg::PgValue<'_>,
            ) -> diesel::deserialize::Result<Self> {
                match value.as_bytes() {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(concat!("unrecognized ", $pg_type_lit, " variant").into()),
                }
            }
        }
    };
}
