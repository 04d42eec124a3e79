//! Data models for the library

/// Implements the SQLx text conversions for an enum that exposes
/// `as_str()` and `FromStr<Err = String>`.
macro_rules! impl_text_enum {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::Postgres> for $ty {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $ty {
            fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let s: String = sqlx::Decode::<sqlx::Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl sqlx::Encode<'_, sqlx::Postgres> for $ty {
            fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
                <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use impl_text_enum;

pub mod asset;
pub mod book;
pub mod borrow;
pub mod query;
pub mod stats;
pub mod user;
pub mod workflow;

// Re-export commonly used types
pub use book::{Book, BookForm};
pub use borrow::{BorrowRecord, BorrowRecordDetails, BorrowStatus, BorrowedBook, NewBorrow};
pub use query::{ListQuery, PageMetadata, Paginated, Pagination, SortOption};
pub use user::{User, UserClaims, UserRole, UserStatus, UserWithBorrows};
pub use workflow::{JobKind, JobStatus, WorkflowJob};
