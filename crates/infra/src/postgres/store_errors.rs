use diesel::result::{DatabaseErrorKind, Error as DieselError};
use domain::repositories::store_error::{StoreError, StoreResult};

pub(crate) fn store_error(err: DieselError) -> StoreError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            StoreError::UniqueViolation(
                info.constraint_name()
                    .unwrap_or("unnamed_unique_constraint")
                    .to_string(),
            )
        }
        other => StoreError::Internal(other.into()),
    }
}

pub(crate) trait DieselResultExt<T> {
    fn store(self) -> StoreResult<T>;
}

impl<T> DieselResultExt<T> for Result<T, DieselError> {
    fn store(self) -> StoreResult<T> {
        self.map_err(store_error)
    }
}
