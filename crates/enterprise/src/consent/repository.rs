use super::record::{ConsentKey, ConsentRecord};
use crate::store::RepositoryError;

/// Storage abstraction for consent records.
///
/// Records returned by either method must be materialized
/// ([`ConsentRecord::materialized`]).
pub trait ConsentRepository: Send + Sync {
    fn fetch(&self, key: &ConsentKey) -> Result<Option<ConsentRecord>, RepositoryError>;
    /// Insert or overwrite the record for its key. Last writer wins.
    fn upsert(&self, record: ConsentRecord) -> Result<ConsentRecord, RepositoryError>;
}

/// The persisted record for `key`, or an unsaved placeholder.
pub fn proxied_get(
    repository: &dyn ConsentRepository,
    key: ConsentKey,
) -> Result<ConsentRecord, RepositoryError> {
    match repository.fetch(&key)? {
        Some(record) => Ok(record),
        None => Ok(ConsentRecord::unsaved(key)),
    }
}
