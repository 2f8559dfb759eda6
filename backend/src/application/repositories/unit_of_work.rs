use crate::domain::DomainResult;

/// Explicit transaction boundary around a batch of repository calls.
///
/// Between `begin` and `commit` every write made through the same store is
/// pending; `rollback` discards all of them.
pub trait UnitOfWork {
    fn begin(&mut self) -> DomainResult<()>;

    fn commit(&mut self) -> DomainResult<()>;

    fn rollback(&mut self) -> DomainResult<()>;
}
