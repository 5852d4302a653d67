//! Discount Store
//!
//! Persistence collaborator for discount records. Reconciliation defers every
//! write to three bulk operations (create, update, delete) keyed by primary id.

use slotmap::SlotMap;
use thiserror::Error;
use tracing::debug;

use crate::discounts::records::{DiscountKey, DiscountRecord, NewDiscount, UpdatedFields};

/// Errors raised by a discount store.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    /// A record passed to an update does not exist.
    #[error("discount record {0:?} not found")]
    NotFound(DiscountKey),
}

/// Bulk persistence for discount records.
pub trait DiscountStore<'a> {
    /// Insert new records, returning them with their assigned keys in input order.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the records cannot be stored.
    fn bulk_create(
        &mut self,
        discounts: Vec<NewDiscount<'a>>,
    ) -> Result<Vec<DiscountRecord<'a>>, StoreError>;

    /// Write only `fields` of every given record. Nothing is written if any
    /// record is missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if a record does not exist.
    fn bulk_update(
        &mut self,
        discounts: &[DiscountRecord<'a>],
        fields: &UpdatedFields,
    ) -> Result<usize, StoreError>;

    /// Delete records by key, returning how many existed. Missing keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the records cannot be deleted.
    fn bulk_delete(&mut self, keys: &[DiscountKey]) -> Result<usize, StoreError>;
}

/// A bulk write performed against an [`InMemoryDiscountStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    /// Records created.
    Create(usize),

    /// Records updated and the fields written.
    Update(usize, UpdatedFields),

    /// Records deleted.
    Delete(usize),
}

/// In-memory discount store that keeps a log of bulk writes.
#[derive(Debug, Default)]
pub struct InMemoryDiscountStore<'a> {
    records: SlotMap<DiscountKey, DiscountRecord<'a>>,
    operations: Vec<BulkOperation>,
}

impl<'a> InMemoryDiscountStore<'a> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a stored record.
    pub fn get(&self, key: DiscountKey) -> Option<&DiscountRecord<'a>> {
        self.records.get(key)
    }

    /// Iterate over every stored record.
    pub fn iter(&self) -> impl Iterator<Item = &DiscountRecord<'a>> {
        self.records.values()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bulk writes performed so far, oldest first.
    pub fn operations(&self) -> &[BulkOperation] {
        &self.operations
    }

    /// Forget the write log, keeping the records.
    pub fn clear_operations(&mut self) {
        self.operations.clear();
    }
}

impl<'a> DiscountStore<'a> for InMemoryDiscountStore<'a> {
    fn bulk_create(
        &mut self,
        discounts: Vec<NewDiscount<'a>>,
    ) -> Result<Vec<DiscountRecord<'a>>, StoreError> {
        let created: Vec<DiscountRecord<'a>> = discounts
            .into_iter()
            .map(|discount| {
                let key = self
                    .records
                    .insert_with_key(|key| discount.clone().into_record(key));

                discount.into_record(key)
            })
            .collect();

        debug!(count = created.len(), "created discount records");

        self.operations.push(BulkOperation::Create(created.len()));

        Ok(created)
    }

    fn bulk_update(
        &mut self,
        discounts: &[DiscountRecord<'a>],
        fields: &UpdatedFields,
    ) -> Result<usize, StoreError> {
        if let Some(missing) = discounts
            .iter()
            .find(|discount| !self.records.contains_key(discount.key))
        {
            return Err(StoreError::NotFound(missing.key));
        }

        for discount in discounts {
            if let Some(stored) = self.records.get_mut(discount.key) {
                stored.copy_fields_from(discount, fields);
            }
        }

        debug!(count = discounts.len(), fields = fields.len(), "updated discount records");

        self.operations
            .push(BulkOperation::Update(discounts.len(), fields.clone()));

        Ok(discounts.len())
    }

    fn bulk_delete(&mut self, keys: &[DiscountKey]) -> Result<usize, StoreError> {
        let deleted = keys
            .iter()
            .filter(|key| self.records.remove(**key).is_some())
            .count();

        debug!(count = deleted, "deleted discount records");

        self.operations.push(BulkOperation::Delete(deleted));

        Ok(deleted)
    }
}
