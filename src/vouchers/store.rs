//! Voucher Store
//!
//! Persistence collaborator for vouchers, codes and per-customer usage rows.
//! Counter updates are conditional so a usage limit can never be exceeded.

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;
use tracing::debug;

use crate::{
    discounts::NotApplicable,
    vouchers::{Voucher, VoucherCode, VoucherCodeKey, VoucherError, VoucherKey},
};

/// Voucher persistence.
pub trait VoucherStore<'a> {
    /// Look up a voucher.
    fn voucher(&self, key: VoucherKey) -> Option<&Voucher<'a>>;

    /// Look up a code.
    fn code(&self, key: VoucherCodeKey) -> Option<&VoucherCode>;

    /// Find a code by the text customers enter.
    fn find_code(&self, code: &str) -> Option<VoucherCodeKey>;

    /// Increase the code's usage counter by one, returning the new count.
    ///
    /// When `limit` is set the increment only happens while `used < limit`.
    ///
    /// # Errors
    ///
    /// Returns [`NotApplicable::UsageLimitReached`] if the limit is already met,
    /// or [`VoucherError::CodeNotFound`].
    fn increment_code_usage(
        &mut self,
        code: VoucherCodeKey,
        limit: Option<u32>,
    ) -> Result<u32, VoucherError>;

    /// Decrease the code's usage counter by one, never below zero.
    ///
    /// # Errors
    ///
    /// Returns [`VoucherError::CodeNotFound`].
    fn decrement_code_usage(&mut self, code: VoucherCodeKey) -> Result<u32, VoucherError>;

    /// Activate or deactivate a code.
    ///
    /// # Errors
    ///
    /// Returns [`VoucherError::CodeNotFound`].
    fn set_code_active(&mut self, code: VoucherCodeKey, active: bool) -> Result<(), VoucherError>;

    /// Record that `email` used `code`. Returns `false` if the row already existed.
    ///
    /// # Errors
    ///
    /// Returns [`VoucherError::CodeNotFound`].
    fn add_customer_usage(&mut self, code: VoucherCodeKey, email: &str)
    -> Result<bool, VoucherError>;

    /// Remove the usage row for `email` and `code`. Returns whether one existed.
    fn remove_customer_usage(&mut self, code: VoucherCodeKey, email: &str) -> bool;

    /// Whether `email` used any code of `voucher`.
    fn customer_has_used_voucher(&self, voucher: VoucherKey, email: &str) -> bool;
}

/// In-memory voucher store.
#[derive(Debug, Default)]
pub struct InMemoryVoucherStore<'a> {
    vouchers: SlotMap<VoucherKey, Voucher<'a>>,
    codes: SlotMap<VoucherCodeKey, VoucherCode>,
    code_index: FxHashMap<String, VoucherCodeKey>,
    customers: FxHashSet<(VoucherCodeKey, String)>,
}

impl<'a> InMemoryVoucherStore<'a> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a voucher.
    pub fn add_voucher(&mut self, voucher: Voucher<'a>) -> VoucherKey {
        self.vouchers.insert(voucher)
    }

    /// Add a fresh code under `voucher`.
    ///
    /// # Errors
    ///
    /// Returns [`VoucherError::VoucherNotFound`] for an unknown voucher, or
    /// [`VoucherError::DuplicateCode`] if the code text is taken.
    pub fn add_code(
        &mut self,
        voucher: VoucherKey,
        code: impl Into<String>,
    ) -> Result<VoucherCodeKey, VoucherError> {
        let code = code.into();

        if !self.vouchers.contains_key(voucher) {
            return Err(VoucherError::VoucherNotFound(voucher));
        }

        if self.code_index.contains_key(&code) {
            return Err(VoucherError::DuplicateCode(code));
        }

        let key = self.codes.insert(VoucherCode::new(voucher, code.clone()));

        self.code_index.insert(code, key);

        Ok(key)
    }

    /// Iterate over every voucher.
    pub fn vouchers(&self) -> impl Iterator<Item = (VoucherKey, &Voucher<'a>)> {
        self.vouchers.iter()
    }

    /// Codes belonging to `voucher`.
    pub fn codes_for(
        &self,
        voucher: VoucherKey,
    ) -> impl Iterator<Item = (VoucherCodeKey, &VoucherCode)> {
        self.codes
            .iter()
            .filter(move |(_, code)| code.voucher == voucher)
    }

    fn code_mut(&mut self, key: VoucherCodeKey) -> Result<&mut VoucherCode, VoucherError> {
        self.codes.get_mut(key).ok_or(VoucherError::CodeNotFound(key))
    }
}

impl<'a> VoucherStore<'a> for InMemoryVoucherStore<'a> {
    fn voucher(&self, key: VoucherKey) -> Option<&Voucher<'a>> {
        self.vouchers.get(key)
    }

    fn code(&self, key: VoucherCodeKey) -> Option<&VoucherCode> {
        self.codes.get(key)
    }

    fn find_code(&self, code: &str) -> Option<VoucherCodeKey> {
        self.code_index.get(code).copied()
    }

    fn increment_code_usage(
        &mut self,
        key: VoucherCodeKey,
        limit: Option<u32>,
    ) -> Result<u32, VoucherError> {
        let code = self.code_mut(key)?;

        if limit.is_some_and(|limit| code.used >= limit) {
            debug!(used = code.used, ?limit, "voucher code usage limit reached");

            return Err(NotApplicable::UsageLimitReached.into());
        }

        code.used = code.used.saturating_add(1);

        Ok(code.used)
    }

    fn decrement_code_usage(&mut self, key: VoucherCodeKey) -> Result<u32, VoucherError> {
        let code = self.code_mut(key)?;

        code.used = code.used.saturating_sub(1);

        Ok(code.used)
    }

    fn set_code_active(&mut self, key: VoucherCodeKey, active: bool) -> Result<(), VoucherError> {
        self.code_mut(key)?.is_active = active;

        Ok(())
    }

    fn add_customer_usage(
        &mut self,
        code: VoucherCodeKey,
        email: &str,
    ) -> Result<bool, VoucherError> {
        if !self.codes.contains_key(code) {
            return Err(VoucherError::CodeNotFound(code));
        }

        Ok(self.customers.insert((code, email.to_string())))
    }

    fn remove_customer_usage(&mut self, code: VoucherCodeKey, email: &str) -> bool {
        self.customers.remove(&(code, email.to_string()))
    }

    fn customer_has_used_voucher(&self, voucher: VoucherKey, email: &str) -> bool {
        self.customers.iter().any(|(code, customer)| {
            customer == email
                && self
                    .codes
                    .get(*code)
                    .is_some_and(|code| code.voucher == voucher)
        })
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::{discounts::DiscountValueType, vouchers::VoucherType};

    use super::*;

    fn store_with_code<'a>()
    -> Result<(InMemoryVoucherStore<'a>, VoucherKey, VoucherCodeKey), VoucherError> {
        let mut store = InMemoryVoucherStore::new();
        let voucher = store.add_voucher(Voucher::new(
            VoucherType::EntireOrder,
            DiscountValueType::Fixed,
            jiff::Timestamp::UNIX_EPOCH,
        ));
        let code = store.add_code(voucher, "SAVE10")?;

        Ok((store, voucher, code))
    }

    #[test]
    fn find_code_returns_added_code() -> TestResult {
        let (store, voucher, code) = store_with_code()?;

        assert_eq!(store.find_code("SAVE10"), Some(code));
        assert_eq!(store.find_code("NOPE"), None);
        assert_eq!(store.code(code).map(|code| code.voucher), Some(voucher));

        Ok(())
    }

    #[test]
    fn duplicate_codes_are_rejected() -> TestResult {
        let (mut store, voucher, _) = store_with_code()?;

        assert_eq!(
            store.add_code(voucher, "SAVE10"),
            Err(VoucherError::DuplicateCode("SAVE10".to_string()))
        );

        Ok(())
    }

    #[test]
    fn increment_stops_at_limit() -> TestResult {
        let (mut store, _, code) = store_with_code()?;

        assert_eq!(store.increment_code_usage(code, Some(2))?, 1);
        assert_eq!(store.increment_code_usage(code, Some(2))?, 2);
        assert_eq!(
            store.increment_code_usage(code, Some(2)),
            Err(VoucherError::NotApplicable(NotApplicable::UsageLimitReached))
        );
        assert_eq!(store.code(code).map(|code| code.used), Some(2));

        Ok(())
    }

    #[test]
    fn decrement_never_goes_below_zero() -> TestResult {
        let (mut store, _, code) = store_with_code()?;

        assert_eq!(store.decrement_code_usage(code)?, 0);

        Ok(())
    }

    #[test]
    fn customer_usage_is_unique_per_code() -> TestResult {
        let (mut store, voucher, code) = store_with_code()?;

        assert!(store.add_customer_usage(code, "a@example.com")?);
        assert!(!store.add_customer_usage(code, "a@example.com")?);
        assert!(store.customer_has_used_voucher(voucher, "a@example.com"));
        assert!(!store.customer_has_used_voucher(voucher, "b@example.com"));

        assert!(store.remove_customer_usage(code, "a@example.com"));
        assert!(!store.customer_has_used_voucher(voucher, "a@example.com"));

        Ok(())
    }
}
