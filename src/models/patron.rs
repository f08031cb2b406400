//! Patron model (documents in `users`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Checkout ceiling for patrons without a checkout profile.
pub const DEFAULT_MAX_CHECKOUTS: u32 = 3;
/// Renewal ceiling for patrons without a checkout profile.
pub const DEFAULT_MAX_RENEWS: u32 = 2;

/// Patron document stored in Firestore, keyed by identity-provider uid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patron {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_info: Option<StoredCheckoutInfo>,
}

/// Account details shown to the operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub disabled: Option<bool>,
}

/// Checkout profile exactly as stored.
///
/// `active_checkouts` is kept untyped so that a corrupt document can be
/// reported instead of failing deserialization of the whole patron.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCheckoutInfo {
    #[serde(default)]
    pub active_checkouts: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_checkouts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_renews: Option<u32>,
}

/// Validated checkout profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutInfo {
    pub active_checkouts: BTreeSet<String>,
    pub max_checkouts: u32,
    pub max_renews: u32,
}

impl Default for CheckoutInfo {
    fn default() -> Self {
        Self {
            active_checkouts: BTreeSet::new(),
            max_checkouts: DEFAULT_MAX_CHECKOUTS,
            max_renews: DEFAULT_MAX_RENEWS,
        }
    }
}

impl CheckoutInfo {
    pub fn active_count(&self) -> usize {
        self.active_checkouts.len()
    }

    /// How many more copies the patron may hold.
    pub fn remaining_slots(&self) -> usize {
        (self.max_checkouts as usize).saturating_sub(self.active_count())
    }
}

/// The stored `activeCheckouts` field is missing or not a list of ids.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("checkoutInfo.activeCheckouts was not an array")]
pub struct CorruptCheckoutInfo;

impl StoredCheckoutInfo {
    pub fn validate(&self) -> Result<CheckoutInfo, CorruptCheckoutInfo> {
        let Some(serde_json::Value::Array(items)) = &self.active_checkouts else {
            return Err(CorruptCheckoutInfo);
        };

        let active_checkouts = items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or(CorruptCheckoutInfo))
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(CheckoutInfo {
            active_checkouts,
            max_checkouts: self.max_checkouts.unwrap_or(DEFAULT_MAX_CHECKOUTS),
            max_renews: self.max_renews.unwrap_or(DEFAULT_MAX_RENEWS),
        })
    }
}

impl Patron {
    /// Checkout profile, defaulting to an empty profile when none is stored.
    pub fn checkout_info(&self) -> Result<CheckoutInfo, CorruptCheckoutInfo> {
        match &self.checkout_info {
            Some(stored) => stored.validate(),
            None => Ok(CheckoutInfo::default()),
        }
    }

    /// Accounts without account details are treated as disabled.
    pub fn is_disabled(&self) -> bool {
        self.user_info
            .as_ref()
            .and_then(|info| info.disabled)
            .unwrap_or(true)
    }

    pub fn uid(&self) -> Option<&str> {
        self.user_info.as_ref().and_then(|info| info.uid.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_profile_uses_defaults() {
        let info = Patron::default().checkout_info().unwrap();
        assert_eq!(info.active_count(), 0);
        assert_eq!(info.max_checkouts, 3);
        assert_eq!(info.max_renews, 2);
        assert_eq!(info.remaining_slots(), 3);
    }

    #[test]
    fn stored_profile_without_limits_uses_default_limits() {
        let patron: Patron = serde_json::from_value(json!({
            "checkoutInfo": { "activeCheckouts": ["a", "b"] }
        }))
        .unwrap();

        let info = patron.checkout_info().unwrap();
        assert_eq!(info.active_count(), 2);
        assert_eq!(info.remaining_slots(), 1);
    }

    #[test]
    fn non_list_active_checkouts_is_corrupt() {
        for bad in [json!("abc"), json!({"a": 1}), json!([1, 2]), json!(null)] {
            let patron: Patron = serde_json::from_value(json!({
                "checkoutInfo": { "activeCheckouts": bad, "maxCheckouts": 5 }
            }))
            .unwrap();
            assert_eq!(patron.checkout_info(), Err(CorruptCheckoutInfo));
        }

        let missing: Patron =
            serde_json::from_value(json!({ "checkoutInfo": { "maxCheckouts": 5 } })).unwrap();
        assert_eq!(missing.checkout_info(), Err(CorruptCheckoutInfo));
    }

    #[test]
    fn remaining_slots_never_underflows() {
        let info = CheckoutInfo {
            active_checkouts: ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect(),
            max_checkouts: 3,
            max_renews: 2,
        };
        assert_eq!(info.remaining_slots(), 0);
    }

    #[test]
    fn missing_user_info_counts_as_disabled() {
        assert!(Patron::default().is_disabled());

        let enabled = Patron {
            user_info: Some(UserInfo {
                disabled: Some(false),
                ..Default::default()
            }),
            checkout_info: None,
        };
        assert!(!enabled.is_disabled());
    }
}
