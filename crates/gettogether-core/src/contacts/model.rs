//! Contact model.

use serde::{Deserialize, Serialize};

use crate::conversation::AccountId;

/// A contact known to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Account the contact belongs to.
    pub account_id: AccountId,
    /// Contact identifier.
    pub id: String,
    /// Engine URI (unique per account).
    pub uri: String,
    /// Name from the contact's own profile.
    pub display_name: String,
    /// Name chosen locally, overriding the profile name.
    pub custom_name: Option<String>,
    /// Avatar location.
    pub avatar_uri: Option<String>,
    /// Ban state. Volatile: never persisted.
    #[serde(skip)]
    pub is_banned: bool,
    /// Presence. Volatile: never persisted.
    #[serde(skip)]
    pub is_online: bool,
}

impl ContactRecord {
    /// Creates a contact whose id is its URI.
    #[must_use]
    pub fn new(account_id: AccountId, uri: impl Into<String>, display_name: impl Into<String>) -> Self {
        let uri = uri.into();
        Self {
            account_id,
            id: uri.clone(),
            uri,
            display_name: display_name.into(),
            custom_name: None,
            avatar_uri: None,
            is_banned: false,
            is_online: false,
        }
    }

    /// Name to show: custom name, then profile name, then URI.
    #[must_use]
    pub fn display(&self) -> &str {
        self.custom_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or_else(|| Some(self.display_name.as_str()).filter(|name| !name.is_empty()))
            .unwrap_or(self.uri.as_str())
    }

    /// Checks if the contact matches a search query (case-insensitive).
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let query_lower = query.to_lowercase();
        self.uri.to_lowercase().contains(&query_lower)
            || self.display().to_lowercase().contains(&query_lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefers_custom_name() {
        let mut contact = ContactRecord::new(AccountId::from("a1"), "jami:bob", "Bob");
        assert_eq!(contact.display(), "Bob");
        contact.custom_name = Some("Bobby".to_string());
        assert_eq!(contact.display(), "Bobby");
    }

    #[test]
    fn test_display_falls_back_to_uri() {
        let contact = ContactRecord::new(AccountId::from("a1"), "jami:bob", "");
        assert_eq!(contact.display(), "jami:bob");
    }

    #[test]
    fn test_matches() {
        let contact = ContactRecord::new(AccountId::from("a1"), "jami:bob", "Bob Jones");
        assert!(contact.matches("JONES"));
        assert!(contact.matches("jami:"));
        assert!(!contact.matches("alice"));
    }

    #[test]
    fn test_volatile_fields_not_serialized() {
        let mut contact = ContactRecord::new(AccountId::from("a1"), "jami:bob", "Bob");
        contact.is_banned = true;
        contact.is_online = true;
        let json = serde_json::to_string(&contact).unwrap_or_default();
        assert!(!json.contains("is_banned"));
        assert!(!json.contains("is_online"));
    }
}
