//! Contact storage repository.

use sqlx::Row;
use sqlx::sqlite::SqlitePool;

use super::model::ContactRecord;
use crate::{AccountId, Result};

/// Repository for contact storage and retrieval.
///
/// The table has no ban or presence columns; records read back always carry
/// `is_banned = false` and `is_online = false`.
#[derive(Debug, Clone)]
pub struct ContactRepository {
    pool: SqlitePool,
}

impl ContactRepository {
    /// Creates the repository on an open pool, creating its table if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS contacts (
                account_id TEXT NOT NULL,
                uri TEXT NOT NULL,
                contact_id TEXT NOT NULL,
                display_name TEXT NOT NULL DEFAULT '',
                custom_name TEXT,
                avatar_uri TEXT,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (account_id, uri)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert or update a contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn save(&self, contact: &ContactRecord) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO contacts (account_id, uri, contact_id, display_name, custom_name, avatar_uri, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(account_id, uri) DO UPDATE SET
                contact_id = excluded.contact_id,
                display_name = excluded.display_name,
                custom_name = excluded.custom_name,
                avatar_uri = excluded.avatar_uri,
                updated_at = CURRENT_TIMESTAMP
            ",
        )
        .bind(contact.account_id.as_str())
        .bind(&contact.uri)
        .bind(&contact.id)
        .bind(&contact.display_name)
        .bind(&contact.custom_name)
        .bind(&contact.avatar_uri)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All contacts of an account, ordered by URI.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self, account_id: &AccountId) -> Result<Vec<ContactRecord>> {
        let rows = sqlx::query(
            r"
            SELECT account_id, uri, contact_id, display_name, custom_name, avatar_uri
            FROM contacts
            WHERE account_id = ?
            ORDER BY uri
            ",
        )
        .bind(account_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let contacts = rows
            .iter()
            .map(|row| ContactRecord {
                account_id: AccountId(row.get("account_id")),
                id: row.get("contact_id"),
                uri: row.get("uri"),
                display_name: row.get("display_name"),
                custom_name: row.get("custom_name"),
                avatar_uri: row.get("avatar_uri"),
                is_banned: false,
                is_online: false,
            })
            .collect();

        Ok(contacts)
    }

    /// Delete one contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete(&self, account_id: &AccountId, uri: &str) -> Result<()> {
        sqlx::query("DELETE FROM contacts WHERE account_id = ? AND uri = ?")
            .bind(account_id.as_str())
            .bind(uri)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    async fn repo() -> ContactRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        ContactRepository::from_pool(pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_save_and_list() {
        let repo = repo().await;
        let account = AccountId::from("a1");

        let mut bob = ContactRecord::new(account.clone(), "jami:bob", "Bob");
        bob.custom_name = Some("Bobby".to_string());
        repo.save(&bob).await.unwrap();
        repo.save(&ContactRecord::new(account.clone(), "jami:alice", "Alice"))
            .await
            .unwrap();
        repo.save(&ContactRecord::new(AccountId::from("a2"), "jami:carol", "Carol"))
            .await
            .unwrap();

        let contacts = repo.list(&account).await.unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].uri, "jami:alice");
        assert_eq!(contacts[1], bob);
    }

    #[tokio::test]
    async fn test_banned_and_online_are_not_persisted() {
        let repo = repo().await;
        let account = AccountId::from("a1");

        let mut bob = ContactRecord::new(account.clone(), "jami:bob", "Bob");
        bob.is_banned = true;
        bob.is_online = true;
        repo.save(&bob).await.unwrap();

        let reloaded = repo.list(&account).await.unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(!reloaded[0].is_banned);
        assert!(!reloaded[0].is_online);
        assert_eq!(reloaded[0].display_name, "Bob");
    }

    #[tokio::test]
    async fn test_save_updates_existing() {
        let repo = repo().await;
        let account = AccountId::from("a1");

        repo.save(&ContactRecord::new(account.clone(), "jami:bob", "Bob"))
            .await
            .unwrap();
        repo.save(&ContactRecord::new(account.clone(), "jami:bob", "Robert"))
            .await
            .unwrap();

        let contacts = repo.list(&account).await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].display_name, "Robert");
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = repo().await;
        let account = AccountId::from("a1");

        repo.save(&ContactRecord::new(account.clone(), "jami:bob", "Bob"))
            .await
            .unwrap();
        repo.delete(&account, "jami:bob").await.unwrap();
        repo.delete(&account, "jami:unknown").await.unwrap();

        assert!(repo.list(&account).await.unwrap().is_empty());
    }
}
