//! [`SqliteStore`], the SQLite implementation of [`ProfileStore`] and
//! [`AccountStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use guardian_core::{
  principal::Principal,
  profile::{AccountStatus, ProfileEntry, ProfileRecord, Role},
  store::{Account, AccountStore, NewAccount, ProfileStore},
};

use crate::{
  encode::{
    encode_dt, encode_role, encode_status, encode_uuid, RawAccount, RawProfile,
    RawProfileEntry,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Guardian profile and account store backed by a single SQLite file.
///
/// Clones share one connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  #[cfg(test)]
  pub(crate) fn conn_for_tests(&self) -> &tokio_rusqlite::Connection { &self.conn }

  /// Read a record that an update has just touched.
  async fn fetch_existing(&self, principal_id: Uuid) -> Result<ProfileRecord> {
    self
      .get(principal_id)
      .await?
      .ok_or(Error::ProfileNotFound(principal_id))
  }

  /// Run a single-column `UPDATE` on a profile row.
  async fn update_column(
    &self,
    principal_id: Uuid,
    column: &'static str,
    value: String,
  ) -> Result<ProfileRecord> {
    let id_str = encode_uuid(principal_id);
    let now    = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "UPDATE profiles SET {column} = ?1, updated_at = ?2 WHERE principal_id = ?3"
        );
        Ok(conn.execute(&sql, rusqlite::params![value, now, id_str])?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::ProfileNotFound(principal_id));
    }
    self.fetch_existing(principal_id).await
  }
}

// ─── ProfileStore ────────────────────────────────────────────────────────────

impl ProfileStore for SqliteStore {
  type Error = Error;

  async fn get(&self, principal_id: Uuid) -> Result<Option<ProfileRecord>> {
    let id_str = encode_uuid(principal_id);

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT contact, status, role FROM profiles WHERE principal_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawProfile {
                  contact: row.get(0)?,
                  status:  row.get(1)?,
                  role:    row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    Ok(raw.map(RawProfile::into_record))
  }

  async fn create_profile(&self, principal_id: Uuid) -> Result<ProfileRecord> {
    let id_str = encode_uuid(principal_id);
    let now    = encode_dt(Utc::now());
    let status = encode_status(&AccountStatus::New);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO profiles
             (principal_id, contact, status, role, created_at, updated_at)
           VALUES (?1, NULL, ?2, NULL, ?3, ?3)",
          rusqlite::params![id_str, status, now],
        )?;
        Ok(())
      })
      .await?;

    self.fetch_existing(principal_id).await
  }

  async fn complete_profile(
    &self,
    principal_id: Uuid,
    contact: String,
  ) -> Result<ProfileRecord> {
    let id_str = encode_uuid(principal_id);
    let now    = encode_dt(Utc::now());
    let status = encode_status(&AccountStatus::New);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO profiles
             (principal_id, contact, status, role, created_at, updated_at)
           VALUES (?1, ?2, ?3, NULL, ?4, ?4)
           ON CONFLICT (principal_id) DO UPDATE
             SET contact = excluded.contact, updated_at = excluded.updated_at",
          rusqlite::params![id_str, contact, status, now],
        )?;
        Ok(())
      })
      .await?;

    self.fetch_existing(principal_id).await
  }

  async fn set_status(
    &self,
    principal_id: Uuid,
    status: AccountStatus,
  ) -> Result<ProfileRecord> {
    self
      .update_column(principal_id, "status", encode_status(&status))
      .await
  }

  async fn set_role(&self, principal_id: Uuid, role: Role) -> Result<ProfileRecord> {
    self
      .update_column(principal_id, "role", encode_role(role))
      .await
  }

  async fn list_profiles(&self) -> Result<Vec<ProfileEntry>> {
    let raws: Vec<RawProfileEntry> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT p.principal_id, a.email, a.display_name,
                  p.contact, p.status, p.role, p.created_at, p.updated_at
             FROM profiles p
             LEFT JOIN accounts a ON a.principal_id = p.principal_id
            ORDER BY p.created_at, p.principal_id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawProfileEntry {
              principal_id: row.get(0)?,
              email:        row.get(1)?,
              display_name: row.get(2)?,
              profile:      RawProfile {
                contact: row.get(3)?,
                status:  row.get(4)?,
                role:    row.get(5)?,
              },
              created_at:   row.get(6)?,
              updated_at:   row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProfileEntry::into_entry).collect()
  }
}

// ─── AccountStore ────────────────────────────────────────────────────────────

impl AccountStore for SqliteStore {
  type Error = Error;

  async fn create_account(&self, input: NewAccount) -> Result<Principal> {
    let principal = Principal {
      principal_id: Uuid::new_v4(),
      email:        input.email,
      display_name: input.display_name,
    };

    let id_str    = encode_uuid(principal.principal_id);
    let email     = principal.email.clone();
    let name      = principal.display_name.clone();
    let hash      = input.password_hash;
    let now       = encode_dt(Utc::now());

    let inserted = self
      .conn
      .call(move |conn| {
        let taken: bool = conn
          .query_row(
            "SELECT 1 FROM accounts WHERE email = ?1",
            rusqlite::params![email],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        if taken {
          return Ok(false);
        }

        conn.execute(
          "INSERT INTO accounts (principal_id, email, display_name, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, email, name, hash, now],
        )?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::EmailTaken(principal.email));
    }
    Ok(principal)
  }

  async fn find_account(&self, email: &str) -> Result<Option<Account>> {
    let email = email.to_owned();

    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT principal_id, email, display_name, password_hash
                 FROM accounts WHERE email = ?1",
              rusqlite::params![email],
              |row| {
                Ok(RawAccount {
                  principal_id:  row.get(0)?,
                  email:         row.get(1)?,
                  display_name:  row.get(2)?,
                  password_hash: row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }
}
