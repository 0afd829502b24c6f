//! SQLite storage backend for keyrack.
//!
//! Implements both [`Store`] and [`AuditLog`] against one pool. Credential
//! mutations write the row change and its audit entry in a single
//! transaction; the pre-image for update/deactivate is read inside that same
//! transaction, so no interleaved partial state is ever observable.

use chrono::{DateTime, Utc};
use keyrack_audit::{
    snapshot, AuditAction, AuditEntry, AuditEntryId, AuditEntryWithActor, AuditLog, AuditLogError,
    CredentialSnapshot,
};
use keyrack_storage::{
    AccessibleCredential, CreateCredentialParams, CreateGroupParams, CreateUserParams, Credential,
    CredentialFilter, CredentialId, CredentialListing, CredentialStats, GrantCapabilities, Group,
    GroupId, GroupMember, GroupStats, GroupSummary, PermissionGrant, SecretRow, Store, StoreError,
    UpdateCredentialParams, UpdateGroupParams, User, UserId,
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use uuid::Uuid;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// `~/.keyrack/store.db` (creates dir with 0700 perms on unix)
    pub async fn open_default() -> Result<Self, StoreError> {
        let dir = dirs::home_dir()
            .ok_or_else(|| StoreError::Backend("no home dir".into()))?
            .join(".keyrack");
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Backend(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        let path = dir.join("store.db");
        let url = format!("sqlite://{}?mode=rwc", path.to_string_lossy());
        Self::open(&url).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }

    async fn fetch_group(
        &self,
        group_id: &GroupId,
        include_inactive: bool,
    ) -> Result<Group, StoreError> {
        let mut sql = String::from(
            "SELECT id, name, description, color, is_active, created_at, updated_at
             FROM credential_groups WHERE id = ?",
        );
        if !include_inactive {
            sql.push_str(" AND is_active = 1");
        }
        let row = sqlx::query_as::<_, GroupRow>(&sql)
            .bind(group_id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        row.ok_or(StoreError::NotFound)?.into_group()
    }

    async fn fetch_credential(
        &self,
        credential_id: &CredentialId,
        viewer: Option<&UserId>,
        include_inactive: bool,
    ) -> Result<Credential, StoreError> {
        let mut sql = format!("{CREDENTIAL_SELECT} WHERE c.id = ?");
        if !include_inactive {
            sql.push_str(" AND c.is_active = 1");
        }
        if viewer.is_some() {
            sql.push_str(VIEW_GATE);
        }
        let mut query = sqlx::query_as::<_, CredentialRow>(&sql).bind(credential_id.0.to_string());
        if let Some(viewer) = viewer {
            query = query.bind(viewer.0.to_string());
        }
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        row.ok_or(StoreError::NotFound)?.into_credential()
    }
}

/// Joined credential projection used by every credential read.
const CREDENTIAL_SELECT: &str = "SELECT c.id, c.title, c.username, c.url, c.notes, c.group_id,
        c.is_active, c.created_by, c.last_modified_by, c.created_at, c.updated_at,
        g.name AS group_name, g.color AS group_color,
        u1.name AS created_by_name, u2.name AS last_modified_by_name
    FROM credentials c
    LEFT JOIN credential_groups g ON c.group_id = g.id
    LEFT JOIN users u1 ON c.created_by = u1.id
    LEFT JOIN users u2 ON c.last_modified_by = u2.id";

/// Appended when a read must be visible only through a `can_view` grant.
const VIEW_GATE: &str = " AND EXISTS (SELECT 1 FROM group_grants gg
        WHERE gg.group_id = c.group_id AND gg.user_id = ? AND gg.can_view = 1)";

fn backend_err<E: std::fmt::Display>(err: E) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn map_unique(err: sqlx::Error) -> StoreError {
    let s = err.to_string();
    if s.contains("UNIQUE") {
        StoreError::AlreadyExists
    } else {
        StoreError::Backend(s)
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(backend_err)
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    name: String,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> Result<User, StoreError> {
        Ok(User {
            id: UserId(parse_uuid(&self.id)?),
            email: self.email,
            name: self.name,
            role: self.role.parse().map_err(backend_err)?,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    id: String,
    name: String,
    description: Option<String>,
    color: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRow {
    fn into_group(self) -> Result<Group, StoreError> {
        Ok(Group {
            id: GroupId(parse_uuid(&self.id)?),
            name: self.name,
            description: self.description,
            color: self.color,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct GroupCountRow {
    #[sqlx(flatten)]
    group: GroupRow,
    credential_count: i64,
}

#[derive(sqlx::FromRow)]
struct GroupGrantRow {
    #[sqlx(flatten)]
    group: GroupRow,
    credential_count: i64,
    can_view: bool,
    can_edit: bool,
    can_delete: bool,
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: String,
    title: String,
    username: Option<String>,
    url: Option<String>,
    notes: Option<String>,
    group_id: String,
    is_active: bool,
    created_by: String,
    last_modified_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    group_name: Option<String>,
    group_color: Option<String>,
    created_by_name: Option<String>,
    last_modified_by_name: Option<String>,
}

impl CredentialRow {
    fn into_credential(self) -> Result<Credential, StoreError> {
        Ok(Credential {
            id: CredentialId(parse_uuid(&self.id)?),
            title: self.title,
            username: self.username,
            url: self.url,
            notes: self.notes,
            group_id: GroupId(parse_uuid(&self.group_id)?),
            is_active: self.is_active,
            created_by: UserId(parse_uuid(&self.created_by)?),
            last_modified_by: UserId(parse_uuid(&self.last_modified_by)?),
            created_at: self.created_at,
            updated_at: self.updated_at,
            group_name: self.group_name,
            group_color: self.group_color,
            created_by_name: self.created_by_name,
            last_modified_by_name: self.last_modified_by_name,
        })
    }

    fn into_listing(self) -> Result<CredentialListing, StoreError> {
        Ok(CredentialListing {
            id: CredentialId(parse_uuid(&self.id)?),
            title: self.title,
            username: self.username,
            url: self.url,
            notes: self.notes,
            group_id: GroupId(parse_uuid(&self.group_id)?),
            group_name: self.group_name,
            group_color: self.group_color,
            created_by_name: self.created_by_name,
            last_modified_by_name: self.last_modified_by_name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AccessibleRow {
    #[sqlx(flatten)]
    credential: CredentialRow,
    can_view: bool,
    can_edit: bool,
    can_delete: bool,
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    title: String,
    username: Option<String>,
    url: Option<String>,
    notes: Option<String>,
    group_id: String,
}

impl SnapshotRow {
    fn into_snapshot(self) -> Result<CredentialSnapshot, StoreError> {
        Ok(snapshot(
            &self.title,
            self.username.as_deref(),
            self.url.as_deref(),
            self.notes.as_deref(),
            &GroupId(parse_uuid(&self.group_id)?),
        ))
    }
}

/// Write one audit row inside a mutation transaction.
async fn insert_audit_row(
    conn: &mut sqlx::SqliteConnection,
    credential_id: &CredentialId,
    actor: &UserId,
    action: AuditAction,
    old_values: Option<&CredentialSnapshot>,
    new_values: Option<&CredentialSnapshot>,
) -> Result<(), StoreError> {
    let old_json = old_values
        .map(serde_json::to_string)
        .transpose()
        .map_err(backend_err)?;
    let new_json = new_values
        .map(serde_json::to_string)
        .transpose()
        .map_err(backend_err)?;

    sqlx::query(
        "INSERT INTO audit_log(id, credential_id, user_id, action, old_values, new_values,
                               ip_address, user_agent, created_at)
         VALUES(?, ?, ?, ?, ?, ?, NULL, NULL, ?)",
    )
    .bind(AuditEntryId::new().0.to_string())
    .bind(credential_id.0.to_string())
    .bind(actor.0.to_string())
    .bind(action.to_string())
    .bind(old_json)
    .bind(new_json)
    .bind(Utc::now())
    .execute(conn)
    .await
    .map_err(backend_err)?;
    Ok(())
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    // ───────────────────────────── Users ─────────────────────────────

    async fn create_user(&self, params: &CreateUserParams) -> Result<User, StoreError> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO users(id, email, name, role, is_active, created_at, updated_at)
             VALUES(?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&params.email)
        .bind(&params.name)
        .bind(params.role.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_unique)?;

        self.get_user(&UserId(id)).await
    }

    async fn get_user(&self, user_id: &UserId) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, name, role, is_active, created_at, updated_at
             FROM users WHERE id = ?",
        )
        .bind(user_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;
        row.ok_or(StoreError::NotFound)?.into_user()
    }

    // ───────────────────────────── Groups ─────────────────────────────

    async fn create_group(&self, params: &CreateGroupParams) -> Result<Group, StoreError> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let color = params
            .color
            .as_deref()
            .unwrap_or(keyrack_storage::DEFAULT_GROUP_COLOR);
        sqlx::query(
            "INSERT INTO credential_groups(id, name, description, color, is_active, created_at, updated_at)
             VALUES(?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&params.name)
        .bind(&params.description)
        .bind(color)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_unique)?;

        self.fetch_group(&GroupId(id), false).await
    }

    async fn get_group(&self, group_id: &GroupId) -> Result<Group, StoreError> {
        self.fetch_group(group_id, false).await
    }

    async fn get_group_by_name(&self, name: &str) -> Result<Group, StoreError> {
        let row = sqlx::query_as::<_, GroupRow>(
            "SELECT id, name, description, color, is_active, created_at, updated_at
             FROM credential_groups WHERE name = ? AND is_active = 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;
        row.ok_or(StoreError::NotFound)?.into_group()
    }

    async fn list_groups(&self) -> Result<Vec<GroupSummary>, StoreError> {
        let rows = sqlx::query_as::<_, GroupCountRow>(
            "SELECT g.id, g.name, g.description, g.color, g.is_active, g.created_at, g.updated_at,
                    COUNT(c.id) AS credential_count
             FROM credential_groups g
             LEFT JOIN credentials c ON c.group_id = g.id AND c.is_active = 1
             WHERE g.is_active = 1
             GROUP BY g.id
             ORDER BY g.name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        rows.into_iter()
            .map(|row| {
                Ok(GroupSummary {
                    group: row.group.into_group()?,
                    credential_count: row.credential_count,
                    own_grant: None,
                })
            })
            .collect()
    }

    async fn list_groups_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<GroupSummary>, StoreError> {
        let rows = sqlx::query_as::<_, GroupGrantRow>(
            "SELECT g.id, g.name, g.description, g.color, g.is_active, g.created_at, g.updated_at,
                    COUNT(c.id) AS credential_count,
                    gg.can_view, gg.can_edit, gg.can_delete
             FROM credential_groups g
             INNER JOIN group_grants gg ON g.id = gg.group_id AND gg.user_id = ?
             LEFT JOIN credentials c ON c.group_id = g.id AND c.is_active = 1
             WHERE g.is_active = 1
             GROUP BY g.id, gg.can_view, gg.can_edit, gg.can_delete
             ORDER BY g.name",
        )
        .bind(user_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        rows.into_iter()
            .map(|row| {
                Ok(GroupSummary {
                    group: row.group.into_group()?,
                    credential_count: row.credential_count,
                    own_grant: Some(GrantCapabilities {
                        can_view: row.can_view,
                        can_edit: row.can_edit,
                        can_delete: row.can_delete,
                    }),
                })
            })
            .collect()
    }

    async fn update_group(
        &self,
        group_id: &GroupId,
        params: &UpdateGroupParams,
    ) -> Result<Group, StoreError> {
        let result = sqlx::query(
            "UPDATE credential_groups
             SET name = ?, description = ?, color = ?, is_active = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&params.name)
        .bind(&params.description)
        .bind(&params.color)
        .bind(params.is_active)
        .bind(Utc::now())
        .bind(group_id.0.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_unique)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        self.fetch_group(group_id, true).await
    }

    async fn deactivate_group(&self, group_id: &GroupId) -> Result<Group, StoreError> {
        let result = sqlx::query(
            "UPDATE credential_groups SET is_active = 0, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(group_id.0.to_string())
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        self.fetch_group(group_id, true).await
    }

    async fn group_stats(&self) -> Result<GroupStats, StoreError> {
        let (total, active, inactive) = sqlx::query_as::<_, (i64, i64, i64)>(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN is_active = 1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN is_active = 0 THEN 1 ELSE 0 END), 0)
             FROM credential_groups",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(GroupStats {
            total,
            active,
            inactive,
        })
    }

    // ───────────────────────────── Grants ─────────────────────────────

    async fn upsert_grant(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        caps: &GrantCapabilities,
    ) -> Result<PermissionGrant, StoreError> {
        sqlx::query(
            "INSERT INTO group_grants(group_id, user_id, can_view, can_edit, can_delete, granted_at)
             VALUES(?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id, group_id)
             DO UPDATE SET can_view = excluded.can_view,
                           can_edit = excluded.can_edit,
                           can_delete = excluded.can_delete",
        )
        .bind(group_id.0.to_string())
        .bind(user_id.0.to_string())
        .bind(caps.can_view)
        .bind(caps.can_edit)
        .bind(caps.can_delete)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        self.get_grant(group_id, user_id)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn delete_grant(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM group_grants WHERE group_id = ? AND user_id = ?")
            .bind(group_id.0.to_string())
            .bind(user_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_grant(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<Option<PermissionGrant>, StoreError> {
        let row = sqlx::query_as::<_, (bool, bool, bool, DateTime<Utc>)>(
            "SELECT can_view, can_edit, can_delete, granted_at
             FROM group_grants WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id.0.to_string())
        .bind(user_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(row.map(|(can_view, can_edit, can_delete, granted_at)| PermissionGrant {
            group_id: group_id.clone(),
            user_id: user_id.clone(),
            can_view,
            can_edit,
            can_delete,
            granted_at,
        }))
    }

    async fn list_group_members(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<GroupMember>, StoreError> {
        let rows = sqlx::query_as::<
            _,
            (
                String,
                String,
                String,
                String,
                bool,
                bool,
                bool,
                DateTime<Utc>,
            ),
        >(
            "SELECT u.id, u.email, u.name, u.role,
                    gg.can_view, gg.can_edit, gg.can_delete, gg.granted_at
             FROM users u
             INNER JOIN group_grants gg ON u.id = gg.user_id
             WHERE gg.group_id = ? AND u.is_active = 1
             ORDER BY u.name",
        )
        .bind(group_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        rows.into_iter()
            .map(
                |(id, email, name, role, can_view, can_edit, can_delete, granted_at)| {
                    Ok(GroupMember {
                        user_id: UserId(parse_uuid(&id)?),
                        email,
                        name,
                        role: role.parse().map_err(backend_err)?,
                        can_view,
                        can_edit,
                        can_delete,
                        granted_at,
                    })
                },
            )
            .collect()
    }

    // ─────────────────────────── Credentials ───────────────────────────

    async fn create_credential(
        &self,
        params: &CreateCredentialParams,
        actor: &UserId,
    ) -> Result<Credential, StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(backend_err)?;

        sqlx::query(
            "INSERT INTO credentials(id, title, username, secret_nonce, secret_ciphertext,
                                     url, notes, group_id, is_active,
                                     created_by, last_modified_by, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?)",
        )
        .bind(params.id.0.to_string())
        .bind(&params.title)
        .bind(&params.username)
        .bind(&params.secret.nonce)
        .bind(&params.secret.ciphertext)
        .bind(&params.url)
        .bind(&params.notes)
        .bind(params.group_id.0.to_string())
        .bind(actor.0.to_string())
        .bind(actor.0.to_string())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_unique)?;

        let new_values = snapshot(
            &params.title,
            params.username.as_deref(),
            params.url.as_deref(),
            params.notes.as_deref(),
            &params.group_id,
        );
        insert_audit_row(
            &mut tx,
            &params.id,
            actor,
            AuditAction::Create,
            None,
            Some(&new_values),
        )
        .await?;

        tx.commit().await.map_err(backend_err)?;

        self.fetch_credential(&params.id, None, false).await
    }

    async fn get_credential(
        &self,
        credential_id: &CredentialId,
        viewer: Option<UserId>,
    ) -> Result<Credential, StoreError> {
        self.fetch_credential(credential_id, viewer.as_ref(), false)
            .await
    }

    async fn get_credential_any(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Credential, StoreError> {
        self.fetch_credential(credential_id, None, true).await
    }

    async fn get_secret(&self, credential_id: &CredentialId) -> Result<SecretRow, StoreError> {
        let row = sqlx::query_as::<_, (Vec<u8>, Vec<u8>)>(
            "SELECT secret_nonce, secret_ciphertext
             FROM credentials WHERE id = ? AND is_active = 1",
        )
        .bind(credential_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;

        match row {
            None => Err(StoreError::NotFound),
            Some((nonce, ciphertext)) => Ok(SecretRow { nonce, ciphertext }),
        }
    }

    async fn list_credentials_by_group(
        &self,
        group_id: &GroupId,
        viewer: Option<UserId>,
    ) -> Result<Vec<CredentialListing>, StoreError> {
        let mut sql = format!("{CREDENTIAL_SELECT} WHERE c.group_id = ? AND c.is_active = 1");
        if viewer.is_some() {
            sql.push_str(VIEW_GATE);
        }
        sql.push_str(" ORDER BY c.title");

        let mut query = sqlx::query_as::<_, CredentialRow>(&sql).bind(group_id.0.to_string());
        if let Some(viewer) = &viewer {
            query = query.bind(viewer.0.to_string());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(backend_err)?;

        rows.into_iter().map(CredentialRow::into_listing).collect()
    }

    async fn list_credentials_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AccessibleCredential>, StoreError> {
        let sql = "SELECT c.id, c.title, c.username, c.url, c.notes, c.group_id,
                    c.is_active, c.created_by, c.last_modified_by, c.created_at, c.updated_at,
                    g.name AS group_name, g.color AS group_color,
                    u1.name AS created_by_name, u2.name AS last_modified_by_name,
                    gg.can_view, gg.can_edit, gg.can_delete
             FROM credentials c
             INNER JOIN credential_groups g ON c.group_id = g.id
             INNER JOIN group_grants gg ON gg.group_id = c.group_id AND gg.user_id = ?
             LEFT JOIN users u1 ON c.created_by = u1.id
             LEFT JOIN users u2 ON c.last_modified_by = u2.id
             WHERE gg.can_view = 1 AND c.is_active = 1 AND g.is_active = 1
             ORDER BY g.name, c.title";
        let rows = sqlx::query_as::<_, AccessibleRow>(sql)
            .bind(user_id.0.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?;

        rows.into_iter()
            .map(|row| {
                Ok(AccessibleCredential {
                    listing: row.credential.into_listing()?,
                    can_view: row.can_view,
                    can_edit: row.can_edit,
                    can_delete: row.can_delete,
                })
            })
            .collect()
    }

    async fn search_credentials(
        &self,
        filter: &CredentialFilter,
        viewer: Option<UserId>,
    ) -> Result<Vec<CredentialListing>, StoreError> {
        let mut sql = format!("{CREDENTIAL_SELECT} WHERE c.is_active = 1");
        if filter.search.is_some() {
            sql.push_str(" AND (c.title LIKE ? OR c.username LIKE ? OR c.url LIKE ?)");
        }
        if filter.group_id.is_some() {
            sql.push_str(" AND c.group_id = ?");
        }
        if viewer.is_some() {
            sql.push_str(VIEW_GATE);
        }
        sql.push_str(" ORDER BY g.name, c.title");

        let mut query = sqlx::query_as::<_, CredentialRow>(&sql);
        if let Some(term) = &filter.search {
            let pattern = format!("%{}%", term);
            query = query
                .bind(pattern.clone())
                .bind(pattern.clone())
                .bind(pattern);
        }
        if let Some(group_id) = &filter.group_id {
            query = query.bind(group_id.0.to_string());
        }
        if let Some(viewer) = &viewer {
            query = query.bind(viewer.0.to_string());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(backend_err)?;

        rows.into_iter().map(CredentialRow::into_listing).collect()
    }

    async fn update_credential(
        &self,
        credential_id: &CredentialId,
        params: &UpdateCredentialParams,
        actor: &UserId,
    ) -> Result<Credential, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;

        // pre-image read and write share the transaction
        let pre = sqlx::query_as::<_, SnapshotRow>(
            "SELECT title, username, url, notes, group_id
             FROM credentials WHERE id = ? AND is_active = 1",
        )
        .bind(credential_id.0.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend_err)?
        .ok_or(StoreError::NotFound)?
        .into_snapshot()?;

        sqlx::query(
            "UPDATE credentials
             SET title = ?, username = ?, secret_nonce = ?, secret_ciphertext = ?,
                 url = ?, notes = ?, group_id = ?, last_modified_by = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&params.title)
        .bind(&params.username)
        .bind(&params.secret.nonce)
        .bind(&params.secret.ciphertext)
        .bind(&params.url)
        .bind(&params.notes)
        .bind(params.group_id.0.to_string())
        .bind(actor.0.to_string())
        .bind(Utc::now())
        .bind(credential_id.0.to_string())
        .execute(&mut *tx)
        .await
        .map_err(backend_err)?;

        let new_values = snapshot(
            &params.title,
            params.username.as_deref(),
            params.url.as_deref(),
            params.notes.as_deref(),
            &params.group_id,
        );
        insert_audit_row(
            &mut tx,
            credential_id,
            actor,
            AuditAction::Update,
            Some(&pre),
            Some(&new_values),
        )
        .await?;

        tx.commit().await.map_err(backend_err)?;

        self.fetch_credential(credential_id, None, false).await
    }

    async fn deactivate_credential(
        &self,
        credential_id: &CredentialId,
        actor: &UserId,
    ) -> Result<Credential, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;

        let pre = sqlx::query_as::<_, SnapshotRow>(
            "SELECT title, username, url, notes, group_id
             FROM credentials WHERE id = ? AND is_active = 1",
        )
        .bind(credential_id.0.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend_err)?
        .ok_or(StoreError::NotFound)?
        .into_snapshot()?;

        sqlx::query(
            "UPDATE credentials SET is_active = 0, last_modified_by = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(actor.0.to_string())
        .bind(Utc::now())
        .bind(credential_id.0.to_string())
        .execute(&mut *tx)
        .await
        .map_err(backend_err)?;

        insert_audit_row(
            &mut tx,
            credential_id,
            actor,
            AuditAction::Delete,
            Some(&pre),
            None,
        )
        .await?;

        tx.commit().await.map_err(backend_err)?;

        self.fetch_credential(credential_id, None, true).await
    }

    async fn credential_stats(&self) -> Result<CredentialStats, StoreError> {
        let (total, active, inactive, groups_with_credentials) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN is_active = 1 THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN is_active = 0 THEN 1 ELSE 0 END), 0),
                        COUNT(DISTINCT group_id)
                 FROM credentials",
            )
            .fetch_one(&self.pool)
            .await
            .map_err(backend_err)?;

        Ok(CredentialStats {
            total,
            active,
            inactive,
            groups_with_credentials,
        })
    }
}

#[async_trait::async_trait]
impl AuditLog for SqliteStore {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditLogError> {
        let old_json = entry
            .old_values
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AuditLogError::Database(e.to_string()))?;
        let new_json = entry
            .new_values
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AuditLogError::Database(e.to_string()))?;

        sqlx::query(
            "INSERT INTO audit_log(id, credential_id, user_id, action, old_values, new_values,
                                   ip_address, user_agent, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.id.0.to_string())
        .bind(entry.credential_id.to_string())
        .bind(entry.user_id.to_string())
        .bind(entry.action.to_string())
        .bind(old_json)
        .bind(new_json)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AuditLogError::Database(e.to_string()))?;
        Ok(())
    }

    async fn for_credential(
        &self,
        credential_id: &CredentialId,
        limit: u32,
    ) -> Result<Vec<AuditEntryWithActor>, AuditLogError> {
        let rows = sqlx::query_as::<
            _,
            (
                String,
                String,
                String,
                String,
                Option<String>,
                Option<String>,
                Option<String>,
                Option<String>,
                DateTime<Utc>,
                Option<String>,
                Option<String>,
            ),
        >(
            "SELECT a.id, a.credential_id, a.user_id, a.action, a.old_values, a.new_values,
                    a.ip_address, a.user_agent, a.created_at,
                    u.name AS user_name, u.email AS user_email
             FROM audit_log a
             LEFT JOIN users u ON a.user_id = u.id
             WHERE a.credential_id = ?
             ORDER BY a.created_at DESC, a.id DESC
             LIMIT ?",
        )
        .bind(credential_id.0.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuditLogError::Database(e.to_string()))?;

        rows.into_iter()
            .map(
                |(
                    id,
                    credential_id,
                    user_id,
                    action,
                    old_values,
                    new_values,
                    ip_address,
                    user_agent,
                    created_at,
                    user_name,
                    user_email,
                )| {
                    let parse = |s: &str| {
                        Uuid::try_parse(s).map_err(|e| AuditLogError::Database(e.to_string()))
                    };
                    let decode = |json: Option<String>| {
                        json.map(|j| serde_json::from_str(&j))
                            .transpose()
                            .map_err(|e| AuditLogError::Database(e.to_string()))
                    };
                    Ok(AuditEntryWithActor {
                        entry: AuditEntry {
                            id: AuditEntryId(parse(&id)?),
                            credential_id: parse(&credential_id)?,
                            user_id: parse(&user_id)?,
                            action: action
                                .parse()
                                .map_err(|e: String| AuditLogError::Database(e))?,
                            old_values: decode(old_values)?,
                            new_values: decode(new_values)?,
                            ip_address,
                            user_agent,
                            created_at,
                        },
                        user_name,
                        user_email,
                    })
                },
            )
            .collect()
    }
}
