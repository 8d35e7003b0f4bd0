//! PostgreSQL share store.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use nimbus_core::error::{AppError, ErrorKind};
use nimbus_core::result::AppResult;
use nimbus_entity::share::{NewShareRow, ShareChanges, ShareFilter, ShareRow, UserFilter};

use crate::traits::ShareStore;

/// [`ShareStore`] backed by the `share` table.
#[derive(Debug, Clone)]
pub struct PgShareStore {
    pool: PgPool,
}

impl PgShareStore {
    /// Create a new share store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Append the `WHERE` clause for a filter.
fn push_where(qb: &mut QueryBuilder<'_, Postgres>, filter: &ShareFilter) {
    qb.push(" WHERE TRUE");
    if let Some(id) = filter.id {
        qb.push(" AND id = ").push_bind(id);
    }
    if !filter.share_types.is_empty() {
        let codes: Vec<i16> = filter.share_types.iter().map(|t| t.code()).collect();
        qb.push(" AND share_type = ANY(").push_bind(codes).push(")");
    }
    if let Some(with) = &filter.share_with {
        qb.push(" AND share_with = ").push_bind(with.clone());
    }
    if let Some(list) = &filter.share_with_in {
        qb.push(" AND share_with = ANY(")
            .push_bind(list.clone())
            .push(")");
    }
    match &filter.user {
        Some(UserFilter::Owner(uid)) => {
            qb.push(" AND uid_owner = ").push_bind(uid.clone());
        }
        Some(UserFilter::Initiator(uid)) => {
            qb.push(" AND uid_initiator = ").push_bind(uid.clone());
        }
        Some(UserFilter::OwnerOrInitiator(uid)) => {
            qb.push(" AND (uid_owner = ")
                .push_bind(uid.clone())
                .push(" OR uid_initiator = ")
                .push_bind(uid.clone())
                .push(")");
        }
        None => {}
    }
    if let Some(parent) = filter.parent {
        qb.push(" AND parent = ").push_bind(parent);
    }
    if let Some(parents) = &filter.parent_in {
        qb.push(" AND parent = ANY(").push_bind(parents.clone()).push(")");
    }
    if let Some(file_source) = filter.file_source {
        qb.push(" AND file_source = ").push_bind(file_source);
    }
    if let Some(sources) = &filter.file_source_in {
        qb.push(" AND file_source = ANY(")
            .push_bind(sources.clone())
            .push(")");
    }
    if let Some(token) = &filter.token {
        qb.push(" AND token = ").push_bind(token.clone());
    }
    if filter.nonzero_permissions {
        qb.push(" AND permissions <> 0");
    }
}

/// Append the `SET` list for a change set.
fn push_set(qb: &mut QueryBuilder<'_, Postgres>, changes: &ShareChanges) {
    let mut set = qb.separated(", ");
    macro_rules! assign {
        ($field:ident) => {
            if let Some(value) = &changes.$field {
                set.push(concat!(stringify!($field), " = "));
                set.push_bind_unseparated(value.clone());
            }
        };
    }
    assign!(share_with);
    assign!(uid_owner);
    assign!(uid_initiator);
    assign!(item_source);
    assign!(file_source);
    assign!(file_target);
    assign!(permissions);
    assign!(attributes);
    assign!(accepted);
    assign!(expiration);
    assign!(note);
    assign!(label);
    assign!(password);
    assign!(password_by_talk);
    assign!(token);
    assign!(hide_download);
    assign!(reminder_sent);
    assign!(mail_send);
}

#[async_trait]
impl ShareStore for PgShareStore {
    async fn insert(&self, row: NewShareRow) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO share (share_type, share_with, password, password_by_talk, uid_owner, \
             uid_initiator, parent, item_type, item_source, file_source, file_target, permissions, \
             stime, accepted, expiration, token, mail_send, note, label, hide_download, \
             reminder_sent, attributes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19, $20, $21, $22) RETURNING id",
        )
        .bind(row.share_type)
        .bind(row.share_with)
        .bind(row.password)
        .bind(row.password_by_talk)
        .bind(row.uid_owner)
        .bind(row.uid_initiator)
        .bind(row.parent)
        .bind(row.item_type)
        .bind(row.item_source)
        .bind(row.file_source)
        .bind(row.file_target)
        .bind(row.permissions)
        .bind(row.stime)
        .bind(row.accepted)
        .bind(row.expiration)
        .bind(row.token)
        .bind(row.mail_send)
        .bind(row.note)
        .bind(row.label)
        .bind(row.hide_download)
        .bind(row.reminder_sent)
        .bind(row.attributes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert share", e))
    }

    async fn find(&self, filter: &ShareFilter) -> AppResult<Vec<ShareRow>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM share");
        push_where(&mut qb, filter);
        qb.push(" ORDER BY id ASC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }
        if let Some(offset) = filter.offset {
            qb.push(" OFFSET ").push_bind(offset);
        }

        qb.build_query_as::<ShareRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to query shares", e))
    }

    async fn update(&self, filter: &ShareFilter, changes: &ShareChanges) -> AppResult<u64> {
        if changes.is_empty() {
            return Ok(0);
        }
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE share SET ");
        push_set(&mut qb, changes);
        push_where(&mut qb, filter);

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update shares", e))?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, filter: &ShareFilter) -> AppResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM share");
        push_where(&mut qb, filter);

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete shares", e))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_entity::share::ShareType;

    #[test]
    fn test_where_clause_shape() {
        let filter = ShareFilter::new()
            .share_types(&[ShareType::Group, ShareType::UserGroup])
            .user(UserFilter::OwnerOrInitiator("alice".into()))
            .parent_in(vec![1, 2])
            .nonzero_permissions();
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM share");
        push_where(&mut qb, &filter);
        assert_eq!(
            qb.sql(),
            "SELECT * FROM share WHERE TRUE AND share_type = ANY($1) AND (uid_owner = $2 OR \
             uid_initiator = $3) AND parent = ANY($4) AND permissions <> 0"
        );
    }

    #[test]
    fn test_set_clause_shape() {
        let changes = ShareChanges {
            note: Some(None),
            ..ShareChanges::new().permissions(0).file_target("/x")
        };
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE share SET ");
        push_set(&mut qb, &changes);
        push_where(&mut qb, &ShareFilter::new().id(4));
        assert_eq!(
            qb.sql(),
            "UPDATE share SET file_target = $1, permissions = $2, note = $3 WHERE TRUE AND id = $4"
        );
    }
}
