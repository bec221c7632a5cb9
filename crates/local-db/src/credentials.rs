//! Access tokens for repository hosts.

use anyhow::Result;
use rusqlite::{OptionalExtension, params, params_from_iter};
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};

use crate::SyncDb;
use crate::tables::ServiceAuthCredentials;
use crate::values::{Built, values_to_sql};

/// Credential type of a GitHub personal access token.
pub const GITHUB_PAT: &str = "GITHUB_PAT";

/// Newest credential of the given type.
pub fn latest_credential(kind: &str) -> Built {
    Query::select()
        .column(ServiceAuthCredentials::Credentials)
        .from(ServiceAuthCredentials::Table)
        .and_where(Expr::col(ServiceAuthCredentials::Type).eq(kind))
        .order_by(ServiceAuthCredentials::CreatedAt, Order::Desc)
        .order_by(ServiceAuthCredentials::Id, Order::Desc)
        .limit(1)
        .build(SqliteQueryBuilder)
}

impl SyncDb {
    pub fn add_credential(&self, kind: &str, credentials: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO service_auth_credentials (type, credentials) VALUES (?1, ?2)",
            params![kind, credentials],
        )?;
        Ok(())
    }

    /// The most recently stored credential of `kind`, if any.
    pub fn latest_credential(&self, kind: &str) -> Result<Option<String>> {
        let (sql, values) = latest_credential(kind);
        let credential = self
            .conn()
            .query_row(&sql, params_from_iter(values_to_sql(&values)?), |row| {
                row.get(0)
            })
            .optional()?;
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_db;

    #[test]
    fn test_latest_credential() {
        let (_dir, db) = test_db();
        assert_eq!(db.latest_credential(GITHUB_PAT).unwrap(), None);

        db.add_credential(GITHUB_PAT, "old-token").unwrap();
        db.add_credential(GITHUB_PAT, "new-token").unwrap();
        db.add_credential("GITLAB_PAT", "other").unwrap();

        assert_eq!(
            db.latest_credential(GITHUB_PAT).unwrap().as_deref(),
            Some("new-token")
        );
    }
}
