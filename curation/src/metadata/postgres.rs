//! [`MetadataStore`] over a DSpace 6 PostgreSQL database.

use async_trait::async_trait;
use sqlx::{Connection, PgConnection};
use tracing::debug;
use uuid::Uuid;

use super::{MetadataStore, Mutation};
use crate::config::DatabaseConfig;
use crate::error::{DatabaseError, DatabaseResult};

const SELECT_ITEMS: &str = "SELECT dspace_object_id FROM metadatavalue \
     WHERE dspace_object_id IN (SELECT uuid FROM item) AND metadata_field_id=$1 AND text_value=$2";

const UPDATE_VALUES: &str = "UPDATE metadatavalue SET text_value=$1 \
     WHERE dspace_object_id IN (SELECT uuid FROM item) AND metadata_field_id=$2 AND text_value=$3";

const DELETE_VALUES: &str = "DELETE FROM metadatavalue \
     WHERE dspace_object_id IN (SELECT uuid FROM item) AND metadata_field_id=$1 AND text_value=$2";

const TOUCH_ITEM: &str = "UPDATE item SET last_modified=NOW() WHERE uuid=$1";

/// One open connection, used for the whole run.
pub struct PgMetadataStore {
    conn: PgConnection,
}

impl PgMetadataStore {
    pub async fn connect(config: &DatabaseConfig) -> DatabaseResult<Self> {
        let conn = PgConnection::connect_with(&config.connect_options())
            .await
            .map_err(DatabaseError::Connect)?;
        Ok(Self { conn })
    }
}

async fn matching_items(
    conn: &mut PgConnection,
    field_id: i32,
    value: &str,
) -> DatabaseResult<Vec<Uuid>> {
    let items = sqlx::query_scalar::<_, Uuid>(SELECT_ITEMS)
        .bind(field_id)
        .bind(value)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

async fn touch_items(conn: &mut PgConnection, mutation: &Mutation) -> DatabaseResult<()> {
    for item in mutation.distinct_items() {
        sqlx::query(TOUCH_ITEM).bind(item).execute(&mut *conn).await?;
    }
    Ok(())
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn replace_values(
        &mut self,
        field_id: i32,
        from: &str,
        to: &str,
        dry_run: bool,
    ) -> DatabaseResult<Mutation> {
        let mut tx = self.conn.begin().await?;

        let mut mutation = Mutation {
            items: matching_items(&mut tx, field_id, from).await?,
            ..Default::default()
        };
        if dry_run || mutation.items.is_empty() {
            tx.rollback().await?;
            return Ok(mutation);
        }

        mutation.affected = sqlx::query(UPDATE_VALUES)
            .bind(to)
            .bind(field_id)
            .bind(from)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        touch_items(&mut tx, &mutation).await?;

        tx.commit().await?;
        mutation.applied = true;
        debug!(
            "Replaced {} values in {} items",
            mutation.affected,
            mutation.distinct_items().len()
        );
        Ok(mutation)
    }

    async fn delete_values(
        &mut self,
        field_id: i32,
        value: &str,
        dry_run: bool,
    ) -> DatabaseResult<Mutation> {
        let mut tx = self.conn.begin().await?;

        let mut mutation = Mutation {
            items: matching_items(&mut tx, field_id, value).await?,
            ..Default::default()
        };
        if dry_run || mutation.items.is_empty() {
            tx.rollback().await?;
            return Ok(mutation);
        }

        mutation.affected = sqlx::query(DELETE_VALUES)
            .bind(field_id)
            .bind(value)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        touch_items(&mut tx, &mutation).await?;

        tx.commit().await?;
        mutation.applied = true;
        debug!(
            "Deleted {} values from {} items",
            mutation.affected,
            mutation.distinct_items().len()
        );
        Ok(mutation)
    }

    /// Close the connection cleanly.
    async fn close(self) -> DatabaseResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELD: i32 = 57;

    // Temporary tables shadow the real ones for this connection only.
    const SCHEMA: &str = "
        CREATE TEMP TABLE item (uuid uuid PRIMARY KEY, last_modified timestamptz NOT NULL);
        CREATE TEMP TABLE metadatavalue (
            metadata_value_id serial PRIMARY KEY,
            dspace_object_id uuid,
            metadata_field_id integer,
            text_value text
        );";

    async fn seeded_store(url: &str) -> PgMetadataStore {
        let mut conn = PgConnection::connect(url).await.unwrap();
        sqlx::raw_sql(SCHEMA).execute(&mut conn).await.unwrap();

        for id in 1..=3 {
            sqlx::query("INSERT INTO item VALUES ($1, '2000-01-01')")
                .bind(Uuid::from_u128(id))
                .execute(&mut conn)
                .await
                .unwrap();
        }
        let values = [
            (1, FIELD, "Orth, A."),
            (1, FIELD, "Orth, A."),
            (2, FIELD, "Orth, A."),
            (3, FIELD, "Other"),
            (3, FIELD + 1, "Orth, A."),
        ];
        for (id, field, text) in values {
            sqlx::query(
                "INSERT INTO metadatavalue (dspace_object_id, metadata_field_id, text_value) \
                 VALUES ($1, $2, $3)",
            )
            .bind(Uuid::from_u128(id))
            .bind(field)
            .bind(text)
            .execute(&mut conn)
            .await
            .unwrap();
        }

        PgMetadataStore { conn }
    }

    async fn texts(store: &mut PgMetadataStore) -> Vec<String> {
        let sql = "SELECT text_value FROM metadatavalue ORDER BY metadata_value_id";
        sqlx::query_scalar::<_, String>(sql)
            .fetch_all(&mut store.conn)
            .await
            .unwrap()
    }

    async fn touched_items(store: &mut PgMetadataStore) -> Vec<Uuid> {
        let sql = "SELECT uuid FROM item WHERE last_modified > '2000-01-01' ORDER BY uuid";
        sqlx::query_scalar::<_, Uuid>(sql)
            .fetch_all(&mut store.conn)
            .await
            .unwrap()
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL server in DSPACE_TEST_DATABASE_URL"]
    async fn test_statements_against_postgres() {
        let Ok(url) = std::env::var("DSPACE_TEST_DATABASE_URL") else {
            return;
        };
        let mut store = seeded_store(&url).await;
        let seeded = texts(&mut store).await;

        let dry = store.replace_values(FIELD, "Orth, A.", "Orth, Alan", true).await.unwrap();
        assert_eq!(dry.matched(), 3);
        assert_eq!(dry.affected, 0);
        assert!(!dry.applied);
        assert_eq!(texts(&mut store).await, seeded);
        assert!(touched_items(&mut store).await.is_empty());

        let fixed = store.replace_values(FIELD, "Orth, A.", "Orth, Alan", false).await.unwrap();
        assert_eq!(fixed.affected, 3);
        assert!(fixed.applied);
        assert_eq!(
            texts(&mut store).await,
            vec!["Orth, Alan", "Orth, Alan", "Orth, Alan", "Other", "Orth, A."]
        );
        assert_eq!(
            touched_items(&mut store).await,
            vec![Uuid::from_u128(1), Uuid::from_u128(2)]
        );

        let again = store.replace_values(FIELD, "Orth, A.", "Orth, Alan", false).await.unwrap();
        assert_eq!(again.matched(), 0);
        assert_eq!(again.affected, 0);
        assert!(!again.applied);

        let dry = store.delete_values(FIELD, "Orth, Alan", true).await.unwrap();
        assert_eq!(dry.matched(), 3);
        assert_eq!(texts(&mut store).await.len(), 5);

        let deleted = store.delete_values(FIELD, "Orth, Alan", false).await.unwrap();
        assert_eq!(deleted.affected, 3);
        assert_eq!(texts(&mut store).await, vec!["Other", "Orth, A."]);

        store.close().await.unwrap();
    }
}
