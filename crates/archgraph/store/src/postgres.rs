//! PostgreSQL backend.
//!
//! Every version of every row lives in the same table; partial unique indexes
//! over `valid_to IS NULL` enforce the single-current invariants, and each
//! [`WriteBatch`] runs inside one transaction.

use crate::batch::{Mutation, WriteBatch};
use crate::query::{NodeQuery, RelationshipQuery};
use crate::traits::GraphBackend;
use crate::{StorageError, StorageResult};
use archgraph_types::{
    AccessType, LogicalId, Node, NodeAttributes, NodeId, NodeKind, Relationship, RelationshipId,
    RelationshipProps, Temporal,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{PgConnection, Postgres, QueryBuilder, Row};
use uuid::Uuid;

const NODE_COLUMNS: &str = "id, logical_id, version, node_type, name, description, status, tags, \
     created_by, kind, valid_from, valid_to, updated_at";

const RELATIONSHIP_COLUMNS: &str =
    "id, rel_type, source_id, target_id, valid_from, valid_to, created_by, notes, access_type";

/// PostgreSQL-backed graph storage.
#[derive(Clone)]
pub struct PostgresGraphBackend {
    pool: PgPool,
}

impl PostgresGraphBackend {
    /// Connect to PostgreSQL and initialize required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        Self::from_pool(pool).await
    }

    /// Create backend from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS archgraph_nodes (
                id UUID PRIMARY KEY,
                logical_id UUID NOT NULL,
                version BIGINT NOT NULL,
                node_type TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL,
                tags TEXT[] NOT NULL,
                created_by TEXT NOT NULL,
                kind JSONB NOT NULL,
                valid_from TIMESTAMPTZ NOT NULL,
                valid_to TIMESTAMPTZ,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS archgraph_relationships (
                id UUID PRIMARY KEY,
                rel_type TEXT NOT NULL,
                source_id UUID NOT NULL,
                target_id UUID NOT NULL,
                valid_from TIMESTAMPTZ NOT NULL,
                valid_to TIMESTAMPTZ,
                created_by TEXT NOT NULL,
                notes TEXT,
                access_type TEXT
            )
            "#,
            "CREATE INDEX IF NOT EXISTS archgraph_nodes_valid_to ON archgraph_nodes (valid_to)",
            r#"
            CREATE INDEX IF NOT EXISTS archgraph_nodes_logical
                ON archgraph_nodes (logical_id, version)
            "#,
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS archgraph_nodes_current_logical
                ON archgraph_nodes (logical_id) WHERE valid_to IS NULL
            "#,
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS archgraph_nodes_current_name
                ON archgraph_nodes (node_type, name) WHERE valid_to IS NULL
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS archgraph_relationships_valid_to
                ON archgraph_relationships (valid_to)
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS archgraph_relationships_source
                ON archgraph_relationships (source_id)
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS archgraph_relationships_target
                ON archgraph_relationships (target_id)
            "#,
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl GraphBackend for PostgresGraphBackend {
    async fn node(&self, id: &NodeId) -> StorageResult<Option<Node>> {
        let sql = format!("SELECT {NODE_COLUMNS} FROM archgraph_nodes WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        row.map(node_from_row).transpose()
    }

    async fn nodes(&self, query: &NodeQuery) -> StorageResult<Vec<Node>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {NODE_COLUMNS} FROM archgraph_nodes WHERE TRUE"
        ));
        push_node_filters(&mut qb, query);
        qb.push(r#" ORDER BY name COLLATE "C", version DESC, id"#);
        if let Some(window) = query.window {
            if window.limit > 0 {
                qb.push(" LIMIT ").push_bind(to_i64(window.limit)?);
            }
            qb.push(" OFFSET ").push_bind(to_i64(window.offset)?);
        }

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter().map(node_from_row).collect()
    }

    async fn count_nodes(&self, query: &NodeQuery) -> StorageResult<usize> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM archgraph_nodes WHERE TRUE");
        push_node_filters(&mut qb, query);
        let row = qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        usize::try_from(count).map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn relationship(&self, id: &RelationshipId) -> StorageResult<Option<Relationship>> {
        let sql =
            format!("SELECT {RELATIONSHIP_COLUMNS} FROM archgraph_relationships WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        row.map(relationship_from_row).transpose()
    }

    async fn relationships(&self, query: &RelationshipQuery) -> StorageResult<Vec<Relationship>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM archgraph_relationships WHERE TRUE"
        ));
        if let Some(scope) = query.scope {
            push_scope(&mut qb, scope);
        }
        if let Some(ids) = &query.ids {
            let ids: Vec<Uuid> = ids.iter().map(|id| id.0).collect();
            qb.push(" AND id = ANY(").push_bind(ids).push(")");
        }
        if let Some(touching) = &query.touching {
            let ids: Vec<Uuid> = touching.iter().map(|id| id.0).collect();
            let (out, inc) = (query.direction.includes_out(), query.direction.includes_in());
            qb.push(" AND (FALSE");
            if out {
                qb.push(" OR source_id = ANY(").push_bind(ids.clone()).push(")");
            }
            if inc {
                qb.push(" OR target_id = ANY(").push_bind(ids).push(")");
            }
            qb.push(")");
        }
        if let Some(types) = &query.rel_types {
            let types: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
            qb.push(" AND rel_type = ANY(").push_bind(types).push(")");
        }
        qb.push(" ORDER BY valid_from, id");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter().map(relationship_from_row).collect()
    }

    async fn apply(&self, batch: WriteBatch) -> StorageResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        // Dropping `tx` on an early return rolls the whole batch back.
        for mutation in batch.into_mutations() {
            apply_mutation(&mut *tx, mutation).await?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))
    }
}

async fn apply_mutation(conn: &mut PgConnection, mutation: Mutation) -> StorageResult<()> {
    match mutation {
        Mutation::InsertNode(node) => {
            let kind = serde_json::to_value(&node.attributes.kind)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            let tags: Vec<String> = node.tags().iter().cloned().collect();
            let sql = format!(
                "INSERT INTO archgraph_nodes ({NODE_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
            );
            sqlx::query(&sql)
                .bind(node.id.0)
                .bind(node.logical_id.0)
                .bind(i64::from(node.version))
                .bind(node.node_type().as_str())
                .bind(node.name())
                .bind(node.description())
                .bind(node.status().as_str())
                .bind(tags)
                .bind(node.attributes.created_by.as_str())
                .bind(kind)
                .bind(node.valid_from)
                .bind(node.valid_to)
                .bind(node.updated_at)
                .execute(&mut *conn)
                .await
                .map_err(map_sqlx_conflict)?;
        }
        Mutation::CloseNode { id, at } => {
            close_row(conn, "archgraph_nodes", id.0, at, &id.to_string()).await?;
        }
        Mutation::RequireCurrentNode(id) => {
            let row = sqlx::query(
                "SELECT id FROM archgraph_nodes WHERE id = $1 AND valid_to IS NULL FOR SHARE",
            )
            .bind(id.0)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
            if row.is_none() {
                return Err(StorageError::Conflict(format!("{} is not current", id)));
            }
        }
        Mutation::RequireNoCurrentEdges(id) => {
            // Row locks make a racing edge insert either land before this
            // check or wait behind the close of the node row.
            let rows = sqlx::query(
                "SELECT id FROM archgraph_relationships \
                 WHERE (source_id = $1 OR target_id = $1) AND valid_to IS NULL FOR UPDATE",
            )
            .bind(id.0)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
            if !rows.is_empty() {
                return Err(StorageError::Conflict(format!(
                    "{} current relationships still touch {}",
                    rows.len(),
                    id
                )));
            }
        }
        Mutation::InsertRelationship(rel) => {
            let sql = format!(
                "INSERT INTO archgraph_relationships ({RELATIONSHIP_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
            );
            sqlx::query(&sql)
                .bind(rel.id.0)
                .bind(rel.rel_type.as_str())
                .bind(rel.source_id.0)
                .bind(rel.target_id.0)
                .bind(rel.valid_from)
                .bind(rel.valid_to)
                .bind(rel.props.created_by.as_str())
                .bind(rel.props.notes.as_deref())
                .bind(rel.props.access_type.map(|a| a.as_str()))
                .execute(&mut *conn)
                .await
                .map_err(map_sqlx_conflict)?;
        }
        Mutation::CloseRelationship { id, at } => {
            close_row(conn, "archgraph_relationships", id.0, at, &id.to_string()).await?;
        }
    }
    Ok(())
}

async fn close_row(
    conn: &mut PgConnection,
    table: &str,
    id: Uuid,
    at: DateTime<Utc>,
    label: &str,
) -> StorageResult<()> {
    let sql = format!("UPDATE {table} SET valid_to = $2 WHERE id = $1 AND valid_to IS NULL");
    let result = sqlx::query(&sql)
        .bind(id)
        .bind(at)
        .execute(&mut *conn)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    if result.rows_affected() == 0 {
        return Err(StorageError::Conflict(format!("{} is not current", label)));
    }
    Ok(())
}

fn push_scope(qb: &mut QueryBuilder<'_, Postgres>, scope: Temporal) {
    match scope {
        Temporal::Current => {
            qb.push(" AND valid_to IS NULL");
        }
        Temporal::AsOf(at) => {
            qb.push(" AND valid_from <= ")
                .push_bind(at)
                .push(" AND (valid_to IS NULL OR valid_to > ")
                .push_bind(at)
                .push(")");
        }
    }
}

fn push_node_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &NodeQuery) {
    if let Some(scope) = query.scope {
        push_scope(qb, scope);
    }
    if let Some(ids) = &query.ids {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.0).collect();
        qb.push(" AND id = ANY(").push_bind(ids).push(")");
    }
    if let Some(logical_id) = query.logical_id {
        qb.push(" AND logical_id = ").push_bind(logical_id.0);
    }
    if let Some(types) = &query.node_types {
        let types: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
        qb.push(" AND node_type = ANY(").push_bind(types).push(")");
    }
    if let Some(name) = &query.name {
        qb.push(" AND name = ").push_bind(name.clone());
    }
    if let Some(layer) = query.layer {
        let types: Vec<String> = archgraph_types::NodeType::ALL
            .iter()
            .filter(|t| t.layer() == layer)
            .map(|t| t.as_str().to_string())
            .collect();
        qb.push(" AND node_type = ANY(").push_bind(types).push(")");
    }
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if !query.tags_any.is_empty() {
        qb.push(" AND tags && ").push_bind(query.tags_any.clone());
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn node_from_row(row: PgRow) -> StorageResult<Node> {
    let version: i64 = row
        .try_get("version")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let kind_json: serde_json::Value = row
        .try_get("kind")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let kind: NodeKind = serde_json::from_value(kind_json)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    let tags: Vec<String> = row
        .try_get("tags")
        .map_err(|e| StorageError::Backend(e.to_string()))?;

    Ok(Node {
        id: NodeId(get_uuid(&row, "id")?),
        logical_id: LogicalId(get_uuid(&row, "logical_id")?),
        version: u32::try_from(version).map_err(|e| StorageError::Serialization(e.to_string()))?,
        valid_from: row
            .try_get("valid_from")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        valid_to: row
            .try_get("valid_to")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        attributes: NodeAttributes {
            name: row
                .try_get("name")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
            description: row
                .try_get("description")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
            status: status.parse().map_err(|e: archgraph_types::SchemaError| {
                StorageError::Serialization(e.to_string())
            })?,
            tags: tags.into_iter().collect(),
            created_by: row
                .try_get("created_by")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
            kind,
        },
    })
}

fn relationship_from_row(row: PgRow) -> StorageResult<Relationship> {
    let rel_type: String = row
        .try_get("rel_type")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let access_type: Option<String> = row
        .try_get("access_type")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let access_type = access_type
        .map(|s| s.parse::<AccessType>())
        .transpose()
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

    Ok(Relationship {
        id: RelationshipId(get_uuid(&row, "id")?),
        rel_type: rel_type
            .parse()
            .map_err(|e: archgraph_types::SchemaError| StorageError::Serialization(e.to_string()))?,
        source_id: NodeId(get_uuid(&row, "source_id")?),
        target_id: NodeId(get_uuid(&row, "target_id")?),
        valid_from: row
            .try_get("valid_from")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        valid_to: row
            .try_get("valid_to")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        props: RelationshipProps {
            created_by: row
                .try_get("created_by")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
            notes: row
                .try_get("notes")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
            access_type,
        },
    })
}

fn get_uuid(row: &PgRow, column: &str) -> StorageResult<Uuid> {
    row.try_get(column)
        .map_err(|e| StorageError::Backend(e.to_string()))
}

fn map_sqlx_conflict(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return StorageError::Conflict(db_err.message().to_string());
        }
    }
    StorageError::Backend(err.to_string())
}

fn to_i64(value: usize) -> StorageResult<i64> {
    i64::try_from(value).map_err(|_| StorageError::Backend("window value too large".to_string()))
}
