//! # Postgres store
//!
//! Maps the `thread_nodes` / `node_likes` tables onto the domain ports.
//! Subtree and ancestor reads are single recursive CTEs; the like toggle is a
//! single upsert, so Postgres serializes concurrent flips on the same row.

use async_trait::async_trait;
use domains::{
    join_list, split_list, LikeRecord, LikeRepository, NodeId, Page, RepoError, ThreadNode,
    ThreadRepository, UserId,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

const NODE_COLUMNS: &str =
    "id, parent_id, author_id, author_name, title, body, created_at, tags, resource_links, visibility, deleted";

pub struct PgStore {
    pool: PgPool,
}

fn unavailable(err: sqlx::Error) -> RepoError {
    RepoError::Unavailable(err.to_string())
}

fn corrupt(err: sqlx::Error) -> RepoError {
    RepoError::Corrupt(err.to_string())
}

/// Rows imported from older data may carry the nil UUID on roots.
fn parent_from_column(raw: Option<Uuid>) -> Option<NodeId> {
    raw.filter(|id| !id.is_nil()).map(NodeId)
}

fn node_from_row(row: &PgRow) -> Result<ThreadNode, sqlx::Error> {
    let visibility: String = row.try_get("visibility")?;
    Ok(ThreadNode {
        id: NodeId(row.try_get("id")?),
        parent_id: parent_from_column(row.try_get("parent_id")?),
        author_id: UserId(row.try_get("author_id")?),
        author_name: row.try_get("author_name")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        created_at: row.try_get("created_at")?,
        tags: split_list(&row.try_get::<String, _>("tags")?),
        resource_links: split_list(&row.try_get::<String, _>("resource_links")?),
        visibility: visibility.parse().map_err(|e: String| sqlx::Error::Decode(e.into()))?,
        deleted: row.try_get("deleted")?,
    })
}

fn nodes_from_rows(rows: &[PgRow]) -> Result<Vec<ThreadNode>, RepoError> {
    rows.iter().map(|r| node_from_row(r).map_err(corrupt)).collect()
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool and applies the embedded migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, RepoError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(unavailable)?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| RepoError::Unavailable(e.to_string()))?;
        info!(max_connections, "postgres store ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl ThreadRepository for PgStore {
    async fn find_node(&self, id: NodeId) -> Result<Option<ThreadNode>, RepoError> {
        let row = sqlx::query(&format!("SELECT {NODE_COLUMNS} FROM thread_nodes WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        row.as_ref().map(node_from_row).transpose().map_err(corrupt)
    }

    /// Walks down from `root_id` in one statement. `UNION` (not `UNION ALL`)
    /// keeps a malformed cycle from looping forever.
    async fn load_subtree(&self, root_id: NodeId) -> Result<Vec<ThreadNode>, RepoError> {
        let sql = format!(
            "WITH RECURSIVE subtree(id) AS ( \
                 SELECT id FROM thread_nodes WHERE parent_id = $1 \
                 UNION \
                 SELECT n.id FROM thread_nodes n JOIN subtree s ON n.parent_id = s.id \
             ) \
             SELECT {NODE_COLUMNS} FROM thread_nodes WHERE id IN (SELECT id FROM subtree)"
        );
        let rows = sqlx::query(&sql)
            .bind(root_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        debug!(root = %root_id, count = rows.len(), "subtree loaded");
        nodes_from_rows(&rows)
    }

    /// Walks up from `id`, carrying the visited path so a parent cycle stops
    /// the recursion on its first repeat instead of looping.
    async fn ancestors(&self, id: NodeId) -> Result<Vec<ThreadNode>, RepoError> {
        let sql = format!(
            "WITH RECURSIVE chain(id, parent_id, depth, path, is_cycle) AS ( \
                 SELECT id, parent_id, 0, ARRAY[id], FALSE FROM thread_nodes WHERE id = $1 \
                 UNION ALL \
                 SELECT p.id, p.parent_id, c.depth + 1, c.path || p.id, p.id = ANY(c.path) \
                 FROM thread_nodes p JOIN chain c ON p.id = c.parent_id \
                 WHERE NOT c.is_cycle \
             ) \
             SELECT {cols}, c.is_cycle FROM thread_nodes t JOIN chain c ON t.id = c.id ORDER BY c.depth",
            cols = NODE_COLUMNS
                .split(", ")
                .map(|c| format!("t.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let rows = sqlx::query(&sql)
            .bind(id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        for row in &rows {
            if row.try_get::<bool, _>("is_cycle").map_err(corrupt)? {
                let through: Uuid = row.try_get("id").map_err(corrupt)?;
                return Err(RepoError::Corrupt(format!("parent cycle through {through}")));
            }
        }
        nodes_from_rows(&rows)
    }

    async fn insert_node(&self, node: &ThreadNode) -> Result<(), RepoError> {
        sqlx::query(&format!(
            "INSERT INTO thread_nodes ({NODE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(node.id.0)
        .bind(node.parent_id.map(|p| p.0))
        .bind(node.author_id.0)
        .bind(&node.author_name)
        .bind(&node.title)
        .bind(&node.body)
        .bind(node.created_at)
        .bind(join_list(&node.tags))
        .bind(join_list(&node.resource_links))
        .bind(node.visibility.as_str())
        .bind(node.deleted)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn mark_deleted(&self, id: NodeId) -> Result<bool, RepoError> {
        let result = sqlx::query("UPDATE thread_nodes SET deleted = TRUE WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_roots(&self, viewer: Option<UserId>, page: Page) -> Result<Vec<ThreadNode>, RepoError> {
        let rows = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM thread_nodes \
             WHERE parent_id IS NULL AND deleted = FALSE \
               AND (visibility = 'public' OR author_id = $1) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(viewer.map(|v| v.0))
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        nodes_from_rows(&rows)
    }
}

#[async_trait]
impl LikeRepository for PgStore {
    async fn likes_for(&self, node_ids: &[NodeId]) -> Result<Vec<LikeRecord>, RepoError> {
        let ids: Vec<Uuid> = node_ids.iter().map(|n| n.0).collect();
        let rows = sqlx::query("SELECT node_id, user_id, liked FROM node_likes WHERE node_id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        rows.iter()
            .map(|row| {
                Ok(LikeRecord {
                    node_id: NodeId(row.try_get("node_id")?),
                    user_id: UserId(row.try_get("user_id")?),
                    liked: row.try_get("liked")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(corrupt)
    }

    async fn toggle_like(&self, node_id: NodeId, user_id: UserId) -> Result<LikeRecord, RepoError> {
        let row = sqlx::query(
            "INSERT INTO node_likes (node_id, user_id, liked) VALUES ($1, $2, TRUE) \
             ON CONFLICT (node_id, user_id) DO UPDATE SET liked = NOT node_likes.liked \
             RETURNING liked",
        )
        .bind(node_id.0)
        .bind(user_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(LikeRecord {
            node_id,
            user_id,
            liked: row.try_get("liked").map_err(corrupt)?,
        })
    }

    async fn count_likes(&self, node_id: NodeId) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM node_likes WHERE node_id = $1 AND liked")
            .bind(node_id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::{Author, NewDiscussion};

    /// Runs against a disposable database named by `TEST_DATABASE_URL`.
    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn subtree_and_toggle_round_trip() {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL");
        let store = PgStore::connect(&url, 2).await.unwrap();
        let author = Author {
            id: UserId(Uuid::new_v4()),
            name: "dora".into(),
        };
        let root = ThreadNode::root(
            &author,
            NewDiscussion {
                title: "pg".into(),
                body: "body".into(),
                tags: vec!["db".into(), "sql".into()],
                ..Default::default()
            },
            Utc::now(),
        );
        let child = ThreadNode::reply(root.id, &author, "c".into(), Utc::now());
        let grandchild = ThreadNode::reply(child.id, &author, "g".into(), Utc::now());
        for n in [&root, &child, &grandchild] {
            store.insert_node(n).await.unwrap();
        }

        assert_eq!(store.load_subtree(root.id).await.unwrap().len(), 2);
        let chain: Vec<NodeId> = store.ancestors(grandchild.id).await.unwrap().iter().map(|n| n.id).collect();
        assert_eq!(chain, vec![grandchild.id, child.id, root.id]);
        assert_eq!(store.find_node(root.id).await.unwrap().unwrap().tags, vec!["db", "sql"]);

        assert!(store.toggle_like(child.id, author.id).await.unwrap().liked);
        assert!(!store.toggle_like(child.id, author.id).await.unwrap().liked);
        assert_eq!(store.count_likes(child.id).await.unwrap(), 0);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn parent_cycle_is_reported_as_corrupt() {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL");
        let store = PgStore::connect(&url, 2).await.unwrap();
        let author = Author {
            id: UserId(Uuid::new_v4()),
            name: "dora".into(),
        };
        let a = ThreadNode::root(
            &author,
            NewDiscussion {
                title: "loop".into(),
                body: "a".into(),
                ..Default::default()
            },
            Utc::now(),
        );
        let b = ThreadNode::reply(a.id, &author, "b".into(), Utc::now());
        store.insert_node(&a).await.unwrap();
        store.insert_node(&b).await.unwrap();
        sqlx::query("UPDATE thread_nodes SET parent_id = $1 WHERE id = $2")
            .bind(b.id.0)
            .bind(a.id.0)
            .execute(&store.pool)
            .await
            .unwrap();

        let err = store.ancestors(b.id).await.unwrap_err();
        assert!(matches!(err, RepoError::Corrupt(_)));
    }

    #[test]
    fn nil_parent_column_reads_as_root() {
        let parent = Uuid::now_v7();
        assert_eq!(parent_from_column(None), None);
        assert_eq!(parent_from_column(Some(Uuid::nil())), None);
        assert_eq!(parent_from_column(Some(parent)), Some(NodeId(parent)));
    }
}
