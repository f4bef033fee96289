use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    ledger::{self, LedgerAction},
    models::{
        Comment, Identity, NewComment, NewPost, Post, TargetKind, User, Vote, VoteDirection,
        VotedTarget,
    },
    ranking::{AGE_OFFSET_HOURS, PostOrder, PostQuery, RankingStrategy},
    store::BoardStore,
};

const POST_COLUMNS: &str = r#"
    p.id, p.title, p.url, p.text, p.post_type, p.author_id, u.username AS author,
    p.created_at, p.upvotes, p.downvotes, p.is_deleted, p.is_dead
"#;

const COMMENT_COLUMNS: &str = r#"
    c.id, c.post_id, c.author_id, u.username AS author, c.parent_id, c.text,
    c.created_at, c.score
"#;

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn ledger_table(kind: TargetKind) -> (&'static str, &'static str) {
    match kind {
        TargetKind::Post => ("post_votes", "post_id"),
        TargetKind::Comment => ("comment_votes", "comment_id"),
    }
}

fn order_clause(order: &PostOrder) -> String {
    match order {
        PostOrder::Ranked {
            strategy: RankingStrategy::Decayed,
            ..
        } => format!(
            "(p.upvotes::float8 / (GREATEST(EXTRACT(EPOCH FROM ($3::timestamptz - p.created_at))::float8 / 3600.0, 0) + {:.1})) DESC, p.created_at DESC",
            AGE_OFFSET_HOURS
        ),
        PostOrder::Ranked {
            strategy: RankingStrategy::Net,
            ..
        } => "(p.upvotes - p.downvotes) DESC, p.created_at DESC".to_string(),
        PostOrder::Newest => "p.created_at DESC".to_string(),
    }
}

async fn fetch_post(conn: &mut PgConnection, post_id: Uuid) -> Result<Option<Post>> {
    let query = format!(
        "SELECT {} FROM posts p LEFT JOIN users u ON u.id = p.author_id WHERE p.id = $1",
        POST_COLUMNS
    );
    let post = sqlx::query_as::<_, Post>(&query)
        .bind(post_id)
        .fetch_optional(conn)
        .await?;

    Ok(post)
}

async fn fetch_comment(conn: &mut PgConnection, comment_id: Uuid) -> Result<Option<Comment>> {
    let query = format!(
        "SELECT {} FROM comments c LEFT JOIN users u ON u.id = c.author_id WHERE c.id = $1",
        COMMENT_COLUMNS
    );
    let comment = sqlx::query_as::<_, Comment>(&query)
        .bind(comment_id)
        .fetch_optional(conn)
        .await?;

    Ok(comment)
}

async fn existing_vote(
    conn: &mut PgConnection,
    kind: TargetKind,
    user_id: Uuid,
    target_id: Uuid,
) -> Result<Option<VoteDirection>> {
    let (table, column) = ledger_table(kind);
    let vote_type: Option<i16> = sqlx::query_scalar(&format!(
        "SELECT vote_type FROM {} WHERE user_id = $1 AND {} = $2",
        table, column
    ))
    .bind(user_id)
    .bind(target_id)
    .fetch_optional(conn)
    .await?;

    match vote_type {
        None => Ok(None),
        Some(raw) => VoteDirection::from_i16(raw)
            .map(Some)
            .ok_or_else(|| AppError::Internal(format!("Invalid stored vote type: {}", raw))),
    }
}

async fn write_ledger(
    conn: &mut PgConnection,
    kind: TargetKind,
    user_id: Uuid,
    target_id: Uuid,
    action: LedgerAction,
) -> Result<()> {
    let (table, column) = ledger_table(kind);
    let now = Utc::now();

    match action {
        LedgerAction::Insert(direction) => {
            sqlx::query(&format!(
                r#"
                INSERT INTO {} (id, user_id, {}, vote_type, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $5)
                "#,
                table, column
            ))
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(target_id)
            .bind(direction.as_i16())
            .bind(now)
            .execute(conn)
            .await?;
        }
        LedgerAction::Update(direction) => {
            sqlx::query(&format!(
                "UPDATE {} SET vote_type = $3, updated_at = $4 WHERE user_id = $1 AND {} = $2",
                table, column
            ))
            .bind(user_id)
            .bind(target_id)
            .bind(direction.as_i16())
            .bind(now)
            .execute(conn)
            .await?;
        }
        LedgerAction::Unchanged => {}
    }

    Ok(())
}

#[async_trait]
impl BoardStore for PgStore {
    async fn upsert_user(&self, identity: &Identity) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, username, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (id)
            DO UPDATE SET email = EXCLUDED.email, username = EXCLUDED.username
            RETURNING id, email, username, created_at
            "#,
        )
        .bind(identity.id)
        .bind(&identity.email)
        .bind(&identity.username)
        .fetch_one(&self.db)
        .await?;

        Ok(user)
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post> {
        let query = format!(
            r#"
            WITH p AS (
                INSERT INTO posts (id, title, url, text, post_type, author_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
            )
            SELECT {} FROM p LEFT JOIN users u ON u.id = p.author_id
            "#,
            POST_COLUMNS
        );

        let post = sqlx::query_as::<_, Post>(&query)
            .bind(post.id)
            .bind(&post.title)
            .bind(&post.url)
            .bind(&post.text)
            .bind(post.post_type)
            .bind(post.author_id)
            .bind(post.created_at)
            .fetch_one(&self.db)
            .await?;

        Ok(post)
    }

    async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let mut conn = self.db.acquire().await?;
        fetch_post(&mut conn, post_id).await
    }

    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM posts p
            LEFT JOIN users u ON u.id = p.author_id
            WHERE NOT p.is_deleted AND NOT p.is_dead AND p.post_type::TEXT = ANY($1)
            ORDER BY {}
            LIMIT $2
            "#,
            POST_COLUMNS,
            order_clause(&query.order)
        );

        let types: Vec<String> = query.types.iter().map(|t| t.as_str().to_string()).collect();
        let mut builder = sqlx::query_as::<_, Post>(&sql)
            .bind(types)
            .bind(i64::from(query.limit));

        if let PostOrder::Ranked {
            strategy: RankingStrategy::Decayed,
            now,
        } = query.order
        {
            builder = builder.bind(now);
        }

        let posts = builder.fetch_all(&self.db).await?;
        Ok(posts)
    }

    async fn set_post_visibility(
        &self,
        post_id: Uuid,
        is_deleted: Option<bool>,
        is_dead: Option<bool>,
    ) -> Result<Option<Post>> {
        let query = format!(
            r#"
            WITH p AS (
                UPDATE posts
                SET is_deleted = COALESCE($2, is_deleted),
                    is_dead = COALESCE($3, is_dead)
                WHERE id = $1
                RETURNING *
            )
            SELECT {} FROM p LEFT JOIN users u ON u.id = p.author_id
            "#,
            POST_COLUMNS
        );

        let post = sqlx::query_as::<_, Post>(&query)
            .bind(post_id)
            .bind(is_deleted)
            .bind(is_dead)
            .fetch_optional(&self.db)
            .await?;

        Ok(post)
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment> {
        let query = format!(
            r#"
            WITH c AS (
                INSERT INTO comments (id, post_id, author_id, parent_id, text, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT {} FROM c LEFT JOIN users u ON u.id = c.author_id
            "#,
            COMMENT_COLUMNS
        );

        let comment = sqlx::query_as::<_, Comment>(&query)
            .bind(comment.id)
            .bind(comment.post_id)
            .bind(comment.author_id)
            .bind(comment.parent_id)
            .bind(&comment.text)
            .bind(comment.created_at)
            .fetch_one(&self.db)
            .await?;

        Ok(comment)
    }

    async fn get_comment(&self, comment_id: Uuid) -> Result<Option<Comment>> {
        let mut conn = self.db.acquire().await?;
        fetch_comment(&mut conn, comment_id).await
    }

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        let query = format!(
            r#"
            SELECT {}
            FROM comments c
            LEFT JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1
            ORDER BY c.created_at DESC
            "#,
            COMMENT_COLUMNS
        );

        let comments = sqlx::query_as::<_, Comment>(&query)
            .bind(post_id)
            .fetch_all(&self.db)
            .await?;

        Ok(comments)
    }

    async fn get_vote(
        &self,
        user_id: Uuid,
        kind: TargetKind,
        target_id: Uuid,
    ) -> Result<Option<Vote>> {
        let (table, column) = ledger_table(kind);
        let vote = sqlx::query_as::<_, Vote>(&format!(
            r#"
            SELECT id, user_id, {} AS target_id, vote_type, created_at, updated_at
            FROM {}
            WHERE user_id = $1 AND {} = $2
            "#,
            column, table, column
        ))
        .bind(user_id)
        .bind(target_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(vote)
    }

    async fn apply_vote(
        &self,
        user_id: Uuid,
        kind: TargetKind,
        target_id: Uuid,
        direction: VoteDirection,
    ) -> Result<VotedTarget> {
        let mut tx = self.db.begin().await?;

        // The row lock on the target serializes concurrent voters, so the
        // ledger read below cannot go stale before the counters move.
        let target_visible: Option<bool> = match kind {
            TargetKind::Post => {
                sqlx::query_scalar("SELECT NOT is_deleted FROM posts WHERE id = $1 FOR UPDATE")
                    .bind(target_id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            TargetKind::Comment => {
                sqlx::query_scalar(
                    r#"
                    SELECT NOT p.is_deleted
                    FROM comments c
                    JOIN posts p ON p.id = c.post_id
                    WHERE c.id = $1
                    FOR UPDATE OF c
                    "#,
                )
                .bind(target_id)
                .fetch_optional(&mut *tx)
                .await?
            }
        };

        if target_visible != Some(true) {
            return Err(AppError::NotFound(match kind {
                TargetKind::Post => "Post not found".to_string(),
                TargetKind::Comment => "Comment not found".to_string(),
            }));
        }

        let existing = existing_vote(&mut tx, kind, user_id, target_id).await?;
        let transition = ledger::plan(existing, direction);
        write_ledger(&mut tx, kind, user_id, target_id, transition.action).await?;

        let voted = match kind {
            TargetKind::Post => {
                if !transition.is_noop() {
                    sqlx::query(
                        r#"
                        UPDATE posts
                        SET upvotes = upvotes + $2, downvotes = downvotes + $3
                        WHERE id = $1
                        "#,
                    )
                    .bind(target_id)
                    .bind(transition.upvote_delta)
                    .bind(transition.downvote_delta)
                    .execute(&mut *tx)
                    .await?;
                }
                let post = fetch_post(&mut tx, target_id)
                    .await?
                    .ok_or_else(|| AppError::Internal("Voted post vanished".to_string()))?;
                VotedTarget::Post(post)
            }
            TargetKind::Comment => {
                if !transition.is_noop() {
                    sqlx::query("UPDATE comments SET score = score + $2 WHERE id = $1")
                        .bind(target_id)
                        .bind(transition.score_delta())
                        .execute(&mut *tx)
                        .await?;
                }
                let comment = fetch_comment(&mut tx, target_id)
                    .await?
                    .ok_or_else(|| AppError::Internal("Voted comment vanished".to_string()))?;
                VotedTarget::Comment(comment)
            }
        };

        tx.commit().await?;

        Ok(voted)
    }
}
