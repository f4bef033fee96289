use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::{Validate, ValidateUrl};

use crate::{
    config::Config,
    error::{AppError, Result},
    models::{Identity, NewPost, Post, PostType, SubmitPostRequest},
    ranking::{Feed, PostQuery},
    store::BoardStore,
};

pub async fn get_post(store: &dyn BoardStore, post_id: Uuid) -> Result<Post> {
    store
        .get_post(post_id)
        .await?
        .filter(|post| !post.is_deleted)
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

pub async fn list_feed(
    store: &dyn BoardStore,
    config: &Config,
    feed: Feed,
    limit: Option<u32>,
) -> Result<Vec<Post>> {
    let query = PostQuery::for_feed(
        feed,
        config.ranking_strategy,
        Utc::now(),
        config.feed_limit(limit),
    );
    if query.limit == 0 {
        return Ok(Vec::new());
    }

    let posts = store.list_posts(&query).await?;
    tracing::debug!(?feed, count = posts.len(), "listed posts");
    Ok(posts)
}

pub async fn list_hot(
    store: &dyn BoardStore,
    config: &Config,
    limit: Option<u32>,
) -> Result<Vec<Post>> {
    list_feed(store, config, Feed::Hot, limit).await
}

pub async fn list_newest(
    store: &dyn BoardStore,
    config: &Config,
    limit: Option<u32>,
) -> Result<Vec<Post>> {
    list_feed(store, config, Feed::Newest, limit).await
}

pub async fn list_by_type(
    store: &dyn BoardStore,
    config: &Config,
    post_type: PostType,
    limit: Option<u32>,
) -> Result<Vec<Post>> {
    list_feed(store, config, Feed::ByType(post_type), limit).await
}

pub async fn submit_post(
    store: &dyn BoardStore,
    author: &Identity,
    request: SubmitPostRequest,
) -> Result<Post> {
    let new_post = prepare_post(author.id, request, Utc::now())?;

    store.upsert_user(author).await?;
    let post = store.insert_post(new_post).await?;

    tracing::info!(
        post_id = %post.id,
        author_id = %author.id,
        post_type = %post.post_type,
        "post submitted"
    );
    Ok(post)
}

/// Author-only soft delete. Deleting twice is fine.
pub async fn delete_post(store: &dyn BoardStore, actor: &Identity, post_id: Uuid) -> Result<Post> {
    let post = store
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    if post.author_id != actor.id {
        return Err(AppError::Forbidden(
            "Can only delete your own posts".to_string(),
        ));
    }

    let post = store
        .set_post_visibility(post_id, Some(true), None)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    tracing::info!(post_id = %post_id, author_id = %actor.id, "post deleted");
    Ok(post)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Drops blank bodies but stores the rest exactly as written.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Validates a submission and turns it into an insertable row.
pub fn prepare_post(
    author_id: Uuid,
    request: SubmitPostRequest,
    now: DateTime<Utc>,
) -> Result<NewPost> {
    request.validate()?;

    let title = non_blank(request.title)
        .ok_or_else(|| AppError::InvalidInput("title is required".to_string()))?;

    let post_type = match non_blank(request.post_type) {
        None => PostType::Story,
        Some(raw) => raw.parse::<PostType>().map_err(AppError::InvalidInput)?,
    };

    let url = non_blank(request.url);
    let text = present(request.text);

    match post_type {
        PostType::Ask => {
            if text.is_none() || url.is_some() {
                return Err(AppError::InvalidInput(
                    "Ask posts must include text only (no url)".to_string(),
                ));
            }
        }
        _ => {
            if url.is_some() == text.is_some() {
                return Err(AppError::InvalidInput(
                    "Provide exactly one of url or text".to_string(),
                ));
            }
        }
    }

    if let Some(url) = &url {
        if !url.validate_url() {
            return Err(AppError::InvalidInput("url is not a valid URL".to_string()));
        }
    }

    Ok(NewPost {
        id: Uuid::new_v4(),
        title,
        url,
        text,
        post_type,
        author_id,
        created_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn request(
        title: &str,
        post_type: Option<&str>,
        url: Option<&str>,
        text: Option<&str>,
    ) -> SubmitPostRequest {
        SubmitPostRequest {
            title: Some(title.to_string()),
            post_type: post_type.map(str::to_string),
            url: url.map(str::to_string),
            text: text.map(str::to_string),
        }
    }

    fn invalid(result: Result<NewPost>) -> bool {
        matches!(result, Err(AppError::InvalidInput(_)))
    }

    fn config() -> Config {
        Config::from_lookup(|key| (key == "JWT_SECRET").then(|| "test".to_string())).unwrap()
    }

    fn identity(name: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", name),
            username: name.to_string(),
        }
    }

    #[test]
    fn ask_with_url_is_rejected() {
        let author = Uuid::new_v4();
        assert!(invalid(prepare_post(
            author,
            request("Ask: why?", Some("ask"), Some("http://x"), None),
            Utc::now()
        )));
        assert!(invalid(prepare_post(
            author,
            request("Ask: why?", Some("ask"), Some("http://x"), Some("because")),
            Utc::now()
        )));
    }

    #[test]
    fn ask_with_text_only_is_accepted() {
        let post = prepare_post(
            Uuid::new_v4(),
            request("Ask: why?", Some("ask"), None, Some("  because  ")),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(post.post_type, PostType::Ask);
        assert_eq!(post.text.as_deref(), Some("  because  "));
        assert_eq!(post.url, None);
    }

    #[test]
    fn stories_need_exactly_one_of_url_or_text() {
        let author = Uuid::new_v4();
        assert!(invalid(prepare_post(author, request("t", None, None, None), Utc::now())));
        assert!(invalid(prepare_post(
            author,
            request("t", None, Some("https://a.example"), Some("body")),
            Utc::now()
        )));
        // Blank values count as absent.
        let post = prepare_post(
            author,
            request("t", Some("show"), Some("https://a.example"), Some("   ")),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(post.post_type, PostType::Show);
        assert_eq!(post.text, None);
    }

    #[test]
    fn missing_type_defaults_to_story_but_unknown_type_is_rejected() {
        let author = Uuid::new_v4();
        let post = prepare_post(author, request("t", None, None, Some("hi")), Utc::now()).unwrap();
        assert_eq!(post.post_type, PostType::Story);
        assert!(invalid(prepare_post(
            author,
            request("t", Some("poll"), None, Some("hi")),
            Utc::now()
        )));
    }

    #[test]
    fn title_is_required_and_bounded() {
        let author = Uuid::new_v4();
        assert!(invalid(prepare_post(author, request("   ", None, None, Some("x")), Utc::now())));

        let mut missing = request("t", None, None, Some("x"));
        missing.title = None;
        assert!(invalid(prepare_post(author, missing, Utc::now())));

        let long = "a".repeat(301);
        assert!(invalid(prepare_post(author, request(&long, None, None, Some("x")), Utc::now())));
    }

    #[test]
    fn malformed_urls_are_rejected() {
        assert!(invalid(prepare_post(
            Uuid::new_v4(),
            request("t", Some("story"), Some("not a url"), None),
            Utc::now()
        )));
    }

    #[tokio::test]
    async fn hot_feed_orders_by_decayed_score_then_recency() {
        let store = MemoryStore::new();
        let config = config();
        let author = identity("hn");
        store.upsert_user(&author).await.unwrap();
        let voters: Vec<Identity> = (0..10).map(|i| identity(&format!("v{}", i))).collect();
        for voter in &voters {
            store.upsert_user(voter).await.unwrap();
        }

        let now = Utc::now();
        let insert = |age: Duration, kind: PostType| {
            prepare_post(
                author.id,
                request("t", Some(kind.as_str()), Some("https://example.com"), None),
                now - age,
            )
            .unwrap()
        };

        let older = store
            .insert_post(insert(Duration::hours(1), PostType::Story))
            .await
            .unwrap();
        let fresh = store
            .insert_post(insert(Duration::zero(), PostType::Show))
            .await
            .unwrap();
        let job = store
            .insert_post(insert(Duration::zero(), PostType::Job))
            .await
            .unwrap();

        for voter in &voters {
            for post in [&older, &fresh, &job] {
                store
                    .apply_vote(
                        voter.id,
                        crate::models::TargetKind::Post,
                        post.id,
                        crate::models::VoteDirection::Up,
                    )
                    .await
                    .unwrap();
            }
        }

        let hot = list_hot(&store, &config, None).await.unwrap();
        let ids: Vec<Uuid> = hot.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![fresh.id, older.id]);

        let jobs = list_by_type(&store, &config, PostType::Job, None).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, job.id);

        assert!(list_newest(&store, &config, Some(0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn net_strategy_ranks_by_up_minus_down_without_decay() {
        use crate::models::{TargetKind, VoteDirection};

        let store = MemoryStore::new();
        let net = Config::from_lookup(|key| match key {
            "JWT_SECRET" => Some("test".to_string()),
            "RANKING_STRATEGY" => Some("net".to_string()),
            _ => None,
        })
        .unwrap();
        let author = identity("poster");
        store.upsert_user(&author).await.unwrap();

        let now = Utc::now();
        let old = store
            .insert_post(
                prepare_post(
                    author.id,
                    request("old", None, None, Some("a")),
                    now - Duration::days(3),
                )
                .unwrap(),
            )
            .await
            .unwrap();
        let fresh = store
            .insert_post(
                prepare_post(author.id, request("fresh", None, None, Some("b")), now).unwrap(),
            )
            .await
            .unwrap();

        // old: 3 up, 0 down (net 3). fresh: 4 up, 3 down (net 1).
        let votes = [
            (old.id, VoteDirection::Up, 3),
            (fresh.id, VoteDirection::Up, 4),
            (fresh.id, VoteDirection::Down, 3),
        ];
        for (post_id, direction, count) in votes {
            for _ in 0..count {
                let voter = identity(&format!("voter-{}", Uuid::new_v4()));
                store.upsert_user(&voter).await.unwrap();
                store
                    .apply_vote(voter.id, TargetKind::Post, post_id, direction)
                    .await
                    .unwrap();
            }
        }

        let hot = list_hot(&store, &net, None).await.unwrap();
        let ids: Vec<Uuid> = hot.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![old.id, fresh.id]);

        // Decayed ordering on the same data prefers the fresh post.
        let decayed = list_hot(&store, &config(), None).await.unwrap();
        assert_eq!(decayed[0].id, fresh.id);
    }

    #[tokio::test]
    async fn deleted_posts_are_hidden_from_get_and_only_authors_may_delete() {
        let store = MemoryStore::new();
        let author = identity("owner");
        let stranger = identity("stranger");
        let post = submit_post(&store, &author, request("t", None, None, Some("body")))
            .await
            .unwrap();

        assert!(matches!(
            delete_post(&store, &stranger, post.id).await,
            Err(AppError::Forbidden(_))
        ));

        let deleted = delete_post(&store, &author, post.id).await.unwrap();
        assert!(deleted.is_deleted);
        assert!(matches!(
            get_post(&store, post.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            get_post(&store, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
