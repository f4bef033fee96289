use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    ledger::{self, LedgerAction, Transition},
    models::{
        Comment, Identity, NewComment, NewPost, Post, TargetKind, User, Vote, VoteDirection,
        VotedTarget,
    },
    ranking::PostQuery,
    store::BoardStore,
};

/// In-process store. One async mutex guards everything, so each trait call
/// is a single critical section.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    // Insertion order is kept so timestamp ties resolve the way a
    // sequential insert would.
    posts: Vec<Post>,
    comments: Vec<Comment>,
    post_votes: HashMap<(Uuid, Uuid), Vote>,
    comment_votes: HashMap<(Uuid, Uuid), Vote>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every ledger row recorded for a target.
    pub async fn votes_for(&self, kind: TargetKind, target_id: Uuid) -> Vec<Vote> {
        let state = self.state.lock().await;
        state
            .ledger(kind)
            .values()
            .filter(|vote| vote.target_id == target_id)
            .cloned()
            .collect()
    }
}

impl MemoryState {
    fn username(&self, user_id: Uuid) -> Option<String> {
        self.users.get(&user_id).map(|user| user.username.clone())
    }

    fn resolve_post(&self, post: &Post) -> Post {
        Post {
            author: self.username(post.author_id),
            ..post.clone()
        }
    }

    fn resolve_comment(&self, comment: &Comment) -> Comment {
        Comment {
            author: self.username(comment.author_id),
            ..comment.clone()
        }
    }

    fn post_index(&self, post_id: Uuid) -> Option<usize> {
        self.posts.iter().position(|post| post.id == post_id)
    }

    fn comment_index(&self, comment_id: Uuid) -> Option<usize> {
        self.comments
            .iter()
            .position(|comment| comment.id == comment_id)
    }

    fn ledger(&self, kind: TargetKind) -> &HashMap<(Uuid, Uuid), Vote> {
        match kind {
            TargetKind::Post => &self.post_votes,
            TargetKind::Comment => &self.comment_votes,
        }
    }

    fn ledger_mut(&mut self, kind: TargetKind) -> &mut HashMap<(Uuid, Uuid), Vote> {
        match kind {
            TargetKind::Post => &mut self.post_votes,
            TargetKind::Comment => &mut self.comment_votes,
        }
    }

    fn plan_vote(
        &self,
        kind: TargetKind,
        user_id: Uuid,
        target_id: Uuid,
        direction: VoteDirection,
    ) -> Transition {
        let existing = self
            .ledger(kind)
            .get(&(user_id, target_id))
            .and_then(Vote::direction);
        ledger::plan(existing, direction)
    }

    fn write_ledger(
        &mut self,
        kind: TargetKind,
        user_id: Uuid,
        target_id: Uuid,
        action: LedgerAction,
    ) {
        let now = Utc::now();
        let entries = self.ledger_mut(kind);
        match action {
            LedgerAction::Insert(direction) => {
                entries.insert(
                    (user_id, target_id),
                    Vote {
                        id: Uuid::new_v4(),
                        user_id,
                        target_id,
                        vote_type: direction.as_i16(),
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
            LedgerAction::Update(direction) => {
                if let Some(vote) = entries.get_mut(&(user_id, target_id)) {
                    vote.vote_type = direction.as_i16();
                    vote.updated_at = now;
                }
            }
            LedgerAction::Unchanged => {}
        }
    }
}

#[async_trait]
impl BoardStore for MemoryStore {
    async fn upsert_user(&self, identity: &Identity) -> Result<User> {
        let mut state = self.state.lock().await;

        let taken = state.users.values().any(|user| {
            user.id != identity.id
                && (user.email == identity.email || user.username == identity.username)
        });
        if taken {
            return Err(AppError::Conflict(
                "Email or username already belongs to another user".to_string(),
            ));
        }

        let user = state.users.entry(identity.id).or_insert_with(|| User {
            id: identity.id,
            email: identity.email.clone(),
            username: identity.username.clone(),
            created_at: Utc::now(),
        });
        user.email = identity.email.clone();
        user.username = identity.username.clone();

        Ok(user.clone())
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post> {
        let mut state = self.state.lock().await;

        if !state.users.contains_key(&post.author_id) {
            return Err(AppError::NotFound("Author not found".to_string()));
        }

        let row = Post {
            id: post.id,
            title: post.title,
            url: post.url,
            text: post.text,
            post_type: post.post_type,
            author_id: post.author_id,
            author: None,
            created_at: post.created_at,
            upvotes: 0,
            downvotes: 0,
            is_deleted: false,
            is_dead: false,
        };
        let resolved = state.resolve_post(&row);
        state.posts.push(row);

        Ok(resolved)
    }

    async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let state = self.state.lock().await;
        Ok(state
            .post_index(post_id)
            .map(|index| state.resolve_post(&state.posts[index])))
    }

    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        let state = self.state.lock().await;
        Ok(query
            .apply(state.posts.iter().rev())
            .iter()
            .map(|post| state.resolve_post(post))
            .collect())
    }

    async fn set_post_visibility(
        &self,
        post_id: Uuid,
        is_deleted: Option<bool>,
        is_dead: Option<bool>,
    ) -> Result<Option<Post>> {
        let mut state = self.state.lock().await;
        let Some(index) = state.post_index(post_id) else {
            return Ok(None);
        };

        let post = &mut state.posts[index];
        if let Some(flag) = is_deleted {
            post.is_deleted = flag;
        }
        if let Some(flag) = is_dead {
            post.is_dead = flag;
        }

        Ok(Some(state.resolve_post(&state.posts[index])))
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment> {
        let mut state = self.state.lock().await;

        if !state.users.contains_key(&comment.author_id) {
            return Err(AppError::NotFound("Author not found".to_string()));
        }
        if state.post_index(comment.post_id).is_none() {
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        if let Some(parent_id) = comment.parent_id {
            if state.comment_index(parent_id).is_none() {
                return Err(AppError::NotFound("Parent comment not found".to_string()));
            }
        }

        let row = Comment {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            author: None,
            parent_id: comment.parent_id,
            text: comment.text,
            created_at: comment.created_at,
            score: 0,
        };
        let resolved = state.resolve_comment(&row);
        state.comments.push(row);

        Ok(resolved)
    }

    async fn get_comment(&self, comment_id: Uuid) -> Result<Option<Comment>> {
        let state = self.state.lock().await;
        Ok(state
            .comment_index(comment_id)
            .map(|index| state.resolve_comment(&state.comments[index])))
    }

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        let state = self.state.lock().await;
        let mut comments: Vec<Comment> = state
            .comments
            .iter()
            .rev()
            .filter(|comment| comment.post_id == post_id)
            .map(|comment| state.resolve_comment(comment))
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(comments)
    }

    async fn get_vote(
        &self,
        user_id: Uuid,
        kind: TargetKind,
        target_id: Uuid,
    ) -> Result<Option<Vote>> {
        let state = self.state.lock().await;
        Ok(state.ledger(kind).get(&(user_id, target_id)).cloned())
    }

    async fn apply_vote(
        &self,
        user_id: Uuid,
        kind: TargetKind,
        target_id: Uuid,
        direction: VoteDirection,
    ) -> Result<VotedTarget> {
        let mut state = self.state.lock().await;

        if !state.users.contains_key(&user_id) {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        match kind {
            TargetKind::Post => {
                let index = state
                    .post_index(target_id)
                    .filter(|&index| !state.posts[index].is_deleted)
                    .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

                let transition = state.plan_vote(kind, user_id, target_id, direction);
                state.write_ledger(kind, user_id, target_id, transition.action);

                let post = &mut state.posts[index];
                post.upvotes += transition.upvote_delta;
                post.downvotes += transition.downvote_delta;

                Ok(VotedTarget::Post(state.resolve_post(&state.posts[index])))
            }
            TargetKind::Comment => {
                let index = state
                    .comment_index(target_id)
                    .filter(|&index| {
                        let post_id = state.comments[index].post_id;
                        state
                            .post_index(post_id)
                            .is_some_and(|post| !state.posts[post].is_deleted)
                    })
                    .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

                let transition = state.plan_vote(kind, user_id, target_id, direction);
                state.write_ledger(kind, user_id, target_id, transition.action);
                state.comments[index].score += transition.score_delta();

                Ok(VotedTarget::Comment(
                    state.resolve_comment(&state.comments[index]),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::PostType,
        ranking::{Feed, RankingStrategy},
    };
    use std::sync::Arc;

    fn identity(name: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", name),
            username: name.to_string(),
        }
    }

    async fn seeded_post(store: &MemoryStore, author: &Identity) -> Post {
        store.upsert_user(author).await.unwrap();
        store
            .insert_post(NewPost {
                id: Uuid::new_v4(),
                title: "Show: a thing".to_string(),
                url: Some("https://example.com".to_string()),
                text: None,
                post_type: PostType::Show,
                author_id: author.id,
                created_at: Utc::now(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn upsert_rejects_a_username_owned_by_someone_else() {
        let store = MemoryStore::new();
        let alice = identity("alice");
        store.upsert_user(&alice).await.unwrap();

        let mut impostor = identity("bob");
        impostor.username = "alice".to_string();
        assert!(matches!(
            store.upsert_user(&impostor).await,
            Err(AppError::Conflict(_))
        ));

        // Same id may rename itself.
        let mut renamed = alice.clone();
        renamed.username = "alice2".to_string();
        assert_eq!(store.upsert_user(&renamed).await.unwrap().username, "alice2");
    }

    #[tokio::test]
    async fn inserted_posts_resolve_their_author() {
        let store = MemoryStore::new();
        let author = identity("carol");
        let post = seeded_post(&store, &author).await;
        assert_eq!(post.author.as_deref(), Some("carol"));
        assert_eq!((post.upvotes, post.downvotes), (0, 0));
    }

    #[tokio::test]
    async fn votes_on_soft_deleted_posts_are_not_found() {
        let store = MemoryStore::new();
        let author = identity("dave");
        let post = seeded_post(&store, &author).await;
        store
            .set_post_visibility(post.id, Some(true), None)
            .await
            .unwrap();

        let result = store
            .apply_vote(author.id, TargetKind::Post, post.id, VoteDirection::Up)
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(store.votes_for(TargetKind::Post, post.id).await.is_empty());
    }

    #[tokio::test]
    async fn listing_skips_hidden_posts() {
        let store = MemoryStore::new();
        let author = identity("erin");
        let kept = seeded_post(&store, &author).await;
        let dead = seeded_post(&store, &author).await;
        store
            .set_post_visibility(dead.id, None, Some(true))
            .await
            .unwrap();

        let query = PostQuery::for_feed(Feed::Newest, RankingStrategy::Decayed, Utc::now(), 30);
        let listed = store.list_posts(&query).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, kept.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_voters_never_lose_an_update() {
        let store = Arc::new(MemoryStore::new());
        let author = identity("frank");
        let post = seeded_post(&store, &author).await;

        let mut voters = Vec::new();
        for i in 0..32 {
            let voter = identity(&format!("voter{}", i));
            store.upsert_user(&voter).await.unwrap();
            voters.push(voter);
        }

        let mut handles = Vec::new();
        for (i, voter) in voters.iter().enumerate() {
            let store = store.clone();
            let voter_id = voter.id;
            let post_id = post.id;
            handles.push(tokio::spawn(async move {
                // Every voter upvotes twice; odd voters then flip to a downvote.
                for _ in 0..2 {
                    store
                        .apply_vote(voter_id, TargetKind::Post, post_id, VoteDirection::Up)
                        .await
                        .unwrap();
                }
                if i % 2 == 1 {
                    store
                        .apply_vote(voter_id, TargetKind::Post, post_id, VoteDirection::Down)
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stored = store.get_post(post.id).await.unwrap().unwrap();
        let ledger = store.votes_for(TargetKind::Post, post.id).await;
        assert_eq!(ledger.len(), 32);
        let up = ledger.iter().filter(|v| v.vote_type == 1).count() as i32;
        let down = ledger.iter().filter(|v| v.vote_type == -1).count() as i32;
        assert_eq!((stored.upvotes, stored.downvotes), (up, down));
        assert_eq!((up, down), (16, 16));
    }
}
