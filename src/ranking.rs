//! Listing order for the front page and the per-type feeds.

use std::{cmp::Ordering, fmt, str::FromStr};

use chrono::{DateTime, Utc};

use crate::models::{Post, PostType};

/// Keeps brand-new posts from dividing by zero and caps their head start.
pub const AGE_OFFSET_HOURS: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingStrategy {
    /// `upvotes / (age_hours + 2)`.
    Decayed,
    /// `upvotes - downvotes`, no decay.
    Net,
}

impl fmt::Display for RankingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankingStrategy::Decayed => f.write_str("decayed"),
            RankingStrategy::Net => f.write_str("net"),
        }
    }
}

impl FromStr for RankingStrategy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "decayed" | "hot" => Ok(RankingStrategy::Decayed),
            "net" | "score" => Ok(RankingStrategy::Net),
            other => Err(format!("Unknown ranking strategy: {}", other)),
        }
    }
}

/// Hours between `created_at` and `now`, never negative.
pub fn age_hours(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - created_at).num_milliseconds();
    (millis as f64 / 3_600_000.0).max(0.0)
}

pub fn rank_score(post: &Post, now: DateTime<Utc>, strategy: RankingStrategy) -> f64 {
    match strategy {
        RankingStrategy::Decayed => {
            f64::from(post.upvotes) / (age_hours(post.created_at, now) + AGE_OFFSET_HOURS)
        }
        RankingStrategy::Net => f64::from(post.upvotes - post.downvotes),
    }
}

/// Hot ordering: higher score first, newer first on ties.
pub fn compare_hot(a: &Post, b: &Post, now: DateTime<Utc>, strategy: RankingStrategy) -> Ordering {
    rank_score(b, now, strategy)
        .total_cmp(&rank_score(a, now, strategy))
        .then_with(|| compare_newest(a, b))
}

pub fn compare_newest(a: &Post, b: &Post) -> Ordering {
    b.created_at.cmp(&a.created_at)
}

/// Which listing view is being asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Hot,
    Newest,
    ByType(PostType),
}

/// Types eligible for the front page; jobs only appear in their own feed.
pub const FRONT_PAGE_TYPES: [PostType; 3] = [PostType::Story, PostType::Ask, PostType::Show];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PostOrder {
    Ranked {
        strategy: RankingStrategy,
        now: DateTime<Utc>,
    },
    Newest,
}

/// A resolved listing request as handed to the store. Soft-hidden posts are
/// always excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct PostQuery {
    pub types: Vec<PostType>,
    pub order: PostOrder,
    pub limit: u32,
}

impl PostQuery {
    pub fn for_feed(feed: Feed, strategy: RankingStrategy, now: DateTime<Utc>, limit: u32) -> Self {
        let (types, order) = match feed {
            Feed::Hot => (
                FRONT_PAGE_TYPES.to_vec(),
                PostOrder::Ranked { strategy, now },
            ),
            Feed::Newest => (FRONT_PAGE_TYPES.to_vec(), PostOrder::Newest),
            Feed::ByType(post_type) => (vec![post_type], PostOrder::Newest),
        };

        Self {
            types,
            order,
            limit,
        }
    }

    pub fn matches(&self, post: &Post) -> bool {
        !post.is_hidden() && self.types.contains(&post.post_type)
    }

    /// Filters, orders and truncates an in-memory candidate set.
    pub fn apply<'a, I>(&self, posts: I) -> Vec<Post>
    where
        I: IntoIterator<Item = &'a Post>,
    {
        let mut selected: Vec<Post> = posts
            .into_iter()
            .filter(|post| self.matches(post))
            .cloned()
            .collect();

        match self.order {
            PostOrder::Ranked { strategy, now } => {
                selected.sort_by(|a, b| compare_hot(a, b, now, strategy))
            }
            PostOrder::Newest => selected.sort_by(compare_newest),
        }

        selected.truncate(self.limit as usize);
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn post(upvotes: i32, created_at: DateTime<Utc>) -> Post {
        Post {
            id: Uuid::new_v4(),
            title: "title".to_string(),
            url: Some("https://example.com".to_string()),
            text: None,
            post_type: PostType::Story,
            author_id: Uuid::new_v4(),
            author: None,
            created_at,
            upvotes,
            downvotes: 0,
            is_deleted: false,
            is_dead: false,
        }
    }

    #[test]
    fn hour_old_post_scores_a_third_of_its_upvotes() {
        let now = Utc::now();
        let p = post(10, now - Duration::seconds(3600));
        let score = rank_score(&p, now, RankingStrategy::Decayed);
        assert!((score - 10.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn brand_new_post_scores_half_its_upvotes_and_outranks_older() {
        let now = Utc::now();
        let fresh = post(10, now);
        let older = post(10, now - Duration::hours(1));
        assert_eq!(rank_score(&fresh, now, RankingStrategy::Decayed), 5.0);
        assert_eq!(
            compare_hot(&fresh, &older, now, RankingStrategy::Decayed),
            Ordering::Less
        );
    }

    #[test]
    fn future_timestamps_clamp_age_to_zero() {
        let now = Utc::now();
        let p = post(4, now + Duration::hours(5));
        assert_eq!(rank_score(&p, now, RankingStrategy::Decayed), 2.0);
    }

    #[test]
    fn ancient_unvoted_posts_approach_zero_without_going_negative() {
        let now = Utc::now();
        let p = post(0, now - Duration::days(3650));
        let score = rank_score(&p, now, RankingStrategy::Decayed);
        assert!(score >= 0.0);
        assert!(score < 1e-3);
    }

    #[test]
    fn score_is_monotonic_in_age_and_upvotes() {
        let now = Utc::now();
        let mut previous = f64::INFINITY;
        for hours in [0, 1, 2, 5, 24, 240] {
            let s = rank_score(&post(7, now - Duration::hours(hours)), now, RankingStrategy::Decayed);
            assert!(s <= previous);
            previous = s;
        }

        let mut previous = f64::NEG_INFINITY;
        for upvotes in [0, 1, 2, 10, 1000] {
            let s = rank_score(&post(upvotes, now - Duration::hours(3)), now, RankingStrategy::Decayed);
            assert!(s >= previous);
            previous = s;
        }
    }

    #[test]
    fn net_strategy_ignores_age() {
        let now = Utc::now();
        let mut p = post(9, now - Duration::days(30));
        p.downvotes = 4;
        assert_eq!(rank_score(&p, now, RankingStrategy::Net), 5.0);
    }

    #[test]
    fn ties_go_to_the_newer_post() {
        let now = Utc::now();
        let a = post(0, now - Duration::hours(2));
        let b = post(0, now - Duration::hours(1));
        assert_eq!(compare_hot(&a, &b, now, RankingStrategy::Decayed), Ordering::Greater);
    }

    #[test]
    fn hot_query_drops_hidden_posts_and_jobs() {
        let now = Utc::now();
        let visible = post(1, now);
        let mut deleted = post(50, now);
        deleted.is_deleted = true;
        let mut dead = post(50, now);
        dead.is_dead = true;
        let mut job = post(50, now);
        job.post_type = PostType::Job;

        let query = PostQuery::for_feed(Feed::Hot, RankingStrategy::Decayed, now, 30);
        let listed = query.apply([&visible, &deleted, &dead, &job]);
        assert_eq!(listed, vec![visible]);
    }

    #[test]
    fn type_feed_orders_by_recency_and_truncates() {
        let now = Utc::now();
        let mut posts = Vec::new();
        for hours in 0..5 {
            let mut p = post(100 - hours as i32, now - Duration::hours(hours));
            p.post_type = PostType::Job;
            posts.push(p);
        }

        let query = PostQuery::for_feed(Feed::ByType(PostType::Job), RankingStrategy::Decayed, now, 3);
        let listed = query.apply(posts.iter().rev());
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].id, posts[0].id);
        assert_eq!(listed[2].id, posts[2].id);
    }

    #[test]
    fn strategies_parse_from_config_strings() {
        assert_eq!("decayed".parse::<RankingStrategy>(), Ok(RankingStrategy::Decayed));
        assert_eq!("NET".parse::<RankingStrategy>(), Ok(RankingStrategy::Net));
        assert!("random".parse::<RankingStrategy>().is_err());
    }
}
