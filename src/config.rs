use std::env;

use thiserror::Error;

use crate::{ledger::VoteRule, models::TargetKind, ranking::RankingStrategy};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Without one the board runs on the
    /// in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,

    // Ranking & voting
    pub ranking_strategy: RankingStrategy,
    pub post_vote_rule: VoteRule,
    pub comment_vote_rule: VoteRule,
    pub feed_default_limit: u32,
    pub feed_max_limit: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let feed_max_limit = parse_or(&lookup, "FEED_MAX_LIMIT", 100)?;
        let feed_default_limit: u32 = parse_or(&lookup, "FEED_DEFAULT_LIMIT", 30)?;

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            jwt_secret: lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            ranking_strategy: parse_or(&lookup, "RANKING_STRATEGY", RankingStrategy::Decayed)?,
            post_vote_rule: parse_or(&lookup, "POST_VOTE_RULE", VoteRule::UpDown)?,
            comment_vote_rule: parse_or(&lookup, "COMMENT_VOTE_RULE", VoteRule::UpvoteOnly)?,
            feed_default_limit: feed_default_limit.min(feed_max_limit),
            feed_max_limit,
        })
    }

    pub fn vote_rule(&self, kind: TargetKind) -> VoteRule {
        match kind {
            TargetKind::Post => self.post_vote_rule,
            TargetKind::Comment => self.comment_vote_rule,
        }
    }

    /// Resolves a requested page size against the configured default and cap.
    pub fn feed_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.feed_default_limit)
            .min(self.feed_max_limit)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                message: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}
