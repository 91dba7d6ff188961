//! Redis-backed engagement store.
//!
//! Layout, under a configurable prefix:
//!
//! - `{prefix}:votes:{post_id}`: hash of user ID to `"1"` / `"-1"`
//! - `{prefix}:scores`: sorted set of zero-padded post IDs scored by aggregate
//!
//! Members are padded to 19 digits so Redis' lexicographic tie order on
//! equal scores matches numeric post ID order.

use std::sync::Arc;

use agora_common::{AppError, AppResult};
use async_trait::async_trait;
use fred::clients::Client as RedisClient;
use fred::interfaces::{ClientLike, HashesInterface, LuaInterface, SortedSetsInterface};
use fred::types::SetOptions;
use fred::types::config::Config as RedisConfig;
use tracing::{debug, info};

use super::{CommitOutcome, Direction, EngagementStore, VoteChange};

/// Conditional vote commit.
///
/// KEYS: votes hash, scores zset.
/// ARGV: user ID, expected stored direction (`""` = none), next direction,
/// delta, padded post ID.
///
/// Every check runs before the first write, so an error reply never leaves
/// a vote recorded without its score change.
const COMMIT_VOTE_SCRIPT: &str = r"
local current = redis.call('HGET', KEYS[1], ARGV[1])
if not current then current = '' end
if current ~= ARGV[2] then
  return {0, 0}
end
local kind = redis.call('TYPE', KEYS[2])['ok']
if kind ~= 'zset' and kind ~= 'none' then
  return redis.error_reply('WRONGTYPE score index is not a sorted set')
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[3])
local score = redis.call('ZINCRBY', KEYS[2], ARGV[4], ARGV[5])
return {1, tonumber(score)}
";

/// Drop a post's votes and score together.
const REMOVE_POST_SCRIPT: &str = r"
redis.call('DEL', KEYS[1])
redis.call('ZREM', KEYS[2], ARGV[1])
return 1
";

/// Store shared by every instance through Redis.
#[derive(Clone)]
pub struct RedisEngagementStore {
    redis: Arc<RedisClient>,
    prefix: String,
}

impl RedisEngagementStore {
    /// Create a store on an already connected client.
    #[must_use]
    pub fn new(redis: Arc<RedisClient>, prefix: impl Into<String>) -> Self {
        Self {
            redis,
            prefix: prefix.into(),
        }
    }

    /// Connect to Redis and create a store.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> AppResult<Self> {
        let config = RedisConfig::from_url(url).map_err(store_err)?;
        let client = RedisClient::new(config, None, None, None);
        client.connect();
        client.wait_for_connect().await.map_err(store_err)?;

        info!("Connected to Redis engagement store");
        Ok(Self::new(Arc::new(client), prefix))
    }

    fn votes_key(&self, post_id: i64) -> String {
        format!("{}:votes:{post_id}", self.prefix)
    }

    fn scores_key(&self) -> String {
        format!("{}:scores", self.prefix)
    }

    fn member(post_id: i64) -> String {
        format!("{post_id:019}")
    }

    fn parse_member(member: &str) -> AppResult<i64> {
        member
            .parse()
            .map_err(|_| AppError::Internal(format!("Malformed score member: {member}")))
    }
}

fn store_err(err: fred::error::Error) -> AppError {
    AppError::StoreUnavailable(err.to_string())
}

#[async_trait]
impl EngagementStore for RedisEngagementStore {
    async fn vote_of(&self, post_id: i64, user_id: i64) -> AppResult<Option<Direction>> {
        let stored: Option<String> = self
            .redis
            .hget(self.votes_key(post_id), user_id.to_string())
            .await
            .map_err(store_err)?;

        stored
            .map(|value| {
                Direction::from_stored(&value)
                    .ok_or_else(|| AppError::Internal(format!("Malformed vote value: {value}")))
            })
            .transpose()
    }

    async fn commit_vote(&self, change: &VoteChange) -> AppResult<CommitOutcome> {
        let keys = vec![self.votes_key(change.post_id), self.scores_key()];
        let args = vec![
            change.user_id.to_string(),
            change
                .previous
                .map_or_else(String::new, |d| d.as_stored().to_string()),
            change.next.as_stored().to_string(),
            change.delta().to_string(),
            Self::member(change.post_id),
        ];

        let reply: Vec<i64> = self
            .redis
            .eval(COMMIT_VOTE_SCRIPT, keys, args)
            .await
            .map_err(store_err)?;

        match reply.as_slice() {
            [1, score] => Ok(CommitOutcome::Committed { score: *score }),
            [0, _] => {
                debug!(post_id = change.post_id, user_id = change.user_id, "Vote commit conflicted");
                Ok(CommitOutcome::Conflict)
            }
            other => Err(AppError::Internal(format!(
                "Unexpected commit reply: {other:?}"
            ))),
        }
    }

    async fn register(&self, post_id: i64) -> AppResult<bool> {
        let added: i64 = self
            .redis
            .zadd(
                self.scores_key(),
                Some(SetOptions::NX),
                None,
                false,
                false,
                (0.0, Self::member(post_id)),
            )
            .await
            .map_err(store_err)?;

        Ok(added > 0)
    }

    async fn adjust_score(&self, post_id: i64, delta: i64) -> AppResult<i64> {
        let score: f64 = self
            .redis
            .zincrby(self.scores_key(), delta as f64, Self::member(post_id))
            .await
            .map_err(store_err)?;

        Ok(score as i64)
    }

    async fn score_of(&self, post_id: i64) -> AppResult<Option<i64>> {
        let score: Option<f64> = self
            .redis
            .zscore(self.scores_key(), Self::member(post_id))
            .await
            .map_err(store_err)?;

        Ok(score.map(|s| s as i64))
    }

    async fn top_by_score(&self, offset: u64, limit: u64) -> AppResult<Vec<i64>> {
        if limit == 0 {
            return Ok(vec![]);
        }

        let start = i64::try_from(offset).unwrap_or(i64::MAX);
        let stop = start.saturating_add(i64::try_from(limit).unwrap_or(i64::MAX) - 1);

        let members: Vec<String> = self
            .redis
            .zrange(self.scores_key(), start, stop, None, true, None, false)
            .await
            .map_err(store_err)?;

        members.iter().map(|m| Self::parse_member(m)).collect()
    }

    async fn cardinality(&self) -> AppResult<u64> {
        self.redis
            .zcard(self.scores_key())
            .await
            .map_err(store_err)
    }

    async fn remove(&self, post_id: i64) -> AppResult<()> {
        let _: i64 = self
            .redis
            .eval(
                REMOVE_POST_SCRIPT,
                vec![self.votes_key(post_id), self.scores_key()],
                vec![Self::member(post_id)],
            )
            .await
            .map_err(store_err)?;

        Ok(())
    }
}
