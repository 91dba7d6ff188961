//! Core business logic for agora.
//!
//! The engagement engine lives here: the vote store, the ranking index and
//! the pagination facade, all built on one [`store::EngagementStore`].

pub mod services;
pub mod store;

pub use services::*;
pub use store::{
    CommitOutcome, Direction, EngagementStore, MemoryEngagementStore, RedisEngagementStore,
    SharedEngagementStore, VoteChange,
};
