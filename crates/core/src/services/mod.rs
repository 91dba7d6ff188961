//! Business logic services.

#![allow(missing_docs)]

pub mod pagination;
pub mod post;
pub mod ranking;
pub mod user;
pub mod vote;

pub use pagination::{ListOrder, Page, PageBounds, PageRequest, PaginationService, RecencySource};
pub use post::{CreatePostInput, PostService, PostView};
pub use ranking::RankingService;
pub use user::{CreateUserInput, UserService};
pub use vote::{VoteReceipt, VoteService, evaluate_vote};
