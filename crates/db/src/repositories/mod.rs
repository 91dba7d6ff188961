//! Repositories for database access.

pub mod post;
pub mod user;

pub use post::PostRepository;
pub use user::UserRepository;
