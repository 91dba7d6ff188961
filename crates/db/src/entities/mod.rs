//! Database entities.

pub mod post;
pub mod user;

pub use post::Entity as Post;
pub use user::Entity as User;
