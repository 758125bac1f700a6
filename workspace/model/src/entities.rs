//! SeaORM entity modules for the SeoFlow schema.
//!
//! Ownership flows user → project → (keyword, article, backlink,
//! integration). Ownership of child rows is checked per request by the API
//! layer; the schema only guarantees referential integrity.

pub mod account;
pub mod article;
pub mod backlink;
pub mod integration;
pub mod keyword;
pub mod project;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::account::Entity as Account;
    pub use super::article::Entity as Article;
    pub use super::backlink::Entity as Backlink;
    pub use super::integration::Entity as Integration;
    pub use super::keyword::Entity as Keyword;
    pub use super::project::Entity as Project;
    pub use super::user::Entity as User;
}
