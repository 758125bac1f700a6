pub mod articles;
pub mod auth;
pub mod backlinks;
pub mod health;
pub mod integrations;
pub mod keywords;
pub mod projects;
pub mod webhooks;
pub mod wordpress;
