//! Persistence model for the SeoFlow backend: SeaORM entities and the typed
//! platform credentials stored on integrations.

pub mod credentials;
pub mod entities;
