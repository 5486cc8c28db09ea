pub mod calculations;
pub mod db;
pub mod derivation;
pub mod lifecycle;
pub mod listing;
pub mod models;
pub mod numbering;
pub mod service;
pub mod validation;

pub use db::repository::{DocumentRepository, RepositoryError};
pub use models::*;
