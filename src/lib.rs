pub mod config;
pub mod dashboard;
pub mod dataset;
pub mod export;
pub mod fatigue;
pub mod model;
pub mod record;
pub mod source_db;
pub mod summary;
