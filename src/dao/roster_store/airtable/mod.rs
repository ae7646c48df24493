mod config;
mod error;
mod models;
mod store;

pub use config::AirtableConfig;
pub use error::AirtableDaoError;
pub use store::AirtableRosterStore;
