mod news;
mod schema;
mod types;

pub use schema::Store;
pub use types::{InsertOutcome, NewsRecord, StoreError};
