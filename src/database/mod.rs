pub mod criteria;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use criteria::{Criteria, Lang, SortDirection, Table};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{DataStore, Row, UpsertOutcome};
