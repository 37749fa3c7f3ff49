pub mod claims;
pub mod connection;
pub mod engagement_logs;
pub mod migrations;

pub use claims::PgClaimLedger;
pub use connection::{get_db_pool, DatabaseConfig};
pub use engagement_logs::PgBatchLogSink;
