pub mod batch;
pub mod claim;
pub mod contract;
pub mod neynar;
pub mod retry;
pub mod tokens;
pub mod wallet_pool;

pub use batch::{BatchLogSink, BatchOutcome, BatchProcessor, BatchReport};
pub use claim::{ClaimLedger, ClaimService};
pub use contract::{ChainSubmitter, ContractService};
pub use neynar::{EngagementApi, NeynarClient};
pub use retry::{retry_with_backoff, RetryPolicy, Retryable};
pub use tokens::TokenService;
pub use wallet_pool::{WalletConfig, WalletHandle, WalletLease, WalletPool};
