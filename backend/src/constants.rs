// =============================================================================
// Dispatcher Backend Constants
// =============================================================================
// Tunables for the wallet pool, one-time tokens and the engagement batch
// driver, kept in one place.

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP port when PORT is not set
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Header carrying the shared secret for internal endpoints
pub const INTERNAL_SECRET_HEADER: &str = "x-internal-secret";

// =============================================================================
// WALLET POOL
// =============================================================================

/// Lock store key prefix for wallet locks
pub const WALLET_LOCK_PREFIX: &str = "wallet_lock:";

/// Sentinel value stored under a wallet lock
pub const WALLET_LOCK_VALUE: &str = "1";

/// Wallet lock TTL; a crashed holder's lock heals after this long
pub const WALLET_LOCK_TTL_SECS: u64 = 60;

/// Full dedicated-then-general scans before giving up
pub const WALLET_ACQUIRE_ATTEMPTS: u32 = 3;

/// Pause between acquisition rounds
pub const WALLET_ACQUIRE_RETRY_DELAY_MS: u64 = 1000;

/// Upper bound on HOT_WALLET_<n>_* entries scanned from the environment
pub const MAX_CONFIGURED_WALLETS: usize = 64;

// =============================================================================
// RETRY POLICY
// =============================================================================

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

// =============================================================================
// ONE-TIME TOKENS
// =============================================================================

/// Lock store key prefix for the single-use nonce registry
pub const TOKEN_NONCE_PREFIX: &str = "miniapp-token:";

/// Nonce registry TTL
pub const TOKEN_TTL_SECS: u64 = 300;

/// Maximum token age accepted by the verifier
pub const TOKEN_MAX_AGE_MS: i64 = 300_000;

/// Random bytes in a token nonce (hex encoded on the wire)
pub const TOKEN_NONCE_BYTES: usize = 16;

// =============================================================================
// ENGAGEMENT BATCHES
// =============================================================================

/// Lock store key prefix for persisted batch state
pub const BATCH_KEY_PREFIX: &str = "likes-recasts-batch:";

/// Signers processed per batch per driver pass
pub const BATCH_WINDOW_SIZE: usize = 5;

/// Courtesy delay between signers inside a window
pub const BATCH_SIGNER_DELAY_MS: u64 = 1000;

/// Abandoned batches are garbage-collected after a day
pub const BATCH_STATE_TTL_SECS: u64 = 86_400;

/// Signer status eligible for engagement
pub const SIGNER_STATUS_APPROVED: &str = "approved";

/// Lock store key prefix for the per-batch processing lease. Must not start
/// with BATCH_KEY_PREFIX or the driver would list leases as batches.
pub const BATCH_LEASE_PREFIX: &str = "likes-recasts-lease:";

/// Covers one full window: 5 signers x (2 reactions x 10s timeout + 1s delay)
pub const BATCH_LEASE_TTL_SECS: u64 = 120;

// =============================================================================
// CLAIMS
// =============================================================================

/// Claim row reserved before the transaction is sent
pub const CLAIM_STATUS_PENDING: &str = "pending";

/// Claim row whose transaction hash is recorded
pub const CLAIM_STATUS_SENT: &str = "sent";

// =============================================================================
// EXTERNAL SERVICES
// =============================================================================

pub const NEYNAR_API_BASE_URL: &str = "https://api.neynar.com/v2/farcaster";

pub const NEYNAR_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Seconds to wait for a claim transaction receipt
pub const CLAIM_RECEIPT_TIMEOUT_SECS: u64 = 30;

/// Seconds to wait for gas estimation
pub const GAS_ESTIMATE_TIMEOUT_SECS: u64 = 15;
