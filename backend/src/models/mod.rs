pub mod claims;
pub mod engagement;
pub mod tokens;
pub mod wallets;

pub use claims::{ClaimReceipt, ClaimRecord};
pub use engagement::{ActionDetail, ActionType, BatchResults, BatchState, BatchSummary, Reaction, Signer};
pub use tokens::{AuthToken, NonceRecord, TokenPayload, VerifiedIdentity};
pub use wallets::WalletPurpose;
