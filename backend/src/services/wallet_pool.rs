//! Pool of hot wallets handed out under exclusive, time-bounded locks.
//!
//! Exclusivity comes only from the lock store's atomic `SET NX EX`, so any
//! number of server instances can share the same wallets. A lock whose
//! holder dies expires after [`WALLET_LOCK_TTL_SECS`].
//!
//! Selection order for `acquire(Some(purpose))`:
//! 1. wallets configured for exactly that purpose,
//! 2. wallets tagged `general`,
//! 3. wait and rescan, up to [`WALLET_ACQUIRE_ATTEMPTS`] rounds.
//!
//! `acquire(None)` scans every wallet.

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use crate::constants::*;
use crate::error::WalletPoolError;
use crate::models::WalletPurpose;
use crate::store::LockStore;
use crate::utils::config::WalletEntry;

/// One signing key and the contract it sends to.
#[derive(Clone)]
pub struct WalletConfig {
    pub signer: PrivateKeySigner,
    pub contract_address: Address,
    pub purpose: WalletPurpose,
}

impl WalletConfig {
    pub fn from_entry(entry: &WalletEntry) -> anyhow::Result<Self> {
        let signer = entry
            .private_key
            .parse::<PrivateKeySigner>()
            .map_err(|e| anyhow::anyhow!("Invalid private key for wallet #{}: {}", entry.index, e))?;
        let contract_address = entry
            .contract_address
            .parse::<Address>()
            .map_err(|e| anyhow::anyhow!("Invalid contract address for wallet #{}: {}", entry.index, e))?;

        Ok(Self {
            signer,
            contract_address,
            purpose: entry.purpose,
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    fn lock_key(&self) -> String {
        lock_key_for(self.address())
    }
}

impl fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletConfig")
            .field("address", &self.address())
            .field("contract_address", &self.contract_address)
            .field("purpose", &self.purpose)
            .finish()
    }
}

pub fn lock_key_for(address: Address) -> String {
    format!("{}{}", WALLET_LOCK_PREFIX, address)
}

/// What the business operation gets to use while it holds a lease.
#[derive(Clone)]
pub struct WalletHandle {
    pub signer: PrivateKeySigner,
    pub address: Address,
    pub contract_address: Address,
    pub purpose: WalletPurpose,
}

impl fmt::Debug for WalletHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletHandle")
            .field("address", &self.address)
            .field("contract_address", &self.contract_address)
            .field("purpose", &self.purpose)
            .finish()
    }
}

impl From<&WalletConfig> for WalletHandle {
    fn from(wallet: &WalletConfig) -> Self {
        Self {
            signer: wallet.signer.clone(),
            address: wallet.address(),
            contract_address: wallet.contract_address,
            purpose: wallet.purpose,
        }
    }
}

/// Exclusive use of one wallet. The lock is released by [`WalletLease::release`],
/// or in the background if the lease is dropped while still held.
pub struct WalletLease {
    store: Arc<dyn LockStore>,
    wallet: WalletHandle,
    lock_key: Option<String>,
}

impl WalletLease {
    pub fn wallet(&self) -> &WalletHandle {
        &self.wallet
    }

    pub fn contract_address(&self) -> Address {
        self.wallet.contract_address
    }

    /// `None` when the purpose bypasses pooling.
    pub fn lock_key(&self) -> Option<&str> {
        self.lock_key.as_deref()
    }

    pub async fn release(mut self) {
        if let Some(key) = self.lock_key.take() {
            release_lock(self.store.as_ref(), &key).await;
        }
    }
}

impl fmt::Debug for WalletLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletLease")
            .field("wallet", &self.wallet)
            .field("lock_key", &self.lock_key)
            .finish()
    }
}

impl Drop for WalletLease {
    fn drop(&mut self) {
        let Some(key) = self.lock_key.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = self.store.clone();
                handle.spawn(async move {
                    release_lock(store.as_ref(), &key).await;
                });
            }
            Err(_) => {
                tracing::warn!("Wallet lease {} dropped outside a runtime, lock will expire via TTL", key);
            }
        }
    }
}

async fn release_lock(store: &dyn LockStore, lock_key: &str) {
    match store.delete(lock_key).await {
        Ok(true) => tracing::debug!("Released wallet lock {}", lock_key),
        Ok(false) => tracing::debug!("Wallet lock {} had already expired", lock_key),
        Err(e) => tracing::warn!("Failed to release wallet lock {}: {} (TTL will clear it)", lock_key, e),
    }
}

pub struct WalletPool {
    store: Arc<dyn LockStore>,
    wallets: Vec<WalletConfig>,
    disabled_purposes: HashSet<WalletPurpose>,
    acquire_attempts: u32,
    retry_delay: Duration,
}

impl WalletPool {
    pub fn new(
        store: Arc<dyn LockStore>,
        wallets: Vec<WalletConfig>,
        disabled_purposes: impl IntoIterator<Item = WalletPurpose>,
    ) -> Self {
        let disabled_purposes: HashSet<WalletPurpose> = disabled_purposes.into_iter().collect();
        tracing::info!(
            "Wallet pool initialised with {} wallets ({} purposes bypass pooling)",
            wallets.len(),
            disabled_purposes.len()
        );
        Self {
            store,
            wallets,
            disabled_purposes,
            acquire_attempts: WALLET_ACQUIRE_ATTEMPTS,
            retry_delay: Duration::from_millis(WALLET_ACQUIRE_RETRY_DELAY_MS),
        }
    }

    pub fn from_entries(
        store: Arc<dyn LockStore>,
        entries: &[WalletEntry],
        disabled_purposes: impl IntoIterator<Item = WalletPurpose>,
    ) -> anyhow::Result<Self> {
        let wallets = entries
            .iter()
            .map(WalletConfig::from_entry)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self::new(store, wallets, disabled_purposes))
    }

    pub fn with_retry_schedule(mut self, attempts: u32, delay: Duration) -> Self {
        self.acquire_attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn is_pooling_enabled(&self, purpose: WalletPurpose) -> bool {
        !self.disabled_purposes.contains(&purpose)
    }

    /// Lock a free wallet, preferring `purpose` and overflowing into `general`.
    pub async fn acquire(&self, purpose: Option<WalletPurpose>) -> Result<WalletLease, WalletPoolError> {
        if self.wallets.is_empty() {
            return Err(WalletPoolError::NoWalletsConfigured);
        }

        if let Some(p) = purpose.filter(|p| !self.is_pooling_enabled(*p)) {
            return self.unpooled(p);
        }

        let mut last_error = None;
        for attempt in 0..self.acquire_attempts {
            if let Some(lease) = self.scan(purpose, &mut last_error).await {
                if attempt > 0 {
                    tracing::info!("Acquired wallet {} on attempt {}", lease.wallet.address, attempt + 1);
                }
                return Ok(lease);
            }

            if attempt + 1 < self.acquire_attempts {
                tracing::debug!(
                    "No free wallet for {} on attempt {}, retrying in {}ms",
                    purpose.map(|p| p.as_str()).unwrap_or("any purpose"),
                    attempt + 1,
                    self.retry_delay.as_millis()
                );
                sleep(self.retry_delay).await;
            }
        }

        tracing::warn!(
            "Wallet pool exhausted for {} after {} attempts",
            purpose.map(|p| p.as_str()).unwrap_or("any purpose"),
            self.acquire_attempts
        );
        Err(WalletPoolError::Exhausted {
            attempts: self.acquire_attempts,
            last_error,
        })
    }

    /// Single attempt at one specific wallet.
    pub async fn acquire_address(&self, address: Address) -> Result<WalletLease, WalletPoolError> {
        let wallet = self
            .wallets
            .iter()
            .find(|w| w.address() == address)
            .ok_or_else(|| WalletPoolError::UnknownWallet(address.to_string()))?;

        let key = wallet.lock_key();
        if self.store.set_if_absent(&key, WALLET_LOCK_VALUE, WALLET_LOCK_TTL_SECS).await? {
            Ok(self.lease(wallet, Some(key)))
        } else {
            Err(WalletPoolError::WalletBusy { address: address.to_string() })
        }
    }

    /// Delete a lock key. Failures are logged, never returned.
    pub async fn release(&self, lock_key: &str) {
        release_lock(self.store.as_ref(), lock_key).await;
    }

    /// Run `operation` with a leased wallet and release the lock afterwards,
    /// whatever the operation returned.
    pub async fn with_wallet<T, E, F, Fut>(&self, purpose: Option<WalletPurpose>, operation: F) -> Result<T, E>
    where
        E: From<WalletPoolError>,
        F: FnOnce(WalletHandle) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let lease = self.acquire(purpose).await?;
        let result = operation(lease.wallet().clone()).await;
        lease.release().await;
        result
    }

    async fn scan(&self, purpose: Option<WalletPurpose>, last_error: &mut Option<String>) -> Option<WalletLease> {
        if let Some(p) = purpose {
            for wallet in self.wallets.iter().filter(|w| w.purpose == p) {
                if let Some(lease) = self.try_lock(wallet, last_error).await {
                    return Some(lease);
                }
            }
            if p == WalletPurpose::General {
                return None;
            }
        }

        for wallet in self
            .wallets
            .iter()
            .filter(|w| purpose.is_none() || w.purpose == WalletPurpose::General)
        {
            if let Some(lease) = self.try_lock(wallet, last_error).await {
                return Some(lease);
            }
        }
        None
    }

    async fn try_lock(&self, wallet: &WalletConfig, last_error: &mut Option<String>) -> Option<WalletLease> {
        let key = wallet.lock_key();
        match self.store.set_if_absent(&key, WALLET_LOCK_VALUE, WALLET_LOCK_TTL_SECS).await {
            Ok(true) => {
                tracing::debug!("Locked wallet {} ({})", wallet.address(), wallet.purpose);
                Some(self.lease(wallet, Some(key)))
            }
            Ok(false) => None,
            Err(e) => {
                tracing::warn!("Lock store error while locking {}: {}", key, e);
                *last_error = Some(e.to_string());
                None
            }
        }
    }

    fn unpooled(&self, purpose: WalletPurpose) -> Result<WalletLease, WalletPoolError> {
        let wallet = self
            .wallets
            .iter()
            .find(|w| w.purpose == purpose)
            .or_else(|| self.wallets.iter().find(|w| w.purpose == WalletPurpose::General))
            .ok_or(WalletPoolError::NoWalletForPurpose(purpose))?;
        tracing::debug!("Pooling disabled for {}, using wallet {} unlocked", purpose, wallet.address());
        Ok(self.lease(wallet, None))
    }

    fn lease(&self, wallet: &WalletConfig, lock_key: Option<String>) -> WalletLease {
        WalletLease {
            store: self.store.clone(),
            wallet: WalletHandle::from(wallet),
            lock_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLockStore;

    fn wallet(purpose: WalletPurpose) -> WalletConfig {
        WalletConfig {
            signer: PrivateKeySigner::random(),
            contract_address: Address::ZERO,
            purpose,
        }
    }

    #[test]
    fn test_lock_key_format() {
        let address: Address = "0xAefC770D8515C552C952a30e597d9fbEa99aA756".parse().unwrap();
        assert_eq!(lock_key_for(address), "wallet_lock:0xAefC770D8515C552C952a30e597d9fbEa99aA756");
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let w = wallet(WalletPurpose::General);
        let rendered = format!("{:?}", w);
        assert!(rendered.contains("address"));
        assert!(!rendered.contains("signer"));
    }

    #[tokio::test]
    async fn test_purpose_preferred_over_general() {
        let store = Arc::new(MemoryLockStore::new());
        let general = wallet(WalletPurpose::General);
        let dedicated = wallet(WalletPurpose::LikesRecasts);
        let dedicated_address = dedicated.address();
        let pool = WalletPool::new(store, vec![general, dedicated], []);

        let lease = pool.acquire(Some(WalletPurpose::LikesRecasts)).await.unwrap();
        assert_eq!(lease.wallet().address, dedicated_address);
        lease.release().await;
    }

    #[tokio::test]
    async fn test_acquire_address_reports_busy() {
        let store = Arc::new(MemoryLockStore::new());
        let w = wallet(WalletPurpose::General);
        let address = w.address();
        let pool = WalletPool::new(store, vec![w], []);

        let lease = pool.acquire_address(address).await.unwrap();
        let err = pool.acquire_address(address).await.unwrap_err();
        assert!(matches!(err, WalletPoolError::WalletBusy { .. }));

        lease.release().await;
        assert!(pool.acquire_address(address).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_pool() {
        let pool = WalletPool::new(Arc::new(MemoryLockStore::new()), vec![], []);
        assert!(matches!(pool.acquire(None).await, Err(WalletPoolError::NoWalletsConfigured)));
    }
}
