//! Testing utilities for the vaultshift workspace
//!
//! Shared fixtures, a fault-injecting store and a controller harness.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};
use vaultshift_core::{Clock, Collaborators, IntegrationConfig, IntegrationController};
use vaultshift_model::{Account, AccountKind, LegacyRecord, Transaction};
use vaultshift_store::{
    json_stores, KeyValueStore, LegacyStore, MemoryStore, PrivacyStore, StoreError, StoreResult,
};

/// Fixed instant used by fixtures
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

/// Clean legacy record: balance 120.50, 3 transactions, 1 account
pub fn scenario_a_record() -> LegacyRecord {
    let day = Duration::days(1);
    LegacyRecord::new("Ada Lovelace", "ada@example.com", "EUR")
        .with_balance(120.50)
        .with_account(Account::new("acc-main", "Main", 120.50).with_kind(AccountKind::Checking))
        .with_transaction(
            Transaction::new("t-1", 200.0, "Salary")
                .on(epoch())
                .in_account("acc-main")
                .with_category("income"),
        )
        .with_transaction(
            Transaction::new("t-2", -54.25, "Groceries")
                .on(epoch() + day)
                .in_account("acc-main")
                .with_category("food"),
        )
        .with_transaction(
            Transaction::new("t-3", -25.25, "Books")
                .on(epoch() + day * 2)
                .in_account("acc-main"),
        )
}

/// Record whose last transaction references an account that does not exist
pub fn scenario_b_record() -> LegacyRecord {
    scenario_a_record().with_transaction(
        Transaction::new("t-4", -10.0, "Orphan")
            .on(epoch() + Duration::days(3))
            .in_account("acc-missing"),
    )
}

/// Pause point for a store write
///
/// The first gated write signals [`Gate::reached`] and then waits until
/// [`Gate::open`] is called.
#[derive(Debug)]
pub struct Gate {
    reached: Notify,
    release: Semaphore,
}

impl Gate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            reached: Notify::new(),
            release: Semaphore::new(0),
        })
    }

    /// Wait until a gated write is parked
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    /// Let every parked and future gated write through
    pub fn open(&self) {
        self.release.close();
    }

    async fn pass(&self) {
        self.reached.notify_one();
        // a closed semaphore means the gate is open
        let _ = self.release.acquire().await;
    }
}

/// Key-value wrapper with injectable failures
pub struct FaultyStore {
    inner: Arc<dyn KeyValueStore>,
    failing_writes: Mutex<HashSet<String>>,
    failing_deletes: Mutex<HashSet<String>>,
    panicking_writes: Mutex<HashSet<String>>,
    fail_put_new: AtomicBool,
    gates: Mutex<Vec<(String, Arc<Gate>)>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner,
            failing_writes: Mutex::new(HashSet::new()),
            failing_deletes: Mutex::new(HashSet::new()),
            panicking_writes: Mutex::new(HashSet::new()),
            fail_put_new: AtomicBool::new(false),
            gates: Mutex::new(Vec::new()),
        }
    }

    /// `put` to `key` fails until healed
    pub fn fail_writes_to(&self, key: impl Into<String>) {
        self.failing_writes.lock().insert(key.into());
    }

    /// `delete` of `key` fails until healed
    pub fn fail_deletes_of(&self, key: impl Into<String>) {
        self.failing_deletes.lock().insert(key.into());
    }

    /// `put` to `key` panics, taking the calling task down with it
    pub fn panic_on_writes_to(&self, key: impl Into<String>) {
        self.panicking_writes.lock().insert(key.into());
    }

    /// Every `put_new` fails until healed
    pub fn fail_archive_writes(&self) {
        self.fail_put_new.store(true, Ordering::SeqCst);
    }

    /// Clear every injected failure
    pub fn heal(&self) {
        self.failing_writes.lock().clear();
        self.failing_deletes.lock().clear();
        self.panicking_writes.lock().clear();
        self.fail_put_new.store(false, Ordering::SeqCst);
    }

    /// Park `put` to `key` until the returned gate opens
    pub fn gate_writes_to(&self, key: impl Into<String>) -> Arc<Gate> {
        let gate = Gate::new();
        self.gates.lock().push((key.into(), Arc::clone(&gate)));
        gate
    }

    fn gate_for(&self, key: &str) -> Option<Arc<Gate>> {
        self.gates
            .lock()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, gate)| Arc::clone(gate))
    }
}

impl std::fmt::Debug for FaultyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultyStore")
            .field("failing_writes", &*self.failing_writes.lock())
            .field("failing_deletes", &*self.failing_deletes.lock())
            .field("fail_put_new", &self.fail_put_new)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyValueStore for FaultyStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        if let Some(gate) = self.gate_for(key) {
            gate.pass().await;
        }
        if self.panicking_writes.lock().contains(key) {
            panic!("injected panic writing {key}");
        }
        if self.failing_writes.lock().contains(key) {
            return Err(StoreError::Backend(format!("injected write failure for {key}")));
        }
        self.inner.put(key, value).await
    }

    async fn put_new(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        if self.fail_put_new.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!("injected archive failure for {key}")));
        }
        self.inner.put_new(key, value).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        if self.failing_deletes.lock().contains(key) {
            return Err(StoreError::Backend(format!("injected delete failure for {key}")));
        }
        self.inner.delete(key).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.inner.keys_with_prefix(prefix).await
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(at) }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Controller wired over in-memory stores behind a [`FaultyStore`]
pub struct Harness {
    pub config: IntegrationConfig,
    pub backend: Arc<MemoryStore>,
    pub faults: Arc<FaultyStore>,
    pub legacy: Arc<dyn LegacyStore>,
    pub privacy: Arc<dyn PrivacyStore>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(IntegrationConfig::default())
    }

    pub fn with_config(config: IntegrationConfig) -> Self {
        let backend = Arc::new(MemoryStore::new());
        let faults = Arc::new(FaultyStore::new(backend.clone()));
        let (legacy, privacy) = json_stores(faults.clone(), &config.keys);
        Self {
            config,
            backend,
            faults,
            legacy: Arc::new(legacy),
            privacy: Arc::new(privacy),
            clock: Arc::new(ManualClock::new(epoch())),
        }
    }

    /// Store a legacy record, builder style
    pub async fn with_legacy(self, record: LegacyRecord) -> Self {
        self.legacy.save(&record).await.unwrap();
        self
    }

    /// Start a controller over the harness stores
    pub async fn controller(&self) -> IntegrationController {
        let collaborators = Collaborators::new(
            Arc::clone(&self.legacy),
            Arc::clone(&self.privacy),
            self.faults.clone(),
        )
        .with_clock(self.clock.clone());
        IntegrationController::new(self.config.clone(), collaborators)
            .await
            .unwrap()
    }

    /// Key the financial record is stored under
    pub fn financial_key(&self) -> &str {
        &self.config.keys.financial
    }

    pub fn profile_key(&self) -> &str {
        &self.config.keys.profile
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
