//! In-process [`UserStore`] used by tests and by the server's `--memory` mode.
//!
//! Ids come from a sequence that is advanced when an insert is staged, so a
//! rolled back insert burns its id the same way a Postgres sequence does.
//! Every call waits for the configured latency on the tokio clock (inserts
//! wait while their transaction is open), which lets tests drive deadline
//! races with a paused runtime.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Mutex;
use userbase_core::{
    clamp_limit, demo_users, NewUser, RequestContext, StoreError, User, UserStore,
};

use crate::tx::{with_transaction, TxHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertFault {
    /// The insert statement reports an error.
    Fail,
    /// The insert panics midway through the transaction.
    Panic,
}

#[derive(Default)]
struct State {
    users: Vec<User>,
    next_id: i64,
}

#[derive(Default)]
struct Counters {
    completed_calls: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

pub struct MemoryUserStore {
    state: Arc<Mutex<State>>,
    counters: Arc<Counters>,
    latency: Duration,
    insert_fault: Option<InsertFault>,
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                users: Vec::new(),
                next_id: 1,
            })),
            counters: Arc::new(Counters::default()),
            latency: Duration::ZERO,
            insert_fault: None,
        }
    }

    /// Store pre-filled with the five demo users (ids 1..=5).
    pub fn seeded() -> Self {
        let created_on = seed_timestamp();
        let users: Vec<User> = demo_users::NAMES
            .iter()
            .zip(1_i64..)
            .map(|(name, id)| User::from_new(id, created_on, NewUser::new(*name)))
            .collect();
        let next_id = users.len() as i64 + 1;
        Self {
            state: Arc::new(Mutex::new(State { users, next_id })),
            ..Self::new()
        }
    }

    /// Every call waits this long before returning.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    #[must_use]
    pub fn with_insert_fault(mut self, fault: InsertFault) -> Self {
        self.insert_fault = Some(fault);
        self
    }

    /// Calls that ran to completion, successful or not.
    pub fn completed_calls(&self) -> usize {
        self.counters.completed_calls.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.counters.commits.load(Ordering::SeqCst)
    }

    /// Explicit rollbacks plus transactions dropped without commit.
    pub fn rollbacks(&self) -> usize {
        self.counters.rollbacks.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn simulate_latency(&self, ctx: &RequestContext) -> Result<(), StoreError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if ctx.is_expired() {
            return Err(StoreError::Unavailable(
                "context deadline exceeded".to_string(),
            ));
        }
        Ok(())
    }

    fn finish_call(&self) {
        self.counters.completed_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        Ok(MemoryTx {
            state: self.state.clone(),
            counters: self.counters.clone(),
            staged: Vec::new(),
            finished: false,
        })
    }
}

fn seed_timestamp() -> DateTime<Utc> {
    Utc.timestamp_opt(10, 10).single().unwrap_or_default()
}

/// Writes staged by a transaction; visible to readers only after commit.
pub struct MemoryTx {
    state: Arc<Mutex<State>>,
    counters: Arc<Counters>,
    staged: Vec<User>,
    finished: bool,
}

impl MemoryTx {
    async fn insert(&mut self, user: NewUser) -> Result<User, StoreError> {
        let id = {
            let mut state = self.state.lock().await;
            let id = state.next_id;
            state.next_id += 1;
            id
        };
        let stored = User::from_new(id, Utc::now(), user);
        self.staged.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl TxHandle for MemoryTx {
    async fn commit(mut self) -> Result<(), StoreError> {
        let staged = std::mem::take(&mut self.staged);
        self.state.lock().await.users.extend(staged);
        self.finished = true;
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), StoreError> {
        self.staged.clear();
        self.finished = true;
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.finished {
            self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert_user(&self, ctx: &RequestContext, user: NewUser) -> Result<User, StoreError> {
        let fault = self.insert_fault;
        let latency = self.latency;
        let deadline = ctx.deadline();
        let result = with_transaction(ctx, self.begin(), move |tx: &mut MemoryTx| {
            Box::pin(async move {
                let stored = tx.insert(user).await?;
                // Latency sits between the write and the commit so a deadline
                // abort lands mid-transaction.
                if !latency.is_zero() {
                    tokio::time::sleep(latency).await;
                }
                if tokio::time::Instant::now() >= deadline {
                    return Err(StoreError::Unavailable(
                        "context deadline exceeded".to_string(),
                    ));
                }
                match fault {
                    Some(InsertFault::Fail) => Err(StoreError::Database(
                        "duplicate key value violates unique constraint \"users_pkey\""
                            .to_string(),
                    )),
                    Some(InsertFault::Panic) => panic!("insert of user {} panicked", stored.id),
                    None => Ok(stored),
                }
            })
        })
        .await;
        self.finish_call();
        result
    }

    async fn get_user_by_id(&self, ctx: &RequestContext, id: i64) -> Result<User, StoreError> {
        self.simulate_latency(ctx).await?;
        let result = self
            .state
            .lock()
            .await
            .users
            .iter()
            .find(|user| user.id == id)
            .cloned()
            .ok_or(StoreError::NotFound);
        self.finish_call();
        result
    }

    async fn fetch_users(
        &self,
        ctx: &RequestContext,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<User>, StoreError> {
        self.simulate_latency(ctx).await?;
        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(clamp_limit(limit)).unwrap_or(0);
        let users = self
            .state
            .lock()
            .await
            .users
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        self.finish_call();
        Ok(users)
    }

    async fn ping(&self, ctx: &RequestContext) -> Result<(), StoreError> {
        self.simulate_latency(ctx).await?;
        self.finish_call();
        Ok(())
    }
}
