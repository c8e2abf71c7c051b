//! In-memory mirror of the record store.
//!
//! Reads for the dashboard, reports and listings come from here. The API
//! writes committed records through immediately, and a periodic full reload
//! picks up changes made elsewhere. A reload that started before a
//! write-through is discarded, so it can never roll a newer record back.
//! Write-throughs arriving out of order keep the copy with the later
//! `updatedAt`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Board, Mill, ServicePartner, User};

/// All four collections at one point in time
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub boards: Vec<Board>,
    pub mills: Vec<Mill>,
    pub partners: Vec<ServicePartner>,
    pub users: Vec<User>,
}

impl Snapshot {
    pub fn board(&self, id: Uuid) -> Option<&Board> {
        self.boards.iter().find(|b| b.id == id)
    }

    pub fn board_by_code(&self, board_id: &str) -> Option<&Board> {
        self.boards.iter().find(|b| b.board_id == board_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SyncState {
    /// No snapshot loaded yet
    Connecting,
    #[serde(rename_all = "camelCase")]
    Live { synced_at: DateTime<Utc> },
    /// Serving the last good snapshot
    #[serde(rename_all = "camelCase")]
    Stale {
        since: DateTime<Utc>,
        last_synced_at: Option<DateTime<Utc>>,
        error: String,
    },
}

impl SyncState {
    pub fn is_live(&self) -> bool {
        matches!(self, SyncState::Live { .. })
    }

    fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        match self {
            SyncState::Connecting => None,
            SyncState::Live { synced_at } => Some(*synced_at),
            SyncState::Stale { last_synced_at, .. } => *last_synced_at,
        }
    }

    /// Same variant, ignoring timestamps
    pub fn same_kind(&self, other: &SyncState) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Where full reloads come from
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn load_snapshot(&self) -> anyhow::Result<Snapshot>;
}

/// Records the live store can hold
pub trait Keyed {
    fn key(&self) -> Uuid;
    fn updated_at(&self) -> DateTime<Utc>;
}

impl Keyed for Board {
    fn key(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Keyed for Mill {
    fn key(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Keyed for ServicePartner {
    fn key(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Keyed for User {
    fn key(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Insert or replace, unless the held copy is newer than `item`.
/// Equal timestamps replace, so writes that leave `updatedAt` alone still land.
fn upsert<T: Keyed>(items: &mut Vec<T>, item: T) {
    match items.iter_mut().find(|existing| existing.key() == item.key()) {
        Some(slot) if slot.updated_at() > item.updated_at() => {}
        Some(slot) => *slot = item,
        None => items.push(item),
    }
}

fn remove<T: Keyed>(items: &mut Vec<T>, id: Uuid) {
    items.retain(|item| item.key() != id);
}

struct Inner {
    snapshot: Arc<Snapshot>,
    state: SyncState,
    /// Bumped by every write-through
    write_seq: u64,
}

#[derive(Clone)]
pub struct LiveStore {
    inner: Arc<RwLock<Inner>>,
}

impl Default for LiveStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                snapshot: Arc::new(Snapshot::default()),
                state: SyncState::Connecting,
                write_seq: 0,
            })),
        }
    }

    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.read().await.snapshot.clone()
    }

    pub async fn sync_state(&self) -> SyncState {
        self.inner.read().await.state.clone()
    }

    /// Snapshot and the state it was served in
    pub async fn view(&self) -> (Arc<Snapshot>, SyncState) {
        let inner = self.inner.read().await;
        (inner.snapshot.clone(), inner.state.clone())
    }

    /// Reload everything from `source`.
    ///
    /// Returns `Ok(false)` when a write-through landed during the load and the
    /// loaded snapshot was dropped. On failure the previous snapshot stays and
    /// the state becomes `Stale`.
    pub async fn refresh<S>(&self, source: &S) -> anyhow::Result<bool>
    where
        S: SnapshotSource + ?Sized,
    {
        let started_at = self.inner.read().await.write_seq;
        let loaded = source.load_snapshot().await;

        let mut inner = self.inner.write().await;
        match loaded {
            Ok(snapshot) => {
                if inner.write_seq != started_at {
                    return Ok(false);
                }
                inner.snapshot = Arc::new(snapshot);
                inner.state = SyncState::Live {
                    synced_at: Utc::now(),
                };
                Ok(true)
            }
            Err(e) => {
                let next = stale(&inner.state, Utc::now(), e.to_string());
                inner.state = next;
                Err(e)
            }
        }
    }

    /// Flip a live store to stale once the last reload is older than `max_age`
    pub async fn check_freshness(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        let mut inner = self.inner.write().await;
        let synced_at = match inner.state {
            SyncState::Live { synced_at } => synced_at,
            _ => return false,
        };
        if synced_at >= now - max_age {
            return false;
        }

        let error = format!("no successful reload for {}s", max_age.num_seconds());
        let next = stale(&inner.state, now, error);
        inner.state = next;
        true
    }

    async fn write<F>(&self, apply: F)
    where
        F: FnOnce(&mut Snapshot),
    {
        let mut inner = self.inner.write().await;
        apply(Arc::make_mut(&mut inner.snapshot));
        inner.write_seq += 1;
    }

    pub async fn put_board(&self, board: Board) {
        self.write(|s| upsert(&mut s.boards, board)).await;
    }

    pub async fn remove_board(&self, id: Uuid) {
        self.write(|s| remove(&mut s.boards, id)).await;
    }

    pub async fn put_mill(&self, mill: Mill) {
        self.write(|s| upsert(&mut s.mills, mill)).await;
    }

    pub async fn remove_mill(&self, id: Uuid) {
        self.write(|s| remove(&mut s.mills, id)).await;
    }

    pub async fn put_partner(&self, partner: ServicePartner) {
        self.write(|s| upsert(&mut s.partners, partner)).await;
    }

    pub async fn remove_partner(&self, id: Uuid) {
        self.write(|s| remove(&mut s.partners, id)).await;
    }

    pub async fn put_user(&self, user: User) {
        self.write(|s| upsert(&mut s.users, user)).await;
    }

    pub async fn remove_user(&self, id: Uuid) {
        self.write(|s| remove(&mut s.users, id)).await;
    }
}

fn stale(current: &SyncState, now: DateTime<Utc>, error: String) -> SyncState {
    let since = match current {
        SyncState::Stale { since, .. } => *since,
        _ => now,
    };
    SyncState::Stale {
        since,
        last_synced_at: current.last_synced_at(),
        error,
    }
}
