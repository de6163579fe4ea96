//! Job store abstraction with time-based retention.
//!
//! Job records live only in memory. Each record is dropped once it is older
//! than the retention window, whatever its status; the manifest on disk is
//! what survives.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Registry of in-memory job records.
///
/// Implementations must be cheap and synchronous: they are called from
/// inside request handling and job bookkeeping, never across an await.
pub trait JobStore<J>: Send + Sync
where
    J: Send + Sync + 'static,
{
    /// Returns a live (non-expired) job.
    fn get(&self, job_id: &str) -> Option<Arc<J>>;

    /// Inserts or replaces a job record.
    fn put(&self, job_id: String, job: Arc<J>);

    /// Inserts the job unless a live record satisfies `conflicts`.
    ///
    /// Check and insert happen atomically. On conflict the existing job is
    /// returned and nothing is inserted.
    fn put_unless(
        &self,
        job_id: String,
        job: Arc<J>,
        conflicts: &dyn Fn(&J) -> bool,
    ) -> Result<(), Arc<J>>;

    /// Live jobs matching `predicate`.
    fn find(&self, predicate: &dyn Fn(&J) -> bool) -> Vec<Arc<J>>;

    /// Drops expired records and returns how many were removed.
    fn sweep(&self) -> usize;

    /// Number of live records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Entry<J> {
    inserted_at: DateTime<Utc>,
    job: Arc<J>,
}

/// `HashMap`-backed [`JobStore`] with a fixed retention window.
pub struct InMemoryJobStore<J> {
    entries: Mutex<HashMap<String, Entry<J>>>,
    retention: Duration,
    clock: Arc<dyn Clock>,
}

impl<J> InMemoryJobStore<J> {
    /// Creates a store that forgets records after `retention`.
    pub fn new(retention: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            retention,
            clock,
        }
    }

    /// Store using wall-clock time.
    pub fn with_system_clock(retention: Duration) -> Self {
        Self::new(retention, Arc::new(SystemClock))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry<J>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn evict_expired(&self, entries: &mut HashMap<String, Entry<J>>) -> usize {
        let cutoff = self.clock.now() - self.retention;
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at > cutoff);
        before - entries.len()
    }
}

impl<J> JobStore<J> for InMemoryJobStore<J>
where
    J: Send + Sync + 'static,
{
    fn get(&self, job_id: &str) -> Option<Arc<J>> {
        let mut entries = self.lock();
        self.evict_expired(&mut entries);
        entries.get(job_id).map(|entry| entry.job.clone())
    }

    fn put(&self, job_id: String, job: Arc<J>) {
        let mut entries = self.lock();
        self.evict_expired(&mut entries);
        let inserted_at = self.clock.now();
        entries.insert(job_id, Entry { inserted_at, job });
    }

    fn put_unless(
        &self,
        job_id: String,
        job: Arc<J>,
        conflicts: &dyn Fn(&J) -> bool,
    ) -> Result<(), Arc<J>> {
        let mut entries = self.lock();
        self.evict_expired(&mut entries);
        if let Some(existing) = entries.values().find(|entry| conflicts(&entry.job)) {
            return Err(existing.job.clone());
        }
        let inserted_at = self.clock.now();
        entries.insert(job_id, Entry { inserted_at, job });
        Ok(())
    }

    fn find(&self, predicate: &dyn Fn(&J) -> bool) -> Vec<Arc<J>> {
        let mut entries = self.lock();
        self.evict_expired(&mut entries);
        let mut matches: Vec<(DateTime<Utc>, Arc<J>)> = entries
            .values()
            .filter(|entry| predicate(&entry.job))
            .map(|entry| (entry.inserted_at, entry.job.clone()))
            .collect();
        // Most recent first
        matches.sort_by(|a, b| b.0.cmp(&a.0));
        matches.into_iter().map(|(_, job)| job).collect()
    }

    fn sweep(&self) -> usize {
        let mut entries = self.lock();
        self.evict_expired(&mut entries)
    }

    fn len(&self) -> usize {
        let mut entries = self.lock();
        self.evict_expired(&mut entries);
        entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FakeJob {
        session_id: String,
        active: bool,
    }

    fn job(session_id: &str, active: bool) -> Arc<FakeJob> {
        Arc::new(FakeJob {
            session_id: session_id.to_string(),
            active,
        })
    }

    fn store_with_clock() -> (InMemoryJobStore<FakeJob>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = InMemoryJobStore::new(Duration::minutes(60), clock.clone());
        (store, clock)
    }

    #[test]
    fn test_put_and_get() {
        let (store, _clock) = store_with_clock();
        store.put("job-1".to_string(), job("s1", true));

        let found = store.get("job-1").unwrap();
        assert_eq!(found.session_id, "s1");
        assert!(store.get("job-2").is_none());
    }

    #[test]
    fn test_records_expire_after_retention_regardless_of_status() {
        let (store, clock) = store_with_clock();
        store.put("running".to_string(), job("s1", true));
        store.put("finished".to_string(), job("s2", false));

        clock.advance(Duration::minutes(59));
        assert_eq!(store.len(), 2);

        clock.advance(Duration::minutes(2));
        assert!(store.get("running").is_none());
        assert!(store.get("finished").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep_reports_removed_count() {
        let (store, clock) = store_with_clock();
        store.put("old".to_string(), job("s1", false));
        clock.advance(Duration::minutes(30));
        store.put("new".to_string(), job("s2", false));
        clock.advance(Duration::minutes(31));

        assert_eq!(store.sweep(), 1);
        assert!(store.get("new").is_some());
        assert_eq!(store.sweep(), 0);
    }

    #[test]
    fn test_put_unless_rejects_conflicting_live_job() {
        let (store, _clock) = store_with_clock();
        store.put("first".to_string(), job("s1", true));

        let same_session_active = |j: &FakeJob| j.session_id == "s1" && j.active;
        let rejected =
            store.put_unless("second".to_string(), job("s1", true), &same_session_active);
        assert_eq!(rejected.unwrap_err().session_id, "s1");
        assert!(store.get("second").is_none());

        let other_session = |j: &FakeJob| j.session_id == "s2" && j.active;
        assert!(store
            .put_unless("third".to_string(), job("s2", true), &other_session)
            .is_ok());
    }

    #[test]
    fn test_expired_job_no_longer_conflicts() {
        let (store, clock) = store_with_clock();
        store.put("first".to_string(), job("s1", true));
        clock.advance(Duration::minutes(61));

        let same_session_active = |j: &FakeJob| j.session_id == "s1" && j.active;
        assert!(store
            .put_unless("second".to_string(), job("s1", true), &same_session_active)
            .is_ok());
    }

    #[test]
    fn test_find_returns_most_recent_first() {
        let (store, clock) = store_with_clock();
        store.put("a".to_string(), job("s1", false));
        clock.advance(Duration::seconds(5));
        store.put("b".to_string(), job("s1", true));
        store.put("c".to_string(), job("s2", true));

        let found = store.find(&|j: &FakeJob| j.session_id == "s1");
        assert_eq!(found.len(), 2);
        assert!(found[0].active);
    }
}
