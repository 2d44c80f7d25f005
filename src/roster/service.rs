use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::cache::{Clock, SystemClock, TtlLruCache};
use crate::auth::{split_classes, Role};
use crate::database::{Criteria, DataStore, Row, StoreError, Table};

/// A student row from `MemberLookup`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    #[serde(rename = "memberId")]
    pub member_id: String,
    #[serde(default)]
    pub firstname_e: Option<String>,
    #[serde(default)]
    pub lastname_e: Option<String>,
    #[serde(default)]
    pub firstname_c: Option<String>,
    #[serde(default)]
    pub lastname_c: Option<String>,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub classno: Option<i64>,
    #[serde(default)]
    pub rolekey: Option<String>,
    #[serde(default)]
    pub roleid: Option<String>,
}

/// The parts of a teacher's `MemberLookup` row the roster needs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TeacherRecord {
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
}

/// classno arrives as a number, a numeric string or null depending on the source.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("Teacher with email {0} not found")]
    TeacherNotFound(String),

    #[error("Teacher record missing school or class information")]
    IncompleteTeacher,

    #[error("Malformed member record: {0}")]
    MalformedRecord(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// External roster lookups the cache fronts.
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn find_teacher_by_email(&self, email: &str) -> Result<Option<TeacherRecord>, RosterError>;

    async fn find_by_school_and_classes(&self, school: &str, classes: &[String]) -> Result<Vec<Student>, RosterError>;
}

/// Roster lookups over the `MemberLookup` table of any `DataStore`.
pub struct StoreRosterSource {
    store: Arc<dyn DataStore>,
}

impl StoreRosterSource {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

fn from_row<T: for<'de> Deserialize<'de>>(row: Row) -> Result<T, RosterError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| RosterError::MalformedRecord(e.to_string()))
}

#[async_trait]
impl RosterSource for StoreRosterSource {
    async fn find_teacher_by_email(&self, email: &str) -> Result<Option<TeacherRecord>, RosterError> {
        let criteria = Criteria::new(Table::MemberLookup).eq("email", email).limit(1);
        match self.store.select(&criteria).await?.into_iter().next() {
            Some(row) => Ok(Some(from_row(row)?)),
            None => Ok(None),
        }
    }

    async fn find_by_school_and_classes(&self, school: &str, classes: &[String]) -> Result<Vec<Student>, RosterError> {
        let criteria = Criteria::new(Table::MemberLookup)
            .select(&[
                "memberId", "firstname_e", "lastname_e", "firstname_c", "lastname_c",
                "school", "class", "classno", "rolekey", "roleid",
            ])
            .eq("rolekey", Role::Students.as_str())
            .eq("school", school)
            .within("class", classes.iter().cloned());
        self.store
            .select(&criteria)
            .await?
            .into_iter()
            .map(from_row)
            .collect()
    }
}

/// Students per teacher email, cached with absolute TTL and LRU eviction.
///
/// Concurrent misses for the same teacher may each reach the source; the
/// lock is only held for cache bookkeeping, never across a lookup.
pub struct RosterService {
    source: Arc<dyn RosterSource>,
    cache: Mutex<TtlLruCache<String, Vec<Student>>>,
    clock: Arc<dyn Clock>,
}

impl RosterService {
    pub fn new(source: Arc<dyn RosterSource>, capacity: usize, ttl: Duration) -> Self {
        Self::with_clock(source, capacity, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(source: Arc<dyn RosterSource>, capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            cache: Mutex::new(TtlLruCache::new(capacity, ttl)),
            clock,
        }
    }

    pub async fn get_students(&self, teacher_email: &str) -> Result<Arc<Vec<Student>>, RosterError> {
        let key = teacher_email.to_string();
        if let Some(hit) = self.cache.lock().await.get(&key, self.clock.now()) {
            debug!("Roster cache hit for {}", teacher_email);
            return Ok(hit);
        }

        debug!("Roster cache miss for {}", teacher_email);
        let students = self.lookup(teacher_email).await?;
        info!("Found {} students for teacher: {}", students.len(), teacher_email);

        let now = self.clock.now();
        Ok(self.cache.lock().await.insert(key, students, now))
    }

    async fn lookup(&self, teacher_email: &str) -> Result<Vec<Student>, RosterError> {
        let teacher = self
            .source
            .find_teacher_by_email(teacher_email)
            .await?
            .ok_or_else(|| RosterError::TeacherNotFound(teacher_email.to_string()))?;

        let school = teacher.school.filter(|s| !s.is_empty());
        let class = teacher.class.filter(|c| !c.is_empty());
        let (school, class) = match (school, class) {
            (Some(school), Some(class)) => (school, class),
            _ => return Err(RosterError::IncompleteTeacher),
        };
        let classes = split_classes(&class);
        if classes.is_empty() {
            return Err(RosterError::IncompleteTeacher);
        }

        self.source.find_by_school_and_classes(&school, &classes).await
    }

    pub async fn invalidate(&self, teacher_email: &str) -> bool {
        self.cache.lock().await.remove(&teacher_email.to_string())
    }

    pub async fn invalidate_all(&self) {
        self.cache.lock().await.clear();
    }

    pub async fn cached_entries(&self) -> usize {
        self.cache.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Instant;

    use crate::database::MemoryStore;
    use serde_json::json;

    struct ManualClock(StdMutex<Instant>);

    impl ManualClock {
        fn new() -> Self {
            Self(StdMutex::new(Instant::now()))
        }

        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.0.lock().unwrap()
        }
    }

    /// Source answering every teacher with one student, counting lookups.
    #[derive(Default)]
    struct CountingSource {
        teacher_lookups: AtomicUsize,
    }

    #[async_trait]
    impl RosterSource for CountingSource {
        async fn find_teacher_by_email(&self, email: &str) -> Result<Option<TeacherRecord>, RosterError> {
            self.teacher_lookups.fetch_add(1, Ordering::SeqCst);
            if email.starts_with("missing") {
                return Ok(None);
            }
            Ok(Some(TeacherRecord {
                school: Some("S".to_string()),
                class: Some("1A".to_string()),
            }))
        }

        async fn find_by_school_and_classes(&self, school: &str, classes: &[String]) -> Result<Vec<Student>, RosterError> {
            Ok(vec![Student {
                member_id: format!("{}-{}", school, classes.join("+")),
                firstname_e: None,
                lastname_e: None,
                firstname_c: None,
                lastname_c: None,
                school: Some(school.to_string()),
                class: classes.first().cloned(),
                classno: Some(1),
                rolekey: Some("students".to_string()),
                roleid: None,
            }])
        }
    }

    fn service(capacity: usize) -> (Arc<CountingSource>, Arc<ManualClock>, RosterService) {
        let source = Arc::new(CountingSource::default());
        let clock = Arc::new(ManualClock::new());
        let svc = RosterService::with_clock(source.clone(), capacity, Duration::from_secs(60), clock.clone());
        (source, clock, svc)
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let (source, _clock, svc) = service(10);
        svc.get_students("t@s.edu").await.unwrap();
        svc.get_students("t@s.edu").await.unwrap();
        assert_eq!(source.teacher_lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_new_lookup() {
        let (source, clock, svc) = service(10);
        svc.get_students("t@s.edu").await.unwrap();
        clock.advance(Duration::from_secs(30));
        svc.get_students("t@s.edu").await.unwrap();
        assert_eq!(source.teacher_lookups.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(30));
        svc.get_students("t@s.edu").await.unwrap();
        assert_eq!(source.teacher_lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let (source, _clock, svc) = service(2);
        svc.get_students("a@s.edu").await.unwrap();
        svc.get_students("b@s.edu").await.unwrap();
        svc.get_students("a@s.edu").await.unwrap(); // a is now most recent
        svc.get_students("c@s.edu").await.unwrap(); // evicts b
        assert_eq!(source.teacher_lookups.load(Ordering::SeqCst), 3);
        assert_eq!(svc.cached_entries().await, 2);

        svc.get_students("a@s.edu").await.unwrap();
        assert_eq!(source.teacher_lookups.load(Ordering::SeqCst), 3);
        svc.get_students("b@s.edu").await.unwrap();
        assert_eq!(source.teacher_lookups.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let (source, _clock, svc) = service(10);
        let err = svc.get_students("missing@s.edu").await.unwrap_err();
        assert!(matches!(err, RosterError::TeacherNotFound(_)));
        assert!(svc.get_students("missing@s.edu").await.is_err());
        assert_eq!(source.teacher_lookups.load(Ordering::SeqCst), 2);
        assert_eq!(svc.cached_entries().await, 0);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let (source, _clock, svc) = service(10);
        svc.get_students("a@s.edu").await.unwrap();
        svc.get_students("b@s.edu").await.unwrap();
        assert!(svc.invalidate("a@s.edu").await);
        svc.get_students("a@s.edu").await.unwrap();
        assert_eq!(source.teacher_lookups.load(Ordering::SeqCst), 3);

        svc.invalidate_all().await;
        assert_eq!(svc.cached_entries().await, 0);
    }

    #[tokio::test]
    async fn test_store_source_resolves_school_and_classes() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                Table::MemberLookup,
                vec![
                    json!({"memberId": "t1", "email": "t@s.edu", "school": "S", "class": "1A, 1B", "rolekey": "teachers"}),
                    json!({"memberId": "s1", "email": "s1@s.edu", "school": "S", "class": "1A", "classno": "3", "rolekey": "students"}),
                    json!({"memberId": "s2", "email": "s2@s.edu", "school": "S", "class": "1B", "classno": 4, "rolekey": "students"}),
                    json!({"memberId": "s3", "email": "s3@s.edu", "school": "X", "class": "1A", "classno": 1, "rolekey": "students"}),
                    json!({"memberId": "s4", "email": "s4@s.edu", "school": "S", "class": "2C", "classno": 1, "rolekey": "students"}),
                ],
            )
            .await;
        let svc = RosterService::new(
            Arc::new(StoreRosterSource::new(store)),
            10,
            Duration::from_secs(60),
        );

        let students = svc.get_students("t@s.edu").await.unwrap();
        let ids: Vec<&str> = students.iter().map(|s| s.member_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert_eq!(students[0].classno, Some(3));
    }

    #[tokio::test]
    async fn test_teacher_without_classes_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                Table::MemberLookup,
                vec![json!({"memberId": "t1", "email": "t@s.edu", "school": "S", "class": " , "})],
            )
            .await;
        let svc = RosterService::new(Arc::new(StoreRosterSource::new(store)), 10, Duration::from_secs(60));
        let err = svc.get_students("t@s.edu").await.unwrap_err();
        assert!(matches!(err, RosterError::IncompleteTeacher));
    }
}
