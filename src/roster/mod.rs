//! Teacher roster lookup fronted by a TTL/LRU cache.

pub mod cache;
pub mod service;

pub use cache::{Clock, SystemClock, TtlLruCache};
pub use service::{RosterError, RosterService, RosterSource, StoreRosterSource, Student, TeacherRecord};
