//! Audit discipline: timestamp triples, freshness and data-mode enforcement.

pub mod clock;

pub use clock::{
    AuditClock, AuditStamp, FixedTimeSource, Millis, SystemTimeSource, TimeSource,
    MILLIS_PER_DAY, MILLIS_PER_HOUR, MILLIS_PER_SEC,
};
