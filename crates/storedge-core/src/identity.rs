//! Identity and clock providers
//!
//! Both are injected into services as `Arc<dyn ...>` so tests can pin time and ids.

use std::sync::Mutex;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use ulid::Generator;

use crate::error::AppError;
use crate::models::FileId;

/// Source of new file identifiers.
pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> Result<FileId, AppError>;
}

/// Monotonic ULID generator.
///
/// Ids generated within the same millisecond still sort in generation order.
pub struct UlidGenerator {
    inner: Mutex<Generator>,
}

impl UlidGenerator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }
}

impl Default for UlidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for UlidGenerator {
    fn new_id(&self) -> Result<FileId, AppError> {
        let mut generator = self
            .inner
            .lock()
            .map_err(|_| AppError::Internal("ULID generator lock poisoned".to_string()))?;
        let ulid = generator
            .generate()
            .map_err(|e| AppError::Internal(format!("ULID generation failed: {}", e)))?;
        Ok(FileId::from_ulid(ulid))
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current UTC time at microsecond precision.
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        // Catalog timestamps are stored with microsecond precision.
        Utc::now().trunc_subsecs(6)
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Returns `start`, then advances by `step` on every call.
pub struct SteppingClock {
    next: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl SteppingClock {
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = match self.next.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = *next;
        *next = now + self.step;
        now
    }
}
