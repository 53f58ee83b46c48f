use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use nt_core::{Clock, Error, Persistence, QuotaStatus, Result};
use tracing::{debug, info};

/// Per-user daily call counter. One usage row per (user, local calendar
/// date); the row's window ends at the next local midnight.
pub struct UsageLedger {
    storage: Arc<dyn Persistence>,
    clock: Arc<dyn Clock>,
    daily_limit: u32,
    offset: FixedOffset,
}

impl fmt::Debug for UsageLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsageLedger")
            .field("daily_limit", &self.daily_limit)
            .field("offset", &self.offset)
            .finish()
    }
}

impl UsageLedger {
    pub fn new(storage: Arc<dyn Persistence>, clock: Arc<dyn Clock>, daily_limit: u32, offset: FixedOffset) -> Self {
        Self {
            storage,
            clock,
            daily_limit,
            offset,
        }
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Local date key for `now` and the instant the day ends.
    pub fn day_window(&self, now: DateTime<Utc>) -> Result<(NaiveDate, DateTime<Utc>)> {
        let date = now.with_timezone(&self.offset).date_naive();
        let next_midnight = date
            .succ_opt()
            .and_then(|next| next.and_hms_opt(0, 0, 0))
            .ok_or_else(|| Error::Config(format!("no day after {}", date)))?;
        let reset_at = self
            .offset
            .from_local_datetime(&next_midnight)
            .single()
            .ok_or_else(|| Error::Config(format!("ambiguous local midnight after {}", date)))?;
        Ok((date, reset_at.with_timezone(&Utc)))
    }

    /// Counts one call for `user_id` if the daily limit allows it. The compare
    /// and the increment are a single storage operation.
    pub async fn check_and_count(&self, user_id: &str) -> Result<QuotaStatus> {
        let (date, reset_at) = self.day_window(self.clock.now())?;
        let increment = self
            .storage
            .increment_usage(user_id, date, self.daily_limit, reset_at)
            .await?;

        let status = QuotaStatus {
            allowed: increment.allowed,
            current: increment.record.count,
            limit: self.daily_limit,
            reset_at: increment.record.reset_at,
        };
        if status.allowed {
            debug!(user = user_id, current = status.current, limit = status.limit, "Usage counted");
        } else {
            info!(user = user_id, current = status.current, limit = status.limit, reset_at = %status.reset_at, "🚫 Daily quota exhausted");
        }
        Ok(status)
    }

    /// Current standing without counting a call.
    pub async fn peek(&self, user_id: &str) -> Result<QuotaStatus> {
        let (date, reset_at) = self.day_window(self.clock.now())?;
        let record = self.storage.get_usage(user_id, date).await?;
        let (current, reset_at) = match record {
            Some(record) => (record.count, record.reset_at),
            None => (0, reset_at),
        };
        Ok(QuotaStatus {
            allowed: current < self.daily_limit,
            current,
            limit: self.daily_limit,
            reset_at,
        })
    }
}
