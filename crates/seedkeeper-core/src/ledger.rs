//! Traffic ledger: upload accounting with calendar-month rollover
//!
//! The ledger is a single process-wide instance. All counters live behind one
//! mutex, and every accessor runs the rollover check inside the same critical
//! section as the read or write it guards, so an access can never observe a
//! stale `monthly` value from a previous month. There is no reset timer: a
//! process idle across a month boundary rolls over on its next access.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Calendar month, used to detect rollover
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    /// 1 ..= 12
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn of<D: Datelike>(date: &D) -> Self {
        Self::new(date.year(), date.month())
    }

    /// The following calendar month
    pub fn next(self) -> Self {
        if self.month >= 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }
}

/// Source of the current calendar month
pub trait MonthClock: Send + Sync {
    fn current_month(&self) -> MonthKey;
}

/// Wall clock in UTC
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl MonthClock for SystemClock {
    fn current_month(&self) -> MonthKey {
        MonthKey::of(&Utc::now())
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    month: Mutex<MonthKey>,
}

impl ManualClock {
    pub fn new(month: MonthKey) -> Self {
        Self {
            month: Mutex::new(month),
        }
    }

    pub fn set(&self, month: MonthKey) {
        *self.month.lock().unwrap_or_else(|e| e.into_inner()) = month;
    }

    pub fn advance(&self) {
        let mut month = self.month.lock().unwrap_or_else(|e| e.into_inner());
        *month = month.next();
    }
}

impl MonthClock for ManualClock {
    fn current_month(&self) -> MonthKey {
        *self.month.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Point-in-time copy of the ledger counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub daily: u64,
    pub monthly: u64,
    pub total: u64,
    pub last_reset_month: MonthKey,
}

/// Monthly quota view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaReport {
    pub monthly_cap: u64,
    pub used: u64,
    /// Negative once the cap has been exceeded
    pub remaining: i64,
}

#[derive(Debug)]
struct LedgerState {
    daily: u64,
    monthly: u64,
    total: u64,
    last_reset_month: MonthKey,
}

impl LedgerState {
    fn totals(&self) -> LedgerTotals {
        LedgerTotals {
            daily: self.daily,
            monthly: self.monthly,
            total: self.total,
            last_reset_month: self.last_reset_month,
        }
    }
}

/// Process-wide upload accounting
pub struct TrafficLedger {
    state: Mutex<LedgerState>,
    clock: Arc<dyn MonthClock>,
}

impl std::fmt::Debug for TrafficLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrafficLedger")
            .field("state", &self.lock().totals())
            .finish()
    }
}

impl Default for TrafficLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficLedger {
    /// Empty ledger on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Empty ledger on a custom clock
    pub fn with_clock(clock: Arc<dyn MonthClock>) -> Self {
        let last_reset_month = clock.current_month();
        Self {
            state: Mutex::new(LedgerState {
                daily: 0,
                monthly: 0,
                total: 0,
                last_reset_month,
            }),
            clock,
        }
    }

    /// Ledger pre-loaded with existing counters
    pub fn with_totals(clock: Arc<dyn MonthClock>, totals: LedgerTotals) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                daily: totals.daily,
                monthly: totals.monthly,
                total: totals.total,
                last_reset_month: totals.last_reset_month,
            }),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` against the counters after the rollover check, under one lock
    fn access<R>(&self, f: impl FnOnce(&mut LedgerState) -> R) -> R {
        let mut state = self.lock();
        let current = self.clock.current_month();
        if current != state.last_reset_month {
            tracing::info!(
                previous_month = ?state.last_reset_month,
                current_month = ?current,
                carried_bytes = state.monthly,
                "Monthly traffic counter rolled over"
            );
            state.monthly = 0;
            state.last_reset_month = current;
        }
        f(&mut state)
    }

    /// Add one tick's worth of upload volume to every counter
    pub fn record_upload(&self, bytes_per_tick: u64) {
        self.access(|state| {
            state.daily = state.daily.saturating_add(bytes_per_tick);
            state.monthly = state.monthly.saturating_add(bytes_per_tick);
            state.total = state.total.saturating_add(bytes_per_tick);
        });
    }

    pub fn monthly(&self) -> u64 {
        self.access(|state| state.monthly)
    }

    pub fn totals(&self) -> LedgerTotals {
        self.access(|state| state.totals())
    }

    /// `cap - monthly`, negative when over quota
    pub fn remaining_quota(&self, cap_bytes: u64) -> i64 {
        self.access(|state| remaining(cap_bytes, state.monthly))
    }

    /// Cap, usage and remaining allowance from a single consistent read
    pub fn quota(&self, cap_bytes: u64) -> QuotaReport {
        self.access(|state| QuotaReport {
            monthly_cap: cap_bytes,
            used: state.monthly,
            remaining: remaining(cap_bytes, state.monthly),
        })
    }
}

fn remaining(cap: u64, used: u64) -> i64 {
    let diff = i128::from(cap) - i128::from(used);
    diff.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}
