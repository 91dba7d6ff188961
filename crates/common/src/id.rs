//! ID generation utilities.
//!
//! Identifiers are 64-bit Snowflake-style integers. From the high bit down:
//!
//! ```text
//! | 0 | elapsed ms since epoch | worker number | sequence |
//! | 1 |          41            |      10       |    12    |
//! ```
//!
//! Each generator owns a worker number, so generators never need to talk to
//! each other. Within one generator, IDs are strictly increasing in call order.

use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// ID generation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// Worker number does not fit the layout's worker field.
    #[error("Worker number {worker} outside [0, {max}]")]
    InvalidWorker {
        /// Requested worker number.
        worker: u64,
        /// Largest accepted worker number.
        max: u64,
    },

    /// Epoch anchor could not be parsed or lies in the future.
    #[error("Invalid epoch: {0}")]
    InvalidEpoch(String),

    /// Field widths do not add up to 63 bits.
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    /// The clock moved backwards; retry after a delay.
    #[error("Clock moved backwards: last issued at {last_ms}ms, now {now_ms}ms")]
    ClockSkew {
        /// Last issued timestamp (ms since epoch anchor).
        last_ms: i64,
        /// Current timestamp (ms since epoch anchor).
        now_ms: i64,
    },

    /// Elapsed time no longer fits the timestamp field.
    #[error("Timestamp overflow: epoch anchor exhausted")]
    TimestampOverflow,
}

/// Source of wall-clock time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Bit widths of the identifier fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdLayout {
    /// Bits for elapsed milliseconds since the epoch anchor.
    pub timestamp_bits: u8,
    /// Bits for the worker number.
    pub worker_bits: u8,
    /// Bits for the per-millisecond sequence.
    pub sequence_bits: u8,
}

impl IdLayout {
    /// The classic 41/10/12 split.
    pub const SNOWFLAKE: Self = Self {
        timestamp_bits: 41,
        worker_bits: 10,
        sequence_bits: 12,
    };

    /// Check that every field is non-empty and the widths fill 63 bits.
    pub fn validate(&self) -> Result<(), IdError> {
        if self.timestamp_bits == 0 || self.worker_bits == 0 || self.sequence_bits == 0 {
            return Err(IdError::InvalidLayout(
                "every field needs at least one bit".to_string(),
            ));
        }

        let total =
            u32::from(self.timestamp_bits) + u32::from(self.worker_bits) + u32::from(self.sequence_bits);
        if total != 63 {
            return Err(IdError::InvalidLayout(format!(
                "fields use {total} bits, expected 63"
            )));
        }

        Ok(())
    }

    /// Largest worker number this layout can encode.
    #[must_use]
    pub const fn max_worker(&self) -> u64 {
        (1 << self.worker_bits) - 1
    }

    /// Largest sequence value within one millisecond.
    #[must_use]
    pub const fn max_sequence(&self) -> u64 {
        (1 << self.sequence_bits) - 1
    }

    /// Largest elapsed-millisecond value.
    #[must_use]
    pub const fn max_timestamp(&self) -> i64 {
        (1 << self.timestamp_bits) - 1
    }

    const fn worker_shift(&self) -> u8 {
        self.sequence_bits
    }

    const fn timestamp_shift(&self) -> u8 {
        self.sequence_bits + self.worker_bits
    }
}

impl Default for IdLayout {
    fn default() -> Self {
        Self::SNOWFLAKE
    }
}

/// The fields of a decoded identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParts {
    /// Milliseconds since the epoch anchor.
    pub timestamp_ms: i64,
    /// Worker number of the issuing generator.
    pub worker: u64,
    /// Sequence within the millisecond.
    pub sequence: u64,
}

#[derive(Debug)]
struct GeneratorState {
    /// Last issued timestamp, -1 before the first ID.
    last_ms: i64,
    sequence: u64,
}

/// ID generator for entities.
#[derive(Debug)]
pub struct IdGenerator {
    epoch_ms: i64,
    worker: u64,
    layout: IdLayout,
    clock: Arc<dyn Clock>,
    state: Mutex<GeneratorState>,
}

impl IdGenerator {
    /// Create a generator with the default layout and the system clock.
    ///
    /// `epoch` is an RFC 3339 timestamp.
    pub fn new(epoch: &str, worker: u64) -> Result<Self, IdError> {
        Self::with_clock(epoch, worker, IdLayout::SNOWFLAKE, Arc::new(SystemClock))
    }

    /// Create a generator with an explicit layout and clock.
    pub fn with_clock(
        epoch: &str,
        worker: u64,
        layout: IdLayout,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, IdError> {
        layout.validate()?;

        if worker > layout.max_worker() {
            return Err(IdError::InvalidWorker {
                worker,
                max: layout.max_worker(),
            });
        }

        let epoch_ms = DateTime::parse_from_rfc3339(epoch)
            .map_err(|e| IdError::InvalidEpoch(format!("{epoch}: {e}")))?
            .timestamp_millis();

        if epoch_ms > clock.now_millis() {
            return Err(IdError::InvalidEpoch(format!("{epoch} is in the future")));
        }

        Ok(Self {
            epoch_ms,
            worker,
            layout,
            clock,
            state: Mutex::new(GeneratorState {
                last_ms: -1,
                sequence: 0,
            }),
        })
    }

    /// Worker number of this generator.
    #[must_use]
    pub const fn worker(&self) -> u64 {
        self.worker
    }

    /// Generate a new ID.
    ///
    /// Fails with [`IdError::ClockSkew`] instead of issuing a possible
    /// duplicate when the clock runs backwards. When the per-millisecond
    /// sequence is exhausted, spins until the next millisecond.
    pub fn generate(&self) -> Result<i64, IdError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let now = self.elapsed();
        if now < state.last_ms || now < 0 {
            return Err(IdError::ClockSkew {
                last_ms: state.last_ms,
                now_ms: now,
            });
        }

        // State is only written back once the ID is certain to be issued.
        let (timestamp, sequence) = if now == state.last_ms {
            let next = (state.sequence + 1) & self.layout.max_sequence();
            if next == 0 {
                (self.wait_next_millis(state.last_ms)?, 0)
            } else {
                (now, next)
            }
        } else {
            (now, 0)
        };

        if timestamp > self.layout.max_timestamp() {
            return Err(IdError::TimestampOverflow);
        }

        state.last_ms = timestamp;
        state.sequence = sequence;
        Ok(self.compose(timestamp, sequence))
    }

    /// Split an identifier into its fields.
    #[must_use]
    pub const fn decompose(&self, id: i64) -> IdParts {
        let raw = id as u64;
        IdParts {
            timestamp_ms: (raw >> self.layout.timestamp_shift()) as i64,
            worker: (raw >> self.layout.worker_shift()) & self.layout.max_worker(),
            sequence: raw & self.layout.max_sequence(),
        }
    }

    /// Wall-clock instant encoded in an identifier.
    #[must_use]
    pub fn created_at(&self, id: i64) -> Option<DateTime<Utc>> {
        let parts = self.decompose(id);
        Utc.timestamp_millis_opt(self.epoch_ms + parts.timestamp_ms)
            .single()
    }

    fn elapsed(&self) -> i64 {
        self.clock.now_millis() - self.epoch_ms
    }

    fn wait_next_millis(&self, last_ms: i64) -> Result<i64, IdError> {
        loop {
            let now = self.elapsed();
            if now > last_ms {
                return Ok(now);
            }
            if now < last_ms {
                return Err(IdError::ClockSkew {
                    last_ms,
                    now_ms: now,
                });
            }
            std::hint::spin_loop();
        }
    }

    const fn compose(&self, timestamp_ms: i64, sequence: u64) -> i64 {
        ((timestamp_ms as u64) << self.layout.timestamp_shift()
            | self.worker << self.layout.worker_shift()
            | sequence) as i64
    }
}
