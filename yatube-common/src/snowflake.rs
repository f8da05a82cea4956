//! Time-ordered 64 bit identifiers.
//!
//! Layout, most significant bit first: 42 bits of milliseconds since
//! [`EPOCH`], 5 bits worker id, 5 bits process id, 12 bits increment.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use time::{Duration, UtcDateTime, macros::utc_datetime};

pub const EPOCH: UtcDateTime = utc_datetime!(2025-01-01 00:00);

const TIMESTAMP_BITS: u32 = 42;
const WORKER_ID_BITS: u32 = 5;
const PROCESS_ID_BITS: u32 = 5;
const INCREMENT_BITS: u32 = 12;

const INCREMENT_SHIFT: u32 = 0;
const PROCESS_ID_SHIFT: u32 = INCREMENT_SHIFT + INCREMENT_BITS;
const WORKER_ID_SHIFT: u32 = PROCESS_ID_SHIFT + PROCESS_ID_BITS;
const TIMESTAMP_SHIFT: u32 = WORKER_ID_SHIFT + WORKER_ID_BITS;

const fn mask(bits: u32) -> u64 {
    (1 << bits) - 1
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeTimeError {
    #[error("Time is before the snowflake epoch")]
    BeforeEpoch,
    #[error("Time is too far after the snowflake epoch")]
    TooLate,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Snowflake node id {0} does not fit into five bits")]
pub struct NodeIdOutOfRangeError(u8);

macro_rules! node_id {
    ($name:ident, $bits:ident) => {
        #[derive(
            Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
        )]
        #[serde(try_from = "u8", into = "u8")]
        pub struct $name(u8);

        impl $name {
            #[must_use]
            pub fn new(id: u8) -> Option<Self> {
                (u64::from(id) <= mask($bits)).then_some(Self(id))
            }

            #[must_use]
            pub fn get(self) -> u8 {
                self.0
            }
        }

        impl TryFrom<u8> for $name {
            type Error = NodeIdOutOfRangeError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                Self::new(value).ok_or(NodeIdOutOfRangeError(value))
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

node_id!(WorkerId, WORKER_ID_BITS);
node_id!(ProcessId, PROCESS_ID_BITS);

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Snowflake(u64);

impl Snowflake {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner)
    }

    /// Packs the parts, truncating each to its field width.
    #[must_use]
    pub fn from_parts(millis: u64, worker_id: WorkerId, process_id: ProcessId, increment: u16) -> Self {
        Self(
            (millis & mask(TIMESTAMP_BITS)) << TIMESTAMP_SHIFT
                | u64::from(worker_id.get()) << WORKER_ID_SHIFT
                | u64::from(process_id.get()) << PROCESS_ID_SHIFT
                | (u64::from(increment) & mask(INCREMENT_BITS)) << INCREMENT_SHIFT,
        )
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn millis(self) -> u64 {
        (self.0 >> TIMESTAMP_SHIFT) & mask(TIMESTAMP_BITS)
    }

    #[must_use]
    pub fn created_at(self) -> UtcDateTime {
        #[allow(clippy::cast_possible_wrap)]
        let millis = self.millis() as i64;
        EPOCH + Duration::milliseconds(millis)
    }

    #[must_use]
    pub fn worker_id(self) -> WorkerId {
        #[allow(clippy::cast_possible_truncation)]
        WorkerId(((self.0 >> WORKER_ID_SHIFT) & mask(WORKER_ID_BITS)) as u8)
    }

    #[must_use]
    pub fn process_id(self) -> ProcessId {
        #[allow(clippy::cast_possible_truncation)]
        ProcessId(((self.0 >> PROCESS_ID_SHIFT) & mask(PROCESS_ID_BITS)) as u8)
    }

    #[must_use]
    pub fn increment(self) -> u16 {
        #[allow(clippy::cast_possible_truncation)]
        let increment = ((self.0 >> INCREMENT_SHIFT) & mask(INCREMENT_BITS)) as u16;
        increment
    }
}

impl Display for Snowflake {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<u64> for Snowflake {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<Snowflake> for u64 {
    fn from(value: Snowflake) -> Self {
        value.get()
    }
}

pub fn millis_since_epoch(time: UtcDateTime) -> Result<u64, SnowflakeTimeError> {
    let millis = (time - EPOCH).whole_milliseconds();
    if millis < 0 {
        return Err(SnowflakeTimeError::BeforeEpoch);
    }
    u64::try_from(millis)
        .ok()
        .filter(|&millis| millis <= mask(TIMESTAMP_BITS))
        .ok_or(SnowflakeTimeError::TooLate)
}

/// Hands out strictly increasing snowflakes for one worker/process pair.
///
/// When the increment space of a millisecond is exhausted, or the clock
/// steps backwards, the generator keeps counting on its last timestamp
/// and borrows from the next millisecond.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct SnowflakeGenerator {
    worker_id: WorkerId,
    process_id: ProcessId,
    last: Option<(u64, u16)>,
}

impl SnowflakeGenerator {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            worker_id,
            process_id,
            last: None,
        }
    }

    #[must_use]
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    #[must_use]
    pub fn process_id(&self) -> ProcessId {
        self.process_id
    }

    pub fn generate_at(&mut self, time: UtcDateTime) -> Result<Snowflake, SnowflakeTimeError> {
        let millis = millis_since_epoch(time)?;

        let (millis, increment) = match self.last {
            Some((last_millis, last_increment)) if millis <= last_millis => {
                if u64::from(last_increment) < mask(INCREMENT_BITS) {
                    (last_millis, last_increment + 1)
                } else {
                    (last_millis + 1, 0)
                }
            }
            _ => (millis, 0),
        };

        if millis > mask(TIMESTAMP_BITS) {
            return Err(SnowflakeTimeError::TooLate);
        }

        self.last = Some((millis, increment));
        Ok(Snowflake::from_parts(
            millis,
            self.worker_id,
            self.process_id,
            increment,
        ))
    }

    pub fn generate(&mut self) -> Result<Snowflake, SnowflakeTimeError> {
        self.generate_at(UtcDateTime::now())
    }
}

#[cfg(test)]
mod tests {
    use crate::snowflake::{
        EPOCH, ProcessId, Snowflake, SnowflakeGenerator, SnowflakeTimeError, WorkerId,
        millis_since_epoch,
    };
    use time::{Duration, macros::utc_datetime};

    #[test]
    fn node_id_range() {
        for legal in [0, 0xD, 0x1F] {
            assert!(WorkerId::new(legal).is_some());
            assert!(ProcessId::new(legal).is_some());
        }
        for illegal in [0x20, 0xF0, u8::MAX] {
            assert!(WorkerId::new(illegal).is_none());
            assert!(ProcessId::try_from(illegal).is_err());
        }
    }

    #[test]
    fn parts_round_trip() {
        let worker_id = WorkerId::new(0b10101).unwrap();
        let process_id = ProcessId::new(0b10001).unwrap();
        let millis = millis_since_epoch(utc_datetime!(2025-10-24 10:30)).unwrap();

        let snowflake = Snowflake::from_parts(millis, worker_id, process_id, 100);

        assert_eq!(snowflake.millis(), millis);
        assert_eq!(snowflake.worker_id(), worker_id);
        assert_eq!(snowflake.process_id(), process_id);
        assert_eq!(snowflake.increment(), 100);
        assert_eq!(snowflake.created_at(), utc_datetime!(2025-10-24 10:30));
    }

    #[test]
    fn epoch_bounds() {
        assert_eq!(millis_since_epoch(EPOCH), Ok(0));
        assert_eq!(
            millis_since_epoch(EPOCH - Duration::milliseconds(1)),
            Err(SnowflakeTimeError::BeforeEpoch)
        );
        assert_eq!(
            millis_since_epoch(EPOCH + Duration::milliseconds(0x0400_0000_0000)),
            Err(SnowflakeTimeError::TooLate)
        );
    }

    #[test]
    fn generator_is_monotonic() {
        let mut generator =
            SnowflakeGenerator::new(WorkerId::new(10).unwrap(), ProcessId::new(0).unwrap());
        let time = utc_datetime!(2025-10-24 10:55);

        let first = generator.generate_at(time).unwrap();
        let second = generator.generate_at(time).unwrap();
        assert_eq!(first.increment(), 0);
        assert_eq!(second.increment(), 1);
        assert!(second > first);

        // Clock stepping backwards must not produce smaller ids.
        let earlier = generator
            .generate_at(time - Duration::seconds(5))
            .unwrap();
        assert!(earlier > second);
    }

    #[test]
    fn generator_borrows_next_millisecond() {
        let mut generator =
            SnowflakeGenerator::new(WorkerId::default(), ProcessId::default());
        let time = utc_datetime!(2026-01-01 00:00);

        let mut previous = generator.generate_at(time).unwrap();
        for _ in 0..0x1000 {
            let next = generator.generate_at(time).unwrap();
            assert!(next > previous);
            previous = next;
        }
        assert_eq!(previous.millis(), millis_since_epoch(time).unwrap() + 1);
        assert_eq!(previous.increment(), 0);
    }
}
