use serde::{Serializer, ser::Error as _};
use thiserror::Error;
use time::{Duration, UtcDateTime, UtcOffset, format_description::BorrowedFormatItem, macros::format_description};

const DISPLAY_TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day] [month repr:short] [year] [hour]:[minute]");

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Default, Hash)]
pub struct PositiveDuration(Duration);

impl PositiveDuration {
    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        duration.is_positive().then_some(Self(duration))
    }

    /// `None` for zero, which callers use to mean "never expires".
    #[must_use]
    pub fn from_seconds(seconds: u64) -> Option<Self> {
        i64::try_from(seconds)
            .ok()
            .and_then(|seconds| Self::new(Duration::seconds(seconds)))
    }

    #[must_use]
    pub fn get(&self) -> Duration {
        self.0
    }

    #[must_use]
    pub fn whole_seconds(&self) -> i64 {
        self.0.whole_seconds()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The duration is not positive: {0}")]
pub struct NonPositiveDurationError(Duration);

impl TryFrom<Duration> for PositiveDuration {
    type Error = NonPositiveDurationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NonPositiveDurationError(value))
    }
}

pub fn format_display_time(time: UtcDateTime) -> Result<String, time::error::Format> {
    time.to_offset(UtcOffset::UTC).format(DISPLAY_TIME_FORMAT)
}

/// Serializes a timestamp in the human readable form pages show.
pub fn serialize_display_time<S>(time: &UtcDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let formatted = format_display_time(*time).map_err(S::Error::custom)?;
    serializer.serialize_str(&formatted)
}
