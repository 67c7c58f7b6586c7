//! Look-back window type

use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Positive number of days over which momentum is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct WindowDays(u32);

impl WindowDays {
    /// Validate and wrap a day count (zero is rejected)
    pub fn new(days: u32) -> Result<Self> {
        if days == 0 {
            return Err(Error::InvalidInput(
                "window must be at least one day".to_string(),
            ));
        }
        Ok(Self(days))
    }

    pub fn days(&self) -> u32 {
        self.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::days(i64::from(self.0))
    }

    /// `at` minus the window; `None` when that precedes the representable calendar
    pub fn start_before(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        at.checked_sub_signed(self.as_duration())
    }
}

impl TryFrom<u32> for WindowDays {
    type Error = Error;

    fn try_from(days: u32) -> Result<Self> {
        Self::new(days)
    }
}

impl From<WindowDays> for u32 {
    fn from(window: WindowDays) -> u32 {
        window.0
    }
}

impl fmt::Display for WindowDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.0)
    }
}
