use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Temporal scope of a read.
///
/// `Current` selects rows whose `valid_to` is empty. `AsOf(t)` selects rows
/// whose validity interval `[valid_from, valid_to)` contains `t`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "at")]
pub enum Temporal {
    #[default]
    Current,
    AsOf(DateTime<Utc>),
}

impl Temporal {
    /// Scope from an optional as-of instant, as passed by callers.
    pub fn from_as_of(as_of: Option<DateTime<Utc>>) -> Self {
        match as_of {
            Some(at) => Self::AsOf(at),
            None => Self::Current,
        }
    }

    pub fn as_of(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Current => None,
            Self::AsOf(at) => Some(*at),
        }
    }

    /// Whether a row with the given validity interval satisfies this scope.
    pub fn admits(&self, valid_from: DateTime<Utc>, valid_to: Option<DateTime<Utc>>) -> bool {
        match self {
            Self::Current => valid_to.is_none(),
            Self::AsOf(at) => active_at(valid_from, valid_to, *at),
        }
    }
}

/// `valid_from <= at < valid_to`, with an empty `valid_to` meaning open-ended.
pub fn active_at(
    valid_from: DateTime<Utc>,
    valid_to: Option<DateTime<Utc>>,
    at: DateTime<Utc>,
) -> bool {
    valid_from <= at && valid_to.map_or(true, |end| at < end)
}

/// Rows carrying a validity interval.
pub trait Versioned {
    fn valid_from(&self) -> DateTime<Utc>;
    fn valid_to(&self) -> Option<DateTime<Utc>>;

    fn is_current(&self) -> bool {
        self.valid_to().is_none()
    }

    fn is_active(&self, scope: Temporal) -> bool {
        scope.admits(self.valid_from(), self.valid_to())
    }
}
