//! Discrete action space: Hold / Buy / Sell.

use std::fmt;

use super::error::PipsentryError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    #[default]
    Hold,
    Buy,
    Sell,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Hold, Action::Buy, Action::Sell];

    pub fn index(self) -> usize {
        match self {
            Action::Hold => 0,
            Action::Buy => 1,
            Action::Sell => 2,
        }
    }

    pub fn from_index(index: usize) -> Result<Self, PipsentryError> {
        Self::try_from(index as i64)
    }

    pub fn is_trade(self) -> bool {
        !matches!(self, Action::Hold)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Hold => "Hold",
            Action::Buy => "Buy",
            Action::Sell => "Sell",
        }
    }
}

impl TryFrom<i64> for Action {
    type Error = PipsentryError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Action::Hold),
            1 => Ok(Action::Buy),
            2 => Ok(Action::Sell),
            _ => Err(PipsentryError::InvalidAction { value }),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-action tally kept by the episode driver and the trainer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionCounts {
    pub hold: usize,
    pub buy: usize,
    pub sell: usize,
}

impl ActionCounts {
    pub fn record(&mut self, action: Action) {
        match action {
            Action::Hold => self.hold += 1,
            Action::Buy => self.buy += 1,
            Action::Sell => self.sell += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.hold + self.buy + self.sell
    }

    /// Share of each action in percent, ordered hold/buy/sell.
    pub fn percentages(&self) -> [f64; 3] {
        let total = self.total();
        if total == 0 {
            return [0.0; 3];
        }
        let t = total as f64;
        [
            self.hold as f64 / t * 100.0,
            self.buy as f64 / t * 100.0,
            self.sell as f64 / t * 100.0,
        ]
    }
}

impl fmt::Display for ActionCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hold={} buy={} sell={} (total {})",
            self.hold,
            self.buy,
            self.sell,
            self.total()
        )
    }
}
