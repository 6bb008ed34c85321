//! Chess clocks.

use crate::uci_client::SearchBudget;
use chess_core::Color;
use std::time::Duration;

/// Starting time and per-move increment, the same for both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeControl {
    pub initial: Duration,
    pub increment: Duration,
}

impl TimeControl {
    pub fn new(initial: Duration, increment: Duration) -> Self {
        Self { initial, increment }
    }
}

/// Remaining time for both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clock {
    control: TimeControl,
    remaining: [Duration; 2],
}

impl Clock {
    pub fn new(control: TimeControl) -> Self {
        Self {
            control,
            remaining: [control.initial; 2],
        }
    }

    pub fn control(&self) -> TimeControl {
        self.control
    }

    pub fn remaining(&self, color: Color) -> Duration {
        self.remaining[color.index()]
    }

    pub fn is_flagged(&self, color: Color) -> bool {
        self.remaining(color).is_zero()
    }

    /// Subtracts thinking time from `color`'s clock.
    ///
    /// Returns `false` when the clock has run out.
    pub fn charge(&mut self, color: Color, elapsed: Duration) -> bool {
        let left = &mut self.remaining[color.index()];
        *left = left.saturating_sub(elapsed);
        !left.is_zero()
    }

    /// Credits the increment after a completed move.
    pub fn add_increment(&mut self, color: Color) {
        self.remaining[color.index()] += self.control.increment;
    }

    /// The `go wtime … btime …` budget for the current clock readings.
    pub fn search_budget(&self) -> SearchBudget {
        SearchBudget::Clock {
            wtime: self.remaining(Color::White),
            btime: self.remaining(Color::Black),
            winc: self.control.increment,
            binc: self.control.increment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn charge_and_increment() {
        let mut clock = Clock::new(TimeControl::new(ms(1_000), ms(100)));
        assert!(clock.charge(Color::White, ms(400)));
        clock.add_increment(Color::White);
        assert_eq!(clock.remaining(Color::White), ms(700));
        assert_eq!(clock.remaining(Color::Black), ms(1_000));
    }

    #[test]
    fn running_out_flags() {
        let mut clock = Clock::new(TimeControl::new(ms(1_000), ms(0)));
        assert!(!clock.charge(Color::Black, ms(1_000)));
        assert!(clock.is_flagged(Color::Black));

        let mut clock = Clock::new(TimeControl::new(ms(1_000), ms(0)));
        assert!(!clock.charge(Color::White, ms(5_000)));
        assert_eq!(clock.remaining(Color::White), Duration::ZERO);
    }

    #[test]
    fn budget_reflects_both_clocks() {
        let mut clock = Clock::new(TimeControl::new(ms(60_000), ms(1_000)));
        clock.charge(Color::White, ms(2_500));
        assert_eq!(
            clock.search_budget(),
            SearchBudget::Clock {
                wtime: ms(57_500),
                btime: ms(60_000),
                winc: ms(1_000),
                binc: ms(1_000),
            }
        );
    }
}
