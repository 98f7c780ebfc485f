// src/application/trading/circuit_breaker.rs
// Session-scoped trading halts

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::config::CircuitBreakerConfig;
use crate::domain::errors::AppResult;
use crate::domain::models::{CircuitBreakerTrip, HaltDuration};

/// Float slack when comparing a move against a level, so an exact move meets it
const LEVEL_TOLERANCE: f64 = 1e-9;

/// An active trading halt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    Until(DateTime<Utc>),
    RestOfSession,
}

impl Halt {
    fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self {
            Halt::Until(until) => now < *until,
            Halt::RestOfSession => true,
        }
    }

    /// End of the halt, `None` when it lasts for the session
    pub fn until(&self) -> Option<DateTime<Utc>> {
        match self {
            Halt::Until(until) => Some(*until),
            Halt::RestOfSession => None,
        }
    }
}

#[derive(Debug, Clone)]
struct InstrumentSession {
    open_reference: f64,
    /// Levels fire smallest first, so a count is enough
    levels_fired: usize,
    halt: Option<Halt>,
}

impl InstrumentSession {
    fn new(open_reference: f64) -> Self {
        Self {
            open_reference,
            levels_fired: 0,
            halt: None,
        }
    }
}

/// Halts an instrument once its move from the session open crosses a level.
///
/// Each level fires at most once per session.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    enabled: bool,
    levels: Vec<(f64, HaltDuration)>,
    sessions: HashMap<String, InstrumentSession>,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig) -> AppResult<Self> {
        Ok(Self {
            enabled: config.enabled,
            levels: config.levels()?,
            sessions: HashMap::new(),
        })
    }

    /// Set the session-open reference price of an instrument
    pub fn open_session(&mut self, symbol: &str, reference: f64) {
        self.sessions
            .entry(symbol.to_string())
            .and_modify(|session| session.open_reference = reference)
            .or_insert_with(|| InstrumentSession::new(reference));
    }

    pub fn session_reference(&self, symbol: &str) -> Option<f64> {
        self.sessions.get(symbol).map(|session| session.open_reference)
    }

    pub fn active_halt(&self, symbol: &str, now: DateTime<Utc>) -> Option<Halt> {
        if !self.enabled {
            return None;
        }

        self.sessions
            .get(symbol)
            .and_then(|session| session.halt)
            .filter(|halt| halt.is_active(now))
    }

    /// Check a fill against the next unfired level, halting the instrument if crossed.
    pub fn record_fill(
        &mut self,
        symbol: &str,
        session_reference: f64,
        fill_price: f64,
        now: DateTime<Utc>,
    ) -> Option<CircuitBreakerTrip> {
        if !self.enabled {
            return None;
        }

        let session = self
            .sessions
            .entry(symbol.to_string())
            .or_insert_with(|| InstrumentSession::new(session_reference));

        if session.open_reference <= 0.0 {
            return None;
        }

        let &(level, halt_duration) = self.levels.get(session.levels_fired)?;
        let move_percent = ((fill_price - session.open_reference) / session.open_reference).abs() * 100.0;
        if move_percent + LEVEL_TOLERANCE < level {
            return None;
        }

        session.levels_fired += 1;
        session.halt = Some(match halt_duration {
            HaltDuration::Minutes(minutes) => Halt::Until(now + Duration::minutes(i64::from(minutes))),
            HaltDuration::RestOfSession => Halt::RestOfSession,
        });

        log::warn!(
            "Circuit breaker level {}% tripped on {} (move {:.2}% from {:.4}), halt {:?}",
            level,
            symbol,
            move_percent,
            session.open_reference,
            halt_duration
        );

        Some(CircuitBreakerTrip {
            symbol: symbol.to_string(),
            level_percent: level,
            move_percent,
            halt: halt_duration,
        })
    }

    /// Lift a halt early; returns whether one was active.
    pub fn reopen(&mut self, symbol: &str) -> bool {
        self.sessions
            .get_mut(symbol)
            .and_then(|session| session.halt.take())
            .is_some()
    }

    /// Forget session references, fired levels and halts.
    pub fn start_new_session(&mut self) {
        self.sessions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(&CircuitBreakerConfig {
            enabled: true,
            levels_percent: vec![10.0, 20.0],
            halt_minutes: vec![5, -1],
        })
        .unwrap()
    }

    #[test]
    fn test_small_move_does_not_trip() {
        let mut breaker = breaker();
        let now = Utc::now();
        assert!(breaker.record_fill("ACME", 100.0, 109.0, now).is_none());
        assert!(breaker.active_halt("ACME", now).is_none());
    }

    #[test]
    fn test_exact_level_move_trips() {
        let mut breaker = CircuitBreaker::new(&CircuitBreakerConfig {
            enabled: true,
            levels_percent: vec![10.0],
            halt_minutes: vec![5],
        })
        .unwrap();
        let now = Utc::now();

        // (3.3 - 3.0) / 3.0 * 100 evaluates just under 10 in f64
        let trip = breaker.record_fill("ACME", 3.0, 3.3, now).expect("10% move meets the 10% level");
        assert_eq!(trip.level_percent, 10.0);
        assert!(breaker.active_halt("ACME", now).is_some());
    }

    #[test]
    fn test_level_trips_and_expires() {
        let mut breaker = breaker();
        let now = Utc::now();

        let trip = breaker.record_fill("ACME", 100.0, 110.0, now).unwrap();
        assert_eq!(trip.level_percent, 10.0);
        assert_eq!(trip.halt, HaltDuration::Minutes(5));

        assert!(breaker.active_halt("ACME", now + Duration::minutes(4)).is_some());
        assert!(breaker.active_halt("ACME", now + Duration::minutes(5)).is_none());
    }

    #[test]
    fn test_each_level_fires_once() {
        let mut breaker = breaker();
        let now = Utc::now();

        assert!(breaker.record_fill("ACME", 100.0, 112.0, now).is_some());
        // Same level again after the halt: already consumed
        let later = now + Duration::minutes(10);
        assert!(breaker.record_fill("ACME", 100.0, 115.0, later).is_none());

        let trip = breaker.record_fill("ACME", 100.0, 79.0, later).unwrap();
        assert_eq!(trip.level_percent, 20.0);
        assert_eq!(breaker.active_halt("ACME", later + Duration::days(1)), Some(Halt::RestOfSession));
    }

    #[test]
    fn test_reopen_and_new_session() {
        let mut breaker = breaker();
        let now = Utc::now();

        breaker.record_fill("ACME", 100.0, 130.0, now).unwrap();
        assert!(breaker.reopen("ACME"));
        assert!(breaker.active_halt("ACME", now).is_none());
        assert!(!breaker.reopen("ACME"));

        breaker.start_new_session();
        assert!(breaker.session_reference("ACME").is_none());
        assert!(breaker.record_fill("ACME", 100.0, 111.0, now).is_some());
    }

    #[test]
    fn test_explicit_session_reference_wins() {
        let mut breaker = breaker();
        let now = Utc::now();

        breaker.open_session("ACME", 50.0);
        // 100 is a 100% move from the explicit open of 50
        assert!(breaker.record_fill("ACME", 100.0, 100.0, now).is_some());
    }

    #[test]
    fn test_disabled_breaker_never_halts() {
        let mut breaker = CircuitBreaker::new(&CircuitBreakerConfig {
            enabled: false,
            levels_percent: vec![1.0],
            halt_minutes: vec![-1],
        })
        .unwrap();
        let now = Utc::now();
        assert!(breaker.record_fill("ACME", 100.0, 200.0, now).is_none());
        assert!(breaker.active_halt("ACME", now).is_none());
    }
}
