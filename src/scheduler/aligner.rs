//! Per-interval scan classification.
//!
//! [`Aligner`] is the state machine behind the aligned loop, kept free of
//! timers and I/O: the loop advances the target, waits for it, then feeds
//! whatever the store yielded into [`Aligner::on_tick`] and acts on the
//! returned [`Tick`].
//!
//! Each scan is classified by its offset from the target time:
//!
//! | offset                      | class   | result                                   |
//! |-----------------------------|---------|------------------------------------------|
//! | `> interval/2`              | ahead   | resync target to the scan, gap           |
//! | `< -interval/2`             | late    | repeat previous scan once, else gap      |
//! | otherwise                   | on time | emit                                     |
//!
//! An empty store (no query completed since the last target) is treated like
//! a late scan: the previous on-time scan is repeated once, then gaps follow.

use std::time::Duration;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

use super::error::SchedulerError;
use super::store::Scan;

/// Where a scan falls relative to its target time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Within half an interval of the target.
    OnTime,
    /// More than half an interval after the target; the loop fell behind.
    Ahead,
    /// More than half an interval before the target; the fresh scan is missing.
    Late,
}

/// Classify `offset = scan.timestamp - target` against `interval`.
///
/// Both bounds are strict: an offset of exactly half an interval is on time.
pub fn classify(offset: TimeDelta, interval: TimeDelta) -> Classification {
    let half = interval / 2;
    if offset > half {
        Classification::Ahead
    } else if offset < -half {
        Classification::Late
    } else {
        Classification::OnTime
    }
}

/// Round `ts` to the nearest multiple of `interval` since the Unix epoch.
pub fn round_to(ts: DateTime<Utc>, interval: TimeDelta) -> Result<DateTime<Utc>, SchedulerError> {
    ts.duration_round(interval)
        .map_err(|e| SchedulerError::Clock(format!("cannot round {ts} to {interval}: {e}")))
}

/// A record to write for one interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    /// The wall-clock instant the record represents.
    pub target: DateTime<Utc>,
    /// Scan whose values are written.
    pub scan: Scan,
    /// `true` when `scan` is the previous interval's scan standing in for a missing one.
    pub repeated: bool,
}

/// Why an interval produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gap {
    /// The store was empty and no previous scan could stand in.
    NoScan,
    /// The scan was from the future; the target was moved to `resync_to`.
    Ahead {
        /// `scan.timestamp - target`.
        offset: TimeDelta,
        /// New target time.
        resync_to: DateTime<Utc>,
    },
    /// The scan was stale and no previous scan could stand in.
    Late {
        /// `scan.timestamp - target`.
        offset: TimeDelta,
    },
}

/// What the aligned loop does with one interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write a record.
    Emit(Emission),
    /// Write nothing.
    Skip(Gap),
}

/// Result of feeding one interval's scan to the [`Aligner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    /// First scan after a gap; its identity points should be logged.
    pub announce: Option<Scan>,
    /// Record to write, or the reason for a gap.
    pub action: Action,
}

/// Target-time state carried across intervals.
#[derive(Debug, Clone)]
pub struct Aligner {
    interval: TimeDelta,
    target: DateTime<Utc>,
    previous: Option<Scan>,
    first_since_gap: bool,
    missed_previously: bool,
    repeated_last_time: bool,
}

impl Aligner {
    /// Start aligned to `now`: the target is `round(now) + interval`, and the
    /// first [`advance`](Self::advance) moves it one interval further.
    pub fn new(now: DateTime<Utc>, interval: Duration) -> Result<Self, SchedulerError> {
        let interval = TimeDelta::from_std(interval)
            .ok()
            .filter(|d| *d > TimeDelta::zero())
            .ok_or_else(|| {
                SchedulerError::InvalidInterval(format!("unusable sample interval {interval:?}"))
            })?;
        let target = round_to(now, interval)? + interval;

        Ok(Self {
            interval,
            target,
            previous: None,
            first_since_gap: true,
            missed_previously: false,
            repeated_last_time: false,
        })
    }

    /// Current target time.
    pub fn target(&self) -> DateTime<Utc> {
        self.target
    }

    /// Sample interval as a signed delta.
    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    /// Whether the last emitted record repeated an earlier scan.
    pub fn repeated_last_time(&self) -> bool {
        self.repeated_last_time
    }

    /// Move the target one interval forward and return it.
    pub fn advance(&mut self) -> DateTime<Utc> {
        self.target += self.interval;
        self.target
    }

    /// Classify the scan taken at the current target and update state.
    pub fn on_tick(&mut self, scan: Option<Scan>) -> Tick {
        let Some(scan) = scan else {
            if !self.missed_previously {
                tracing::error!(target_time = %self.target, "No scan available");
            }
            self.missed_previously = true;
            return match self.bridge() {
                Some(emission) => Tick {
                    announce: None,
                    action: Action::Emit(emission),
                },
                None => {
                    self.first_since_gap = true;
                    self.skip(None, Gap::NoScan)
                }
            };
        };

        tracing::debug!(scan_time = %scan.timestamp, target_time = %self.target, "Scan received");
        let announce = if self.first_since_gap {
            tracing::info!(scan_time = %scan.timestamp, "Initial scan received");
            self.first_since_gap = false;
            Some(scan.clone())
        } else {
            None
        };
        self.missed_previously = false;

        let offset = scan.timestamp - self.target;
        match classify(offset, self.interval) {
            Classification::Ahead => {
                let resync_to = round_to(scan.timestamp, self.interval).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Using unrounded scan time as target");
                    scan.timestamp
                });
                tracing::warn!(
                    scan_time = %scan.timestamp,
                    target_time = %self.target,
                    resync_to = %resync_to,
                    "Scan is more than half an interval ahead of target, resynchronizing"
                );
                self.target = resync_to;
                self.first_since_gap = true;
                self.skip(announce, Gap::Ahead { offset, resync_to })
            }
            Classification::Late => {
                tracing::error!(
                    scan_time = %scan.timestamp,
                    target_time = %self.target,
                    "Missing scan: no scan within half an interval of target"
                );
                match self.bridge() {
                    Some(emission) => Tick {
                        announce,
                        action: Action::Emit(emission),
                    },
                    None => {
                        self.first_since_gap = true;
                        self.skip(announce, Gap::Late { offset })
                    }
                }
            }
            Classification::OnTime => {
                self.repeated_last_time = false;
                self.previous = Some(scan.clone());
                Tick {
                    announce,
                    action: Action::Emit(Emission {
                        target: self.target,
                        scan,
                        repeated: false,
                    }),
                }
            }
        }
    }

    /// Stand the previous on-time scan in for the current target, at most
    /// once until another on-time scan arrives.
    fn bridge(&mut self) -> Option<Emission> {
        if self.repeated_last_time {
            return None;
        }
        let previous = self.previous.as_ref()?;
        tracing::warn!(scan_time = %previous.timestamp, "Repeating previous scan");
        let emission = Emission {
            target: self.target,
            scan: previous.clone(),
            repeated: true,
        };
        self.repeated_last_time = true;
        Some(emission)
    }

    fn skip(&self, announce: Option<Scan>, gap: Gap) -> Tick {
        Tick {
            announce,
            action: Action::Skip(gap),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::PointValues;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32, ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap() + TimeDelta::milliseconds(ms)
    }

    fn scan(ts: DateTime<Utc>, volts: &str) -> Scan {
        Scan::new(
            ts,
            PointValues::from([("volts".to_string(), volts.to_string())]),
        )
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn emitted(tick: &Tick) -> &Emission {
        match &tick.action {
            Action::Emit(e) => e,
            other => panic!("expected emission, got {other:?}"),
        }
    }

    #[test]
    fn test_initial_target() {
        let mut aligner = Aligner::new(at(12, 0, 0, 400), secs(2)).unwrap();
        assert_eq!(aligner.target(), at(12, 0, 2, 0));
        assert_eq!(aligner.advance(), at(12, 0, 4, 0));
        assert_eq!(aligner.interval(), TimeDelta::seconds(2));
    }

    #[test]
    fn test_invalid_interval() {
        assert!(Aligner::new(Utc::now(), Duration::ZERO).is_err());
    }

    #[test]
    fn test_classify_boundaries() {
        let interval = TimeDelta::seconds(2);
        let ms = TimeDelta::milliseconds;

        assert_eq!(classify(TimeDelta::zero(), interval), Classification::OnTime);
        assert_eq!(classify(ms(1000), interval), Classification::OnTime);
        assert_eq!(classify(ms(-1000), interval), Classification::OnTime);
        assert_eq!(classify(ms(1001), interval), Classification::Ahead);
        assert_eq!(classify(ms(-1001), interval), Classification::Late);
        assert_eq!(classify(ms(1500), interval), Classification::Ahead);
    }

    #[test]
    fn test_classify_is_pure() {
        let interval = TimeDelta::seconds(2);
        for offset in [-3000, -1000, 0, 999, 1500] {
            let offset = TimeDelta::milliseconds(offset);
            assert_eq!(classify(offset, interval), classify(offset, interval));
        }
    }

    #[test]
    fn test_scan_at_target_accepted() {
        let mut aligner = Aligner::new(at(12, 0, 0, 0), secs(2)).unwrap();
        let target = aligner.advance();

        let tick = aligner.on_tick(Some(scan(target, "121")));
        assert!(tick.announce.is_some());
        let emission = emitted(&tick);
        assert_eq!(emission.target, target);
        assert_eq!(emission.scan.timestamp, target);
        assert!(!emission.repeated);

        let target = aligner.advance();
        let tick = aligner.on_tick(Some(scan(target, "122")));
        assert!(tick.announce.is_none());
        assert_eq!(emitted(&tick).scan.value("volts"), Some("122"));
    }

    #[test]
    fn test_scan_ahead_resyncs_without_emitting() {
        let mut aligner = Aligner::new(at(12, 0, 0, 0), secs(2)).unwrap();
        let target = aligner.advance();
        assert_eq!(target, at(12, 0, 4, 0));

        // 1.5 × half an interval in the future
        let scan_time = target + TimeDelta::milliseconds(1500);
        let tick = aligner.on_tick(Some(scan(scan_time, "121")));

        assert_eq!(
            tick.action,
            Action::Skip(Gap::Ahead {
                offset: TimeDelta::milliseconds(1500),
                resync_to: at(12, 0, 6, 0),
            })
        );
        assert_eq!(aligner.target(), at(12, 0, 6, 0));

        // Next interval continues from the resynchronized target and
        // announces again after the gap.
        let target = aligner.advance();
        assert_eq!(target, at(12, 0, 8, 0));
        let tick = aligner.on_tick(Some(scan(target, "122")));
        assert!(tick.announce.is_some());
        assert!(!emitted(&tick).repeated);
    }

    #[test]
    fn test_late_scan_bridged_once() {
        let mut aligner = Aligner::new(at(12, 0, 0, 0), secs(1)).unwrap();

        let t1 = aligner.advance();
        let accepted = scan(t1, "120");
        aligner.on_tick(Some(accepted.clone()));

        // Device keeps returning the old reading.
        let t2 = aligner.advance();
        let tick = aligner.on_tick(Some(scan(t1, "120")));
        let emission = emitted(&tick);
        assert!(emission.repeated);
        assert_eq!(emission.target, t2);
        assert_eq!(emission.scan, accepted);
        assert!(aligner.repeated_last_time());

        let t3 = aligner.advance();
        let tick = aligner.on_tick(Some(scan(t1, "120")));
        assert_eq!(
            tick.action,
            Action::Skip(Gap::Late {
                offset: t1 - t3
            })
        );
    }

    #[test]
    fn test_late_scan_without_previous_is_gap() {
        let mut aligner = Aligner::new(at(12, 0, 0, 0), secs(1)).unwrap();
        let target = aligner.advance();

        let tick = aligner.on_tick(Some(scan(target - TimeDelta::seconds(5), "1")));
        assert!(matches!(tick.action, Action::Skip(Gap::Late { .. })));

        // The gap re-arms the device identity announcement.
        let target = aligner.advance();
        let tick = aligner.on_tick(Some(scan(target, "2")));
        assert!(tick.announce.is_some());
    }

    #[test]
    fn test_bridge_rearms_after_on_time_scan() {
        let mut aligner = Aligner::new(at(12, 0, 0, 0), secs(1)).unwrap();

        let t1 = aligner.advance();
        aligner.on_tick(Some(scan(t1, "1")));
        aligner.advance();
        assert!(emitted(&aligner.on_tick(Some(scan(t1, "1")))).repeated);

        let t3 = aligner.advance();
        let tick = aligner.on_tick(Some(scan(t3, "3")));
        assert!(!emitted(&tick).repeated);
        assert!(!aligner.repeated_last_time());

        aligner.advance();
        let tick = aligner.on_tick(Some(scan(t3, "3")));
        assert!(emitted(&tick).repeated);
        assert_eq!(emitted(&tick).scan.value("volts"), Some("3"));
    }

    #[test]
    fn test_empty_store_bridged_once_then_gap() {
        let mut aligner = Aligner::new(at(12, 0, 0, 0), secs(1)).unwrap();

        let t1 = aligner.advance();
        let accepted = scan(t1, "1");
        aligner.on_tick(Some(accepted.clone()));

        // First empty interval repeats the accepted scan.
        let t2 = aligner.advance();
        let tick = aligner.on_tick(None);
        assert!(tick.announce.is_none());
        let emission = emitted(&tick);
        assert!(emission.repeated);
        assert_eq!(emission.target, t2);
        assert_eq!(emission.scan, accepted);

        // Second consecutive empty interval is a gap.
        aligner.advance();
        assert_eq!(aligner.on_tick(None).action, Action::Skip(Gap::NoScan));
        aligner.advance();
        assert_eq!(aligner.on_tick(None).action, Action::Skip(Gap::NoScan));

        // The gap re-arms the identity announcement; the bridge re-arms on
        // the next on-time scan.
        let t5 = aligner.advance();
        let tick = aligner.on_tick(Some(scan(t5, "5")));
        assert!(tick.announce.is_some());
        assert!(!emitted(&tick).repeated);
        assert!(!aligner.repeated_last_time());
    }

    #[test]
    fn test_empty_store_without_previous_is_gap() {
        let mut aligner = Aligner::new(at(12, 0, 0, 0), secs(1)).unwrap();
        aligner.advance();

        let tick = aligner.on_tick(None);
        assert_eq!(tick.action, Action::Skip(Gap::NoScan));
        assert!(!aligner.repeated_last_time());
    }

    #[test]
    fn test_bridged_interval_keeps_announce_quiet() {
        let mut aligner = Aligner::new(at(12, 0, 0, 0), secs(1)).unwrap();

        let t1 = aligner.advance();
        assert!(aligner.on_tick(Some(scan(t1, "1"))).announce.is_some());
        aligner.advance();
        assert!(emitted(&aligner.on_tick(None)).repeated);

        // A single bridged miss is not a gap, so no re-announcement.
        let t3 = aligner.advance();
        let tick = aligner.on_tick(Some(scan(t3, "3")));
        assert!(tick.announce.is_none());
        assert!(!emitted(&tick).repeated);
    }

    #[test]
    fn test_dropped_sample_sequence() {
        // interval = 1s; device answers at T, T+1, nothing for T+2, then T+3
        let mut aligner = Aligner::new(at(12, 0, 0, 0), secs(1)).unwrap();
        let t = aligner.target() + TimeDelta::seconds(1);
        let taken = [
            Some(scan(t, "100")),
            Some(scan(t + TimeDelta::seconds(1), "101")),
            None,
            Some(scan(t + TimeDelta::seconds(3), "103")),
        ];

        let records: Vec<Emission> = taken
            .into_iter()
            .filter_map(|taken| {
                aligner.advance();
                match aligner.on_tick(taken).action {
                    Action::Emit(e) => Some(e),
                    Action::Skip(_) => None,
                }
            })
            .collect();

        assert_eq!(records.len(), 4);
        let targets: Vec<_> = records.iter().map(|e| e.target).collect();
        assert_eq!(
            targets,
            (0..4).map(|i| t + TimeDelta::seconds(i)).collect::<Vec<_>>()
        );
        let values: Vec<_> = records.iter().map(|e| e.scan.value("volts")).collect();
        assert_eq!(
            values,
            vec![Some("100"), Some("101"), Some("101"), Some("103")]
        );
        let repeated: Vec<_> = records.iter().map(|e| e.repeated).collect();
        assert_eq!(repeated, vec![false, false, true, false]);
    }
}
