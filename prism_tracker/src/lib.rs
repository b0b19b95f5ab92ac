//! Prism search-and-track controller.
//!
//! Drives a total station through: Idle -> Searching -> FineAdjusting ->
//! Locked -> Tracking, falling back to Searching once the prism has been
//! lost for longer than the configured number of consecutive readings.
//!
//! The controller never loops or sleeps on its own. Each [`step`] performs
//! at most one instrument operation; after a failed search the caller asks
//! [`retry_delay`] how long to back off before stepping again.
//!
//! [`step`]: TrackingController::step
//! [`retry_delay`]: TrackingController::retry_delay

pub mod config;
pub mod coords;
pub mod instrument;

use std::fmt;
use std::time::Duration;

use geocom::{GeoComResult, PolarMeasurement, ReturnCode, SimpleMeasurement};
use serde::{Deserialize, Serialize};

pub use config::{DistanceLimits, TrackerConfig, WindowSize};
pub use coords::{from_measurement, to_cartesian, Cartesian};
pub use instrument::{SearchWindow, TrackingInstrument};

/// Tracking controller states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackState {
    /// Not started, or stopped
    Idle,
    /// Looking for the prism; `attempts` failed searches so far
    Searching { attempts: usize },
    /// Prism located, centring onto it
    FineAdjusting,
    /// Centred, about to lock and start measuring
    Locked,
    /// Last reading was good
    Tracking,
    /// Recent readings failed, prism not yet declared lost
    Degraded { failures: usize },
}

/// Target direction [rad].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetAngles {
    pub hz: f64,
    pub v: f64,
}

/// One reading produced while tracking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackReading {
    /// Angles and distance valid
    Full(PolarMeasurement),
    /// Angles and distance present, accuracy not verified
    Unverified(PolarMeasurement),
    /// No distance
    AnglesOnly { code: ReturnCode },
    /// Instrument error or unusable reply
    Error { code: u16 },
}

impl TrackReading {
    /// Whether this reading counts as a failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TrackReading::AnglesOnly { .. } | TrackReading::Error { .. }
        )
    }
}

impl fmt::Display for TrackReading {
    /// `0;x;y;z;`, `1;x;y;z;`, `2` or `3`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackReading::Full(polar) => write!(f, "0;{}", from_measurement(polar)),
            TrackReading::Unverified(polar) => write!(f, "1;{}", from_measurement(polar)),
            TrackReading::AnglesOnly { .. } => write!(f, "2"),
            TrackReading::Error { .. } => write!(f, "3"),
        }
    }
}

/// Line printed for a reading lost to a transport failure or an undecodable
/// reply.
pub const COMMUNICATION_ERROR_LINE: &str = "4";

/// Main tracking state machine
pub struct TrackingController<I: TrackingInstrument> {
    instrument: I,
    config: TrackerConfig,
    state: TrackState,
    last_known: Option<TargetAngles>,
    failures: usize,
    /// Searching because a locked prism was lost
    recovering: bool,
    recoveries: usize,
}

impl<I: TrackingInstrument> TrackingController<I> {
    pub fn new(instrument: I, config: TrackerConfig) -> Self {
        Self {
            instrument,
            config,
            state: TrackState::Idle,
            last_known: None,
            failures: 0,
            recovering: false,
            recoveries: 0,
        }
    }

    /// Begin acquisition from Idle.
    pub fn start(&mut self) {
        if self.state != TrackState::Idle {
            log::warn!("Start requested in state {:?}, ignoring", self.state);
            return;
        }
        log::info!("Starting tracker, entering Searching state");
        self.failures = 0;
        self.recovering = false;
        self.state = TrackState::Searching { attempts: 0 };
    }

    pub fn stop(&mut self) {
        log::info!("Stopping tracker, returning to Idle");
        self.state = TrackState::Idle;
    }

    pub fn state(&self) -> &TrackState {
        &self.state
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Consecutive failed readings.
    pub fn failure_count(&self) -> usize {
        self.failures
    }

    /// Direction of the last reading that had a distance.
    pub fn last_known(&self) -> Option<TargetAngles> {
        self.last_known
    }

    /// Number of times the prism was declared lost.
    pub fn recoveries(&self) -> usize {
        self.recoveries
    }

    pub fn is_recovering(&self) -> bool {
        self.recovering
    }

    pub fn instrument(&self) -> &I {
        &self.instrument
    }

    pub fn instrument_mut(&mut self) -> &mut I {
        &mut self.instrument
    }

    pub fn into_instrument(self) -> I {
        self.instrument
    }

    /// How long to wait before the next step after a failed search.
    pub fn retry_delay(&self) -> Option<Duration> {
        match self.state {
            TrackState::Searching { attempts } if attempts > 0 => Some(if self.recovering {
                self.config.recover_retry()
            } else {
                self.config.acquire_retry()
            }),
            _ => None,
        }
    }

    /// Window the next search will use.
    ///
    /// Centred on the last known direction if there is one, otherwise on
    /// the configured home direction. The first attempt uses the narrow
    /// window unless there is nothing to centre on.
    pub fn search_window(&self) -> SearchWindow {
        let attempts = match self.state {
            TrackState::Searching { attempts } => attempts,
            _ => 0,
        };
        let (center_hz, center_v) = match self.last_known {
            Some(angles) => (angles.hz, angles.v),
            None => (self.config.home_hz, self.config.home_v),
        };
        let lost_without_hint = self.recovering && self.last_known.is_none();
        let size = if attempts == 0 && !lost_without_hint {
            self.config.narrow_window
        } else {
            self.config.wide_window
        };
        SearchWindow {
            center_hz,
            center_v,
            range_hz: size.hz,
            range_v: size.v,
            distance_limits: self.config.distance_limits,
        }
    }

    /// Perform one instrument operation and advance the state.
    ///
    /// Returns a reading while tracking, `None` during acquisition.
    ///
    /// # Errors
    ///
    /// Transport failures, undecodable frames and cancellation are returned
    /// unchanged and leave the state as it was. Timeouts, instrument errors
    /// and bad reply parameters are absorbed into the state machine.
    pub fn step(&mut self) -> GeoComResult<Option<TrackReading>> {
        use TrackState::*;

        let (new_state, reading) = match self.state.clone() {
            Idle => {
                log::debug!("Step while Idle, nothing to do");
                (Idle, None)
            }

            Searching { attempts } => {
                let window = self.search_window();
                log::debug!("Search attempt {} in {:?}", attempts + 1, window);
                match self.instrument.search(&window) {
                    Ok(()) => {
                        log::info!("Prism found, entering FineAdjusting state");
                        (FineAdjusting, None)
                    }
                    Err(e) if e.is_recoverable() => {
                        log::warn!("Search failed ({e}), searching again");
                        (
                            Searching {
                                attempts: attempts + 1,
                            },
                            None,
                        )
                    }
                    Err(e) => return Err(e),
                }
            }

            FineAdjusting => {
                let (hz, v) = (self.config.fine_adjust_hz, self.config.fine_adjust_v);
                match self.instrument.fine_adjust(hz, v) {
                    Ok(()) => {
                        log::info!("Fine adjust complete, entering Locked state");
                        (Locked, None)
                    }
                    Err(e) if e.is_recoverable() => {
                        log::warn!("Fine adjust failed ({e}), returning to Searching");
                        (Searching { attempts: 1 }, None)
                    }
                    Err(e) => return Err(e),
                }
            }

            Locked => match self.instrument.lock_in() {
                Ok(()) => {
                    self.begin_measuring()?;
                    log::info!("Prism locked, entering Tracking state");
                    self.failures = 0;
                    self.recovering = false;
                    (Tracking, None)
                }
                Err(e) if e.is_recoverable() => {
                    log::warn!("Lock-in failed ({e}), returning to Searching");
                    (Searching { attempts: 1 }, None)
                }
                Err(e) => return Err(e),
            },

            Tracking | Degraded { .. } => {
                let reading = self.measure()?;
                let state = if !reading.is_failure() {
                    Tracking
                } else if self.failures > self.config.failure_threshold {
                    log::warn!(
                        "Prism lost after {} consecutive failed readings, searching again",
                        self.failures
                    );
                    self.failures = 0;
                    self.recovering = true;
                    self.recoveries += 1;
                    Searching { attempts: 0 }
                } else {
                    Degraded {
                        failures: self.failures,
                    }
                };
                (state, Some(reading))
            }
        };

        self.state = new_state;
        Ok(reading)
    }

    /// Configure the EDM and start the measurement cycle. Failures here are
    /// logged and tracking starts anyway; bad readings will show up as
    /// failures.
    fn begin_measuring(&mut self) -> GeoComResult<()> {
        let mode = self.config.edm_mode;
        if let Err(e) = self.instrument.set_measurement_mode(mode) {
            if !e.is_recoverable() {
                return Err(e);
            }
            log::warn!("Failed to set EDM mode {mode}: {e}");
        }
        if let Err(e) = self.instrument.start_measurement() {
            if !e.is_recoverable() {
                return Err(e);
            }
            log::warn!("Failed to start measurement: {e}");
        }
        Ok(())
    }

    fn measure(&mut self) -> GeoComResult<TrackReading> {
        let result = self
            .instrument
            .simple_measurement(self.config.measurement_wait_ms, self.config.inclination_mode);

        let reading = match result {
            Ok(SimpleMeasurement::Complete(polar)) => {
                self.record(&polar);
                TrackReading::Full(polar)
            }
            Ok(SimpleMeasurement::Unverified(polar)) => {
                log::warn!("Accuracy could not be verified");
                self.record(&polar);
                TrackReading::Unverified(polar)
            }
            Ok(SimpleMeasurement::AnglesOnly { code, .. }) => {
                self.failures += 1;
                log::debug!("Angles only ({}), failure {}", code, self.failures);
                TrackReading::AnglesOnly { code }
            }
            Err(e) if !e.is_recoverable() => return Err(e),
            Err(e) => {
                self.failures += 1;
                log::warn!("Measurement failed ({e}), failure {}", self.failures);
                TrackReading::Error {
                    code: e.return_code(),
                }
            }
        };
        Ok(reading)
    }

    fn record(&mut self, polar: &PolarMeasurement) {
        self.failures = 0;
        self.last_known = Some(TargetAngles {
            hz: polar.hz,
            v: polar.v,
        });
    }
}
