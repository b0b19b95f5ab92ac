//! Instrument interface used by the tracking controller.

use geocom::{
    Clock, EdmMode, GeoComResult, InclinationMode, MeasureCommand, SearchArea, SimpleMeasurement,
    TotalStation, Transport,
};

use crate::config::DistanceLimits;

/// Where to look for the prism.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchWindow {
    /// Window centre [rad]
    pub center_hz: f64,
    pub center_v: f64,
    /// Window extent [rad]
    pub range_hz: f64,
    pub range_v: f64,
    /// Only accept prisms within this distance band
    pub distance_limits: Option<DistanceLimits>,
}

/// Interface for the search and measurement primitives
///
/// Abstracts the total station so the controller can be driven by a
/// scripted instrument in tests.
pub trait TrackingInstrument {
    /// Search for the prism inside `window`.
    fn search(&mut self, window: &SearchWindow) -> GeoComResult<()>;

    /// Centre onto a roughly located prism.
    fn fine_adjust(&mut self, hz_range: f64, v_range: f64) -> GeoComResult<()>;

    /// Start following the prism.
    fn lock_in(&mut self) -> GeoComResult<()>;

    fn set_measurement_mode(&mut self, mode: EdmMode) -> GeoComResult<()>;

    /// Start the distance measurement cycle.
    fn start_measurement(&mut self) -> GeoComResult<()>;

    fn simple_measurement(
        &mut self,
        wait_ms: u32,
        inclination: InclinationMode,
    ) -> GeoComResult<SimpleMeasurement>;
}

impl<T: Transport, C: Clock> TrackingInstrument for TotalStation<T, C> {
    /// PowerSearch: set the search area, restrict the distance band if
    /// configured, then search the window.
    fn search(&mut self, window: &SearchWindow) -> GeoComResult<()> {
        self.set_search_area(&SearchArea {
            center_hz: window.center_hz,
            center_v: window.center_v,
            range_hz: window.range_hz,
            range_v: window.range_v,
            enabled: true,
        })?;
        match window.distance_limits {
            Some(limits) => {
                self.ps_set_range(limits.min, limits.max)?;
                self.ps_enable_range(true)?;
            }
            None => self.ps_enable_range(false)?,
        }
        self.ps_search_window()
    }

    fn fine_adjust(&mut self, hz_range: f64, v_range: f64) -> GeoComResult<()> {
        TotalStation::fine_adjust(self, hz_range, v_range)
    }

    fn lock_in(&mut self) -> GeoComResult<()> {
        TotalStation::lock_in(self)
    }

    fn set_measurement_mode(&mut self, mode: EdmMode) -> GeoComResult<()> {
        self.set_edm_mode(mode)
    }

    fn start_measurement(&mut self) -> GeoComResult<()> {
        self.do_measure(MeasureCommand::DefaultDistance, InclinationMode::Automatic)
    }

    fn simple_measurement(
        &mut self,
        wait_ms: u32,
        inclination: InclinationMode,
    ) -> GeoComResult<SimpleMeasurement> {
        TotalStation::simple_measurement(self, wait_ms, inclination)
    }
}
