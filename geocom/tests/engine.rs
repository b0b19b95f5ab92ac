//! Protocol engine behaviour against a scripted serial line.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use approx::assert_relative_eq;

use geocom::{
    Arg, CancelToken, Clock, GeoComDevice, GeoComError, InclinationMode, ManualClock,
    SimpleMeasurement, TotalStation, Transport,
};

/// What the fake instrument does after a request is written.
enum Reply {
    /// Echo the request's transaction ID with this tail (`<rc>,<params>`).
    Matching(&'static str),
    /// Answer with a fixed frame.
    Fixed(&'static str),
    /// Say nothing.
    Silent,
    /// Answer after the engine has polled this many times.
    Delayed(usize, &'static str),
}

#[derive(Default)]
struct Line {
    written: Vec<String>,
    rx: Vec<u8>,
    pending: Option<(usize, String)>,
    polls: usize,
    reads: usize,
    discards: usize,
}

/// Scripted transport sharing its state with the test body.
struct ScriptedTransport {
    line: Rc<RefCell<Line>>,
    script: VecDeque<Reply>,
    fail_writes: bool,
    /// Raise this token once the engine has polled this many times.
    cancel_after: Option<(usize, CancelToken)>,
}

impl ScriptedTransport {
    fn new(script: Vec<Reply>) -> (Self, Rc<RefCell<Line>>) {
        let line = Rc::new(RefCell::new(Line::default()));
        (
            Self {
                line: line.clone(),
                script: script.into(),
                fail_writes: false,
                cancel_after: None,
            },
            line,
        )
    }
}

fn request_trid(request: &str) -> u8 {
    let header = request.trim().split(':').next().unwrap_or_default();
    header.rsplit(',').next().unwrap().parse().unwrap()
}

impl Transport for ScriptedTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
        }
        let request = String::from_utf8_lossy(bytes).into_owned();
        let trid = request_trid(&request);
        let mut line = self.line.borrow_mut();
        line.written.push(request);
        match self.script.pop_front().unwrap_or(Reply::Silent) {
            Reply::Matching(tail) => {
                let frame = format!("%R1P,0,{trid}:{tail}\r\n");
                line.rx.extend_from_slice(frame.as_bytes());
            }
            Reply::Fixed(frame) => line.rx.extend_from_slice(frame.as_bytes()),
            Reply::Silent => {}
            Reply::Delayed(polls, tail) => {
                line.pending = Some((polls, format!("%R1P,0,{trid}:{tail}\r\n")));
            }
        }
        Ok(())
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        let mut line = self.line.borrow_mut();
        line.polls += 1;
        if let Some((polls, token)) = &self.cancel_after {
            if line.polls >= *polls {
                token.cancel();
            }
        }
        if let Some((remaining, frame)) = line.pending.take() {
            if remaining == 0 {
                line.rx.extend_from_slice(frame.as_bytes());
            } else {
                line.pending = Some((remaining - 1, frame));
            }
        }
        Ok(line.rx.len())
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let mut line = self.line.borrow_mut();
        line.reads += 1;
        Ok(std::mem::take(&mut line.rx))
    }

    fn discard_input(&mut self) -> io::Result<()> {
        let mut line = self.line.borrow_mut();
        line.discards += 1;
        line.rx.clear();
        Ok(())
    }
}

const TIMEOUT: Duration = Duration::from_secs(3);

#[test]
fn test_silent_instrument_times_out_within_bound() {
    let (transport, _line) = ScriptedTransport::new(vec![Reply::Silent]);
    let clock = ManualClock::new();
    let mut device = GeoComDevice::with_clock(transport, &clock);
    let poll = device.config().poll_interval;

    let start = clock.now();
    let err = device.send(5004, &[], TIMEOUT).unwrap_err();
    let elapsed = clock.now() - start;

    assert!(matches!(err, GeoComError::Timeout));
    assert_eq!(err.return_code(), 3077);
    assert!(elapsed >= TIMEOUT, "returned early after {elapsed:?}");
    assert!(elapsed <= TIMEOUT + poll, "overran to {elapsed:?}");
}

#[test]
fn test_mismatched_transaction_id_is_timeout() {
    // First request carries trid 0, the reply claims trid 5.
    let (transport, _line) = ScriptedTransport::new(vec![Reply::Fixed("%R1P,0,5:0,1.0,2.0\r\n")]);
    let clock = ManualClock::new();
    let mut device = GeoComDevice::with_clock(transport, &clock);

    let err = device.send(2107, &[Arg::from(1)], TIMEOUT).unwrap_err();
    assert!(matches!(err, GeoComError::Timeout));
}

#[test]
fn test_reply_missing_colon_is_malformed() {
    let (transport, _line) = ScriptedTransport::new(vec![Reply::Fixed("%R1P,0,0\r\n")]);
    let clock = ManualClock::new();
    let mut device = GeoComDevice::with_clock(transport, &clock);

    let err = device.send(5004, &[], TIMEOUT).unwrap_err();
    assert!(matches!(err, GeoComError::MalformedFrame(_)));
    assert!(!err.is_recoverable());
}

#[test]
fn test_transaction_ids_follow_request_count() {
    let script = (0..20).map(|_| Reply::Matching("0")).collect();
    let (transport, line) = ScriptedTransport::new(script);
    let clock = ManualClock::new();
    let mut device = GeoComDevice::with_clock(transport, &clock);

    for n in 0..20u32 {
        let reply = device.send(9013, &[], TIMEOUT).unwrap();
        assert_eq!(u32::from(reply.transaction_id), n % 8);
    }
    assert_eq!(device.next_transaction_id(), 4);

    let line = line.borrow();
    let written = &line.written;
    assert_eq!(written[0], "\n%R1Q,9013,0:\r\n");
    assert_eq!(written[9], "\n%R1Q,9013,1:\r\n");
}

#[test]
fn test_stale_bytes_are_drained_before_sending() {
    let (transport, line) = ScriptedTransport::new(vec![Reply::Matching("0,\"TS16\"")]);
    line.borrow_mut()
        .rx
        .extend_from_slice(b"%R1P,0,7:0,leftover\r\n");
    let clock = ManualClock::new();
    let mut device = GeoComDevice::with_clock(transport, &clock);

    let reply = device.send(5004, &[], TIMEOUT).unwrap();
    assert_eq!(reply.transaction_id, 0);
    assert_eq!(reply.string_param(0).unwrap(), "TS16");
    assert_eq!(line.borrow().discards, 1);
}

#[test]
fn test_partial_arrival_waits_for_expected_length() {
    let (transport, line) = ScriptedTransport::new(vec![Reply::Delayed(10, "0,1.5,0.5")]);
    let clock = ManualClock::new();
    let mut device = GeoComDevice::with_clock(transport, &clock);

    let reply = device
        .send_expecting(2107, &[Arg::from(1)], 12, TIMEOUT)
        .unwrap();
    assert_eq!(reply.params, vec!["1.5", "0.5"]);
    assert!(line.borrow().polls > 10);
    assert!(clock.elapsed() < TIMEOUT);
}

#[test]
fn test_cancellation_aborts_without_reading() {
    let (transport, line) = ScriptedTransport::new(vec![Reply::Fixed("%R1P,0,0:0\r\n")]);
    let clock = ManualClock::new();
    let mut device = GeoComDevice::with_clock(transport, &clock);
    let token = CancelToken::new();
    device.set_cancel_token(token.clone());
    token.cancel();

    let err = device.send(9029, &[], Duration::from_secs(120)).unwrap_err();
    assert!(matches!(err, GeoComError::Cancelled));
    assert!(!err.is_recoverable());
    // Buffered reply is left for the next send's drain.
    assert!(!line.borrow().rx.is_empty());
    assert_eq!(clock.elapsed(), Duration::ZERO);
}

#[test]
fn test_cancellation_while_polling_aborts_at_once() {
    let (mut transport, line) = ScriptedTransport::new(vec![Reply::Delayed(20, "0")]);
    let token = CancelToken::new();
    transport.cancel_after = Some((5, token.clone()));
    let clock = ManualClock::new();
    let mut device = GeoComDevice::with_clock(transport, &clock);
    device.set_cancel_token(token);
    let poll = device.config().poll_interval;

    let err = device.send(9029, &[], Duration::from_secs(120)).unwrap_err();
    assert!(matches!(err, GeoComError::Cancelled));

    let line = line.borrow();
    assert_eq!(line.polls, 5);
    assert_eq!(line.reads, 0);
    // Reply still on its way, nothing consumed.
    assert!(line.pending.is_some());
    assert_eq!(clock.elapsed(), poll * 5);
}

#[test]
fn test_transport_failure_is_communication_error() {
    let (mut transport, _line) = ScriptedTransport::new(vec![]);
    transport.fail_writes = true;
    let clock = ManualClock::new();
    let mut device = GeoComDevice::with_clock(transport, &clock);

    let err = device.send(5004, &[], TIMEOUT).unwrap_err();
    assert!(matches!(err, GeoComError::Communication(_)));
}

#[test]
fn test_engine_recovers_after_timeout() {
    let (transport, _line) =
        ScriptedTransport::new(vec![Reply::Silent, Reply::Matching("0,\"TS16\"")]);
    let clock = ManualClock::new();
    let mut device = GeoComDevice::with_clock(transport, &clock);

    assert!(device.send(5004, &[], TIMEOUT).is_err());
    let reply = device.send(5004, &[], TIMEOUT).unwrap();
    assert_eq!(reply.transaction_id, 1);
}

#[test]
fn test_station_simple_measurement_outcomes() {
    let (transport, _line) = ScriptedTransport::new(vec![
        Reply::Matching("0,0.5,1.5,12.25"),
        Reply::Matching("1284,0.5,1.5,12.25"),
        Reply::Matching("1285,0.5,1.5"),
        Reply::Matching("8710"),
        Reply::Matching("0,0.5"),
    ]);
    let clock = ManualClock::new();
    let mut station = TotalStation::new(GeoComDevice::with_clock(transport, &clock));

    let complete = station
        .simple_measurement(150, InclinationMode::Automatic)
        .unwrap();
    assert!(matches!(complete, SimpleMeasurement::Complete(p) if p.slope_distance == 12.25));

    let unverified = station
        .simple_measurement(150, InclinationMode::Automatic)
        .unwrap();
    assert!(matches!(unverified, SimpleMeasurement::Unverified(_)));

    let angles = station
        .simple_measurement(150, InclinationMode::Automatic)
        .unwrap();
    assert!(matches!(angles, SimpleMeasurement::AnglesOnly { hz, .. } if hz == 0.5));

    let err = station
        .simple_measurement(150, InclinationMode::Automatic)
        .unwrap_err();
    assert_eq!(err.return_code(), 8710);

    let err = station
        .simple_measurement(150, InclinationMode::Automatic)
        .unwrap_err();
    assert!(matches!(err, GeoComError::InvalidParameter(_)));
    assert!(err.is_recoverable());
}

#[test]
fn test_station_switch_on_already_on() {
    let (transport, line) = ScriptedTransport::new(vec![Reply::Matching("5")]);
    let clock = ManualClock::new();
    let mut station = TotalStation::new(GeoComDevice::with_clock(transport, &clock));

    let state = station.switch_on(geocom::StartupMode::Online).unwrap();
    assert_eq!(state, geocom::PowerState::AlreadyOn);
    assert_eq!(line.borrow().written[0], "\n%R1Q,111,0:2\r\n");
}

#[test]
fn test_station_unknown_edm_mode_is_invalid_parameter() {
    let (transport, _line) = ScriptedTransport::new(vec![Reply::Matching("0,42")]);
    let clock = ManualClock::new();
    let mut station = TotalStation::new(GeoComDevice::with_clock(transport, &clock));

    assert!(matches!(
        station.edm_mode(),
        Err(GeoComError::InvalidParameter(_))
    ));
}

#[test]
fn test_station_search_area_and_angles() {
    let (transport, line) = ScriptedTransport::new(vec![
        Reply::Matching("0,0.1,1.5708,1,1,1"),
        Reply::Matching("0,3.14159265,1.57079633"),
    ]);
    let clock = ManualClock::new();
    let mut station = TotalStation::new(GeoComDevice::with_clock(transport, &clock));

    let area = station.search_area().unwrap();
    assert_relative_eq!(area.center_hz, 0.1);
    assert_relative_eq!(area.center_v, 1.5708);
    assert!(area.enabled);

    let (hz, v) = station.angles(InclinationMode::Automatic).unwrap();
    assert_relative_eq!(hz, std::f64::consts::PI, epsilon = 1e-8);
    assert_relative_eq!(v, std::f64::consts::FRAC_PI_2, epsilon = 1e-8);
    assert_eq!(line.borrow().written[1], "\n%R1Q,2107,1:1\r\n");
}
