//! # Session Controller
//!
//! The single dispatch loop of the controller. Each call to [`SessionCtrl::tick`]:
//!
//! 1. advances the executing profiled move by one sample, answering the source which issued it
//!    once the move completes or fails,
//! 2. polls every input source once, in registration order, dispatching at most one request from
//!    each.
//!
//! Every dispatched request is answered with exactly one response line, except `profile` whose
//! response is sent when the move ends.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::{
    motion::{
        AppliedMove, ExecMode, MotionError, MotionPlanner, MotionRequest, ProfileSummary,
        StepOutcome,
    },
    params::{ClampPolicy, EyeExecParams},
    input::{InputSource, Request},
    servo_ctrl::ServoDriver,
    telemetry::MotionStats,
};
use eye_if::{
    cmd::{self, fmt_value, Command, Response, TargetCmd, HELP_TEXT},
    eqpt::{AxisId, EyeId, EyeScope},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Token appended to responses of moves whose targets were clamped.
pub const CLAMPED_TOKEN: &str = "CLAMPED";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// State of the session visible to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionState {
    /// Eyes moved by presets, `saccade` and `profile`
    pub scope: EyeScope,

    /// Distance of the gaze presets.
    ///
    /// Units: degrees
    pub distance_deg: f64,

    pub engaged: bool,

    /// A profiled move is executing
    pub busy: bool,
}

/// The session controller.
pub struct SessionCtrl<D: ServoDriver> {
    planner: MotionPlanner<D>,

    sources: Vec<Registered>,

    state: SessionState,

    clamp_policy: ClampPolicy,

    distance_options_deg: Vec<f64>,

    trim_fraction: f64,

    /// Directory telemetry exports are written to
    arch_root: PathBuf,

    /// Source which issued the executing profiled move, `None` for direct calls
    profile_issuer: Option<usize>,

    running: bool,
}

struct Registered {
    source: Box<dyn InputSource>,
    closed: bool,
}

/// Analytics summary saved next to an exported telemetry file.
#[derive(Debug, Clone, Serialize)]
struct TelemetrySummary {
    csv_file: String,
    complete: bool,
    stats: MotionStats,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<D: ServoDriver> SessionCtrl<D> {
    /// Create the controller around a planner.
    ///
    /// `arch_root` is where `save` writes telemetry, usually the session's archive directory.
    pub fn new(planner: MotionPlanner<D>, params: &EyeExecParams, arch_root: PathBuf) -> Self {
        let state = SessionState {
            scope: params.default_scope,
            distance_deg: params.default_distance_deg,
            engaged: planner.is_engaged(),
            busy: planner.is_busy(),
        };

        Self {
            planner,
            sources: Vec::new(),
            state,
            clamp_policy: params.clamp_policy,
            distance_options_deg: params.distance_options_deg.clone(),
            trim_fraction: params.avg_accel_trim_fraction,
            arch_root,
            profile_issuer: None,
            running: true,
        }
    }

    /// Register an input source, it is polled from the next tick.
    pub fn add_source(&mut self, source: Box<dyn InputSource>) {
        info!("Input source registered: {}", source.name());
        self.sources.push(Registered {
            source,
            closed: false,
        });
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn planner(&self) -> &MotionPlanner<D> {
        &self.planner
    }

    pub fn planner_mut(&mut self) -> &mut MotionPlanner<D> {
        &mut self.planner
    }

    /// False once `quit` has been handled, or every source has closed.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Run one cycle of the loop.
    pub fn tick(&mut self) {
        if let Some(response) = self.advance_motion() {
            let issuer = self.profile_issuer.take();
            self.respond(issuer, &response);
        }

        for idx in 0..self.sources.len() {
            if !self.running {
                break;
            }
            if self.sources[idx].closed {
                continue;
            }

            let request = match self.sources[idx].source.poll() {
                Ok(Some(r)) => r,
                Ok(None) => continue,
                Err(e) => {
                    self.close_source(idx, e);
                    continue;
                }
            };

            debug!("[{}] {:?}", self.sources[idx].source.name(), request);

            if let Some(response) = self.handle_request(request, Some(idx)) {
                self.respond(Some(idx), &response);
            }
        }

        if !self.sources.is_empty() && self.sources.iter().all(|s| s.closed) {
            info!("All input sources closed");
            self.running = false;
        }
    }

    /// Execute the next sample of the profiled move, returning the move's response if it ended.
    pub fn advance_motion(&mut self) -> Option<Response> {
        let outcome = self.planner.step()?;
        self.sync_state();

        match outcome {
            StepOutcome::Sampled { .. } => None,
            StepOutcome::Completed(s) => Some(self.profile_response(&s)),
            StepOutcome::Failed(e, s) => Some(aborted_response(&e.to_string(), &s)),
        }
    }

    /// Parse and dispatch a command line issued outside of any registered source.
    pub fn handle_line(&mut self, line: &str) -> Option<Response> {
        self.handle_request(Request::Line(line.to_string()), None)
    }

    /// Dispatch a command issued outside of any registered source.
    ///
    /// Returns `None` for a profiled move which has started, its response comes from
    /// [`Self::advance_motion`].
    pub fn handle_command(&mut self, cmd: Command) -> Option<Response> {
        self.dispatch(cmd, None)
    }

    /// Stop any executing move and power the servos off.
    pub fn shutdown(&mut self) {
        let (cancelled, result) = self.planner.disengage();
        if let Some(s) = cancelled {
            self.abort_issuer("by QUIT", &s);
        }
        if let Err(e) = result {
            warn!("Could not disengage the servos: {}", e);
        }
        self.sync_state();
        self.running = false;
    }

    // ---- PRIVATE ----

    fn handle_request(&mut self, request: Request, issuer: Option<usize>) -> Option<Response> {
        let cmd = match request {
            Request::Cmd(c) => c,
            Request::Line(l) => match cmd::parse(&l) {
                Ok(c) => c,
                Err(e) => {
                    warn!("Could not parse \"{}\": {}", l.trim(), e);
                    return Some(Response::err(format!("PARSE {}", e)));
                }
            },
        };

        self.dispatch(cmd, issuer)
    }

    fn dispatch(&mut self, cmd: Command, issuer: Option<usize>) -> Option<Response> {
        debug!("Dispatching {:?}", cmd);
        let cmd_name = cmd.name();

        if cmd.is_motion() && self.planner.is_busy() {
            return Some(Response::err(MotionError::Busy.to_string()));
        }

        let response = match cmd {
            Command::Preset(p) => {
                let req = MotionRequest::preset(p, self.state.distance_deg, self.state.scope);
                self.planner.apply_immediate(&req).map(|m| {
                    let mut values = vec![p.tag().to_string()];
                    values.extend(both_eyes(&m));
                    self.ok_move("9PT", values, m.clamped)
                })
            }
            Command::Sac(fields) => self
                .planner
                .apply_immediate(&MotionRequest::sac(fields))
                .map(|m| self.ok_move("SAC", both_eyes(&m), m.clamped)),
            Command::Saccade(t) => {
                let req = self.target_request(&t, ExecMode::Immediate);
                self.planner
                    .apply_immediate(&req)
                    .map(|m| self.saccade_response(&m))
            }
            Command::Profile(t) => {
                let req = self.target_request(&t, ExecMode::Profiled);
                match self.planner.start_profile(&req) {
                    Ok(_) => {
                        self.profile_issuer = issuer;
                        self.sync_state();
                        return None;
                    }
                    Err(e) => Err(e),
                }
            }
            Command::Zero => self.zero(),
            Command::Engage => self
                .planner
                .engage()
                .map(|_| Response::ok("ENGAGE", vec![])),
            Command::Disengage => {
                let (cancelled, result) = self.planner.disengage();
                if let Some(s) = cancelled {
                    self.abort_issuer("by DISENGAGE", &s);
                }
                result.map(|_| Response::ok("DISENGAGE", vec![]))
            }
            Command::Position => Ok(self.position_response()),
            Command::Limits => Ok(self.limits_response()),
            Command::Save(name) => Ok(self.save(name.as_deref())),
            Command::Stats => Ok(self.stats_response()),
            Command::Eye(scope) => {
                self.state.scope = scope.unwrap_or_else(|| self.state.scope.next());
                info!("Eye scope set to {}", self.state.scope.tag());
                Ok(Response::ok("EYE", vec![self.state.scope.tag().to_string()]))
            }
            Command::Range(distance) => {
                self.state.distance_deg = match distance {
                    Some(d) => d,
                    None => self.next_distance(),
                };
                info!("Preset distance set to {} deg", self.state.distance_deg);
                Ok(Response::ok(
                    "RANGE",
                    vec![fmt_value(self.state.distance_deg)],
                ))
            }
            Command::Help => Ok(Response::ok("HELP", vec![HELP_TEXT.to_string()])),
            Command::Quit => {
                info!("Quit requested");
                self.running = false;
                Ok(Response::ok("QUIT", vec![]))
            }
        };

        self.sync_state();

        Some(match response {
            Ok(r) => r,
            Err(e) => {
                warn!("{} failed: {}", cmd_name, e);
                Response::err(e.to_string())
            }
        })
    }

    fn zero(&mut self) -> Result<Response, MotionError> {
        let (cancelled, applied) = self.planner.zero();

        // The cancelled move is answered even if the move to zero failed
        if let Some(s) = cancelled {
            self.abort_issuer("by ZERO", &s);
        }

        applied.map(|m| Response::ok("ZERO", both_eyes(&m)))
    }

    /// Answer the issuer of a cancelled profiled move.
    fn abort_issuer(&mut self, reason: &str, summary: &ProfileSummary) {
        let resp = aborted_response(reason, summary);
        let issuer = self.profile_issuer.take();
        self.respond(issuer, &resp);
    }

    fn target_request(&self, t: &TargetCmd, mode: ExecMode) -> MotionRequest {
        MotionRequest::target(
            self.state.scope,
            t.pan_deg,
            t.tilt_deg,
            t.accel_degss,
            t.max_vel_degs,
            mode,
        )
    }

    fn ok_move(&self, cmd: &str, mut values: Vec<String>, clamped: bool) -> Response {
        if clamped && self.clamp_policy == ClampPolicy::Report {
            values.push(CLAMPED_TOKEN.to_string());
        }
        Response::ok(cmd, values)
    }

    fn saccade_response(&self, m: &AppliedMove) -> Response {
        let eye = self.state.scope.reference_eye();
        let (pan, tilt) = m.rel(eye);
        let (pan_abs, tilt_abs) = m.abs(eye);
        let (pan_err, tilt_err) = m.error(eye);

        self.ok_move(
            "SACCADE",
            vec![
                fmt_value(pan),
                fmt_value(tilt),
                "ABS".into(),
                fmt_value(pan_abs),
                fmt_value(tilt_abs),
                "ERROR".into(),
                fmt_value(pan_err),
                fmt_value(tilt_err),
            ],
            m.clamped,
        )
    }

    fn profile_response(&self, s: &ProfileSummary) -> Response {
        self.ok_move(
            "PROFILE",
            vec![
                fmt_value(s.final_rel_deg.0),
                fmt_value(s.final_rel_deg.1),
                "ABS".into(),
                fmt_value(s.final_abs_deg.0),
                fmt_value(s.final_abs_deg.1),
                "DURATION".into(),
                format!("{:.3}", s.duration_s),
                "SAMPLES".into(),
                s.num_samples.to_string(),
            ],
            s.clamped,
        )
    }

    fn position_response(&self) -> Response {
        let mut values = Vec::new();

        for eye in EyeId::ALL.iter() {
            let (pan, tilt) = self.planner.coords().position(*eye).rel_deg();
            values.push(eye.tag().to_string());
            values.push(fmt_value(pan));
            values.push(fmt_value(tilt));
        }

        Response::ok("POSITION", values)
    }

    fn limits_response(&self) -> Response {
        let coords = self.planner.coords();
        let mut values = Vec::new();

        for axis in AxisId::ALL.iter() {
            let (min, max) = coords.limits(*axis);
            values.push(axis.to_string().to_ascii_uppercase());
            values.push(fmt_value(min));
            values.push(fmt_value(max));
        }

        for eye in EyeId::ALL.iter() {
            values.push(eye.tag().to_string());
            for axis in AxisId::ALL.iter() {
                let (min, max) = coords.limits_relative(*eye, *axis);
                values.push(fmt_value(min));
                values.push(fmt_value(max));
            }
        }

        Response::ok("LIMITS", values)
    }

    fn stats_response(&self) -> Response {
        let recorder = self.planner.recorder();
        if recorder.is_empty() {
            return Response::err("NO_TELEMETRY no profiled move has been recorded");
        }

        let s = recorder.stats(self.trim_fraction);

        Response::ok(
            "STATS",
            vec![
                "DURATION".into(),
                format!("{:.3}", s.duration_s),
                "SAMPLES".into(),
                s.num_samples.to_string(),
                "PEAK_VEL".into(),
                fmt_value(s.peak_vel_degs),
                "PEAK_ACCEL".into(),
                fmt_value(s.peak_accel_degss),
                "AVG_ACCEL".into(),
                fmt_value(s.avg_accel_degss),
            ],
        )
    }

    /// Export the recorded telemetry to CSV, with a JSON analytics summary alongside.
    fn save(&self, name: Option<&str>) -> Response {
        let recorder = self.planner.recorder();
        if recorder.is_empty() {
            return Response::err("NO_TELEMETRY no profiled move has been recorded");
        }

        let file_name = match export_file_name(name) {
            Some(f) => f,
            None => {
                return Response::err(format!(
                    "SAVE invalid file name: {}",
                    name.unwrap_or_default()
                ))
            }
        };
        let path = self.arch_root.join(&file_name);

        match recorder.export_csv(&self.arch_root, &file_name) {
            Ok(n) => {
                info!("Saved {} telemetry samples to {:?}", n, path);

                let summary = TelemetrySummary {
                    csv_file: file_name.clone(),
                    complete: recorder.is_complete(),
                    stats: recorder.stats(self.trim_fraction),
                };
                let json_name = Path::new(&file_name).with_extension("json");
                util::session::save(Path::new("arch").join(json_name), summary);

                Response::ok("SAVE", vec![path.display().to_string(), n.to_string()])
            }
            Err(e) => {
                warn!("Telemetry export failed: {}", e);
                Response::err(format!("SAVE {}", e))
            }
        }
    }

    /// The distance option after the current distance, wrapping round.
    fn next_distance(&self) -> f64 {
        let current = self.state.distance_deg;

        self.distance_options_deg
            .iter()
            .copied()
            .find(|d| *d > current)
            .or_else(|| self.distance_options_deg.first().copied())
            .unwrap_or(current)
    }

    fn respond(&mut self, issuer: Option<usize>, response: &Response) {
        match issuer.and_then(|i| self.sources.get_mut(i)) {
            Some(r) if !r.closed => {
                if let Err(e) = r.source.respond(response) {
                    warn!("Could not respond to {}: {}", r.source.name(), e);
                }
            }
            _ => info!("{}", response),
        }
    }

    fn close_source(&mut self, idx: usize, e: crate::input::InputError) {
        let r = &mut self.sources[idx];
        match e {
            crate::input::InputError::Closed => info!("Input source {} closed", r.source.name()),
            e => warn!("Input source {} failed, closing it: {}", r.source.name(), e),
        }
        r.closed = true;

        // Nobody is left to answer
        if self.profile_issuer == Some(idx) {
            self.profile_issuer = None;
        }
    }

    fn sync_state(&mut self) {
        self.state.engaged = self.planner.is_engaged();
        self.state.busy = self.planner.is_busy();
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Relative positions of both eyes after a move, formatted as response values.
fn both_eyes(m: &AppliedMove) -> Vec<String> {
    let (lp, lt) = m.rel(EyeId::Left);
    let (rp, rt) = m.rel(EyeId::Right);
    vec![fmt_value(lp), fmt_value(lt), fmt_value(rp), fmt_value(rt)]
}

fn aborted_response(reason: &str, s: &ProfileSummary) -> Response {
    Response::err(format!(
        "ABORTED PROFILE {} AT {} {} AFTER {} SAMPLES",
        reason,
        fmt_value(s.final_rel_deg.0),
        fmt_value(s.final_rel_deg.1),
        s.num_samples
    ))
}

/// Name of the export file, defaulting to a timestamped name.
///
/// Directories are not allowed in the name and a `.csv` extension is added if there isn't one.
fn export_file_name(name: Option<&str>) -> Option<String> {
    let name = match name {
        Some(n) => n,
        None => return Some(format!("profile_{}.csv", util::session::file_timestamp())),
    };

    let path = Path::new(name);
    if path.file_name()?.to_str()? != name {
        return None;
    }

    Some(match path.extension() {
        Some(_) => name.to_string(),
        None => format!("{}.csv", name),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::coord::CoordModel;
    use crate::input::InputError;
    use crate::servo_ctrl::SimServos;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// A source issuing pre-set lines, one per tick, and recording the responses.
    struct LineSource {
        lines: VecDeque<String>,
        responses: Arc<Mutex<Vec<Response>>>,
    }

    impl InputSource for LineSource {
        fn name(&self) -> &str {
            "test"
        }

        fn poll(&mut self) -> Result<Option<Request>, InputError> {
            Ok(self.lines.pop_front().map(Request::Line))
        }

        fn respond(&mut self, response: &Response) -> Result<(), InputError> {
            self.responses.lock().unwrap().push(response.clone());
            Ok(())
        }
    }

    fn ctrl(zero: [[f64; 2]; 2]) -> SessionCtrl<SimServos> {
        let params = EyeExecParams {
            zero_deg: zero,
            ..Default::default()
        };
        let coords = CoordModel::new(params.axis_limits_deg, params.zero_deg).unwrap();
        let mut planner = MotionPlanner::new(SimServos::new(), coords, &params).unwrap();
        planner.engage().unwrap();

        SessionCtrl::new(
            planner,
            &params,
            std::env::temp_dir().join("eye_exec_session_ctrl_test"),
        )
    }

    fn line(c: &mut SessionCtrl<SimServos>, l: &str) -> String {
        c.handle_line(l).map(|r| r.to_string()).unwrap_or_default()
    }

    fn add_lines(c: &mut SessionCtrl<SimServos>, lines: &[&str]) -> Arc<Mutex<Vec<Response>>> {
        let responses = Arc::new(Mutex::new(Vec::new()));
        c.add_source(Box::new(LineSource {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            responses: responses.clone(),
        }));
        responses
    }

    #[test]
    fn test_sac_with_sentinels() {
        let mut c = ctrl([[90.0, 90.0], [90.0, 90.0]]);

        assert_eq!(line(&mut c, "SAC 10 -5 X X"), "CMD OK SAC 10.0 -5.0 0.0 0.0");
        assert_eq!(
            line(&mut c, "position"),
            "CMD OK POSITION L 10.0 -5.0 R 0.0 0.0"
        );
        assert_eq!(
            line(&mut c, "sac hold keep nc skip"),
            "CMD OK SAC 10.0 -5.0 0.0 0.0"
        );
    }

    #[test]
    fn test_saccade_scenario() {
        let mut c = ctrl([[97.0, 93.0], [97.0, 93.0]]);

        assert_eq!(
            line(&mut c, "saccade 20 10 2000 400"),
            "CMD OK SACCADE 20.0 10.0 ABS 117.0 103.0 ERROR 0.0 0.0"
        );
        assert_eq!(
            c.planner().coords().position(EyeId::Left).abs_deg(),
            (117.0, 103.0)
        );
    }

    #[test]
    fn test_presets_and_settings() {
        let mut c = ctrl([[90.0, 90.0], [90.0, 90.0]]);

        assert_eq!(line(&mut c, "UR"), "CMD OK 9PT UR 10.0 10.0 10.0 10.0");
        assert_eq!(line(&mut c, "eye L"), "CMD OK EYE L");
        assert_eq!(line(&mut c, "range"), "CMD OK RANGE 20.0");
        assert_eq!(line(&mut c, "ll"), "CMD OK 9PT LL -20.0 -20.0 10.0 10.0");
        assert_eq!(line(&mut c, "eye"), "CMD OK EYE R");
        assert_eq!(line(&mut c, "range 40"), "CMD OK RANGE 40.0");
        assert_eq!(line(&mut c, "range"), "CMD OK RANGE 1.0");
        assert_eq!(line(&mut c, "C"), "CMD OK 9PT C -20.0 -20.0 0.0 0.0");
    }

    #[test]
    fn test_clamp_reporting() {
        let mut c = ctrl([[90.0, 90.0], [90.0, 90.0]]);

        assert_eq!(
            line(&mut c, "SAC 100 0 X X"),
            "CMD OK SAC 90.0 0.0 0.0 0.0 CLAMPED"
        );

        c.clamp_policy = ClampPolicy::Silent;
        assert_eq!(line(&mut c, "SAC 100 0 X X"), "CMD OK SAC 90.0 0.0 0.0 0.0");
    }

    #[test]
    fn test_zero_then_position() {
        let mut c = ctrl([[97.0, 93.0], [85.0, 88.0]]);

        line(&mut c, "SAC 10 -5 3 4");
        assert_eq!(line(&mut c, "zero"), "CMD OK ZERO 0.0 0.0 0.0 0.0");
        assert_eq!(line(&mut c, "position"), "CMD OK POSITION L 0.0 0.0 R 0.0 0.0");
    }

    #[test]
    fn test_limits() {
        let mut c = ctrl([[97.0, 93.0], [90.0, 90.0]]);

        assert_eq!(
            line(&mut c, "limits"),
            "CMD OK LIMITS PAN 0.0 180.0 TILT 0.0 180.0 \
             L -97.0 83.0 -93.0 87.0 R -90.0 90.0 -90.0 90.0"
        );
    }

    #[test]
    fn test_parse_errors_apply_nothing() {
        let mut c = ctrl([[90.0, 90.0], [90.0, 90.0]]);

        for l in ["SAC 1 2 3", "SAC 1 2 3 Y", "", "wiggle", "saccade 1 2 -5"].iter() {
            let r = line(&mut c, l);
            assert!(r.starts_with("CMD ERR PARSE"), "{}", r);
        }
        assert_eq!(line(&mut c, "position"), "CMD OK POSITION L 0.0 0.0 R 0.0 0.0");
    }

    #[test]
    fn test_busy_during_profile() {
        let mut c = ctrl([[90.0, 90.0], [90.0, 90.0]]);
        let responses = add_lines(&mut c, &["profile 40 0", "SAC 1 1 1 1", "UL", "position"]);

        // Start the profile, then each rejected command is polled while it executes
        for _ in 0..4 {
            c.tick();
        }
        assert!(c.state().busy);

        while c.state().busy {
            c.tick();
        }

        let r: Vec<String> = responses
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.to_string())
            .collect();

        assert_eq!(r.len(), 4);
        assert!(r[0].starts_with("CMD ERR BUSY"));
        assert!(r[1].starts_with("CMD ERR BUSY"));
        assert!(r[2].starts_with("CMD OK POSITION L "));
        assert!(r[3].starts_with("CMD OK PROFILE 40.0 0.0 ABS 130.0 90.0 DURATION"));
        assert_eq!(
            c.planner().coords().position(EyeId::Right).rel_deg(),
            (40.0, 0.0)
        );
    }

    #[test]
    fn test_zero_cancels_profile() {
        let mut c = ctrl([[90.0, 90.0], [90.0, 90.0]]);
        let responses = add_lines(&mut c, &["profile 40 0"]);

        for _ in 0..6 {
            c.tick();
        }
        assert!(c.state().busy);

        assert_eq!(line(&mut c, "zero"), "CMD OK ZERO 0.0 0.0 0.0 0.0");
        assert!(!c.state().busy);

        let r = responses.lock().unwrap();
        assert_eq!(r.len(), 1);
        assert!(r[0].to_string().starts_with("CMD ERR ABORTED PROFILE by ZERO"));

        // Partial telemetry is kept
        let n = c.planner().recorder().samples().len();
        assert!(n > 0 && n < 20);
        assert!(line(&mut c, "stats").starts_with(&format!(
            "CMD OK STATS DURATION {:.3} SAMPLES {}",
            (n - 1) as f64 * 0.01,
            n
        )));
    }

    #[test]
    fn test_disengage_cancels_and_tracks() {
        let mut c = ctrl([[90.0, 90.0], [90.0, 90.0]]);

        c.handle_line("profile 40 0");
        c.advance_motion();
        c.advance_motion();

        assert_eq!(line(&mut c, "disengage"), "CMD OK DISENGAGE");
        assert!(!c.state().busy);
        assert!(!c.state().engaged);

        let writes = c.planner().driver().num_writes();
        assert_eq!(line(&mut c, "SAC 5 5 5 5"), "CMD OK SAC 5.0 5.0 5.0 5.0");
        assert_eq!(c.planner().driver().num_writes(), writes);

        assert_eq!(line(&mut c, "engage"), "CMD OK ENGAGE");
        assert_eq!(c.planner().driver().position(6), Some(95.0));
    }

    #[test]
    fn test_cancelled_profile_answered_when_driver_fails() {
        for (cmd, reason) in [("disengage", "by DISENGAGE"), ("zero", "by ZERO")].iter() {
            let mut c = ctrl([[90.0, 90.0], [90.0, 90.0]]);
            let responses = add_lines(&mut c, &["profile 40 0"]);

            for _ in 0..3 {
                c.tick();
            }
            assert!(c.state().busy);

            c.planner_mut().driver_mut().set_failing_channel(Some(7));
            let r = line(&mut c, cmd);
            assert!(r.starts_with("CMD ERR DRIVER right tilt channel 7"), "{}", r);
            assert!(!c.state().busy);

            let r = responses.lock().unwrap();
            assert_eq!(r.len(), 1, "{}", cmd);
            assert!(r[0]
                .to_string()
                .starts_with(&format!("CMD ERR ABORTED PROFILE {} AT ", reason)));
        }
    }

    #[test]
    fn test_overlong_profile_rejected() {
        let mut c = ctrl([[90.0, 90.0], [90.0, 90.0]]);

        let r = line(&mut c, "profile 40 0 2000 1e-300");
        assert!(r.starts_with("CMD ERR PROFILE Move would last"), "{}", r);
        assert!(!c.state().busy);
        assert_eq!(line(&mut c, "position"), "CMD OK POSITION L 0.0 0.0 R 0.0 0.0");
    }

    #[test]
    fn test_driver_failure_reported() {
        let mut c = ctrl([[90.0, 90.0], [90.0, 90.0]]);
        c.planner_mut().driver_mut().set_failing_channel(Some(5));

        let r = line(&mut c, "SAC 5 5 5 5");
        assert!(r.starts_with("CMD ERR DRIVER left tilt channel 5"), "{}", r);
        assert_eq!(line(&mut c, "position"), "CMD OK POSITION L 0.0 0.0 R 0.0 0.0");
    }

    #[test]
    fn test_save_and_stats() {
        let mut c = ctrl([[90.0, 90.0], [90.0, 90.0]]);

        assert!(line(&mut c, "stats").starts_with("CMD ERR NO_TELEMETRY"));
        assert!(line(&mut c, "save").starts_with("CMD ERR NO_TELEMETRY"));

        c.handle_line("profile 20 0");
        let resp = loop {
            if let Some(r) = c.advance_motion() {
                break r.to_string();
            }
        };
        assert!(resp.starts_with("CMD OK PROFILE 20.0 0.0 ABS 110.0 90.0 DURATION 0.200 SAMPLES 21"));

        let r = line(&mut c, "save test_profile");
        let expected = c.arch_root.join("test_profile.csv");
        assert_eq!(r, format!("CMD OK SAVE {} 21", expected.display()));

        let text = std::fs::read_to_string(&expected).unwrap();
        assert_eq!(text.lines().count(), 22);
        std::fs::remove_file(&expected).ok();

        assert!(line(&mut c, "save ../escape.csv").starts_with("CMD ERR SAVE"));
    }

    #[test]
    fn test_quit() {
        let mut c = ctrl([[90.0, 90.0], [90.0, 90.0]]);
        let responses = add_lines(&mut c, &["help", "exit", "position"]);

        while c.is_running() {
            c.tick();
        }

        let r = responses.lock().unwrap();
        assert_eq!(r.len(), 2);
        assert!(r[0].to_string().starts_with("CMD OK HELP "));
        assert_eq!(r[1].to_string(), "CMD OK QUIT");
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name(Some("run1")), Some("run1.csv".into()));
        assert_eq!(export_file_name(Some("run1.csv")), Some("run1.csv".into()));
        assert_eq!(export_file_name(Some("a/b.csv")), None);
        assert!(export_file_name(None).unwrap().starts_with("profile_"));
    }
}
