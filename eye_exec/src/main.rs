//! Main eye executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logger and parameters
//!     - Initialise the servo driver, coordinate model and motion planner
//!     - Register the input sources (script, console, remote, control panel)
//!     - Main loop, once per sample period:
//!         - Advance any profiled move by one sample
//!         - Poll every input source and dispatch its command
//!     - On quit cancel any move, disengage the servos and close the session

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use eye_if::net::zmq;
use eye_lib::{
    coord::CoordModel,
    input::{ConsoleInput, RemoteInput, ScriptInput},
    motion::MotionPlanner,
    params::{DriverKind, EyeExecParams},
    servo_ctrl::{ServoDriver, SimServos},
    session_ctrl::SessionCtrl,
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    script_interpreter::ScriptInterpreter,
    session::Session,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Saccade eye controller
#[derive(Debug, StructOpt)]
#[structopt(name = "eye_exec")]
struct Opt {
    /// Timed command script to run
    #[structopt(parse(from_os_str))]
    script: Option<PathBuf>,

    /// Parameter file, relative to the params directory of the software root unless absolute
    #[structopt(long, default_value = "eye_exec.toml")]
    params: String,

    /// Pan zero reference of both eyes in absolute degrees, overrides the parameter file
    #[structopt(long)]
    pan_zero: Option<f64>,

    /// Tilt zero reference of both eyes in absolute degrees, overrides the parameter file
    #[structopt(long)]
    tilt_zero: Option<f64>,

    /// Use the simulated servo driver whatever the parameter file says
    #[structopt(long)]
    sim: bool,

    /// Don't read commands from the terminal
    #[structopt(long)]
    no_console: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new("eye_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Trace, LevelFilter::Info, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Saccade Eye Controller\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params_result = match Path::new(&opt.params).is_absolute() {
        true => util::params::load_path::<EyeExecParams, _>(&opt.params),
        false => util::params::load::<EyeExecParams>(&opt.params),
    };
    let mut params = params_result.wrap_err("Could not load eye_exec params")?;

    for zero in params.zero_deg.iter_mut() {
        if let Some(p) = opt.pan_zero {
            zero[0] = p;
        }
        if let Some(t) = opt.tilt_zero {
            zero[1] = t;
        }
    }

    info!("Exec parameters loaded");

    // ---- INITIALISE MOTION ----

    let coords = CoordModel::new(params.axis_limits_deg, params.zero_deg)
        .wrap_err("Invalid zero reference or axis limits")?;

    let driver = init_driver(&params, opt.sim)?;

    let mut planner =
        MotionPlanner::new(driver, coords, &params).wrap_err("Failed to create the planner")?;
    planner.engage().wrap_err("Failed to engage the servos")?;

    info!("Motion planner initialised, eyes at zero");

    let mut ctrl = SessionCtrl::new(planner, &params, session.arch_root.clone());

    // ---- INITIALISE INPUT SOURCES ----

    if let Some(ref path) = opt.script {
        info!("Loading script from {:?}", path);

        let si = ScriptInterpreter::new(path).wrap_err("Failed to load script")?;

        info!(
            "Loaded script lasts {:.02} s and contains {} commands\n",
            si.get_duration(),
            si.get_num_cmds()
        );

        ctrl.add_source(Box::new(ScriptInput::new(si)));
    }

    if !opt.no_console {
        let history = host::get_sw_root()
            .wrap_err("Software root is not set")?
            .join(&params.history_file);

        ctrl.add_source(Box::new(
            ConsoleInput::new(history).wrap_err("Failed to start the console")?,
        ));
    }

    let zmq_ctx = zmq::Context::new();

    if let Some(ref endpoint) = params.remote_endpoint {
        ctrl.add_source(Box::new(
            RemoteInput::new(&zmq_ctx, endpoint).wrap_err("Failed to start the remote input")?,
        ));
    }

    if let Some(ref pins) = params.buttons {
        init_panel(&mut ctrl, pins)?;
    }

    if opt.script.is_none() && opt.no_console && params.remote_endpoint.is_none() {
        return Err(eyre!(
            "No input sources, give a script, enable the console or set a remote endpoint"
        ));
    }

    // ---- MAIN LOOP ----

    let cycle_period = Duration::from_secs_f64(params.sample_period_s);

    info!("Beginning main loop\n");

    while ctrl.is_running() {
        let cycle_start_instant = Instant::now();

        ctrl.tick();

        let cycle_dur = Instant::now() - cycle_start_instant;

        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
            ),
        }
    }

    // ---- SHUTDOWN ----

    ctrl.shutdown();
    session.save("session_state.json", *ctrl.state());

    info!("End of execution");

    session.exit();

    Ok(())
}

/// Create the servo driver selected by the parameters.
fn init_driver(params: &EyeExecParams, force_sim: bool) -> Result<Box<dyn ServoDriver>, Report> {
    match (params.driver, force_sim) {
        (DriverKind::Sim, _) | (_, true) => {
            info!("Using simulated servos");
            Ok(Box::new(SimServos::new()))
        }
        (DriverKind::Pca9685, false) => init_pca9685(params),
    }
}

#[cfg(feature = "rpi")]
fn init_pca9685(params: &EyeExecParams) -> Result<Box<dyn ServoDriver>, Report> {
    use eye_lib::servo_ctrl::pca9685::Pca9685Servos;

    let i2c = rppal::i2c::I2c::new().wrap_err("Could not open the I2C bus")?;
    let servos =
        Pca9685Servos::new(i2c, params).wrap_err("Could not initialise the PCA9685 board")?;

    info!("PCA9685 servo driver initialised");

    Ok(Box::new(servos))
}

#[cfg(not(feature = "rpi"))]
fn init_pca9685(_params: &EyeExecParams) -> Result<Box<dyn ServoDriver>, Report> {
    warn!("The PCA9685 driver needs the `rpi` feature, using simulated servos instead");
    Ok(Box::new(SimServos::new()))
}

#[cfg(feature = "rpi")]
fn init_panel<D: ServoDriver>(
    ctrl: &mut SessionCtrl<D>,
    pins: &eye_lib::params::ButtonPins,
) -> Result<(), Report> {
    use eye_lib::input::{panel::spawn_gpio_buttons, PanelInput};

    let events = spawn_gpio_buttons(pins).wrap_err("Could not set up the control panel")?;
    ctrl.add_source(Box::new(PanelInput::new(events)));

    Ok(())
}

#[cfg(not(feature = "rpi"))]
fn init_panel<D: ServoDriver>(
    _ctrl: &mut SessionCtrl<D>,
    _pins: &eye_lib::params::ButtonPins,
) -> Result<(), Report> {
    warn!("Control panel buttons need the `rpi` feature, the panel is disabled");
    Ok(())
}
