//! # Profile Benchmark
//!
//! Times a full profiled move through the planner with simulated servos, and the analytics run
//! over its telemetry.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use eye_if::eqpt::EyeScope;
use eye_lib::{
    coord::CoordModel,
    motion::{ExecMode, MotionPlanner, MotionRequest, StepOutcome},
    params::EyeExecParams,
    servo_ctrl::SimServos,
    telemetry::analytics,
};

fn planner() -> MotionPlanner<SimServos> {
    let params = EyeExecParams::default();
    let coords = CoordModel::new(params.axis_limits_deg, params.zero_deg).unwrap();
    let mut p = MotionPlanner::new(SimServos::new(), coords, &params).unwrap();
    p.engage().unwrap();
    p
}

fn run_profile(p: &mut MotionPlanner<SimServos>, pan: f64, tilt: f64) {
    let req = MotionRequest::target(EyeScope::Both, pan, tilt, None, None, ExecMode::Profiled);
    p.start_profile(&req).unwrap();

    while let Some(StepOutcome::Sampled { .. }) = p.step() {}
}

fn profile_benchmark(c: &mut Criterion) {
    let mut p = planner();

    // Alternate between two long trapezoidal moves so every iteration moves
    let mut flip = false;
    c.bench_function("profile 80 deg", |b| {
        b.iter(|| {
            flip = !flip;
            let pan = if flip { 80.0 } else { -80.0 };
            run_profile(&mut p, black_box(pan), black_box(20.0));
        })
    });

    run_profile(&mut p, -60.0, -30.0);
    let samples = p.recorder().samples().to_vec();

    c.bench_function("analytics", |b| {
        b.iter(|| analytics::stats(black_box(&samples), analytics::DEFAULT_TRIM_FRACTION))
    });
}

criterion_group!(benches, profile_benchmark);
criterion_main!(benches);
