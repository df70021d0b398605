//! # Trajectory Control Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bike_lib::{
    loc::Pose,
    traj::LocalTrajectory,
    traj_ctrl::{BikeParams, FilterCoeffs, InputData, TrajCtrl, TrajGains},
};

fn traj_ctrl_benchmark(c: &mut Criterion) {
    // ---- Build an arc shaped window ----

    let radius_m = 15.0;
    let num_points = 50;
    let theta: Vec<f64> = (0..num_points).map(|i| i as f64 * 0.1 / radius_m).collect();

    let mut buffer = Vec::with_capacity(3 * num_points);
    buffer.extend(theta.iter().map(|t| radius_m * t.sin()));
    buffer.extend(theta.iter().map(|t| radius_m * (1.0 - t.cos())));
    buffer.extend(theta.iter().copied());

    let traj = LocalTrajectory::from_buffer(&buffer, num_points).unwrap();

    // Part way along the window so the search has some work to do
    let input = InputData {
        traj,
        pose: Pose::new(2.51, 0.25, 0.17),
        speed_ms: 3.0,
        bike: BikeParams {
            lr_m: 0.5,
            lf_m: 0.5,
            lambda_rad: 66f64.to_radians(),
        },
        gains: TrajGains {
            k1: 0.5,
            k2: 1.0,
            e1_max_m: 0.5,
        },
        filter: FilterCoeffs {
            ad: 0.8,
            bd: 1.0,
            c: 0.073,
            d: 0.0,
        },
    };

    let mut ctrl = TrajCtrl::new();

    c.bench_function("traj_ctrl_proc", |b| {
        b.iter(|| ctrl.proc(black_box(&input)).unwrap())
    });
}

criterion_group!(benches, traj_ctrl_benchmark);
criterion_main!(benches);
