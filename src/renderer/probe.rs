//! Performance probe (spec §6.3): a synchronous harness that times a batch
//! of render callbacks under a fixed, repeatable camera.

use std::time::{Duration, Instant};

use glam::Vec3;

/// The probe's fixed camera (spec §6.3: "Camera is fixed at `(0,0,-0.5)`,
/// 45° vertical FOV, near 0.1, far 10").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    pub eye: Vec3,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self { eye: Vec3::new(0.0, 0.0, -0.5), fov_y_degrees: 45.0, near: 0.1, far: 10.0 }
    }
}

/// Runs each of `callbacks` up to `max_runs` times, or until `max_time` has
/// elapsed for that callback, whichever comes first. `setup`/`teardown` (if
/// given) bracket the whole batch, not each individual run. Returns the
/// per-callback average wall-clock time, in the same order as `callbacks`.
/// A callback that never runs (e.g. `max_runs == 0`) reports `Duration::ZERO`.
pub fn run_probe(
    callbacks: &mut [Box<dyn FnMut()>],
    max_runs: u32,
    max_time: Duration,
    mut setup: Option<Box<dyn FnMut()>>,
    mut teardown: Option<Box<dyn FnMut()>>,
) -> Vec<Duration> {
    if let Some(setup) = setup.as_mut() {
        setup();
    }

    let mut averages = Vec::with_capacity(callbacks.len());
    for callback in callbacks.iter_mut() {
        let batch_start = Instant::now();
        let mut runs = 0u32;
        let mut total = Duration::ZERO;
        while runs < max_runs && batch_start.elapsed() < max_time {
            let run_start = Instant::now();
            callback();
            total += run_start.elapsed();
            runs += 1;
        }
        averages.push(if runs > 0 { total / runs } else { Duration::ZERO });
    }

    if let Some(teardown) = teardown.as_mut() {
        teardown();
    }
    averages
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn stops_at_max_runs() {
        let count = Rc::new(Cell::new(0u32));
        let count_handle = Rc::clone(&count);
        let mut callbacks: Vec<Box<dyn FnMut()>> = vec![Box::new(move || {
            count_handle.set(count_handle.get() + 1);
        })];
        let _ = run_probe(&mut callbacks, 5, Duration::from_secs(10), None, None);
        drop(callbacks);
        assert_eq!(count.get(), 5);
    }

    #[test]
    fn zero_max_runs_yields_zero_duration() {
        let ran = Rc::new(Cell::new(false));
        let ran_handle = Rc::clone(&ran);
        let mut callbacks: Vec<Box<dyn FnMut()>> = vec![Box::new(move || {
            ran_handle.set(true);
        })];
        let averages = run_probe(&mut callbacks, 0, Duration::from_secs(1), None, None);
        drop(callbacks);
        assert_eq!(averages, vec![Duration::ZERO]);
        assert!(!ran.get());
    }

    #[test]
    fn default_camera_matches_spec() {
        let cam = CameraParams::default();
        assert_eq!(cam.eye, Vec3::new(0.0, 0.0, -0.5));
        assert_eq!(cam.fov_y_degrees, 45.0);
        assert_eq!(cam.near, 0.1);
        assert_eq!(cam.far, 10.0);
    }
}
