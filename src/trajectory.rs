//! Desired joint trajectories and the torques to follow them.
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::AnalysisError;
use crate::MS_PER_S;

/// Standard gravity (in m/s^2).
pub const GRAVITY: f64 = 9.81;

/// Minimum-jerk trajectory from `x_init` to `x_des` in `final_time`.
///
/// The position is the quintic polynomial `a t^5 + b t^4 + c t^3 + x_init`. Time is in ms, the derivatives are
/// expressed per second.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct MinimumJerk {
    pub x_init: f64,
    pub x_des: f64,
    pub final_time: f64,
    a: f64,
    b: f64,
    c: f64,
}

impl MinimumJerk {
    /// Create a new trajectory.
    /// Returns an error if the final time is not positive.
    pub fn build(x_init: f64, x_des: f64, final_time: f64) -> Result<Self, AnalysisError> {
        if !(final_time > 0.0) {
            return Err(AnalysisError::InvalidParameter(format!(
                "The final time must be positive, got {}.",
                final_time
            )));
        }
        let delta = x_des - x_init;
        Ok(MinimumJerk {
            x_init,
            x_des,
            final_time,
            a: 6.0 * delta / final_time.powi(5),
            b: -15.0 * delta / final_time.powi(4),
            c: 10.0 * delta / final_time.powi(3),
        })
    }

    pub fn position(&self, t: f64) -> f64 {
        self.a * t.powi(5) + self.b * t.powi(4) + self.c * t.powi(3) + self.x_init
    }

    pub fn velocity(&self, t: f64) -> f64 {
        (5.0 * self.a * t.powi(4) + 4.0 * self.b * t.powi(3) + 3.0 * self.c * t.powi(2)) * MS_PER_S
    }

    pub fn acceleration(&self, t: f64) -> f64 {
        (20.0 * self.a * t.powi(3) + 12.0 * self.b * t.powi(2) + 6.0 * self.c * t) * MS_PER_S.powi(2)
    }

    pub fn jerk(&self, t: f64) -> f64 {
        (60.0 * self.a * t.powi(2) + 24.0 * self.b * t + 6.0 * self.c) * MS_PER_S.powi(3)
    }
}

/// A uniform rod rotating around one of its ends.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct Pendulum {
    /// Length (in m).
    pub length: f64,
    /// Mass (in kg).
    pub mass: f64,
    pub gravity: f64,
}

impl Default for Pendulum {
    fn default() -> Self {
        Pendulum {
            length: 1.0,
            mass: 1.0,
            gravity: GRAVITY,
        }
    }
}

impl Pendulum {
    pub fn inertia(&self) -> f64 {
        self.mass * self.length.powi(2) / 3.0
    }

    /// Torque required to follow the trajectory at time `t` (in ms).
    pub fn forward_torque(&self, trajectory: &MinimumJerk, t: f64) -> f64 {
        trajectory.acceleration(t) * self.inertia()
            + self.gravity * self.mass * self.length / 2.0 * trajectory.position(t).sin()
    }
}

/// Periodic two-joint trajectory given by samples of the joint positions and velocities over one period.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CircularTrajectory {
    j0: Vec<f64>,
    j1: Vec<f64>,
    jd0: Vec<f64>,
    jd1: Vec<f64>,
}

impl CircularTrajectory {
    /// Create a new trajectory.
    /// Returns an error if there are no samples or if the four sample arrays differ in length.
    pub fn build(
        j0: Vec<f64>,
        j1: Vec<f64>,
        jd0: Vec<f64>,
        jd1: Vec<f64>,
    ) -> Result<Self, AnalysisError> {
        let n = j0.len();
        if n == 0 {
            return Err(AnalysisError::InvalidParameter(
                "The trajectory has no samples.".to_string(),
            ));
        }
        if j1.len() != n || jd0.len() != n || jd1.len() != n {
            return Err(AnalysisError::IncompatibleShapes(format!(
                "Got {}, {}, {} and {} samples for j0, j1, jd0 and jd1.",
                n,
                j1.len(),
                jd0.len(),
                jd1.len()
            )));
        }
        Ok(CircularTrajectory { j0, j1, jd0, jd1 })
    }

    /// Load a trajectory from a JSON file with the keys `j0`, `j1`, `jd0` and `jd1`.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, AnalysisError> {
        let file = File::open(path).map_err(|e| AnalysisError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        let trajectory: CircularTrajectory =
            serde_json::from_reader(reader).map_err(|e| AnalysisError::IOError(e.to_string()))?;
        CircularTrajectory::build(trajectory.j0, trajectory.j1, trajectory.jd0, trajectory.jd1)
    }

    pub fn num_samples(&self) -> usize {
        self.j0.len()
    }

    /// The sample index at time `t`, if one period lasts `sim_time`.
    pub fn index(&self, t: f64, sim_time: f64) -> usize {
        let n = self.num_samples();
        let phase = (t / sim_time * n as f64).rem_euclid(n as f64);
        (phase.floor() as usize).min(n - 1)
    }

    /// Joint positions at time `t`.
    pub fn positions(&self, t: f64, sim_time: f64) -> [f64; 2] {
        let i = self.index(t, sim_time);
        [self.j0[i], self.j1[i]]
    }

    /// Joint velocities at time `t`.
    pub fn velocities(&self, t: f64, sim_time: f64) -> [f64; 2] {
        let i = self.index(t, sim_time);
        [self.jd0[i], self.jd1[i]]
    }
}

/// Samples of a circle of radius `radius` in joint space, over one period.
pub fn circle(radius: f64, num_samples: usize) -> Result<CircularTrajectory, AnalysisError> {
    let angles: Vec<f64> = (0..num_samples)
        .map(|i| 2.0 * PI * i as f64 / num_samples as f64)
        .collect();
    CircularTrajectory::build(
        angles.iter().map(|a| radius * a.cos()).collect(),
        angles.iter().map(|a| radius * a.sin()).collect(),
        angles.iter().map(|a| -radius * a.sin()).collect(),
        angles.iter().map(|a| radius * a.cos()).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_minimum_jerk_boundaries() {
        let trajectory = MinimumJerk::build(0.5, 2.0, 500.0).unwrap();

        assert_relative_eq!(trajectory.position(0.0), 0.5);
        assert_relative_eq!(trajectory.position(500.0), 2.0, epsilon = 1e-12);
        assert_relative_eq!(trajectory.position(250.0), 1.25, epsilon = 1e-12);

        assert_relative_eq!(trajectory.velocity(0.0), 0.0);
        assert_relative_eq!(trajectory.velocity(500.0), 0.0, epsilon = 1e-9);
        assert!(trajectory.velocity(250.0) > 0.0);

        assert_relative_eq!(trajectory.acceleration(0.0), 0.0);
        assert_relative_eq!(trajectory.acceleration(250.0), 0.0, epsilon = 1e-9);

        // 6 c, per second cubed
        assert_relative_eq!(
            trajectory.jerk(0.0),
            60.0 * 1.5 / 500.0_f64.powi(3) * 1e9,
            max_relative = 1e-12
        );

        assert!(MinimumJerk::build(0.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn test_forward_torque() {
        let pendulum = Pendulum::default();
        assert_relative_eq!(pendulum.inertia(), 1.0 / 3.0);

        let hold = MinimumJerk::build(PI / 2.0, PI / 2.0, 500.0).unwrap();
        assert_relative_eq!(pendulum.forward_torque(&hold, 123.0), GRAVITY / 2.0);

        let trajectory = MinimumJerk::build(0.0, 1.0, 500.0).unwrap();
        assert_relative_eq!(pendulum.forward_torque(&trajectory, 0.0), 0.0);
        assert_relative_eq!(
            pendulum.forward_torque(&trajectory, 100.0),
            trajectory.acceleration(100.0) / 3.0 + GRAVITY / 2.0 * trajectory.position(100.0).sin()
        );
    }

    #[test]
    fn test_circular_index() {
        let trajectory = circle(1.0, 4).unwrap();
        assert_eq!(trajectory.index(0.0, 100.0), 0);
        assert_eq!(trajectory.index(24.9, 100.0), 0);
        assert_eq!(trajectory.index(25.0, 100.0), 1);
        assert_eq!(trajectory.index(99.9, 100.0), 3);
        // periodic
        assert_eq!(trajectory.index(125.0, 100.0), 1);
        assert_eq!(trajectory.index(-25.0, 100.0), 3);

        let positions = trajectory.positions(25.0, 100.0);
        assert_relative_eq!(positions[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(positions[1], 1.0);
        let velocities = trajectory.velocities(50.0, 100.0);
        assert_relative_eq!(velocities[1], -1.0);
    }

    #[test]
    fn test_circular_build() {
        assert!(CircularTrajectory::build(vec![], vec![], vec![], vec![]).is_err());
        assert!(matches!(
            CircularTrajectory::build(vec![0.0], vec![0.0, 1.0], vec![0.0], vec![0.0]),
            Err(AnalysisError::IncompatibleShapes(_))
        ));
    }

    #[test]
    fn test_circular_load() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"j0": [0.0, 1.0], "j1": [2.0, 3.0], "jd0": [4.0, 5.0], "jd1": [6.0, 7.0]}}"#
        )
        .unwrap();

        let trajectory = CircularTrajectory::load_from(file.path()).unwrap();
        assert_eq!(trajectory.num_samples(), 2);
        assert_eq!(trajectory.positions(60.0, 100.0), [1.0, 3.0]);
        assert_eq!(trajectory.velocities(10.0, 100.0), [4.0, 6.0]);

        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"j0": [0.0], "j1": [], "jd0": [0.0], "jd1": [0.0]}}"#).unwrap();
        assert!(CircularTrajectory::load_from(file.path()).is_err());
        assert!(matches!(
            CircularTrajectory::load_from("/nonexistent/trajectory.json"),
            Err(AnalysisError::IOError(_))
        ));
    }
}
