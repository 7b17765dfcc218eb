use std::env;

use pointbridge_core::nalgebra::Vector3;

pub const THREADS_VAR: &str = "POINTBRIDGE_THREADS";
pub const RANSAC_ITERATIONS_VAR: &str = "POINTBRIDGE_RANSAC_ITERATIONS";
pub const VIEWPOINT_VAR: &str = "POINTBRIDGE_VIEWPOINT";

/// Knobs of the default backend that the C signatures have no room for.
///
/// Priority: values set on the struct, then the `POINTBRIDGE_*` environment variables (through
/// [`BridgeConfig::from_env`]), then the defaults
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Worker threads for normal estimation and plane segmentation. `0` uses the global rayon pool
    pub threads: usize,
    /// Normals are flipped to face this point
    pub viewpoint: Vector3<f32>,
    /// Number of RANSAC models tried by plane segmentation
    pub ransac_iterations: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            viewpoint: Vector3::zeros(),
            ransac_iterations: 50,
        }
    }
}

impl BridgeConfig {
    /// Reads the configuration from the process environment. Unset variables keep their default,
    /// malformed ones are reported with a warning and keep their default as well
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`from_env`](BridgeConfig::from_env), but reads variables through `lookup`
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(THREADS_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(threads) => config.threads = threads,
                Err(_) => log::warn!(
                    "{} must be a non-negative integer, got '{}'. Using {}",
                    THREADS_VAR,
                    raw,
                    config.threads
                ),
            }
        }
        if let Some(raw) = lookup(RANSAC_ITERATIONS_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(iterations) if iterations > 0 => config.ransac_iterations = iterations,
                _ => log::warn!(
                    "{} must be a positive integer, got '{}'. Using {}",
                    RANSAC_ITERATIONS_VAR,
                    raw,
                    config.ransac_iterations
                ),
            }
        }
        if let Some(raw) = lookup(VIEWPOINT_VAR) {
            match parse_viewpoint(&raw) {
                Some(viewpoint) => config.viewpoint = viewpoint,
                None => log::warn!(
                    "{} must be three finite numbers 'x,y,z', got '{}'. Using the origin",
                    VIEWPOINT_VAR,
                    raw
                ),
            }
        }
        config
    }
}

fn parse_viewpoint(raw: &str) -> Option<Vector3<f32>> {
    let coordinates = raw
        .split(',')
        .map(|value| value.trim().parse::<f32>().ok().filter(|v| v.is_finite()))
        .collect::<Option<Vec<_>>>()?;
    match coordinates.as_slice() {
        [x, y, z] => Some(Vector3::new(*x, *y, *z)),
        _ => None,
    }
}
