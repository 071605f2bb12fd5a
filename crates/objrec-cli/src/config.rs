//! Recognizer configuration – reads/writes `objrec.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use objrec_models::EstimatorParams;
use objrec_perception::TfBuffer;
use objrec_runtime::{FailurePolicy, RecognizerConfig, SelectionPolicy};
use objrec_types::{MarkerStyle, Quaternion, Transform3D, Vec3};
use serde::{Deserialize, Serialize};

/// Default location, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "objrec.toml";

/// A fixed `parent ← child` transform installed at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticTransform {
    pub parent: String,
    pub child: String,
    pub translation: Vec3,
    #[serde(default = "Quaternion::identity")]
    pub rotation: Quaternion,
}

/// Persisted recognizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Frame all clusters are re-expressed in.
    #[serde(default = "default_processing_frame")]
    pub processing_frame: String,

    /// JSON model library; `--models` takes precedence.
    #[serde(default = "default_model_file")]
    pub model_file: String,

    #[serde(default = "default_angle_bins")]
    pub angle_bins: u32,
    /// Passed through to the estimator parameters; unused by the built-in
    /// centroid estimator.
    #[serde(default = "default_distance_bins")]
    pub distance_bins: u32,
    #[serde(default = "default_reference_points_percentage")]
    pub reference_points_percentage: f32,
    #[serde(default)]
    pub pre_downsampling_step: f32,
    #[serde(default = "default_accumulator_peak_threshold")]
    pub accumulator_peak_threshold: f32,
    #[serde(default = "default_radius")]
    pub radius: f32,
    #[serde(default = "default_neighbours")]
    pub neighbours: u32,
    #[serde(default = "default_true")]
    pub radius_search: bool,
    #[serde(default)]
    pub filter_on: bool,
    #[serde(default = "default_hypotheses_per_model")]
    pub hypotheses_per_model: usize,

    /// Maximum wait for a cluster's frame transform, in milliseconds.
    #[serde(default = "default_transform_timeout_ms")]
    pub transform_timeout_ms: u64,

    #[serde(default)]
    pub selection: SelectionPolicy,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub report_unmatched: bool,

    /// Publish detection markers after each batch.
    #[serde(default = "default_true")]
    pub visualize: bool,

    #[serde(default)]
    pub static_transforms: Vec<StaticTransform>,
}

fn default_processing_frame() -> String {
    "/base_link".to_string()
}
fn default_model_file() -> String {
    "models.json".to_string()
}
fn default_angle_bins() -> u32 {
    15
}
fn default_distance_bins() -> u32 {
    20
}
fn default_reference_points_percentage() -> f32 {
    0.5
}
fn default_accumulator_peak_threshold() -> f32 {
    0.65
}
fn default_radius() -> f32 {
    0.04
}
fn default_neighbours() -> u32 {
    50
}
fn default_true() -> bool {
    true
}
fn default_hypotheses_per_model() -> usize {
    200
}
fn default_transform_timeout_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            processing_frame: default_processing_frame(),
            model_file: default_model_file(),
            angle_bins: default_angle_bins(),
            distance_bins: default_distance_bins(),
            reference_points_percentage: default_reference_points_percentage(),
            pre_downsampling_step: 0.0,
            accumulator_peak_threshold: default_accumulator_peak_threshold(),
            radius: default_radius(),
            neighbours: default_neighbours(),
            radius_search: true,
            filter_on: false,
            hypotheses_per_model: default_hypotheses_per_model(),
            transform_timeout_ms: default_transform_timeout_ms(),
            selection: SelectionPolicy::default(),
            failure_policy: FailurePolicy::default(),
            report_unmatched: false,
            visualize: true,
            static_transforms: Vec::new(),
        }
    }
}

impl Config {
    pub fn estimator_params(&self) -> EstimatorParams {
        EstimatorParams {
            angle_bins: self.angle_bins,
            distance_bins: self.distance_bins,
            reference_points_percentage: self.reference_points_percentage,
            pre_downsampling_step: self.pre_downsampling_step,
            accumulator_peak_threshold: self.accumulator_peak_threshold,
            radius: self.radius,
            neighbours: self.neighbours,
            radius_search: self.radius_search,
            filter_on: self.filter_on,
            hypotheses_per_model: self.hypotheses_per_model,
        }
    }

    pub fn recognizer_config(&self) -> RecognizerConfig {
        RecognizerConfig {
            processing_frame: self.processing_frame.clone(),
            transform_timeout: Duration::from_millis(self.transform_timeout_ms),
            selection: self.selection,
            failure_policy: self.failure_policy,
            report_unmatched: self.report_unmatched,
            marker_style: MarkerStyle::default(),
        }
    }

    /// A transform buffer pre-loaded with [`Config::static_transforms`].
    pub fn transform_buffer(&self) -> TfBuffer {
        let tf = TfBuffer::new();
        for st in &self.static_transforms {
            tf.set_transform(
                &st.parent,
                &st.child,
                Transform3D::new(st.translation, st.rotation.normalized()),
            );
        }
        tf
    }
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `OBJREC_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `OBJREC_PROCESSING_FRAME` | `processing_frame` |
/// | `OBJREC_MODEL_FILE` | `model_file` |
/// | `OBJREC_HYPOTHESES_PER_MODEL` | `hypotheses_per_model` |
/// | `OBJREC_TRANSFORM_TIMEOUT_MS` | `transform_timeout_ms` |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("OBJREC_PROCESSING_FRAME") {
        cfg.processing_frame = v;
    }
    if let Ok(v) = std::env::var("OBJREC_MODEL_FILE") {
        cfg.model_file = v;
    }
    if let Ok(v) = std::env::var("OBJREC_HYPOTHESES_PER_MODEL")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.hypotheses_per_model = n;
    }
    if let Ok(v) = std::env::var("OBJREC_TRANSFORM_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.transform_timeout_ms = ms;
    }
}

/// Save the config to `path`, creating parent directories if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use objrec_perception::FrameTransformer;
    use objrec_types::{Header, PointCloud};

    #[test]
    fn defaults_mirror_estimator_defaults() {
        assert_eq!(Config::default().estimator_params(), EstimatorParams::default());
    }

    #[test]
    fn recognizer_config_carries_policies() {
        let cfg = Config {
            transform_timeout_ms: 250,
            failure_policy: FailurePolicy::IsolateCluster,
            report_unmatched: true,
            ..Config::default()
        };
        let rc = cfg.recognizer_config();
        assert_eq!(rc.processing_frame, "/base_link");
        assert_eq!(rc.transform_timeout, Duration::from_millis(250));
        assert_eq!(rc.failure_policy, FailurePolicy::IsolateCluster);
        assert!(rc.report_unmatched);
    }

    #[test]
    fn roundtrip_config_with_transforms() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("nested").join(DEFAULT_CONFIG_FILE);

        let cfg = Config {
            selection: SelectionPolicy::BestOverall,
            static_transforms: vec![StaticTransform {
                parent: "/base_link".into(),
                child: "camera".into(),
                translation: Vec3::new(0.0, 0.0, 1.2),
                rotation: Quaternion::identity(),
            }],
            ..Config::default()
        };
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.selection, SelectionPolicy::BestOverall);
        assert_eq!(loaded.static_transforms, cfg.static_transforms);
        assert_eq!(loaded.angle_bins, 15);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            r#"
radius = 0.02
failure_policy = "isolate_cluster"

[[static_transforms]]
parent = "/base_link"
child = "camera"
translation = { x = 0.1, y = 0.0, z = 0.9 }
"#,
        )
        .unwrap();

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert!((cfg.radius - 0.02).abs() < f32::EPSILON);
        assert_eq!(cfg.failure_policy, FailurePolicy::IsolateCluster);
        assert_eq!(cfg.neighbours, 50);
        assert_eq!(cfg.static_transforms[0].rotation, Quaternion::identity());
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let result = load_from(&dir.path().join(DEFAULT_CONFIG_FILE)).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn load_from_rejects_malformed_toml() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "angle_bins = \"many\"").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(err.contains("Failed to parse config"));
    }

    #[test]
    fn transform_buffer_installs_static_transforms() {
        let cfg = Config {
            static_transforms: vec![StaticTransform {
                parent: "/base_link".into(),
                child: "camera".into(),
                translation: Vec3::new(0.0, 0.0, 1.0),
                rotation: Quaternion::identity(),
            }],
            ..Config::default()
        };
        let tf = cfg.transform_buffer();
        let cloud = PointCloud::new(Header::new("camera", 0), vec![Vec3::zero()]);
        let out = tf
            .transform_cloud(&cloud, "/base_link", Duration::from_millis(10))
            .expect("transform known");
        assert!((out.points[0].z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn apply_env_overrides_changes_processing_frame() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("OBJREC_PROCESSING_FRAME", "/odom") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.processing_frame, "/odom");
        unsafe { std::env::remove_var("OBJREC_PROCESSING_FRAME") };
    }

    #[test]
    fn apply_env_overrides_changes_hypotheses_per_model() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("OBJREC_HYPOTHESES_PER_MODEL", "12") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.hypotheses_per_model, 12);
        unsafe { std::env::remove_var("OBJREC_HYPOTHESES_PER_MODEL") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_timeout() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("OBJREC_TRANSFORM_TIMEOUT_MS", "soon") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.transform_timeout_ms, 1000);
        unsafe { std::env::remove_var("OBJREC_TRANSFORM_TIMEOUT_MS") };
    }
}
