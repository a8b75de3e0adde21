use stackreg_core::error::RegistrationError;
use stackreg_core::pipeline::config::{
    DirectConfig, FeatureConfig, IntensityBounds, MotionModel, PreprocessConfig,
    RegistrationConfig,
};
use stackreg_core::pipeline::RegistrationStage;

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

#[test]
fn test_motion_model_display() {
    assert_eq!(format!("{}", MotionModel::Translation), "Translation");
    assert_eq!(format!("{}", MotionModel::Euclidean), "Euclidean");
    assert_eq!(format!("{}", MotionModel::Affine), "Affine");
}

#[test]
fn test_motion_model_default_is_euclidean() {
    assert_eq!(MotionModel::default(), MotionModel::Euclidean);
    assert_eq!(MotionModel::default().parameter_count(), 3);
}

#[test]
fn test_intensity_bounds_display() {
    assert_eq!(format!("{}", IntensityBounds::PerPair), "Per pair");
    assert_eq!(format!("{}", IntensityBounds::PerStack), "Per stack");
    let fixed = IntensityBounds::Fixed {
        vmin: 0.0,
        vmax: 2.5,
    };
    assert_eq!(format!("{fixed}"), "Fixed [0, 2.5]");
}

#[test]
fn test_stage_display() {
    assert_eq!(format!("{}", RegistrationStage::Cropping), "Cropping");
    assert_eq!(
        format!("{}", RegistrationStage::Estimating),
        "Estimating transforms"
    );
    assert_eq!(
        format!("{}", RegistrationStage::Resampling),
        "Resampling frames"
    );
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[test]
fn test_defaults() {
    let config = RegistrationConfig::default();
    assert_eq!(config.reference_channel, "Mn_Ka");
    assert_eq!(config.units, "a.u.");
    assert_eq!(config.direct.gauss_filter_size, 5);
    assert_eq!(config.direct.max_iterations, 50);
    assert_eq!(config.features.max_features, 1000);
    assert_eq!(config.preprocess.sigma_clip, 2.0);
    assert_eq!(config.preprocess.bounds, IntensityBounds::PerPair);
    assert!(config.validate().is_ok());
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

#[test]
fn test_toml_round_trip() {
    let config = RegistrationConfig {
        reference_channel: "Fe_Ka".into(),
        units: "counts".into(),
        direct: DirectConfig {
            motion: MotionModel::Affine,
            max_iterations: 80,
            ..DirectConfig::default()
        },
        features: FeatureConfig {
            max_features: 500,
            ..FeatureConfig::default()
        },
        preprocess: PreprocessConfig {
            sigma_clip: 3.0,
            bounds: IntensityBounds::Fixed {
                vmin: 0.0,
                vmax: 1.0,
            },
        },
    };
    let text = toml::to_string(&config).unwrap();
    let back: RegistrationConfig = toml::from_str(&text).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_json_round_trip() {
    let config = RegistrationConfig {
        preprocess: PreprocessConfig {
            bounds: IntensityBounds::PerStack,
            ..PreprocessConfig::default()
        },
        ..RegistrationConfig::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    let back: RegistrationConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_partial_toml_fills_defaults() {
    let text = r#"
reference_channel = "Ca_Ka"

[direct]
motion = "Translation"
"#;
    let config: RegistrationConfig = toml::from_str(text).unwrap();
    assert_eq!(config.reference_channel, "Ca_Ka");
    assert_eq!(config.units, "a.u.");
    assert_eq!(config.direct.motion, MotionModel::Translation);
    assert_eq!(config.direct.gauss_filter_size, 5);
    assert_eq!(config.features, FeatureConfig::default());
}

#[test]
fn test_fixed_bounds_from_toml() {
    let text = r#"
[preprocess]
bounds = { Fixed = { vmin = 0.5, vmax = 4.0 } }
"#;
    let config: RegistrationConfig = toml::from_str(text).unwrap();
    assert_eq!(
        config.preprocess.bounds,
        IntensityBounds::Fixed {
            vmin: 0.5,
            vmax: 4.0
        }
    );
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn rejected(config: &RegistrationConfig) -> bool {
    matches!(config.validate(), Err(RegistrationError::Config(_)))
}

#[test]
fn test_even_gauss_size_rejected() {
    let mut config = RegistrationConfig::default();
    config.direct.gauss_filter_size = 4;
    assert!(rejected(&config));
    config.direct.gauss_filter_size = 0;
    assert!(rejected(&config));
    config.direct.gauss_filter_size = 1;
    assert!(!rejected(&config));
}

#[test]
fn test_zero_iterations_rejected() {
    let mut config = RegistrationConfig::default();
    config.direct.max_iterations = 0;
    assert!(rejected(&config));
}

#[test]
fn test_overlap_out_of_range_rejected() {
    let mut config = RegistrationConfig::default();
    config.direct.min_overlap = 1.5;
    assert!(rejected(&config));
}

#[test]
fn test_small_patch_rejected() {
    let mut config = RegistrationConfig::default();
    config.features.patch_size = 4;
    assert!(rejected(&config));
}

#[test]
fn test_inverted_fixed_bounds_rejected() {
    let mut config = RegistrationConfig::default();
    config.preprocess.bounds = IntensityBounds::Fixed {
        vmin: 2.0,
        vmax: 1.0,
    };
    assert!(rejected(&config));
}

#[test]
fn test_non_positive_sigma_clip_rejected() {
    let mut config = RegistrationConfig::default();
    config.preprocess.sigma_clip = 0.0;
    assert!(rejected(&config));
}
