use std::io::Write;
use std::sync::Mutex;

use tempfile::{Builder, NamedTempFile};

use theft_watch::config::PipelineConfig;
use theft_watch::{AlertPolicy, Point};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "THEFT_WATCH_CONFIG",
        "THEFT_WATCH_FPS",
        "THEFT_WATCH_MAX_TRACKING_DISTANCE",
        "THEFT_WATCH_EXPIRY_FRAMES",
        "THEFT_WATCH_RAPID_MOVEMENT_THRESHOLD",
        "THEFT_WATCH_ALERT_POLICY",
        "THEFT_WATCH_HIGH_VALUE_ITEMS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "fps": 15,
        "tracking": { "max_tracking_distance": 80, "expiry_frames": 45 },
        "behavior": { "rapid_movement_threshold": 650, "container_tags": ["bag", "tote"] },
        "alerts": { "policy": "every-frame", "history_capacity": 500 },
        "zones": [
            {
                "name": "Employee_Only",
                "polygon": [[0, 400], [200, 400], [200, 600], [0, 600]],
                "restricted": true
            },
            {
                "name": "Jewelry",
                "polygon": [[300, 0], [600, 0], [600, 300]],
                "alert_on_loitering": true,
                "max_loiter_seconds": 90
            }
        ]
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("THEFT_WATCH_CONFIG", file.path());
    std::env::set_var("THEFT_WATCH_EXPIRY_FRAMES", "60");
    std::env::set_var("THEFT_WATCH_HIGH_VALUE_ITEMS", "laptop, perfume ,");

    let cfg = PipelineConfig::load().expect("load config");

    assert_eq!(cfg.settings.fps, 15.0);
    assert_eq!(cfg.settings.tracker.max_tracking_distance, 80.0);
    assert_eq!(cfg.settings.tracker.expiry_frames, 60);
    assert_eq!(cfg.settings.behavior.rapid_movement_threshold, 650.0);
    assert_eq!(cfg.settings.behavior.container_tags, vec!["bag", "tote"]);
    assert_eq!(cfg.settings.behavior.high_value_items, vec!["laptop", "perfume"]);
    assert_eq!(cfg.settings.alert_policy, AlertPolicy::EveryFrame);
    assert_eq!(cfg.settings.history_capacity, Some(500));

    let registry = cfg.build_registry().expect("registry");
    assert_eq!(registry.len(), 2);
    assert!(registry.is_restricted(Point::new(70.0, 490.0)));
    assert_eq!(registry.get("Jewelry").unwrap().max_loiter_seconds(), 90);

    clear_env();
}

#[test]
fn toml_file_and_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    let toml = r#"
fps = 10.0

[alerts]
policy = "once-per-episode"
"#;
    file.write_all(toml.as_bytes()).expect("write config");

    let cfg = PipelineConfig::from_path(file.path()).expect("load toml");
    assert_eq!(cfg.settings.fps, 10.0);
    assert_eq!(cfg.settings.alert_policy, AlertPolicy::OncePerEpisode);
    assert_eq!(cfg.settings.tracker.max_tracking_distance, 100.0);
    assert_eq!(cfg.settings.behavior.rapid_window, 5);

    let names: Vec<String> = cfg.zones.iter().map(|z| z.name.clone()).collect();
    assert_eq!(
        names,
        vec![
            "Checkout_Counter",
            "Electronics_Display",
            "Exit_Zone",
            "Employee_Storage"
        ]
    );
}

#[test]
fn rejects_invalid_settings() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cases = [
        r#"{ "fps": 0 }"#,
        r#"{ "tracking": { "expiry_frames": 0 } }"#,
        r#"{ "alerts": { "policy": "sometimes" } }"#,
        r#"{ "zones": [ { "name": "Line", "polygon": [[0, 0], [5, 5]] } ] }"#,
        r#"{ "zones": [
            { "name": "A", "polygon": [[0, 0], [5, 0], [5, 5]] },
            { "name": "a", "polygon": [[10, 0], [15, 0], [15, 5]] }
        ] }"#,
        r#"{ "unknown_key": true }"#,
    ];
    for raw in cases {
        let mut file = NamedTempFile::new().expect("temp config");
        file.write_all(raw.as_bytes()).expect("write config");
        assert!(PipelineConfig::from_path(file.path()).is_err(), "{raw}");
    }

    std::env::set_var("THEFT_WATCH_FPS", "fast");
    assert!(PipelineConfig::load().is_err());
    clear_env();
}

#[test]
fn missing_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();
    std::env::set_var("THEFT_WATCH_CONFIG", "/nonexistent/theft-watch.json");
    assert!(PipelineConfig::load().is_err());
    clear_env();
}
