use underwriting_core::{config::EngineConfig, engine::UnderwritingEngine, error::EngineError};

const DATA_DIR: &str = "../data";

#[test]
fn shipped_data_files_match_builtin_config() {
    let loaded = EngineConfig::load(DATA_DIR).unwrap();
    assert_eq!(loaded, EngineConfig::builtin());
}

#[test]
fn engine_builds_from_shipped_data() {
    let config = EngineConfig::load(DATA_DIR).unwrap();
    let engine = UnderwritingEngine::new(config).unwrap();
    let codes: Vec<&str> = engine.config().policies.codes().collect();
    assert_eq!(codes, vec!["UK", "US"]);
}

#[test]
fn missing_data_dir_reports_the_path() {
    let err = EngineConfig::load("./no-such-dir").unwrap_err();
    assert!(err.to_string().contains("no-such-dir/engine.json"), "{err}");
}

#[test]
fn omitted_engine_sections_fall_back_to_defaults() {
    let dir = std::env::temp_dir().join(format!("underwrite-config-{}", std::process::id()));
    std::fs::create_dir_all(dir.join("model")).unwrap();
    std::fs::create_dir_all(dir.join("policy")).unwrap();
    std::fs::write(dir.join("engine.json"), "{}").unwrap();
    std::fs::copy(
        format!("{DATA_DIR}/model/pd_model.json"),
        dir.join("model/pd_model.json"),
    )
    .unwrap();
    std::fs::copy(
        format!("{DATA_DIR}/policy/jurisdictions.json"),
        dir.join("policy/jurisdictions.json"),
    )
    .unwrap();

    let loaded = EngineConfig::load(dir.to_str().unwrap()).unwrap();
    std::fs::remove_dir_all(&dir).unwrap();

    assert_eq!(loaded, EngineConfig::builtin());
}

#[test]
fn invalid_window_is_a_configuration_error() {
    let mut config = EngineConfig::builtin();
    config.window.min_history_days = 0;
    let result = UnderwritingEngine::new(config);
    assert!(matches!(result, Err(EngineError::Configuration(_))));

    let mut config = EngineConfig::builtin();
    config.window.lookback_days = 10;
    let result = UnderwritingEngine::new(config);
    assert!(matches!(result, Err(EngineError::Configuration(_))));
}
