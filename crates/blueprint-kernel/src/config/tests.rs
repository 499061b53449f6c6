//! Integration tests for multi-format configuration loading against real
//! files on disk (TOML/YAML/JSON, with environment substitution and
//! multi-source merging).

#[cfg(test)]
mod integration_tests {
    use crate::config::*;
    use serde::Deserialize;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestExecutorConfig {
        max_concurrency: Option<usize>,
        default_http_timeout_ms: Option<u64>,
        event_buffer_size: Option<usize>,
    }

    fn create_test_file(dir: &TempDir, filename: &str, content: &str) -> PathBuf {
        let path = dir.path().join(filename);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_all_formats_load_basic_config() {
        let temp_dir = TempDir::new().unwrap();

        let yaml = "max_concurrency: 4\ndefault_http_timeout_ms: 5000\n";
        let yaml_path = create_test_file(&temp_dir, "executor.yml", yaml);
        let yaml_config: TestExecutorConfig = load_config(yaml_path.to_str().unwrap()).unwrap();
        assert_eq!(yaml_config.max_concurrency, Some(4));

        let toml = "max_concurrency = 4\ndefault_http_timeout_ms = 5000\n";
        let toml_path = create_test_file(&temp_dir, "executor.toml", toml);
        let toml_config: TestExecutorConfig = load_config(toml_path.to_str().unwrap()).unwrap();
        assert_eq!(toml_config.max_concurrency, Some(4));

        let json = r#"{ "max_concurrency": 4, "default_http_timeout_ms": 5000 }"#;
        let json_path = create_test_file(&temp_dir, "executor.json", json);
        let json_config: TestExecutorConfig = load_config(json_path.to_str().unwrap()).unwrap();
        assert_eq!(json_config.max_concurrency, Some(4));
    }

    #[test]
    fn test_env_var_substitution_braced() {
        let temp_dir = TempDir::new().unwrap();
        unsafe {
            std::env::set_var("TEST_BP_CONCURRENCY", "8");
        }

        let yaml = "max_concurrency: ${TEST_BP_CONCURRENCY}\ndefault_http_timeout_ms: 1000\n";
        let yaml_path = create_test_file(&temp_dir, "executor.yml", yaml);
        let config: TestExecutorConfig = load_config(yaml_path.to_str().unwrap()).unwrap();
        assert_eq!(config.max_concurrency, Some(8));

        let json = r#"{ "max_concurrency": "${TEST_BP_CONCURRENCY}", "default_http_timeout_ms": 1000 }"#;
        let json_path = create_test_file(&temp_dir, "executor.json", json);
        let config: TestExecutorConfig = load_config(json_path.to_str().unwrap()).unwrap();
        assert_eq!(config.max_concurrency, Some(8));

        unsafe {
            std::env::remove_var("TEST_BP_CONCURRENCY");
        }
    }

    #[test]
    fn test_env_var_substitution_unbraced() {
        let temp_dir = TempDir::new().unwrap();
        unsafe {
            std::env::set_var("TEST_BP_BUFFER", "128");
        }

        let yaml = "event_buffer_size: $TEST_BP_BUFFER\n";
        let yaml_path = create_test_file(&temp_dir, "executor.yml", yaml);
        let config: TestExecutorConfig = load_config(yaml_path.to_str().unwrap()).unwrap();
        assert_eq!(config.event_buffer_size, Some(128));

        unsafe {
            std::env::remove_var("TEST_BP_BUFFER");
        }
    }

    #[test]
    fn test_merge_configs_from_multiple_sources() {
        let base = r#"{ "max_concurrency": 4, "default_http_timeout_ms": 30000 }"#;
        let override_config = r#"{ "default_http_timeout_ms": 5000, "event_buffer_size": 512 }"#;

        let merged: TestExecutorConfig =
            merge_configs(&[(base, FileFormat::Json), (override_config, FileFormat::Json)]).unwrap();

        assert_eq!(merged.max_concurrency, Some(4));
        assert_eq!(merged.default_http_timeout_ms, Some(5000));
        assert_eq!(merged.event_buffer_size, Some(512));
    }

    #[test]
    fn test_load_merged_from_files() {
        let temp_dir = TempDir::new().unwrap();

        let base = "max_concurrency: 4\ndefault_http_timeout_ms: 30000\n";
        let base_path = create_test_file(&temp_dir, "base.yml", base);

        let override_config = "default_http_timeout_ms: 5000\nevent_buffer_size: 512\n";
        let override_path = create_test_file(&temp_dir, "override.yml", override_config);

        let merged: TestExecutorConfig =
            load_merged(&[base_path.to_str().unwrap(), override_path.to_str().unwrap()]).unwrap();

        assert_eq!(merged.max_concurrency, Some(4));
        assert_eq!(merged.default_http_timeout_ms, Some(5000));
        assert_eq!(merged.event_buffer_size, Some(512));
    }

    #[test]
    fn test_env_var_with_env_override() {
        let temp_dir = TempDir::new().unwrap();
        unsafe {
            std::env::set_var("BP_DEFAULT_HTTP_TIMEOUT_MS", "9000");
        }

        let yaml = "max_concurrency: 4\ndefault_http_timeout_ms: 30000\n";
        let yaml_path = create_test_file(&temp_dir, "executor.yml", yaml);

        let config: TestExecutorConfig = load_with_env(yaml_path.to_str().unwrap(), "BP").unwrap();
        assert_eq!(config.default_http_timeout_ms, Some(9000));

        unsafe {
            std::env::remove_var("BP_DEFAULT_HTTP_TIMEOUT_MS");
        }
    }

    #[test]
    fn test_missing_env_var_preserved() {
        let result = substitute_env_vars("url: ${MISSING_VAR}");
        assert_eq!(result, "url: ${MISSING_VAR}");

        let result = substitute_env_vars("url: $ANOTHER_MISSING");
        assert_eq!(result, "url: $ANOTHER_MISSING");
    }

    #[test]
    fn test_partial_env_var_substitution() {
        unsafe {
            std::env::set_var("HOST", "localhost");
            std::env::set_var("PORT", "8080");
        }

        let result = substitute_env_vars("url: http://${HOST}:${PORT}/api");
        assert_eq!(result, "url: http://localhost:8080/api");

        unsafe {
            std::env::remove_var("HOST");
            std::env::remove_var("PORT");
        }
    }

    #[test]
    fn test_detect_format_from_extension() {
        assert_eq!(detect_format("config.yaml").unwrap(), FileFormat::Yaml);
        assert_eq!(detect_format("config.yml").unwrap(), FileFormat::Yaml);
        assert_eq!(detect_format("config.toml").unwrap(), FileFormat::Toml);
        assert_eq!(detect_format("config.json").unwrap(), FileFormat::Json);

        assert!(detect_format("config.ini").is_err());
        assert!(detect_format("config.unknown").is_err());
    }

    #[test]
    fn test_complex_nested_config() {
        let yaml = r#"
max_concurrency: 16
default_http_timeout_ms: 15000
event_buffer_size: 1024
"#;
        let config: TestExecutorConfig = from_str(yaml, FileFormat::Yaml).unwrap();
        assert_eq!(config.max_concurrency, Some(16));
        assert_eq!(config.default_http_timeout_ms, Some(15000));
        assert_eq!(config.event_buffer_size, Some(1024));
    }

    #[test]
    fn test_array_config() {
        let json = r#"{ "roots": ["a", "b", "c"] }"#;

        #[derive(Debug, Deserialize)]
        struct RootsConfig {
            roots: Vec<String>,
        }

        let config: RootsConfig = from_str(json, FileFormat::Json).unwrap();
        assert_eq!(config.roots.len(), 3);
        assert!(config.roots.contains(&"b".to_string()));
    }
}
