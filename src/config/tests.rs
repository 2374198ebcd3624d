// src/config/tests.rs

//! Unit tests for configuration defaults and JSON loading.

#[cfg(test)]
mod config_tests {
    use crate::config::RenderConfig;
    use test_log::test;

    #[test]
    fn defaults_are_sensible() {
        let config = RenderConfig::default();
        assert_eq!(config.cache.metric_epsilon, 0.001);
        assert!(config.selection.background.a() < 0xFF, "highlight is translucent");
        assert_eq!(config.selection.foreground.a(), 0xFF);
        assert!(config.cursor.underline_thickness > 0.0);
    }

    #[test]
    fn partial_json_overrides_keep_the_remaining_defaults() {
        let config =
            RenderConfig::from_json(r#"{ "cache": { "metric_epsilon": 0.01 } }"#).unwrap();
        assert_eq!(config.cache.metric_epsilon, 0.01);
        assert_eq!(
            config.selection.foreground,
            RenderConfig::default().selection.foreground
        );
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(RenderConfig::from_json("{ not json").is_err());
    }
}
