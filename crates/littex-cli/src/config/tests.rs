#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = Config::from_toml(
            r#"
            [contact]
            email = "reviewer@university.edu"
            "#,
        )
        .unwrap();

        assert_eq!(config.contact.email, "reviewer@university.edu");
        assert_eq!(config.network.timeout_secs, 30);
        assert_eq!(config.network.delay_ms, 1000);
        assert_eq!(config.sources.unpaywall_max_attempts, 3);
        assert!(config.sources.elsevier_api_key.is_none());
        assert_eq!(config.output.dir, "pdfs");
        assert_eq!(config.output.log, "acquisition_log.csv");
        assert_eq!(config.validation.strict_min_kb, 10);
        assert_eq!(config.validation.lenient_min_kb, 1);
        assert!(!config.validation.structural_probe);
    }

    #[test]
    fn test_missing_email_is_rejected() {
        let result = Config::from_toml(
            r#"
            [contact]
            email = ""
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_full_config_roundtrip() {
        let config = Config::from_toml(
            r#"
            [contact]
            email = "x@y.org"

            [network]
            timeout_secs = 10
            delay_ms = 250
            proxy = "http://proxy.internal:3128"

            [sources]
            unpaywall_max_attempts = 5
            elsevier_api_key = "key-123"

            [output]
            dir = "corpus"
            log = "runs/log.csv"

            [validation]
            strict_min_kb = 20
            lenient_min_kb = 2
            structural_probe = true
            "#,
        )
        .unwrap();

        assert_eq!(config.network.timeout().as_secs(), 10);
        assert_eq!(config.network.delay().as_millis(), 250);
        assert_eq!(config.network.proxy.as_deref(), Some("http://proxy.internal:3128"));
        assert_eq!(config.sources.unpaywall_max_attempts, 5);
        assert!(config.sources.elsevier_api_key.is_some());
        assert_eq!(config.output.dir, "corpus");
        assert!(config.validation.structural_probe);
    }

    #[test]
    fn test_strict_threshold_above_lenient_by_default() {
        let validation = ValidationConfig::default();
        assert!(validation.strict_min_kb > validation.lenient_min_kb);
    }
}
