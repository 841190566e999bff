use super::*;

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://secure.powershop.co.nz/external_api/v4/".to_string(),
            client_version: "1.68.5".to_string(),
            consumer_key: "7bd7cc52a071800c82fae35c8a063f09".to_string(),
            consumer_secret: "wWKjy1hRrlNmVVT60t6JvwnY4n8hfVcj".to_string(),
            device_type: "Home Assistant".to_string(),
            device_name: "Home Assistant".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            base_url: "https://secure.powershop.co.nz".to_string(),
            timeout_seconds: 20,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_days: 30,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            log_summary: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/powershop.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            api: ApiConfig::default(),
            web: WebConfig::default(),
            report: ReportConfig::default(),
            usage_window_days: 30,
            timezone: "Pacific/Auckland".to_string(),
            max_concurrent_fetches: 1,
            poll_interval_seconds: 3600,
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
