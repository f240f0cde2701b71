use serde::Deserialize;

use crate::error::ServerError;

/// Top-level configuration for the Cadence server, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct CadenceConfig {
    /// Store backend configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Magic-link signing configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Import pipeline limits.
    #[serde(default)]
    pub import: ImportConfig,
    /// Alerting and escalation configuration.
    #[serde(default)]
    pub alerts: AlertsConfig,
    /// Background scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerSectionConfig,
    /// Notification transport credentials.
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl CadenceConfig {
    /// Startup validation. Misconfiguration refuses to start rather than
    /// failing at first use.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.auth.jwt_secret.as_deref().unwrap_or("").trim().is_empty() {
            return Err(ServerError::Config(
                "auth.jwt_secret is required (magic links cannot be signed without it)".to_owned(),
            ));
        }
        if self.store.backend != "memory" {
            return Err(ServerError::Config(format!(
                "unknown store backend '{}' (supported: memory)",
                self.store.backend
            )));
        }
        Ok(())
    }
}

/// Which store backend to use and how to reach it.
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// Backend name. `"memory"` ships in this workspace; the url/key fields
    /// exist for externally provided backends.
    #[serde(default = "default_store_backend")]
    pub backend: String,
    pub store_url: Option<String>,
    pub store_anon_key: Option<String>,
    pub store_service_key: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            store_url: None,
            store_anon_key: None,
            store_service_key: None,
        }
    }
}

fn default_store_backend() -> String {
    "memory".to_owned()
}

/// HTTP bind and frontend linkage.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origin magic links are built against.
    #[serde(default = "default_frontend_base_url")]
    pub frontend_base_url: String,
    /// Comma-separated allowed CORS origins.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

impl ServerConfig {
    #[must_use]
    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(|o| o.trim().to_owned())
            .filter(|o| !o.is_empty())
            .collect()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            frontend_base_url: default_frontend_base_url(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_port() -> u16 {
    8080
}

fn default_frontend_base_url() -> String {
    "http://localhost:5173".to_owned()
}

fn default_cors_origins() -> String {
    "http://localhost:5173".to_owned()
}

/// Magic-link signing.
#[derive(Debug, Default, Deserialize)]
pub struct AuthConfig {
    /// Symmetric HMAC secret; required.
    pub jwt_secret: Option<String>,
    /// Recognized upper bound on link validity. Link expiry is derived from
    /// the task deadline and never exceeds deadline + 1 day.
    #[serde(default = "default_jwt_expiry_hours")]
    pub jwt_expiry_hours: u32,
}

fn default_jwt_expiry_hours() -> u32 {
    72
}

/// Import pipeline limits.
#[derive(Debug, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
    /// Date changes smaller than this many days are not worth a warning.
    #[serde(default = "default_noise_threshold_days")]
    pub noise_threshold_days: i64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_upload_mb: default_max_upload_mb(),
            noise_threshold_days: default_noise_threshold_days(),
        }
    }
}

fn default_max_upload_mb() -> usize {
    10
}

fn default_noise_threshold_days() -> i64 {
    2
}

/// Alerting configuration.
#[derive(Debug, Deserialize)]
pub struct AlertsConfig {
    /// Country for business-day calendar queries.
    #[serde(default = "default_country")]
    pub default_country: String,
    /// Final fallback recipient when no PM can be resolved.
    pub ops_escalation_email: Option<String>,
    #[serde(default = "default_ops_name")]
    pub ops_escalation_name: String,
    #[serde(default = "default_alert_batch_size")]
    pub alert_batch_size: usize,
    #[serde(default = "default_pm_approval_timeout_hours")]
    pub pm_approval_timeout_hours: i64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            default_country: default_country(),
            ops_escalation_email: None,
            ops_escalation_name: default_ops_name(),
            alert_batch_size: default_alert_batch_size(),
            pm_approval_timeout_hours: default_pm_approval_timeout_hours(),
        }
    }
}

fn default_country() -> String {
    "US".to_owned()
}

fn default_ops_name() -> String {
    "Operations Team".to_owned()
}

fn default_alert_batch_size() -> usize {
    50
}

fn default_pm_approval_timeout_hours() -> i64 {
    24
}

/// Scheduler flags and cadence.
#[derive(Debug, Deserialize)]
pub struct SchedulerSectionConfig {
    /// Whether the scheduler subsystem is built at all.
    #[serde(default = "default_true")]
    pub enable_scheduler: bool,
    /// The single-runner flag: exactly one process in the fleet sets this.
    #[serde(default)]
    pub run_scheduler: bool,
    #[serde(default = "default_timezone")]
    pub scheduler_timezone: String,
    #[serde(default = "default_job_failure_threshold")]
    pub job_failure_alert_threshold: u32,
    /// Whether escalation timeouts respect business hours.
    #[serde(default)]
    pub escalation_business_hours: bool,
}

impl Default for SchedulerSectionConfig {
    fn default() -> Self {
        Self {
            enable_scheduler: true,
            run_scheduler: false,
            scheduler_timezone: default_timezone(),
            job_failure_alert_threshold: default_job_failure_threshold(),
            escalation_business_hours: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_timezone() -> String {
    "UTC".to_owned()
}

fn default_job_failure_threshold() -> u32 {
    2
}

/// Notification transport credentials. With nothing configured, messages go
/// to the logging sink.
#[derive(Debug, Default, Deserialize)]
pub struct NotifyConfig {
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    #[serde(default = "default_smtp_from")]
    pub smtp_from_email: String,
    #[serde(default = "default_smtp_from_name")]
    pub smtp_from_name: String,
    #[serde(default = "default_true")]
    pub smtp_use_tls: bool,
    pub sendgrid_api_key: Option<String>,
    pub chat_webhook_url: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_from() -> String {
    "noreply@cadence.local".to_owned()
}

fn default_smtp_from_name() -> String {
    "Cadence".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config: CadenceConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.jwt_expiry_hours, 72);
        assert_eq!(config.import.max_upload_mb, 10);
        assert_eq!(config.alerts.alert_batch_size, 50);
        assert!(config.scheduler.enable_scheduler);
        assert!(!config.scheduler.run_scheduler);
        assert_eq!(config.scheduler.job_failure_alert_threshold, 2);
    }

    #[test]
    fn missing_jwt_secret_refuses_to_start() {
        let config: CadenceConfig = toml::from_str("").unwrap();
        assert!(config.validate().is_err());

        let config: CadenceConfig =
            toml::from_str("[auth]\njwt_secret = \"s3cret\"\n").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn cors_origins_parse_as_csv() {
        let config: CadenceConfig = toml::from_str(
            "[server]\ncors_origins = \"http://a.example, http://b.example\"\n",
        )
        .unwrap();
        assert_eq!(
            config.server.cors_origin_list(),
            vec!["http://a.example".to_owned(), "http://b.example".to_owned()]
        );
    }

    #[test]
    fn unknown_store_backend_is_rejected() {
        let config: CadenceConfig = toml::from_str(
            "[auth]\njwt_secret = \"s\"\n[store]\nbackend = \"postgres\"\n",
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
