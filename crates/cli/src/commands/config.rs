use signoff_core::config::{AppConfig, LoadOptions, LogFormat};

/// Renders the effective configuration after defaults, file, and environment
/// merging. Secrets are shown only as present/absent.
pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("configuration issue: {error}"),
    };

    let format = match config.logging.format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    };

    let mut lines = Vec::new();
    lines.push("effective configuration".to_string());
    lines.push(format!("  database.url              = {}", config.database.url));
    lines.push(format!("  database.max_connections  = {}", config.database.max_connections));
    lines.push(format!("  database.timeout_secs     = {}", config.database.timeout_secs));
    lines.push(format!("  server.bind_address       = {}", config.server.bind_address));
    lines.push(format!("  server.port               = {}", config.server.port));
    lines.push(format!("  server.health_check_port  = {}", config.server.health_check_port));
    lines.push(format!(
        "  workflow.task_deadline_days = {}",
        config.workflow.task_deadline_days
    ));
    lines.push(format!(
        "  workflow.default_urgency  = {}",
        config.workflow.default_urgency.as_str()
    ));
    lines.push(format!(
        "  notify.webhook_url        = {}",
        config.notify.webhook_url.as_deref().unwrap_or("(disabled)")
    ));
    lines.push(format!(
        "  notify.auth_token         = {}",
        if config.notify.auth_token.is_some() { "(set, redacted)" } else { "(unset)" }
    ));
    lines.push(format!("  logging.level             = {}", config.logging.level));
    lines.push(format!("  logging.format            = {format}"));
    lines.join("\n")
}
