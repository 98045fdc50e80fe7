use serde::Serialize;

use signoff_core::config::{AppConfig, LoadOptions};
use signoff_core::directory::ProcessDirectory;
use signoff_core::ProcessDefinition;
use signoff_db::repositories::SqlProcessDirectory;
use signoff_db::{connect_with_settings, DbPool};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "process_definitions",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            }];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck {
                        name: "database_connectivity",
                        status: CheckStatus::Fail,
                        details: format!("failed to connect to database: {error}"),
                    },
                    DoctorCheck {
                        name: "process_definitions",
                        status: CheckStatus::Skipped,
                        details: "skipped because the database is unreachable".to_string(),
                    },
                ];
            }
        };

        let mut checks = vec![DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: "database connection established".to_string(),
        }];
        checks.push(check_process_definitions(&pool).await);
        pool.close().await;
        checks
    })
}

/// Flags approval templates a submission would reject at runtime: unknown
/// tables aside, that means empty processes and duplicated step orders.
async fn check_process_definitions(pool: &DbPool) -> DoctorCheck {
    let directory = SqlProcessDirectory::new(pool.clone());

    let titles = match directory.list_titles().await {
        Ok(titles) => titles,
        Err(error) => {
            return DoctorCheck {
                name: "process_definitions",
                status: CheckStatus::Fail,
                details: format!("failed to list process definitions: {error}"),
            };
        }
    };

    if titles.is_empty() {
        return DoctorCheck {
            name: "process_definitions",
            status: CheckStatus::Fail,
            details: "no approval processes are defined; run `signoff seed` or define them"
                .to_string(),
        };
    }

    let mut problems = Vec::new();
    for title in &titles {
        match directory.find_by_title(title).await {
            Ok(Some(process)) => {
                if let Err(error) = ProcessDefinition::validated(process.title, process.steps) {
                    problems.push(error.to_string());
                }
            }
            Ok(None) => problems.push(format!("process `{title}` vanished during the check")),
            Err(error) => problems.push(format!("failed to load process `{title}`: {error}")),
        }
    }

    if problems.is_empty() {
        DoctorCheck {
            name: "process_definitions",
            status: CheckStatus::Pass,
            details: format!("{} process definition(s) validated", titles.len()),
        }
    } else {
        DoctorCheck {
            name: "process_definitions",
            status: CheckStatus::Fail,
            details: problems.join("; "),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];
    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "PASS",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skipped => "SKIP",
        };
        lines.push(format!("  [{marker}] {} - {}", check.name, check.details));
    }
    lines.join("\n")
}

fn escape_json(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::{render_human, CheckStatus, DoctorCheck, DoctorReport};

    #[test]
    fn human_rendering_marks_each_check() {
        let report = DoctorReport {
            overall_status: CheckStatus::Fail,
            summary: "doctor: one or more readiness checks failed".to_string(),
            checks: vec![
                DoctorCheck {
                    name: "config_validation",
                    status: CheckStatus::Pass,
                    details: "configuration loaded and validated".to_string(),
                },
                DoctorCheck {
                    name: "process_definitions",
                    status: CheckStatus::Fail,
                    details: "process `Budget Request Approval` has no steps".to_string(),
                },
            ],
        };

        let rendered = render_human(&report);
        assert!(rendered.contains("[PASS] config_validation"));
        assert!(rendered.contains("[FAIL] process_definitions"));
        assert!(rendered.contains("has no steps"));
    }
}
