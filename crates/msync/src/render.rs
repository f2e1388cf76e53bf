use colored::*;
use modelsync_core::manifest::{ModelRecord, Statistics};
use modelsync_core::protocol::{FetchOutcome, Fetched};
use modelsync_depot::{FleetSummary, SyncReport, Verification};

pub fn model_line(model: &ModelRecord) -> String {
    let marker = if model.status.downloaded { "✅" } else { "⏳" };
    let size = match model.size_mb() {
        mb if mb > 0.0 => format!("{} MB", mb),
        _ => "-".to_string(),
    };
    format!(
        "{} {:<28} {:<9} {:<12} {:>8}  {}",
        marker,
        model.id.bold(),
        model.model_type.to_string(),
        model.source.platform.to_string(),
        size,
        model.display_name().dimmed()
    )
}

pub fn outcome_line(outcome: &FetchOutcome) -> String {
    let kind = if outcome.task.required {
        "required"
    } else {
        "optional"
    };
    match &outcome.result {
        Ok(Fetched::Downloaded(bytes)) => {
            format!("  ✅ {} ({} bytes)", outcome.task.file, bytes)
        }
        Ok(Fetched::AlreadyPresent) => {
            format!("  ✅ {} {}", outcome.task.file, "(already present)".dimmed())
        }
        Err(e) => format!(
            "  ❌ {} [{}]: {}",
            outcome.task.file,
            kind,
            e.to_string().red()
        ),
    }
}

pub fn report_lines(report: &SyncReport) -> Vec<String> {
    report.outcomes.iter().map(outcome_line).collect()
}

pub fn statistics_lines(stats: &Statistics) -> Vec<String> {
    let mut lines = vec![
        format!("📊 {}", "Registry statistics".bold()),
        format!("  Total models:  {}", stats.total_models),
        format!("  Downloaded:    {}", stats.downloaded_models.to_string().green()),
        format!("  Pending:       {}", stats.pending_models.to_string().yellow()),
        format!("  Total size:    {} MB", stats.total_size_mb),
        "  By type:".to_string(),
    ];
    lines.extend(
        stats
            .by_type
            .iter()
            .map(|(model_type, count)| format!("    {:<10} {}", model_type.to_string(), count)),
    );
    lines.push("  By source:".to_string());
    lines.extend(
        stats
            .by_source
            .iter()
            .map(|(platform, count)| format!("    {:<12} {}", platform.to_string(), count)),
    );
    lines
}

pub fn verification_lines(verification: &Verification) -> Vec<String> {
    if verification.is_complete() {
        return vec![format!("✅ {}: all required files present", verification.model_id)];
    }
    let mut lines = vec![format!(
        "❌ {}: {} required file(s) missing",
        verification.model_id,
        verification.missing.len()
    )];
    lines.extend(verification.missing.iter().map(|f| format!("  - {}", f.red())));
    lines
}

pub fn fleet_summary_line(summary: &FleetSummary) -> String {
    let mut line = format!(
        "{} of {} models synced ({} already up to date)",
        summary.succeeded, summary.attempted, summary.already_synced
    );
    if !summary.failures.is_empty() {
        let ids: Vec<&str> = summary
            .failures
            .iter()
            .map(|f| f.model_id.as_str())
            .collect();
        line.push_str(&format!(", failed: {}", ids.join(", ")));
    }
    if summary.cancelled {
        line.push_str(", cancelled");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelsync_core::protocol::DownloadTask;
    use modelsync_core::SyncError;
    use modelsync_depot::ModelFailure;
    use std::path::PathBuf;

    fn outcome(file: &str, required: bool, result: Result<Fetched, SyncError>) -> FetchOutcome {
        FetchOutcome {
            task: DownloadTask {
                file: file.to_string(),
                required,
                url: format!("https://huggingface.co/o/r/resolve/main/{}", file),
                destination: PathBuf::from(file),
            },
            result,
        }
    }

    #[test]
    fn failed_files_are_marked_required_or_optional() {
        colored::control::set_override(false);
        let report = SyncReport {
            model_id: "whisper-tiny".to_string(),
            outcomes: vec![
                outcome("config.json", true, Ok(Fetched::Downloaded(12))),
                outcome(
                    "tokenizer.json",
                    true,
                    Err(SyncError::FetchNotFound {
                        url: "https://huggingface.co/o/r/resolve/main/tokenizer.json".to_string(),
                    }),
                ),
                outcome(
                    "model_info.json",
                    false,
                    Err(SyncError::fetch_failed("https://x/model_info.json", "HTTP 500")),
                ),
            ],
        };

        let lines = report_lines(&report);
        assert_eq!(lines[0], "  ✅ config.json (12 bytes)");
        assert!(lines[1].starts_with("  ❌ tokenizer.json [required]"));
        assert!(lines[2].starts_with("  ❌ model_info.json [optional]"));
    }

    #[test]
    fn verification_lists_missing_files() {
        colored::control::set_override(false);
        let verification = Verification {
            model_id: "silero-vad".to_string(),
            missing: vec!["files/silero_vad.onnx".to_string()],
        };
        assert_eq!(
            verification_lines(&verification),
            [
                "❌ silero-vad: 1 required file(s) missing",
                "  - files/silero_vad.onnx"
            ]
        );
    }

    #[test]
    fn fleet_summary_names_failures() {
        let summary = FleetSummary {
            attempted: 3,
            succeeded: 1,
            already_synced: 1,
            failures: vec![ModelFailure {
                model_id: "kokoro".to_string(),
                reason: "boom".to_string(),
            }],
            cancelled: false,
        };
        assert_eq!(
            fleet_summary_line(&summary),
            "1 of 3 models synced (1 already up to date), failed: kokoro"
        );
    }
}
