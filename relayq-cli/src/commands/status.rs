//! Fleet status command

use anyhow::Result;
use colored::Colorize;
use relayq_client::WorkerStatusAggregator;
use relayq_core::domain::worker::AggregateStatus;

use crate::config::Config;

pub async fn show_status(config: &Config, json: bool) -> Result<()> {
    let status = WorkerStatusAggregator::new(config.transport()).query().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print!("{}", render(&status));
    }
    Ok(())
}

fn render(status: &AggregateStatus) -> String {
    let mut out = String::new();

    if !status.online {
        out.push_str(&format!("{}\n", "Fleet offline".red().bold()));
        if let Some(error) = &status.error {
            out.push_str(&format!("  {}\n", error.dimmed()));
        }
        return out;
    }

    out.push_str(&format!(
        "{} {} worker(s), {} active, {} queued\n",
        "Fleet online:".green().bold(),
        status.total_workers,
        status.total_active,
        status.total_queued
    ));

    for (name, worker) in &status.workers {
        out.push_str(&format!(
            "  {} {} [{}] active={} queued={}\n",
            "▸".cyan(),
            name.bold(),
            worker.tag,
            worker.active,
            worker.queued
        ));
        for (task, count) in &worker.processed {
            out.push_str(&format!("      {}\n", format!("{task}: {count}").dimmed()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayq_core::domain::job::TaskKind;
    use relayq_core::domain::worker::{WorkerRecord, WorkerTag};

    #[test]
    fn test_render_offline_shows_reason() {
        colored::control::set_override(false);
        let text = render(&AggregateStatus::offline(Some("connection refused".into())));
        assert!(text.contains("Fleet offline"));
        assert!(text.contains("connection refused"));
    }

    #[test]
    fn test_render_lists_workers() {
        colored::control::set_override(false);
        let mut status = AggregateStatus {
            online: true,
            total_workers: 1,
            total_active: 1,
            total_queued: 2,
            ..AggregateStatus::default()
        };
        status.workers.insert(
            "macmini-01".into(),
            WorkerRecord {
                name: "macmini-01".into(),
                tag: WorkerTag::MacMini,
                active: 1,
                queued: 2,
                processed: [(TaskKind::TranscribeAudio.name().to_string(), 4)]
                    .into_iter()
                    .collect(),
            },
        );

        let text = render(&status);
        assert!(text.contains("1 worker(s), 1 active, 2 queued"));
        assert!(text.contains("macmini-01 [mac-mini] active=1 queued=2"));
        assert!(text.contains("relayq.transcribe_audio: 4"));
    }
}
