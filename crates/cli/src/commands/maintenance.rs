use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use photojournal_core::Journal;

pub async fn migrate(journal: &Journal) -> Result<()> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}").unwrap());
    pb.set_message("Backfilling image sizes...");
    pb.enable_steady_tick(Duration::from_millis(80));

    let report = journal.run_startup_migration().await;
    if report.failed {
        pb.finish_with_message(format!(
            "Backfill stopped after {} of {} updated; it will run again next launch",
            report.updated, report.examined
        ));
        anyhow::bail!("image size backfill failed, see the log for details");
    } else if report.already_done {
        pb.finish_with_message("Image sizes already backfilled.");
    } else {
        pb.finish_with_message(format!(
            "{} examined, {} updated, {} skipped",
            report.examined, report.updated, report.skipped
        ));
    }
    Ok(())
}

pub async fn sweep(journal: &Journal, dry_run: bool) -> Result<()> {
    let report = journal.sweep_orphans(dry_run).await?;
    if report.orphans.is_empty() {
        println!("No orphaned files.");
        return Ok(());
    }
    for id in &report.orphans {
        println!("  {id}");
    }
    if dry_run {
        println!("{} orphaned files (dry run, nothing removed)", report.orphans.len());
    } else {
        println!("Removed {} of {} orphaned files", report.removed, report.orphans.len());
    }
    Ok(())
}
