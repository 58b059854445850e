//! Index statistics.
//!
//! A quick look at what the summary index holds: record counts, embedding
//! coverage, the most recent ingestion dates, and the latest weekly report.
//! Used by `rdigest stats`.

use anyhow::Result;
use sqlx::Row;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::db;
use crate::migrate;

const RECENT_DATES: i64 = 7;

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::ensure_schema(&pool).await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM summaries")
        .fetch_one(&pool)
        .await?;
    let embedded: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM summaries WHERE embedding IS NOT NULL")
            .fetch_one(&pool)
            .await?;
    let last_write: Option<i64> = sqlx::query_scalar("SELECT MAX(created_at) FROM summaries")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Research Digest: Index Stats");
    println!("==============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Summaries:   {}", total);
    println!(
        "  Embedded:    {} / {} ({}%)",
        embedded,
        total,
        if total > 0 { (embedded * 100) / total } else { 0 }
    );
    println!(
        "  Last write:  {}",
        last_write
            .map(format_ts_relative)
            .unwrap_or_else(|| "never".to_string())
    );

    let date_rows = sqlx::query(
        "SELECT date, COUNT(*) AS n FROM summaries GROUP BY date ORDER BY date DESC LIMIT ?",
    )
    .bind(RECENT_DATES)
    .fetch_all(&pool)
    .await?;

    if !date_rows.is_empty() {
        println!();
        println!("  By date:");
        println!("  {:<12} {:>6}", "DATE", "COUNT");
        println!("  {}", "-".repeat(19));
        for row in &date_rows {
            let date: String = row.get("date");
            let n: i64 = row.get("n");
            println!("  {:<12} {:>6}", date, n);
        }
    }

    println!();
    match latest_report(&config.output.dir) {
        Some(path) => println!("  Latest report: {}", path.display()),
        None => println!("  Latest report: none"),
    }
    println!();

    pool.close().await;
    Ok(())
}

/// The lexicographically last `summary_*` file, which is also the newest
/// since report names embed an ISO date.
fn latest_report(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("summary_"))
        })
        .max()
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// "3 hours ago" for recent timestamps, an ISO-ish date otherwise.
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 || delta >= 86400 * 30 {
        return chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| ts.to_string());
    }

    let (n, unit) = match delta {
        d if d < 60 => return "just now".to_string(),
        d if d < 3600 => (d / 60, "min"),
        d if d < 86400 => (d / 3600, "hour"),
        d => (d / 86400, "day"),
    };
    format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" })
}
