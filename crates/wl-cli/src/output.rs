//! Report files written after an analysis run.
//!
//! - `sessions.jsonl`: one JSON object per session
//! - `unique_resources_by_session.tsv`: client and distinct resources, largest first
//! - `client_session_duration.tsv`: client and total session minutes, largest first
//! - `client_engagement.tsv`: per-client engagement record
//! - `window_stats.json`: sweep percentages and selected windows (discovery only)

use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use wl_core::{Analysis, SIZE_BUCKETS, Session, SweepReport, recommended_window};

pub const SESSIONS_FILE: &str = "sessions.jsonl";
pub const UNIQUE_RESOURCES_FILE: &str = "unique_resources_by_session.tsv";
pub const CLIENT_DURATION_FILE: &str = "client_session_duration.tsv";
pub const ENGAGEMENT_FILE: &str = "client_engagement.tsv";
pub const WINDOW_STATS_FILE: &str = "window_stats.json";

/// Indices on either side of a selected window included in its neighbourhood.
const NEIGHBORHOOD_RADIUS: usize = 5;

/// Labels for the session-size buckets, in bucket order.
const BUCKET_LABELS: [&str; SIZE_BUCKETS] = ["1", "2", "3", "4", "5", "6+"];

/// A session as persisted to `sessions.jsonl`.
#[derive(Debug, Serialize)]
struct SessionLine<'a> {
    client_id: &'a str,
    gaps: &'a [f64],
    resources: Vec<&'a str>,
    timestamps: Vec<DateTime<Utc>>,
}

impl<'a> From<&'a Session> for SessionLine<'a> {
    fn from(session: &'a Session) -> Self {
        Self {
            client_id: session.client_id.as_str(),
            gaps: &session.gaps,
            resources: session.events.iter().map(|e| e.resource.as_str()).collect(),
            timestamps: session.events.iter().map(|e| e.timestamp).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct BucketSeries<'a> {
    unique_resources: &'a str,
    percentages: Vec<Option<f64>>,
}

#[derive(Debug, Serialize)]
struct Neighborhood {
    index: usize,
    window_minutes: f64,
    points: Vec<(usize, Option<f64>)>,
}

/// Sweep data handed to plotting tools.
#[derive(Debug, Serialize)]
struct WindowStats<'a> {
    max_window: usize,
    selected: &'a [usize],
    recommended_window: Option<f64>,
    series: Vec<BucketSeries<'a>>,
    neighborhoods: Vec<Neighborhood>,
}

impl<'a> From<&'a SweepReport> for WindowStats<'a> {
    fn from(report: &'a SweepReport) -> Self {
        let series = report
            .sweep
            .bucket_series()
            .into_iter()
            .zip(BUCKET_LABELS)
            .map(|(percentages, unique_resources)| BucketSeries {
                unique_resources,
                percentages,
            })
            .collect();

        let neighborhoods = report
            .selected
            .iter()
            .map(|&index| Neighborhood {
                index,
                window_minutes: recommended_window(index),
                points: report.sweep.neighborhood(0, index, NEIGHBORHOOD_RADIUS),
            })
            .collect();

        Self {
            max_window: report.sweep.len(),
            selected: &report.selected,
            recommended_window: report.recommended_window(),
            series,
            neighborhoods,
        }
    }
}

fn create(dir: &Path, name: &str) -> Result<(PathBuf, BufWriter<File>)> {
    let path = dir.join(name);
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok((path, BufWriter::new(file)))
}

fn write_sessions<W: Write>(writer: &mut W, sessions: &[Session]) -> Result<()> {
    for session in sessions {
        serde_json::to_writer(&mut *writer, &SessionLine::from(session))?;
        writeln!(writer)?;
    }
    Ok(())
}

fn write_pairs<W, K, V, I>(writer: &mut W, rows: I) -> Result<()>
where
    W: Write,
    K: Display,
    V: Display,
    I: IntoIterator<Item = (K, V)>,
{
    for (client, value) in rows {
        writeln!(writer, "{client}\t{value}")?;
    }
    Ok(())
}

fn write_engagement<W: Write>(writer: &mut W, analysis: &Analysis) -> Result<()> {
    writeln!(
        writer,
        "client\ttotal_resources\ttotal_minutes\tavg_resources\tavg_minutes\tsessions"
    )?;
    for (client, record) in &analysis.metrics.engagement {
        writeln!(
            writer,
            "{client}\t{}\t{:.4}\t{:.4}\t{:.4}\t{}",
            record.total_resources,
            record.total_duration_minutes,
            record.avg_resources_per_session,
            record.avg_duration_per_session,
            record.session_count,
        )?;
    }
    Ok(())
}

/// Writes every report file for `analysis` into `dir`, creating it if needed.
///
/// Returns the paths written.
pub fn write_reports(dir: &Path, analysis: &Analysis) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let mut written = Vec::new();

    let (path, mut w) = create(dir, SESSIONS_FILE)?;
    write_sessions(&mut w, &analysis.sessions)?;
    w.flush()?;
    written.push(path);

    let (path, mut w) = create(dir, UNIQUE_RESOURCES_FILE)?;
    write_pairs(&mut w, analysis.metrics.unique_resources_by_session.iter().map(|(c, n)| (c, *n)))?;
    w.flush()?;
    written.push(path);

    let (path, mut w) = create(dir, CLIENT_DURATION_FILE)?;
    write_pairs(
        &mut w,
        analysis
            .metrics
            .duration_by_client
            .iter()
            .map(|(c, d)| (c, format!("{d:.4}"))),
    )?;
    w.flush()?;
    written.push(path);

    let (path, mut w) = create(dir, ENGAGEMENT_FILE)?;
    write_engagement(&mut w, analysis)?;
    w.flush()?;
    written.push(path);

    if let Some(report) = &analysis.sweep {
        let (path, mut w) = create(dir, WINDOW_STATS_FILE)?;
        serde_json::to_writer_pretty(&mut w, &WindowStats::from(report))?;
        writeln!(w)?;
        w.flush()?;
        written.push(path);
    }

    tracing::debug!(dir = ?dir, files = written.len(), "wrote report files");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wl_core::{AnalysisConfig, ClientId, Event, WindowPolicy, analyze};

    fn event(client: &str, minutes: i64, resource: &str) -> Event {
        let ts = Utc.with_ymd_and_hms(2015, 7, 22, 9, 0, 0).unwrap()
            + chrono::Duration::minutes(minutes);
        Event::new(ClientId::new(client).unwrap(), ts, resource)
    }

    fn sample(policy: WindowPolicy) -> Analysis {
        let config = AnalysisConfig {
            window: policy,
            max_window: 6,
            cohort_count: 2,
        };
        analyze(
            vec![
                event("10.0.0.1", 0, "/a"),
                event("10.0.0.1", 5, "/b"),
                event("10.0.0.1", 25, "/c"),
                event("10.0.0.2", 0, "/a"),
            ],
            &config,
        )
    }

    #[test]
    fn test_write_reports_fixed_window() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("out");
        let written = write_reports(&dir, &sample(WindowPolicy::Fixed(15.0))).unwrap();

        assert_eq!(written.len(), 4);
        assert!(!dir.join(WINDOW_STATS_FILE).exists());

        let sessions = fs::read_to_string(dir.join(SESSIONS_FILE)).unwrap();
        let lines: Vec<serde_json::Value> = sessions
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["client_id"], "10.0.0.1");
        assert_eq!(lines[0]["resources"], serde_json::json!(["/a", "/b"]));
        assert_eq!(lines[0]["gaps"], serde_json::json!([0.0, 5.0]));

        let durations = fs::read_to_string(dir.join(CLIENT_DURATION_FILE)).unwrap();
        assert_eq!(durations, "10.0.0.1\t5.0000\n10.0.0.2\t0.0000\n");

        let uniques = fs::read_to_string(dir.join(UNIQUE_RESOURCES_FILE)).unwrap();
        assert_eq!(uniques, "10.0.0.1\t2\n10.0.0.1\t1\n10.0.0.2\t1\n");

        let engagement = fs::read_to_string(dir.join(ENGAGEMENT_FILE)).unwrap();
        let rows: Vec<_> = engagement.lines().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], "10.0.0.1\t3\t5.0000\t1.5000\t2.5000\t2");
    }

    #[test]
    fn test_window_stats_written_when_discovering() {
        let temp = tempfile::tempdir().unwrap();
        let analysis = sample(WindowPolicy::Discover { fallback: 15.0 });
        write_reports(temp.path(), &analysis).unwrap();

        let stats: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(temp.path().join(WINDOW_STATS_FILE)).unwrap())
                .unwrap();
        assert_eq!(stats["max_window"], 6);
        assert_eq!(stats["series"].as_array().unwrap().len(), SIZE_BUCKETS);
        assert_eq!(stats["series"][5]["unique_resources"], "6+");
        assert_eq!(
            stats["series"][0]["percentages"].as_array().unwrap().len(),
            6
        );
    }
}
