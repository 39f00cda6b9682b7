//! SVG bar chart of the current statistics.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use rocket::tokio::fs;

use crate::model::statistics::{CandidateStatistics, Statistics};

const BAR_WIDTH: usize = 60;
const BAR_GAP: usize = 30;
const PLOT_HEIGHT: usize = 300;
const MARGIN: usize = 50;

/// Distinguishes the temporary files of concurrent writers.
static NEXT_TEMP: AtomicU64 = AtomicU64::new(0);

/// Render a bar chart with one bar per candidate, labelled with their votes
/// and percentage.
pub fn render_svg(statistics: &Statistics) -> String {
    let bars = &statistics.statistics;
    let width = MARGIN * 2 + bars.len().max(1) * (BAR_WIDTH + BAR_GAP);
    let height = PLOT_HEIGHT + MARGIN * 3;
    let max_votes = bars.iter().map(|s| s.votes).max().unwrap_or(0).max(1);

    let mut svg = String::new();
    // Writing to a `String` cannot fail.
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    let _ = writeln!(
        svg,
        r#"  <text x="{}" y="{}" text-anchor="middle" font-size="18">Vote Distribution ({} votes)</text>"#,
        width / 2,
        MARGIN / 2 + 6,
        statistics.total_votes
    );
    let baseline = MARGIN + PLOT_HEIGHT;
    let _ = writeln!(
        svg,
        r#"  <line x1="{MARGIN}" y1="{baseline}" x2="{}" y2="{baseline}" stroke="black"/>"#,
        width - MARGIN
    );
    for (i, bar) in bars.iter().enumerate() {
        render_bar(&mut svg, i, bar, max_votes, baseline);
    }
    svg.push_str("</svg>\n");
    svg
}

fn render_bar(svg: &mut String, index: usize, bar: &CandidateStatistics, max_votes: u32, baseline: usize) {
    let x = MARGIN + BAR_GAP / 2 + index * (BAR_WIDTH + BAR_GAP);
    let bar_height = bar.votes as usize * PLOT_HEIGHT / max_votes as usize;
    let y = baseline - bar_height;
    let centre = x + BAR_WIDTH / 2;
    let _ = writeln!(
        svg,
        r#"  <rect x="{x}" y="{y}" width="{BAR_WIDTH}" height="{bar_height}" fill="steelblue"/>"#
    );
    let _ = writeln!(
        svg,
        r#"  <text x="{centre}" y="{}" text-anchor="middle" font-size="12">{} ({:.2}%)</text>"#,
        y.saturating_sub(6),
        bar.votes,
        bar.percentage
    );
    let _ = writeln!(
        svg,
        r#"  <text x="{centre}" y="{}" text-anchor="middle" font-size="12">{}</text>"#,
        baseline + 18,
        escape_xml(&bar.candidate_name)
    );
}

/// Escape text for inclusion in XML character data or attributes.
fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// A fresh sibling of `path` to write into before renaming over `path`.
fn temp_path(path: &Path) -> PathBuf {
    let n = NEXT_TEMP.fetch_add(1, Ordering::Relaxed);
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.{n}.tmp", std::process::id()));
    path.with_file_name(name)
}

/// Render the chart to `path`, creating parent directories as needed.
///
/// The chart is written to a temporary file and renamed into place, so
/// readers only ever see a complete chart.
///
/// Returns `false` without touching the filesystem if there are no
/// candidates to chart.
pub async fn write_chart(statistics: &Statistics, path: &Path) -> std::io::Result<bool> {
    if statistics.statistics.is_empty() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let temp = temp_path(path);
    let written = match fs::write(&temp, render_svg(statistics)).await {
        Ok(()) => fs::rename(&temp, path).await,
        Err(e) => Err(e),
    };
    if written.is_err() {
        let _ = fs::remove_file(&temp).await;
    }
    written.map(|()| true)
}
