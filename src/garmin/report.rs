//! Fixed-layout text report and the indented JSON dump.
//!
//! Sections whose data is missing are left out entirely; the activity
//! summary is always shown. Fields that are present but null print as
//! `None`.

use std::fmt::Write;
use std::io;

use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};

use super::summary::{Activity, SyncReport};

const RULE_WIDTH: usize = 60;
const TYPE_WIDTH: usize = 12;

fn hours(seconds: Option<i64>) -> f64 {
    seconds.unwrap_or(0) as f64 / 3600.0
}

const NULL: &str = "None";

fn or_null(value: Option<i64>) -> String {
    value.map_or_else(|| NULL.to_string(), |v| v.to_string())
}

/// One activity as a ` | `-joined line, skipping empty parts.
pub fn activity_line(act: &Activity) -> String {
    let type_col: String = act.activity_type.chars().take(TYPE_WIDTH).collect();
    let type_col = format!("{type_col:<TYPE_WIDTH$}");
    let dist = if act.distance_mi > 0.0 {
        format!("{:?}mi", act.distance_mi)
    } else {
        String::new()
    };
    let duration = format!("{:.0}min", act.duration_min);
    let hr = match act.avg_hr {
        Some(avg) => format!("HR:{avg}/{}", or_null(act.max_hr)),
        None => String::new(),
    };
    let pace = act.pace.clone().unwrap_or_default();

    [act.date.clone(), type_col, dist, duration, pace, hr]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn render_text(report: &SyncReport) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = render_into(&mut out, report, &rule);
    out
}

fn render_into(out: &mut String, report: &SyncReport, rule: &str) -> std::fmt::Result {
    let user = report.user.as_deref().unwrap_or(NULL);
    writeln!(out, "{rule}")?;
    writeln!(out, "GARMIN DATA: {user} (Last {} days)", report.period_days)?;
    writeln!(out, "{rule}")?;

    if let Some(sleep) = &report.sleep {
        writeln!(out, "\nSLEEP (last night):")?;
        writeln!(out, "  Total: {:.1} hrs", hours(sleep.sleep_time_seconds))?;
        writeln!(
            out,
            "  Deep: {:.1} hrs | REM: {:.1} hrs | Light: {:.1} hrs",
            hours(sleep.deep_sleep_seconds),
            hours(sleep.rem_sleep_seconds),
            hours(sleep.light_sleep_seconds)
        )?;
    }

    let recovery = &report.recovery;
    if recovery.score.is_some() || report.resting_hr.is_some() {
        writeln!(out, "\nRECOVERY:")?;
        if let Some(score) = recovery.score {
            let level = recovery.level.as_deref().unwrap_or(NULL);
            writeln!(out, "  Training Readiness: {score}/100 ({level})")?;
        }
        if let Some(bb) = recovery.body_battery {
            writeln!(out, "  Body Battery: {bb}/100")?;
        }
        if let Some(hr) = report.resting_hr {
            writeln!(out, "  Resting HR: {hr} bpm")?;
        }
        if let Some(score) = recovery.sleep_score {
            writeln!(out, "  Sleep Score: {score}/100")?;
        }
    }

    if let Some(hrv) = &report.hrv {
        writeln!(out, "\nHRV STATUS:")?;
        writeln!(out, "  Weekly Average: {} ms", or_null(hrv.weekly_avg))?;
        writeln!(out, "  Last Night: {} ms", or_null(hrv.last_night_avg))?;
        writeln!(out, "  Status: {}", hrv.status)?;
        if let Some(baseline) = &hrv.baseline {
            if let (Some(low), Some(upper)) = (baseline.balanced_low, baseline.balanced_upper) {
                writeln!(out, "  Baseline Range: {low}-{upper} ms")?;
            }
        }
    }

    let stats = &report.stats;
    writeln!(out, "\nACTIVITY SUMMARY:")?;
    writeln!(
        out,
        "  Running: {} miles in {:.0} min",
        stats.running_miles,
        stats.running_time_min.value()
    )?;
    writeln!(out, "  Strength: {} sessions", stats.strength_sessions)?;
    writeln!(out, "  Yoga: {} sessions", stats.yoga_sessions)?;
    writeln!(
        out,
        "  Total: {} activities, {:.0} min, {} cal",
        stats.total_activities,
        stats.total_duration_min.value(),
        stats.total_calories
    )?;

    if !report.activities.is_empty() {
        writeln!(out, "\nACTIVITIES:")?;
        for act in &report.activities {
            writeln!(out, "  {}", activity_line(act))?;
        }
    }

    writeln!(out, "{rule}")
}

/// Pretty formatter that escapes everything outside ASCII as `\uXXXX`
/// (UTF-16 units, so astral characters become surrogate pairs).
struct AsciiFormatter<'a>(PrettyFormatter<'a>);

impl Formatter for AsciiFormatter<'_> {
    fn begin_array<W: ?Sized + io::Write>(&mut self, w: &mut W) -> io::Result<()> {
        self.0.begin_array(w)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, w: &mut W) -> io::Result<()> {
        self.0.end_array(w)
    }

    fn begin_array_value<W: ?Sized + io::Write>(&mut self, w: &mut W, first: bool) -> io::Result<()> {
        self.0.begin_array_value(w, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, w: &mut W) -> io::Result<()> {
        self.0.end_array_value(w)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, w: &mut W) -> io::Result<()> {
        self.0.begin_object(w)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, w: &mut W) -> io::Result<()> {
        self.0.end_object(w)
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, w: &mut W, first: bool) -> io::Result<()> {
        self.0.begin_object_key(w, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, w: &mut W) -> io::Result<()> {
        self.0.begin_object_value(w)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, w: &mut W) -> io::Result<()> {
        self.0.end_object_value(w)
    }

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, w: &mut W, fragment: &str) -> io::Result<()> {
        for ch in fragment.chars() {
            if matches!(ch, ' '..='~') {
                w.write_all(&[ch as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(w, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

/// The report as two-space indented JSON with ASCII-only output.
pub fn render_json(report: &SyncReport) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = AsciiFormatter(PrettyFormatter::with_indent(b"  "));
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    report.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(|e| serde_json::Error::io(io::Error::new(io::ErrorKind::InvalidData, e)))
}
