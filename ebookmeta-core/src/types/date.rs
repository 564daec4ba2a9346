//! Date parsing shared by all formats
//!
//! OPF and XMP use ISO 8601 in its many truncated forms, the PDF Info
//! dictionary uses `D:YYYYMMDDHHmmSS+HH'mm'`, and ComicInfo only carries a year.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

fn pdf_date_regex() -> &'static Regex {
    static PDF_DATE: OnceLock<Regex> = OnceLock::new();
    PDF_DATE.get_or_init(|| {
        Regex::new(
            r"^D:(\d{4})(\d{2})?(\d{2})?(\d{2})?(\d{2})?(\d{2})?(?:(Z)|([+-])(\d{2})'?(?:(\d{2})'?)?)?",
        )
        .expect("static regex")
    })
}

/// Parse a PDF date string, keeping its offset
pub fn parse_pdf_date(text: &str) -> Option<DateTime<FixedOffset>> {
    let caps = pdf_date_regex().captures(text.trim())?;
    let field = |i: usize, default: u32| -> Option<u32> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(default),
        }
    };

    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let naive = NaiveDate::from_ymd_opt(year, field(2, 1)?, field(3, 1)?)?.and_hms_opt(
        field(4, 0)?,
        field(5, 0)?,
        field(6, 0)?,
    )?;

    let offset_secs = match caps.get(8) {
        Some(sign) => {
            let hours = field(9, 0)? as i32;
            let minutes = field(10, 0)? as i32;
            let secs = hours * 3600 + minutes * 60;
            if sign.as_str() == "-" {
                -secs
            } else {
                secs
            }
        }
        None => 0,
    };

    FixedOffset::east_opt(offset_secs)?
        .from_local_datetime(&naive)
        .single()
}

/// Format as `D:YYYYMMDDHHmmSS+HH'mm'`
pub fn format_pdf_date(date: &DateTime<FixedOffset>) -> String {
    let offset = date.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let offset = offset.abs();
    format!(
        "D:{}{}{:02}'{:02}'",
        date.format("%Y%m%d%H%M%S"),
        sign,
        offset / 3600,
        (offset % 3600) / 60
    )
}

/// Format for XMP and OPF (`2024-01-15T10:30:00+01:00`)
pub fn format_iso_date(date: &DateTime<FixedOffset>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse any supported date syntax, keeping the offset (UTC when absent)
pub fn parse_date_fixed(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.starts_with("D:") {
        return parse_pdf_date(text);
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date);
    }

    let utc = FixedOffset::east_opt(0)?;
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, pattern) {
            return Some(utc.from_utc_datetime(&naive));
        }
    }

    let date = if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        date
    } else if let Ok(date) = NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d") {
        date
    } else if text.len() == 4 && text.chars().all(|c| c.is_ascii_digit()) {
        NaiveDate::from_ymd_opt(text.parse().ok()?, 1, 1)?
    } else {
        // Date-time with an offset but without seconds, e.g. 2011-05-01T10:00+02:00
        return DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M%:z").ok();
    };
    Some(utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// Parse any supported date syntax into UTC
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    parse_date_fixed(text).map(|d| d.with_timezone(&Utc))
}
