//! Read-only presentation of persisted state.
//!
//! Everything here takes `&PersistedState` and returns plain data or text;
//! nothing feeds back into reconciliation. The HTTP endpoint serves these
//! views as JSON and HTML, the status binary prints the text form.

use chrono::{Local, TimeZone};
use serde::Serialize;

use crate::model::{ChangeEntry, HistoryEntry, PersistedState};
use crate::rain_day::human_time;

// ---------------------------------------------------------------------------
// View model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationView {
    pub id: String,
    pub name: String,
    pub value: Option<f64>,
    pub day: String,
    pub timestamp: i64,
    pub updated: String,
    pub address: Option<String>,
    pub level: Option<String>,
    pub color: Option<String>,
    /// Diff recorded by the most recent cycle, if that cycle changed the value.
    pub last_diff: Option<f64>,
    /// Archived rain days, newest first.
    pub history: Vec<HistoryEntry>,
    /// Change records of the current rain day, newest first.
    pub changes: Vec<ChangeEntry>,
}

/// Formats epoch millis in local time, or an empty string if out of range.
pub fn format_millis(timestamp: i64) -> String {
    Local
        .timestamp_millis_opt(timestamp)
        .single()
        .map(|dt| human_time(&dt))
        .unwrap_or_default()
}

/// Builds the view for one station in `current`.
pub fn station_view(state: &PersistedState, id: &str) -> Option<StationView> {
    let reading = state.current.get(id)?;

    let mut history = state.history.get(id).cloned().unwrap_or_default();
    history.reverse();

    let mut changes = state.changes.get(id).cloned().unwrap_or_default();
    changes.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let last_diff = changes
        .first()
        .filter(|c| c.timestamp == reading.timestamp)
        .map(|c| c.diff);

    Some(StationView {
        id: id.to_string(),
        name: reading.name.clone(),
        value: reading.value,
        day: reading.day.clone(),
        timestamp: reading.timestamp,
        updated: format_millis(reading.timestamp),
        address: reading.address.clone(),
        level: reading.level.clone(),
        color: reading.color.clone(),
        last_diff,
        history,
        changes,
    })
}

/// Views for every current station, ordered by name then id.
pub fn station_views(state: &PersistedState) -> Vec<StationView> {
    let mut views: Vec<StationView> = state
        .current
        .keys()
        .filter_map(|id| station_view(state, id))
        .collect();
    views.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    views
}

/// `"7.3 mm"`, or `"? mm"` for a stored value that is not a number.
pub fn format_depth(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1} mm", v),
        None => "? mm".to_string(),
    }
}

/// `"(▲ +2.3 mm)"`, `"(▼ -1.5 mm)"` or `"(– 0 mm)"`.
pub fn change_label(diff: Option<f64>) -> String {
    match diff {
        Some(d) if d > 0.0 => format!("(▲ +{:.1} mm)", d),
        Some(d) if d < 0.0 => format!("(▼ {:.1} mm)", d),
        _ => "(– 0 mm)".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

pub fn render_text(views: &[StationView]) -> String {
    if views.is_empty() {
        return "No station data yet.\n".to_string();
    }

    let mut out = String::new();
    for view in views {
        out.push_str(&format!(
            "{:<32} {:>10} {}  [{}]\n",
            view.name,
            format_depth(view.value),
            change_label(view.last_diff),
            view.day
        ));
        for entry in &view.history {
            out.push_str(&format!("    {}  {}\n", entry.day, format_depth(entry.value)));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Only `#rgb`/`#rrggbb` colours make it into the style attribute.
fn safe_color(color: Option<&str>) -> &str {
    match color {
        Some(c)
            if c.starts_with('#')
                && matches!(c.len(), 4 | 7)
                && c[1..].chars().all(|ch| ch.is_ascii_hexdigit()) =>
        {
            c
        }
        _ => "#ccc",
    }
}

fn render_history(view: &StationView) -> String {
    if view.history.is_empty() {
        return "<p><em>Chưa có dữ liệu lịch sử.</em></p>".to_string();
    }
    let items: String = view
        .history
        .iter()
        .map(|h| {
            format!(
                "<div class=\"history-item\"><span>{}</span><span>{}</span></div>",
                escape_html(&h.day),
                format_depth(h.value)
            )
        })
        .collect();
    format!("<div class=\"history-list\">{}</div>", items)
}

fn render_changes(view: &StationView) -> String {
    if view.changes.is_empty() {
        return "<p><em>Chưa có thay đổi trong ngày.</em></p>".to_string();
    }
    let items: String = view
        .changes
        .iter()
        .map(|c| {
            format!(
                "<div class=\"change-item\"><span>{}</span><span>{:.1} → {:.1} mm</span><span>{}</span></div>",
                escape_html(&c.time),
                c.old_value,
                c.new_value,
                change_label(Some(c.diff))
            )
        })
        .collect();
    format!("<div class=\"change-list\">{}</div>", items)
}

fn render_station(view: &StationView) -> String {
    let highlight = if view.last_diff.is_some() { " updated" } else { "" };
    format!(
        "<div class=\"station{highlight}\" style=\"--level-color: {color}\">\
         <h3>{name}</h3>\
         <p><strong>Địa chỉ:</strong> {address}</p>\
         <p><strong>Lượng mưa:</strong> {value} {label}</p>\
         <p><strong>Mức độ:</strong> {level}</p>\
         <p><em>Cập nhật lần cuối: {updated}</em></p>\
         <details class=\"history\"><summary>📊 Xem lịch sử</summary>{history}</details>\
         <details class=\"changes\"><summary>🔁 Thay đổi hôm nay</summary>{changes}</details>\
         </div>",
        highlight = highlight,
        color = safe_color(view.color.as_deref()),
        name = escape_html(&view.name),
        address = escape_html(view.address.as_deref().unwrap_or("N/A")),
        value = format_depth(view.value),
        label = change_label(view.last_diff),
        level = escape_html(view.level.as_deref().unwrap_or("Không xác định")),
        updated = escape_html(&view.updated),
        history = render_history(view),
        changes = render_changes(view),
    )
}

const PAGE_STYLE: &str = "body{font-family:sans-serif;max-width:720px;margin:auto}\
.station{border-left:6px solid var(--level-color);padding:4px 12px;margin:12px 0}\
.station.updated{background:#e9f7ef}\
.history-item,.change-item{display:flex;justify-content:space-between}";

/// Full HTML page with one block per station and collapsible history and
/// change panels.
pub fn render_html(views: &[StationView], last_fetch: Option<i64>) -> String {
    let body = if views.is_empty() {
        "<p>Không có dữ liệu trạm mưa.</p>".to_string()
    } else {
        views.iter().map(render_station).collect()
    };
    let fetched = last_fetch
        .map(|ts| format!("<p class=\"meta\">Lần tải gần nhất: {}</p>", escape_html(&format_millis(ts))))
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html><html lang=\"vi\"><head><meta charset=\"utf-8\">\
         <title>Lượng mưa</title><style>{}</style></head>\
         <body><h1>🌧 Lượng mưa theo trạm</h1>{}{}</body></html>",
        PAGE_STYLE, fetched, body
    )
}
