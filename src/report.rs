// src/report.rs
//! Static HTML ranking page: trend chart of the top relays plus a ranking table.

use anyhow::Result;
use chrono::NaiveDate;
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde_json::json;
use std::fmt::Write as _;

use crate::analyze::tally::RelayRank;
use crate::history::CountStore;

const RELAY_LINK_BASE: &str = "https://njump.me/r/";
const ECHARTS_JS: &str = "https://cdn.jsdelivr.net/npm/echarts@5/dist/echarts.min.js";
const LABEL_MAX: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct TrendSeries {
    pub label: String,
    pub points: Vec<Option<u32>>,
}

#[derive(Debug, Clone)]
pub struct ReportPage {
    pub updated_at: String,
    pub min_count: u32,
    pub dates: Vec<NaiveDate>,
    pub series: Vec<TrendSeries>,
    pub ranks: Vec<RelayRank>,
}

pub fn strip_scheme(url: &str) -> &str {
    url.strip_prefix("wss://")
        .or_else(|| url.strip_prefix("ws://"))
        .unwrap_or(url)
}

/// `host (count)`, host cut to 30 chars with `...`.
pub fn series_label(url: &str, count: u32) -> String {
    let short = strip_scheme(url);
    let short = if short.chars().count() > LABEL_MAX {
        let cut: String = short.chars().take(LABEL_MAX - 3).collect();
        format!("{cut}...")
    } else {
        short.to_string()
    };
    format!("{short} ({count})")
}

/// History for the first `top` ranks over `dates`.
pub async fn build_trends(
    store: &dyn CountStore,
    ranks: &[RelayRank],
    dates: &[NaiveDate],
    top: usize,
) -> Result<Vec<TrendSeries>> {
    let mut series = Vec::with_capacity(top.min(ranks.len()));
    for rank in ranks.iter().take(top) {
        let points = store.counts_for(&rank.url, dates).await?;
        series.push(TrendSeries {
            label: series_label(&rank.url, rank.count),
            points,
        });
    }
    Ok(series)
}

fn chart_option(page: &ReportPage) -> serde_json::Value {
    let x: Vec<String> = page.dates.iter().map(|d| d.format("%m/%d").to_string()).collect();
    let series: Vec<_> = page
        .series
        .iter()
        .map(|s| {
            json!({
                "name": s.label,
                "type": "line",
                "smooth": true,
                "showSymbol": false,
                "connectNulls": true,
                "data": s.points,
            })
        })
        .collect();
    json!({
        "title": { "text": format!("Relay users over time (top {})", page.series.len()), "left": "center" },
        "tooltip": { "show": true, "trigger": "axis" },
        "legend": { "show": true, "orient": "horizontal", "bottom": "5%" },
        "grid": { "left": "3%", "right": "4%", "bottom": "35%", "top": "10%", "containLabel": true },
        "xAxis": { "type": "category", "data": x },
        "yAxis": { "type": "value" },
        "series": series,
    })
}

pub fn render_html(page: &ReportPage) -> String {
    // `</` would end the inline script early
    let option = chart_option(page).to_string().replace("</", "<\\/");

    let mut out = String::with_capacity(16 * 1024);
    out.push_str(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Nostr Relay Ranking</title>
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
"#,
    );
    let _ = writeln!(out, r#"  <script src="{ECHARTS_JS}"></script>"#);
    out.push_str(
        r#"  <style>
    body { font-family: sans-serif; margin: 0 auto; max-width: 1280px; padding: 2rem 1rem; }
    table { border-collapse: collapse; width: 100%; }
    th, td { padding: .6rem 1rem; border-bottom: 1px solid #ddd; text-align: left; }
    td.count { text-align: right; font-weight: bold; }
    tr.podium { background: #fffbe6; }
  </style>
</head>
<body>
  <header>
    <h1>Nostr Relay Ranking</h1>
    <p>Relays most listed in kind 10002 relay list metadata, one vote per author.</p>
"#,
    );
    let _ = writeln!(out, "    <p>Updated: {}</p>", encode_text(&page.updated_at));
    out.push_str("  </header>\n  <div id=\"trend\" style=\"width:100%;height:700px\"></div>\n");
    let _ = writeln!(
        out,
        "  <script>echarts.init(document.getElementById('trend')).setOption({option});</script>"
    );

    let _ = writeln!(
        out,
        "  <section>\n    <h2>Current ranking ({}+ users)</h2>",
        page.min_count
    );
    out.push_str(
        "    <table>\n      <thead><tr><th>Rank</th><th>Relay</th><th>Description</th><th>Users</th></tr></thead>\n      <tbody>\n",
    );
    for (i, rank) in page.ranks.iter().enumerate() {
        let medal = match i {
            0 => " 🥇",
            1 => " 🥈",
            2 => " 🥉",
            _ => "",
        };
        let class = if i < 3 { " class=\"podium\"" } else { "" };
        let href = format!("{RELAY_LINK_BASE}{}", strip_scheme(&rank.url));
        let _ = writeln!(
            out,
            "        <tr{class}><td>{}{medal}</td><td><a href=\"{}\">{}</a></td><td>{}</td><td class=\"count\">{}</td></tr>",
            i + 1,
            encode_double_quoted_attribute(&href),
            encode_text(&rank.url),
            encode_text(&rank.description),
            rank.count,
        );
    }
    out.push_str("      </tbody>\n    </table>\n  </section>\n</body>\n</html>\n");
    out
}
