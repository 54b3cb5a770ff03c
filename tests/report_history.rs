// tests/report_history.rs
//
// Persist a run, read it back as trends, render the page.

use chrono::NaiveDate;
use relay_ranking::analyze::tally::ranked;
use relay_ranking::history::{trend_dates, CountStore, JsonFileStore};
use relay_ranking::report::{build_trends, render_html, ReportPage};
use relay_ranking::RelayCounts;

fn counts(pairs: &[(&str, u32)]) -> RelayCounts {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[tokio::test]
async fn trends_follow_stored_days() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(tmp.path().join("relay_stats.json"));
    let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();

    store
        .replace_day(today.pred_opt().unwrap(), &counts(&[("wss://a", 25)]))
        .await
        .unwrap();
    let current = counts(&[("wss://a", 30), ("wss://b", 21), ("wss://c", 2)]);
    store.replace_day(today, &current).await.unwrap();

    let ranks = ranked(&current, 20);
    assert_eq!(ranks.len(), 2);

    let dates = trend_dates(today, 3);
    let series = build_trends(&store, &ranks, &dates, 30).await.unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].label, "a (30)");
    assert_eq!(series[0].points, vec![None, Some(25), Some(30)]);
    assert_eq!(series[1].points, vec![None, None, Some(21)]);

    // top limits the number of lines, not the table
    let top_one = build_trends(&store, &ranks, &dates, 1).await.unwrap();
    assert_eq!(top_one.len(), 1);

    let html = render_html(&ReportPage {
        updated_at: "2024-05-10 09:00".into(),
        min_count: 20,
        dates,
        series,
        ranks,
    });
    assert!(html.contains("wss://a"));
    assert!(html.contains("wss://b"));
    assert!(!html.contains("wss://c"));
    assert!(html.contains("[null,25,30]"));
}
