//! Unit tests for the HTML report

use chrono::NaiveDate;
use optrix::models::{AnalysisStats, RankedOption};
use optrix::report::{HtmlReportRenderer, ReportRenderer};

fn row(symbol: &str, option_type: &str, avg_ticket: f64) -> RankedOption {
    RankedOption {
        symbol: symbol.to_string(),
        underlying: "VALE3".to_string(),
        option_type: option_type.to_string(),
        maturity_date: None,
        strike_price: None,
        premed: None,
        preult: None,
        voltot: avg_ticket,
        qtdneg: 1,
        quatot: None,
        avg_ticket,
        day_share_pct: 2.5,
    }
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
}

#[test]
fn test_report_path_is_keyed_by_date() {
    let renderer = HtmlReportRenderer::new("output/reports", "Relatório");
    assert_eq!(
        renderer.report_path(date()),
        std::path::Path::new("output/reports/report_2024-01-10.html")
    );
}

#[test]
fn test_render_html_lists_rows_in_rank_order() {
    let renderer = HtmlReportRenderer::new("unused", "Relatório Diário");
    let rows = vec![row("FIRST", "CALL", 300_000.0), row("SECOND", "PUT", 200_000.0)];
    let stats = AnalysisStats {
        total_options: 10,
        after_filters: 2,
        call_count: 1,
        put_count: 1,
        top_underlyings: vec![("VALE3".to_string(), 2)],
        ..AnalysisStats::default()
    };

    let html = renderer.render_html(&rows, date(), &stats);

    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("Relatório Diário"));
    assert!(html.contains("10/01/2024"));
    let first = html.find("FIRST").unwrap();
    let second = html.find("SECOND").unwrap();
    assert!(first < second);
    assert!(html.contains("R$ 300.000"));
    assert!(html.contains("VALE3: 2 operações"));
    assert!(!html.contains("Nenhuma operação"));
}

#[test]
fn test_render_html_escapes_symbols() {
    let renderer = HtmlReportRenderer::new("unused", "<Title>");
    let html = renderer.render_html(&[row("<X>", "CALL", 150_000.0)], date(), &AnalysisStats::default());
    assert!(html.contains("&lt;X&gt;"));
    assert!(html.contains("&lt;Title&gt;"));
    assert!(!html.contains("<X>"));
}

#[test]
fn test_render_html_without_rows_shows_notice() {
    let renderer = HtmlReportRenderer::new("unused", "Relatório");
    let html = renderer.render_html(&[], date(), &AnalysisStats::default());
    assert!(html.contains("Nenhuma operação atendeu aos filtros neste pregão."));
    assert!(!html.contains("<tbody>"));
}

#[tokio::test]
async fn test_render_writes_file_and_reports_size() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = HtmlReportRenderer::new(dir.path().join("reports"), "Relatório");

    let report = renderer
        .render(&[row("FIRST", "CALL", 300_000.0)], date(), &AnalysisStats::default())
        .await
        .unwrap();

    assert_eq!(report.path, dir.path().join("reports/report_2024-01-10.html"));
    assert_eq!(report.bytes, std::fs::metadata(&report.path).unwrap().len());
    assert!(report.bytes > 512);
}
