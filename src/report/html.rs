//! Self-contained HTML report

use crate::error::{PhaseError, RenderError};
use crate::jobs::types::RenderedReport;
use crate::models::{AnalysisStats, RankedOption};
use crate::report::format::{escape_html, fmt_brl, fmt_date, fmt_int, fmt_pct};
use crate::report::ReportRenderer;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

const STYLE: &str = "body{font-family:Arial,sans-serif;color:#333;margin:32px;}\
h1{color:#1f77b4;}h2{color:#1f77b4;margin-top:32px;}\
table{border-collapse:collapse;width:100%;margin:16px 0;}\
th{background:#1f77b4;color:#fff;padding:8px;text-align:left;border:1px solid #ddd;}\
td{padding:6px 8px;border:1px solid #ddd;}td.num{text-align:right;}\
tr:nth-child(even){background:#f7f7f7;}\
.summary{background:#f0f0f0;padding:16px;border-radius:5px;}\
.empty{background:#fff3cd;padding:16px;border-left:4px solid #f0ad4e;}\
.footer{font-size:11px;color:#888;margin-top:40px;border-top:1px solid #ccc;padding-top:12px;}";

pub struct HtmlReportRenderer {
    reports_dir: PathBuf,
    title: String,
}

impl HtmlReportRenderer {
    pub fn new(reports_dir: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            title: title.into(),
        }
    }

    pub fn report_path(&self, date: NaiveDate) -> PathBuf {
        self.reports_dir
            .join(format!("report_{}.html", date.format("%Y-%m-%d")))
    }

    /// Full document for the given rows
    pub fn render_html(&self, rows: &[RankedOption], date: NaiveDate, stats: &AnalysisStats) -> String {
        let mut html = String::with_capacity(8 * 1024);
        let title = escape_html(&self.title);

        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html lang=\"pt-BR\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{title} - {date}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
             <h1>{title}</h1>\n<p><strong>Pregão:</strong> {date}</p>\n",
            title = title,
            date = fmt_date(date),
            STYLE = STYLE,
        );

        html.push_str("<div class=\"summary\">\n");
        let _ = writeln!(html, "<p><strong>Opções analisadas:</strong> {}</p>", fmt_int(stats.total_options as i64));
        let _ = writeln!(html, "<p><strong>Operações após filtros:</strong> {}</p>", fmt_int(stats.after_filters as i64));
        let _ = writeln!(html, "<p><strong>Volume total do dia:</strong> {}</p>", fmt_brl(stats.total_volume, 0));
        if !rows.is_empty() {
            let _ = writeln!(
                html,
                "<p><strong>Volume top {}:</strong> {} ({} do total)</p>",
                rows.len(),
                fmt_brl(stats.top_n_volume, 0),
                fmt_pct(stats.top_n_pct)
            );
        }
        html.push_str("</div>\n");

        if rows.is_empty() {
            html.push_str(
                "<div class=\"empty\"><p><strong>Nenhuma operação atendeu aos filtros neste pregão.</strong></p></div>\n",
            );
        } else {
            write_ranking(&mut html, rows);
            write_distribution(&mut html, rows.len(), stats);
        }

        let _ = write!(
            html,
            "<div class=\"footer\"><p><strong>Fonte:</strong> B3 (COTAHIST)</p>\
             <p><strong>Gerado em:</strong> {}</p></div>\n</body>\n</html>\n",
            Local::now().format("%d/%m/%Y %H:%M:%S")
        );

        html
    }
}

fn write_ranking(html: &mut String, rows: &[RankedOption]) {
    let _ = writeln!(html, "<h2>Top {} maiores tickets médios</h2>", rows.len());
    html.push_str(
        "<table>\n<thead><tr><th>#</th><th>Opção</th><th>Ativo</th><th>Tipo</th><th>Vencimento</th>\
         <th>Strike</th><th>Preço médio</th><th>Volume total</th><th>Nº ops</th><th>Qtde</th>\
         <th>Ticket médio</th><th>% do dia</th></tr></thead>\n<tbody>\n",
    );
    for (idx, row) in rows.iter().enumerate() {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td>\
             <td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\"><strong>{}</strong></td>\
             <td class=\"num\">{}</td></tr>",
            idx + 1,
            escape_html(&row.symbol),
            escape_html(&row.underlying),
            escape_html(&row.option_type),
            row.maturity_date.map(fmt_date).unwrap_or_else(|| "-".to_string()),
            row.strike_price.map(|v| fmt_brl(v, 2)).unwrap_or_else(|| "-".to_string()),
            row.premed.map(|v| fmt_brl(v, 2)).unwrap_or_else(|| "-".to_string()),
            fmt_brl(row.voltot, 0),
            fmt_int(row.qtdneg),
            row.quatot.map(fmt_int).unwrap_or_else(|| "-".to_string()),
            fmt_brl(row.avg_ticket, 0),
            fmt_pct(row.day_share_pct),
        );
    }
    html.push_str("</tbody>\n</table>\n");
}

fn write_distribution(html: &mut String, selected: usize, stats: &AnalysisStats) {
    let share = |count: usize| fmt_pct(count as f64 / selected as f64 * 100.0);

    html.push_str("<h2>Distribuição</h2>\n<table>\n<thead><tr><th>Tipo</th><th>Operações</th><th>%</th></tr></thead>\n<tbody>\n");
    let _ = writeln!(html, "<tr><td>CALL</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>", stats.call_count, share(stats.call_count));
    let _ = writeln!(html, "<tr><td>PUT</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>", stats.put_count, share(stats.put_count));
    html.push_str("</tbody>\n</table>\n");

    if !stats.top_underlyings.is_empty() {
        html.push_str("<h2>Principais ativos-objeto</h2>\n<ul>\n");
        for (underlying, count) in &stats.top_underlyings {
            let _ = writeln!(html, "<li>{}: {} operações</li>", escape_html(underlying), count);
        }
        html.push_str("</ul>\n");
    }
}

async fn write_report(path: &Path, content: &str) -> Result<u64, RenderError> {
    let io_err = |source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, content).await.map_err(io_err)?;
    let meta = tokio::fs::metadata(path).await.map_err(io_err)?;
    Ok(meta.len())
}

#[async_trait]
impl ReportRenderer for HtmlReportRenderer {
    async fn render(
        &self,
        rows: &[RankedOption],
        date: NaiveDate,
        stats: &AnalysisStats,
    ) -> Result<RenderedReport, PhaseError> {
        let path = self.report_path(date);
        let html = self.render_html(rows, date, stats);
        let bytes = write_report(&path, &html).await?;

        info!(
            path = %path.display(),
            bytes,
            "Report written: {} ({:.1} KB)",
            path.display(),
            bytes as f64 / 1024.0
        );
        Ok(RenderedReport { path, bytes })
    }
}
