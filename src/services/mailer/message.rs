//! Email subjects and bodies (pt-BR)

use crate::models::{AnalysisStats, RankedOption};
use crate::report::format::{escape_html, fmt_brl, fmt_date, fmt_int, fmt_pct};
use chrono::{DateTime, Local, NaiveDate};
use std::fmt::Write as _;

/// Rows shown in the email body; the full ranking is in the attachment
pub const EMAIL_TOP_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Transport-neutral email
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub attachment: Option<EmailAttachment>,
}

/// Fill `{trade_date}` (or `{trade_date_pt}`) with the date as dd/mm/YYYY
pub fn render_subject(template: &str, date: NaiveDate) -> String {
    let formatted = fmt_date(date);
    template
        .replace("{trade_date_pt}", &formatted)
        .replace("{trade_date}", &formatted)
}

pub fn failure_subject(now: DateTime<Local>) -> String {
    format!("ERRO - Relatório B3 Opções - {}", now.format("%d/%m/%Y"))
}

/// HTML body of the daily report email
pub fn report_body(
    date: NaiveDate,
    rows: &[RankedOption],
    stats: &AnalysisStats,
    generated_at: DateTime<Local>,
) -> String {
    let mut html = String::with_capacity(4 * 1024);
    html.push_str(
        "<html><body style=\"font-family: Arial, sans-serif; color: #333;\">\n\
         <h2 style=\"color: #1f77b4;\">Relatório Diário - Grandes Operações de Opções B3</h2>\n\
         <div style=\"background-color: #f0f0f0; padding: 15px; border-radius: 5px;\">\n",
    );
    let _ = writeln!(html, "<p><strong>Pregão:</strong> {}</p>", fmt_date(date));
    let _ = writeln!(
        html,
        "<p><strong>Total de opções analisadas:</strong> {}</p>",
        fmt_int(stats.total_options as i64)
    );
    let _ = writeln!(
        html,
        "<p><strong>Operações após filtros:</strong> {}</p>",
        fmt_int(stats.after_filters as i64)
    );
    let _ = writeln!(
        html,
        "<p><strong>Volume total do dia:</strong> {}</p>",
        fmt_brl(stats.total_volume, 0)
    );

    if rows.is_empty() {
        html.push_str("</div>\n");
        html.push_str(
            "<p style=\"margin-top: 20px;\"><strong>Nenhuma operação atendeu aos filtros configurados \
             neste pregão.</strong> O relatório anexo contém apenas o resumo do dia.</p>\n",
        );
    } else {
        let _ = writeln!(
            html,
            "<p><strong>Volume top {}:</strong> {} ({} do total)</p>\n</div>",
            rows.len(),
            fmt_brl(stats.top_n_volume, 0),
            fmt_pct(stats.top_n_pct)
        );
        write_top_table(&mut html, rows);
        html.push_str(
            "<p style=\"margin-top: 30px;\"><strong>O relatório completo está anexo.</strong></p>\n",
        );
    }

    let _ = write!(
        html,
        "<div style=\"font-size: 11px; color: #888; margin-top: 40px; border-top: 1px solid #ccc;\">\n\
         <p><strong>Fonte:</strong> B3 (COTAHIST)</p>\n\
         <p><strong>Data/Hora:</strong> {}</p>\n</div>\n</body></html>\n",
        generated_at.format("%d/%m/%Y %H:%M:%S")
    );
    html
}

fn write_top_table(html: &mut String, rows: &[RankedOption]) {
    let top = &rows[..rows.len().min(EMAIL_TOP_ROWS)];
    let cell = "padding: 8px; border: 1px solid #ddd;";

    let _ = writeln!(
        html,
        "<h3 style=\"color: #1f77b4;\">Top {} maiores tickets médios:</h3>",
        top.len()
    );
    html.push_str(
        "<table style=\"border-collapse: collapse; width: 100%;\">\n<thead><tr>\
         <th>Opção</th><th>Ativo</th><th>Tipo</th><th>Vencimento</th><th>Strike</th>\
         <th>Volume total</th><th>Nº ops</th><th>Qtde</th><th>Ticket médio</th>\
         </tr></thead>\n<tbody>\n",
    );
    for row in top {
        let _ = writeln!(
            html,
            "<tr><td style=\"{c}\">{}</td><td style=\"{c}\">{}</td><td style=\"{c}\">{}</td>\
             <td style=\"{c}\">{}</td><td style=\"{c} text-align: right;\">{}</td>\
             <td style=\"{c} text-align: right;\">{}</td><td style=\"{c} text-align: center;\">{}</td>\
             <td style=\"{c} text-align: center;\">{}</td>\
             <td style=\"{c} text-align: right;\"><strong>{}</strong></td></tr>",
            escape_html(&row.symbol),
            escape_html(&row.underlying),
            escape_html(&row.option_type),
            row.maturity_date.map(fmt_date).unwrap_or_else(|| "-".to_string()),
            row.strike_price.map(|v| fmt_brl(v, 2)).unwrap_or_else(|| "-".to_string()),
            fmt_brl(row.voltot, 0),
            fmt_int(row.qtdneg),
            row.quatot.map(fmt_int).unwrap_or_else(|| "-".to_string()),
            fmt_brl(row.avg_ticket, 0),
            c = cell,
        );
    }
    html.push_str("</tbody>\n</table>\n");
}

/// HTML body of the failure alert, with remediation steps
pub fn failure_body(error_message: &str, now: DateTime<Local>, log_file: &str) -> String {
    format!(
        "<html><body style=\"font-family: Arial, sans-serif; color: #333;\">\n\
         <h2 style=\"color: #d9534f;\">Falha na execução do relatório</h2>\n\
         <p><strong>Data/Hora:</strong> {now}</p>\n\
         <h3>Erro:</h3>\n\
         <pre style=\"background-color: #f0f0f0; padding: 15px; border-left: 4px solid #d9534f;\">{error}</pre>\n\
         <h3>Próximos passos:</h3>\n<ol>\n\
         <li>Verifique os logs em <code>{log}</code> para detalhes completos</li>\n\
         <li>Verifique a conectividade e a disponibilidade dos dados da B3</li>\n\
         <li>Confirme que o comando de download está instalado e acessível</li>\n\
         <li>Se o erro persistir, execute manualmente:\
         <pre>daily-report --date=YYYY-MM-DD</pre></li>\n\
         </ol>\n\
         <p style=\"font-size: 11px; color: #888;\">Este é um e-mail automático de alerta.</p>\n\
         </body></html>\n",
        now = now.format("%d/%m/%Y %H:%M:%S"),
        error = escape_html(error_message),
        log = escape_html(log_file),
    )
}
