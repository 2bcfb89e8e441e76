//! pt-BR formatting shared by the report and the emails

use chrono::NaiveDate;

/// `R$ 1.234,56`. Non-finite values render as `R$ -`.
pub fn fmt_brl(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return "R$ -".to_string();
    }
    format!("R$ {}", fmt_number(value, decimals))
}

/// `1.234,5` style number with thousands separators
pub fn fmt_number(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::with_capacity(fixed.len() + int_part.len() / 3 + 1);
    if value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push(',');
        out.push_str(frac);
    }
    out
}

/// `12.345`
pub fn fmt_int(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let grouped = group_thousands(&digits);
    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// `12,34%`
pub fn fmt_pct(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    format!("{}%", fmt_number(value, 2))
}

/// `dd/mm/YYYY`
pub fn fmt_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}
