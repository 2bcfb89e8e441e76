//! Unit tests for filtering and ranking

use csv::StringRecord;
use optrix::analysis::{rank_quotes, validate_headers, OptionsAnalyzer};
use optrix::config::FilterSettings;
use optrix::error::{AnalysisError, ErrorKind};
use optrix::models::OptionQuote;

fn quote(symbol: &str, underlying: &str, option_type: &str, qtdneg: i64, voltot: f64) -> OptionQuote {
    OptionQuote {
        symbol: symbol.to_string(),
        underlying: underlying.to_string(),
        option_type: option_type.to_string(),
        qtdneg,
        voltot,
        trade_date: None,
        maturity_date: None,
        strike_price: None,
        quatot: None,
        preult: Some(1.0),
        premed: None,
    }
}

fn symbols(output: &optrix::jobs::types::AnalysisOutput) -> Vec<&str> {
    output.rows.iter().map(|r| r.symbol.as_str()).collect()
}

#[test]
fn test_ranks_by_average_ticket_descending() {
    let quotes = vec![
        quote("A", "PETR4", "CALL", 4, 400_000.0),
        quote("B", "VALE3", "PUT", 2, 500_000.0),
        quote("C", "PETR4", "CALL", 1, 150_000.0),
    ];
    let output = rank_quotes(quotes, &FilterSettings::default());

    assert_eq!(symbols(&output), vec!["B", "C", "A"]);
    assert_eq!(output.rows[0].avg_ticket, 250_000.0);
    assert_eq!(output.stats.total_options, 3);
    assert_eq!(output.stats.total_volume, 1_050_000.0);
    assert_eq!(output.stats.after_filters, 3);
    assert_eq!(output.stats.call_count, 2);
    assert_eq!(output.stats.put_count, 1);
}

#[test]
fn test_filters_on_operations_and_volume() {
    let quotes = vec![
        quote("MANY", "PETR4", "CALL", 6, 900_000.0),
        quote("SMALL", "PETR4", "CALL", 1, 99_999.0),
        quote("EDGE", "PETR4", "CALL", 5, 100_000.0),
    ];
    let output = rank_quotes(quotes, &FilterSettings::default());

    assert_eq!(symbols(&output), vec!["EDGE"]);
}

#[test]
fn test_rows_without_trades_are_dropped() {
    let quotes = vec![
        quote("ZERO", "PETR4", "CALL", 0, 500_000.0),
        quote("NEG", "PETR4", "CALL", -1, 500_000.0),
        quote("OK", "PETR4", "CALL", 2, 500_000.0),
    ];
    let output = rank_quotes(quotes, &FilterSettings::default());

    assert_eq!(symbols(&output), vec!["OK"]);
    assert_eq!(output.stats.total_options, 3);
}

#[test]
fn test_non_finite_volume_is_ignored() {
    let quotes = vec![
        quote("NAN", "PETR4", "CALL", 2, f64::NAN),
        quote("OK", "PETR4", "CALL", 2, 500_000.0),
    ];
    let output = rank_quotes(quotes, &FilterSettings::default());

    assert_eq!(symbols(&output), vec!["OK"]);
    assert_eq!(output.stats.total_volume, 500_000.0);
}

#[test]
fn test_ties_keep_dataset_order() {
    let quotes = vec![
        quote("FIRST", "PETR4", "CALL", 2, 200_000.0),
        quote("SECOND", "VALE3", "CALL", 1, 100_000.0),
        quote("THIRD", "ITUB4", "CALL", 4, 400_000.0),
    ];
    let output = rank_quotes(quotes, &FilterSettings::default());

    assert_eq!(symbols(&output), vec!["FIRST", "SECOND", "THIRD"]);
}

#[test]
fn test_top_n_truncates() {
    let quotes = (1..=30)
        .map(|i| quote(&format!("S{}", i), "PETR4", "CALL", 1, 100_000.0 + i as f64))
        .collect();
    let filters = FilterSettings {
        top_n: 5,
        ..FilterSettings::default()
    };
    let output = rank_quotes(quotes, &filters);

    assert_eq!(output.rows.len(), 5);
    assert_eq!(output.rows[0].symbol, "S30");
    assert_eq!(output.stats.after_filters, 30);
}

#[test]
fn test_nothing_passing_filters_is_empty_not_an_error() {
    let quotes = vec![quote("SMALL", "PETR4", "CALL", 1, 10.0)];
    let output = rank_quotes(quotes, &FilterSettings::default());

    assert!(output.is_empty());
    assert_eq!(output.stats.total_options, 1);
    assert_eq!(output.stats.after_filters, 0);
}

#[test]
fn test_empty_dataset() {
    let output = rank_quotes(Vec::new(), &FilterSettings::default());
    assert!(output.is_empty());
    assert_eq!(output.stats.total_volume, 0.0);
}

#[test]
fn test_top_underlyings_break_ties_by_first_appearance() {
    let quotes = vec![
        quote("A", "VALE3", "CALL", 1, 900_000.0),
        quote("B", "PETR4", "CALL", 1, 800_000.0),
        quote("C", "PETR4", "CALL", 1, 700_000.0),
        quote("D", "ITUB4", "CALL", 1, 600_000.0),
        quote("E", "BBAS3", "CALL", 1, 500_000.0),
    ];
    let output = rank_quotes(quotes, &FilterSettings::default());

    let top: Vec<(&str, usize)> = output
        .stats
        .top_underlyings
        .iter()
        .map(|(name, count)| (name.as_str(), *count))
        .collect();
    assert_eq!(top, vec![("PETR4", 2), ("VALE3", 1), ("ITUB4", 1)]);
}

#[test]
fn test_missing_average_price_falls_back_to_last_price() {
    let output = rank_quotes(
        vec![quote("A", "PETR4", "CALL", 1, 200_000.0)],
        &FilterSettings::default(),
    );
    assert_eq!(output.rows[0].premed, Some(1.0));
}

#[test]
fn test_validate_headers_accepts_required_columns_in_any_order() {
    let headers = StringRecord::from(vec!["voltot", "qtdneg", "option_type", "underlying", "symbol"]);
    assert!(validate_headers(&headers).is_ok());
}

#[test]
fn test_validate_headers_lists_missing_columns() {
    let headers = StringRecord::from(vec!["symbol", "underlying", "option_type"]);
    let err = validate_headers(&headers).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaInvalid);
    let message = err.to_string();
    assert!(message.contains("qtdneg"));
    assert!(message.contains("voltot"));
    assert!(message.contains("symbol"));
}

#[test]
fn test_analyze_file_reads_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cotahist_2024-01-10.csv");
    std::fs::write(
        &path,
        "symbol, underlying, option_type, qtdneg, voltot, maturity_date, premed\n\
         PETRK250, PETR4, CALL, 3, 500000.0, 2024-11-18, 1.5\n\
         VALEF240, VALE3, PUT, 2, 450000.0, , \n\
         RADLM240, RADL3, CALL, 9, 900000.0, 2024-01-15, 0.3\n",
    )
    .unwrap();

    let output = OptionsAnalyzer::new()
        .analyze_file(&path, &FilterSettings::default())
        .unwrap();

    assert_eq!(symbols(&output), vec!["VALEF240", "PETRK250"]);
    assert_eq!(output.rows[0].maturity_date, None);
    assert_eq!(output.rows[1].premed, Some(1.5));
    assert_eq!(output.stats.total_options, 3);
}

#[test]
fn test_analyze_file_rejects_bad_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    std::fs::write(&path, "ticker,volume\nPETR4,1\n").unwrap();

    let err = OptionsAnalyzer::new()
        .analyze_file(&path, &FilterSettings::default())
        .unwrap_err();
    assert!(matches!(err, AnalysisError::SchemaInvalid(_)));
}

#[test]
fn test_analyze_file_missing_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let err = OptionsAnalyzer::new()
        .analyze_file(&dir.path().join("missing.csv"), &FilterSettings::default())
        .unwrap_err();
    assert!(matches!(err, AnalysisError::NotFound { .. }));
}
