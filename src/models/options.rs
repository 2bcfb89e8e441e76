use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the daily options dataset, keyed by the B3 column names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    pub symbol: String,
    pub underlying: String,
    pub option_type: String,
    /// Number of trades in the session
    pub qtdneg: i64,
    /// Financial volume in BRL
    pub voltot: f64,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub trade_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub maturity_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub strike_price: Option<f64>,
    /// Contracts traded
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub quatot: Option<i64>,
    /// Last price
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub preult: Option<f64>,
    /// Average price
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub premed: Option<f64>,
}

/// A row that passed the filters, with derived metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedOption {
    pub symbol: String,
    pub underlying: String,
    pub option_type: String,
    pub maturity_date: Option<NaiveDate>,
    pub strike_price: Option<f64>,
    pub premed: Option<f64>,
    pub preult: Option<f64>,
    pub voltot: f64,
    pub qtdneg: i64,
    pub quatot: Option<i64>,
    /// `voltot / qtdneg`
    pub avg_ticket: f64,
    /// Share of the whole session's volume, in percent
    pub day_share_pct: f64,
}

impl RankedOption {
    pub fn is_call(&self) -> bool {
        self.option_type.eq_ignore_ascii_case("CALL")
    }

    pub fn is_put(&self) -> bool {
        self.option_type.eq_ignore_ascii_case("PUT")
    }
}

/// Summary of one analysis pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Rows in the dataset before any cleaning
    pub total_options: usize,
    /// Sum of `voltot` over the whole dataset
    pub total_volume: f64,
    pub after_filters: usize,
    pub top_n_volume: f64,
    pub top_n_pct: f64,
    pub call_count: usize,
    pub put_count: usize,
    /// Most frequent underlyings among the selected rows, at most three
    pub top_underlyings: Vec<(String, usize)>,
}
