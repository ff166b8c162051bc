//! CSV file data adapter: price history, pivot table and membership intervals.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::error::ZonetraderError;
use crate::domain::membership::{MembershipInterval, normalize_symbol};
use crate::domain::ohlcv::DayBar;
use crate::domain::price_history::PriceHistory;
use crate::domain::zone::{PivotLevel, PivotTable};
use crate::ports::data_port::{MembershipSource, PivotSource};

#[derive(Debug, Deserialize)]
struct PriceRow {
    date: String,
    symbol: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(default)]
    rsi: Option<f64>,
    #[serde(default)]
    vol_avg: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize)]
struct PivotRow {
    symbol: String,
    year: i32,
    pp: f64,
    s1: f64,
    s2: f64,
    s3: f64,
    r1: f64,
    r2: f64,
    r3: f64,
}

#[derive(Debug, Deserialize)]
struct MembershipRow {
    symbol: String,
    from_date: String,
    #[serde(default)]
    to_date: Option<String>,
}

fn open_reader(path: &Path) -> Result<csv::Reader<File>, ZonetraderError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| {
            ZonetraderError::data_format(
                path.display().to_string(),
                format!("failed to open: {}", e),
            )
        })
}

fn parse_date(path: &Path, line: usize, value: &str) -> Result<NaiveDate, ZonetraderError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
        ZonetraderError::data_format(
            path.display().to_string(),
            format!("row {}: invalid date '{}': {}", line, value, e),
        )
    })
}

/// Row number for messages; the header is row 1.
fn row_number(index: usize) -> usize {
    index + 2
}

/// Read `date,symbol,open,high,low,close,volume[,rsi,vol_avg]`.
pub fn read_prices(path: &Path) -> Result<Vec<DayBar>, ZonetraderError> {
    let mut rdr = open_reader(path)?;
    let mut bars = Vec::new();
    for (i, result) in rdr.deserialize::<PriceRow>().enumerate() {
        let row = result.map_err(|e| {
            ZonetraderError::data_format(
                path.display().to_string(),
                format!("row {}: {}", row_number(i), e),
            )
        })?;
        let date = parse_date(path, row_number(i), &row.date)?;
        let symbol = normalize_symbol(&row.symbol);
        if symbol.is_empty() {
            return Err(ZonetraderError::data_format(
                path.display().to_string(),
                format!("row {}: empty symbol", row_number(i)),
            ));
        }
        bars.push(DayBar {
            symbol,
            date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume.round() as i64,
            rsi: row.rsi,
            vol_avg: row.vol_avg,
        });
    }
    Ok(bars)
}

/// Read `symbol,year,pp,s1,s2,s3,r1,r2,r3`, validating each row.
pub fn read_pivots(path: &Path) -> Result<PivotTable, ZonetraderError> {
    let mut rdr = open_reader(path)?;
    let mut table = PivotTable::new();
    for (i, result) in rdr.deserialize::<PivotRow>().enumerate() {
        let row = result.map_err(|e| {
            ZonetraderError::data_format(
                path.display().to_string(),
                format!("row {}: {}", row_number(i), e),
            )
        })?;
        table.insert(PivotLevel {
            symbol: normalize_symbol(&row.symbol),
            year: row.year,
            pp: row.pp,
            s1: row.s1,
            s2: row.s2,
            s3: row.s3,
            r1: row.r1,
            r2: row.r2,
            r3: row.r3,
        })?;
    }
    Ok(table)
}

/// Write pivot levels in the same layout `read_pivots` accepts.
pub fn write_pivots(path: &Path, levels: &[PivotLevel]) -> Result<(), ZonetraderError> {
    let file = File::create(path).map_err(|e| {
        ZonetraderError::data_format(path.display().to_string(), format!("failed to create: {}", e))
    })?;
    write_pivot_rows(file, levels)
}

/// Serialize pivot rows, header first, to any writer.
pub fn write_pivot_rows<W: std::io::Write>(
    writer: W,
    levels: &[PivotLevel],
) -> Result<(), ZonetraderError> {
    let mut wtr = csv::Writer::from_writer(writer);
    if levels.is_empty() {
        wtr.write_record(["symbol", "year", "pp", "s1", "s2", "s3", "r1", "r2", "r3"])
            .map_err(|e| ZonetraderError::data_format("pivots", e))?;
    }
    for level in levels {
        wtr.serialize(PivotRow {
            symbol: level.symbol.clone(),
            year: level.year,
            pp: level.pp,
            s1: level.s1,
            s2: level.s2,
            s3: level.s3,
            r1: level.r1,
            r2: level.r2,
            r3: level.r3,
        })
        .map_err(|e| ZonetraderError::data_format("pivots", e))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read `symbol,from_date,to_date`; a blank `to_date` is open-ended.
pub fn read_membership(path: &Path) -> Result<Vec<MembershipInterval>, ZonetraderError> {
    let mut rdr = open_reader(path)?;
    let mut intervals = Vec::new();
    for (i, result) in rdr.deserialize::<MembershipRow>().enumerate() {
        let row = result.map_err(|e| {
            ZonetraderError::data_format(
                path.display().to_string(),
                format!("row {}: {}", row_number(i), e),
            )
        })?;
        let to_date = match row.to_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(parse_date(path, row_number(i), s)?),
        };
        intervals.push(MembershipInterval {
            symbol: normalize_symbol(&row.symbol),
            from_date: parse_date(path, row_number(i), &row.from_date)?,
            to_date,
        });
    }
    Ok(intervals)
}

/// The three input files of a run.
pub struct CsvAdapter {
    prices: PathBuf,
    pivots: PathBuf,
    membership: PathBuf,
}

impl CsvAdapter {
    pub fn new(prices: PathBuf, pivots: PathBuf, membership: PathBuf) -> Self {
        Self {
            prices,
            pivots,
            membership,
        }
    }

    /// Load prices and fill missing indicator columns.
    pub fn load_price_history(
        &self,
        rsi_period: usize,
        volume_avg_period: usize,
    ) -> Result<PriceHistory, ZonetraderError> {
        let bars = read_prices(&self.prices)?;
        if bars.is_empty() {
            return Err(ZonetraderError::NoData {
                symbol: self.prices.display().to_string(),
            });
        }
        let mut history = PriceHistory::from_bars(bars)?;
        history.fill_indicators(rsi_period, volume_avg_period);
        Ok(history)
    }
}

impl PivotSource for CsvAdapter {
    fn load_pivots(&self) -> Result<PivotTable, ZonetraderError> {
        read_pivots(&self.pivots)
    }
}

impl MembershipSource for CsvAdapter {
    fn load_intervals(&self) -> Result<Vec<MembershipInterval>, ZonetraderError> {
        read_membership(&self.membership)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn reads_prices_without_indicator_columns() {
        let file = create_temp_csv(
            "date,symbol,open,high,low,close,volume\n\
             2024-01-02, tcs ,100.0,105.0,99.0,104.0,1000\n\
             2024-01-03,TCS,104.0,106.0,103.0,105.5,1200\n",
        );
        let bars = read_prices(file.path()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].symbol, "TCS");
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[1].volume, 1200);
        assert!(bars[0].rsi.is_none());
        assert!(bars[0].vol_avg.is_none());
    }

    #[test]
    fn reads_prices_with_indicator_columns() {
        let file = create_temp_csv(
            "date,symbol,open,high,low,close,volume,rsi,vol_avg\n\
             2024-01-02,TCS,100,105,99,104,1000,38.5,900\n\
             2024-01-03,TCS,104,106,103,105,1200,,\n",
        );
        let bars = read_prices(file.path()).unwrap();
        assert_eq!(bars[0].rsi, Some(38.5));
        assert_eq!(bars[0].vol_avg, Some(900.0));
        assert!(bars[1].rsi.is_none());
    }

    #[test]
    fn invalid_price_date_reports_row() {
        let file = create_temp_csv(
            "date,symbol,open,high,low,close,volume\n2024/01/02,TCS,1,1,1,1,1\n",
        );
        let err = read_prices(file.path()).unwrap_err();
        assert!(matches!(err, ZonetraderError::DataFormat { .. }));
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn non_numeric_price_fails() {
        let file =
            create_temp_csv("date,symbol,open,high,low,close,volume\n2024-01-02,TCS,x,1,1,1,1\n");
        assert!(read_prices(file.path()).is_err());
    }

    #[test]
    fn missing_file_fails() {
        let err = read_prices(Path::new("/nonexistent/prices.csv")).unwrap_err();
        assert!(matches!(err, ZonetraderError::DataFormat { .. }));
    }

    #[test]
    fn reads_and_validates_pivots() {
        let file = create_temp_csv(
            "symbol,year,pp,s1,s2,s3,r1,r2,r3\nTCS,2025,100,95,90,85,105,110,115\n",
        );
        let table = read_pivots(file.path()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("TCS", 2025).unwrap().s1, 95.0);

        let bad = create_temp_csv(
            "symbol,year,pp,s1,s2,s3,r1,r2,r3\nTCS,2025,100,95,96,85,105,110,115\n",
        );
        let err = read_pivots(bad.path()).unwrap_err();
        assert!(matches!(err, ZonetraderError::InvalidPivots { .. }));
    }

    #[test]
    fn pivots_written_can_be_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pivots.csv");
        let levels = vec![PivotLevel::fibonacci("TCS", 2025, 120.0, 80.0, 100.0)];
        write_pivots(&path, &levels).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("symbol,year,pp,s1,s2,s3,r1,r2,r3"));
        let table = read_pivots(&path).unwrap();
        assert_eq!(table.get("TCS", 2025), Some(&levels[0]));
    }

    #[test]
    fn pivot_rows_go_to_any_writer() {
        let levels = vec![PivotLevel {
            symbol: "M&M,LTD".into(),
            year: 2026,
            pp: 100.0,
            s1: 95.0,
            s2: 90.0,
            s3: 85.0,
            r1: 105.0,
            r2: 110.0,
            r3: 115.0,
        }];
        let mut out = Vec::new();
        write_pivot_rows(&mut out, &levels).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "symbol,year,pp,s1,s2,s3,r1,r2,r3");
        assert_eq!(lines[1], "\"M&M,LTD\",2026,100.0,95.0,90.0,85.0,105.0,110.0,115.0");
    }

    #[test]
    fn reads_membership_with_open_ended_rows() {
        let file = create_temp_csv(
            "symbol,from_date,to_date\nTCS,2020-01-01,2024-06-30\ninfy,2021-03-01,\n",
        );
        let intervals = read_membership(file.path()).unwrap();
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].to_date, NaiveDate::from_ymd_opt(2024, 6, 30));
        assert_eq!(intervals[1].symbol, "INFY");
        assert!(intervals[1].to_date.is_none());
    }

    #[test]
    fn adapter_loads_history_with_indicators() {
        let mut content = String::from("date,symbol,open,high,low,close,volume\n");
        for day in 1..=20 {
            content.push_str(&format!(
                "2024-01-{:02},TCS,100,101,99,{},1000\n",
                day,
                100 + day
            ));
        }
        let prices = create_temp_csv(&content);
        let pivots = create_temp_csv("symbol,year,pp,s1,s2,s3,r1,r2,r3\n");
        let members = create_temp_csv("symbol,from_date,to_date\n");
        let adapter = CsvAdapter::new(
            prices.path().to_path_buf(),
            pivots.path().to_path_buf(),
            members.path().to_path_buf(),
        );

        let history = adapter.load_price_history(14, 5).unwrap();
        let series = history.series("TCS").unwrap();
        assert!(series.bars[14].rsi.is_some());
        assert!(series.bars[5].vol_avg.is_some());
        assert!(adapter.load_pivots().unwrap().is_empty());
        assert!(adapter.load_intervals().unwrap().is_empty());
    }

    #[test]
    fn empty_price_file_is_no_data() {
        let prices = create_temp_csv("date,symbol,open,high,low,close,volume\n");
        let adapter = CsvAdapter::new(
            prices.path().to_path_buf(),
            PathBuf::from("p.csv"),
            PathBuf::from("m.csv"),
        );
        assert!(matches!(
            adapter.load_price_history(14, 20),
            Err(ZonetraderError::NoData { .. })
        ));
    }
}
