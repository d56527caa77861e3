use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};

/// Resolve `{root}/{date}_{label}/{subfolder}`.
///
/// `capture_date` falls back to today's local date when the session name
/// did not yield one.
pub fn build_destination_path(
    root: &Path,
    label: &str,
    capture_date: Option<NaiveDate>,
    subfolder: &str,
) -> PathBuf {
    let date = capture_date.unwrap_or_else(|| Local::now().date_naive());
    root.join(format!("{}_{}", date.format("%Y-%m-%d"), label))
        .join(subfolder)
}

/// Parse a camera session folder name of the form `YYMMDD_N`.
///
/// Returns `None` for anything else, including impossible dates such as
/// `251399_1`.
pub fn parse_folder_date(folder_name: &str) -> Option<NaiveDate> {
    let (yymmdd, counter) = folder_name.split_once('_')?;
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if yymmdd.len() != 6 || !all_digits(yymmdd) || !all_digits(counter) {
        return None;
    }
    NaiveDate::parse_from_str(&format!("20{}", yymmdd), "%Y%m%d").ok()
}
