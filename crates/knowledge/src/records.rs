//! Property listings: CSV rows to validated `PropertyRecord`s.
//!
//! Prices arrive as free-form strings (`₹1.2 Cr`, `80L`, `92,50,000`) and are
//! normalized to whole rupees with exact decimal arithmetic. Sold rows are
//! dropped; malformed rows are rejected one at a time without failing the
//! batch.

use estate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

const CRORE: u128 = 10_000_000;
const LAKH: u128 = 100_000;

/// Longest fractional part accepted in a price mantissa.
const MAX_FRACTION_DIGITS: usize = 18;

const ID_COLUMNS: &[&str] = &["property id", "id"];
const PRICE_COLUMNS: &[&str] = &["start price", "price"];
const LOCATION_COLUMNS: &[&str] = &["location"];
const AMENITIES_COLUMNS: &[&str] = &["amenities"];
const NEARBY_COLUMNS: &[&str] = &["nearby"];
const FURNISHING_COLUMNS: &[&str] = &["furnishing"];
const BEDROOM_COLUMNS: &[&str] = &["bhk", "bedrooms"];
const STATUS_COLUMNS: &[&str] = &["status"];

/// A listing that survived normalization. Never sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub id: String,

    /// Whole rupees
    pub price: u64,

    pub location: String,
    pub amenities: Vec<String>,
    pub nearby: Vec<String>,
    pub furnishing: String,
    pub bedrooms: Option<u32>,
    pub status: String,
}

impl PropertyRecord {
    /// Text representation used for embedding and prompt context.
    pub fn render(&self) -> String {
        let bedrooms = self
            .bedrooms
            .map_or_else(|| "unknown".to_string(), |b| b.to_string());

        let mut out = format!(
            "Property ID: {}\nLocation: {}\nBHK: {}\nPrice: {}\n",
            self.id,
            self.location,
            bedrooms,
            format_price(self.price)
        );
        if !self.furnishing.is_empty() {
            out.push_str(&format!("Furnishing: {}\n", self.furnishing));
        }
        out.push_str(&format!("Amenities: {}\n", self.amenities.join(", ")));
        out.push_str(&format!("Nearby: {}", self.nearby.join(", ")));
        out
    }
}

/// Outcome of loading a whole CSV file.
#[derive(Debug, Clone, Default)]
pub struct PropertyBatch {
    pub records: Vec<PropertyRecord>,

    /// Rows dropped because their status was sold
    pub sold: usize,

    /// Rows dropped with a parse error
    pub rejected: usize,
}

/// One CSV row keyed by lower-cased, trimmed header name.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    fields: HashMap<String, String>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut row = Self::new();
        for (key, value) in pairs {
            row.insert(key.as_ref(), value);
        }
        row
    }

    pub fn insert(&mut self, header: &str, value: impl Into<String>) {
        self.fields
            .insert(header.trim().to_lowercase(), value.into());
    }

    /// First non-empty trimmed value among `names`.
    fn get(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .filter_map(|name| self.fields.get(*name))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }
}

/// Normalize one row.
///
/// Returns `Ok(None)` for a sold listing and `AppError::Parse` for a row that
/// cannot become a record. `row` is the 1-based data row number used in
/// error messages.
pub fn normalize_row(row: usize, raw: &RawRow) -> AppResult<Option<PropertyRecord>> {
    let status = raw.get(STATUS_COLUMNS).unwrap_or_default();
    if is_sold(status) {
        return Ok(None);
    }

    let id = raw
        .get(ID_COLUMNS)
        .ok_or_else(|| AppError::parse(row, "missing Property ID"))?;

    let price_raw = raw
        .get(PRICE_COLUMNS)
        .ok_or_else(|| AppError::parse(row, "missing price"))?;
    let price = parse_price(price_raw).map_err(|msg| AppError::parse(row, msg))?;

    let bedrooms = match raw.get(BEDROOM_COLUMNS) {
        Some(value) => Some(
            parse_bedrooms(value)
                .ok_or_else(|| AppError::parse(row, format!("invalid BHK value {:?}", value)))?,
        ),
        None => None,
    };

    Ok(Some(PropertyRecord {
        id: id.to_string(),
        price,
        location: raw.get(LOCATION_COLUMNS).unwrap_or_default().to_string(),
        amenities: split_list(raw.get(AMENITIES_COLUMNS).unwrap_or_default()),
        nearby: split_list(raw.get(NEARBY_COLUMNS).unwrap_or_default()),
        furnishing: raw.get(FURNISHING_COLUMNS).unwrap_or_default().to_string(),
        bedrooms,
        status: if status.is_empty() {
            "available".to_string()
        } else {
            status.to_string()
        },
    }))
}

/// Read every row of a listings CSV.
///
/// Rejected rows are logged and counted; only an unreadable file or header
/// fails the whole load.
pub fn load_properties(path: &Path) -> AppResult<PropertyBatch> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;

    let headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();
    let mut batch = PropertyBatch::default();

    for (index, result) in reader.records().enumerate() {
        let row = index + 1;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping unreadable row {} in {:?}: {}", row, path, e);
                batch.rejected += 1;
                continue;
            }
        };

        let raw = RawRow::from_pairs(headers.iter().zip(record.iter()));
        match normalize_row(row, &raw) {
            Ok(Some(property)) => batch.records.push(property),
            Ok(None) => {
                tracing::debug!("Row {} is sold, skipping", row);
                batch.sold += 1;
            }
            Err(e) => {
                tracing::warn!("{}", e);
                batch.rejected += 1;
            }
        }
    }

    tracing::info!(
        "Loaded {} properties from {:?} ({} sold, {} rejected)",
        batch.records.len(),
        path,
        batch.sold,
        batch.rejected
    );

    Ok(batch)
}

fn csv_error(path: &Path, err: csv::Error) -> AppError {
    if err.is_io_error() {
        match err.into_kind() {
            csv::ErrorKind::Io(io) => AppError::Io(io),
            other => AppError::Knowledge(format!("Failed to read {:?}: {:?}", path, other)),
        }
    } else {
        AppError::Knowledge(format!("Failed to read {:?}: {}", path, err))
    }
}

/// Whether a status marks the listing as sold.
pub fn is_sold(status: &str) -> bool {
    status.trim().eq_ignore_ascii_case("sold")
}

/// Parse a price string into whole rupees.
///
/// Accepts `₹`/`Rs`/`INR` markers, digit-group commas in Indian or Western
/// style, and the `Cr`/`L` shorthands with decimal mantissas. Sub-rupee
/// remainders round half-up.
pub fn parse_price(raw: &str) -> Result<u64, String> {
    let mut s = raw.replace("â‚¹", "").replace('₹', "");
    s.retain(|c| !c.is_whitespace() && c != ',');
    let lower = s.to_lowercase();

    let body = ["inr", "rs.", "rs"]
        .iter()
        .find_map(|prefix| lower.strip_prefix(*prefix))
        .unwrap_or(lower.as_str())
        .trim_end_matches("/-");

    let split = body
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(body.len());
    let (mantissa, suffix) = body.split_at(split);

    let multiplier = match suffix {
        "" => 1,
        "cr" | "crore" | "crores" => CRORE,
        "l" | "lakh" | "lakhs" | "lac" | "lacs" => LAKH,
        _ => return Err(format!("unrecognized price {:?}", raw)),
    };

    scale_decimal(mantissa, multiplier).ok_or_else(|| format!("unrecognized price {:?}", raw))
}

/// `mantissa * multiplier`, rounded half-up, without floating point.
fn scale_decimal(mantissa: &str, multiplier: u128) -> Option<u64> {
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty())
        || !all_digits(int_part)
        || !all_digits(frac_part)
        || frac_part.len() > MAX_FRACTION_DIGITS
    {
        return None;
    }

    let int_value: u128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    let frac_value: u128 = if frac_part.is_empty() {
        0
    } else {
        frac_part.parse().ok()?
    };
    let scale = 10u128.checked_pow(frac_part.len() as u32)?;

    let total = int_value
        .checked_mul(multiplier)?
        .checked_mul(scale)?
        .checked_add(frac_value.checked_mul(multiplier)?)?;
    let rounded = total.checked_add(scale / 2)? / scale;

    u64::try_from(rounded).ok()
}

/// Render a price in the shorthand listings use.
///
/// Crore and lakh forms are used only when they are exact to two decimals,
/// so `parse_price(&format_price(p)) == Ok(p)` holds for every `p`.
pub fn format_price(price: u64) -> String {
    let p = u128::from(price);
    if p >= CRORE && p % (CRORE / 100) == 0 {
        format!("₹{} Cr", decimal_string(p, CRORE))
    } else if p >= LAKH && p % (LAKH / 100) == 0 {
        format!("₹{} L", decimal_string(p, LAKH))
    } else {
        format!("₹{}", group_indian(price))
    }
}

/// `value / unit` with at most two decimals, trailing zeros trimmed.
fn decimal_string(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let hundredths = (value % unit) / (unit / 100);
    if hundredths == 0 {
        whole.to_string()
    } else {
        let frac = format!("{:02}", hundredths);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }
}

/// Indian digit grouping: last three digits, then pairs (`1,23,45,678`).
fn group_indian(value: u64) -> String {
    let digits = value.to_string();
    if digits.len() <= 3 {
        return digits;
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();

    format!("{},{}", groups.join(","), tail)
}

/// Split a `,`/`;` separated list, dropping blanks and case-insensitive duplicates.
pub fn split_list(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter(|item| seen.insert(item.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// First run of digits (`"3 BHK"` is 3).
fn parse_bedrooms(raw: &str) -> Option<u32> {
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        RawRow::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_parse_price_shorthands() {
        assert_eq!(parse_price("₹1.2 Cr"), Ok(12_000_000));
        assert_eq!(parse_price("₹80L"), Ok(8_000_000));
        assert_eq!(parse_price("80 Lakhs"), Ok(8_000_000));
        assert_eq!(parse_price("1.25 crore"), Ok(12_500_000));
        assert_eq!(parse_price("2 Lacs"), Ok(200_000));
        assert_eq!(parse_price("Rs. 45 L"), Ok(4_500_000));
        assert_eq!(parse_price("INR 3Cr"), Ok(30_000_000));
    }

    #[test]
    fn test_parse_price_commas_and_mojibake() {
        assert_eq!(parse_price("92,50,000"), Ok(9_250_000));
        assert_eq!(parse_price("9,250,000"), Ok(9_250_000));
        assert_eq!(parse_price("â‚¹92,50,000"), Ok(9_250_000));
        assert_eq!(parse_price("₹ 95,000/-"), Ok(95_000));
    }

    #[test]
    fn test_parse_price_is_exact() {
        // 0.7 and 1.15 are not exact in binary floating point
        assert_eq!(parse_price("0.7 Cr"), Ok(7_000_000));
        assert_eq!(parse_price("1.15 Cr"), Ok(11_500_000));
        assert_eq!(parse_price("12.5"), Ok(13));
        assert_eq!(parse_price("12.49"), Ok(12));
    }

    #[test]
    fn test_parse_price_rejects_garbage() {
        assert!(parse_price("").is_err());
        assert!(parse_price("₹").is_err());
        assert!(parse_price("Price on request").is_err());
        assert!(parse_price("1.2.3 Cr").is_err());
        assert!(parse_price("12 million").is_err());
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(12_000_000), "₹1.2 Cr");
        assert_eq!(format_price(8_000_000), "₹80 L");
        assert_eq!(format_price(95_000), "₹95,000");
        assert_eq!(format_price(12_345_678), "₹1,23,45,678");
        assert_eq!(format_price(0), "₹0");
    }

    #[test]
    fn test_format_then_parse_is_identity() {
        for price in [
            0,
            999,
            95_000,
            100_000,
            150_000,
            8_000_000,
            9_250_000,
            12_000_000,
            12_345_678,
            105_000_000,
            u64::MAX,
        ] {
            assert_eq!(parse_price(&format_price(price)), Ok(price), "{}", price);
        }
    }

    #[test]
    fn test_split_list_dedupes_case_insensitively() {
        assert_eq!(split_list("gym;pool"), vec!["gym", "pool"]);
        assert_eq!(
            split_list(" Gym, pool ;; gym,Pool , Park"),
            vec!["Gym", "pool", "Park"]
        );
        assert!(split_list("  ").is_empty());
    }

    #[test]
    fn test_normalize_available_row() {
        let raw = row(&[
            ("Property ID", "P1"),
            ("Start Price", "₹1.2 Cr"),
            ("Location", "Velachery"),
            ("Amenities", "gym;pool"),
            ("Nearby", "Phoenix Mall, MRTS"),
            ("Furnishing", "Semi"),
            ("BHK", "3 BHK"),
            ("Status", "available"),
        ]);

        let record = normalize_row(1, &raw).unwrap().unwrap();
        assert_eq!(record.id, "P1");
        assert_eq!(record.price, 12_000_000);
        assert_eq!(record.amenities, vec!["gym", "pool"]);
        assert_eq!(record.nearby, vec!["Phoenix Mall", "MRTS"]);
        assert_eq!(record.bedrooms, Some(3));
    }

    #[test]
    fn test_sold_rows_are_skipped() {
        for status in ["Sold", "sold", " SOLD "] {
            let raw = row(&[("Property ID", "P2"), ("Price", "oops"), ("Status", status)]);
            assert_eq!(normalize_row(1, &raw).unwrap(), None);
        }
    }

    #[test]
    fn test_missing_status_means_available() {
        let raw = row(&[("Property ID", "P3"), ("Price", "50L")]);
        let record = normalize_row(1, &raw).unwrap().unwrap();
        assert_eq!(record.status, "available");
        assert_eq!(record.bedrooms, None);
    }

    #[test]
    fn test_row_errors() {
        let no_id = row(&[("Price", "50L")]);
        assert!(matches!(
            normalize_row(4, &no_id),
            Err(AppError::Parse { row: 4, .. })
        ));

        let bad_price = row(&[("Property ID", "P4"), ("Price", "call us")]);
        assert!(matches!(
            normalize_row(5, &bad_price),
            Err(AppError::Parse { row: 5, .. })
        ));

        let bad_bhk = row(&[("Property ID", "P5"), ("Price", "50L"), ("BHK", "studio")]);
        assert!(matches!(
            normalize_row(6, &bad_bhk),
            Err(AppError::Parse { row: 6, .. })
        ));
    }

    #[test]
    fn test_render_includes_key_fields() {
        let raw = row(&[
            ("Property ID", "P1"),
            ("Start Price", "₹1.2 Cr"),
            ("Location", "Velachery"),
            ("Amenities", "gym;pool"),
        ]);
        let text = normalize_row(1, &raw).unwrap().unwrap().render();
        assert!(text.contains("Property ID: P1"));
        assert!(text.contains("Location: Velachery"));
        assert!(text.contains("Price: ₹1.2 Cr"));
        assert!(text.contains("Amenities: gym, pool"));
    }

    #[test]
    fn test_load_properties_counts_outcomes() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "Status,Property ID,Location,Start Price,Amenities,BHK\n\
             available,P1,Velachery,₹1.2 Cr,gym;pool,3 BHK\n\
             Sold,P2,Adyar,₹90 L,pool,2 BHK\n\
             available,P3,Tambaram,not a price,,1\n\
             ,P4,OMR,\"92,50,000\",\"park, gym\",2"
        )
        .unwrap();

        let batch = load_properties(file.path()).unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.sold, 1);
        assert_eq!(batch.rejected, 1);
        assert_eq!(batch.records[1].price, 9_250_000);
        assert_eq!(batch.records[1].amenities, vec!["park", "gym"]);
        assert!(batch.records.iter().all(|r| r.id != "P2"));
    }

    #[test]
    fn test_load_properties_missing_file() {
        let result = load_properties(Path::new("/definitely/not/here.csv"));
        assert!(matches!(result, Err(AppError::Io(_))));
    }
}
