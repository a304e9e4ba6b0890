//! Canonicalisation of the free-text fields that arrive from spreadsheets, manual entry and
//! the historical dataset: branch names, class labels and contract dates.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Days between the spreadsheet epoch (1899-12-30) and the Unix epoch.
pub const EXCEL_UNIX_EPOCH_OFFSET_DAYS: f64 = 25569.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Lowercases and strips Turkish diacritics (ı→i, ğ→g, ü→u, ş→s, ö→o, ç→c).
///
/// Both dotted and dotless capital I fold to `i`, matching a `tr-TR` lowercase followed by
/// diacritic removal.
pub fn fold_turkish(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            'ı' | 'I' | 'İ' => out.push('i'),
            'ğ' | 'Ğ' => out.push('g'),
            'ü' | 'Ü' => out.push('u'),
            'ş' | 'Ş' => out.push('s'),
            'ö' | 'Ö' => out.push('o'),
            'ç' | 'Ç' => out.push('c'),
            '\u{307}' => {}
            other => out.extend(other.to_lowercase()),
        }
    }
    out
}

/// Folded form with everything except ASCII letters and digits removed.
/// "Altınküre Lise " and "altinkure-lise" both become "altinkurelise".
pub fn compact_key(input: &str) -> String {
    fold_turkish(input)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Branch {
    MefkureLgs,
    MefkureVip,
    MefkurePlus,
    AltinkureIlkogretim,
    AltinkureAnaokulu,
    AltinkureIlkokul,
    AltinkureOrtaokul,
    AltinkureLise,
    AltinkureFenLisesi,
    AltinkureAnadoluLisesi,
    AltinkureAkademi,
    AltinkureTeknokent,
    /// Blank input.
    Unknown,
    /// Input that matched no keyword, kept verbatim (trimmed).
    Other(String),
}

impl Branch {
    /// Every canonical branch, in display order.
    pub const CANONICAL: [Branch; 12] = [
        Branch::MefkureLgs,
        Branch::MefkureVip,
        Branch::MefkurePlus,
        Branch::AltinkureIlkogretim,
        Branch::AltinkureAnaokulu,
        Branch::AltinkureIlkokul,
        Branch::AltinkureOrtaokul,
        Branch::AltinkureLise,
        Branch::AltinkureFenLisesi,
        Branch::AltinkureAnadoluLisesi,
        Branch::AltinkureAkademi,
        Branch::AltinkureTeknokent,
    ];

    /// The six units that carry their own finance plan.
    pub const FINANCE_UNITS: [Branch; 6] = [
        Branch::MefkureLgs,
        Branch::MefkureVip,
        Branch::MefkurePlus,
        Branch::AltinkureIlkogretim,
        Branch::AltinkureLise,
        Branch::AltinkureTeknokent,
    ];

    pub fn canonicalize(raw: &str) -> Branch {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Branch::Unknown;
        }

        let key = fold_turkish(trimmed).replace("okulu", "okul");

        if key.contains("vip") {
            Branch::MefkureVip
        } else if key.contains("lgs") {
            Branch::MefkureLgs
        } else if key.contains("plus") {
            Branch::MefkurePlus
        } else if key.contains("teknokent") {
            Branch::AltinkureTeknokent
        } else if key.contains("fen") && key.contains("lise") {
            Branch::AltinkureFenLisesi
        } else if key.contains("anadolu") {
            Branch::AltinkureAnadoluLisesi
        } else if key.contains("akademi") {
            Branch::AltinkureAkademi
        } else if key.contains("anaokul") {
            Branch::AltinkureAnaokulu
        } else if key.contains("ilkokul") {
            Branch::AltinkureIlkokul
        } else if key.contains("ortaokul") {
            Branch::AltinkureOrtaokul
        } else if key.contains("ilkogretim") {
            Branch::AltinkureIlkogretim
        } else if key.contains("lise") {
            Branch::AltinkureLise
        } else if key == "bilinmeyen sube" {
            Branch::Unknown
        } else {
            Branch::Other(trimmed.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Branch::MefkureLgs => "Mefkure LGS",
            Branch::MefkureVip => "Mefkure VIP",
            Branch::MefkurePlus => "Mefkure PLUS",
            Branch::AltinkureIlkogretim => "Altınküre İlköğretim",
            Branch::AltinkureAnaokulu => "Altınküre Anaokulu",
            Branch::AltinkureIlkokul => "Altınküre İlkokul",
            Branch::AltinkureOrtaokul => "Altınküre Ortaokul",
            Branch::AltinkureLise => "Altınküre Lise",
            Branch::AltinkureFenLisesi => "Altınküre Fen Lisesi",
            Branch::AltinkureAnadoluLisesi => "Altınküre Anadolu Lisesi",
            Branch::AltinkureAkademi => "Altınküre Akademi",
            Branch::AltinkureTeknokent => "Altınküre Teknokent",
            Branch::Unknown => "Bilinmeyen Şube",
            Branch::Other(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Branch::Unknown | Branch::Other(_))
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for Branch {
    fn from(raw: String) -> Self {
        Branch::canonicalize(&raw)
    }
}

impl From<&str> for Branch {
    fn from(raw: &str) -> Self {
        Branch::canonicalize(raw)
    }
}

impl From<Branch> for String {
    fn from(branch: Branch) -> Self {
        branch.name().to_string()
    }
}

/// Grade or cohort label in its single canonical form: numerals without leading zeros
/// ("07" → "7"), textual cohorts in a fixed spelling ("mood" → "MOOD").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ClassType(String);

impl ClassType {
    pub fn normalize(raw: &str) -> ClassType {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_suffix(".0").unwrap_or(trimmed);

        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(n) = trimmed.parse::<u32>() {
                return ClassType(n.to_string());
            }
        }

        let label = match compact_key(trimmed).as_str() {
            "anasinifi" | "anasinif" => "Ana Sınıfı",
            "mezun" => "Mezun",
            "mood" => "MOOD",
            "akademi" => "Akademi",
            _ => return ClassType(trimmed.to_string()),
        };
        ClassType(label.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Grade number for numeric labels.
    pub fn grade(&self) -> Option<u32> {
        self.0.parse().ok()
    }

    /// Two-digit rendering of single-digit grades ("7" → "07"); other labels unchanged.
    pub fn padded(&self) -> String {
        match self.grade() {
            Some(n) if n < 10 => format!("{:02}", n),
            _ => self.0.clone(),
        }
    }
}

impl fmt::Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ClassType {
    fn from(raw: String) -> Self {
        ClassType::normalize(&raw)
    }
}

impl From<&str> for ClassType {
    fn from(raw: &str) -> Self {
        ClassType::normalize(raw)
    }
}

impl From<ClassType> for String {
    fn from(class_type: ClassType) -> Self {
        class_type.0
    }
}

/// Server timestamp wrapper as stored by the document database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirestoreTimestamp {
    pub seconds: i64,
    #[serde(default)]
    pub nanoseconds: u32,
}

impl FirestoreTimestamp {
    pub fn to_date_time(&self) -> Option<NaiveDateTime> {
        DateTime::from_timestamp(self.seconds, self.nanoseconds).map(|dt| dt.naive_utc())
    }
}

/// Every shape a contract date has been seen in.
#[derive(Debug, Clone, PartialEq)]
pub enum RawDate {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Milliseconds since the Unix epoch.
    TimestampMillis(i64),
    /// ISO-like or "DD.MM.YYYY" text.
    Text(String),
    Timestamp(FirestoreTimestamp),
    /// Spreadsheet day number (days since 1899-12-30, fractional part is time of day).
    ExcelSerial(f64),
}

/// Converts any supported date shape to a naive UTC date-time. `None` means unparseable;
/// callers drop such records from every date-bounded computation.
pub fn normalize_date(input: &RawDate) -> Option<NaiveDateTime> {
    match input {
        RawDate::Date(date) => date.and_hms_opt(0, 0, 0),
        RawDate::DateTime(dt) => Some(*dt),
        RawDate::TimestampMillis(ms) => DateTime::from_timestamp_millis(*ms).map(|dt| dt.naive_utc()),
        RawDate::Text(text) => parse_date_text(text),
        RawDate::Timestamp(ts) => ts.to_date_time(),
        RawDate::ExcelSerial(serial) => excel_serial_to_date_time(*serial),
    }
}

const DATE_TIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d.%m.%Y", "%Y/%m/%d", "%d/%m/%Y"];

pub fn parse_date_text(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }

    for fmt in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

pub fn excel_serial_to_date_time(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let millis = ((serial - EXCEL_UNIX_EPOCH_OFFSET_DAYS) * MILLIS_PER_DAY).round() as i64;
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_fold_turkish() {
        assert_eq!(fold_turkish("ALTINKÜRE İlköğretim"), "altinkure ilkogretim");
        assert_eq!(fold_turkish("Şube ÇÖĞ"), "sube cog");
        assert_eq!(compact_key(" Altınküre Lise "), "altinkurelise");
    }

    #[test]
    fn test_branch_keyword_buckets() {
        assert_eq!(Branch::canonicalize("mefkure lgs "), Branch::MefkureLgs);
        assert_eq!(Branch::canonicalize("MEFKURE Vip"), Branch::MefkureVip);
        assert_eq!(Branch::canonicalize("Mefkure Plus"), Branch::MefkurePlus);
        assert_eq!(
            Branch::canonicalize("ALTINKÜRE FEN LİSESİ"),
            Branch::AltinkureFenLisesi
        );
        assert_eq!(
            Branch::canonicalize("Altınküre Anaokulu"),
            Branch::AltinkureAnaokulu
        );
        assert_eq!(
            Branch::canonicalize("altinkure ilkokulu"),
            Branch::AltinkureIlkokul
        );
        assert_eq!(
            Branch::canonicalize("Altinkure Ilkogretim"),
            Branch::AltinkureIlkogretim
        );
        assert_eq!(Branch::canonicalize("   "), Branch::Unknown);
        assert_eq!(
            Branch::canonicalize("  Merkez Kampüs "),
            Branch::Other("Merkez Kampüs".to_string())
        );
    }

    #[test]
    fn test_branch_canonicalization_is_idempotent() {
        let inputs = [
            "mefkure lgs ",
            "Altınküre Anadolu Lisesi",
            "altınküre akademi",
            "ALTINKÜRE ORTAOKULU",
            "teknokent",
            "",
            "Bilinmeyen Şube",
            "Some Other Place",
        ];
        for raw in inputs {
            let once = Branch::canonicalize(raw);
            let twice = Branch::canonicalize(once.name());
            assert_eq!(once, twice, "not idempotent for {:?}", raw);
        }
        for branch in Branch::CANONICAL {
            assert_eq!(Branch::canonicalize(branch.name()), branch);
        }
    }

    #[test]
    fn test_branch_serializes_as_name() {
        let json = serde_json::to_string(&Branch::AltinkureLise).unwrap();
        assert_eq!(json, "\"Altınküre Lise\"");
        let parsed: Branch = serde_json::from_str("\"mefkure vip\"").unwrap();
        assert_eq!(parsed, Branch::MefkureVip);
    }

    #[test]
    fn test_class_type_single_representation() {
        assert_eq!(ClassType::normalize("07"), ClassType::normalize("7"));
        assert_eq!(ClassType::normalize("7.0").as_str(), "7");
        assert_eq!(ClassType::normalize(" 12 ").as_str(), "12");
        assert_eq!(ClassType::normalize("mood").as_str(), "MOOD");
        assert_eq!(ClassType::normalize("MEZUN").as_str(), "Mezun");
        assert_eq!(ClassType::normalize("ana sınıfı").as_str(), "Ana Sınıfı");
        assert_eq!(ClassType::normalize("Hazırlık").as_str(), "Hazırlık");
        assert_eq!(ClassType::normalize("7").padded(), "07");
        assert_eq!(ClassType::normalize("11").padded(), "11");
    }

    #[test]
    fn test_normalize_date_shapes() {
        let expected = ymd(2026, 3, 15);

        assert_eq!(
            normalize_date(&RawDate::Date(NaiveDate::from_ymd_opt(2026, 3, 15).unwrap())),
            Some(expected)
        );
        assert_eq!(
            normalize_date(&RawDate::Text("15.03.2026".to_string())),
            Some(expected)
        );
        assert_eq!(
            normalize_date(&RawDate::Text("2026-03-15".to_string())),
            Some(expected)
        );
        assert_eq!(
            normalize_date(&RawDate::Text("2026-03-15T00:00:00Z".to_string())),
            Some(expected)
        );
        assert_eq!(normalize_date(&RawDate::ExcelSerial(46096.0)), Some(expected));
        let millis = expected.and_utc().timestamp_millis();
        assert_eq!(
            normalize_date(&RawDate::TimestampMillis(millis)),
            Some(expected)
        );
        assert_eq!(
            normalize_date(&RawDate::Timestamp(FirestoreTimestamp {
                seconds: millis / 1000,
                nanoseconds: 0,
            })),
            Some(expected)
        );
    }

    #[test]
    fn test_unparseable_dates_are_none() {
        assert_eq!(normalize_date(&RawDate::Text("yarın".to_string())), None);
        assert_eq!(normalize_date(&RawDate::Text("  ".to_string())), None);
        assert_eq!(normalize_date(&RawDate::ExcelSerial(f64::NAN)), None);
        assert_eq!(normalize_date(&RawDate::ExcelSerial(-3.0)), None);
        assert_eq!(normalize_date(&RawDate::Text("31.02.2026".to_string())), None);
    }

    #[test]
    fn test_excel_serial_time_of_day() {
        let dt = excel_serial_to_date_time(46096.5).unwrap();
        assert_eq!(dt, ymd(2026, 3, 15) + chrono::Duration::hours(12));
    }
}
