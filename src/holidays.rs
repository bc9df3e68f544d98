//! Hebrew calendar holidays for a given month.
//!
//! Holidays come from the Hebcal REST API when it is reachable and from a
//! built-in table otherwise.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::hebrew_dates::{approximate_month_label, hebrew_month_number, HebrewDate};

pub const DEFAULT_HEBCAL_URL: &str = "https://www.hebcal.com/hebcal";
pub const DEFAULT_HEBCAL_CONVERTER_URL: &str = "https://www.hebcal.com/converter";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidayCategory {
    Holiday,
    Fast,
    RoshChodesh,
}

impl HolidayCategory {
    /// Maps a Hebcal item category; anything unrecognised is a holiday.
    pub fn from_hebcal(category: &str) -> Self {
        match category {
            "fast" => HolidayCategory::Fast,
            "roshchodesh" => HolidayCategory::RoshChodesh,
            _ => HolidayCategory::Holiday,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HolidayCategory::Holiday => "holiday",
            HolidayCategory::Fast => "fast",
            HolidayCategory::RoshChodesh => "rosh_chodesh",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub title: String,
    /// `YYYY-MM-DD`, or a full timestamp for timed events
    pub date: String,
    pub category: HolidayCategory,
}

impl Holiday {
    pub fn new(title: impl Into<String>, date: impl Into<String>, category: HolidayCategory) -> Self {
        Self {
            title: title.into(),
            date: date.into(),
            category,
        }
    }

    /// Calendar day of the event, ignoring any time component.
    pub fn day(&self) -> Option<NaiveDate> {
        self.date
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HolidayError {
    #[error("Invalid month: {0}-{1}")]
    InvalidMonth(i32, u32),
    #[error("Holiday request failed: {0}")]
    Request(String),
    #[error("Invalid holiday response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait HolidaySource: Send + Sync {
    async fn get_holidays(&self, year: i32, month: u32) -> Result<Vec<Holiday>, HolidayError>;

    async fn hebrew_date(&self, date: NaiveDate) -> Result<HebrewDate, HolidayError>;
}

/// First and last day of a month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), HolidayError> {
    let first =
        NaiveDate::from_ymd_opt(year, month, 1).ok_or(HolidayError::InvalidMonth(year, month))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last = next
        .and_then(|d| d.pred_opt())
        .ok_or(HolidayError::InvalidMonth(year, month))?;
    Ok((first, last))
}

#[derive(Debug, Deserialize)]
struct HebcalResponse {
    #[serde(default)]
    items: Vec<HebcalItem>,
}

#[derive(Debug, Deserialize)]
struct HebcalItem {
    title: String,
    date: String,
    #[serde(default)]
    category: String,
}

pub fn parse_hebcal_response(body: &str) -> Result<Vec<Holiday>, HolidayError> {
    let response: HebcalResponse =
        serde_json::from_str(body).map_err(|e| HolidayError::Decode(e.to_string()))?;

    Ok(response
        .items
        .into_iter()
        .map(|item| Holiday {
            category: HolidayCategory::from_hebcal(&item.category),
            title: item.title,
            date: item.date,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct ConverterResponse {
    hebrew: String,
    hy: i32,
    hm: String,
    hd: u32,
    #[serde(rename = "heDateParts")]
    he_date_parts: Option<HebrewDateParts>,
}

#[derive(Debug, Deserialize)]
struct HebrewDateParts {
    y: String,
    m: String,
}

/// Decodes a Hebcal converter (`g2h`) answer for `date`.
pub fn parse_converter_response(body: &str, date: NaiveDate) -> Result<HebrewDate, HolidayError> {
    let response: ConverterResponse =
        serde_json::from_str(body).map_err(|e| HolidayError::Decode(e.to_string()))?;
    let parts = response
        .he_date_parts
        .ok_or_else(|| HolidayError::Decode("missing heDateParts".to_string()))?;

    Ok(HebrewDate {
        hebrew: response.hebrew,
        gregorian: date,
        day: response.hd,
        month: hebrew_month_number(&response.hm),
        year: response.hy,
        month_name: parts.m,
        year_traditional: parts.y,
    })
}

/// Hebcal REST client. One GET per month or date, no retries.
#[derive(Clone)]
pub struct HebcalClient {
    base_url: String,
    converter_url: String,
    agent: ureq::Agent,
}

impl HebcalClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .into();

        Self {
            base_url: base_url.into(),
            converter_url: DEFAULT_HEBCAL_CONVERTER_URL.to_string(),
            agent,
        }
    }

    pub fn with_converter_url(mut self, converter_url: impl Into<String>) -> Self {
        self.converter_url = converter_url.into();
        self
    }

    fn convert(&self, date: NaiveDate) -> Result<HebrewDate, HolidayError> {
        let mut response = self
            .agent
            .get(&self.converter_url)
            .query("cfg", "json")
            .query("gy", date.year().to_string())
            .query("gm", date.month().to_string())
            .query("gd", date.day().to_string())
            .query("g2h", "1")
            .call()
            .map_err(|e| HolidayError::Request(e.to_string()))?;

        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| HolidayError::Request(e.to_string()))?;

        parse_converter_response(&body, date)
    }

    fn fetch(&self, year: i32, month: u32) -> Result<Vec<Holiday>, HolidayError> {
        let (start, end) = month_bounds(year, month)?;

        let mut response = self
            .agent
            .get(&self.base_url)
            .query("v", "1")
            .query("cfg", "json")
            .query("year", year.to_string())
            .query("month", month.to_string())
            .query("maj", "on")
            .query("min", "on")
            .query("mod", "on")
            .query("nx", "on")
            .query("ss", "on")
            .query("mf", "on")
            .query("c", "on")
            .query("geo", "none")
            .query("lg", "he")
            .query("start", start.format("%Y-%m-%d").to_string())
            .query("end", end.format("%Y-%m-%d").to_string())
            .call()
            .map_err(|e| HolidayError::Request(e.to_string()))?;

        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| HolidayError::Request(e.to_string()))?;

        parse_hebcal_response(&body)
    }
}

impl Default for HebcalClient {
    fn default() -> Self {
        Self::new(DEFAULT_HEBCAL_URL)
    }
}

#[async_trait]
impl HolidaySource for HebcalClient {
    async fn get_holidays(&self, year: i32, month: u32) -> Result<Vec<Holiday>, HolidayError> {
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.fetch(year, month))
            .await
            .map_err(|e| HolidayError::Request(format!("request task failed: {}", e)))?
    }

    async fn hebrew_date(&self, date: NaiveDate) -> Result<HebrewDate, HolidayError> {
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.convert(date))
            .await
            .map_err(|e| HolidayError::Request(format!("request task failed: {}", e)))?
    }
}

type FallbackMonth = (i32, u32, &'static [(&'static str, &'static str, HolidayCategory)]);

use HolidayCategory::{Fast, Holiday as Hol};

/// Built-in holidays for the 2025/26 calendar year, keyed by display month.
static FALLBACK_HOLIDAYS: &[FallbackMonth] = &[
    (
        2025,
        9,
        &[
            ("ראש השנה", "2025-09-22", Hol),
            ("יום כיפור", "2025-10-01", Hol),
            ("סוכות", "2025-10-06", Hol),
            ("ליל סליחות", "2025-09-14", Hol),
        ],
    ),
    (
        2025,
        10,
        &[
            ("שמיני עצרת", "2025-10-13", Hol),
            ("שמחת תורה", "2025-10-14", Hol),
            ("ערב ראש השנה", "2025-09-21", Hol),
            ("ערב יום כיפור", "2025-09-30", Hol),
            ("ערב סוכות", "2025-10-05", Hol),
            ("ערב שמיני עצרת", "2025-10-12", Hol),
            ("ערב שמחת תורה", "2025-10-13", Hol),
            ("צום גדליה", "2025-09-26", Fast),
            ("שבת שובה", "2025-09-28", Hol),
        ],
    ),
    (
        2025,
        12,
        &[
            ("חנוכה", "2025-12-25", Hol),
            ("עשרה בטבת", "2025-12-30", Fast),
        ],
    ),
    (2026, 1, &[("טו בשבט", "2026-01-25", Hol)]),
    (
        2026,
        3,
        &[
            ("פורים", "2026-03-13", Hol),
            ("תענית אסתר", "2026-03-12", Fast),
            ("ערב פורים", "2026-03-12", Hol),
        ],
    ),
    (
        2026,
        4,
        &[
            ("פסח", "2026-04-22", Hol),
            ("ערב פסח", "2026-04-21", Hol),
            ("תענית בכורות", "2026-04-21", Fast),
            ("חול המועד פסח", "2026-04-23", Hol),
            ("שבת הגדול", "2026-04-19", Hol),
        ],
    ),
    (
        2026,
        5,
        &[
            ("יום העצמאות", "2026-05-01", Hol),
            ("שבועות", "2026-05-11", Hol),
            ("ערב שבועות", "2026-05-10", Hol),
            ("יום השואה", "2026-04-28", Hol),
            ("יום הזכרון", "2026-04-30", Hol),
            ("לג בעומר", "2026-05-16", Hol),
        ],
    ),
    (
        2026,
        7,
        &[
            ("תשעה באב", "2026-07-26", Fast),
            ("ערב תשעה באב", "2026-07-25", Hol),
        ],
    ),
];

/// Static holidays for a month; empty outside the table.
pub fn fallback_holidays(year: i32, month: u32) -> Vec<Holiday> {
    FALLBACK_HOLIDAYS
        .iter()
        .find(|(y, m, _)| *y == year && *m == month)
        .map(|(_, _, entries)| {
            entries
                .iter()
                .map(|(title, date, category)| Holiday::new(*title, *date, *category))
                .collect()
        })
        .unwrap_or_default()
}

/// Remote lookup with the static table as fallback.
#[derive(Clone, Default)]
pub struct HolidayService {
    remote: Option<Arc<dyn HolidaySource>>,
}

impl HolidayService {
    pub fn new(remote: Arc<dyn HolidaySource>) -> Self {
        Self {
            remote: Some(remote),
        }
    }

    /// Service that only ever answers from the static table.
    pub fn offline() -> Self {
        Self { remote: None }
    }

    pub async fn holidays_for(&self, year: i32, month: u32) -> Vec<Holiday> {
        let Some(remote) = &self.remote else {
            return fallback_holidays(year, month);
        };

        match remote.get_holidays(year, month).await {
            Ok(holidays) => {
                debug!("Fetched {} holidays for {}-{}", holidays.len(), year, month);
                holidays
            }
            Err(e) => {
                warn!(
                    "Holiday lookup for {}-{} failed, using built-in table: {}",
                    year, month, e
                );
                fallback_holidays(year, month)
            }
        }
    }

    /// Hebrew date of `date`; `None` offline or when the lookup fails.
    pub async fn hebrew_date(&self, date: NaiveDate) -> Option<HebrewDate> {
        let remote = self.remote.as_ref()?;
        match remote.hebrew_date(date).await {
            Ok(hebrew) => Some(hebrew),
            Err(e) => {
                warn!("Hebrew date lookup for {} failed: {}", date, e);
                None
            }
        }
    }

    /// Hebrew month heading for a Gregorian month, taken from its 1st.
    pub async fn hebrew_month_label(&self, year: i32, month: u32) -> String {
        let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
            return String::new();
        };
        match self.hebrew_date(first).await {
            Some(hebrew) => hebrew.month_label(),
            None => approximate_month_label(year, month),
        }
    }
}

/// Holidays falling on `day`.
pub fn holidays_on(holidays: &[Holiday], day: NaiveDate) -> Vec<&Holiday> {
    holidays
        .iter()
        .filter(|h| h.day() == Some(day))
        .collect()
}
