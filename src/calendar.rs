//! Month sequence of the photo calendar and the photo-per-month selection.
//!
//! All randomness lives here: photos are shuffled with a seeded `StdRng`
//! before they reach the composer, which never reorders anything itself.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::collage_generator::{CancelToken, CollageComposer, CompositionRequest};
use crate::collage_types::{CollageError, CompositionResult, FitMode, PhotoRef};
use crate::hebrew_dates::gregorian_month_name;
use crate::holidays::{Holiday, HolidayService};

/// Photos a preview month cycles through
pub const ROLLING_WINDOW: usize = 8;

/// Photos shown in one month's collage
pub const DEFAULT_MAX_PHOTOS_PER_COLLAGE: usize = 6;

/// Longest month sequence `calendar_months` builds
pub const MAX_CALENDAR_MONTHS: usize = 1200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
}

impl CalendarMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    /// `2025-9` style key
    pub fn key(&self) -> String {
        format!("{}-{}", self.year, self.month)
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn days_in_month(&self) -> u32 {
        let next = self.next();
        match (self.first_day(), next.first_day()) {
            (Some(first), Some(next)) => (next - first).num_days() as u32,
            _ => 0,
        }
    }

    /// Weekday of the 1st, 0 = Sunday
    pub fn first_weekday(&self) -> u32 {
        self.first_day()
            .map(|d| d.weekday().num_days_from_sunday())
            .unwrap_or(0)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Hebrew name of the Gregorian month, e.g. `ספטמבר`
    pub fn name(&self) -> &'static str {
        gregorian_month_name(self.month).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonalDateKind {
    Birthday,
    Anniversary,
    Holiday,
    Other,
}

impl PersonalDateKind {
    /// Label printed next to the date
    pub fn label(&self) -> &'static str {
        match self {
            PersonalDateKind::Birthday => "יום הולדת",
            PersonalDateKind::Anniversary => "יום נישואין",
            PersonalDateKind::Holiday => "חג",
            PersonalDateKind::Other => "אחר",
        }
    }
}

/// A family date the user marks on the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalDate {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: PersonalDateKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Personal dates inside `month`, ordered by day.
pub fn personal_dates_in(dates: &[PersonalDate], month: CalendarMonth) -> Vec<PersonalDate> {
    let mut matching: Vec<PersonalDate> = dates
        .iter()
        .filter(|d| month.contains(d.date))
        .cloned()
        .collect();
    matching.sort_by_key(|d| d.date);
    matching
}

/// Personal dates falling exactly on `day`.
pub fn personal_dates_on(dates: &[PersonalDate], day: NaiveDate) -> Vec<&PersonalDate> {
    dates.iter().filter(|d| d.date == day).collect()
}

/// `count` consecutive months starting at `start_year`/`start_month`.
///
/// `None` for an invalid start or more than `MAX_CALENDAR_MONTHS` months.
pub fn calendar_months(start_year: i32, start_month: u32, count: usize) -> Option<Vec<CalendarMonth>> {
    if count > MAX_CALENDAR_MONTHS {
        return None;
    }
    let mut month = CalendarMonth::new(start_year, start_month)?;
    let mut months = Vec::with_capacity(count);
    for _ in 0..count {
        months.push(month);
        month = month.next();
    }
    Some(months)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    /// Every photo used once, spread as evenly as possible (export)
    #[default]
    Even,
    /// Overlapping window that moves one photo per month (preview)
    Rolling,
}

impl Distribution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distribution::Even => "even",
            Distribution::Rolling => "rolling",
        }
    }

    /// Nominal collage size used for this kind of calendar
    pub fn canvas_size(&self) -> (u32, u32) {
        match self {
            Distribution::Even => (1200, 1000),
            Distribution::Rolling => (400, 300),
        }
    }
}

/// Splits `photos` into one ordered selection per month.
///
/// Each selection is shuffled and then capped at `max_per_month`.
pub fn distribute_photos<T: Clone>(
    photos: &[T],
    month_count: usize,
    distribution: Distribution,
    max_per_month: usize,
    rng: &mut StdRng,
) -> Vec<Vec<T>> {
    let n = photos.len();
    if n == 0 || month_count == 0 {
        return vec![Vec::new(); month_count];
    }

    let mut selections = match distribution {
        Distribution::Even => {
            let mut pool = photos.to_vec();
            pool.shuffle(rng);

            let base = n / month_count;
            let extra = n % month_count;
            (0..month_count)
                .map(|i| {
                    let start = i * base + i.min(extra);
                    let len = base + usize::from(i < extra);
                    pool[start..start + len].to_vec()
                })
                .collect::<Vec<_>>()
        }
        Distribution::Rolling => (0..month_count)
            .map(|i| {
                let start = i % n;
                let end = (start + ROLLING_WINDOW.min(n)).min(n);
                photos[start..end].to_vec()
            })
            .collect(),
    };

    for selection in &mut selections {
        selection.shuffle(rng);
        selection.truncate(max_per_month);
    }

    selections
}

#[derive(Debug, Clone)]
pub struct CalendarOptions {
    pub months: Vec<CalendarMonth>,
    pub distribution: Distribution,
    pub fit_mode: FitMode,
    pub width: u32,
    pub height: u32,
    /// Fixed seed for a reproducible calendar
    pub seed: Option<u64>,
    pub max_photos_per_collage: usize,
    pub personal_dates: Vec<PersonalDate>,
}

impl CalendarOptions {
    pub fn new(months: Vec<CalendarMonth>, distribution: Distribution) -> Self {
        let (width, height) = distribution.canvas_size();
        Self {
            months,
            distribution,
            fit_mode: FitMode::default(),
            width,
            height,
            seed: None,
            max_photos_per_collage: DEFAULT_MAX_PHOTOS_PER_COLLAGE,
            personal_dates: Vec::new(),
        }
    }
}

/// One rendered calendar page.
#[derive(Debug, Clone)]
pub struct CalendarSheet {
    pub month: CalendarMonth,
    pub photo_ids: Vec<String>,
    /// Missing when there were no photos or the month failed to render
    pub collage: Option<CompositionResult>,
    pub holidays: Vec<Holiday>,
    pub personal_dates: Vec<PersonalDate>,
    /// Gregorian month name, e.g. `ספטמבר`
    pub month_name: String,
    /// Hebrew month at the start of the page, e.g. `אלול תשפ״ה`
    pub hebrew_month: String,
}

pub struct CalendarRenderer {
    composer: Arc<CollageComposer>,
    holidays: HolidayService,
}

impl CalendarRenderer {
    pub fn new(composer: Arc<CollageComposer>, holidays: HolidayService) -> Self {
        Self { composer, holidays }
    }

    /// Renders every month in turn.
    ///
    /// A month whose collage fails is logged and left without one; only
    /// cancellation stops the whole calendar.
    pub async fn render(
        &self,
        photos: &[PhotoRef],
        options: &CalendarOptions,
        cancel: &CancelToken,
    ) -> Result<Vec<CalendarSheet>, CollageError> {
        let seed = options.seed.unwrap_or_else(rand::random);
        debug!("Distributing {} photos with seed {}", photos.len(), seed);

        let mut rng = StdRng::seed_from_u64(seed);
        let selections = distribute_photos(
            photos,
            options.months.len(),
            options.distribution,
            options.max_photos_per_collage,
            &mut rng,
        );
        let request = CompositionRequest::new(options.width, options.height, options.fit_mode);

        let mut sheets = Vec::with_capacity(options.months.len());
        for (month, selection) in options.months.iter().zip(selections) {
            let collage = if photos.is_empty() {
                None
            } else {
                match self.composer.compose_with(&selection, &request, cancel).await {
                    Ok(result) => Some(result),
                    Err(CollageError::Cancelled) => return Err(CollageError::Cancelled),
                    Err(e) => {
                        error!("Failed to generate collage for {}: {}", month.key(), e);
                        None
                    }
                }
            };

            let holidays = self.holidays.holidays_for(month.year, month.month).await;
            let hebrew_month = self.holidays.hebrew_month_label(month.year, month.month).await;

            sheets.push(CalendarSheet {
                month: *month,
                photo_ids: selection.iter().map(|p| p.id.clone()).collect(),
                collage,
                holidays,
                personal_dates: personal_dates_in(&options.personal_dates, *month),
                month_name: month.name().to_string(),
                hebrew_month,
            });
        }

        info!(
            "Rendered {} calendar months ({} distribution)",
            sheets.len(),
            options.distribution.as_str()
        );

        Ok(sheets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_months_wrap_year() {
        let months = calendar_months(2025, 9, 14).unwrap();

        assert_eq!(months.len(), 14);
        assert_eq!(months[0], CalendarMonth { year: 2025, month: 9 });
        assert_eq!(months[4], CalendarMonth { year: 2026, month: 1 });
        assert_eq!(months[13], CalendarMonth { year: 2026, month: 10 });
        assert!(calendar_months(2025, 13, 1).is_none());
    }

    #[test]
    fn test_calendar_months_rejects_huge_counts() {
        assert!(calendar_months(2025, 9, usize::MAX).is_none());
        assert!(calendar_months(2025, 9, MAX_CALENDAR_MONTHS + 1).is_none());
        assert_eq!(calendar_months(2025, 9, MAX_CALENDAR_MONTHS).unwrap().len(), MAX_CALENDAR_MONTHS);
    }

    #[test]
    fn test_personal_date_json() {
        let date: PersonalDate = serde_json::from_str(
            r#"{"id": "1", "title": "Noa", "date": "2025-09-14", "type": "birthday"}"#,
        )
        .unwrap();

        assert_eq!(date.kind, PersonalDateKind::Birthday);
        assert_eq!(date.kind.label(), "יום הולדת");
        assert!(date.description.is_none());
        assert!(serde_json::from_str::<PersonalDate>(
            r#"{"id": "2", "title": "x", "date": "2025-09-14", "type": "wedding"}"#
        )
        .is_err());
    }

    #[test]
    fn test_month_facts() {
        let feb = CalendarMonth::new(2028, 2).unwrap();
        assert_eq!(feb.days_in_month(), 29);
        assert_eq!(feb.key(), "2028-2");

        // 1 September 2025 is a Monday
        let september = CalendarMonth::new(2025, 9).unwrap();
        assert_eq!(september.first_weekday(), 1);
        assert_eq!(september.name(), "ספטמבר");
        assert!(september.contains(NaiveDate::from_ymd_opt(2025, 9, 30).unwrap()));
        assert!(!september.contains(NaiveDate::from_ymd_opt(2024, 9, 30).unwrap()));
    }

    #[test]
    fn test_even_distribution_uses_every_photo_once() {
        let photos: Vec<u32> = (0..30).collect();
        let mut rng = StdRng::seed_from_u64(7);

        let selections = distribute_photos(&photos, 14, Distribution::Even, usize::MAX, &mut rng);

        let sizes: Vec<usize> = selections.iter().map(Vec::len).collect();
        assert_eq!(&sizes[..2], &[3, 3]);
        assert!(sizes[2..].iter().all(|s| *s == 2));

        let mut all: Vec<u32> = selections.into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, photos);
    }

    #[test]
    fn test_even_distribution_is_capped() {
        let photos: Vec<u32> = (0..100).collect();
        let mut rng = StdRng::seed_from_u64(1);

        let selections = distribute_photos(&photos, 14, Distribution::Even, 6, &mut rng);

        assert!(selections.iter().all(|s| s.len() == 6));
    }

    #[test]
    fn test_rolling_window() {
        let photos: Vec<u32> = (0..10).collect();
        let mut rng = StdRng::seed_from_u64(3);

        let selections = distribute_photos(&photos, 14, Distribution::Rolling, usize::MAX, &mut rng);

        let mut first = selections[0].clone();
        first.sort_unstable();
        assert_eq!(first, (0..8).collect::<Vec<_>>());
        // Window is clamped at the end of the list
        let mut late = selections[5].clone();
        late.sort_unstable();
        assert_eq!(late, vec![5, 6, 7, 8, 9]);
        // and wraps back to the start
        let mut wrapped = selections[11].clone();
        wrapped.sort_unstable();
        assert_eq!(wrapped, (1..9).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_distribution() {
        let photos: Vec<u32> = (0..40).collect();

        let a = distribute_photos(&photos, 14, Distribution::Even, 6, &mut StdRng::seed_from_u64(42));
        let b = distribute_photos(&photos, 14, Distribution::Even, 6, &mut StdRng::seed_from_u64(42));

        assert_eq!(a, b);
    }

    #[test]
    fn test_no_photos() {
        let photos: Vec<u32> = Vec::new();
        let selections =
            distribute_photos(&photos, 3, Distribution::Even, 6, &mut StdRng::seed_from_u64(0));
        assert_eq!(selections, vec![Vec::<u32>::new(); 3]);
    }
}
