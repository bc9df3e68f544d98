use base64::{engine::general_purpose, Engine as _};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::{Filter, Rejection, Reply};

use crate::calendar::{
    calendar_months, personal_dates_on, CalendarOptions, CalendarRenderer, CalendarSheet, Distribution,
    PersonalDate,
};
use crate::collage_generator::{CancelToken, CollageComposer, CompositionRequest, CompositionTracker};
use crate::collage_types::{CompositionResult, FitMode, OutputFormat, PhotoRef};
use crate::config::{CalendarConfig, RequestLimits};
use crate::holidays::{holidays_on, Holiday};
use crate::image_loader::{decode_data_uri, shrink_oversized_upload, UploadLimits};
use crate::layout::templates;
use crate::warp_helpers::{collage_rejection, validation, with_state};

/// Services shared by the collage and calendar routes.
#[derive(Clone)]
pub struct AppState {
    pub composer: Arc<CollageComposer>,
    pub tracker: Arc<CompositionTracker>,
    pub calendar: Arc<CalendarRenderer>,
    pub calendar_config: CalendarConfig,
    pub upload: UploadLimits,
    pub limits: RequestLimits,
}

#[derive(Debug, Deserialize)]
pub struct PhotoPayload {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Base64 image bytes or a `data:` URI
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct CollageRequestBody {
    pub photos: Vec<PhotoPayload>,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub fit_mode: FitMode,
    pub layout: Option<String>,
    pub format: Option<OutputFormat>,
    /// Requests sharing a session cancel each other, newest wins
    pub session: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarRequestBody {
    pub photos: Vec<PhotoPayload>,
    #[serde(default)]
    pub distribution: Distribution,
    #[serde(default)]
    pub fit_mode: FitMode,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub seed: Option<u64>,
    pub start_year: Option<i32>,
    pub start_month: Option<u32>,
    pub months: Option<usize>,
    #[serde(default)]
    pub personal_dates: Vec<PersonalDate>,
}

#[derive(Debug, Serialize)]
pub struct CollageResponse {
    pub data_uri: String,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub placed: usize,
    pub failed: Vec<String>,
}

impl From<&CompositionResult> for CollageResponse {
    fn from(result: &CompositionResult) -> Self {
        Self {
            data_uri: result.to_data_uri(),
            format: result.format,
            width: result.width,
            height: result.height,
            pixel_width: result.pixel_width(),
            pixel_height: result.pixel_height(),
            placed: result.placed,
            failed: result.failed.clone(),
        }
    }
}

/// Everything marked on one day of a sheet.
#[derive(Debug, Serialize)]
pub struct DayResponse {
    pub day: u32,
    pub holidays: Vec<Holiday>,
    pub personal_dates: Vec<PersonalDate>,
}

#[derive(Debug, Serialize)]
pub struct SheetResponse {
    pub key: String,
    pub year: i32,
    pub month: u32,
    pub month_name: String,
    pub hebrew_month: String,
    pub days_in_month: u32,
    pub first_weekday: u32,
    pub photo_ids: Vec<String>,
    pub collage: Option<CollageResponse>,
    pub holidays: Vec<Holiday>,
    pub personal_dates: Vec<PersonalDate>,
    /// Only days with at least one entry
    pub days: Vec<DayResponse>,
}

fn marked_days(sheet: &CalendarSheet) -> Vec<DayResponse> {
    (1..=sheet.month.days_in_month())
        .filter_map(|day| {
            let date = chrono::NaiveDate::from_ymd_opt(sheet.month.year, sheet.month.month, day)?;
            let holidays: Vec<Holiday> = holidays_on(&sheet.holidays, date).into_iter().cloned().collect();
            let personal_dates: Vec<PersonalDate> = personal_dates_on(&sheet.personal_dates, date)
                .into_iter()
                .cloned()
                .collect();

            if holidays.is_empty() && personal_dates.is_empty() {
                return None;
            }
            Some(DayResponse {
                day,
                holidays,
                personal_dates,
            })
        })
        .collect()
}

impl From<&CalendarSheet> for SheetResponse {
    fn from(sheet: &CalendarSheet) -> Self {
        Self {
            key: sheet.month.key(),
            year: sheet.month.year,
            month: sheet.month.month,
            month_name: sheet.month_name.clone(),
            hebrew_month: sheet.hebrew_month.clone(),
            days_in_month: sheet.month.days_in_month(),
            first_weekday: sheet.month.first_weekday(),
            photo_ids: sheet.photo_ids.clone(),
            collage: sheet.collage.as_ref().map(CollageResponse::from),
            holidays: sheet.holidays.clone(),
            personal_dates: sheet.personal_dates.clone(),
            days: marked_days(sheet),
        }
    }
}

#[derive(Debug, Serialize)]
struct TemplateSummary {
    id: &'static str,
    name: &'static str,
    rows: usize,
    cols: usize,
    slots: usize,
}

fn check_canvas(width: u32, height: u32, limits: &RequestLimits) -> Result<(), Rejection> {
    let max = limits.max_canvas_dimension;
    if width > max || height > max {
        return Err(validation(format!(
            "Canvas {}x{} exceeds the {} unit limit",
            width, height, max
        )));
    }
    Ok(())
}

fn decode_payload(payload: &PhotoPayload) -> Result<Vec<u8>, String> {
    let data = payload.data.trim();
    if data.starts_with("data:") {
        decode_data_uri(data).map_err(|e| e.to_string())
    } else {
        general_purpose::STANDARD
            .decode(data)
            .map_err(|e| e.to_string())
    }
}

/// Turns uploaded payloads into in-memory photo references, shrinking
/// oversized uploads first.
pub async fn prepare_photos(
    payloads: Vec<PhotoPayload>,
    limits: UploadLimits,
) -> Result<Vec<PhotoRef>, Rejection> {
    let mut decoded = Vec::with_capacity(payloads.len());
    for payload in payloads {
        let bytes = decode_payload(&payload)
            .map_err(|e| validation(format!("Photo {} is not valid base64: {}", payload.id, e)))?;
        decoded.push((payload.id, payload.name, bytes));
    }

    tokio::task::spawn_blocking(move || {
        decoded
            .into_iter()
            .map(|(id, name, bytes)| {
                // Undecodable uploads are passed through and end up as placeholders
                let bytes = match shrink_oversized_upload(&bytes, &limits) {
                    Ok(shrunk) => shrunk.into_owned(),
                    Err(e) => {
                        warn!("Could not shrink upload {}: {}", id, e);
                        bytes
                    }
                };
                PhotoRef::from_bytes(id, bytes, name)
            })
            .collect()
    })
    .await
    .map_err(|e| validation(format!("Failed to prepare uploads: {}", e)))
}

pub async fn list_layouts() -> Result<impl Reply, Rejection> {
    let summaries: Vec<TemplateSummary> = templates()
        .iter()
        .map(|t| TemplateSummary {
            id: t.id,
            name: t.name,
            rows: t.rows,
            cols: t.cols,
            slots: t.slots(),
        })
        .collect();

    Ok(warp::reply::json(&summaries))
}

pub async fn create_collage(body: CollageRequestBody, state: AppState) -> Result<impl Reply, Rejection> {
    check_canvas(body.width, body.height, &state.limits)?;
    let photos = prepare_photos(body.photos, state.upload).await?;

    let mut request = CompositionRequest::new(body.width, body.height, body.fit_mode);
    if let Some(id) = body.layout {
        request = request.with_template(id);
    }
    request.format = body.format;

    let tracked = body.session.as_deref().map(|s| state.tracker.begin(s));
    let token = tracked
        .as_ref()
        .map(|t| t.token().clone())
        .unwrap_or_default();

    let result = state.composer.compose_with(&photos, &request, &token).await;
    if let Some(tracked) = &tracked {
        state.tracker.finish(tracked);
    }
    let result = result.map_err(collage_rejection)?;

    Ok(warp::reply::json(&CollageResponse::from(&result)))
}

pub async fn create_calendar(body: CalendarRequestBody, state: AppState) -> Result<impl Reply, Rejection> {
    let defaults = &state.calendar_config;
    let start_year = body.start_year.unwrap_or(defaults.start_year);
    let start_month = body.start_month.unwrap_or(defaults.start_month);
    let month_count = body.months.unwrap_or(defaults.month_count);

    if month_count > state.limits.max_months {
        return Err(validation(format!(
            "A calendar may have at most {} months, got {}",
            state.limits.max_months, month_count
        )));
    }
    let (default_width, default_height) = body.distribution.canvas_size();
    check_canvas(
        body.width.unwrap_or(default_width),
        body.height.unwrap_or(default_height),
        &state.limits,
    )?;

    let months = calendar_months(start_year, start_month, month_count).ok_or_else(|| {
        validation(format!(
            "Invalid calendar range: {} months from {}-{}",
            month_count, start_year, start_month
        ))
    })?;

    let photos = prepare_photos(body.photos, state.upload).await?;

    let mut options = CalendarOptions::new(months, body.distribution);
    options.fit_mode = body.fit_mode;
    options.seed = body.seed;
    options.max_photos_per_collage = defaults.max_photos_per_collage;
    options.personal_dates = body.personal_dates;
    if let Some(width) = body.width {
        options.width = width;
    }
    if let Some(height) = body.height {
        options.height = height;
    }

    info!(
        "Rendering {} month calendar from {} photos",
        month_count,
        photos.len()
    );

    let sheets = state
        .calendar
        .render(&photos, &options, &CancelToken::new())
        .await
        .map_err(collage_rejection)?;
    let sheets: Vec<SheetResponse> = sheets.iter().map(SheetResponse::from).collect();

    Ok(warp::reply::json(&sheets))
}

/// Build collage and calendar routes
pub fn build_collage_routes(
    state: AppState,
    max_request_bytes: u64,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let layouts = warp::path!("api" / "layouts")
        .and(warp::get())
        .and_then(list_layouts);

    let collages = warp::path!("api" / "collages")
        .and(warp::post())
        .and(warp::body::content_length_limit(max_request_bytes))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(create_collage);

    let calendar = warp::path!("api" / "calendar")
        .and(warp::post())
        .and(warp::body::content_length_limit(max_request_bytes))
        .and(warp::body::json())
        .and(with_state(state))
        .and_then(create_calendar);

    layouts.or(collages).or(calendar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{CalendarMonth, PersonalDateKind};
    use crate::collage_generator::ComposerSettings;
    use crate::holidays::{HolidayCategory, HolidayService};
    use crate::image_loader::ImageLoader;
    use crate::warp_helpers::handle_rejection;
    use warp::http::StatusCode;

    fn state() -> AppState {
        let composer = Arc::new(CollageComposer::new(
            Arc::new(ImageLoader::new()),
            ComposerSettings::default(),
        ));
        AppState {
            calendar: Arc::new(CalendarRenderer::new(composer.clone(), HolidayService::offline())),
            composer,
            tracker: Arc::new(CompositionTracker::new()),
            calendar_config: CalendarConfig {
                start_year: 2025,
                start_month: 9,
                month_count: 2,
                max_photos_per_collage: 6,
            },
            upload: UploadLimits::default(),
            limits: RequestLimits {
                max_canvas_dimension: 2000,
                max_months: 12,
            },
        }
    }

    fn collage_body(width: u32, height: u32) -> CollageRequestBody {
        CollageRequestBody {
            photos: Vec::new(),
            width,
            height,
            fit_mode: FitMode::Cover,
            layout: None,
            format: None,
            session: None,
        }
    }

    fn calendar_body(months: Option<usize>, width: Option<u32>, height: Option<u32>) -> CalendarRequestBody {
        CalendarRequestBody {
            photos: Vec::new(),
            distribution: Distribution::Rolling,
            fit_mode: FitMode::Cover,
            width,
            height,
            seed: Some(1),
            start_year: None,
            start_month: None,
            months,
            personal_dates: Vec::new(),
        }
    }

    async fn status_of(rejection: Rejection) -> StatusCode {
        handle_rejection(rejection).await.unwrap().into_response().status()
    }

    #[tokio::test]
    async fn test_collage_canvas_width_is_bounded() {
        let result = create_collage(collage_body(2001, 600), state()).await;
        assert_eq!(status_of(result.err().unwrap()).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_collage_canvas_height_is_bounded() {
        let result = create_collage(collage_body(800, u32::MAX), state()).await;
        assert_eq!(status_of(result.err().unwrap()).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_collage_at_canvas_limit_is_accepted() {
        let response = create_collage(collage_body(2000, 100), state())
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_calendar_month_count_is_bounded() {
        // GIVEN: more months than allowed, up to a count that would overflow an allocation
        for months in [13, usize::MAX] {
            // WHEN: requesting the calendar
            let result = create_calendar(calendar_body(Some(months), None, None), state()).await;

            // THEN: it is rejected as a bad request
            assert_eq!(status_of(result.err().unwrap()).await, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_calendar_canvas_is_bounded() {
        let wide = create_calendar(calendar_body(Some(1), Some(5000), None), state()).await;
        let tall = create_calendar(calendar_body(Some(1), None, Some(5000)), state()).await;

        assert_eq!(status_of(wide.err().unwrap()).await, StatusCode::BAD_REQUEST);
        assert_eq!(status_of(tall.err().unwrap()).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_calendar_within_limits() {
        let response = create_calendar(calendar_body(Some(12), Some(2000), Some(2000)), state())
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_sheet_groups_entries_by_day() {
        // GIVEN: a September sheet with holidays from the month and its neighbour
        let birthday = PersonalDate {
            id: "1".to_string(),
            title: "Noa".to_string(),
            date: chrono::NaiveDate::from_ymd_opt(2025, 9, 22).unwrap(),
            kind: PersonalDateKind::Birthday,
            description: None,
        };
        let sheet = CalendarSheet {
            month: CalendarMonth::new(2025, 9).unwrap(),
            photo_ids: Vec::new(),
            collage: None,
            holidays: vec![
                Holiday::new("ראש השנה", "2025-09-22", HolidayCategory::Holiday),
                Holiday::new("ליל סליחות", "2025-09-14", HolidayCategory::Holiday),
                Holiday::new("יום כיפור", "2025-10-01", HolidayCategory::Holiday),
            ],
            personal_dates: vec![birthday.clone()],
            month_name: "ספטמבר".to_string(),
            hebrew_month: "אלול תשפ״ה".to_string(),
        };

        // WHEN: building the response
        let response = SheetResponse::from(&sheet);

        // THEN: only days of this month with entries are listed
        let days: Vec<u32> = response.days.iter().map(|d| d.day).collect();
        assert_eq!(days, vec![14, 22]);
        assert_eq!(response.days[1].holidays[0].title, "ראש השנה");
        assert_eq!(response.days[1].personal_dates, vec![birthday]);
        assert!(response.days[0].personal_dates.is_empty());
        assert_eq!(response.hebrew_month, "אלול תשפ״ה");
    }

    fn png_base64() -> String {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255]));
        let mut buffer = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        general_purpose::STANDARD.encode(buffer.into_inner())
    }

    #[test]
    fn test_decode_payload_accepts_plain_and_data_uri() {
        let plain = PhotoPayload {
            id: "a".to_string(),
            name: String::new(),
            data: png_base64(),
        };
        let uri = PhotoPayload {
            id: "b".to_string(),
            name: String::new(),
            data: format!("data:image/png;base64,{}", png_base64()),
        };

        assert_eq!(decode_payload(&plain).unwrap(), decode_payload(&uri).unwrap());
    }

    #[tokio::test]
    async fn test_prepare_photos_rejects_bad_base64() {
        let payloads = vec![PhotoPayload {
            id: "broken".to_string(),
            name: String::new(),
            data: "***".to_string(),
        }];

        assert!(prepare_photos(payloads, UploadLimits::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_prepare_photos_keeps_order_and_names() {
        let payloads = vec![
            PhotoPayload {
                id: "first".to_string(),
                name: "first.png".to_string(),
                data: png_base64(),
            },
            PhotoPayload {
                id: "second".to_string(),
                name: "second.png".to_string(),
                data: png_base64(),
            },
        ];

        let photos = prepare_photos(payloads, UploadLimits::default()).await.unwrap();

        let ids: Vec<_> = photos.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert_eq!(photos[1].display_name, "second.png");
    }
}
