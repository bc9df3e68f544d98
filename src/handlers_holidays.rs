use chrono::{Datelike, NaiveDate};
use serde_json::json;
use warp::{Filter, Rejection, Reply};

use crate::hebrew_dates::gregorian_month_name;
use crate::holidays::HolidayService;
use crate::warp_helpers::validation;

pub async fn get_holidays(year: i32, month: u32, service: HolidayService) -> Result<impl Reply, Rejection> {
    if !(1..=12).contains(&month) {
        return Err(validation(format!("Invalid month: {}", month)));
    }

    let holidays = service.holidays_for(year, month).await;

    Ok(warp::reply::json(&json!({
        "year": year,
        "month": month,
        "holidays": holidays
    })))
}

/// Hebrew reading of a Gregorian day. `hebrew_date` is null when the
/// converter is unavailable; `hebrew_month` then falls back to an estimate.
pub async fn get_hebrew_date(
    year: i32,
    month: u32,
    day: u32,
    service: HolidayService,
) -> Result<impl Reply, Rejection> {
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| validation(format!("Invalid date: {}-{}-{}", year, month, day)))?;

    let hebrew_date = service.hebrew_date(date).await;
    let hebrew_month = match &hebrew_date {
        Some(hebrew) => hebrew.month_label(),
        None => service.hebrew_month_label(date.year(), date.month()).await,
    };

    Ok(warp::reply::json(&json!({
        "date": date,
        "month_name": gregorian_month_name(month),
        "hebrew_date": hebrew_date,
        "hebrew_month": hebrew_month
    })))
}

pub fn build_holiday_routes(
    service: HolidayService,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let converter = service.clone();

    let holidays = warp::path!("api" / "holidays" / i32 / u32)
        .and(warp::get())
        .and(warp::any().map(move || service.clone()))
        .and_then(get_holidays);

    let hebrew_date = warp::path!("api" / "hebrew-date" / i32 / u32 / u32)
        .and(warp::get())
        .and(warp::any().map(move || converter.clone()))
        .and_then(get_hebrew_date);

    holidays.or(hebrew_date)
}
