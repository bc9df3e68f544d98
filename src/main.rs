use log::{error, info};
use std::net::TcpListener;
use std::sync::Arc;
use warp::Filter;

use photo_calendar::calendar::CalendarRenderer;
use photo_calendar::collage_generator::{CollageComposer, CompositionTracker};
use photo_calendar::config::Config;
use photo_calendar::handlers_collage::{build_collage_routes, AppState};
use photo_calendar::handlers_health::build_health_routes;
use photo_calendar::handlers_holidays::build_holiday_routes;
use photo_calendar::holidays::{HebcalClient, HolidayService};
use photo_calendar::image_loader::ImageLoader;
use photo_calendar::warp_helpers::{cors, handle_rejection};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::from_env()?;
    let port = config.port;

    info!("Starting photo calendar server on Port {}", port);
    info!(
        "Output: {} at {}x, padding {}",
        config.output_format, config.output_scale, config.padding
    );
    info!("Concurrent photo loads: {}", config.max_concurrent_loads);

    if !is_port_available(&config.host, port) {
        error!("Port {} is already in use", port);
        return Err(format!("Port {} is already in use", port).into());
    }

    let (state, holidays) = initialize_services(&config)?;

    let routes = build_health_routes()
        .or(build_collage_routes(state, config.max_request_bytes))
        .or(build_holiday_routes(holidays))
        .with(cors())
        .with(warp::log("photo_calendar"))
        .recover(handle_rejection);

    let addr: std::net::IpAddr = config.host.parse()?;
    info!(
        "Server started successfully, listening on http://{}:{}",
        config.host, port
    );

    warp::serve(routes).run((addr, port)).await;

    Ok(())
}

fn is_port_available(host: &str, port: u16) -> bool {
    TcpListener::bind((host, port)).is_ok()
}

fn initialize_services(
    config: &Config,
) -> Result<(AppState, HolidayService), Box<dyn std::error::Error>> {
    let loader = ImageLoader::with_max_dimension(config.max_decode_dimension);
    let composer = Arc::new(CollageComposer::new(
        Arc::new(loader),
        config.composer_settings()?,
    ));
    info!("Collage composer initialized");

    let holidays = if config.holiday_lookup {
        info!("Holiday lookup via {}", config.hebcal_url);
        HolidayService::new(Arc::new(
            HebcalClient::new(config.hebcal_url.clone())
                .with_converter_url(config.hebcal_converter_url.clone()),
        ))
    } else {
        info!("Holiday lookup disabled, using built-in table");
        HolidayService::offline()
    };

    let calendar = Arc::new(CalendarRenderer::new(composer.clone(), holidays.clone()));

    let state = AppState {
        composer,
        tracker: Arc::new(CompositionTracker::new()),
        calendar,
        calendar_config: config.calendar.clone(),
        upload: config.upload,
        limits: config.limits,
    };

    Ok((state, holidays))
}
