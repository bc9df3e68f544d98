pub mod calendar;
pub mod cell_effects;
pub mod collage_generator;
pub mod collage_types;
pub mod config;
pub mod fit_resolver;
pub mod handlers_collage;
pub mod handlers_health;
pub mod handlers_holidays;
pub mod hebrew_dates;
pub mod holidays;
pub mod image_loader;
pub mod layout;
pub mod placeholder;
pub mod surface;
pub mod warp_helpers;
