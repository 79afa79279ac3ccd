//! dotmap - draw points & boxes on a map
//!
//! This is the main entry point for the dotmap application.

use std::time::Instant;

use tracing::{error, info, warn};

use dotmap::{
    init_tracing, log_operation_end, log_operation_start, open_source, save_png, Config,
    DrawStats, Outline, Projection, Renderer, Result, Style, DEFAULT_MARGIN,
};

fn main() -> Result<()> {
    // Load configuration before logging is up; load errors surface via the
    // process exit status.
    let config = Config::load()?;

    init_tracing(&config.log_level);

    info!("Starting dotmap v{}", env!("CARGO_PKG_VERSION"));

    // Validate configuration
    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    let style = Style::from_config(&config).map_err(|e| {
        error!("Invalid style configuration: {}", e);
        e
    })?;

    // Load the outline file when it is drawn or used for calibration
    let outline = match &config.world_file {
        Some(path) if style.world_color.is_some() || config.fit_to_features => {
            let start = Instant::now();
            log_operation_start("load_outline", Some(&path.display().to_string()));
            let outline = Outline::load(path).map_err(|e| {
                error!("Failed to load outline file: {}", e);
                e
            })?;
            log_operation_end("load_outline", start, !outline.is_empty());
            Some(outline)
        }
        _ => None,
    };

    // Calibrate the projection exactly once, before any record is projected
    let projection = match (&outline, config.fit_to_features) {
        (Some(outline), true) => Projection::fit_points(
            outline.coordinates(),
            config.width,
            config.height,
            DEFAULT_MARGIN,
        ),
        _ => Projection::fit_extent(&config.extent, config.width, config.height, DEFAULT_MARGIN),
    }
    .map_err(|e| {
        error!("Projection calibration failed: {}", e);
        e
    })?;

    // Paint in fixed order: background, extent lines, outline, data
    let mut renderer = Renderer::new(
        projection,
        config.extent,
        config.width,
        config.height,
        style.background,
    );

    if let Some(color) = style.extent_color {
        renderer.draw_extent_lines(color);
    }

    if let (Some(outline), Some(color)) = (&outline, style.world_color) {
        renderer.draw_outline(outline, color);
    }

    let stats = match open_source(&config, style.tag_field())? {
        Some(mut source) => {
            let start = Instant::now();
            log_operation_start("data_pass", None);
            let stats = renderer.draw_records(source.as_mut(), &style).map_err(|e| {
                error!("Record stream failed: {}", e);
                e
            })?;
            log_operation_end("data_pass", start, true);
            stats
        }
        None => {
            // Preserved permissive fallback: no source still writes the
            // background-only image.
            warn!("No record source configured; writing a blank map");
            DrawStats::default()
        }
    };

    save_png(&renderer.into_image(), &config.image_name).map_err(|e| {
        error!("Failed to write image: {}", e);
        e
    })?;

    println!("Processed -> {}", stats.processed);
    Ok(())
}
