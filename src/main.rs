use box_annotate::app::AnnotateApp;
use box_annotate::config::{AppConfig, CliArgs};
use clap::Parser;
use eframe::egui;

fn main() {
    let args = CliArgs::parse();

    let config = match AppConfig::resolve(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    env_logger::Builder::new()
        .filter_level(config.log_level.to_level_filter())
        .parse_default_env()
        .init();

    if let Some(path) = &args.image {
        if !path.exists() {
            eprintln!("File not found: {}", path.display());
            std::process::exit(1);
        }
    }

    log::info!("Starting box-annotate against {}", config.backend_url);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("box-annotate"),
        ..Default::default()
    };

    let image = args.image.clone();
    if let Err(e) = eframe::run_native(
        "box-annotate",
        options,
        Box::new(move |cc| Ok(Box::new(AnnotateApp::new(cc, config, image)))),
    ) {
        log::error!("Application error: {}", e);
        std::process::exit(1);
    }
}
