mod app;
mod codec;
mod error;
mod history;
mod launch;
mod prompts;
mod service;
mod settings;
mod tasks;
mod viewport;
mod zoomable;

use std::sync::Arc;

use anyhow::{anyhow, Context};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli_args = std::env::args().skip(1).collect::<Vec<_>>();
    let (initial_request, initial_status) = match launch::parse_launch_request_from_args(&cli_args)
    {
        Ok(request) => (request, None),
        Err(err) => {
            log::warn!("Ignoring launch arguments: {err}");
            (None, Some(format!("Launch URL/args error: {err}")))
        }
    };

    let service: Arc<dyn service::GenerativeImageService> = Arc::new(
        service::GeminiClient::from_env().context("Could not set up the image service client")?,
    );
    let settings_store = settings::SettingsStore::from_env();
    if let Some(path) = settings_store.path() {
        log::info!("Settings file: {}", path.display());
    }

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title("Vision Lab")
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([720.0, 520.0])
            .with_resizable(true),
        ..Default::default()
    };

    eframe::run_native(
        "Vision Lab",
        native_options,
        Box::new(move |_cc| {
            Ok(Box::new(app::VisionLabApp::new(
                Arc::clone(&service),
                settings_store.clone(),
                initial_request.clone(),
                initial_status.clone(),
            )))
        }),
    )
    .map_err(|err| anyhow!("{err}"))
}
