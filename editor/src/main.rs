use std::path::PathBuf;

use clap::Parser;

use levelforge_editor::EditorConfig;
use levelforge_editor::session::{Session, demo_course};

/// Headless LevelForge editing session.
#[derive(Parser, Debug)]
#[command(name = "levelforge", version, about)]
struct Args {
    /// Path to the editor configuration file
    #[arg(long, default_value = "levelforge.toml")]
    config: PathBuf,

    /// Number of editor ticks to run
    #[arg(long, default_value = "28")]
    ticks: u64,
}

fn main() {
    let args = Args::parse();

    // Logging is not up yet; report config problems once it is.
    let loaded = EditorConfig::load(&args.config);
    let config = loaded.as_ref().cloned().unwrap_or_default();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log.level.as_str()),
    )
    .init();
    levelforge_core::init();

    match &loaded {
        Ok(_) => log::info!("Loaded configuration from {}", args.config.display()),
        Err(err) => log::warn!("{err}; using default configuration"),
    }

    let mut session = Session::new(&config, demo_course());
    let report = session.run(args.ticks);

    log::info!(
        "Session finished after {} ticks: {} updates, {} render tasks, {} views, {} models loaded",
        report.ticks,
        report.updates,
        report.tasks_executed,
        report.live_views,
        report.loaded_models
    );
    for line in &report.history {
        log::info!("{line}");
    }
}
