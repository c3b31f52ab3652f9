use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{Event, KeyCode};
use tokio::sync::watch;

use rug_chart::chart::RugChart;
use rug_chart::config::{Config, DEFAULT_CONFIG_PATH};
use rug_chart::event::EventBus;
use rug_chart::sim::{RoundSimulator, SimConfig};
use rug_chart::surface::ChartRenderer;
use rug_chart::ui::{self, AppState};

const SIM_TICK_MS: u64 = 250;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load(Path::new(DEFAULT_CONFIG_PATH)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Expected a TOML file at {DEFAULT_CONFIG_PATH}");
            std::process::exit(1);
        }
    };

    // Init tracing (log to file so it doesn't interfere with TUI)
    let log_file = std::fs::File::create("rug-chart.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                config
                    .logging
                    .level
                    .parse()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            }),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .json()
        .init();

    tracing::info!(
        player = config.local_player_id().unwrap_or("-"),
        ticks_per_candle = config.chart.ticks_per_candle,
        animations = config.animation.enabled,
        "Starting rug-chart"
    );

    let bus = EventBus::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (pause_tx, pause_rx) = watch::channel(false);

    // Synthetic game feed
    let sim_cfg = SimConfig {
        ticks_per_candle: config.chart.ticks_per_candle,
        local_player_id: config.local_player_id().map(str::to_string),
        ..SimConfig::default()
    };
    let seed = chrono::Utc::now().timestamp_millis().unsigned_abs();
    let feed_bus = bus.clone();
    let mut feed_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        let mut sim = RoundSimulator::new(seed, sim_cfg);
        let mut interval = tokio::time::interval(Duration::from_millis(SIM_TICK_MS));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if *pause_rx.borrow() {
                        continue;
                    }
                    for event in sim.step() {
                        feed_bus.publish(event);
                    }
                }
                _ = feed_shutdown.changed() => {
                    tracing::debug!("Simulator stopped");
                    break;
                }
            }
        }
    });

    // Ctrl+C handler
    let ctrl_c_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Ctrl+C received");
        let _ = ctrl_c_shutdown.send(true);
    });

    let mut chart = RugChart::new(&config);
    chart.attach(&bus);
    let renderer = ChartRenderer::default();
    let mut app_state = AppState::new(config.animation.enabled, config.ui.mobile);
    let started = Instant::now();

    // TUI main loop
    let mut terminal = ratatui::init();
    loop {
        let now_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        chart.pump(now_ms);
        let display = chart.frame(now_ms);
        let controller = chart.controller();
        app_state.tick_count = controller.tick_count();
        app_state.history_len = controller.series().len();
        app_state.position = *controller.position();
        let last_round = controller.last_round_snapshot();

        terminal.draw(|frame| {
            ui::render(frame, &app_state, &display, last_round.as_deref(), &renderer)
        })?;

        // Handle input (non-blocking with timeout)
        if crossterm::event::poll(Duration::from_millis(config.ui.refresh_rate_ms))? {
            if let Event::Key(key) = crossterm::event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Char('Q') => {
                        tracing::info!("User quit");
                        let _ = shutdown_tx.send(true);
                        break;
                    }
                    KeyCode::Char('p') | KeyCode::Char('P') => {
                        app_state.paused = !app_state.paused;
                        let _ = pause_tx.send(app_state.paused);
                        tracing::info!(paused = app_state.paused, "Feed pause toggled");
                    }
                    KeyCode::Char('a') | KeyCode::Char('A') => {
                        app_state.animations = !app_state.animations;
                        chart
                            .controller_mut()
                            .set_animations_enabled(app_state.animations);
                    }
                    KeyCode::Char('m') | KeyCode::Char('M') => {
                        app_state.mobile = !app_state.mobile;
                        chart.controller_mut().set_mobile(app_state.mobile);
                    }
                    _ => {}
                }
            }
        }

        if *shutdown_rx.borrow() {
            break;
        }
    }

    chart.detach();
    ratatui::restore();
    tracing::info!("Shutdown complete");
    println!("Goodbye! Check rug-chart.log for details.");
    Ok(())
}
