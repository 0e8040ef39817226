mod canvas;
mod cli;
mod config;
mod controller;
mod display;
mod error;
mod input;
mod k8s;
mod model;
mod provider;
mod snapshot;
#[cfg(test)]
mod testing;
mod ui;

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use canvas::TerminalCanvas;
use clap::Parser;
use cli::CliArgs;
use config::Settings;
use controller::Controller;
use crossterm::cursor::{Hide, Show};
use crossterm::event::{
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use input::TerminalInput;
use k8s::KubeGateway;
use tracing::info;
use tracing_subscriber::EnvFilter;

type Dashboard = Controller<KubeGateway, TerminalInput, TerminalCanvas>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter, args.log_file.as_deref())?;

    let mut settings = Settings::load(args.config.as_deref())?;
    settings.apply_cli(&args);
    if let Some(source) = &settings.source {
        info!(path = %source.display(), "settings loaded");
    }

    let gateway = KubeGateway::connect(settings.kubeconfig.as_deref(), settings.context.clone())
        .await
        .context("failed to connect to Kubernetes")?;
    let namespace = settings.initial_namespace(gateway.default_namespace());
    info!(
        context = %gateway.context(),
        cluster = %gateway.cluster(),
        %namespace,
        "connected"
    );

    let mut controller = Controller::new(
        Arc::new(gateway),
        Arc::new(TerminalInput),
        TerminalCanvas::stdout(),
        namespace,
        settings.controller_settings(),
    );
    run(&mut controller).await
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .compact();

    // stdout belongs to the dashboard
    let _ = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder.with_writer(Mutex::new(file)).try_init()
        }
        None => builder.with_writer(io::sink).try_init(),
    };

    Ok(())
}

async fn run(controller: &mut Dashboard) -> Result<()> {
    let keyboard_enhanced = init_terminal()?;
    let run_result = controller
        .run()
        .await
        .context("dashboard stopped unexpectedly");
    let restore_result = restore_terminal(keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<bool> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, Hide).context("failed to enter alternate screen")?;

    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
        )
        .context("failed to enable keyboard enhancement")?;
    }
    Ok(keyboard_enhanced)
}

fn restore_terminal(keyboard_enhanced: bool) -> Result<()> {
    let mut stdout = io::stdout();
    if keyboard_enhanced {
        execute!(stdout, PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(stdout, LeaveAlternateScreen, Show).context("failed to leave alternate screen")?;
    Ok(())
}
