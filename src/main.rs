// ============================================================================
// Cryptoverlay - Overlay de prix crypto dans le terminal
// ============================================================================
// Affiche les prix CoinGecko pour une grille coin × devise, déclenche des
// alarmes de prix et affiche un graphique historique
//
// ARCHITECTURE :
// 1. Event loop (thread principal) : rendu, clavier, timer de rafraîchissement
// 2. Worker (thread + runtime tokio) : une tâche async par requête HTTP
// 3. Channels mpsc : commandes vers le worker, résultats vers l'event loop
//
// App n'est modifiée que dans l'event loop : les réponses sont appliquées
// une par une, contre la configuration du moment
// ============================================================================

use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Instant;

use anyhow::{Context, Result};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    style::Print,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, error, info, warn};

use cryptoverlay::app::{App, Screen};
use cryptoverlay::models::PriceSeries;
use cryptoverlay::settings::SettingsStore;
use cryptoverlay::ui::{events::EventHandler, render, Event};
use cryptoverlay::worker::{spawn_background_worker, AppCommand, AppResult, CoinGecko};

type Tui = Terminal<CrosstermBackend<io::Stdout>>;

// ============================================================================
// Initialisation du logging
// ============================================================================
// Les println! ne fonctionnent pas une fois le TUI lancé : on log vers un
// fichier avec rotation quotidienne
// ============================================================================

/// Répertoire des logs
///
/// - Linux : ~/.local/share/cryptoverlay/logs
/// - macOS : ~/Library/Application Support/cryptoverlay/logs
/// - Windows : C:\Users\<user>\AppData\Local\cryptoverlay\logs
fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("cryptoverlay").join("logs"))
        .unwrap_or_else(|| PathBuf::from("./logs"))
}

/// Initialise le système de logging vers fichier
///
/// ```bash
/// tail -f ~/.local/share/cryptoverlay/logs/cryptoverlay.log.*
/// RUST_LOG=cryptoverlay=trace cargo run
/// ```
fn init_logging() -> Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_dir = log_directory();
    std::fs::create_dir_all(&log_dir).context("Échec de la création du répertoire de logs")?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir.clone(), "cryptoverlay.log");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cryptoverlay=debug,info".into()),
        )
        .init();

    info!(?log_dir, "Logging initialisé");
    Ok(())
}

// ============================================================================
// Point d'entrée du programme
// ============================================================================

fn main() -> Result<()> {
    init_logging().unwrap_or_else(|e| {
        eprintln!("⚠️  Warning: Failed to initialize logging: {}", e);
        eprintln!("   Continuing without logging...");
    });

    info!("Cryptoverlay starting up");

    let store = SettingsStore::default_location();
    let settings = store.load_or_default();
    info!(
        path = ?store.path(),
        coins = %settings.coins,
        vs = %settings.vs,
        refresh_ms = settings.refresh_ms(),
        "Settings ready"
    );

    let mut app = App::from_settings(settings);

    let (command_tx, command_rx) = mpsc::channel::<AppCommand>();
    let (result_tx, result_rx) = mpsc::channel::<AppResult>();

    info!("Spawning background worker thread");
    spawn_background_worker(CoinGecko, command_rx, result_tx);

    debug!("Setting up terminal");
    let mut terminal = setup_terminal()?;

    let events = EventHandler::new();

    info!("Starting event loop");
    let result = run(&mut terminal, &mut app, &events, &command_tx, &result_rx, &store);

    debug!("Restoring terminal");
    restore_terminal(&mut terminal)?;

    match &result {
        Ok(_) => info!("Application exited normally"),
        Err(e) => error!(error = ?e, "Application exited with error"),
    }

    result
}

// ============================================================================
// Event Loop Principal
// ============================================================================
// À chaque itération :
// 0. Appliquer les résultats du worker
// 1. Lancer le rafraîchissement si le timer est échu
// 2. Dessiner l'interface
// 3. Traiter les événements clavier
// 4. Tick (expiration des notifications)
// ============================================================================

fn run(
    terminal: &mut Tui,
    app: &mut App,
    events: &EventHandler,
    command_tx: &mpsc::Sender<AppCommand>,
    result_rx: &mpsc::Receiver<AppResult>,
    store: &SettingsStore,
) -> Result<()> {
    let mut worker_alive = true;

    while app.is_running() {
        // 0. Résultats du worker (tous ceux qui sont arrivés)
        loop {
            match result_rx.try_recv() {
                Ok(result) => {
                    let alarms = apply_result(app, result);
                    if alarms > 0 {
                        beep(terminal);
                    }
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    if worker_alive {
                        error!("Worker thread disconnected!");
                        app.status_message = Some("Background worker stopped, prices will not refresh".to_string());
                        worker_alive = false;
                    }
                    break;
                }
            }
        }

        // 1. Timer de rafraîchissement
        let now = Instant::now();
        if app.refresh_due(now) {
            for request in app.start_refresh(now) {
                if command_tx.send(AppCommand::FetchPrices(request)).is_err() {
                    warn!("Worker unavailable, price request dropped");
                }
            }
        }

        // 2. Rendu
        terminal.draw(|frame| render(frame, app))?;

        // 3. Input
        match events.next() {
            Ok(event) => handle_event(app, event, command_tx, store),
            Err(e) => warn!(error = ?e, "Failed to read terminal event"),
        }

        // 4. Update
        app.tick(Instant::now());
    }

    Ok(())
}

/// Applique un résultat du worker, retourne le nombre d'alarmes déclenchées
fn apply_result(app: &mut App, result: AppResult) -> usize {
    match result {
        AppResult::PricesLoaded { request, reply } => app.apply_price_reply(&request, reply, Instant::now()).len(),
        AppResult::ChartLoaded { series } => {
            info!(coin = %series.coin, points = series.len(), "Chart data received");
            app.set_chart(series);
            0
        }
    }
}

/// Bip du terminal (alarme de prix)
fn beep(terminal: &mut Tui) {
    if let Err(e) = execute!(terminal.backend_mut(), Print('\x07')) {
        debug!(error = ?e, "Failed to ring terminal bell");
    }
}

// ============================================================================
// Gestion des événements
// ============================================================================

fn send_chart_request(app: &mut App, command_tx: &mpsc::Sender<AppCommand>) {
    match app.chart_request() {
        Some(request) => {
            info!(coin = %request.coin, currency = %request.currency, days = request.days, "Requesting market chart");
            if command_tx.send(AppCommand::FetchChart(request)).is_err() {
                warn!("Worker unavailable, chart request dropped");
                app.set_chart(PriceSeries::default());
            }
        }
        None => app.status_message = Some("No coin/currency configured".to_string()),
    }
}

fn apply_and_save(app: &mut App, store: &SettingsStore) {
    let Some(settings) = app.apply_settings() else {
        return;
    };

    match store.save(&settings) {
        Ok(()) => app.status_message = Some(format!("Settings saved to {}", store.path().display())),
        Err(e) => {
            error!(error = ?e, "Failed to save settings");
            app.status_message = Some("Settings applied but could not be saved (see log)".to_string());
        }
    }
}

/// Traite un événement et met à jour l'état de l'application
///
/// CONCEPT RUST : Pattern matching avec guards
/// - L'édition d'un champ capture toutes les touches
/// - Sinon, chaque écran a ses raccourcis
fn handle_event(app: &mut App, event: Event, command_tx: &mpsc::Sender<AppCommand>, store: &SettingsStore) {
    use cryptoverlay::ui::events::{
        get_char_from_event, is_apply_event, is_backspace_event, is_chart_event, is_down_event,
        is_enter_event, is_escape_event, is_interrupt_event, is_menu_event, is_next_range_event,
        is_previous_range_event, is_quit_event, is_refresh_event, is_text_char_event, is_up_event,
    };

    if let Event::Key(_) = event {
        app.status_message = None;
        if !is_quit_event(&event) || app.is_editing_field() {
            app.cancel_quit();
        }
    }

    match event {
        Event::Key(_) if is_interrupt_event(&event) => {
            info!("User interrupted");
            app.quit();
        }

        // ========================================
        // Édition d'un champ du formulaire
        // ========================================
        Event::Key(_) if app.is_editing_field() => {
            if is_escape_event(&event) {
                app.cancel_field_edit();
            } else if is_enter_event(&event) {
                app.commit_field_edit();
            } else if is_backspace_event(&event) {
                app.backspace();
            } else if is_text_char_event(&event) {
                if let Some(c) = get_char_from_event(&event) {
                    app.append_char(c);
                }
            }
        }

        // ========================================
        // Overlay
        // ========================================
        Event::Key(_) if is_quit_event(&event) && app.is_on(Screen::Overlay) => {
            if app.is_awaiting_quit_confirmation() {
                info!("User confirmed quit");
                app.quit();
            } else {
                info!("User requested quit (awaiting confirmation)");
                app.request_quit();
            }
        }
        Event::Key(_) if is_menu_event(&event) && app.is_on(Screen::Overlay) => {
            debug!("User opened menu");
            app.open_menu();
        }
        Event::Key(_) if is_refresh_event(&event) && app.is_on(Screen::Overlay) => {
            info!("User requested refresh");
            app.request_refresh();
        }
        Event::Key(_) if is_chart_event(&event) && app.is_on(Screen::Overlay) => {
            app.show_chart();
            send_chart_request(app, command_tx);
        }

        // ========================================
        // Menu
        // ========================================
        Event::Key(_) if is_up_event(&event) && app.is_on(Screen::Menu) => app.menu_up(),
        Event::Key(_) if is_down_event(&event) && app.is_on(Screen::Menu) => app.menu_down(),
        Event::Key(_) if is_enter_event(&event) && app.is_on(Screen::Menu) => {
            info!(item = app.selected_menu_item().label(), "User activated menu item");
            app.activate_menu();
        }
        Event::Key(_) if (is_escape_event(&event) || is_menu_event(&event)) && app.is_on(Screen::Menu) => {
            app.show_overlay_screen();
        }

        // ========================================
        // Settings
        // ========================================
        Event::Key(_) if is_up_event(&event) && app.is_on(Screen::Settings) => app.form_up(),
        Event::Key(_) if is_down_event(&event) && app.is_on(Screen::Settings) => app.form_down(),
        Event::Key(_) if is_enter_event(&event) && app.is_on(Screen::Settings) => app.start_field_edit(),
        Event::Key(_) if is_apply_event(&event) && app.is_on(Screen::Settings) => {
            info!("User applied settings");
            apply_and_save(app, store);
        }
        Event::Key(_) if is_chart_event(&event) && app.is_on(Screen::Settings) => {
            send_chart_request(app, command_tx);
        }
        Event::Key(_) if is_next_range_event(&event) && app.is_on(Screen::Settings) => app.next_chart_range(),
        Event::Key(_) if is_previous_range_event(&event) && app.is_on(Screen::Settings) => {
            app.previous_chart_range()
        }
        Event::Key(_) if is_escape_event(&event) && app.is_on(Screen::Settings) => {
            debug!("User closed settings");
            app.show_overlay_screen();
        }

        // ========================================
        // Chart
        // ========================================
        Event::Key(_) if is_next_range_event(&event) && app.is_on(Screen::Chart) => {
            app.next_chart_range();
            info!(range = app.chart_range.label(), "User changed to next chart range");
            send_chart_request(app, command_tx);
        }
        Event::Key(_) if is_previous_range_event(&event) && app.is_on(Screen::Chart) => {
            app.previous_chart_range();
            info!(range = app.chart_range.label(), "User changed to previous chart range");
            send_chart_request(app, command_tx);
        }
        Event::Key(_) if (is_chart_event(&event) || is_refresh_event(&event)) && app.is_on(Screen::Chart) => {
            send_chart_request(app, command_tx);
        }
        Event::Key(_) if is_escape_event(&event) && app.is_on(Screen::Chart) => {
            debug!("User returned to overlay");
            app.show_overlay_screen();
        }

        Event::Key(_) | Event::Tick => {}
    }
}

// ============================================================================
// Setup et restauration du terminal
// ============================================================================
// IMPORTANT : Toujours restaurer le terminal avant de quitter !
// ============================================================================

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(|e| e.into())
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    Ok(())
}
