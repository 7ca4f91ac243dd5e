// ============================================================================
// Module : ui
// ============================================================================
// Gère toute l'interface utilisateur (Terminal User Interface)
// ============================================================================

pub mod chart;         // Graphique historique
pub mod events;        // Gestion des événements clavier
pub mod overlay;       // Carte des prix, menu, notifications
pub mod settings_form; // Formulaire des settings

use ratatui::Frame;

use crate::app::{App, Screen};

// Re-exports pour simplifier les imports
pub use events::{Event, EventHandler};

/// Dessine l'interface complète
///
/// CONCEPT RUST : Routing avec match sur enum
/// - Le compilateur garantit que chaque écran est géré
/// - Les notifications sont dessinées en dernier, par-dessus tout
pub fn render(frame: &mut Frame, app: &App) {
    match app.current_screen {
        Screen::Overlay => {
            overlay::render_overlay(frame, app);
            overlay::render_status_bar(frame, app);
        }
        Screen::Menu => {
            overlay::render_overlay(frame, app);
            overlay::render_menu(frame, app);
        }
        Screen::Settings => settings_form::render_settings(frame, app),
        Screen::Chart => chart::render_chart(frame, app),
    }

    overlay::render_notifications(frame, app);
}
