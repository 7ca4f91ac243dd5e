// ============================================================================
// Overlay - Rendu de la carte des prix
// ============================================================================
// Dessine la carte flottante des prix, le menu et les notifications
//
// CONCEPTS RATATUI :
// 1. Rect calculé à la main : la carte est positionnée en (posx, posy)
// 2. Clear : efface la zone avant de dessiner un popup par-dessus
// ============================================================================

use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, MenuItem};
use crate::models::SlotState;

const HINT: &str = "Press m for menu.";

/// Largeur maximale d'une notification
const NOTIFICATION_WIDTH: u16 = 48;

// ============================================================================
// Placement
// ============================================================================

/// Calcule la zone de la carte à partir de la position demandée
///
/// CONCEPT : Clamp dans l'écran
/// - Position négative : collée au bord gauche / haut
/// - Position trop grande : collée au bord droit / bas
/// - Carte plus grande que l'écran : tronquée à l'écran
pub fn overlay_rect(area: Rect, position: (i32, i32), width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);

    let max_x = i32::from(area.width - width);
    let max_y = i32::from(area.height - height);
    let x = position.0.clamp(0, max_x) as u16;
    let y = position.1.clamp(0, max_y) as u16;

    Rect::new(area.x + x, area.y + y, width, height)
}

/// Zone disponible pour la carte : l'écran sans la barre de statut
pub fn overlay_area(screen: Rect) -> Rect {
    Rect {
        height: screen.height.saturating_sub(1),
        ..screen
    }
}

/// Dernière ligne de l'écran (None si l'écran est vide)
pub fn status_bar_area(screen: Rect) -> Option<Rect> {
    (screen.height > 0).then(|| Rect::new(screen.x, screen.y + screen.height - 1, screen.width, 1))
}

/// Zone centrée de taille fixe (popups)
pub fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

// ============================================================================
// Carte des prix
// ============================================================================

fn slot_style(state: &SlotState) -> Style {
    match state {
        SlotState::Quoted(_) => match state.change_24h() {
            Some(change) if change >= 0.0 => Style::default().fg(Color::Green),
            Some(_) => Style::default().fg(Color::Red),
            None => Style::default().fg(Color::White),
        },
        SlotState::Pending => Style::default().fg(Color::Gray),
        _ => Style::default().fg(Color::Yellow),
    }
}

/// Lignes de la carte : chaque case, puis la ligne d'aide
fn overlay_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    for slot in app.grid.slots() {
        let style = slot_style(slot.state);
        for (i, text) in slot.text().lines().enumerate() {
            let line_style = if i == 0 {
                style.add_modifier(Modifier::BOLD)
            } else {
                style
            };
            lines.push(Line::from(Span::styled(text.to_string(), line_style)));
        }
    }

    lines.push(Line::from(Span::styled(
        HINT,
        Style::default().fg(Color::DarkGray),
    )));
    lines
}

/// Dessine la carte des prix (si visible)
pub fn render_overlay(frame: &mut Frame, app: &App) {
    if !app.overlay_visible {
        return;
    }

    let lines = overlay_lines(app);
    let content_width = lines.iter().map(Line::width).max().unwrap_or(0) as u16;
    let width = content_width.saturating_add(4);
    let height = (lines.len() as u16).saturating_add(2);

    let area = overlay_rect(overlay_area(frame.size()), app.overlay_position(), width, height);

    let title = if app.is_refreshing() { " ⟳ " } else { "" };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(title);

    let paragraph = Paragraph::new(lines).block(block);

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

// ============================================================================
// Menu
// ============================================================================

/// Dessine le menu (équivalent du menu de la barre système)
pub fn render_menu(frame: &mut Frame, app: &App) {
    let area = centered_rect(frame.size(), 24, MenuItem::ALL.len() as u16 + 2);

    let items: Vec<ListItem> = MenuItem::ALL
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let style = if index == app.menu_index {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
                    .add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {}", item.label())).style(style)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Menu "),
    );

    frame.render_widget(Clear, area);
    frame.render_widget(list, area);
}

// ============================================================================
// Notifications et barre de statut
// ============================================================================

/// Dessine les notifications d'alarme en haut à droite
pub fn render_notifications(frame: &mut Frame, app: &App) {
    let screen = frame.size();
    let width = NOTIFICATION_WIDTH.min(screen.width);
    let mut y = screen.y;

    for notification in &app.notifications {
        let height = 4;
        if y + height > screen.y + screen.height {
            break;
        }
        let area = Rect::new(screen.x + screen.width - width, y, width, height);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(format!(" 🔔 {} ", notification.title));

        let paragraph = Paragraph::new(notification.message.as_str())
            .block(block)
            .wrap(Wrap { trim: true });

        frame.render_widget(Clear, area);
        frame.render_widget(paragraph, area);
        y += height;
    }
}

/// Dessine la barre de statut (dernière ligne de l'écran)
pub fn render_status_bar(frame: &mut Frame, app: &App) {
    let Some(area) = status_bar_area(frame.size()) else {
        return;
    };

    let line = if app.is_awaiting_quit_confirmation() {
        Line::from(vec![
            Span::styled("⚠  Press ", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::styled(
                "[q]",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD).add_modifier(Modifier::SLOW_BLINK),
            ),
            Span::styled(
                " again to quit, any other key to cancel ⚠",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
        ])
    } else if let Some(message) = &app.status_message {
        Line::from(Span::styled(message.clone(), Style::default().fg(Color::Yellow)))
    } else {
        Line::from(vec![
            Span::styled("[m]", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::raw(" Menu  "),
            Span::styled("[r]", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::raw(" Refresh  "),
            Span::styled("[c]", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::raw(" Chart  "),
            Span::styled("[q]", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::raw(" Quit"),
        ])
    };

    frame.render_widget(Paragraph::new(line).alignment(Alignment::Left), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    /// Dessine l'interface complète et retourne les lignes de l'écran
    fn draw(app: &App, width: u16, height: u16) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| crate::ui::render(frame, app)).unwrap();
        let buffer = terminal.backend().buffer();
        (0..height)
            .map(|y| (0..width).map(|x| buffer.get(x, y).symbol()).collect())
            .collect()
    }

    #[test]
    fn test_overlay_rect_inside_screen() {
        let screen = Rect::new(0, 0, 80, 24);
        assert_eq!(overlay_rect(screen, (20, 5), 30, 10), Rect::new(20, 5, 30, 10));
    }

    #[test]
    fn test_overlay_rect_is_clamped() {
        let screen = Rect::new(0, 0, 80, 24);
        // Position par défaut (20, 300) : collée en bas
        assert_eq!(overlay_rect(screen, (20, 300), 30, 10), Rect::new(20, 14, 30, 10));
        assert_eq!(overlay_rect(screen, (-5, -5), 30, 10), Rect::new(0, 0, 30, 10));
        assert_eq!(overlay_rect(screen, (0, 0), 200, 50), Rect::new(0, 0, 80, 24));
    }

    #[test]
    fn test_overlay_area_leaves_status_row() {
        let screen = Rect::new(0, 0, 80, 24);
        let area = overlay_area(screen);
        assert_eq!(area, Rect::new(0, 0, 80, 23));
        assert_eq!(status_bar_area(screen), Some(Rect::new(0, 23, 80, 1)));
        assert!(!overlay_rect(area, (20, 300), 30, 10).intersects(Rect::new(0, 23, 80, 1)));
        assert_eq!(status_bar_area(Rect::new(0, 0, 80, 0)), None);
    }

    #[test]
    fn test_default_card_border_above_status_bar() {
        let app = App::default();
        let rows = draw(&app, 80, 12);

        // Carte de 4 lignes collée en bas, au-dessus de la barre de statut
        assert!(rows[7].contains('╭'));
        assert!(rows[8].contains("dogecoin (USD): ..."));
        assert!(rows[10].contains('╰'));
        assert!(rows[11].starts_with("[m] Menu"));
    }

    #[test]
    fn test_quit_prompt_in_status_bar() {
        let mut app = App::default();
        app.request_quit();
        let rows = draw(&app, 80, 12);
        assert!(rows[11].contains("Press [q] again to quit, any other key to cancel"));
    }

    #[test]
    fn test_centered_rect() {
        let screen = Rect::new(0, 0, 80, 24);
        assert_eq!(centered_rect(screen, 20, 6), Rect::new(30, 9, 20, 6));
    }

    #[test]
    fn test_overlay_lines_end_with_hint() {
        let app = App::default();
        let lines = overlay_lines(&app);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].spans[0].content, "dogecoin (USD): ...");
        assert_eq!(lines[1].spans[0].content, HINT);
    }
}
