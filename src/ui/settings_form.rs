// ============================================================================
// Settings - Rendu du formulaire
// ============================================================================
// Formulaire des settings + aperçu du graphique historique
// (premier coin / première devise)
// ============================================================================

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{App, SettingsField};
use crate::ui::chart;

/// Largeur de la colonne des labels
const LABEL_WIDTH: usize = 40;

/// Dessine l'écran des settings
pub fn render_settings(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(SettingsField::ALL.len() as u16 + 2), // Formulaire
            Constraint::Min(6),                                      // Graphique
            Constraint::Length(3),                                   // Raccourcis
        ])
        .split(frame.size())
        .to_vec();

    render_form(frame, app, chunks[0]);

    let chart_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Historic price chart (first coin/currency) ");
    chart::render_chart_area(frame, app, chunks[1], chart_block);

    render_form_footer(frame, app, chunks[2]);
}

/// Dessine les champs du formulaire
fn render_form(frame: &mut Frame, app: &App, area: Rect) {
    let form = &app.form;

    let lines: Vec<Line> = SettingsField::ALL
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let selected = index == form.selected;
            let label_style = if selected {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };

            let mut spans = vec![
                Span::styled(if selected { "▶ " } else { "  " }, label_style),
                Span::styled(format!("{:<width$}", field.label(), width = LABEL_WIDTH), label_style),
            ];

            match (&form.editing, selected) {
                (Some(buffer), true) => {
                    spans.push(Span::styled(buffer.clone(), Style::default().fg(Color::White)));
                    spans.push(Span::styled(
                        "█",
                        Style::default().fg(Color::White).add_modifier(Modifier::SLOW_BLINK),
                    ));
                }
                _ => spans.push(Span::styled(form.value(*field), Style::default().fg(Color::White))),
            }

            Line::from(spans)
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Widget Settings ");

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Dessine les raccourcis du formulaire
fn render_form_footer(frame: &mut Frame, app: &App, area: Rect) {
    let key = |text: &'static str| {
        Span::styled(text, Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    };

    let line = if app.is_editing_field() {
        Line::from(vec![
            Span::styled("[Enter]", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Span::raw(" Confirm  "),
            Span::styled("[ESC]", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            Span::raw(" Cancel"),
        ])
    } else if let Some(message) = &app.status_message {
        Line::from(Span::styled(message.clone(), Style::default().fg(Color::Yellow)))
    } else {
        Line::from(vec![
            key("[↑↓]"),
            Span::raw(" Select  "),
            key("[Enter]"),
            Span::raw(" Edit  "),
            key("[c]"),
            Span::raw(" Load Chart  "),
            key("[h/l]"),
            Span::raw(format!(" Range ({})  ", app.chart_range.label())),
            Span::styled("[s]", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Span::raw(" Apply  "),
            key("[ESC]"),
            Span::raw(" Close"),
        ])
    };

    let paragraph = Paragraph::new(line)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)))
        .alignment(Alignment::Center);

    frame.render_widget(paragraph, area);
}
