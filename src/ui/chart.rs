// ============================================================================
// Chart - Rendu du graphique historique
// ============================================================================
// Graphique ligne (prix en fonction du temps) du premier coin / première
// devise configurés
//
// CONCEPTS RATATUI :
// 1. Chart widget : graphique ligne
// 2. Dataset : série de points (x = timestamp ms, y = prix)
// 3. Axis : bornes et labels des axes
// ============================================================================

use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use crate::app::App;
use crate::models::PriceSeries;

/// Dessine l'écran du graphique (header + graphique)
pub fn render_chart(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Titre
            Constraint::Min(0),    // Graphique
        ])
        .split(frame.size())
        .to_vec();

    render_chart_header(frame, app, chunks[0]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));
    render_chart_area(frame, app, chunks[1], block);
}

/// Header : couple affiché, plage, variation et raccourcis
fn render_chart_header(frame: &mut Frame, app: &App, area: Rect) {
    let coin = app.grid.coins().first().map(String::as_str).unwrap_or("?");
    let currency = app.grid.currencies().first().map(String::as_str).unwrap_or("?");

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" 📈 {} ({}) - {} ", coin, currency.to_uppercase(), app.chart_range.label()));

    let mut spans = Vec::new();
    if let Some(change) = app.chart.as_ref().and_then(PriceSeries::change_percent) {
        let color = if change >= 0.0 { Color::Green } else { Color::Red };
        let arrow = if change >= 0.0 { "▲" } else { "▼" };
        spans.push(Span::styled(
            format!("{} {:+.2}%  ", arrow, change),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
    }

    let key = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    spans.extend([
        Span::styled("[h/l]", key),
        Span::raw(" Range  "),
        Span::styled("[c]", key),
        Span::raw(" Reload  "),
        Span::styled("[ESC]", key),
        Span::raw(" Back"),
    ]);

    let paragraph = Paragraph::new(Line::from(spans))
        .block(block)
        .alignment(Alignment::Center);

    frame.render_widget(paragraph, area);
}

/// Dessine la série courante dans `area`, ou un message si elle est vide
///
/// Partagé entre l'écran Chart et l'aperçu du formulaire des settings
pub fn render_chart_area(frame: &mut Frame, app: &App, area: Rect, block: Block) {
    let series = match &app.chart {
        Some(series) if !series.is_empty() => series,
        _ => {
            let message = if app.chart_loading {
                "Loading..."
            } else {
                "No chart data"
            };
            let paragraph = Paragraph::new(vec![
                Line::from(""),
                Line::from(Span::styled(message, Style::default().fg(Color::Gray))),
            ])
            .block(block)
            .alignment(Alignment::Center);
            frame.render_widget(paragraph, area);
            return;
        }
    };

    let points = series.chart_points();
    let Some((y_min, y_max)) = series.price_bounds() else {
        return;
    };
    let Some((start, end)) = series.time_bounds() else {
        return;
    };

    let x_min = start.timestamp_millis() as f64;
    // Un seul point : on évite des bornes identiques
    let x_max = (end.timestamp_millis() as f64).max(x_min + 1.0);

    let color = match series.change_percent() {
        Some(change) if change < 0.0 => Color::Red,
        _ => Color::Green,
    };

    let datasets = vec![Dataset::default()
        .name(series.coin.as_str())
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(&points)];

    let x_axis = Axis::default()
        .style(Style::default().fg(Color::Gray))
        .bounds([x_min, x_max])
        .labels(vec![
            Span::raw(time_label(start, series.days)),
            Span::raw(time_label(end, series.days)),
        ]);

    // Labels min / max avec 6 décimales (prix des petits coins)
    let y_axis = Axis::default()
        .style(Style::default().fg(Color::Gray))
        .bounds([y_min, y_max])
        .labels(vec![
            Span::raw(format!("{:.6}", y_min)),
            Span::raw(format!("{:.6}", y_max)),
        ]);

    let title = format!(
        " {} ({}) - {} days ",
        series.coin,
        series.currency.to_uppercase(),
        series.days
    );
    let chart = Chart::new(datasets)
        .block(block.title(title))
        .x_axis(x_axis)
        .y_axis(y_axis);

    frame.render_widget(chart, area);
}

/// Label de l'axe X : heure pour les plages courtes, date sinon
fn time_label(timestamp: DateTime<Utc>, days: u32) -> String {
    if days <= 2 {
        timestamp.format("%d/%m %H:%M").to_string()
    } else {
        timestamp.format("%d/%m/%Y").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PricePoint;
    use chrono::TimeZone;
    use ratatui::{backend::TestBackend, Terminal};

    fn draw_chart(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|frame| render_chart(frame, app)).unwrap();
        let buffer = terminal.backend().buffer();
        (0..20)
            .map(|y| (0..80).map(|x| buffer.get(x, y).symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_empty_series_shows_no_data() {
        let mut app = App::default();
        app.show_chart();
        app.chart_request();
        assert!(draw_chart(&app).contains("Loading..."));

        // Échec du téléchargement : série vide
        app.set_chart(PriceSeries::new("dogecoin".to_string(), "usd".to_string(), 7));
        let screen = draw_chart(&app);
        assert!(screen.contains("No chart data"));
        assert!(screen.contains("[ESC] Back"));
    }

    #[test]
    fn test_chart_title_names_range_in_days() {
        let mut app = App::default();
        let mut series = PriceSeries::new("dogecoin".to_string(), "usd".to_string(), 30);
        for (i, price) in [0.1, 0.12, 0.11].iter().enumerate() {
            series.push(PricePoint::from_millis(1_700_000_000_000 + i as i64 * 86_400_000, *price).unwrap());
        }
        app.set_chart(series);
        assert!(draw_chart(&app).contains("dogecoin (USD) - 30 days"));
    }

    #[test]
    fn test_time_label() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        assert_eq!(time_label(ts, 1), "09/03 14:05");
        assert_eq!(time_label(ts, 30), "09/03/2024");
    }
}
