use anyhow::Result;
use ratatui::backend::Backend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};
// Use Popup from tui-widgets to render the picker
use tui_widgets::popup::Popup;

use super::app::App;

const FIELD_HELP: &str = "Type a number  Tab/F2: choose country  F8: clear  Ctrl+D: disable  Esc: quit";
const FILTER_LABEL: &str = "Search: ";
const PICKER_MAX_ROWS: u16 = 12;

pub fn render<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    terminal.draw(|frame| draw_frame(frame, app))?;
    Ok(())
}

fn draw_frame(frame: &mut Frame<'_>, app: &mut App) {
    let size = frame.area();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(size);

    draw_header(frame, layout[0], app);
    draw_field(frame, layout[1], app);
    draw_details(frame, layout[2], app);
    draw_footer(frame, layout[3], app);
    draw_picker(frame, size, app);
}

fn draw_header(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let summary = app.summary();
    let mut spans = vec![Span::styled("PHONE INPUT", header_style())];
    spans.push(Span::raw("  "));
    spans.push(Span::raw(summary.country));
    if summary.disabled {
        spans.push(Span::styled("  [disabled]", Style::default().fg(Color::DarkGray)));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_field(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let summary = app.summary();
    let flag_label = if summary.dial_code.is_empty() {
        format!(" {} ", summary.flag)
    } else {
        format!(" {} +{} ", summary.flag, summary.dial_code)
    };
    let flag_width = flag_label.chars().count() as u16 + 2;

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(flag_width), Constraint::Min(0)])
        .split(area);

    let active = app.field.focused && !app.picker.is_visible() && !summary.disabled;

    let flag = Paragraph::new(flag_label)
        .block(Block::default().borders(Borders::ALL).border_style(border_style(false)));
    frame.render_widget(flag, chunks[0]);

    let text_style = if summary.disabled {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };
    let input = Paragraph::new(app.field.value().to_string())
        .style(text_style)
        .block(Block::default().borders(Borders::ALL).border_style(border_style(active)));
    frame.render_widget(input, chunks[1]);

    if active {
        let inner = Block::default().borders(Borders::ALL).inner(chunks[1]);
        let x = inner.x.saturating_add(app.field.visual_cursor() as u16);
        frame.set_cursor_position((x.min(inner.right().saturating_sub(1)), inner.y));
    }
}

fn draw_details(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let summary = app.summary();
    let label = |name: &str| Span::styled(format!("{:<15}", name), header_style());

    let validity = if summary.valid {
        Span::styled("yes", Style::default().fg(Color::Green))
    } else {
        Span::styled("no", Style::default().fg(Color::Red))
    };

    let lines = vec![
        Line::from(vec![label("International"), Span::raw(summary.international)]),
        Line::from(vec![
            label("E.164"),
            Span::raw(summary.e164.unwrap_or_else(|| "-".to_string())),
        ]),
        Line::from(vec![label("Valid"), validity]),
        Line::from(vec![label("Type"), Span::raw(summary.number_type.label())]),
    ];

    let block = Block::default().borders(Borders::TOP).border_style(border_style(false));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_footer(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let message = if app.picker.is_visible() {
        let picker = app.picker_config();
        format!(
            "Type to filter  Up/Down: move  Enter: {}  Esc: {}",
            picker.confirm_text, picker.cancel_text
        )
    } else {
        match &app.status {
            Some(status) => format!("{}  |  {}", status, FIELD_HELP),
            None => FIELD_HELP.to_string(),
        }
    };
    let style = Style::default().fg(Color::Black).bg(Color::Gray);

    let background = Block::default().style(Style::default().bg(Color::Gray));
    frame.render_widget(background, area);

    frame.render_widget(Paragraph::new(message).style(style), area);
}

fn draw_picker(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    if !app.picker.is_visible() {
        return;
    }

    let width = area.width.saturating_mul(2).saturating_div(3).max(30).min(area.width);
    let content_width = width.saturating_sub(2) as usize;
    let list_rows = PICKER_MAX_ROWS.min(area.height.saturating_sub(5)).max(1);

    // Body placeholder: filter line, separator, then list rows
    let content_height = list_rows as usize + 2;
    let body_lines: Vec<Line> = (0..content_height)
        .map(|_| Line::from(" ".repeat(content_width)))
        .collect();
    let body_text = Text::from(body_lines);

    let picker_config = app.picker_config();
    let title = format!(
        "SELECT COUNTRY ({}/{})",
        picker_config.confirm_text, picker_config.cancel_text
    );
    let title_line = Line::from(Span::styled(title, header_style()));
    let popup = Popup::new(body_text)
        .title(title_line)
        .border_style(border_style(true));

    // Render popup using state so we can retrieve its area
    frame.render_stateful_widget_ref(popup, area, &mut app.modal_popup);

    let Some(popup_area) = *app.modal_popup.area() else {
        return;
    };
    let inner = Block::default().borders(Borders::ALL).inner(popup_area);
    if inner.width == 0 || inner.height < 3 {
        return;
    }

    let filter_area = Rect::new(inner.x, inner.y, inner.width, 1);
    let separator_area = Rect::new(inner.x, inner.y + 1, inner.width, 1);
    let list_area = Rect::new(inner.x, inner.y + 2, inner.width, inner.height - 2);

    let filter_line = Line::from(vec![
        Span::styled(FILTER_LABEL, header_style()),
        Span::raw(app.picker.filter_value().to_string()),
    ]);
    frame.render_widget(Paragraph::new(filter_line), filter_area);
    frame.render_widget(
        Block::default().borders(Borders::TOP).border_style(border_style(false)),
        separator_area,
    );

    if app.picker.match_count() == 0 {
        frame.render_widget(
            Paragraph::new("No countries match").style(Style::default().fg(Color::DarkGray)),
            list_area,
        );
    } else {
        let items: Vec<ListItem> = app
            .picker
            .visible_entries()
            .map(|entry| {
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{} ", entry.flag)),
                    Span::raw(entry.label.clone()),
                    Span::styled(
                        format!(" {}", entry.dial_code),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]))
            })
            .collect();
        let list = List::new(items).highlight_style(selection_style());
        let mut state = ListState::default();
        state.select(app.picker.selected_position());
        frame.render_stateful_widget(list, list_area, &mut state);
    }

    let x = filter_area
        .x
        .saturating_add(FILTER_LABEL.len() as u16 + app.picker.filter_cursor() as u16);
    frame.set_cursor_position((x.min(filter_area.right().saturating_sub(1)), filter_area.y));
}

fn header_style() -> Style {
    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
}

fn border_style(active: bool) -> Style {
    if active {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn selection_style() -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}
