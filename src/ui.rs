use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block as Border, Borders, Paragraph, Wrap},
};
use crate::app::{App, InputMode, Role};
use crate::format::{self, Block, InlineSpan, InlineStyle};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Policy Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let chat_block = Border::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");

    // Inner size minus borders, for scroll and wrap estimates
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let chat_text = if app.messages.is_empty() && !app.loading {
        Text::from(Span::styled(
            "Ask a question about your policy...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in &app.messages {
            match msg.role {
                Role::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(Line::from(line.to_string()));
                    }
                }
                Role::Assistant => {
                    lines.push(Line::from(Span::styled(
                        "Assistant:",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                    let mut blocks = format::format_message(&msg.content);
                    if let Some(sources) = &msg.sources {
                        blocks.extend(format::render_sources(sources));
                    }
                    lines.extend(blocks_to_lines(&blocks));
                }
                Role::Error => {
                    lines.push(Line::from(Span::styled(
                        "Error:",
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(Line::from(Span::styled(
                            line.to_string(),
                            Style::default().fg(Color::Red),
                        )));
                    }
                }
            }
            lines.push(Line::default());
        }

        if app.loading {
            lines.push(Line::from(Span::styled(
                "Assistant:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

/// Map formatter blocks onto styled terminal lines.
fn blocks_to_lines(blocks: &[Block]) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    for block in blocks {
        match block {
            Block::Heading { level, text } => {
                let style = match level {
                    1 => Style::new().bold().underlined(),
                    2 => Style::new().bold(),
                    _ => Style::new().bold().italic(),
                };
                lines.push(Line::from(Span::styled(text.clone(), style)));
            }
            Block::Paragraph { spans } => {
                lines.push(Line::from(
                    spans.iter().map(inline_to_span).collect::<Vec<_>>(),
                ));
            }
            Block::BulletItem(text) => {
                lines.push(Line::from(format!("• {}", text)));
            }
            Block::NumberedItem(text) => {
                // Each numbered line is its own single-item list, so the
                // marker always restarts at 1.
                lines.push(Line::from(format!("1. {}", text)));
            }
            Block::CodeBlock(body) => {
                for line in body.lines() {
                    lines.push(Line::from(
                        Span::styled(format!("  {}", line), Style::default().fg(Color::Gray)).dim(),
                    ));
                }
            }
            Block::Spacer => lines.push(Line::default()),
            Block::Table { headers, rows } => {
                lines.extend(table_lines(headers, rows));
            }
            Block::SourceList { entries } => {
                lines.push(Line::from(Span::styled(
                    "Sources:",
                    Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
                )));
                for (key, value) in entries {
                    lines.push(Line::from(vec![
                        Span::raw("  • "),
                        Span::styled(key.clone(), Style::default().fg(Color::Magenta)),
                        Span::raw(format!(": {}", value)),
                    ]));
                }
            }
        }
    }

    lines
}

fn inline_to_span(span: &InlineSpan) -> Span<'static> {
    let style = match span.style {
        InlineStyle::Plain => Style::default(),
        InlineStyle::Bold => Style::default().add_modifier(Modifier::BOLD),
        InlineStyle::Italic => Style::default().add_modifier(Modifier::ITALIC),
    };
    Span::styled(span.text.clone(), style)
}

/// Lay a table out as padded text columns: header, rule, data rows.
fn table_lines(headers: &[String], rows: &[Vec<String>]) -> Vec<Line<'static>> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            if i < widths.len() {
                if len > widths[i] {
                    widths[i] = len;
                }
            } else {
                widths.push(len);
            }
        }
    }

    let pad_row = |cells: &[String]| -> String {
        widths
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                let fill = w.saturating_sub(cell.chars().count());
                format!("{}{}", cell, " ".repeat(fill))
            })
            .collect::<Vec<_>>()
            .join("  ")
    };

    let mut lines = Vec::new();
    lines.push(Line::from(Span::styled(
        pad_row(headers),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(Span::styled(
        widths
            .iter()
            .map(|w| "─".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
        Style::default().fg(Color::DarkGray),
    )));
    for row in rows {
        lines.push(Line::from(pad_row(row)));
    }

    lines
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let border_color = if app.input_mode == InputMode::Editing {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let input_block = Border::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(if app.query_task.is_some() {
            " Waiting for reply... "
        } else {
            " Ask "
        });

    // Horizontal scroll keeps the cursor visible in a narrow box
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    if app.input_mode == InputMode::Editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" INPUT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    let hints = match app.input_mode {
        InputMode::Normal => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" g/G ", key_style),
            Span::styled(" top/bottom ", label_style),
            Span::styled(" i ", key_style),
            Span::styled(" ask ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" stop typing ", label_style),
        ],
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn table_columns_are_padded_to_widest_cell() {
        let headers = vec!["Cover".to_string(), "Limit".to_string()];
        let rows = vec![
            vec!["Fire".to_string(), "5,000".to_string()],
            vec!["Earthquake".to_string(), "12".to_string()],
        ];

        let lines = table_lines(&headers, &rows);
        assert_eq!(line_text(&lines[0]), "Cover       Limit");
        assert_eq!(line_text(&lines[2]), "Fire        5,000");
        assert_eq!(line_text(&lines[3]), "Earthquake  12   ");
    }

    #[test]
    fn short_rows_pad_with_empty_cells() {
        let headers = vec!["A".to_string(), "B".to_string()];
        let rows = vec![vec!["x".to_string()]];

        let lines = table_lines(&headers, &rows);
        assert_eq!(line_text(&lines[2]), "x   ");
    }

    #[test]
    fn numbered_items_restart_at_one() {
        let blocks = vec![
            Block::NumberedItem("first".into()),
            Block::NumberedItem("second".into()),
        ];
        let lines = blocks_to_lines(&blocks);
        assert_eq!(line_text(&lines[0]), "1. first");
        assert_eq!(line_text(&lines[1]), "1. second");
    }

    #[test]
    fn source_entries_render_key_and_value() {
        let blocks = vec![Block::SourceList {
            entries: vec![("policy".into(), "Terms.pdf".into())],
        }];
        let lines = blocks_to_lines(&blocks);
        assert_eq!(line_text(&lines[0]), "Sources:");
        assert_eq!(line_text(&lines[1]), "  • policy: Terms.pdf");
    }
}
