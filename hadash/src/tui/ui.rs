//! Rendering for the dashboard TUI.
//!
//! Pure consumers of application state: these functions read the
//! reconciled snapshot and the history buffers and never mutate them
//! (stateful widgets only carry scroll positions).

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Cell, Chart, Clear, Dataset, Gauge, GraphType, List, ListItem,
        Paragraph, Row, Table, Tabs, Wrap,
    },
    symbols,
    Frame,
};

use hadash_core::types::{
    ClusterSnapshot, FailoverTarget, HaGroupStatus, HaRole, HealthStatus, LogLevel,
    NodeClassHealth,
};
use hadash_core::FailoverPhase;

use super::app::{App, AppTab, ConfirmDialog};

const PRIMARY_COLOR: Color = Color::Cyan;
const SUCCESS_COLOR: Color = Color::Green;
const WARNING_COLOR: Color = Color::Yellow;
const ERROR_COLOR: Color = Color::Red;

/// Severity band for a capacity gauge: normal below 75%, warning up to
/// 90%, critical above.
fn usage_color(pct: f64) -> Color {
    if pct > 90.0 {
        ERROR_COLOR
    } else if pct >= 75.0 {
        WARNING_COLOR
    } else {
        SUCCESS_COLOR
    }
}

fn health_color(status: HealthStatus) -> Color {
    match status {
        HealthStatus::Healthy => SUCCESS_COLOR,
        HealthStatus::Degraded => WARNING_COLOR,
        HealthStatus::Critical => ERROR_COLOR,
        HealthStatus::Unknown => Color::Gray,
    }
}

fn level_color(level: LogLevel) -> Color {
    match level {
        LogLevel::Info => PRIMARY_COLOR,
        LogLevel::Warning => WARNING_COLOR,
        LogLevel::Error => ERROR_COLOR,
    }
}

fn health_dot(healthy: bool) -> Span<'static> {
    if healthy {
        Span::styled("●", Style::default().fg(SUCCESS_COLOR))
    } else {
        Span::styled("●", Style::default().fg(ERROR_COLOR))
    }
}

pub fn render(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // tab bar
            Constraint::Min(0),    // content
            Constraint::Length(3), // status bar
        ])
        .split(f.size());

    render_tab_bar(f, chunks[0], app);

    match app.current_tab {
        AppTab::Overview => render_overview(f, chunks[1], app),
        AppTab::Logs => render_logs(f, chunks[1], app),
        AppTab::Failover => render_failover(f, chunks[1], app),
        AppTab::Jobs => render_jobs(f, chunks[1], app),
        AppTab::Help => render_help(f, chunks[1]),
    }

    render_status_bar(f, chunks[2], app);

    if let Some(dialog) = app.confirm_dialog.clone() {
        render_confirm_dialog(f, &dialog);
    }
}

fn render_tab_bar(f: &mut Frame, area: Rect, app: &App) {
    let titles: Vec<Line> = AppTab::ALL
        .iter()
        .enumerate()
        .map(|(i, tab)| Line::from(format!("{} [{}]", tab.title(), i + 1)))
        .collect();
    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Hadoop HA Dashboard "),
        )
        .select(app.current_tab.index())
        .highlight_style(
            Style::default()
                .fg(PRIMARY_COLOR)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let stream_dot = |connected: bool| if connected { "●" } else { "○" };
    let mut spans = vec![
        Span::styled(
            format!(" metrics {} ", stream_dot(app.metrics_connected())),
            Style::default().fg(if app.metrics_connected() {
                SUCCESS_COLOR
            } else {
                ERROR_COLOR
            }),
        ),
        Span::styled(
            format!("logs {} ", stream_dot(app.logs_connected())),
            Style::default().fg(if app.logs_connected() {
                SUCCESS_COLOR
            } else {
                ERROR_COLOR
            }),
        ),
        Span::raw("| "),
    ];
    if let Some(error) = &app.error_message {
        spans.push(Span::styled(
            error.clone(),
            Style::default().fg(ERROR_COLOR),
        ));
    } else if let Some(status) = &app.status_message {
        spans.push(Span::styled(
            status.clone(),
            Style::default().fg(SUCCESS_COLOR),
        ));
    } else {
        spans.push(Span::raw("q quit | r refresh | ? help"));
    }
    let bar = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(bar, area);
}

fn render_overview(f: &mut Frame, area: Rect, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // health + nodes + services
            Constraint::Length(6), // HA pairs
            Constraint::Length(3), // capacity gauges
            Constraint::Min(8),    // time chart
        ])
        .split(area);

    render_health_row(f, rows[0], app.reconciler.current());
    render_ha_pairs(f, rows[1], app.reconciler.current());
    render_capacity_gauges(f, rows[2], app.reconciler.current());
    render_time_chart(f, rows[3], app);
}

fn render_health_row(f: &mut Frame, area: Rect, snapshot: &ClusterSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(34),
            Constraint::Percentage(33),
            Constraint::Percentage(33),
        ])
        .split(area);

    // Health badge with numeric score. Absent sections show the
    // last-known value, so this only reads what the reconciler holds.
    let (status, pct) = snapshot
        .health
        .as_ref()
        .map(|h| (h.status, h.percentage.clamp(0.0, 100.0)))
        .unwrap_or((HealthStatus::Unknown, 0.0));
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Cluster Health "))
        .gauge_style(Style::default().fg(health_color(status)))
        .percent(pct.round() as u16)
        .label(format!("{} {:.0}%", status.as_str(), pct));
    f.render_widget(gauge, cols[0]);

    let node_lines = match &snapshot.node_health {
        Some(nodes) => vec![
            node_class_line("DataNodes", nodes.datanodes()),
            node_class_line("NodeManagers", nodes.nodemanagers()),
            node_class_line("JournalNodes", nodes.journalnodes()),
        ],
        None => vec![Line::from("no node data yet")],
    };
    let nodes = Paragraph::new(node_lines)
        .block(Block::default().borders(Borders::ALL).title(" Nodes "));
    f.render_widget(nodes, cols[1]);

    let service_lines: Vec<Line> = match &snapshot.aux_services {
        Some(services) if !services.0.is_empty() => services
            .0
            .iter()
            .map(|(name, healthy)| {
                Line::from(vec![
                    health_dot(*healthy),
                    Span::raw(format!(" {name}")),
                ])
            })
            .collect(),
        _ => vec![Line::from("no service data yet")],
    };
    let services = Paragraph::new(service_lines)
        .block(Block::default().borders(Borders::ALL).title(" Services "));
    f.render_widget(services, cols[2]);
}

fn node_class_line(name: &str, class: NodeClassHealth) -> Line<'static> {
    let color = if class.all_healthy() {
        SUCCESS_COLOR
    } else {
        WARNING_COLOR
    };
    Line::from(vec![
        Span::raw(format!("{name}: ")),
        Span::styled(
            format!("{}/{}", class.healthy, class.total),
            Style::default().fg(color),
        ),
    ])
}

fn render_ha_pairs(f: &mut Frame, area: Rect, snapshot: &ClusterSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    render_ha_pair(f, cols[0], " NameNode HA ", snapshot.namenode.as_ref());
    render_ha_pair(
        f,
        cols[1],
        " ResourceManager HA ",
        snapshot.resourcemanager.as_ref(),
    );
}

fn role_span(role: HaRole) -> Span<'static> {
    let style = match role {
        HaRole::Active => Style::default()
            .fg(SUCCESS_COLOR)
            .add_modifier(Modifier::BOLD),
        HaRole::Standby => Style::default().fg(PRIMARY_COLOR),
        HaRole::Unknown => Style::default().fg(Color::Gray),
    };
    Span::styled(role.as_str().to_string(), style)
}

fn render_ha_pair(f: &mut Frame, area: Rect, title: &str, group: Option<&HaGroupStatus>) {
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let Some(group) = group else {
        f.render_widget(
            Paragraph::new("no data yet").block(block),
            area,
        );
        return;
    };

    let rows = vec![
        Row::new(vec![
            Cell::from("primary"),
            Cell::from(Line::from(health_dot(group.active_healthy))),
            Cell::from(Line::from(role_span(group.active_state))),
            Cell::from(format!("{} ms", group.active_response_ms())),
        ]),
        Row::new(vec![
            Cell::from("secondary"),
            Cell::from(Line::from(health_dot(group.standby_healthy))),
            Cell::from(Line::from(role_span(group.standby_state))),
            Cell::from(format!("{} ms", group.standby_response_ms())),
        ]),
    ];
    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Length(3),
            Constraint::Length(9),
            Constraint::Length(9),
        ],
    )
    .header(
        Row::new(vec!["node", "ok", "role", "resp"])
            .style(Style::default().add_modifier(Modifier::DIM)),
    )
    .block(block);
    f.render_widget(table, area);
}

fn render_capacity_gauges(f: &mut Frame, area: Rect, snapshot: &ClusterSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let (memory_pct, vcore_pct) = snapshot
        .resource_usage
        .as_ref()
        .map(|u| (u.memory_usage_pct(), u.vcore_usage_pct()))
        .unwrap_or((0.0, 0.0));

    let memory = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Memory "))
        .gauge_style(Style::default().fg(usage_color(memory_pct)))
        .percent(memory_pct.round() as u16)
        .label(format!("{memory_pct:.1}%"));
    f.render_widget(memory, cols[0]);

    let vcores = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" VCores "))
        .gauge_style(Style::default().fg(usage_color(vcore_pct)))
        .percent(vcore_pct.round() as u16)
        .label(format!("{vcore_pct:.1}%"));
    f.render_widget(vcores, cols[1]);
}

fn render_time_chart(f: &mut Frame, area: Rect, app: &App) {
    let series = app.reconciler.time_series();
    let memory: Vec<(f64, f64)> = series
        .iter()
        .enumerate()
        .map(|(i, p)| (i as f64, p.memory_usage_pct))
        .collect();
    let vcores: Vec<(f64, f64)> = series
        .iter()
        .enumerate()
        .map(|(i, p)| (i as f64, p.vcore_usage_pct))
        .collect();

    let datasets = vec![
        Dataset::default()
            .name("memory %")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(PRIMARY_COLOR))
            .data(&memory),
        Dataset::default()
            .name("vcores %")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Magenta))
            .data(&vcores),
    ];

    let window = app.config().time_series_capacity.max(1) as f64;
    let x_labels = match (series.first(), series.last()) {
        (Some(first), Some(last)) => vec![
            Span::raw(first.label.clone()),
            Span::raw(last.label.clone()),
        ],
        _ => vec![Span::raw(""), Span::raw("")],
    };
    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Resource usage over time "),
        )
        .x_axis(
            Axis::default()
                .bounds([0.0, window - 1.0])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, 100.0])
                .labels(vec![Span::raw("0"), Span::raw("50"), Span::raw("100")]),
        );
    f.render_widget(chart, area);
}

fn render_logs(f: &mut Frame, area: Rect, app: &mut App) {
    let logs = app.reconciler.logs();
    let items: Vec<ListItem> = logs
        .iter()
        .map(|record| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    record.timestamp.format("%H:%M:%S ").to_string(),
                    Style::default().add_modifier(Modifier::DIM),
                ),
                Span::styled(
                    format!("{:<7} ", record.level.as_str().to_uppercase()),
                    Style::default().fg(level_color(record.level)),
                ),
                Span::raw(record.message.clone()),
            ]))
        })
        .collect();

    let title = format!(
        " Logs ({}) | auto-scroll {} ",
        logs.len(),
        if app.auto_scroll_logs { "on" } else { "off" }
    );
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(list, area, &mut app.log_list_state);
}

fn render_failover(f: &mut Frame, area: Rect, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(5)])
        .split(area);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);

    for (i, target) in FailoverTarget::ALL.into_iter().enumerate() {
        render_failover_panel(f, cols[i], app, target);
    }

    render_failover_history(f, rows[1], app);
}

fn render_failover_panel(f: &mut Frame, area: Rect, app: &App, target: FailoverTarget) {
    let selected = app.selected_target == target;
    let border_style = if selected {
        Style::default().fg(PRIMARY_COLOR)
    } else {
        Style::default()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(format!(" {} ", target.display_name()));

    let mut lines = Vec::new();
    match app.reconciler.current().ha_group(target) {
        Some(group) => {
            lines.push(Line::from(vec![
                Span::raw("primary:   "),
                health_dot(group.active_healthy),
                Span::raw(" "),
                role_span(group.active_state),
            ]));
            lines.push(Line::from(vec![
                Span::raw("secondary: "),
                health_dot(group.standby_healthy),
                Span::raw(" "),
                role_span(group.standby_state),
            ]));
        }
        None => lines.push(Line::from("no data yet")),
    }
    lines.push(Line::from(""));

    // Control enablement is a pure function of the state machine phase.
    match app.failover.phase(target) {
        FailoverPhase::Triggering => lines.push(Line::from(Span::styled(
            "⏳ failover in flight...",
            Style::default()
                .fg(WARNING_COLOR)
                .add_modifier(Modifier::BOLD),
        ))),
        FailoverPhase::Idle => lines.push(Line::from(Span::styled(
            if selected {
                "f: failover | F: force failover"
            } else {
                "↑/↓ to select"
            },
            Style::default().add_modifier(Modifier::DIM),
        ))),
    }

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_failover_history(f: &mut Frame, area: Rect, app: &App) {
    let history = app.failover.history();
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Failover history (newest first) | c: clear ");

    if history.is_empty() {
        let placeholder = Paragraph::new("No failovers recorded")
            .style(Style::default().add_modifier(Modifier::DIM))
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(placeholder, area);
        return;
    }

    // Reverse chronological: newest entry on top.
    let items: Vec<ListItem> = history
        .iter()
        .rev()
        .map(|record| {
            let (icon, color) = if record.success {
                ("✅", SUCCESS_COLOR)
            } else {
                ("❌", ERROR_COLOR)
            };
            let mut text = format!(
                "{icon} {} {} failover",
                record.timestamp.format("%H:%M:%S"),
                record.target.display_name(),
            );
            match &record.error_message {
                Some(error) => text.push_str(&format!(" - {error}")),
                None => text.push_str(" - completed"),
            }
            ListItem::new(Span::styled(text, Style::default().fg(color)))
        })
        .collect();

    f.render_widget(List::new(items).block(block), area);
}

fn render_jobs(f: &mut Frame, area: Rect, app: &mut App) {
    let rows: Vec<Row> = app
        .jobs
        .iter()
        .map(|job| {
            Row::new(vec![
                Cell::from(job.id.clone()),
                Cell::from(job.name.clone()),
                Cell::from(job.user.clone()),
                Cell::from(job.queue.clone()),
                Cell::from(job.state.clone()),
                Cell::from(format!("{:.0}%", job.progress)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(30),
            Constraint::Min(20),
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(6),
        ],
    )
    .header(
        Row::new(vec!["id", "name", "user", "queue", "state", "prog"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Applications ({}) | r: refresh ", app.jobs.len())),
    )
    .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(table, area, &mut app.jobs_table_state);
}

fn render_help(f: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from("  1-5        switch tab"),
        Line::from("  r          refresh status (and jobs on the Jobs tab)"),
        Line::from("  q / Ctrl-C quit"),
        Line::from(""),
        Line::from("  Logs"),
        Line::from("    a        toggle auto-scroll, End jumps to the tail"),
        Line::from("    ↑/↓      scroll (turns auto-scroll off)"),
        Line::from(""),
        Line::from("  Failover"),
        Line::from("    ↑/↓      select target"),
        Line::from("    f        trigger failover (with confirmation)"),
        Line::from("    F        force failover (with confirmation)"),
        Line::from("    c        clear local failover history"),
    ];
    let help = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" Help "));
    f.render_widget(help, area);
}

fn render_confirm_dialog(f: &mut Frame, dialog: &ConfirmDialog) {
    let area = centered_rect(50, 20, f.size());
    f.render_widget(Clear, area);

    let title = if dialog.force {
        format!(" Force failover: {} ", dialog.target.display_name())
    } else {
        format!(" Failover: {} ", dialog.target.display_name())
    };
    let question = if dialog.force {
        format!(
            "FORCE failover of the {} pair?\nThis skips the graceful fencing checks.",
            dialog.target.display_name()
        )
    } else {
        format!("Trigger failover of the {} pair?", dialog.target.display_name())
    };

    let yes_style = if dialog.selected {
        Style::default().fg(Color::Black).bg(SUCCESS_COLOR)
    } else {
        Style::default()
    };
    let no_style = if dialog.selected {
        Style::default()
    } else {
        Style::default().fg(Color::Black).bg(ERROR_COLOR)
    };

    let border_color = if dialog.force { ERROR_COLOR } else { WARNING_COLOR };
    let lines = vec![
        Line::from(""),
        Line::from(question),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Yes  ", yes_style),
            Span::raw("   "),
            Span::styled("  No  ", no_style),
        ]),
    ];
    let dialog_widget = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border_color))
                .title(title),
        );
    f.render_widget(dialog_widget, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
