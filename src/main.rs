use anyhow::Result;

mod app;
mod client;
mod config;
mod format;
mod handler;
mod tui;
mod ui;

use app::{App, Message};
use client::ChatClient;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|_| Config::new());

    let client = config.resolve_token().map(|token| {
        ChatClient::new(
            &config.service_url(),
            &token,
            &config.space_name(),
            &config.flow_name(),
        )
    });

    let mut app = App::new(client);
    if app.client.is_none() {
        app.push_message(Message::error(format!(
            "No API token found. Set {} or add api_token to the config file.",
            config::TOKEN_ENV_VAR
        )));
    } else if let Some(client) = &app.client {
        // Quick bounded probe so an unreachable service shows up before the
        // first question, not after it.
        let probe = tokio::time::timeout(std::time::Duration::from_secs(3), client.health());
        match probe.await {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => {
                app.push_message(Message::error("Chat service reported unhealthy".to_string()));
            }
            Ok(Err(e)) => {
                app.push_message(Message::error(format!("Chat service unreachable: {e:#}")));
            }
            Err(_) => {
                app.push_message(Message::error(
                    "Chat service health check timed out".to_string(),
                ));
            }
        }
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event).await?;
        }

        // Fold a completed request into the history
        app.poll_reply().await;
    }

    Ok(())
}
