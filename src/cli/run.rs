use super::ui;
use super::user::{self, UserCommand};
use crate::App;
use crate::core::UserId;
use anyhow::Result;
use clap::Parser;
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Commands accepted on standard input while the daemon runs.
#[derive(Parser)]
#[command(name = "fxnotify", no_binary_name = true, disable_version_flag = true)]
pub enum ConsoleCommand {
    /// Inspect or change a subscriber's settings
    User {
        #[arg(allow_negative_numbers = true)]
        user_id: UserId,
        #[command(subcommand)]
        action: UserCommand,
    },
    /// Rebuild every trigger from storage
    Reload,
}

/// Loads every subscriber's trigger and fires them until Ctrl-C. Settings
/// changes typed on standard input take effect immediately.
pub async fn run(app: &App) -> Result<()> {
    let scheduler = app.scheduler();
    let count = scheduler.reload_all().await?;
    println!(
        "{}",
        ui::style_text(
            &format!(
                "Scheduled {count} daily notifications. Type `user <id> <action>` or `reload`, Ctrl-C to stop."
            ),
            ui::StyleType::Subtle
        )
    );

    let console = async {
        serve_commands(app, stdin_lines()).await;
        debug!("Standard input closed, console commands disabled");
        std::future::pending::<()>().await
    };

    tokio::select! {
        _ = scheduler.run(ctrl_c()) => {}
        _ = console => {}
    }
    Ok(())
}

/// Executes console lines until the sender is dropped. A bad line is
/// reported and the loop carries on.
pub async fn serve_commands(app: &App, mut lines: mpsc::Receiver<String>) {
    while let Some(line) = lines.recv().await {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        match ConsoleCommand::try_parse_from(words) {
            Ok(command) => {
                if let Err(e) = execute(app, command).await {
                    warn!(error = %e, "Console command failed");
                    println!("{}", ui::style_text(&format!("{e:#}"), ui::StyleType::Error));
                }
            }
            Err(e) => println!("{}", e.render()),
        }
    }
}

async fn execute(app: &App, command: ConsoleCommand) -> Result<()> {
    match command {
        ConsoleCommand::User { user_id, action } => user::run(app, user_id, action.into()).await,
        ConsoleCommand::Reload => {
            let count = app.scheduler().reload_all().await?;
            println!("Scheduled {count} daily notifications.");
            Ok(())
        }
    }
}

// Blocking reads live on their own thread so a pending read never holds up
// runtime shutdown.
fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
