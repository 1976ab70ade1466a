//! Conversation CLI subcommands.
//!
//! The CLI runs with local database access and no session, so it reads the
//! repositories directly rather than going through the ownership checks of
//! the HTTP surface.

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use uuid::Uuid;

use parley_core::repository::conversation::{ConversationRepository, MessageLog};
use parley_infra::sqlite::conversation::{SqliteConversationRepository, SqliteMessageLog};
use parley_types::conversation::{ConversationHistory, MessageRole};

use crate::cli::truncate;
use crate::state::AppState;

/// Conversation subcommands.
#[derive(Subcommand)]
pub enum ConversationCommand {
    /// Show a conversation and its messages in order.
    Show {
        /// Conversation id (UUID).
        id: String,

        /// Print full message content instead of a one-line preview.
        #[arg(long)]
        full: bool,
    },
}

pub async fn handle_conversation_command(
    cmd: ConversationCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match cmd {
        ConversationCommand::Show { id, full } => show_conversation(state, &id, full, json).await,
    }
}

async fn show_conversation(state: &AppState, id: &str, full: bool, json: bool) -> Result<()> {
    let id = Uuid::parse_str(id).with_context(|| format!("invalid conversation id: {id}"))?;

    let conversations = SqliteConversationRepository::new(state.db_pool.clone());
    let Some(conversation) = conversations.get(&id).await? else {
        if json {
            println!("null");
        } else {
            println!();
            println!(
                "  {} Conversation {} not found.",
                style("i").blue().bold(),
                style(id).yellow()
            );
            println!();
        }
        return Ok(());
    };

    let messages = SqliteMessageLog::new(state.db_pool.clone())
        .list_ordered(&id)
        .await?;

    if json {
        let history = ConversationHistory {
            conversation,
            messages,
        };
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    let persona_name = state
        .persona_service
        .get(&conversation.persona_id)
        .await
        .map(|p| p.name)
        .unwrap_or_else(|_| conversation.persona_id.to_string());

    println!();
    println!(
        "  {} {}",
        style("Conversation with").dim(),
        style(&persona_name).cyan().bold()
    );
    println!();
    println!("  {}", style("── Details ──").dim());
    println!("  {}          {}", style("ID:").bold(), conversation.id);
    println!("  {}       {}", style("Owner:").bold(), conversation.owner_id);
    println!(
        "  {}     {}",
        style("Started:").bold(),
        conversation.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "  {} {}",
        style("Last message:").bold(),
        conversation.last_message_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  {}    {}", style("Messages:").bold(), messages.len());
    println!();

    if messages.is_empty() {
        return Ok(());
    }

    if full {
        for message in &messages {
            let who = match message.role {
                MessageRole::User => style("user").green().bold(),
                MessageRole::Ai => style(persona_name.as_str()).cyan().bold(),
            };
            println!(
                "  {} {}",
                who,
                style(message.timestamp.format("%H:%M:%S")).dim()
            );
            for line in message.content.lines() {
                println!("    {line}");
            }
            println!();
        }
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Role").fg(Color::White),
        Cell::new("Time").fg(Color::White),
        Cell::new("Content").fg(Color::White),
    ]);

    for (i, message) in messages.iter().enumerate() {
        let role_cell = match message.role {
            MessageRole::User => Cell::new("user").fg(Color::Green),
            MessageRole::Ai => Cell::new("ai").fg(Color::Cyan),
        };
        table.add_row(vec![
            Cell::new(i + 1).fg(Color::DarkGrey),
            role_cell,
            Cell::new(message.timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
                .fg(Color::DarkGrey),
            Cell::new(truncate(&message.content.replace('\n', " "), 60)),
        ]);
    }

    println!("{table}");
    println!();

    Ok(())
}
