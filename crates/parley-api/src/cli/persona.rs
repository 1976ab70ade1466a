//! Persona CLI subcommands.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use crate::cli::{format_relative_time, truncate};
use crate::http::handlers::persona::parse_persona_id;
use crate::state::AppState;

/// Persona subcommands.
#[derive(Subcommand)]
pub enum PersonaCommand {
    /// List all personas.
    #[command(alias = "ls")]
    List,

    /// Show details of a persona.
    Show {
        /// Persona id (UUID).
        id: String,
    },
}

pub async fn handle_persona_command(cmd: PersonaCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        PersonaCommand::List => list_personas(state, json).await,
        PersonaCommand::Show { id } => show_persona(state, &id, json).await,
    }
}

async fn list_personas(state: &AppState, json: bool) -> Result<()> {
    let personas = state.persona_service.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&personas)?);
        return Ok(());
    }

    if personas.is_empty() {
        println!();
        println!(
            "  {} No personas found. Create one with: {}",
            style("i").blue().bold(),
            style("POST /api/v1/personas").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("ID").fg(Color::White),
        Cell::new("Description").fg(Color::White),
        Cell::new("Created").fg(Color::White),
    ]);

    for persona in &personas {
        table.add_row(vec![
            Cell::new(&persona.name).fg(Color::Cyan),
            Cell::new(persona.id.to_string()).fg(Color::DarkGrey),
            Cell::new(truncate(&persona.description, 50)),
            Cell::new(format_relative_time(&persona.created_at)).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} persona{}",
        style(personas.len()).bold(),
        if personas.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

async fn show_persona(state: &AppState, id: &str, json: bool) -> Result<()> {
    let persona_id = parse_persona_id(id).map_err(|_| anyhow::anyhow!("invalid persona id: {id}"))?;
    let persona = state.persona_service.get(&persona_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&persona)?);
        return Ok(());
    }

    println!();
    println!("  {}", style(&persona.name).cyan().bold());
    println!("  {}", style(&persona.description).dim());
    println!();

    println!("  {}", style("── Details ──").dim());
    println!("  {}         {}", style("ID:").bold(), persona.id);
    println!("  {}    {}", style("Creator:").bold(), persona.creator_id);
    println!(
        "  {}    {} ({})",
        style("Created:").bold(),
        persona.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        format_relative_time(&persona.created_at)
    );
    println!();

    Ok(())
}
