use anyhow::Context;
use clap::{Parser, Subcommand};
use reflow_core::{EventKind, InteractionEvent};
use reflow_engine::{FileStore, FlowCatalog};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

#[derive(Parser)]
#[command(name = "reflow", version, about = "Manage recorded interaction flows")]
struct Args {
    /// Store directory (defaults to ~/.reflow/store)
    #[arg(long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List saved flows
    List,
    /// Print the events of a saved flow
    Show { name: String },
    /// Dump a saved flow as JSON
    Export { name: String },
    /// Rename a saved flow
    Rename { old: String, new: String },
    /// Delete a saved flow
    Delete { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout is for command output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let path = args.store.unwrap_or_else(FileStore::default_path);
    debug!(store = %path.display(), "opening flow store");
    let catalog = FlowCatalog::new(Arc::new(FileStore::new(path)));

    match args.command {
        Command::List => {
            let names = catalog.list().await.context("listing flows")?;
            if names.is_empty() {
                eprintln!("no saved flows");
            }
            for name in names {
                println!("{name}");
            }
        }
        Command::Show { name } => {
            let flow = catalog.get(&name).await?;
            println!(
                "{name}: {} events, anchored at {}",
                flow.len(),
                flow.anchor_url
            );
            for event in &flow.events {
                println!("  {}", format_event(event));
            }
        }
        Command::Export { name } => {
            let flow = catalog.get(&name).await?;
            println!("{}", serde_json::to_string_pretty(&flow)?);
        }
        Command::Rename { old, new } => {
            catalog.rename(&old, &new).await?;
            println!("renamed {old} to {new}");
        }
        Command::Delete { name } => {
            catalog.delete(&name).await?;
            println!("deleted {name}");
        }
    }
    Ok(())
}

fn format_event(event: &InteractionEvent) -> String {
    let time = event.timestamp.format("%H:%M:%S");
    match event.kind {
        EventKind::Input => {
            let ty = event.element.input_type.as_deref().unwrap_or("text");
            let value = event.value.as_deref().unwrap_or("");
            format!(
                "[{time}] INPUT: <{} type=\"{ty}\"> \"{value}\"",
                event.element.tag
            )
        }
        kind => {
            let label = match kind {
                EventKind::Click => "CLICK",
                _ => "UNKNOWN",
            };
            let mut desc = format!("<{}>", event.element.tag);
            if let Some(id) = &event.element.id {
                desc.push_str(&format!("#{id}"));
            }
            if let Some(classes) = &event.element.css_classes {
                desc.push_str(&format!(".{}", classes.replace(' ', ".")));
            }
            if let Some(text) = &event.element.text {
                desc.push_str(&format!(" \"{text}\""));
            }
            format!("[{time}] {label}: {desc}")
        }
    }
}
