//! Headless lead grid session against a local SQLite database

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lg_core::{CallStatus, GridSettings, Lead, LeadField, Session, StaticAuth};
use lg_data::SqliteLeadStore;
use lg_grid::{CsvImport, EditKey, GridBuilder, LeadGrid};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod sample_db;

const SAMPLE_LEADS: usize = 60;

/// Command line options
#[derive(Parser, Debug)]
#[command(name = "leadgrid", version, about = "Headless lead grid session")]
struct Args {
    /// Grid settings (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// CSV file of leads to import
    #[arg(long)]
    import: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    info!("Starting lead grid");

    let settings = GridSettings::load(args.config.as_deref())?.with_env_overrides()?;
    let store = Arc::new(
        SqliteLeadStore::open(&settings.database_path)
            .with_context(|| format!("opening {}", settings.database_path.display()))?,
    );

    let session = Session {
        user_id: Uuid::from_u128(0x1),
        organization_id: Uuid::from_u128(0x100),
        email: "demo@example.com".to_string(),
    };
    sample_db::seed_leads(&store, &session, SAMPLE_LEADS).await?;

    let auth = StaticAuth::signed_in(session);
    let grid = GridBuilder::<Lead>::from_auth(store.clone(), &auth)
        .await?
        .with_change_feed(store.clone())
        .with_settings(settings.clone())
        .build()?;

    grid.mount().await?;
    print_page(&grid);

    if let Some(path) = &args.import {
        let mut import = CsvImport::<Lead>::from_settings(&settings);
        let preview = import.load_path(path).await?;
        println!(
            "\nPreview of {}: {} valid, {} invalid",
            preview.source_name,
            preview.valid_count(),
            preview.invalid_count()
        );
        for row in preview.invalid_rows() {
            println!("  line {}: {}", row.line, row.issue_summary());
        }
        let report = import.confirm(&grid).await?;
        println!("Import: {}", report);
    }

    grid.set_sort(LeadField::LastName).await?;
    println!("\nSorted by last name:");
    print_page(&grid);

    if let Some(first) = grid.rows().first() {
        grid.start_edit(first.id, LeadField::Notes).await?;
        grid.set_pending(format!("Reviewed {}", chrono::Utc::now().format("%Y-%m-%d")))?;
        if let Err(err) = grid.handle_key(EditKey::Enter).await {
            warn!(error = %err, "note was not saved");
        }
    }

    for id in grid.visible_ids().into_iter().take(3) {
        grid.toggle_selected(id);
    }
    let selected = grid.selected();
    if !selected.is_empty() {
        grid.bulk_update_status(&selected, CallStatus::Calling).await?;
    }

    grid.next_page().await?;
    println!("\nNext page:");
    print_page(&grid);

    grid.unmount();
    info!("Lead grid closed");
    Ok(())
}

fn print_page(grid: &LeadGrid) {
    println!(
        "{:<24} {:<18} {:<20} {:<14} {:<10}",
        "Name", "Phone", "Company", "Status", "Created"
    );
    for lead in grid.rows() {
        println!(
            "{:<24} {:<18} {:<20} {:<14} {:<10}",
            lead.full_name(),
            lead.phone.as_deref().unwrap_or(""),
            lead.company_name.as_deref().unwrap_or(""),
            lead.call_status.label(),
            lead.created_at.format("%Y-%m-%d"),
        );
    }
    println!("{}", grid.page_label());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args =
            Args::try_parse_from(["leadgrid", "--config", "grid.json", "--import", "leads.csv"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("grid.json")));
        assert_eq!(args.import, Some(PathBuf::from("leads.csv")));

        let args = Args::try_parse_from(["leadgrid"]).unwrap();
        assert!(args.config.is_none());
        assert!(args.import.is_none());
    }

    #[test]
    fn test_parse_args_rejects_bad_input() {
        assert!(Args::try_parse_from(["leadgrid", "--import"]).is_err());
        assert!(Args::try_parse_from(["leadgrid", "--verbose"]).is_err());
    }
}
