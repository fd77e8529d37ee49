//! Editais CLI - import, browse and export CSV rosters
//!
//! # Main Commands
//!
//! ```bash
//! editais serve                                   # Start HTTP server (port 3000)
//! editais import lista.csv -k bolsistas -l 01/2025 -u ana
//! editais list                                    # Stored rosters, newest first
//! editais export 1 -f cidade_polo=Recife -o out.csv
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! editais inspect lista.csv        # Detected encoding, delimiter and columns
//! editais facets 1                 # Filter options of a roster
//! ```

use clap::{Parser, Subcommand};
use editais::{
    export_csv, export_filename, filter_rows, import_rows, index_facets, ingest_file, AppConfig,
    FilterSet, ImportError, ImportRequest, RecordStore, RosterId, RosterKind,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "editais")]
#[command(about = "Upload, filter and export CSV rosters of program enrollees", long_about = None)]
struct Cli {
    /// Data directory (default: EDITAIS_DATA_DIR or .editais)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on (default: EDITAIS_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Read a CSV file and show what would be imported
    Inspect {
        /// Input CSV file
        input: PathBuf,
    },

    /// Import a CSV file as a roster
    Import {
        /// Input CSV file
        input: PathBuf,

        /// Roster kind (bolsistas, cursistas)
        #[arg(short, long)]
        kind: RosterKind,

        /// Roster label, e.g. 01/2025
        #[arg(short, long)]
        label: String,

        /// Acting username
        #[arg(short, long)]
        user: String,

        /// Replace an existing roster with the same kind and label
        #[arg(long)]
        confirm: bool,
    },

    /// List stored rosters
    List,

    /// Show filter options of a roster
    Facets {
        /// Roster id
        id: RosterId,
    },

    /// Export a roster's (filtered) rows to CSV
    Export {
        /// Roster id
        id: RosterId,

        /// Filter as key=value, e.g. filtro_Curso=Letras, texto_Nome=ana,
        /// cidade_polo=Recife, polo_origem=Caruaru
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Output file (default: edital_<kind>_<label>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Clear a deleted user's uploader/modifier references
    ForgetUser {
        /// Username
        username: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = AppConfig::from_env().with_data_dir(cli.data_dir);

    let result = match cli.command {
        Commands::Serve { port } => cmd_serve(config.with_port(port)).await,
        Commands::Inspect { input } => cmd_inspect(&input),
        Commands::Import {
            input,
            kind,
            label,
            user,
            confirm,
        } => cmd_import(&config, &input, kind, label, user, confirm),
        Commands::List => cmd_list(&config),
        Commands::Facets { id } => cmd_facets(&config, id),
        Commands::Export {
            id,
            filters,
            output,
        } => cmd_export(&config, id, &filters, output.as_deref()),
        Commands::ForgetUser { username } => cmd_forget_user(&config, &username),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    editais::server::start_server(config).await
}

fn cmd_inspect(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Reading CSV: {}", input.display());

    let csv = ingest_file(input)?;
    eprintln!("   Encoding: {}", csv.encoding);
    eprintln!("   Delimiter: '{}'", csv.delimiter_char());
    eprintln!("   Columns: {}", csv.headers.join(", "));

    let mut rows = 0;
    for row in csv {
        row?;
        rows += 1;
    }
    eprintln!("✅ {} rows", rows);
    Ok(())
}

fn cmd_import(
    config: &AppConfig,
    input: &Path,
    kind: RosterKind,
    label: String,
    user: String,
    confirm: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = RecordStore::open(&config.data_dir)?;
    let csv = ingest_file(input)?;
    eprintln!(
        "📄 {} ({}, delimiter '{}')",
        input.display(),
        csv.encoding,
        csv.delimiter_char()
    );

    let request = ImportRequest {
        kind,
        label,
        confirm_replace: confirm,
        user,
    };

    match import_rows(&store, &request, csv) {
        Ok(outcome) => {
            eprintln!("✅ {}", outcome.message());
            Ok(())
        }
        Err(ImportError::NeedsConfirmation { existing }) => Err(format!(
            "edital '{}' (id {}) already uploaded by '{}'; pass --confirm to replace it",
            existing.display_name(),
            existing.id,
            existing.uploader_display()
        )
        .into()),
        Err(e) => Err(e.into()),
    }
}

fn cmd_list(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = RecordStore::open(&config.data_dir)?;
    let rosters = store.list_rosters();

    if rosters.is_empty() {
        eprintln!("📋 No editais stored yet.");
        eprintln!("   Use 'editais import <file>' to add one.");
        return Ok(());
    }

    eprintln!("📋 Stored editais ({}):\n", rosters.len());
    for r in rosters {
        println!("  📄 [{}] {}", r.id, r.display_name());
        println!("     Rows: {}", store.row_count(r.id));
        println!(
            "     Uploaded: {} by {}",
            r.uploaded_at.to_rfc3339(),
            r.uploader_display()
        );
        if let Some(at) = r.last_modified_at {
            println!(
                "     Replaced: {} by {}",
                at.to_rfc3339(),
                r.last_modified_by.as_deref().unwrap_or("unknown")
            );
        }
        println!();
    }
    Ok(())
}

fn cmd_facets(config: &AppConfig, id: RosterId) -> Result<(), Box<dyn std::error::Error>> {
    let store = RecordStore::open(&config.data_dir)?;
    let rows = store.rows(id)?;
    let facets = index_facets(&rows);
    println!("{}", serde_json::to_string_pretty(&facets)?);
    Ok(())
}

fn parse_filters(raw: &[String]) -> Result<FilterSet, String> {
    let pairs = raw
        .iter()
        .map(|f| {
            f.split_once('=')
                .ok_or_else(|| format!("filter '{}' is not key=value", f))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FilterSet::from_query(pairs))
}

fn cmd_export(
    config: &AppConfig,
    id: RosterId,
    raw_filters: &[String],
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = RecordStore::open(&config.data_dir)?;
    let roster = store.get_roster(id)?;
    let filters = parse_filters(raw_filters)?;

    let matching = filter_rows(store.rows(id)?, &filters);
    let bytes = export_csv(&matching)?;

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(export_filename(&roster)));
    fs::write(&path, bytes)?;
    eprintln!("💾 {} rows written to: {}", matching.len(), path.display());
    Ok(())
}

fn cmd_forget_user(config: &AppConfig, username: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = RecordStore::open(&config.data_dir)?;
    let touched = store.forget_user(username)?;
    eprintln!("🗑️  Cleared '{}' from {} editais", username, touched);
    Ok(())
}
