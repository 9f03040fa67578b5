use anyhow::{anyhow, Result};
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

mod cli;

use cli::{Cli, Commands};
use stockroom::{
    auth::TokenStore,
    cache::QueryCache,
    config::Config,
    controller::ListViewController,
    export::{
        export_path, export_pdf, export_spreadsheet, ExportFormat, ExportOutcome, Letterhead,
    },
    fetch::Fetcher,
    models::DateRange,
    resources::Resource,
    transport::{HttpTransport, Transport},
    tui::{self, App, TuiExit},
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The interactive table owns the terminal, so it only logs to the file
    init_logging(!matches!(cli.command, Commands::Browse { .. }));

    let config = Config::from_env()?;
    config.validate()?;

    match cli.command {
        Commands::Resources => {
            println!("{:<12} {:<12} {}", "Name", "Title", "Endpoint");
            println!("{}", "-".repeat(60));
            for resource in Resource::ALL {
                println!(
                    "{:<12} {:<12} {}",
                    resource.as_str(),
                    resource.title(),
                    config.resource_url(&resource.path())
                );
            }
        }

        Commands::Browse {
            resource,
            page_size,
            filters,
            create_command,
        } => {
            let resource = Commands::parse_resource(&resource)?;
            let mut list = resource
                .list_config(&config)
                .with_static_filter(Commands::parse_filters(&filters)?);
            if let Some(page_size) = page_size {
                list = list.with_page_size(page_size);
            }

            let session_expired = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&session_expired);
            let transport = HttpTransport::new(&config)?
                .on_unauthorized(Arc::new(move || flag.store(true, Ordering::SeqCst)));
            let fetcher = fetcher(&config, Arc::new(transport));

            info!("Launching table for {}", resource.title());
            let mut app = App::new(config, list, fetcher, session_expired, create_command)?;
            match tui::run(&mut app).await? {
                TuiExit::Quit => {}
                TuiExit::SessionExpired => {
                    eprintln!("Your session has expired. Run `stockroom login --token <token>` and try again.");
                    std::process::exit(1);
                }
            }
        }

        Commands::Export {
            resource,
            format,
            page,
            page_size,
            search,
            sort,
            from,
            to,
            filters,
            output,
        } => {
            let resource = Commands::parse_resource(&resource)?;
            let format = Commands::parse_format(&format)?;
            let mut list = resource
                .list_config(&config)
                .with_static_filter(Commands::parse_filters(&filters)?);
            if let Some(page_size) = page_size {
                list = list.with_page_size(page_size);
            }
            if let Some(sort) = sort {
                list = list.with_default_sort(Some(Commands::parse_sort(&sort)?));
            }

            let transport = HttpTransport::new(&config)?;
            let mut view = ListViewController::new(list, fetcher(&config, Arc::new(transport)))?;
            if let Some(term) = search {
                view.set_search(&term);
            }
            view.apply_date_range(DateRange::new(from, to))?;
            view.set_page(page);

            let request = view.load();
            view.run_to_idle(request).await;
            if let Some(e) = view.last_error() {
                error!("Could not load {}: {}", resource.title(), e);
                return Err(anyhow!("Could not load {}: {}", resource.title(), e));
            }
            if view.query_state().page != page {
                warn!(
                    "Page {} does not exist, exported page {} instead",
                    page,
                    view.query_state().page
                );
            }

            let now = Local::now();
            let path: PathBuf = output
                .unwrap_or_else(|| export_path(&config.export_dir, view.title(), format, now));
            let table = view.export_table();
            let outcome = match format {
                ExportFormat::Spreadsheet => export_spreadsheet(&table, &path)?,
                ExportFormat::Pdf => {
                    let letterhead = Letterhead::new(now)
                        .with_company_name(config.letterhead.company_name.clone())
                        .with_logo(config.letterhead.logo_path.clone());
                    export_pdf(&table, &letterhead, &path)?
                }
            };

            match outcome {
                ExportOutcome::Written { path, rows } => {
                    println!("Exported {} rows to {}", rows, path.display());
                }
                ExportOutcome::NothingToExport => {
                    println!("Nothing to export: {} returned no rows", resource.title());
                }
            }
        }

        Commands::Login { token } => {
            let store = TokenStore::new(&config.token_path);
            store.save(&token)?;
            info!("Stored token at {}", store.path().display());
            println!("Logged in");
        }

        Commands::Logout => {
            TokenStore::new(&config.token_path).clear()?;
            println!("Logged out");
        }
    }

    Ok(())
}

fn fetcher(config: &Config, transport: Arc<dyn Transport>) -> Fetcher<stockroom::models::Row> {
    Fetcher::new(transport, Arc::new(QueryCache::new(config.cache_ttl())))
}

fn init_logging(to_stderr: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Set default log level to INFO if not specified
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "stockroom=info");
    }

    let file_appender = tracing_appender::rolling::never(".", "stockroom.log");

    tracing_subscriber::registry()
        .with(to_stderr.then(|| {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::from_default_env())
        }))
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_filter(EnvFilter::from_default_env()),
        )
        .init();
}
