// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use rental_filter::{
    builtin_pages, find_page, load_cards, load_pages, load_settings, AppConfig, ControlPanel,
    ControlSlot, FilterReport, PageConfig, PageSession, Severity,
};
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rental-filter", version)]
#[command(about = "Card filtering and dashboard for the rental management pages", long_about = None)]
struct Cli {
    /// Path to configuration file (default: ./rental-filter.json if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Replace the built-in pages with definitions from a JSON file
    #[arg(long, global = true)]
    pages: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive terminal page
    #[command(alias = "open")]
    Ui {
        page: String,
        cards: PathBuf,

        /// Write log output to this file (the terminal is busy drawing)
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Run one filter pass and print the visible cards
    Check {
        page: String,
        cards: PathBuf,

        /// JSON object of control id → value ({"min","max"} for ranges)
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// List pages and their control ids
    Pages,
    /// Manager dashboard with the live fleet chart
    Dashboard {
        /// Dashboard seed JSON ({"last_five_week_users": [...], "month_revenue": [...]})
        #[arg(long)]
        seed: Option<PathBuf>,

        #[arg(long)]
        log_file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Ui { ref page, ref cards, ref log_file }) => {
            init_logger("off", log_file.as_deref())?;
            run_ui_mode(&cli, page, cards)
        }
        Some(Commands::Check { ref page, ref cards, ref settings }) => {
            init_logger("info", None)?;
            run_check(&cli, page, cards, settings.as_deref())
        }
        Some(Commands::Pages) => {
            init_logger("info", None)?;
            run_pages(&cli)
        }
        Some(Commands::Dashboard { ref seed, ref log_file }) => {
            init_logger("off", log_file.as_deref())?;
            run_dashboard(&cli, seed.as_deref())
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

/// `RUST_LOG` wins; otherwise `default_level`. A log file lifts "off" to "info".
fn init_logger(default_level: &str, log_file: Option<&Path>) -> Result<()> {
    let level = match (default_level, log_file) {
        ("off", Some(_)) => "info",
        (level, _) => level,
    };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));

    if let Some(path) = log_file {
        let file = File::create(path).with_context(|| format!("Failed to create log file: {:?}", path))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    AppConfig::load(cli.config.as_deref())
}

fn page_definitions(cli: &Cli, config: &AppConfig) -> Result<Vec<PageConfig>> {
    match &cli.pages {
        Some(path) => load_pages(path),
        None => Ok(builtin_pages(&config.compat)),
    }
}

fn open_session(cli: &Cli, config: &AppConfig, page: &str, cards: &Path) -> Result<(PageConfig, PageSession)> {
    let pages = page_definitions(cli, config)?;
    let page = find_page(&pages, page)?.clone();

    let cards = load_cards(cards, page.kind)?;
    let panel = ControlPanel::new(&page, config.integration_mode)
        .with_context(|| format!("Invalid controls on page '{}'", page.name))?;

    Ok((page, PageSession::new(panel, cards)))
}

fn run_check(cli: &Cli, page: &str, cards: &Path, settings: Option<&Path>) -> Result<()> {
    let config = load_config(cli)?;
    let (page, mut session) = open_session(cli, &config, page, cards)?;

    println!("🔎 {} ({})", page.title, page.name);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let outcome = match settings {
        Some(path) => {
            let settings = load_settings(path)?;
            session.apply_settings(&settings).map(FilterReport::clone)
        }
        None => session.refilter().map(FilterReport::clone),
    };

    let report = outcome.context("Filter pass failed")?;

    for card in session.visible_cards() {
        let cells: Vec<&str> = page
            .columns
            .iter()
            .map(|col| card.field(col).unwrap_or("-"))
            .collect();
        println!("  ✓ {}", cells.join(" | "));
    }

    println!("\n{}", report.summary());
    for issue in &report.issues {
        let marker = match issue.severity {
            Severity::Critical => "❌",
            Severity::Warning => "⚠️ ",
        };
        println!("  {} {}", marker, issue);
    }

    Ok(())
}

fn run_pages(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let pages = page_definitions(cli, &config)?;

    for page in &pages {
        println!("📄 {} - {} ({} cards)", page.name, page.title, page.kind.as_str());

        let panel = ControlPanel::new(page, config.integration_mode)
            .with_context(|| format!("Invalid controls on page '{}'", page.name))?;
        for slot in panel.slots() {
            let kind = match slot {
                ControlSlot::Text(_) => "text",
                ControlSlot::Select(_) => "select",
                ControlSlot::Range(_) => "range",
            };
            println!("   {:<8} {}", kind, slot.id());
        }
        println!("   {} predicate(s)", page.predicates.len());
        for predicate in page.predicates.iter() {
            if let Some(description) = &predicate.description {
                println!("     - {}: {}", predicate.id, description);
            }
        }
        println!();
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn start_fleet_refresh(config: &AppConfig) -> Result<std::sync::mpsc::Receiver<rental_filter::FleetUpdate>> {
    use rental_filter::{spawn_fleet_refresh, FleetRequest, HttpCountSource};
    use std::sync::{mpsc, Arc};

    let source = HttpCountSource::new(&config.api_base_url, config.request_timeout())?;
    let (tx, rx) = mpsc::channel();
    spawn_fleet_refresh(
        Arc::new(source),
        &[
            (FleetRequest::Reports, config.reports_path.clone()),
            (FleetRequest::Cars, config.cars_path.clone()),
        ],
        tx,
    );
    Ok(rx)
}

#[cfg(feature = "tui")]
fn load_seed(path: Option<&Path>) -> Result<rental_filter::DashboardSeed> {
    match path {
        Some(path) => rental_filter::DashboardSeed::from_file(path),
        None => Ok(rental_filter::DashboardSeed::default()),
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(cli: &Cli, page: &str, cards: &Path) -> Result<()> {
    let config = load_config(cli)?;
    let (page, session) = open_session(cli, &config, page, cards)?;

    let dashboard = rental_filter::Dashboard::new(&load_seed(None)?);
    let mut app = ui::App::new(session, &page, dashboard).with_fleet_updates(start_fleet_refresh(&config)?);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(feature = "tui")]
fn run_dashboard(cli: &Cli, seed: Option<&Path>) -> Result<()> {
    let config = load_config(cli)?;
    let dashboard = rental_filter::Dashboard::new(&load_seed(seed)?);

    let mut app = ui::App::dashboard_only(dashboard).with_fleet_updates(start_fleet_refresh(&config)?);
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_cli: &Cli, _page: &str, _cards: &Path) -> Result<()> {
    anyhow::bail!("TUI mode not available; rebuild with `--features tui` or use `check`")
}

#[cfg(not(feature = "tui"))]
fn run_dashboard(_cli: &Cli, _seed: Option<&Path>) -> Result<()> {
    anyhow::bail!("Dashboard needs the TUI; rebuild with `--features tui`")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_options_before_subcommand() {
        let cli = Cli::try_parse_from(["rental-filter", "--config", "c.json", "check", "cars", "cards.csv"]).unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("c.json")));
        assert!(matches!(
            cli.command,
            Some(Commands::Check { ref page, ref cards, settings: None })
                if page == "cars" && cards == Path::new("cards.csv")
        ));
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from(["rental-filter", "check", "cars", "cards.csv", "--config", "c.json"]).unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("c.json")));
        assert!(matches!(cli.command, Some(Commands::Check { .. })));
    }

    #[test]
    fn test_pages_option_does_not_swallow_subcommand() {
        let cli = Cli::try_parse_from(["rental-filter", "--pages", "x.json", "pages"]).unwrap();

        assert_eq!(cli.pages, Some(PathBuf::from("x.json")));
        assert!(matches!(cli.command, Some(Commands::Pages)));
    }

    #[test]
    fn test_open_alias_and_no_subcommand() {
        let cli = Cli::try_parse_from(["rental-filter", "open", "cars", "cards.csv"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Ui { ref page, .. }) if page == "cars"));

        let cli = Cli::try_parse_from(["rental-filter"]).unwrap();
        assert!(cli.command.is_none());

        assert!(Cli::try_parse_from(["rental-filter", "cars", "cards.csv"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
