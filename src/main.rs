use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use phone_input::config::{self, Config};
use phone_input::ui::app::App;
use phone_input::{CountryCatalog, CountryCode, PhoneInputController};

#[derive(Parser, Debug)]
#[command(name = "phone-input", version)]
struct Cli {
    /// Configuration file (defaults to ~/.config/phone-input/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Initial country, as an ISO 3166-1 alpha-2 code
    #[arg(long)]
    country: Option<String>,

    /// Initial value of the field
    #[arg(long)]
    value: Option<String>,

    /// Keep the typed text as-is instead of formatting it
    #[arg(long, default_value_t = false)]
    no_format: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Format a phone number and print what is known about it
    Format(FormatArgs),
    /// List known countries with their dial codes
    Countries(CountriesArgs),
}

#[derive(Args, Debug)]
struct FormatArgs {
    #[arg(value_name = "TEXT")]
    text: String,

    /// Country the number is read in; inferred from a leading "+" when omitted
    #[arg(long)]
    country: Option<String>,
}

#[derive(Args, Debug)]
struct CountriesArgs {
    /// Match by name, ISO code or dial code
    #[arg(long)]
    filter: Option<String>,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = config::load(cli.config.as_deref())?;
    if cli.no_format {
        config.auto_format = false;
    }
    let catalog = Arc::new(config.catalog()?);

    match cli.command {
        Some(Command::Format(args)) => handle_format(args, &config, catalog),
        Some(Command::Countries(args)) => {
            handle_countries(args, &catalog);
            Ok(())
        }
        None => run_interactive(cli.country, cli.value, config, catalog),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_country(raw: &str, catalog: &CountryCatalog) -> Result<CountryCode> {
    let code = CountryCode::parse(raw)?;
    if !catalog.contains(&code) {
        bail!("unknown country: {}", code);
    }
    Ok(code)
}

fn run_interactive(
    country: Option<String>,
    value: Option<String>,
    mut config: Config,
    catalog: Arc<CountryCatalog>,
) -> Result<()> {
    if let Some(raw) = country.as_deref() {
        config.initial_country = resolve_country(raw, &catalog)?;
    }
    if let Some(path) = config.config_path.as_ref() {
        debug!(path = %path.display(), "loaded configuration");
    }

    let options = config.controller_options(value);
    let formatter = Box::new(config.formatter());
    let controller = PhoneInputController::new(catalog, formatter, options);

    let mut app = App::new(config, controller);
    app.run()?;

    // Terminal is restored; hand the result to whoever invoked us.
    if !app.value().is_empty() {
        println!("{}", app.international_value());
    }
    Ok(())
}

fn handle_format(args: FormatArgs, config: &Config, catalog: Arc<CountryCatalog>) -> Result<()> {
    let country = match args.country.as_deref() {
        Some(raw) => resolve_country(raw, &catalog)?,
        None => catalog
            .country_for_number(&args.text)
            .map(|country| country.code.clone())
            .unwrap_or_else(|| config.initial_country.clone()),
    };

    let mut options = config.controller_options(Some(args.text.clone()));
    options.initial_country = country;
    let controller = PhoneInputController::new(catalog, Box::new(config.formatter()), options);

    let country_label = controller
        .selected_country()
        .and_then(|code| controller.catalog().lookup(code))
        .map(|country| format!("{} ({})", country.name, country.code))
        .unwrap_or_else(|| "-".to_string());

    println!("National:      {}", controller.value());
    println!("International: {}", controller.query_formatted_international());
    println!(
        "E.164:         {}",
        controller.query_e164().unwrap_or_else(|| "-".to_string())
    );
    println!(
        "Valid:         {}",
        if controller.query_is_valid() { "yes" } else { "no" }
    );
    println!("Type:          {}", controller.query_number_type().label());
    println!("Country:       {} {}", controller.flag(), country_label);
    Ok(())
}

fn handle_countries(args: CountriesArgs, catalog: &CountryCatalog) {
    let countries = catalog.filter(args.filter.as_deref().unwrap_or(""));
    if countries.is_empty() {
        if let Some(filter) = args.filter.as_deref() {
            println!("No countries match \"{}\"", filter);
        }
        return;
    }
    for country in countries {
        println!(
            "{} {}\t{}\t+{}",
            country.flag(),
            country.code,
            country.name,
            country.dial_code
        );
    }
}
