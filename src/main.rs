use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use sales_dashboard::config::DashboardConfig;
use sales_dashboard::export::export_to_path;
use sales_dashboard::filter::{apply_filters, ColumnSelection, FilterSelection};
use sales_dashboard::geocode::{Geocoder, NominatimGeocoder, StaticGeocoder};
use sales_dashboard::loader::DatasetCache;
use sales_dashboard::pages::{default_filters, render_page, PageContext, PageId, PageOptions, PageRequest};
use sales_dashboard::security::{login, pages_for, AccessController, Role};
use sales_dashboard::table::{columns, EventTable};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dashboard")]
#[command(about = "Sales and engagement dashboard over a CSV event log")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Event log CSV (overrides configuration)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the pages a role may open
    Pages {
        #[arg(long)]
        role: String,
    },
    /// Render one page as JSON
    Render {
        #[arg(long)]
        user: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        role: String,
        /// Page slug or title, e.g. "overview" or "sales-team"
        #[arg(long)]
        page: String,
        #[command(flatten)]
        filters: FilterArgs,
        /// Product for the monthly year-over-year chart
        #[arg(long)]
        product: Option<String>,
        /// Country for the product breakdown on the location page
        #[arg(long)]
        focus_country: Option<String>,
        /// Load per-salesperson monthly forecast files
        #[arg(long)]
        forecast_salesperson: Option<String>,
        /// Salesperson for the recent sales table
        #[arg(long)]
        recent_salesperson: Option<String>,
        #[arg(long)]
        preview_rows: Option<usize>,
        /// Use a fixed, empty geocoder instead of the network
        #[arg(long)]
        offline: bool,
        /// Date anchoring year-to-date windows (YYYY-MM-DD)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Write the filtered table as CSV
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, short)]
        output: PathBuf,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Keep only these countries (repeatable)
    #[arg(long = "country")]
    countries: Vec<String>,
    /// Keep only these salespeople (repeatable)
    #[arg(long = "salesperson")]
    salespeople: Vec<String>,
    /// Untick "Select All" for countries
    #[arg(long)]
    clear_countries: bool,
    /// Untick "Select All" for salespeople
    #[arg(long)]
    clear_salespeople: bool,
}

impl FilterArgs {
    /// Start from the page defaults and narrow the columns the flags mention
    fn apply_to(&self, mut selection: FilterSelection, table: &EventTable) -> Result<FilterSelection> {
        let narrowed = [
            (columns::CUSTOMER_COUNTRY, &self.countries, self.clear_countries),
            (columns::SALESPERSON, &self.salespeople, self.clear_salespeople),
        ];
        for (column, values, cleared) in narrowed {
            if selection.get(column).is_none() && (cleared || !values.is_empty()) {
                warn!("'{}' is not a filter on this page; ignoring", column);
                continue;
            }
            if cleared {
                selection.set(column, ColumnSelection::from_toggle(table, column, false)?);
            } else if !values.is_empty() {
                selection.set(column, ColumnSelection::of(values.iter().cloned()));
            }
        }
        Ok(selection)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = DashboardConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(data) = cli.data {
        config.data_path = data;
    }

    match cli.command {
        Command::Pages { role } => {
            let role = Role::parse(&role)?;
            for page in pages_for(role) {
                println!("{}\t{}", page.slug(), page.title());
            }
        }
        Command::Render {
            user,
            password,
            role,
            page,
            filters,
            product,
            focus_country,
            forecast_salesperson,
            recent_salesperson,
            preview_rows,
            offline,
            today,
        } => {
            let session = login(&user, &password, Role::parse(&role)?)?;
            info!("Session {} for {} ({})", session.session_id, session.username, session.role);
            let access = AccessController::new(session);
            let page = PageId::from_slug(&page)?;
            access.authorize(page)?;

            let cache = DatasetCache::new(config.data_path.clone(), config.load.clone());
            let table = cache
                .get()
                .with_context(|| format!("failed to load {}", config.data_path.display()))?;
            let request = PageRequest {
                page,
                filters: filters.apply_to(default_filters(page, &table)?, &table)?,
                options: PageOptions {
                    product,
                    focus_country,
                    forecast_salesperson,
                    recent_salesperson,
                    preview_rows,
                },
            };

            let geocoder: Box<dyn Geocoder> = if offline {
                Box::new(StaticGeocoder::new())
            } else {
                Box::new(NominatimGeocoder::new(
                    &config.geocoder_url,
                    &config.geocoder_user_agent,
                    config.geocoder_timeout(),
                )?)
            };
            let forecasts = config.forecast_store();
            let ctx = PageContext {
                source: &table,
                config: &config,
                forecasts: &forecasts,
                geocoder: geocoder.as_ref(),
                today: today.unwrap_or_else(|| Local::now().date_naive()),
            };
            let view = render_page(&ctx, &request).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Command::Export { filters, output } => {
            let cache = DatasetCache::new(config.data_path.clone(), config.load.clone());
            let table = cache
                .get()
                .with_context(|| format!("failed to load {}", config.data_path.display()))?;
            let selection = filters.apply_to(default_filters(PageId::Overview, &table)?, &table)?;
            let filtered = apply_filters(&table, &selection)?;
            let rows = export_to_path(&filtered, &output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Wrote {} rows to {}", rows, output.display());
        }
    }

    Ok(())
}
