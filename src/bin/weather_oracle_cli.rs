//! CLI adapter (C12b): translates `forecast`/`compare` subcommands into
//! C10 calls and renders the result, per spec.md §6/§9.
//!
//! Grounded in `hniksic-openmeteo-cli`'s `Cli`/`Command` derive shape
//! (one subcommand per verb, a `location` positional plus `--models`/
//! `--verbose`-style flags) and its `Table` builder for aligned
//! columnar output. Terminal rendering beyond plain aligned text
//! (sparklines, heatmaps, color, themes) and narrative text generation
//! are named out of scope for the core and are not built here either —
//! `--format narrative` emits a single plain-text summary line, not a
//! generated narrative.

use clap::{Parser, Subcommand, ValueEnum};

use weather_oracle::adapters::http::{convert_precipitation, convert_temperature};
use weather_oracle::aggregate::AggregatedForecast;
use weather_oracle::config::{OracleConfig, Units};
use weather_oracle::pipeline::{Pipeline, PipelineOptions};

#[derive(Clone, Copy, ValueEnum)]
enum UnitsArg {
    Metric,
    Imperial,
}

impl From<UnitsArg> for Units {
    fn from(arg: UnitsArg) -> Self {
        match arg {
            UnitsArg::Metric => Units::Metric,
            UnitsArg::Imperial => Units::Imperial,
        }
    }
}

#[derive(Parser)]
#[command(name = "weather-oracle")]
#[command(about = "Multi-model weather forecast pipeline")]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a consensus forecast for a location
    Forecast {
        /// Location name to geocode (e.g. "Zurich, Switzerland")
        location: String,

        /// Forecast horizon in days, 1-16
        #[arg(long, default_value_t = 7)]
        days: u32,

        /// Comma-separated model ids; defaults to every registered model
        #[arg(long)]
        models: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,

        /// Bypass the cache for this request
        #[arg(long)]
        no_cache: bool,

        /// Unit system for rendered output; defaults to the server's
        /// configured units
        #[arg(long, value_enum)]
        units: Option<UnitsArg>,
    },
    /// Fetch a forecast and show each contributing model's raw values
    Compare {
        /// Location name to geocode
        location: String,

        /// Forecast horizon in days, 1-16
        #[arg(long, default_value_t = 7)]
        days: u32,

        /// Comma-separated model ids; defaults to every registered model
        #[arg(long)]
        models: Option<String>,

        /// Unit system for rendered output; defaults to the server's
        /// configured units
        #[arg(long, value_enum)]
        units: Option<UnitsArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Narrative,
    Json,
    Rich,
}

fn options_from(config: &OracleConfig, days: u32, models: &Option<String>, no_cache: bool) -> PipelineOptions {
    let mut options = PipelineOptions::from_config(config);
    options.forecast_days = days.clamp(1, 16);
    if let Some(models) = models {
        options.models = models
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    options.use_cache = options.use_cache && !no_cache;
    options
}

fn temp_unit_label(units: Units) -> &'static str {
    match units {
        Units::Metric => "°C",
        Units::Imperial => "°F",
    }
}

fn precip_unit_label(units: Units) -> &'static str {
    match units {
        Units::Metric => "mm",
        Units::Imperial => "in",
    }
}

fn print_table(forecast: &AggregatedForecast, units: Units) {
    println!(
        "{:<12} {:>8} {:>8} {:>10} {:>10}",
        "Date",
        format!("Min {}", temp_unit_label(units)),
        format!("Max {}", temp_unit_label(units)),
        format!("Precip {}", precip_unit_label(units)),
        "Confidence"
    );
    for day in &forecast.consensus.daily {
        println!(
            "{:<12} {:>8.1} {:>8.1} {:>10.1} {:>10.2}",
            day.date,
            convert_temperature(day.forecast.temperature_range.min, units),
            convert_temperature(day.forecast.temperature_range.max, units),
            convert_precipitation(day.forecast.precipitation_total.value(), units),
            day.confidence.score,
        );
    }
}

fn print_rich(forecast: &AggregatedForecast, units: Units) {
    println!(
        "{:<12} {:>8} {:>8} {:>10} {:>10} {:>10}",
        "Date",
        format!("Min {}", temp_unit_label(units)),
        format!("Max {}", temp_unit_label(units)),
        format!("Precip {}", precip_unit_label(units)),
        "Confidence",
        "Agreement"
    );
    for day in &forecast.consensus.daily {
        println!(
            "{:<12} {:>8.1} {:>8.1} {:>10.1} {:>10} {:>10.0}%",
            day.date,
            convert_temperature(day.forecast.temperature_range.min, units),
            convert_temperature(day.forecast.temperature_range.max, units),
            convert_precipitation(day.forecast.precipitation_total.value(), units),
            format!("{:?}", day.confidence.level),
            day.model_agreement.agreement_score * 100.0,
        );
    }
}

fn print_narrative(forecast: &AggregatedForecast, units: Units) {
    let first = forecast.consensus.daily.first();
    match first {
        Some(day) => println!(
            "{} models agree on a high of {:.0}{unit} and a low of {:.0}{unit} for {}, confidence {:?}.",
            forecast.contributing_models.len(),
            convert_temperature(day.forecast.temperature_range.max, units),
            convert_temperature(day.forecast.temperature_range.min, units),
            day.date,
            day.confidence.level,
            unit = temp_unit_label(units),
        ),
        None => println!("No forecast data is available for the requested window."),
    }
}

/// Emits the raw internal forecast, always in canonical metric/SI units —
/// `--format json` is for introspection, not rendered display, so `units`
/// does not apply here.
fn print_json(forecast: &AggregatedForecast) {
    match serde_json::to_string_pretty(forecast) {
        Ok(body) => println!("{body}"),
        Err(e) => eprintln!("failed to serialize forecast: {e}"),
    }
}

fn print_compare(forecast: &AggregatedForecast, units: Units) {
    let Some(model_forecasts) = &forecast.model_forecasts else {
        eprintln!("no per-model data retained");
        return;
    };
    if forecast.consensus.daily.is_empty() {
        println!("No forecast data is available for the requested window.");
        return;
    }
    let first_date = forecast.consensus.daily[0].date;
    print!("{:<12}", "Model");
    println!(" {:>8} {:>8}", format!("Min {}", temp_unit_label(units)), format!("Max {}", temp_unit_label(units)));
    for model in model_forecasts {
        if let Some(day) = model.daily.iter().find(|d| d.date == first_date) {
            println!(
                "{:<12} {:>8.1} {:>8.1}",
                model.model_id,
                convert_temperature(day.temperature_range.min, units),
                convert_temperature(day.temperature_range.max, units),
            );
        }
    }
    let consensus_day = &forecast.consensus.daily[0];
    println!(
        "{:<12} {:>8.1} {:>8.1}",
        "consensus",
        convert_temperature(consensus_day.forecast.temperature_range.min, units),
        convert_temperature(consensus_day.forecast.temperature_range.max, units),
    );
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "weather_oracle=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = OracleConfig::from_env();
    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .build()
        .expect("failed to build HTTP client");
    let pipeline = Pipeline::new(client, config.clone());

    let result = match &cli.command {
        Command::Forecast { location, days, models, format, no_cache, units } => {
            let options = options_from(&config, *days, models, *no_cache);
            let units = units.map(Units::from).unwrap_or(config.units);
            pipeline.forecast(location, &options, None).await.map(|forecast| {
                match format {
                    Format::Table => print_table(&forecast, units),
                    Format::Rich => print_rich(&forecast, units),
                    Format::Narrative => print_narrative(&forecast, units),
                    Format::Json => print_json(&forecast),
                }
            })
        }
        Command::Compare { location, days, models, units } => {
            let mut options = options_from(&config, *days, models, false);
            options.retain_model_forecasts = true;
            let units = units.map(Units::from).unwrap_or(config.units);
            pipeline.forecast(location, &options, None).await.map(|forecast| print_compare(&forecast, units))
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
