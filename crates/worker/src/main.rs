use anyhow::Context;
use clap::{Parser, Subcommand};

use psipay_core::config::{CacheBackend, Settings};
use psipay_core::domain::category::Category;
use psipay_core::domain::criteria::Criteria;
use psipay_core::ingest::live::ProductsQuery;
use psipay_core::service::{Advisor, RecommendOptions};

mod purge;

#[derive(Debug, Parser)]
#[command(name = "psipay_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Refetch every category with cache reads bypassed, storing fresh records.
    Warm,

    /// Delete cache records whose TTL ended more than `grace_hours` ago.
    Purge {
        #[arg(long, default_value_t = purge::DEFAULT_GRACE_HOURS)]
        grace_hours: u32,
    },

    /// Print a full recommendation for one category.
    Recommend {
        #[arg(long)]
        category: String,

        /// Criteria as a JSON object.
        #[arg(long, default_value = "{}")]
        criteria: String,

        #[arg(long)]
        skip_cache: bool,

        /// Skip the AI narrative and print the deterministic recommendation.
        #[arg(long)]
        no_ai: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = psipay_core::telemetry::init(&settings, sentry::release_name!());

    let args = Args::parse();

    let result = run(args.command, &settings).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "worker run failed");
    }
    result
}

async fn run(command: Command, settings: &Settings) -> anyhow::Result<()> {
    match command {
        Command::Warm => {
            let advisor = advisor(settings).await?;
            warm(&advisor).await
        }
        Command::Purge { grace_hours } => {
            let pool = connect(settings).await?;
            let deleted = purge::run(&pool, grace_hours, chrono::Utc::now()).await?;
            tracing::info!(deleted, grace_hours, "purged expired cache records");
            Ok(())
        }
        Command::Recommend {
            category,
            criteria,
            skip_cache,
            no_ai,
        } => {
            let category: Category = category.parse()?;
            let raw: serde_json::Value =
                serde_json::from_str(&criteria).context("--criteria must be valid JSON")?;
            let criteria = Criteria::from_json(category, &raw)?;
            let options = RecommendOptions {
                bypass_cache: skip_cache,
                use_ai: !no_ai,
            };

            let advisor = advisor(settings).await?;
            let today = chrono::Utc::now().date_naive();
            let response = advisor.recommend(&criteria, options, today).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}

/// Warming reports every category before failing so one bad upstream does
/// not hide the others.
async fn warm(advisor: &Advisor) -> anyhow::Result<()> {
    let today = chrono::Utc::now().date_naive();
    let query = ProductsQuery {
        bypass_cache: true,
        ..ProductsQuery::default()
    };

    let mut failed = Vec::new();
    for category in Category::ALL {
        match advisor.products(category, query, today).await {
            Ok(snapshot) => tracing::info!(
                %category,
                series = snapshot.series.len(),
                points = snapshot.series.iter().map(|s| s.points.len()).sum::<usize>(),
                "cache warmed"
            ),
            Err(err) => {
                tracing::error!(%category, error = %format!("{err:#}"), "cache warm failed");
                failed.push(category.as_str());
            }
        }
    }

    anyhow::ensure!(failed.is_empty(), "cache warm failed for {}", failed.join(", "));
    Ok(())
}

async fn connect(settings: &Settings) -> anyhow::Result<sqlx::PgPool> {
    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    psipay_core::storage::migrate(&pool).await?;
    Ok(pool)
}

async fn advisor(settings: &Settings) -> anyhow::Result<Advisor> {
    let pool = match settings.cache_backend {
        CacheBackend::Postgres => Some(connect(settings).await?),
        CacheBackend::Memory | CacheBackend::Disabled => None,
    };
    let cache = psipay_core::storage::series_cache(settings, pool);
    Advisor::from_settings(settings, cache)
}
