mod funnel;
mod scorer;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use clerk_core::{
    FallbackReason, Lexicon, Product, RecommendationResult, ScoreSource,
};
use clerk_store::{PreferenceStore, ProfileStore};
use scorer::ScorerClient;

#[derive(Parser)]
#[command(name = "clerk", about = "Context-aware shopping recommendation CLI")]
struct Cli {
    /// Preference profile to use (defaults to "default")
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter and rank a product catalog for a query
    Recommend {
        /// Free-text shopping request
        query: String,

        /// JSON file holding the product catalog (array of products)
        #[arg(long)]
        products: PathBuf,

        /// Do not fold this query into the preference model
        #[arg(long)]
        no_learn: bool,
    },

    /// Show the structured interpretation of a query
    Parse {
        /// Free-text shopping request
        query: String,
    },

    /// Fold a query into the preference model without recommending
    Learn {
        /// Free-text shopping request
        query: String,
    },

    /// Show insights synthesized from learned preferences
    Insights,

    /// Show raw learned preference records
    Prefs,

    /// Delete all learned preferences (session history survives)
    Clear,

    /// Show profile statistics
    Stats,
}

/// Everything a command needs: the durable model plus profile metadata
/// captured before the profile wrapper is consumed.
struct Session {
    prefs: PreferenceStore,
    lexicon: Lexicon,
    profile_id: String,
    db_size: u64,
    api_key: Option<String>,
}

fn open_session(cli: &Cli) -> Result<Session> {
    let profile = ProfileStore::open(cli.profile.as_deref(), None)
        .context("failed to open profile store")?;
    let lexicon = profile.load_lexicon();
    let profile_id = profile.profile_id().to_string();
    let db_size = profile.db_size();
    let api_key = profile.load_api_key();
    let prefs =
        PreferenceStore::load(profile.into_store()).context("failed to load preferences")?;
    Ok(Session {
        prefs,
        lexicon,
        profile_id,
        db_size,
        api_key,
    })
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Recommend {
            query,
            products,
            no_learn,
        } => cmd_recommend(&cli, query, products, *no_learn).await,
        Commands::Parse { query } => cmd_parse(&cli, query),
        Commands::Learn { query } => cmd_learn(&cli, query),
        Commands::Insights => cmd_insights(&cli),
        Commands::Prefs => cmd_prefs(&cli),
        Commands::Clear => cmd_clear(&cli),
        Commands::Stats => cmd_stats(&cli),
    }
}

async fn cmd_recommend(
    cli: &Cli,
    query: &str,
    products_path: &Path,
    no_learn: bool,
) -> Result<()> {
    let mut session = open_session(cli)?;

    let content = std::fs::read_to_string(products_path)
        .with_context(|| format!("failed to read {}", products_path.display()))?;
    let products: Vec<Product> =
        serde_json::from_str(&content).context("invalid product catalog")?;

    let parsed = clerk_core::parse(query, &session.lexicon);

    if let Some(first) = products.first()
        && !first.site.is_empty()
    {
        session.prefs.update_page(&first.site, products.len());
    }
    if !no_learn {
        session.prefs.learn(query, &parsed);
    }
    let insights = session.prefs.insights();

    // Environment wins over the profile config
    let api_key = std::env::var(scorer::API_KEY_ENV)
        .ok()
        .filter(|k| !k.is_empty())
        .or_else(|| session.api_key.clone());
    let scorer = ScorerClient::new(api_key);
    let result = funnel::recommend(&scorer, query, &parsed, &products, Some(&insights)).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn cmd_parse(cli: &Cli, query: &str) -> Result<()> {
    let session = open_session(cli)?;
    let parsed = clerk_core::parse(query, &session.lexicon);
    // The interpretation is structured either way; text mode gets the same JSON
    println!("{}", serde_json::to_string_pretty(&parsed)?);
    Ok(())
}

fn cmd_learn(cli: &Cli, query: &str) -> Result<()> {
    let mut session = open_session(cli)?;
    let parsed = clerk_core::parse(query, &session.lexicon);
    session.prefs.learn(query, &parsed);

    let prefs = session.prefs.preferences();
    println!(
        "learned. budget={}, categories={}, brands={}, specs={}, purposes={}",
        prefs.budget.len(),
        prefs.categories.len(),
        prefs.brands.len(),
        prefs.specs.len(),
        prefs.purposes.len(),
    );
    Ok(())
}

fn cmd_insights(cli: &Cli) -> Result<()> {
    let session = open_session(cli)?;
    let insights = session.prefs.insights();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&insights)?);
        return Ok(());
    }

    match &insights.recommended_budget {
        Some(b) => println!(
            "budget:     {} (avg ₹{}, {}, {:.0}% confidence)",
            b.range, b.average_amount, b.operator, b.confidence
        ),
        None => println!("budget:     (none)"),
    }
    println!(
        "categories: {}",
        join_insights(insights.preferred_categories.iter().map(|c| (&c.key, c.confidence)))
    );
    println!(
        "brands:     {}",
        join_insights(insights.preferred_brands.iter().map(|b| (&b.key, b.confidence)))
    );
    let specs: Vec<String> = insights
        .common_specs
        .iter()
        .map(|s| format!("{}: {} ({:.0}%)", s.spec_type, s.value, s.confidence))
        .collect();
    println!(
        "specs:      {}",
        if specs.is_empty() {
            "(none)".to_string()
        } else {
            specs.join(", ")
        }
    );
    println!("purpose:    {}", insights.search_patterns.dominant_purpose);
    println!(
        "queries:    {} this session",
        insights.search_patterns.total_queries
    );
    if !insights.search_patterns.recent_queries.is_empty() {
        println!(
            "recent:     {}",
            insights.search_patterns.recent_queries.join("; ")
        );
    }
    Ok(())
}

fn join_insights<'a>(items: impl Iterator<Item = (&'a String, f64)>) -> String {
    let parts: Vec<String> = items
        .map(|(key, confidence)| format!("{key} ({confidence:.0}%)"))
        .collect();
    if parts.is_empty() {
        "(none)".to_string()
    } else {
        parts.join(", ")
    }
}

fn cmd_prefs(cli: &Cli) -> Result<()> {
    let session = open_session(cli)?;
    let prefs = session.prefs.preferences();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(prefs)?);
        return Ok(());
    }

    if prefs.is_empty() {
        println!("(no learned preferences)");
        return Ok(());
    }

    for record in prefs.budget.iter() {
        println!(
            "budget    {:<14} count={} avg=₹{:.0} ({}) {:.0}%",
            record.bucket,
            record.count,
            record.total_amount / record.count as f64,
            record.operator,
            record.confidence,
        );
    }
    for (label, records) in [
        ("category", prefs.categories_ranked()),
        ("brand", prefs.brands_ranked()),
        ("purpose", prefs.purposes_ranked()),
    ] {
        for record in records {
            println!(
                "{label:<9} {:<14} count={} {:.0}%  last seen {}",
                record.key,
                record.count,
                record.confidence,
                clerk_core::unix_to_iso8601(record.last_seen / 1000),
            );
        }
    }
    for record in prefs.specs_ranked() {
        println!(
            "spec      {:<14} {} count={} {:.0}%  last seen {}",
            record.spec_type,
            record.value,
            record.count,
            record.confidence,
            clerk_core::unix_to_iso8601(record.last_seen / 1000),
        );
    }
    Ok(())
}

fn cmd_clear(cli: &Cli) -> Result<()> {
    let mut session = open_session(cli)?;
    session
        .prefs
        .clear()
        .context("failed to clear preferences")?;
    println!(
        "cleared learned preferences for profile '{}'",
        session.profile_id
    );
    Ok(())
}

fn cmd_stats(cli: &Cli) -> Result<()> {
    let session = open_session(cli)?;
    let prefs = session.prefs.preferences();
    let ctx = session.prefs.session();

    println!("profile:    {}", session.profile_id);
    println!("queries:    {}", ctx.session_queries.len());
    println!("page:       {} ({} products)", ctx.current_page, ctx.product_count);
    println!("budget:     {}", prefs.budget.len());
    println!("categories: {}", prefs.categories.len());
    println!("brands:     {}", prefs.brands.len());
    println!("specs:      {}", prefs.specs.len());
    println!("purposes:   {}", prefs.purposes.len());
    println!(
        "db_size:    {:.1}MB",
        session.db_size as f64 / (1024.0 * 1024.0)
    );
    Ok(())
}

fn print_result(result: &RecommendationResult) {
    let source = match result.source {
        ScoreSource::Ai => "ai",
        ScoreSource::Fallback(FallbackReason::MissingCredential) => "fallback (no API key)",
        ScoreSource::Fallback(FallbackReason::Transient) => "fallback (scorer unavailable)",
        ScoreSource::NoMatches => "no matches",
    };
    println!("source:   {source}");
    println!(
        "products: {} total, {} matched",
        result.total_products, result.filtered_products
    );

    for (i, rec) in result.recommendations.iter().enumerate() {
        println!(
            "\n{}. {} — ₹{} (score {:.0})",
            i + 1,
            rec.product.title,
            rec.product.price,
            rec.score
        );
        println!("   {}", rec.reason);
        for pro in &rec.pros {
            println!("   + {pro}");
        }
        for con in &rec.cons {
            println!("   - {con}");
        }
        if !rec.compatibility.is_empty() {
            println!("   compatibility: {}", rec.compatibility);
        }
        if let Some(alignment) = &rec.context_alignment {
            println!("   alignment: {alignment}");
        }
    }

    if !result.summary.is_empty() {
        println!("\n{}", result.summary);
    }
    if !result.build_suggestion.is_empty() {
        println!("build: {}", result.build_suggestion);
    }
    if !result.alternatives.is_empty() {
        println!("alternatives: {}", result.alternatives);
    }
    if !result.context_insights.is_empty() {
        println!("context: {}", result.context_insights);
    }
    if result.source == ScoreSource::Fallback(FallbackReason::MissingCredential) {
        println!(
            "\nSet {} (or api_key in config.toml) to enable AI ranking.",
            scorer::API_KEY_ENV
        );
    }
}
