//! Wiggle Service - Main Entry Point
//!
//! Rescans tokens from an observation feed on their priority schedule and
//! persists the valued opportunities.

use wiggle_service::*;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time;
use tracing::{debug, error, info, warn};
use wiggle_service::{
    analytics::{AnalyticsReport, ReportWriter},
    storage::{
        AnalysisHistory, ExchangeStore, JournalLoad, MultiExchangeStore, OpportunityJournal, OpportunityStore,
        TokenStore,
    },
    utils::SessionStats,
    valuation::{self, CostModel},
};

const ANALYTICS_EVERY_SCANS: u64 = 50;
const TOP_REPORT_LIMIT: usize = 5;
const REPORT_HISTORY_DAYS: i64 = 1;
const REPORT_HISTORY_LIMIT: usize = 10;

/// One token's entry in the observation feed file.
#[derive(Debug, Clone, Deserialize)]
struct TokenFeed {
    symbol: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    chain: Chain,
    observations: Vec<MarketObservation>,
}

/// The feed file is either a bare list of tokens or an object that also
/// lists the exchanges to track.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedFile {
    Full {
        #[serde(default)]
        exchanges: Vec<ExchangeDraft>,
        tokens: Vec<TokenFeed>,
    },
    Tokens(Vec<TokenFeed>),
}

struct Feed {
    exchanges: Vec<ExchangeDraft>,
    tokens: BTreeMap<String, TokenFeed>,
}

/// Every store the scan loop reads or writes.
struct Services {
    opportunities: OpportunityStore,
    multi_exchange: MultiExchangeStore,
    tokens: TokenStore,
    exchanges: ExchangeStore,
    analyses: AnalysisHistory,
    journal: OpportunityJournal,
    reports: ReportWriter,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let config = CONFIG.clone();

    // Initialize logging
    let _logging_guard = utils::setup_logging(&config)?;
    utils::setup_output_directories(&config)?;

    info!("🔎 Wiggle Service v{} - Opportunity Valuation", env!("CARGO_PKG_VERSION"));
    info!("📋 Configuration:");
    info!("   Environment: {}", config.environment);
    info!("   Observations: {}", config.observations_path.display());
    info!("   Output: {}", config.output_dir.display());
    info!("   Minimum Net Return: {}%", config.valuation.minimum_return_percent);
    info!("   Minimum Gross Spread: {}%", config.valuation.min_gross_spread_percent);
    info!("   Default Costs: capital ${} | gas ${} | fees {}% ({})",
        config.valuation.default_capital_usd,
        config.valuation.default_gas_cost_usd,
        config.valuation.default_trading_fee_percent,
        config.valuation.fee_application
    );
    info!("   Scan Frequency: high {}s | medium {}s | low {}s",
        config.valuation.schedule.high_secs,
        config.valuation.schedule.medium_secs,
        config.valuation.schedule.low_secs
    );

    let costs = CostModel::from_config(None, None, None, &config.valuation)
        .context("Invalid default cost configuration")?;

    let services = Services {
        opportunities: OpportunityStore::new(),
        multi_exchange: MultiExchangeStore::new(),
        tokens: TokenStore::new(),
        exchanges: ExchangeStore::new(),
        analyses: AnalysisHistory::new(),
        journal: OpportunityJournal::new(&config.output_dir),
        reports: ReportWriter::new(&config.output_dir),
    };

    warm_start(&config, &services, Utc::now()).await;

    let start_time = Instant::now();
    let mut stats = SessionStats::default();

    // Setup shutdown handler
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();
    let shutdown_tx = Arc::new(tokio::sync::Mutex::new(Some(shutdown_tx)));

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("\n📛 Received shutdown signal (Ctrl+C)...");
        if let Some(tx) = shutdown_tx.lock().await.take() {
            let _ = tx.send(());
        }
    });

    info!("\n🚀 Starting scan loop...\n");

    let mut interval = time::interval(Duration::from_secs(config.scan_tick_secs));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = run_scan_cycle(&config, &costs, &services, &mut stats).await {
                    error!("Scan cycle error: {:#}", e);
                    stats.record_error("scan_cycle");
                }
            }
            _ = &mut shutdown_rx => {
                info!("Shutdown signal received, exiting scan loop...");
                break;
            }
        }
    }

    // Print final statistics
    utils::print_session_stats(start_time, &stats);
    report_analytics(&config, &services).await;

    Ok(())
}

/// Reloads today's journal so a restart does not forget earlier scans.
/// Stored schedules are re-derived under the current config.
async fn warm_start(config: &Config, services: &Services, now: DateTime<Utc>) {
    let scan_path = services.journal.scan_path(now);
    if let Some(load) = load_journal(&scan_path, |path| OpportunityJournal::load_scans(path)) {
        let loaded = load.records.len();
        for mut scan in load.records {
            scan.reschedule(&config.valuation);
            if let Err(e) = services.multi_exchange.upsert(scan).await {
                warn!("Skipping journaled scan: {}", e);
            }
        }
        info!("♻️  Restored {} scans ({} lines rejected)", loaded, load.rejected.len());
    }

    let opportunity_path = services.journal.opportunity_path(now);
    if let Some(load) = load_journal(&opportunity_path, |path| OpportunityJournal::load_opportunities(path)) {
        let mut restored = 0;
        for opportunity in load.records {
            if services.opportunities.insert_new(opportunity).await.is_some() {
                restored += 1;
            }
        }
        info!("♻️  Restored {} opportunities ({} lines rejected)", restored, load.rejected.len());
    }
}

fn load_journal<T, F>(path: &Path, load: F) -> Option<JournalLoad<T>>
where
    F: FnOnce(&Path) -> StoreResult<JournalLoad<T>>,
{
    if !path.exists() {
        return None;
    }
    match load(path) {
        Ok(load) => Some(load),
        Err(e) => {
            warn!("Failed to read journal {}: {}", path.display(), e);
            None
        }
    }
}

/// Scans every feed symbol that has no document yet or whose document is due.
async fn run_scan_cycle(
    config: &Config,
    costs: &CostModel,
    services: &Services,
    stats: &mut SessionStats,
) -> Result<()> {
    let now = Utc::now();
    let feed = load_feed(&config.observations_path)?;
    sync_registry(&feed, services, now).await;

    let mut pending: BTreeSet<String> = services
        .multi_exchange
        .due_for_scan(now)
        .await
        .iter()
        .map(|doc| doc.symbol().to_string())
        .filter(|symbol| feed.tokens.contains_key(symbol))
        .collect();
    for symbol in feed.tokens.keys() {
        if services.multi_exchange.get(symbol).await.is_err() {
            pending.insert(symbol.clone());
        }
    }

    let mut scanned: Vec<&TokenFeed> = Vec::new();
    for symbol in &pending {
        let Some(token_feed) = feed.tokens.get(symbol) else { continue };
        match services.tokens.find(symbol, token_feed.chain).await {
            Some(token) if !token.is_active => debug!(symbol = %symbol, "Skipping inactive token"),
            _ => scanned.push(token_feed),
        }
    }

    if scanned.is_empty() {
        debug!(tracked = feed.tokens.len(), "No symbols due for scan");
        return Ok(());
    }

    let scans_before = stats.scans_run;
    let mut run = AnalysisRunBuilder::new(MULTI_EXCHANGE_SCAN, now);
    for token_feed in scanned {
        match scan_and_store(token_feed, config, costs, services, stats, now).await {
            Ok(scan) => run.record_scan(&scan),
            Err(e) => {
                warn!("Scan failed for {}: {:#}", token_feed.symbol, e);
                match e.downcast_ref::<ValuationError>() {
                    Some(err) => stats.record_error(err.kind()),
                    None => stats.record_error("store"),
                }
                run.record_error(&token_feed.symbol, format!("{:#}", e));
            }
        }
    }

    let run = run.finish(Utc::now());
    services.journal.save_analysis(&run)?;
    services.analyses.insert(run).await;

    if stats.scans_run / ANALYTICS_EVERY_SCANS > scans_before / ANALYTICS_EVERY_SCANS {
        report_analytics(config, services).await;
    }

    Ok(())
}

/// Registers feed exchanges and tokens that are not tracked yet.
async fn sync_registry(feed: &Feed, services: &Services, now: DateTime<Utc>) {
    for draft in &feed.exchanges {
        if services.exchanges.get(draft.name.trim()).await.is_ok() {
            continue;
        }
        if let Err(e) = services.exchanges.register(draft.clone(), now).await {
            warn!("Skipping exchange {}: {}", draft.name, e);
        }
    }

    for token_feed in feed.tokens.values() {
        let name = token_feed.name.clone().unwrap_or_else(|| token_feed.symbol.clone());
        let draft = TokenDraft::new(token_feed.symbol.clone(), name, token_feed.chain);
        if let Err(e) = services.tokens.ensure(draft, now).await {
            warn!("Skipping token registration for {}: {}", token_feed.symbol, e);
        }
    }
}

async fn scan_and_store(
    token_feed: &TokenFeed,
    config: &Config,
    costs: &CostModel,
    services: &Services,
    stats: &mut SessionStats,
    now: DateTime<Utc>,
) -> Result<MultiExchangeOpportunity> {
    let name = token_feed.name.as_deref().unwrap_or(&token_feed.symbol);
    let outcome = valuation::scan_symbol(
        &token_feed.symbol,
        name,
        &token_feed.observations,
        costs,
        &config.valuation,
        now,
    )?;

    for rejected in &outcome.rejected {
        stats.record_error(rejected.error.kind());
    }
    record_exchange_health(token_feed, &outcome.rejected, &services.exchanges, now).await;

    let stored = services.multi_exchange.upsert(outcome.opportunity).await?;
    services.journal.save_scan(&stored, now)?;
    utils::print_scan_result(&stored);

    let promoted = valuation::promote_best_pairs(&stored, &config.valuation, now);
    let mut recorded = 0;
    for opportunity in promoted.accepted {
        // unchanged market data yields the same opportunity on every rescan
        if services.opportunities.insert_new(opportunity.clone()).await.is_none() {
            continue;
        }
        services.journal.save_opportunity(&opportunity, now)?;
        utils::print_opportunity(&opportunity);
        recorded += 1;
    }

    stats.record_scan(&stored, recorded, outcome.rejected.len() + promoted.rejected.len());
    Ok(stored)
}

/// One request per observation; a rejected observation counts against its
/// exchange. Exchanges the feed does not list are not tracked.
async fn record_exchange_health(
    token_feed: &TokenFeed,
    rejected: &[valuation::RejectedRecord],
    exchanges: &ExchangeStore,
    now: DateTime<Utc>,
) {
    for (index, observation) in token_feed.observations.iter().enumerate() {
        let exchange = observation.exchange.trim();
        let recorded = match rejected.iter().find(|record| record.index == index) {
            Some(record) => exchanges.record_error(exchange, record.error.to_string(), now).await,
            None => exchanges.record_success(exchange, None, now).await,
        };
        if let Err(StoreError::NotFound { .. }) = recorded {
            debug!(exchange = %exchange, "Observation from an untracked exchange");
        }
    }
}

async fn report_analytics(config: &Config, services: &Services) {
    let now = Utc::now();
    let recent_analyses = services
        .analyses
        .history(now, REPORT_HISTORY_DAYS, REPORT_HISTORY_LIMIT)
        .await
        .unwrap_or_else(|e| {
            warn!("Failed to read analysis history: {}", e);
            Vec::new()
        });

    let report = AnalyticsReport::build(
        &services.opportunities.snapshot().await,
        &services.multi_exchange.snapshot().await,
        services.exchanges.health_summary().await,
        recent_analyses,
        config.valuation.minimum_return_percent,
        TOP_REPORT_LIMIT,
        now,
    );
    utils::print_analytics(&report);
    if let Err(e) = services.reports.write(&report) {
        warn!("Failed to write analytics report: {}", e);
    }
}

/// Reads the feed file; a later entry for the same symbol replaces an earlier one.
fn load_feed(path: &Path) -> Result<Feed> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read observation feed {}", path.display()))?;
    let file: FeedFile = serde_json::from_str(&raw)
        .with_context(|| format!("Malformed observation feed {}", path.display()))?;

    let (exchanges, tokens) = match file {
        FeedFile::Full { exchanges, tokens } => (exchanges, tokens),
        FeedFile::Tokens(tokens) => (Vec::new(), tokens),
    };
    Ok(Feed {
        exchanges,
        tokens: tokens
            .into_iter()
            .map(|feed| (feed.symbol.trim().to_uppercase(), feed))
            .collect(),
    })
}
