//! Display and printing utilities

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{info, warn};
use crate::{
    analytics::AnalyticsReport,
    types::{MultiExchangeOpportunity, Opportunity},
};

/// Running totals for one service session.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub scans_run: u64,
    pub pair_opportunities: u64,
    pub promoted_opportunities: u64,
    pub rejected_records: u64,
    pub best_net_return: Option<Decimal>,
    pub error_counts: HashMap<String, u32>,
}

impl SessionStats {
    pub fn record_scan(&mut self, scan: &MultiExchangeOpportunity, promoted: usize, rejected: usize) {
        self.scans_run += 1;
        self.pair_opportunities += scan.total_opportunities() as u64;
        self.promoted_opportunities += promoted as u64;
        self.rejected_records += rejected as u64;
        if let Some(best) = scan.best_overall_return() {
            self.best_net_return = Some(self.best_net_return.map_or(best, |current| current.max(best)));
        }
    }

    pub fn record_error(&mut self, kind: &str) {
        *self.error_counts.entry(kind.to_string()).or_insert(0) += 1;
    }
}

pub fn print_session_stats(start_time: Instant, stats: &SessionStats) {
    let runtime = start_time.elapsed().as_secs() / 60;

    info!("\n📊 Session Statistics ({} minutes)", runtime);
    info!("   🔍 SCANS:");
    info!("     Scans run: {}", stats.scans_run);
    info!("     Pair opportunities found: {}", stats.pair_opportunities);
    info!("     Promoted (above minimum return): {}", stats.promoted_opportunities);
    info!("     Rejected records: {}", stats.rejected_records);
    match stats.best_net_return {
        Some(best) => info!("     Best net return: {:.2}%", best),
        None => info!("     Best net return: n/a"),
    }

    if !stats.error_counts.is_empty() {
        info!("   ⚙️  ERRORS:");
        for (error_type, count) in stats.error_counts.iter() {
            info!("       {}: {}", error_type, count);
        }
    }

    info!("");
}

pub fn print_scan_result(scan: &MultiExchangeOpportunity) {
    info!(
        "💹 {} ({}) | Exchanges: {} | Opportunities: {} | Priority: {} | Next scan: {}",
        scan.symbol(),
        scan.name(),
        scan.supported_exchanges().len(),
        scan.total_opportunities(),
        scan.priority(),
        scan.next_scan_at().format("%H:%M:%S")
    );

    for (key, best) in scan.best_spreads_per_pair() {
        info!(
            "   {} | {} ${:.4} -> {} ${:.4} | Gross: {:.2}% | Net: {:.2}% | Conf: {:.2}",
            key,
            best.buy().exchange,
            best.buy().price,
            best.sell().exchange,
            best.sell().price,
            best.gross_return_percent(),
            best.net_return_percent(),
            best.confidence_score()
        );
    }
}

pub fn print_opportunity(opportunity: &Opportunity) {
    warn!("\n🎯 OPPORTUNITY #{}", opportunity.id());
    warn!("📍 Token: {}", opportunity.token_symbol());
    warn!("📋 Route: {}", opportunity.source_exchanges().join(" -> "));
    warn!("💰 Return Analysis:");
    warn!("   Gross Return: {:.2}%", opportunity.estimated_return_percent());
    warn!("   Cost Impact:  {:.2}%", opportunity.cost_impact_percent());
    warn!("   Net Return:   {:.2}%", opportunity.net_return_percent());
    warn!("   Capital: ${:.2} | Gas: ${:.2} | Fees: {:.2}%",
        opportunity.capital_required_usd(),
        opportunity.gas_cost_usd(),
        opportunity.trading_fees_percent()
    );
    warn!("📊 Confidence: {:.2} | Risk: {:?}", opportunity.confidence_score(), opportunity.risk_level());
    warn!("⏳ Expires: {}", opportunity.expires_at().format("%Y-%m-%d %H:%M:%S UTC"));
    if !opportunity.notes().is_empty() {
        warn!("📝 {}", opportunity.notes());
    }
}

pub fn print_analytics(report: &AnalyticsReport) {
    let summary = &report.summary;
    info!("\n📈 Opportunity Analytics");
    info!("   Total: {} | Executed: {} | Pending: {} | Last 24h: {}",
        summary.total_opportunities,
        summary.executed_opportunities,
        summary.pending_opportunities,
        summary.recent_opportunities_24h
    );
    info!("   Returns: avg {}% | max {}% | min {}%",
        summary.return_statistics.average_return_percent,
        summary.return_statistics.max_return_percent,
        summary.return_statistics.min_return_percent
    );

    if !report.top_tokens.is_empty() {
        info!("   🪙 Top tokens:");
        for token in &report.top_tokens {
            info!("     {} | {} opps | avg {}% | max {}% | capital ${}",
                token.symbol,
                token.total_opportunities,
                token.average_return_percent,
                token.max_return_percent,
                token.total_capital_usd
            );
        }
    }

    if !report.top_exchange_pairs.is_empty() {
        info!("   🔁 Top exchange pairs:");
        for pair in &report.top_exchange_pairs {
            info!("     {} | {} opps | avg {}% | max {}% | success {}%",
                pair.pair,
                pair.total_opportunities,
                pair.average_return_percent,
                pair.max_return_percent,
                pair.success_rate_percent
            );
        }
    }

    let health = &report.exchange_health;
    if health.total_exchanges > 0 {
        info!("   🏦 Exchanges: {} active | {} healthy of {} | error rate {}% ({} / {} requests)",
            health.active_exchanges,
            health.healthy_exchanges,
            health.total_exchanges,
            health.error_rate_percent,
            health.total_errors,
            health.total_requests
        );
        for unhealthy in &health.unhealthy_exchanges {
            warn!("     ⚠️  {} | {} errors in a row | active: {} | last error: {}",
                unhealthy.name,
                unhealthy.consecutive_errors,
                unhealthy.is_active,
                unhealthy.last_error.as_deref().unwrap_or("n/a")
            );
        }
    }

    if let Some(latest) = report.recent_analyses.first() {
        info!("   🧮 Last analysis: {} tokens | {} found | {} errors | {} ms",
            latest.tokens_analyzed.len(),
            latest.total_opportunities_found,
            latest.errors_encountered,
            latest.duration_ms()
        );
    }
}
