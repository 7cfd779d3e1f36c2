//! Background job scheduler.
//!
//! Cron expressions are UTC. The store refresh runs at 02:00 and the catalog
//! refresh at 04:00 New Zealand standard time; during daylight saving both
//! land an hour later local. A job that finds its refresh guard held skips
//! the run.

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tradeprice_scraper::ScraperError;

use crate::api::AppState;

/// Daily store refresh, 14:00 UTC.
const STORE_REFRESH_CRON: &str = "0 0 14 * * *";
/// Daily catalog refresh, 16:00 UTC.
const PRODUCT_REFRESH_CRON: &str = "0 0 16 * * *";
/// Re-price recently searched products every 6 hours.
const PRICE_REFRESH_CRON: &str = "0 0 */6 * * *";
/// Sweep every cache every 6 hours, offset from the price refresh.
const CACHE_SWEEP_CRON: &str = "0 30 */6 * * *";
/// Sweep the price cache every 30 minutes.
const PRICE_SWEEP_CRON: &str = "0 */30 * * * *";

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(state: AppState) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    for job in jobs(&state)? {
        scheduler.add(job).await?;
    }

    scheduler.start().await?;
    Ok(scheduler)
}

fn jobs(state: &AppState) -> Result<Vec<Job>, JobSchedulerError> {
    let stores = state.clone();
    let prices = state.clone();
    let products = state.clone();
    let sweep = state.clone();
    let price_sweep = state.clone();

    Ok(vec![
        Job::new_async(STORE_REFRESH_CRON, move |_uuid, _lock| {
            let state = stores.clone();
            Box::pin(async move {
                run_store_refresh(&state).await;
            })
        })?,
        Job::new_async(PRICE_REFRESH_CRON, move |_uuid, _lock| {
            let state = prices.clone();
            Box::pin(async move {
                run_price_refresh(&state).await;
            })
        })?,
        Job::new_async(PRODUCT_REFRESH_CRON, move |_uuid, _lock| {
            let state = products.clone();
            Box::pin(async move {
                run_product_refresh(&state).await;
            })
        })?,
        Job::new_async(CACHE_SWEEP_CRON, move |_uuid, _lock| {
            let state = sweep.clone();
            Box::pin(async move {
                let swept = state.service.sweep_expired();
                tracing::info!(
                    stores = swept.stores,
                    prices = swept.prices,
                    products = swept.products,
                    "scheduler: swept expired cache entries"
                );
            })
        })?,
        Job::new_async(PRICE_SWEEP_CRON, move |_uuid, _lock| {
            let state = price_sweep.clone();
            Box::pin(async move {
                let removed = state.service.sweep_expired_prices();
                tracing::debug!(removed, "scheduler: swept expired price entries");
            })
        })?,
    ])
}

/// Full store refresh. Returns `false` when skipped because another
/// refresh holds the guard.
pub(crate) async fn run_store_refresh(state: &AppState) -> bool {
    tracing::info!("scheduler: starting store refresh");
    match state.service.refresh_all_stores().await {
        Ok(result) => {
            tracing::info!(
                total = result.total,
                failed = result.errors.len(),
                duration_ms = result.duration_ms,
                "scheduler: store refresh complete"
            );
            true
        }
        Err(ScraperError::RefreshInProgress(_)) => {
            tracing::info!("scheduler: store refresh already running; skipping");
            false
        }
        Err(e) => {
            tracing::error!(error = %e, "scheduler: store refresh failed");
            false
        }
    }
}

/// Full catalog refresh. Returns `false` when skipped because another
/// refresh holds the guard.
pub(crate) async fn run_product_refresh(state: &AppState) -> bool {
    tracing::info!("scheduler: starting catalog refresh");
    match state.service.refresh_products().await {
        Ok(refresh) => {
            tracing::info!(
                total = refresh.total,
                failed = refresh.errors.len(),
                provenance = %refresh.provenance,
                "scheduler: catalog refresh complete"
            );
            true
        }
        Err(ScraperError::RefreshInProgress(_)) => {
            tracing::info!("scheduler: catalog refresh already running; skipping");
            false
        }
        Err(e) => {
            tracing::error!(error = %e, "scheduler: catalog refresh failed");
            false
        }
    }
}

/// Re-fetch prices for every recently searched product whose guard is free.
/// Returns how many queries were refreshed.
pub(crate) async fn run_price_refresh(state: &AppState) -> usize {
    let mut refreshed = 0;
    for query in state.service.recent_queries() {
        match state.service.fetch_prices(&query, None, true).await {
            Ok(quotes) => {
                tracing::debug!(query = %query.name, count = quotes.len(), "scheduler: prices refreshed");
                refreshed += 1;
            }
            Err(ScraperError::RefreshInProgress(_)) => {
                tracing::info!(query = %query.name, "scheduler: price refresh already running; skipping");
            }
            Err(e) => {
                tracing::warn!(query = %query.name, error = %e, "scheduler: price refresh failed");
            }
        }
    }
    tracing::info!(refreshed, "scheduler: recent price refresh complete");
    refreshed
}
