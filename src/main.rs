use crate::config::Config;
use crate::crawler::fetcher::HttpFetcher;
use crate::pipeline::Pipeline;
use tracing::{error, info, warn};

mod config;
mod crawler;
mod errors;
mod index;
mod logging;
mod pipeline;
mod regions;

#[cfg(test)]
mod tests;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cfg = Config::from_env()?;
    let (_log_guard, log_path) = logging::init_logging(&cfg.log_dir)?;
    info!(log_file = %log_path.display(), "logging started");

    let fetcher = HttpFetcher::new(cfg.request_timeout)?;
    let mut sink = index::open(&cfg)?;

    if cfg.clear_index {
        warn!(index = %cfg.index_name, "clearing index before run");
        sink.clear()?;
    }

    let pipeline = Pipeline::new(&fetcher, &cfg.base_url, cfg.retry, cfg.flush_mode)?
        .with_max_pages(cfg.max_pages);
    let (summary, written) = pipeline.run(&cfg.regions, sink.as_mut())?;

    for (region, links) in &summary.links_per_region {
        info!(region, links, "region crawled");
    }
    for (reason, count) in &summary.skipped {
        info!(%reason, count, "listings skipped");
    }
    info!(written, index = %cfg.index_name, "run complete");

    if !summary.failed_regions.is_empty() {
        for (region, err) in &summary.failed_regions {
            error!(region, error = %err, "region failed");
        }
        anyhow::bail!("{} region(s) failed discovery", summary.failed_regions.len());
    }

    Ok(())
}
