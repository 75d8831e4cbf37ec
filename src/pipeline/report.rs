//! Log-based summaries of intermediate tables

use crate::data::schema::TOTAL_TRAFFIC;
use crate::data::HourlyTable;
use crate::error::Result;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Log row count and per-column statistics of `table`
pub fn log_summary(table: &HourlyTable, stage: &str) {
    info!(stage, rows = table.height(), columns = table.width(), "table summary");
    for s in table.summary() {
        debug!(
            stage,
            column = %s.name,
            count = s.count,
            missing = s.missing,
            mean = s.mean,
            std = s.std,
            min = s.min,
            max = s.max,
            "column summary"
        );
    }
}

/// Mean target per calendar year, logged and returned
pub fn yearly_target_means(table: &HourlyTable) -> Result<BTreeMap<i32, f64>> {
    let means = table.yearly_mean(TOTAL_TRAFFIC)?;
    for (year, mean) in &means {
        info!(year, mean_traffic = mean, "average hourly traffic");
    }
    Ok(means)
}
