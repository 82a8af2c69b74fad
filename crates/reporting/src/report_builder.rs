//! Report builder: runs every analysis over one dataset and exports the
//! results as CSV tables plus a JSON summary.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use funnel_core::config::SimulationConfig;
use funnel_core::FunnelResult;
use funnel_journey::Journey;

use crate::attribution::{AttributionComparison, RevenueAttributionEngine};
use crate::budget::{channel_roi, BudgetOptimizer, BudgetPlan, ChannelRoi};
use crate::cohort::{CohortAnalysis, CohortAnalyzer, CohortPeriod};
use crate::funnel::{FunnelAnalyzer, FunnelReport};
use crate::segment::{Dimension, SegmentBreakdown};
use crate::table::{ReportTable, ToReportTable};

// ─── Types ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub funnel: FunnelReport,
    pub channels: SegmentBreakdown,
    pub devices: SegmentBreakdown,
    pub age_groups: SegmentBreakdown,
    pub locations: SegmentBreakdown,
    pub cohorts: CohortAnalysis,
    pub attribution: AttributionComparison,
    pub channel_roi: Vec<ChannelRoi>,
    pub budget: BudgetPlan,
}

// ─── Builder ────────────────────────────────────────────────────────────────

pub struct ReportBuilder {
    attribution: RevenueAttributionEngine,
    optimizer: BudgetOptimizer,
    config: SimulationConfig,
}

impl ReportBuilder {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            attribution: RevenueAttributionEngine::new(config.reporting.time_decay_scale_minutes),
            optimizer: BudgetOptimizer::from_config(config),
            config: config.clone(),
        }
    }

    pub fn build(&self, journeys: &[Journey]) -> AnalysisReport {
        info!(users = journeys.len(), "Building funnel analysis report");

        let funnel = FunnelAnalyzer::analyze(journeys);
        let channel_roi = channel_roi(journeys, &self.config);
        let budget = self.optimizer.optimize(&channel_roi);

        let report = AnalysisReport {
            channels: SegmentBreakdown::by(Dimension::Channel, journeys),
            devices: SegmentBreakdown::by(Dimension::Device, journeys),
            age_groups: SegmentBreakdown::by(Dimension::AgeGroup, journeys),
            locations: SegmentBreakdown::by(Dimension::Location, journeys),
            cohorts: CohortAnalyzer::analyze(journeys, CohortPeriod::Monthly),
            attribution: self.attribution.compare(journeys),
            funnel,
            channel_roi,
            budget,
        };
        report.log_insights();
        report
    }
}

impl AnalysisReport {
    /// Output file name and table for every CSV report.
    pub fn tables(&self) -> Vec<(&'static str, ReportTable)> {
        vec![
            ("channel_performance_metrics.csv", self.channels.to_table()),
            ("device_performance_metrics.csv", self.devices.to_table()),
            ("cohort_analysis.csv", self.cohorts.to_table()),
            ("attribution_model_comparison.csv", self.attribution.to_table()),
            ("channel_roi_metrics.csv", self.channel_roi.as_slice().to_table()),
            ("budget_allocation_recommendations.csv", self.budget.to_table()),
        ]
    }

    /// The full report as pretty JSON.
    pub fn to_json(&self) -> FunnelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes every CSV table and `funnel_summary.json` into `dir`,
    /// returning the paths written.
    pub fn write_to(&self, dir: &Path) -> FunnelResult<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for (file_name, table) in self.tables() {
            let path = dir.join(file_name);
            fs::write(&path, table.to_csv())?;
            written.push(path);
        }
        let summary = dir.join("funnel_summary.json");
        fs::write(&summary, self.to_json()?)?;
        written.push(summary);

        info!(files = written.len(), dir = %dir.display(), "Wrote analysis reports");
        Ok(written)
    }

    fn log_insights(&self) {
        let round = |v: f64| (v * 100.0).round() / 100.0;
        info!(
            conversion_pct = round(self.funnel.overall_conversion_pct),
            revenue = round(self.funnel.total_revenue),
            aov = round(self.funnel.average_order_value),
            "Funnel summary"
        );
        if let Some(drop) = &self.funnel.biggest_drop_off {
            info!(
                from = %drop.from,
                to = %drop.to,
                drop_off_pct = round(drop.drop_off_pct),
                "Biggest drop-off"
            );
        }
        if let (Some(best), Some(worst)) = (self.channels.best(), self.channels.worst()) {
            info!(best = %best.segment, worst = %worst.segment, "Channel performance");
        }
        if let Some(top) = self.channel_roi.first() {
            info!(channel = %top.channel, roas = round(top.roas), "Highest ROAS channel");
        }
        info!(
            lift_pct = round(self.budget.revenue_lift_pct),
            "Projected lift from budget reallocation"
        );
    }
}
