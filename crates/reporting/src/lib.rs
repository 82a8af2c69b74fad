//! Funnel analytics and reporting: stage conversion, segment and cohort
//! breakdowns, revenue attribution, channel ROI and budget reallocation.

pub mod attribution;
pub mod budget;
pub mod cohort;
pub mod funnel;
pub mod report_builder;
pub mod segment;
pub mod table;

pub use attribution::{AttributionComparison, AttributionModel, RevenueAttributionEngine};
pub use budget::{BudgetOptimizer, BudgetPlan, ChannelRoi, Recommendation};
pub use cohort::{CohortAnalysis, CohortAnalyzer, CohortPeriod};
pub use funnel::{FunnelAnalyzer, FunnelReport};
pub use report_builder::{AnalysisReport, ReportBuilder};
pub use segment::{Dimension, SegmentBreakdown};
pub use table::{ReportTable, ToReportTable};
