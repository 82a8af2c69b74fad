//! End-to-end: generate a dataset, analyze it, and write every output file.

#[cfg(test)]
mod tests {
    use funnel_core::{FunnelStage, SimulationConfig};
    use funnel_journey::{dataset_csv, JourneyGenerator, DATASET_COLUMNS};
    use funnel_reporting::{AttributionModel, ReportBuilder};

    fn make_config(users: u64) -> SimulationConfig {
        SimulationConfig {
            user_count: users,
            ..Default::default()
        }
    }

    #[test]
    fn test_generate_then_analyze() {
        let cfg = make_config(20_000);
        let journeys = JourneyGenerator::new(&cfg).unwrap().generate().unwrap();
        let report = ReportBuilder::new(&cfg).build(&journeys);

        // Stage counts never increase down the funnel.
        let users: Vec<u64> = report.funnel.steps.iter().map(|s| s.users).collect();
        assert_eq!(users[0], 20_000);
        assert!(users.windows(2).all(|w| w[0] >= w[1]), "{users:?}");

        // Email carries the highest multiplier among the default channels
        // and should out-convert Social Media.
        let email = report.channels.get("Email").unwrap();
        let social = report.channels.get("Social Media").unwrap();
        assert!(email.conversion_rate_pct > social.conversion_rate_pct);

        let desktop = report.devices.get("Desktop").unwrap();
        let mobile = report.devices.get("Mobile").unwrap();
        assert!(desktop.conversion_rate_pct > mobile.conversion_rate_pct);

        // Single-touch data: first-touch revenue equals total funnel revenue.
        let first_touch: f64 = report
            .attribution
            .channels
            .iter()
            .map(|c| c.credits[0].revenue)
            .sum();
        assert_eq!(report.attribution.channels[0].credits[0].model, AttributionModel::FirstTouch);
        assert!((first_touch - report.funnel.total_revenue).abs() < 1e-6);

        let share_sum: f64 = report.budget.allocations.iter().map(|a| a.optimal_share_pct).sum();
        assert!((share_sum - 100.0).abs() < 1e-6);

        let purchasers = report.funnel.step(FunnelStage::Purchase).unwrap().users;
        let converted = journeys.iter().filter(|j| j.is_converted()).count() as u64;
        assert_eq!(purchasers, converted);
    }

    #[test]
    fn test_write_outputs() {
        let cfg = make_config(2_000);
        let journeys = JourneyGenerator::new(&cfg).unwrap().generate().unwrap();
        let report = ReportBuilder::new(&cfg).build(&journeys);

        let tmp = tempfile::tempdir().unwrap();
        let written = report.write_to(tmp.path()).unwrap();
        assert_eq!(written.len(), 7);
        for path in &written {
            assert!(path.exists(), "{} missing", path.display());
        }

        let channels =
            std::fs::read_to_string(tmp.path().join("channel_performance_metrics.csv")).unwrap();
        assert_eq!(channels.lines().count(), cfg.channels.len() + 1);

        let summary = std::fs::read_to_string(tmp.path().join("funnel_summary.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&summary).unwrap();
        assert_eq!(parsed["funnel"]["total_users"], 2_000);
    }

    #[test]
    fn test_dataset_and_reports_agree() {
        let cfg = make_config(1_000);
        let journeys = JourneyGenerator::new(&cfg).unwrap().generate().unwrap();
        let csv = dataset_csv(&journeys).unwrap();
        let purchase_col = DATASET_COLUMNS
            .iter()
            .position(|c| *c == "stage_5_purchase")
            .unwrap();
        let purchases = csv
            .lines()
            .skip(1)
            .filter(|line| line.split(',').nth(purchase_col) == Some("1"))
            .count() as u64;

        let report = ReportBuilder::new(&cfg).build(&journeys);
        assert_eq!(
            report.funnel.step(FunnelStage::Purchase).unwrap().users,
            purchases
        );
    }
}
