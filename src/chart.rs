// 📊 Dashboard charts - datasets seeded from server JSON, fleet refreshed in background
//
// The fleet doughnut is the only chart with live data: /reports counts cars in
// service, /cars counts the whole fleet. Fetches run on worker threads and
// report back over a channel; the UI thread alone mutates chart data.

use crate::error::ChartError;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// ============================================================================
// CHART DATA
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Doughnut,
    Line,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,

    /// Bumped by `update`; renderers redraw when it changes
    #[serde(skip)]
    pub revision: u64,
}

impl Chart {
    pub fn new(kind: ChartKind, labels: Vec<String>, dataset: Dataset) -> Self {
        Chart {
            kind,
            labels,
            datasets: vec![dataset],
            revision: 0,
        }
    }

    /// Set one data point in every dataset, padding with zeros
    pub fn set_point(&mut self, index: usize, value: f64) {
        for dataset in &mut self.datasets {
            if dataset.data.len() <= index {
                dataset.data.resize(index + 1, 0.0);
            }
            dataset.data[index] = value;
        }
    }

    pub fn point(&self, index: usize) -> Option<f64> {
        self.datasets.first().and_then(|d| d.data.get(index).copied())
    }

    pub fn update(&mut self) {
        self.revision += 1;
    }
}

// ============================================================================
// DASHBOARD
// ============================================================================

/// Figures the server embeds in the manager page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSeed {
    #[serde(default)]
    pub last_five_week_users: Vec<u64>,
    #[serde(default)]
    pub month_revenue: Vec<f64>,
}

impl DashboardSeed {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read dashboard seed: {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse dashboard seed JSON")
    }
}

pub const IN_SERVICE_SLOT: usize = 0;
pub const AVAILABLE_SLOT: usize = 1;

/// Which count a fleet fetch produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FleetRequest {
    /// Cars currently in service (one report each)
    Reports,
    /// Whole fleet
    Cars,
}

#[derive(Debug)]
pub struct FleetUpdate {
    pub request: FleetRequest,
    pub result: std::result::Result<usize, ChartError>,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub weekly_customers: Chart,
    pub fleet: Chart,
    pub revenue: Chart,
    in_service: Option<usize>,
    total: Option<usize>,
}

impl Dashboard {
    pub fn new(seed: &DashboardSeed) -> Self {
        let weeks = ["-4", "-3", "-2", "-1", "This week"];
        let weekly_customers = Chart::new(
            ChartKind::Bar,
            weeks.iter().map(|w| w.to_string()).collect(),
            Dataset {
                label: "New customers".to_string(),
                data: seed.last_five_week_users.iter().map(|u| *u as f64).collect(),
            },
        );

        let fleet = Chart::new(
            ChartKind::Doughnut,
            vec!["In-service Cars".to_string(), "Available Cars".to_string()],
            Dataset {
                label: "Fleet".to_string(),
                data: vec![0.0, 0.0],
            },
        );

        let revenue = Chart::new(
            ChartKind::Line,
            (1..=seed.month_revenue.len()).map(|d| d.to_string()).collect(),
            Dataset {
                label: "Revenue".to_string(),
                data: seed.month_revenue.clone(),
            },
        );

        Dashboard {
            weekly_customers,
            fleet,
            revenue,
            in_service: None,
            total: None,
        }
    }

    pub fn in_service(&self) -> Option<usize> {
        self.in_service
    }

    pub fn total(&self) -> Option<usize> {
        self.total
    }

    /// Apply one finished fetch. Failures leave the fleet chart untouched.
    pub fn apply_update(&mut self, update: FleetUpdate) {
        let count = match update.result {
            Ok(count) => count,
            Err(e) => {
                warn!("Fleet refresh failed ({:?}): {}", update.request, e);
                return;
            }
        };

        match update.request {
            FleetRequest::Reports => {
                self.in_service = Some(count);
                self.fleet.set_point(IN_SERVICE_SLOT, count as f64);
            }
            FleetRequest::Cars => self.total = Some(count),
        }

        // Available is only known once both counts are in
        if let (Some(in_service), Some(total)) = (self.in_service, self.total) {
            self.fleet
                .set_point(AVAILABLE_SLOT, total.saturating_sub(in_service) as f64);
        }

        debug!(
            "Fleet chart: in_service={:?} total={:?}",
            self.in_service, self.total
        );
        self.fleet.update();
    }
}

// ============================================================================
// COUNT SOURCES
// ============================================================================

/// Something that can count the items of a JSON array endpoint
pub trait CountSource {
    fn fetch_count(&self, path: &str) -> std::result::Result<usize, ChartError>;
}

pub struct HttpCountSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpCountSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(HttpCountSource {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl CountSource for HttpCountSource {
    fn fetch_count(&self, path: &str) -> std::result::Result<usize, ChartError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|source| ChartError::Request {
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChartError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        let items: Vec<serde_json::Value> = response.json().map_err(|e| ChartError::Payload {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(items.len())
    }
}

/// Fire one background fetch per request. Results arrive on `tx` in any order.
pub fn spawn_fleet_refresh(
    source: Arc<dyn CountSource + Send + Sync>,
    requests: &[(FleetRequest, String)],
    tx: Sender<FleetUpdate>,
) -> Vec<thread::JoinHandle<()>> {
    requests
        .iter()
        .cloned()
        .map(|(request, path)| {
            let source = Arc::clone(&source);
            let tx = tx.clone();
            thread::spawn(move || {
                info!("Fetching {}", path);
                let result = source.fetch_count(&path);
                // Receiver gone means the UI already quit
                let _ = tx.send(FleetUpdate { request, result });
            })
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::mpsc;

    /// Answers from a fixed table; unknown paths get HTTP 500
    struct StubSource {
        counts: HashMap<String, usize>,
    }

    impl StubSource {
        fn new(counts: &[(&str, usize)]) -> Self {
            StubSource {
                counts: counts.iter().map(|(p, c)| (p.to_string(), *c)).collect(),
            }
        }
    }

    impl CountSource for StubSource {
        fn fetch_count(&self, path: &str) -> std::result::Result<usize, ChartError> {
            self.counts.get(path).copied().ok_or(ChartError::Status {
                path: path.to_string(),
                status: 500,
            })
        }
    }

    fn seed() -> DashboardSeed {
        DashboardSeed {
            last_five_week_users: vec![3, 5, 2, 8, 4],
            month_revenue: vec![120.0, 80.5, 310.0],
        }
    }

    fn refresh(dashboard: &mut Dashboard, source: StubSource) {
        let (tx, rx) = mpsc::channel();
        let handles = spawn_fleet_refresh(
            Arc::new(source),
            &[
                (FleetRequest::Reports, "/reports".to_string()),
                (FleetRequest::Cars, "/cars".to_string()),
            ],
            tx,
        );
        for handle in handles {
            handle.join().unwrap();
        }
        for update in rx.try_iter() {
            dashboard.apply_update(update);
        }
    }

    #[test]
    fn test_seed_populates_charts() {
        let dashboard = Dashboard::new(&seed());

        assert_eq!(dashboard.weekly_customers.labels.len(), 5);
        assert_eq!(dashboard.weekly_customers.labels[4], "This week");
        assert_eq!(dashboard.weekly_customers.datasets[0].data, vec![3.0, 5.0, 2.0, 8.0, 4.0]);
        assert_eq!(dashboard.revenue.labels, vec!["1", "2", "3"]);
        assert_eq!(dashboard.fleet.kind, ChartKind::Doughnut);
    }

    #[test]
    fn test_fleet_refresh_both_counts() {
        let mut dashboard = Dashboard::new(&seed());
        refresh(&mut dashboard, StubSource::new(&[("/reports", 3), ("/cars", 10)]));

        assert_eq!(dashboard.fleet.point(IN_SERVICE_SLOT), Some(3.0));
        assert_eq!(dashboard.fleet.point(AVAILABLE_SLOT), Some(7.0));
        assert_eq!(dashboard.fleet.revision, 2);
    }

    #[test]
    fn test_scenario_e_server_error_leaves_data() {
        let mut dashboard = Dashboard::new(&seed());
        refresh(&mut dashboard, StubSource::new(&[("/reports", 3), ("/cars", 10)]));

        // /cars now answers 500; the new /reports count still lands
        refresh(&mut dashboard, StubSource::new(&[("/reports", 5)]));

        assert_eq!(dashboard.total(), Some(10));
        assert_eq!(dashboard.fleet.point(IN_SERVICE_SLOT), Some(5.0));
        assert_eq!(dashboard.fleet.point(AVAILABLE_SLOT), Some(5.0));
        assert_eq!(dashboard.fleet.revision, 3);

        // Both answer 500: nothing moves
        let before = dashboard.fleet.datasets.clone();
        refresh(&mut dashboard, StubSource::new(&[]));

        assert_eq!(dashboard.fleet.datasets, before);
        assert_eq!(dashboard.fleet.point(AVAILABLE_SLOT), Some(5.0));
        assert_eq!(dashboard.fleet.revision, 3);
    }

    #[test]
    fn test_available_waits_for_total() {
        let mut dashboard = Dashboard::new(&seed());
        dashboard.apply_update(FleetUpdate {
            request: FleetRequest::Reports,
            result: Ok(4),
        });

        assert_eq!(dashboard.fleet.point(IN_SERVICE_SLOT), Some(4.0));
        assert_eq!(dashboard.fleet.point(AVAILABLE_SLOT), Some(0.0));
        assert_eq!(dashboard.in_service(), Some(4));
        assert_eq!(dashboard.total(), None);
    }

    #[test]
    fn test_failed_fetch_changes_nothing() {
        let mut dashboard = Dashboard::new(&seed());
        let before = dashboard.fleet.clone();

        dashboard.apply_update(FleetUpdate {
            request: FleetRequest::Cars,
            result: Err(ChartError::Status {
                path: "/cars".to_string(),
                status: 503,
            }),
        });

        assert_eq!(dashboard.fleet, before);
    }

    #[test]
    fn test_seed_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        fs::write(&path, r#"{"last_five_week_users": [1, 2, 3, 4, 5], "month_revenue": [9.5]}"#).unwrap();

        let seed = DashboardSeed::from_file(&path).unwrap();
        assert_eq!(seed.last_five_week_users, vec![1, 2, 3, 4, 5]);
        assert_eq!(seed.month_revenue, vec![9.5]);
    }

    #[test]
    fn test_http_source_unreachable_is_request_error() {
        // Port 9 (discard) is closed on test machines
        let source = HttpCountSource::new("http://127.0.0.1:9/", Duration::from_millis(500)).unwrap();
        assert!(matches!(
            source.fetch_count("/cars"),
            Err(ChartError::Request { .. })
        ));
    }
}
