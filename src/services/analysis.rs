use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use crate::charts::ChartRenderer;
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::ml::{
    generate_forecast, seasonal_decompose, ForecastPoint, OrderSampler, OrderSearch,
    RandomSampler, Trial,
};
use crate::models::{ChartArtifact, ChartKind, ReportSummary, SalesDataset};
use crate::services::reports::ReportService;
use crate::services::spreadsheet::SheetTable;

/// Chart locations as served under `/static`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImagePaths {
    pub series_tiempo: String,
    pub descomposicion: String,
    pub pronostico: String,
}

impl Default for ImagePaths {
    fn default() -> Self {
        let url = |kind: ChartKind| format!("/static/{}", kind.file_name());
        Self {
            series_tiempo: url(ChartKind::SeriesTiempo),
            descomposicion: url(ChartKind::Descomposicion),
            pronostico: url(ChartKind::Pronostico),
        }
    }
}

/// Everything an analysis run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub img_paths: ImagePaths,
    pub resumen: ReportSummary,
    pub pdf_filename: String,
    pub forecast: Vec<ForecastPoint>,
    pub trials: Vec<Trial>,
}

/// Runs the full pipeline: load, chart, decompose, search, forecast, report.
#[derive(Debug, Clone)]
pub struct AnalysisService {
    config: Arc<AppConfig>,
    charts: ChartRenderer,
    reports: Arc<ReportService>,
}

impl AnalysisService {
    pub fn new(config: Arc<AppConfig>, reports: Arc<ReportService>) -> Self {
        let charts = ChartRenderer::new(&config.charts);
        Self {
            config,
            charts,
            reports,
        }
    }

    fn chart_path(&self, kind: ChartKind) -> PathBuf {
        self.config.images_dir.join(kind.file_name())
    }

    /// Loads the spreadsheet at `path` and analyses it with a random order sampler.
    #[instrument(skip(self), fields(file = %path.display()))]
    pub fn analyze_file(&self, path: &Path) -> Result<AnalysisReport, ServiceError> {
        let records = SheetTable::read(path)?.sales_records()?;
        let dataset = SalesDataset::new(records);
        info!(records = dataset.len(), "sales data loaded");

        let mut sampler = RandomSampler::new(self.config.analysis.search_seed);
        self.analyze_dataset(&dataset, &mut sampler)
    }

    /// Analyses an already loaded dataset. Artifacts are overwritten on every run.
    pub fn analyze_dataset<S: OrderSampler + ?Sized>(
        &self,
        dataset: &SalesDataset,
        sampler: &mut S,
    ) -> Result<AnalysisReport, ServiceError> {
        if dataset.is_empty() {
            return Err(ServiceError::DataError("no sales records to analyse".into()));
        }
        if let Some(bad) = dataset
            .records()
            .iter()
            .find(|record| !record.total.is_finite() || record.total < 0.0)
        {
            return Err(ServiceError::DataError(format!(
                "sales total {} on {} is not a non-negative number",
                bad.total, bad.date
            )));
        }
        let total_ventas = dataset.total_sales();

        let analysis = &self.config.analysis;
        std::fs::create_dir_all(&self.config.images_dir)?;
        let dates = dataset.dates();
        let totals = dataset.totals();

        let series_path = self.chart_path(ChartKind::SeriesTiempo);
        self.charts.series_chart(&series_path, &dates, &totals)?;

        let decomposition = seasonal_decompose(&totals, analysis.seasonal_period)?;
        let decomposition_path = self.chart_path(ChartKind::Descomposicion);
        self.charts
            .decomposition_chart(&decomposition_path, &dates, &decomposition)?;
        info!(period = analysis.seasonal_period, "seasonal decomposition done");

        let search = OrderSearch::from_config(analysis).run(&totals, sampler)?;
        let forecast = generate_forecast(dataset, search.best_order, analysis.forecast_horizon)?;
        let forecast_path = self.chart_path(ChartKind::Pronostico);
        self.charts
            .forecast_chart(&forecast_path, &dates, &totals, &forecast)?;
        info!(order = %search.best_order, horizon = forecast.len(), "forecast done");

        let resumen = ReportSummary {
            total_ventas,
            mejor_modelo: search.best_order,
            registros: dataset.len(),
            aic: search.best_aic,
        };
        let artifacts = [
            ChartArtifact::new(ChartKind::SeriesTiempo, series_path),
            ChartArtifact::new(ChartKind::Descomposicion, decomposition_path),
            ChartArtifact::new(ChartKind::Pronostico, forecast_path),
        ];
        let pdf_filename = self.reports.build(&resumen, &artifacts)?;

        Ok(AnalysisReport {
            img_paths: ImagePaths::default(),
            resumen,
            pdf_filename,
            forecast,
            trials: search.trials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportMode;
    use crate::ml::FixedSampler;
    use crate::models::{ArimaOrder, SalesRecord};
    use assert_matches::assert_matches;
    use chrono::{Duration, NaiveDate};

    fn service(base: &Path, mode: ReportMode) -> AnalysisService {
        let mut config = AppConfig::with_base_dir(base);
        config.charts.width = 400;
        config.charts.height = 300;
        config.report.mode = mode;
        let config = Arc::new(config);
        let reports = Arc::new(ReportService::new(&config));
        AnalysisService::new(config, reports)
    }

    fn dataset(days: i64) -> SalesDataset {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        SalesDataset::new(
            (0..days)
                .map(|i| {
                    let weekly = [12.0, -4.0, 3.0, 0.0, -6.0, 8.0, -13.0][(i % 7) as usize];
                    SalesRecord::new(
                        start + Duration::days(i),
                        500.0 + 3.0 * i as f64 + weekly + ((i * 31) % 9) as f64,
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn pipeline_writes_charts_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let analysis = service(dir.path(), ReportMode::Full);
        let data = dataset(30);
        let mut sampler = FixedSampler::new(vec![ArimaOrder::new(1, 1, 0), ArimaOrder::new(0, 1, 1)]);

        let report = analysis.analyze_dataset(&data, &mut sampler).unwrap();

        assert_eq!(report.pdf_filename, "informe_ventas.pdf");
        assert_eq!(report.resumen.registros, 30);
        assert!((report.resumen.total_ventas - data.total_sales()).abs() < 1e-9);
        assert_eq!(report.forecast.len(), 10);
        assert_eq!(report.trials.len(), 10);
        assert_eq!(report.img_paths.pronostico, "/static/pronostico.png");
        for kind in ChartKind::ALL {
            assert!(dir.path().join("static").join(kind.file_name()).is_file());
        }
        assert!(dir.path().join("reports/informe_ventas.pdf").is_file());
    }

    #[test]
    fn short_series_fails_before_the_search() {
        let dir = tempfile::tempdir().unwrap();
        let analysis = service(dir.path(), ReportMode::Full);
        let mut sampler = FixedSampler::new(vec![ArimaOrder::new(0, 1, 0)]);

        let err = analysis.analyze_dataset(&dataset(10), &mut sampler).unwrap_err();

        assert_matches!(err, ServiceError::Model(_));
        assert!(!dir.path().join("reports/informe_ventas.pdf").exists());
    }

    #[test]
    fn negative_totals_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let analysis = service(dir.path(), ReportMode::SummaryOnly);
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let data = SalesDataset::new(vec![SalesRecord::new(day, -1.0)]);
        let mut sampler = FixedSampler::new(vec![]);

        assert_matches!(
            analysis.analyze_dataset(&data, &mut sampler),
            Err(ServiceError::DataError(_))
        );
    }
}
