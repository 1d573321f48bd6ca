use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// ARIMA order: autoregressive lags, differencing passes, moving-average lags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    pub const fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    /// Number of ARMA coefficients estimated for this order.
    pub fn arma_terms(&self) -> usize {
        self.p + self.q
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.p, self.d, self.q)
    }
}

/// The three charts produced by an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    SeriesTiempo,
    Descomposicion,
    Pronostico,
}

impl ChartKind {
    pub const ALL: [ChartKind; 3] = [
        ChartKind::SeriesTiempo,
        ChartKind::Descomposicion,
        ChartKind::Pronostico,
    ];

    /// File name the chart is written under, in the images directory and in the reports directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            ChartKind::SeriesTiempo => "series_tiempo.png",
            ChartKind::Descomposicion => "descomposicion_tiempo.png",
            ChartKind::Pronostico => "pronostico.png",
        }
    }

    /// Interpretation printed under the chart in the PDF report.
    pub fn caption(&self) -> &'static str {
        match self {
            ChartKind::SeriesTiempo => {
                "Este grafico muestra la evolucion de las ventas a lo largo del tiempo, \
                 permitiendo identificar tendencias generales en el comportamiento de las ventas."
            }
            ChartKind::Descomposicion => {
                "Aqui se descompone la serie en sus componentes principales: tendencia, \
                 estacionalidad y residuales. Esto ayuda a comprender mejor los factores que \
                 afectan las ventas."
            }
            ChartKind::Pronostico => {
                "Este grafico presenta el pronostico de ventas basado en un modelo optimizado \
                 con ARIMA, permitiendo prever el comportamiento futuro de las ventas."
            }
        }
    }
}

/// A chart written to disk together with the caption that describes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartArtifact {
    pub kind: ChartKind,
    pub path: PathBuf,
    pub caption: String,
}

impl ChartArtifact {
    pub fn new(kind: ChartKind, path: PathBuf) -> Self {
        Self {
            kind,
            path,
            caption: kind.caption().to_string(),
        }
    }

    pub fn file_name(&self) -> &'static str {
        self.kind.file_name()
    }
}

/// Headline figures of an analysis run. Field order is the display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_ventas: f64,
    pub mejor_modelo: ArimaOrder,
    pub registros: usize,
    pub aic: f64,
}

impl ReportSummary {
    /// Key/value lines in display order, as printed in the report.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("total_ventas", format_thousands(self.total_ventas)),
            (
                "mejor_modelo",
                format!(
                    "p={}, d={}, q={}",
                    self.mejor_modelo.p, self.mejor_modelo.d, self.mejor_modelo.q
                ),
            ),
            ("registros", self.registros.to_string()),
            ("aic", format!("{:.2}", self.aic)),
        ]
    }
}

/// Formats with two decimals and comma thousands separators, e.g. `12,345.60`.
pub fn format_thousands(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (integer, fraction) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, fraction)
}
