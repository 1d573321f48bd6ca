use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::arima::ArimaModel;
use super::ModelError;
use crate::models::{ArimaOrder, SalesDataset};

/// A forecast value for one future day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// The `horizon` consecutive days following `last`.
pub fn forecast_dates(last: NaiveDate, horizon: usize) -> Result<Vec<NaiveDate>, ModelError> {
    (1..=horizon as u64)
        .map(|offset| {
            last.checked_add_days(Days::new(offset)).ok_or_else(|| {
                ModelError::InvalidData(format!("forecast date overflows after {}", last))
            })
        })
        .collect()
}

/// Refits `order` on the dataset totals and forecasts `horizon` days past the last record.
pub fn generate_forecast(
    dataset: &SalesDataset,
    order: ArimaOrder,
    horizon: usize,
) -> Result<Vec<ForecastPoint>, ModelError> {
    let last = dataset.last_date().ok_or(ModelError::InsufficientData {
        required: ArimaModel::min_observations(order),
        actual: 0,
    })?;
    let model = ArimaModel::fit(&dataset.totals(), order)?;
    debug!(
        %order,
        mean = model.mean(),
        ar = ?model.ar_coefficients(),
        ma = ?model.ma_coefficients(),
        "forecast model refitted"
    );
    let values = model.forecast(horizon);

    Ok(forecast_dates(last, horizon)?
        .into_iter()
        .zip(values)
        .map(|(date, value)| ForecastPoint { date, value })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SalesRecord;

    fn dataset(days: u32) -> SalesDataset {
        let start = NaiveDate::from_ymd_opt(2024, 1, 25).unwrap();
        SalesDataset::new(
            (0..days)
                .map(|i| {
                    SalesRecord::new(
                        start + chrono::Duration::days(i64::from(i)),
                        100.0 + f64::from(i % 7) * 4.0 + f64::from(i),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn dates_cross_month_and_year_boundaries() {
        let last = NaiveDate::from_ymd_opt(2023, 12, 30).unwrap();
        let dates = forecast_dates(last, 3).unwrap();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            ]
        );
        assert!(forecast_dates(last, 0).unwrap().is_empty());
    }

    #[test]
    fn forecast_starts_the_day_after_the_last_record() {
        let data = dataset(30);
        let points = generate_forecast(&data, ArimaOrder::new(1, 1, 0), 10).unwrap();

        assert_eq!(points.len(), 10);
        let last = data.last_date().unwrap();
        for (i, point) in points.iter().enumerate() {
            assert_eq!(point.date, last + chrono::Duration::days(i as i64 + 1));
            assert!(point.value.is_finite());
        }
    }

    #[test]
    fn empty_dataset_cannot_be_forecast() {
        assert!(matches!(
            generate_forecast(&SalesDataset::default(), ArimaOrder::new(0, 1, 0), 5),
            Err(ModelError::InsufficientData { actual: 0, .. })
        ));
    }
}
