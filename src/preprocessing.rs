use crate::binning::{Binning, DiscretizationMethod};
use crate::constants::*;
use crate::dataset::{Column, Dataset};
use crate::error::{PrepError, Result};
use crate::run_log::RunLog;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Maps string classes to dense integer codes in sorted class order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub column: String,
    pub classes: Vec<String>,
}

fn class_of(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(MISSING_CLASS)
}

impl LabelEncoder {
    pub fn fit(column: &str, values: &[Option<String>]) -> Self {
        let mut classes: Vec<String> = values.iter().map(|v| class_of(v).to_string()).collect();
        classes.sort();
        classes.dedup();
        Self {
            column: column.to_string(),
            classes,
        }
    }

    pub fn transform(&self, values: &[Option<String>]) -> Result<Vec<usize>> {
        values
            .iter()
            .map(|v| {
                let label = class_of(v);
                self.classes
                    .binary_search_by(|c| c.as_str().cmp(label))
                    .map_err(|_| PrepError::UnknownLabel {
                        column: self.column.clone(),
                        label: label.to_string(),
                    })
            })
            .collect()
    }

    pub fn fit_transform(column: &str, values: &[Option<String>]) -> Result<(Self, Vec<usize>)> {
        let encoder = Self::fit(column, values);
        let codes = encoder.transform(values)?;
        Ok((encoder, codes))
    }

    pub fn inverse_transform(&self, codes: &[usize]) -> Result<Vec<String>> {
        codes
            .iter()
            .map(|code| {
                self.classes.get(*code).cloned().ok_or_else(|| PrepError::UnknownLabel {
                    column: self.column.clone(),
                    label: code.to_string(),
                })
            })
            .collect()
    }
}

/// Encoding, discretization and outcome derivation over a [`Dataset`].
#[derive(Debug, Default)]
pub struct Preprocessing {
    log: Option<RunLog>,
    label_encoders: BTreeMap<String, LabelEncoder>,
}

impl Preprocessing {
    pub fn new(log: Option<RunLog>) -> Self {
        Self {
            log,
            label_encoders: BTreeMap::new(),
        }
    }

    fn log(&self, message: impl AsRef<str>) {
        if let Some(log) = &self.log {
            log.log(message);
        }
    }

    /// Label-encode every non-numeric column. The fitted encoders are kept
    /// and available through [`Preprocessing::label_encoders`].
    #[instrument(skip(self, df))]
    pub fn label_encode_non_numeric(&mut self, df: &Dataset) -> Result<Dataset> {
        let mut encoded = df.clone();
        for name in df.non_numeric_features() {
            if let Column::Text(values) = df.column(&name)? {
                let (encoder, codes) = LabelEncoder::fit_transform(&name, values)?;
                debug!("Encoded '{}' into {} classes", name, encoder.classes.len());
                encoded.set_column(
                    name.clone(),
                    Column::Numeric(codes.into_iter().map(|c| Some(c as f64)).collect()),
                )?;
                self.label_encoders.insert(name, encoder);
            }
        }
        Ok(encoded)
    }

    pub fn discretize_feature(
        &self,
        data: &Dataset,
        feature: &str,
        method: &DiscretizationMethod,
    ) -> Result<Binning> {
        method.apply(data.numeric(feature)?)
    }

    /// Discretize each configured feature, overwriting the original column.
    /// Configured features missing from the dataset are skipped.
    #[instrument(skip(self, data, configs), fields(features = configs.len()))]
    pub fn batch_discretize(
        &self,
        data: &Dataset,
        configs: &BTreeMap<String, DiscretizationMethod>,
    ) -> Result<Dataset> {
        let mut result = data.clone();
        for (feature, method) in configs {
            if !data.has_column(feature) {
                debug!("Skipping '{}': not present in dataset", feature);
                continue;
            }
            let binning = self.discretize_feature(data, feature, method)?;
            result.set_column(feature.clone(), Column::from_labels(&binning.labels))?;
            self.log(format!(
                "Discretized feature '{}' using method '{}'",
                feature,
                method.name()
            ));
        }
        Ok(result)
    }

    /// `Treatment` is the sign of `ACR - Rate_Lag`: 1 increase, -1 decrease,
    /// 0 no change. Both inputs are dropped afterwards.
    pub fn calculate_treatment(&self, df: &Dataset) -> Result<Dataset> {
        let acr = df.numeric(ACR_COLUMN)?;
        let rate_lag = df.numeric(RATE_LAG_COLUMN)?;
        let treatment = acr
            .iter()
            .zip(rate_lag)
            .map(|(a, r)| {
                let diff = match (a, r) {
                    (Some(a), Some(r)) => a - r,
                    _ => f64::NAN,
                };
                // a missing difference compares false both ways
                let sign = if diff > 0.0 {
                    1.0
                } else if diff < 0.0 {
                    -1.0
                } else {
                    0.0
                };
                Some(sign)
            })
            .collect();

        let mut out = df.clone();
        out.set_column(TREATMENT_COLUMN, Column::Numeric(treatment))?;
        out.drop_columns(&[RATE_LAG_COLUMN, ACR_COLUMN]);
        Ok(out)
    }

    /// Binary `Churn` outcome: 1 when `ChurnRate > 0`, otherwise 0.
    pub fn calculate_churn(&self, df: &Dataset) -> Result<Dataset> {
        let churn = df
            .numeric(CHURN_RATE_COLUMN)?
            .iter()
            .map(|rate| Some(if rate.map_or(false, |r| r > 0.0) { 1.0 } else { 0.0 }))
            .collect();

        let mut out = df.clone();
        out.set_column(CHURN_COLUMN, Column::Numeric(churn))?;
        out.drop_columns(&[CHURN_RATE_COLUMN, MEMBERS_COLUMN, MEMBERS_LAG_COLUMN]);
        Ok(out)
    }

    pub fn label_encoders(&self) -> &BTreeMap<String, LabelEncoder> {
        &self.label_encoders
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(csv: &str) -> Dataset {
        Dataset::from_csv_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_label_encoder_sorted_classes() {
        let values = vec![Some("b".to_string()), None, Some("a".to_string()), Some("b".to_string())];
        let (encoder, codes) = LabelEncoder::fit_transform("Plan", &values).unwrap();
        assert_eq!(encoder.classes, vec!["a", "b", "nan"]);
        assert_eq!(codes, vec![1, 2, 0, 1]);
        assert_eq!(encoder.inverse_transform(&[0, 2]).unwrap(), vec!["a", "nan"]);
        assert!(encoder.inverse_transform(&[3]).is_err());
        assert!(encoder.transform(&[Some("c".to_string())]).is_err());
    }

    #[test]
    fn test_label_encode_non_numeric_keeps_encoders() {
        let mut prep = Preprocessing::new(None);
        let data = dataset("Plan,Seats\ngold,1\nbasic,2\ngold,3\n");
        let encoded = prep.label_encode_non_numeric(&data).unwrap();
        assert_eq!(encoded.numeric("Plan").unwrap(), &[Some(1.0), Some(0.0), Some(1.0)]);
        assert_eq!(encoded.numeric_features(), vec!["Plan", "Seats"]);
        assert_eq!(prep.label_encoders()["Plan"].classes, vec!["basic", "gold"]);
    }

    #[test]
    fn test_batch_discretize_overwrites_and_logs() {
        let log = RunLog::new();
        let prep = Preprocessing::new(Some(log.clone()));
        let data = dataset("Tenure,Spend\n1,5\n20,60\n70,99\n");

        let mut configs = BTreeMap::new();
        configs.insert(
            "Tenure".to_string(),
            DiscretizationMethod::Custom { custom_bins: vec![0.0, 10.0, 50.0, 100.0] },
        );
        configs.insert("Absent".to_string(), DiscretizationMethod::default());

        let out = prep.batch_discretize(&data, &configs).unwrap();
        assert_eq!(out.numeric("Tenure").unwrap(), &[Some(0.0), Some(1.0), Some(2.0)]);
        assert_eq!(out.numeric("Spend").unwrap(), data.numeric("Spend").unwrap());
        let lines = log.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].message, "Discretized feature 'Tenure' using method 'custom'");
    }

    #[test]
    fn test_calculate_treatment_signs() {
        let prep = Preprocessing::new(None);
        let data = dataset("ACR,Rate_Lag,Other\n5,3,a\n3,5,b\n4,4,c\n,4,d\n");
        let out = prep.calculate_treatment(&data).unwrap();
        assert_eq!(
            out.numeric(TREATMENT_COLUMN).unwrap(),
            &[Some(1.0), Some(-1.0), Some(0.0), Some(0.0)]
        );
        assert!(!out.has_column(ACR_COLUMN));
        assert!(!out.has_column(RATE_LAG_COLUMN));
        assert!(out.has_column("Other"));
    }

    #[test]
    fn test_calculate_churn() {
        let prep = Preprocessing::new(None);
        let data = dataset("ChurnRate,Members,Region\n0.2,10,x\n0,12,y\n,8,z\n");
        let out = prep.calculate_churn(&data).unwrap();
        assert_eq!(out.numeric(CHURN_COLUMN).unwrap(), &[Some(1.0), Some(0.0), Some(0.0)]);
        assert_eq!(out.column_names(), vec!["Region", "Churn"]);
    }

    #[test]
    fn test_calculate_churn_requires_rate() {
        let prep = Preprocessing::new(None);
        let data = dataset("Members\n1\n");
        assert!(matches!(prep.calculate_churn(&data), Err(PrepError::UnknownColumn(_))));
    }
}
