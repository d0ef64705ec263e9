use anyhow::Result;
use causal_prep::config::Config;
use causal_prep::dataset::Dataset;
use causal_prep::pipeline::Pipeline;
use causal_prep::run_log::RunLog;
use std::fs;
use tempfile::tempdir;

fn churn_csv() -> String {
    let mut csv = String::from("Region,ACR,Rate_Lag,ChurnRate,Members,Members_Lag,Tenure,Spend\n");
    for i in 0..60 {
        let region = ["north", "south", "east"][i % 3];
        let acr = 10.0 + (i % 4) as f64;
        let rate_lag = 11.0;
        let churn_rate = if i % 5 == 0 { 0.1 } else { 0.0 };
        let tenure = (i * 2) as f64;
        let spend = (i as f64).powi(2) + 0.5;
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            region, acr, rate_lag, churn_rate, 100 + i, 98 + i, tenure, spend
        ));
    }
    csv
}

#[test]
fn test_full_pipeline_run() -> Result<()> {
    let temp_dir = tempdir()?;
    let input = temp_dir.path().join("churn.csv");
    fs::write(&input, churn_csv())?;
    let output_dir = temp_dir.path().join("out");

    let config = Config::from_toml(&format!(
        r#"
        input = "{}"
        output_dir = "{}"

        [derive]
        treatment = true
        churn = true

        [analysis]
        demo_feature = "Spend"
        demo_bins = 4

        [features.Tenure]
        method = "custom"
        custom_bins = [-1, 40, 80, 200]

        [features.Spend]
        method = "equal_frequency"
        n_bins = 4

        [features.Missing]
        method = "equal_width"
        "#,
        input.display().to_string().replace('\\', "/"),
        output_dir.display().to_string().replace('\\', "/")
    ))?;

    let result = Pipeline::run(&config)?;
    assert_eq!(result.rows, 60);
    assert_eq!(result.input_checksum.len(), 64);
    assert_eq!(result.discretized_features, vec!["Spend", "Tenure"]);
    assert_eq!(result.skipped_features, vec!["Missing"]);
    assert!(result.numeric_features.contains(&"Treatment".to_string()));
    assert!(result.numeric_features.contains(&"Churn".to_string()));
    assert!(!result.numeric_features.contains(&"ACR".to_string()));
    for file in &result.output_files {
        assert!(file.exists(), "missing artifact {}", file.display());
    }

    let csv_path = result
        .output_files
        .iter()
        .find(|p| p.extension().map_or(false, |e| e == "csv"))
        .expect("discretized csv");
    let discretized = Dataset::from_csv_path(csv_path)?;
    let tenure = discretized.numeric("Tenure")?;
    assert!(tenure.iter().all(|v| matches!(v, Some(b) if (0.0..=2.0).contains(b))));
    let spend = discretized.numeric("Spend")?;
    for bin in 0..4 {
        let count = spend.iter().filter(|v| **v == Some(bin as f64)).count();
        assert_eq!(count, 15);
    }
    // Region was label encoded: east=0, north=1, south=2
    assert_eq!(discretized.numeric("Region")?[0], Some(1.0));

    let log_path = result
        .output_files
        .iter()
        .find(|p| p.extension().map_or(false, |e| e == "log"))
        .expect("run log");
    let log = RunLog::load(log_path)?;
    let messages: Vec<String> = log.lines().into_iter().map(|l| l.message).collect();
    assert!(messages.iter().any(|m| m == "FEATURE INSPECTION FOR DISCRETIZATION"));
    assert!(messages.iter().any(|m| m == "DISCRETIZATION DEMONSTRATION FOR: Spend"));
    assert!(messages.iter().any(|m| m == "Discretized feature 'Tenure' using method 'custom'"));

    assert!(result
        .output_files
        .iter()
        .any(|p| p.extension().map_or(false, |e| e == "png")));

    let summary = log.summary();
    assert!(summary.artifacts.iter().any(|a| a.ends_with(".png")));
    assert!(summary.artifacts.iter().any(|a| a.ends_with(".csv")));
    assert!(summary.artifacts.iter().any(|a| a.ends_with(".json")));
    Ok(())
}

#[test]
fn test_pipeline_requires_input() {
    let config = Config::default();
    assert!(Pipeline::run(&config).is_err());
}

#[test]
fn test_checksum_is_stable() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("a.csv");
    fs::write(&path, "x\n1\n")?;
    assert_eq!(Pipeline::checksum(&path)?, Pipeline::checksum(&path)?);
    Ok(())
}
