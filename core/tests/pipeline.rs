use approx::assert_relative_eq;
use depthsearch_core::{ContrastCurve, DepthOfSearch, DosParams, StarRecord, Survey};

fn survey_json() -> String {
    let stars: Vec<String> = (0..8)
        .map(|i| {
            let dist = 4.0 + 2.5 * i as f64;
            let t_int = 3.0 + (i % 3) as f64 * 4.0;
            format!(
                r#"{{"name": "star {i}", "dist": {dist}, "smin": {smin}, "smax": {smax}, "t_int": {t_int},
                    "contrast": {{"working_angles": [0.05, 0.15, 0.5, 1.0],
                                  "contrast": [4e-10, 1e-10, 1.5e-10, 3e-10]}}}}"#,
                smin = 0.05 * dist,
                smax = 1.0 * dist,
            )
        })
        .collect();
    format!(
        r#"{{
            "population": {{"amin": 0.1, "amax": 30.0, "rmin": 0.5, "rmax": 60.0,
                            "albedo": 0.367, "radius": 4.0, "eta": 0.5}},
            "reference_contrast": {{"working_angles": [0.05, 0.15, 0.5, 1.0],
                                    "contrast": [4e-10, 1e-10, 1.5e-10, 3e-10]}},
            "stars": [{}]
        }}"#,
        stars.join(",")
    )
}

fn params() -> DosParams {
    DosParams {
        abins: 30,
        rbins: 8,
        max_time: 20.0,
        ..DosParams::default()
    }
}

#[test]
fn survey_to_yield() {
    let survey = Survey::from_json(&survey_json()).unwrap();
    let result = DepthOfSearch::new(params()).run(&survey).unwrap();

    assert!(result.num_obs > 0);
    assert_eq!(result.num_obs, result.selected.len());
    assert!(result.total_time <= 20.0);
    assert!(result.selected.windows(2).all(|w| w[0] < w[1]));
    assert_relative_eq!(result.objective, result.ck.iter().sum::<f64>(), max_relative = 1e-12);
    assert!(result.ck.iter().all(|&c| c > 0.0));

    // Radius range is clamped to [0.35, 45] R_earth after validation.
    assert_eq!(result.redges.len(), 9);
    assert_eq!(result.redges[0], 0.5);
    assert_eq!(result.redges[8], 45.0);

    assert_eq!(result.dos.dim(), (8, 30));
    // Every star contributes at most 1 per bin.
    let bound = result.num_obs as f64 + 1e-9;
    assert!(result.dos.iter().all(|&v| v >= 0.0 && v <= bound));
    assert!(result.dos.sum() > 0.0);

    assert!(result.occ_rates.iter().all(|&v| v >= 0.0));
    assert!(result.expected_yield() > 0.0);
    for ((d, e), y) in result.dos.iter().zip(result.occ_rates.iter()).zip(result.dos_occ.iter()) {
        assert_eq!(*y, d * e);
    }
}

#[test]
fn result_serialises_to_json() {
    let survey = Survey::from_json(&survey_json()).unwrap();
    let result = DepthOfSearch::new(params()).run(&survey).unwrap();
    let json = result.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert!(value.get("DoS").is_some());
    assert!(value.get("DoS_occ").is_some());
    assert_eq!(value["num_obs"], serde_json::json!(result.num_obs));
}

#[test]
fn custom_density_is_used_for_occurrence() {
    let survey = Survey::from_json(&survey_json()).unwrap();
    let nothing = |_a: f64, _r: f64| 0.0;
    let result = DepthOfSearch::new(params()).run_with_density(&survey, &nothing).unwrap();

    assert!(result.dos.sum() > 0.0);
    assert!(result.occ_rates.iter().all(|&v| v == 0.0));
    assert_eq!(result.expected_yield(), 0.0);
}

#[test]
fn zero_budget_observes_nothing() {
    let survey = Survey::from_json(&survey_json()).unwrap();
    let p = DosParams { max_time: 0.0, ..params() };
    let result = DepthOfSearch::new(p).run(&survey).unwrap();

    assert_eq!(result.num_obs, 0);
    assert_eq!(result.objective, 0.0);
    assert!(result.dos.iter().all(|&v| v == 0.0));
}

#[test]
fn programmatic_survey_matches_builder() {
    let curve = ContrastCurve::flat(0.05, 1.0, 1e-10).unwrap();
    let star = StarRecord::from_working_angles("HIP 1", 8.0, 0.05, 1.0, 2.0, curve);
    let mut survey = Survey::from_json(&survey_json()).unwrap();
    survey.stars = vec![star];
    survey.cmin = Some(1e-10);

    let result = DepthOfSearch::new(params()).run(&survey).unwrap();
    assert_eq!(result.selected, vec![0]);
    assert_eq!(result.names, vec!["HIP 1".to_string()]);
}
