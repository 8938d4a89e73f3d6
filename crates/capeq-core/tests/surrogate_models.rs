//! Surrogate sets built from serialized specs, as the CLI loads them

use std::sync::Arc;

use capeq_core::{
    AgentMatrix, CapeqError, DataScale, FnSurrogate, NodeBounds, Surrogate, SurrogateSet,
    SurrogateSpec,
};

#[test]
fn test_specs_build_a_working_set() {
    let specs: Vec<SurrogateSpec> = serde_json::from_str(
        r#"[
            {"kind": "linear", "intercept": 1.0, "coefficients": [2.0, 0.0]},
            {"kind": "quadratic", "linear": [1.0, 1.0], "quadratic": [-0.5, 0.0]}
        ]"#,
    )
    .unwrap();

    let mut set = SurrogateSet::default();
    for spec in &specs {
        assert_eq!(spec.input_len(), 2);
        set.push(spec.build().unwrap());
    }

    let x = [2.0, 3.0];
    assert_eq!(set.predict(0, &x).unwrap(), 5.0);
    assert_eq!(set.predict(1, &x).unwrap(), 3.0);
    assert_eq!(set.gradient(1, &x).unwrap(), vec![-1.0, 1.0]);
    assert!(set.supports_gradient(&x));
}

#[test]
fn test_mixed_set_without_gradient() {
    let set = SurrogateSet::new(vec![
        Arc::new(FnSurrogate::new(|x: &[f64]| -> f64 { x.iter().product() })) as Arc<dyn Surrogate>,
    ]);
    assert_eq!(set.predict(0, &[2.0, 4.0]).unwrap(), 8.0);
    assert!(!set.supports_gradient(&[2.0, 4.0]));
    assert!(matches!(
        set.gradient(0, &[2.0, 4.0]),
        Err(CapeqError::SurrogateFailure { device: 0, .. })
    ));
}

#[test]
fn test_normalization_matches_training_table() {
    let table = vec![vec![120.0, 40.0], vec![80.0, 200.0]];
    let scale = DataScale::from_capacity_samples(&table).unwrap();
    assert_eq!(scale.capacity, 200.0);

    let matrix = AgentMatrix::from_rows(table).unwrap();
    let normalized = scale.normalize(matrix.row(1));
    assert_eq!(normalized, vec![0.4, 1.0]);
    assert_eq!(scale.denormalize(&normalized), matrix.row(1).to_vec());
}

#[test]
fn test_node_envelope_from_json() {
    let nodes: NodeBounds = serde_json::from_str(
        r#"[
            {"lower": [0.0, 1.0], "upper": [5.0, 4.0]},
            {"lower": [1.0, 0.5], "upper": [3.0, 9.0]}
        ]"#,
    )
    .unwrap();
    nodes.validate(2).unwrap();
    let (lower, upper) = nodes.aggregate();
    assert_eq!(lower, vec![0.0, 0.5]);
    assert_eq!(upper, vec![5.0, 9.0]);
    assert!(nodes.validate(3).is_err());
}
