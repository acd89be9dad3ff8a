use sha2::{Digest, Sha256};

use motion_compositor::{
    compose, compose_exportable, AnimationRecord, ComposeOptions, ParamValue, ParameterAssignment,
    ParameterSpec,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sha256(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

fn nebula() -> AnimationRecord {
    AnimationRecord::new("nebula", "Nebula Drift")
        .with_markup(r#"<div class="stage"><canvas id="c"></canvas></div>"#)
        .with_style(".stage { position: fixed; inset: 0; }\ncanvas { width: 100%; height: 100%; }")
        .with_script("const cfg = window.VANTA_CONFIG;\nstart(cfg.hue, cfg.density, cfg.glow, cfg.mode);")
        .with_resource("https://cdn.example/three.min.js")
        .with_parameter(ParameterSpec::color("hue", "Hue", "#7c3aed"))
        .with_parameter(ParameterSpec::number("density", "Density", 0.5).with_range(0.0, 1.0, 0.05))
        .with_parameter(ParameterSpec::boolean("glow", "Glow", true))
        .with_parameter(ParameterSpec::choice("mode", "Mode", ["swirl", "drift"], "swirl"))
}

// ============================================================================
// Deterministic output
// ============================================================================

#[test]
fn deterministic_compose_identical_bytes() {
    let record = nebula();
    let assignment = ParameterAssignment::new().with("density", ParamValue::Number(0.75));

    let first = compose(&record, &assignment, &ComposeOptions::default());
    let second = compose(&record, &assignment, &ComposeOptions::default());

    assert_eq!(first.as_str(), second.as_str(), "same inputs must give identical bytes");
    assert_eq!(sha256(first.as_str()), sha256(second.as_str()));
    assert_eq!(first.fingerprint(), sha256(first.as_str()));
}

#[test]
fn deterministic_across_assignment_insertion_order() {
    let record = nebula();
    let forward: ParameterAssignment = vec![
        ("hue", ParamValue::color("#22d3ee")),
        ("glow", ParamValue::Boolean(false)),
        ("mode", ParamValue::choice("drift")),
    ]
    .into_iter()
    .collect();
    let backward: ParameterAssignment = vec![
        ("mode", ParamValue::choice("drift")),
        ("glow", ParamValue::Boolean(false)),
        ("hue", ParamValue::color("#22d3ee")),
    ]
    .into_iter()
    .collect();

    let a = compose(&record, &forward, &ComposeOptions::default());
    let b = compose(&record, &backward, &ComposeOptions::default());
    assert_eq!(a, b);
}

#[test]
fn config_keys_follow_schema_order() {
    let record = nebula();
    let doc = compose(&record, &ParameterAssignment::new(), &ComposeOptions::default());
    assert!(doc.as_str().contains(
        r##"window.VANTA_CONFIG = {"hue":"#7c3aed","density":0.5,"glow":true,"mode":"swirl"};"##
    ));
}

#[test]
fn deterministic_export_identical_bytes() {
    let record = nebula();
    let assignment = ParameterAssignment::new().with("glow", ParamValue::Boolean(false));
    let a = compose_exportable(&record, &assignment);
    let b = compose_exportable(&record, &assignment);
    assert_eq!(sha256(&a), sha256(&b));
}

#[test]
fn different_values_give_different_documents() {
    let record = nebula();
    let a = compose(&record, &ParameterAssignment::new(), &ComposeOptions::default());
    let b = compose(
        &record,
        &ParameterAssignment::new().with("density", ParamValue::Number(0.9)),
        &ComposeOptions::default(),
    );
    assert_ne!(a.fingerprint(), b.fingerprint());
}

#[test]
fn thumbnail_and_live_variants_differ() {
    let record = nebula();
    let live = compose(&record, &ParameterAssignment::new(), &ComposeOptions::default());
    let thumb = compose(&record, &ParameterAssignment::new(), &ComposeOptions::thumbnail());
    assert_ne!(live, thumb);
}

#[test]
fn empty_assignment_matches_explicit_defaults() {
    let record = nebula();
    let implicit = compose(&record, &ParameterAssignment::new(), &ComposeOptions::default());
    let explicit = compose(
        &record,
        &ParameterAssignment::from_defaults(&record),
        &ComposeOptions::default(),
    );
    assert_eq!(implicit, explicit);
    assert_eq!(
        compose_exportable(&record, &ParameterAssignment::new()),
        compose_exportable(&record, &ParameterAssignment::from_defaults(&record))
    );
}
