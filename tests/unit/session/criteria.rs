use super::*;

fn at(iterations: u32) -> Progress {
    Progress {
        iterations,
        ..Progress::default()
    }
}

#[test]
fn iteration_progress_rounds_up() {
    let c = CompletionCriteria::iterations(3);
    assert_eq!(c.progress(&at(0)), 0);
    assert_eq!(c.progress(&at(1)), 34);
    assert_eq!(c.progress(&at(2)), 67);
    assert_eq!(c.progress(&at(3)), 100);
    assert_eq!(c.progress(&at(9)), 100);
}

#[test]
fn tile_fraction_counts_towards_the_current_iteration() {
    let c = CompletionCriteria::iterations(2);
    let p = Progress {
        iterations: 0,
        tile_fraction: 0.5,
        ..Progress::default()
    };
    assert_eq!(c.progress(&p), 25);
    assert!(!c.is_complete(&p));
}

#[test]
fn time_progress_is_used_without_iteration_limit() {
    let c = CompletionCriteria {
        max_time_ms: Some(1000),
        ..CompletionCriteria::default()
    };
    let p = Progress {
        elapsed: Duration::from_millis(250),
        ..Progress::default()
    };
    assert_eq!(c.progress(&p), 25);
    assert!(!c.is_complete(&p));
    let done = Progress {
        elapsed: Duration::from_millis(1500),
        ..Progress::default()
    };
    assert_eq!(c.progress(&done), 100);
    assert!(c.is_complete(&done));
}

#[test]
fn unlimited_criteria_never_complete() {
    let c = CompletionCriteria::default();
    assert!(c.is_unlimited());
    assert_eq!(c.progress(&at(1000)), 0);
    assert!(!c.is_complete(&at(1000)));
}

#[test]
fn convergence_completes_at_threshold() {
    let c = CompletionCriteria {
        max_iterations: Some(100),
        convergence_threshold: Some(0.01),
        ..CompletionCriteria::default()
    };
    let mut p = at(4);
    p.variance = Some(0.5);
    assert!(!c.is_complete(&p));
    p.variance = Some(0.01);
    assert!(c.is_complete(&p));
    assert_eq!(c.progress(&p), 100);
}

#[test]
fn zero_limits_are_configuration_errors() {
    assert!(CompletionCriteria::iterations(0).validate().is_err());
    let t = CompletionCriteria {
        max_time_ms: Some(0),
        ..CompletionCriteria::default()
    };
    assert!(t.validate().is_err());
    let nan = CompletionCriteria {
        convergence_threshold: Some(f32::NAN),
        ..CompletionCriteria::default()
    };
    assert!(matches!(nan.validate(), Err(IprError::Configuration(_))));
    assert!(CompletionCriteria::iterations(1).validate().is_ok());
}

#[test]
fn criteria_read_from_partial_json() {
    let c: CompletionCriteria = serde_json::from_str(r#"{"max_iterations": 8}"#).unwrap();
    assert_eq!(c, CompletionCriteria::iterations(8));
}
