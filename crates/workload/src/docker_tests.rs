use super::*;

#[test]
fn parse_names_trims_and_drops_blank_lines() {
    let names = parse_names("run-1-job\n\n  run-1-worker-0  \n");
    assert_eq!(names, vec!["run-1-job".to_string(), "run-1-worker-0".to_string()]);
}

#[test]
fn parse_names_of_empty_output_is_empty() {
    assert!(parse_names("").is_empty());
}

#[test]
fn parse_run_ids_dedups_and_sorts() {
    let ids = parse_run_ids("3\n1\n3\n2\n");
    assert_eq!(ids, vec![RunId::new(1), RunId::new(2), RunId::new(3)]);
}

#[test]
fn parse_run_ids_ignores_unparseable_lines() {
    let ids = parse_run_ids("not-a-number\n5\n");
    assert_eq!(ids, vec![RunId::new(5)]);
}
