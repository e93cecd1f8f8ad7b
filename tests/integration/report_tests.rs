use std::fs;
use std::path::PathBuf;

use imgtriage::app::run_triage;
use imgtriage::error::ExitCode;

use super::support::{config, names, pages, run, scratch, split_png};

#[test]
fn test_reports_are_byte_identical_across_runs() {
    let (_dir, root) = scratch();
    split_png(&root.join("a.png"), 32, false);
    split_png(&root.join("b/a.png"), 32, false);
    split_png(&root.join("c.png"), 64, false);
    split_png(&root.join("d.png"), 16, true);

    let mut cfg = config(&[]);
    cfg.report.dir = Some(PathBuf::from("reports"));
    assert_eq!(run_triage(&cfg, &root, false, true).unwrap(), ExitCode::Success);
    let first: Vec<_> = pages(&root.join("reports"))
        .iter()
        .map(|p| (p.clone(), fs::read(p).unwrap()))
        .collect();
    assert!(!first.is_empty());

    assert_eq!(run_triage(&cfg, &root, false, true).unwrap(), ExitCode::Success);
    let second: Vec<_> = pages(&root.join("reports"))
        .iter()
        .map(|p| (p.clone(), fs::read(p).unwrap()))
        .collect();
    assert_eq!(first, second);
}

#[test]
fn test_250_groups_paginate_into_three_pages() {
    let (_dir, root) = scratch();
    for i in 0..250 {
        let content = format!("group {i}");
        fs::write(root.join(format!("g{i:03}_a.bin")), &content).unwrap();
        fs::write(root.join(format!("g{i:03}_b.bin")), &content).unwrap();
    }

    let cfg = config(&["blake3"]);
    assert_eq!(run_triage(&cfg, &root, false, true).unwrap(), ExitCode::Success);

    let written = pages(&root);
    assert_eq!(
        names(&written),
        vec![
            "imgtriage-blake3-dups-0001.html",
            "imgtriage-blake3-dups-0002.html",
            "imgtriage-blake3-dups-0003.html",
        ]
    );
    let rows = |i: usize| {
        fs::read_to_string(&written[i])
            .unwrap()
            .matches(r#"<td class="key">"#)
            .count()
    };
    assert_eq!((rows(0), rows(1), rows(2)), (100, 100, 50));

    let last = fs::read_to_string(&written[2]).unwrap();
    assert!(last.contains("page 3 of 3, 100 files"));
    assert!(last.contains(r#"href="imgtriage-blake3-dups-0002.html""#));
    assert!(last.contains("g249_a.bin"));
}

#[test]
fn test_report_directory_is_not_scanned() {
    let (_dir, root) = scratch();
    split_png(&root.join("a.png"), 16, false);
    fs::copy(root.join("a.png"), root.join("b.png")).unwrap();

    let mut cfg = config(&["blake3"]);
    cfg.skip_extensions = vec!["json".to_string()];
    cfg.report.dir = Some(PathBuf::from("out"));
    run_triage(&cfg, &root, false, true).unwrap();
    assert_eq!(pages(&root.join("out")).len(), 1);

    let output = run(&root, &cfg);
    assert_eq!(output.summary.total_files, 2);
}

#[test]
fn test_fewer_groups_prune_old_pages() {
    let (_dir, root) = scratch();
    for i in 0..3 {
        fs::write(root.join(format!("{i}_a.bin")), format!("{i}")).unwrap();
        fs::write(root.join(format!("{i}_b.bin")), format!("{i}")).unwrap();
    }
    let mut cfg = config(&["blake3"]);
    cfg.report.rows_per_page = 1;
    run_triage(&cfg, &root, false, true).unwrap();
    assert_eq!(pages(&root).len(), 3);

    fs::remove_file(root.join("2_b.bin")).unwrap();
    fs::remove_file(root.join("1_b.bin")).unwrap();
    run_triage(&cfg, &root, false, true).unwrap();
    assert_eq!(names(&pages(&root)), vec!["imgtriage-blake3-dups-0001.html"]);
}

#[test]
fn test_missing_root_is_an_error() {
    let (_dir, root) = scratch();
    let cfg = config(&["blake3"]);
    assert!(run_triage(&cfg, &root.join("missing"), false, true).is_err());
}
