use std::fs;

use imgtriage::app::run_triage;
use imgtriage::error::ExitCode;

use super::support::{config, grouped, pages, scratch, split_png};

#[test]
fn test_duplicates_moved_and_reference_kept() {
    let (_dir, root) = scratch();
    let (_trash_dir, trash) = scratch();
    split_png(&root.join("a.png"), 32, false);
    fs::create_dir(root.join("sub")).unwrap();
    fs::copy(root.join("a.png"), root.join("sub/b.png")).unwrap();

    let mut cfg = config(&["blake3", "simhash16x4"]);
    cfg.move_scorer = Some("blake3".to_string());
    cfg.move_to = Some(trash.clone());
    assert_eq!(run_triage(&cfg, &root, false, true).unwrap(), ExitCode::Success);

    assert!(root.join("a.png").exists());
    assert!(!root.join("sub/b.png").exists());
    assert!(trash.join("sub/b.png").exists());

    let moved = trash.join("sub/b.png").to_string_lossy().into_owned();
    for page in pages(&root) {
        let html = fs::read_to_string(&page).unwrap();
        assert!(html.contains(r#"src="a.png""#), "{}", page.display());
        assert!(html.contains(&format!(r#"src="{moved}""#)), "{}", page.display());
    }

    cfg.move_scorer = None;
    cfg.move_to = None;
    let sets = grouped(&root, &cfg);
    assert!(sets.iter().all(|s| s.groups.is_empty()));
}

#[test]
fn test_existing_destination_blocks_move() {
    let (_dir, root) = scratch();
    let (_trash_dir, trash) = scratch();
    split_png(&root.join("a.png"), 32, false);
    fs::copy(root.join("a.png"), root.join("b.png")).unwrap();
    fs::write(trash.join("b.png"), b"already here").unwrap();

    let mut cfg = config(&["blake3"]);
    cfg.move_scorer = Some("blake3".to_string());
    cfg.move_to = Some(trash.clone());
    assert_eq!(
        run_triage(&cfg, &root, false, true).unwrap(),
        ExitCode::PartialSuccess
    );

    assert_eq!(
        fs::read(root.join("b.png")).unwrap(),
        fs::read(root.join("a.png")).unwrap()
    );
    assert_eq!(fs::read(trash.join("b.png")).unwrap(), b"already here");

    let html = fs::read_to_string(&pages(&root)[0]).unwrap();
    assert!(html.contains(r#"src="b.png""#));
}

#[test]
fn test_only_move_scorer_groups_are_moved() {
    let (_dir, root) = scratch();
    let (_trash_dir, trash) = scratch();
    split_png(&root.join("large.png"), 64, false);
    split_png(&root.join("small.png"), 32, false);

    let mut cfg = config(&["blake3", "simhash16x4"]);
    cfg.move_scorer = Some("blake3".to_string());
    cfg.move_to = Some(trash.clone());
    run_triage(&cfg, &root, false, true).unwrap();

    assert!(root.join("small.png").exists());
    assert_eq!(fs::read_dir(&trash).unwrap().count(), 0);
}

#[test]
fn test_destination_inside_root_is_not_rescanned() {
    let (_dir, root) = scratch();
    split_png(&root.join("a.png"), 32, false);
    fs::copy(root.join("a.png"), root.join("b.png")).unwrap();

    let mut cfg = config(&["blake3"]);
    cfg.move_scorer = Some("blake3".to_string());
    cfg.move_to = Some(root.join("dups"));
    for _ in 0..3 {
        assert_eq!(run_triage(&cfg, &root, false, true).unwrap(), ExitCode::Success);
    }

    assert!(root.join("a.png").exists());
    assert!(root.join("dups/b.png").exists());
    assert!(!root.join("dups/dups").exists());
    let cfg = config(&["blake3"]);
    let walker_config = cfg.walker_config(&root).unwrap();
    assert!(walker_config.skip_dirs.is_empty());
}

#[test]
fn test_destination_with_parent_components_is_excluded() {
    let (_dir, root) = scratch();
    let mut cfg = config(&["blake3"]);
    cfg.move_scorer = Some("blake3".to_string());
    cfg.move_to = Some(root.join("x/../dups"));
    let walker_config = cfg.walker_config(&root).unwrap();
    assert_eq!(walker_config.skip_dirs, vec![root.join("dups")]);
}
