use std::fs;
use std::path::PathBuf;

use imgtriage::pipeline::ScorerGroups;
use imgtriage::scorers::ScorerKind;

use super::support::{config, grouped, scratch, split_png};

fn set<'a>(sets: &'a [ScorerGroups], scorer: &str) -> &'a ScorerGroups {
    sets.iter().find(|s| s.scorer == scorer).unwrap()
}

#[test]
fn test_exact_duplicates_grouped() {
    let (_dir, root) = scratch();
    split_png(&root.join("a.png"), 32, false);
    fs::create_dir(root.join("copies")).unwrap();
    fs::copy(root.join("a.png"), root.join("copies/a.png")).unwrap();
    split_png(&root.join("unique.png"), 32, true);

    let sets = grouped(&root, &config(&["blake3"]));
    let blake3 = set(&sets, "blake3");
    assert_eq!(blake3.kind, ScorerKind::Duplicates);
    assert_eq!(blake3.groups.len(), 1);

    let members: Vec<_> = blake3.groups[0]
        .members
        .iter()
        .map(|m| m.relative_path.clone())
        .collect();
    assert_eq!(
        members,
        vec![PathBuf::from("a.png"), PathBuf::from("copies/a.png")]
    );
}

#[test]
fn test_resized_copy_is_perceptual_duplicate_with_large_reference() {
    let (_dir, root) = scratch();
    split_png(&root.join("small.png"), 32, false);
    split_png(&root.join("large.png"), 64, false);
    split_png(&root.join("other.png"), 64, true);

    let sets = grouped(&root, &config(&["blake3", "simhash16x4"]));
    assert!(set(&sets, "blake3").groups.is_empty());

    let perceptual = set(&sets, "simhash16x4");
    assert_eq!(perceptual.groups.len(), 1);
    let group = &perceptual.groups[0];
    assert_eq!(group.len(), 2);
    assert_eq!(group.members[0].relative_path, PathBuf::from("large.png"));
    assert_eq!(group.members[0].width, Some(64));
    assert_eq!(group.members[1].relative_path, PathBuf::from("small.png"));
}

#[test]
fn test_non_images_grouped_by_content_only() {
    let (_dir, root) = scratch();
    fs::write(root.join("x.bin"), b"same bytes").unwrap();
    fs::write(root.join("y.bin"), b"same bytes").unwrap();

    let sets = grouped(&root, &config(&[]));
    let blake3 = set(&sets, "blake3");
    assert_eq!(blake3.groups.len(), 1);
    assert!(blake3.groups[0].members.iter().all(|m| m.width.is_none()));
    assert!(sets
        .iter()
        .filter(|s| s.scorer != "blake3")
        .all(|s| s.groups.is_empty()));
}

#[test]
fn test_denylisted_files_never_scanned() {
    let (_dir, root) = scratch();
    split_png(&root.join("a.png"), 16, false);
    fs::write(root.join("script.py"), b"print()").unwrap();
    fs::write(root.join("page.html"), b"<html>").unwrap();
    fs::write(root.join(".DS_Store"), b"junk").unwrap();

    let mut cfg = config(&["blake3"]);
    cfg.skip_patterns = vec!["^ignored_".to_string()];
    fs::write(root.join("ignored_a.png"), b"x").unwrap();

    let output = super::support::run(&root, &cfg);
    let paths: Vec<_> = output.files.iter().map(|f| f.record.display_path()).collect();
    assert_eq!(paths, vec!["a.png"]);
}

#[test]
fn test_grouping_is_deterministic() {
    let (_dir, root) = scratch();
    for i in 0..6u32 {
        split_png(&root.join(format!("d{i}/img.png")), 16 + 8 * (i % 2), i % 3 == 0);
    }
    let cfg = config(&[]);
    let first = grouped(&root, &cfg);
    let second = grouped(&root, &cfg);
    assert_eq!(first, second);
}
