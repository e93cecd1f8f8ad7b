use std::fs;

use imgtriage::cache::CacheStore;
use imgtriage::scanner::identity_key;

use super::support::{config, run, scratch, split_png};

#[test]
fn test_second_run_is_fully_cached_and_cache_unchanged() {
    let (_dir, root) = scratch();
    split_png(&root.join("a.png"), 32, false);
    split_png(&root.join("sub/b.png"), 16, true);
    fs::write(root.join("notes.bin"), b"not an image").unwrap();

    let cfg = config(&[]);
    let first = run(&root, &cfg);
    assert_eq!(first.summary.total_files, 3);
    assert!(first.summary.cache_saved);
    let cache_path = root.join(&cfg.cache_file);
    let before = fs::read(&cache_path).unwrap();

    let second = run(&root, &cfg);
    assert_eq!(second.summary.fully_cached, 3);
    assert!(second.summary.scorers.values().all(|s| s.computed == 0));
    assert_eq!(fs::read(&cache_path).unwrap(), before);
}

#[test]
fn test_cache_file_layout() {
    let (_dir, root) = scratch();
    split_png(&root.join("a.png"), 32, false);
    fs::write(root.join("data.bin"), b"bytes").unwrap();

    let cfg = config(&["blake3", "simhash16x4"]);
    run(&root, &cfg);

    let text = fs::read_to_string(root.join(&cfg.cache_file)).unwrap();
    assert!(text.ends_with('\n'));
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();

    let size = fs::metadata(root.join("a.png")).unwrap().len();
    let image = &json[identity_key(&root.join("a.png"), size)];
    assert_eq!(image["width"], 32);
    assert_eq!(image["height"], 32);
    assert_eq!(image["results"]["blake3"].as_str().unwrap().len(), 64);
    assert!(image["results"]["simhash16x4"]
        .as_str()
        .unwrap()
        .starts_with("0x"));

    let other = &json[identity_key(&root.join("data.bin"), 5)];
    assert!(other["width"].is_null());
    assert!(other["results"]["blake3"].is_string());
    assert!(other["results"]["simhash16x4"].is_null());
}

#[test]
fn test_size_change_invalidates_entry() {
    let (_dir, root) = scratch();
    let path = root.join("a.png");
    split_png(&path, 16, false);
    let cfg = config(&["blake3"]);
    run(&root, &cfg);
    let old_size = fs::metadata(&path).unwrap().len();

    split_png(&path, 64, true);
    let new_size = fs::metadata(&path).unwrap().len();
    assert_ne!(old_size, new_size);

    let output = run(&root, &cfg);
    assert_eq!(output.summary.scorers["blake3"].computed, 1);
    assert_eq!(output.files[0].record.width, Some(64));

    let cache = CacheStore::load(&root.join(&cfg.cache_file));
    assert!(cache.get(&identity_key(&path, new_size)).is_some());
    assert!(cache.get(&identity_key(&path, old_size)).is_none());
}

#[test]
fn test_corrupt_cache_starts_cold() {
    let (_dir, root) = scratch();
    split_png(&root.join("a.png"), 16, false);
    let cfg = config(&["blake3"]);
    fs::write(root.join(&cfg.cache_file), b"{ not json").unwrap();

    let output = run(&root, &cfg);
    assert_eq!(output.summary.scorers["blake3"].computed, 1);
    assert!(output.summary.cache_saved);
    assert_eq!(CacheStore::load(&root.join(&cfg.cache_file)).len(), 1);
}

#[test]
fn test_truncated_walk_keeps_unseen_entries() {
    let (_dir, root) = scratch();
    for name in ["a.bin", "b.bin", "c.bin"] {
        fs::write(root.join(name), name).unwrap();
    }
    let mut cfg = config(&["blake3"]);
    run(&root, &cfg);

    cfg.max_files = Some(1);
    let output = run(&root, &cfg);
    assert!(output.summary.truncated);
    assert_eq!(output.files.len(), 1);
    assert_eq!(CacheStore::load(&root.join(&cfg.cache_file)).len(), 3);
}

#[test]
fn test_deleted_files_dropped_on_full_walk() {
    let (_dir, root) = scratch();
    fs::write(root.join("a.bin"), b"a").unwrap();
    fs::write(root.join("b.bin"), b"b").unwrap();
    let cfg = config(&["blake3"]);
    run(&root, &cfg);

    fs::remove_file(root.join("b.bin")).unwrap();
    run(&root, &cfg);
    let cache = CacheStore::load(&root.join(&cfg.cache_file));
    assert_eq!(cache.len(), 1);
    assert!(cache.get(&identity_key(&root.join("a.bin"), 1)).is_some());
}

#[test]
fn test_adding_a_scorer_keeps_cached_results() {
    let (_dir, root) = scratch();
    split_png(&root.join("a.png"), 16, false);
    run(&root, &config(&["blake3"]));

    let output = run(&root, &config(&["blake3", "simhash16x4"]));
    assert_eq!(output.summary.scorers["blake3"].cached, 1);
    assert_eq!(output.summary.scorers["simhash16x4"].computed, 1);
    assert_eq!(output.summary.fully_cached, 0);
}

#[test]
fn test_subdirectory_walk_against_parent_cache_keeps_entries() {
    let (_dir, root) = scratch();
    fs::create_dir(root.join("2019")).unwrap();
    fs::write(root.join("top.bin"), b"top").unwrap();
    fs::write(root.join("2019/x.bin"), b"x").unwrap();
    let cfg = config(&["blake3"]);
    run(&root, &cfg);
    let cache_path = root.join(&cfg.cache_file);
    assert_eq!(CacheStore::load(&cache_path).len(), 2);

    let sub = root.join("2019");
    let mut sub_cfg = config(&["blake3"]);
    sub_cfg.cache_file = std::path::Path::new("..").join(&cfg.cache_file);
    let output = run(&sub, &sub_cfg);
    assert_eq!(output.summary.scorers["blake3"].cached, 1);

    let cache = CacheStore::load(&cache_path);
    assert_eq!(cache.len(), 2);
    assert!(cache.get(&identity_key(&root.join("top.bin"), 3)).is_some());
}
