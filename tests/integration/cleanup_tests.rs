use std::fs;

use imgtriage::app::run_cleanup;
use imgtriage::config::Config;
use imgtriage::error::ExitCode;

use super::support::{scratch, split_png};

#[test]
fn test_cleanup_moves_each_kind_of_junk() {
    let (_dir, root) = scratch();
    let (_junk_dir, junk) = scratch();
    fs::create_dir(root.join("thread")).unwrap();
    split_png(&root.join("thread/icon.png"), 8, false);
    split_png(&root.join("thread/photo.png"), 256, false);
    fs::copy(root.join("thread/photo.png"), root.join("thread/u7_avatar_big.png")).unwrap();
    let photo_size = fs::metadata(root.join("thread/photo.png")).unwrap().len();
    fs::write(root.join("thread/index.php"), vec![b'x'; photo_size as usize]).unwrap();
    fs::write(root.join("notes.txt"), b"skipped by extension").unwrap();

    let mut cfg = Config::default();
    cfg.cleanup.size_threshold = photo_size;
    cfg.cleanup.patterns = vec![r"_avatar_".to_string()];
    assert_eq!(run_cleanup(&cfg, &root, &junk).unwrap(), ExitCode::Success);

    for moved in ["thread/icon.png", "thread/u7_avatar_big.png", "thread/index.php"] {
        assert!(junk.join(moved).exists(), "{moved}");
        assert!(!root.join(moved).exists(), "{moved}");
    }
    assert!(root.join("thread/photo.png").exists());
    assert!(root.join("notes.txt").exists());
}

#[test]
fn test_cleanup_rerun_reports_blocked_moves() {
    let (_dir, root) = scratch();
    let (_junk_dir, junk) = scratch();
    fs::write(root.join("a.bin"), b"a").unwrap();
    fs::write(junk.join("a.bin"), b"earlier").unwrap();

    let cfg = Config::default();
    assert_eq!(
        run_cleanup(&cfg, &root, &junk).unwrap(),
        ExitCode::PartialSuccess
    );
    assert_eq!(fs::read(root.join("a.bin")).unwrap(), b"a");
    assert_eq!(fs::read(junk.join("a.bin")).unwrap(), b"earlier");
}

#[test]
fn test_cleanup_rejects_bad_pattern_before_moving() {
    let (_dir, root) = scratch();
    let (_junk_dir, junk) = scratch();
    fs::write(root.join("a.bin"), b"a").unwrap();

    let mut cfg = Config::default();
    cfg.cleanup.patterns = vec!["(".to_string()];
    let err = run_cleanup(&cfg, &root, &junk).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::ConfigError);
    assert!(root.join("a.bin").exists());
}
