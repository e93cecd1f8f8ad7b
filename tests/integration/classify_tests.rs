#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};

use imgtriage::app::run_triage;
use imgtriage::cache::CacheStore;
use imgtriage::config::Config;
use imgtriage::error::ExitCode;

use super::support::{names, pages, scratch, split_png};

/// Prints `{path: {porn, face}}` for every argument; files named
/// `explicit*` score high.
const FAKE_CLASSIFIER: &str = r#"
printf '{'
sep=''
for p in "$@"; do
  case "$(basename "$p")" in
    explicit*) s=0.9 ;;
    *) s=0.0 ;;
  esac
  printf '%s"%s":{"porn":%s,"face":0.0}' "$sep" "$p" "$s"
  sep=','
done
printf '}'
"#;

fn classifier_config(dir: &Path, script: &str) -> Config {
    let path = dir.join("classify.sh");
    fs::write(&path, script).unwrap();
    let mut cfg = Config::default();
    cfg.classifier.command = Some(PathBuf::from("sh"));
    cfg.classifier.args = vec![path.to_string_lossy().into_owned()];
    cfg.classifier.model = Some("fake".to_string());
    cfg.scorers = vec!["classifier-fake".to_string()];
    cfg
}

#[test]
fn test_images_bucketed_by_severity() {
    let (_dir, root) = scratch();
    let (_tools_dir, tools) = scratch();
    split_png(&root.join("explicit1.png"), 16, false);
    split_png(&root.join("explicit2.png"), 32, false);
    split_png(&root.join("beach.png"), 16, true);

    let cfg = classifier_config(&tools, FAKE_CLASSIFIER);
    assert_eq!(run_triage(&cfg, &root, false, true).unwrap(), ExitCode::Success);

    let written = pages(&root);
    assert_eq!(
        names(&written),
        vec![
            "imgtriage-classifier-fake-0-safe-0001.html",
            "imgtriage-classifier-fake-3-explicit-0001.html",
        ]
    );
    let safe = fs::read_to_string(&written[0]).unwrap();
    assert!(safe.contains("beach.png"));
    assert!(!safe.contains("explicit1.png"));

    let explicit = fs::read_to_string(&written[1]).unwrap();
    assert!(explicit.contains("explicit1.png") && explicit.contains("explicit2.png"));
    assert!(explicit.contains("porn=0.900"));
}

#[test]
fn test_failed_classifier_is_retried_next_run() {
    let (_dir, root) = scratch();
    let (_tools_dir, tools) = scratch();
    split_png(&root.join("explicit.png"), 16, false);

    let broken = classifier_config(&tools, "echo 'model missing' >&2\nexit 1\n");
    assert_eq!(
        run_triage(&broken, &root, false, true).unwrap(),
        ExitCode::PartialSuccess
    );
    let cache = CacheStore::load(&root.join(&broken.cache_file));
    let entry = cache.get(&cache_key(&root.join("explicit.png"))).unwrap();
    assert_eq!(entry.result("classifier-fake"), None);

    let working = classifier_config(&tools, FAKE_CLASSIFIER);
    assert_eq!(run_triage(&working, &root, false, true).unwrap(), ExitCode::Success);
    let cache = CacheStore::load(&root.join(&working.cache_file));
    let entry = cache.get(&cache_key(&root.join("explicit.png"))).unwrap();
    assert!(entry.result("classifier-fake").unwrap().is_some());
}

#[test]
fn test_classifier_and_duplicate_results_share_the_cache() {
    let (_dir, root) = scratch();
    let (_tools_dir, tools) = scratch();
    split_png(&root.join("a.png"), 16, false);

    let mut cfg = classifier_config(&tools, FAKE_CLASSIFIER);
    run_triage(&cfg, &root, false, true).unwrap();
    cfg.scorers = vec!["blake3".to_string()];
    run_triage(&cfg, &root, false, true).unwrap();

    let cache = CacheStore::load(&root.join(&cfg.cache_file));
    let entry = cache.get(&cache_key(&root.join("a.png"))).unwrap();
    assert!(entry.result("classifier-fake").is_some());
    assert!(entry.result("blake3").is_some());
}

fn cache_key(path: &Path) -> String {
    imgtriage::scanner::identity_key(path, fs::metadata(path).unwrap().len())
}
