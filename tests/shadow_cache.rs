//! Integration tests for the shadow-copy cache under realistic host usage:
//! repeated loads, concurrent loads, and rebuild-while-loaded scenarios.

mod common;

use std::fs;
use std::sync::Arc;

use rayon::prelude::*;

use loadscope::shadow::ShadowCopyCache;

#[test]
fn test_repeated_loads_share_one_copy() {
    let dir = tempfile::tempdir().unwrap();
    let module = common::write_module(dir.path(), "lib.dll");

    let cache = ShadowCopyCache::new().unwrap();

    let first = cache.get_or_create(&module).unwrap();
    let second = cache.get_or_create(&module).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.copy_count(), 1);
}

#[test]
fn test_original_stays_unlocked() {
    let dir = tempfile::tempdir().unwrap();
    let module = common::write_module(dir.path(), "lib.dll");

    let cache = ShadowCopyCache::new().unwrap();
    let entry = cache.get_or_create(&module).unwrap();
    let image_len = entry.image().len();

    // The host rebuilds the file while the image is live.
    fs::write(&module, b"rebuilt, not even a module").unwrap();
    fs::remove_file(&module).unwrap();

    // The image still reads from the shadow copy.
    assert_eq!(entry.image().len(), image_len);
    assert_eq!(&entry.image().data()[0..2], b"MZ");
}

#[test]
fn test_concurrent_loads_of_same_path() {
    let dir = tempfile::tempdir().unwrap();
    let module = common::write_module(dir.path(), "lib.dll");

    let cache = ShadowCopyCache::new().unwrap();

    let entries: Vec<_> = (0..16)
        .into_par_iter()
        .map(|_| cache.get_or_create(&module).unwrap())
        .collect();

    assert_eq!(cache.copy_count(), 1);
    for entry in &entries[1..] {
        assert!(Arc::ptr_eq(&entries[0], entry));
    }
}

#[test]
fn test_concurrent_loads_of_distinct_paths() {
    let dir = tempfile::tempdir().unwrap();
    let modules: Vec<_> = (0..8)
        .map(|i| common::write_module(dir.path(), &format!("lib{i}.dll")))
        .collect();

    let cache = ShadowCopyCache::new().unwrap();

    modules.par_iter().for_each(|module| {
        cache.get_or_create(module).unwrap();
    });

    assert_eq!(cache.copy_count(), modules.len());
}

#[test]
fn test_documentation_companion_is_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let module = common::write_module(dir.path(), "lib.dll");
    fs::write(
        dir.path().join("lib.xml"),
        r#"<?xml version="1.0"?>
<doc>
    <assembly><name>lib</name></assembly>
    <members>
        <member name="T:Lib.Widget">A widget.</member>
    </members>
</doc>"#,
    )
    .unwrap();

    let cache = ShadowCopyCache::new().unwrap();
    let entry = cache.get_or_create(&module).unwrap();

    let docs = entry.documentation().unwrap();
    assert_eq!(docs.module_name(), Some("lib"));
    assert_eq!(docs.member("T:Lib.Widget"), Some("A widget."));
}

#[test]
fn test_dispose_purges_scratch_directory() {
    let scratch = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let module = common::write_module(dir.path(), "lib.dll");

    let cache = ShadowCopyCache::with_scratch_root(scratch.path()).unwrap();
    let root = cache.scratch_root().to_path_buf();

    cache.get_or_create(&module).unwrap();
    assert!(root.exists());

    cache.dispose();
    assert!(!root.exists());

    // Disposal is idempotent, further loads are refused.
    cache.dispose();
    assert!(matches!(
        cache.get_or_create(&module),
        Err(loadscope::Error::Disposed)
    ));
}
