use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};

use resultview::cache::{
    CacheConfig, CacheKey, ContentDigest, KEY_LEN, Lookup, MemoryFs, ResultCache, digest_file,
};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).expect("write source");
    path
}

fn disk_cache(root: &Path, limit: usize) -> ResultCache {
    ResultCache::open(&CacheConfig {
        enabled: true,
        directory: root.join("cache"),
        limit,
    })
    .expect("open cache")
}

fn memory_cache(fs: Arc<MemoryFs>, limit: usize) -> ResultCache {
    ResultCache::with_fs(
        fs,
        &CacheConfig {
            enabled: true,
            directory: PathBuf::from("/cache"),
            limit,
        },
    )
    .expect("open cache")
}

fn is_key_shaped(key: &str) -> bool {
    key.len() == KEY_LEN && key.bytes().all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b))
}

#[test]
fn digest_equal_iff_bytes_equal() {
    let tmp = TempDir::new().expect("temp dir");
    let samples: [&[u8]; 5] = [b"", b"[]", b"[ ]", br#"{"x":1}"#, br#"{"x":2}"#];
    let paths: Vec<_> = samples
        .iter()
        .enumerate()
        .map(|(index, bytes)| write(tmp.path(), &format!("{index}.json"), bytes))
        .collect();

    for (i, a) in paths.iter().enumerate() {
        for (j, b) in paths.iter().enumerate() {
            let same = digest_file(a).expect("digest") == digest_file(b).expect("digest");
            assert_eq!(same, samples[i] == samples[j], "{i} vs {j}");
        }
    }

    let copy = write(tmp.path(), "copy.json", samples[3]);
    assert_eq!(
        digest_file(&copy).expect("digest"),
        digest_file(&paths[3]).expect("digest")
    );
}

#[test]
fn keys_are_injective_and_filename_safe() {
    let mut seen = HashSet::new();
    for n in 0u32..2000 {
        let key = CacheKey::from_digest(&ContentDigest::of(&n.to_le_bytes()));
        assert!(is_key_shaped(key.as_str()), "bad key {key}");
        assert_eq!(CacheKey::parse(key.as_str()), Some(key.clone()));
        assert!(seen.insert(key), "duplicate key for {n}");
    }
}

#[test]
fn key_for_known_content() {
    let tmp = TempDir::new().expect("temp dir");
    let cache = disk_cache(tmp.path(), 10);
    let source = write(tmp.path(), "a.json", br#"{"x":1}"#);

    let key = cache.key_for(&source).expect("key");
    assert_eq!(key.as_str(), "VQ7PJDFKBD5D5VPAEXNGT3OGIU");
    assert_eq!(key.as_str().len(), 26);
}

#[test]
fn miss_before_any_store() {
    let tmp = TempDir::new().expect("temp dir");
    let cache = disk_cache(tmp.path(), 10);
    let source = write(tmp.path(), "fresh.json", b"[1,2,3]");

    assert!(!cache.is_cached(&source).expect("is_cached"));
    assert_eq!(cache.fetch(&source).expect("fetch"), Lookup::Miss);
}

#[test]
fn copy_under_another_name_hits_the_same_entry() {
    let tmp = TempDir::new().expect("temp dir");
    let cache = disk_cache(tmp.path(), 10);
    let a = write(tmp.path(), "a.json", br#"{"x":1}"#);

    let outcome = cache.store(&a, "<html>...</html>").expect("store");
    let entry = tmp.path().join("cache").join(format!("{}.cache", outcome.key));
    assert_eq!(
        fs::read_to_string(&entry).expect("entry file"),
        "<html>...</html>"
    );

    let elsewhere = tmp.path().join("elsewhere");
    fs::create_dir(&elsewhere).expect("dir");
    let b = write(&elsewhere, "b.json", br#"{"x":1}"#);

    assert!(cache.is_cached(&b).expect("is_cached"));
    assert_eq!(
        cache.fetch(&b).expect("fetch"),
        Lookup::Hit("<html>...</html>".to_string())
    );
}

#[test]
fn storing_twice_is_idempotent() {
    let tmp = TempDir::new().expect("temp dir");
    let cache = disk_cache(tmp.path(), 10);
    let source = write(tmp.path(), "a.json", b"[]");

    cache.store(&source, "<table/>").expect("store");
    cache.store(&source, "<table/>").expect("store again");

    assert_eq!(cache.stats().expect("stats").entries, 1);
    assert_eq!(
        cache.fetch(&source).expect("fetch"),
        Lookup::Hit("<table/>".to_string())
    );
}

#[test]
fn five_entries_limit_three_keeps_newest() {
    let tmp = TempDir::new().expect("temp dir");
    let memory = Arc::new(MemoryFs::new());
    let unbounded = memory_cache(memory.clone(), 5);

    let sources: Vec<_> = (1..=5)
        .map(|n| write(tmp.path(), &format!("s{n}.json"), format!("[{n}]").as_bytes()))
        .collect();
    for source in &sources {
        unbounded.store(source, "html").expect("store");
    }
    assert_eq!(unbounded.stats().expect("stats").entries, 5);

    let bounded = memory_cache(memory.clone(), 3);
    let report = bounded.enforce_limit().expect("evict");
    assert_eq!(report.removed, 2);

    let cached: Vec<bool> = sources
        .iter()
        .map(|s| bounded.is_cached(s).expect("is_cached"))
        .collect();
    assert_eq!(cached, [false, false, true, true, true]);
}

#[test]
fn every_store_leaves_at_most_limit_entries() {
    let tmp = TempDir::new().expect("temp dir");
    let memory = Arc::new(MemoryFs::new());
    let cache = memory_cache(memory, 4);

    let mut stored = Vec::new();
    for n in 0..12 {
        let source = write(tmp.path(), &format!("{n}.json"), format!("[{n}]").as_bytes());
        cache.store(&source, &format!("<p>{n}</p>")).expect("store");
        stored.push(source);

        assert!(cache.stats().expect("stats").entries <= 4);
    }

    // The four most recent stores survive.
    for (n, source) in stored.iter().enumerate() {
        assert_eq!(cache.is_cached(source).expect("is_cached"), n >= 8, "source {n}");
    }
}

#[test]
fn concurrent_stores_within_limit_all_survive() {
    const WRITERS: usize = 8;

    let tmp = TempDir::new().expect("temp dir");
    let cache = disk_cache(tmp.path(), WRITERS);
    let sources: Vec<_> = (0..WRITERS)
        .map(|n| write(tmp.path(), &format!("{n}.json"), format!("[{n}]").as_bytes()))
        .collect();

    thread::scope(|scope| {
        for (n, source) in sources.iter().enumerate() {
            let cache = cache.clone();
            scope.spawn(move || {
                cache
                    .store(source, &format!("<html>{n}</html>").repeat(500))
                    .expect("store");
            });
        }
    });

    assert_eq!(cache.stats().expect("stats").entries, WRITERS);
    for (n, source) in sources.iter().enumerate() {
        assert_eq!(
            cache.fetch(source).expect("fetch"),
            Lookup::Hit(format!("<html>{n}</html>").repeat(500))
        );
    }
}

#[test]
fn concurrent_same_key_stores_leave_one_intact_entry() {
    let tmp = TempDir::new().expect("temp dir");
    let cache = disk_cache(tmp.path(), 10);
    let source = write(tmp.path(), "shared.json", b"[42]");
    let html = "<tr><td>42</td></tr>".repeat(2000);

    thread::scope(|scope| {
        for _ in 0..6 {
            let cache = cache.clone();
            let source = &source;
            let html = &html;
            scope.spawn(move || {
                cache.store(source, html).expect("store");
                match cache.fetch(source).expect("fetch") {
                    Lookup::Hit(content) => assert_eq!(&content, html),
                    Lookup::Miss => panic!("entry vanished after store"),
                }
            });
        }
    });

    assert_eq!(cache.stats().expect("stats").entries, 1);

    // No staging files are left behind.
    let leftovers: Vec<_> = fs::read_dir(tmp.path().join("cache"))
        .expect("read cache dir")
        .filter_map(Result::ok)
        .filter(|entry| !entry.file_name().to_string_lossy().ends_with(".cache"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn unreadable_source_is_an_error_not_a_miss() {
    let tmp = TempDir::new().expect("temp dir");
    let cache = disk_cache(tmp.path(), 10);

    assert!(cache.fetch(&tmp.path().join("missing.json")).is_err());
    assert!(cache.is_cached(&tmp.path().join("missing.json")).is_err());
}
