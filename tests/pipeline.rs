#![cfg(unix)]

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use tempfile::TempDir;
use tunegrab::{
    EntityKind, Error, Outcome, PipelineBuilder, Result, RetryPolicy,
    clients::{
        Downloader, DownloaderConfig,
        spotify::{CatalogSearch, SearchResults},
    },
};

const COME_TOGETHER: &str = "spotify:track:2EqlS6tkEnglzr7tkKAAYD";

struct StaticSearch(SearchResults);

impl CatalogSearch for StaticSearch {
    async fn search(&self, _query: &str, kinds: &[EntityKind]) -> Result<SearchResults> {
        let mut scoped = SearchResults::new();
        for &kind in kinds {
            if let Some(uri) = self.0.first(kind) {
                scoped.insert(kind, vec![uri.to_string()]);
            }
        }
        Ok(scoped)
    }
}

fn init_logger() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

/// Write a fake spotdl. Scripts get `$1` = URL, `$3` = output template path.
fn fake_config(dir: &Path, name: &str, body: &str) -> DownloaderConfig {
    let script = dir.join(name);
    fs::write(&script, format!("#!/bin/sh\nout=$(dirname \"$3\")\n{body}\n")).unwrap();
    DownloaderConfig {
        program: PathBuf::from("/bin/sh"),
        leading_args: vec![script.into_os_string()],
        timeout: Duration::from_secs(10),
        ..DownloaderConfig::default()
    }
}

fn fake_tool(dir: &Path, name: &str, body: &str) -> Downloader {
    Downloader::new(fake_config(dir, name, body))
}

struct Fixture {
    _tmp: TempDir,
    tools: PathBuf,
    root: PathBuf,
}

fn fixture() -> Fixture {
    init_logger();
    let tmp = tempfile::tempdir().unwrap();
    let tools = tmp.path().join("tools");
    fs::create_dir_all(&tools).unwrap();
    let root = tmp.path().join("library");
    Fixture {
        tools,
        root,
        _tmp: tmp,
    }
}

fn no_delay() -> RetryPolicy {
    RetryPolicy {
        retries: 1,
        delay: Duration::ZERO,
    }
}

fn unknown_dir(root: &Path) -> PathBuf {
    fs::canonicalize(root)
        .unwrap()
        .join("Unknown Artist")
        .join("Unknown Album")
}

#[tokio::test]
async fn track_query_yields_a_single_path() {
    let fx = fixture();
    let tool = fake_tool(
        &fx.tools,
        "spotdl.sh",
        r#"printf '%s' "$1" > "$out/The Beatles - Come Together.mp3""#,
    );
    let pipeline = PipelineBuilder::new()
        .search(StaticSearch(
            SearchResults::new()
                .with(EntityKind::Artist, &["spotify:artist:3WrFJ7ztbogyGnTHbHJFl2"])
                .with(EntityKind::Track, &[COME_TOGETHER]),
        ))
        .downloader(tool)
        .root(&fx.root)
        .retry(no_delay())
        .build();

    let outcome = pipeline.run("Come Together", Some(EntityKind::Track)).await.unwrap();

    let expected = unknown_dir(&fx.root).join("The Beatles - Come Together.mp3");
    assert_eq!(outcome, Outcome::Single(expected.clone()));
    assert_eq!(
        fs::read_to_string(expected).unwrap(),
        "https://open.spotify.com/track/2EqlS6tkEnglzr7tkKAAYD"
    );
}

#[tokio::test]
async fn nothing_resolved_is_not_found() {
    let fx = fixture();
    let marker = fx.tools.join("ran");
    let tool = fake_tool(&fx.tools, "spotdl.sh", &format!("touch '{}'", marker.display()));
    let pipeline = PipelineBuilder::new()
        .search(StaticSearch(
            SearchResults::new().with(EntityKind::Album, &["spotify:album:a1"]),
        ))
        .downloader(tool)
        .root(&fx.root)
        .build();

    let outcome = pipeline.run("Come Together", Some(EntityKind::Track)).await.unwrap();

    assert_eq!(outcome, Outcome::NotFound);
    assert!(!marker.exists(), "download tool must not run");
}

#[tokio::test]
async fn album_yields_every_new_file() {
    let fx = fixture();
    let tool = fake_tool(
        &fx.tools,
        "spotdl.sh",
        r#"echo "Downloaded 17 songs"
for n in 1 2 3; do printf x > "$out/Track $n.mp3"; done"#,
    );
    let pipeline = PipelineBuilder::new()
        .search(StaticSearch(
            SearchResults::new().with(EntityKind::Album, &["spotify:album:0ETFjACtuP2ADo6LFhL6HN"]),
        ))
        .downloader(tool)
        .root(&fx.root)
        .retry(no_delay())
        .build();

    let outcome = pipeline.run("Abbey Road", None).await.unwrap();

    let dir = unknown_dir(&fx.root);
    assert_eq!(
        outcome,
        Outcome::Many(vec![
            dir.join("Track 1.mp3"),
            dir.join("Track 2.mp3"),
            dir.join("Track 3.mp3"),
        ])
    );
}

#[tokio::test]
async fn failed_then_retried_download_appears_once() {
    let fx = fixture();
    let marker = fx.tools.join("failed-once");
    let tool = fake_tool(
        &fx.tools,
        "flaky.sh",
        &format!(
            r#"printf x > "$out/Come Together.mp3"
if [ ! -e '{marker}' ]; then touch '{marker}'; echo "rate limited" >&2; exit 1; fi"#,
            marker = marker.display()
        ),
    );
    let pipeline = PipelineBuilder::new()
        .search(StaticSearch(SearchResults::new().with(EntityKind::Track, &[COME_TOGETHER])))
        .downloader(tool)
        .root(&fx.root)
        .retry(no_delay())
        .build();

    let outcome = pipeline.run("Come Together", None).await.unwrap();

    assert!(marker.exists());
    assert_eq!(
        outcome,
        Outcome::Single(unknown_dir(&fx.root).join("Come Together.mp3"))
    );
}

#[tokio::test]
async fn download_failing_twice_returns_empty() {
    let fx = fixture();
    let tool = fake_tool(
        &fx.tools,
        "broken.sh",
        r#"printf x > "$out/half.mp3"
exit 3"#,
    );
    let pipeline = PipelineBuilder::new()
        .search(StaticSearch(SearchResults::new().with(EntityKind::Track, &[COME_TOGETHER])))
        .downloader(tool)
        .root(&fx.root)
        .retry(no_delay())
        .build();

    let outcome = pipeline.run("Come Together", Some(EntityKind::Track)).await.unwrap();

    assert_eq!(outcome, Outcome::Many(vec![]));
    assert!(!unknown_dir(&fx.root).join("half.mp3").exists());
}

#[tokio::test]
async fn search_failures_are_fatal() {
    struct Unauthorized;

    impl CatalogSearch for Unauthorized {
        async fn search(&self, _query: &str, _kinds: &[EntityKind]) -> Result<SearchResults> {
            Err(Error::ConfigurationError("Missing Spotify credentials".into()))
        }
    }

    let fx = fixture();
    let pipeline = PipelineBuilder::new()
        .search(Unauthorized)
        .root(&fx.root)
        .build();

    let err = pipeline.run("Come Together", None).await.unwrap_err();
    assert!(matches!(err, Error::ConfigurationError(_)));
}

#[tokio::test]
async fn download_reports_only_new_files() {
    let fx = fixture();
    let out = fx.root.join("incoming");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("old.mp3"), b"x").unwrap();
    let tool = fake_tool(
        &fx.tools,
        "spotdl.sh",
        r#"echo "Downloaded 5 songs"
mkdir -p "$out/sub"
printf x > "$out/a.mp3"
printf x > "$out/sub/b.mp3""#,
    );

    let files = tool
        .download("https://open.spotify.com/playlist/37i9dQZF1DXdLtD0qszB1w", &out)
        .await
        .unwrap();

    assert_eq!(files, vec![out.join("a.mp3"), out.join("sub/b.mp3")]);
}

#[tokio::test]
async fn failed_download_removes_partial_output() {
    let fx = fixture();
    let out = fx.root.join("incoming");
    let tool = fake_tool(
        &fx.tools,
        "broken.sh",
        r#"printf x > "$out/partial.mp3"
exit 1"#,
    );

    let err = tool
        .download("https://open.spotify.com/album/0ETFjACtuP2ADo6LFhL6HN", &out)
        .await
        .unwrap_err();

    assert_eq!(
        err.failed_url(),
        Some("https://open.spotify.com/album/0ETFjACtuP2ADo6LFhL6HN")
    );
    assert!(!out.join("partial.mp3").exists());
}

#[tokio::test]
async fn slow_download_times_out_and_stops_its_helpers() {
    let fx = fixture();
    let out = fx.root.join("incoming");
    let tool = Downloader::new(DownloaderConfig {
        timeout: Duration::from_millis(200),
        ..fake_config(
            &fx.tools,
            "slow.sh",
            r#"(sleep 1; printf x > "$out/late.mp3") &
exec sleep 30"#,
        )
    });

    let err = tool
        .download("https://open.spotify.com/track/2EqlS6tkEnglzr7tkKAAYD", &out)
        .await
        .unwrap_err();

    match err {
        Error::DownloadFailed { reason, .. } => assert!(reason.contains("timed out"), "{reason}"),
        other => panic!("expected a download failure, got {other:?}"),
    }
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!out.join("late.mp3").exists(), "background helper outlived the timeout");
}

#[tokio::test]
async fn unfiled_download_is_kept_under_root() {
    let fx = fixture();
    // A directory squatting on the destination makes the move fail
    let blocker = fx.root.join("Unknown Artist/Unknown Album/song.mp3");
    fs::create_dir_all(blocker.join("inner")).unwrap();
    let tool = fake_tool(&fx.tools, "spotdl.sh", r#"printf AUDIO > "$out/song.mp3""#);
    let pipeline = PipelineBuilder::new()
        .search(StaticSearch(SearchResults::new().with(EntityKind::Track, &[COME_TOGETHER])))
        .downloader(tool)
        .root(&fx.root)
        .retry(no_delay())
        .build();

    let outcome = pipeline.run("Come Together", None).await.unwrap();

    assert_eq!(outcome, Outcome::Many(vec![]));
    assert_eq!(fs::read_to_string(fx.root.join("song.mp3")).unwrap(), "AUDIO");
    assert!(blocker.join("inner").is_dir());
}
