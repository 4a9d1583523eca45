mod support;

use k3s_data::{AssetStager, DataLayout, EmbeddedBundle, StageError, VerifyFailure};
use std::path::Path;
use std::sync::{Arc, Mutex};
use support::{bundle, bundle_bytes_with_links, CountingBundle, TOOLS};
use tracing_subscriber::layer::{Context, SubscriberExt};

fn stager_for(bundle: CountingBundle, global: &Path) -> AssetStager<CountingBundle> {
    AssetStager::new(bundle).with_global_root(global)
}

#[test]
fn resolve_is_idempotent_and_reads_bundle_once() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    let stager = stager_for(
        CountingBundle::new(bundle("data/v1.tar.zst", TOOLS)),
        &tmp.path().join("global"),
    );

    let first = stager.resolve(&root).unwrap();
    let second = stager.resolve(&root).unwrap();

    assert_eq!(first, root.join("data/v1"));
    assert_eq!(first, second);
    assert_eq!(stager.bundle().reads(), 1);
    assert!(first.join("bin/kubectl").is_file());
    assert!(first.join("bin/aux").is_dir());

    let layout = DataLayout::new(&root);
    assert_eq!(std::fs::read_link(layout.current_link()).unwrap(), first);
    assert!(layout.lock_path().is_file());
    assert!(!root.join("data/v1-tmp").exists());
}

#[test]
fn concurrent_first_resolves_extract_once() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    let stager = Arc::new(stager_for(
        CountingBundle::new(bundle("data/v1.tar.zst", TOOLS)),
        &tmp.path().join("global"),
    ));

    let threads = 16;
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let stager = stager.clone();
            let root = root.clone();
            std::thread::spawn(move || stager.resolve(&root).unwrap())
        })
        .collect();
    let dirs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(stager.bundle().reads(), 1);
    assert!(dirs.iter().all(|dir| *dir == root.join("data/v1")));
    assert!(!root.join("data/v1-tmp").exists());
    assert!(!DataLayout::new(&root).previous_link().exists());
}

#[test]
fn published_global_copy_wins_without_touching_caller_root() {
    let tmp = tempfile::tempdir().unwrap();
    let global = tmp.path().join("global");
    let root = tmp.path().join("user");
    std::fs::create_dir_all(global.join("data/v1/bin")).unwrap();

    let stager = stager_for(CountingBundle::new(bundle("v1.tar.zst", TOOLS)), &global);
    let dir = stager.resolve(&root).unwrap();

    assert_eq!(dir, global.join("data/v1"));
    assert_eq!(stager.bundle().reads(), 0);
    assert!(!root.exists());
}

#[test]
fn new_bundle_rotates_current_into_previous() {
    let tmp = tempfile::tempdir().unwrap();
    let global = tmp.path().join("global");
    let root = tmp.path().join("root");
    let layout = DataLayout::new(&root);

    let v1 = stager_for(CountingBundle::new(bundle("v1.tar.zst", TOOLS)), &global)
        .resolve(&root)
        .unwrap();
    let v2 = stager_for(CountingBundle::new(bundle("v2.tar.zst", TOOLS)), &global)
        .resolve(&root)
        .unwrap();

    assert_ne!(v1, v2);
    assert_eq!(std::fs::read_link(layout.previous_link()).unwrap(), v1);
    assert_eq!(std::fs::read_link(layout.current_link()).unwrap(), v2);
    assert!(v1.join("bin/kubectl").is_file(), "published dirs are kept");
}

#[test]
fn removed_extraction_is_staged_again() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    let layout = DataLayout::new(&root);
    let stager = stager_for(
        CountingBundle::new(bundle("v1.tar.zst", TOOLS)),
        &tmp.path().join("global"),
    );

    let dir = stager.resolve(&root).unwrap();
    std::fs::remove_dir_all(&dir).unwrap();
    assert_eq!(stager.resolve(&root).unwrap(), dir);

    assert_eq!(stager.bundle().reads(), 2);
    assert_eq!(std::fs::read_link(layout.previous_link()).unwrap(), dir);
    assert_eq!(std::fs::read_link(layout.current_link()).unwrap(), dir);
}

#[test]
fn failed_verification_publishes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    let layout = DataLayout::new(&root);
    let stager = stager_for(
        CountingBundle::new(bundle("v1.tar.zst", &["k3s-server", "k3s-agent", "kubectl"])),
        &tmp.path().join("global"),
    );

    let err = stager.resolve(&root).unwrap_err();
    match &err {
        StageError::Verify { path, reason } => {
            assert_eq!(*reason, VerifyFailure::Missing);
            assert!(path.ends_with("bin/crictl"), "{}", path.display());
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(std::fs::symlink_metadata(layout.current_link()).is_err());
    assert!(!root.join("data/v1").exists());
    assert!(!root.join("data/v1-tmp").exists());
}

#[test]
fn failed_verification_keeps_existing_current() {
    let tmp = tempfile::tempdir().unwrap();
    let global = tmp.path().join("global");
    let root = tmp.path().join("root");
    let layout = DataLayout::new(&root);

    let v1 = stager_for(CountingBundle::new(bundle("v1.tar.zst", TOOLS)), &global)
        .resolve(&root)
        .unwrap();
    let broken = stager_for(CountingBundle::new(bundle("v2.tar.zst", &["kubectl"])), &global);
    assert!(broken.resolve(&root).is_err());

    assert_eq!(std::fs::read_link(layout.current_link()).unwrap(), v1);
    assert!(std::fs::symlink_metadata(layout.previous_link()).is_err());
}

#[test]
fn stale_temp_dir_is_replaced() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    std::fs::create_dir_all(root.join("data/v1-tmp/bin")).unwrap();
    std::fs::write(root.join("data/v1-tmp/bin/leftover"), b"x").unwrap();

    let stager = stager_for(
        CountingBundle::new(bundle("v1.tar.zst", TOOLS)),
        &tmp.path().join("global"),
    );
    let dir = stager.resolve(&root).unwrap();

    assert!(!dir.join("bin/leftover").exists());
    assert!(!root.join("data/v1-tmp").exists());
}

#[test]
fn unreadable_bundle_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    let stager = AssetStager::new(k3s_data::EmbeddedBundle::new("dev.tar", &[]))
        .with_global_root(tmp.path().join("global"));

    let err = stager.resolve(&root).unwrap_err();
    assert!(matches!(err, StageError::BundleUnreadable { .. }), "{err}");
    assert!(!root.join("data/dev").exists());
}

#[cfg(unix)]
#[test]
fn multi_call_links_are_verified_through_the_link() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    let links = [
        ("k3s-agent", "k3s-server"),
        ("kubectl", "k3s-server"),
        ("crictl", "k3s-server"),
        ("ctr", "k3s-server"),
    ];
    let bytes = bundle_bytes_with_links(&["k3s-server", "check-config"], &links);
    let stager = stager_for(
        CountingBundle::new(EmbeddedBundle::owned("v1.tar.zst", bytes)),
        &tmp.path().join("global"),
    );

    let dir = stager.resolve(&root).unwrap();
    let kubectl = dir.join("bin/kubectl");
    assert!(std::fs::symlink_metadata(&kubectl)
        .unwrap()
        .file_type()
        .is_symlink());
    assert_eq!(std::fs::read_link(&kubectl).unwrap(), Path::new("k3s-server"));
}

#[cfg(unix)]
#[test]
fn dangling_multi_call_link_fails_verification() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    let bytes = bundle_bytes_with_links(
        &["k3s-server", "k3s-agent", "kubectl", "ctr", "check-config"],
        &[("crictl", "missing")],
    );
    let stager = stager_for(
        CountingBundle::new(EmbeddedBundle::owned("v1.tar.zst", bytes)),
        &tmp.path().join("global"),
    );

    let err = stager.resolve(&root).unwrap_err();
    assert!(
        matches!(
            err,
            StageError::Verify {
                reason: VerifyFailure::Missing,
                ..
            }
        ),
        "{err}"
    );
    assert!(!root.join("data/v1").exists());
}

#[derive(Clone, Default)]
struct EventTargets(Arc<Mutex<Vec<String>>>);

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventTargets {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.0
            .lock()
            .unwrap()
            .push(event.metadata().target().to_string());
    }
}

#[test]
fn staging_events_use_the_data_target() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    let stager = stager_for(
        CountingBundle::new(bundle("v1.tar.zst", TOOLS)),
        &tmp.path().join("global"),
    );

    let targets = EventTargets::default();
    let subscriber = tracing_subscriber::registry().with(targets.clone());
    tracing::subscriber::with_default(subscriber, || stager.resolve(&root).unwrap());

    let targets = targets.0.lock().unwrap();
    assert!(!targets.is_empty());
    assert!(
        targets.iter().all(|target| target == "k3s.data"),
        "{targets:?}"
    );
}
