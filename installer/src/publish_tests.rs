//! Unit tests for the publish flow.

use super::*;
use crate::metadata::{MetadataStore, StoreTrust};
use crate::test_utils::{
    ExpectedCall, StubExecutor, file_url, fixture_release_date, point_latest, publish_fixture,
    release_archive, success_output,
};
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    source: PathBuf,
    store: DirectoryStore,
}

impl Workspace {
    fn request(&self, bump: BumpKind, prerelease: bool) -> PublishRequest {
        PublishRequest {
            product: "keel".to_owned(),
            source_dir: self.source.clone(),
            base_url: file_url(self.store.root()),
            bump,
            prerelease,
            current_stable: None,
            install_script: None,
        }
    }

    fn seed(&self, tags: &[&str]) {
        for tag in tags {
            let version = v(tag);
            let record = publish_fixture(self.store.root(), &version, &release_archive(&version));
            if !version.is_prerelease() {
                point_latest(self.store.root(), &record);
            }
        }
    }

    fn latest(&self) -> Version {
        *self
            .store
            .latest_pointer()
            .expect("readable pointer")
            .expect("pointer exists")
            .record()
            .version()
    }
}

#[fixture]
fn workspace() -> Workspace {
    let dir = tempfile::tempdir().expect("temp dir");
    let source = dir.path().join("release-tree");
    fs::create_dir_all(source.join("scripts")).expect("scripts dir");
    fs::create_dir_all(source.join("config")).expect("config dir");
    fs::write(source.join("scripts/start.sh"), "#!/bin/sh\n").expect("script");
    fs::write(source.join("config/keel.conf"), "port = 8080\n").expect("config");
    let store = DirectoryStore::new(dir.path().join("releases"));
    Workspace {
        _dir: dir,
        source,
        store,
    }
}

fn v(tag: &str) -> Version {
    tag.parse().expect("valid tag")
}

fn publisher(store: &DirectoryStore) -> Publisher<'_> {
    Publisher::new(store).with_clock(fixture_release_date)
}

#[rstest]
fn stable_publish_moves_latest(workspace: Workspace) {
    workspace.seed(&["0.1.6"]);

    let outcome = publisher(&workspace.store)
        .publish(&workspace.request(BumpKind::Patch, false))
        .expect("publish");

    assert_eq!(outcome.plan.version, v("0.1.7"));
    assert!(outcome.latest_updated);
    assert_eq!(workspace.latest(), v("0.1.7"));
    assert!(outcome.archive_path.ends_with("keel-0.1.7.tar.gz"));
    assert!(outcome.archive_path.is_file());
    assert_eq!(
        fs::read_to_string(workspace.source.join(VERSION_MARKER)).expect("marker"),
        "0.1.7"
    );
    let stored = workspace
        .store
        .release(&v("0.1.7"))
        .expect("readable")
        .expect("record exists");
    assert_eq!(stored, outcome.record);
    assert_eq!(
        stored.size_bytes(),
        Some(fs::metadata(&outcome.archive_path).expect("stat").len())
    );
}

#[rstest]
fn prerelease_publish_takes_next_beta_and_leaves_latest(workspace: Workspace) {
    workspace.seed(&["0.1.6", "0.1.7b1", "0.1.7b2"]);

    let outcome = publisher(&workspace.store)
        .publish(&workspace.request(BumpKind::Patch, true))
        .expect("publish");

    assert_eq!(outcome.plan.version, v("0.1.7b3"));
    assert!(!outcome.latest_updated);
    assert_eq!(workspace.latest(), v("0.1.6"));
    assert!(!workspace.store.root().join(INSTALL_SCRIPT_NAME).exists());
}

#[rstest]
fn latest_never_references_a_prerelease_across_a_release_cycle(workspace: Workspace) {
    workspace.seed(&["0.1.6"]);
    let publisher = publisher(&workspace.store);

    for prerelease in [true, true, false, true] {
        let request = workspace.request(BumpKind::Patch, prerelease);
        let outcome = publisher.publish(&request).expect("publish");
        let latest = workspace.latest();
        assert!(!latest.is_prerelease(), "latest moved to {latest}");
        assert_eq!(outcome.latest_updated, !prerelease);
    }

    assert_eq!(workspace.latest(), v("0.1.7"));
    let versions = workspace.store.list_versions().expect("list");
    assert_eq!(
        versions,
        [v("0.1.6"), v("0.1.7b1"), v("0.1.7b2"), v("0.1.7"), v("0.1.8b1")]
    );
}

#[rstest]
fn stable_publish_replaces_install_entry_point(workspace: Workspace) {
    workspace.seed(&["0.1.6"]);
    let script = workspace.source.join("install.sh");
    fs::write(&script, "#!/bin/sh\nexec keel-install \"$@\"\n").expect("script");
    let mut request = workspace.request(BumpKind::Minor, false);
    request.install_script = Some(script);

    let outcome = publisher(&workspace.store).publish(&request).expect("publish");

    assert_eq!(outcome.plan.version, v("0.2.0"));
    let published = workspace.store.root().join(INSTALL_SCRIPT_NAME);
    assert!(
        fs::read_to_string(published)
            .expect("entry point")
            .contains("keel-install")
    );
    let pointer = workspace
        .store
        .latest_pointer()
        .expect("readable")
        .expect("exists");
    assert!(pointer.install_script().ends_with("/install.sh"));
}

#[rstest]
fn empty_store_needs_an_explicit_base(workspace: Workspace) {
    let err = publisher(&workspace.store)
        .publish(&workspace.request(BumpKind::Patch, false))
        .expect_err("no base");
    assert!(matches!(err, PublishError::NoBaseVersion { .. }));

    let mut request = workspace.request(BumpKind::Minor, false);
    request.current_stable = Some(Version::new(0, 0, 0));
    let outcome = publisher(&workspace.store).publish(&request).expect("first release");
    assert_eq!(outcome.plan.version, v("0.1.0"));
}

#[rstest]
fn plan_writes_nothing(workspace: Workspace) {
    workspace.seed(&["0.1.6"]);
    let plan = publisher(&workspace.store)
        .plan(&workspace.request(BumpKind::Patch, true))
        .expect("plan");
    assert_eq!(plan.version, v("0.1.7b1"));
    assert!(!workspace.source.join(VERSION_MARKER).exists());
    assert_eq!(
        workspace.store.list_versions().expect("list"),
        [v("0.1.6")]
    );
}

#[rstest]
fn git_tags_count_towards_allocation_and_release_is_tagged(workspace: Workspace) {
    workspace.seed(&["0.1.6", "0.1.7b1"]);
    let repo = workspace.source.display().to_string();
    let marker = workspace.source.join(VERSION_MARKER).display().to_string();
    let executor = StubExecutor::new(vec![
        ExpectedCall::new(
            "git",
            &["-C", &repo, "tag", "--list", "v*"],
            Ok(success_output("v0.1.6\nv0.1.7b1\nv0.1.7b4\n")),
        ),
        ExpectedCall::new("git", &["-C", &repo, "add", "--", &marker], Ok(success_output(""))),
        ExpectedCall::new(
            "git",
            &["-C", &repo, "commit", "-m", "Release v0.1.7b5", "--", &marker],
            Ok(success_output("")),
        ),
        ExpectedCall::new(
            "git",
            &["-C", &repo, "tag", "-a", "v0.1.7b5", "-m", "Release v0.1.7b5"],
            Ok(success_output("")),
        ),
    ]);
    let git = GitRepo::new(&workspace.source, &executor);

    let outcome = publisher(&workspace.store)
        .with_git(&git)
        .publish(&workspace.request(BumpKind::Patch, true))
        .expect("publish");

    assert_eq!(outcome.plan.version, v("0.1.7b5"));
    executor.assert_finished();
}

#[rstest]
fn published_store_serves_installs(workspace: Workspace) {
    workspace.seed(&["0.1.6"]);
    publisher(&workspace.store)
        .publish(&workspace.request(BumpKind::Patch, false))
        .expect("publish");

    assert_eq!(workspace.store.trust(), StoreTrust::Primary);
    let latest = workspace.store.latest().expect("latest");
    assert_eq!(latest.version(), &v("0.1.7"));
    assert!(latest.sha256().is_some());
}

#[rstest]
#[case::earlier_marker(Some("0.1.6"))]
#[case::no_marker(None)]
fn failed_publish_restores_version_marker(workspace: Workspace, #[case] previous: Option<&str>) {
    // A store nested inside the release tree cannot be packaged into.
    let store = DirectoryStore::new(workspace.source.join("releases"));
    let version = v("0.1.6");
    let record = publish_fixture(store.root(), &version, &release_archive(&version));
    point_latest(store.root(), &record);
    let marker = workspace.source.join(VERSION_MARKER);
    if let Some(contents) = previous {
        fs::write(&marker, contents).expect("seed marker");
    }

    let err = publisher(&store)
        .publish(&workspace.request(BumpKind::Patch, false))
        .expect_err("packaging fails");

    assert!(matches!(err, PublishError::Packaging(_)), "unexpected error: {err}");
    assert_eq!(fs::read_to_string(&marker).ok().as_deref(), previous);
    assert_eq!(store.list_versions().expect("list"), [v("0.1.6")]);
}
