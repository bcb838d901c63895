use httpmock::prelude::*;
use serversmith::config::settings::SourcesConfig;
use serversmith::core::ProvisionEvent;
use serversmith::{
    CreateRequest, Downloader, InstanceManager, LocalStorage, Provisioner, ServerSmithError,
    ServerType,
};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

fn sources_for(server: &MockServer) -> SourcesConfig {
    SourcesConfig {
        vanilla_manifest_url: server.url("/mc/version_manifest.json"),
        paper_api_url: server.base_url(),
        neoforge_maven_url: server.url("/maven"),
    }
}

fn provisioner(server: &MockServer, cache_dir: &Path, java: &str) -> Provisioner {
    let client = reqwest::Client::new();
    Provisioner::new(
        client.clone(),
        Downloader::new(client, cache_dir),
        sources_for(server),
        java,
    )
}

fn request(name: &str, server_type: ServerType, version: &str, base_dir: &Path) -> CreateRequest {
    CreateRequest {
        name: name.to_string(),
        server_type,
        version: version.to_string(),
        base_dir: base_dir.to_path_buf(),
        eula_accepted: true,
        custom_jar: None,
        min_memory: 1024,
        max_memory: 3072,
    }
}

async fn load_manager(root: &Path) -> InstanceManager<LocalStorage> {
    InstanceManager::load(LocalStorage::new(), root.join("config.json")).await
}

fn mock_paper(server: &MockServer) -> (httpmock::Mock<'_>, httpmock::Mock<'_>) {
    let builds = server.mock(|when, then| {
        when.method(GET).path("/projects/paper/versions/1.20.4/builds");
        then.status(200).json_body(serde_json::json!({
            "project_id": "paper",
            "version": "1.20.4",
            "builds": [
                {"build": 495, "downloads": {"application": {"name": "paper-1.20.4-495.jar"}}},
                {"build": 496, "downloads": {"application": {"name": "paper-1.20.4-496.jar"}}}
            ]
        }));
    });
    let jar = server.mock(|when, then| {
        when.method(GET)
            .path("/projects/paper/versions/1.20.4/builds/496/downloads/paper-1.20.4-496.jar");
        then.status(200)
            .header("Content-Length", "10")
            .body("paper-jar!");
    });
    (builds, jar)
}

#[tokio::test]
async fn test_create_paper_instance_end_to_end() {
    let root = TempDir::new().unwrap();
    let base = root.path().join("servers");
    let cache = root.path().join("cache");

    let server = MockServer::start();
    let (builds_mock, jar_mock) = mock_paper(&server);

    let provisioner = provisioner(&server, &cache, "java");
    let mut manager = load_manager(root.path()).await;

    let events = Mutex::new(Vec::new());
    let instance = provisioner
        .create(
            &mut manager,
            &request("Survival", ServerType::Paper, "1.20.4", &base),
            |event| events.lock().unwrap().push(event),
        )
        .await
        .unwrap();

    builds_mock.assert();
    jar_mock.assert();

    let instance_dir = base.join("Survival");
    assert_eq!(instance.location, instance_dir);
    assert_eq!(instance.max_memory, 3072);
    assert_eq!(
        std::fs::read_to_string(instance_dir.join("eula.txt")).unwrap(),
        "eula=true\n"
    );
    assert_eq!(
        std::fs::read_to_string(instance_dir.join("server.jar")).unwrap(),
        "paper-jar!"
    );
    assert!(instance_dir.join(".serversmith/instance.json").is_file());
    assert!(cache
        .join("projects_paper_versions_1.20.4_builds_496_downloads_paper-1.20.4-496.jar")
        .is_file());

    let events = events.into_inner().unwrap();
    assert_eq!(
        events.last(),
        Some(&ProvisionEvent::Status("Success!".to_string()))
    );
    assert!(events.contains(&ProvisionEvent::Progress(1.0)));

    // A fresh manager sees the instance through config.json.
    let reloaded = load_manager(root.path()).await;
    assert_eq!(reloaded.instances().len(), 1);
    assert_eq!(reloaded.instances()[0].name, "Survival");
    assert_eq!(reloaded.instances()[0].server_type, ServerType::Paper);
}

#[tokio::test]
async fn test_second_create_uses_download_cache() {
    let root = TempDir::new().unwrap();
    let base = root.path().join("servers");
    let cache = root.path().join("cache");

    let server = MockServer::start();
    let (_, jar_mock) = mock_paper(&server);

    let provisioner = provisioner(&server, &cache, "java");
    let mut manager = load_manager(root.path()).await;

    for name in ["Alpha", "Beta"] {
        provisioner
            .create(
                &mut manager,
                &request(name, ServerType::Paper, "1.20.4", &base),
                |_| {},
            )
            .await
            .unwrap();
    }

    jar_mock.assert_hits(1);
    assert!(base.join("Beta/server.jar").is_file());
    assert_eq!(manager.instances().len(), 2);
}

#[tokio::test]
async fn test_create_vanilla_instance() {
    let root = TempDir::new().unwrap();
    let base = root.path().join("servers");
    let server = MockServer::start();

    let manifest = server.mock(|when, then| {
        when.method(GET).path("/mc/version_manifest.json");
        then.status(200).json_body(serde_json::json!({
            "latest": {"release": "1.20.4", "snapshot": "24w03a"},
            "versions": [
                {"id": "24w03a", "type": "snapshot", "url": server.url("/mc/24w03a.json")},
                {"id": "1.20.4", "type": "release", "url": server.url("/mc/1.20.4.json")}
            ]
        }));
    });
    let version = server.mock(|when, then| {
        when.method(GET).path("/mc/1.20.4.json");
        then.status(200).json_body(serde_json::json!({
            "downloads": {"server": {"url": server.url("/objects/abc/server.jar")}}
        }));
    });
    let jar = server.mock(|when, then| {
        when.method(GET).path("/objects/abc/server.jar");
        then.status(200).body("vanilla");
    });

    let provisioner = provisioner(&server, &root.path().join("cache"), "java");
    let mut manager = load_manager(root.path()).await;
    let instance = provisioner
        .create(
            &mut manager,
            &request("Vanilla World", ServerType::Vanilla, "1.20.4", &base),
            |_| {},
        )
        .await
        .unwrap();

    manifest.assert();
    version.assert();
    jar.assert();
    assert_eq!(instance.version, "1.20.4");
    assert_eq!(
        std::fs::read_to_string(base.join("Vanilla World/server.jar")).unwrap(),
        "vanilla"
    );
}

#[tokio::test]
async fn test_vanilla_versions_do_not_share_cached_jar() {
    let root = TempDir::new().unwrap();
    let base = root.path().join("servers");
    let server = MockServer::start();

    // Mojang serves every version as `.../objects/<hash>/server.jar`.
    server.mock(|when, then| {
        when.method(GET).path("/mc/version_manifest.json");
        then.status(200).json_body(serde_json::json!({
            "versions": [
                {"id": "1.20.4", "type": "release", "url": server.url("/mc/1.20.4.json")},
                {"id": "1.20.3", "type": "release", "url": server.url("/mc/1.20.3.json")}
            ]
        }));
    });
    for (version, hash) in [("1.20.4", "aaa"), ("1.20.3", "bbb")] {
        server.mock(|when, then| {
            when.method(GET).path(format!("/mc/{}.json", version));
            then.status(200).json_body(serde_json::json!({
                "downloads": {"server": {"url": server.url(format!("/objects/{}/server.jar", hash))}}
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path(format!("/objects/{}/server.jar", hash));
            then.status(200).body(format!("jar-{}", version));
        });
    }

    let provisioner = provisioner(&server, &root.path().join("cache"), "java");
    let mut manager = load_manager(root.path()).await;
    for (name, version) in [("A", "1.20.4"), ("B", "1.20.3")] {
        provisioner
            .create(
                &mut manager,
                &request(name, ServerType::Vanilla, version, &base),
                |_| {},
            )
            .await
            .unwrap();
    }

    assert_eq!(
        std::fs::read_to_string(base.join("A/server.jar")).unwrap(),
        "jar-1.20.4"
    );
    assert_eq!(
        std::fs::read_to_string(base.join("B/server.jar")).unwrap(),
        "jar-1.20.3"
    );
}

#[tokio::test]
async fn test_existing_directory_is_refused() {
    let root = TempDir::new().unwrap();
    let base = root.path().join("servers");
    std::fs::create_dir_all(base.join("Taken")).unwrap();
    std::fs::write(base.join("Taken/keep.txt"), "mine").unwrap();

    let server = MockServer::start();
    let provisioner = provisioner(&server, &root.path().join("cache"), "java");
    let mut manager = load_manager(root.path()).await;

    let events = Mutex::new(Vec::new());
    let err = provisioner
        .create(
            &mut manager,
            &request("Taken", ServerType::Paper, "1.20.4", &base),
            |event| events.lock().unwrap().push(event),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ServerSmithError::DirectoryExists(_)));
    assert_eq!(
        std::fs::read_to_string(base.join("Taken/keep.txt")).unwrap(),
        "mine"
    );
    assert_eq!(
        events.into_inner().unwrap(),
        vec![ProvisionEvent::Status(
            "Error: Directory already exists!".to_string()
        )]
    );
    assert!(manager.instances().is_empty());
}

#[tokio::test]
async fn test_eula_must_be_accepted() {
    let root = TempDir::new().unwrap();
    let server = MockServer::start();
    let provisioner = provisioner(&server, &root.path().join("cache"), "java");
    let mut manager = load_manager(root.path()).await;

    let mut req = request("NoEula", ServerType::Vanilla, "1.20.4", root.path());
    req.eula_accepted = false;

    let err = provisioner
        .create(&mut manager, &req, |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, ServerSmithError::EulaNotAccepted));
    assert!(!root.path().join("NoEula").exists());
}

#[tokio::test]
async fn test_failed_download_removes_partial_instance() {
    let root = TempDir::new().unwrap();
    let base = root.path().join("servers");
    let cache = root.path().join("cache");
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/projects/paper/versions/9.9.9/builds");
        then.status(404).body("not found");
    });

    let provisioner = provisioner(&server, &cache, "java");
    let mut manager = load_manager(root.path()).await;

    let events = Mutex::new(Vec::new());
    let err = provisioner
        .create(
            &mut manager,
            &request("Broken", ServerType::Paper, "9.9.9", &base),
            |event| events.lock().unwrap().push(event),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ServerSmithError::DistributionError { .. }));
    assert!(!base.join("Broken").exists());
    assert!(manager.instances().is_empty());
    assert!(events
        .into_inner()
        .unwrap()
        .contains(&ProvisionEvent::Status("Error!".to_string())));
}

#[tokio::test]
async fn test_create_custom_instance_from_local_jar() {
    let root = TempDir::new().unwrap();
    let jar = root.path().join("purpur-1.20.4.jar");
    std::fs::write(&jar, "custom-jar").unwrap();

    let server = MockServer::start();
    let provisioner = provisioner(&server, &root.path().join("cache"), "java");
    let mut manager = load_manager(root.path()).await;

    let mut req = request("Modded", ServerType::Custom, "", root.path());
    req.custom_jar = Some(jar);

    let instance = provisioner.create(&mut manager, &req, |_| {}).await.unwrap();

    assert_eq!(instance.server_type, ServerType::Custom);
    assert_eq!(instance.version, "custom");
    assert_eq!(
        std::fs::read_to_string(root.path().join("Modded/server.jar")).unwrap(),
        "custom-jar"
    );
}

#[tokio::test]
async fn test_failed_registration_removes_partial_instance() {
    let root = TempDir::new().unwrap();
    let jar = root.path().join("server-custom.jar");
    std::fs::write(&jar, "custom-jar").unwrap();
    // config.json cannot be written when a directory sits in its place.
    std::fs::create_dir_all(root.path().join("config.json/blocker")).unwrap();

    let server = MockServer::start();
    let provisioner = provisioner(&server, &root.path().join("cache"), "java");
    let mut manager = load_manager(root.path()).await;

    let mut req = request("Orphan", ServerType::Custom, "", root.path());
    req.custom_jar = Some(jar);

    let err = provisioner.create(&mut manager, &req, |_| {}).await.unwrap_err();
    assert!(matches!(err, ServerSmithError::IoError(_)));
    assert!(!root.path().join("Orphan").exists());
    assert!(manager.instances().is_empty());
}

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
#[tokio::test]
async fn test_neoforge_runs_installer() {
    let root = TempDir::new().unwrap();
    let base = root.path().join("servers");
    let bin = TempDir::new().unwrap();

    // Stands in for java: checks the installer arguments and lays down an args file.
    let java = write_script(
        bin.path(),
        "fake-java",
        r#"[ "$1 $2 $3" = "-jar installer.jar --installServer" ] || exit 7
echo "Installing server"
mkdir -p libraries/net/neoforged/neoforge/20.4.80-beta
echo "-cp lib.jar" > libraries/net/neoforged/neoforge/20.4.80-beta/unix_args.txt
exit 0"#,
    );

    let server = MockServer::start();
    let installer = server.mock(|when, then| {
        when.method(GET).path(
            "/maven/releases/net/neoforged/neoforge/20.4.80-beta/neoforge-20.4.80-beta-installer.jar",
        );
        then.status(200).body("installer");
    });

    let provisioner = provisioner(&server, &root.path().join("cache"), java.to_str().unwrap());
    let mut manager = load_manager(root.path()).await;
    let instance = provisioner
        .create(
            &mut manager,
            &request("Modpack", ServerType::NeoForge, "20.4.80-beta", &base),
            |_| {},
        )
        .await
        .unwrap();

    installer.assert();
    assert_eq!(instance.server_type, ServerType::NeoForge);
    assert!(base.join("Modpack/installer.jar").is_file());
    assert!(base
        .join("Modpack/libraries/net/neoforged/neoforge/20.4.80-beta/unix_args.txt")
        .is_file());
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_installer_cleans_up() {
    let root = TempDir::new().unwrap();
    let base = root.path().join("servers");
    let bin = TempDir::new().unwrap();
    let java = write_script(bin.path(), "fake-java", "echo boom >&2\nexit 3");

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/maven/releases/net/neoforged/neoforge/20.2.86/neoforge-20.2.86-installer.jar");
        then.status(200).body("installer");
    });

    let provisioner = provisioner(&server, &root.path().join("cache"), java.to_str().unwrap());
    let mut manager = load_manager(root.path()).await;
    let err = provisioner
        .create(
            &mut manager,
            &request("Flaky", ServerType::NeoForge, "20.2.86", &base),
            |_| {},
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ServerSmithError::InstallerFailed(3)));
    assert!(!base.join("Flaky").exists());
    assert!(manager.instances().is_empty());
}
