//! End-to-end coverage of the client/server synchronization protocol:
//! a real `ServerEngine` accept loop over a loopback TCP socket, driven
//! by one or more `ClientEngine`s, exercising push/pull/clone as they
//! actually travel the wire rather than through in-process mocks.

use std::fs;
use std::path::PathBuf;

use minigit_lib::client::AuthCredential;
use minigit_lib::client::ClientEngine;
use minigit_lib::config::ServerConfig;
use minigit_lib::repo::Repository;
use minigit_lib::server::ServerEngine;
use tempfile::TempDir;
use tokio::net::TcpListener;

const PASSWORD: &str = "s3cret";

async fn spawn_server(root: PathBuf) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let config = ServerConfig::new(0, root).with_password(Some(PASSWORD.to_owned()));
    let engine = ServerEngine::new(config);
    tokio::spawn(engine.serve(listener));
    addr
}

async fn connected_client(addr: &str) -> ClientEngine {
    let mut client = ClientEngine::new();
    client.connect(addr).await.unwrap();
    client
        .authenticate(AuthCredential::Password(PASSWORD.to_owned()))
        .await
        .unwrap();
    client
}

#[tokio::test(flavor = "multi_thread")]
async fn s3_fast_forward_push_is_accepted() {
    let server_root = TempDir::new().unwrap();
    let addr = spawn_server(server_root.path().to_path_buf()).await;

    let mut client = connected_client(&addr).await;
    client.create_repository("demo").await.unwrap();
    client.use_repository("demo").await.unwrap();

    let workdir = TempDir::new().unwrap();
    let mut repo = Repository::init(workdir.path()).unwrap();
    fs::write(workdir.path().join("a.txt"), b"hello\n").unwrap();
    repo.add(&["a.txt".to_owned()]).unwrap();
    repo.commit("first commit".to_owned()).unwrap();

    let outcome = client.push(&repo).await.unwrap();
    assert!(!outcome.up_to_date);

    // pushing again with no new commits reports up-to-date.
    let outcome = client.push(&repo).await.unwrap();
    assert!(outcome.up_to_date);
}

#[tokio::test(flavor = "multi_thread")]
async fn s4_non_fast_forward_push_is_rejected() {
    let server_root = TempDir::new().unwrap();
    let addr = spawn_server(server_root.path().to_path_buf()).await;

    let mut client = connected_client(&addr).await;
    client.create_repository("demo").await.unwrap();
    client.use_repository("demo").await.unwrap();

    let workdir = TempDir::new().unwrap();
    let mut repo = Repository::init(workdir.path()).unwrap();
    fs::write(workdir.path().join("a.txt"), b"v1\n").unwrap();
    repo.add(&["a.txt".to_owned()]).unwrap();
    repo.commit("v1".to_owned()).unwrap();
    client.push(&repo).await.unwrap();

    // A second, unrelated repository has no shared history with the
    // server's current HEAD: its push must be refused.
    let other_workdir = TempDir::new().unwrap();
    let mut other_repo = Repository::init(other_workdir.path()).unwrap();
    fs::write(other_workdir.path().join("b.txt"), b"v2\n").unwrap();
    other_repo.add(&["b.txt".to_owned()]).unwrap();
    other_repo.commit("unrelated".to_owned()).unwrap();

    let mut other_client = connected_client(&addr).await;
    other_client.use_repository("demo").await.unwrap();
    let err = other_client.push(&other_repo).await.unwrap_err();
    assert!(matches!(err, minigit_lib::client::ClientError::Server { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn s5_pull_updates_working_tree() {
    let server_root = TempDir::new().unwrap();
    let addr = spawn_server(server_root.path().to_path_buf()).await;

    let mut pusher = connected_client(&addr).await;
    pusher.create_repository("demo").await.unwrap();
    pusher.use_repository("demo").await.unwrap();

    let pusher_dir = TempDir::new().unwrap();
    let mut pusher_repo = Repository::init(pusher_dir.path()).unwrap();
    fs::write(pusher_dir.path().join("a.txt"), b"hello\n").unwrap();
    pusher_repo.add(&["a.txt".to_owned()]).unwrap();
    pusher_repo.commit("first commit".to_owned()).unwrap();
    pusher.push(&pusher_repo).await.unwrap();

    let mut puller = connected_client(&addr).await;
    puller.use_repository("demo").await.unwrap();
    let puller_dir = TempDir::new().unwrap();
    let mut puller_repo = Repository::init(puller_dir.path()).unwrap();
    let outcome = puller.pull(&mut puller_repo).await.unwrap();
    assert!(!outcome.up_to_date);
    assert_eq!(fs::read(puller_dir.path().join("a.txt")).unwrap(), b"hello\n");

    // a second pull with nothing new reports up-to-date.
    let outcome = puller.pull(&mut puller_repo).await.unwrap();
    assert!(outcome.up_to_date);
}

#[tokio::test(flavor = "multi_thread")]
async fn s8_clone_reproduces_the_repository_and_records_a_remote() {
    let server_root = TempDir::new().unwrap();
    let addr = spawn_server(server_root.path().to_path_buf()).await;

    let mut client = connected_client(&addr).await;
    client.create_repository("demo").await.unwrap();
    client.use_repository("demo").await.unwrap();

    let seed_dir = TempDir::new().unwrap();
    let mut seed_repo = Repository::init(seed_dir.path()).unwrap();
    fs::write(seed_dir.path().join("a.txt"), b"hello\n").unwrap();
    seed_repo.add(&["a.txt".to_owned()]).unwrap();
    seed_repo.commit("first commit".to_owned()).unwrap();
    client.push(&seed_repo).await.unwrap();

    let mut cloner = connected_client(&addr).await;
    let dest = TempDir::new().unwrap();
    let target = dest.path().join("demo");
    cloner.clone_repo("demo", &target, None).await.unwrap();

    let cloned = Repository::open(&target).unwrap();
    assert_eq!(cloned.head().unwrap(), seed_repo.head().unwrap());
    let remote = cloned.load_config().unwrap();
    assert!(remote.remote().unwrap().starts_with("server://"));
}

#[tokio::test(flavor = "multi_thread")]
async fn authentication_with_the_wrong_password_fails() {
    let server_root = TempDir::new().unwrap();
    let addr = spawn_server(server_root.path().to_path_buf()).await;

    let mut client = ClientEngine::new();
    client.connect(&addr).await.unwrap();
    let err = client
        .authenticate(AuthCredential::Password("wrong".to_owned()))
        .await
        .unwrap_err();
    assert!(matches!(err, minigit_lib::client::ClientError::AuthFailed));
}
