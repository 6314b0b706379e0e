mod common;

use common::{chmod, copier, FakeFactory};
use scpr_core::{CancelToken, Phase, ProtocolError, ScpConfig, ScpError};
use scpr_scp::{TransferDirection, TransferState};
use std::fs;
use std::time::{Duration, Instant};

fn config() -> ScpConfig {
    ScpConfig::default()
}

fn recursive() -> ScpConfig {
    ScpConfig {
        recursive: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_upload_single_file() {
    let home = tempfile::tempdir().unwrap();
    let src = home.path().join("a.txt");
    fs::write(&src, b"hello").unwrap();
    chmod(&src, 0o644);

    let factory = FakeFactory::new(b"\0\0\0", 0);
    let log = factory.log();
    let mut scp = copier(config(), factory, home.path());

    let report = scp
        .copy(src.to_str().unwrap(), "bob@files:/tmp/dst", &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(report.direction, TransferDirection::LocalToRemote);
    assert_eq!(report.stats.files, 1);
    assert_eq!(report.stats.bytes, 5);

    let log = log.lock().unwrap();
    assert_eq!(log.commands, vec!["/usr/bin/scp -t /tmp/dst".to_string()]);
    assert_eq!(log.written, b"C0644 5 a.txt\nhello\0".to_vec());
    assert_eq!(log.users, vec!["bob".to_string()]);
    assert_eq!(log.targets[0].port, 22);
    assert!(log.input_closed);
    assert!(log.waited);
    assert!(!log.write_after_close);
    assert_eq!((log.opened, log.closed), (1, 1));

    assert_eq!(
        scp.history(),
        &[
            TransferState::Idle,
            TransferState::ParsingTargets,
            TransferState::AuthResolving,
            TransferState::SessionOpen,
            TransferState::Transferring,
            TransferState::Closed { success: true },
        ]
    );
}

#[tokio::test]
async fn test_upload_to_bare_host_uses_source_name_and_local_user() {
    let home = tempfile::tempdir().unwrap();
    let src = home.path().join("report.pdf");
    fs::write(&src, b"%PDF").unwrap();

    let factory = FakeFactory::new(b"", 0);
    let log = factory.log();
    let mut scp = copier(config(), factory, home.path());
    scp.copy(src.to_str().unwrap(), "files:", &CancelToken::new())
        .await
        .unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.commands, vec!["/usr/bin/scp -t report.pdf".to_string()]);
    assert_eq!(log.users, vec!["alice".to_string()]);
}

#[tokio::test]
async fn test_upload_tree_with_flags() {
    let home = tempfile::tempdir().unwrap();
    let root = home.path().join("proj");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("only.txt"), b"x").unwrap();
    chmod(&root, 0o755);
    chmod(&root.join("only.txt"), 0o600);

    let factory = FakeFactory::new(b"\0\0\0\0", 0);
    let log = factory.log();
    let cfg = ScpConfig {
        recursive: true,
        quiet: true,
        port: 2222,
        ..Default::default()
    };
    let mut scp = copier(cfg, factory, home.path());
    let report = scp
        .copy(root.to_str().unwrap(), "files:backup", &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(report.stats.directories, 1);
    let log = log.lock().unwrap();
    assert_eq!(log.commands, vec!["/usr/bin/scp -tqr backup".to_string()]);
    assert_eq!(log.targets[0].port, 2222);
    assert_eq!(
        log.written,
        b"D0755 0 proj\nC0600 1 only.txt\nx\0E\n".to_vec()
    );
}

#[tokio::test]
async fn test_directory_without_recursive_sends_nothing_and_closes_session() {
    let home = tempfile::tempdir().unwrap();
    let root = home.path().join("dir");
    fs::create_dir(&root).unwrap();

    let factory = FakeFactory::new(b"", 0);
    let log = factory.log();
    let mut scp = copier(config(), factory, home.path());
    let err = scp
        .copy(root.to_str().unwrap(), "files:/tmp", &CancelToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScpError::Protocol(ProtocolError::NotRegularFile(_))
    ));
    assert_eq!(err.phase(), Phase::Transfer);
    let log = log.lock().unwrap();
    assert!(log.written.is_empty());
    assert!(log.input_closed);
    assert_eq!(log.closed, 1);
    assert_eq!(scp.state(), TransferState::Closed { success: false });
}

#[tokio::test]
async fn test_remote_to_remote_never_opens_a_session() {
    let home = tempfile::tempdir().unwrap();
    let factory = FakeFactory::new(b"", 0);
    let log = factory.log();
    let mut scp = copier(config(), factory, home.path());

    let err = scp
        .copy("a:/x", "b:/y", &CancelToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ScpError::UnsupportedDirection));
    assert_eq!(log.lock().unwrap().opened, 0);
    assert_eq!(
        scp.history(),
        &[
            TransferState::Idle,
            TransferState::ParsingTargets,
            TransferState::Closed { success: false },
        ]
    );
}

#[tokio::test]
async fn test_download_materializes_file() {
    let home = tempfile::tempdir().unwrap();
    let dest = home.path().join("got.txt");

    let factory = FakeFactory::new(b"C0640 4 remote.txt\ndata\0", 0);
    let log = factory.log();
    let mut scp = copier(config(), factory, home.path());
    let report = scp
        .copy("files:/srv/remote.txt", dest.to_str().unwrap(), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(report.direction, TransferDirection::RemoteToLocal);
    assert_eq!(fs::read(&dest).unwrap(), b"data");
    let log = log.lock().unwrap();
    assert_eq!(log.commands, vec!["/usr/bin/scp -f /srv/remote.txt".to_string()]);
    // initial, header, payload
    assert_eq!(log.written, vec![0, 0, 0]);
    assert!(log.waited);
    assert_eq!(log.closed, 1);
}

#[tokio::test]
async fn test_download_tree_into_existing_directory() {
    let home = tempfile::tempdir().unwrap();
    let into = home.path().join("into");
    fs::create_dir(&into).unwrap();

    let stream = b"D0755 0 logs\nC0644 2 a.log\nA\n\0D0755 0 old\nC0644 0 b.log\n\0E\nE\n";
    let factory = FakeFactory::new(stream, 0);
    let log = factory.log();
    let mut scp = copier(recursive(), factory, home.path());
    scp.copy("files:/var/logs", into.to_str().unwrap(), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(fs::read(into.join("logs/a.log")).unwrap(), b"A\n");
    assert_eq!(fs::read(into.join("logs/old/b.log")).unwrap(), b"");
    assert_eq!(
        log.lock().unwrap().commands,
        vec!["/usr/bin/scp -fr /var/logs".to_string()]
    );
}

#[tokio::test]
async fn test_download_truncated_payload_is_protocol_error() {
    let home = tempfile::tempdir().unwrap();
    let factory = FakeFactory::new(b"C0644 10 f\nshort\0", 0);
    let log = factory.log();
    let mut scp = copier(config(), factory, home.path());
    let err = scp
        .copy("files:/f", home.path().join("f").to_str().unwrap(), &CancelToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScpError::Protocol(ProtocolError::Truncated {
            expected: 10,
            received: 6,
            ..
        })
    ));
    assert_eq!(log.lock().unwrap().closed, 1);
}

#[tokio::test]
async fn test_remote_failure_carries_peer_message() {
    let home = tempfile::tempdir().unwrap();
    let src = home.path().join("a.txt");
    fs::write(&src, b"x").unwrap();

    let factory = FakeFactory::new(b"\x01scp: /readonly/a.txt: Permission denied\n", 1);
    let log = factory.log();
    let mut scp = copier(config(), factory, home.path());
    let err = scp
        .copy(src.to_str().unwrap(), "files:/readonly/", &CancelToken::new())
        .await
        .unwrap_err();

    match err {
        ScpError::RemoteFailed { status, message } => {
            assert_eq!(status, 1);
            assert_eq!(
                message.as_deref(),
                Some("scp: /readonly/a.txt: Permission denied")
            );
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(log.lock().unwrap().closed, 1);
}

#[tokio::test]
async fn test_auth_rejection_is_auth_phase() {
    let home = tempfile::tempdir().unwrap();
    let src = home.path().join("a.txt");
    fs::write(&src, b"x").unwrap();

    let mut factory = FakeFactory::new(b"", 0);
    factory.reject_auth = true;
    let log = factory.log();
    let mut scp = copier(config(), factory, home.path());
    let err = scp
        .copy(src.to_str().unwrap(), "files:/tmp", &CancelToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Phase::Auth);
    assert!(err.diagnostic().starts_with("auth failed: "));
    assert_eq!(log.lock().unwrap().closed, 0);
}

#[tokio::test]
async fn test_strict_host_keys_without_home_fails_before_dialing() {
    let home = tempfile::tempdir().unwrap();
    let src = home.path().join("a.txt");
    fs::write(&src, b"x").unwrap();

    let factory = FakeFactory::new(b"", 0);
    let log = factory.log();
    let cfg = ScpConfig {
        check_known_hosts: true,
        ..Default::default()
    };
    let mut scp = scpr_scp::ScpCopier::new(
        cfg,
        scpr_ssh::AuthResolver::new(
            scpr_ssh::AuthEnvironment::default(),
            std::sync::Arc::new(scpr_ssh::Ssh2Agent),
            std::sync::Arc::new(scpr_ssh::TerminalPrompt),
        ),
        std::sync::Arc::new(factory),
    );
    let err = scp
        .copy(src.to_str().unwrap(), "files:/tmp", &CancelToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Phase::Auth);
    assert_eq!(log.lock().unwrap().opened, 0);
}

#[tokio::test]
async fn test_cancelled_transfer_returns_cancelled() {
    let home = tempfile::tempdir().unwrap();
    let src = home.path().join("a.txt");
    fs::write(&src, b"payload").unwrap();

    let factory = FakeFactory::new(b"", 0);
    let log = factory.log();
    let mut scp = copier(config(), factory, home.path());
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = scp
        .copy(src.to_str().unwrap(), "files:/tmp", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ScpError::Cancelled));
    let log = log.lock().unwrap();
    assert!(log.written.is_empty());
    assert_eq!(log.opened, log.closed);
}

fn cancel_after(delay: Duration) -> CancelToken {
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        trigger.cancel();
    });
    cancel
}

#[tokio::test]
async fn test_cancel_while_remote_never_exits() {
    let home = tempfile::tempdir().unwrap();
    let src = home.path().join("a.txt");
    fs::write(&src, b"payload").unwrap();

    let mut factory = FakeFactory::new(b"\0\0\0", 0);
    factory.hang_wait = Some(Duration::from_secs(2));
    let log = factory.log();
    let mut scp = copier(config(), factory, home.path());

    let cancel = cancel_after(Duration::from_millis(200));
    let started = Instant::now();
    let err = scp
        .copy(src.to_str().unwrap(), "files:/tmp", &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ScpError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(1), "{:?}", started.elapsed());
    assert_eq!(scp.state(), TransferState::Closed { success: false });
    let log = log.lock().unwrap();
    assert!(log.written.ends_with(b" 7 a.txt\npayload\0"));
    assert!(log.input_closed);
    assert_eq!(log.closed, 1);
}

#[tokio::test]
async fn test_cancel_unblocks_stalled_upload() {
    let home = tempfile::tempdir().unwrap();
    let src = home.path().join("big.bin");
    fs::write(&src, vec![7u8; 100_000]).unwrap();

    let mut factory = FakeFactory::new(b"", 0);
    factory.stall_writes = true;
    let log = factory.log();
    let mut scp = copier(config(), factory, home.path());

    let cancel = cancel_after(Duration::from_millis(200));
    let started = Instant::now();
    let err = scp
        .copy(src.to_str().unwrap(), "files:/tmp", &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ScpError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(3), "{:?}", started.elapsed());
    let log = log.lock().unwrap();
    assert!(log.written.is_empty());
    assert!(log.input_closed);
    assert!(!log.waited);
    assert_eq!(log.closed, 1);
}

#[tokio::test]
async fn test_local_copy_skips_the_transport() {
    let home = tempfile::tempdir().unwrap();
    let src = home.path().join("a.txt");
    let dst = home.path().join("b.txt");
    fs::write(&src, b"local").unwrap();

    let factory = FakeFactory::new(b"", 0);
    let log = factory.log();
    let mut scp = copier(config(), factory, home.path());
    let report = scp
        .copy(src.to_str().unwrap(), dst.to_str().unwrap(), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(report.direction, TransferDirection::LocalToLocal);
    assert_eq!(fs::read(&dst).unwrap(), b"local");
    assert_eq!(log.lock().unwrap().opened, 0);
    assert_eq!(
        scp.history(),
        &[
            TransferState::Idle,
            TransferState::ParsingTargets,
            TransferState::LocalPath,
            TransferState::Transferring,
            TransferState::Closed { success: true },
        ]
    );
}

#[tokio::test]
async fn test_parse_error_is_parse_phase() {
    let home = tempfile::tempdir().unwrap();
    let mut scp = copier(config(), FakeFactory::new(b"", 0), home.path());
    let err = scp
        .copy("user@:/x", "local", &CancelToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.phase(), Phase::Parse);
}
