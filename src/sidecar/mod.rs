//! Config update transactions: validate, replace, reload, roll back on failure.

pub mod file;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{ReloadError, SidecarError};
use crate::metrics::{Metrics, UpdateOutcome};
use crate::validation::{report, UpdateConfigCmd};

/// Reply sent back by the reload consumer.
pub type ReloadReply = Result<(), ReloadError>;

/// One-shot reply slot handed to the reload consumer.
pub type ReloadRequest = oneshot::Sender<ReloadReply>;

/// Request side of the reload channel.
pub type ReloadSender = mpsc::Sender<ReloadRequest>;

/// Consumer side of the reload channel.
pub type ReloadReceiver = mpsc::Receiver<ReloadRequest>;

/// Creates a reload channel.
pub fn reload_channel(buffer: usize) -> (ReloadSender, ReloadReceiver) {
    mpsc::channel(buffer)
}

/// Sends one reload request and waits for its reply.
pub async fn request_reload(reload_tx: &ReloadSender) -> ReloadReply {
    let (reply_tx, reply_rx) = oneshot::channel();
    reload_tx
        .send(reply_tx)
        .await
        .map_err(|_| ReloadError::ChannelClosed)?;
    reply_rx.await.map_err(|_| ReloadError::NoReply)?
}

/// Single writer of the probe config file.
///
/// Updates are serialized by one async mutex which also guards the
/// last-update timestamp. A call holds it from validation until the file is
/// committed or rolled back, so no two updates ever overlap.
pub struct SidecarService {
    config_path: PathBuf,
    last_update_ts: Arc<Mutex<Option<DateTime<Utc>>>>,
    reload_timeout: Option<Duration>,
    metrics: Arc<Metrics>,
}

impl SidecarService {
    /// Creates a service writing to `config_path`.
    pub fn new(config_path: impl Into<PathBuf>, metrics: Arc<Metrics>) -> Self {
        Self {
            config_path: config_path.into(),
            last_update_ts: Arc::new(Mutex::new(None)),
            reload_timeout: None,
            metrics,
        }
    }

    /// Bounds the wait for a reload reply. Expiry counts as a failed reload.
    pub fn with_reload_timeout(mut self, timeout: Duration) -> Self {
        self.reload_timeout = Some(timeout);
        self
    }

    /// Returns the path to the configuration file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Time of the last committed update, `None` if there has been none.
    pub async fn last_update_ts(&self) -> Option<DateTime<Utc>> {
        *self.last_update_ts.lock().await
    }

    /// Replaces the config file with `cmd` and has the exporter reload it.
    ///
    /// On a write or reload failure the previous file content is written
    /// back and the original error is returned. A failed restoration is only
    /// logged and counted.
    ///
    /// Dropping the returned future cancels the update: the transaction keeps
    /// running on its own task, treats the cancellation as a failed reload and
    /// restores the previous file.
    pub async fn update_config_reload(
        &self,
        cmd: &UpdateConfigCmd,
        reload_tx: &ReloadSender,
    ) -> Result<(), SidecarError> {
        self.update_config_reload_with_cancel(cmd, reload_tx, CancellationToken::new())
            .await
    }

    /// Like [`update_config_reload`](Self::update_config_reload), also giving
    /// up on the reload handshake once `cancel` fires.
    pub async fn update_config_reload_with_cancel(
        &self,
        cmd: &UpdateConfigCmd,
        reload_tx: &ReloadSender,
        cancel: CancellationToken,
    ) -> Result<(), SidecarError> {
        let span = info_span!(
            "config_update",
            update_id = %Uuid::new_v4(),
            path = %self.config_path.display()
        );
        // Child token: dropping this future cancels the update, never the caller's token.
        let cancel = cancel.child_token();
        let _cancel_on_drop = cancel.clone().drop_guard();

        let last_update_ts = self
            .last_update_ts
            .clone()
            .lock_owned()
            .instrument(span.clone())
            .await;

        let txn = Transaction {
            config_path: self.config_path.clone(),
            reload_timeout: self.reload_timeout,
            metrics: self.metrics.clone(),
            reload_tx: reload_tx.clone(),
            cancel,
        };
        let cmd = cmd.clone();
        let handle = tokio::spawn(
            async move { txn.run(&cmd, last_update_ts).await }.instrument(span),
        );

        match handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(ReloadError::Cancelled.into()),
        }
    }
}

/// One update, run to completion on its own task with the update lock held.
struct Transaction {
    config_path: PathBuf,
    reload_timeout: Option<Duration>,
    metrics: Arc<Metrics>,
    reload_tx: ReloadSender,
    cancel: CancellationToken,
}

impl Transaction {
    async fn run(
        &self,
        cmd: &UpdateConfigCmd,
        mut last_update_ts: OwnedMutexGuard<Option<DateTime<Utc>>>,
    ) -> Result<(), SidecarError> {
        let errors = cmd.validate();
        if !errors.is_empty() {
            warn!(errors = %errors, "{}", report::format_brief_summary(&errors));
            self.metrics.record_update(UpdateOutcome::Rejected);
            return Err(SidecarError::Validation(errors));
        }

        if let Err(e) = self.replace_and_reload(cmd).await {
            error!(error = %e, "Config update failed");
            self.metrics.record_update(UpdateOutcome::Failed);
            return Err(e);
        }

        let ts = next_timestamp(*last_update_ts);
        *last_update_ts = Some(ts);
        self.metrics.set_last_update(ts);
        self.metrics.record_update(UpdateOutcome::Committed);
        info!(last_update_ts = %ts.to_rfc3339(), "Config updated and reloaded");

        Ok(())
    }

    /// Snapshots the current file, writes the new one, and reloads.
    async fn replace_and_reload(&self, cmd: &UpdateConfigCmd) -> Result<(), SidecarError> {
        // Cancelled while queued on the lock: nothing has been touched yet.
        if self.cancel.is_cancelled() {
            return Err(ReloadError::Cancelled.into());
        }

        let old_config = file::read_config_file(&self.config_path)
            .await
            .map_err(|source| SidecarError::ReadConfig {
                path: self.config_path.clone(),
                source,
            })?;

        debug!(
            old_sha256 = %file::content_digest(&old_config),
            new_sha256 = %file::content_digest(&cmd.yaml),
            "Replacing config file"
        );

        let result = async {
            file::write_config_file(&self.config_path, &cmd.yaml)
                .await
                .map_err(|source| SidecarError::WriteConfig {
                    path: self.config_path.clone(),
                    source,
                })?;

            self.do_reload().await?;
            Ok::<(), SidecarError>(())
        }
        .await;

        if result.is_err() {
            self.restore(&old_config).await;
        }

        result
    }

    /// Runs the reload handshake until it answers, times out or is cancelled.
    async fn do_reload(&self) -> Result<(), ReloadError> {
        let handshake = async {
            match self.reload_timeout {
                Some(timeout) => tokio::time::timeout(timeout, request_reload(&self.reload_tx))
                    .await
                    .map_err(|_| ReloadError::Timeout(timeout))?,
                None => request_reload(&self.reload_tx).await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!("Config update cancelled during reload");
                Err(ReloadError::Cancelled)
            }
            result = handshake => result,
        }
    }

    /// Writes the previous content back. Failures are logged, not returned.
    async fn restore(&self, old_config: &str) {
        match file::write_config_file(&self.config_path, old_config).await {
            Ok(()) => info!("Restored previous config file"),
            Err(e) => {
                self.metrics.record_restore_failure();
                error!(
                    error = %e,
                    path = %self.config_path.display(),
                    "Recover config file error; file may hold the rejected config"
                );
            }
        }
    }
}

/// Current time, nudged past `prev` so committed timestamps strictly increase.
fn next_timestamp(prev: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match prev {
        Some(prev) if now <= prev => prev + chrono::Duration::nanoseconds(1),
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::task::JoinHandle;
    use tokio_test::{assert_err, assert_ok};

    const CONFIG_A: &str = include_str!("../../testdata/blackbox.yml");

    const CONFIG_B: &str = "
modules:
  http_2xx:
    prober: http
    http:
      preferred_ip_protocol: \"ip4\"
";

    const MALFORMED: &str = "
modules:
  http_2xx:
    prober: http
    blah blah
    http:
      preferred_ip_protocol: \"ip4\"
";

    struct Fixture {
        _dir: TempDir,
        path: PathBuf,
        metrics: Arc<Metrics>,
        service: SidecarService,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blackbox.yml");
        std::fs::write(&path, CONFIG_A).unwrap();
        let metrics = Arc::new(Metrics::new().unwrap());
        let service = SidecarService::new(&path, metrics.clone());
        Fixture {
            _dir: dir,
            path,
            metrics,
            service,
        }
    }

    /// Spawns a consumer answering every request with `reply()`.
    fn spawn_consumer<F>(reply: F) -> (ReloadSender, Arc<AtomicUsize>, JoinHandle<()>)
    where
        F: Fn() -> ReloadReply + Send + 'static,
    {
        let (tx, mut rx) = reload_channel(1);
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let handle = tokio::spawn(async move {
            while let Some(reply_tx) = rx.recv().await {
                seen.fetch_add(1, Ordering::SeqCst);
                let _ = reply_tx.send(reply());
            }
        });
        (tx, count, handle)
    }

    fn read(path: &Path) -> Vec<u8> {
        std::fs::read(path).unwrap()
    }

    #[tokio::test]
    async fn test_update_commits_and_sets_timestamp() {
        let f = fixture();
        assert_eq!(f.service.last_update_ts().await, None);

        let (tx, count, _h) = spawn_consumer(|| Ok(()));
        assert_ok!(
            f.service
                .update_config_reload(&UpdateConfigCmd::new(CONFIG_B), &tx)
                .await
        );

        assert_eq!(read(&f.path), CONFIG_B.as_bytes());
        assert!(f.service.last_update_ts().await.is_some());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(
            f.metrics.updates_total.with_label_values(&["committed"]).get(),
            1.0
        );
    }

    #[tokio::test]
    async fn test_blank_input_touches_nothing() {
        let f = fixture();
        let (tx, count, _h) = spawn_consumer(|| Ok(()));

        for blank in ["", "   ", "\n\t\n"] {
            let err = f
                .service
                .update_config_reload(&UpdateConfigCmd::new(blank), &tx)
                .await
                .unwrap_err();
            match err {
                SidecarError::Validation(errors) => {
                    assert_eq!(errors.messages()[0], "Yaml must not be blank")
                }
                other => panic!("expected validation error, got {:?}", other),
            }
        }

        assert_eq!(read(&f.path), CONFIG_A.as_bytes());
        assert_eq!(f.service.last_update_ts().await, None);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(
            f.metrics.updates_total.with_label_values(&["rejected"]).get(),
            3.0
        );
    }

    #[tokio::test]
    async fn test_malformed_config_keeps_file() {
        let f = fixture();
        let (tx, count, _h) = spawn_consumer(|| Ok(()));

        let err = f
            .service
            .update_config_reload(&UpdateConfigCmd::new(MALFORMED), &tx)
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(read(&f.path), CONFIG_A.as_bytes());
        assert_eq!(f.service.last_update_ts().await, None);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_field_keeps_file() {
        let f = fixture();
        let (tx, _count, _h) = spawn_consumer(|| Ok(()));

        let cmd = UpdateConfigCmd::new("modules:\n  m:\n    prober: tcp\n    retries: 3\n");
        let err = f.service.update_config_reload(&cmd, &tx).await.unwrap_err();

        assert!(err.to_string().contains("unknown field `retries`"));
        assert_eq!(read(&f.path), CONFIG_A.as_bytes());
    }

    #[tokio::test]
    async fn test_reload_rejection_restores_file() {
        let f = fixture();
        let (tx, count, _h) =
            spawn_consumer(|| Err(ReloadError::Rejected("blah blah".to_string())));

        let err = f
            .service
            .update_config_reload(&UpdateConfigCmd::new(CONFIG_B), &tx)
            .await
            .unwrap_err();

        assert!(matches!(err, SidecarError::Reload(ReloadError::Rejected(_))));
        assert!(err.to_string().contains("blah blah"));
        assert_eq!(read(&f.path), CONFIG_A.as_bytes());
        assert_eq!(f.service.last_update_ts().await, None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(
            f.metrics.updates_total.with_label_values(&["failed"]).get(),
            1.0
        );
        assert_eq!(f.metrics.restore_failures_total.get(), 0.0);
    }

    #[tokio::test]
    async fn test_rejection_after_commit_keeps_timestamp() {
        let f = fixture();
        let (ok_tx, _c, _h) = spawn_consumer(|| Ok(()));
        f.service
            .update_config_reload(&UpdateConfigCmd::new(CONFIG_B), &ok_tx)
            .await
            .unwrap();
        let committed = f.service.last_update_ts().await;

        let (bad_tx, _c2, _h2) =
            spawn_consumer(|| Err(ReloadError::Rejected("blah blah".to_string())));
        let cmd = UpdateConfigCmd::new("modules:\n  tcp_connect:\n    prober: tcp\n");
        assert_err!(f.service.update_config_reload(&cmd, &bad_tx).await);

        assert_eq!(read(&f.path), CONFIG_B.as_bytes());
        assert_eq!(f.service.last_update_ts().await, committed);
    }

    #[tokio::test]
    async fn test_closed_channel_restores_file() {
        let f = fixture();
        let (tx, rx) = reload_channel(1);
        drop(rx);

        let err = f
            .service
            .update_config_reload(&UpdateConfigCmd::new(CONFIG_B), &tx)
            .await
            .unwrap_err();

        assert!(matches!(err, SidecarError::Reload(ReloadError::ChannelClosed)));
        assert_eq!(read(&f.path), CONFIG_A.as_bytes());
        assert_eq!(f.service.last_update_ts().await, None);
    }

    #[tokio::test]
    async fn test_dropped_reply_restores_file() {
        let f = fixture();
        let (tx, mut rx) = reload_channel(1);
        tokio::spawn(async move {
            while let Some(reply_tx) = rx.recv().await {
                drop(reply_tx);
            }
        });

        let err = f
            .service
            .update_config_reload(&UpdateConfigCmd::new(CONFIG_B), &tx)
            .await
            .unwrap_err();

        assert!(matches!(err, SidecarError::Reload(ReloadError::NoReply)));
        assert_eq!(read(&f.path), CONFIG_A.as_bytes());
    }

    #[tokio::test]
    async fn test_reload_timeout_restores_file() {
        let f = fixture();
        let service = SidecarService::new(&f.path, f.metrics.clone())
            .with_reload_timeout(Duration::from_millis(50));

        // Holds requests without ever answering.
        let (tx, mut rx) = reload_channel(1);
        let _hold = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Some(reply_tx) = rx.recv().await {
                held.push(reply_tx);
            }
        });

        let err = service
            .update_config_reload(&UpdateConfigCmd::new(CONFIG_B), &tx)
            .await
            .unwrap_err();

        assert!(matches!(err, SidecarError::Reload(ReloadError::Timeout(_))));
        assert_eq!(read(&f.path), CONFIG_A.as_bytes());
        assert_eq!(service.last_update_ts().await, None);
    }

    /// Spawns a consumer that takes requests and never answers them.
    fn spawn_silent_consumer() -> ReloadSender {
        let (tx, mut rx) = reload_channel(1);
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Some(reply_tx) = rx.recv().await {
                held.push(reply_tx);
            }
        });
        tx
    }

    #[tokio::test]
    async fn test_dropped_update_restores_file() {
        let f = fixture();
        let tx = spawn_silent_consumer();

        let outcome = tokio::time::timeout(
            Duration::from_millis(100),
            f.service.update_config_reload(&UpdateConfigCmd::new(CONFIG_B), &tx),
        )
        .await;
        assert!(outcome.is_err());

        // The abandoned transaction keeps the lock until its rollback is done.
        assert_eq!(f.service.last_update_ts().await, None);
        assert_eq!(read(&f.path), CONFIG_A.as_bytes());
        assert_eq!(
            f.metrics.updates_total.with_label_values(&["failed"]).get(),
            1.0
        );
        assert_eq!(f.metrics.restore_failures_total.get(), 0.0);
    }

    #[tokio::test]
    async fn test_cancel_token_restores_file() {
        let f = fixture();
        let tx = spawn_silent_consumer();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = f
            .service
            .update_config_reload_with_cancel(&UpdateConfigCmd::new(CONFIG_B), &tx, cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, SidecarError::Reload(ReloadError::Cancelled)));
        assert_eq!(read(&f.path), CONFIG_A.as_bytes());
        assert_eq!(f.service.last_update_ts().await, None);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_touches_nothing() {
        let f = fixture();
        let (tx, count, _h) = spawn_consumer(|| Ok(()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = f
            .service
            .update_config_reload_with_cancel(&UpdateConfigCmd::new(CONFIG_B), &tx, cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, SidecarError::Reload(ReloadError::Cancelled)));
        assert_eq!(read(&f.path), CONFIG_A.as_bytes());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_commit_leaves_caller_token_alone() {
        let f = fixture();
        let (tx, _count, _h) = spawn_consumer(|| Ok(()));
        let shutdown = CancellationToken::new();

        assert_ok!(
            f.service
                .update_config_reload_with_cancel(
                    &UpdateConfigCmd::new(CONFIG_B),
                    &tx,
                    shutdown.clone()
                )
                .await
        );

        assert!(!shutdown.is_cancelled());
        assert_eq!(read(&f.path), CONFIG_B.as_bytes());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_config_keeps_link() {
        let f = fixture();
        let link = f._dir.path().join("linked.yml");
        std::os::unix::fs::symlink(&f.path, &link).unwrap();
        let service = SidecarService::new(&link, f.metrics.clone());

        let (ok_tx, _c, _h) = spawn_consumer(|| Ok(()));
        assert_ok!(
            service
                .update_config_reload(&UpdateConfigCmd::new(CONFIG_B), &ok_tx)
                .await
        );
        assert_eq!(read(&f.path), CONFIG_B.as_bytes());

        let (bad_tx, _c2, _h2) =
            spawn_consumer(|| Err(ReloadError::Rejected("blah blah".to_string())));
        let cmd = UpdateConfigCmd::new("modules:\n  icmp:\n    prober: icmp\n");
        assert_err!(service.update_config_reload(&cmd, &bad_tx).await);

        assert!(std::fs::symlink_metadata(&link)
            .unwrap()
            .file_type()
            .is_symlink());
        assert_eq!(read(&f.path), CONFIG_B.as_bytes());
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_writing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.yml");
        let service = SidecarService::new(&path, Arc::new(Metrics::new().unwrap()));
        let (tx, count, _h) = spawn_consumer(|| Ok(()));

        let err = service
            .update_config_reload(&UpdateConfigCmd::new(CONFIG_B), &tx)
            .await
            .unwrap_err();

        assert!(matches!(err, SidecarError::ReadConfig { .. }));
        assert!(!path.exists());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_write_failure_skips_reload() {
        let f = fixture();
        let blocker = file::temp_path_for(&file::resolve_target(&f.path).await.unwrap()).unwrap();
        std::fs::create_dir(blocker).unwrap();
        let (tx, count, _h) = spawn_consumer(|| Ok(()));

        let err = f
            .service
            .update_config_reload(&UpdateConfigCmd::new(CONFIG_B), &tx)
            .await
            .unwrap_err();

        assert!(matches!(err, SidecarError::WriteConfig { .. }));
        assert_eq!(read(&f.path), CONFIG_A.as_bytes());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(f.service.last_update_ts().await, None);
        // The restore write hits the same obstacle and is only counted.
        assert_eq!(f.metrics.restore_failures_total.get(), 1.0);
    }

    #[tokio::test]
    async fn test_failed_restore_returns_original_error() {
        let f = fixture();
        let blocker = file::temp_path_for(&file::resolve_target(&f.path).await.unwrap()).unwrap();
        let (tx, mut rx) = reload_channel(1);
        tokio::spawn(async move {
            while let Some(reply_tx) = rx.recv().await {
                std::fs::create_dir(&blocker).unwrap();
                let _ = reply_tx.send(Err(ReloadError::Rejected("blah blah".to_string())));
            }
        });

        let err = f
            .service
            .update_config_reload(&UpdateConfigCmd::new(CONFIG_B), &tx)
            .await
            .unwrap_err();

        assert!(matches!(err, SidecarError::Reload(ReloadError::Rejected(_))));
        assert_eq!(f.metrics.restore_failures_total.get(), 1.0);
        // Known residual risk: the rejected text stays on disk.
        assert_eq!(read(&f.path), CONFIG_B.as_bytes());
        assert_eq!(f.service.last_update_ts().await, None);
    }

    #[tokio::test]
    async fn test_same_config_twice_advances_timestamp() {
        let f = fixture();
        let (tx, count, _h) = spawn_consumer(|| Ok(()));
        let cmd = UpdateConfigCmd::new(CONFIG_B);

        f.service.update_config_reload(&cmd, &tx).await.unwrap();
        let first = f.service.last_update_ts().await.unwrap();

        f.service.update_config_reload(&cmd, &tx).await.unwrap();
        let second = f.service.last_update_ts().await.unwrap();

        assert!(second > first);
        assert_eq!(read(&f.path), CONFIG_B.as_bytes());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_updates_do_not_interleave() {
        let f = fixture();
        let path = f.path.clone();
        let service = Arc::new(f.service);

        // While a reload is in flight the file must not change underneath it.
        let (tx, mut rx) = reload_channel(1);
        let consumer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(reply_tx) = rx.recv().await {
                let before = std::fs::read_to_string(&path).unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
                let after = std::fs::read_to_string(&path).unwrap();
                assert_eq!(before, after);
                seen.push(before);
                let _ = reply_tx.send(Ok(()));
            }
            seen
        });

        let config_c = "modules:\n  icmp:\n    prober: icmp\n";
        let (a, b) = {
            let s1 = service.clone();
            let s2 = service.clone();
            let tx1 = tx.clone();
            let tx2 = tx.clone();
            tokio::join!(
                tokio::spawn(async move {
                    s1.update_config_reload(&UpdateConfigCmd::new(CONFIG_B), &tx1)
                        .await
                }),
                tokio::spawn(async move {
                    s2.update_config_reload(&UpdateConfigCmd::new(config_c), &tx2)
                        .await
                }),
            )
        };
        a.unwrap().unwrap();
        b.unwrap().unwrap();

        drop(tx);
        let seen = consumer.await.unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&CONFIG_B.to_string()));
        assert!(seen.contains(&config_c.to_string()));
        assert_eq!(std::fs::read_to_string(&f.path).unwrap(), seen[1]);
    }

    #[test]
    fn test_next_timestamp_is_strictly_increasing() {
        let future = Utc::now() + chrono::Duration::hours(1);
        let next = next_timestamp(Some(future));
        assert!(next > future);

        let past = Utc::now() - chrono::Duration::hours(1);
        assert!(next_timestamp(Some(past)) > past);
        assert!(next_timestamp(None) > past);
    }
}
