//! Background screenshot service.
//!
//! Each request runs on its own task and reports back through its own
//! oneshot channel, so overlapping requests never see each other's results.
//! Failures are logged here and surface to callers only as an absent result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::client::{probe, CaptureClient};
use crate::config::Config;
use crate::error::ScreenshotError;
use crate::screen::{ImageAssembler, RotationSource};
use crate::storage::ScreenshotStore;

/// Outcome of a finished capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReport {
    pub path: PathBuf,
    /// Frame size as sent by the daemon, before counter-rotation.
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
    pub rotation_degrees: u32,
    pub captured_at: DateTime<Utc>,
}

/// Result of a background request that has not necessarily finished yet.
///
/// A task that dies without answering yields `T::default()`.
pub struct Pending<T> {
    rx: oneshot::Receiver<T>,
}

impl<T: Default> Pending<T> {
    fn new(rx: oneshot::Receiver<T>) -> Self {
        Self { rx }
    }

    pub async fn wait(self) -> T {
        self.rx.await.unwrap_or_default()
    }

    /// Block the current thread for the result. Must not be called from
    /// inside the runtime.
    pub fn blocking_wait(self) -> T {
        self.rx.blocking_recv().unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct ScreenshotService {
    config: Arc<Config>,
    rotation: RotationSource,
    store: Arc<ScreenshotStore>,
    assembler: ImageAssembler,
    runtime: Handle,
}

impl ScreenshotService {
    pub fn new(config: Config, rotation: RotationSource, runtime: Handle) -> Self {
        let store = ScreenshotStore::new(&config.screenshot_dir);
        let assembler = ImageAssembler::new(config.depth_policy);
        Self {
            config: Arc::new(config),
            rotation,
            store: Arc::new(store),
            assembler,
            runtime,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Is the capture daemon accepting connections?
    pub fn probe_availability(&self) -> Pending<bool> {
        let (tx, rx) = oneshot::channel();
        let config = self.config.clone();
        self.runtime.spawn(async move {
            let available = probe(&config.host, config.port, config.probe_timeout()).await;
            let _ = tx.send(available);
        });
        Pending::new(rx)
    }

    /// Capture and save a screenshot; resolves to the file path, or `None`
    /// if anything along the way failed.
    pub fn take_screenshot(&self) -> Pending<Option<PathBuf>> {
        self.spawn_capture(|report| report.path)
    }

    /// Like [`ScreenshotService::take_screenshot`] but with frame details.
    pub fn capture_report(&self) -> Pending<Option<CaptureReport>> {
        self.spawn_capture(|report| report)
    }

    /// The full pipeline with typed errors: capture, counter-rotate, encode.
    pub async fn screenshot(&self) -> Result<CaptureReport, ScreenshotError> {
        let frame = CaptureClient::from_config(&self.config).capture().await?;
        let (width, height, bits_per_pixel) = (frame.width, frame.height, frame.bits_per_pixel);

        let rotation = self.rotation.current();
        let path = self.store.next_path();
        let assembler = self.assembler;

        let path = tokio::task::spawn_blocking(move || assembler.encode(frame, rotation, &path))
            .await
            .map_err(|e| ScreenshotError::Task(e.to_string()))??;

        Ok(CaptureReport {
            path,
            width,
            height,
            bits_per_pixel,
            rotation_degrees: rotation.degrees(),
            captured_at: Utc::now(),
        })
    }

    fn spawn_capture<T, F>(&self, finish: F) -> Pending<Option<T>>
    where
        T: Send + 'static,
        F: FnOnce(CaptureReport) -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let service = self.clone();
        self.runtime.spawn(async move {
            let result = match service.screenshot().await {
                Ok(report) => {
                    info!(
                        path = %report.path.display(),
                        width = report.width,
                        height = report.height,
                        rotation = report.rotation_degrees,
                        "Screenshot saved"
                    );
                    Some(finish(report))
                }
                Err(e) => {
                    warn!(error = %e, "Screenshot failed");
                    None
                }
            };
            let _ = tx.send(result);
        });
        Pending::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::{Rotation, StaticDisplay};
    use crate::stub::{StubDaemon, StubFrame};
    use image::GenericImageView;
    use std::net::SocketAddr;

    fn service_for(addr: SocketAddr, dir: &std::path::Path, rotation: Rotation) -> ScreenshotService {
        let config = Config {
            host: addr.ip().to_string(),
            port: addr.port(),
            screenshot_dir: dir.to_path_buf(),
            ..Config::default()
        };
        let display = StaticDisplay {
            rotation: Some(rotation),
            ..Default::default()
        };
        ScreenshotService::new(
            config,
            RotationSource::select(Arc::new(display)),
            Handle::current(),
        )
    }

    async fn start_stub(frame: StubFrame) -> SocketAddr {
        let daemon = StubDaemon::bind("127.0.0.1:0", frame).await.unwrap();
        let addr = daemon.local_addr();
        daemon.spawn();
        addr
    }

    fn closed_port() -> SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    #[tokio::test]
    async fn test_take_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let addr = start_stub(StubFrame::test_pattern(6, 4, 32)).await;
        let service = service_for(addr, dir.path(), Rotation::Deg0);

        let path = service.take_screenshot().wait().await.unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(image::open(&path).unwrap().dimensions(), (6, 4));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_captures_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        // Neither capture finds the output directory in place.
        let out_dir = dir.path().join("a").join("b");
        let addr = start_stub(StubFrame::test_pattern(8, 8, 32)).await;
        let service = service_for(addr, &out_dir, Rotation::Deg0);

        let first = service.take_screenshot();
        let second = service.take_screenshot();
        let (a, b) = tokio::join!(first.wait(), second.wait());
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a, b);
        for path in [&a, &b] {
            assert!(path.starts_with(&out_dir));
            assert_eq!(image::open(path).unwrap().dimensions(), (8, 8));
        }
    }

    #[tokio::test]
    async fn test_report_applies_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let addr = start_stub(StubFrame::test_pattern(5, 2, 16)).await;
        let service = service_for(addr, dir.path(), Rotation::Deg270);

        let report = service.capture_report().wait().await.unwrap();
        assert_eq!((report.width, report.height), (5, 2));
        assert_eq!(report.bits_per_pixel, 16);
        assert_eq!(report.rotation_degrees, 270);
        assert_eq!(image::open(&report.path).unwrap().dimensions(), (2, 5));
    }

    #[tokio::test]
    async fn test_failures_collapse_to_none() {
        let dir = tempfile::tempdir().unwrap();

        let service = service_for(closed_port(), dir.path(), Rotation::Deg0);
        assert_eq!(service.take_screenshot().wait().await, None);
        assert!(matches!(
            service.screenshot().await,
            Err(ScreenshotError::Capture(_))
        ));

        let addr = start_stub(StubFrame::test_pattern(4, 4, 32).truncated(3)).await;
        let service = service_for(addr, dir.path(), Rotation::Deg0);
        assert_eq!(service.take_screenshot().wait().await, None);

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_probe_availability() {
        let dir = tempfile::tempdir().unwrap();
        let addr = start_stub(StubFrame::test_pattern(1, 1, 32)).await;

        assert!(service_for(addr, dir.path(), Rotation::Deg0).probe_availability().wait().await);
        assert!(!service_for(closed_port(), dir.path(), Rotation::Deg0)
            .probe_availability()
            .wait()
            .await);
    }

    #[test]
    fn test_blocking_caller_thread() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let service = runtime.block_on(async {
            let addr = start_stub(StubFrame::test_pattern(3, 3, 32)).await;
            service_for(addr, dir.path(), Rotation::Deg0)
        });

        assert!(service.probe_availability().blocking_wait());
        let path = service.take_screenshot().blocking_wait().unwrap();
        assert!(path.exists());
    }
}
