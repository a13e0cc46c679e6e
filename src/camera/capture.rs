//! OpenCVによるフレーム取得（webcam・動画ファイル）
//!
//! キャプチャは専用スレッドで回し、最新フレームだけを保持する。
//! poll_frame はフレームIDが進んだときのみJPEGエンコードして返すので、
//! 同じフレームを検出器へ二重送信しない。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use opencv::{
    core::{Mat, Vector},
    imgcodecs,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs, VideoCaptureTrait},
};

use super::{FrameImage, FrameSource};

const JPEG_QUALITY: i32 = 85;

fn open_capture(source: &CaptureTarget) -> Result<(VideoCapture, u32, u32)> {
    let mut capture = match source {
        CaptureTarget::Camera {
            index,
            width,
            height,
        } => {
            let mut capture = VideoCapture::new(*index, VideoCaptureAPIs::CAP_ANY as i32)
                .context("Failed to open camera")?;
            if !capture.is_opened()? {
                anyhow::bail!("Camera {} is not available", index);
            }
            if *width > 0 {
                capture.set(videoio::CAP_PROP_FRAME_WIDTH, *width as f64)?;
            }
            if *height > 0 {
                capture.set(videoio::CAP_PROP_FRAME_HEIGHT, *height as f64)?;
            }
            capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;
            capture
        }
        CaptureTarget::File { path } => {
            let capture = VideoCapture::from_file(path, VideoCaptureAPIs::CAP_ANY as i32)
                .with_context(|| format!("Failed to open video file {}", path))?;
            if !capture.is_opened()? {
                anyhow::bail!("Video file {} could not be opened", path);
            }
            capture
        }
    };

    let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
    let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
    let fps = capture.get(videoio::CAP_PROP_FPS)?;
    println!("[camera] source opened: {}x{} @ {} fps", width, height, fps);
    Ok((capture, width, height))
}

fn jpeg_encode(frame: &Mat) -> Result<Vec<u8>> {
    let params = Vector::from_iter([imgcodecs::IMWRITE_JPEG_QUALITY, JPEG_QUALITY]);
    let mut buf: Vector<u8> = Vector::new();
    imgcodecs::imencode(".jpg", frame, &mut buf, &params)?;
    Ok(buf.to_vec())
}

enum CaptureTarget {
    Camera { index: i32, width: u32, height: u32 },
    File { path: String },
}

/// キャプチャスレッド付きのフレームソース
pub struct VideoSource {
    latest: Arc<Mutex<Option<Mat>>>,
    frame_id: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    paused: bool,
    last_polled_id: u64,
    width: u32,
    height: u32,
    _handle: thread::JoinHandle<()>,
}

impl VideoSource {
    pub fn open_camera(index: i32, width: u32, height: u32) -> Result<Self> {
        Self::start(CaptureTarget::Camera {
            index,
            width,
            height,
        })
    }

    pub fn open_file(path: &str) -> Result<Self> {
        Self::start(CaptureTarget::File {
            path: path.to_string(),
        })
    }

    fn start(target: CaptureTarget) -> Result<Self> {
        let (mut capture, width, height) = open_capture(&target)?;
        let latest = Arc::new(Mutex::new(None::<Mat>));
        let latest_ref = latest.clone();
        let frame_id = Arc::new(AtomicU64::new(0));
        let frame_id_ref = frame_id.clone();
        let running = Arc::new(AtomicBool::new(true));
        let running_ref = running.clone();

        let handle = thread::spawn(move || {
            let mut frame = Mat::default();
            while running_ref.load(Ordering::Relaxed) {
                match capture.read(&mut frame) {
                    Ok(true) if !frame.empty() => {
                        *latest_ref.lock().unwrap() = Some(frame.clone());
                        frame_id_ref.fetch_add(1, Ordering::Release);
                    }
                    // ファイル終端・一時的な読み込み失敗
                    _ => thread::sleep(std::time::Duration::from_millis(10)),
                }
            }
        });

        Ok(Self {
            latest,
            frame_id,
            running,
            paused: false,
            last_polled_id: 0,
            width,
            height,
            _handle: handle,
        })
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }
}

impl FrameSource for VideoSource {
    fn poll_frame(&mut self) -> Result<Option<FrameImage>> {
        let id = self.frame_id.load(Ordering::Acquire);
        if id == self.last_polled_id {
            return Ok(None);
        }
        let frame = {
            let guard = self.latest.lock().unwrap();
            match guard.as_ref() {
                Some(mat) => mat.clone(),
                None => return Ok(None),
            }
        };
        self.last_polled_id = id;
        let timestamp_us = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64;
        Ok(Some(FrameImage {
            width: frame.cols() as u32,
            height: frame.rows() as u32,
            timestamp_us,
            jpeg: jpeg_encode(&frame)?,
        }))
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn paused(&self) -> bool {
        self.paused
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}
