#[cfg(feature = "desktop")]
pub mod capture;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[cfg(feature = "desktop")]
pub use capture::VideoSource;

/// 検出器へ送るエンコード済みフレーム
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    pub timestamp_us: u64,
    pub jpeg: Vec<u8>,
}

/// フレーム供給元（webcam・動画ファイル・テスト用スクリプト）
pub trait FrameSource {
    /// 前回のpollから進んだフレームがあれば返す（ノンブロッキング）
    fn poll_frame(&mut self) -> Result<Option<FrameImage>>;

    /// 現在のフレーム幅。未初期化なら0
    fn width(&self) -> u32;

    /// 現在のフレーム高さ。未初期化なら0
    fn height(&self) -> u32;

    fn paused(&self) -> bool;

    /// 検出器へフレームを送ってよい状態か
    ///
    /// 寸法が立つ前や一時停止中のフレームは捨てる。
    fn ready(&self) -> bool {
        self.width() > 0 && self.height() > 0 && !self.paused()
    }
}
