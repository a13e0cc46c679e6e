pub mod protocol;
pub mod remote;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::camera::FrameImage;
use crate::landmark::HolisticResult;

pub use remote::RemoteDetector;

/// 検出モデルの複雑度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelComplexity {
    Lite,
    Full,
    Heavy,
}

impl Default for ModelComplexity {
    fn default() -> Self {
        Self::Lite
    }
}

/// 外部検出器に渡す設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorOptions {
    #[serde(default)]
    pub model_complexity: ModelComplexity,
    #[serde(default = "default_min_detection_confidence")]
    pub min_detection_confidence: f32,
    #[serde(default = "default_min_tracking_confidence")]
    pub min_tracking_confidence: f32,
    /// 検出器側のランドマーク平滑化
    #[serde(default)]
    pub smooth_landmarks: bool,
    /// 目・唇の高精細ランドマーク
    #[serde(default)]
    pub refine_face_landmarks: bool,
    #[serde(default)]
    pub enable_face_geometry: bool,
    /// アクセラレータを使わずCPU推論
    #[serde(default)]
    pub use_cpu_inference: bool,
}

fn default_min_detection_confidence() -> f32 {
    0.1
}
fn default_min_tracking_confidence() -> f32 {
    0.3
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            model_complexity: ModelComplexity::default(),
            min_detection_confidence: default_min_detection_confidence(),
            min_tracking_confidence: default_min_tracking_confidence(),
            smooth_landmarks: false,
            refine_face_landmarks: false,
            enable_face_geometry: false,
            use_cpu_inference: false,
        }
    }
}

/// ホリスティック検出器の境界
///
/// 内部はベンダ製で不透明。フレームを1枚送ると、結果が後から
/// 非同期に届く（send → try_result）。このcrateは実装を持たず、
/// 公開契約だけを消費する。
pub trait HolisticDetector {
    /// 接続・モデルロードの完了を待つ
    fn initialize(&mut self) -> Result<()>;

    fn set_options(&mut self, options: &DetectorOptions) -> Result<()>;

    /// フレームを1枚プッシュする。結果は後でtry_resultから取り出す
    fn send(&mut self, frame: &FrameImage) -> Result<()>;

    /// 届いている検出結果があれば取り出す（ノンブロッキング）
    fn try_result(&mut self) -> Option<HolisticResult>;

    /// 内部トラッキング状態の破棄（ソース切替時）
    fn reset(&mut self);
}
