use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::detector::DetectorOptions;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub render: RenderOptions,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// フレームループの上限FPS
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
}

fn default_target_fps() -> u32 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target_fps: default_target_fps(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// 入力ソース種別 ("webcam" | "file" | "none")
    #[serde(default = "default_source_kind")]
    pub kind: String,
    /// webcam時のカメラインデックス
    #[serde(default)]
    pub camera_index: i32,
    /// file時の動画パス
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_capture_width")]
    pub width: u32,
    #[serde(default = "default_capture_height")]
    pub height: u32,
}

fn default_source_kind() -> String {
    "webcam".to_string()
}
fn default_capture_width() -> u32 {
    1280
}
fn default_capture_height() -> u32 {
    720
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            camera_index: 0,
            path: String::new(),
            width: default_capture_width(),
            height: default_capture_height(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    /// 外部検出器プロセスのアドレス
    #[serde(default = "default_detector_addr")]
    pub addr: String,
    #[serde(default)]
    pub options: DetectorOptions,
}

fn default_detector_addr() -> String {
    "127.0.0.1:9040".to_string()
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            addr: default_detector_addr(),
            options: DetectorOptions::default(),
        }
    }
}

/// 再構成・描画の設定サーフェス
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RenderOptions {
    #[serde(default = "default_true")]
    pub render_face: bool,
    /// 顔メッシュを鼻の深度で胴体に追従させる
    #[serde(default = "default_true")]
    pub connect_face: bool,
    /// 顔メッシュのスムーズシェーディング（法線を毎フレーム再計算）
    #[serde(default)]
    pub smooth_face: bool,
    #[serde(default = "default_true")]
    pub render_bones: bool,
    #[serde(default = "default_true")]
    pub render_joints: bool,
    #[serde(default = "default_true")]
    pub render_hands: bool,
    /// 胴体・手のひらの面パッチ
    #[serde(default = "default_true")]
    pub render_surface: bool,
    /// 手を手首の深度でポーズ骨格に追従させる
    #[serde(default = "default_true")]
    pub connect_hands: bool,
    /// 顔・手と重複するポーズランドマークを除去
    #[serde(default = "default_true")]
    pub delete_duplicates: bool,
    /// true: ボーンクラスごとの固定半径 / false: 長さ比例半径
    #[serde(default = "default_true")]
    pub fixed_radius: bool,
    /// 平滑化係数 0.0=無効（即時反映）〜1.0=固定
    #[serde(default)]
    pub lerp_amount: f32,
    #[serde(default = "default_scale_one")]
    pub scale_x: f32,
    #[serde(default = "default_scale_one")]
    pub scale_y: f32,
    #[serde(default = "default_scale_z")]
    pub scale_z: f32,
}

fn default_true() -> bool {
    true
}
fn default_scale_one() -> f32 {
    1.0
}
fn default_scale_z() -> f32 {
    0.35
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            render_face: true,
            connect_face: true,
            smooth_face: false,
            render_bones: true,
            render_joints: true,
            render_hands: true,
            render_surface: true,
            connect_hands: true,
            delete_duplicates: true,
            fixed_radius: true,
            lerp_amount: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            scale_z: default_scale_z(),
        }
    }
}

/// RenderOptionsの部分更新。Someのフィールドのみマージされる
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RenderOptionsPatch {
    pub render_face: Option<bool>,
    pub connect_face: Option<bool>,
    pub smooth_face: Option<bool>,
    pub render_bones: Option<bool>,
    pub render_joints: Option<bool>,
    pub render_hands: Option<bool>,
    pub render_surface: Option<bool>,
    pub connect_hands: Option<bool>,
    pub delete_duplicates: Option<bool>,
    pub fixed_radius: Option<bool>,
    pub lerp_amount: Option<f32>,
    pub scale_x: Option<f32>,
    pub scale_y: Option<f32>,
    pub scale_z: Option<f32>,
}

impl RenderOptionsPatch {
    pub fn apply(&self, options: &mut RenderOptions) {
        if let Some(v) = self.render_face {
            options.render_face = v;
        }
        if let Some(v) = self.connect_face {
            options.connect_face = v;
        }
        if let Some(v) = self.smooth_face {
            options.smooth_face = v;
        }
        if let Some(v) = self.render_bones {
            options.render_bones = v;
        }
        if let Some(v) = self.render_joints {
            options.render_joints = v;
        }
        if let Some(v) = self.render_hands {
            options.render_hands = v;
        }
        if let Some(v) = self.render_surface {
            options.render_surface = v;
        }
        if let Some(v) = self.connect_hands {
            options.connect_hands = v;
        }
        if let Some(v) = self.delete_duplicates {
            options.delete_duplicates = v;
        }
        if let Some(v) = self.fixed_radius {
            options.fixed_radius = v;
        }
        if let Some(v) = self.lerp_amount {
            options.lerp_amount = v.clamp(0.0, 1.0);
        }
        if let Some(v) = self.scale_x {
            options.scale_x = v;
        }
        if let Some(v) = self.scale_y {
            options.scale_y = v;
        }
        if let Some(v) = self.scale_z {
            options.scale_z = v;
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// 設定ファイルがなければデフォルトを返す
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(_) => Config::default(),
        }
    }
}
