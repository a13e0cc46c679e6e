//! フレーム処理のオーケストレーション
//!
//! 検出結果の受信 → 骨格・顔の再構成 → 平滑化 → ジオメトリ反映までの
//! パイプラインを1箇所で直列に回す。ジオメトリへの変更はすべて
//! このモジュール経由で行われ、並行変更は存在しない。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::camera::FrameSource;
use crate::config::{RenderOptions, RenderOptionsPatch};
use crate::detector::HolisticDetector;
use crate::geometry::{Feature, GeometryCache, GeometryKey, Group, Primitive};
use crate::landmark::{strip_duplicates, HolisticResult};
use crate::rig::{FaceReconstructor, FaceTopology, SkeletonReconstructor, SkeletonUpdate, TemporalSmoother};

/// パイプラインの現在位置（観測用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    /// フレーム送信済み、検出結果待ち
    AwaitingDetection,
    /// 結果を再構成済み、次のレンダーティック待ち
    SmoothAndDraw,
}

/// ボーン描画を持つグループ（固定半径切替時の一括破棄対象）
const SKELETON_GROUPS: [Group; 4] = [
    Group::Pose,
    Group::HandLeft,
    Group::HandRight,
    Group::Neck,
];

/// アバター1体分の再構成状態
///
/// 検出結果を受けてジオメトリキャッシュを更新する唯一の経路。
/// on_results が目標値を積み、render_tick が平滑化して反映する。
pub struct AvatarContext {
    options: RenderOptions,
    cache: GeometryCache,
    smoother: TemporalSmoother,
    skeleton: SkeletonReconstructor,
    face: FaceReconstructor,
    phase: FramePhase,
}

impl AvatarContext {
    pub fn new(options: RenderOptions, topology: FaceTopology) -> Self {
        let smoother = TemporalSmoother::new(options.lerp_amount);
        let skeleton = SkeletonReconstructor::new(options.clone());
        Self {
            options,
            cache: GeometryCache::new(),
            smoother,
            skeleton,
            face: FaceReconstructor::new(topology),
            phase: FramePhase::Idle,
        }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn cache(&self) -> &GeometryCache {
        &self.cache
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn smoothing_factor(&self) -> f32 {
        self.smoother.factor()
    }

    /// 実行中のオプション変更
    ///
    /// ほとんどのフラグは次フレームから効くだけだが、半径ポリシーの
    /// 切替はチューブのトポロジ変更なので骨格グループを破棄して
    /// 次フレームで再生成させる。
    pub fn set_options(&mut self, patch: &RenderOptionsPatch) {
        let before = self.options.clone();
        patch.apply(&mut self.options);
        self.smoother.set_factor(self.options.lerp_amount);
        if before.fixed_radius != self.options.fixed_radius {
            for group in SKELETON_GROUPS {
                self.cache.dispose_group(group);
            }
            // 破棄したキーの補間履歴ごとリセット
            self.smoother.clear();
        }
        self.skeleton.set_options(self.options.clone());
    }

    /// 検出結果1件を再構成してジオメトリ目標値に変換する
    pub fn on_results(&mut self, results: &HolisticResult) {
        // delete_duplicatesはボーン描画だけを間引く。首と手首・顔の
        // 奥行きオフセットは除去前のポーズから取る
        let stripped = if self.options.delete_duplicates {
            results.pose.as_ref().map(|pose| {
                let mut pose = pose.clone();
                strip_duplicates(&mut pose);
                pose
            })
        } else {
            None
        };
        let bone_pose = stripped.as_ref().or(results.pose.as_ref());
        let update = self.skeleton.reconstruct(
            bone_pose,
            results.pose.as_ref(),
            results.left_hand.as_ref(),
            results.right_hand.as_ref(),
        );
        self.apply_skeleton(&update);
        self.face
            .reconstruct(results.face.as_deref(), &self.options, &mut self.cache);
        self.phase = FramePhase::SmoothAndDraw;
    }

    fn apply_skeleton(&mut self, update: &SkeletonUpdate) {
        for bone in &update.bones {
            let Feature::Bone(index) = bone.key.feature else {
                continue;
            };
            match bone.path {
                Some(path) => {
                    // 初回（または破棄後の最初のフレーム）はここで生成される
                    self.cache
                        .create_bone(bone.key.group, index, &path, bone.radius);
                    self.cache.set_tube_radius(&bone.key, bone.radius);
                    self.smoother.request_path(bone.key, path.to_vec());
                    self.cache.set_visibility(&bone.key, bone.visibility);
                    for (vertex, point) in path.iter().enumerate() {
                        let joint = GeometryKey::joint(bone.key.group, index, vertex as u16);
                        self.smoother.request_position(joint, *point);
                        self.cache.set_visibility(&joint, bone.visibility);
                        self.cache.set_enabled(&joint, self.options.render_joints);
                    }
                }
                None => {
                    // 隠すだけ。未生成ならすべてサイレントに無視される
                    self.cache.set_visibility(&bone.key, 0.0);
                    for vertex in 0..2u16 {
                        let joint = GeometryKey::joint(bone.key.group, index, vertex);
                        self.cache.set_visibility(&joint, 0.0);
                    }
                }
            }
        }

        for ribbon in &update.ribbons {
            match &ribbon.rails {
                Some(rails) => {
                    self.cache.get_or_create(ribbon.key, || Primitive::Ribbon {
                        rails: rails.clone(),
                    });
                    self.cache.write_ribbon(&ribbon.key, rails);
                    self.cache.set_visibility(&ribbon.key, ribbon.visibility);
                    self.cache
                        .set_enabled(&ribbon.key, self.options.render_surface);
                }
                None => {
                    self.cache.set_visibility(&ribbon.key, 0.0);
                }
            }
        }

        for offset in &update.offsets {
            // オフセットもボーンと同じ補間を通す
            self.smoother
                .request_position(GeometryKey::root(offset.group), offset.offset);
        }
    }

    /// 平滑化を1ステップ進めて committed 値をキャッシュへ書き戻す
    pub fn render_tick(&mut self) {
        self.smoother.advance();
        let Self {
            smoother, cache, ..
        } = self;
        for (key, path) in smoother.iter_paths() {
            cache.write_tube_path(key, path);
        }
        for (key, position) in smoother.iter_positions() {
            match key.feature {
                Feature::Root => cache.set_group_offset(key.group, *position),
                Feature::Joint { .. } => {
                    cache.write_sphere_center(key, *position);
                }
                _ => {}
            }
        }
        self.phase = FramePhase::Idle;
    }

    /// シーン破棄（ソース切替時）。以後届く旧ソースの結果は
    /// 破棄済みハンドルへの更新として無害化される
    pub fn dispose_scene(&mut self) {
        self.cache.dispose_all();
        self.smoother.clear();
        self.phase = FramePhase::Idle;
    }

    fn begin_await(&mut self) {
        self.phase = FramePhase::AwaitingDetection;
    }
}

/// 協調キャンセル用トークン
#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// メインループ
///
/// 検出リクエストは常に1件だけ飛ばす（前の結果が届くまで次を送らない）。
/// 単一チャネルなので結果の順序は保証され、レンダーティックは
/// 結果の有無にかかわらず毎周回す。observer は周回ごとに呼ばれる。
pub fn run_loop<S, D, F>(
    source: &mut S,
    detector: &mut D,
    ctx: &mut AvatarContext,
    target_fps: u32,
    cancel: &CancelToken,
    mut observer: F,
) -> Result<()>
where
    S: FrameSource,
    D: HolisticDetector,
    F: FnMut(&AvatarContext, Option<&HolisticResult>) -> Result<()>,
{
    let frame_interval = Duration::from_secs_f64(1.0 / target_fps.max(1) as f64);
    let mut in_flight = false;
    let mut last_result: Option<HolisticResult> = None;
    let mut fps_counter: u32 = 0;
    let mut fps_timer = Instant::now();

    while !cancel.is_cancelled() {
        let tick_start = Instant::now();

        if in_flight {
            if let Some(result) = detector.try_result() {
                ctx.on_results(&result);
                last_result = Some(result);
                in_flight = false;
                fps_counter += 1;
            }
        }

        // 寸法が立っていない・一時停止中のソースからは送らない
        if !in_flight && source.ready() {
            if let Some(frame) = source.poll_frame()? {
                detector.send(&frame)?;
                ctx.begin_await();
                in_flight = true;
            }
        }

        ctx.render_tick();
        observer(ctx, last_result.as_ref())?;

        if fps_timer.elapsed() >= Duration::from_secs(1) {
            println!(
                "[avatar] {} results/s, {} live meshes",
                fps_counter,
                ctx.cache().live_count()
            );
            fps_counter = 0;
            fps_timer = Instant::now();
        }

        let elapsed = tick_start.elapsed();
        if elapsed < frame_interval {
            thread::sleep(frame_interval - elapsed);
        }
    }
    Ok(())
}
