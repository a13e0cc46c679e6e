use std::collections::HashMap;

use crate::geometry::{lerp3, GeometryKey};

/// ジッタ抑制のための指数補間ステート
///
/// requested（今フレームの目標値）と committed（最後に描画した値）の
/// 二重マップを持つ。advance() が1レンダーティックにつき一度だけ
/// committed を目標へ進める:
///
///   committed = lerp(committed, requested, 1 - factor)
///
/// factor 0.0 は即時反映（スナップ）、1.0 は固定（退化ケース）。
/// requested は次の要求で上書きされるまで残るため、要求が途絶えた
/// キーも最後の目標値へ収束し続ける（収束済みなら動かない）。
/// キーの削除は GeometryCache の破棄に連動して remove() で行う。
pub struct TemporalSmoother {
    factor: f32,
    positions: HashMap<GeometryKey, [f32; 3]>,
    requested_positions: HashMap<GeometryKey, [f32; 3]>,
    paths: HashMap<GeometryKey, Vec<[f32; 3]>>,
    requested_paths: HashMap<GeometryKey, Vec<[f32; 3]>>,
}

impl TemporalSmoother {
    pub fn new(factor: f32) -> Self {
        Self {
            factor: factor.clamp(0.0, 1.0),
            positions: HashMap::new(),
            requested_positions: HashMap::new(),
            paths: HashMap::new(),
            requested_paths: HashMap::new(),
        }
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// 係数を変更する。値が変わった場合は補間ベースラインをリセットし、
    /// 次のadvanceでrequestedへ直接スナップさせる（蓄積されたlerp履歴が
    /// 不連続ジャンプを生むのを防ぐ明示的なリセット方針）。
    pub fn set_factor(&mut self, factor: f32) {
        let factor = factor.clamp(0.0, 1.0);
        if (factor - self.factor).abs() > f32::EPSILON {
            self.positions.clear();
            self.paths.clear();
        }
        self.factor = factor;
    }

    pub fn request_position(&mut self, key: GeometryKey, position: [f32; 3]) {
        self.requested_positions.insert(key, position);
    }

    pub fn request_path(&mut self, key: GeometryKey, path: Vec<[f32; 3]>) {
        self.requested_paths.insert(key, path);
    }

    /// committedをrequestedへ1ステップ進める。レンダーティックごとに一度だけ呼ぶ
    pub fn advance(&mut self) {
        let t = 1.0 - self.factor;
        for (key, requested) in self.requested_positions.iter() {
            let next = match self.positions.get(key) {
                Some(committed) if self.factor > 0.0 => lerp3(committed, requested, t),
                _ => *requested,
            };
            self.positions.insert(*key, next);
        }
        for (key, requested) in self.requested_paths.iter() {
            let next = match self.paths.get(key) {
                // パストポロジはボーンごとに固定なので長さは常に一致する
                Some(committed) if self.factor > 0.0 && committed.len() == requested.len() => {
                    committed
                        .iter()
                        .zip(requested.iter())
                        .map(|(c, r)| lerp3(c, r, t))
                        .collect()
                }
                _ => requested.clone(),
            };
            self.paths.insert(*key, next);
        }
    }

    pub fn committed_position(&self, key: &GeometryKey) -> Option<[f32; 3]> {
        self.positions.get(key).copied()
    }

    pub fn committed_path(&self, key: &GeometryKey) -> Option<&[[f32; 3]]> {
        self.paths.get(key).map(|path| path.as_slice())
    }

    pub fn iter_positions(&self) -> impl Iterator<Item = (&GeometryKey, &[f32; 3])> {
        self.positions.iter()
    }

    pub fn iter_paths(&self) -> impl Iterator<Item = (&GeometryKey, &Vec<[f32; 3]>)> {
        self.paths.iter()
    }

    /// プリミティブ破棄に連動したキー削除
    pub fn remove(&mut self, key: &GeometryKey) {
        self.positions.remove(key);
        self.requested_positions.remove(key);
        self.paths.remove(key);
        self.requested_paths.remove(key);
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.requested_positions.clear();
        self.paths.clear();
        self.requested_paths.clear();
    }
}
