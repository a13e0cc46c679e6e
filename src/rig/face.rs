use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::config::RenderOptions;
use crate::geometry::{Feature, GeometryCache, GeometryKey, Group, Primitive};
use crate::landmark::{Landmark, FACE_LANDMARK_COUNT};

/// 顔メッシュの固定トポロジ（三角形インデックスとUV）
///
/// 検出器付属の三角分割テーブルを外部アセットとして一度だけ読み込む。
/// 頂点位置だけが毎フレーム変わり、トポロジは不変。
#[derive(Debug, Clone)]
pub struct FaceTopology {
    indices: Arc<Vec<u32>>,
    uvs: Arc<Vec<f32>>,
}

#[derive(Deserialize)]
struct RawTopology {
    indices: Vec<u32>,
    uvs: Vec<f32>,
}

impl FaceTopology {
    pub fn new(indices: Vec<u32>, uvs: Vec<f32>) -> Result<Self> {
        if indices.is_empty() || indices.len() % 3 != 0 {
            bail!("triangle index count {} is not a multiple of 3", indices.len());
        }
        if let Some(&max) = indices.iter().max() {
            if max as usize >= FACE_LANDMARK_COUNT {
                bail!("triangle index {} exceeds vertex count {}", max, FACE_LANDMARK_COUNT);
            }
        }
        if uvs.len() != 2 * FACE_LANDMARK_COUNT {
            bail!("uv count {} != {}", uvs.len(), 2 * FACE_LANDMARK_COUNT);
        }
        Ok(Self {
            indices: Arc::new(indices),
            uvs: Arc::new(uvs),
        })
    }

    /// JSONアセット（{"indices": [...], "uvs": [...]}）から読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read {}", path.as_ref().display()))?;
        let raw: RawTopology =
            serde_json::from_str(&content).context("failed to parse face topology")?;
        Self::new(raw.indices, raw.uvs)
    }

    pub fn indices(&self) -> &Arc<Vec<u32>> {
        &self.indices
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// 面積重み付きの頂点法線を計算する
///
/// スムーズシェーディング有効時に毎フレーム呼ばれる。全頂点を
/// ゼロから再計算するため重く、負荷が問題になればキャッシュや
/// 間引きの候補になる。
pub fn compute_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let mut normals = vec![0.0f32; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let (i0, i1, i2) = (
            triangle[0] as usize * 3,
            triangle[1] as usize * 3,
            triangle[2] as usize * 3,
        );
        let a = [positions[i0], positions[i0 + 1], positions[i0 + 2]];
        let b = [positions[i1], positions[i1 + 1], positions[i1 + 2]];
        let c = [positions[i2], positions[i2 + 1], positions[i2 + 2]];
        let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        // 外積の長さが面積重みになる
        let cross = [
            ab[1] * ac[2] - ab[2] * ac[1],
            ab[2] * ac[0] - ab[0] * ac[2],
            ab[0] * ac[1] - ab[1] * ac[0],
        ];
        for &base in [i0, i1, i2].iter() {
            normals[base] += cross[0];
            normals[base + 1] += cross[1];
            normals[base + 2] += cross[2];
        }
    }
    for normal in normals.chunks_exact_mut(3) {
        let len = (normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2]).sqrt();
        if len > 0.0 {
            normal[0] /= len;
            normal[1] /= len;
            normal[2] /= len;
        }
    }
    normals
}

/// 468点の顔ランドマークを固定トポロジの変形メッシュに書き込む
pub struct FaceReconstructor {
    topology: FaceTopology,
    /// 前フレームのスムーズシェーディング設定。変化したらメッシュを作り直す
    previous_smooth: bool,
    /// 事前確保した頂点バッファ（3 floats/頂点、ホットパスで再割り当てしない）
    positions: Vec<f32>,
}

impl FaceReconstructor {
    pub fn new(topology: FaceTopology) -> Self {
        Self {
            topology,
            previous_smooth: false,
            positions: vec![0.0; 3 * FACE_LANDMARK_COUNT],
        }
    }

    pub fn mask_key() -> GeometryKey {
        GeometryKey {
            group: Group::Face,
            feature: Feature::Mask,
        }
    }

    /// 1フレーム分の顔メッシュ更新
    ///
    /// 468点未満・欠損は既存メッシュを隠すだけで破棄しない。
    /// smooth_faceの切替は法線バッファの有無がメッシュ生成時に
    /// 固定されるため、既存メッシュを破棄して次の有効フレームで
    /// 遅延再生成する。
    pub fn reconstruct(
        &mut self,
        face: Option<&[Landmark]>,
        options: &RenderOptions,
        cache: &mut GeometryCache,
    ) {
        let key = Self::mask_key();

        let landmarks = match face {
            Some(landmarks) if landmarks.len() >= FACE_LANDMARK_COUNT && options.render_face => {
                landmarks
            }
            // 部分的な顔は固定三角分割に安全に張れないので欠損と同じ扱い
            _ => {
                cache.set_visibility(&key, 0.0);
                return;
            }
        };

        if self.previous_smooth != options.smooth_face {
            cache.dispose(&key);
            self.previous_smooth = options.smooth_face;
        }

        for (i, landmark) in landmarks.iter().take(FACE_LANDMARK_COUNT).enumerate() {
            self.positions[3 * i] = landmark.x * options.scale_x;
            self.positions[3 * i + 1] = (1.0 - landmark.y) * options.scale_y;
            self.positions[3 * i + 2] = landmark.z * options.scale_z;
        }

        let positions = &self.positions;
        let topology = &self.topology;
        let smooth = options.smooth_face;
        cache.get_or_create(key, || Primitive::TriMesh {
            positions: positions.clone(),
            normals: if smooth {
                Some(compute_normals(positions, &topology.indices))
            } else {
                None
            },
            indices: topology.indices.clone(),
            uvs: topology.uvs.clone(),
        });

        cache.write_trimesh_positions(&key, &self.positions);
        if options.smooth_face {
            cache.set_trimesh_normals(
                &key,
                Some(compute_normals(&self.positions, &self.topology.indices)),
            );
        } else {
            // フラットシェーディング: 法線を明示的にクリア
            cache.set_trimesh_normals(&key, None);
        }
        cache.set_visibility(&key, 1.0);
        cache.set_enabled(&key, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> FaceTopology {
        // 最小の有効トポロジ（1三角形）
        FaceTopology::new(vec![0, 1, 2], vec![0.0; 2 * FACE_LANDMARK_COUNT]).unwrap()
    }

    fn full_face() -> Vec<Landmark> {
        (0..FACE_LANDMARK_COUNT)
            .map(|i| Landmark::new(i as f32 / 468.0, 0.5, 0.1))
            .collect()
    }

    #[test]
    fn test_topology_validation() {
        assert!(FaceTopology::new(vec![], vec![0.0; 936]).is_err());
        assert!(FaceTopology::new(vec![0, 1], vec![0.0; 936]).is_err());
        assert!(FaceTopology::new(vec![0, 1, 468], vec![0.0; 936]).is_err());
        assert!(FaceTopology::new(vec![0, 1, 2], vec![0.0; 10]).is_err());
        assert!(FaceTopology::new(vec![0, 1, 2], vec![0.0; 936]).is_ok());
    }

    #[test]
    fn test_short_face_hides_without_panic() {
        let mut reconstructor = FaceReconstructor::new(topology());
        let mut cache = GeometryCache::new();
        let options = RenderOptions::default();

        // まず有効フレームで生成
        let face = full_face();
        reconstructor.reconstruct(Some(&face), &options, &mut cache);
        let key = FaceReconstructor::mask_key();
        let id = cache.handle(&key).unwrap();
        assert_eq!(cache.mesh(id).unwrap().visibility, 1.0);

        // 短い顔セット: 隠れるだけで破棄されない
        let short: Vec<Landmark> = face[..100].to_vec();
        reconstructor.reconstruct(Some(&short), &options, &mut cache);
        assert_eq!(cache.handle(&key), Some(id));
        assert_eq!(cache.mesh(id).unwrap().visibility, 0.0);

        // 欠損も同様
        reconstructor.reconstruct(None, &options, &mut cache);
        assert_eq!(cache.handle(&key), Some(id));
        assert_eq!(cache.mesh(id).unwrap().visibility, 0.0);
    }

    #[test]
    fn test_absent_face_before_creation_is_noop() {
        let mut reconstructor = FaceReconstructor::new(topology());
        let mut cache = GeometryCache::new();
        reconstructor.reconstruct(None, &RenderOptions::default(), &mut cache);
        assert_eq!(cache.live_count(), 0);
    }

    #[test]
    fn test_positions_inverted_and_scaled() {
        let mut reconstructor = FaceReconstructor::new(topology());
        let mut cache = GeometryCache::new();
        let mut options = RenderOptions::default();
        options.scale_x = 2.0;
        options.scale_z = 0.5;

        let mut face = full_face();
        face[0] = Landmark::new(0.25, 0.75, 0.4);
        reconstructor.reconstruct(Some(&face), &options, &mut cache);

        let id = cache.handle(&FaceReconstructor::mask_key()).unwrap();
        match &cache.mesh(id).unwrap().primitive {
            Primitive::TriMesh { positions, .. } => {
                assert!((positions[0] - 0.5).abs() < 1e-6); // x * 2.0
                assert!((positions[1] - 0.25).abs() < 1e-6); // 1 - y
                assert!((positions[2] - 0.2).abs() < 1e-6); // z * 0.5
            }
            other => panic!("unexpected primitive {:?}", other),
        }
    }

    #[test]
    fn test_smooth_toggle_disposes_and_recreates() {
        let mut reconstructor = FaceReconstructor::new(topology());
        let mut cache = GeometryCache::new();
        let mut options = RenderOptions::default();
        let face = full_face();
        let key = FaceReconstructor::mask_key();

        reconstructor.reconstruct(Some(&face), &options, &mut cache);
        let flat_id = cache.handle(&key).unwrap();
        match &cache.mesh(flat_id).unwrap().primitive {
            Primitive::TriMesh { normals, .. } => assert!(normals.is_none()),
            other => panic!("unexpected primitive {:?}", other),
        }

        options.smooth_face = true;
        reconstructor.reconstruct(Some(&face), &options, &mut cache);
        let smooth_id = cache.handle(&key).unwrap();
        assert_ne!(flat_id, smooth_id, "toggle must force a new mesh");
        match &cache.mesh(smooth_id).unwrap().primitive {
            Primitive::TriMesh { normals, .. } => {
                let normals = normals.as_ref().unwrap();
                assert_eq!(normals.len(), 3 * FACE_LANDMARK_COUNT);
            }
            other => panic!("unexpected primitive {:?}", other),
        }
    }

    #[test]
    fn test_compute_normals_unit_length() {
        // XY平面上の三角形 → 法線は±Z
        let positions = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let normals = compute_normals(&positions, &[0, 1, 2]);
        for vertex in normals.chunks_exact(3) {
            let len = (vertex[0] * vertex[0] + vertex[1] * vertex[1] + vertex[2] * vertex[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-5);
            assert!(vertex[2].abs() > 0.999);
        }
    }

    #[test]
    fn test_compute_normals_degenerate_triangle() {
        // 面積ゼロの三角形でもパニックせずゼロ法線になる
        let positions = vec![0.0; 9];
        let normals = compute_normals(&positions, &[0, 1, 2]);
        assert!(normals.iter().all(|&v| v == 0.0));
    }
}
