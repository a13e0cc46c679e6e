use std::fmt;
use std::sync::Arc;

/// メッシュハンドル。生成ごとに単調増加し、破棄後に再利用されない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u64);

impl fmt::Display for MeshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mesh#{}", self.0)
    }
}

/// CPU側のレンダリングプリミティブ
///
/// 3Dエンジン境界はこのデータを読むだけで、寿命管理はGeometryCacheが持つ。
#[derive(Debug, Clone)]
pub enum Primitive {
    /// ボーン（チューブ）。pathの頂点列に沿った一定半径の管
    Tube { path: Vec<[f32; 3]>, radius: f32 },
    /// 関節（球）。直径はボーンよりわずかに大きくスケールされる
    Sphere { center: [f32; 3], diameter: f32 },
    /// 面パッチ（リボン）。2本以上のレール頂点列を張る
    Ribbon { rails: Vec<Vec<[f32; 3]>> },
    /// 変形メッシュ。トポロジ（indices/uvs）は不変、positionsのみ毎フレーム更新
    TriMesh {
        positions: Vec<f32>,
        normals: Option<Vec<f32>>,
        indices: Arc<Vec<u32>>,
        uvs: Arc<Vec<f32>>,
    },
}

/// キャッシュが保持する1エントリ分のレンダラブル
#[derive(Debug, Clone)]
pub struct Mesh {
    pub id: MeshId,
    pub primitive: Primitive,
    /// 0.0=非表示〜1.0=完全表示
    pub visibility: f32,
    /// 機能トグルで無効化された場合false（visibilityとは独立）
    pub enabled: bool,
}

impl Mesh {
    pub fn new(id: MeshId, primitive: Primitive) -> Self {
        Self {
            id,
            primitive,
            visibility: 0.0,
            enabled: true,
        }
    }

    pub fn is_shown(&self) -> bool {
        self.enabled && self.visibility > 0.0
    }
}

/// 2点間距離
pub fn distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// 成分ごとの線形補間
pub fn lerp3(a: &[f32; 3], b: &[f32; 3], t: f32) -> [f32; 3] {
    [
        (1.0 - t) * a[0] + t * b[0],
        (1.0 - t) * a[1] + t * b[1],
        (1.0 - t) * a[2] + t * b[2],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = [0.0, 0.0, 0.0];
        let b = [3.0, 4.0, 0.0];
        assert!((distance(&a, &b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_lerp3_endpoints() {
        let a = [0.0, 1.0, 2.0];
        let b = [10.0, 11.0, 12.0];
        assert_eq!(lerp3(&a, &b, 0.0), a);
        assert_eq!(lerp3(&a, &b, 1.0), b);
        assert_eq!(lerp3(&a, &b, 0.5), [5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_mesh_is_shown() {
        let mut mesh = Mesh::new(
            MeshId(1),
            Primitive::Sphere {
                center: [0.0; 3],
                diameter: 1.0,
            },
        );
        assert!(!mesh.is_shown()); // visibility 0
        mesh.visibility = 1.0;
        assert!(mesh.is_shown());
        mesh.enabled = false;
        assert!(!mesh.is_shown());
    }
}
