use std::collections::HashMap;
use std::fmt;

use super::primitive::{Mesh, MeshId, Primitive};

/// ジオメトリの親グループ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Pose,
    HandLeft,
    HandRight,
    Face,
    Neck,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::Pose => write!(f, "pose"),
            Group::HandLeft => write!(f, "hand-left"),
            Group::HandRight => write!(f, "hand-right"),
            Group::Face => write!(f, "face"),
            Group::Neck => write!(f, "neck"),
        }
    }
}

/// グループ内の機能記述子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// グループ原点（平行移動オフセットの平滑化キー）
    Root,
    /// ボーン（接続テーブルのインデックス）
    Bone(u16),
    /// ボーン端点の関節球
    Joint { bone: u16, vertex: u16 },
    /// 胴体リボン
    Torso,
    /// 手のひらリボン
    Palm,
    /// 顔の変形メッシュ
    Mask,
}

/// 構造化ジオメトリキー
///
/// 文字列連結キーの代わりに (グループ, 機能) のタプルで識別する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryKey {
    pub group: Group,
    pub feature: Feature,
}

impl GeometryKey {
    pub fn bone(group: Group, index: u16) -> Self {
        Self {
            group,
            feature: Feature::Bone(index),
        }
    }

    pub fn joint(group: Group, bone: u16, vertex: u16) -> Self {
        Self {
            group,
            feature: Feature::Joint { bone, vertex },
        }
    }

    pub fn root(group: Group) -> Self {
        Self {
            group,
            feature: Feature::Root,
        }
    }
}

impl fmt::Display for GeometryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.feature {
            Feature::Root => write!(f, "{}-root", self.group),
            Feature::Bone(i) => write!(f, "{}-bone-{}", self.group, i),
            Feature::Joint { bone, vertex } => {
                write!(f, "{}-joint-{}-{}", self.group, bone, vertex)
            }
            Feature::Torso => write!(f, "{}-torso", self.group),
            Feature::Palm => write!(f, "{}-palm", self.group),
            Feature::Mask => write!(f, "{}-mask", self.group),
        }
    }
}

/// エントリの生存状態
///
/// マップに存在しない = 未生成。破棄済みは明示的にタグ付けされ、
/// get_or_createでは未生成と同じ扱い（ハンドルは再利用しない）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Live(MeshId),
    Disposed,
}

/// キー付きジオメトリストア
///
/// 生成は一度だけ、以降はインプレース更新。破棄はトポロジ変更か
/// シーン破棄時のみ。単一のフレーム処理フローからのみ変更される。
pub struct GeometryCache {
    entries: HashMap<GeometryKey, EntryState>,
    meshes: HashMap<MeshId, Mesh>,
    group_offsets: HashMap<Group, [f32; 3]>,
    next_id: u64,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            meshes: HashMap::new(),
            group_offsets: HashMap::new(),
            next_id: 0,
        }
    }

    fn allocate(&mut self, key: GeometryKey, primitive: Primitive) -> MeshId {
        let id = MeshId(self.next_id);
        self.next_id += 1;
        self.meshes.insert(id, Mesh::new(id, primitive));
        self.entries.insert(key, EntryState::Live(id));
        id
    }

    /// 既存のライブハンドルを返すか、なければfactoryで生成する。
    /// 破棄済みエントリは未生成と同じ扱いで、新しいハンドルが割り当てられる。
    pub fn get_or_create<F>(&mut self, key: GeometryKey, factory: F) -> MeshId
    where
        F: FnOnce() -> Primitive,
    {
        if let Some(EntryState::Live(id)) = self.entries.get(&key) {
            return *id;
        }
        self.allocate(key, factory())
    }

    /// ライブハンドルを返す（未生成・破棄済みはNone）
    pub fn handle(&self, key: &GeometryKey) -> Option<MeshId> {
        match self.entries.get(key) {
            Some(EntryState::Live(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn state(&self, key: &GeometryKey) -> Option<EntryState> {
        self.entries.get(key).copied()
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(&id)
    }

    fn live_mesh_mut(&mut self, key: &GeometryKey) -> Option<&mut Mesh> {
        match self.entries.get(key) {
            Some(EntryState::Live(id)) => self.meshes.get_mut(id),
            // 破棄済み・未生成への更新はサイレントにスキップ
            _ => None,
        }
    }

    /// ボーンを関節球ごと一括生成する。チューブのハンドルを返す。
    ///
    /// ボーンは必ず関節付きで追跡される（関節が非表示でもエントリは作る）。
    pub fn create_bone(
        &mut self,
        group: Group,
        bone: u16,
        path: &[[f32; 3]],
        radius: f32,
    ) -> MeshId {
        let tube_id = self.get_or_create(GeometryKey::bone(group, bone), || Primitive::Tube {
            path: path.to_vec(),
            radius,
        });
        for (vertex, point) in path.iter().enumerate() {
            // 関節はボーンよりわずかに大きい
            self.get_or_create(GeometryKey::joint(group, bone, vertex as u16), || {
                Primitive::Sphere {
                    center: *point,
                    diameter: 2.2 * radius,
                }
            });
        }
        tube_id
    }

    /// チューブの頂点列を更新（半径は維持）。破棄済み・未生成ならfalse
    pub fn write_tube_path(&mut self, key: &GeometryKey, new_path: &[[f32; 3]]) -> bool {
        match self.live_mesh_mut(key) {
            Some(mesh) => {
                if let Primitive::Tube { ref mut path, .. } = mesh.primitive {
                    path.clear();
                    path.extend_from_slice(new_path);
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    /// チューブの半径だけを更新（頂点列は維持）
    pub fn set_tube_radius(&mut self, key: &GeometryKey, radius: f32) -> bool {
        match self.live_mesh_mut(key) {
            Some(mesh) => {
                if let Primitive::Tube {
                    radius: ref mut r, ..
                } = mesh.primitive
                {
                    *r = radius;
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    /// 球の中心を更新
    pub fn write_sphere_center(&mut self, key: &GeometryKey, center: [f32; 3]) -> bool {
        match self.live_mesh_mut(key) {
            Some(mesh) => {
                if let Primitive::Sphere { center: ref mut c, .. } = mesh.primitive {
                    *c = center;
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    /// 変形メッシュの頂点バッファを更新。長さ不一致は不正データとしてfalse
    ///
    /// バッファは生成時に確保済みで、ここでは再割り当てしない（ホットパス）。
    pub fn write_trimesh_positions(&mut self, key: &GeometryKey, new_positions: &[f32]) -> bool {
        match self.live_mesh_mut(key) {
            Some(mesh) => {
                if let Primitive::TriMesh {
                    ref mut positions, ..
                } = mesh.primitive
                {
                    if positions.len() != new_positions.len() {
                        return false;
                    }
                    positions.copy_from_slice(new_positions);
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    /// 変形メッシュの法線を差し替える（Noneでフラットシェーディング）
    pub fn set_trimesh_normals(&mut self, key: &GeometryKey, new_normals: Option<Vec<f32>>) -> bool {
        match self.live_mesh_mut(key) {
            Some(mesh) => {
                if let Primitive::TriMesh {
                    ref mut normals, ..
                } = mesh.primitive
                {
                    *normals = new_normals;
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    /// リボンのレールを更新
    pub fn write_ribbon(&mut self, key: &GeometryKey, new_rails: &[Vec<[f32; 3]>]) -> bool {
        match self.live_mesh_mut(key) {
            Some(mesh) => {
                if let Primitive::Ribbon { ref mut rails } = mesh.primitive {
                    rails.clear();
                    rails.extend_from_slice(new_rails);
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    pub fn set_visibility(&mut self, key: &GeometryKey, visibility: f32) -> bool {
        match self.live_mesh_mut(key) {
            Some(mesh) => {
                mesh.visibility = visibility;
                true
            }
            None => false,
        }
    }

    pub fn set_enabled(&mut self, key: &GeometryKey, enabled: bool) -> bool {
        match self.live_mesh_mut(key) {
            Some(mesh) => {
                mesh.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// グループの平行移動オフセット（親トランスフォーム相当）
    pub fn set_group_offset(&mut self, group: Group, offset: [f32; 3]) {
        self.group_offsets.insert(group, offset);
    }

    pub fn group_offset(&self, group: Group) -> [f32; 3] {
        self.group_offsets.get(&group).copied().unwrap_or([0.0; 3])
    }

    /// 単一エントリを破棄。プリミティブは解放され、キーはDisposedタグが残る
    pub fn dispose(&mut self, key: &GeometryKey) {
        if let Some(state) = self.entries.get_mut(key) {
            if let EntryState::Live(id) = *state {
                self.meshes.remove(&id);
            }
            *state = EntryState::Disposed;
        }
    }

    /// グループ配下をすべて破棄
    pub fn dispose_group(&mut self, group: Group) {
        let keys: Vec<GeometryKey> = self
            .entries
            .keys()
            .filter(|key| key.group == group)
            .copied()
            .collect();
        for key in keys {
            self.dispose(&key);
        }
        self.group_offsets.remove(&group);
    }

    /// シーン破棄（ソース切替時）。全エントリをDisposedにする
    pub fn dispose_all(&mut self) {
        for state in self.entries.values_mut() {
            *state = EntryState::Disposed;
        }
        self.meshes.clear();
        self.group_offsets.clear();
    }

    pub fn live_count(&self) -> usize {
        self.meshes.len()
    }

    /// 表示中のメッシュをレンダラ向けに列挙（グループオフセット込み）
    pub fn iter_shown(&self) -> impl Iterator<Item = (&GeometryKey, &Mesh, [f32; 3])> {
        self.entries.iter().filter_map(move |(key, state)| {
            let id = match state {
                EntryState::Live(id) => id,
                EntryState::Disposed => return None,
            };
            let mesh = self.meshes.get(id)?;
            if !mesh.is_shown() {
                return None;
            }
            Some((key, mesh, self.group_offset(key.group)))
        })
    }
}

impl Default for GeometryCache {
    fn default() -> Self {
        Self::new()
    }
}
