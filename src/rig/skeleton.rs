use crate::config::RenderOptions;
use crate::geometry::{distance, Feature, GeometryKey, Group};
use crate::landmark::{
    HandLandmarks, Landmark, PoseLandmarkIndex, PoseLandmarks, Side, HAND_CONNECTIONS,
    POSE_CONNECTIONS,
};

/// ポーズボーンの固定直径
pub const POSE_BONE_DIAMETER: f32 = 0.08;
/// 手ボーンの固定直径
pub const HAND_BONE_DIAMETER: f32 = 0.04;
/// 首ラインの固定直径
pub const NECK_DIAMETER: f32 = 0.1;

/// 胴体リボンの表示値
const TORSO_VISIBILITY: f32 = 0.8;
/// 手のひらリボンの表示値
const PALM_VISIBILITY: f32 = 0.4;

/// 長さ比例半径: radius = clamp(k1 * len + k2)
const RADIUS_LENGTH_GAIN: f32 = 0.075;
const RADIUS_BASE: f32 = 0.01;
const RADIUS_MIN: f32 = 0.005;
const RADIUS_MAX: f32 = 0.25;

/// 1ボーン分の更新
///
/// pathがNoneのときは「既存ジオメトリを隠すだけ」の更新で、
/// 新規生成もパス更新も行わない（グループ丸ごと欠損時のゴースト防止）。
#[derive(Debug, Clone)]
pub struct BoneUpdate {
    pub key: GeometryKey,
    pub path: Option<[[f32; 3]; 2]>,
    pub visibility: f32,
    pub radius: f32,
}

/// 面パッチ（胴体・手のひら）の更新
#[derive(Debug, Clone)]
pub struct RibbonUpdate {
    pub key: GeometryKey,
    pub rails: Option<Vec<Vec<[f32; 3]>>>,
    pub visibility: f32,
}

/// グループ根本の平行移動（手・顔の深度接続）
#[derive(Debug, Clone)]
pub struct OffsetUpdate {
    pub group: Group,
    pub offset: [f32; 3],
}

/// 1フレーム分の骨格更新セット
#[derive(Debug, Clone, Default)]
pub struct SkeletonUpdate {
    pub bones: Vec<BoneUpdate>,
    pub ribbons: Vec<RibbonUpdate>,
    pub offsets: Vec<OffsetUpdate>,
}

/// ランドマークセットからボーン・関節・面パッチの更新を計算する
///
/// 状態を持たない純粋な変換。欠損データは例外ではなく
/// visibility 0 への縮退として扱う。
pub struct SkeletonReconstructor {
    options: RenderOptions,
}

impl SkeletonReconstructor {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn set_options(&mut self, options: RenderOptions) {
        self.options = options;
    }

    /// 1フレームのランドマークから骨格更新を再構成する
    ///
    /// poseはボーン描画用で、重複除去フィルタ適用後のセットでよい。
    /// full_poseは除去前のセット。手・顔の深度追従と首ラインは
    /// フィルタで穴になる点（鼻・手首）を参照するためこちらを読む。
    /// 除去を使わない場合は同じセットを両方に渡す。
    pub fn reconstruct(
        &self,
        pose: Option<&PoseLandmarks>,
        full_pose: Option<&PoseLandmarks>,
        left_hand: Option<&HandLandmarks>,
        right_hand: Option<&HandLandmarks>,
    ) -> SkeletonUpdate {
        let mut update = SkeletonUpdate::default();
        self.reconstruct_pose(pose, &mut update);
        self.reconstruct_torso(pose, &mut update);
        self.reconstruct_hand(left_hand, Side::Left, &mut update);
        self.reconstruct_hand(right_hand, Side::Right, &mut update);
        self.reposition_hands(full_pose, &mut update);
        self.reconstruct_neck(full_pose, &mut update);
        update
    }

    fn bone_radius(&self, diameter: f32, path: &[[f32; 3]; 2]) -> f32 {
        if self.options.fixed_radius {
            diameter / 2.0
        } else {
            // 奥行きで見かけの長さが変わるため毎フレーム再計算
            let len = distance(&path[0], &path[1]);
            (RADIUS_LENGTH_GAIN * len + RADIUS_BASE).clamp(RADIUS_MIN, RADIUS_MAX)
        }
    }

    fn reconstruct_pose(&self, pose: Option<&PoseLandmarks>, update: &mut SkeletonUpdate) {
        let Some(pose) = pose else {
            // グループ全体が欠損: 全ボーンを非表示に落とす
            for i in 0..POSE_CONNECTIONS.len() {
                update.bones.push(BoneUpdate {
                    key: GeometryKey::bone(Group::Pose, i as u16),
                    path: None,
                    visibility: 0.0,
                    radius: POSE_BONE_DIAMETER / 2.0,
                });
            }
            return;
        };

        for (i, &(a, b)) in POSE_CONNECTIONS.iter().enumerate() {
            let v0 = pose.get_raw(a as usize);
            let v1 = pose.get_raw(b as usize);
            let path = [render_or_origin(v0), render_or_origin(v1)];
            // 欠損ランドマークはvisibility 0として扱う
            let visibility = match (v0, v1) {
                (Some(v0), Some(v1)) if self.options.render_bones => v0
                    .visibility_or_default()
                    .min(v1.visibility_or_default()),
                _ => 0.0,
            };
            update.bones.push(BoneUpdate {
                key: GeometryKey::bone(Group::Pose, i as u16),
                path: Some(path),
                visibility,
                radius: self.bone_radius(POSE_BONE_DIAMETER, &path),
            });
        }
    }

    fn reconstruct_torso(&self, pose: Option<&PoseLandmarks>, update: &mut SkeletonUpdate) {
        let key = GeometryKey {
            group: Group::Pose,
            feature: Feature::Torso,
        };
        let landmarks = pose.and_then(|pose| {
            Some((
                pose.get(PoseLandmarkIndex::LeftShoulder)?,
                pose.get(PoseLandmarkIndex::LeftHip)?,
                pose.get(PoseLandmarkIndex::RightShoulder)?,
                pose.get(PoseLandmarkIndex::RightHip)?,
            ))
        });
        match landmarks {
            Some((ls, lh, rs, rh)) => {
                let visibility = if self.options.render_bones {
                    TORSO_VISIBILITY
                } else {
                    0.0
                };
                update.ribbons.push(RibbonUpdate {
                    key,
                    rails: Some(vec![
                        vec![ls.to_render(), lh.to_render()],
                        vec![rs.to_render(), rh.to_render()],
                    ]),
                    visibility,
                });
            }
            None => update.ribbons.push(RibbonUpdate {
                key,
                rails: None,
                visibility: 0.0,
            }),
        }
    }

    fn reconstruct_hand(
        &self,
        hand: Option<&HandLandmarks>,
        side: Side,
        update: &mut SkeletonUpdate,
    ) {
        let group = hand_group(side);
        let palm_key = GeometryKey {
            group,
            feature: Feature::Palm,
        };

        let Some(hand) = hand else {
            // 手が隠れたフレーム: 破棄せず非表示に落とす（次フレームで安価に復帰）
            for i in 0..HAND_CONNECTIONS.len() {
                update.bones.push(BoneUpdate {
                    key: GeometryKey::bone(group, i as u16),
                    path: None,
                    visibility: 0.0,
                    radius: HAND_BONE_DIAMETER / 2.0,
                });
            }
            update.ribbons.push(RibbonUpdate {
                key: palm_key,
                rails: None,
                visibility: 0.0,
            });
            return;
        };

        let visibility = if self.options.render_hands { 1.0 } else { 0.0 };
        for (i, &(a, b)) in HAND_CONNECTIONS.iter().enumerate() {
            let path = [
                render_or_origin(hand.get(a as usize)),
                render_or_origin(hand.get(b as usize)),
            ];
            update.bones.push(BoneUpdate {
                key: GeometryKey::bone(group, i as u16),
                path: Some(path),
                visibility,
                radius: self.bone_radius(HAND_BONE_DIAMETER, &path),
            });
        }

        // 手のひら三角形: 手首(0)、人差し指根本(5)、小指根本(17)
        let palm = (hand.get(0), hand.get(5), hand.get(17));
        match palm {
            (Some(wrist), Some(index), Some(pinky)) => {
                let palm_visibility = if self.options.render_hands {
                    PALM_VISIBILITY
                } else {
                    0.0
                };
                update.ribbons.push(RibbonUpdate {
                    key: palm_key,
                    rails: Some(vec![
                        vec![wrist.to_render(), index.to_render()],
                        vec![wrist.to_render(), pinky.to_render()],
                    ]),
                    visibility: palm_visibility,
                });
            }
            _ => update.ribbons.push(RibbonUpdate {
                key: palm_key,
                rails: None,
                visibility: 0.0,
            }),
        }
    }

    /// 手グループをポーズ手首の深度に追従させる。無効時は原点に戻す
    fn reposition_hands(&self, pose: Option<&PoseLandmarks>, update: &mut SkeletonUpdate) {
        for (side, wrist_index) in [
            (Side::Left, PoseLandmarkIndex::LeftWrist),
            (Side::Right, PoseLandmarkIndex::RightWrist),
        ] {
            let z = if self.options.connect_hands {
                pose.and_then(|pose| pose.get(wrist_index))
                    .map(|wrist| wrist.z)
                    .unwrap_or(0.0)
            } else {
                0.0
            };
            update.offsets.push(OffsetUpdate {
                group: hand_group(side),
                offset: [0.0, 0.0, z],
            });
        }
    }

    /// 首ライン（鼻〜肩中点）と顔グループの深度オフセット
    fn reconstruct_neck(&self, pose: Option<&PoseLandmarks>, update: &mut SkeletonUpdate) {
        let key = GeometryKey::bone(Group::Neck, 0);
        let landmarks = pose.and_then(|pose| {
            Some((
                pose.get(PoseLandmarkIndex::Nose)?,
                pose.get(PoseLandmarkIndex::LeftShoulder)?,
                pose.get(PoseLandmarkIndex::RightShoulder)?,
            ))
        });
        let Some((nose, left_shoulder, right_shoulder)) = landmarks else {
            update.bones.push(BoneUpdate {
                key,
                path: None,
                visibility: 0.0,
                radius: NECK_DIAMETER / 2.0,
            });
            update.offsets.push(OffsetUpdate {
                group: Group::Face,
                offset: [0.0; 3],
            });
            return;
        };

        let ls = left_shoulder.to_render();
        let rs = right_shoulder.to_render();
        let center = [
            (ls[0] + rs[0]) / 2.0,
            (ls[1] + rs[1]) / 2.0,
            (ls[2] + rs[2]) / 2.0,
        ];
        let n = nose.to_render();
        // 鼻と肩中点の合成点。zは深く割って前後動を緩和する
        let head = [
            (n[0] + center[0]) / 2.0,
            (n[1] + center[1]) / 2.0,
            (n[2] + center[2]) / 4.0,
        ];
        let path = [head, center];
        update.bones.push(BoneUpdate {
            key,
            path: Some(path),
            visibility: 1.0,
            radius: self.bone_radius(NECK_DIAMETER, &path),
        });
        update.offsets.push(OffsetUpdate {
            group: Group::Face,
            offset: [
                0.0,
                0.0,
                if self.options.connect_face {
                    head[2]
                } else {
                    0.0
                },
            ],
        });
    }
}

fn hand_group(side: Side) -> Group {
    match side {
        Side::Left => Group::HandLeft,
        Side::Right => Group::HandRight,
    }
}

fn render_or_origin(landmark: Option<&Landmark>) -> [f32; 3] {
    landmark.map(|lm| lm.to_render()).unwrap_or([0.0, 1.0, 0.0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::{strip_duplicates, Landmark};

    fn full_pose() -> PoseLandmarks {
        let landmarks = (0..PoseLandmarkIndex::COUNT)
            .map(|i| Landmark::with_visibility(0.3 + i as f32 * 0.01, 0.5, 0.0, 1.0))
            .collect();
        PoseLandmarks::from_full(landmarks).unwrap()
    }

    fn hand() -> HandLandmarks {
        let landmarks = (0..21)
            .map(|i| Landmark::new(0.4 + i as f32 * 0.005, 0.6, 0.05))
            .collect();
        HandLandmarks::new(landmarks).unwrap()
    }

    fn pose_bones(update: &SkeletonUpdate) -> Vec<&BoneUpdate> {
        update
            .bones
            .iter()
            .filter(|bone| bone.key.group == Group::Pose)
            .collect()
    }

    #[test]
    fn test_full_frame_yields_all_pose_bones_visible() {
        let reconstructor = SkeletonReconstructor::new(RenderOptions::default());
        let pose = full_pose();
        let update = reconstructor.reconstruct(Some(&pose), Some(&pose), None, None);

        let bones = pose_bones(&update);
        assert_eq!(bones.len(), POSE_CONNECTIONS.len());
        assert_eq!(bones.len(), 35);
        for bone in bones {
            assert_eq!(bone.visibility, 1.0, "bone {} not visible", bone.key);
            assert!(bone.path.is_some());
        }
    }

    #[test]
    fn test_missing_wrists_zero_visibility() {
        let reconstructor = SkeletonReconstructor::new(RenderOptions::default());
        let mut pose = full_pose();
        pose.clear(PoseLandmarkIndex::LeftWrist as usize);
        pose.clear(PoseLandmarkIndex::RightWrist as usize);
        let update = reconstructor.reconstruct(Some(&pose), Some(&pose), None, None);

        for (bone, &(a, b)) in pose_bones(&update).iter().zip(POSE_CONNECTIONS.iter()) {
            let touches_wrist = a == 15 || a == 16 || b == 15 || b == 16;
            if touches_wrist {
                assert_eq!(bone.visibility, 0.0, "bone {} should hide", bone.key);
            } else {
                assert_eq!(bone.visibility, 1.0, "bone {} affected", bone.key);
            }
        }
    }

    #[test]
    fn test_visibility_is_min_of_endpoints() {
        let reconstructor = SkeletonReconstructor::new(RenderOptions::default());
        let mut pose = full_pose();
        pose.set(
            PoseLandmarkIndex::LeftElbow,
            Landmark::with_visibility(0.5, 0.5, 0.0, 0.2),
        );
        let update = reconstructor.reconstruct(Some(&pose), Some(&pose), None, None);

        // 接続10 = (11, 13) 左肩-左肘
        let bone = &pose_bones(&update)[10];
        assert_eq!(POSE_CONNECTIONS[10], (11, 13));
        assert!((bone.visibility - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_absent_pose_hides_everything() {
        let reconstructor = SkeletonReconstructor::new(RenderOptions::default());
        let update = reconstructor.reconstruct(None, None, None, None);
        for bone in pose_bones(&update) {
            assert_eq!(bone.visibility, 0.0);
            assert!(bone.path.is_none(), "hide-only update must carry no path");
        }
    }

    #[test]
    fn test_absent_hand_hides_not_moves() {
        let reconstructor = SkeletonReconstructor::new(RenderOptions::default());
        let pose = full_pose();
        let update = reconstructor.reconstruct(Some(&pose), Some(&pose), None, Some(&hand()));

        let left: Vec<_> = update
            .bones
            .iter()
            .filter(|bone| bone.key.group == Group::HandLeft)
            .collect();
        assert_eq!(left.len(), HAND_CONNECTIONS.len());
        for bone in left {
            assert_eq!(bone.visibility, 0.0);
            assert!(bone.path.is_none());
        }

        let right: Vec<_> = update
            .bones
            .iter()
            .filter(|bone| bone.key.group == Group::HandRight)
            .collect();
        assert_eq!(right.len(), HAND_CONNECTIONS.len());
        for bone in right {
            assert_eq!(bone.visibility, 1.0);
            assert!(bone.path.is_some());
        }
    }

    #[test]
    fn test_render_hands_off_hides_hand_bones() {
        let mut options = RenderOptions::default();
        options.render_hands = false;
        let reconstructor = SkeletonReconstructor::new(options);
        let update = reconstructor.reconstruct(None, None, Some(&hand()), None);
        for bone in update
            .bones
            .iter()
            .filter(|bone| bone.key.group == Group::HandLeft)
        {
            assert_eq!(bone.visibility, 0.0);
        }
    }

    #[test]
    fn test_proportional_radius_tracks_length() {
        let mut options = RenderOptions::default();
        options.fixed_radius = false;
        let reconstructor = SkeletonReconstructor::new(options);

        let mut pose = full_pose();
        // 接続24 = (23, 24) 腰を長くする
        assert_eq!(POSE_CONNECTIONS[24], (23, 24));
        pose.set(
            PoseLandmarkIndex::LeftHip,
            Landmark::with_visibility(0.0, 0.5, 0.0, 1.0),
        );
        pose.set(
            PoseLandmarkIndex::RightHip,
            Landmark::with_visibility(1.0, 0.5, 0.0, 1.0),
        );
        let update = reconstructor.reconstruct(Some(&pose), Some(&pose), None, None);
        let hips = &pose_bones(&update)[24];
        let expected = RADIUS_LENGTH_GAIN * 1.0 + RADIUS_BASE;
        assert!((hips.radius - expected).abs() < 1e-5);

        // 固定モードは長さに依存しない
        let fixed = SkeletonReconstructor::new(RenderOptions::default());
        let update = fixed.reconstruct(Some(&pose), Some(&pose), None, None);
        assert_eq!(pose_bones(&update)[24].radius, POSE_BONE_DIAMETER / 2.0);
    }

    #[test]
    fn test_connect_hands_offset_from_pose_wrist_depth() {
        let reconstructor = SkeletonReconstructor::new(RenderOptions::default());
        let mut pose = full_pose();
        pose.set(
            PoseLandmarkIndex::LeftWrist,
            Landmark::with_visibility(0.4, 0.5, -0.3, 1.0),
        );
        let update = reconstructor.reconstruct(Some(&pose), Some(&pose), Some(&hand()), None);

        let left_offset = update
            .offsets
            .iter()
            .find(|offset| offset.group == Group::HandLeft)
            .unwrap();
        assert_eq!(left_offset.offset, [0.0, 0.0, -0.3]);
    }

    #[test]
    fn test_connect_hands_disabled_resets_offset() {
        let mut options = RenderOptions::default();
        options.connect_hands = false;
        let reconstructor = SkeletonReconstructor::new(options);
        let update = reconstructor.reconstruct(Some(&full_pose()), Some(&full_pose()), None, None);
        for offset in update
            .offsets
            .iter()
            .filter(|offset| offset.group != Group::Face)
        {
            assert_eq!(offset.offset, [0.0; 3]);
        }
    }

    #[test]
    fn test_neck_and_face_offset() {
        let reconstructor = SkeletonReconstructor::new(RenderOptions::default());
        let update = reconstructor.reconstruct(Some(&full_pose()), Some(&full_pose()), None, None);

        let neck = update
            .bones
            .iter()
            .find(|bone| bone.key.group == Group::Neck)
            .unwrap();
        assert_eq!(neck.visibility, 1.0);
        assert!(neck.path.is_some());

        let face_offset = update
            .offsets
            .iter()
            .find(|offset| offset.group == Group::Face)
            .unwrap();
        // connect_face有効時は首のz（合成点）に追従
        let head_z = neck.path.unwrap()[0][2];
        assert_eq!(face_offset.offset[2], head_z);
    }

    #[test]
    fn test_duplicate_filtered_pose_keeps_neck_and_hand_offsets() {
        // 重複除去後のポーズでボーンを描いても、首と手首オフセットは
        // 除去前のポーズから組み立てられる
        let reconstructor = SkeletonReconstructor::new(RenderOptions::default());
        let full = {
            let mut pose = full_pose();
            pose.set(
                PoseLandmarkIndex::LeftWrist,
                Landmark::with_visibility(0.4, 0.5, -0.3, 1.0),
            );
            pose
        };
        let mut stripped = full.clone();
        strip_duplicates(&mut stripped);
        assert!(stripped.get(PoseLandmarkIndex::Nose).is_none());
        assert!(stripped.get(PoseLandmarkIndex::LeftWrist).is_none());

        let update = reconstructor.reconstruct(Some(&stripped), Some(&full), Some(&hand()), None);

        let neck = update
            .bones
            .iter()
            .find(|bone| bone.key.group == Group::Neck)
            .unwrap();
        assert_eq!(neck.visibility, 1.0);
        assert!(neck.path.is_some());

        let left_offset = update
            .offsets
            .iter()
            .find(|offset| offset.group == Group::HandLeft)
            .unwrap();
        assert_eq!(left_offset.offset, [0.0, 0.0, -0.3]);
    }

    #[test]
    fn test_torso_requires_all_four_landmarks() {
        let reconstructor = SkeletonReconstructor::new(RenderOptions::default());
        let mut pose = full_pose();
        pose.clear(PoseLandmarkIndex::LeftHip as usize);
        let update = reconstructor.reconstruct(Some(&pose), Some(&pose), None, None);
        let torso = update
            .ribbons
            .iter()
            .find(|ribbon| ribbon.key.feature == Feature::Torso)
            .unwrap();
        assert_eq!(torso.visibility, 0.0);
        assert!(torso.rails.is_none());
    }
}
