use serde::{Deserialize, Serialize};

use super::connections::DUPLICATE_POSE_LANDMARKS;
use super::point::{Landmark, PoseLandmarkIndex};

/// 顔メッシュの固定ランドマーク数
pub const FACE_LANDMARK_COUNT: usize = 468;

/// 手の固定ランドマーク数（手首=0）
pub const HAND_LANDMARK_COUNT: usize = 21;

/// 33スロットのポーズランドマークセット
///
/// 重複除去フィルタが穴を開けるため各スロットはOption。
/// インデックス位置の意味は検出器の出力規約で固定。
/// デシリアライズもスロット数33を強制する（TCP越しの不正長を拒否）。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawPoseLandmarks")]
pub struct PoseLandmarks {
    landmarks: Vec<Option<Landmark>>,
}

#[derive(Deserialize)]
struct RawPoseLandmarks {
    landmarks: Vec<Option<Landmark>>,
}

impl TryFrom<RawPoseLandmarks> for PoseLandmarks {
    type Error = String;

    fn try_from(raw: RawPoseLandmarks) -> Result<Self, Self::Error> {
        if raw.landmarks.len() != PoseLandmarkIndex::COUNT {
            return Err(format!(
                "pose landmark set has {} slots, expected {}",
                raw.landmarks.len(),
                PoseLandmarkIndex::COUNT
            ));
        }
        Ok(Self {
            landmarks: raw.landmarks,
        })
    }
}

impl PoseLandmarks {
    pub fn empty() -> Self {
        Self {
            landmarks: vec![None; PoseLandmarkIndex::COUNT],
        }
    }

    /// 全スロットが埋まったセットを作成（33個でなければNone）
    pub fn from_full(landmarks: Vec<Landmark>) -> Option<Self> {
        if landmarks.len() != PoseLandmarkIndex::COUNT {
            return None;
        }
        Some(Self {
            landmarks: landmarks.into_iter().map(Some).collect(),
        })
    }

    pub fn get(&self, index: PoseLandmarkIndex) -> Option<&Landmark> {
        self.landmarks[index as usize].as_ref()
    }

    pub fn get_raw(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index).and_then(|slot| slot.as_ref())
    }

    pub fn set(&mut self, index: PoseLandmarkIndex, landmark: Landmark) {
        self.landmarks[index as usize] = Some(landmark);
    }

    pub fn clear(&mut self, index: usize) {
        if let Some(slot) = self.landmarks.get_mut(index) {
            *slot = None;
        }
    }

    pub fn present_count(&self) -> usize {
        self.landmarks.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Landmark)> {
        self.landmarks
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|lm| (i, lm)))
    }
}

/// 21ランドマークの手セット。検出された手は全点が存在する。
/// デシリアライズも21点ちょうどを強制する。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawHandLandmarks")]
pub struct HandLandmarks {
    landmarks: Vec<Landmark>,
}

#[derive(Deserialize)]
struct RawHandLandmarks {
    landmarks: Vec<Landmark>,
}

impl TryFrom<RawHandLandmarks> for HandLandmarks {
    type Error = String;

    fn try_from(raw: RawHandLandmarks) -> Result<Self, Self::Error> {
        HandLandmarks::new(raw.landmarks)
            .ok_or_else(|| format!("hand landmark set must have {HAND_LANDMARK_COUNT} points"))
    }
}

impl HandLandmarks {
    /// 21個でなければNone
    pub fn new(landmarks: Vec<Landmark>) -> Option<Self> {
        if landmarks.len() != HAND_LANDMARK_COUNT {
            return None;
        }
        Some(Self { landmarks })
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    /// 手首（インデックス0）
    pub fn wrist(&self) -> &Landmark {
        &self.landmarks[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.landmarks.iter()
    }
}

/// 左右の区別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// 検出器コールバック1回分のペイロード
///
/// 各グループはそのフレームで検出されなかった場合None。
/// 外部検出器プロセスとのワイヤ契約でもあるためserde対応。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolisticResult {
    pub pose: Option<PoseLandmarks>,
    pub left_hand: Option<HandLandmarks>,
    pub right_hand: Option<HandLandmarks>,
    /// 顔ランドマーク。有効なのは468点ちょうどの場合のみ（受信側で検証）
    pub face: Option<Vec<Landmark>>,
    pub width: u32,
    pub height: u32,
    pub timestamp_us: u64,
}

impl HolisticResult {
    pub fn empty(width: u32, height: u32, timestamp_us: u64) -> Self {
        Self {
            pose: None,
            left_hand: None,
            right_hand: None,
            face: None,
            width,
            height,
            timestamp_us,
        }
    }

    pub fn hand(&self, side: Side) -> Option<&HandLandmarks> {
        match side {
            Side::Left => self.left_hand.as_ref(),
            Side::Right => self.right_hand.as_ref(),
        }
    }
}

/// 顔・手と重複するポーズランドマークを除去する純粋フィルタ
///
/// 再構成処理の前段で適用される。穴を開けるだけでセット長は変えない。
pub fn strip_duplicates(pose: &mut PoseLandmarks) {
    for &index in DUPLICATE_POSE_LANDMARKS.iter() {
        pose.clear(index);
    }
}
