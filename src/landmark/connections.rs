//! 検出器が公開する固定接続テーブル。
//!
//! インデックスの意味は検出器の出力規約で固定されており、ここでは
//! 不変の外部アセットとして扱う。

/// ポーズ骨格の接続定義 (開始インデックス, 終了インデックス)
pub const POSE_CONNECTIONS: [(u8, u8); 35] = [
    // 顔
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 7),
    (0, 4),
    (4, 5),
    (5, 6),
    (6, 8),
    (9, 10),
    // 上半身
    (11, 12),
    (11, 13),
    (13, 15),
    (15, 17),
    (15, 19),
    (15, 21),
    (17, 19),
    (12, 14),
    (14, 16),
    (16, 18),
    (16, 20),
    (16, 22),
    (18, 20),
    // 胴体
    (11, 23),
    (12, 24),
    (23, 24),
    // 下半身
    (23, 25),
    (24, 26),
    (25, 27),
    (26, 28),
    (27, 29),
    (28, 30),
    (29, 31),
    (30, 32),
    (27, 31),
    (28, 32),
];

/// 手骨格の接続定義（手首=0、親指4関節、各指）
pub const HAND_CONNECTIONS: [(u8, u8); 21] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (5, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (9, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (13, 17),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
];

/// 顔・手のランドマークと重複するポーズランドマーク
/// （顔の輪郭点と手指の点はそれぞれの専用セットが持つため除去対象）
pub const DUPLICATE_POSE_LANDMARKS: [usize; 19] =
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 15, 16, 17, 18, 19, 20, 21, 22];

/// 顔の輪郭（オーバル）
pub const FACE_OVAL: [(u16, u16); 36] = [
    (10, 338),
    (338, 297),
    (297, 332),
    (332, 284),
    (284, 251),
    (251, 389),
    (389, 356),
    (356, 454),
    (454, 323),
    (323, 361),
    (361, 288),
    (288, 397),
    (397, 365),
    (365, 379),
    (379, 378),
    (378, 400),
    (400, 377),
    (377, 152),
    (152, 148),
    (148, 176),
    (176, 149),
    (149, 150),
    (150, 136),
    (136, 172),
    (172, 58),
    (58, 132),
    (132, 93),
    (93, 234),
    (234, 127),
    (127, 162),
    (162, 21),
    (21, 54),
    (54, 103),
    (103, 67),
    (67, 109),
    (109, 10),
];

/// 唇（外側・内側）
pub const FACE_LIPS: [(u16, u16); 40] = [
    (61, 146),
    (146, 91),
    (91, 181),
    (181, 84),
    (84, 17),
    (17, 314),
    (314, 405),
    (405, 321),
    (321, 375),
    (375, 291),
    (61, 185),
    (185, 40),
    (40, 39),
    (39, 37),
    (37, 0),
    (0, 267),
    (267, 269),
    (269, 270),
    (270, 409),
    (409, 291),
    (78, 95),
    (95, 88),
    (88, 178),
    (178, 87),
    (87, 14),
    (14, 317),
    (317, 402),
    (402, 318),
    (318, 324),
    (324, 308),
    (78, 191),
    (191, 80),
    (80, 81),
    (81, 82),
    (82, 13),
    (13, 312),
    (312, 311),
    (311, 310),
    (310, 415),
    (415, 308),
];

/// 左目
pub const FACE_LEFT_EYE: [(u16, u16); 16] = [
    (263, 249),
    (249, 390),
    (390, 373),
    (373, 374),
    (374, 380),
    (380, 381),
    (381, 382),
    (382, 362),
    (263, 466),
    (466, 388),
    (388, 387),
    (387, 386),
    (386, 385),
    (385, 384),
    (384, 398),
    (398, 362),
];

/// 右目
pub const FACE_RIGHT_EYE: [(u16, u16); 16] = [
    (33, 7),
    (7, 163),
    (163, 144),
    (144, 145),
    (145, 153),
    (153, 154),
    (154, 155),
    (155, 133),
    (33, 246),
    (246, 161),
    (161, 160),
    (160, 159),
    (159, 158),
    (158, 157),
    (157, 173),
    (173, 133),
];

/// 左眉
pub const FACE_LEFT_EYEBROW: [(u16, u16); 8] = [
    (276, 283),
    (283, 282),
    (282, 295),
    (295, 285),
    (300, 293),
    (293, 334),
    (334, 296),
    (296, 336),
];

/// 右眉
pub const FACE_RIGHT_EYEBROW: [(u16, u16); 8] = [
    (46, 53),
    (53, 52),
    (52, 65),
    (65, 55),
    (70, 63),
    (63, 105),
    (105, 66),
    (66, 107),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::point::PoseLandmarkIndex;

    #[test]
    fn test_pose_connections_count() {
        assert_eq!(POSE_CONNECTIONS.len(), 35);
    }

    #[test]
    fn test_pose_connections_in_range() {
        for &(a, b) in POSE_CONNECTIONS.iter() {
            assert!((a as usize) < PoseLandmarkIndex::COUNT);
            assert!((b as usize) < PoseLandmarkIndex::COUNT);
        }
    }

    #[test]
    fn test_hand_connections_in_range() {
        assert_eq!(HAND_CONNECTIONS.len(), 21);
        for &(a, b) in HAND_CONNECTIONS.iter() {
            assert!((a as usize) < 21);
            assert!((b as usize) < 21);
        }
    }

    #[test]
    fn test_duplicate_landmarks_in_range() {
        for &i in DUPLICATE_POSE_LANDMARKS.iter() {
            assert!(i < PoseLandmarkIndex::COUNT);
        }
    }

    #[test]
    fn test_face_contours_in_range() {
        let all = FACE_OVAL
            .iter()
            .chain(FACE_LIPS.iter())
            .chain(FACE_LEFT_EYE.iter())
            .chain(FACE_RIGHT_EYE.iter())
            .chain(FACE_LEFT_EYEBROW.iter())
            .chain(FACE_RIGHT_EYEBROW.iter());
        for &(a, b) in all {
            assert!((a as usize) < 468);
            assert!((b as usize) < 468);
        }
    }
}
