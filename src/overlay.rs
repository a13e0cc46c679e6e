//! 2Dオーバーレイレンダラ
//!
//! 検出結果を確認するためのデバッグ描画。ウィンドウやGPUには依存せず、
//! RGBピクセルバッファに直接描く。表示側（minifb等）はバッファを
//! そのまま転送すればよい。

use crate::landmark::{
    HandLandmarks, HolisticResult, Landmark, PoseLandmarkIndex, Side, FACE_LEFT_EYE,
    FACE_LEFT_EYEBROW, FACE_LIPS, FACE_OVAL, FACE_RIGHT_EYE, FACE_RIGHT_EYEBROW,
    HAND_CONNECTIONS, POSE_CONNECTIONS,
};

/// 接続線・中立ランドマークの色 (RGB)
pub const NEUTRAL_COLOR: u32 = 0xFFFFFF;
/// 左半身の色
pub const LEFT_COLOR: u32 = 0xFF8A00; // オレンジ
/// 右半身の色
pub const RIGHT_COLOR: u32 = 0x00D9E7; // シアン
/// 顔の輪郭線の色
const FACE_CONTOUR_COLOR: u32 = 0xE0E0E0;
/// 唇の色
const LIPS_COLOR: u32 = 0xE05050;

/// これ未満のvisibilityのポーズランドマークは描かない
pub const VISIBILITY_MIN: f32 = 0.65;

const LANDMARK_RADIUS: i32 = 4;

pub struct OverlayRenderer {
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl OverlayRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            buffer: vec![0u32; width * height],
            width,
            height,
        }
    }

    pub fn buffer(&self) -> &[u32] {
        &self.buffer
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// ソース解像度の変更に追従する
    pub fn resize(&mut self, width: usize, height: usize) {
        if width != self.width || height != self.height {
            self.width = width;
            self.height = height;
            self.buffer = vec![0u32; width * height];
        }
    }

    pub fn clear(&mut self, color: u32) {
        self.buffer.fill(color);
    }

    /// 検出結果1件をまるごと描画する
    pub fn draw_results(&mut self, results: &HolisticResult) {
        if let Some(pose) = results.pose.as_ref() {
            // 接続線を先に描き、点を上に重ねる
            for &(a, b) in POSE_CONNECTIONS.iter() {
                let (Some(start), Some(end)) = (pose.get_raw(a as usize), pose.get_raw(b as usize))
                else {
                    continue;
                };
                if start.visibility_or_default() < VISIBILITY_MIN
                    || end.visibility_or_default() < VISIBILITY_MIN
                {
                    continue;
                }
                self.draw_segment(start, end, NEUTRAL_COLOR);
            }
            for (index, landmark) in pose.iter() {
                if landmark.visibility_or_default() < VISIBILITY_MIN {
                    continue;
                }
                let color = match PoseLandmarkIndex::from_index(index) {
                    Some(point) if point.is_left() => LEFT_COLOR,
                    Some(_) => RIGHT_COLOR,
                    None => NEUTRAL_COLOR,
                };
                self.draw_landmark(landmark, LANDMARK_RADIUS, color);
            }
        }

        if let Some(hand) = results.hand(Side::Left) {
            self.draw_hand(hand, results.pose.as_ref().and_then(|pose| {
                pose.get(PoseLandmarkIndex::LeftElbow)
            }), LEFT_COLOR);
        }
        if let Some(hand) = results.hand(Side::Right) {
            self.draw_hand(hand, results.pose.as_ref().and_then(|pose| {
                pose.get(PoseLandmarkIndex::RightElbow)
            }), RIGHT_COLOR);
        }

        if let Some(face) = results.face.as_deref() {
            self.draw_face_contours(face);
        }
    }

    fn draw_hand(&mut self, hand: &HandLandmarks, elbow: Option<&Landmark>, color: u32) {
        // 肘から手首へのつなぎ線。ポーズの手首より手側の手首の方が正確
        if let Some(elbow) = elbow {
            if elbow.visibility_or_default() >= VISIBILITY_MIN {
                self.draw_segment(elbow, hand.wrist(), NEUTRAL_COLOR);
            }
        }
        for &(a, b) in HAND_CONNECTIONS.iter() {
            let (Some(start), Some(end)) = (hand.get(a as usize), hand.get(b as usize)) else {
                continue;
            };
            self.draw_segment(start, end, NEUTRAL_COLOR);
        }
        for landmark in hand.iter() {
            self.draw_landmark(landmark, LANDMARK_RADIUS - 1, color);
        }
    }

    fn draw_face_contours(&mut self, face: &[Landmark]) {
        let contours: [(&[(u16, u16)], u32); 6] = [
            (&FACE_OVAL, FACE_CONTOUR_COLOR),
            (&FACE_LIPS, LIPS_COLOR),
            (&FACE_LEFT_EYE, FACE_CONTOUR_COLOR),
            (&FACE_RIGHT_EYE, FACE_CONTOUR_COLOR),
            (&FACE_LEFT_EYEBROW, FACE_CONTOUR_COLOR),
            (&FACE_RIGHT_EYEBROW, FACE_CONTOUR_COLOR),
        ];
        for (table, color) in contours {
            for &(a, b) in table {
                let (Some(start), Some(end)) = (face.get(a as usize), face.get(b as usize)) else {
                    continue;
                };
                self.draw_segment(start, end, color);
            }
        }
    }

    fn draw_segment(&mut self, start: &Landmark, end: &Landmark, color: u32) {
        let (x0, y0) = start.to_pixel(self.width as u32, self.height as u32);
        let (x1, y1) = end.to_pixel(self.width as u32, self.height as u32);
        self.draw_line(x0, y0, x1, y1, color);
    }

    fn draw_landmark(&mut self, landmark: &Landmark, radius: i32, color: u32) {
        let (x, y) = landmark.to_pixel(self.width as u32, self.height as u32);
        self.draw_circle(x, y, radius, color);
    }

    /// Bresenhamのアルゴリズムで線を描画
    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        let mut x = x0;
        let mut y = y0;

        loop {
            self.set_pixel(x, y, color);

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// 円を描画（塗りつぶし）
    fn draw_circle(&mut self, cx: i32, cy: i32, radius: i32, color: u32) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.set_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    /// ピクセルをセット（境界チェック付き）
    fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.buffer[y as usize * self.width + x as usize] = color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::PoseLandmarks;

    fn count_color(renderer: &OverlayRenderer, color: u32) -> usize {
        renderer.buffer().iter().filter(|&&px| px == color).count()
    }

    fn full_pose(visibility: f32) -> PoseLandmarks {
        let landmarks = (0..PoseLandmarkIndex::COUNT)
            .map(|i| {
                Landmark::with_visibility(
                    0.2 + 0.6 * (i as f32 / 33.0),
                    0.2 + 0.6 * ((i * 7 % 33) as f32 / 33.0),
                    0.0,
                    visibility,
                )
            })
            .collect();
        PoseLandmarks::from_full(landmarks).unwrap()
    }

    #[test]
    fn test_draw_pose_marks_pixels() {
        let mut renderer = OverlayRenderer::new(320, 240);
        let mut results = HolisticResult::empty(320, 240, 0);
        results.pose = Some(full_pose(1.0));
        renderer.draw_results(&results);
        assert!(count_color(&renderer, NEUTRAL_COLOR) > 0);
        assert!(count_color(&renderer, LEFT_COLOR) > 0);
        assert!(count_color(&renderer, RIGHT_COLOR) > 0);
    }

    #[test]
    fn test_low_visibility_suppressed() {
        let mut renderer = OverlayRenderer::new(320, 240);
        let mut results = HolisticResult::empty(320, 240, 0);
        results.pose = Some(full_pose(0.5));
        renderer.draw_results(&results);
        // 0.65未満は線も点も描かれない
        assert_eq!(count_color(&renderer, NEUTRAL_COLOR), 0);
        assert_eq!(count_color(&renderer, LEFT_COLOR), 0);
    }

    #[test]
    fn test_out_of_frame_landmarks_safe() {
        let mut renderer = OverlayRenderer::new(64, 64);
        let landmarks = (0..PoseLandmarkIndex::COUNT)
            .map(|i| Landmark::with_visibility(-2.0 + i as f32 * 0.5, 3.0, 0.0, 1.0))
            .collect();
        let mut results = HolisticResult::empty(64, 64, 0);
        results.pose = PoseLandmarks::from_full(landmarks);
        // 画面外座標でもパニックしない
        renderer.draw_results(&results);
    }

    #[test]
    fn test_face_contours_drawn() {
        let mut renderer = OverlayRenderer::new(320, 240);
        let mut results = HolisticResult::empty(320, 240, 0);
        results.face = Some(
            (0..468)
                .map(|i| Landmark::new((i % 30) as f32 / 30.0, (i / 30) as f32 / 16.0, 0.0))
                .collect(),
        );
        renderer.draw_results(&results);
        assert!(count_color(&renderer, LIPS_COLOR) > 0);
    }

    #[test]
    fn test_resize_reallocates() {
        let mut renderer = OverlayRenderer::new(64, 64);
        renderer.clear(0x123456);
        renderer.resize(128, 32);
        assert_eq!(renderer.buffer().len(), 128 * 32);
        assert!(renderer.buffer().iter().all(|&px| px == 0));
    }
}
