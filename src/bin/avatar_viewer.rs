use anyhow::{bail, Context, Result};
use minifb::{Key, Window, WindowOptions};

use holistic_avatar::camera::{FrameSource, VideoSource};
use holistic_avatar::config::Config;
use holistic_avatar::detector::{HolisticDetector, RemoteDetector};
use holistic_avatar::frame::{run_loop, AvatarContext, CancelToken};
use holistic_avatar::overlay::OverlayRenderer;
use holistic_avatar::rig::FaceTopology;

const TOPOLOGY_PATH: &str = "assets/face_topology.json";

fn open_source(config: &Config) -> Result<VideoSource> {
    match config.source.kind.as_str() {
        "webcam" => VideoSource::open_camera(
            config.source.camera_index,
            config.source.width,
            config.source.height,
        ),
        "file" => VideoSource::open_file(&config.source.path),
        other => bail!("unknown source kind: {}", other),
    }
}

fn main() -> Result<()> {
    println!("=== Avatar Viewer ({}) ===", env!("GIT_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load_or_default(&config_path);
    println!(
        "source: {} / detector: {}",
        config.source.kind, config.detector.addr
    );

    let topology = FaceTopology::load(TOPOLOGY_PATH)
        .with_context(|| format!("顔トポロジ {} を読み込めません", TOPOLOGY_PATH))?;

    let mut source = open_source(&config)?;
    println!("カメラ起動: {}x{}", source.width(), source.height());

    println!("検出器へ接続中...");
    let mut detector = RemoteDetector::connect(&config.detector.addr)?;
    detector.set_options(&config.detector.options)?;
    detector.initialize()?;
    println!("検出器 ready");

    let width = source.width() as usize;
    let height = source.height() as usize;
    let mut window = Window::new(
        "avatar_viewer",
        width,
        height,
        WindowOptions {
            resize: false,
            ..WindowOptions::default()
        },
    )?;
    let mut overlay = OverlayRenderer::new(width, height);

    let mut ctx = AvatarContext::new(config.render.clone(), topology);
    let cancel = CancelToken::new();
    let loop_cancel = cancel.clone();

    run_loop(
        &mut source,
        &mut detector,
        &mut ctx,
        config.app.target_fps,
        &cancel,
        move |_ctx, last_result| {
            if !window.is_open() || window.is_key_down(Key::Escape) {
                loop_cancel.cancel();
                return Ok(());
            }
            overlay.clear(0x202020);
            if let Some(results) = last_result {
                overlay.draw_results(results);
            }
            window.update_with_buffer(overlay.buffer(), overlay.width(), overlay.height())?;
            Ok(())
        },
    )?;

    println!("終了します");
    Ok(())
}
