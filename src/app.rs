use std::f32::consts::PI;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::time;

use nalgebra as na;
use na::{vector, Vector3, Vector4};

use soft_raster::mesh::load_obj;
use soft_raster::util::{look_at, perspective};
use soft_raster::{default_shaders, CullMode, Rasterizer, RasterizerConfig, ShaderOutputChannel, Viewport};

const CAMERA_DISTANCE: f32 = 3.0;
// Radians per frame.
const ORBIT_STEP: f32 = PI / 90.0;

pub struct Params {
    pub width: u32,
    pub height: u32,
    pub frames: u32,
    pub asset_path: String,
    pub workers: Option<usize>,
    pub tile_size: Option<u32>,
    pub print_fps: bool,
}

/// Loads the model, then renders `frames` frames while orbiting the camera around it.
pub fn run(params: Params) -> Result<(), Box<dyn std::error::Error>> {
    let default_config = RasterizerConfig::default();
    let config = RasterizerConfig {
        viewport: Viewport::new(params.width, params.height),
        tile_size: params.tile_size.unwrap_or(default_config.tile_size),
        workers: params.workers.unwrap_or(default_config.workers),
        ..default_config
    };
    let mut rasterizer = Rasterizer::new(config);

    let mesh = load_obj(BufReader::new(File::open(&params.asset_path)?), CullMode::CullBack)?;
    let mut model = mesh.primitive;
    let (vertex_shader, fragment_shader) = default_shaders(mesh.input_mapping);
    model.set_vs(vertex_shader);
    model.set_fs(fragment_shader);
    let uniforms = Arc::clone(model.ubo());

    let aspect = params.width as f32 / params.height as f32;
    let projection = perspective(aspect, PI / 4.0, 0.1, 100.0);
    let pixel_count = (params.width * params.height) as f32;
    let background: Vector4<f32> = vector![0.0, 0.0, 0.0, 1.0];

    let time_begin = time::Instant::now();
    let mut frame_counter_time_begin = time::Instant::now();
    let mut frame_counter: u32 = 0;
    for frame in 0..params.frames {
        let angle = frame as f32 * ORBIT_STEP;
        let eye = vector![CAMERA_DISTANCE * angle.sin(), 0.0, CAMERA_DISTANCE * angle.cos()];
        let view = look_at(eye, Vector3::zeros(), Vector3::y());
        match uniforms.write() {
            Ok(mut block) => block.set_camera(view, projection),
            Err(poisoned) => poisoned.into_inner().set_camera(view, projection),
        }

        rasterizer.clear_buffers_default(background);
        let stats = rasterizer.draw(&model);

        let covered = rasterizer
            .depth_buffer()
            .data()
            .iter()
            .filter(|depth| depth.is_finite())
            .count();
        log::debug!(
            "frame {}: {} fragment(s), {:.1}% covered, {} culled, {} tile(s)",
            frame,
            stats.fragments,
            100.0 * covered as f32 / pixel_count,
            stats.culled,
            stats.tiles
        );

        if params.print_fps {
            // Counting frames to printout stats every second.
            frame_counter += 1;
            let elapsed = frame_counter_time_begin.elapsed().as_secs_f32();
            if elapsed >= 1.0 {
                log::info!("FPS - {:.1}", frame_counter as f32 / elapsed);
                frame_counter = 0;
                frame_counter_time_begin = time::Instant::now();
            }
        }
    }

    let total = time_begin.elapsed().as_secs_f32();
    log::info!(
        "rendered {} frame(s) in {:.2}s, channels: {:?}",
        params.frames,
        total,
        rasterizer.frame_buffer().active_channels()
    );
    if let Some(color) = rasterizer.frame_buffer().pixel(ShaderOutputChannel::FinalColor, params.width / 2, params.height / 2) {
        log::info!("center pixel of the last frame: {:?}", color);
    }

    return Ok(());
}
