mod app;

use std::env;

const WIDTH: u32  = 800;
const HEIGHT: u32 = 800;
const FRAMES: u32 = 60;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Default values.
    let mut params = app::Params {
        width: WIDTH,
        height: HEIGHT,
        frames: FRAMES,
        asset_path: String::from("assets/model.obj"),
        workers: None,
        tile_size: None,
        print_fps: false,
    };

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("-p", Some(value)) => { params.asset_path = value.clone(); i += 1; }
            ("-w", Some(value)) => { params.width = value.parse()?; i += 1; }
            ("-h", Some(value)) => { params.height = value.parse()?; i += 1; }
            ("-f", Some(value)) => { params.frames = value.parse()?; i += 1; }
            ("-j", Some(value)) => { params.workers = Some(value.parse()?); i += 1; }
            ("-t", Some(value)) => { params.tile_size = Some(value.parse()?); i += 1; }
            ("--fps", _) => { params.print_fps = true; }
            (flag, _) => log::warn!("ignoring argument {:?}", flag),
        }
        i += 1;
    }

    app::run(params)?;

    return Ok(());
}
