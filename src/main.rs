use anyhow::Result;

mod animation;
mod asset_loader;
mod camera;
mod config;
mod effect;
mod lights;
mod model;
mod orbit;
mod overlay;
mod rendering;
mod scene_graph;
mod showcase;
mod window;

fn main() -> Result<()> {
    pretty_env_logger::init();

    pollster::block_on(window::run())?;

    Ok(())
}
