use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::window::WindowBuilder;
use crate::{draw_map, AssetRoot, Config, GraphicsState, Map, QuadBatcher, TmxLoader};

/// Opens a window, loads the configured map and draws it every frame until the window closes.
/// A map that fails to load is logged and replaced with an empty one.
pub fn run(config: Config) -> anyhow::Result<()> {

    // Sets up event loop, window and graphics
    let event_loop = EventLoop::new()?;
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(PhysicalSize::new(config.window_width, config.window_height))
        .build(&event_loop)?;
    let mut graphics = GraphicsState::new(&window)?;

    // Loads resources
    let assets = AssetRoot::new(config.asset_root.as_str());
    let batcher = QuadBatcher::load(&mut graphics, &assets, &config.shader, config.clear_color())?;
    let map = match TmxLoader::new(&assets).load(&config.map, &mut graphics) {
        Ok(map) => map,
        Err(err) => {
            log::error!("Failed to load map '{}': {err}", config.map);
            Map::default()
        }
    };
    let mut viewer = Viewer {
        graphics,
        resources: Some((map, batcher)),
        scale: config.display_scale,
    };

    // Starts frame loop
    event_loop.run(move |event, target| {
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::RedrawRequested => viewer.frame(),
                WindowEvent::Resized(size) => viewer.graphics.resize(size.width, size.height),
                WindowEvent::CloseRequested => target.exit(),
                _ => {}
            },
            Event::AboutToWait => window.request_redraw(),
            Event::LoopExiting => viewer.shutdown(),
            _ => {}
        }
    })?;
    Ok(())
}

struct Viewer {
    graphics: GraphicsState,
    resources: Option<(Map, QuadBatcher)>,
    scale: f32,
}

impl Viewer {

    fn frame(&mut self) {
        let Some((map, batcher)) = &mut self.resources else { return };
        if let Err(err) = draw_map(map, batcher, &mut self.graphics, self.scale) {
            log::error!("{err}");
        }
    }

    /// Releases layers, tilesets, then batch buffers and pipeline.
    fn shutdown(&mut self) {
        let Some((map, batcher)) = self.resources.take() else { return };
        map.unload(&mut self.graphics);
        batcher.destroy(&mut self.graphics);
        log::info!("Released map and batch resources");
    }
}
