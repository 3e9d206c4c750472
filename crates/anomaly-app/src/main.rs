mod camera;

mod input;

mod mesh;

mod renderer;
use renderer::*;

use winit::{
    dpi::LogicalSize,
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::{CursorGrabMode, WindowBuilder},
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Initialised logging.");

    let event_loop = EventLoop::new();

    let window = match WindowBuilder::new()
        .with_title("Anomaly")
        .with_inner_size(LogicalSize::new(800, 600))
        .build(&event_loop)
    {
        Ok(window) => window,
        Err(error) => {
            log::error!("Failed to create the window: {}", error);
            std::process::exit(1);
        }
    };

    // Capture the cursor for mouse look. Not every platform supports both grab
    // modes, so fall back from confined to locked.
    if let Err(error) = window
        .set_cursor_grab(CursorGrabMode::Confined)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
    {
        log::warn!("Failed to grab the cursor: {}", error);
    }
    window.set_cursor_visible(false);

    let mut renderer = match Renderer::new(&window) {
        Ok(renderer) => renderer,
        Err(error) => {
            log::error!("Failed to initialise the renderer: {}", error);
            std::process::exit(1);
        }
    };

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        // Handle the events first, then pass them on to the renderer.
        if let Event::WindowEvent { ref event, .. } = event {
            match event {
                WindowEvent::CloseRequested
                | WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state: ElementState::Pressed,
                            virtual_keycode: Some(VirtualKeyCode::Escape),
                            ..
                        },
                    ..
                } => {
                    *control_flow = ControlFlow::Exit;
                }
                _ => (),
            }
        }

        if let Err(error) = renderer.handle_event(&event, &window) {
            log::error!("Failed to render a frame: {}", error);
            *control_flow = ControlFlow::Exit;
        }
    });
}
