// main.rs - window, event translation and keyboard shortcuts around the panorama viewer

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use bedahgang_panorama::input::CursorAffordance;
use bedahgang_panorama::renderer::WgpuBackend;
use bedahgang_panorama::{PanoramaViewer, RedrawScheduler, ViewerConfig, ViewerError, Viewport};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    dpi::{LogicalSize, PhysicalPosition, PhysicalSize},
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{CursorIcon, Fullscreen, Window, WindowBuilder},
};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

type Viewer = PanoramaViewer<WgpuBackend, RedrawScheduler<Box<dyn FnMut()>>>;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = match ViewerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(2);
        }
    };

    let event_loop = EventLoop::new();
    let (window, viewer) = match init(&event_loop, config) {
        Ok(v) => v,
        Err(e) => {
            log::error!("cannot start viewer: {e}");
            std::process::exit(1);
        }
    };
    run(event_loop, window, viewer)
}

fn init(event_loop: &EventLoop<()>, config: ViewerConfig) -> Result<(Arc<Window>, Viewer), ViewerError> {
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("BedahGang Panorama")
            .with_inner_size(LogicalSize::new(1280, 720))
            .build(event_loop)?,
    );
    window.set_cursor_icon(CursorIcon::Grab);

    let backend = pollster::block_on(WgpuBackend::new(window.clone(), &config))?;
    let redraw_window = window.clone();
    let scheduler: RedrawScheduler<Box<dyn FnMut()>> =
        RedrawScheduler::new(Box::new(move || redraw_window.request_redraw()));
    let viewport = viewport_of(window.inner_size(), window.scale_factor());
    let viewer = PanoramaViewer::mount(config, backend, scheduler, viewport)?;
    Ok((window, viewer))
}

fn viewport_of(size: PhysicalSize<u32>, scale_factor: f64) -> Viewport {
    let logical: LogicalSize<f64> = size.to_logical(scale_factor);
    Viewport::new(logical.width, logical.height, scale_factor)
}

fn pick_image() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter("Panorama images", IMAGE_EXTENSIONS)
        .pick_file()
}

fn run(event_loop: EventLoop<()>, window: Arc<Window>, viewer: Viewer) -> ! {
    let mut viewer = Some(viewer);
    let mut cursor_pos = PhysicalPosition::new(0.0, 0.0);
    let mut cursor = CursorAffordance::Grab;
    let mut touch_id: Option<u64> = None;
    let mut fullscreen = false;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        let Some(v) = viewer.as_mut() else {
            *control_flow = ControlFlow::Exit;
            return;
        };
        let scale = window.scale_factor();

        match event {
            Event::WindowEvent { event, .. } => {
                // the status bar is read-only, so the viewer always sees the event too
                v.backend_mut().handle_window_event(&event);

                match event {
                    WindowEvent::CloseRequested => {
                        *control_flow = ControlFlow::Exit;
                    }

                    WindowEvent::Resized(size) => v.resize(viewport_of(size, scale)),
                    WindowEvent::ScaleFactorChanged {
                        scale_factor,
                        new_inner_size,
                    } => v.resize(viewport_of(*new_inner_size, scale_factor)),

                    WindowEvent::MouseInput {
                        state,
                        button: MouseButton::Left,
                        ..
                    } => match state {
                        ElementState::Pressed => {
                            let p = cursor_pos.to_logical::<f64>(scale);
                            v.pointer_down(p.x, p.y);
                        }
                        ElementState::Released => v.pointer_up(),
                    },

                    WindowEvent::CursorMoved { position, .. } => {
                        cursor_pos = position;
                        let p = position.to_logical::<f64>(scale);
                        v.pointer_move(p.x, p.y);
                    }

                    // a drag must not survive the window losing focus mid-gesture
                    WindowEvent::Focused(false) => v.pointer_up(),

                    WindowEvent::MouseWheel { delta, .. } => match delta {
                        MouseScrollDelta::LineDelta(_, y) => v.wheel(y),
                        MouseScrollDelta::PixelDelta(p) => v.wheel(p.y as f32),
                    },

                    WindowEvent::TouchpadMagnify { delta, .. } => v.pinch(delta),

                    WindowEvent::Touch(touch) => {
                        let p = touch.location.to_logical::<f64>(scale);
                        match touch.phase {
                            TouchPhase::Started if touch_id.is_none() => {
                                touch_id = Some(touch.id);
                                v.pointer_down(p.x, p.y);
                            }
                            TouchPhase::Moved if touch_id == Some(touch.id) => v.pointer_move(p.x, p.y),
                            TouchPhase::Ended | TouchPhase::Cancelled if touch_id == Some(touch.id) => {
                                touch_id = None;
                                v.pointer_up();
                            }
                            _ => {}
                        }
                    }

                    WindowEvent::DroppedFile(path) => v.replace_source(path),

                    WindowEvent::KeyboardInput { input, .. } if input.state == ElementState::Pressed => {
                        match input.virtual_keycode {
                            Some(VirtualKeyCode::O) => {
                                if let Some(path) = pick_image() {
                                    v.replace_source(path);
                                }
                            }
                            Some(VirtualKeyCode::F11) => {
                                fullscreen = !fullscreen;
                                window.set_fullscreen(fullscreen.then(|| Fullscreen::Borderless(None)));
                            }
                            Some(VirtualKeyCode::R) => v.reset_view(),
                            Some(VirtualKeyCode::H) => v.toggle_hud(),
                            Some(VirtualKeyCode::Escape) => *control_flow = ControlFlow::Exit,
                            _ => {}
                        }
                    }

                    _ => {}
                }

                if v.cursor() != cursor {
                    cursor = v.cursor();
                    window.set_cursor_icon(match cursor {
                        CursorAffordance::Grab => CursorIcon::Grab,
                        CursorAffordance::Grabbing => CursorIcon::Grabbing,
                    });
                }
            }

            Event::RedrawRequested(_) => {
                if let Err(e) = v.frame(Instant::now()) {
                    log::error!("render failed: {e}");
                    *control_flow = ControlFlow::Exit;
                }
            }

            Event::LoopDestroyed => {
                // run() never returns, so tear down here rather than relying on Drop
                if let Some(mut v) = viewer.take() {
                    v.unmount();
                }
            }

            _ => {}
        }
    })
}
