//! Window management using winit

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use winit::{
    dpi::PhysicalSize,
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window as WinitWindow, WindowBuilder},
};

/// Window error type
#[derive(Error, Debug)]
pub enum WindowError {
    #[error("Failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("Failed to create window: {0}")]
    Creation(#[from] winit::error::OsError),
}

/// The surface a frame driver renders into.
///
/// Presentation belongs to the graphics backend; `render_end` is called
/// once the frame has been presented.
pub trait RenderWindow {
    /// Make this window the render target of the current thread
    fn make_current(&mut self);

    /// Whether the render loop should keep going
    fn render_cond(&mut self) -> bool;

    /// Start a frame; returns the new size if the window was resized
    fn render_begin(&mut self) -> Option<(u32, u32)>;

    /// Finish a frame
    fn render_end(&mut self);

    /// Vertical field of view in radians
    fn fovy(&self) -> f32;

    /// Width over height
    fn aspect(&self) -> f32;
}

/// Default vertical field of view, 15 degrees
pub const DEFAULT_FOVY: f32 = 15.0 * std::f32::consts::PI / 180.0;

/// winit window driven by pumping its event loop once per frame
pub struct AppWindow {
    event_loop: EventLoop<()>,
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
    fovy: f32,
    resized: bool,
    close_requested: bool,
}

impl AppWindow {
    /// Create a new window with the given title and dimensions
    pub fn new(title: &str, width: u32, height: u32) -> Result<Self, WindowError> {
        let event_loop = EventLoop::new()?;
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(title)
                .with_inner_size(PhysicalSize::new(width, height))
                .build(&event_loop)?,
        );

        let size = window.inner_size();
        log::info!("Created window \"{title}\" ({}x{})", size.width, size.height);

        Ok(Self {
            event_loop,
            window,
            width: size.width,
            height: size.height,
            fovy: DEFAULT_FOVY,
            resized: false,
            close_requested: false,
        })
    }

    pub fn with_fovy(mut self, fovy: f32) -> Self {
        self.fovy = fovy;
        self
    }

    /// Get arc reference to window for backend initialization
    pub fn window_arc(&self) -> Arc<WinitWindow> {
        Arc::clone(&self.window)
    }

    /// Handle window events
    fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(size) => {
                self.width = size.width;
                self.height = size.height;
                self.resized = true;
            }
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            _ => {}
        }
    }

    fn pump(&mut self) {
        let mut events = Vec::new();
        let status = self
            .event_loop
            .pump_events(Some(Duration::ZERO), |event, elwt| {
                elwt.set_control_flow(ControlFlow::Poll);
                if let Event::WindowEvent { event, .. } = event {
                    if let WindowEvent::CloseRequested = event {
                        elwt.exit();
                    }
                    events.push(event);
                }
            });

        for event in &events {
            self.handle_event(event);
        }
        if let PumpStatus::Exit(code) = status {
            log::debug!("Event loop exited with code {code}");
            self.close_requested = true;
        }
    }
}

impl RenderWindow for AppWindow {
    fn make_current(&mut self) {
        // wgpu targets the window's surface directly; only the size is refreshed
        let size = self.window.inner_size();
        self.width = size.width;
        self.height = size.height;
    }

    fn render_cond(&mut self) -> bool {
        self.pump();
        !self.close_requested
    }

    fn render_begin(&mut self) -> Option<(u32, u32)> {
        std::mem::take(&mut self.resized).then_some((self.width, self.height))
    }

    fn render_end(&mut self) {
        self.window.request_redraw();
    }

    fn fovy(&self) -> f32 {
        self.fovy
    }

    fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}
