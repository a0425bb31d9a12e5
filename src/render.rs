// src/render.rs

use crate::decoder::DecodedFrame;
use anyhow::Context;
use roverlink::camera::{CameraEvent, StepDirection};
use roverlink::motion::MotionEvent;
use roverlink::video::FrameSlot;
use roverlink::{CameraAxis, Config, ConsoleUpdate, Direction, LinkEvent};
use sdl2::{
    EventPump,
    event::{Event, WindowEvent},
    keyboard::Scancode,
    pixels::{Color, PixelFormatEnum},
    render::{Canvas, Texture},
    video::Window,
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, Sender},
    },
    thread,
    time::Duration,
};
use tracing::{info, warn};

const TITLE: &str = "roverlink";
const NO_SIGNAL: Color = Color::RGB(24, 24, 28);

fn motion_key(sc: Scancode) -> Option<Direction> {
    match sc {
        Scancode::W => Some(Direction::Forward),
        Scancode::S => Some(Direction::Backward),
        Scancode::A => Some(Direction::Left),
        Scancode::D => Some(Direction::Right),
        _ => None,
    }
}

fn camera_key(sc: Scancode) -> Option<StepDirection> {
    match sc {
        Scancode::Left => Some(StepDirection::PanLeft),
        Scancode::Right => Some(StepDirection::PanRight),
        Scancode::Up => Some(StepDirection::TiltUp),
        Scancode::Down => Some(StepDirection::TiltDown),
        _ => None,
    }
}

/// Holds the SDL window and its event pump. Texture state lives inside
/// `run` because textures borrow the canvas' texture creator.
pub struct UI {
    canvas: Canvas<Window>,
    event_pump: EventPump,
    config: Config,
    auto_mode: bool,
}

impl UI {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let sdl_context = sdl2::init().map_err(|s| anyhow::anyhow!(s))?;
        let video_subsystem = sdl_context.video().map_err(|s| anyhow::anyhow!(s))?;
        let window = video_subsystem
            .window(TITLE, 800, 600)
            .position_centered()
            .resizable()
            .build()
            .context("Failed to create window")?;

        let canvas = window
            .into_canvas()
            .accelerated()
            .build()
            .context("Failed to create canvas")?;

        let event_pump = sdl_context.event_pump().map_err(|s| anyhow::anyhow!(s))?;

        Ok(Self {
            canvas,
            event_pump,
            config,
            auto_mode: false,
        })
    }

    /// Translates one SDL event into control-loop events.
    fn translate(&mut self, ev: Event, running: &AtomicBool) -> Vec<LinkEvent> {
        match ev {
            Event::Quit { .. }
            | Event::KeyDown {
                scancode: Some(Scancode::Escape),
                ..
            } => {
                running.store(false, Ordering::SeqCst);
                vec![LinkEvent::Shutdown]
            }
            Event::Window {
                win_event: WindowEvent::FocusLost,
                ..
            } => vec![LinkEvent::FocusLost],
            Event::KeyDown {
                scancode: Some(sc),
                repeat,
                ..
            } => {
                // Motion keys pass repeats through; the motion controller drops them.
                if let Some(dir) = motion_key(sc) {
                    return vec![LinkEvent::Motion(MotionEvent::KeyDown(dir))];
                }
                if let Some(step) = camera_key(sc) {
                    return vec![LinkEvent::Camera(CameraEvent::StepKey(step))];
                }
                if repeat {
                    return Vec::new();
                }
                match sc {
                    Scancode::C => vec![LinkEvent::ToggleConnect {
                        host: self.config.host.clone(),
                        port: self.config.control_port,
                    }],
                    Scancode::M => {
                        self.auto_mode = !self.auto_mode;
                        vec![LinkEvent::AutoMode(self.auto_mode)]
                    }
                    Scancode::Home => {
                        let home = self.config.camera_home();
                        vec![
                            LinkEvent::Camera(CameraEvent::SliderChanged(CameraAxis::Pan, home.pan())),
                            LinkEvent::Camera(CameraEvent::SliderChanged(CameraAxis::Tilt, home.tilt())),
                        ]
                    }
                    _ => Vec::new(),
                }
            }
            Event::KeyUp {
                scancode: Some(sc), ..
            } => motion_key(sc)
                .map(|dir| vec![LinkEvent::Motion(MotionEvent::KeyUp(dir))])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Runs the window loop until the operator quits or `running` is cleared.
    pub fn run(
        mut self,
        frames: FrameSlot<DecodedFrame>,
        rx_updates: Receiver<ConsoleUpdate>,
        tx_events: Sender<LinkEvent>,
        running: Arc<AtomicBool>,
    ) -> anyhow::Result<()> {
        info!(
            "W/A/S/D drive, arrows aim the camera, Home centres it, C connects to {}:{}, M toggles auto mode, Esc quits",
            self.config.host, self.config.control_port
        );
        let texture_creator = self.canvas.texture_creator();
        let mut texture: Option<Texture> = None;
        let mut width = 0;
        let mut height = 0;

        while running.load(Ordering::SeqCst) {
            // 1. Keyboard and window events
            let pending: Vec<Event> = self.event_pump.poll_iter().collect();
            for ev in pending {
                for event in self.translate(ev, &running) {
                    if tx_events.send(event).is_err() {
                        warn!("Control loop has exited.");
                        running.store(false, Ordering::SeqCst);
                    }
                }
            }

            // 2. Status text and signal loss from the control loop
            for update in rx_updates.try_iter() {
                match update {
                    ConsoleUpdate::Status(text) => {
                        self.canvas
                            .window_mut()
                            .set_title(&format!("{TITLE} - {text}"))
                            .ok();
                    }
                    ConsoleUpdate::NoSignal => {
                        // A frame decoded before the disconnect must not repaint.
                        frames.clear();
                        texture = None;
                    }
                }
            }

            // 3. Newest decoded frame, if any
            if let Some(frame) = frames.take() {
                if texture.is_none() || width != frame.width || height != frame.height {
                    width = frame.width;
                    height = frame.height;
                    let tex = texture_creator
                        .create_texture_streaming(PixelFormatEnum::IYUV, width, height)
                        .map_err(|e| anyhow::anyhow!("Failed to create texture: {}", e))?;
                    texture = Some(tex);
                }

                if let Some(tex) = &mut texture {
                    tex.update_yuv(
                        None,
                        &frame.y_plane,
                        frame.y_stride,
                        &frame.u_plane,
                        frame.uv_stride,
                        &frame.v_plane,
                        frame.uv_stride,
                    )
                    .map_err(|e| anyhow::anyhow!("Failed to update texture: {}", e))?;
                }
            }

            // 4. Draw the frame, or the placeholder when there is none
            self.canvas.set_draw_color(NO_SIGNAL);
            self.canvas.clear();
            if let Some(tex) = &texture {
                self.canvas
                    .copy(tex, None, None)
                    .map_err(|e| anyhow::anyhow!("Failed to copy texture to canvas: {}", e))?;
            }
            self.canvas.present();

            thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }
}
