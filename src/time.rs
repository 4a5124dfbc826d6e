//! Frame timing shown in the window title.

use std::time::Duration;

const REFRESH: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct FrameStats {
    base_title: String,
    frames: u32,
    elapsed: Duration,
}

impl FrameStats {
    pub fn new(base_title: impl Into<String>) -> Self {
        Self {
            base_title: base_title.into(),
            frames: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Counts one frame. Once a second has accumulated, returns the new window
    /// title and starts over.
    pub fn tick(&mut self, dt: Duration) -> Option<String> {
        self.frames += 1;
        self.elapsed += dt;
        if self.elapsed < REFRESH {
            return None;
        }

        let seconds = self.elapsed.as_secs_f64();
        let fps = self.frames as f64 / seconds;
        let frame_ms = seconds * 1000.0 / self.frames as f64;
        self.frames = 0;
        self.elapsed = Duration::ZERO;
        Some(format!("{}    FPS: {:.0}    Frame Time: {:.2}ms", self.base_title, fps, frame_ms))
    }
}
