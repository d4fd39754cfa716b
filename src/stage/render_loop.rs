//! Drives a stage from animation-frame callbacks.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use super::{Stage, StageEvent};
use crate::events::{Emitter, ListenerId};
use crate::{Error, Result};

/// Host hook for scheduling frames, such as `requestAnimationFrame` or a
/// windowing event loop. The host calls [`RenderLoop::on_animation_frame`]
/// once for every requested frame.
pub trait FrameScheduler {
    fn request_frame(&self);

    fn cancel_frame(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderLoopEvent {
    /// About to draw. Listeners may update views; the frame picks it up.
    BeforeRender,
    AfterRender,
}

struct LoopState {
    running: Cell<bool>,
    rendering: Cell<bool>,
    requested: Cell<bool>,
    scheduler: Rc<dyn FrameScheduler>,
}

impl LoopState {
    /// Request a frame unless one is already pending.
    fn render_on_next_frame(&self) {
        if self.running.get() && !self.requested.get() {
            self.requested.set(true);
            self.scheduler.request_frame();
        }
    }
}

pub struct RenderLoop {
    stage: Stage,
    state: Rc<LoopState>,
    listener: Option<ListenerId>,
    events: Emitter<RenderLoopEvent>,
}

impl RenderLoop {
    /// Wrap `stage`. With `render_on_invalidate`, any change reported by the
    /// stage schedules a frame.
    pub fn new(stage: Stage, scheduler: Rc<dyn FrameScheduler>, render_on_invalidate: bool) -> Self {
        let state = Rc::new(LoopState {
            running: Cell::new(false),
            rendering: Cell::new(false),
            requested: Cell::new(false),
            scheduler,
        });

        let listener = render_on_invalidate.then(|| {
            let state = state.clone();
            stage.events().add_listener(move |event| {
                // The frame about to be drawn already covers changes made
                // from BeforeRender listeners.
                if matches!(event, StageEvent::RenderInvalid) && !state.rendering.get() {
                    state.render_on_next_frame();
                }
            })
        });

        Self {
            stage,
            state,
            listener,
            events: Emitter::new(),
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut Stage {
        &mut self.stage
    }

    pub fn events(&self) -> &Emitter<RenderLoopEvent> {
        &self.events
    }

    pub fn is_running(&self) -> bool {
        self.state.running.get()
    }

    /// Whether a frame has been requested and not yet delivered.
    pub fn frame_requested(&self) -> bool {
        self.state.requested.get()
    }

    pub fn start(&self) {
        self.state.running.set(true);
        self.state.render_on_next_frame();
    }

    pub fn stop(&self) {
        if self.state.requested.replace(false) {
            self.state.scheduler.cancel_frame();
        }
        self.state.running.set(false);
    }

    pub fn render_on_next_frame(&self) {
        self.state.render_on_next_frame();
    }

    /// Draw the frame the scheduler delivered.
    pub fn on_animation_frame(&mut self) -> Result<()> {
        if !self.state.running.get() {
            return Err(Error::Sequence("render loop running while in stopped state"));
        }
        self.state.requested.set(false);

        self.state.rendering.set(true);
        self.events.emit(&RenderLoopEvent::BeforeRender);
        self.state.rendering.set(false);

        self.stage.render()?;
        self.events.emit(&RenderLoopEvent::AfterRender);
        Ok(())
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.stop();
        if let Some(listener) = self.listener.take() {
            self.stage.events().remove_listener(listener);
        }
    }
}

impl fmt::Debug for RenderLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderLoop")
            .field("running", &self.state.running.get())
            .field("requested", &self.state.requested.get())
            .field("stage", &self.stage)
            .finish()
    }
}
