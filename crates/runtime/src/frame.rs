use foundation::time::Time;

/// Deterministic frame metadata.
///
/// Frames are numbered per render loop, so a freshly started loop always
/// begins at index 0.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Fixed delta time (seconds).
    pub dt_s: f64,
    /// Loop time at the start of the frame (seconds).
    pub time: Time,
}

impl Frame {
    pub fn new(index: u64, dt_s: f64) -> Self {
        Self {
            index,
            dt_s,
            time: Time(index as f64 * dt_s),
        }
    }

    pub fn next(self) -> Self {
        Self::new(self.index + 1, self.dt_s)
    }
}

/// Opaque handle for one scheduled frame callback.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameToken(pub u64);

/// The host's once-per-display-refresh primitive.
///
/// Implementations invoke the owner's frame handler with the returned token
/// at the next refresh, unless the token was cancelled first.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameToken;
    fn cancel_frame(&mut self, token: FrameToken);
}

/// Bookkeeping for a self-rescheduling render loop.
///
/// At most one frame request is outstanding at a time. After `stop`, no
/// token issued earlier is accepted again, so a callback that was already
/// queued by the host cannot produce another frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLoop {
    dt_s: f64,
    running: bool,
    pending: Option<FrameToken>,
    next: Frame,
    frames_run: u64,
}

impl FrameLoop {
    pub fn new(dt_s: f64) -> Self {
        Self {
            dt_s,
            running: false,
            pending: None,
            next: Frame::new(0, dt_s),
            frames_run: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn pending(&self) -> Option<FrameToken> {
        self.pending
    }

    /// Total frames accepted since construction (across restarts).
    pub fn frames_run(&self) -> u64 {
        self.frames_run
    }

    /// Start the loop and request the first frame. No-op if already running.
    pub fn start<S: FrameScheduler + ?Sized>(&mut self, scheduler: &mut S) {
        if self.running {
            return;
        }
        self.running = true;
        self.next = Frame::new(0, self.dt_s);
        self.pending = Some(scheduler.request_frame());
    }

    /// Accept a fired frame callback.
    ///
    /// Returns the frame to run, or `None` for a stale/unknown token or a
    /// stopped loop. The next frame is requested before returning.
    pub fn accept<S: FrameScheduler + ?Sized>(
        &mut self,
        token: FrameToken,
        scheduler: &mut S,
    ) -> Option<Frame> {
        if !self.running || self.pending != Some(token) {
            return None;
        }
        let frame = self.next;
        self.next = frame.next();
        self.frames_run += 1;
        self.pending = Some(scheduler.request_frame());
        Some(frame)
    }

    /// Stop the loop, cancelling the outstanding request. Idempotent.
    pub fn stop<S: FrameScheduler + ?Sized>(&mut self, scheduler: &mut S) {
        if let Some(token) = self.pending.take() {
            scheduler.cancel_frame(token);
        }
        self.running = false;
    }
}
