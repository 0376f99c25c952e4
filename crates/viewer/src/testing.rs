//! Recording fakes for the rendering library and the host container.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use foundation::bounds::Aabb3;
use foundation::math::{Camera3D, ScreenRect, Vec3};
use futures_util::future::LocalBoxFuture;
use runtime::frame::{FrameScheduler, FrameToken};
use scene::ViewpointGraph;

use crate::adapter::{
    CameraControls, Container, ContainerNode, LoadError, LoadRequest, NodeId, ProgressReporter,
    RenderAdapter, SceneVisual, SurfaceSize,
};
use crate::config::{ControlsConfig, RendererConfig};

pub fn demo_graph() -> ViewpointGraph {
    ViewpointGraph::from_json_str(include_str!("../../../assets/viewpoints.json"))
        .expect("bundled viewpoint config")
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateRenderer(u64),
    Resize { renderer: u64, width: f64, height: f64 },
    Render { renderer: u64, visual: u64 },
    DisposeRenderer(u64),
    CreateControls(u64),
    DisposeControls(u64),
    Load(LoadRequest),
    VisualLoaded(u64),
    DisposeVisual(u64),
    RequestFrame(FrameToken),
    CancelFrame(FrameToken),
    Append(NodeId, ContainerNode),
    Remove(NodeId),
}

pub type CallLog = Rc<RefCell<Vec<Call>>>;

/// How the next `load` behaves.
pub enum LoadPlan {
    Ready,
    Fail(String),
    Deferred(Gate),
}

#[derive(Default)]
struct GateState {
    outcome: Option<Result<(), String>>,
    progress: Option<ProgressReporter>,
    waker: Option<Waker>,
}

/// Test-side handle for a load that resolves on demand.
#[derive(Clone, Default)]
pub struct Gate {
    state: Rc<RefCell<GateState>>,
}

impl Gate {
    pub fn report(&self, percent: f64) {
        if let Some(progress) = &self.state.borrow().progress {
            progress.report(percent);
        }
    }

    pub fn succeed(&self) {
        self.resolve(Ok(()));
    }

    pub fn fail(&self, reason: &str) {
        self.resolve(Err(reason.to_string()));
    }

    fn resolve(&self, outcome: Result<(), String>) {
        let waker = {
            let mut state = self.state.borrow_mut();
            state.outcome = Some(outcome);
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

struct GateFuture {
    gate: Gate,
}

impl Future for GateFuture {
    type Output = Result<(), String>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.gate.state.borrow_mut();
        match state.outcome.clone() {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

#[derive(Debug)]
pub struct FakeRenderer {
    pub id: u64,
    pub config: RendererConfig,
}

#[derive(Debug)]
pub struct FakeVisual {
    pub id: u64,
}

impl SceneVisual for FakeVisual {
    fn bounding_box(&self) -> Option<Aabb3> {
        Some(Aabb3::new([-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]))
    }
}

#[derive(Debug)]
pub struct FakeControls {
    pub id: u64,
    target: Rc<Cell<Option<Vec3>>>,
}

impl CameraControls for FakeControls {
    fn update(&mut self, _camera: &mut Camera3D) {}

    fn set_target(&mut self, target: Vec3) {
        self.target.set(Some(target));
    }
}

pub struct FakeAdapter {
    log: CallLog,
    next_id: Rc<Cell<u64>>,
    next_token: u64,
    live_frames: Vec<FrameToken>,
    plans: VecDeque<LoadPlan>,
    controls_target: Rc<Cell<Option<Vec3>>>,
    last_renderer_config: Option<RendererConfig>,
}

impl FakeAdapter {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
            next_id: Rc::new(Cell::new(0)),
            next_token: 0,
            live_frames: Vec::new(),
            plans: VecDeque::new(),
            controls_target: Rc::new(Cell::new(None)),
            last_renderer_config: None,
        }
    }

    pub fn log(&self) -> CallLog {
        Rc::clone(&self.log)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.log.borrow().iter().filter(|c| pred(c)).count()
    }

    pub fn plan(&mut self, plan: LoadPlan) {
        self.plans.push_back(plan);
    }

    pub fn plan_deferred(&mut self) -> Gate {
        let gate = Gate::default();
        self.plans.push_back(LoadPlan::Deferred(gate.clone()));
        gate
    }

    /// Outstanding frame callback, if any.
    pub fn pending_frame(&self) -> Option<FrameToken> {
        self.live_frames.last().copied()
    }

    /// Fires the oldest outstanding frame callback, as the host would.
    pub fn next_frame(&self) -> Option<FrameToken> {
        self.live_frames.first().copied()
    }

    pub fn live_renderers(&self) -> usize {
        self.balance(
            |c| matches!(c, Call::CreateRenderer(_)),
            |c| matches!(c, Call::DisposeRenderer(_)),
        )
    }

    pub fn live_controls(&self) -> usize {
        self.balance(
            |c| matches!(c, Call::CreateControls(_)),
            |c| matches!(c, Call::DisposeControls(_)),
        )
    }

    pub fn live_visuals(&self) -> usize {
        self.balance(
            |c| matches!(c, Call::VisualLoaded(_)),
            |c| matches!(c, Call::DisposeVisual(_)),
        )
    }

    pub fn last_request(&self) -> Option<LoadRequest> {
        self.log.borrow().iter().rev().find_map(|c| match c {
            Call::Load(request) => Some(request.clone()),
            _ => None,
        })
    }

    pub fn last_renderer_config(&self) -> Option<RendererConfig> {
        self.last_renderer_config.clone()
    }

    pub fn controls_target(&self) -> Option<Vec3> {
        self.controls_target.get()
    }

    fn balance(&self, created: impl Fn(&Call) -> bool, disposed: impl Fn(&Call) -> bool) -> usize {
        self.count(created) - self.count(disposed)
    }

    fn fresh_id(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    fn record(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }
}

impl FrameScheduler for FakeAdapter {
    fn request_frame(&mut self) -> FrameToken {
        self.next_token += 1;
        let token = FrameToken(self.next_token);
        // The host fires callbacks once: the previous one is consumed.
        self.live_frames.clear();
        self.live_frames.push(token);
        self.record(Call::RequestFrame(token));
        token
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        self.live_frames.retain(|t| *t != token);
        self.record(Call::CancelFrame(token));
    }
}

impl RenderAdapter for FakeAdapter {
    type Renderer = FakeRenderer;
    type Controls = FakeControls;
    type Visual = FakeVisual;

    fn create_renderer(&mut self, config: &RendererConfig, _size: SurfaceSize) -> FakeRenderer {
        let id = self.fresh_id();
        self.record(Call::CreateRenderer(id));
        self.last_renderer_config = Some(config.clone());
        FakeRenderer {
            id,
            config: config.clone(),
        }
    }

    fn resize_renderer(&mut self, renderer: &mut FakeRenderer, size: SurfaceSize) {
        self.record(Call::Resize {
            renderer: renderer.id,
            width: size.width,
            height: size.height,
        });
    }

    fn render(&mut self, renderer: &mut FakeRenderer, visual: &FakeVisual, _camera: &Camera3D) {
        self.record(Call::Render {
            renderer: renderer.id,
            visual: visual.id,
        });
    }

    fn dispose_renderer(&mut self, renderer: FakeRenderer) {
        self.record(Call::DisposeRenderer(renderer.id));
    }

    fn create_controls(&mut self, camera: &Camera3D, _config: &ControlsConfig) -> FakeControls {
        let id = self.fresh_id();
        self.record(Call::CreateControls(id));
        self.controls_target.set(Some(camera.target));
        FakeControls {
            id,
            target: Rc::clone(&self.controls_target),
        }
    }

    fn dispose_controls(&mut self, controls: FakeControls) {
        self.record(Call::DisposeControls(controls.id));
    }

    fn load(
        &mut self,
        request: LoadRequest,
        progress: ProgressReporter,
    ) -> LocalBoxFuture<'static, Result<FakeVisual, LoadError>> {
        self.record(Call::Load(request.clone()));
        let plan = self.plans.pop_front().unwrap_or(LoadPlan::Ready);
        let log = Rc::clone(&self.log);
        let next_id = Rc::clone(&self.next_id);
        let url = request.source.url().to_string();
        let gate = match plan {
            LoadPlan::Ready => {
                let gate = Gate::default();
                gate.succeed();
                gate
            }
            LoadPlan::Fail(reason) => {
                let gate = Gate::default();
                gate.fail(&reason);
                gate
            }
            LoadPlan::Deferred(gate) => gate,
        };
        gate.state.borrow_mut().progress = Some(progress.clone());

        Box::pin(async move {
            let outcome = GateFuture { gate }.await;
            match outcome {
                Ok(()) => {
                    progress.report(100.0);
                    let id = next_id.get() + 1;
                    next_id.set(id);
                    log.borrow_mut().push(Call::VisualLoaded(id));
                    Ok(FakeVisual { id })
                }
                Err(reason) => Err(LoadError::Asset { url, reason }),
            }
        })
    }

    fn dispose_visual(&mut self, visual: FakeVisual) {
        self.record(Call::DisposeVisual(visual.id));
    }
}

pub struct FakeContainer {
    log: CallLog,
    rect: Cell<ScreenRect>,
    next: u64,
    nodes: Vec<(NodeId, ContainerNode)>,
}

impl FakeContainer {
    pub fn new(log: CallLog, rect: ScreenRect) -> Self {
        Self {
            log,
            rect: Cell::new(rect),
            next: 0,
            nodes: Vec::new(),
        }
    }

    pub fn set_rect(&self, rect: ScreenRect) {
        self.rect.set(rect);
    }

    pub fn nodes(&self) -> Vec<ContainerNode> {
        self.nodes.iter().map(|(_, n)| n.clone()).collect()
    }
}

impl Container for FakeContainer {
    fn rect(&self) -> ScreenRect {
        self.rect.get()
    }

    fn device_pixel_ratio(&self) -> f64 {
        3.0
    }

    fn append(&mut self, node: ContainerNode) -> NodeId {
        self.next += 1;
        let id = NodeId(self.next);
        self.log.borrow_mut().push(Call::Append(id, node.clone()));
        self.nodes.push((id, node));
        id
    }

    fn remove(&mut self, node: NodeId) {
        self.log.borrow_mut().push(Call::Remove(node));
        self.nodes.retain(|(id, _)| *id != node);
    }
}
