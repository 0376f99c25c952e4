//! Viewpoint transitions.
//!
//! Two states: idle, and transitioning towards exactly one target. A
//! transition is started with [`NavigationController::begin`] and completed
//! with [`NavigationController::finish`]; `current` only changes at finish.

use runtime::event_bus::{SubscriptionId, Subscribers};
use scene::{Direction, ViewpointGraph};
use tracing::{debug, info, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum TransitionKind {
    Forward,
    Back,
}

/// Proof of an in-flight transition, consumed by `finish`.
#[derive(Debug, PartialEq, Eq)]
pub struct Transition {
    serial: u64,
    from: String,
    to: String,
    kind: TransitionKind,
}

impl Transition {
    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn is_back(&self) -> bool {
        self.kind == TransitionKind::Back
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    Started { from: String, to: String },
    Completed { from: String, to: String },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NavigationKey {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Backspace,
}

#[derive(Debug)]
pub struct NavigationController {
    current: String,
    in_flight: Option<(u64, TransitionKind)>,
    next_serial: u64,
    history: Vec<String>,
    subscribers: Subscribers<NavigationEvent>,
}

impl NavigationController {
    /// Starts idle at the graph's initial viewpoint.
    pub fn new(graph: &ViewpointGraph) -> Self {
        let initial = graph.initial_id().to_string();
        Self {
            current: initial.clone(),
            in_flight: None,
            next_serial: 0,
            history: vec![initial],
            subscribers: Subscribers::new(),
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn is_transitioning(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Visited viewpoints, oldest first; the last entry is `current`.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn can_go_back(&self) -> bool {
        self.history.len() > 1
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&NavigationEvent) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Directions with a connection from the current viewpoint.
    pub fn available_directions(&self, graph: &ViewpointGraph) -> Vec<Direction> {
        graph
            .get(&self.current)
            .map(|vp| vp.connections.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Starts a transition to `target`.
    ///
    /// `None` when `target` is current, unknown, or another transition is
    /// in flight; concurrent requests coalesce to the first.
    pub fn begin(&mut self, graph: &ViewpointGraph, target: &str) -> Option<Transition> {
        self.start(graph, target, TransitionKind::Forward)
    }

    /// Starts a transition to the previous history entry.
    pub fn go_back(&mut self, graph: &ViewpointGraph) -> Option<Transition> {
        if !self.can_go_back() {
            debug!("no history to go back to");
            return None;
        }
        let target = self.history[self.history.len() - 2].clone();
        self.start(graph, &target, TransitionKind::Back)
    }

    /// Follows the current viewpoint's connection in `direction`.
    pub fn navigate(&mut self, graph: &ViewpointGraph, direction: Direction) -> Option<Transition> {
        let Some(target) = graph
            .get(&self.current)
            .and_then(|vp| vp.connection(direction))
        else {
            debug!(from = %self.current, %direction, "no connection");
            return None;
        };
        let target = target.to_string();
        self.begin(graph, &target)
    }

    pub fn handle_key(&mut self, graph: &ViewpointGraph, key: NavigationKey) -> Option<Transition> {
        match key {
            NavigationKey::ArrowUp => self.navigate(graph, Direction::Forward),
            NavigationKey::ArrowLeft => self.navigate(graph, Direction::Left),
            NavigationKey::ArrowRight => self.navigate(graph, Direction::Right),
            NavigationKey::ArrowDown => {
                let has_back = graph
                    .get(&self.current)
                    .is_some_and(|vp| vp.connection(Direction::Back).is_some());
                if has_back {
                    self.navigate(graph, Direction::Back)
                } else {
                    self.go_back(graph)
                }
            }
            NavigationKey::Backspace => self.go_back(graph),
        }
    }

    fn start(
        &mut self,
        graph: &ViewpointGraph,
        target: &str,
        kind: TransitionKind,
    ) -> Option<Transition> {
        if self.in_flight.is_some() {
            debug!(viewpoint = target, "navigation ignored, transition in flight");
            return None;
        }
        if target == self.current {
            debug!(viewpoint = target, "navigation ignored, already there");
            return None;
        }
        if !graph.contains(target) {
            debug!(viewpoint = target, "navigation ignored, unknown viewpoint");
            return None;
        }

        self.next_serial += 1;
        self.in_flight = Some((self.next_serial, kind));
        info!(from = %self.current, to = target, "transition started");
        self.subscribers.emit(&NavigationEvent::Started {
            from: self.current.clone(),
            to: target.to_string(),
        });
        Some(Transition {
            serial: self.next_serial,
            from: self.current.clone(),
            to: target.to_string(),
            kind,
        })
    }

    /// Lands on the transition's target and returns to idle.
    ///
    /// Returns `false` for a transition that is not the one in flight.
    pub fn finish(&mut self, transition: Transition) -> bool {
        if self.in_flight != Some((transition.serial, transition.kind)) {
            warn!(to = %transition.to, "ignoring completion of a transition that is not in flight");
            return false;
        }
        self.in_flight = None;
        match transition.kind {
            TransitionKind::Forward => self.history.push(transition.to.clone()),
            TransitionKind::Back => {
                self.history.pop();
            }
        }
        self.current = transition.to.clone();
        info!(from = %transition.from, to = %transition.to, "transition finished");
        self.subscribers.emit(&NavigationEvent::Completed {
            from: transition.from,
            to: transition.to,
        });
        true
    }
}
