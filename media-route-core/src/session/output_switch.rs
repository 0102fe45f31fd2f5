use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::catalog::route_catalog::RouteCatalog;
use crate::models::config::ControllerConfiguration;
use crate::models::error::{HostRejection, SwitchFailed, SwitchFailureReason};
use crate::models::event::RouteEvent;
use crate::models::request::SwitchReason;
use crate::models::route::AudioRoute;
use crate::models::state::{ActiveRouteState, RouteApplied, SwitchPhase};
use crate::notify::change_notifier::ChangeNotifier;
use crate::traits::output_host::{ApplyCompletion, OutputHost};

type SwitchOutcome = Result<RouteApplied, SwitchFailed>;

/// A host call that has been issued but not answered.
#[derive(Debug, Clone, Copy)]
struct InFlight {
    generation: u64,
    deadline: Instant,
}

/// Internal mutable switch state, protected by `parking_lot::Mutex`.
struct SwitchState {
    session_active: bool,
    current: Option<AudioRoute>,
    phase: SwitchPhase,
    /// Generation that owns the `Pending` phase.
    pending_generation: Option<u64>,
    next_generation: u64,
    /// The single host slot. At most one host call is unresolved at a time.
    in_flight: Option<InFlight>,
    /// Committed host answers not yet collected by their waiter.
    outcomes: Vec<(u64, SwitchOutcome)>,
}

impl SwitchState {
    fn new() -> Self {
        Self {
            session_active: false,
            current: None,
            phase: SwitchPhase::Idle,
            pending_generation: None,
            next_generation: 0,
            in_flight: None,
            outcomes: Vec::new(),
        }
    }

    fn owns_pending(&self, generation: u64) -> bool {
        self.pending_generation == Some(generation)
    }

    fn take_outcome(&mut self, generation: u64) -> Option<SwitchOutcome> {
        let index = self.outcomes.iter().position(|(g, _)| *g == generation)?;
        Some(self.outcomes.remove(index).1)
    }

    fn snapshot(&self) -> ActiveRouteState {
        ActiveRouteState {
            session_active: self.session_active,
            current: self.current.clone(),
            pending: self.phase.pending_target().cloned(),
        }
    }
}

/// State shared with host completions, which may run on any thread.
struct Shared {
    state: Mutex<SwitchState>,
    changed: Condvar,
    catalog: Arc<RouteCatalog>,
    notifier: Arc<ChangeNotifier>,
}

impl Shared {
    /// Turn a host answer for the pending owner into a committed outcome.
    fn settle(
        &self,
        state: &mut SwitchState,
        generation: u64,
        route: &AudioRoute,
        reason: SwitchReason,
        result: Result<(), HostRejection>,
    ) -> SwitchOutcome {
        let device_id = route.device_id();
        match result {
            Ok(()) if !self.catalog.contains(device_id) => {
                log::warn!("Route '{}' disconnected while the switch was in flight", device_id);
                let failure = SwitchFailed::new(SwitchFailureReason::StaleTarget, device_id);
                Err(self.fail(state, generation, failure))
            }
            Ok(()) => Ok(self.succeed(state, generation, route, reason, true)),
            Err(rejection) => {
                log::error!("Host rejected switch to '{}': {}", device_id, rejection);
                Err(self.fail(state, generation, SwitchFailed::rejected(device_id, rejection)))
            }
        }
    }

    /// Failure for a request that lost ownership of the pending slot.
    fn displaced(&self, state: &SwitchState, device_id: &str) -> SwitchFailed {
        let reason = if state.session_active {
            SwitchFailureReason::Superseded
        } else {
            SwitchFailureReason::StaleTarget
        };
        self.reject(SwitchFailed::new(reason, device_id))
    }

    /// Report a failure for a request that never owned the pending phase.
    fn reject(&self, failure: SwitchFailed) -> SwitchFailed {
        self.notifier.publish(RouteEvent::SwitchFailed(failure.clone()));
        failure
    }

    fn fail(
        &self,
        state: &mut SwitchState,
        generation: u64,
        failure: SwitchFailed,
    ) -> SwitchFailed {
        if state.owns_pending(generation) {
            state.pending_generation = None;
            state.phase = SwitchPhase::Failed(failure.clone());
            self.notifier.publish(RouteEvent::SwitchFailed(failure.clone()));
            state.phase = SwitchPhase::Idle;
        } else {
            self.notifier.publish(RouteEvent::SwitchFailed(failure.clone()));
        }
        self.changed.notify_all();
        failure
    }

    fn succeed(
        &self,
        state: &mut SwitchState,
        generation: u64,
        route: &AudioRoute,
        reason: SwitchReason,
        changed: bool,
    ) -> RouteApplied {
        let applied = RouteApplied {
            route: route.clone(),
            previous: state.current.replace(route.clone()),
            reason,
            changed,
        };
        if state.owns_pending(generation) {
            state.pending_generation = None;
        }
        state.phase = SwitchPhase::Applied(applied.clone());
        if changed {
            log::info!("Output route applied: {} ({:?})", route, reason);
        }
        self.notifier.publish(RouteEvent::RouteApplied(applied.clone()));
        state.phase = SwitchPhase::Idle;
        self.changed.notify_all();
        applied
    }
}

/// Applies route changes to the live session, one at a time.
///
/// Sole mutator of the active route. Every apply runs the state machine
/// `Idle → Pending → {Applied, Failed} → Idle` and re-validates its target
/// against the catalog both before and after the host call, since hot-plug
/// events may land at any point in between.
///
/// A host answer that arrives while its request still owns the pending slot
/// is committed on the spot, so a request queued behind it always starts from
/// the route the host actually confirmed.
///
/// ```text
/// apply ─→ [Pending] ─→ wait for slot ─→ validate ─→ host call ─→ commit ─→ [Applied]
///             ↓               ↓              ↓             ↓           ↓
///        Busy/superseded  superseded    StaleTarget   Timeout or   StaleTarget
///                                                      Rejected      [Failed]
/// ```
pub struct OutputSwitch<H: OutputHost> {
    host: Arc<H>,
    shared: Arc<Shared>,
    queue_on_pending: bool,
    apply_timeout: Duration,
}

impl<H: OutputHost> OutputSwitch<H> {
    pub fn new(
        host: Arc<H>,
        catalog: Arc<RouteCatalog>,
        notifier: Arc<ChangeNotifier>,
        config: &ControllerConfiguration,
    ) -> Self {
        Self {
            host,
            shared: Arc::new(Shared {
                state: Mutex::new(SwitchState::new()),
                changed: Condvar::new(),
                catalog,
                notifier,
            }),
            queue_on_pending: config.queue_on_pending,
            apply_timeout: config.apply_timeout,
        }
    }

    pub fn state(&self) -> ActiveRouteState {
        self.shared.state.lock().snapshot()
    }

    pub fn phase(&self) -> SwitchPhase {
        self.shared.state.lock().phase.clone()
    }

    pub fn current(&self) -> Option<AudioRoute> {
        self.shared.state.lock().current.clone()
    }

    pub fn is_session_active(&self) -> bool {
        self.shared.state.lock().session_active
    }

    /// Create the active-route state for a new session. Returns false if one
    /// is already live.
    pub fn begin_session(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.session_active {
            return false;
        }
        state.session_active = true;
        state.current = None;
        state.phase = SwitchPhase::Idle;
        state.pending_generation = None;
        state.outcomes.clear();
        log::info!("Media session started");
        self.shared.notifier.publish(RouteEvent::SessionStateChanged(true));
        true
    }

    /// Tear down the session. Pending switches fail with `StaleTarget`.
    ///
    /// An unanswered host call keeps the host slot until it answers or its
    /// deadline passes, so a quick restart cannot overlap it.
    pub fn end_session(&self) -> bool {
        let mut state = self.shared.state.lock();
        if !state.session_active {
            return false;
        }
        state.session_active = false;
        state.current = None;
        state.phase = SwitchPhase::Idle;
        state.pending_generation = None;
        state.outcomes.clear();
        self.shared.changed.notify_all();
        log::info!("Media session ended");
        self.shared.notifier.publish(RouteEvent::SessionStateChanged(false));
        true
    }

    /// Forget the active route if it is `device_id`. Used when the device
    /// disappears.
    pub fn clear_current_if(&self, device_id: &str) -> bool {
        let mut state = self.shared.state.lock();
        if state.current.as_ref().is_some_and(|r| r.device_id() == device_id) {
            log::warn!("Active route '{}' disconnected", device_id);
            state.current = None;
            return true;
        }
        false
    }

    /// Make `route` the active output for the session.
    ///
    /// Blocks until the host answers, the request is superseded, or
    /// `apply_timeout` elapses. Never retries.
    pub fn apply(&self, route: &AudioRoute, reason: SwitchReason) -> SwitchOutcome {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        let device_id = route.device_id();

        if !state.session_active {
            let failure = SwitchFailed::new(SwitchFailureReason::StaleTarget, device_id);
            return Err(shared.reject(failure));
        }

        if state.pending_generation.is_some() {
            if !self.queue_on_pending {
                log::debug!("Switch to '{}' rejected, another switch is pending", device_id);
                return Err(shared.reject(SwitchFailed::new(SwitchFailureReason::Busy, device_id)));
            }
            if let Some(previous) = state.phase.pending_target() {
                log::info!(
                    "Switch to '{}' supersedes pending switch to '{}'",
                    device_id,
                    previous.device_id()
                );
            }
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        state.pending_generation = Some(generation);
        state.phase = SwitchPhase::Pending {
            target: route.clone(),
            reason,
        };
        shared.changed.notify_all();
        shared.notifier.publish(RouteEvent::SwitchPending {
            target: route.clone(),
            reason,
        });

        self.wait_for_slot(&mut state, generation, device_id)?;

        if !shared.catalog.contains(device_id) {
            log::warn!("Switch target '{}' left the catalog before it was applied", device_id);
            let failure = SwitchFailed::new(SwitchFailureReason::StaleTarget, device_id);
            return Err(shared.fail(&mut state, generation, failure));
        }

        if state.current.as_ref().is_some_and(|r| r.is_same_device(route)) {
            log::debug!("Route '{}' already active", device_id);
            return Ok(shared.succeed(&mut state, generation, route, reason, false));
        }

        let deadline = Instant::now() + self.apply_timeout;
        state.in_flight = Some(InFlight { generation, deadline });

        let completion = self.completion_for(generation, route.clone(), reason);
        log::debug!("Requesting host route change to {}", route);
        MutexGuard::unlocked(&mut state, || self.host.set_active_output(route, completion));

        self.wait_for_outcome(&mut state, generation, deadline, device_id)
    }

    /// Wait until no host call is unresolved, giving up if this request loses
    /// ownership.
    fn wait_for_slot(
        &self,
        state: &mut MutexGuard<'_, SwitchState>,
        generation: u64,
        device_id: &str,
    ) -> Result<(), SwitchFailed> {
        loop {
            if !state.owns_pending(generation) {
                return Err(self.shared.displaced(state, device_id));
            }
            let in_flight = state.in_flight;
            match in_flight {
                None => return Ok(()),
                Some(flight) if Instant::now() >= flight.deadline => {
                    log::warn!(
                        "Abandoned host call (generation {}) never answered, reclaiming slot",
                        flight.generation
                    );
                    state.in_flight = None;
                    return Ok(());
                }
                Some(flight) => {
                    self.shared.changed.wait_until(state, flight.deadline);
                }
            }
        }
    }

    /// Wait for the committed outcome of this request's host call.
    fn wait_for_outcome(
        &self,
        state: &mut MutexGuard<'_, SwitchState>,
        generation: u64,
        deadline: Instant,
        device_id: &str,
    ) -> SwitchOutcome {
        loop {
            // Committed answers win over a later supersede or deadline.
            if let Some(outcome) = state.take_outcome(generation) {
                return outcome;
            }
            if !state.owns_pending(generation) {
                return Err(self.shared.displaced(state, device_id));
            }
            if Instant::now() >= deadline {
                if state.in_flight.is_some_and(|f| f.generation == generation) {
                    state.in_flight = None;
                }
                log::error!(
                    "Host did not confirm switch to '{}' within {:?}",
                    device_id,
                    self.apply_timeout
                );
                let failure = SwitchFailed::new(SwitchFailureReason::Timeout, device_id);
                return Err(self.shared.fail(state, generation, failure));
            }
            self.shared.changed.wait_until(state, deadline);
        }
    }

    /// Completion that commits the host answer while its request still owns
    /// the pending slot, and ignores it otherwise.
    fn completion_for(
        &self,
        generation: u64,
        route: AudioRoute,
        reason: SwitchReason,
    ) -> ApplyCompletion {
        let shared = Arc::clone(&self.shared);
        Box::new(move |result: Result<(), HostRejection>| {
            let mut state = shared.state.lock();
            let is_current_call = state.in_flight.is_some_and(|f| f.generation == generation);
            if !is_current_call {
                log::debug!(
                    "Ignoring late host answer for timed-out switch (generation {})",
                    generation
                );
                return;
            }
            state.in_flight = None;
            if state.owns_pending(generation) {
                let outcome = shared.settle(&mut state, generation, &route, reason, result);
                state.outcomes.push((generation, outcome));
            } else {
                log::debug!(
                    "Ignoring host answer for abandoned switch (generation {})",
                    generation
                );
            }
            shared.changed.notify_all();
        })
    }
}
