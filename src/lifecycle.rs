use embassy_time::{Duration, Instant};
use embedded_hal::digital::InputPin;
use statig::blocking::IntoStateMachineExt as _;
use statig::prelude::*;

use crate::media::MediaPort;
use crate::session::{CardHooks, CardSession};

/// How long the detect level must hold steady before an edge is believed.
pub const MEDIA_SETTLE: Duration = Duration::from_millis(250);

/// A believed change of the media presence level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaEvent {
    Inserted,
    Removed,
}

/// Side effects requested by one lifecycle step, applied by [`service_media`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MediaActions {
    pub mount: bool,
    pub unmount: bool,
    pub abort_print: bool,
}

impl MediaActions {
    pub fn any(&self) -> bool {
        self.mount || self.unmount || self.abort_print
    }
}

/// Debounce for the card-detect contact. Mechanical insertion chatters, so
/// a raw level only becomes an edge after holding for [`MEDIA_SETTLE`].
pub struct DetectDebounce {
    stable: bool,
    candidate: bool,
    since: Instant,
}

impl DetectDebounce {
    /// Starts believing the media absent; a present card at boot surfaces
    /// as an insertion once the level has settled.
    pub fn new(now: Instant) -> Self {
        Self {
            stable: false,
            candidate: false,
            since: now,
        }
    }

    pub fn is_present(&self) -> bool {
        self.stable
    }

    pub fn poll(&mut self, present: bool, now: Instant) -> Option<MediaEvent> {
        if present != self.candidate {
            self.candidate = present;
            self.since = now;
        }
        if self.candidate == self.stable {
            return None;
        }
        if now.saturating_duration_since(self.since) < MEDIA_SETTLE {
            return None;
        }
        self.stable = self.candidate;
        Some(if self.stable {
            MediaEvent::Inserted
        } else {
            MediaEvent::Removed
        })
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct MediaMachine;

#[derive(Clone, Copy, Debug, Default)]
struct DispatchContext {
    print_active: bool,
    actions: MediaActions,
}

#[state_machine(initial = "State::absent()")]
impl MediaMachine {
    #[state]
    fn absent(&mut self, context: &mut DispatchContext, event: &MediaEvent) -> Outcome<State> {
        match event {
            MediaEvent::Inserted => {
                context.actions.mount = true;
                Transition(State::present())
            }
            MediaEvent::Removed => Handled,
        }
    }

    #[state]
    fn present(&mut self, context: &mut DispatchContext, event: &MediaEvent) -> Outcome<State> {
        match event {
            MediaEvent::Removed => {
                // Media yanked mid-job is a hard stop before teardown.
                if context.print_active {
                    context.actions.abort_print = true;
                }
                context.actions.unmount = true;
                Transition(State::absent())
            }
            MediaEvent::Inserted => Handled,
        }
    }
}

/// Polls a detect pin, debounces it and turns believed edges into
/// mount/unmount action sets.
pub struct MediaLifecycle<PIN: InputPin> {
    pin: PIN,
    present_level: bool,
    debounce: DetectDebounce,
    machine: statig::blocking::StateMachine<MediaMachine>,
}

impl<PIN: InputPin> MediaLifecycle<PIN> {
    /// `present_level` is the pin level that means a card is seated
    /// (false for the usual active-low detect switch).
    pub fn new(pin: PIN, present_level: bool, now: Instant) -> Self {
        Self {
            pin,
            present_level,
            debounce: DetectDebounce::new(now),
            machine: MediaMachine.state_machine(),
        }
    }

    pub fn media_present(&self) -> bool {
        self.debounce.is_present()
    }

    /// One lifecycle step. A pin read fault counts as no change.
    pub fn poll(&mut self, now: Instant, print_active: bool) -> MediaActions {
        let Ok(level) = self.pin.is_high() else {
            return MediaActions::default();
        };
        let present = level == self.present_level;
        let Some(event) = self.debounce.poll(present, now) else {
            return MediaActions::default();
        };
        log::debug!(
            "card: media_edge event={}",
            match event {
                MediaEvent::Inserted => "inserted",
                MediaEvent::Removed => "removed",
            }
        );
        let mut context = DispatchContext {
            print_active,
            ..Default::default()
        };
        self.machine.handle_with_context(&event, &mut context);
        context.actions
    }
}

/// Apply one action set to the session and notify the host hooks. Abort
/// runs before teardown so the job is stopped while state is still sane.
pub fn service_media<P: MediaPort, H: CardHooks>(
    actions: MediaActions,
    session: &mut CardSession<P>,
    port: &mut P,
    hooks: &mut H,
) {
    if actions.abort_print {
        session.abort_print(port);
        hooks.on_print_abort();
    }
    if actions.unmount {
        session.release(port);
        hooks.on_unmount();
    }
    if actions.mount && session.mount(port).is_ok() {
        hooks.on_mount();
        // An interrupted job takes precedence over the autostart scan.
        if !hooks.recover_job() {
            session.begin_autostart();
        }
    }
}
