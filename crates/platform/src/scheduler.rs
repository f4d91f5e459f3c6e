//! Decides when a frame is due.

use serde::{Deserialize, Serialize};

/// Fixed at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    /// Render only on asset-ready, resize and interaction; idle otherwise.
    EventDriven,
    /// Render on every display refresh tick.
    #[default]
    Continuous,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    AssetReady,
    Resize,
    Interaction,
    /// Display refresh.
    Tick,
}

/// Coalescing render request: any number of accepted signals between two
/// frames produce one render.
#[derive(Debug)]
pub struct RenderScheduler {
    mode: RenderMode,
    due: bool,
}

impl RenderScheduler {
    pub fn new(mode: RenderMode) -> Self {
        Self { mode, due: false }
    }

    #[inline]
    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Returns `true` if the signal marked a frame as due.
    pub fn signal(&mut self, signal: Signal) -> bool {
        let accepted = match (self.mode, signal) {
            (RenderMode::Continuous, _) => true,
            (RenderMode::EventDriven, Signal::Tick) => false,
            (RenderMode::EventDriven, _) => true,
        };
        if accepted {
            self.due = true;
        }
        accepted
    }

    #[inline]
    pub fn is_due(&self) -> bool {
        self.due
    }

    /// Consume the pending request.
    pub fn take_due(&mut self) -> bool {
        std::mem::take(&mut self.due)
    }

    /// The event loop should keep polling rather than wait for events.
    pub fn wants_polling(&self) -> bool {
        self.mode == RenderMode::Continuous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signals_coalesce_into_one_frame() {
        let mut s = RenderScheduler::new(RenderMode::EventDriven);
        assert!(!s.take_due());
        s.signal(Signal::AssetReady);
        s.signal(Signal::Resize);
        s.signal(Signal::Interaction);
        assert!(s.is_due());
        assert!(s.take_due());
        assert!(!s.take_due());
    }

    #[test]
    fn event_driven_ignores_ticks() {
        let mut s = RenderScheduler::new(RenderMode::EventDriven);
        assert!(!s.signal(Signal::Tick));
        assert!(!s.is_due());
        assert!(!s.wants_polling());
    }

    #[test]
    fn continuous_renders_every_tick() {
        let mut s = RenderScheduler::new(RenderMode::Continuous);
        let mut renders = 0;
        for _ in 0..5 {
            s.signal(Signal::Tick);
            if s.take_due() {
                renders += 1;
            }
        }
        assert_eq!(renders, 5);
        assert!(s.wants_polling());
    }

    #[test]
    fn mode_parses_kebab_case() {
        #[derive(Deserialize)]
        struct Wrap {
            mode: RenderMode,
        }
        let w: Wrap = toml::from_str(r#"mode = "event-driven""#).unwrap();
        assert_eq!(w.mode, RenderMode::EventDriven);
    }
}
