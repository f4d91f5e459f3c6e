//! Ordered pass chain for composited rendering.
//!
//! A chain is `scene -> effect* -> output`. Intermediate results ping-pong
//! between two offscreen targets; the output pass always writes the screen.
//! The chain is generic over the per-frame context so routing and ordering
//! are independent of the GPU backend.

use crate::RenderError;

/// Handle for a pass in a chain (its insertion index).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PassId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassKind {
    /// Draws the scene; reads nothing.
    Scene,
    /// Reads the previous result, writes a new one.
    Effect,
    /// Final pass to the screen.
    Output,
}

/// Where a pass reads from or writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    Offscreen(u8),
    Screen,
}

/// Resolved routing for one pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassIo {
    pub input: Option<Target>,
    pub output: Target,
}

/// One step of the chain.
pub trait Pass<C> {
    fn label(&self) -> &str;

    fn kind(&self) -> PassKind;

    fn run(&mut self, ctx: &mut C, io: PassIo) -> Result<(), RenderError>;
}

pub struct PassChain<C> {
    passes: Vec<Box<dyn Pass<C>>>,
    routing: Vec<PassIo>,
}

impl<C> PassChain<C> {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            routing: Vec::new(),
        }
    }

    /// Append a pass. Invalidates any previous compile.
    pub fn add_pass(&mut self, pass: Box<dyn Pass<C>>) -> PassId {
        let id = PassId(self.passes.len() as u32);
        self.passes.push(pass);
        self.routing.clear();
        id
    }

    pub fn with_pass(mut self, pass: Box<dyn Pass<C>>) -> Self {
        self.add_pass(pass);
        self
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.label()).collect()
    }

    pub fn is_compiled(&self) -> bool {
        !self.passes.is_empty() && self.routing.len() == self.passes.len()
    }

    /// Validate the chain shape and compute ping-pong routing.
    pub fn compile(&mut self) -> Result<(), RenderError> {
        let kinds: Vec<PassKind> = self.passes.iter().map(|p| p.kind()).collect();
        match (kinds.first(), kinds.last()) {
            (None, _) | (_, None) => {
                return Err(RenderError::InvalidChain("chain has no passes".into()));
            }
            (Some(PassKind::Scene), Some(PassKind::Output)) if kinds.len() >= 2 => {}
            _ => {
                return Err(RenderError::InvalidChain(format!(
                    "expected scene -> effect* -> output, got {:?}",
                    kinds
                )));
            }
        }
        if let Some(pos) = kinds[1..kinds.len() - 1]
            .iter()
            .position(|k| *k != PassKind::Effect)
        {
            return Err(RenderError::InvalidChain(format!(
                "pass '{}' must be an effect",
                self.passes[pos + 1].label()
            )));
        }

        let mut routing = Vec::with_capacity(kinds.len());
        let mut current = 0u8;
        routing.push(PassIo {
            input: None,
            output: Target::Offscreen(current),
        });
        for _ in 1..kinds.len() - 1 {
            let next = 1 - current;
            routing.push(PassIo {
                input: Some(Target::Offscreen(current)),
                output: Target::Offscreen(next),
            });
            current = next;
        }
        routing.push(PassIo {
            input: Some(Target::Offscreen(current)),
            output: Target::Screen,
        });

        self.routing = routing;
        log::debug!("Pass chain compiled: {:?}", self.labels());
        Ok(())
    }

    pub fn routing(&self) -> &[PassIo] {
        &self.routing
    }

    /// Run every pass in order. Compiles first if needed.
    pub fn execute(&mut self, ctx: &mut C) -> Result<(), RenderError> {
        if !self.is_compiled() {
            self.compile()?;
        }
        for (pass, io) in self.passes.iter_mut().zip(self.routing.iter()) {
            pass.run(ctx, *io)?;
        }
        Ok(())
    }
}

impl<C> Default for PassChain<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        runs: Vec<(String, PassIo)>,
    }

    struct Stub {
        label: &'static str,
        kind: PassKind,
    }

    impl Pass<Recorder> for Stub {
        fn label(&self) -> &str {
            self.label
        }

        fn kind(&self) -> PassKind {
            self.kind
        }

        fn run(&mut self, ctx: &mut Recorder, io: PassIo) -> Result<(), RenderError> {
            ctx.runs.push((self.label.to_string(), io));
            Ok(())
        }
    }

    fn stub(label: &'static str, kind: PassKind) -> Box<dyn Pass<Recorder>> {
        Box::new(Stub { label, kind })
    }

    fn full_chain() -> PassChain<Recorder> {
        PassChain::new()
            .with_pass(stub("scene", PassKind::Scene))
            .with_pass(stub("glitch", PassKind::Effect))
            .with_pass(stub("film", PassKind::Effect))
            .with_pass(stub("output", PassKind::Output))
    }

    #[test]
    fn every_execute_runs_full_chain_in_order() {
        let mut chain = full_chain();
        let mut ctx = Recorder::default();
        chain.execute(&mut ctx).unwrap();
        chain.execute(&mut ctx).unwrap();

        let order: Vec<&str> = ctx.runs.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(
            order,
            vec!["scene", "glitch", "film", "output", "scene", "glitch", "film", "output"]
        );
    }

    #[test]
    fn routing_ping_pongs_and_ends_on_screen() {
        let mut chain = full_chain();
        chain.compile().unwrap();
        assert_eq!(
            chain.routing(),
            &[
                PassIo { input: None, output: Target::Offscreen(0) },
                PassIo { input: Some(Target::Offscreen(0)), output: Target::Offscreen(1) },
                PassIo { input: Some(Target::Offscreen(1)), output: Target::Offscreen(0) },
                PassIo { input: Some(Target::Offscreen(0)), output: Target::Screen },
            ]
        );
    }

    #[test]
    fn scene_then_output_is_valid() {
        let mut chain = PassChain::new()
            .with_pass(stub("scene", PassKind::Scene))
            .with_pass(stub("output", PassKind::Output));
        chain.compile().unwrap();
        assert_eq!(chain.routing()[1].input, Some(Target::Offscreen(0)));
    }

    #[test]
    fn rejects_malformed_chains() {
        let mut empty: PassChain<Recorder> = PassChain::new();
        assert!(matches!(empty.compile(), Err(RenderError::InvalidChain(_))));

        let mut no_output = PassChain::new()
            .with_pass(stub("scene", PassKind::Scene))
            .with_pass(stub("glitch", PassKind::Effect));
        assert!(no_output.compile().is_err());

        let mut output_first = PassChain::new()
            .with_pass(stub("output", PassKind::Output))
            .with_pass(stub("scene", PassKind::Scene));
        assert!(output_first.compile().is_err());

        let mut scene_in_middle = PassChain::new()
            .with_pass(stub("scene", PassKind::Scene))
            .with_pass(stub("scene-2", PassKind::Scene))
            .with_pass(stub("output", PassKind::Output));
        let mut ctx = Recorder::default();
        assert!(scene_in_middle.execute(&mut ctx).is_err());
        assert!(ctx.runs.is_empty());
    }

    #[test]
    fn adding_a_pass_recompiles() {
        let mut chain = PassChain::new()
            .with_pass(stub("scene", PassKind::Scene))
            .with_pass(stub("output", PassKind::Output));
        chain.compile().unwrap();
        assert!(chain.is_compiled());
        chain.add_pass(stub("late", PassKind::Effect));
        assert!(!chain.is_compiled());
    }
}
