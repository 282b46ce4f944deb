//! Ordered system pipeline with fault containment.
//!
//! The scheduler runs every registered system exactly once per tick in
//! registration order. A system that returns a [`SystemFault`] or panics
//! is isolated: its unhandled commands are rejected, the rest of the
//! pipeline still runs, and the tick completes. After `fault_threshold`
//! consecutive faulted ticks the system is disabled and skipped until an
//! operator re-enables it.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{error, info, warn};

use crate::command::{Command, CommandBatch, RejectReason, Rejection};
use crate::config::SimConfig;
use crate::content::ContentRegistry;
use crate::error::SystemFault;
use crate::event::Event;
use crate::systems::{default_pipeline, System, SystemContext};
use crate::world::WorldState;

/// Whether a system is currently scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemStatus {
    /// Runs every tick.
    Enabled,
    /// Skipped; commands for its domain are rejected.
    Disabled {
        /// Tick at which it was disabled.
        since_tick: u64,
        /// Last fault message.
        reason: String,
    },
}

/// Health record for one system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemHealth {
    /// System name.
    pub name: &'static str,
    /// Scheduling status.
    pub status: SystemStatus,
    /// Faults in a row; reset by a clean run.
    pub consecutive_faults: u32,
    /// Faults since the scheduler was built.
    pub total_faults: u64,
    /// Most recent fault.
    pub last_fault: Option<SystemFault>,
}

impl SystemHealth {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            status: SystemStatus::Enabled,
            consecutive_faults: 0,
            total_faults: 0,
            last_fault: None,
        }
    }

    /// True when the system runs.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.status == SystemStatus::Enabled
    }
}

struct SystemSlot {
    system: Box<dyn System>,
    health: SystemHealth,
}

/// Everything one pass of the pipeline produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutput {
    /// Events in emission order.
    pub events: Vec<Event>,
    /// Rejected commands, batch resolution first.
    pub rejections: Vec<Rejection>,
    /// Faults raised this tick.
    pub faults: Vec<SystemFault>,
}

/// Runs the system pipeline.
pub struct TickScheduler {
    slots: Vec<SystemSlot>,
    fault_threshold: u32,
}

impl std::fmt::Debug for TickScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickScheduler")
            .field("systems", &self.slots.iter().map(|s| &s.health).collect::<Vec<_>>())
            .field("fault_threshold", &self.fault_threshold)
            .finish()
    }
}

impl TickScheduler {
    /// Scheduler with the standard pipeline.
    #[must_use]
    pub fn new(fault_threshold: u32) -> Self {
        Self::with_systems(default_pipeline(), fault_threshold)
    }

    /// Scheduler with a custom pipeline, run in the given order.
    #[must_use]
    pub fn with_systems(systems: Vec<Box<dyn System>>, fault_threshold: u32) -> Self {
        let slots = systems
            .into_iter()
            .map(|system| SystemSlot {
                health: SystemHealth::new(system.name()),
                system,
            })
            .collect();
        Self {
            slots,
            fault_threshold: fault_threshold.max(1),
        }
    }

    /// Run every system once for `batch.tick()`.
    pub fn run_tick(
        &mut self,
        world: &mut WorldState,
        content: &ContentRegistry,
        config: &SimConfig,
        batch: &CommandBatch,
    ) -> TickOutput {
        let tick = batch.tick();
        let mut output = TickOutput {
            rejections: batch.rejections().to_vec(),
            ..TickOutput::default()
        };

        for slot in &mut self.slots {
            let commands: Vec<Command> = match slot.system.domain() {
                Some(domain) => batch.for_domain(domain).cloned().collect(),
                None => Vec::new(),
            };

            if !slot.health.is_enabled() {
                output.rejections.extend(
                    commands
                        .iter()
                        .map(|c| Rejection::of(c, RejectReason::SystemDisabled)),
                );
                continue;
            }

            let name = slot.system.name();
            let mut ctx = SystemContext::new(
                name,
                tick,
                world,
                content,
                config,
                &commands,
                &mut output.events,
                &mut output.rejections,
            );
            let system = &slot.system;
            let result = catch_unwind(AssertUnwindSafe(|| system.run(&mut ctx)))
                .unwrap_or_else(|payload| {
                    Err(SystemFault {
                        system: name,
                        tick,
                        message: format!("panicked: {}", panic_message(payload.as_ref())),
                    })
                });
            let handled = ctx.handled();

            match result {
                Ok(()) => slot.health.consecutive_faults = 0,
                Err(fault) => {
                    warn!(tick, system = name, error = %fault.message, "System fault");
                    output.rejections.extend(
                        commands
                            .iter()
                            .skip(handled)
                            .map(|c| Rejection::of(c, RejectReason::Faulted)),
                    );
                    let health = &mut slot.health;
                    health.consecutive_faults += 1;
                    health.total_faults += 1;
                    if health.consecutive_faults >= self.fault_threshold {
                        error!(
                            tick,
                            system = name,
                            faults = health.consecutive_faults,
                            "Disabling system after repeated faults"
                        );
                        health.status = SystemStatus::Disabled {
                            since_tick: tick,
                            reason: fault.message.clone(),
                        };
                    }
                    health.last_fault = Some(fault.clone());
                    output.faults.push(fault);
                }
            }
        }
        output
    }

    /// Health of every system in pipeline order.
    #[must_use]
    pub fn health(&self) -> Vec<SystemHealth> {
        self.slots.iter().map(|s| s.health.clone()).collect()
    }

    /// Names of the systems in pipeline order.
    #[must_use]
    pub fn system_names(&self) -> Vec<&'static str> {
        self.slots.iter().map(|s| s.health.name).collect()
    }

    /// Re-enable a disabled system. Returns false for unknown names.
    pub fn enable(&mut self, name: &str) -> bool {
        let Some(slot) = self.slots.iter_mut().find(|s| s.health.name == name) else {
            return false;
        };
        if !slot.health.is_enabled() {
            info!(system = name, "Re-enabling system");
        }
        slot.health.status = SystemStatus::Enabled;
        slot.health.consecutive_faults = 0;
        true
    }

    /// Consecutive faults that disable a system.
    #[must_use]
    pub const fn fault_threshold(&self) -> u32 {
        self.fault_threshold
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Action, Domain, SeqMarks};

    struct Flaky;

    impl System for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn domain(&self) -> Option<Domain> {
            Some(Domain::Mining)
        }

        fn run(&self, ctx: &mut SystemContext<'_>) -> Result<(), SystemFault> {
            Err(ctx.fault("boom"))
        }
    }

    struct Panicky;

    impl System for Panicky {
        fn name(&self) -> &'static str {
            "panicky"
        }

        fn run(&self, _ctx: &mut SystemContext<'_>) -> Result<(), SystemFault> {
            panic!("kaboom");
        }
    }

    struct Counter;

    impl System for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn run(&self, ctx: &mut SystemContext<'_>) -> Result<(), SystemFault> {
            ctx.emit(Event::WaveStarted {
                wave: format!("tick-{}", ctx.tick),
            });
            Ok(())
        }
    }

    fn batch(tick: u64) -> CommandBatch {
        CommandBatch::from_commands(
            tick,
            vec![Command::new(1, tick, Action::Mine { node: 9 })],
            &SeqMarks::new(),
        )
    }

    #[test]
    fn faults_are_contained_and_disable_after_threshold() {
        let mut scheduler =
            TickScheduler::with_systems(vec![Box::new(Flaky), Box::new(Panicky), Box::new(Counter)], 2);
        let mut world = WorldState::empty(1);
        let content = ContentRegistry::default();
        let config = SimConfig::default();

        let out = scheduler.run_tick(&mut world, &content, &config, &batch(0));
        assert_eq!(out.faults.len(), 2);
        assert_eq!(out.events.len(), 1, "later systems still run");
        assert_eq!(out.rejections[0].reason, RejectReason::Faulted);
        assert!(out.faults[1].message.contains("kaboom"));

        let _ = scheduler.run_tick(&mut world, &content, &config, &batch(1));
        let health = scheduler.health();
        assert!(!health[0].is_enabled());
        assert!(!health[1].is_enabled());
        assert!(health[2].is_enabled());

        let out = scheduler.run_tick(&mut world, &content, &config, &batch(2));
        assert!(out.faults.is_empty());
        assert_eq!(out.rejections[0].reason, RejectReason::SystemDisabled);

        assert!(scheduler.enable("flaky"));
        assert!(!scheduler.enable("missing"));
        assert!(scheduler.health()[0].is_enabled());
    }
}
