//! Configured factory for new programs.

use std::fmt;

use crate::algorithms::AlignmentKind;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::models::Operation;
use crate::schedule::block::ScheduleBlock;
use crate::schedule::naming::Namer;
use crate::schedule::program::Schedule;

/// Creates schedules and blocks named by its own counters.
///
/// Unlike `Schedule::new`, names handed out by a composer never depend on
/// what other code in the process has created.
#[derive(Debug)]
pub struct Composer {
    config: EngineConfig,
    default_alignment: AlignmentKind,
    schedules: Namer,
    blocks: Namer,
}

impl Composer {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let default_alignment = config.default_alignment()?;
        Ok(Self {
            schedules: Namer::with_prefix(config.naming.schedule_prefix.clone()),
            blocks: Namer::with_prefix(config.naming.block_prefix.clone()),
            default_alignment,
            config,
        })
    }

    /// Composer configured from the default configuration file, if any.
    pub fn from_default_config() -> Result<Self> {
        Self::new(EngineConfig::load_or_default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn schedule<O: Operation>(&self) -> Schedule<O> {
        Schedule::with_name(self.schedules.next_name())
    }

    /// New block using the configured default alignment.
    pub fn block<O: Operation>(&self) -> ScheduleBlock<O> {
        ScheduleBlock::with_name(self.blocks.next_name()).with_alignment(self.default_alignment.clone())
    }

    /// Render `schedule` with the configured instruction limit.
    pub fn render_schedule<O: Operation + fmt::Display>(&self, schedule: &Schedule<O>) -> String {
        schedule.render(self.config.display.max_instructions)
    }

    pub fn render_block<O: Operation + fmt::Display>(&self, block: &ScheduleBlock<O>) -> String {
        block.render(self.config.display.max_instructions)
    }
}

impl Default for Composer {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            schedules: Namer::with_prefix(config.naming.schedule_prefix.clone()),
            blocks: Namer::with_prefix(config.naming.block_prefix.clone()),
            default_alignment: AlignmentKind::default(),
            config,
        }
    }
}
