use std::fmt;

use strum::IntoStaticStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum StageName {
    ProxyProtocol,
    LegacyPing,
    Decrypt,
    FrameDecoder,
    Decompress,
    PacketDecoder,
    PacketEncoder,
    Compress,
    FrameEncoder,
    Encrypt,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.into())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("stage {0} is not in the pipeline")]
    MissingStage(StageName),
    #[error("stage {0} is already in the pipeline")]
    DuplicateStage(StageName),
}

/// Ordered list of named stages.
pub struct Pipeline<S> {
    stages: Vec<(StageName, S)>,
}

impl<S> Default for Pipeline<S> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<S> Pipeline<S> {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: StageName) -> Option<usize> {
        self.stages.iter().position(|(stage, _)| *stage == name)
    }

    fn insert_at(&mut self, index: usize, name: StageName, stage: S) -> Result<(), PipelineError> {
        if self.contains(name) {
            return Err(PipelineError::DuplicateStage(name));
        }
        self.stages.insert(index, (name, stage));
        Ok(())
    }

    pub fn push_back(&mut self, name: StageName, stage: S) -> Result<(), PipelineError> {
        self.insert_at(self.stages.len(), name, stage)
    }

    pub fn push_front(&mut self, name: StageName, stage: S) -> Result<(), PipelineError> {
        self.insert_at(0, name, stage)
    }

    pub fn insert_before(&mut self, anchor: StageName, name: StageName, stage: S) -> Result<(), PipelineError> {
        let index = self.position(anchor).ok_or(PipelineError::MissingStage(anchor))?;
        self.insert_at(index, name, stage)
    }

    pub fn insert_after(&mut self, anchor: StageName, name: StageName, stage: S) -> Result<(), PipelineError> {
        let index = self.position(anchor).ok_or(PipelineError::MissingStage(anchor))?;
        self.insert_at(index + 1, name, stage)
    }

    pub fn remove(&mut self, name: StageName) -> Option<S> {
        let index = self.position(name)?;
        Some(self.stages.remove(index).1)
    }

    pub fn contains(&self, name: StageName) -> bool {
        self.position(name).is_some()
    }

    pub fn get_mut(&mut self, name: StageName) -> Option<&mut S> {
        self.stages.iter_mut().find(|(stage, _)| *stage == name).map(|(_, stage)| stage)
    }

    pub fn names(&self) -> Vec<StageName> {
        self.stages.iter().map(|(name, _)| *name).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub(crate) fn stage_mut(&mut self, index: usize) -> Option<(StageName, &mut S)> {
        self.stages.get_mut(index).map(|(name, stage)| (*name, stage))
    }
}
