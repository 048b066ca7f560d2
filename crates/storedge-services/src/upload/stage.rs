use std::fmt;

/// Position of an upload in its state machine.
///
/// `Aborting` is entered from any stage between `Staging` and `Transacting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Validating,
    Staging,
    Streaming,
    Committing,
    ClaimingIdentity,
    Transacting,
    Publishing,
    Done,
    Aborting,
}

impl UploadStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStage::Validating => "validating",
            UploadStage::Staging => "staging",
            UploadStage::Streaming => "streaming",
            UploadStage::Committing => "committing",
            UploadStage::ClaimingIdentity => "claiming_identity",
            UploadStage::Transacting => "transacting",
            UploadStage::Publishing => "publishing",
            UploadStage::Done => "done",
            UploadStage::Aborting => "aborting",
        }
    }

    /// Whether work done in this stage may need compensation on failure.
    pub fn can_abort(&self) -> bool {
        matches!(
            self,
            UploadStage::Staging
                | UploadStage::Streaming
                | UploadStage::Committing
                | UploadStage::ClaimingIdentity
                | UploadStage::Transacting
        )
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
