//! The edit session state machine.
//!
//! An [`EditSession`] is changed only through [`EditSession::apply`], which
//! takes one [`EditCommand`], validates it against the current
//! [`SessionState`] and returns a [`SessionEvent`] describing what happened.
//!
//! ```text
//! Idle ──open──▶ StageOpen ──preview──▶ Previewing ──commit──▶ Committed
//!   ▲               │                        │                    │
//!   └────cancel─────┴────────cancel──────────┘        save ok ──▶ Saved
//! ```
//!
//! `Committed` behaves like `Idle` except that at least one stage holds a
//! committed change. Every state other than `Saved` can move to `Discarded`.

use std::fmt;
use std::sync::Arc;

use pictoria_core::{
    AspectPreset, ColorAdjustment, CornerRadius, EditParameters, ImageTransformation, PixelBuffer,
    Stage, TransformParameters,
};

use crate::config::{CancelPolicy, EditorConfig};
use crate::error::{EditorError, Result};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing open, nothing committed.
    Idle,
    /// A stage is open but its value hasn't changed yet.
    StageOpen(Stage),
    /// A stage is open with a pending value.
    Previewing(Stage),
    /// Nothing open; at least one stage has a committed change.
    Committed,
    /// The render was persisted. Terminal.
    Saved,
    /// The session was closed without saving. Terminal.
    Discarded,
}

impl SessionState {
    /// The open stage, if any.
    pub fn open_stage(self) -> Option<Stage> {
        match self {
            SessionState::StageOpen(stage) | SessionState::Previewing(stage) => Some(stage),
            _ => None,
        }
    }

    /// True for `Saved` and `Discarded`.
    pub fn is_closed(self) -> bool {
        matches!(self, SessionState::Saved | SessionState::Discarded)
    }

    /// True when a stage may be opened or a save started.
    pub fn is_resting(self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Committed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("idle"),
            SessionState::StageOpen(stage) => write!(f, "{} stage open", stage),
            SessionState::Previewing(stage) => write!(f, "previewing {} stage", stage),
            SessionState::Committed => f.write_str("committed"),
            SessionState::Saved => f.write_str("saved"),
            SessionState::Discarded => f.write_str("discarded"),
        }
    }
}

/// A new value for one stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageValue {
    /// Replace the geometry parameters.
    Geometry(TransformParameters),
    /// Fold a discrete edit into the pending geometry parameters.
    GeometryEdit(ImageTransformation),
    Aspect(AspectPreset),
    Color(ColorAdjustment),
    /// Corner radius in viewport pixels; clamped to the configured maximum.
    Corner(f32),
}

impl StageValue {
    /// The stage this value belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            StageValue::Geometry(_) | StageValue::GeometryEdit(_) => Stage::Geometry,
            StageValue::Aspect(_) => Stage::Aspect,
            StageValue::Color(_) => Stage::Color,
            StageValue::Corner(_) => Stage::Corner,
        }
    }
}

/// A discrete change requested of the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditCommand {
    OpenStage(Stage),
    PreviewChange(StageValue),
    CommitStage,
    CancelStage,
    /// Snapshot the committed parameters for a save.
    BeginSave,
    /// The save worker persisted the render.
    SaveSucceeded,
    /// The save worker failed.
    SaveFailed,
    Reset,
    Discard,
    /// The viewport is now this many points wide.
    SetViewportWidth(u32),
}

impl EditCommand {
    /// Short description used in transition errors.
    pub fn name(&self) -> &'static str {
        match self {
            EditCommand::OpenStage(_) => "open stage",
            EditCommand::PreviewChange(_) => "preview change",
            EditCommand::CommitStage => "commit stage",
            EditCommand::CancelStage => "cancel stage",
            EditCommand::BeginSave => "save",
            EditCommand::SaveSucceeded => "finish save",
            EditCommand::SaveFailed => "fail save",
            EditCommand::Reset => "reset",
            EditCommand::Discard => "discard",
            EditCommand::SetViewportWidth(_) => "set viewport width",
        }
    }
}

/// Everything a save needs, captured at the moment it was requested.
#[derive(Debug, Clone)]
pub struct SaveSnapshot {
    pub source: Arc<PixelBuffer>,
    pub params: EditParameters,
    /// Available width the user was previewing at.
    pub preview_width: u32,
}

/// Outcome of a successfully applied command.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StageOpened(Stage),
    /// The pending parameters changed; `params` is what a preview should render.
    PreviewChanged { stage: Stage, params: EditParameters },
    StageCommitted(Stage),
    /// The open stage was closed without committing.
    StageCancelled { stage: Stage, reset_all: bool },
    SaveQueued(SaveSnapshot),
    Saved,
    /// The save failed; the session is back in a resting state.
    SaveFailed,
    Reset,
    Discarded,
    ViewportResized { available_width: u32 },
    /// The command had no effect on a closed session.
    Ignored,
}

/// Which stages hold a committed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitFlags([bool; 4]);

impl CommitFlags {
    pub fn is_committed(&self, stage: Stage) -> bool {
        self.0[stage.index()]
    }

    pub fn any(&self) -> bool {
        self.0.iter().any(|&flag| flag)
    }

    fn set(&mut self, stage: Stage) {
        self.0[stage.index()] = true;
    }
}

/// One editing interaction over a single source image.
#[derive(Debug)]
pub struct EditSession {
    source: Option<Arc<PixelBuffer>>,
    state: SessionState,
    committed: EditParameters,
    pending: Option<EditParameters>,
    commits: CommitFlags,
    viewport_width: u32,
    viewport_padding: u32,
    max_corner_radius: f32,
    cancel_policy: CancelPolicy,
}

impl EditSession {
    /// Start a session on `source` with default parameters.
    pub fn new(source: PixelBuffer, config: &EditorConfig) -> Self {
        Self {
            source: Some(Arc::new(source)),
            state: SessionState::Idle,
            committed: EditParameters::default(),
            pending: None,
            commits: CommitFlags::default(),
            viewport_width: config.default_viewport_width(),
            viewport_padding: config.viewport_padding,
            max_corner_radius: config.max_corner_radius,
            cancel_policy: config.cancel_policy,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The parameters the next save will use.
    pub fn committed(&self) -> &EditParameters {
        &self.committed
    }

    /// Committed parameters with the open stage's pending value applied.
    pub fn preview_parameters(&self) -> EditParameters {
        self.pending.unwrap_or(self.committed)
    }

    pub fn commits(&self) -> CommitFlags {
        self.commits
    }

    /// The source buffer, or `None` once discarded.
    pub fn source(&self) -> Option<&Arc<PixelBuffer>> {
        self.source.as_ref()
    }

    /// Width handed to the aspect stage when previewing.
    pub fn available_width(&self) -> u32 {
        self.viewport_width.saturating_sub(self.viewport_padding)
    }

    /// Apply one command.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::InvalidTransition` if the command is not allowed
    /// in the current state, `EditorError::StageMismatch` for a value sent to
    /// a stage that isn't open, and `EditorError::SessionClosed` for commands
    /// on a saved or discarded session. A failed command leaves the session
    /// unchanged.
    pub fn apply(&mut self, command: EditCommand) -> Result<SessionEvent> {
        let before = self.state;
        let event = self.reduce(command)?;
        if self.state != before {
            tracing::debug!(
                command = command.name(),
                from = %before,
                to = %self.state,
                "session transition"
            );
        }
        Ok(event)
    }

    fn reduce(&mut self, command: EditCommand) -> Result<SessionEvent> {
        match command {
            EditCommand::SaveSucceeded => return Ok(self.finish_save()),
            EditCommand::SaveFailed => return Ok(self.fail_save()),
            _ => {}
        }

        if self.state.is_closed() {
            return Err(EditorError::SessionClosed(self.state));
        }

        match command {
            EditCommand::OpenStage(stage) => {
                self.require(self.state.is_resting(), &command)?;
                self.pending = Some(self.committed);
                self.state = SessionState::StageOpen(stage);
                Ok(SessionEvent::StageOpened(stage))
            }
            EditCommand::PreviewChange(value) => {
                let open = self.open_stage(&command)?;
                if value.stage() != open {
                    return Err(EditorError::StageMismatch {
                        open,
                        requested: value.stage(),
                    });
                }
                let mut pending = self.pending.unwrap_or(self.committed);
                self.write_value(&mut pending, value);
                self.pending = Some(pending);
                self.state = SessionState::Previewing(open);
                Ok(SessionEvent::PreviewChanged {
                    stage: open,
                    params: pending,
                })
            }
            EditCommand::CommitStage => {
                let stage = match self.state {
                    SessionState::Previewing(stage) => stage,
                    _ => return Err(self.invalid(&command)),
                };
                if let Some(pending) = self.pending.take() {
                    copy_stage(&mut self.committed, &pending, stage);
                }
                self.commits.set(stage);
                self.state = SessionState::Committed;
                Ok(SessionEvent::StageCommitted(stage))
            }
            EditCommand::CancelStage => {
                let stage = self.open_stage(&command)?;
                self.pending = None;
                let reset_all = self.cancel_policy == CancelPolicy::ResetAll;
                if reset_all {
                    self.reset_parameters();
                }
                self.state = self.resting_state();
                Ok(SessionEvent::StageCancelled { stage, reset_all })
            }
            EditCommand::BeginSave => self.begin_save().map(SessionEvent::SaveQueued),
            EditCommand::Reset => {
                self.reset_parameters();
                self.state = SessionState::Idle;
                Ok(SessionEvent::Reset)
            }
            EditCommand::Discard => {
                self.pending = None;
                self.source = None;
                self.state = SessionState::Discarded;
                Ok(SessionEvent::Discarded)
            }
            EditCommand::SetViewportWidth(width) => {
                self.viewport_width = width;
                Ok(SessionEvent::ViewportResized {
                    available_width: self.available_width(),
                })
            }
            EditCommand::SaveSucceeded | EditCommand::SaveFailed => Ok(SessionEvent::Ignored),
        }
    }

    /// Snapshot the committed parameters for a save.
    ///
    /// Same as applying [`EditCommand::BeginSave`]; the state is unchanged
    /// until the save finishes.
    ///
    /// # Errors
    ///
    /// Fails unless the session is idle or committed.
    pub fn begin_save(&mut self) -> Result<SaveSnapshot> {
        let command = EditCommand::BeginSave;
        if self.state.is_closed() {
            return Err(EditorError::SessionClosed(self.state));
        }
        self.require(self.state.is_resting(), &command)?;
        let source = self
            .source
            .clone()
            .ok_or(EditorError::SessionClosed(self.state))?;
        Ok(SaveSnapshot {
            source,
            params: self.committed,
            preview_width: self.available_width(),
        })
    }

    fn finish_save(&mut self) -> SessionEvent {
        match self.state {
            SessionState::Discarded => SessionEvent::Ignored,
            _ => {
                self.pending = None;
                self.source = None;
                self.state = SessionState::Saved;
                SessionEvent::Saved
            }
        }
    }

    fn fail_save(&mut self) -> SessionEvent {
        match self.state {
            SessionState::Idle | SessionState::Committed => {
                self.state = SessionState::Committed;
                SessionEvent::SaveFailed
            }
            // Another save already finished, or the user moved on
            _ => SessionEvent::Ignored,
        }
    }

    fn write_value(&self, params: &mut EditParameters, value: StageValue) {
        match value {
            StageValue::Geometry(transform) => params.transform = transform,
            StageValue::GeometryEdit(edit) => params.transform = params.transform.apply(edit),
            StageValue::Aspect(preset) => params.aspect = preset,
            StageValue::Color(color) => params.color = color,
            StageValue::Corner(radius) => {
                params.corner = CornerRadius::new(radius, self.max_corner_radius)
            }
        }
    }

    fn reset_parameters(&mut self) {
        self.committed = EditParameters::default();
        self.pending = None;
        self.commits = CommitFlags::default();
    }

    fn resting_state(&self) -> SessionState {
        if self.commits.any() {
            SessionState::Committed
        } else {
            SessionState::Idle
        }
    }

    fn open_stage(&self, command: &EditCommand) -> Result<Stage> {
        self.state.open_stage().ok_or_else(|| self.invalid(command))
    }

    fn require(&self, allowed: bool, command: &EditCommand) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(self.invalid(command))
        }
    }

    fn invalid(&self, command: &EditCommand) -> EditorError {
        EditorError::InvalidTransition {
            state: self.state,
            command: command.name(),
        }
    }
}

fn copy_stage(into: &mut EditParameters, from: &EditParameters, stage: Stage) {
    match stage {
        Stage::Geometry => into.transform = from.transform,
        Stage::Aspect => into.aspect = from.aspect,
        Stage::Color => into.color = from.color,
        Stage::Corner => into.corner = from.corner,
    }
}
