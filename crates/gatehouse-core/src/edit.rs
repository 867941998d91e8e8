//! The edit workflow for a project's access page, as plain data.
//!
//! The page is either showing the stored configuration read-only, letting
//! the user edit a draft, or waiting for the server to store that draft.
//! Rendering is a pure function of [`AccessEditor::view`].

use std::collections::BTreeSet;

use thiserror::Error;

use crate::access::{self, AccessSection, ProjectAccessConfig};

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
  ReadOnly,
  Editing,
  Submitting,
}

/// Why a commit did not reach the stored configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitFailure {
  /// The server rejected the request (bad section, stale revision, ...).
  Validation(String),
  /// The request never got an answer.
  Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
  #[error("you do not own any section of this project")]
  NotAnOwner,
  #[error("cannot {action} while {state:?}")]
  InvalidTransition { action: &'static str, state: EditState },
  #[error("errors must be fixed before committing: {0}")]
  Invalid(String),
}

/// What the page sends to the write path on commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
  pub project:  String,
  pub revision: String,
  pub message:  Option<String>,
  pub sections: Vec<AccessSection>,
}

/// Everything the page needs to draw itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditView<'a> {
  pub access:               &'a ProjectAccessConfig,
  pub sections:             &'a [AccessSection],
  pub editing:              bool,
  pub edit_tools_visible:   bool,
  pub edit_enabled:         bool,
  pub commit_tools_visible: bool,
  pub controls_enabled:     bool,
  pub commit_message:       &'a str,
  pub warnings:             &'a [String],
  pub error:                Option<&'a str>,
}

// ─── Editor ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AccessEditor {
  state:          EditState,
  /// The configuration last loaded from or stored by the server.
  access:         ProjectAccessConfig,
  /// In-memory edits; meaningful while not `ReadOnly`.
  draft:          Vec<AccessSection>,
  commit_message: String,
  warnings:       Vec<String>,
  error:          Option<String>,
}

impl AccessEditor {
  /// Show `access` read-only.
  pub fn new(access: ProjectAccessConfig) -> Self {
    Self {
      state:          EditState::ReadOnly,
      draft:          access.sections.clone(),
      access,
      commit_message: String::new(),
      warnings:       Vec::new(),
      error:          None,
    }
  }

  pub fn state(&self) -> EditState { self.state }

  pub fn access(&self) -> &ProjectAccessConfig { &self.access }

  pub fn draft(&self) -> &[AccessSection] { &self.draft }

  /// Mutable access to the draft for the form. Edits outside `Editing` are
  /// rejected.
  pub fn draft_mut(&mut self) -> Result<&mut Vec<AccessSection>, EditError> {
    self.expect(EditState::Editing, "edit the draft")?;
    Ok(&mut self.draft)
  }

  pub fn set_commit_message(&mut self, message: impl Into<String>) {
    self.commit_message = message.into();
  }

  pub fn warnings(&self) -> &[String] { &self.warnings }

  pub fn error(&self) -> Option<&str> { self.error.as_deref() }

  fn expect(&self, state: EditState, action: &'static str) -> Result<(), EditError> {
    if self.state == state {
      Ok(())
    } else {
      Err(EditError::InvalidTransition { action, state: self.state })
    }
  }

  // ── Transitions ───────────────────────────────────────────────────────

  /// `ReadOnly → Editing`, starting from a fresh copy of the stored
  /// sections. Only owners of at least one section may edit.
  pub fn begin_edit(&mut self) -> Result<(), EditError> {
    self.expect(EditState::ReadOnly, "edit")?;
    if !self.access.is_owner_of_any() {
      return Err(EditError::NotAnOwner);
    }
    self.draft = self.access.sections.clone();
    self.warnings.clear();
    self.error = None;
    self.state = EditState::Editing;
    Ok(())
  }

  /// `Editing → ReadOnly`, discarding the draft.
  pub fn cancel(&mut self) -> Result<(), EditError> {
    self.expect(EditState::Editing, "cancel")?;
    self.show(self.access.clone());
    Ok(())
  }

  /// `Editing → Submitting`.
  ///
  /// The draft is checked locally first; an invalid draft stays in
  /// `Editing`. A blank commit message is sent as `None`.
  pub fn commit(&mut self) -> Result<CommitRequest, EditError> {
    self.expect(EditState::Editing, "commit")?;
    if let Err(e) = access::validate_sections(&self.draft) {
      let message = e.to_string();
      self.error = Some(message.clone());
      return Err(EditError::Invalid(message));
    }

    let message = self.commit_message.trim();
    let request = CommitRequest {
      project:  self.access.project.clone(),
      revision: self.access.revision.clone(),
      message:  (!message.is_empty()).then(|| message.to_owned()),
      sections: self.draft.clone(),
    };
    self.state = EditState::Submitting;
    Ok(request)
  }

  /// The server stored something. Returns the names of the sections that
  /// were not stored as requested.
  ///
  /// With no differences the page shows `persisted` read-only. Otherwise it
  /// stays editable on the requested draft with one warning per section, so
  /// nothing the user typed is lost.
  pub fn on_success(
    &mut self,
    persisted: ProjectAccessConfig,
  ) -> Result<BTreeSet<String>, EditError> {
    self.expect(EditState::Submitting, "accept a commit result")?;
    let diffs = access::diff_sections(&self.draft, &persisted.sections);

    self.commit_message.clear();
    self.error = None;
    if diffs.is_empty() {
      self.show(persisted);
    } else {
      self.warnings = diffs.iter().cloned().collect();
      // Later commits are based on what is now stored.
      self.access = persisted;
      self.state = EditState::Editing;
    }
    Ok(diffs)
  }

  /// The commit failed; return to `Editing` with the draft intact.
  ///
  /// The commit message survives a validation failure so the user can fix
  /// the draft and retry; a transport failure clears it.
  pub fn on_failure(&mut self, failure: CommitFailure) -> Result<(), EditError> {
    self.expect(EditState::Submitting, "accept a commit failure")?;
    self.warnings.clear();
    self.error = Some(match failure {
      CommitFailure::Validation(m) => m,
      CommitFailure::Transport(m) => {
        self.commit_message.clear();
        m
      }
    });
    self.state = EditState::Editing;
    Ok(())
  }

  fn show(&mut self, access: ProjectAccessConfig) {
    self.draft = access.sections.clone();
    self.access = access;
    self.warnings.clear();
    self.error = None;
    self.state = EditState::ReadOnly;
  }

  // ── Rendering ─────────────────────────────────────────────────────────

  pub fn view(&self) -> EditView<'_> {
    let owner = self.access.is_owner_of_any();
    let editing = self.state != EditState::ReadOnly;
    EditView {
      access:               &self.access,
      sections:             if editing { &self.draft } else { &self.access.sections },
      editing,
      edit_tools_visible:   owner,
      edit_enabled:         owner && self.state == EditState::ReadOnly,
      commit_tools_visible: editing,
      controls_enabled:     self.state != EditState::Submitting,
      commit_message:       &self.commit_message,
      warnings:             &self.warnings,
      error:                self.error.as_deref(),
    }
  }
}
