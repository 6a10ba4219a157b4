//! UI-side application state: the two browsing panes, focus, status
//! line, and the transfer controller. All mutation happens on the UI
//! task.

use crate::core::endpoint::{Endpoint, FsEntry};
use crate::core::transfer::controller::{PaneSide, TransferController};
use anyhow::Context as _;

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Mode {
    Browse,
    Logs,
}

/// One browsing pane: an endpoint, a current directory, and the cached
/// listing with a cursor.
pub struct DirPane {
    pub side: PaneSide,
    pub endpoint: Endpoint,
    pub path: String,
    pub entries: Vec<FsEntry>,
    pub selected: usize,
}

impl DirPane {
    pub fn new(side: PaneSide, endpoint: Endpoint, path: String) -> Self {
        Self {
            side,
            endpoint,
            path,
            entries: Vec::new(),
            selected: 0,
        }
    }

    /// Re-enumerate the current directory, keeping the cursor in range.
    pub async fn refresh(&mut self) -> anyhow::Result<()> {
        self.entries = self
            .endpoint
            .read_dir(&self.path)
            .await
            .with_context(|| format!("listing {}", self.path))?;
        if self.selected >= self.entries.len() {
            self.selected = self.entries.len().saturating_sub(1);
        }
        Ok(())
    }

    pub fn selected_entry(&self) -> Option<&FsEntry> {
        self.entries.get(self.selected)
    }

    pub fn select_prev(&mut self) {
        if !self.entries.is_empty() {
            self.selected = if self.selected == 0 {
                self.entries.len() - 1
            } else {
                self.selected - 1
            };
        }
    }

    pub fn select_next(&mut self) {
        if !self.entries.is_empty() {
            self.selected = (self.selected + 1) % self.entries.len();
        }
    }

    /// Descend into the selected directory; no-op on files.
    pub async fn enter(&mut self) -> anyhow::Result<()> {
        let Some(entry) = self.selected_entry() else {
            return Ok(());
        };
        if !entry.is_dir {
            return Ok(());
        }
        let next = self.endpoint.join(&self.path, &entry.name);
        let previous = std::mem::replace(&mut self.path, next);
        self.selected = 0;
        if let Err(e) = self.refresh().await {
            // Unreadable directory: stay where we were.
            self.path = previous;
            self.refresh().await?;
            return Err(e);
        }
        Ok(())
    }

    /// Go to the parent directory.
    pub async fn ascend(&mut self) -> anyhow::Result<()> {
        let parent = self.endpoint.parent(&self.path);
        if parent.is_empty() || parent == self.path {
            return Ok(());
        }
        self.path = parent;
        self.selected = 0;
        self.refresh().await
    }
}

pub struct App {
    pub mode: Mode,
    pub focus: PaneSide,
    pub local: DirPane,
    pub remote: DirPane,
    pub controller: TransferController,

    // Status line shown at the bottom; cleared on mode changes.
    pub status: String,

    // Logs view
    pub log_scroll: usize,
}

impl App {
    pub fn new(local: DirPane, remote: DirPane, controller: TransferController) -> Self {
        Self {
            mode: Mode::Browse,
            focus: PaneSide::Local,
            local,
            remote,
            controller,
            status: String::new(),
            log_scroll: 0,
        }
    }

    pub fn pane(&self, side: PaneSide) -> &DirPane {
        match side {
            PaneSide::Local => &self.local,
            PaneSide::Remote => &self.remote,
        }
    }

    pub fn pane_mut(&mut self, side: PaneSide) -> &mut DirPane {
        match side {
            PaneSide::Local => &mut self.local,
            PaneSide::Remote => &mut self.remote,
        }
    }

    pub fn focused_mut(&mut self) -> &mut DirPane {
        let focus = self.focus;
        self.pane_mut(focus)
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            PaneSide::Local => PaneSide::Remote,
            PaneSide::Remote => PaneSide::Local,
        };
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status = msg.into();
    }
}
