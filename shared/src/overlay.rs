use serde::{Deserialize, Serialize};

use crate::records::{NestRecord, PolygonRecord, ScanAreaRecord, SpawnRecord};

/// The closed set of toggleable map layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverlayKind {
    Nests,
    Spawns,
    Parks,
    L12Cells,
    ScanArea,
}

impl OverlayKind {
    /// Layer-control order.
    pub const ALL: [OverlayKind; 5] = [
        OverlayKind::Nests,
        OverlayKind::Spawns,
        OverlayKind::Parks,
        OverlayKind::L12Cells,
        OverlayKind::ScanArea,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Nests => "Nests",
            Self::Spawns => "Spawns",
            Self::Parks => "Parks",
            Self::L12Cells => "L12Cells",
            Self::ScanArea => "ScanArea",
        }
    }

    /// Backend path (with query) serving this layer's records.
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Nests => "/nest_spawns?pokes",
            Self::Spawns => "/nest_spawns",
            Self::Parks => "/parks",
            Self::L12Cells => "/L12cells",
            Self::ScanArea => "/scan_coords",
        }
    }

    /// Layers shown on page load fetch eagerly; the rest wait for their first show.
    pub const fn visible_at_start(self) -> bool {
        matches!(self, Self::Nests | Self::ScanArea)
    }
}

/// One-shot latch guarding the single fetch of an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchGate {
    #[default]
    NotRequested,
    Requested,
}

impl FetchGate {
    /// Returns `true` exactly once, on the transition out of `NotRequested`.
    pub fn open(&mut self) -> bool {
        if *self == Self::NotRequested {
            *self = Self::Requested;
            true
        } else {
            false
        }
    }

    pub fn is_requested(self) -> bool {
        self == Self::Requested
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    Pending,
    Ready(usize),
    Failed(String),
}

/// Show/hide notification for a layer, as raised by the layer control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityEvent {
    Add,
    Remove,
}

/// Visibility and load bookkeeping shared by every overlay regardless of item type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayState {
    pub kind: OverlayKind,
    hidden: bool,
    gate: FetchGate,
    status: LoadStatus,
}

impl OverlayState {
    pub fn new(kind: OverlayKind) -> Self {
        Self {
            kind,
            hidden: !kind.visible_at_start(),
            gate: FetchGate::default(),
            status: LoadStatus::Idle,
        }
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub fn gate(&self) -> FetchGate {
        self.gate
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    /// Record a show/hide event. `hidden` mirrors the last event, nothing else writes it.
    pub fn apply(&mut self, event: VisibilityEvent) {
        self.hidden = event == VisibilityEvent::Remove;
    }

    /// Open the gate; `true` means the caller must issue the one fetch.
    fn request(&mut self) -> bool {
        if !self.gate.open() {
            return false;
        }
        self.status = LoadStatus::Pending;
        true
    }
}

/// An overlay layer and the items created from its fetched records.
#[derive(Debug, Clone)]
pub struct OverlayGroup<T> {
    pub state: OverlayState,
    items: Vec<T>,
}

impl<T> OverlayGroup<T> {
    pub fn new(kind: OverlayKind) -> Self {
        Self {
            state: OverlayState::new(kind),
            items: Vec::new(),
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Items to draw: none while the layer is hidden.
    pub fn visible_items(&self) -> &[T] {
        if self.state.hidden {
            &[]
        } else {
            &self.items
        }
    }

    /// Populate from the fetch response. Only the pending fetch may fill the group.
    fn fill(&mut self, items: Vec<T>) -> bool {
        if self.state.status != LoadStatus::Pending {
            return false;
        }
        self.items = items;
        self.state.status = LoadStatus::Ready(self.items.len());
        true
    }

    fn fail(&mut self, reason: String) -> bool {
        if self.state.status != LoadStatus::Pending {
            return false;
        }
        self.state.status = LoadStatus::Failed(reason);
        true
    }
}

/// Decoded response for one overlay's endpoint.
#[derive(Debug, Clone)]
pub enum OverlayPayload {
    Nests(Vec<NestRecord>),
    Spawns(Vec<SpawnRecord>),
    Parks(Vec<PolygonRecord>),
    L12Cells(Vec<PolygonRecord>),
    ScanArea(Vec<ScanAreaRecord>),
}

impl OverlayPayload {
    pub fn kind(&self) -> OverlayKind {
        match self {
            Self::Nests(_) => OverlayKind::Nests,
            Self::Spawns(_) => OverlayKind::Spawns,
            Self::Parks(_) => OverlayKind::Parks,
            Self::L12Cells(_) => OverlayKind::L12Cells,
            Self::ScanArea(_) => OverlayKind::ScanArea,
        }
    }
}

/// Every overlay of the page, created once at startup.
#[derive(Debug, Clone)]
pub struct OverlaySet {
    pub nests: OverlayGroup<NestRecord>,
    pub spawns: OverlayGroup<SpawnRecord>,
    pub parks: OverlayGroup<PolygonRecord>,
    pub cells: OverlayGroup<PolygonRecord>,
    pub scan_area: OverlayGroup<ScanAreaRecord>,
}

impl Default for OverlaySet {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlaySet {
    pub fn new() -> Self {
        Self {
            nests: OverlayGroup::new(OverlayKind::Nests),
            spawns: OverlayGroup::new(OverlayKind::Spawns),
            parks: OverlayGroup::new(OverlayKind::Parks),
            cells: OverlayGroup::new(OverlayKind::L12Cells),
            scan_area: OverlayGroup::new(OverlayKind::ScanArea),
        }
    }

    pub fn state(&self, kind: OverlayKind) -> &OverlayState {
        match kind {
            OverlayKind::Nests => &self.nests.state,
            OverlayKind::Spawns => &self.spawns.state,
            OverlayKind::Parks => &self.parks.state,
            OverlayKind::L12Cells => &self.cells.state,
            OverlayKind::ScanArea => &self.scan_area.state,
        }
    }

    fn state_mut(&mut self, kind: OverlayKind) -> &mut OverlayState {
        match kind {
            OverlayKind::Nests => &mut self.nests.state,
            OverlayKind::Spawns => &mut self.spawns.state,
            OverlayKind::Parks => &mut self.parks.state,
            OverlayKind::L12Cells => &mut self.cells.state,
            OverlayKind::ScanArea => &mut self.scan_area.state,
        }
    }

    pub fn is_hidden(&self, kind: OverlayKind) -> bool {
        self.state(kind).hidden()
    }

    /// Startup: open the gate of every layer shown on load. Returns the fetches to issue.
    pub fn boot(&mut self) -> Vec<OverlayKind> {
        OverlayKind::ALL
            .into_iter()
            .filter(|kind| kind.visible_at_start())
            .filter(|kind| self.state_mut(*kind).request())
            .collect()
    }

    /// Apply a show/hide event. Returns the layer to fetch when this is its first show.
    pub fn handle(&mut self, kind: OverlayKind, event: VisibilityEvent) -> Option<OverlayKind> {
        let state = self.state_mut(kind);
        state.apply(event);
        if event == VisibilityEvent::Add && !state.hidden() && state.request() {
            Some(kind)
        } else {
            None
        }
    }

    /// Store a fetch response. Returns `false` if the layer had no fetch pending.
    pub fn fill(&mut self, payload: OverlayPayload) -> bool {
        match payload {
            OverlayPayload::Nests(items) => self.nests.fill(items),
            OverlayPayload::Spawns(items) => self.spawns.fill(items),
            OverlayPayload::Parks(items) => self.parks.fill(items),
            OverlayPayload::L12Cells(items) => self.cells.fill(items),
            OverlayPayload::ScanArea(items) => self.scan_area.fill(items),
        }
    }

    pub fn fail(&mut self, kind: OverlayKind, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        match kind {
            OverlayKind::Nests => self.nests.fail(reason),
            OverlayKind::Spawns => self.spawns.fail(reason),
            OverlayKind::Parks => self.parks.fail(reason),
            OverlayKind::L12Cells => self.cells.fail(reason),
            OverlayKind::ScanArea => self.scan_area.fail(reason),
        }
    }

    pub fn nest_by_key(&self, key: &str) -> Option<&NestRecord> {
        self.nests.items().iter().find(|nest| nest.key() == key)
    }
}
