//! Single-slot overlay coordination for the desktop shell.
//!
//! One [`OverlayCoordinator`] lives in the app shell and renders the active
//! overlay on top of the workspace. Any code with access to the
//! [`egui::Context`] can obtain an [`OverlayHandle`] ambiently and open or
//! close the overlay without threading a handle through the view tree.
//! Opening may be preceded by an async fetch whose result is merged into the
//! payload the overlay content reads.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use egui::{Context, Id, Ui};
use serde_json::Value;
use tracing::{debug, warn};

/// Auxiliary data available to the displayed overlay content. The shape is
/// caller-defined; the coordinator only merges and clears it.
pub type OverlayData = serde_json::Map<String, Value>;

/// Result of an overlay pre-open fetch.
pub type FetchResult = anyhow::Result<OverlayData>;

const AMBIENT_SLOT: &str = "overlay.coordinator";

/// A renderable overlay fragment. Opaque to the coordinator: it is mounted
/// verbatim inside the modal container whenever the overlay is open.
#[derive(Clone)]
pub struct OverlayView {
    name: &'static str,
    render: Arc<dyn Fn(&mut Ui) + Send + Sync>,
}

impl OverlayView {
    pub fn new(name: &'static str, render: impl Fn(&mut Ui) + Send + Sync + 'static) -> Self {
        Self {
            name,
            render: Arc::new(render),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Debug for OverlayView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayView").field("name", &self.name).finish()
    }
}

#[derive(Default)]
struct OverlayState {
    open: bool,
    content: Option<OverlayView>,
    data: OverlayData,
    mounted: bool,
    // Monotonic sequence of open requests; `applied_request` is the request
    // whose content currently owns the slot. A fetch completing out of order
    // may still merge payload but must not steal the slot from a newer open.
    last_request: u64,
    applied_request: u64,
}

struct Shared {
    state: Mutex<OverlayState>,
    runtime: tokio::runtime::Handle,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, OverlayState> {
        // Critical sections never render or await; a panic elsewhere must not
        // wedge the overlay for the rest of the session.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// Ambient registration stored in the egui data map; a newtype so lookups are
// distinct from any other `Arc` the app may park there.
#[derive(Clone)]
struct InstalledOverlay(Arc<Shared>);

fn apply_open(state: &mut OverlayState, request: u64, view: OverlayView) {
    if request >= state.applied_request {
        state.applied_request = request;
        state.content = Some(view);
        state.open = true;
    }
}

/// Capability to open and close the overlay and read its state.
///
/// Cheap to clone; obtained ambiently via [`OverlayHandle::of`]. All methods
/// may be called from UI code or from background tasks.
#[derive(Clone)]
pub struct OverlayHandle {
    shared: Arc<Shared>,
    ctx: Context,
}

impl OverlayHandle {
    /// Ambient lookup of the installed coordinator.
    ///
    /// # Panics
    ///
    /// Panics if no [`OverlayCoordinator`] has been constructed for this
    /// context. That is a wiring error in the app shell, and surfacing it
    /// loudly beats an overlay that silently never appears.
    pub fn of(ctx: &Context) -> Self {
        let installed = ctx.data_mut(|d| d.get_temp::<InstalledOverlay>(Id::new(AMBIENT_SLOT)));
        let Some(InstalledOverlay(shared)) = installed else {
            panic!(
                "overlay accessed without an installed OverlayCoordinator; \
                 construct one in the app shell before requesting overlays"
            );
        };
        Self {
            shared,
            ctx: ctx.clone(),
        }
    }

    /// Show `view` as the active overlay, keeping the current payload.
    ///
    /// Passing `None` is a no-op.
    pub fn open(&self, view: impl Into<Option<OverlayView>>) {
        let Some(view) = view.into() else {
            return;
        };
        debug!(view = view.name(), "opening overlay");
        let mut state = self.shared.lock();
        state.last_request += 1;
        let request = state.last_request;
        apply_open(&mut state, request, view);
        drop(state);
        self.ctx.request_repaint();
    }

    /// Run `fetch` on the coordinator's runtime, merge the resolved mapping
    /// into the payload (new keys override old), then show `view`.
    ///
    /// Until the fetch resolves the overlay state is untouched; the UI keeps
    /// showing whatever was visible before the call. There is no cancellation:
    /// a fetch outliving its usefulness still resolves, and its payload still
    /// merges, but it cannot displace content requested after it. A fetch
    /// error abandons the open and is logged; richer handling belongs inside
    /// the future the caller supplies.
    ///
    /// Passing `None` as `view` is a no-op and the fetch is not started.
    pub fn open_with_fetch<F>(&self, view: impl Into<Option<OverlayView>>, fetch: F)
    where
        F: Future<Output = FetchResult> + Send + 'static,
    {
        let Some(view) = view.into() else {
            return;
        };
        let request = {
            let mut state = self.shared.lock();
            state.last_request += 1;
            state.last_request
        };
        debug!(view = view.name(), request, "opening overlay after fetch");
        let shared = Arc::clone(&self.shared);
        let ctx = self.ctx.clone();
        self.shared.runtime.spawn(async move {
            match fetch.await {
                Ok(update) => {
                    let mut state = shared.lock();
                    for (key, value) in update {
                        state.data.insert(key, value);
                    }
                    apply_open(&mut state, request, view);
                    drop(state);
                    ctx.request_repaint();
                }
                Err(err) => {
                    warn!(view = view.name(), "overlay fetch failed: {err:#}");
                }
            }
        });
    }

    /// Hide the overlay and clear its payload. The last-shown content stays
    /// cached so an immediate reopen does not flash empty. Always succeeds,
    /// including when nothing is open.
    pub fn close(&self) {
        let mut state = self.shared.lock();
        state.open = false;
        state.data = OverlayData::new();
        drop(state);
        self.ctx.request_repaint();
    }

    pub fn is_open(&self) -> bool {
        self.shared.lock().open
    }

    /// Snapshot of the current payload.
    pub fn data(&self) -> OverlayData {
        self.shared.lock().data.clone()
    }
}

/// Owner of the overlay slot. Construct once in the app shell; call
/// [`OverlayCoordinator::show`] every frame, wrapping the rest of the UI.
#[derive(Clone)]
pub struct OverlayCoordinator {
    shared: Arc<Shared>,
}

impl OverlayCoordinator {
    /// Create the coordinator and install the ambient capability into `ctx`.
    /// Fetches spawn onto `runtime`.
    pub fn new(ctx: &Context, runtime: tokio::runtime::Handle) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(OverlayState::default()),
            runtime,
        });
        ctx.data_mut(|d| {
            d.insert_temp(
                Id::new(AMBIENT_SLOT),
                InstalledOverlay(Arc::clone(&shared)),
            )
        });
        Self { shared }
    }

    /// Direct handle, for call sites that already hold the coordinator.
    pub fn handle(&self, ctx: &Context) -> OverlayHandle {
        OverlayHandle {
            shared: Arc::clone(&self.shared),
            ctx: ctx.clone(),
        }
    }

    /// Render one frame: `children` draws the application UI, then the active
    /// overlay content is mounted on top when open.
    ///
    /// The very first frame renders nothing at all, `children` included, so
    /// the first visible pass starts from settled shell state instead of a
    /// half-initialized one. A repaint is requested immediately, making the
    /// suppressed frame invisible in practice.
    pub fn show(&self, ctx: &Context, children: impl FnOnce(&Context)) {
        {
            let mut state = self.shared.lock();
            if !state.mounted {
                state.mounted = true;
                drop(state);
                ctx.request_repaint();
                return;
            }
        }

        children(ctx);

        let view = {
            let state = self.shared.lock();
            if state.open {
                state.content.clone()
            } else {
                None
            }
        };
        if let Some(view) = view {
            let response = egui::Modal::new(Id::new(AMBIENT_SLOT).with(view.name()))
                .show(ctx, |ui| (view.render)(ui));
            if response.should_close() {
                self.handle(ctx).close();
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/overlay_tests.rs"]
mod tests;
