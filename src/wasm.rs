//! JavaScript-facing API.
//!
//! Wraps [`ForceGraphEngine`] behind a wasm-bindgen class. The host owns the
//! frame loop and the actual scene graph: it pumps `tickFrame()` once per
//! animation frame and reads transforms back, either through the individual
//! getters or as one zero-copy view of the packed transform buffer.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Float32Array;
use log::error;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::Response;

use crate::config::ConfigUpdate;
use crate::engine::{EngineError, ForceGraphEngine};
use crate::graph::{Accessor, GraphData, NodeKey};
use crate::layout::EngineKind;
use crate::scene::TRANSFORM_STRIDE;
use crate::scheduler::Phase;

/// Initialize the WASM module: panic messages and log lines go to the
/// browser console.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

fn js_err(err: EngineError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Main entry point for the synchronization engine.
///
/// This struct wraps the internal ForceGraphEngine and provides the public
/// API exposed to JavaScript.
#[wasm_bindgen]
pub struct ForceGraphScene {
    engine: Rc<RefCell<ForceGraphEngine>>,
}

#[wasm_bindgen]
impl ForceGraphScene {
    /// Create an idle engine with default configuration and no data.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            engine: Rc::new(RefCell::new(ForceGraphEngine::new())),
        }
    }

    // =========================================================================
    // Graph Data
    // =========================================================================

    /// Replace the graph snapshot with a `{nodes, links}` object and rebuild.
    #[wasm_bindgen(js_name = setGraphData)]
    pub fn set_graph_data(&self, data: JsValue) -> Result<(), JsValue> {
        let data: GraphData = serde_wasm_bindgen::from_value(data)?;
        self.engine.borrow_mut().set_graph_data(data).map_err(js_err)
    }

    /// Replace the graph snapshot with a JSON document and rebuild.
    #[wasm_bindgen(js_name = setGraphJson)]
    pub fn set_graph_json(&self, json: &str) -> Result<(), JsValue> {
        self.engine.borrow_mut().set_graph_json(json).map_err(js_err)
    }

    /// Fetch the configured remote snapshot in the background.
    ///
    /// A no-op unless a URL is configured, the local snapshot is empty, and no
    /// fetch is already in flight. Fetch failures are logged, not thrown.
    #[wasm_bindgen(js_name = fetchRemoteData)]
    pub fn fetch_remote_data(&self) {
        let Some(url) = self.engine.borrow_mut().begin_fetch() else {
            return;
        };
        let engine = self.engine.clone();
        spawn_local(async move {
            match fetch_text(&url).await {
                Ok(body) => {
                    if let Err(err) = engine.borrow_mut().finish_fetch(&body) {
                        error!("remote snapshot rejected: {err}");
                    }
                }
                Err(err) => {
                    engine.borrow_mut().abort_fetch();
                    error!("fetching {url} failed: {err:?}");
                }
            }
        });
    }

    /// Number of nodes in the current snapshot.
    #[wasm_bindgen(js_name = nodeCount)]
    pub fn node_count(&self) -> u32 {
        self.engine.borrow().graph_data().nodes.len() as u32
    }

    /// Number of links in the current snapshot.
    #[wasm_bindgen(js_name = linkCount)]
    pub fn link_count(&self) -> u32 {
        self.engine.borrow().graph_data().links.len() as u32
    }

    // =========================================================================
    // Animation Lifecycle
    // =========================================================================

    /// Account for one animation frame: advance the simulation one step (if
    /// the cooldown budget allows) and refresh all object transforms.
    #[wasm_bindgen(js_name = tickFrame)]
    pub fn tick_frame(&self) -> Result<(), JsValue> {
        self.engine.borrow_mut().tick_frame().map_err(js_err)
    }

    /// Pause the animation cycle without touching data or objects.
    pub fn pause(&self) {
        self.engine.borrow_mut().pause();
    }

    /// Restart the current cycle with full energy, keeping positions.
    pub fn reheat(&self) {
        self.engine.borrow_mut().reheat();
    }

    /// Current lifecycle phase: "idle", "warming", "running" or "stopped".
    pub fn phase(&self) -> String {
        match self.engine.borrow().phase() {
            Phase::Idle => "idle",
            Phase::Warming => "warming",
            Phase::Running => "running",
            Phase::Stopped => "stopped",
        }
        .to_owned()
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Bind a record accessor option to a field name, or clear it with
    /// `null`/`undefined`.
    ///
    /// Recognized options: `nodeId`, `nodeVal`, `nodeColor`, `nodeAutoColorBy`,
    /// `linkSource`, `linkTarget`, `linkColor`, `linkAutoColorBy`, `linkVal`.
    #[wasm_bindgen(js_name = setAccessor)]
    pub fn set_accessor(&self, option: &str, field: Option<String>) -> Result<(), JsValue> {
        let accessor = match field {
            Some(name) => Accessor::field(name),
            None => Accessor::Unset,
        };
        self.apply(accessor_update(option, accessor)?)
    }

    /// Bind a record accessor option to a function of the raw record.
    ///
    /// The function receives the record's fields as a plain object and returns
    /// the accessed value. Takes the same option names as `setAccessor`.
    #[wasm_bindgen(js_name = setAccessorFn)]
    pub fn set_accessor_fn(&self, option: &str, f: js_sys::Function) -> Result<(), JsValue> {
        let accessor = Accessor::func(move |fields| {
            let arg = serde_wasm_bindgen::to_value(fields).unwrap_or(JsValue::NULL);
            f.call1(&JsValue::NULL, &arg)
                .ok()
                .and_then(|v| serde_wasm_bindgen::from_value(v).ok())
                .unwrap_or(serde_json::Value::Null)
        });
        self.apply(accessor_update(option, accessor)?)
    }

    /// Select the layout backend: "force" or "topological".
    #[wasm_bindgen(js_name = setForceEngine)]
    pub fn set_force_engine(&self, name: &str) -> Result<(), JsValue> {
        let kind = match name {
            "force" => EngineKind::Force,
            "topological" => EngineKind::Topological,
            other => return Err(JsValue::from_str(&format!("unknown engine `{other}`"))),
        };
        self.apply(ConfigUpdate::Engine(kind))
    }

    /// Set the number of spatial dimensions (1-3).
    #[wasm_bindgen(js_name = setNumDimensions)]
    pub fn set_num_dimensions(&self, dims: u8) -> Result<(), JsValue> {
        self.apply(ConfigUpdate::NumDimensions(dims))
    }

    /// Set the sphere radius per cube root of node value.
    #[wasm_bindgen(js_name = setNodeRelSize)]
    pub fn set_node_rel_size(&self, size: f64) -> Result<(), JsValue> {
        self.apply(ConfigUpdate::NodeRelSize(size))
    }

    /// Set the sphere segment count.
    #[wasm_bindgen(js_name = setNodeResolution)]
    pub fn set_node_resolution(&self, resolution: u32) -> Result<(), JsValue> {
        self.apply(ConfigUpdate::NodeResolution(resolution))
    }

    /// Set node material opacity.
    #[wasm_bindgen(js_name = setNodeOpacity)]
    pub fn set_node_opacity(&self, opacity: f64) -> Result<(), JsValue> {
        self.apply(ConfigUpdate::NodeOpacity(opacity))
    }

    /// Set link material opacity.
    #[wasm_bindgen(js_name = setLinkOpacity)]
    pub fn set_link_opacity(&self, opacity: f64) -> Result<(), JsValue> {
        self.apply(ConfigUpdate::LinkOpacity(opacity))
    }

    /// Set the cylinder diameter per unit of link value.
    #[wasm_bindgen(js_name = setLinkWidthScale)]
    pub fn set_link_width_scale(&self, scale: f64) -> Result<(), JsValue> {
        self.apply(ConfigUpdate::LinkWidthScale(scale))
    }

    /// Set the cylinder radial segment count.
    #[wasm_bindgen(js_name = setLinkResolution)]
    pub fn set_link_resolution(&self, resolution: u32) -> Result<(), JsValue> {
        self.apply(ConfigUpdate::LinkResolution(resolution))
    }

    /// Set the per-tick alpha decay of the continuous-force backend.
    #[wasm_bindgen(js_name = setAlphaDecay)]
    pub fn set_alpha_decay(&self, decay: f64) -> Result<(), JsValue> {
        self.apply(ConfigUpdate::AlphaDecay(decay))
    }

    /// Set the per-tick velocity decay of the continuous-force backend.
    #[wasm_bindgen(js_name = setVelocityDecay)]
    pub fn set_velocity_decay(&self, decay: f64) -> Result<(), JsValue> {
        self.apply(ConfigUpdate::VelocityDecay(decay))
    }

    /// Set the number of synchronous warmup ticks run before the first frame.
    #[wasm_bindgen(js_name = setWarmupTicks)]
    pub fn set_warmup_ticks(&self, ticks: u32) -> Result<(), JsValue> {
        self.apply(ConfigUpdate::WarmupTicks(ticks))
    }

    /// Set the cooldown tick budget. `undefined` or a negative value means
    /// tick forever.
    #[wasm_bindgen(js_name = setCooldownTicks)]
    pub fn set_cooldown_ticks(&self, ticks: Option<f64>) -> Result<(), JsValue> {
        let budget = ticks.filter(|t| *t >= 0.0).map(|t| t as u64);
        self.apply(ConfigUpdate::CooldownTicks(budget))
    }

    /// Set the cooldown time budget in milliseconds. `undefined` or a
    /// negative value means tick forever.
    #[wasm_bindgen(js_name = setCooldownTime)]
    pub fn set_cooldown_time(&self, ms: Option<f64>) -> Result<(), JsValue> {
        self.apply(ConfigUpdate::CooldownTimeMs(ms.filter(|t| *t >= 0.0)))
    }

    /// Set or clear the remote snapshot URL.
    #[wasm_bindgen(js_name = setJsonUrl)]
    pub fn set_json_url(&self, url: Option<String>) -> Result<(), JsValue> {
        self.apply(ConfigUpdate::JsonUrl(url))
    }

    /// Register a callback fired at the start of every rebuild.
    #[wasm_bindgen(js_name = onLoading)]
    pub fn on_loading(&self, f: js_sys::Function) {
        let hook = Rc::new(move || {
            let _ = f.call0(&JsValue::NULL);
        });
        let _ = self
            .engine
            .borrow_mut()
            .configure(ConfigUpdate::OnLoading(Some(hook)));
    }

    /// Register a callback fired when a rebuild finishes warmup.
    #[wasm_bindgen(js_name = onFinishLoading)]
    pub fn on_finish_loading(&self, f: js_sys::Function) {
        let hook = Rc::new(move || {
            let _ = f.call0(&JsValue::NULL);
        });
        let _ = self
            .engine
            .borrow_mut()
            .configure(ConfigUpdate::OnFinishLoading(Some(hook)));
    }

    // =========================================================================
    // Simulation Parameters
    // =========================================================================

    /// Read a named parameter of the continuous-force backend, e.g. "alpha"
    /// or "link_distance". `undefined` under the topological backend.
    #[wasm_bindgen(js_name = getForceParameter)]
    pub fn get_force_parameter(&self, name: &str) -> Option<f64> {
        self.engine.borrow().force_parameter(name)
    }

    /// Set a named parameter of the continuous-force backend. Returns false
    /// when the parameter could not be applied.
    #[wasm_bindgen(js_name = setForceParameter)]
    pub fn set_force_parameter(&self, name: &str, value: f64) -> bool {
        self.engine.borrow_mut().set_force_parameter(name, value)
    }

    // =========================================================================
    // Transform Access
    // =========================================================================

    /// Current position of a node by identity, as `[x, y, z]`.
    #[wasm_bindgen(js_name = getNodePosition)]
    pub fn get_node_position(&self, id: &str) -> Option<Vec<f64>> {
        self.engine
            .borrow()
            .node_position(&NodeKey::new(id))
            .ok()
            .map(|p| vec![p.x, p.y, p.z])
    }

    /// Floats per object in the packed transform buffer.
    #[wasm_bindgen(js_name = transformStride)]
    pub fn transform_stride(&self) -> u32 {
        TRANSFORM_STRIDE as u32
    }

    /// Number of objects in the scene group (nodes first, then links).
    #[wasm_bindgen(js_name = objectCount)]
    pub fn object_count(&self) -> u32 {
        self.engine.borrow().scene().len() as u32
    }

    /// Get a zero-copy view of the packed transform buffer, one
    /// `[x, y, z, qx, qy, qz, qw, sx, sy, sz]` group per object.
    ///
    /// # Safety
    ///
    /// The returned view is invalidated if any Rust allocation occurs.
    /// Use immediately for GPU upload, do not store.
    #[wasm_bindgen(js_name = getTransformsView)]
    pub fn get_transforms_view(&self) -> Float32Array {
        unsafe { Float32Array::view(self.engine.borrow().scene().transform_buffer()) }
    }

    fn apply(&self, update: ConfigUpdate) -> Result<(), JsValue> {
        self.engine.borrow_mut().configure(update).map_err(js_err)
    }
}

impl Default for ForceGraphScene {
    fn default() -> Self {
        Self::new()
    }
}

fn accessor_update(option: &str, accessor: Accessor) -> Result<ConfigUpdate, JsValue> {
    Ok(match option {
        "nodeId" => ConfigUpdate::NodeId(accessor),
        "nodeVal" => ConfigUpdate::NodeVal(accessor),
        "nodeColor" => ConfigUpdate::NodeColor(accessor),
        "nodeAutoColorBy" => ConfigUpdate::NodeAutoColorBy(accessor),
        "linkSource" => ConfigUpdate::LinkSource(accessor),
        "linkTarget" => ConfigUpdate::LinkTarget(accessor),
        "linkColor" => ConfigUpdate::LinkColor(accessor),
        "linkAutoColorBy" => ConfigUpdate::LinkAutoColorBy(accessor),
        "linkVal" => ConfigUpdate::LinkVal(accessor),
        other => {
            return Err(JsValue::from_str(&format!(
                "unknown accessor option `{other}`"
            )));
        }
    })
}

async fn fetch_text(url: &str) -> Result<String, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let response: Response = JsFuture::from(window.fetch_with_str(url)).await?.dyn_into()?;
    if !response.ok() {
        return Err(JsValue::from_str(&format!(
            "HTTP {} fetching snapshot",
            response.status()
        )));
    }
    let text = JsFuture::from(response.text()?).await?;
    text.as_string()
        .ok_or_else(|| JsValue::from_str("non-text response body"))
}
