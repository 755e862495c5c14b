use std::cell::RefCell;
use std::rc::{Rc, Weak};

use wasm_bindgen::prelude::*;

use crate::application::{ChartEngine, EngineConfig, EngineStatus};
use crate::domain::{
    chart::IndicatorConfigSet,
    errors::ChartError,
    logging::{LogComponent, init_logger},
    market_data::ChartInput,
};
use crate::infrastructure::{
    BrowserFrameScheduler, ConsoleLogger, ContainerObserver, ElementContainer,
    rendering::{CanvasSurfaceFactory, encode_data_url},
};
use crate::{log_info, log_warn};

fn to_js(err: ChartError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// JavaScript handle to one multi-pane chart living inside a container element.
///
/// Every payload crosses the boundary as JSON.
#[wasm_bindgen]
pub struct MultiPaneChart {
    engine: Rc<RefCell<ChartEngine>>,
    container: web_sys::Element,
    observer: Option<ContainerObserver>,
}

#[wasm_bindgen]
impl MultiPaneChart {
    #[wasm_bindgen(constructor)]
    pub fn new(container: web_sys::Element, config_json: Option<String>) -> Result<MultiPaneChart, JsValue> {
        let config = match config_json {
            Some(json) => EngineConfig::from_json(&json).map_err(to_js)?,
            None => EngineConfig::default(),
        };
        init_logger(Box::new(ConsoleLogger), config.log_level);

        let factory = CanvasSurfaceFactory::new(container.clone()).map_err(|e| JsValue::from_str(&e.to_string()))?;
        let engine = ChartEngine::new(
            config,
            Box::new(factory),
            Rc::new(BrowserFrameScheduler),
            Rc::new(ElementContainer::new(container.clone())),
        );
        let engine = Rc::new(RefCell::new(engine));
        let observer = observe_container(&container, Rc::downgrade(&engine));
        Ok(Self { engine, container, observer })
    }

    /// Builds the pane stack. Also the retry path after a fatal error.
    pub fn mount(&self, input_json: &str, configs_json: &str) -> Result<(), JsValue> {
        let input: ChartInput = serde_json::from_str(input_json).map_err(|e| to_js(e.into()))?;
        let configs = IndicatorConfigSet::from_json(configs_json).map_err(to_js)?;
        self.engine.borrow_mut().mount(input, configs).map_err(to_js)
    }

    #[wasm_bindgen(js_name = setData)]
    pub fn set_data(&self, input_json: &str) -> Result<(), JsValue> {
        let input: ChartInput = serde_json::from_str(input_json).map_err(|e| to_js(e.into()))?;
        self.engine.borrow_mut().set_data(input).map_err(to_js)
    }

    /// Returns the reconcile report as JSON
    #[wasm_bindgen(js_name = setIndicatorConfigs)]
    pub fn set_indicator_configs(&self, configs_json: &str) -> Result<String, JsValue> {
        let configs = IndicatorConfigSet::from_json(configs_json).map_err(to_js)?;
        let report = self.engine.borrow_mut().set_indicator_configs(configs).map_err(to_js)?;
        serde_json::to_string(&report).map_err(|e| to_js(e.into()))
    }

    /// `callback(message)` runs once per mount on the first fatal error
    #[wasm_bindgen(js_name = onFatalError)]
    pub fn on_fatal_error(&self, callback: js_sys::Function) {
        self.engine.borrow_mut().on_fatal_error(move |err| {
            if let Err(js_err) = callback.call1(&JsValue::NULL, &JsValue::from_str(&err.to_string())) {
                log_warn!(LogComponent::Presentation("MultiPaneChart"), "fatal error callback threw: {:?}", js_err);
            }
        });
    }

    /// Call when a surrounding sidebar starts animating
    #[wasm_bindgen(js_name = notifyLayoutTransition)]
    pub fn notify_layout_transition(&self) {
        self.engine.borrow().notify_layout_transition();
    }

    #[wasm_bindgen(js_name = notifyResize)]
    pub fn notify_resize(&self) {
        self.engine.borrow().notify_container_resized();
    }

    /// PNG data URL of every visible pane stacked top to bottom
    #[wasm_bindgen(js_name = takeSnapshot)]
    pub fn take_snapshot(&self) -> Result<String, JsValue> {
        let image = self.engine.borrow().snapshot().map_err(to_js)?;
        let document = self
            .container
            .owner_document()
            .ok_or_else(|| JsValue::from_str("container is not attached to a document"))?;
        encode_data_url(&document, &image).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Current legend of every pane as JSON
    pub fn legends(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.engine.borrow().legends()).map_err(|e| to_js(e.into()))
    }

    pub fn status(&self) -> String {
        match self.engine.borrow().status() {
            EngineStatus::Idle => "idle",
            EngineStatus::Mounted => "mounted",
            EngineStatus::Failed => "failed",
        }
        .to_string()
    }

    pub fn unmount(&mut self) {
        self.observer = None;
        self.engine.borrow_mut().unmount();
    }
}

/// Forwards container size changes to the engine. A missing observer only
/// costs automatic resizing; `notifyResize` still works.
pub(crate) fn observe_container(
    container: &web_sys::Element,
    engine: Weak<RefCell<ChartEngine>>,
) -> Option<ContainerObserver> {
    let observed = ContainerObserver::observe(container, move || {
        if let Some(engine) = engine.upgrade() {
            if let Ok(engine) = engine.try_borrow() {
                engine.notify_container_resized();
            }
        }
    });
    match observed {
        Ok(observer) => {
            log_info!(LogComponent::Presentation("MultiPaneChart"), "observing container size");
            Some(observer)
        }
        Err(err) => {
            log_warn!(LogComponent::Presentation("MultiPaneChart"), "{}", err);
            None
        }
    }
}
