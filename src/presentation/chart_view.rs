use std::cell::RefCell;
use std::rc::Rc;

use leptos::html::Div;
use leptos::*;
use wasm_bindgen::JsCast;

use crate::application::{ChartEngine, EngineConfig, EngineStatus};
use crate::domain::{
    chart::IndicatorConfigSet,
    logging::{LogComponent, init_logger},
    market_data::ChartInput,
};
use crate::infrastructure::{
    BrowserFrameScheduler, ConsoleLogger, ContainerObserver, ElementContainer, rendering::CanvasSurfaceFactory,
};
use crate::{log_error, log_warn};

use super::wasm_api::observe_container;

struct Mounted {
    engine: Rc<RefCell<ChartEngine>>,
    _observer: Option<ContainerObserver>,
}

/// Host component: a full-size container whose panes follow `input` and `configs`.
///
/// Toggling `sidebar_open` samples the container across the sidebar
/// animation so the panes track its width.
#[component]
pub fn MultiPaneChartView(
    #[prop(into)] input: Signal<ChartInput>,
    #[prop(into)] configs: Signal<IndicatorConfigSet>,
    #[prop(into, optional)] sidebar_open: MaybeSignal<bool>,
    #[prop(optional)] config: Option<EngineConfig>,
    #[prop(optional, into)] on_fatal_error: Option<Callback<String>>,
) -> impl IntoView {
    let container_ref = create_node_ref::<Div>();
    let mounted: StoredValue<Option<Mounted>> = store_value(None);
    let (ready, set_ready) = create_signal(false);
    let config = config.unwrap_or_default();

    let engine = move || mounted.with_value(|m| m.as_ref().map(|m| m.engine.clone()));

    // Engine lives as long as the container element
    create_effect(move |_| {
        let Some(div) = container_ref.get() else { return };
        if mounted.with_value(Option::is_some) {
            return;
        }
        init_logger(Box::new(ConsoleLogger), config.log_level);
        let element: web_sys::Element = (*div).clone().unchecked_into();
        let factory = match CanvasSurfaceFactory::new(element.clone()) {
            Ok(factory) => factory,
            Err(err) => {
                log_error!(LogComponent::Presentation("MultiPaneChartView"), "{}", err);
                return;
            }
        };
        let mut chart = ChartEngine::new(
            config.clone(),
            Box::new(factory),
            Rc::new(BrowserFrameScheduler),
            Rc::new(ElementContainer::new(element.clone())),
        );
        if let Some(callback) = on_fatal_error {
            chart.on_fatal_error(move |err| callback.call(err.to_string()));
        }
        let chart = Rc::new(RefCell::new(chart));
        let observer = observe_container(&element, Rc::downgrade(&chart));
        mounted.set_value(Some(Mounted { engine: chart, _observer: observer }));
        set_ready.set(true);
    });

    create_effect(move |_| {
        let input = input.get();
        if !ready.get() {
            return;
        }
        let Some(chart) = engine() else { return };
        let mut chart = chart.borrow_mut();
        let result = if chart.status() == EngineStatus::Mounted {
            chart.set_data(input)
        } else {
            chart.mount(input, configs.get_untracked())
        };
        if let Err(err) = result {
            log_warn!(LogComponent::Presentation("MultiPaneChartView"), "data update failed: {}", err);
        }
    });

    create_effect(move |_| {
        let configs = configs.get();
        if !ready.get() {
            return;
        }
        let Some(chart) = engine() else { return };
        let mut chart = chart.borrow_mut();
        if chart.status() != EngineStatus::Mounted {
            return;
        }
        if let Err(err) = chart.set_indicator_configs(configs) {
            log_warn!(LogComponent::Presentation("MultiPaneChartView"), "config update failed: {}", err);
        }
    });

    create_effect(move |previous: Option<bool>| {
        let open = sidebar_open.get();
        if previous.is_some_and(|was| was != open) {
            if let Some(chart) = engine() {
                chart.borrow().notify_layout_transition();
            }
        }
        open
    });

    on_cleanup(move || {
        if let Some(Mounted { engine, .. }) = mounted.try_update_value(Option::take).flatten() {
            engine.borrow_mut().unmount();
        }
    });

    view! {
        <div
            node_ref=container_ref
            class="multi-pane-chart"
            style="position: relative; width: 100%; height: 100%; overflow: hidden;"
        ></div>
    }
}
